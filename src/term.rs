//! Discretization terms: the building blocks of an [`Equation`][crate::Equation].
//!
//! Each term knows how to write its finite-volume stencil
//! into a shared sparse system.
//! The sign convention is that a term `T` contributes `A·φ - b`
//! to the equation `Σ ±T = 0`,
//! so the assembled system to solve is `(Σ ±A)·φ = Σ ±b`.

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    boundary::{BoundaryKind, FaceConditions},
    mesh::Mesh,
    variable::{self, Cell, DimensionMismatch, Variable},
};

/// Péclet numbers beyond this magnitude take the scheme's
/// asymptotic weight to avoid overflowing `exp`.
const PECLET_CUTOFF: f64 = 101.0;
/// Péclet numbers below this magnitude are treated as zero
/// (pure central differencing).
const PECLET_EPSILON: f64 = 1e-8;

/// A scalar coefficient field for a term:
/// either uniform over the mesh or resolved per cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Coefficient {
    /// The same value on every cell.
    Constant(f64),
    /// One value per cell, e.g. a [`Variable`]'s values.
    PerCell(na::DVector<f64>),
}

impl Coefficient {
    /// The coefficient value at a cell.
    #[inline]
    pub fn at(&self, cell: usize) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::PerCell(vals) => vals[cell],
        }
    }

    /// Interpolate the coefficient to a face
    /// with the mesh's distance weights.
    fn at_face<const DIM: usize>(&self, mesh: &Mesh<DIM>, face: usize) -> f64 {
        match self {
            Self::Constant(v) => *v,
            Self::PerCell(vals) => {
                let (owner, neighbor) = mesh.face_cells(face);
                match neighbor {
                    Some(n) => {
                        let w = mesh.face_weight(face);
                        w * vals[owner] + (1.0 - w) * vals[n]
                    }
                    None => vals[owner],
                }
            }
        }
    }

    pub(crate) fn check_len(&self, cell_count: usize) -> Result<(), DimensionMismatch> {
        match self {
            Self::Constant(_) => Ok(()),
            Self::PerCell(vals) if vals.len() == cell_count => Ok(()),
            Self::PerCell(vals) => Err(DimensionMismatch {
                expected: cell_count,
                actual: vals.len(),
            }),
        }
    }
}

impl From<f64> for Coefficient {
    fn from(v: f64) -> Self {
        Self::Constant(v)
    }
}

impl From<na::DVector<f64>> for Coefficient {
    fn from(vals: na::DVector<f64>) -> Self {
        Self::PerCell(vals)
    }
}

impl<const DIM: usize> From<&Variable<DIM, Cell>> for Coefficient {
    fn from(var: &Variable<DIM, Cell>) -> Self {
        Self::PerCell(var.values.clone())
    }
}

/// How a convection term apportions the face value
/// between the upwind and downwind cells.
///
/// Every Péclet-blended scheme reduces to central differencing
/// as `Pe → 0` and to pure upwinding as `Pe → ±∞`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvectionScheme {
    /// Arithmetic mean of the two cells regardless of flow.
    /// Second-order but oscillatory above `|Pe| = 2`.
    CentralDifference,
    /// The upwind cell's value alone. Unconditionally bounded,
    /// first-order.
    Upwind,
    /// Weights from the exact solution
    /// of the 1D steady convection-diffusion equation.
    Exponential,
    /// Patankar's polynomial fit to the exponential scheme,
    /// cheaper to evaluate and nearly indistinguishable from it.
    PowerLaw,
    /// Van Leer's flux limiter on the ratio of successive gradients:
    /// second-order where the solution is smooth,
    /// falling back to upwinding at extrema.
    VanLeer,
}

impl ConvectionScheme {
    /// The owner-side interpolation weight `α(Pe)`,
    /// with `Pe` signed positive for flow from owner to neighbor.
    ///
    /// [`VanLeer`][Self::VanLeer] is not a pure function of `Pe`
    /// (its weight depends on the solution iterate)
    /// and falls back to upwinding here.
    pub fn weight(self, peclet: f64) -> f64 {
        if peclet.abs() < PECLET_EPSILON {
            return 0.5;
        }
        match self {
            Self::CentralDifference => 0.5,
            Self::Upwind | Self::VanLeer => {
                if peclet > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Exponential => {
                if peclet > PECLET_CUTOFF {
                    1.0 - 1.0 / peclet
                } else if peclet < -PECLET_CUTOFF {
                    -1.0 / peclet
                } else {
                    let e = peclet.exp();
                    ((peclet - 1.0) * e + 1.0) / (peclet * (e - 1.0))
                }
            }
            Self::PowerLaw => {
                let p = peclet;
                if p > 10.0 {
                    (p - 1.0) / p
                } else if p > 0.0 {
                    ((p - 1.0) + (1.0 - p / 10.0).powi(5)) / p
                } else if p > -10.0 {
                    ((1.0 + p / 10.0).powi(5) - 1.0) / p + 1.0
                } else {
                    -1.0 / p
                }
            }
        }
    }
}

/// One discretized operator of a PDE.
///
/// Terms are combined into an [`Equation`][crate::Equation]
/// with `+`, `-` and scalar `*`,
/// mirroring how the continuous equation is written.
#[derive(Clone, Debug)]
pub enum Term<const DIM: usize> {
    /// `∂(ρφ)/∂t`, backward-Euler in time.
    /// Requires a time step at solve time.
    Transient {
        /// The capacity/density coefficient `ρ`.
        coeff: Coefficient,
    },
    /// `∇·(Γ∇φ)`, implicit.
    Diffusion {
        /// The diffusivity `Γ`.
        coeff: Coefficient,
    },
    /// `∇·(uφ)`, implicit, with the face value apportioned
    /// between cells by the scheme's Péclet-dependent weight.
    Convection {
        /// The uniform convecting velocity `u`.
        velocity: na::SVector<f64, DIM>,
        /// The face interpolation scheme.
        scheme: ConvectionScheme,
        /// The diffusivity entering the Péclet number.
        /// Zero is allowed and makes every face purely upwinded.
        diffusion: Coefficient,
    },
    /// `S_p·φ`: a source proportional to the solution,
    /// folded into the matrix diagonal (Picard linearization).
    ImplicitSource {
        /// The proportionality `S_p`.
        coeff: Coefficient,
    },
    /// `S_c`: a solution-independent source,
    /// folded into the right-hand side.
    ExplicitSource {
        /// The source density `S_c`.
        coeff: Coefficient,
    },
}

impl<const DIM: usize> Term<DIM> {
    /// A backward-Euler time derivative `∂(ρφ)/∂t`.
    pub fn transient(coeff: impl Into<Coefficient>) -> Self {
        Self::Transient {
            coeff: coeff.into(),
        }
    }

    /// An implicit diffusion operator `∇·(Γ∇φ)`.
    pub fn diffusion(coeff: impl Into<Coefficient>) -> Self {
        Self::Diffusion {
            coeff: coeff.into(),
        }
    }

    /// An implicit convection operator `∇·(uφ)`.
    ///
    /// The `diffusion` coefficient only enters the Péclet number
    /// used by the scheme; pair the term with an explicit
    /// [`Term::diffusion`] to actually diffuse.
    pub fn convection(
        velocity: na::SVector<f64, DIM>,
        scheme: ConvectionScheme,
        diffusion: impl Into<Coefficient>,
    ) -> Self {
        Self::Convection {
            velocity,
            scheme,
            diffusion: diffusion.into(),
        }
    }

    /// A source proportional to the solution, `S_p·φ`.
    pub fn implicit_source(coeff: impl Into<Coefficient>) -> Self {
        Self::ImplicitSource {
            coeff: coeff.into(),
        }
    }

    /// A solution-independent source `S_c`.
    pub fn explicit_source(coeff: impl Into<Coefficient>) -> Self {
        Self::ExplicitSource {
            coeff: coeff.into(),
        }
    }

    /// Whether the term needs a time step to assemble.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Check per-cell coefficient lengths against the mesh.
    pub(crate) fn check_dimensions(&self, cell_count: usize) -> Result<(), DimensionMismatch> {
        match self {
            Self::Transient { coeff }
            | Self::Diffusion { coeff }
            | Self::ImplicitSource { coeff }
            | Self::ExplicitSource { coeff }
            | Self::Convection {
                diffusion: coeff, ..
            } => coeff.check_len(cell_count),
        }
    }
}

/// Shared state for one assembly pass over a term list.
///
/// The offsets shift the term's writes to a block
/// of a coupled multi-variable system;
/// single-variable equations use zero offsets.
pub(crate) struct AssemblyCtx<'a, const DIM: usize> {
    pub mesh: &'a Mesh<DIM>,
    /// The current iterate (Picard linearization point).
    pub values: &'a na::DVector<f64>,
    /// The previous-time-step snapshot.
    pub old: &'a na::DVector<f64>,
    pub bcs: &'a FaceConditions,
    pub dt: Option<f64>,
    pub sign: f64,
    pub row_offset: usize,
    pub col_offset: usize,
}

impl<const DIM: usize> Term<DIM> {
    /// Write this term's stencil into the system,
    /// scaled by the context's sign and shifted to its block.
    ///
    /// Dimensions and the presence of a time step
    /// must have been validated beforehand.
    pub(crate) fn assemble_into(
        &self,
        matrix: &mut nas::CooMatrix<f64>,
        rhs: &mut na::DVector<f64>,
        ctx: &AssemblyCtx<'_, DIM>,
    ) {
        let mesh = ctx.mesh;
        let s = ctx.sign;
        let mut push = |row: usize, col: usize, v: f64| {
            matrix.push(ctx.row_offset + row, ctx.col_offset + col, s * v);
        };

        match self {
            Self::Transient { coeff } => {
                // validated by the equation before assembly starts
                let dt = ctx.dt.unwrap_or(f64::INFINITY);
                for cell in 0..mesh.cell_count() {
                    let rho_v = coeff.at(cell) * mesh.cell_volume(cell) / dt;
                    push(cell, cell, rho_v);
                    rhs[ctx.row_offset + cell] += s * rho_v * ctx.old[cell];
                }
            }

            Self::Diffusion { coeff } => {
                for face in 0..mesh.face_count() {
                    let (owner, neighbor) = mesh.face_cells(face);
                    let g = coeff.at_face(mesh, face) * mesh.face_area(face)
                        / mesh.face_distance(face);
                    match neighbor {
                        Some(n) => {
                            push(owner, owner, -g);
                            push(owner, n, g);
                            push(n, n, -g);
                            push(n, owner, g);
                        }
                        None => match ctx.bcs.get(face) {
                            Some(BoundaryKind::FixedValue(v)) => {
                                push(owner, owner, -g);
                                rhs[ctx.row_offset + owner] += s * (-g * v);
                            }
                            Some(BoundaryKind::FixedFlux(q)) => {
                                rhs[ctx.row_offset + owner] += s * (-q * mesh.face_area(face));
                            }
                            // unconstrained exterior faces are insulated
                            None => {}
                        },
                    }
                }
            }

            Self::Convection {
                velocity,
                scheme,
                diffusion,
            } => {
                // the limiter needs gradients of the current iterate
                let grads = if *scheme == ConvectionScheme::VanLeer {
                    Some(variable::green_gauss_gradient(mesh, ctx.values))
                } else {
                    None
                };
                let peclet = |face: usize, flux: f64| {
                    let gamma_a = diffusion.at_face(mesh, face) * mesh.face_area(face);
                    if gamma_a.abs() > 0.0 {
                        flux * mesh.face_distance(face) / gamma_a
                    } else {
                        flux.signum() * f64::INFINITY
                    }
                };
                for face in 0..mesh.face_count() {
                    let (owner, neighbor) = mesh.face_cells(face);
                    let area = mesh.face_area(face);
                    let flux = velocity.dot(&mesh.face_normal(face)) * area;
                    match neighbor {
                        Some(n) => {
                            let alpha = match &grads {
                                Some(grads) => {
                                    van_leer_weight(mesh, ctx.values, grads, owner, n, flux)
                                }
                                None => scheme.weight(peclet(face, flux)),
                            };
                            push(owner, owner, flux * alpha);
                            push(owner, n, flux * (1.0 - alpha));
                            push(n, owner, -flux * alpha);
                            push(n, n, -flux * (1.0 - alpha));
                        }
                        None => match ctx.bcs.get(face) {
                            // the fixed value stands in for the missing
                            // downwind cell, weighted by the scheme at the
                            // half-spacing Péclet number of the face; this
                            // keeps the exponential scheme nodally exact up
                            // to the boundary
                            Some(BoundaryKind::FixedValue(v)) => {
                                let alpha = scheme.weight(peclet(face, flux));
                                push(owner, owner, flux * alpha);
                                rhs[ctx.row_offset + owner] += s * (-flux * (1.0 - alpha) * v);
                            }
                            // otherwise the upwind interior value convects out
                            Some(BoundaryKind::FixedFlux(_)) | None => {
                                push(owner, owner, flux);
                            }
                        },
                    }
                }
            }

            Self::ImplicitSource { coeff } => {
                for cell in 0..mesh.cell_count() {
                    push(cell, cell, coeff.at(cell) * mesh.cell_volume(cell));
                }
            }

            Self::ExplicitSource { coeff } => {
                for cell in 0..mesh.cell_count() {
                    rhs[ctx.row_offset + cell] -= s * coeff.at(cell) * mesh.cell_volume(cell);
                }
            }
        }
    }
}

/// Owner-side weight from Van Leer's limiter
/// `ψ(r) = (r + |r|) / (1 + |r|)`
/// with `r` the ratio of the upwind gradient
/// to the face difference.
fn van_leer_weight<const DIM: usize>(
    mesh: &Mesh<DIM>,
    values: &na::DVector<f64>,
    grads: &[na::SVector<f64, DIM>],
    owner: usize,
    neighbor: usize,
    flux: f64,
) -> f64 {
    let (up, down) = if flux >= 0.0 {
        (owner, neighbor)
    } else {
        (neighbor, owner)
    };
    let d_vec = mesh.cell_centroid(down) - mesh.cell_centroid(up);
    let diff = values[down] - values[up];
    let psi = if diff.abs() < f64::EPSILON * (1.0 + values[up].abs()) {
        // locally flat: upwinding and any limited blend coincide
        0.0
    } else {
        let r = 2.0 * grads[up].dot(&d_vec) / diff - 1.0;
        (r + r.abs()) / (1.0 + r.abs())
    };
    // ψ = 0 is pure upwind, ψ = 1 central
    if flux >= 0.0 {
        1.0 - 0.5 * psi
    } else {
        0.5 * psi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::BoundaryCondition;
    use approx::assert_abs_diff_eq;

    #[test]
    fn blended_schemes_limit_to_central_and_upwind() {
        let blended = [
            ConvectionScheme::Exponential,
            ConvectionScheme::PowerLaw,
            ConvectionScheme::Upwind,
        ];
        for scheme in blended {
            assert_abs_diff_eq!(scheme.weight(0.0), 0.5);
            assert_abs_diff_eq!(scheme.weight(1e-12), 0.5);
            assert_abs_diff_eq!(scheme.weight(1e6), 1.0, epsilon = 1e-5);
            assert_abs_diff_eq!(scheme.weight(-1e6), 0.0, epsilon = 1e-5);
        }
        assert_abs_diff_eq!(ConvectionScheme::CentralDifference.weight(1e6), 0.5);
    }

    #[test]
    fn exponential_and_power_law_nearly_agree() {
        for pe in [-20.0, -5.0, -1.0, -0.1, 0.1, 1.0, 5.0, 20.0] {
            let e = ConvectionScheme::Exponential.weight(pe);
            let p = ConvectionScheme::PowerLaw.weight(pe);
            assert_abs_diff_eq!(e, p, epsilon = 5e-3);
        }
    }

    #[test]
    fn exponential_weight_matches_the_analytic_value() {
        // α(1) = ((1-1)e + 1) / (1·(e - 1)) = 1/(e - 1)
        let e = std::f64::consts::E;
        assert_abs_diff_eq!(
            ConvectionScheme::Exponential.weight(1.0),
            1.0 / (e - 1.0),
            epsilon = 1e-12
        );
    }

    fn assemble_single<const DIM: usize>(
        mesh: &Mesh<DIM>,
        term: &Term<DIM>,
        bcs: &[BoundaryCondition],
        dt: Option<f64>,
    ) -> (na::DMatrix<f64>, na::DVector<f64>) {
        let n = mesh.cell_count();
        let values = na::DVector::zeros(n);
        let resolved =
            FaceConditions::resolve(bcs, mesh.face_count(), |f| mesh.is_exterior(f)).unwrap();
        let mut coo = nas::CooMatrix::new(n, n);
        let mut rhs = na::DVector::zeros(n);
        let ctx = AssemblyCtx {
            mesh,
            values: &values,
            old: &values,
            bcs: &resolved,
            dt,
            sign: 1.0,
            row_offset: 0,
            col_offset: 0,
        };
        term.assemble_into(&mut coo, &mut rhs, &ctx);
        let csr = nas::CsrMatrix::from(&coo);
        let mut dense = na::DMatrix::zeros(n, n);
        for (i, j, v) in csr.triplet_iter() {
            dense[(i, j)] = *v;
        }
        (dense, rhs)
    }

    #[test]
    fn diffusion_matrix_is_symmetric_and_diagonally_dominant() {
        let mesh = Mesh::grid_1d(5, 0.5).unwrap();
        let bcs = [
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x <= 0.0), 0.0),
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x >= 2.5), 1.0),
        ];
        let (a, _) = assemble_single(&mesh, &Term::diffusion(2.0), &bcs, None);

        assert_eq!(a.transpose(), a);
        for i in 0..5 {
            let off: f64 = (0..5).filter(|&j| j != i).map(|j| a[(i, j)].abs()).sum();
            assert!(a[(i, i)].abs() >= off, "row {i} not diagonally dominant");
        }
        // interior conductance Γ·A/d = 2/0.5 = 4, boundary 2/0.25 = 8
        assert_abs_diff_eq!(a[(0, 1)], 4.0);
        assert_abs_diff_eq!(a[(0, 0)], -12.0);
        assert_abs_diff_eq!(a[(2, 2)], -8.0);
    }

    #[test]
    fn diffusion_of_a_linear_profile_has_zero_residual() {
        // φ = x between Dirichlet values matching the profile:
        // the discrete Laplacian must vanish in every row
        let mesh = Mesh::grid_1d(6, 1.0).unwrap();
        let bcs = [
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x <= 0.0), 0.0),
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x >= 6.0), 6.0),
        ];
        let (a, b) = assemble_single(&mesh, &Term::diffusion(1.0), &bcs, None);
        let phi = na::DVector::from_fn(6, |i, _| i as f64 + 0.5);
        let residual = &a * &phi - b;
        for r in residual.iter() {
            assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn fixed_flux_enters_only_the_rhs() {
        let mesh = Mesh::grid_1d(3, 1.0).unwrap();
        let bcs = [BoundaryCondition::fixed_flux(
            mesh.faces_where(|c| c.x <= 0.0),
            2.0,
        )];
        let (a, b) = assemble_single(&mesh, &Term::diffusion(1.0), &bcs, None);
        // no boundary conductance on the flux cell's diagonal
        assert_abs_diff_eq!(a[(0, 0)], -1.0);
        assert_abs_diff_eq!(b[0], -2.0);
        assert_abs_diff_eq!(b[1], 0.0);
    }

    #[test]
    fn transient_scales_with_volume_over_dt() {
        let mesh = Mesh::grid_2d(2, 2, 0.5, 0.5).unwrap();
        let (a, b) = assemble_single(&mesh, &Term::transient(3.0), &[], Some(0.1));
        // ρ·V/dt = 3·0.25/0.1 = 7.5 on every diagonal; old values are zero
        for i in 0..4 {
            assert_abs_diff_eq!(a[(i, i)], 7.5);
            assert_abs_diff_eq!(b[i], 0.0);
        }
    }

    #[test]
    fn sources_split_between_diagonal_and_rhs() {
        let mesh = Mesh::grid_1d(2, 2.0).unwrap();
        let (a_imp, b_imp) = assemble_single(&mesh, &Term::implicit_source(0.5), &[], None);
        assert_abs_diff_eq!(a_imp[(0, 0)], 1.0);
        assert_abs_diff_eq!(b_imp[0], 0.0);

        let (a_exp, b_exp) = assemble_single(&mesh, &Term::explicit_source(0.5), &[], None);
        assert_abs_diff_eq!(a_exp[(0, 0)], 0.0);
        assert_abs_diff_eq!(b_exp[0], -1.0);
    }

    #[test]
    fn convection_balances_inflow_and_outflow() {
        // uniform flow through a 1D Dirichlet domain: column sums of the
        // interior coupling cancel, boundary flux appears once
        let mesh = Mesh::grid_1d(4, 1.0).unwrap();
        let bcs = [
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x <= 0.0), 1.0),
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x >= 4.0), 0.0),
        ];
        let term = Term::convection(na::Vector1::new(2.0), ConvectionScheme::Upwind, 1.0);
        let (a, b) = assemble_single(&mesh, &term, &bcs, None);

        // pure upwind: each interior face couples fully to the upwind cell
        assert_abs_diff_eq!(a[(1, 0)], -2.0);
        assert_abs_diff_eq!(a[(1, 1)], 2.0);
        assert_abs_diff_eq!(a[(0, 1)], 0.0);
        // the inflow face's fixed value is upwind of the first cell,
        // so it lands entirely in the rhs: b[0] = -F·v = 2
        assert_abs_diff_eq!(b[0], 2.0);
        // at the outflow the last cell is upwind of its fixed value,
        // so the boundary flux couples to the diagonal instead
        assert_abs_diff_eq!(b[3], 0.0);
        assert_abs_diff_eq!(a[(3, 2)], -2.0);
        assert_abs_diff_eq!(a[(3, 3)], 2.0);
    }

    #[test]
    fn dirichlet_faces_are_weighted_at_the_half_spacing_peclet() {
        // boundary faces sit half a cell from the adjacent center, so the
        // blended schemes must evaluate their weight at Pe = F·(dx/2)/Γ
        // there, splitting the boundary flux between diagonal and rhs
        let mesh = Mesh::grid_1d(4, 1.0).unwrap();
        let bcs = [
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x <= 0.0), 1.0),
            BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x >= 4.0), 0.0),
        ];
        let term = Term::convection(na::Vector1::new(2.0), ConvectionScheme::Exponential, 1.0);
        let (a, b) = assemble_single(&mesh, &term, &bcs, None);

        let a_interior = ConvectionScheme::Exponential.weight(2.0);
        let a_inflow = ConvectionScheme::Exponential.weight(-1.0);
        let a_outflow = ConvectionScheme::Exponential.weight(1.0);
        // inflow face: flux -2, diagonal -2·α, rhs -(-2)·(1-α)·v
        assert_abs_diff_eq!(
            a[(0, 0)],
            -2.0 * a_inflow + 2.0 * a_interior,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(b[0], 2.0 * (1.0 - a_inflow), epsilon = 1e-12);
        // outflow face: flux +2 against a zero fixed value
        assert_abs_diff_eq!(
            a[(3, 3)],
            2.0 * a_outflow - 2.0 * (1.0 - a_interior),
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(b[3], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn per_cell_coefficient_lengths_are_checked() {
        let term = Term::<1>::diffusion(na::dvector![1.0, 2.0]);
        assert!(term.check_dimensions(2).is_ok());
        assert_eq!(
            term.check_dimensions(5),
            Err(DimensionMismatch {
                expected: 5,
                actual: 2
            })
        );
    }
}
