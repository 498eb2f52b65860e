//! Equations: term combinations, system assembly and the sweep cycle.

use nalgebra as na;
use nalgebra_sparse as nas;

use crate::{
    boundary::{BoundaryCondition, BoundaryError, FaceConditions},
    solver::{spmv, LinearSolver, NonConvergence},
    term::{AssemblyCtx, Term},
    variable::{Cell, DimensionMismatch, Variable},
};

/// Error in assembling or solving an equation.
///
/// Every variant is detected (or propagated) before the solved-for
/// variable is written to, so a failed sweep leaves it untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EquationError {
    /// A coefficient or variable length does not match the mesh.
    #[error(transparent)]
    Dimensions(#[from] DimensionMismatch),
    /// Boundary conditions conflict or sit on interior faces.
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    /// The linear solver failed to converge.
    #[error(transparent)]
    Solver(#[from] NonConvergence),
    /// The equation has a transient term but no time step was given.
    #[error("equation has a transient term but no time step was given")]
    MissingTimeStep,
}

/// A discretized PDE: a signed combination of [`Term`]s.
///
/// Built with the arithmetic operators,
/// mirroring how the continuous equation `Σ ±term = 0` is written:
/// ```
/// # use peclet::Term;
/// let eq = Term::<2>::transient(1.0) - Term::diffusion(0.5) - Term::explicit_source(1.0);
/// ```
#[derive(Clone, Debug)]
pub struct Equation<const DIM: usize> {
    terms: Vec<(f64, Term<DIM>)>,
    relaxation: f64,
}

impl<const DIM: usize> From<Term<DIM>> for Equation<DIM> {
    fn from(term: Term<DIM>) -> Self {
        Self {
            terms: vec![(1.0, term)],
            relaxation: 1.0,
        }
    }
}

impl<const DIM: usize> Equation<DIM> {
    /// The signed terms making up the equation.
    pub fn terms(&self) -> &[(f64, Term<DIM>)] {
        &self.terms
    }

    /// Under-relax the write-back: after a sweep the variable moves
    /// only the fraction `factor` of the way to the new solution,
    /// `x ← x_prev + factor·(x − x_prev)`.
    ///
    /// The default factor of 1 writes the solution back in full.
    /// Values in `(0, 1)` stabilize strongly nonlinear outer loops.
    pub fn with_relaxation(mut self, factor: f64) -> Self {
        self.relaxation = factor;
        self
    }

    fn validate(
        &self,
        var: &Variable<DIM, Cell>,
        dt: Option<f64>,
    ) -> Result<(), EquationError> {
        let cell_count = var.mesh().cell_count();
        if var.values.len() != cell_count {
            return Err(DimensionMismatch {
                expected: cell_count,
                actual: var.values.len(),
            }
            .into());
        }
        for (_, term) in &self.terms {
            term.check_dimensions(cell_count)?;
            if term.is_transient() && dt.is_none() {
                return Err(EquationError::MissingTimeStep);
            }
        }
        Ok(())
    }

    /// Assemble the sparse system for the variable's current values
    /// without solving it.
    ///
    /// Field-dependent coefficients and flux limiters are frozen
    /// at the current iterate (Picard linearization).
    pub fn assemble(
        &self,
        var: &Variable<DIM, Cell>,
        conditions: &[BoundaryCondition],
        dt: Option<f64>,
    ) -> Result<AssembledSystem, EquationError> {
        self.validate(var, dt)?;
        let mesh = var.mesh();
        let bcs = FaceConditions::resolve(conditions, mesh.face_count(), |f| {
            mesh.is_exterior(f)
        })?;

        let n = mesh.cell_count();
        let mut coo = nas::CooMatrix::new(n, n);
        let mut rhs = na::DVector::zeros(n);
        for (sign, term) in &self.terms {
            let ctx = AssemblyCtx {
                mesh,
                values: &var.values,
                old: var.old(),
                bcs: &bcs,
                dt,
                sign: *sign,
                row_offset: 0,
                col_offset: 0,
            };
            term.assemble_into(&mut coo, &mut rhs, &ctx);
        }
        Ok(AssembledSystem {
            matrix: nas::CsrMatrix::from(&coo),
            rhs,
        })
    }

    /// One assemble-solve-update cycle.
    ///
    /// Returns the residual norm `‖A·x_prev − b‖` of the incoming
    /// values against the freshly assembled system, i.e. how far
    /// the variable was from satisfying the equation *before*
    /// this sweep's solution was written back.
    /// A residual near zero means the iteration has converged.
    ///
    /// On any error the variable is left untouched.
    pub fn sweep(
        &self,
        var: &mut Variable<DIM, Cell>,
        conditions: &[BoundaryCondition],
        solver: &dyn LinearSolver,
        dt: Option<f64>,
    ) -> Result<f64, EquationError> {
        let system = self.assemble(var, conditions, dt)?;
        let residual = (spmv(&system.matrix, &var.values) - &system.rhs).norm();
        let solution = solver.solve(&system.matrix, &system.rhs, &var.values)?;
        if self.relaxation == 1.0 {
            var.values = solution;
        } else {
            var.values += self.relaxation * (solution - &var.values);
        }
        Ok(residual)
    }

    /// Solve the equation: exactly one [`sweep`][Self::sweep].
    ///
    /// Sufficient for linear problems;
    /// nonlinear ones repeat sweeps in a caller-owned loop.
    pub fn solve(
        &self,
        var: &mut Variable<DIM, Cell>,
        conditions: &[BoundaryCondition],
        solver: &dyn LinearSolver,
        dt: Option<f64>,
    ) -> Result<f64, EquationError> {
        self.sweep(var, conditions, solver, dt)
    }
}

/// An assembled sparse linear system `A·φ = b`.
pub struct AssembledSystem {
    /// The coefficient matrix, duplicate stencil writes summed.
    pub matrix: nas::CsrMatrix<f64>,
    /// The right-hand side.
    pub rhs: na::DVector<f64>,
}

impl AssembledSystem {
    /// The matrix diagonal, e.g. for SIMPLE-style
    /// pressure-correction coefficients.
    pub fn diagonal(&self) -> na::DVector<f64> {
        let mut diag = na::DVector::zeros(self.matrix.nrows().min(self.matrix.ncols()));
        for (i, j, v) in self.matrix.triplet_iter() {
            if i == j {
                diag[i] += v;
            }
        }
        diag
    }
}

//
// term -> equation operators
//

impl<const DIM: usize> std::ops::Neg for Term<DIM> {
    type Output = Equation<DIM>;

    fn neg(self) -> Equation<DIM> {
        Equation {
            terms: vec![(-1.0, self)],
            relaxation: 1.0,
        }
    }
}

impl<const DIM: usize> std::ops::Add for Term<DIM> {
    type Output = Equation<DIM>;

    fn add(self, rhs: Term<DIM>) -> Equation<DIM> {
        Equation::from(self) + rhs
    }
}

impl<const DIM: usize> std::ops::Sub for Term<DIM> {
    type Output = Equation<DIM>;

    fn sub(self, rhs: Term<DIM>) -> Equation<DIM> {
        Equation::from(self) - rhs
    }
}

impl<const DIM: usize> std::ops::Mul<Term<DIM>> for f64 {
    type Output = Equation<DIM>;

    fn mul(self, rhs: Term<DIM>) -> Equation<DIM> {
        Equation {
            terms: vec![(self, rhs)],
            relaxation: 1.0,
        }
    }
}

//
// equation combination operators
//

impl<const DIM: usize> std::ops::Add<Term<DIM>> for Equation<DIM> {
    type Output = Self;

    fn add(mut self, rhs: Term<DIM>) -> Self {
        self.terms.push((1.0, rhs));
        self
    }
}

impl<const DIM: usize> std::ops::Sub<Term<DIM>> for Equation<DIM> {
    type Output = Self;

    fn sub(mut self, rhs: Term<DIM>) -> Self {
        self.terms.push((-1.0, rhs));
        self
    }
}

impl<const DIM: usize> std::ops::Add for Equation<DIM> {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.terms.extend(rhs.terms);
        self
    }
}

impl<const DIM: usize> std::ops::Sub for Equation<DIM> {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self {
        self.terms
            .extend(rhs.terms.into_iter().map(|(s, t)| (-s, t)));
        self
    }
}

impl<const DIM: usize> std::ops::Neg for Equation<DIM> {
    type Output = Self;

    fn neg(mut self) -> Self {
        for (s, _) in &mut self.terms {
            *s = -*s;
        }
        self
    }
}

impl<const DIM: usize> std::ops::Mul<Equation<DIM>> for f64 {
    type Output = Equation<DIM>;

    fn mul(self, mut rhs: Equation<DIM>) -> Equation<DIM> {
        for (s, _) in &mut rhs.terms {
            *s *= self;
        }
        rhs
    }
}

/// A block system coupling equations over several cell variables
/// sharing one mesh.
///
/// Variable slot `k` occupies rows and columns `[k·n, (k+1)·n)`
/// of the assembled matrix, with `n` the mesh's cell count.
/// Each slot carries its own equation (the diagonal block);
/// cross-variable influence goes through
/// [`coupling`][Self::coupling] terms in the off-diagonal blocks.
pub struct System<const DIM: usize> {
    slots: usize,
    equations: Vec<Option<Equation<DIM>>>,
    couplings: Vec<(usize, usize, Equation<DIM>)>,
}

impl<const DIM: usize> System<DIM> {
    /// Create a system over `slots` variables.
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            equations: (0..slots).map(|_| None).collect(),
            couplings: Vec::new(),
        }
    }

    /// Set the equation governing a variable slot
    /// (the diagonal block).
    pub fn equation(mut self, slot: usize, eq: impl Into<Equation<DIM>>) -> Self {
        self.equations[slot] = Some(eq.into());
        self
    }

    /// Add a term through which the variable in `col_slot`
    /// enters the equation of `row_slot` (an off-diagonal block).
    pub fn coupling(
        mut self,
        row_slot: usize,
        col_slot: usize,
        term: impl Into<Equation<DIM>>,
    ) -> Self {
        self.couplings.push((row_slot, col_slot, term.into()));
        self
    }

    /// One coupled sweep over all variables:
    /// assemble the full block system at the current iterates,
    /// solve it at once, and write every variable back in full.
    ///
    /// `conditions[k]` holds the boundary conditions of slot `k`.
    /// Returns the pre-sweep residual of the concatenated system.
    /// On any error no variable is written to.
    pub fn sweep(
        &self,
        vars: &mut [&mut Variable<DIM, Cell>],
        conditions: &[&[BoundaryCondition]],
        solver: &dyn LinearSolver,
        dt: Option<f64>,
    ) -> Result<f64, EquationError> {
        if vars.len() != self.slots || conditions.len() != self.slots {
            return Err(DimensionMismatch {
                expected: self.slots,
                actual: vars.len().min(conditions.len()),
            }
            .into());
        }
        let n = vars
            .first()
            .map_or(0, |v| v.mesh().cell_count());
        for var in vars.iter() {
            if var.mesh().cell_count() != n || var.values.len() != n {
                return Err(DimensionMismatch {
                    expected: n,
                    actual: var.values.len(),
                }
                .into());
            }
        }

        // validation and BC resolution for every slot up front,
        // before anything is assembled
        let mut resolved = Vec::with_capacity(self.slots);
        for (var, conds) in vars.iter().zip(conditions) {
            let mesh = var.mesh();
            resolved.push(FaceConditions::resolve(conds, mesh.face_count(), |f| {
                mesh.is_exterior(f)
            })?);
        }
        let blocks = self.blocks();
        for (_, _, eq) in &blocks {
            for (_, term) in eq.terms() {
                term.check_dimensions(n)?;
                if term.is_transient() && dt.is_none() {
                    return Err(EquationError::MissingTimeStep);
                }
            }
        }

        let total = self.slots * n;
        let mut coo = nas::CooMatrix::new(total, total);
        let mut rhs = na::DVector::zeros(total);
        for (row, col, eq) in &blocks {
            let var = &vars[*col];
            for (sign, term) in eq.terms() {
                let ctx = AssemblyCtx {
                    mesh: var.mesh(),
                    values: &var.values,
                    old: var.old(),
                    bcs: &resolved[*col],
                    dt,
                    sign: *sign,
                    row_offset: row * n,
                    col_offset: col * n,
                };
                term.assemble_into(&mut coo, &mut rhs, &ctx);
            }
        }
        let matrix = nas::CsrMatrix::from(&coo);

        let mut x_prev = na::DVector::zeros(total);
        for (k, var) in vars.iter().enumerate() {
            x_prev.rows_mut(k * n, n).copy_from(&var.values);
        }
        let residual = (spmv(&matrix, &x_prev) - &rhs).norm();
        let solution = solver.solve(&matrix, &rhs, &x_prev)?;
        for (k, var) in vars.iter_mut().enumerate() {
            var.values.copy_from(&solution.rows(k * n, n));
        }
        Ok(residual)
    }

    /// All blocks as (row, col, equation) triples,
    /// diagonal equations first.
    fn blocks(&self) -> Vec<(usize, usize, Equation<DIM>)> {
        self.equations
            .iter()
            .enumerate()
            .filter_map(|(k, eq)| eq.clone().map(|eq| (k, k, eq)))
            .chain(self.couplings.iter().cloned())
            .collect()
    }
}
