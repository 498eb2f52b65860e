//! Sparse linear solvers driving the assembled systems.

use nalgebra as na;
use nalgebra_sparse as nas;

/// Error returned when a solver fails to reach its tolerance.
///
/// This is recoverable by design: an outer nonlinear loop
/// may accept a partially converged solve mid-iteration,
/// tighten relaxation, or switch solvers.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
#[error("solver stopped after {iterations} iterations at residual {residual:e}")]
pub struct NonConvergence {
    /// Iterations performed before giving up.
    pub iterations: usize,
    /// The Euclidean residual norm at the last iterate.
    pub residual: f64,
}

/// A solver for sparse linear systems `A·x = b`.
pub trait LinearSolver {
    /// Solve `A·x = b` starting from an initial guess.
    ///
    /// Direct solvers ignore the guess.
    fn solve(
        &self,
        matrix: &nas::CsrMatrix<f64>,
        rhs: &na::DVector<f64>,
        initial_guess: &na::DVector<f64>,
    ) -> Result<na::DVector<f64>, NonConvergence>;
}

/// Sparse matrix-vector product, accumulated row by row.
pub(crate) fn spmv(matrix: &nas::CsrMatrix<f64>, x: &na::DVector<f64>) -> na::DVector<f64> {
    let mut y = na::DVector::zeros(matrix.nrows());
    for (i, j, v) in matrix.triplet_iter() {
        y[i] += v * x[j];
    }
    y
}

/// Stabilized bi-conjugate gradients (van der Vorst),
/// suitable for the nonsymmetric systems convection produces.
#[derive(Clone, Copy, Debug)]
pub struct BiCgStab {
    /// Convergence threshold on the residual norm,
    /// relative to the norm of the right-hand side.
    pub tolerance: f64,
    /// Iteration cap before reporting [`NonConvergence`].
    pub max_iterations: usize,
}

impl Default for BiCgStab {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 1000,
        }
    }
}

impl LinearSolver for BiCgStab {
    fn solve(
        &self,
        matrix: &nas::CsrMatrix<f64>,
        rhs: &na::DVector<f64>,
        initial_guess: &na::DVector<f64>,
    ) -> Result<na::DVector<f64>, NonConvergence> {
        let b_norm = rhs.norm();
        if b_norm == 0.0 {
            return Ok(na::DVector::zeros(rhs.len()));
        }
        let threshold = self.tolerance * b_norm;

        let mut x = initial_guess.clone();
        let mut r = rhs - spmv(matrix, &x);
        if r.norm() <= threshold {
            return Ok(x);
        }
        // shadow residual, fixed at the start
        let r_hat = r.clone();

        let mut rho = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut v = na::DVector::zeros(rhs.len());
        let mut p = na::DVector::zeros(rhs.len());

        for iteration in 1..=self.max_iterations {
            let rho_next = r_hat.dot(&r);
            if rho_next.abs() < f64::MIN_POSITIVE {
                // breakdown: the shadow residual became orthogonal
                return Err(NonConvergence {
                    iterations: iteration,
                    residual: r.norm(),
                });
            }
            let beta = (rho_next / rho) * (alpha / omega);
            rho = rho_next;

            p = &r + beta * (&p - omega * &v);
            v = spmv(matrix, &p);
            let denom = r_hat.dot(&v);
            if denom.abs() < f64::MIN_POSITIVE {
                return Err(NonConvergence {
                    iterations: iteration,
                    residual: r.norm(),
                });
            }
            alpha = rho / denom;

            let s = &r - alpha * &v;
            if s.norm() <= threshold {
                x += alpha * &p;
                return Ok(x);
            }

            let t = spmv(matrix, &s);
            let t_norm_sq = t.dot(&t);
            if t_norm_sq < f64::MIN_POSITIVE {
                return Err(NonConvergence {
                    iterations: iteration,
                    residual: s.norm(),
                });
            }
            omega = t.dot(&s) / t_norm_sq;

            x += alpha * &p + omega * &s;
            r = &s - omega * &t;
            if r.norm() <= threshold {
                return Ok(x);
            }
        }

        Err(NonConvergence {
            iterations: self.max_iterations,
            residual: r.norm(),
        })
    }
}

/// Direct dense LU factorization.
///
/// Densifies the matrix, so only sensible for small systems;
/// useful as a reference solver and for stiff or
/// near-singular systems iterative methods struggle with.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseLu;

impl LinearSolver for DenseLu {
    fn solve(
        &self,
        matrix: &nas::CsrMatrix<f64>,
        rhs: &na::DVector<f64>,
        _initial_guess: &na::DVector<f64>,
    ) -> Result<na::DVector<f64>, NonConvergence> {
        let mut dense = na::DMatrix::zeros(matrix.nrows(), matrix.ncols());
        for (i, j, v) in matrix.triplet_iter() {
            dense[(i, j)] += v;
        }
        na::LU::new(dense).solve(rhs).ok_or(NonConvergence {
            iterations: 0,
            residual: f64::INFINITY,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn csr_from_dense(dense: &na::DMatrix<f64>) -> nas::CsrMatrix<f64> {
        let mut coo = nas::CooMatrix::new(dense.nrows(), dense.ncols());
        for i in 0..dense.nrows() {
            for j in 0..dense.ncols() {
                if dense[(i, j)] != 0.0 {
                    coo.push(i, j, dense[(i, j)]);
                }
            }
        }
        nas::CsrMatrix::from(&coo)
    }

    fn nonsymmetric_system() -> (nas::CsrMatrix<f64>, na::DVector<f64>, na::DVector<f64>) {
        let a = na::dmatrix![
            4.0, -1.0, 0.0;
            -2.0, 5.0, -1.0;
            0.0, -1.0, 3.0;
        ];
        let x_exact = na::dvector![1.0, -2.0, 3.0];
        let b = &a * &x_exact;
        (csr_from_dense(&a), b, x_exact)
    }

    #[test]
    fn bicgstab_solves_a_nonsymmetric_system() {
        let (a, b, x_exact) = nonsymmetric_system();
        let x = BiCgStab::default()
            .solve(&a, &b, &na::DVector::zeros(3))
            .unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(x[i], x_exact[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn bicgstab_honors_the_iteration_cap() {
        let (a, b, _) = nonsymmetric_system();
        let solver = BiCgStab {
            tolerance: 1e-16,
            max_iterations: 1,
        };
        let err = solver.solve(&a, &b, &na::DVector::zeros(3)).unwrap_err();
        assert!(err.iterations <= 1);
        assert!(err.residual.is_finite());
    }

    #[test]
    fn zero_rhs_short_circuits() {
        let (a, _, _) = nonsymmetric_system();
        let x = BiCgStab::default()
            .solve(&a, &na::DVector::zeros(3), &na::dvector![1.0, 1.0, 1.0])
            .unwrap();
        assert_eq!(x, na::DVector::zeros(3));
    }

    #[test]
    fn dense_lu_matches_and_detects_singularity() {
        let (a, b, x_exact) = nonsymmetric_system();
        let x = DenseLu.solve(&a, &b, &na::DVector::zeros(3)).unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(x[i], x_exact[i], epsilon = 1e-12);
        }

        let singular = csr_from_dense(&na::dmatrix![
            1.0, 2.0;
            2.0, 4.0;
        ]);
        let err = DenseLu
            .solve(&singular, &na::dvector![1.0, 1.0], &na::DVector::zeros(2))
            .unwrap_err();
        assert_eq!(err.residual, f64::INFINITY);
    }
}
