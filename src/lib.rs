//! `peclet` is a finite-volume discretization engine
//! for partial differential equations
//! on structured and unstructured meshes.
//!
//! A PDE is described as an algebraic combination
//! of discretization [`Term`]s (transient, diffusion, convection, source)
//! acting on field [`Variable`]s defined over a [`Mesh`].
//! Assembling the resulting [`Equation`] produces a sparse linear system
//! which a [`LinearSolver`] drives towards the solution
//! over one time step or to steady state.
//!
//! # Example
//!
//! Steady 1D convection-diffusion with Dirichlet boundaries:
//! ```
//! use peclet::{
//!     BiCgStab, BoundaryCondition, ConvectionScheme, Mesh, Term, Variable,
//! };
//! use std::rc::Rc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mesh = Rc::new(Mesh::grid_1d(100, 0.1)?);
//! let mut phi = Variable::filled(&mesh, 0.0);
//!
//! let bcs = [
//!     BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x <= 0.0), 0.0),
//!     BoundaryCondition::fixed_value(mesh.faces_where(|c| c.x >= 10.0), 1.0),
//! ];
//!
//! let velocity = peclet::Vec1::new(10.0);
//! let eq = Term::convection(velocity, ConvectionScheme::Exponential, 1.0)
//!     - Term::diffusion(1.0);
//!
//! let residual = eq.solve(&mut phi, &bcs, &BiCgStab::default(), None)?;
//! assert!(residual.is_finite());
//! # Ok(())
//! # }
//! ```
//!
//! # Sweeps
//!
//! [`Equation::solve`] performs exactly one assemble-solve-update cycle,
//! which is enough for linear problems.
//! Nonlinear problems (field-dependent coefficients, flux limiters)
//! are iterated by calling [`Equation::sweep`] in a caller-owned loop
//! and watching the returned residual;
//! no outer convergence policy is built in.

#![warn(missing_docs)]

pub mod mesh;
#[doc(inline)]
pub use mesh::{ConstructionError, Mesh, UniformGridMesh};

pub mod variable;
#[doc(inline)]
pub use variable::{
    Cell, CellVariable, DimensionMismatch, Face, FaceVariable, Location, Variable,
    VectorCellVariable,
};

pub mod boundary;
#[doc(inline)]
pub use boundary::{BoundaryCondition, BoundaryError, BoundaryKind, FaceSet};

pub mod term;
#[doc(inline)]
pub use term::{Coefficient, ConvectionScheme, Term};

pub mod equation;
#[doc(inline)]
pub use equation::{AssembledSystem, Equation, EquationError, System};

pub mod solver;
#[doc(inline)]
pub use solver::{BiCgStab, DenseLu, LinearSolver, NonConvergence};

pub mod partition;
#[doc(inline)]
pub use partition::Partition;

// nalgebra re-exports of common types for convenience

pub use nalgebra as na;
/// Type alias for a 1D `nalgebra` vector.
pub type Vec1 = na::Vector1<f64>;
/// Type alias for a 2D `nalgebra` vector.
pub type Vec2 = na::Vector2<f64>;
/// Type alias for a 3D `nalgebra` vector.
pub type Vec3 = na::Vector3<f64>;
