//! Field variables: values attached to the cells or faces of a mesh.

use nalgebra as na;

use std::rc::Rc;

use crate::mesh::Mesh;

/// Error in constructing a variable from an explicit value array.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("value array length {actual} does not match the mesh's {expected} elements")]
pub struct DimensionMismatch {
    /// The element count of the mesh domain.
    pub expected: usize,
    /// The length of the given value array.
    pub actual: usize,
}

/// Marker type indicating a [`Variable`] lives on mesh cells.
#[derive(Clone, Copy, Debug)]
pub struct Cell;

/// Marker type indicating a [`Variable`] lives on mesh faces.
#[derive(Clone, Copy, Debug)]
pub struct Face;

/// Trait allowing [`Variable`]s to be generic
/// over whether their values live on cells ([`Cell`])
/// or faces ([`Face`]).
///
/// Not intended to be implemented by users.
pub trait Location {
    /// The number of elements of this kind in a mesh.
    fn element_count<const DIM: usize>(mesh: &Mesh<DIM>) -> usize;
    /// The centroid of an element of this kind.
    fn centroid<const DIM: usize>(mesh: &Mesh<DIM>, index: usize) -> na::SVector<f64, DIM>;
}

impl Location for Cell {
    fn element_count<const DIM: usize>(mesh: &Mesh<DIM>) -> usize {
        mesh.cell_count()
    }

    fn centroid<const DIM: usize>(mesh: &Mesh<DIM>, index: usize) -> na::SVector<f64, DIM> {
        mesh.cell_centroid(index)
    }
}

impl Location for Face {
    fn element_count<const DIM: usize>(mesh: &Mesh<DIM>) -> usize {
        mesh.face_count()
    }

    fn centroid<const DIM: usize>(mesh: &Mesh<DIM>, index: usize) -> na::SVector<f64, DIM> {
        mesh.face_centroid(index)
    }
}

/// A field of scalar values over the cells or faces of a [`Mesh`],
/// with an optional one-generation-deep previous-time-step snapshot.
///
/// The cell-centered flavor [`CellVariable`] is what equations solve for;
/// the face-centered flavor [`FaceVariable`] is produced by interpolation
/// ([`face_value`][Self::face_value]).
/// Element-wise arithmetic (`+`, `-`, `*`, `/`, negation, scalar variants)
/// eagerly produces new variables on the same mesh.
#[derive(Clone)]
pub struct Variable<const DIM: usize, L = Cell> {
    /// The underlying vector of values, exposed for convenience.
    ///
    /// Note that changing the length of this vector at runtime
    /// breaks the invariant that it matches the mesh's element count
    /// and leads to a panic at the next assembly. Use with caution.
    pub values: na::DVector<f64>,
    mesh: Rc<Mesh<DIM>>,
    old: Option<na::DVector<f64>>,
    _marker: std::marker::PhantomData<L>,
}

/// A [`Variable`] with one value per mesh cell.
pub type CellVariable<const DIM: usize> = Variable<DIM, Cell>;
/// A [`Variable`] with one value per mesh face.
pub type FaceVariable<const DIM: usize> = Variable<DIM, Face>;

impl<const DIM: usize, L: Location> Variable<DIM, L> {
    /// Create a variable with the same value on every element.
    pub fn filled(mesh: &Rc<Mesh<DIM>>, value: f64) -> Self {
        Self {
            values: na::DVector::from_element(L::element_count(mesh), value),
            mesh: Rc::clone(mesh),
            old: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Create a variable from an explicit value array.
    ///
    /// The array length must equal the mesh's element count
    /// for this variable's domain; a mismatch is never
    /// silently broadcast or truncated.
    pub fn from_values(
        mesh: &Rc<Mesh<DIM>>,
        values: na::DVector<f64>,
    ) -> Result<Self, DimensionMismatch> {
        let expected = L::element_count(mesh);
        if values.len() != expected {
            return Err(DimensionMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self {
            values,
            mesh: Rc::clone(mesh),
            old: None,
            _marker: std::marker::PhantomData,
        })
    }

    /// Create a variable with values supplied by a function
    /// of the element centroid.
    pub fn from_fn(mesh: &Rc<Mesh<DIM>>, f: impl Fn(na::SVector<f64, DIM>) -> f64) -> Self {
        Self {
            values: na::DVector::from_fn(L::element_count(mesh), |i, _| f(L::centroid(mesh, i))),
            mesh: Rc::clone(mesh),
            old: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// The mesh this variable's values are attached to.
    #[inline]
    pub fn mesh(&self) -> &Rc<Mesh<DIM>> {
        &self.mesh
    }

    /// The number of values, equal to the mesh's element count.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the variable holds no values (never true for a valid mesh).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.len() == 0
    }

    /// Get the value at an element index.
    #[inline]
    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    /// Set the value at an element index.
    #[inline]
    pub fn set_value(&mut self, index: usize, value: f64) {
        self.values[index] = value;
    }

    /// The last-frozen snapshot of the values,
    /// or the current values if [`update_old`][Self::update_old]
    /// was never called (the caller has opted out of history).
    #[inline]
    pub fn old(&self) -> &na::DVector<f64> {
        self.old.as_ref().unwrap_or(&self.values)
    }

    /// Freeze the current values as the previous-time-step snapshot,
    /// overwriting any earlier snapshot.
    /// Only one generation of history is kept.
    pub fn update_old(&mut self) {
        self.old = Some(self.values.clone());
    }
}

impl<const DIM: usize> Variable<DIM, Cell> {
    /// Interpolate this cell variable to the mesh faces:
    /// distance-weighted linear interpolation
    /// between the two adjacent cells on interior faces,
    /// the owner cell's value on exterior faces.
    pub fn face_value(&self) -> Variable<DIM, Face> {
        let mesh = &self.mesh;
        let values = na::DVector::from_fn(mesh.face_count(), |f, _| {
            let (owner, neighbor) = mesh.face_cells(f);
            match neighbor {
                Some(n) => {
                    let w = mesh.face_weight(f);
                    w * self.values[owner] + (1.0 - w) * self.values[n]
                }
                None => self.values[owner],
            }
        });
        Variable {
            values,
            mesh: Rc::clone(mesh),
            old: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Reconstruct the cell-centered gradient of this variable
    /// with the Green-Gauss method:
    /// the volume-normalized sum of face-interpolated values
    /// times outward face area vectors.
    pub fn grad(&self) -> VectorCellVariable<DIM> {
        VectorCellVariable {
            values: green_gauss_gradient(&self.mesh, &self.values),
            mesh: Rc::clone(&self.mesh),
        }
    }

    /// Sample the value of the cell nearest to a query point.
    pub fn at(&self, point: na::SVector<f64, DIM>) -> f64 {
        self.values[self.mesh.nearest_cell(point)]
    }
}

/// Green-Gauss gradient reconstruction from cell values.
///
/// Shared between [`Variable::grad`] and the flux-limited
/// convection scheme, which needs gradients of the assembly-time iterate.
pub(crate) fn green_gauss_gradient<const DIM: usize>(
    mesh: &Mesh<DIM>,
    values: &na::DVector<f64>,
) -> Vec<na::SVector<f64, DIM>> {
    let mut grads = vec![na::SVector::<f64, DIM>::zeros(); mesh.cell_count()];
    for f in 0..mesh.face_count() {
        let (owner, neighbor) = mesh.face_cells(f);
        let area_normal = mesh.face_area(f) * mesh.face_normal(f);
        match neighbor {
            Some(n) => {
                let w = mesh.face_weight(f);
                let face_val = w * values[owner] + (1.0 - w) * values[n];
                grads[owner] += face_val * area_normal;
                grads[n] -= face_val * area_normal;
            }
            None => {
                grads[owner] += values[owner] * area_normal;
            }
        }
    }
    for (c, grad) in grads.iter_mut().enumerate() {
        *grad /= mesh.cell_volume(c);
    }
    grads
}

/// A field of vector values over the cells of a [`Mesh`],
/// as produced by [`Variable::grad`].
///
/// Supports element-wise vector arithmetic and projects back into
/// scalar [`CellVariable`]s through [`component`][Self::component]
/// and [`dot`][Self::dot].
#[derive(Clone)]
pub struct VectorCellVariable<const DIM: usize> {
    /// One vector per mesh cell.
    pub values: Vec<na::SVector<f64, DIM>>,
    mesh: Rc<Mesh<DIM>>,
}

impl<const DIM: usize> VectorCellVariable<DIM> {
    /// Create a vector variable with values supplied by a function
    /// of the cell centroid.
    pub fn from_fn(
        mesh: &Rc<Mesh<DIM>>,
        f: impl Fn(na::SVector<f64, DIM>) -> na::SVector<f64, DIM>,
    ) -> Self {
        Self {
            values: (0..mesh.cell_count())
                .map(|c| f(mesh.cell_centroid(c)))
                .collect(),
            mesh: Rc::clone(mesh),
        }
    }

    /// The mesh this variable's values are attached to.
    #[inline]
    pub fn mesh(&self) -> &Rc<Mesh<DIM>> {
        &self.mesh
    }

    /// The number of vectors, equal to the mesh's cell count.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the variable holds no values (never true for a valid mesh).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the vector at a cell index.
    #[inline]
    pub fn value(&self, index: usize) -> na::SVector<f64, DIM> {
        self.values[index]
    }

    /// One spatial component as a scalar cell variable.
    pub fn component(&self, axis: usize) -> Variable<DIM, Cell> {
        Variable {
            values: na::DVector::from_fn(self.values.len(), |c, _| self.values[c][axis]),
            mesh: Rc::clone(&self.mesh),
            old: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// The per-cell dot product with a uniform vector,
    /// e.g. the directional derivative `u·∇φ` of a gradient field.
    pub fn dot(&self, direction: &na::SVector<f64, DIM>) -> Variable<DIM, Cell> {
        Variable {
            values: na::DVector::from_fn(self.values.len(), |c, _| {
                self.values[c].dot(direction)
            }),
            mesh: Rc::clone(&self.mesh),
            old: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Sample the vector of the cell nearest to a query point.
    pub fn at(&self, point: na::SVector<f64, DIM>) -> na::SVector<f64, DIM> {
        self.values[self.mesh.nearest_cell(point)]
    }
}

impl<const DIM: usize> std::fmt::Debug for VectorCellVariable<DIM> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "vector variable over {} cells, values {:?}",
            self.values.len(),
            self.values
        )
    }
}

impl<const DIM: usize> PartialEq for VectorCellVariable<DIM> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<const DIM: usize> std::ops::Index<usize> for VectorCellVariable<DIM> {
    type Output = na::SVector<f64, DIM>;

    fn index(&self, index: usize) -> &na::SVector<f64, DIM> {
        &self.values[index]
    }
}

impl<const DIM: usize> std::ops::Add for &VectorCellVariable<DIM> {
    type Output = VectorCellVariable<DIM>;

    fn add(self, rhs: Self) -> VectorCellVariable<DIM> {
        assert_eq!(self.values.len(), rhs.values.len());
        VectorCellVariable {
            values: self
                .values
                .iter()
                .zip(&rhs.values)
                .map(|(a, b)| a + b)
                .collect(),
            mesh: Rc::clone(&self.mesh),
        }
    }
}

impl<const DIM: usize> std::ops::Add for VectorCellVariable<DIM> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        &self + &rhs
    }
}

impl<const DIM: usize> std::ops::Sub for &VectorCellVariable<DIM> {
    type Output = VectorCellVariable<DIM>;

    fn sub(self, rhs: Self) -> VectorCellVariable<DIM> {
        assert_eq!(self.values.len(), rhs.values.len());
        VectorCellVariable {
            values: self
                .values
                .iter()
                .zip(&rhs.values)
                .map(|(a, b)| a - b)
                .collect(),
            mesh: Rc::clone(&self.mesh),
        }
    }
}

impl<const DIM: usize> std::ops::Sub for VectorCellVariable<DIM> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        &self - &rhs
    }
}

impl<const DIM: usize> std::ops::Neg for &VectorCellVariable<DIM> {
    type Output = VectorCellVariable<DIM>;

    fn neg(self) -> VectorCellVariable<DIM> {
        VectorCellVariable {
            values: self.values.iter().map(|v| -v).collect(),
            mesh: Rc::clone(&self.mesh),
        }
    }
}

impl<const DIM: usize> std::ops::Neg for VectorCellVariable<DIM> {
    type Output = Self;

    fn neg(self) -> Self {
        -&self
    }
}

impl<const DIM: usize> std::ops::Mul<f64> for &VectorCellVariable<DIM> {
    type Output = VectorCellVariable<DIM>;

    fn mul(self, rhs: f64) -> VectorCellVariable<DIM> {
        VectorCellVariable {
            values: self.values.iter().map(|v| v * rhs).collect(),
            mesh: Rc::clone(&self.mesh),
        }
    }
}

impl<const DIM: usize> std::ops::Mul<f64> for VectorCellVariable<DIM> {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        &self * rhs
    }
}

impl<const DIM: usize> std::ops::Mul<VectorCellVariable<DIM>> for f64 {
    type Output = VectorCellVariable<DIM>;

    fn mul(self, rhs: VectorCellVariable<DIM>) -> VectorCellVariable<DIM> {
        rhs * self
    }
}

impl<const DIM: usize> std::ops::Div<f64> for &VectorCellVariable<DIM> {
    type Output = VectorCellVariable<DIM>;

    fn div(self, rhs: f64) -> VectorCellVariable<DIM> {
        VectorCellVariable {
            values: self.values.iter().map(|v| v / rhs).collect(),
            mesh: Rc::clone(&self.mesh),
        }
    }
}

impl<const DIM: usize> std::ops::Div<f64> for VectorCellVariable<DIM> {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        &self / rhs
    }
}

impl<const DIM: usize, L> std::fmt::Debug for Variable<DIM, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "variable over {} elements, values {:?}",
            self.values.len(),
            self.values
        )
    }
}

impl<const DIM: usize, L> PartialEq for Variable<DIM, L> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<const DIM: usize, L> std::ops::Index<usize> for Variable<DIM, L> {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

impl<const DIM: usize, L> std::ops::IndexMut<usize> for Variable<DIM, L> {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.values[index]
    }
}

// std trait impls for element-wise math.
// several permutations needed to also work with references;
// combining variables from different meshes is a logic error
// and panics on mismatched lengths.

impl<const DIM: usize, L> Variable<DIM, L> {
    fn with_values(&self, values: na::DVector<f64>) -> Self {
        Self {
            values,
            mesh: Rc::clone(&self.mesh),
            old: None,
            _marker: std::marker::PhantomData,
        }
    }
}

// Add

impl<const DIM: usize, L> std::ops::Add for Variable<DIM, L> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        &self + &rhs
    }
}

impl<const DIM: usize, L> std::ops::Add<&Variable<DIM, L>> for Variable<DIM, L> {
    type Output = Self;

    fn add(self, rhs: &Variable<DIM, L>) -> Self {
        &self + rhs
    }
}

impl<const DIM: usize, L> std::ops::Add for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn add(self, rhs: Self) -> Variable<DIM, L> {
        self.with_values(&self.values + &rhs.values)
    }
}

// Sub

impl<const DIM: usize, L> std::ops::Sub for Variable<DIM, L> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        &self - &rhs
    }
}

impl<const DIM: usize, L> std::ops::Sub<&Variable<DIM, L>> for Variable<DIM, L> {
    type Output = Self;

    fn sub(self, rhs: &Variable<DIM, L>) -> Self {
        &self - rhs
    }
}

impl<const DIM: usize, L> std::ops::Sub for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn sub(self, rhs: Self) -> Variable<DIM, L> {
        self.with_values(&self.values - &rhs.values)
    }
}

// Neg

impl<const DIM: usize, L> std::ops::Neg for Variable<DIM, L> {
    type Output = Self;

    fn neg(self) -> Self {
        -&self
    }
}

impl<const DIM: usize, L> std::ops::Neg for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn neg(self) -> Variable<DIM, L> {
        self.with_values(-&self.values)
    }
}

// element-wise Mul / Div

impl<const DIM: usize, L> std::ops::Mul for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn mul(self, rhs: Self) -> Variable<DIM, L> {
        self.with_values(self.values.component_mul(&rhs.values))
    }
}

impl<const DIM: usize, L> std::ops::Mul for Variable<DIM, L> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        &self * &rhs
    }
}

impl<const DIM: usize, L> std::ops::Div for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn div(self, rhs: Self) -> Variable<DIM, L> {
        self.with_values(self.values.component_div(&rhs.values))
    }
}

impl<const DIM: usize, L> std::ops::Div for Variable<DIM, L> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        &self / &rhs
    }
}

// scalar ops

impl<const DIM: usize, L> std::ops::Mul<f64> for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn mul(self, rhs: f64) -> Variable<DIM, L> {
        self.with_values(&self.values * rhs)
    }
}

impl<const DIM: usize, L> std::ops::Mul<f64> for Variable<DIM, L> {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        &self * rhs
    }
}

impl<const DIM: usize, L> std::ops::Mul<Variable<DIM, L>> for f64 {
    type Output = Variable<DIM, L>;

    fn mul(self, rhs: Variable<DIM, L>) -> Variable<DIM, L> {
        rhs * self
    }
}

impl<const DIM: usize, L> std::ops::Mul<&Variable<DIM, L>> for f64 {
    type Output = Variable<DIM, L>;

    fn mul(self, rhs: &Variable<DIM, L>) -> Variable<DIM, L> {
        rhs * self
    }
}

impl<const DIM: usize, L> std::ops::Div<f64> for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn div(self, rhs: f64) -> Variable<DIM, L> {
        self.with_values(&self.values / rhs)
    }
}

impl<const DIM: usize, L> std::ops::Div<f64> for Variable<DIM, L> {
    type Output = Self;

    fn div(self, rhs: f64) -> Self {
        &self / rhs
    }
}

impl<const DIM: usize, L> std::ops::Add<f64> for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn add(self, rhs: f64) -> Variable<DIM, L> {
        self.with_values(self.values.add_scalar(rhs))
    }
}

impl<const DIM: usize, L> std::ops::Add<f64> for Variable<DIM, L> {
    type Output = Self;

    fn add(self, rhs: f64) -> Self {
        &self + rhs
    }
}

impl<const DIM: usize, L> std::ops::Sub<f64> for &Variable<DIM, L> {
    type Output = Variable<DIM, L>;

    fn sub(self, rhs: f64) -> Variable<DIM, L> {
        self.with_values(self.values.add_scalar(-rhs))
    }
}

impl<const DIM: usize, L> std::ops::Sub<f64> for Variable<DIM, L> {
    type Output = Self;

    fn sub(self, rhs: f64) -> Self {
        &self - rhs
    }
}

// AddAssign / SubAssign

impl<const DIM: usize, L> std::ops::AddAssign<&Variable<DIM, L>> for Variable<DIM, L> {
    fn add_assign(&mut self, rhs: &Variable<DIM, L>) {
        self.values += &rhs.values;
    }
}

impl<const DIM: usize, L> std::ops::SubAssign<&Variable<DIM, L>> for Variable<DIM, L> {
    fn sub_assign(&mut self, rhs: &Variable<DIM, L>) {
        self.values -= &rhs.values;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn line_mesh() -> Rc<Mesh<1>> {
        Rc::new(Mesh::grid_1d(4, 0.5).unwrap())
    }

    #[test]
    fn snapshot_semantics() {
        let mesh = line_mesh();
        let mut var = Variable::<1>::filled(&mesh, 1.0);

        // never frozen: old() falls back to the current values
        assert_eq!(var.old(), &var.values);

        var.update_old();
        var.set_value(0, 5.0);
        assert_eq!(var.old()[0], 1.0);
        assert_eq!(var.value(0), 5.0);

        // a second freeze overwrites, it does not accumulate
        var.update_old();
        assert_eq!(var.old()[0], 5.0);
    }

    #[test]
    fn arithmetic_is_element_wise() {
        let mesh = line_mesh();
        let a = Variable::<1>::from_values(&mesh, na::dvector![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Variable::<1>::filled(&mesh, 2.0);

        assert_eq!((&a + &b).values, na::dvector![3.0, 4.0, 5.0, 6.0]);
        assert_eq!((&a - &b).values, na::dvector![-1.0, 0.0, 1.0, 2.0]);
        assert_eq!((&a * &b).values, na::dvector![2.0, 4.0, 6.0, 8.0]);
        assert_eq!((&a / &b).values, na::dvector![0.5, 1.0, 1.5, 2.0]);
        assert_eq!((2.0 * &a).values, (&a + &a).values);
        assert_eq!((-&a).values, na::dvector![-1.0, -2.0, -3.0, -4.0]);
        assert_eq!((&a + 1.0).values, na::dvector![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn arithmetic_consumes_owned_operands() {
        // the by-value operator impls must accept moved variables,
        // not just references
        let mesh = line_mesh();
        let a = Variable::<1>::from_values(&mesh, na::dvector![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Variable::<1>::filled(&mesh, 2.0);

        assert_eq!((a.clone() + b.clone()).values, na::dvector![3.0, 4.0, 5.0, 6.0]);
        assert_eq!((a.clone() - &b).values, na::dvector![-1.0, 0.0, 1.0, 2.0]);
        assert_eq!((-a.clone()).values, na::dvector![-1.0, -2.0, -3.0, -4.0]);
        assert_eq!((a.clone() * 2.0).values, na::dvector![2.0, 4.0, 6.0, 8.0]);
        assert_eq!((a.clone() / 2.0).values, na::dvector![0.5, 1.0, 1.5, 2.0]);
        assert_eq!((a.clone() + 1.0).values, na::dvector![2.0, 3.0, 4.0, 5.0]);
        assert_eq!((a / b).values, na::dvector![0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mesh = line_mesh();
        let err = Variable::<1, Cell>::from_values(&mesh, na::dvector![1.0, 2.0]).unwrap_err();
        assert_eq!(err, DimensionMismatch { expected: 4, actual: 2 });
    }

    #[test]
    fn face_values_interpolate_linearly() {
        let mesh = line_mesh();
        // cell centers at 0.25, 0.75, 1.25, 1.75: values x^1
        let var = Variable::<1>::from_fn(&mesh, |c| c.x);
        let fv = var.face_value();
        assert_eq!(fv.len(), 5);
        // interior faces at 0.5, 1.0, 1.5
        assert_abs_diff_eq!(fv.value(1), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fv.value(2), 1.0, epsilon = 1e-12);
        // exterior faces copy the owner cell
        assert_abs_diff_eq!(fv.value(0), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(fv.value(4), 1.75, epsilon = 1e-12);
    }

    #[test]
    fn gradient_of_linear_field_is_constant_in_the_interior() {
        let mesh = Rc::new(Mesh::grid_2d(5, 5, 1.0, 1.0).unwrap());
        let var = Variable::<2>::from_fn(&mesh, |c| 3.0 * c.x);
        let grads = var.grad();
        // interior cells see the exact gradient; boundary cells are
        // polluted by the one-sided exterior face values
        let interior = mesh.nearest_cell(na::Vector2::new(2.5, 2.5));
        assert_abs_diff_eq!(grads[interior].x, 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grads[interior].y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn gradient_fields_project_and_combine() {
        let mesh = Rc::new(Mesh::grid_2d(5, 5, 1.0, 1.0).unwrap());
        let fx = Variable::<2>::from_fn(&mesh, |c| 3.0 * c.x);
        let fy = Variable::<2>::from_fn(&mesh, |c| 2.0 * c.y);
        let grad = fx.grad() + fy.grad();

        let interior = mesh.nearest_cell(na::Vector2::new(2.5, 2.5));
        assert_abs_diff_eq!(grad.component(0).value(interior), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grad.component(1).value(interior), 2.0, epsilon = 1e-12);
        // directional derivative u·∇φ back as a scalar field
        let directional = grad.dot(&na::Vector2::new(1.0, -1.0));
        assert_abs_diff_eq!(directional.value(interior), 1.0, epsilon = 1e-12);
        // sampling and scaling
        assert_abs_diff_eq!(
            (2.0 * grad).at(na::Vector2::new(2.5, 2.5)).x,
            6.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn nearest_cell_sampling() {
        let mesh = line_mesh();
        let var = Variable::<1>::from_fn(&mesh, |c| c.x * 10.0);
        assert_abs_diff_eq!(var.at(na::Vector1::new(0.3)), 2.5, epsilon = 1e-12);
    }
}
