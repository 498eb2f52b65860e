//! Boundary conditions: face subsets and the values imposed on them.

use fixedbitset as fb;

/// A subset of faces in a mesh, e.g. one edge of the domain.
///
/// Usually created with [`Mesh::faces_where`][crate::Mesh::faces_where]
/// from a predicate over face centroids,
/// or [`Mesh::exterior_faces`][crate::Mesh::exterior_faces].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaceSet {
    /// A bitset containing the indices of faces present in the subset.
    ///
    /// Iterate over the indices with `indices.ones()`.
    pub indices: fb::FixedBitSet,
}

impl FaceSet {
    #[inline]
    pub(crate) fn new(indices: fb::FixedBitSet) -> Self {
        Self { indices }
    }

    /// Create a face set from an iterator of face indices.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        Self::new(fb::FixedBitSet::from_iter(indices))
    }

    /// Create an empty face set.
    pub fn new_empty() -> Self {
        Self::new(fb::FixedBitSet::new())
    }

    /// Check whether a face is in the set.
    #[inline]
    pub fn contains(&self, face: usize) -> bool {
        self.indices.contains(face)
    }

    /// The number of faces in the set.
    pub fn len(&self) -> usize {
        self.indices.count_ones(..)
    }

    /// Whether the set contains no faces.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the face indices in the set.
    pub fn iter(&self) -> impl '_ + Iterator<Item = usize> {
        self.indices.ones()
    }

    /// The set of faces present in either operand.
    pub fn union(&self, other: &Self) -> Self {
        let mut bits = self.indices.clone();
        bits.union_with(&other.indices);
        Self::new(bits)
    }

    /// The set of faces present in both operands.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut bits = self.indices.clone();
        bits.intersect_with(&other.indices);
        Self::new(bits)
    }
}

/// What a boundary condition imposes on its faces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundaryKind {
    /// Dirichlet: the solution takes this value at the face centroid.
    /// The neighbor-cell stencil entry across the face
    /// is replaced by the fixed value, moved into the right-hand side.
    FixedValue(f64),
    /// Neumann: the outward diffusive flux density `Γ ∂φ/∂n` at the face.
    /// The flux is added to the right-hand side directly
    /// and no matrix coupling crosses the boundary.
    FixedFlux(f64),
}

/// A boundary condition: a face subset and the kind of constraint
/// imposed on it.
///
/// Terms consult the resolved set of boundary conditions
/// while assembling their boundary-face contributions.
#[derive(Clone, Debug)]
pub struct BoundaryCondition {
    /// The faces the condition applies to. Must be exterior faces.
    pub faces: FaceSet,
    /// The imposed constraint.
    pub kind: BoundaryKind,
}

impl BoundaryCondition {
    /// Fix the solution value on a set of faces (a Dirichlet condition).
    pub fn fixed_value(faces: FaceSet, value: f64) -> Self {
        Self {
            faces,
            kind: BoundaryKind::FixedValue(value),
        }
    }

    /// Fix the outward diffusive flux density on a set of faces
    /// (a Neumann condition). Faces without any condition
    /// default to zero flux.
    pub fn fixed_flux(faces: FaceSet, flux: f64) -> Self {
        Self {
            faces,
            kind: BoundaryKind::FixedFlux(flux),
        }
    }
}

/// Error in resolving a set of boundary conditions.
///
/// Both variants are fatal at equation-assembly time
/// and are detected before anything is written into the system.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum BoundaryError {
    /// Two conditions claim the same face with incompatible constraints.
    #[error("conflicting boundary conditions on face {face}")]
    Conflict {
        /// Index of the doubly-claimed face.
        face: usize,
    },
    /// A condition claims a face in the mesh interior.
    #[error("boundary condition applied to interior face {face}")]
    InteriorFace {
        /// Index of the interior face.
        face: usize,
    },
}

/// Per-face boundary condition lookup, resolved from a condition slice
/// once per assembly.
#[derive(Clone, Debug)]
pub(crate) struct FaceConditions {
    per_face: Vec<Option<BoundaryKind>>,
}

impl FaceConditions {
    /// Flatten a slice of boundary conditions into a per-face table,
    /// rejecting conflicting claims and conditions on interior faces.
    ///
    /// Two conditions may only overlap if they impose
    /// the identical kind and value.
    pub fn resolve(
        conditions: &[BoundaryCondition],
        face_count: usize,
        is_exterior: impl Fn(usize) -> bool,
    ) -> Result<Self, BoundaryError> {
        let mut per_face = vec![None; face_count];
        for bc in conditions {
            for face in bc.faces.iter() {
                if !is_exterior(face) {
                    return Err(BoundaryError::InteriorFace { face });
                }
                match per_face[face] {
                    None => per_face[face] = Some(bc.kind),
                    Some(existing) if existing == bc.kind => {}
                    Some(_) => return Err(BoundaryError::Conflict { face }),
                }
            }
        }
        Ok(Self { per_face })
    }

    #[inline]
    pub fn get(&self, face: usize) -> Option<BoundaryKind> {
        self.per_face[face]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_set_algebra() {
        let a = FaceSet::from_indices([0, 1, 2]);
        let b = FaceSet::from_indices([2, 3]);
        assert_eq!(a.union(&b), FaceSet::from_indices([0, 1, 2, 3]));
        assert_eq!(a.intersection(&b), FaceSet::from_indices([2]));
        assert!(FaceSet::new_empty().is_empty());
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn conflicting_conditions_are_rejected() {
        let bcs = [
            BoundaryCondition::fixed_value(FaceSet::from_indices([0, 1]), 1.0),
            BoundaryCondition::fixed_flux(FaceSet::from_indices([1, 2]), 0.0),
        ];
        let err = FaceConditions::resolve(&bcs, 4, |_| true).unwrap_err();
        assert_eq!(err, BoundaryError::Conflict { face: 1 });
    }

    #[test]
    fn identical_overlap_is_allowed() {
        let bcs = [
            BoundaryCondition::fixed_value(FaceSet::from_indices([0, 1]), 1.0),
            BoundaryCondition::fixed_value(FaceSet::from_indices([1]), 1.0),
        ];
        let resolved = FaceConditions::resolve(&bcs, 2, |_| true).unwrap();
        assert_eq!(resolved.get(1), Some(BoundaryKind::FixedValue(1.0)));
    }

    #[test]
    fn interior_faces_cannot_carry_conditions() {
        let bcs = [BoundaryCondition::fixed_value(FaceSet::from_indices([3]), 0.0)];
        let err = FaceConditions::resolve(&bcs, 4, |f| f != 3).unwrap_err();
        assert_eq!(err, BoundaryError::InteriorFace { face: 3 });
    }
}
