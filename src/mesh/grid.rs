//! Uniform Cartesian grids.
//!
//! Where the general [`UnstructuredMesh`][super::UnstructuredMesh]
//! stores explicit per-element metric arrays,
//! a uniform grid stores only its origin, per-axis spacing and cell counts
//! and derives every metric as a closed-form expression in the grid index.

use nalgebra as na;

use super::ConstructionError;

/// A `DIM`-dimensional axis-aligned grid of identical cells.
///
/// Cells are numbered in row-major order with axis 0 varying fastest.
/// Faces are numbered per normal axis:
/// first all faces normal to axis 0, then axis 1, and so on;
/// along its normal axis each block has one more slot than there are cells,
/// so a 1D grid of `nx` cells has `nx + 1` faces.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformGridMesh<const DIM: usize> {
    origin: na::SVector<f64, DIM>,
    spacing: [f64; DIM],
    shape: [usize; DIM],
}

impl<const DIM: usize> UniformGridMesh<DIM> {
    /// Create a grid from an origin corner, per-axis spacing
    /// and per-axis cell counts.
    ///
    /// Every axis must have positive spacing and at least one cell.
    pub fn new(
        origin: na::SVector<f64, DIM>,
        spacing: [f64; DIM],
        shape: [usize; DIM],
    ) -> Result<Self, ConstructionError> {
        if spacing.iter().any(|&h| !(h > 0.0)) {
            return Err(ConstructionError::NonPositiveSpacing);
        }
        if shape.iter().any(|&n| n == 0) {
            return Err(ConstructionError::EmptyAxis);
        }
        Ok(Self {
            origin,
            spacing,
            shape,
        })
    }

    /// The low corner of the grid.
    #[inline]
    pub fn origin(&self) -> na::SVector<f64, DIM> {
        self.origin
    }

    /// Per-axis cell spacing.
    #[inline]
    pub fn spacing(&self) -> [f64; DIM] {
        self.spacing
    }

    /// Per-axis cell counts.
    #[inline]
    pub fn shape(&self) -> [usize; DIM] {
        self.shape
    }

    //
    // index arithmetic
    //

    fn decode_cell(&self, cell: usize) -> [usize; DIM] {
        let mut rest = cell;
        let mut coords = [0; DIM];
        for axis in 0..DIM {
            coords[axis] = rest % self.shape[axis];
            rest /= self.shape[axis];
        }
        coords
    }

    fn encode_cell(&self, coords: [usize; DIM]) -> usize {
        let mut idx = 0;
        let mut stride = 1;
        for axis in 0..DIM {
            idx += coords[axis] * stride;
            stride *= self.shape[axis];
        }
        idx
    }

    /// Number of faces whose normal lies along `axis`.
    fn face_block_len(&self, axis: usize) -> usize {
        self.shape
            .iter()
            .enumerate()
            .map(|(a, &n)| if a == axis { n + 1 } else { n })
            .product()
    }

    /// Split a global face index into its normal axis
    /// and its grid coordinates (the normal-axis coordinate
    /// ranges over `0..=n` slots, the rest over `0..n`).
    fn decode_face(&self, face: usize) -> (usize, [usize; DIM]) {
        let mut rest = face;
        for axis in 0..DIM {
            let block = self.face_block_len(axis);
            if rest < block {
                let mut coords = [0; DIM];
                for a in 0..DIM {
                    let extent = if a == axis {
                        self.shape[a] + 1
                    } else {
                        self.shape[a]
                    };
                    coords[a] = rest % extent;
                    rest /= extent;
                }
                return (axis, coords);
            }
            rest -= block;
        }
        panic!("face index {face} out of bounds");
    }

    fn encode_face(&self, axis: usize, coords: [usize; DIM]) -> usize {
        let offset: usize = (0..axis).map(|a| self.face_block_len(a)).sum();
        let mut idx = 0;
        let mut stride = 1;
        for a in 0..DIM {
            let extent = if a == axis {
                self.shape[a] + 1
            } else {
                self.shape[a]
            };
            idx += coords[a] * stride;
            stride *= extent;
        }
        offset + idx
    }

    //
    // counts
    //

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Total number of faces across all normal-axis blocks.
    #[inline]
    pub fn face_count(&self) -> usize {
        (0..DIM).map(|a| self.face_block_len(a)).sum()
    }

    /// Total number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.shape.iter().map(|&n| n + 1).product()
    }

    //
    // per-face metrics
    //

    /// Owner and optional neighbor cell of a face.
    /// The owner is the lower-indexed cell along the normal axis.
    pub fn face_cells(&self, face: usize) -> (usize, Option<usize>) {
        let (axis, coords) = self.decode_face(face);
        let slot = coords[axis];
        let cell_at = |i: usize| {
            let mut c = coords;
            c[axis] = i;
            self.encode_cell(c)
        };
        if slot == 0 {
            (cell_at(0), None)
        } else if slot == self.shape[axis] {
            (cell_at(slot - 1), None)
        } else {
            (cell_at(slot - 1), Some(cell_at(slot)))
        }
    }

    /// Face area: the product of the spacings on the other axes.
    pub fn face_area(&self, face: usize) -> f64 {
        let (axis, _) = self.decode_face(face);
        self.spacing
            .iter()
            .enumerate()
            .filter(|&(a, _)| a != axis)
            .map(|(_, &h)| h)
            .product()
    }

    /// Unit face normal: the normal axis direction,
    /// negated on the low exterior face so it points outward.
    pub fn face_normal(&self, face: usize) -> na::SVector<f64, DIM> {
        let (axis, coords) = self.decode_face(face);
        let mut n = na::SVector::<f64, DIM>::zeros();
        n[axis] = if coords[axis] == 0 { -1.0 } else { 1.0 };
        n
    }

    /// Face centroid.
    pub fn face_centroid(&self, face: usize) -> na::SVector<f64, DIM> {
        let (axis, coords) = self.decode_face(face);
        let mut c = self.origin;
        for a in 0..DIM {
            c[a] += if a == axis {
                coords[a] as f64 * self.spacing[a]
            } else {
                (coords[a] as f64 + 0.5) * self.spacing[a]
            };
        }
        c
    }

    /// Centroid-to-centroid distance across a face:
    /// the normal-axis spacing on interior faces, half of it on the boundary.
    pub fn face_distance(&self, face: usize) -> f64 {
        let (axis, coords) = self.decode_face(face);
        let slot = coords[axis];
        if slot == 0 || slot == self.shape[axis] {
            0.5 * self.spacing[axis]
        } else {
            self.spacing[axis]
        }
    }

    /// Owner weight for face interpolation:
    /// the arithmetic mean on interior faces,
    /// the owner value alone on exterior faces.
    pub fn face_weight(&self, face: usize) -> f64 {
        let (axis, coords) = self.decode_face(face);
        let slot = coords[axis];
        if slot == 0 || slot == self.shape[axis] {
            1.0
        } else {
            0.5
        }
    }

    //
    // per-cell metrics
    //

    /// Cell volume, identical for every cell.
    #[inline]
    pub fn cell_volume(&self) -> f64 {
        self.spacing.iter().product()
    }

    /// Cell centroid.
    pub fn cell_centroid(&self, cell: usize) -> na::SVector<f64, DIM> {
        let coords = self.decode_cell(cell);
        let mut c = self.origin;
        for a in 0..DIM {
            c[a] += (coords[a] as f64 + 0.5) * self.spacing[a];
        }
        c
    }

    /// The `2 * DIM` faces incident to a cell,
    /// ordered low/high per axis.
    pub fn cell_faces(&self, cell: usize) -> Vec<usize> {
        let coords = self.decode_cell(cell);
        let mut faces = Vec::with_capacity(2 * DIM);
        for axis in 0..DIM {
            let mut low = coords;
            faces.push(self.encode_face(axis, low));
            low[axis] += 1;
            faces.push(self.encode_face(axis, low));
        }
        faces
    }

    /// Index of the cell whose center is nearest to a point,
    /// clamped to the grid at either end of each axis.
    pub fn nearest_cell(&self, point: na::SVector<f64, DIM>) -> usize {
        let mut coords = [0; DIM];
        for a in 0..DIM {
            let t = ((point[a] - self.origin[a]) / self.spacing[a]).floor();
            coords[a] = (t as isize).clamp(0, self.shape[a] as isize - 1) as usize;
        }
        self.encode_cell(coords)
    }

    pub(super) fn rescale(&mut self, factor: f64) {
        self.origin *= factor;
        for h in &mut self.spacing {
            *h *= factor;
        }
    }
}
