//! The spatial domain a PDE is discretized over:
//! cells, faces, vertices, and the metrics derived from them.

/// Low-level construction of unstructured meshes and corresponding tests.
mod construction;
/// Uniform Cartesian grids with closed-form metrics.
mod grid;

pub use grid::UniformGridMesh;

//

use fixedbitset as fb;
use nalgebra as na;

use crate::boundary::FaceSet;

/// Error in constructing or rescaling a mesh.
///
/// All of these are fatal and reported before the mesh can be used;
/// a successfully constructed mesh is guaranteed to have
/// positive cell volumes, nonzero face areas and consistent connectivity.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum ConstructionError {
    /// The mesh has no cells, faces or vertices.
    #[error("mesh must have at least one cell, face and vertex")]
    Empty,
    /// A face refers to a vertex index outside the vertex array.
    #[error("vertex index {vertex} out of range on face {face}")]
    VertexOutOfRange {
        /// Index of the offending face.
        face: usize,
        /// The out-of-range vertex index.
        vertex: usize,
    },
    /// A cell refers to a face index outside the face array.
    #[error("face index {face} out of range on cell {cell}")]
    FaceOutOfRange {
        /// Index of the offending cell.
        cell: usize,
        /// The out-of-range face index.
        face: usize,
    },
    /// A face has the wrong number of vertices for the mesh dimension.
    #[error("face {face} has the wrong number of vertices for a {dim}D mesh")]
    BadFaceArity {
        /// Index of the offending face.
        face: usize,
        /// Dimension of the mesh.
        dim: usize,
    },
    /// A cell lists the same face twice.
    #[error("cell {cell} lists face {face} more than once")]
    DuplicateFace {
        /// Index of the offending cell.
        cell: usize,
        /// The repeated face index.
        face: usize,
    },
    /// More than two cells claim the same face.
    #[error("face {face} is shared by more than two cells")]
    TooManyCells {
        /// Index of the offending face.
        face: usize,
    },
    /// A face is not referenced by any cell.
    #[error("face {face} is not referenced by any cell")]
    OrphanFace {
        /// Index of the offending face.
        face: usize,
    },
    /// A face has (numerically) zero area, i.e. the mesh is degenerate.
    #[error("face {face} has zero area")]
    ZeroAreaFace {
        /// Index of the offending face.
        face: usize,
    },
    /// A cell has non-positive volume, i.e. the mesh is degenerate.
    #[error("cell {cell} has non-positive volume")]
    NonPositiveVolume {
        /// Index of the offending cell.
        cell: usize,
    },
    /// A grid axis was given a non-positive spacing.
    #[error("grid spacing must be positive on every axis")]
    NonPositiveSpacing,
    /// A grid axis was given zero cells.
    #[error("grid must have at least one cell on every axis")]
    EmptyAxis,
    /// A rescale was attempted with a non-positive factor.
    #[error("scale factor must be positive, got {0}")]
    NonPositiveScale(f64),
}

/// Cell-face adjacency of an unstructured mesh.
///
/// Every face has an owner cell and, if it is an interior face,
/// a neighbor cell. Exterior faces have no neighbor;
/// the `Option` is the sentinel, so the "second cell" of a boundary face
/// can never be dereferenced by accident.
#[derive(Clone, Debug)]
pub struct MeshTopology {
    /// Per face, the owning cell and the optional neighbor cell.
    pub face_cells: Vec<(usize, Option<usize>)>,
    /// Flattened per-cell face lists; cell `c` owns
    /// `cell_faces[cell_face_offsets[c]..cell_face_offsets[c + 1]]`.
    pub cell_faces: Vec<usize>,
    /// Offsets into [`cell_faces`][Self::cell_faces], length `cell_count + 1`.
    pub cell_face_offsets: Vec<usize>,
    /// Flattened per-face vertex lists, same layout as the cell-face arrays.
    pub face_vertices: Vec<usize>,
    /// Offsets into [`face_vertices`][Self::face_vertices].
    pub face_vertex_offsets: Vec<usize>,
    /// Faces on the exterior of the mesh.
    pub exterior: fb::FixedBitSet,
    /// Number of vertices in the mesh.
    pub vertex_count: usize,
}

/// Metrics derived from a mesh's topology and vertex coordinates.
///
/// Face normals are unit length and point from the owner cell
/// towards the neighbor cell, or outward on exterior faces.
#[derive(Clone, Debug)]
pub struct MeshGeometry<const DIM: usize> {
    /// Vertex coordinates.
    pub vertices: Vec<na::SVector<f64, DIM>>,
    /// Face areas (edge lengths in 2D, polygon areas in 3D).
    pub face_areas: Vec<f64>,
    /// Unit face normals, oriented owner to neighbor / outward.
    pub face_normals: Vec<na::SVector<f64, DIM>>,
    /// Face centroids.
    pub face_centroids: Vec<na::SVector<f64, DIM>>,
    /// Diffusion length scale per face:
    /// owner-to-neighbor centroid distance on interior faces,
    /// owner-centroid-to-face-centroid distance on exterior faces.
    pub face_distances: Vec<f64>,
    /// Weight of the owner cell's value
    /// in linear interpolation to the face centroid.
    pub face_weights: Vec<f64>,
    /// Cell volumes, positive by construction.
    pub cell_volumes: Vec<f64>,
    /// Cell centroids.
    pub cell_centroids: Vec<na::SVector<f64, DIM>>,
}

/// An unstructured mesh with explicitly stored topology and geometry.
///
/// Usually constructed through [`Mesh::unstructured`].
#[derive(Clone, Debug)]
pub struct UnstructuredMesh<const DIM: usize> {
    /// Cell-face-vertex adjacency.
    pub topology: MeshTopology,
    /// Metrics computed from the adjacency and vertex coordinates.
    pub geometry: MeshGeometry<DIM>,
}

/// The queryable spatial domain of a simulation.
///
/// Comes in two flavors with the same external contract:
/// an [`UnstructuredMesh`] storing explicit per-element metrics,
/// and a [`UniformGridMesh`] that stores only origin, spacing and cell counts
/// and computes every metric with O(1) closed-form arithmetic.
/// The uniform variant exists purely as a performance specialization
/// for the overwhelmingly common regular-grid case.
///
/// A mesh is immutable after construction except for
/// [`rescale`][Self::rescale], and is meant to be shared
/// behind an [`Rc`][std::rc::Rc] by any number of [`Variable`][crate::Variable]s.
#[derive(Clone, Debug)]
pub enum Mesh<const DIM: usize> {
    /// Explicit vertex coordinates and connectivity lists.
    Unstructured(UnstructuredMesh<DIM>),
    /// Parametric origin/spacing/counts grid.
    Uniform(UniformGridMesh<DIM>),
}

impl<const DIM: usize> Mesh<DIM> {
    /// Construct an unstructured mesh from raw vertex coordinates,
    /// per-face vertex lists and per-cell face lists.
    ///
    /// The first cell referencing a face becomes its owner.
    /// Fails fast on degenerate geometry (zero-area faces,
    /// non-positive cell volumes) and inconsistent connectivity.
    pub fn unstructured(
        vertices: Vec<na::SVector<f64, DIM>>,
        face_vertices: Vec<Vec<usize>>,
        cell_faces: Vec<Vec<usize>>,
    ) -> Result<Self, ConstructionError> {
        construction::build_unstructured(vertices, face_vertices, cell_faces)
            .map(Self::Unstructured)
    }

    /// Construct a uniform grid from an origin corner,
    /// per-axis spacing and per-axis cell counts.
    pub fn uniform(
        origin: na::SVector<f64, DIM>,
        spacing: [f64; DIM],
        shape: [usize; DIM],
    ) -> Result<Self, ConstructionError> {
        UniformGridMesh::new(origin, spacing, shape).map(Self::Uniform)
    }

    /// Get the number of cells in the mesh.
    #[inline]
    pub fn cell_count(&self) -> usize {
        match self {
            Self::Unstructured(m) => m.geometry.cell_volumes.len(),
            Self::Uniform(g) => g.cell_count(),
        }
    }

    /// Get the number of faces in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        match self {
            Self::Unstructured(m) => m.topology.face_cells.len(),
            Self::Uniform(g) => g.face_count(),
        }
    }

    /// Get the number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Unstructured(m) => m.topology.vertex_count,
            Self::Uniform(g) => g.vertex_count(),
        }
    }

    /// Get the owner cell and optional neighbor cell of a face.
    ///
    /// The neighbor is `None` exactly when the face is exterior.
    #[inline]
    pub fn face_cells(&self, face: usize) -> (usize, Option<usize>) {
        match self {
            Self::Unstructured(m) => m.topology.face_cells[face],
            Self::Uniform(g) => g.face_cells(face),
        }
    }

    /// Get the area of a face.
    #[inline]
    pub fn face_area(&self, face: usize) -> f64 {
        match self {
            Self::Unstructured(m) => m.geometry.face_areas[face],
            Self::Uniform(g) => g.face_area(face),
        }
    }

    /// Get the unit normal of a face,
    /// pointing from the owner cell towards the neighbor
    /// (outward on exterior faces).
    #[inline]
    pub fn face_normal(&self, face: usize) -> na::SVector<f64, DIM> {
        match self {
            Self::Unstructured(m) => m.geometry.face_normals[face],
            Self::Uniform(g) => g.face_normal(face),
        }
    }

    /// Get the centroid of a face.
    #[inline]
    pub fn face_centroid(&self, face: usize) -> na::SVector<f64, DIM> {
        match self {
            Self::Unstructured(m) => m.geometry.face_centroids[face],
            Self::Uniform(g) => g.face_centroid(face),
        }
    }

    /// Get the diffusion length scale across a face:
    /// the distance between the two adjacent cell centroids on interior faces,
    /// or from the owner centroid to the face centroid on exterior faces.
    #[inline]
    pub fn face_distance(&self, face: usize) -> f64 {
        match self {
            Self::Unstructured(m) => m.geometry.face_distances[face],
            Self::Uniform(g) => g.face_distance(face),
        }
    }

    /// Get the weight of the owner cell's value
    /// when linearly interpolating cell values to the face centroid.
    #[inline]
    pub fn face_weight(&self, face: usize) -> f64 {
        match self {
            Self::Unstructured(m) => m.geometry.face_weights[face],
            Self::Uniform(g) => g.face_weight(face),
        }
    }

    /// Check whether a face lies on the exterior of the mesh.
    #[inline]
    pub fn is_exterior(&self, face: usize) -> bool {
        self.face_cells(face).1.is_none()
    }

    /// Get the set of all exterior faces.
    pub fn exterior_faces(&self) -> FaceSet {
        match self {
            Self::Unstructured(m) => FaceSet::new(m.topology.exterior.clone()),
            Self::Uniform(g) => {
                FaceSet::from_indices((0..g.face_count()).filter(|&f| g.face_cells(f).1.is_none()))
            }
        }
    }

    /// Get the volume of a cell, positive by construction.
    #[inline]
    pub fn cell_volume(&self, cell: usize) -> f64 {
        match self {
            Self::Unstructured(m) => m.geometry.cell_volumes[cell],
            Self::Uniform(g) => g.cell_volume(),
        }
    }

    /// Get the centroid of a cell.
    #[inline]
    pub fn cell_centroid(&self, cell: usize) -> na::SVector<f64, DIM> {
        match self {
            Self::Unstructured(m) => m.geometry.cell_centroids[cell],
            Self::Uniform(g) => g.cell_centroid(cell),
        }
    }

    /// Get the indices of the faces incident to a cell.
    pub fn cell_faces(&self, cell: usize) -> Vec<usize> {
        match self {
            Self::Unstructured(m) => {
                let t = &m.topology;
                t.cell_faces[t.cell_face_offsets[cell]..t.cell_face_offsets[cell + 1]].to_vec()
            }
            Self::Uniform(g) => g.cell_faces(cell),
        }
    }

    /// Create a set of the faces whose centroid passes the given predicate,
    /// e.g. "faces on the left edge" for boundary conditions.
    pub fn faces_where(&self, pred: impl Fn(na::SVector<f64, DIM>) -> bool) -> FaceSet {
        FaceSet::from_indices((0..self.face_count()).filter(|&f| pred(self.face_centroid(f))))
    }

    /// Find the index of the cell whose centroid is nearest to a query point.
    ///
    /// O(1) index arithmetic on uniform grids
    /// (clamped to the grid at either end of each axis),
    /// a linear search on unstructured meshes.
    pub fn nearest_cell(&self, point: na::SVector<f64, DIM>) -> usize {
        match self {
            Self::Uniform(g) => g.nearest_cell(point),
            Self::Unstructured(m) => {
                let mut best = 0;
                let mut best_dist = f64::INFINITY;
                for (c, centroid) in m.geometry.cell_centroids.iter().enumerate() {
                    let dist = (centroid - point).norm_squared();
                    if dist < best_dist {
                        best = c;
                        best_dist = dist;
                    }
                }
                best
            }
        }
    }

    /// Uniformly rescale the mesh:
    /// lengths are multiplied by `factor`, areas by `factor^(DIM-1)`
    /// and volumes by `factor^DIM`.
    ///
    /// This is the only mutation a mesh supports after construction,
    /// so it must happen before the mesh is shared with variables.
    pub fn rescale(&mut self, factor: f64) -> Result<(), ConstructionError> {
        if !(factor > 0.0) {
            return Err(ConstructionError::NonPositiveScale(factor));
        }
        match self {
            Self::Uniform(g) => g.rescale(factor),
            Self::Unstructured(m) => {
                let area_factor = factor.powi(DIM as i32 - 1);
                let volume_factor = factor.powi(DIM as i32);
                let g = &mut m.geometry;
                for v in &mut g.vertices {
                    *v *= factor;
                }
                for c in &mut g.face_centroids {
                    *c *= factor;
                }
                for c in &mut g.cell_centroids {
                    *c *= factor;
                }
                for d in &mut g.face_distances {
                    *d *= factor;
                }
                for a in &mut g.face_areas {
                    *a *= area_factor;
                }
                for v in &mut g.cell_volumes {
                    *v *= volume_factor;
                }
            }
        }
        Ok(())
    }
}

impl Mesh<1> {
    /// Construct a 1D uniform grid of `nx` cells with spacing `dx`,
    /// starting at the coordinate origin.
    pub fn grid_1d(nx: usize, dx: f64) -> Result<Self, ConstructionError> {
        Self::uniform(na::Vector1::zeros(), [dx], [nx])
    }
}

impl Mesh<2> {
    /// Construct a 2D uniform grid of `nx` by `ny` cells
    /// with spacings `dx` and `dy`, starting at the coordinate origin.
    pub fn grid_2d(nx: usize, ny: usize, dx: f64, dy: f64) -> Result<Self, ConstructionError> {
        Self::uniform(na::Vector2::zeros(), [dx, dy], [nx, ny])
    }
}

impl Mesh<3> {
    /// Construct a 3D uniform grid with the given per-axis cell counts
    /// and spacings, starting at the coordinate origin.
    pub fn grid_3d(
        shape: [usize; 3],
        spacing: [f64; 3],
    ) -> Result<Self, ConstructionError> {
        Self::uniform(na::Vector3::zeros(), spacing, shape)
    }
}
