//! Construction of unstructured meshes:
//! connectivity validation and metric computation.
//!
//! A mesh that makes it out of here is guaranteed to be usable:
//! every face has an owner, no face is claimed by more than two cells,
//! all face areas are nonzero and all cell volumes are positive.
//! Anything else fails fast with a [`ConstructionError`]
//! before the caller can assemble on a broken mesh.

use fixedbitset as fb;
use itertools::{izip, Itertools};
use nalgebra as na;

use super::{ConstructionError, MeshGeometry, MeshTopology, UnstructuredMesh};

/// Below this, areas, volumes and distances count as degenerate.
const DEGENERACY_TOL: f64 = 1e-14;

pub fn build_unstructured<const DIM: usize>(
    vertices: Vec<na::SVector<f64, DIM>>,
    face_vertices: Vec<Vec<usize>>,
    cell_faces: Vec<Vec<usize>>,
) -> Result<UnstructuredMesh<DIM>, ConstructionError> {
    if vertices.is_empty() || face_vertices.is_empty() || cell_faces.is_empty() {
        return Err(ConstructionError::Empty);
    }
    let face_count = face_vertices.len();
    let cell_count = cell_faces.len();

    //
    // face metrics
    //

    let mut face_areas = Vec::with_capacity(face_count);
    let mut face_normals = Vec::with_capacity(face_count);
    let mut face_centroids = Vec::with_capacity(face_count);
    for (face, verts) in face_vertices.iter().enumerate() {
        for &v in verts {
            if v >= vertices.len() {
                return Err(ConstructionError::VertexOutOfRange { face, vertex: v });
            }
        }
        let (area, normal, centroid) = face_metrics(face, &vertices, verts)?;
        face_areas.push(area);
        face_normals.push(normal);
        face_centroids.push(centroid);
    }

    //
    // owner/neighbor assignment:
    // the first cell listing a face owns it, the second is its neighbor
    //

    let mut face_cells: Vec<(Option<usize>, Option<usize>)> = vec![(None, None); face_count];
    for (cell, faces) in cell_faces.iter().enumerate() {
        for (i, &face) in faces.iter().enumerate() {
            if face >= face_count {
                return Err(ConstructionError::FaceOutOfRange { cell, face });
            }
            if faces[..i].contains(&face) {
                return Err(ConstructionError::DuplicateFace { cell, face });
            }
            match &mut face_cells[face] {
                (o @ None, _) => *o = Some(cell),
                (Some(_), n @ None) => *n = Some(cell),
                (Some(_), Some(_)) => return Err(ConstructionError::TooManyCells { face }),
            }
        }
    }
    let face_cells: Vec<(usize, Option<usize>)> = face_cells
        .into_iter()
        .enumerate()
        .map(|(face, (owner, neighbor))| {
            owner
                .map(|o| (o, neighbor))
                .ok_or(ConstructionError::OrphanFace { face })
        })
        .collect::<Result<_, _>>()?;

    //
    // cell volumes and centroids by pyramid decomposition around
    // the mean of the cell's face centroids
    // (assumes cells are star-shaped with respect to that point,
    // which holds for any convex cell)
    //

    let mut cell_volumes = Vec::with_capacity(cell_count);
    let mut cell_centroids = Vec::with_capacity(cell_count);
    for (cell, faces) in cell_faces.iter().enumerate() {
        let apex: na::SVector<f64, DIM> =
            faces.iter().map(|&f| face_centroids[f]).sum::<na::SVector<f64, DIM>>()
                / faces.len() as f64;

        let mut volume = 0.0;
        let mut centroid_acc = na::SVector::<f64, DIM>::zeros();
        for &f in faces {
            let offset = face_centroids[f] - apex;
            let height = offset.dot(&face_normals[f]).abs();
            let pyramid_volume = height * face_areas[f] / DIM as f64;
            // the centroid of a pyramid sits DIM/(DIM+1) of the way
            // from the apex to the base centroid
            let pyramid_centroid = apex + (DIM as f64 / (DIM + 1) as f64) * offset;
            volume += pyramid_volume;
            centroid_acc += pyramid_volume * pyramid_centroid;
        }
        if volume <= DEGENERACY_TOL {
            return Err(ConstructionError::NonPositiveVolume { cell });
        }
        cell_volumes.push(volume);
        cell_centroids.push(centroid_acc / volume);
    }

    //
    // orient the stored normals from owner to neighbor
    // (outward on exterior faces)
    //

    for (face, &(owner, _)) in face_cells.iter().enumerate() {
        let outward = face_centroids[face] - cell_centroids[owner];
        if outward.dot(&face_normals[face]) < 0.0 {
            face_normals[face] = -face_normals[face];
        }
    }

    //
    // distances and interpolation weights
    //

    let mut face_distances = Vec::with_capacity(face_count);
    let mut face_weights = Vec::with_capacity(face_count);
    for (&(owner, neighbor), centroid) in izip!(&face_cells, &face_centroids) {
        match neighbor {
            Some(n) => {
                face_distances.push((cell_centroids[n] - cell_centroids[owner]).norm());
                let to_owner = (centroid - cell_centroids[owner]).norm();
                let to_neighbor = (centroid - cell_centroids[n]).norm();
                face_weights.push(to_neighbor / (to_owner + to_neighbor));
            }
            None => {
                face_distances.push((centroid - cell_centroids[owner]).norm());
                face_weights.push(1.0);
            }
        }
    }

    //
    // flatten adjacency
    //

    let mut exterior = fb::FixedBitSet::with_capacity(face_count);
    for face in face_cells.iter().positions(|(_, n)| n.is_none()) {
        exterior.insert(face);
    }

    let mut cell_face_offsets = Vec::with_capacity(cell_count + 1);
    let mut flat_cell_faces = Vec::new();
    cell_face_offsets.push(0);
    for faces in &cell_faces {
        flat_cell_faces.extend_from_slice(faces);
        cell_face_offsets.push(flat_cell_faces.len());
    }

    let mut face_vertex_offsets = Vec::with_capacity(face_count + 1);
    let mut flat_face_vertices = Vec::new();
    face_vertex_offsets.push(0);
    for verts in &face_vertices {
        flat_face_vertices.extend_from_slice(verts);
        face_vertex_offsets.push(flat_face_vertices.len());
    }

    let vertex_count = vertices.len();
    Ok(UnstructuredMesh {
        topology: MeshTopology {
            face_cells,
            cell_faces: flat_cell_faces,
            cell_face_offsets,
            face_vertices: flat_face_vertices,
            face_vertex_offsets,
            exterior,
            vertex_count,
        },
        geometry: MeshGeometry {
            vertices,
            face_areas,
            face_normals,
            face_centroids,
            face_distances,
            face_weights,
            cell_volumes,
            cell_centroids,
        },
    })
}

/// Area, (arbitrarily oriented) unit normal and centroid of one face.
///
/// Faces are points in 1D (unit area by convention),
/// line segments in 2D and planar polygons in 3D.
fn face_metrics<const DIM: usize>(
    face: usize,
    vertices: &[na::SVector<f64, DIM>],
    indices: &[usize],
) -> Result<(f64, na::SVector<f64, DIM>, na::SVector<f64, DIM>), ConstructionError> {
    match DIM {
        1 => {
            let [v] = indices else {
                return Err(ConstructionError::BadFaceArity { face, dim: DIM });
            };
            let mut normal = na::SVector::<f64, DIM>::zeros();
            normal[0] = 1.0;
            Ok((1.0, normal, vertices[*v]))
        }
        2 => {
            let [a, b] = indices else {
                return Err(ConstructionError::BadFaceArity { face, dim: DIM });
            };
            let edge = vertices[*b] - vertices[*a];
            let length = edge.norm();
            if length <= DEGENERACY_TOL {
                return Err(ConstructionError::ZeroAreaFace { face });
            }
            let mut normal = na::SVector::<f64, DIM>::zeros();
            normal[0] = edge[1] / length;
            normal[1] = -edge[0] / length;
            Ok((length, normal, (vertices[*a] + vertices[*b]) / 2.0))
        }
        3 => {
            if indices.len() < 3 {
                return Err(ConstructionError::BadFaceArity { face, dim: DIM });
            }
            let mean: na::SVector<f64, DIM> =
                indices.iter().map(|&v| vertices[v]).sum::<na::SVector<f64, DIM>>()
                    / indices.len() as f64;

            // fan triangulation around the vertex mean;
            // works for any planar, possibly non-convex polygon
            let mut area_vector = na::SVector::<f64, DIM>::zeros();
            let mut centroid_acc = na::SVector::<f64, DIM>::zeros();
            let mut total_area = 0.0;
            for i in 0..indices.len() {
                let a = vertices[indices[i]] - mean;
                let b = vertices[indices[(i + 1) % indices.len()]] - mean;
                let cross = na::SVector::<f64, DIM>::from_fn(|k, _| {
                    let (i1, i2) = ((k + 1) % 3, (k + 2) % 3);
                    a[i1] * b[i2] - a[i2] * b[i1]
                });
                let tri_area = 0.5 * cross.norm();
                let tri_centroid =
                    (mean + vertices[indices[i]] + vertices[indices[(i + 1) % indices.len()]])
                        / 3.0;
                area_vector += 0.5 * cross;
                centroid_acc += tri_area * tri_centroid;
                total_area += tri_area;
            }
            let area = area_vector.norm();
            if area <= DEGENERACY_TOL {
                return Err(ConstructionError::ZeroAreaFace { face });
            }
            Ok((area, area_vector / area, centroid_acc / total_area))
        }
        _ => Err(ConstructionError::BadFaceArity { face, dim: DIM }),
    }
}

/// A 2x2 square split into four triangles around its center,
/// for use in this crate's tests.
#[cfg(test)]
pub fn tiny_mesh_2d() -> super::Mesh<2> {
    use super::Mesh;
    let vertices = vec![
        na::Vector2::new(0.0, 0.0),
        na::Vector2::new(2.0, 0.0),
        na::Vector2::new(2.0, 2.0),
        na::Vector2::new(0.0, 2.0),
        na::Vector2::new(1.0, 1.0),
    ];
    let face_vertices = vec![
        vec![0, 1],
        vec![1, 2],
        vec![2, 3],
        vec![3, 0],
        vec![0, 4],
        vec![1, 4],
        vec![2, 4],
        vec![3, 4],
    ];
    let cell_faces = vec![
        vec![0, 5, 4],
        vec![1, 6, 5],
        vec![2, 7, 6],
        vec![3, 4, 7],
    ];
    Mesh::unstructured(vertices, face_vertices, cell_faces).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use approx::assert_abs_diff_eq;

    #[test]
    fn tiny_mesh_metrics_are_correct() {
        let mesh = tiny_mesh_2d();
        assert_eq!(mesh.cell_count(), 4);
        assert_eq!(mesh.face_count(), 8);
        assert_eq!(mesh.vertex_count(), 5);

        // each triangle has base 2 and height 1
        for cell in 0..4 {
            assert_abs_diff_eq!(mesh.cell_volume(cell), 1.0, epsilon = 1e-12);
        }
        // boundary edges have length 2, spokes sqrt(2)
        assert_abs_diff_eq!(mesh.face_area(0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mesh.face_area(4), f64::sqrt(2.0), epsilon = 1e-12);

        // exterior normals point out of the square
        assert_abs_diff_eq!(mesh.face_normal(0).y, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(mesh.face_normal(2).y, 1.0, epsilon = 1e-12);

        // interior faces see two distinct cells, exterior faces one
        for face in 0..4 {
            assert!(mesh.face_cells(face).1.is_none());
        }
        for face in 4..8 {
            let (owner, neighbor) = mesh.face_cells(face);
            assert_ne!(owner, neighbor.unwrap());
        }
    }

    #[test]
    fn degenerate_faces_are_rejected() {
        let vertices = vec![
            na::Vector2::new(0.0, 0.0),
            na::Vector2::new(1.0, 0.0),
            na::Vector2::new(0.0, 1.0),
        ];
        // face 2 is a point, not an edge
        let err = Mesh::unstructured(
            vertices,
            vec![vec![0, 1], vec![1, 2], vec![2, 2], vec![2, 0]],
            vec![vec![0, 1, 2, 3]],
        )
        .unwrap_err();
        assert_eq!(err, ConstructionError::ZeroAreaFace { face: 2 });
    }

    #[test]
    fn connectivity_errors_are_reported() {
        let vertices = vec![na::Vector1::new(0.0), na::Vector1::new(1.0)];
        let err = Mesh::unstructured(
            vertices.clone(),
            vec![vec![0], vec![1]],
            vec![vec![0, 0]],
        )
        .unwrap_err();
        assert_eq!(err, ConstructionError::DuplicateFace { cell: 0, face: 0 });

        let err = Mesh::unstructured(vertices, vec![vec![0], vec![5]], vec![vec![0, 1]])
            .unwrap_err();
        assert_eq!(err, ConstructionError::VertexOutOfRange { face: 1, vertex: 5 });
    }

    #[test]
    fn three_cells_cannot_share_a_face() {
        let vertices = vec![na::Vector1::new(0.0), na::Vector1::new(1.0)];
        let err = Mesh::unstructured(
            vertices,
            vec![vec![0], vec![1]],
            vec![vec![0, 1], vec![0, 1], vec![0, 1]],
        )
        .unwrap_err();
        assert_eq!(err, ConstructionError::TooManyCells { face: 0 });
    }
}
