use indicatif::ProgressBar;

use crate::{datatypes::FracturePair, mesh::Mesh};

/// Number of vertex ids two tetrahedra share when they meet on a face
pub const SHARED_FACE_VERTICES: usize = 3;

/// Sorted vertex ids of every tetrahedron, in tetrahedron-sequence order.
///
/// Built once per mesh so candidates are not re-sorted for each anchor.
#[derive(Debug)]
pub struct TetrahedronCatalog {
    entries: Vec<(u32, Vec<u32>)>,
}

impl TetrahedronCatalog {
    pub fn build(mesh: &Mesh) -> TetrahedronCatalog {
        let entries = mesh
            .elements()
            .iter()
            .filter(|e| e.is_tetrahedron())
            .map(|e| {
                let mut ids = e.vertex_ids().to_vec();
                ids.sort_unstable();
                (e.id(), ids)
            })
            .collect();

        TetrahedronCatalog { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Size of the intersection of two sorted id lists, counting repeated ids
/// as many times as they appear in both.
fn shared_count(a: &[u32], b: &[u32]) -> usize {
    let (mut i, mut j, mut count) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            i += 1;
        } else if b[j] < a[i] {
            j += 1;
        } else {
            count += 1;
            i += 1;
            j += 1;
        }
    }
    count
}

/// Finds the tetrahedra that share a face with an anchor element
///
/// Candidates are visited in tetrahedron-sequence order. The position
/// counter advances for every tetrahedron except the anchor itself, so slots
/// after the anchor are one lower than its sequence position. The first
/// match fills `first`; every later match overwrites `second`.
///
/// # Arguments
/// * `catalog` - Sorted vertex ids of all tetrahedra
/// * `anchor_id` - Element id of the anchor
/// * `anchor_vertex_ids` - Vertex ids of the anchor, in any order
///
/// # Returns
/// The pair, with `None` in any slot that found no neighbour
pub fn resolve_pair(
    catalog: &TetrahedronCatalog,
    anchor_id: u32,
    anchor_vertex_ids: &[u32],
) -> FracturePair {
    let mut anchor = anchor_vertex_ids.to_vec();
    anchor.sort_unstable();

    let mut pair = FracturePair::default();
    let mut position: usize = 0;

    for (element_id, vertex_ids) in &catalog.entries {
        if *element_id == anchor_id {
            continue;
        }

        if shared_count(&anchor, vertex_ids) == SHARED_FACE_VERTICES {
            if pair.first.is_none() {
                pair.first = Some(position);
            } else {
                pair.second = Some(position);
            }
        }
        position += 1;
    }

    pair
}

/// Resolves a pair for every tetrahedron in one physical group
///
/// # Arguments
/// * `mesh` - The parsed mesh
/// * `catalog` - Catalog built from the same mesh
/// * `object_id` - Physical group id whose tetrahedra act as anchors
///
/// # Returns
/// One pair per anchor, in file order
pub fn resolve_group(mesh: &Mesh, catalog: &TetrahedronCatalog, object_id: u32) -> Vec<FracturePair> {
    let anchors = mesh.find_elements_by_object_id(object_id);
    tracing::info!(
        "resolving pairs for {} elements in physical group {}",
        anchors.len(),
        object_id
    );

    let bar = ProgressBar::new(anchors.len() as u64);
    let pairs: Vec<FracturePair> = anchors
        .iter()
        .map(|element| {
            bar.inc(1);
            resolve_pair(catalog, element.id(), element.vertex_ids())
        })
        .collect();
    bar.finish_and_clear();

    let unresolved = pairs.iter().filter(|p| !p.is_resolved()).count();
    if unresolved > 0 {
        tracing::debug!(
            "{} of {} pairs in group {} are not fully resolved",
            unresolved,
            pairs.len(),
            object_id
        );
    }

    pairs
}
