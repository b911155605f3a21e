use hashbrown::HashMap;
use nalgebra::Vector3;

use crate::{
    datatypes::{Element, FracturePair, PhysicalName, Vertex},
    error::LemError,
};

/// Vertex and element arenas read from a mesh file, together with the pairs
/// derived from its fracture and weak-plane groups.
#[derive(Debug, Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    vertex_index: HashMap<u32, usize>,
    elements: Vec<Element>,
    physical_names: Vec<PhysicalName>,
    pub fracture_pairs: Vec<FracturePair>,
    pub weak_plane_pairs: Vec<FracturePair>,
    /// Recoverable problems met while parsing, in the order they were found
    pub diagnostics: Vec<LemError>,
}

impl Mesh {
    pub fn new() -> Mesh {
        Mesh::default()
    }

    /// Stores a vertex. A repeated id overwrites the earlier coordinates.
    ///
    /// # Returns
    /// The arena index of the vertex
    pub fn insert_vertex(&mut self, id: u32, coord: Vector3<f64>) -> usize {
        if let Some(&index) = self.vertex_index.get(&id) {
            tracing::debug!("vertex {} redefined", self.vertices[index].id());
            self.vertices[index].set_coord(coord);
            return index;
        }
        let index = self.vertices.len();
        self.vertices.push(Vertex::new(id, coord));
        self.vertex_index.insert(id, index);
        index
    }

    pub fn vertex_index_of(&self, id: u32) -> Option<usize> {
        self.vertex_index.get(&id).copied()
    }

    #[cfg(test)]
    pub fn vertex_by_id(&self, id: u32) -> Option<&Vertex> {
        self.vertex_index_of(id).map(|i| &self.vertices[i])
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Appends an element, computing its centroid if it is a tetrahedron
    ///
    /// # Returns
    /// The arena index of the element
    pub fn push_element(&mut self, mut element: Element) -> usize {
        if element.is_tetrahedron() {
            if !element.compute_centroid(&self.vertices) {
                tracing::warn!(
                    "tetrahedron {} has no resolvable vertices, centroid left undefined",
                    element.id()
                );
            } else if element.vertex_refs().len() < element.vertex_ids().len() {
                tracing::warn!(
                    "tetrahedron {}: centroid from {} of {} vertices",
                    element.id(),
                    element.vertex_refs().len(),
                    element.vertex_ids().len()
                );
            }
        }
        self.elements.push(element);
        self.elements.len() - 1
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn physical_names(&self) -> &[PhysicalName] {
        &self.physical_names
    }

    pub(crate) fn push_physical_name(&mut self, name: PhysicalName) {
        self.physical_names.push(name);
    }

    /// Arena indexes of every tetrahedron, in file order.
    ///
    /// Pair slots and the rows of the nodes file are positions in this list.
    pub fn tetrahedra(&self) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_tetrahedron())
            .map(|(i, _)| i)
            .collect()
    }

    /// Tetrahedra belonging to the physical group `object_id`, in file order
    pub fn find_elements_by_object_id(&self, object_id: u32) -> Vec<&Element> {
        self.elements
            .iter()
            .filter(|e| e.is_tetrahedron() && e.object_id() == object_id)
            .collect()
    }

    pub fn centroid(&self, element_index: usize) -> Option<&Vector3<f64>> {
        self.elements.get(element_index).map(|e| e.centroid())
    }

    pub fn set_centroid(&mut self, element_index: usize, centroid: Vector3<f64>) {
        if let Some(element) = self.elements.get_mut(element_index) {
            element.set_centroid(centroid);
        }
    }

    /// Logs a recoverable problem and keeps it for the caller
    pub(crate) fn record(&mut self, diagnostic: LemError) {
        debug_assert!(diagnostic.is_recoverable(), "fatal error recorded: {diagnostic}");
        tracing::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::ElementType;

    fn tetrahedron(mesh: &Mesh, id: u32, object_id: u32, vertex_ids: [u32; 4]) -> Element {
        let mut element = Element::new(id, ElementType::Tetrahedron, object_id);
        for vid in vertex_ids {
            element.add_vertex(vid, mesh.vertex_index_of(vid));
        }
        element
    }

    #[test]
    fn duplicate_vertex_id_overwrites() {
        let mut mesh = Mesh::new();
        let a = mesh.insert_vertex(5, Vector3::new(1.0, 1.0, 1.0));
        let b = mesh.insert_vertex(5, Vector3::new(2.0, 2.0, 2.0));

        assert_eq!(a, b);
        assert_eq!(mesh.vertices().len(), 1);
        assert_eq!(mesh.vertex_by_id(5).unwrap().coord().x, 2.0);
    }

    #[test]
    fn sparse_vertex_ids_resolve_to_dense_indexes() {
        let mut mesh = Mesh::new();
        mesh.insert_vertex(100, Vector3::zeros());
        mesh.insert_vertex(7, Vector3::zeros());

        assert_eq!(mesh.vertex_index_of(100), Some(0));
        assert_eq!(mesh.vertex_index_of(7), Some(1));
        assert_eq!(mesh.vertex_index_of(8), None);
    }

    #[test]
    fn tetrahedra_are_filtered_in_file_order() {
        let mut mesh = Mesh::new();
        for id in 1..=5 {
            mesh.insert_vertex(id, Vector3::new(id as f64, 0.0, 0.0));
        }
        let mut line = Element::new(1, ElementType::Line, 3);
        line.add_vertex(1, mesh.vertex_index_of(1));
        line.add_vertex(2, mesh.vertex_index_of(2));
        mesh.push_element(line);
        let t1 = tetrahedron(&mesh, 2, 3, [1, 2, 3, 4]);
        mesh.push_element(t1);
        let t2 = tetrahedron(&mesh, 3, 9, [2, 3, 4, 5]);
        mesh.push_element(t2);

        assert_eq!(mesh.tetrahedra(), vec![1, 2]);
        let tagged = mesh.find_elements_by_object_id(3);
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id(), 2);
        assert_eq!(mesh.centroid(1).unwrap().x, 2.5);
        assert!(mesh.centroid(0).unwrap().x.is_nan());
    }
}
