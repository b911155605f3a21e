use nalgebra::Vector3;

/// Value written in place of an unresolved pair slot. Downstream readers of
/// `fracture.txt` expect the unsigned "-1".
pub const UNRESOLVED: u32 = u32::MAX;

/// GMSH element types understood by the parser, with their vertex counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Line,
    Triangle,
    Quadrangle,
    Tetrahedron,
}

impl ElementType {
    /// Looks up a GMSH element type code
    ///
    /// # Returns
    /// `None` when the code is not in the table
    pub fn from_code(code: u32) -> Option<ElementType> {
        match code {
            1 => Some(ElementType::Line),
            2 => Some(ElementType::Triangle),
            3 => Some(ElementType::Quadrangle),
            4 => Some(ElementType::Tetrahedron),
            _ => None,
        }
    }

    /// Number of vertex ids that follow the tags on an element line
    pub fn vertex_count(&self) -> usize {
        match self {
            ElementType::Line => 2,
            ElementType::Triangle => 3,
            ElementType::Quadrangle => 4,
            ElementType::Tetrahedron => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    id: u32,
    coord: Vector3<f64>,
}

impl Vertex {
    pub fn new(id: u32, coord: Vector3<f64>) -> Vertex {
        Vertex { id, coord }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn coord(&self) -> &Vector3<f64> {
        &self.coord
    }

    pub fn set_coord(&mut self, coord: Vector3<f64>) {
        self.coord = coord;
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    id: u32,
    kind: ElementType,
    object_id: u32,
    tags: Vec<u32>,
    vertex_ids: Vec<u32>,
    vertex_refs: Vec<usize>, // indexes into the vertex arena
    centroid: Vector3<f64>,
}

impl Element {
    pub fn new(id: u32, kind: ElementType, object_id: u32) -> Element {
        Element {
            id,
            kind,
            object_id,
            tags: Vec::new(),
            vertex_ids: Vec::with_capacity(kind.vertex_count()),
            vertex_refs: Vec::with_capacity(kind.vertex_count()),
            centroid: Vector3::repeat(f64::NAN),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    #[cfg(test)]
    pub fn kind(&self) -> ElementType {
        self.kind
    }

    pub fn is_tetrahedron(&self) -> bool {
        self.kind == ElementType::Tetrahedron
    }

    /// Id of the physical group the element belongs to
    pub fn object_id(&self) -> u32 {
        self.object_id
    }

    #[cfg(test)]
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    pub fn add_tag(&mut self, tag: u32) {
        self.tags.push(tag);
    }

    pub fn vertex_ids(&self) -> &[u32] {
        &self.vertex_ids
    }

    /// Appends a vertex id, and its arena index if the id was resolved
    pub fn add_vertex(&mut self, vertex_id: u32, vertex_ref: Option<usize>) {
        self.vertex_ids.push(vertex_id);
        if let Some(index) = vertex_ref {
            self.vertex_refs.push(index);
        }
    }

    pub fn vertex_refs(&self) -> &[usize] {
        &self.vertex_refs
    }

    pub fn centroid(&self) -> &Vector3<f64> {
        &self.centroid
    }

    pub fn set_centroid(&mut self, centroid: Vector3<f64>) {
        self.centroid = centroid;
    }

    /// Averages the coordinates of the resolved vertices into the centroid
    ///
    /// # Arguments
    /// * `vertices` - The vertex arena that `vertex_refs` points into
    ///
    /// # Returns
    /// `false` if no vertex could be resolved, in which case the centroid is
    /// left NaN.
    pub fn compute_centroid(&mut self, vertices: &[Vertex]) -> bool {
        let resolved: Vec<&Vertex> = self
            .vertex_refs
            .iter()
            .filter_map(|&i| vertices.get(i))
            .collect();

        if resolved.is_empty() {
            self.centroid = Vector3::repeat(f64::NAN);
            return false;
        }

        let sum = resolved
            .iter()
            .fold(Vector3::zeros(), |acc: Vector3<f64>, v| acc + v.coord());
        self.centroid = sum / resolved.len() as f64;
        true
    }
}

/// An entry of the `$PhysicalNames` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalName {
    pub dimension: u32,
    pub surface_id: u32,
    pub name: String,
}

/// Two tetrahedra on either side of a tagged face.
///
/// Slots hold positions in the tetrahedron sequence, not element ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FracturePair {
    pub first: Option<usize>,
    pub second: Option<usize>,
}

impl FracturePair {
    pub fn is_resolved(&self) -> bool {
        self.first.is_some() && self.second.is_some()
    }

    /// Slots in the on-disk representation. A slot too large for `u32` is
    /// written as unresolved.
    pub fn to_wire(&self) -> (u32, u32) {
        let wire = |slot: Option<usize>| {
            slot.and_then(|i| u32::try_from(i).ok())
                .unwrap_or(UNRESOLVED)
        };
        (wire(self.first), wire(self.second))
    }
}

/// Coordinate axis along which paired centroids are pushed apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn parse(value: &str) -> Option<Axis> {
        match value.trim().to_ascii_lowercase().as_str() {
            "x" | "0" => Some(Axis::X),
            "y" | "1" => Some(Axis::Y),
            "z" | "2" => Some(Axis::Z),
            _ => None,
        }
    }
}
