use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use nalgebra::Vector3;

use crate::{
    config::ParserConfig,
    datatypes::{Element, ElementType, PhysicalName},
    error::{LemError, LemResult},
    mesh::Mesh,
    pairs::{self, TetrahedronCatalog},
};

const NODES_KEYWORD: &str = "$Nodes";
const ELEMENTS_KEYWORD: &str = "$Elements";
const PHYSICAL_NAMES_KEYWORD: &str = "$PhysicalNames";

/// Buffered lines of a mesh file with a read position that can be rewound.
struct LineCursor {
    lines: Vec<String>,
    position: usize,
}

impl LineCursor {
    fn new(contents: &str) -> LineCursor {
        LineCursor {
            lines: contents.lines().map(str::to_owned).collect(),
            position: 0,
        }
    }

    fn position(&self) -> usize {
        self.position
    }

    fn seek(&mut self, position: usize) {
        self.position = position.min(self.lines.len());
    }

    fn next_line(&mut self) -> Option<&str> {
        let line = self.lines.get(self.position)?;
        self.position += 1;
        Some(line.as_str())
    }
}

/// Result of parsing the fields of one element line
enum ElementLine {
    Parsed(Element),
    UnknownType { element_id: u32, code: u32 },
}

/// Comment and blank lines never count as entries
fn is_rejected(line: &str) -> bool {
    line.contains('#') || line.trim().is_empty()
}

fn next_field<T: std::str::FromStr>(
    fields: &mut std::str::SplitWhitespace,
    what: &str,
) -> Result<T, String> {
    let raw = fields.next().ok_or_else(|| format!("missing {what}"))?;
    raw.parse()
        .map_err(|_| format!("non-numeric {what} {raw:?}"))
}

/// Scans for a line equal to `keyword`, starting at line `start`
///
/// The scan stops with an error at the first line that contains the keyword
/// without being equal to it. On success the cursor sits on the line after
/// the keyword; on failure it sits after the line where the scan stopped.
fn scan_for_keyword(cursor: &mut LineCursor, keyword: &str, start: usize) -> LemResult<()> {
    cursor.seek(start);
    while let Some(line) = cursor.next_line() {
        if line == keyword {
            tracing::debug!("read keyword: {keyword} successfully");
            return Ok(());
        }
        if !keyword.is_empty() && line.contains(keyword) {
            break;
        }
    }

    Err(LemError::MalformedSection {
        keyword: keyword.to_owned(),
    })
}

/// Rewinds to the start of the file and scans for a section marker
fn read_keyword(cursor: &mut LineCursor, keyword: &str) -> LemResult<()> {
    scan_for_keyword(cursor, keyword, 0)
}

/// Reads the entry count that follows a section marker
///
/// A missing line yields zero silently, since the failed keyword search has
/// already been recorded. An unparsable line is recorded and yields zero.
fn read_count(cursor: &mut LineCursor, mesh: &mut Mesh, section: &'static str) -> usize {
    let Some(line) = cursor.next_line() else {
        return 0;
    };

    match next_field::<usize>(&mut line.split_whitespace(), "entry count") {
        Ok(count) => count,
        Err(reason) => {
            let line = line.to_owned();
            mesh.record(LemError::MalformedLine {
                section,
                line,
                reason,
            });
            0
        }
    }
}

fn parse_vertex_line(line: &str) -> Result<(u32, Vector3<f64>), String> {
    let mut fields = line.split_whitespace();
    let id: u32 = next_field(&mut fields, "vertex id")?;
    let x: f64 = next_field(&mut fields, "x coordinate")?;
    let y: f64 = next_field(&mut fields, "y coordinate")?;
    let z: f64 = next_field(&mut fields, "z coordinate")?;

    Ok((id, Vector3::new(x, y, z)))
}

fn parse_element_line(line: &str, mesh: &Mesh) -> Result<ElementLine, String> {
    let mut fields = line.split_whitespace();
    let element_id: u32 = next_field(&mut fields, "element id")?;
    let code: u32 = next_field(&mut fields, "element type")?;
    let tag_count: u32 = next_field(&mut fields, "tag count")?;
    let object_id: u32 = next_field(&mut fields, "object id")?;

    let kind = match ElementType::from_code(code) {
        Some(kind) => kind,
        None => return Ok(ElementLine::UnknownType { element_id, code }),
    };

    let mut element = Element::new(element_id, kind, object_id);

    // the object id is the first of the tags
    for _ in 0..tag_count.saturating_sub(1) {
        element.add_tag(next_field(&mut fields, "element tag")?);
    }

    for _ in 0..kind.vertex_count() {
        let vertex_id: u32 = next_field(&mut fields, "vertex id")?;
        element.add_vertex(vertex_id, mesh.vertex_index_of(vertex_id));
    }

    Ok(ElementLine::Parsed(element))
}

fn parse_physical_name(line: &str) -> Result<PhysicalName, String> {
    let mut fields = line.split_whitespace();
    let dimension: u32 = next_field(&mut fields, "physical dimension")?;
    let surface_id: u32 = next_field(&mut fields, "physical id")?;
    let name = fields.collect::<Vec<&str>>().join(" ");
    if name.is_empty() {
        return Err("missing physical name".to_owned());
    }

    Ok(PhysicalName {
        dimension,
        surface_id,
        name: name.trim_matches('"').to_owned(),
    })
}

/// Reads the `$Nodes` section into the vertex arena
///
/// Rejected lines do not count toward the declared total, so the loop keeps
/// reading until it has that many valid vertices or the file ends.
fn read_vertices(cursor: &mut LineCursor, mesh: &mut Mesh) {
    if let Err(err) = read_keyword(cursor, NODES_KEYWORD) {
        mesh.record(err);
    }

    let expected = read_count(cursor, mesh, "Nodes");
    tracing::info!("total number of vertices = {expected}");

    let mut found: usize = 0;
    while found < expected {
        let Some(line) = cursor.next_line() else {
            mesh.record(LemError::TruncatedSection {
                section: "Nodes",
                expected,
                found,
            });
            break;
        };

        let parsed = if is_rejected(line) {
            Err("comment or empty line".to_owned())
        } else {
            parse_vertex_line(line)
        };

        match parsed {
            Ok((id, coord)) => {
                mesh.insert_vertex(id, coord);
                found += 1;
            }
            Err(reason) => {
                let line = line.to_owned();
                mesh.record(LemError::MalformedLine {
                    section: "Nodes",
                    line,
                    reason,
                });
            }
        }
    }
}

/// Reads the `$Elements` section into the element arena
///
/// # Errors
/// `UnknownElementType` when `config.strict_element_types` is set and an
/// element has a type code outside the table. Otherwise that element is
/// skipped and the problem recorded.
fn read_elements(cursor: &mut LineCursor, mesh: &mut Mesh, config: &ParserConfig) -> LemResult<()> {
    if let Err(err) = read_keyword(cursor, ELEMENTS_KEYWORD) {
        mesh.record(err);
    }

    let expected = read_count(cursor, mesh, "Elements");
    tracing::info!("total number of elements = {expected}");

    let mut consumed: usize = 0;
    while consumed < expected {
        let Some(line) = cursor.next_line() else {
            mesh.record(LemError::TruncatedSection {
                section: "Elements",
                expected,
                found: consumed,
            });
            break;
        };

        let parsed = if is_rejected(line) {
            Err("comment or empty line".to_owned())
        } else {
            parse_element_line(line, mesh)
        };

        match parsed {
            Ok(ElementLine::Parsed(element)) => {
                mesh.push_element(element);
                consumed += 1;
            }
            Ok(ElementLine::UnknownType { element_id, code }) => {
                let err = LemError::UnknownElementType { element_id, code };
                if config.strict_element_types {
                    return Err(err);
                }
                mesh.record(err);
                consumed += 1;
            }
            Err(reason) => {
                let line = line.to_owned();
                mesh.record(LemError::MalformedLine {
                    section: "Elements",
                    line,
                    reason,
                });
            }
        }
    }

    Ok(())
}

/// Reads `$PhysicalNames` and resolves pairs for fracture and weak-plane
/// groups
///
/// Before each entry the reader re-locates itself inside the section: the
/// first entry follows the line holding the entry count, every later entry
/// follows the line read for the previous one.
fn read_surfaces(cursor: &mut LineCursor, mesh: &mut Mesh, config: &ParserConfig) {
    if let Err(err) = read_keyword(cursor, PHYSICAL_NAMES_KEYWORD) {
        mesh.record(err);
    }

    let section_start = cursor.position();
    let expected = read_count(cursor, mesh, "PhysicalNames");
    tracing::info!("number of physical objects = {expected}");

    let mut anchor = expected.to_string();
    let mut catalog: Option<TetrahedronCatalog> = None;

    for read in 0..expected {
        if let Err(err) = scan_for_keyword(cursor, &anchor, section_start) {
            mesh.record(err);
        }

        let Some(line) = cursor.next_line() else {
            mesh.record(LemError::TruncatedSection {
                section: "PhysicalNames",
                expected,
                found: read,
            });
            break;
        };
        let line = line.to_owned();

        let parsed = if is_rejected(&line) {
            Err("comment or empty line".to_owned())
        } else {
            parse_physical_name(&line)
        };
        anchor = line.clone();

        let physical = match parsed {
            Ok(p) => p,
            Err(reason) => {
                mesh.record(LemError::MalformedLine {
                    section: "PhysicalNames",
                    line,
                    reason,
                });
                continue;
            }
        };

        let is_fracture = physical.name.contains(config.fracture_marker.as_str());
        let is_weak_plane = physical.name.contains(config.weak_plane_marker.as_str());

        if is_fracture || is_weak_plane {
            let catalog = catalog.get_or_insert_with(|| {
                let built = TetrahedronCatalog::build(&*mesh);
                tracing::debug!("indexed {} tetrahedra for the pair search", built.len());
                built
            });

            if is_fracture {
                let found = pairs::resolve_group(mesh, catalog, physical.surface_id);
                tracing::info!("fracture group {:?}: {} pairs", physical.name, found.len());
                mesh.fracture_pairs.extend(found);
            }
            if is_weak_plane {
                let found = pairs::resolve_group(mesh, catalog, physical.surface_id);
                tracing::info!("weak plane group {:?}: {} pairs", physical.name, found.len());
                mesh.weak_plane_pairs.extend(found);
            }
        }

        mesh.push_physical_name(physical);
    }
}

/// Parses mesh text into a Mesh
///
/// # Arguments
/// * `reader` - Any source of mesh text
/// * `config` - Parser options
///
/// # Returns
/// The parsed mesh, with recoverable problems listed in its diagnostics
pub fn parse_mesh<R: Read>(mut reader: R, config: &ParserConfig) -> LemResult<Mesh> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    // invalid bytes become U+FFFD and the affected line is rejected like any
    // other malformed entry
    let contents = String::from_utf8_lossy(&bytes);
    let mut cursor = LineCursor::new(&contents);
    let mut mesh = Mesh::new();

    read_vertices(&mut cursor, &mut mesh);
    read_elements(&mut cursor, &mut mesh, config)?;
    read_surfaces(&mut cursor, &mut mesh, config);

    tracing::info!(
        "loaded {} vertices, {} elements ({} tetrahedra), {} fracture pairs, {} weak plane pairs",
        mesh.vertices().len(),
        mesh.elements().len(),
        mesh.tetrahedra().len(),
        mesh.fracture_pairs.len(),
        mesh.weak_plane_pairs.len()
    );
    if !mesh.diagnostics.is_empty() {
        tracing::warn!("{} problems found while reading mesh", mesh.diagnostics.len());
    }

    Ok(mesh)
}

/// Parses a .msh file into a Mesh
///
/// # Arguments
/// * `mesh_file` - The path to the mesh file
/// * `config` - Parser options
pub fn read_msh_file(mesh_file: &Path, config: &ParserConfig) -> LemResult<Mesh> {
    let file = File::open(mesh_file).map_err(|source| LemError::FileNotFound {
        path: mesh_file.to_path_buf(),
        source,
    })?;

    tracing::info!("reading mesh file {}", mesh_file.display());
    parse_mesh(BufReader::new(file), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TWO_TETS: &str = "\
$Nodes
5
1 0 0 0
2 1 0 0
3 0 1 0
4 0 0 1
5 1 1 1
$EndNodes
$Elements
3
1 2 2 9 1 1 2 3
2 4 2 5 1 1 2 3 4
3 4 2 1 1 2 3 4 5
$EndElements
$PhysicalNames
2
2 5 \"Fracture_1\"
3 1 \"Rock\"
$EndPhysicalNames
";

    fn parse(text: &str) -> Mesh {
        parse_mesh(text.as_bytes(), &ParserConfig::default()).unwrap()
    }

    #[test]
    fn counts_round_trip() {
        let mesh = parse(TWO_TETS);
        assert_eq!(mesh.vertices().len(), 5);
        assert_eq!(mesh.elements().len(), 3);
        assert_eq!(mesh.tetrahedra().len(), 2);
        assert_eq!(mesh.physical_names().len(), 2);
        assert_eq!(mesh.physical_names()[0].name, "Fracture_1");
        assert!(mesh.diagnostics.is_empty(), "{:?}", mesh.diagnostics);
    }

    #[test]
    fn tags_and_object_ids_are_split() {
        let mesh = parse(TWO_TETS);
        let tet = &mesh.elements()[1];
        assert_eq!(tet.id(), 2);
        assert_eq!(tet.object_id(), 5);
        assert_eq!(tet.tags(), &[1]);
        assert_eq!(tet.vertex_ids(), &[1, 2, 3, 4]);
        assert_eq!(mesh.elements()[0].kind(), ElementType::Triangle);
    }

    #[test]
    fn tetrahedron_centroids_are_computed_while_parsing() {
        let mesh = parse(TWO_TETS);
        assert_relative_eq!(*mesh.elements()[1].centroid(), Vector3::new(0.25, 0.25, 0.25));
        assert!(mesh.elements()[0].centroid()[0].is_nan());
    }

    #[test]
    fn fracture_group_produces_pairs() {
        let mesh = parse(TWO_TETS);
        assert_eq!(mesh.fracture_pairs.len(), 1);
        assert_eq!(mesh.fracture_pairs[0].first, Some(0));
        assert_eq!(mesh.fracture_pairs[0].second, None);
        assert!(mesh.weak_plane_pairs.is_empty());
    }

    #[test]
    fn weak_plane_group_uses_its_own_list() {
        let text = TWO_TETS.replace("\"Fracture_1\"", "\"WeakPlane\"");
        let mesh = parse(&text);
        assert!(mesh.fracture_pairs.is_empty());
        assert_eq!(mesh.weak_plane_pairs.len(), 1);
    }

    #[test]
    fn blank_line_does_not_count_as_vertex() {
        let text = "$Nodes\n3\n1 0 0 0\n\n2 1 0 0\n3 0 1 0\n$EndNodes\n";
        let mesh = parse(text);

        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.vertex_by_id(3).unwrap().coord().y, 1.0);
        assert!(mesh
            .diagnostics
            .iter()
            .any(|d| matches!(d, LemError::MalformedLine { section: "Nodes", .. })));
    }

    #[test]
    fn comment_and_garbage_lines_are_skipped() {
        let text = "$Nodes\n2\n# origin\n1 0 0 0\n2 a 0 0\n2 1 0 0\n";
        let mesh = parse(text);

        assert_eq!(mesh.vertices().len(), 2);
        assert_eq!(mesh.diagnostics.len(), 4); // comment, garbage, no $Elements, no $PhysicalNames
    }

    #[test]
    fn truncated_nodes_section_keeps_partial_result() {
        let mesh = parse("$Nodes\n4\n1 0 0 0\n2 1 0 0\n");
        assert_eq!(mesh.vertices().len(), 2);
        assert!(mesh.diagnostics.iter().any(|d| matches!(
            d,
            LemError::TruncatedSection {
                section: "Nodes",
                expected: 4,
                found: 2
            }
        )));
    }

    #[test]
    fn empty_file_is_not_an_error() {
        let mesh = parse("");
        assert!(mesh.vertices().is_empty());
        assert!(mesh.elements().is_empty());
        assert!(mesh.fracture_pairs.is_empty());
        assert_eq!(mesh.diagnostics.len(), 3);
        assert!(mesh.diagnostics.iter().all(|d| d.is_recoverable()));
    }

    #[test]
    fn keyword_must_match_the_whole_line() {
        let mut cursor = LineCursor::new("$NodesData\n$Nodes\n1\n");
        let err = read_keyword(&mut cursor, "$Nodes").unwrap_err();
        assert!(matches!(err, LemError::MalformedSection { .. }));
        // the scan stops on the partial match instead of looking further
        assert_eq!(cursor.position(), 1);

        let mut cursor = LineCursor::new("$MeshFormat\n$Nodes\n1\n");
        read_keyword(&mut cursor, "$Nodes").unwrap();
        assert_eq!(cursor.next_line(), Some("1"));
    }

    #[test]
    fn sections_may_come_in_any_order() {
        let text = "\
$PhysicalNames
1
3 5 \"Fracture\"
$EndPhysicalNames
$Elements
1
7 4 2 5 0 1 2 3 4
$EndElements
$Nodes
4
1 0 0 0
2 2 0 0
3 0 2 0
4 0 0 2
$EndNodes
";
        let mesh = parse(text);
        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.elements().len(), 1);
        assert_relative_eq!(*mesh.elements()[0].centroid(), Vector3::new(0.5, 0.5, 0.5));
        assert_eq!(mesh.fracture_pairs.len(), 1);
    }

    #[test]
    fn unresolved_vertex_ids_are_kept_in_the_id_list() {
        let text = "$Nodes\n1\n1 3 3 3\n$Elements\n1\n1 4 1 2 1 40 41 42\n";
        let mesh = parse(text);
        let tet = &mesh.elements()[0];

        assert_eq!(tet.vertex_ids(), &[1, 40, 41, 42]);
        assert_eq!(tet.vertex_refs(), &[0]);
        assert_relative_eq!(*tet.centroid(), Vector3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn unknown_element_type_is_skipped_by_default() {
        let text = "$Nodes\n1\n1 0 0 0\n$Elements\n2\n1 15 2 1 1 1\n2 1 2 1 1 1 1\n";
        let mesh = parse(text);

        assert_eq!(mesh.elements().len(), 1);
        assert_eq!(mesh.elements()[0].id(), 2);
        assert!(mesh.diagnostics.iter().any(|d| matches!(
            d,
            LemError::UnknownElementType {
                element_id: 1,
                code: 15
            }
        )));
    }

    #[test]
    fn unknown_element_type_is_fatal_when_strict() {
        let text = "$Nodes\n1\n1 0 0 0\n$Elements\n1\n1 15 2 1 1 1\n";
        let config = ParserConfig {
            strict_element_types: true,
            ..ParserConfig::default()
        };

        let err = parse_mesh(text.as_bytes(), &config).unwrap_err();
        assert!(matches!(err, LemError::UnknownElementType { code: 15, .. }));
    }

    #[test]
    fn zero_tag_count_reads_no_tags() {
        let text = "$Nodes\n4\n1 0 0 0\n2 1 0 0\n3 0 1 0\n4 0 0 1\n$Elements\n1\n1 4 0 5 1 2 3 4\n";
        let mesh = parse(text);

        assert_eq!(mesh.elements().len(), 1);
        let tet = &mesh.elements()[0];
        assert_eq!(tet.object_id(), 5);
        assert!(tet.tags().is_empty());
        assert_eq!(tet.vertex_ids(), &[1, 2, 3, 4]);
        assert_relative_eq!(*tet.centroid(), Vector3::new(0.25, 0.25, 0.25));
    }

    #[test]
    fn invalid_utf8_only_rejects_its_line() {
        let text: &[u8] = b"$Nodes\n3\n# auteur: \xE9\n1 0 0 0\n2 1 0 0\n3 \xE9 0 0\n3 0 1 0\n";
        let mesh = parse_mesh(text, &ParserConfig::default()).unwrap();

        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.vertex_by_id(3).unwrap().coord().y, 1.0);
        let rejected = mesh
            .diagnostics
            .iter()
            .filter(|d| matches!(d, LemError::MalformedLine { section: "Nodes", .. }))
            .count();
        assert_eq!(rejected, 2);
    }

    #[test]
    fn short_element_line_does_not_count() {
        let text = "$Nodes\n2\n1 0 0 0\n2 1 0 0\n$Elements\n1\n1 1 2 1 1 1\n2 1 2 1 1 1 2\n";
        let mesh = parse(text);

        assert_eq!(mesh.elements().len(), 1);
        assert_eq!(mesh.elements()[0].id(), 2);
    }

    #[test]
    fn physical_names_survive_a_malformed_entry() {
        let text = "$PhysicalNames\n3\n2 1 \"Top\"\n# note\n2 2 \"Bottom\"\n3 3 \"Core\"\n";
        let mesh = parse(text);

        let names: Vec<&str> = mesh.physical_names().iter().map(|p| p.name.as_str()).collect();
        // the comment consumes one of the three slots
        assert_eq!(names, vec!["Top", "Bottom"]);

        let text = "$PhysicalNames\n3\n2 1 \"Top\"\n2 2 \"Bottom\"\n3 3 \"Core\"\n";
        let mesh = parse(text);
        let names: Vec<&str> = mesh.physical_names().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Top", "Bottom", "Core"]);
    }

    #[test]
    fn missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_msh_file(&dir.path().join("absent.msh"), &ParserConfig::default()).unwrap_err();
        assert!(matches!(err, LemError::FileNotFound { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two_tets.msh");
        std::fs::write(&path, TWO_TETS).unwrap();

        let mesh = read_msh_file(&path, &ParserConfig::default()).unwrap();
        assert_eq!(mesh.elements().len(), 3);
    }
}
