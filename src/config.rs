use std::path::{Path, PathBuf};

use json::JsonValue;

use crate::{
    aligner::{AlignmentStrategy, DEFAULT_OFFSET},
    datatypes::Axis,
    error::{LemError, LemResult},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ParserConfig {
    /// Abort on element types missing from the element table instead of
    /// skipping them
    pub strict_element_types: bool,
    /// Substring of a physical name that marks a fracture group
    pub fracture_marker: String,
    /// Substring of a physical name that marks a weak-plane group
    pub weak_plane_marker: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            strict_element_types: false,
            fracture_marker: "Fracture".to_owned(),
            weak_plane_marker: "WeakPlane".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentConfig {
    pub strategy: AlignmentStrategy,
    pub axis: Axis,
    /// Also align weak-plane pairs after the fracture pairs
    pub weak_planes: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        AlignmentConfig {
            strategy: AlignmentStrategy::GlobalSpan,
            axis: Axis::Z,
            weak_planes: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub nodes: PathBuf,
    pub fracture_pairs: PathBuf,
    pub weak_plane_pairs: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            nodes: PathBuf::from("nodes.txt"),
            fracture_pairs: PathBuf::from("fracture.txt"),
            weak_plane_pairs: PathBuf::from("weakplane.txt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunConfig {
    pub parser: ParserConfig,
    pub alignment: AlignmentConfig,
    pub output: OutputConfig,
}

fn config_error(reason: String) -> LemError {
    LemError::Config { reason }
}

fn read_bool(section: &JsonValue, section_name: &str, key: &str, target: &mut bool) -> LemResult<()> {
    if section.has_key(key) {
        *target = section[key]
            .as_bool()
            .ok_or_else(|| config_error(format!("{section_name}.{key} must be true or false")))?;
    }
    Ok(())
}

fn read_string(section: &JsonValue, section_name: &str, key: &str) -> LemResult<Option<String>> {
    if !section.has_key(key) {
        return Ok(None);
    }
    match section[key].as_str() {
        Some(s) if !s.trim().is_empty() => Ok(Some(s.to_owned())),
        _ => Err(config_error(format!(
            "{section_name}.{key} must be a non-empty string"
        ))),
    }
}

fn parse_parser_section(section: &JsonValue, config: &mut ParserConfig) -> LemResult<()> {
    read_bool(section, "parser", "strict_element_types", &mut config.strict_element_types)?;
    if let Some(marker) = read_string(section, "parser", "fracture_marker")? {
        config.fracture_marker = marker;
    }
    if let Some(marker) = read_string(section, "parser", "weak_plane_marker")? {
        config.weak_plane_marker = marker;
    }
    Ok(())
}

fn parse_alignment_section(section: &JsonValue, config: &mut AlignmentConfig) -> LemResult<()> {
    let offset = if section.has_key("offset") {
        let offset = section["offset"]
            .as_f64()
            .ok_or_else(|| config_error("alignment.offset must be a number".to_owned()))?;
        Some(offset)
    } else {
        None
    };

    if let Some(name) = read_string(section, "alignment", "strategy")? {
        config.strategy = AlignmentStrategy::from_name(&name, offset.unwrap_or(DEFAULT_OFFSET))
            .ok_or_else(|| config_error(format!("unknown alignment strategy {name:?}")))?;
    } else if let Some(offset) = offset {
        config.strategy = config.strategy.with_offset(offset);
    }
    config.strategy.validate()?;

    if let Some(axis) = read_string(section, "alignment", "axis")? {
        config.axis = Axis::parse(&axis)
            .ok_or_else(|| config_error(format!("unknown alignment axis {axis:?}")))?;
    }

    read_bool(section, "alignment", "weak_planes", &mut config.weak_planes)
}

fn parse_output_section(section: &JsonValue, config: &mut OutputConfig) -> LemResult<()> {
    if let Some(path) = read_string(section, "output", "nodes")? {
        config.nodes = PathBuf::from(path);
    }
    if let Some(path) = read_string(section, "output", "fracture_pairs")? {
        config.fracture_pairs = PathBuf::from(path);
    }
    if let Some(path) = read_string(section, "output", "weak_plane_pairs")? {
        config.weak_plane_pairs = PathBuf::from(path);
    }
    Ok(())
}

/// Parses run configuration from json text
///
/// Every section and key is optional; missing ones keep their defaults.
pub fn parse_config(contents: &str) -> LemResult<RunConfig> {
    let input = json::parse(contents).map_err(|err| config_error(format!("invalid json: {err}")))?;

    if !input.is_object() {
        return Err(config_error("top level must be a json object".to_owned()));
    }

    let mut config = RunConfig::default();

    for (name, _) in input.entries() {
        if !matches!(name, "parser" | "alignment" | "output") {
            tracing::warn!("ignoring unknown config section {name:?}");
        }
    }

    for name in ["parser", "alignment", "output"] {
        if input.has_key(name) && !input[name].is_object() {
            return Err(config_error(format!("{name} section must be a json object")));
        }
    }

    parse_parser_section(&input["parser"], &mut config.parser)?;
    parse_alignment_section(&input["alignment"], &mut config.alignment)?;
    parse_output_section(&input["output"], &mut config.output)?;

    Ok(config)
}

/// Loads the run configuration file
///
/// # Arguments
/// * `config_file` - The path to the json configuration
///
/// # Returns
/// A RunConfig with defaults filled in for missing keys
pub fn load_config(config_file: &Path) -> LemResult<RunConfig> {
    let contents = std::fs::read_to_string(config_file).map_err(|source| LemError::ConfigRead {
        path: config_file.to_path_buf(),
        source,
    })?;

    let config = parse_config(&contents)?;
    tracing::info!("loaded configuration from {}", config_file.display());
    Ok(config)
}
