use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{
    datatypes::FracturePair,
    error::{LemError, LemResult},
    mesh::Mesh,
};

fn create(path: &Path) -> LemResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| LemError::Output {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes one `x\ty\tz` row per tetrahedron centroid
///
/// Rows follow the tetrahedron sequence, so row `i` is the node that pair
/// slot `i` refers to.
pub fn write_nodes_to<W: Write>(mesh: &Mesh, out: &mut W) -> std::io::Result<usize> {
    let mut rows = 0;
    for index in mesh.tetrahedra() {
        if let Some(c) = mesh.centroid(index) {
            writeln!(out, "{:<10}\t{:<10}\t{:<10}", c.x, c.y, c.z)?;
            rows += 1;
        }
    }
    Ok(rows)
}

/// Writes one `first second` row per pair, unresolved slots as 4294967295
pub fn write_pairs_to<W: Write>(pairs: &[FracturePair], out: &mut W) -> std::io::Result<()> {
    for pair in pairs {
        let (first, second) = pair.to_wire();
        writeln!(out, "{first} {second}")?;
    }
    Ok(())
}

/// Writes the lattice nodes file
///
/// # Arguments
/// * `mesh` - The mesh after alignment
/// * `nodes_output` - The filename of the output nodes file
pub fn write_nodes(mesh: &Mesh, nodes_output: &Path) -> LemResult<()> {
    let output_error = |source: std::io::Error| LemError::Output {
        path: nodes_output.to_path_buf(),
        source,
    };

    let mut file = create(nodes_output)?;
    let rows = write_nodes_to(mesh, &mut file).map_err(output_error)?;
    file.flush().map_err(output_error)?;

    tracing::info!("wrote {} nodes to {}", rows, nodes_output.display());
    Ok(())
}

/// Writes a pairs file
///
/// # Arguments
/// * `pairs` - Fracture or weak-plane pairs
/// * `pairs_output` - The filename of the output pairs file
pub fn write_pairs(pairs: &[FracturePair], pairs_output: &Path) -> LemResult<()> {
    let output_error = |source: std::io::Error| LemError::Output {
        path: pairs_output.to_path_buf(),
        source,
    };

    let mut file = create(pairs_output)?;
    write_pairs_to(pairs, &mut file).map_err(output_error)?;
    file.flush().map_err(output_error)?;

    tracing::info!("wrote {} pairs to {}", pairs.len(), pairs_output.display());
    Ok(())
}
