use nalgebra::Vector3;

use crate::{
    datatypes::{Axis, FracturePair},
    error::{LemError, LemResult},
    mesh::Mesh,
};

/// Half-gap of the symmetric push, in mesh units
pub const DEFAULT_OFFSET: f64 = 0.01;

/// Share of the half-span kept between the two global planes
pub const SPAN_FRACTION: f64 = 0.8;

/// How paired centroids are moved off the tagged surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignmentStrategy {
    /// Each pair is centred on its own midpoint and pushed `offset` to
    /// either side along the axis.
    SymmetricPush { offset: f64 },
    /// All pairs are moved onto two shared planes placed around the mean
    /// axis coordinate of every paired centroid.
    GlobalSpan,
}

impl AlignmentStrategy {
    pub fn from_name(name: &str, offset: f64) -> Option<AlignmentStrategy> {
        match name.trim().to_ascii_lowercase().as_str() {
            "symmetric" | "symmetric-push" => Some(AlignmentStrategy::SymmetricPush { offset }),
            "global-span" | "global" => Some(AlignmentStrategy::GlobalSpan),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlignmentStrategy::SymmetricPush { .. } => "symmetric",
            AlignmentStrategy::GlobalSpan => "global-span",
        }
    }

    /// Replaces the push offset. Global span has no offset and is returned
    /// unchanged.
    pub fn with_offset(self, offset: f64) -> AlignmentStrategy {
        match self {
            AlignmentStrategy::SymmetricPush { .. } => AlignmentStrategy::SymmetricPush { offset },
            AlignmentStrategy::GlobalSpan => {
                tracing::warn!("offset has no effect on the global-span strategy");
                self
            }
        }
    }

    pub fn validate(&self) -> LemResult<()> {
        match self {
            AlignmentStrategy::SymmetricPush { offset } if !(offset.is_finite() && *offset > 0.0) => {
                Err(LemError::Config {
                    reason: format!("alignment offset must be a positive number, got {offset}"),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Which pair list of the mesh to align
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Fracture,
    WeakPlane,
}

/// Outcome of an alignment pass.
///
/// `failure` is set when the pass stopped early; pairs aligned before that
/// keep their new centroids.
#[derive(Debug, Default)]
pub struct AlignmentReport {
    pub aligned: usize,
    pub skipped: usize,
    pub failure: Option<LemError>,
}

impl AlignmentReport {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Maps a pair onto element arena indexes
///
/// # Returns
/// `None` for a pair whose first slot is unresolved, which is skipped
fn pair_elements(tetrahedra: &[usize], pair: &FracturePair) -> LemResult<Option<(usize, usize)>> {
    let Some(first) = pair.first else {
        return Ok(None);
    };
    let second = pair.second.ok_or_else(|| LemError::Alignment {
        reason: format!("pair ({first}, unresolved) has no second element"),
    })?;

    let lookup = |slot: usize| {
        tetrahedra.get(slot).copied().ok_or_else(|| LemError::Alignment {
            reason: format!(
                "pair slot {slot} is outside the {} tetrahedra of the mesh",
                tetrahedra.len()
            ),
        })
    };

    Ok(Some((lookup(first)?, lookup(second)?)))
}

fn centroid_at(mesh: &Mesh, element_index: usize) -> LemResult<Vector3<f64>> {
    match mesh.centroid(element_index) {
        Some(c) if c.iter().all(|v| v.is_finite()) => Ok(*c),
        _ => Err(LemError::Alignment {
            reason: format!("element at index {element_index} has no centroid"),
        }),
    }
}

/// Moves both centroids of a pair onto their midpoint, then sets the axis
/// component to `low` or `high`. The element with the larger axis coordinate
/// gets `high`; on a tie the first element gets `low`.
fn place_pair(mesh: &mut Mesh, a: usize, b: usize, axis: Axis, low: f64, high: f64) -> LemResult<()> {
    let k = axis.index();
    let ca = centroid_at(mesh, a)?;
    let cb = centroid_at(mesh, b)?;

    let mid = (ca + cb) / 2.0;
    let mut below = mid;
    let mut above = mid;
    below[k] = low;
    above[k] = high;

    if ca[k] > cb[k] {
        mesh.set_centroid(a, above);
        mesh.set_centroid(b, below);
    } else {
        mesh.set_centroid(a, below);
        mesh.set_centroid(b, above);
    }
    Ok(())
}

fn symmetric_push(
    mesh: &mut Mesh,
    tetrahedra: &[usize],
    pairs: &[FracturePair],
    offset: f64,
    axis: Axis,
    report: &mut AlignmentReport,
) -> LemResult<()> {
    let k = axis.index();

    for pair in pairs {
        let Some((a, b)) = pair_elements(tetrahedra, pair)? else {
            report.skipped += 1;
            continue;
        };

        let mid = (centroid_at(mesh, a)?[k] + centroid_at(mesh, b)?[k]) / 2.0;
        place_pair(mesh, a, b, axis, mid - offset, mid + offset)?;
        report.aligned += 1;
    }
    Ok(())
}

fn global_span(
    mesh: &mut Mesh,
    tetrahedra: &[usize],
    pairs: &[FracturePair],
    axis: Axis,
    report: &mut AlignmentReport,
) -> LemResult<()> {
    let k = axis.index();

    // span of the axis coordinate over every paired centroid, before any
    // centroid moves
    let mut resolved: Vec<(usize, usize)> = Vec::with_capacity(pairs.len());
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut skipped = 0;

    for pair in pairs {
        let Some((a, b)) = pair_elements(tetrahedra, pair)? else {
            skipped += 1;
            continue;
        };
        for value in [centroid_at(mesh, a)?[k], centroid_at(mesh, b)?[k]] {
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }
        resolved.push((a, b));
    }
    report.skipped += skipped;

    if resolved.is_empty() {
        return Ok(());
    }

    let diff = SPAN_FRACTION * (max - min).abs() / 2.0;
    let average = sum / (2 * resolved.len()) as f64;
    tracing::debug!("global span planes at {average} +/- {diff}");

    for (a, b) in resolved {
        place_pair(mesh, a, b, axis, average - diff, average + diff)?;
        report.aligned += 1;
    }
    Ok(())
}

/// Pushes the centroids of every resolved pair off the tagged surface
///
/// Never fails: a problem stops the pass and is returned in the report.
///
/// # Arguments
/// * `mesh` - Mesh whose tetrahedron centroids are moved
/// * `pairs` - Pairs indexing the tetrahedron sequence of `mesh`
/// * `strategy` - Symmetric push or global span
/// * `axis` - Axis along which the centroids are separated
pub fn align(
    mesh: &mut Mesh,
    pairs: &[FracturePair],
    strategy: AlignmentStrategy,
    axis: Axis,
) -> AlignmentReport {
    let mut report = AlignmentReport::default();
    let tetrahedra = mesh.tetrahedra();

    let result = match strategy {
        AlignmentStrategy::SymmetricPush { offset } => {
            symmetric_push(mesh, &tetrahedra, pairs, offset, axis, &mut report)
        }
        AlignmentStrategy::GlobalSpan => global_span(mesh, &tetrahedra, pairs, axis, &mut report),
    };

    if let Err(err) = result {
        tracing::warn!("{err}");
        report.failure = Some(err);
    }

    tracing::info!(
        "{} alignment along {:?}: {} pairs aligned, {} skipped",
        strategy.name(),
        axis,
        report.aligned,
        report.skipped
    );
    report
}

/// Aligns one of the pair lists stored in the mesh
pub fn align_plane(mesh: &mut Mesh, plane: Plane, strategy: AlignmentStrategy, axis: Axis) -> AlignmentReport {
    let pairs = match plane {
        Plane::Fracture => std::mem::take(&mut mesh.fracture_pairs),
        Plane::WeakPlane => std::mem::take(&mut mesh.weak_plane_pairs),
    };

    let report = align(mesh, &pairs, strategy, axis);

    match plane {
        Plane::Fracture => mesh.fracture_pairs = pairs,
        Plane::WeakPlane => mesh.weak_plane_pairs = pairs,
    }
    report
}
