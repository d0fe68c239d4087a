//! Vector arithmetic over embeddings.
//!
//! All similarity math in the crate goes through these helpers so that the
//! zero-vector case is handled in exactly one place.

/// Magnitudes below this are treated as zero.
pub const ZERO_MAGNITUDE_EPSILON: f32 = 1e-8;

/// Tolerance used when checking that a vector is unit length.
pub const UNIT_TOLERANCE: f32 = 1e-4;

/// Euclidean norm of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Dot product over the common prefix of two vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let ma = magnitude(a);
    let mb = magnitude(b);
    if ma < ZERO_MAGNITUDE_EPSILON || mb < ZERO_MAGNITUDE_EPSILON {
        return 0.0;
    }
    dot(a, b) / (ma * mb)
}

/// Normalize to unit length.
///
/// Returns `None` for a zero-magnitude (or empty) vector instead of
/// dividing by zero or handing the zero vector back unchanged.
pub fn normalize(v: &[f32]) -> Option<Vec<f32>> {
    let m = magnitude(v);
    if v.is_empty() || m < ZERO_MAGNITUDE_EPSILON || !m.is_finite() {
        return None;
    }
    Some(v.iter().map(|x| x / m).collect())
}

/// Whether the vector has unit length within [`UNIT_TOLERANCE`].
pub fn is_unit(v: &[f32]) -> bool {
    (magnitude(v) - 1.0).abs() <= UNIT_TOLERANCE
}

/// Running weighted average: `(old * old_weight + new * new_weight) / total`,
/// re-normalized to unit length.
///
/// Returns `None` if the blend cancels out to a zero vector (two exactly
/// opposite inputs of equal weight).
pub fn weighted_blend(
    old: &[f32],
    old_weight: f32,
    new: &[f32],
    new_weight: f32,
) -> Option<Vec<f32>> {
    let total = old_weight + new_weight;
    if total <= 0.0 || old.len() != new.len() {
        return None;
    }
    let blended: Vec<f32> = old
        .iter()
        .zip(new.iter())
        .map(|(o, n)| (o * old_weight + n * new_weight) / total)
        .collect();
    normalize(&blended)
}

/// Normalized mean of a set of vectors, each scaled by a weight.
///
/// Used for the aggregate embedding of an axiom set. Returns `None` for an
/// empty set or when the weighted sum is zero.
pub fn weighted_mean<'a, I>(vectors: I) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = (&'a [f32], f32)>,
{
    let mut acc: Option<Vec<f32>> = None;
    for (v, w) in vectors {
        match acc.as_mut() {
            None => acc = Some(v.iter().map(|x| x * w).collect()),
            Some(sum) => {
                if sum.len() != v.len() {
                    continue;
                }
                for (s, x) in sum.iter_mut().zip(v.iter()) {
                    *s += x * w;
                }
            }
        }
    }
    acc.and_then(|sum| normalize(&sum))
}
