//! Similarity math for the in-memory backend.

use ev_core::DistanceMetric;

#[inline]
pub fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[inline]
fn norm(v: &[f32]) -> f32 {
    inner_product(v, v).sqrt()
}

/// In [-1, 1]; 0 when either side is the zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    inner_product(a, b) / denom
}

/// Scale `v` to unit length. The zero vector is left as is.
pub fn normalize_vector(v: &mut [f32]) {
    let n = norm(v);
    if n > 0.0 {
        v.iter_mut().for_each(|x| *x /= n);
    }
}

/// Similarity score, higher = more similar.
/// Euclidean maps to 1 / (1 + l2²) so every metric ranks descending.
pub fn compute_score(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Euclidean => 1.0 / (1.0 + l2_squared(a, b)),
        DistanceMetric::DotProduct => inner_product(a, b),
        DistanceMetric::Cosine => cosine_similarity(a, b),
    }
}
