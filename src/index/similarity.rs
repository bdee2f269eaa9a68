/// L2 norm of a vector
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two vectors
///
/// Mismatched lengths, empty vectors and zero-norm vectors all score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    cosine_similarity_with_norms(a, b, l2_norm(a), l2_norm(b))
}

/// Cosine similarity with both norms already known
pub fn cosine_similarity_with_norms(a: &[f32], b: &[f32], a_norm: f32, b_norm: f32) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let score = dot_product / (a_norm * b_norm);
    // clamp passes NaN through
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(-1.0, 1.0)
}
