//! Dimension Normalizer (C6)

/// Errors raised when a provider-returned vector cannot be normalized.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding vector is empty")]
    Empty,

    #[error("embedding vector contains a non-finite value")]
    NonFinite,
}

/// Pad with zeros or truncate `vec` to exactly `dimension` elements.
///
/// Validates that `vec` is non-empty and every element is finite before
/// touching its length.
pub fn normalize_dimension(vec: &[f32], dimension: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vec.is_empty() {
        return Err(EmbeddingError::Empty);
    }
    if vec.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::NonFinite);
    }

    Ok(match vec.len().cmp(&dimension) {
        std::cmp::Ordering::Equal => vec.to_vec(),
        std::cmp::Ordering::Less => {
            let mut padded = vec.to_vec();
            padded.resize(dimension, 0.0);
            padded
        }
        std::cmp::Ordering::Greater => vec[..dimension].to_vec(),
    })
}
