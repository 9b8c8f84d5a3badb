use thiserror::Error;

/// Errors that stop a decoding session.
///
/// Damage below the header level (illegal coefficient codes, vectors
/// pointing outside the picture) never surfaces here; it is counted
/// instead, see [`crate::Decoder::corruption_count`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed sequence header: {0}")]
    SequenceHeader(&'static str),

    #[error("malformed picture header: {0}")]
    PictureHeader(&'static str),

    #[error("malformed extension (id {id}): {reason}")]
    Extension { id: u8, reason: &'static str },

    #[error("unsupported stream feature: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous call failed with a structural error.
    #[error("decoding session terminated by an earlier error")]
    Terminated,
}

pub type Result<T> = std::result::Result<T, DecodeError>;
