use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpriteError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("failed to allocate {requested} bytes of instance data for texture group {texture}")]
    GpuAllocation { texture: u32, requested: u64 },
}

impl SpriteError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        SpriteError::InvalidArgument(message.into())
    }

    pub(crate) fn out_of_range(message: impl Into<String>) -> Self {
        SpriteError::OutOfRange(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SpriteError>;
