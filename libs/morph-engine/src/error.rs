use morph_api::error::ConvertError;

#[derive(Debug, thiserror::Error)]
pub enum AdaptError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("type mismatch: converter produced {found}, expected {expected}")]
    TypeMismatch { expected: &'static str, found: &'static str },

    #[error("converter failed: {0}")]
    Converter(#[source] ConvertError),

    #[error("validation failed: {0}")]
    Validator(#[source] ConvertError),

    #[error("decode failure: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("encode failure: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("field {field}: {source}")]
    Field {
        field: &'static str,
        source: Box<AdaptError>,
    },

    #[error("{stage} additional data: {source}")]
    AdditionalData {
        stage: &'static str,
        source: Box<AdaptError>,
    },
}

/// Coarse classification of an [`AdaptError`], independent of context wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    TypeMismatch,
    /// A converter or validator rejected a value.
    Conversion,
    Decode,
    Encode,
}

impl AdaptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdaptError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AdaptError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            AdaptError::Converter(_) | AdaptError::Validator(_) => ErrorKind::Conversion,
            AdaptError::Decode(_) => ErrorKind::Decode,
            AdaptError::Encode(_) => ErrorKind::Encode,
            AdaptError::Field { source, .. } | AdaptError::AdditionalData { source, .. } => source.kind(),
        }
    }

    /// Attach the destination member the error occurred on.
    pub fn with_field(self, field: &'static str) -> Self {
        AdaptError::Field {
            field,
            source: Box::new(self),
        }
    }

    pub(crate) fn in_stage(self, stage: &'static str) -> Self {
        AdaptError::AdditionalData {
            stage,
            source: Box::new(self),
        }
    }

    /// Member name the error is attributed to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            AdaptError::Field { field, .. } => Some(*field),
            AdaptError::AdditionalData { source, .. } => source.field(),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid adapter options: {0}")]
    Parse(#[from] toml::de::Error),
}
