use thiserror::Error;

/// Errors raised while assembling, publishing or inspecting a manifest list.
#[derive(Error, Debug)]
pub enum ListError {
    /// Malformed or unqualified image reference
    #[error("Invalid image reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    /// Member lives on a different registry host than the target
    #[error("Cannot use source images from a different registry than the target image: {registry} != {target_registry} ({image})")]
    CrossRegistry {
        image: String,
        registry: String,
        target_registry: String,
    },

    /// Member resolves to a manifest list or index
    #[error("Cannot include an image in a manifest list/index which is already a multi-platform image (manifest lists do not allow recursion): {image}")]
    RecursiveList { image: String },

    /// Member resolves to content that is neither a manifest nor a list
    #[error("Unsupported media type '{media_type}' for image {image}")]
    UnsupportedMediaType { image: String, media_type: String },

    /// Resolved platform is not on the allow-list
    #[error("Manifest entry for image {image} has unsupported os/arch or os/arch/variant combination: {platform}")]
    UnsupportedPlatform { image: String, platform: String },

    /// Computed digest does not match the expected one
    #[error("Digest mismatch during {stage} of {subject}: expected {expected}, got {actual}")]
    DigestMismatch {
        stage: String,
        subject: String,
        expected: String,
        actual: String,
    },

    /// Referenced content does not exist on the registry
    #[error("Image not found: {image} - {message}")]
    NotFound { image: String, message: String },

    /// Every member was skipped or none were given
    #[error("No manifest list to push: {0}")]
    EmptyList(String),

    /// Container registry error
    #[error("Registry error: {registry} - {message}")]
    RegistryError { registry: String, message: String },

    /// Cross-repository blob mount rejected
    #[error("Couldn't mount blob {digest} from {source_repository} for cross-repository push: {message}")]
    MountFailed {
        source_repository: String,
        digest: String,
        message: String,
    },

    /// Manifest push rejected
    #[error("Error pushing {stage} to {reference}: {message}")]
    PushFailed {
        stage: String,
        reference: String,
        message: String,
    },

    /// Same digest stored twice with different content
    #[error("Content store conflict: {digest} already holds different bytes")]
    StoreConflict { digest: String },

    /// Operation cancelled before completion
    #[error("Operation cancelled during {0}")]
    Cancelled(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ListError {
    /// Whether this error means the referenced content does not exist.
    ///
    /// Only these errors may be downgraded to warnings when missing members
    /// are ignored.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ListError::NotFound { .. })
    }
}

impl From<serde_json::Error> for ListError {
    fn from(err: serde_json::Error) -> Self {
        ListError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ListError {
    fn from(err: serde_yaml::Error) -> Self {
        ListError::SerializationError(err.to_string())
    }
}

/// Result type alias for manifest list operations
pub type Result<T> = std::result::Result<T, ListError>;
