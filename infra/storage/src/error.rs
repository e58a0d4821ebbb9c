use std::borrow::Cow;

/// Errors produced by the content store.
///
/// Callers usually only need the coarse classes exposed by
/// [`StorageError::is_not_found`] and [`StorageError::is_storage_failure`].
#[depot_derive::depot_error]
pub enum StorageError {
    /// Malformed item or request (blank id, unsafe path segment, unparsable URI).
    #[error("Invalid content item{}: {message}", format_context(.context))]
    Validation { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Content not found{}: {message}", format_context(.context))]
    NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The on-disk layout no longer matches what the store wrote.
    #[error("Content store corrupted{}: {message}", format_context(.context))]
    Corruption { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// One or more items of a commit could not be published.
    #[error("Publish failed{}: {message}", format_context(.context))]
    Publish { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Malformed external reference{}: {source}", format_context(.context))]
    Reference { source: url::ParseError, context: Option<Cow<'static, str>> },

    #[error("Unsupported operation{}: {message}", format_context(.context))]
    Unsupported { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Configuration failure{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },

    #[cfg(feature = "remote")]
    #[error("Remote reference failure{}: {source}", format_context(.context))]
    Remote { source: reqwest::Error, context: Option<Cow<'static, str>> },
}

impl StorageError {
    pub(crate) fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Validation { message: message.into(), context: None }
    }

    pub(crate) fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::NotFound { message: message.into(), context: None }
    }

    pub(crate) fn corruption(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Corruption { message: message.into(), context: None }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. })
    }

    /// I/O-level failures while staging, publishing, or cleaning up.
    #[must_use]
    pub const fn is_storage_failure(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Publish { .. } | Self::Reference { .. } => true,
            #[cfg(feature = "remote")]
            Self::Remote { .. } => true,
            _ => false,
        }
    }
}
