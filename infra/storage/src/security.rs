use crate::error::StorageError;
use std::path::{Component, Path};

/// Whether `value` is empty or whitespace only.
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Ensures `value` can be used verbatim as exactly one directory or file name.
///
/// Identifiers, qualifiers, filenames, and request ids all end up as path segments
/// under the store root, so anything that could add, remove, or escape a level is
/// rejected: separators, `.`/`..`, absolute prefixes, and NUL bytes.
pub(crate) fn validate_segment(kind: &'static str, value: &str) -> Result<(), StorageError> {
    if is_blank(value) {
        return Err(StorageError::Validation {
            message: format!("{kind} cannot be blank").into(),
            context: None,
        });
    }

    if value.contains(['/', '\\', '\0']) {
        return Err(StorageError::Validation {
            message: value.to_owned().into(),
            context: Some(format!("{kind} contains illegal characters").into()),
        });
    }

    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StorageError::Validation {
            message: value.to_owned().into(),
            context: Some(format!("{kind} must be a single path segment").into()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_segments() {
        for value in ["abc123", "doc.txt", "overview", "a b", "x.tar.gz"] {
            assert!(validate_segment("id", value).is_ok(), "{value} should be accepted");
        }
    }

    #[test]
    fn rejects_traversal_and_separators() {
        for value in ["", "   ", ".", "..", "a/b", "..\\x", "/etc", "a\0b"] {
            let err = validate_segment("id", value).expect_err("segment should be rejected");
            assert!(err.is_validation(), "{value:?} gave {err:?}");
        }
    }
}
