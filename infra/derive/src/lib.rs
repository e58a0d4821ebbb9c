#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the depot infrastructure crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! depot-derive = { path = "../derive" }
//! thiserror = "2"
//! ```

mod error;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Turns a plain enum into a context-aware error type.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` unless already present.
/// * **Context Support**: Generates a companion `<Name>Ext` trait that adds `.context(...)`
///   to `Result<T, Name>` and to `Result<T, Source>` for every wrapped source type.
/// * **Conversions**: Implements `From<Source>` for variants with a `source` field
///   (or a field marked `#[source]`/`#[from]`), so `?` works on upstream errors.
/// * **Internal Fallback**: Adds `From<&'static str>` and `From<String>` when an
///   `Internal { message, context }` variant exists.
/// * **Formatting Helper**: Emits `format_context(&Option<Cow<'static, str>>)` for use in
///   `#[error(...)]` strings, rendering ` (context)` or nothing.
///
/// # Requirements
///
/// 1. Applies to **enums** only.
/// 2. Every variant uses named fields.
/// 3. A variant with a source must also declare `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use depot_derive::depot_error;
/// use std::borrow::Cow;
///
/// #[depot_error]
/// pub enum BlobError {
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal fault{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn load(path: &std::path::Path) -> Result<Vec<u8>, BlobError> {
///     std::fs::read(path).context("Reading blob")
/// }
/// ```
#[proc_macro_attribute]
pub fn depot_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    error::expand(input).into()
}
