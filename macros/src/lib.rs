//! Procedural macros for shapediff
//!
//! Provides `#[derive(Diffable)]` for structs with named fields.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod diffable;

/// Derive `Diffable` for a struct with named fields.
///
/// The struct becomes a record: each field is addressed by name in change
/// paths, in declaration order.
///
/// # Field attributes
///
/// - `#[diff(skip)]`: leave the field out of diffs; patches never touch it
/// - `#[diff(rename = "Name")]`: use `Name` as the field's path segment
///
/// # Example
///
/// ```ignore
/// #[derive(Diffable, Default)]
/// struct Config {
///     #[diff(rename = "Name")]
///     name: String,
///     limits: HashMap<String, u32>,
///     #[diff(skip)]
///     cache: Vec<u8>,
/// }
/// ```
///
/// For generic structs, every non-skipped field type gets a `Diffable` bound.
#[proc_macro_derive(Diffable, attributes(diff))]
pub fn derive_diffable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    diffable::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
