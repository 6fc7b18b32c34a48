#![doc=include_str!( "../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
#![deny(clippy::all)]

/// The FMI 2.0 C API, resolved from the FMU's shared library at runtime.
#[cfg(feature = "fmi2")]
pub mod fmi2;
