//! This module implements the FMI 2.0 ModelDescription datamodel and provides attributes to
//! `yaserde` to generate an XML deserializer.

mod interface_type;
mod model_description;
mod scalar_variable;

pub use interface_type::*;
pub use model_description::*;
pub use scalar_variable::*;
