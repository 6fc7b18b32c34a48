#![doc=include_str!( "../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
#![deny(unsafe_code)]
#![deny(clippy::all)]

use std::fmt;

use thiserror::Error;

#[cfg(feature = "fmi2")]
pub mod fmi2;
pub mod minimal;

/// Revision of the FMI standard an archive was exported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MajorVersion {
    FMI1 = 1,
    FMI2 = 2,
    FMI3 = 3,
}

impl MajorVersion {
    pub fn from_major(major: u64) -> Result<Self, Error> {
        match major {
            1 => Ok(Self::FMI1),
            2 => Ok(Self::FMI2),
            3 => Ok(Self::FMI3),
            major => Err(Error::UnknownMajorVersion(major)),
        }
    }

    /// The `fmiVersion` attribute written by exporters of this revision.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FMI1 => "1.0",
            Self::FMI2 => "2.0",
            Self::FMI3 => "3.0",
        }
    }
}

impl fmt::Display for MajorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("No variable named {0} in the model description")]
    VariableNotFound(String),

    #[error("Invalid fmiVersion: {0}")]
    Semver(#[from] lenient_semver::parser::OwnedError),

    #[error("Unknown FMI major version {0}")]
    UnknownMajorVersion(u64),

    #[error("Malformed model description: {0}")]
    XmlParse(String),
}

/// Parse a model description element from XML.
pub fn deserialize<T: yaserde::YaDeserialize>(xml: &str) -> Result<T, Error> {
    yaserde::de::from_str(xml).map_err(Error::XmlParse)
}
