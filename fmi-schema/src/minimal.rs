//! Minimal FMI definitions for determining FMI version.

use std::str::FromStr;

use yaserde_derive::YaDeserialize;

use crate::MajorVersion;

/// A minimal model description that only contains the FMI version and model name.
///
/// This is parsed first so that an archive can be rejected before the full, version-specific
/// description is deserialized.
#[derive(Default, PartialEq, Debug, YaDeserialize)]
#[yaserde(rename = "fmiModelDescription")]
pub struct MinModelDescription {
    #[yaserde(attribute = true, rename = "fmiVersion")]
    pub fmi_version: String,
    #[yaserde(attribute = true, rename = "modelName")]
    pub model_name: String,
}

impl MinModelDescription {
    /// Returns the parsed FMI version as a semver::Version
    pub fn version(&self) -> Result<semver::Version, crate::Error> {
        lenient_semver::parse(&self.fmi_version).map_err(|e| e.owned().into())
    }

    /// The revision of the standard the archive claims to follow.
    pub fn major_version(&self) -> Result<MajorVersion, crate::Error> {
        MajorVersion::from_major(self.version()?.major)
    }
}

impl FromStr for MinModelDescription {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::deserialize(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_version() {
        let md: MinModelDescription =
            r#"<fmiModelDescription fmiVersion="2.0" modelName="PT2" guid="{x}"/>"#
                .parse()
                .unwrap();
        assert_eq!(md.model_name, "PT2");
        assert_eq!(md.major_version().unwrap(), MajorVersion::FMI2);

        let md: MinModelDescription =
            r#"<fmiModelDescription fmiVersion="3.0-beta.2" modelName="PT2"/>"#
                .parse()
                .unwrap();
        assert_eq!(md.major_version().unwrap(), MajorVersion::FMI3);
    }

    #[test]
    fn test_unknown_major() {
        let md = MinModelDescription {
            fmi_version: "7.1".to_owned(),
            model_name: "Future".to_owned(),
        };
        assert_eq!(
            md.major_version(),
            Err(crate::Error::UnknownMajorVersion(7))
        );
    }
}
