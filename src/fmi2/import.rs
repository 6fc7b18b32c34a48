use std::{
    collections::HashMap,
    io::Read,
    path::{Path, PathBuf},
    str::FromStr,
};

use fmi_schema::minimal::MinModelDescription;

use super::{
    binding,
    instance::Instance,
    schema::{self, FmuKind},
};
use crate::Error;

const MODEL_DESCRIPTION: &str = "modelDescription.xml";

/// The only FMI version this crate can drive.
pub const FMI_VERSION: &str = "2.0";

/// An FMU extracted into its own temporary directory, with a parsed model description.
///
/// The directory is removed when the import is dropped.
#[derive(Debug)]
pub struct Fmi2Import {
    /// Path to the unzipped FMU on disk
    dir: tempfile::TempDir,
    /// Parsed raw-schema model description
    model_description: schema::Fmi2ModelDescription,
}

impl Fmi2Import {
    /// Extract the FMU archive at `path` into `<tmp_root>/<instance_name>_<random>` and parse its
    /// model description.
    ///
    /// Archives that are not FMI 2.0, or that do not implement Co-Simulation, are rejected
    /// before any native code is loaded.
    pub fn from_path(
        path: impl AsRef<Path>,
        tmp_root: impl AsRef<Path>,
        instance_name: &str,
    ) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|err| {
            Error::Config(format!("cannot open FMU {}: {err}", path.display()))
        })?;
        let mut archive = zip::ZipArchive::new(file)?;

        std::fs::create_dir_all(tmp_root.as_ref())?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{instance_name}_"))
            .tempdir_in(tmp_root.as_ref())?;
        log::trace!("Extracting {} into {:?}", path.display(), dir.path());
        archive.extract(dir.path())?;

        Self::from_dir(dir)
    }

    /// Parse the model description of an already extracted FMU.
    pub fn from_dir(dir: tempfile::TempDir) -> Result<Self, Error> {
        let descr_file_path = dir.path().join(MODEL_DESCRIPTION);
        let mut descr_file = std::fs::File::open(&descr_file_path)
            .map_err(|_| Error::ArchiveStructure(format!("missing {MODEL_DESCRIPTION}")))?;
        let mut descr_buf = String::new();
        let descr_size = descr_file.read_to_string(&mut descr_buf)?;
        log::trace!("Read {descr_size} bytes from {MODEL_DESCRIPTION}");

        // Initial non-version-specific model description
        let descr = MinModelDescription::from_str(&descr_buf)?;
        log::trace!(
            "Found FMI {} named '{}'",
            descr.fmi_version,
            descr.model_name
        );
        if descr.fmi_version != FMI_VERSION {
            match descr.major_version() {
                Ok(major) => log::error!("'{}' targets FMI {major}", descr.model_name),
                Err(err) => log::error!("'{}': {err}", descr.model_name),
            }
            return Err(Error::UnsupportedFmiVersion(descr.fmi_version));
        }

        let model_description = schema::Fmi2ModelDescription::from_str(&descr_buf)?;
        if !model_description
            .kind()
            .is_some_and(FmuKind::supports_co_simulation)
        {
            return Err(Error::UnsupportedFmuType("CoSimulation".to_owned()));
        }

        Ok(Self {
            dir,
            model_description,
        })
    }

    #[inline]
    pub fn archive_path(&self) -> &Path {
        self.dir.path()
    }

    /// Path to the `resources` directory of the extracted FMU
    pub fn resource_path(&self) -> PathBuf {
        self.archive_path().join("resources")
    }

    pub fn model_description(&self) -> &schema::Fmi2ModelDescription {
        &self.model_description
    }

    /// Names and value references of the `Real` variables, the only ones this crate reads and
    /// writes. Value references are only unique per base type, so variables of other types are
    /// left out rather than aliased onto a `Real` with the same number.
    pub fn real_value_references(&self) -> HashMap<String, binding::fmi2ValueReference> {
        self.model_description
            .model_variables()
            .filter(|var| var.is_real())
            .map(|var| (var.name.clone(), var.value_reference))
            .collect()
    }

    /// The Co-Simulation model identifier, which is also the base name of the shared library.
    pub fn model_identifier(&self) -> Result<&str, Error> {
        self.model_description
            .co_simulation
            .as_ref()
            .map(|cs| cs.model_identifier.as_str())
            .ok_or_else(|| Error::UnsupportedFmuType("CoSimulation".to_owned()))
    }

    /// Get the path to the shared library, relative to the archive root
    pub fn shared_lib_path(&self, model_identifier: &str) -> Result<PathBuf, Error> {
        let platform_folder = match (std::env::consts::OS, std::env::consts::ARCH) {
            ("windows", "x86_64") => "win64",
            ("windows", "x86") => "win32",
            ("linux", "x86_64") => "linux64",
            ("linux", "x86") => "linux32",
            ("macos", "x86_64") => "darwin64",
            ("macos", "x86") => "darwin32",
            _ => {
                return Err(Error::UnsupportedPlatform {
                    os: std::env::consts::OS.to_string(),
                    arch: std::env::consts::ARCH.to_string(),
                });
            }
        };
        let fname = format!("{model_identifier}{}", std::env::consts::DLL_SUFFIX);
        Ok(PathBuf::from("binaries").join(platform_folder).join(fname))
    }

    /// Load the plugin shared library and return the raw bindings.
    pub fn binding(&self, model_identifier: &str) -> Result<binding::Fmi2Binding, Error> {
        let lib_path = self
            .archive_path()
            .join(self.shared_lib_path(model_identifier)?);
        if !lib_path.exists() {
            return Err(Error::ArchiveStructure(format!(
                "no binary for this platform at {}",
                lib_path.display()
            )));
        }
        log::trace!("Loading shared library {lib_path:?}");
        let binding = unsafe { binding::Fmi2Binding::new(&lib_path) }?;
        let missing = binding.missing_symbols();
        if !missing.is_empty() {
            return Err(Error::ArchiveStructure(format!(
                "{} does not export {}",
                lib_path.display(),
                missing.join(", ")
            )));
        }
        Ok(binding)
    }

    /// Get a `String` representation of the resources path for this FMU
    ///
    /// As per the FMI standard, the resource location is a IETF URI to the resources directory.
    pub fn canonical_resource_path_string(&self) -> Result<String, Error> {
        let resource_path = std::path::absolute(self.resource_path())?;
        url::Url::from_file_path(&resource_path)
            .map(|url| url.as_str().to_owned())
            .map_err(|_| {
                Error::ArchiveStructure(format!(
                    "cannot form resource URL from {}",
                    resource_path.display()
                ))
            })
    }

    /// Create a new instance of the FMU for Co-Simulation
    pub fn instantiate_cs(
        self,
        instance_name: &str,
        visible: bool,
        logging_on: bool,
    ) -> Result<Instance, Error> {
        Instance::new(self, instance_name, visible, logging_on)
    }
}
