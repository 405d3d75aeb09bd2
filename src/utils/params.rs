//! Parameter file loading
//!
//! Parameter structs are plain serde types; this module only turns a TOML
//! file on disk into one of them.

use std::fs::read_to_string;
use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot load the parameter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error),
}

/// Load a parameter struct from a TOML file
pub fn load<P, F>(param_file_path: F) -> Result<P, LoadError>
where
    P: DeserializeOwned,
    F: AsRef<Path>,
{
    let params_str = read_to_string(param_file_path).map_err(LoadError::FileLoadError)?;

    from_toml_str(&params_str)
}

/// Parse a parameter struct from TOML text
pub fn from_toml_str<P: DeserializeOwned>(params_str: &str) -> Result<P, LoadError> {
    toml::from_str(params_str).map_err(LoadError::DeserialiseError)
}
