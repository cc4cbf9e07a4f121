//! Control-side parameter registry: flat-named values with clamping,
//! JSON presets, and the seeded randomizer.

pub mod random;
pub mod store;

use std::fmt;

pub use random::{generate_patterns, randomize, Lcg64};
pub use store::{param_def, ParamDef, ParamDomain, ParamStore, PARAM_DEFS};

#[derive(Debug)]
pub enum PresetError {
    /// The document is not valid JSON.
    Parse(serde_json::Error),
    /// The document parsed but is not a JSON object.
    NotAnObject,
    /// A recognized key holds a value of the wrong type.
    InvalidValue(String),
}

impl fmt::Display for PresetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresetError::Parse(err) => write!(f, "preset is not valid JSON: {err}"),
            PresetError::NotAnObject => write!(f, "preset must be a JSON object"),
            PresetError::InvalidValue(key) => {
                write!(f, "preset key {key:?} holds a non-numeric value")
            }
        }
    }
}

impl std::error::Error for PresetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PresetError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PresetError {
    fn from(err: serde_json::Error) -> Self {
        PresetError::Parse(err)
    }
}
