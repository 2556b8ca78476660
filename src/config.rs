use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

use crate::{Error, ModelResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Seed for the sampling policy's RNG. Entropy-seeded when absent.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Maximum nesting of model nodes within one evaluation.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_true")]
    pub validate_return_values: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_depth: default_max_depth(),
            validate_return_values: default_true(),
        }
    }
}

impl EvaluationConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> ModelResult<Self> {
        from_file(path)
    }

    pub fn from_str(s: &str) -> ModelResult<Self> {
        from_str(s)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> ModelResult<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        Error::config(format!(
            "Failed to open config file {}: {}",
            path.display(),
            e
        ))
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> ModelResult<T> {
    serde_json::from_str(s).map_err(|e| Error::config(format!("Failed to parse config: {}", e)))
}

fn default_max_depth() -> usize {
    256
}

fn default_true() -> bool {
    true
}
