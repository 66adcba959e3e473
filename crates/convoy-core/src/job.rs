use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Converter parameters appended after the input/output arguments, in key order.
pub type ConverterOptions = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    identifier: String,
    input_path: PathBuf,
    output_path: PathBuf,
    options: ConverterOptions,
}

impl ConversionJob {
    pub fn new(
        identifier: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        options: ConverterOptions,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            input_path: input_path.into(),
            output_path: output_path.into(),
            options,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// File name of the input, falling back to the identifier.
    pub fn input_name(&self) -> String {
        self.input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.identifier.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(label)
    }
}
