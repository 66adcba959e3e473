use serde::{Deserialize, Serialize};

use crate::error::ConvoyError;
use crate::job::{ConversionJob, JobState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub job: ConversionJob,
    pub succeeded: bool,
    pub message: String,
    pub elapsed_ms: u64,
}

impl ConversionResult {
    pub fn success(job: ConversionJob, elapsed_ms: u64) -> Self {
        let message = format!("output written to {}", job.output_path().display());
        Self {
            job,
            succeeded: true,
            message,
            elapsed_ms,
        }
    }

    pub fn failure(job: ConversionJob, error: &ConvoyError, elapsed_ms: u64) -> Self {
        Self {
            job,
            succeeded: false,
            message: error.to_string(),
            elapsed_ms,
        }
    }

    pub fn state(&self) -> JobState {
        if self.succeeded {
            JobState::Succeeded
        } else {
            JobState::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_results(results: &[ConversionResult]) -> Self {
        let succeeded = results.iter().filter(|result| result.succeeded).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    /// An empty batch counts as successful.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}
