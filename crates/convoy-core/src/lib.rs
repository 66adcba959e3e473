mod error;
mod job;
mod result;
mod template;

pub use error::{ConvoyError, ConvoyResult};
pub use job::{ConversionJob, ConverterOptions, JobState};
pub use result::{ConversionResult, Summary};
pub use template::{PathKind, PathTemplate, StemTemplate};
