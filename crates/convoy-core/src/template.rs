use std::path::{Component, Path, PathBuf};

use crate::error::{ConvoyError, ConvoyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Input,
    Output,
}

/// Maps an identifier to the path of its source or produced artifact.
///
/// Implementations must be deterministic: the same identifier and kind always
/// resolve to the same path.
pub trait PathTemplate {
    fn resolve(&self, identifier: &str, kind: PathKind) -> ConvoyResult<PathBuf>;
}

impl<F> PathTemplate for F
where
    F: Fn(&str, PathKind) -> ConvoyResult<PathBuf>,
{
    fn resolve(&self, identifier: &str, kind: PathKind) -> ConvoyResult<PathBuf> {
        self(identifier, kind)
    }
}

/// `<dir>/<stem>_<identifier>.<extension>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StemTemplate {
    pub dir: PathBuf,
    pub stem: String,
    pub input_extension: String,
    pub output_extension: String,
}

impl StemTemplate {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            input_extension: "tflite".to_string(),
            output_extension: "onnx".to_string(),
        }
    }

    pub fn with_extensions(mut self, input: impl Into<String>, output: impl Into<String>) -> Self {
        self.input_extension = input.into();
        self.output_extension = output.into();
        self
    }

    fn file_name(&self, identifier: &str, extension: &str) -> String {
        let base = if self.stem.is_empty() {
            identifier.to_string()
        } else {
            format!("{}_{}", self.stem, identifier)
        };
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            base
        } else {
            format!("{base}.{extension}")
        }
    }
}

impl PathTemplate for StemTemplate {
    fn resolve(&self, identifier: &str, kind: PathKind) -> ConvoyResult<PathBuf> {
        validate_identifier(identifier)?;
        let extension = match kind {
            PathKind::Input => &self.input_extension,
            PathKind::Output => &self.output_extension,
        };
        Ok(self.dir.join(self.file_name(identifier, extension)))
    }
}

fn validate_identifier(identifier: &str) -> ConvoyResult<()> {
    if identifier.trim().is_empty() {
        return Err(ConvoyError::PathResolution(
            "identifier must not be empty".to_string(),
        ));
    }
    let mut components = Path::new(identifier).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_normal || identifier.contains(['/', '\\']) {
        return Err(ConvoyError::PathResolution(format!(
            "identifier '{identifier}' must be a plain file name component"
        )));
    }
    Ok(())
}
