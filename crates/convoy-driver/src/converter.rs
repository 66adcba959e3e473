use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use convoy_core::{ConversionJob, ConvoyError, ConvoyResult};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs the external tool for one job. `Ok(())` means the tool reported success.
pub trait Converter {
    fn invoke(&self, job: &ConversionJob) -> ConvoyResult<()>;
}

impl<C: Converter + ?Sized> Converter for &C {
    fn invoke(&self, job: &ConversionJob) -> ConvoyResult<()> {
        (**self).invoke(job)
    }
}

/// Where the converter's own stdout and stderr go. Never the CLI's stdout,
/// which carries the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConverterOutput {
    /// stdout is redirected to our stderr; stderr is inherited.
    #[default]
    Stderr,
    /// Both streams are appended to a log file.
    File(PathBuf),
}

impl ConverterOutput {
    fn stdio(&self) -> ConvoyResult<(Stdio, Stdio)> {
        match self {
            ConverterOutput::Stderr => Ok((Stdio::from(io::stderr()), Stdio::inherit())),
            ConverterOutput::File(path) => {
                let open_error = |err: io::Error| {
                    ConvoyError::Launch(format!(
                        "failed to open converter log {}: {err}",
                        path.display()
                    ))
                };
                let stdout = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(open_error)?;
                let stderr = stdout.try_clone().map_err(open_error)?;
                Ok((Stdio::from(stdout), Stdio::from(stderr)))
            }
        }
    }
}

/// Launches `program args… input_flag <input> output_flag <output> [key value]…`
/// and classifies the outcome by exit status alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
    input_flag: String,
    output_flag: String,
    timeout: Option<Duration>,
    output: ConverterOutput,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input_flag: String::new(),
            output_flag: String::new(),
            timeout: None,
            output: ConverterOutput::default(),
        }
    }

    /// `python -m tf2onnx.convert --tflite <input> --output <output>`
    pub fn tf2onnx() -> Self {
        Self::new("python")
            .with_args(["-m", "tf2onnx.convert"])
            .with_flags("--tflite", "--output")
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Empty flags pass the path as a bare positional argument.
    pub fn with_flags(mut self, input_flag: impl Into<String>, output_flag: impl Into<String>) -> Self {
        self.input_flag = input_flag.into();
        self.output_flag = output_flag.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_output(mut self, output: ConverterOutput) -> Self {
        self.output = output;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn output(&self) -> &ConverterOutput {
        &self.output
    }

    pub fn arguments(&self, job: &ConversionJob) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        if !self.input_flag.is_empty() {
            argv.push(OsString::from(&self.input_flag));
        }
        argv.push(job.input_path().as_os_str().to_owned());
        if !self.output_flag.is_empty() {
            argv.push(OsString::from(&self.output_flag));
        }
        argv.push(job.output_path().as_os_str().to_owned());
        for (key, value) in job.options() {
            argv.push(OsString::from(key));
            if !value.is_empty() {
                argv.push(OsString::from(value));
            }
        }
        argv
    }

    /// Shell-like rendering of the invocation, for logs and dry runs.
    pub fn command_line(&self, job: &ConversionJob) -> String {
        std::iter::once(OsString::from(&self.program))
            .chain(self.arguments(job))
            .map(|arg| quote(&arg.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Converter for CommandConverter {
    fn invoke(&self, job: &ConversionJob) -> ConvoyResult<()> {
        debug!(identifier = job.identifier(), command = %self.command_line(job), "launching converter");
        let (stdout, stderr) = self.output.stdio()?;
        let child = Command::new(&self.program)
            .args(self.arguments(job))
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(|err| launch_error(&self.program, &err))?;

        let mut child = ChildGuard::new(child);
        let status = child.wait(self.timeout)?;
        classify(status)
    }
}

/// Owns a spawned converter until it has been reaped; dropping it early kills the process.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    fn wait(&mut self, timeout: Option<Duration>) -> ConvoyResult<ExitStatus> {
        let Some(limit) = timeout else {
            let status = self.child.wait().map_err(wait_error)?;
            self.reaped = true;
            return Ok(status);
        };

        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = self.child.try_wait().map_err(wait_error)? {
                self.reaped = true;
                return Ok(status);
            }
            let now = Instant::now();
            if now >= deadline {
                debug!(pid = self.child.id(), "converter timed out, killing");
                self.terminate();
                return Err(ConvoyError::Timeout);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn classify(status: ExitStatus) -> ConvoyResult<()> {
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(ConvoyError::ConversionFailure(code)),
        None => Err(ConvoyError::Terminated),
    }
}

fn launch_error(program: &str, err: &io::Error) -> ConvoyError {
    match err.kind() {
        io::ErrorKind::NotFound => {
            ConvoyError::Launch(format!("converter executable not found: {program}"))
        }
        io::ErrorKind::PermissionDenied => {
            ConvoyError::Launch(format!("converter is not executable: {program}"))
        }
        _ => ConvoyError::Launch(format!("failed to launch '{program}': {err}")),
    }
}

fn wait_error(err: io::Error) -> ConvoyError {
    ConvoyError::Launch(format!("failed to wait for converter: {err}"))
}

fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\\\""))
}
