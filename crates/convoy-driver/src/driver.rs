use std::path::PathBuf;
use std::time::Instant;

use convoy_core::{
    ConversionJob, ConversionResult, ConverterOptions, ConvoyError, ConvoyResult, JobState,
    PathKind, PathTemplate,
};
use tracing::{debug, info, warn};

use crate::converter::Converter;

/// Observes a batch as it runs. Both hooks are called once per identifier, in order.
pub trait Reporter {
    fn job_started(&mut self, _job: &ConversionJob) {}
    fn job_finished(&mut self, _result: &ConversionResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Converts identifiers one at a time, turning every per-job error into a failed result.
#[derive(Debug, Clone)]
pub struct BatchConversionDriver<C> {
    converter: C,
}

impl<C: Converter> BatchConversionDriver<C> {
    pub fn new(converter: C) -> Self {
        Self { converter }
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn run<S, T>(
        &self,
        identifiers: &[S],
        template: &T,
        options: &ConverterOptions,
    ) -> Vec<ConversionResult>
    where
        S: AsRef<str>,
        T: PathTemplate + ?Sized,
    {
        self.run_with_reporter(identifiers, template, options, &mut SilentReporter)
    }

    pub fn run_with_reporter<S, T>(
        &self,
        identifiers: &[S],
        template: &T,
        options: &ConverterOptions,
        reporter: &mut dyn Reporter,
    ) -> Vec<ConversionResult>
    where
        S: AsRef<str>,
        T: PathTemplate + ?Sized,
    {
        let mut results = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let result = self.attempt(identifier.as_ref(), template, options, reporter);
            reporter.job_finished(&result);
            results.push(result);
        }
        info!(
            total = results.len(),
            failed = results.iter().filter(|result| !result.succeeded).count(),
            "batch finished"
        );
        results
    }

    /// Resolves every job without invoking the converter.
    pub fn plan<S, T>(
        &self,
        identifiers: &[S],
        template: &T,
        options: &ConverterOptions,
    ) -> Vec<(String, ConvoyResult<ConversionJob>)>
    where
        S: AsRef<str>,
        T: PathTemplate + ?Sized,
    {
        identifiers
            .iter()
            .map(|identifier| {
                let identifier = identifier.as_ref();
                let job = resolve_job(identifier, template, options).and_then(|job| {
                    check_output_parent(&job)?;
                    Ok(job)
                });
                (identifier.to_string(), job)
            })
            .collect()
    }

    fn attempt<T>(
        &self,
        identifier: &str,
        template: &T,
        options: &ConverterOptions,
        reporter: &mut dyn Reporter,
    ) -> ConversionResult
    where
        T: PathTemplate + ?Sized,
    {
        let started = Instant::now();
        let (job, prepared) = match resolve_job(identifier, template, options) {
            Ok(job) => {
                let prepared = check_output_parent(&job);
                (job, prepared)
            }
            Err(err) => (
                ConversionJob::new(identifier, PathBuf::new(), PathBuf::new(), options.clone()),
                Err(err),
            ),
        };

        debug!(identifier, state = %JobState::Pending, "job resolved");
        reporter.job_started(&job);

        let outcome = prepared.and_then(|()| {
            debug!(identifier, state = %JobState::Running, "invoking converter");
            self.converter.invoke(&job)
        });
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(()) => ConversionResult::success(job, elapsed_ms),
            Err(err) => {
                warn!(identifier, error = %err, "conversion failed");
                ConversionResult::failure(job, &err, elapsed_ms)
            }
        };
        debug!(identifier, state = %result.state(), elapsed_ms, "job finished");
        result
    }
}

fn resolve_job<T>(
    identifier: &str,
    template: &T,
    options: &ConverterOptions,
) -> ConvoyResult<ConversionJob>
where
    T: PathTemplate + ?Sized,
{
    let input = template.resolve(identifier, PathKind::Input)?;
    let output = template.resolve(identifier, PathKind::Output)?;
    if input.as_os_str().is_empty() || output.as_os_str().is_empty() {
        return Err(ConvoyError::PathResolution(format!(
            "template produced an empty path for '{identifier}'"
        )));
    }
    if input == output {
        return Err(ConvoyError::PathResolution(format!(
            "input and output resolve to the same path: {}",
            input.display()
        )));
    }
    Ok(ConversionJob::new(identifier, input, output, options.clone()))
}

/// Output directories are never created; a missing one fails the job before launch.
fn check_output_parent(job: &ConversionJob) -> ConvoyResult<()> {
    let Some(parent) = job.output_path().parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(());
    }
    Err(ConvoyError::PathResolution(format!(
        "output directory does not exist: {}",
        parent.display()
    )))
}
