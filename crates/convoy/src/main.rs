use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use console::style;
use convoy_config::{
    CONFIG_KEYS, ConvoyConfig, config_path, get_config_value, load_config, open_in_editor,
    resolve_converter_program, resolve_model_dir, resolve_opset, resolve_simple_output,
    resolve_timeout, set_config_value,
};
use convoy_core::{
    ConversionJob, ConversionResult, ConverterOptions, ConvoyError, ConvoyResult, StemTemplate,
    Summary,
};
use convoy_driver::{BatchConversionDriver, CommandConverter, ConverterOutput, Reporter};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Open config file in editor
    Edit,
    /// Print the config file location
    Path,
}

#[derive(Debug, Parser)]
#[command(name = "convoy")]
#[command(version, about = "Batch model converter", long_about = None)]
struct Cli {
    /// Directory holding the input models; outputs are written next to them
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,
    /// File name stem shared by every model (`<stem>_<id>.<ext>`)
    #[arg(long)]
    stem: Option<String>,
    /// Target operator set version
    #[arg(long)]
    opset: Option<u32>,
    /// Kill a conversion after this many seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
    /// Converter executable; its arguments still come from the config file
    #[arg(long, value_name = "PROGRAM")]
    converter: Option<String>,
    /// Append the converter's own output to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    converter_log: Option<PathBuf>,
    /// Read additional identifiers from a file, one per line
    #[arg(long, value_name = "FILE")]
    input: Option<PathBuf>,
    /// Print only the paths of written outputs
    #[arg(long)]
    simple: bool,
    /// Print results as JSON
    #[arg(long, conflicts_with = "simple")]
    json: bool,
    /// Show the commands that would run without running them
    #[arg(long)]
    dry_run: bool,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[arg(value_name = "IDENTIFIER")]
    identifiers: Vec<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Everything a batch needs, after merging flags, env overrides and the config file.
#[derive(Debug)]
struct Settings {
    identifiers: Vec<String>,
    template: StemTemplate,
    converter: CommandConverter,
    options: ConverterOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    Simple,
    Json,
}

struct ConsoleReporter {
    mode: OutputMode,
}

impl Reporter for ConsoleReporter {
    fn job_started(&mut self, job: &ConversionJob) {
        if self.mode == OutputMode::Full {
            println!("{}", style(format!("--- Converting {} ---", job.input_name())).cyan());
        }
    }

    fn job_finished(&mut self, result: &ConversionResult) {
        match (self.mode, result.succeeded) {
            (OutputMode::Json, _) => {}
            (OutputMode::Simple, true) => println!("{}", result.job.output_path().display()),
            (OutputMode::Full, true) => println!("{} {}", style("✓").green(), result.message),
            (_, false) => eprintln!(
                "{} {}: {}",
                style("Failed").red(),
                result.job.identifier(),
                result.message
            ),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: Summary,
    results: &'a [ConversionResult],
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(Commands::Config { action }) = cli.command {
        if let Err(err) = handle_config_command(action) {
            fail(&err);
        }
        return;
    }

    let config = load_config().unwrap_or_else(|err| fail(&err));
    let settings = resolve_settings(&cli, &config).unwrap_or_else(|err| fail(&err));
    let mode = output_mode(&cli, &config);
    let driver = BatchConversionDriver::new(settings.converter);

    if cli.dry_run {
        let skipped = print_plan(&driver, &settings.identifiers, &settings.template, &settings.options);
        if skipped > 0 {
            std::process::exit(1);
        }
        return;
    }

    let mut reporter = ConsoleReporter { mode };
    let results = driver.run_with_reporter(
        &settings.identifiers,
        &settings.template,
        &settings.options,
        &mut reporter,
    );
    let summary = Summary::from_results(&results);

    if mode == OutputMode::Json {
        let report = JsonReport {
            summary,
            results: &results,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => fail(&ConvoyError::Serialize(err.to_string())),
        }
    } else {
        print_summary(&summary);
    }

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, EnvFilter::try_from_env("CONVOY_LOG").ok()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// `-v` flags win over `CONVOY_LOG`; with neither, failures still log at `warn`.
fn log_filter(verbose: u8, from_env: Option<EnvFilter>) -> EnvFilter {
    match verbose {
        0 => from_env.unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    }
}

fn fail(err: &ConvoyError) -> ! {
    eprintln!("{} {err}", style("Error:").red());
    std::process::exit(1);
}

fn output_mode(cli: &Cli, config: &ConvoyConfig) -> OutputMode {
    if cli.json {
        OutputMode::Json
    } else if cli.simple || resolve_simple_output(config).unwrap_or(false) {
        OutputMode::Simple
    } else {
        OutputMode::Full
    }
}

fn resolve_settings(cli: &Cli, config: &ConvoyConfig) -> ConvoyResult<Settings> {
    let identifiers = gather_identifiers(cli, config)?;

    let dir = cli.dir.clone().unwrap_or_else(|| resolve_model_dir(config));
    let stem = cli.stem.clone().unwrap_or_else(|| config.models.stem.clone());
    let template = StemTemplate::new(dir, stem).with_extensions(
        config.models.input_extension.clone(),
        config.models.output_extension.clone(),
    );

    let timeout = match cli.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => resolve_timeout(config)?,
    };
    let program = cli
        .converter
        .clone()
        .unwrap_or_else(|| resolve_converter_program(config));
    if program.trim().is_empty() {
        return Err(ConvoyError::Config("converter program is empty".to_string()));
    }
    let converter = CommandConverter::new(program)
        .with_args(config.converter.args.iter().cloned())
        .with_flags(
            config.converter.input_flag.clone(),
            config.converter.output_flag.clone(),
        )
        .with_timeout(timeout)
        .with_output(
            cli.converter_log
                .clone()
                .map(ConverterOutput::File)
                .unwrap_or_default(),
        );
    debug!(
        program = converter.program(),
        timeout = ?converter.timeout(),
        output = ?converter.output(),
        "converter configured"
    );

    let opset = match cli.opset {
        Some(opset) => opset,
        None => resolve_opset(config)?,
    };
    let mut options = ConverterOptions::new();
    if !config.converter.opset_flag.is_empty() {
        options.insert(config.converter.opset_flag.clone(), opset.to_string());
    }

    Ok(Settings {
        identifiers,
        template,
        converter,
        options,
    })
}

fn gather_identifiers(cli: &Cli, config: &ConvoyConfig) -> ConvoyResult<Vec<String>> {
    let mut identifiers = cli.identifiers.clone();

    if let Some(path) = &cli.input {
        let content = fs::read_to_string(path).map_err(|err| {
            ConvoyError::InvalidInput(format!("failed to read input file: {err}"))
        })?;
        identifiers.extend(parse_lines(&content));
    }

    if identifiers.is_empty() {
        identifiers = config.models.parts.clone();
    }
    Ok(identifiers)
}

fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect()
}

fn handle_config_command(action: ConfigAction) -> ConvoyResult<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = load_config()?;
            match get_config_value(&config, &key) {
                Some(v) => println!("{} = {}", key, v),
                None => println!("{} = <null>", key),
            }
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            set_config_value(&key, &value)?;
            println!("{} Set {} = {}", style("✓").green(), key, value);
            Ok(())
        }
        ConfigAction::List => {
            let config = load_config()?;
            println!("Current configuration:");
            let mut section = "";
            for &key in CONFIG_KEYS {
                let (table, name) = key.split_once('.').unwrap_or(("", key));
                if table != section {
                    println!("\n[{table}]");
                    section = table;
                }
                let value = get_config_value(&config, key);
                println!("{name} = {}", value.as_deref().unwrap_or("<null>"));
            }
            Ok(())
        }
        ConfigAction::Edit => open_in_editor(),
        ConfigAction::Path => {
            println!("{}", config_path()?.display());
            Ok(())
        }
    }
}

/// Prints the planned commands and returns how many identifiers could not be resolved.
fn print_plan(
    driver: &BatchConversionDriver<CommandConverter>,
    identifiers: &[String],
    template: &StemTemplate,
    options: &ConverterOptions,
) -> usize {
    let mut skipped = 0;
    for (identifier, job) in driver.plan(identifiers, template, options) {
        match job {
            Ok(job) => println!("{}", driver.converter().command_line(&job)),
            Err(err) => {
                skipped += 1;
                eprintln!("{} {identifier}: {err}", style("Skipped").yellow());
            }
        }
    }
    skipped
}

fn print_summary(summary: &Summary) {
    println!(
        "{} Total: {} | Success: {} | Failed: {}",
        style("Summary:").bold(),
        summary.total,
        summary.succeeded,
        summary.failed
    );
}
