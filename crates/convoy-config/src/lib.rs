mod config;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use convoy_core::{ConvoyError, ConvoyResult};

pub use config::{ConverterConfig, ConvoyConfig, ModelsConfig, OutputConfig};

pub const ENV_CONVERTER: &str = "CONVOY_CONVERTER";
pub const ENV_OPSET: &str = "CONVOY_OPSET";
pub const ENV_TIMEOUT_SECS: &str = "CONVOY_TIMEOUT_SECS";
pub const ENV_MODEL_DIR: &str = "CONVOY_MODEL_DIR";
pub const ENV_OUTPUT_SIMPLE: &str = "CONVOY_OUTPUT_SIMPLE";

/// Every key understood by [`get_config_value`], grouped by table.
pub const CONFIG_KEYS: &[&str] = &[
    "converter.program",
    "converter.args",
    "converter.input_flag",
    "converter.output_flag",
    "converter.opset_flag",
    "converter.opset",
    "converter.timeout_secs",
    "models.dir",
    "models.stem",
    "models.parts",
    "models.input_extension",
    "models.output_extension",
    "output.simple",
];

pub fn config_path() -> ConvoyResult<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ConvoyError::Config("home directory not found".to_string()))?;
    Ok(home.join(".convoy").join("config.toml"))
}

pub fn load_config() -> ConvoyResult<ConvoyConfig> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> ConvoyResult<ConvoyConfig> {
    if !path.exists() {
        return Ok(ConvoyConfig::default());
    }
    let content = fs::read_to_string(path)
        .map_err(|err| ConvoyError::Config(format!("failed to read config: {err}")))?;
    toml::from_str(&content)
        .map_err(|err| ConvoyError::Config(format!("failed to parse config: {err}")))
}

pub fn save_config(config: &ConvoyConfig) -> ConvoyResult<()> {
    save_config_to(&config_path()?, config)
}

pub fn save_config_to(path: &Path, config: &ConvoyConfig) -> ConvoyResult<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|err| ConvoyError::Config(format!("failed to serialize config: {err}")))?;
    write_config_file(path, &content)
}

pub fn resolve_converter_program(config: &ConvoyConfig) -> String {
    resolve_converter_program_with(config, process_env)
}

pub fn resolve_converter_program_with(config: &ConvoyConfig, lookup: impl Fn(&str) -> Option<String>) -> String {
    non_empty(&lookup, ENV_CONVERTER).unwrap_or_else(|| config.converter.program.clone())
}

pub fn resolve_opset(config: &ConvoyConfig) -> ConvoyResult<u32> {
    resolve_opset_with(config, process_env)
}

pub fn resolve_opset_with(config: &ConvoyConfig, lookup: impl Fn(&str) -> Option<String>) -> ConvoyResult<u32> {
    parse_override(ENV_OPSET, non_empty(&lookup, ENV_OPSET), config.converter.opset)
}

pub fn resolve_timeout(config: &ConvoyConfig) -> ConvoyResult<Option<Duration>> {
    resolve_timeout_with(config, process_env)
}

/// A timeout of zero seconds, from either source, disables it.
pub fn resolve_timeout_with(
    config: &ConvoyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ConvoyResult<Option<Duration>> {
    let secs = match non_empty(&lookup, ENV_TIMEOUT_SECS) {
        Some(value) => Some(parse_override(ENV_TIMEOUT_SECS, Some(value), 0u64)?),
        None => config.converter.timeout_secs,
    };
    Ok(secs.filter(|secs| *secs > 0).map(Duration::from_secs))
}

pub fn resolve_model_dir(config: &ConvoyConfig) -> PathBuf {
    resolve_model_dir_with(config, process_env)
}

pub fn resolve_model_dir_with(config: &ConvoyConfig, lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    non_empty(&lookup, ENV_MODEL_DIR)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.models.dir.clone())
}

pub fn resolve_simple_output(config: &ConvoyConfig) -> Option<bool> {
    resolve_simple_output_with(config, process_env)
}

pub fn resolve_simple_output_with(
    config: &ConvoyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<bool> {
    non_empty(&lookup, ENV_OUTPUT_SIMPLE)
        .map(|value| parse_flag(&value))
        .or(config.output.simple)
}

/// Reads a dotted key such as `converter.opset`.
pub fn get_config_value(config: &ConvoyConfig, key_path: &str) -> Option<String> {
    let parts: Vec<&str> = key_path.split('.').collect();

    match parts.as_slice() {
        ["converter", "program"] => Some(config.converter.program.clone()),
        ["converter", "args"] => Some(config.converter.args.join(" ")),
        ["converter", "input_flag"] => Some(config.converter.input_flag.clone()),
        ["converter", "output_flag"] => Some(config.converter.output_flag.clone()),
        ["converter", "opset_flag"] => Some(config.converter.opset_flag.clone()),
        ["converter", "opset"] => Some(config.converter.opset.to_string()),
        ["converter", "timeout_secs"] => config.converter.timeout_secs.map(|secs| secs.to_string()),
        ["models", "dir"] => Some(config.models.dir.display().to_string()),
        ["models", "stem"] => Some(config.models.stem.clone()),
        ["models", "parts"] => Some(config.models.parts.join(",")),
        ["models", "input_extension"] => Some(config.models.input_extension.clone()),
        ["models", "output_extension"] => Some(config.models.output_extension.clone()),
        ["output", "simple"] => config.output.simple.map(|b| b.to_string()),
        _ => None,
    }
}

pub fn set_config_value(key_path: &str, value: &str) -> ConvoyResult<()> {
    set_config_value_at(&config_path()?, key_path, value)
}

pub fn set_config_value_at(path: &Path, key_path: &str, value: &str) -> ConvoyResult<()> {
    let content = if path.exists() {
        fs::read_to_string(path)
            .map_err(|err| ConvoyError::Config(format!("failed to read config: {err}")))?
    } else {
        String::new()
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|err| ConvoyError::Config(format!("failed to parse config: {err}")))?;

    let parts: Vec<&str> = key_path.split('.').collect();
    let Some((last_part, parents)) = parts.split_last() else {
        return Err(ConvoyError::Config("empty key path".to_string()));
    };
    if parents.is_empty() {
        return Err(ConvoyError::Config(
            "key path must have at least 2 parts (e.g., 'converter.opset')".to_string(),
        ));
    }

    let mut current = doc.as_table_mut();
    for part in parents {
        current = current
            .entry(part)
            .or_insert(toml_edit::Item::Table(Default::default()))
            .as_table_mut()
            .ok_or_else(|| {
                ConvoyError::Config(format!("cannot set nested value in '{key_path}'"))
            })?;
    }
    current[*last_part] = typed_value(key_path, value);

    let updated = doc.to_string();
    toml::from_str::<ConvoyConfig>(&updated)
        .map_err(|err| ConvoyError::Config(format!("invalid value for '{key_path}': {err}")))?;
    write_config_file(path, &updated)
}

pub fn open_in_editor() -> ConvoyResult<()> {
    let path = config_path()?;
    if !path.exists() {
        save_config_to(&path, &ConvoyConfig::default())?;
    }

    let editor = env::var("EDITOR").unwrap_or_else(|_| {
        if cfg!(target_os = "windows") {
            "notepad".to_string()
        } else if cfg!(target_os = "macos") {
            "vim".to_string()
        } else {
            "nano".to_string()
        }
    });

    let status = Command::new(&editor)
        .arg(&path)
        .status()
        .map_err(|err| ConvoyError::Config(format!("failed to open editor '{editor}': {err}")))?;

    if !status.success() {
        return Err(ConvoyError::Config(format!(
            "editor exited with status: {status}"
        )));
    }

    Ok(())
}

fn write_config_file(path: &Path, content: &str) -> ConvoyResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| ConvoyError::Config(format!("failed to create config dir: {err}")))?;
    }
    fs::write(path, content)
        .map_err(|err| ConvoyError::Config(format!("failed to write config: {err}")))
}

fn typed_value(key_path: &str, value: &str) -> toml_edit::Item {
    match key_path {
        "converter.args" => toml_edit::value(split_list(value, ' ')),
        "models.parts" => toml_edit::value(split_list(value, ',')),
        "converter.opset" | "converter.timeout_secs" => match value.trim().parse::<i64>() {
            Ok(number) => toml_edit::value(number),
            Err(_) => toml_edit::value(value),
        },
        "output.simple" => match value.trim().parse::<bool>() {
            Ok(flag) => toml_edit::value(flag),
            Err(_) => toml_edit::value(value),
        },
        _ => toml_edit::value(value),
    }
}

fn split_list(value: &str, separator: char) -> toml_edit::Array {
    value
        .split(separator)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

fn process_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|value| !value.trim().is_empty())
}

fn parse_override<T: std::str::FromStr>(name: &str, value: Option<String>, fallback: T) -> ConvoyResult<T> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConvoyError::Config(format!("{name} must be a number, got '{value}'"))),
        None => Ok(fallback),
    }
}

fn parse_flag(value: &str) -> bool {
    let normalized = value.to_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ConvoyConfig::default());
        assert_eq!(config.converter.opset, 13);
        assert_eq!(config.models.parts, vec!["1", "2"]);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[converter]\nopset = 17\n\n[models]\nstem = \"net\"\n").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.converter.opset, 17);
        assert_eq!(config.converter.program, "python");
        assert_eq!(config.models.stem, "net");
        assert_eq!(config.models.output_extension, "onnx");
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[converter\n").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConvoyError::Config(_))));
    }

    #[test]
    fn test_save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = ConvoyConfig::default();
        config.converter.timeout_secs = Some(30);
        config.output.simple = Some(true);

        save_config_to(&path, &config).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_set_value_writes_typed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        set_config_value_at(&path, "converter.opset", "15").unwrap();
        set_config_value_at(&path, "output.simple", "true").unwrap();
        set_config_value_at(&path, "models.parts", "a, b,c").unwrap();
        set_config_value_at(&path, "converter.program", "tf2onnx").unwrap();
        set_config_value_at(&path, "models.stem", "128").unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.converter.opset, 15);
        assert_eq!(config.output.simple, Some(true));
        assert_eq!(config.models.parts, vec!["a", "b", "c"]);
        assert_eq!(config.converter.program, "tf2onnx");
        assert_eq!(config.models.stem, "128");
    }

    #[test]
    fn test_set_value_rejects_bad_keys_and_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        assert!(matches!(
            set_config_value_at(&path, "opset", "13"),
            Err(ConvoyError::Config(_))
        ));
        assert!(matches!(
            set_config_value_at(&path, "converter.opset", "latest"),
            Err(ConvoyError::Config(_))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_get_value_reads_dotted_keys() {
        let config = ConvoyConfig::default();
        assert_eq!(get_config_value(&config, "converter.opset").as_deref(), Some("13"));
        assert_eq!(get_config_value(&config, "models.parts").as_deref(), Some("1,2"));
        assert_eq!(get_config_value(&config, "converter.timeout_secs"), None);
        assert_eq!(get_config_value(&config, "nope.key"), None);
        for key in CONFIG_KEYS.iter().filter(|key| !key.ends_with("timeout_secs") && !key.starts_with("output")) {
            assert!(get_config_value(&config, key).is_some(), "{key}");
        }
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: Vec<(String, String)> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |name: &str| {
            vars.iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
        }
    }

    fn file_config() -> ConvoyConfig {
        let mut config = ConvoyConfig::default();
        config.converter.program = "python3".to_string();
        config.converter.opset = 15;
        config.converter.timeout_secs = Some(120);
        config.models.dir = PathBuf::from("/srv/models");
        config.output.simple = Some(false);
        config
    }

    #[test]
    fn test_resolve_env_wins_over_file() {
        let env = env_of(&[
            (ENV_CONVERTER, "/opt/venv/bin/python"),
            (ENV_OPSET, "17"),
            (ENV_TIMEOUT_SECS, "30"),
            (ENV_MODEL_DIR, "/tmp/models"),
            (ENV_OUTPUT_SIMPLE, "yes"),
        ]);
        let config = file_config();

        assert_eq!(resolve_converter_program_with(&config, &env), "/opt/venv/bin/python");
        assert_eq!(resolve_opset_with(&config, &env).unwrap(), 17);
        assert_eq!(
            resolve_timeout_with(&config, &env).unwrap(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(resolve_model_dir_with(&config, &env), PathBuf::from("/tmp/models"));
        assert_eq!(resolve_simple_output_with(&config, &env), Some(true));
    }

    #[test]
    fn test_resolve_file_wins_over_default() {
        let env = env_of(&[]);
        let config = file_config();

        assert_eq!(resolve_converter_program_with(&config, &env), "python3");
        assert_eq!(resolve_opset_with(&config, &env).unwrap(), 15);
        assert_eq!(
            resolve_timeout_with(&config, &env).unwrap(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(resolve_model_dir_with(&config, &env), PathBuf::from("/srv/models"));
        assert_eq!(resolve_simple_output_with(&config, &env), Some(false));
    }

    #[test]
    fn test_resolve_defaults_without_env_or_file() {
        let env = env_of(&[]);
        let config = ConvoyConfig::default();

        assert_eq!(resolve_converter_program_with(&config, &env), "python");
        assert_eq!(resolve_opset_with(&config, &env).unwrap(), 13);
        assert_eq!(resolve_timeout_with(&config, &env).unwrap(), None);
        assert_eq!(
            resolve_model_dir_with(&config, &env),
            PathBuf::from("./pretrained_models")
        );
        assert_eq!(resolve_simple_output_with(&config, &env), None);
    }

    #[test]
    fn test_resolve_empty_env_value_falls_through() {
        let env = env_of(&[
            (ENV_CONVERTER, ""),
            (ENV_OPSET, "  "),
            (ENV_TIMEOUT_SECS, ""),
            (ENV_MODEL_DIR, " "),
            (ENV_OUTPUT_SIMPLE, ""),
        ]);
        let config = file_config();

        assert_eq!(resolve_converter_program_with(&config, &env), "python3");
        assert_eq!(resolve_opset_with(&config, &env).unwrap(), 15);
        assert_eq!(
            resolve_timeout_with(&config, &env).unwrap(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(resolve_model_dir_with(&config, &env), PathBuf::from("/srv/models"));
        assert_eq!(resolve_simple_output_with(&config, &env), Some(false));
    }

    #[test]
    fn test_resolve_zero_timeout_disables_it() {
        let config = file_config();
        assert_eq!(
            resolve_timeout_with(&config, env_of(&[(ENV_TIMEOUT_SECS, "0")])).unwrap(),
            None
        );

        let mut config = ConvoyConfig::default();
        config.converter.timeout_secs = Some(0);
        assert_eq!(resolve_timeout_with(&config, env_of(&[])).unwrap(), None);
    }

    #[test]
    fn test_resolve_bad_numeric_env_is_config_error() {
        let env = env_of(&[(ENV_OPSET, "latest"), (ENV_TIMEOUT_SECS, "soon")]);
        let config = ConvoyConfig::default();

        assert!(matches!(resolve_opset_with(&config, &env), Err(ConvoyError::Config(_))));
        assert!(matches!(resolve_timeout_with(&config, &env), Err(ConvoyError::Config(_))));
    }

    #[test]
    fn test_numeric_override_parses_or_falls_back() {
        assert_eq!(parse_override("X", Some(" 17 ".to_string()), 13u32).unwrap(), 17);
        assert_eq!(parse_override("X", None, 13u32).unwrap(), 13);
        assert!(matches!(
            parse_override("X", Some("abc".to_string()), 13u32),
            Err(ConvoyError::Config(_))
        ));
    }

    #[test]
    fn test_flag_parsing_accepts_common_truthy_values() {
        assert!(parse_flag("1"));
        assert!(parse_flag("YES"));
        assert!(parse_flag("true"));
        assert!(!parse_flag("off"));
    }
}
