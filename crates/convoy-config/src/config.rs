use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub program: String,
    pub args: Vec<String>,
    pub input_flag: String,
    pub output_flag: String,
    pub opset_flag: String,
    pub opset: u32,
    pub timeout_secs: Option<u64>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["-m".to_string(), "tf2onnx.convert".to_string()],
            input_flag: "--tflite".to_string(),
            output_flag: "--output".to_string(),
            opset_flag: "--opset".to_string(),
            opset: 13,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub dir: PathBuf,
    pub stem: String,
    pub parts: Vec<String>,
    pub input_extension: String,
    pub output_extension: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./pretrained_models"),
            stem: "dtln_aec_128".to_string(),
            parts: vec!["1".to_string(), "2".to_string()],
            input_extension: "tflite".to_string(),
            output_extension: "onnx".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub simple: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvoyConfig {
    pub converter: ConverterConfig,
    pub models: ModelsConfig,
    pub output: OutputConfig,
}
