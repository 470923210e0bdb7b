//! Client for the external mining engine.
//!
//! The engine is a batch program that prints progress noise followed by a
//! single JSON document on its last non-empty stdout line. Failures are a
//! non-zero exit status with the detail on stderr.

use procflow_core::{CaseTrace, CoreError, EngineOutput, FileFormat, FilterConfig, Histogram};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error(transparent)]
    InvalidFilter(#[from] CoreError),
    #[error("Failed to start engine `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("Engine exited with status {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },
    #[error("Engine produced invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Engine produced no output")]
    EmptyOutput,
}

/// Program plus leading arguments, e.g. `python3 processor.py`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for EngineCommand {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            args: vec!["processor.py".to_string()],
        }
    }
}

pub trait MiningEngine: Send + Sync {
    /// Mine the log at `input` under `filter`.
    fn process(
        &self,
        input: &Path,
        format: FileFormat,
        filter: &FilterConfig,
    ) -> Result<EngineOutput, EngineError>;

    /// Resolve one case id to its activity sequence.
    fn case_trace(
        &self,
        input: &Path,
        format: FileFormat,
        case_id: &str,
    ) -> Result<CaseTrace, EngineError>;

    /// Duration distribution for one `(source, target)` edge, or global.
    fn histogram(
        &self,
        input: &Path,
        format: FileFormat,
        edge: Option<(&str, &str)>,
    ) -> Result<Histogram, EngineError>;
}

pub struct ProcessEngine {
    command: EngineCommand,
}

impl ProcessEngine {
    pub fn new(command: EngineCommand) -> Self {
        Self { command }
    }

    fn base_args(input: &Path, format: FileFormat) -> Vec<String> {
        vec![
            "--format".to_string(),
            format.as_arg().to_string(),
            "--input-path".to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    fn invoke<T: DeserializeOwned>(&self, input: &Path, args: Vec<String>) -> Result<T, EngineError> {
        if !input.exists() {
            return Err(EngineError::MissingInput(input.to_path_buf()));
        }

        let started = Instant::now();
        tracing::info!("Running mining engine {} on {:?}", self.command.program, input);
        let output = Command::new(&self.command.program)
            .args(&self.command.args)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| EngineError::Spawn {
                program: self.command.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(
                "Mining engine exited with {:?}: {}",
                output.status.code(),
                stderr
            );
            return Err(EngineError::Exit {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or(EngineError::EmptyOutput)?;
        let parsed = serde_json::from_str(line.trim()).map_err(|e| {
            tracing::error!("Mining engine output is not valid JSON: {}", e);
            EngineError::InvalidJson(e.to_string())
        })?;
        tracing::info!("Mining engine finished in {:?}", started.elapsed());
        Ok(parsed)
    }
}

impl MiningEngine for ProcessEngine {
    fn process(
        &self,
        input: &Path,
        format: FileFormat,
        filter: &FilterConfig,
    ) -> Result<EngineOutput, EngineError> {
        let args = filter.to_engine_args(input, format)?;
        self.invoke(input, args)
    }

    fn case_trace(
        &self,
        input: &Path,
        format: FileFormat,
        case_id: &str,
    ) -> Result<CaseTrace, EngineError> {
        let mut args = Self::base_args(input, format);
        args.extend(["--case-id".to_string(), case_id.to_string()]);
        self.invoke(input, args)
    }

    fn histogram(
        &self,
        input: &Path,
        format: FileFormat,
        edge: Option<(&str, &str)>,
    ) -> Result<Histogram, EngineError> {
        let mut args = Self::base_args(input, format);
        args.push("--histogram".to_string());
        if let Some((source, target)) = edge {
            args.extend([
                "--source".to_string(),
                source.to_string(),
                "--target".to_string(),
                target.to_string(),
            ]);
        }
        self.invoke(input, args)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::NamedTempFile;

    /// An engine that runs `script` through `sh`; engine arguments land in `$@`.
    fn shell(script: &str) -> ProcessEngine {
        ProcessEngine::new(EngineCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string(), "engine".to_string()],
        })
    }

    fn filter() -> FilterConfig {
        FilterConfig::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[test]
    fn test_process_parses_last_json_line() {
        let input = NamedTempFile::new().unwrap();
        let engine = shell(
            r#"printf 'Loading log...\n{"graphData":[{"Source_Activity":"A","Target_Activity":"B","Weight_Value":3}],"startActivities":["A"],"endActivities":["B"]}\n\n'"#,
        );
        let output = engine.process(input.path(), FileFormat::Csv, &filter()).unwrap();
        assert_eq!(output.graph_data.len(), 1);
        assert_eq!(output.start_activities, vec!["A".to_string()]);
        assert!(output.variants.is_empty());
    }

    #[test]
    fn test_filter_is_passed_as_arguments() {
        let input = NamedTempFile::new().unwrap();
        let engine = shell(r#"printf '{"args": "%s"}\n' "$*""#);
        let args = filter().to_engine_args(input.path(), FileFormat::Csv).unwrap();
        let echoed: serde_json::Value = engine.invoke(input.path(), args).unwrap();
        let echoed = echoed["args"].as_str().unwrap();
        assert!(echoed.contains("--start-date 2024-01-01"));
        assert!(echoed.contains("--time-unit d"));
    }

    #[test]
    fn test_non_zero_exit_carries_stderr() {
        let input = NamedTempFile::new().unwrap();
        let err = shell("echo boom >&2; exit 3")
            .process(input.path(), FileFormat::Csv, &filter())
            .unwrap_err();
        match err {
            EngineError::Exit { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "boom");
            }
            other => panic!("Expected Exit, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let input = NamedTempFile::new().unwrap();
        let err = shell("echo not-json")
            .case_trace(input.path(), FileFormat::Csv, "c1")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidJson(_)));
    }

    #[test]
    fn test_empty_output_is_an_error() {
        let input = NamedTempFile::new().unwrap();
        let err = shell("true")
            .histogram(input.path(), FileFormat::Csv, None)
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyOutput));
    }

    #[test]
    fn test_missing_input_is_rejected_before_spawning() {
        let engine = ProcessEngine::new(EngineCommand {
            program: "procflow-no-such-program".to_string(),
            args: Vec::new(),
        });
        let err = engine
            .process(Path::new("/nonexistent/log.csv"), FileFormat::Csv, &filter())
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingInput(_)));
    }

    #[test]
    fn test_invalid_filter_is_rejected_before_spawning() {
        let input = NamedTempFile::new().unwrap();
        let err = shell("exit 1")
            .process(input.path(), FileFormat::Csv, &FilterConfig::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidFilter(CoreError::MissingDateRange)));
    }
}
