use crate::engine::EngineError;
use procflow_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

pub const PROCESSING_FAILED: &str = "Processing failed. See the log for details.";

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Input(#[from] CoreError),
    #[error("Input file not found: {}", .0.display())]
    MissingFile(PathBuf),
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("No dataset loaded")]
    NoData,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Layout unavailable: {0}")]
    Layout(String),
    #[error("Worker failed: {0}")]
    Worker(String),
    #[error("Settings error for {}: {message}", path.display())]
    Settings { path: PathBuf, message: String },
}

impl AppError {
    /// Input errors are fixable by the user and keep their message.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            AppError::Input(_)
                | AppError::MissingFile(_)
                | AppError::UnknownNode(_)
                | AppError::NoData
                | AppError::Engine(EngineError::MissingInput(_))
                | AppError::Engine(EngineError::InvalidFilter(_))
        )
    }

    /// Text safe to show to an end user. Detail of anything that is not an
    /// input error is logged instead.
    pub fn user_message(&self) -> String {
        if self.is_input() {
            return self.to_string();
        }
        tracing::error!("{}", self);
        match self {
            AppError::Layout(_) => "Layout unavailable.".to_string(),
            _ => PROCESSING_FAILED.to_string(),
        }
    }
}
