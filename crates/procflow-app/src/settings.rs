use crate::engine::EngineCommand;
use crate::error::AppError;
use procflow_graph::{LayoutOptions, Palette, PathFinder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub engine: EngineCommand,
    pub palette: Palette,
    pub layout: LayoutOptions,
    pub pathfinding: PathFinder,
    /// Paths shown per result page.
    pub page_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            engine: EngineCommand::default(),
            palette: Palette::default(),
            layout: LayoutOptions::default(),
            pathfinding: PathFinder::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppSettings {
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("procflow").join("settings.json"))
    }

    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::info!("No config directory available, using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        tracing::info!("Loading settings from {:?}", path);
        if !path.exists() {
            tracing::info!("Settings file not found, using defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<AppSettings>(&content) {
                Ok(settings) => {
                    tracing::info!("Settings loaded successfully: {:?}", settings);
                    return settings.sanitized();
                }
                Err(e) => tracing::error!("Failed to parse settings: {}", e),
            },
            Err(e) => tracing::error!("Failed to read settings file: {}", e),
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), AppError> {
        let path = Self::settings_path().ok_or_else(|| AppError::Settings {
            path: PathBuf::from("settings.json"),
            message: "no config directory available".to_string(),
        })?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        let settings_error = |message: String| AppError::Settings {
            path: path.to_path_buf(),
            message,
        };
        if let Some(dir) = path.parent()
            && !dir.exists()
        {
            std::fs::create_dir_all(dir).map_err(|e| settings_error(e.to_string()))?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| settings_error(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| settings_error(e.to_string()))
    }

    /// Zero page sizes and path limits are replaced by their defaults.
    pub(crate) fn sanitized(mut self) -> Self {
        if self.page_size == 0 {
            self.page_size = DEFAULT_PAGE_SIZE;
        }
        if self.pathfinding.max_paths == 0 {
            self.pathfinding.max_paths = PathFinder::default().max_paths;
        }
        self
    }
}
