//! File-based configuration.
//!
//! # Responsibility
//! - Load `SyncConfig` from TOML, every section optional.
//! - Overlay credentials from the environment.
//! - Convert sections into typed engine/collaborator settings.
//!
//! # Invariants
//! - A missing config file yields defaults, never an error.
//! - `validate()` runs before any conversion is handed out.

use crate::layout::LayoutOptions;
use crate::model::cell::{column_index, CellRange};
use crate::names::matcher::MatchPolicy;
use crate::roster::CanvasConfig;
use crate::service::DestinationLayout;
use crate::surface::remote::DEFAULT_SHEETS_API_BASE;
use crate::surface::RemoteSheetConfig;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_ROSTER_TOKEN: &str = "GRADESYNC_ROSTER_TOKEN";
pub const ENV_ROSTER_URL: &str = "GRADESYNC_ROSTER_URL";
pub const ENV_SHEETS_TOKEN: &str = "GRADESYNC_SHEETS_TOKEN";

/// Configuration load/validation failures.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, message: String },
    Invalid(String),
    /// A setting needed by the requested operation is absent.
    Missing(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::Parse { path, message } => write!(f, "invalid TOML in `{}`: {message}", path.display()),
            Self::Invalid(message) => write!(f, "invalid configuration: {message}"),
            Self::Missing(key) => write!(f, "missing configuration value `{key}`"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// `[destination]`: where the grade grid lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationSection {
    pub sheet_name: String,
    pub read_range: String,
    pub header_label: String,
    pub activity_row: u32,
    pub header_window: u32,
    pub name_column: String,
    pub first_student_row: u32,
    pub last_student_row: u32,
    pub period_labels: Vec<String>,
}

impl Default for DestinationSection {
    fn default() -> Self {
        let options = LayoutOptions::default();
        Self {
            sheet_name: "EVALUACIÓN".to_string(),
            read_range: "A1:Z50".to_string(),
            header_label: options.header_label,
            activity_row: options.activity_row,
            header_window: options.header_window,
            name_column: "C".to_string(),
            first_student_row: 10,
            last_student_row: 44,
            period_labels: options.period_labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterSection {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for RosterSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSection {
    pub api_base: String,
    pub access_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SheetsSection {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_SHEETS_API_BASE.to_string(),
            access_token: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSection {
    pub roster_snapshot: PathBuf,
    pub scores_to_write: PathBuf,
}

impl Default for CheckpointSection {
    fn default() -> Self {
        Self {
            roster_snapshot: PathBuf::from("canvas_students.json"),
            scores_to_write: PathBuf::from("canvas_grades_to_write.json"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub dir: Option<PathBuf>,
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub destination: DestinationSection,
    pub matching: MatchPolicy,
    pub roster: RosterSection,
    pub sheets: SheetsSection,
    pub checkpoints: CheckpointSection,
    pub logging: LoggingSection,
}

impl SyncConfig {
    /// Loads `path` (defaults when no path is given), overlays the
    /// environment and validates.
    ///
    /// # Errors
    /// - `Io` when an explicit `path` cannot be read, including when it is
    ///   missing.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Overrides credentials with non-empty values from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = non_empty(ENV_ROSTER_TOKEN) {
            self.roster.api_token = Some(token);
        }
        if let Some(url) = non_empty(ENV_ROSTER_URL) {
            self.roster.base_url = Some(url);
        }
        if let Some(token) = non_empty(ENV_SHEETS_TOKEN) {
            self.sheets.access_token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.destination_layout().map(|_| ())
    }

    /// Typed destination layout.
    pub fn destination_layout(&self) -> Result<DestinationLayout, ConfigError> {
        let section = &self.destination;
        if section.sheet_name.trim().is_empty() {
            return Err(ConfigError::Invalid("destination.sheet_name is empty".to_string()));
        }
        if section.header_label.trim().is_empty() {
            return Err(ConfigError::Invalid("destination.header_label is empty".to_string()));
        }
        let read_range: CellRange = section
            .read_range
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("destination.read_range: {err}")))?;
        let name_column = column_index(section.name_column.trim())
            .map_err(|err| ConfigError::Invalid(format!("destination.name_column: {err}")))?;

        if section.activity_row < 2 || section.header_window == 0 {
            return Err(ConfigError::Invalid(format!(
                "destination.activity_row ({}) needs at least one header row above it",
                section.activity_row
            )));
        }
        if section.first_student_row == 0 || section.last_student_row < section.first_student_row {
            return Err(ConfigError::Invalid(format!(
                "destination student rows {}-{} are not a valid range",
                section.first_student_row, section.last_student_row
            )));
        }
        let needed_rows = [section.activity_row, section.first_student_row, section.last_student_row];
        if needed_rows
            .iter()
            .any(|row| *row < read_range.start.row || *row > read_range.end.row)
            || name_column < read_range.start.col
            || name_column > read_range.end.col
        {
            return Err(ConfigError::Invalid(format!(
                "destination.read_range {read_range} does not cover the activity row, student rows and name column"
            )));
        }
        if self.matching.min_overlap == 0 || self.matching.short_name_min_overlap == 0 {
            return Err(ConfigError::Invalid(
                "matching.min_overlap and matching.short_name_min_overlap must be at least 1"
                    .to_string(),
            ));
        }

        Ok(DestinationLayout {
            read_range,
            name_column,
            first_student_row: section.first_student_row,
            last_student_row: section.last_student_row,
            options: LayoutOptions {
                header_label: section.header_label.clone(),
                activity_row: section.activity_row,
                header_window: section.header_window,
                period_labels: section.period_labels.clone(),
                ..LayoutOptions::default()
            },
        })
    }

    pub fn canvas_config(&self) -> Result<CanvasConfig, ConfigError> {
        Ok(CanvasConfig {
            base_url: self.roster.base_url.clone().ok_or(ConfigError::Missing("roster.base_url"))?,
            api_token: self
                .roster
                .api_token
                .clone()
                .ok_or(ConfigError::Missing("roster.api_token"))?,
            timeout: Duration::from_secs(self.roster.timeout_secs),
        })
    }

    pub fn remote_sheet_config(&self, spreadsheet_id: &str) -> Result<RemoteSheetConfig, ConfigError> {
        Ok(RemoteSheetConfig {
            api_base: self.sheets.api_base.clone(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: self.destination.sheet_name.clone(),
            access_token: self
                .sheets
                .access_token
                .clone()
                .ok_or(ConfigError::Missing("sheets.access_token"))?,
            timeout: Duration::from_secs(self.sheets.timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SyncConfig, ENV_ROSTER_TOKEN, ENV_SHEETS_TOKEN};

    #[test]
    fn defaults_describe_the_evaluation_sheet() {
        let config = SyncConfig::default();
        let layout = config.destination_layout().unwrap();
        assert_eq!(config.destination.sheet_name, "EVALUACIÓN");
        assert_eq!(layout.name_column, 3);
        assert_eq!(layout.read_range.to_string(), "A1:Z50");
        assert_eq!((layout.first_student_row, layout.last_student_row), (10, 44));
        assert_eq!(layout.options.activity_row, 9);
        assert_eq!(config.matching.min_overlap, 2);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [destination]
            last_student_row = 30

            [matching]
            short_name_max_tokens = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.destination.last_student_row, 30);
        assert_eq!(config.destination.first_student_row, 10);
        assert_eq!(config.matching.short_name_max_tokens, 0);
        assert_eq!(config.matching.min_overlap, 2);
    }

    #[test]
    fn env_overrides_only_non_empty_values() {
        let mut config = SyncConfig::default();
        config.roster.api_token = Some("file".to_string());
        config.apply_env(|key| match key {
            ENV_ROSTER_TOKEN => Some(" ".to_string()),
            ENV_SHEETS_TOKEN => Some("sheet-token".to_string()),
            _ => None,
        });
        assert_eq!(config.roster.api_token.as_deref(), Some("file"));
        assert_eq!(config.sheets.access_token.as_deref(), Some("sheet-token"));
    }

    #[test]
    fn validate_rejects_inverted_student_rows() {
        let mut config = SyncConfig::default();
        config.destination.first_student_row = 20;
        config.destination.last_student_row = 12;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_range_not_covering_students() {
        let mut config = SyncConfig::default();
        config.destination.read_range = "A1:Z20".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gradesync.toml");
        assert!(matches!(
            SyncConfig::load(Some(&missing)),
            Err(ConfigError::Io { path, .. }) if path == missing
        ));
        assert!(SyncConfig::load(None).is_ok());
    }

    #[test]
    fn validate_rejects_zero_overlap() {
        let mut config = SyncConfig::default();
        config.matching.short_name_min_overlap = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn canvas_config_requires_credentials() {
        let config = SyncConfig::default();
        assert!(matches!(
            config.canvas_config(),
            Err(ConfigError::Missing("roster.base_url"))
        ));
    }
}
