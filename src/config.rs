//! Configuration loading for Syllabus.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.syllabus/config.toml`)
//! 3. User config (`~/.syllabus/config.toml`, or `$SYLLABUS_HOME/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. Curricula run with the default training
//! metadata when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Result, SyllabusError};
use crate::model::TrainingMetadata;

/// Main configuration struct for Syllabus.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Root training metadata, inherited by every curriculum.
    pub training: TrainingMetadata,
    /// Brain checkpoint configuration.
    pub saving: SavingConfig,
    /// Console dashboard configuration.
    pub report: ReportConfig,
    /// Runtime configuration.
    pub runtime: RuntimeConfig,
}

/// Brain checkpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SavingConfig {
    /// Loop iterations between checkpoint saves.
    pub every_iterations: u64,
    /// Directory for brain files, relative to the project root.
    pub brain_dir: PathBuf,
}

/// Minimum allowed value for `saving.every_iterations`.
pub const MIN_SAVE_EVERY: u64 = 1;

impl SavingConfig {
    pub fn is_valid_every_iterations(value: u64) -> bool {
        value >= MIN_SAVE_EVERY
    }
}

impl Default for SavingConfig {
    fn default() -> Self {
        Self {
            every_iterations: 100,
            brain_dir: PathBuf::from(".syllabus").join("brains"),
        }
    }
}

/// Console dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Milliseconds between dashboard refreshes.
    pub interval_ms: u64,
    /// Width of each convergence bar in characters.
    pub bar_width: usize,
    /// Whether captured output of failing runs is printed.
    pub show_output: bool,
}

/// Minimum allowed value for `report.interval_ms`.
pub const MIN_INTERVAL_MS: u64 = 10;

impl ReportConfig {
    pub fn is_valid_interval_ms(value: u64) -> bool {
        value >= MIN_INTERVAL_MS
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            bar_width: 30,
            show_output: true,
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Seed for the stochastic skip. Unset means a fresh seed per run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Config {
    /// Load configuration with full precedence chain, using the current
    /// directory as the project root.
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific project directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    fn load_user_config() -> Option<Config> {
        let path = syllabus_home()?.join("config.toml");
        Self::load_layer(&path)
    }

    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_layer(&project_config_path(cwd))
    }

    /// Load one layer. A missing file is silent; an unreadable or invalid
    /// one is skipped with a warning.
    fn load_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        match Self::load_from_file(path) {
            Ok(config) => Some(config),
            Err(err) => {
                warn!(path = %path.display(), "Ignoring config file: {}", err);
                None
            }
        }
    }

    /// Load config from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| SyllabusError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| SyllabusError::config(e.to_string()))
    }

    /// Apply environment variable overrides. Invalid values are ignored with
    /// a warning.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("SYLLABUS_MAX_ATTEMPTS") {
            match val.parse::<u64>() {
                Ok(n) => self.training.maximum_attempts = n,
                Err(_) => warn!(
                    "Invalid SYLLABUS_MAX_ATTEMPTS value '{}'. Expected a non-negative integer. Using '{}'.",
                    val, self.training.maximum_attempts
                ),
            }
        }

        if let Ok(val) = env::var("SYLLABUS_SAVE_EVERY") {
            match val.parse::<u64>() {
                Ok(n) if SavingConfig::is_valid_every_iterations(n) => {
                    self.saving.every_iterations = n;
                }
                _ => warn!(
                    "Invalid SYLLABUS_SAVE_EVERY value '{}'. Must be >= {}. Using '{}'.",
                    val, MIN_SAVE_EVERY, self.saving.every_iterations
                ),
            }
        }

        if let Ok(val) = env::var("SYLLABUS_SEED") {
            match val.parse::<u64>() {
                Ok(n) => self.runtime.seed = Some(n),
                Err(_) => warn!("Invalid SYLLABUS_SEED value '{}'. Ignoring.", val),
            }
        }

        if let Ok(val) = env::var("SYLLABUS_REPORT_INTERVAL_MS") {
            match val.parse::<u64>() {
                Ok(n) if ReportConfig::is_valid_interval_ms(n) => self.report.interval_ms = n,
                _ => warn!(
                    "Invalid SYLLABUS_REPORT_INTERVAL_MS value '{}'. Must be >= {}. Using '{}'.",
                    val, MIN_INTERVAL_MS, self.report.interval_ms
                ),
            }
        }
    }

    /// Merge another config layer into this one, field by field.
    ///
    /// A field is taken from `other` when it differs from the default, so a
    /// layer only needs to list its customizations. A layer cannot reset a
    /// value back to the default once a lower layer changed it.
    fn merge(mut self, other: Config) -> Self {
        let default_training = TrainingMetadata::default();
        let mut training = self.training;
        if other.training.success_fraction != default_training.success_fraction {
            training.success_fraction = other.training.success_fraction;
        }
        if other.training.sample_size != default_training.sample_size {
            training.sample_size = other.training.sample_size;
        }
        if other.training.maximum_attempts != default_training.maximum_attempts {
            training.maximum_attempts = other.training.maximum_attempts;
        }
        if other.training.minimum_dynamic_weight != default_training.minimum_dynamic_weight {
            training.minimum_dynamic_weight = other.training.minimum_dynamic_weight;
        }
        if other.training.maximum_dynamic_weight != default_training.maximum_dynamic_weight {
            training.maximum_dynamic_weight = other.training.maximum_dynamic_weight;
        }
        if other.training.summarizer != default_training.summarizer {
            training.summarizer = other.training.summarizer;
        }
        match training.validate() {
            Ok(()) => self.training = training,
            Err(err) => warn!("Ignoring [training] layer: {}", err),
        }

        let default_saving = SavingConfig::default();
        if other.saving.every_iterations != default_saving.every_iterations {
            if SavingConfig::is_valid_every_iterations(other.saving.every_iterations) {
                self.saving.every_iterations = other.saving.every_iterations;
            } else {
                warn!(
                    "Invalid saving.every_iterations {}. Must be >= {}.",
                    other.saving.every_iterations, MIN_SAVE_EVERY
                );
            }
        }
        if other.saving.brain_dir != default_saving.brain_dir {
            self.saving.brain_dir = other.saving.brain_dir;
        }

        let default_report = ReportConfig::default();
        if other.report.interval_ms != default_report.interval_ms {
            if ReportConfig::is_valid_interval_ms(other.report.interval_ms) {
                self.report.interval_ms = other.report.interval_ms;
            } else {
                warn!(
                    "Invalid report.interval_ms {}. Must be >= {}.",
                    other.report.interval_ms, MIN_INTERVAL_MS
                );
            }
        }
        if other.report.bar_width != default_report.bar_width {
            self.report.bar_width = other.report.bar_width;
        }
        if other.report.show_output != default_report.show_output {
            self.report.show_output = other.report.show_output;
        }

        if other.runtime.seed.is_some() {
            self.runtime.seed = other.runtime.seed;
        }

        self
    }

    /// Brain directory resolved against the project root.
    pub fn brain_dir(&self, project_root: &Path) -> PathBuf {
        if self.saving.brain_dir.is_absolute() {
            self.saving.brain_dir.clone()
        } else {
            project_root.join(&self.saving.brain_dir)
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SyllabusError::config(e.to_string()))
    }
}

/// Get the Syllabus home directory.
///
/// `SYLLABUS_HOME` wins when set to a non-empty value; otherwise
/// `~/.syllabus`, or a per-user temp directory when `HOME` is unavailable.
pub fn syllabus_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("SYLLABUS_HOME") {
        if home.is_empty() {
            warn!("SYLLABUS_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            warn!("SYLLABUS_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".syllabus"));
    }

    let fallback = env::temp_dir().join("syllabus");
    warn!("HOME not set, using fallback location: {}", fallback.display());
    Some(fallback)
}

/// Project config file: `<root>/.syllabus/config.toml`.
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".syllabus").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Summarizer;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write_project_config(dir: &TempDir, content: &str) {
        let path = project_config_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn clear_env() {
        for key in [
            "SYLLABUS_MAX_ATTEMPTS",
            "SYLLABUS_SAVE_EVERY",
            "SYLLABUS_SEED",
            "SYLLABUS_REPORT_INTERVAL_MS",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.training, TrainingMetadata::default());
        assert_eq!(config.saving.every_iterations, 100);
        assert_eq!(config.saving.brain_dir, PathBuf::from(".syllabus/brains"));
        assert_eq!(config.report.interval_ms, 500);
        assert_eq!(config.report.bar_width, 30);
        assert!(config.report.show_output);
        assert_eq!(config.runtime.seed, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[training]
sample_size = 10
maximum_attempts = 20

[training.summarizer]
kind = "pass_rate"
threshold = 0.75

[runtime]
seed = 7
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.training.sample_size, 10);
        assert_eq!(config.training.maximum_attempts, 20);
        assert_eq!(config.training.success_fraction, 0.9);
        assert_eq!(
            config.training.summarizer,
            Summarizer::PassRate { threshold: 0.75 }
        );
        assert_eq!(config.runtime.seed, Some(7));
    }

    #[test]
    fn test_load_from_file_missing() {
        let err = Config::load_from_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, SyllabusError::Storage { .. }));
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[training\nsample_size = ").unwrap();
        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, SyllabusError::Config { .. }));
    }

    #[test]
    #[serial]
    fn test_project_config_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        write_project_config(
            &dir,
            r#"
[saving]
every_iterations = 25
"#,
        );

        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.saving.every_iterations, 25);
        assert_eq!(config.report.interval_ms, 500);
    }

    #[test]
    #[serial]
    fn test_env_var_precedence() {
        clear_env();
        let dir = TempDir::new().unwrap();
        write_project_config(
            &dir,
            r#"
[training]
maximum_attempts = 50
"#,
        );

        env::set_var("SYLLABUS_MAX_ATTEMPTS", "75");
        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.training.maximum_attempts, 75);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_overrides() {
        clear_env();
        env::set_var("SYLLABUS_SAVE_EVERY", "10");
        env::set_var("SYLLABUS_SEED", "99");
        env::set_var("SYLLABUS_REPORT_INTERVAL_MS", "250");

        let dir = TempDir::new().unwrap();
        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.saving.every_iterations, 10);
        assert_eq!(config.runtime.seed, Some(99));
        assert_eq!(config.report.interval_ms, 250);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_env_var_invalid_values_ignored() {
        clear_env();
        env::set_var("SYLLABUS_SAVE_EVERY", "0");
        env::set_var("SYLLABUS_MAX_ATTEMPTS", "many");
        env::set_var("SYLLABUS_REPORT_INTERVAL_MS", "1");
        env::set_var("SYLLABUS_SEED", "-3");

        let dir = TempDir::new().unwrap();
        let config = Config::load_from_cwd(dir.path());
        assert_eq!(config.saving.every_iterations, 100);
        assert_eq!(config.training.maximum_attempts, 10_000);
        assert_eq!(config.report.interval_ms, 500);
        assert_eq!(config.runtime.seed, None);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_project_file_is_skipped() {
        clear_env();
        let dir = TempDir::new().unwrap();
        write_project_config(&dir, "not [valid toml");
        assert_eq!(Config::load_from_cwd(dir.path()).saving.every_iterations, 100);
    }

    #[test]
    fn test_merge_field_by_field() {
        let user: Config = toml::from_str(
            r#"
[training]
sample_size = 10

[report]
bar_width = 50
"#,
        )
        .unwrap();
        let project: Config = toml::from_str(
            r#"
[training]
maximum_attempts = 20
"#,
        )
        .unwrap();

        let merged = Config::default().merge(user).merge(project);
        assert_eq!(merged.training.sample_size, 10);
        assert_eq!(merged.training.maximum_attempts, 20);
        assert_eq!(merged.report.bar_width, 50);
    }

    #[test]
    fn test_merge_rejects_invalid_training_layer() {
        let bad: Config = toml::from_str(
            r#"
[training]
minimum_dynamic_weight = 0.5
maximum_dynamic_weight = 0.2
"#,
        )
        .unwrap();

        let merged = Config::default().merge(bad);
        assert_eq!(merged.training, TrainingMetadata::default());
    }

    #[test]
    #[serial]
    fn test_syllabus_home_with_env() {
        let dir = TempDir::new().unwrap();
        env::set_var("SYLLABUS_HOME", dir.path());
        assert_eq!(syllabus_home(), Some(dir.path().to_path_buf()));
        env::remove_var("SYLLABUS_HOME");
    }

    #[test]
    #[serial]
    fn test_syllabus_home_empty_env() {
        env::set_var("SYLLABUS_HOME", "");
        let home = syllabus_home().unwrap();
        assert!(home.ends_with(".syllabus") || home.ends_with("syllabus"));
        env::remove_var("SYLLABUS_HOME");
    }

    #[test]
    #[serial]
    fn test_user_config_layer() {
        clear_env();
        let home = TempDir::new().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "[report]\nshow_output = false\n",
        )
        .unwrap();
        env::set_var("SYLLABUS_HOME", home.path());

        let project = TempDir::new().unwrap();
        let config = Config::load_from_cwd(project.path());
        assert!(!config.report.show_output);
        env::remove_var("SYLLABUS_HOME");
    }

    #[test]
    fn test_brain_dir_resolution() {
        let mut config = Config::default();
        assert_eq!(
            config.brain_dir(Path::new("/work/app")),
            PathBuf::from("/work/app/.syllabus/brains")
        );
        config.saving.brain_dir = PathBuf::from("/var/brains");
        assert_eq!(
            config.brain_dir(Path::new("/work/app")),
            PathBuf::from("/var/brains")
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.training.sample_size = 12;
        config.runtime.seed = Some(3);
        let text = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_merge_ignores_invalid_summarizer() {
        let mut layer = Config::default();
        layer.training.summarizer = Summarizer::Percentile { q: 3.0 };
        layer.training.sample_size = 12;

        let merged = Config::default().merge(layer);
        assert_eq!(merged.training.summarizer, Summarizer::Mean);
        assert_eq!(merged.training.sample_size, 100, "the whole layer is rejected");
    }
}
