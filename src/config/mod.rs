use crate::models::{MainConfig, ModelEntry, UserConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Configuration manager for loading YAML configuration files.
///
/// Manages two files:
/// - Main config (`BGTank Main.yaml`): the model catalog
/// - User config (`BGTank Config.yaml`): output folder, suffix, model defaults
///
/// Both fall back to built-in defaults when missing. Nothing is ever
/// written back: settings changed in the window last for the session only.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    main_config_path: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at the given directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "BGTank Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            main_config_path: config_dir.join("BGTank Main.yaml"),
            user_config_path: config_dir.join("BGTank Config.yaml"),
            config_dir,
        })
    }

    /// Load the main configuration file.
    ///
    /// # Returns
    /// The loaded MainConfig, or the built-in catalog if the file is missing
    pub fn load_main_config(&self) -> Result<MainConfig> {
        if !self.main_config_path.exists() {
            tracing::warn!(
                "Main config file not found at {}, using built-in model catalog",
                self.main_config_path
            );
            return Ok(Self::default_main_config());
        }

        let file_contents = fs::read_to_string(&self.main_config_path)
            .with_context(|| format!("Failed to read main config: {}", self.main_config_path))?;

        let config: MainConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse main config: {}", self.main_config_path))?;

        tracing::info!(
            "Loaded main config from {} ({} models)",
            self.main_config_path,
            config.bgtank_data.models.len()
        );
        Ok(config)
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or defaults if the file is missing
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Built-in model catalog, used when no main config file exists.
    ///
    /// The entries point at the published pretrained weights of the
    /// u2net model family.
    pub fn default_main_config() -> MainConfig {
        use crate::models::config::BgTankData;
        use indexmap::IndexMap;

        let mut models = IndexMap::new();
        models.insert(
            "u2net".to_string(),
            ModelEntry {
                file: "u2net.onnx".to_string(),
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx"
                    .to_string(),
                size_mb: 176,
            },
        );
        models.insert(
            "u2netp".to_string(),
            ModelEntry {
                file: "u2netp.onnx".to_string(),
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx"
                    .to_string(),
                size_mb: 4,
            },
        );
        models.insert(
            "silueta".to_string(),
            ModelEntry {
                file: "silueta.onnx".to_string(),
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/silueta.onnx"
                    .to_string(),
                size_mb: 43,
            },
        );

        MainConfig {
            bgtank_data: BgTankData {
                version: crate::VERSION.to_string(),
                models,
            },
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_create_config_manager() {
        let (_manager, _temp_dir) = create_test_config_manager();
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();

        let main = manager.load_main_config().unwrap();
        assert!(main.model("u2net").is_some());

        let user = manager.load_user_config().unwrap();
        assert_eq!(user.settings.file_suffix, "_no_bg");
    }

    #[test]
    fn test_default_catalog_entries() {
        let config = ConfigManager::default_main_config();

        let u2net = config.model("u2net").unwrap();
        assert_eq!(u2net.file, "u2net.onnx");
        assert!(u2net.url.ends_with("u2net.onnx"));

        assert_eq!(
            config.model_names(),
            vec![
                "u2net".to_string(),
                "u2netp".to_string(),
                "silueta".to_string()
            ]
        );
    }

    #[test]
    fn test_load_user_config_from_file() {
        let (manager, temp_dir) = create_test_config_manager();

        let yaml = "BGTank_Settings:\n  Output Folder: /tmp/cutouts\n  File Suffix: _alpha\n";
        fs::write(temp_dir.path().join("BGTank Config.yaml"), yaml).unwrap();

        let config = manager.load_user_config().unwrap();
        assert_eq!(config.settings.output_folder, "/tmp/cutouts");
        assert_eq!(config.settings.file_suffix, "_alpha");
        // Unspecified keys fall back to defaults
        assert_eq!(config.settings.default_model, "u2net");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let (manager, temp_dir) = create_test_config_manager();

        fs::write(temp_dir.path().join("BGTank Config.yaml"), ":: not yaml ::").unwrap();

        assert!(manager.load_user_config().is_err());
    }
}
