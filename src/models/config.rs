use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Main configuration from BGTank Main.yaml
///
/// Contains the model catalog: every model the user can pick, with its
/// on-disk file name and download URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainConfig {
    #[serde(rename = "BGTank_Data")]
    pub bgtank_data: BgTankData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgTankData {
    pub version: String,

    #[serde(rename = "Models")]
    pub models: IndexMap<String, ModelEntry>,
}

/// One pretrained segmentation model the app can run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    /// File name inside the models directory
    #[serde(rename = "File")]
    pub file: String,

    /// Download location of the published model weights
    #[serde(rename = "URL")]
    pub url: String,

    /// Approximate size, for the download status line
    #[serde(rename = "Size MB", default)]
    pub size_mb: u32,
}

/// User configuration from BGTank Config.yaml
///
/// Read once at startup; never written back (settings edited in the
/// window live only for the session).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "BGTank_Settings")]
    pub settings: BgTankSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgTankSettings {
    #[serde(rename = "Output Folder", default)]
    pub output_folder: String,

    #[serde(rename = "File Suffix", default = "default_suffix")]
    pub file_suffix: String,

    #[serde(rename = "Default Model", default = "default_model")]
    pub default_model: String,

    #[serde(rename = "Models Folder", default = "default_models_folder")]
    pub models_folder: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for BgTankSettings {
    fn default() -> Self {
        Self {
            output_folder: String::new(),
            file_suffix: default_suffix(),
            default_model: default_model(),
            models_folder: default_models_folder(),
            debug_mode: false,
        }
    }
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            settings: BgTankSettings::default(),
        }
    }
}

fn default_suffix() -> String {
    "_no_bg".to_string()
}

fn default_model() -> String {
    "u2net".to_string()
}

fn default_models_folder() -> String {
    "models".to_string()
}

impl MainConfig {
    /// Look up a model by its catalog name
    pub fn model(&self, name: &str) -> Option<&ModelEntry> {
        self.bgtank_data.models.get(name)
    }

    /// Catalog names in declaration order, for the model picker
    pub fn model_names(&self) -> Vec<String> {
        self.bgtank_data.models.keys().cloned().collect()
    }
}
