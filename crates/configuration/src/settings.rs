use serde::Deserialize;
use std::path::PathBuf;

/// The root settings structure for the application.
///
/// Every field has a default, so the binary runs without any config file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub output: OutputSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self { analysis: AnalysisSettings::default(), output: OutputSettings::default() }
    }
}

/// Tuning knobs for the significance test.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    /// Significance threshold in standard deviations. Matches the engine's
    /// built-in default of 3.0 (~95% confidence for normal data).
    #[serde(default = "default_sigma")]
    pub sigma: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self { sigma: default_sigma() }
    }
}

/// Where report files end up.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSettings {
    /// Directory for generated report JSON files.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self { results_dir: default_results_dir() }
    }
}

fn default_sigma() -> f64 {
    3.0
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("reports")
}
