// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use settings::{AnalysisSettings, OutputSettings, Settings};

/// Loads the application settings.
///
/// Reads an optional `config.toml` from the working directory, layers
/// `UPLIFT_`-prefixed environment variables on top, and falls back to the
/// built-in defaults for anything left unset. A missing file is not an
/// error; a malformed one is.
pub fn load_settings() -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config.toml").required(false))
        .add_source(config::Environment::with_prefix("UPLIFT").separator("__"))
        .build()?;

    let settings = builder.try_deserialize::<Settings>()?;

    Ok(settings)
}
