//! Environment variable source: GDXSTORE__ prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `GDXSTORE__STORAGE__ROOT` sets `storage.root`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix("GDXSTORE")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
