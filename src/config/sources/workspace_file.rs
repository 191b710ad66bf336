//! Workspace config files: legacy `config.ini`, then `gdxstore.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

pub const LEGACY_INI: &str = "config.ini";
pub const WORKSPACE_TOML: &str = "gdxstore.toml";

/// Add workspace files; missing files are skipped.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        File::from(workspace_root.join(LEGACY_INI))
            .format(FileFormat::Ini)
            .required(false),
    );
    let builder = builder.add_source(
        File::from(workspace_root.join(WORKSPACE_TOML))
            .format(FileFormat::Toml)
            .required(false),
    );
    Ok(builder)
}
