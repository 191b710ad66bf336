//! Built-in defaults every merge starts from.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

/// Builder seeded with default values; later sources override them key by key.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("diff.tool", "gdxdiff")?
        .set_default("diff.output_prefix", "diffile_")?
        .set_default("build.program", "make")?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "file")
}
