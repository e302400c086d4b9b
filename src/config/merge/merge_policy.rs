//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("storage.store_path", ".slidegen/store")?
        .set_default("storage.generated_folder", "generated")?
        .set_default("generation.max_api_retries", 10)?
        .set_default("generation.retry_delay_base", 2)
}
