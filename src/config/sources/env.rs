//! Environment source: SLIDEGEN__SECTION__KEY overrides

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

/// Add the `SLIDEGEN__*` environment overrides (highest precedence).
pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("SLIDEGEN")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
