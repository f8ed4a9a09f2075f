//! CLI configuration loading and merging.

use trainctl_core::ClientConfig;

/// Values given as command-line flags.
#[derive(Debug, Default)]
pub struct FlagOverrides {
    pub upload_url: Option<String>,
    pub stream_url: Option<String>,
    pub log_level: Option<String>,
}

/// Load and merge CLI configuration.
///
/// Configuration precedence:
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Local config file (./.trainctlrc)
/// 4. Global config file (~/.trainctl/config.toml)
/// 5. Defaults
pub fn load_config(flags: FlagOverrides) -> ClientConfig {
    let mut config = ClientConfig::discover_and_load();
    config.merge(&ClientConfig {
        upload_url: flags.upload_url,
        stream_url: flags.stream_url,
        log_level: flags.log_level,
        ..ClientConfig::default()
    });
    config
}
