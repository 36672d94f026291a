//! Settings for Arbor, defined in the settings.toml file.

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::constants::DEFAULT_SETTINGS_FILE;

#[derive(Debug, Deserialize)]
pub struct Cluster {
    pub num_nodes: u16,
    pub node_ip: String,
    pub base_port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Coordinator {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct Node {
    pub store_dir_prefix: String,
    #[serde(default)]
    pub noise_probability: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Codec {
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct Client {
    /// 0 waits forever.
    pub ack_timeout_ms: u64,
}

#[allow(unused)]
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub version: String,
    pub log_level: String,
    pub log_dir: String,

    pub cluster: Cluster,
    pub coordinator: Coordinator,
    pub node: Node,
    pub codec: Codec,
    pub client: Client,
}

impl Settings {
    /// Load settings and create a new `Settings` instance.
    pub(crate) fn new(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let file: &str = config_file.unwrap_or(DEFAULT_SETTINGS_FILE);

        let s = Config::builder()
            .add_source(File::with_name(file))
            .build()?;

        s.try_deserialize()
    }
}

/// Macro to get a value from CLI args if present, otherwise use the settings value.
///
/// # Example
///
/// ```rust
/// get_config_value(args, "arg_name", String, settings.arg_name);
/// ```
#[macro_export]
macro_rules! get_config_value {
    ($args:expr, $arg_name:expr, $arg_type:ty, $settings:expr) => {
        match $args.try_get_one::<$arg_type>($arg_name) {
            Ok(Some(value)) => value,
            Ok(None) => &$settings,
            Err(err) => {
                tracing::warn!("Failed to load CLI config, loading default settings. Error: {err}");
                &$settings
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const SAMPLE: &str = r#"
version = "0.1.0"
log_level = "INFO"
log_dir = "logs"

[cluster]
num_nodes = 15
node_ip = "127.0.0.1"
base_port = 5000

[coordinator]
host = "127.0.0.1"
port = 4000

[node]
store_dir_prefix = "CHUNK-"

[codec]
kind = "reed_solomon"

[client]
ack_timeout_ms = 5000
"#;

    fn settings_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_settings() {
        let file = settings_file(SAMPLE);
        let settings = Settings::new(file.path().to_str()).unwrap();

        assert_eq!(settings.log_level, "INFO");
        assert_eq!(settings.cluster.num_nodes, 15);
        assert_eq!(settings.cluster.base_port, 5000);
        assert_eq!(settings.coordinator.port, 4000);
        assert_eq!(settings.node.store_dir_prefix, "CHUNK-");
        assert_eq!(settings.node.noise_probability, None);
        assert_eq!(settings.codec.kind, "reed_solomon");
        assert_eq!(settings.client.ack_timeout_ms, 5000);
    }

    #[test]
    fn test_load_noise_probability() {
        let contents = SAMPLE.replace(
            "store_dir_prefix = \"CHUNK-\"",
            "store_dir_prefix = \"CHUNK-\"\nnoise_probability = 0.001",
        );
        let file = settings_file(&contents);
        let settings = Settings::new(file.path().to_str()).unwrap();

        assert_eq!(settings.node.noise_probability, Some(0.001));
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let contents = SAMPLE.replace("[client]\nack_timeout_ms = 5000\n", "");
        let file = settings_file(&contents);
        assert!(Settings::new(file.path().to_str()).is_err());
    }
}
