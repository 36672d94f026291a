pub const NAME: &str = "Arbor";
pub const BIN_NAME: &str = "arbor";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Chunked file distribution over a tree of UDP storage nodes";

pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";
