//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "flightdeck.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "flightdeck.yaml";

/// Default server the CLI talks to
pub const DEFAULT_SERVER_URL: &str = "https://api.flightdeck.dev";

/// Multipart chunk size (10 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Smallest chunk object storage accepts for a non-final part (5 MiB)
pub const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Retries of a whole multipart upload after the first attempt
pub const DEFAULT_UPLOAD_RETRIES: u32 = 2;

/// Base delay between upload attempts, multiplied by the attempt number
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Network timeout for downloads and part uploads
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 300;

/// Environment variable overriding the server URL
pub const ENV_SERVER_URL: &str = "FLIGHTDECK_SERVER_URL";

/// Environment variable overriding the project handle
pub const ENV_FULL_HANDLE: &str = "FLIGHTDECK_FULL_HANDLE";

/// Environment variable holding the bearer token
pub const ENV_TOKEN: &str = "FLIGHTDECK_TOKEN";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".flightdeck.toml",
        ".flightdeck.yaml",
    ]
}
