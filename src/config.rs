//! Pipeline configuration. This crate never loads a file or an
//! environment variable itself (configuration file loading is out of
//! scope, see §1); the host process deserialises a `Config` however
//! it prefers and passes it to [`crate::run_pipeline`].

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub multicast_addresses: Vec<String>,
    pub interface_address: String,
    pub booker_concurrency: usize,
    pub enable_validation: bool,
    pub enable_advanced_calculating: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            multicast_addresses: Vec::new(),
            interface_address: "0.0.0.0".to_string(),
            booker_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            enable_validation: true,
            enable_advanced_calculating: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concurrency_is_at_least_one() {
        let config = Config::default();
        assert!(config.booker_concurrency >= 1);
        assert!(config.enable_validation);
        assert!(config.enable_advanced_calculating);
    }
}
