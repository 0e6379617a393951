use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
workers = 4
max-depth = 2
max-pages = 100
min-interval-ms = 250
stay-on-origin = true

[fetch]
request-timeout-ms = 3000
max-redirects = 3
max-attempts = 4
backoff-base-ms = 200
rate-limit-cooldown-ms = 1000
respect-crawl-delay = false

[robots]
cache-ttl-secs = 600
failure-ttl-secs = 60
fetch-timeout-ms = 1500

[user-agent]
crawler-name = "TestCrawler"
crawler-version = "1.0"
contact-url = "https://example.com/about"

[safety]
blocked-hosts = ["*.corp", "intranet.example.com"]
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.workers, 4);
        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.crawler.max_pages, Some(100));
        assert!(config.crawler.stay_on_origin);
        assert_eq!(config.fetch.max_attempts, 4);
        assert!(!config.fetch.respect_crawl_delay);
        assert_eq!(config.robots.failure_ttl_secs, 60);
        assert_eq!(config.user_agent.crawler_name, "TestCrawler");
        assert_eq!(config.safety.blocked_hosts.len(), 2);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();

        assert_eq!(config.crawler.workers, 8);
        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.max_pages, None);
        assert_eq!(config.fetch.max_redirects, 5);
        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.robots.cache_ttl_secs, 86_400);
        assert_eq!(
            config.safety.blocked_hosts,
            vec!["*.internal".to_string(), "*.local".to_string()]
        );
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse_config("[crawler]\nworkers = 2\n").unwrap();
        assert_eq!(config.crawler.workers, 2);
        assert_eq!(config.crawler.min_interval_ms, 1000);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/crawler.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[crawler]\nworkers = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }
}
