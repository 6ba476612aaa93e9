//! Configuration file parser for ~/.config/voyager/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use crate::lemmy::{ListingType, SortType, LIMIT};
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Environment variable holding a Lemmy JWT. Wins over the config file.
pub const JWT_ENV_VAR: &str = "LEMMY_JWT";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// Every field has a default, so any subset of keys can be specified.
/// `Debug` masks the JWT.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Instance host or URL, e.g. `lemmy.world`.
    pub instance: String,

    /// Listing opened at startup.
    pub default_listing: ListingType,

    /// Sort used when nothing is stored for the listing.
    pub default_sort: SortType,

    /// Items requested per page (Lemmy caps this at 50).
    pub page_limit: usize,

    /// Load the next page automatically when scrolling near the end.
    pub infinite_scrolling: bool,

    /// Hide posts once they scroll off the top of the list.
    pub auto_hide_read: bool,

    /// Start with hidden posts shown.
    pub show_hidden: bool,

    /// Posts whose title contains one of these are dropped.
    pub filtered_keywords: Vec<String>,

    /// Posts linking to these sites (or their subdomains) are dropped.
    pub filtered_websites: Vec<String>,

    /// Lemmy login token. The `LEMMY_JWT` env var takes precedence.
    pub jwt: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance: "lemmy.world".to_string(),
            default_listing: ListingType::All,
            default_sort: SortType::Active,
            page_limit: LIMIT,
            infinite_scrolling: true,
            auto_hide_read: false,
            show_hidden: false,
            filtered_keywords: Vec::new(),
            filtered_websites: Vec::new(),
            jwt: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("instance", &self.instance)
            .field("default_listing", &self.default_listing)
            .field("default_sort", &self.default_sort)
            .field("page_limit", &self.page_limit)
            .field("infinite_scrolling", &self.infinite_scrolling)
            .field("auto_hide_read", &self.auto_hide_read)
            .field("show_hidden", &self.show_hidden)
            .field("filtered_keywords", &self.filtered_keywords)
            .field("filtered_websites", &self.filtered_websites)
            .field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            // Deleted between metadata and read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse TOML text. Blank input yields defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = [
                "instance",
                "default_listing",
                "default_sort",
                "page_limit",
                "infinite_scrolling",
                "auto_hide_read",
                "show_hidden",
                "filtered_keywords",
                "filtered_websites",
                "jwt",
            ];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let mut config: Config = toml::from_str(content)?;
        config.page_limit = config.page_limit.clamp(1, LIMIT);
        tracing::info!(instance = %config.instance, "Loaded configuration");
        Ok(config)
    }

    /// JWT to authenticate with: `LEMMY_JWT` if set and non-empty, else the config value.
    pub fn jwt_secret(&self) -> Option<SecretString> {
        let from_env = std::env::var(JWT_ENV_VAR).ok();
        pick_jwt(from_env, self.jwt.clone())
    }
}

fn pick_jwt(from_env: Option<String>, from_config: Option<String>) -> Option<SecretString> {
    from_env
        .filter(|t| !t.trim().is_empty())
        .or_else(|| from_config.filter(|t| !t.trim().is_empty()))
        .map(|t| SecretString::from(t.trim().to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.instance, "lemmy.world");
        assert_eq!(config.default_listing, ListingType::All);
        assert_eq!(config.default_sort, SortType::Active);
        assert_eq!(config.page_limit, 50);
        assert!(config.infinite_scrolling);
        assert!(!config.auto_hide_read);
        assert!(config.jwt.is_none());
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/voyager_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.instance, "lemmy.world");
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        let config = Config::parse("   \n  \n  ").unwrap();
        assert_eq!(config.page_limit, 50);
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::parse("instance = \"lemmy.ml\"\n").unwrap();
        assert_eq!(config.instance, "lemmy.ml");
        assert!(config.infinite_scrolling);
        assert!(config.filtered_keywords.is_empty());
    }

    #[test]
    fn test_full_config() {
        let content = r#"
instance = "https://beehaw.org"
default_listing = "Local"
default_sort = "TopDay"
page_limit = 20
infinite_scrolling = false
auto_hide_read = true
show_hidden = true
filtered_keywords = ["crypto", "nft"]
filtered_websites = ["example.com"]
jwt = "token-123"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.instance, "https://beehaw.org");
        assert_eq!(config.default_listing, ListingType::Local);
        assert_eq!(config.default_sort, SortType::TopDay);
        assert_eq!(config.page_limit, 20);
        assert!(!config.infinite_scrolling);
        assert!(config.auto_hide_read);
        assert!(config.show_hidden);
        assert_eq!(config.filtered_keywords, vec!["crypto", "nft"]);
        assert_eq!(config.filtered_websites, vec!["example.com"]);
        assert_eq!(config.jwt.as_deref(), Some("token-123"));
    }

    #[test]
    fn test_page_limit_is_clamped() {
        assert_eq!(Config::parse("page_limit = 500").unwrap().page_limit, 50);
        assert_eq!(Config::parse("page_limit = 0").unwrap().page_limit, 1);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::parse("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::parse("instance = \"lemmy.ml\"\ntheme = \"dark\"\n").unwrap();
        assert_eq!(config.instance, "lemmy.ml");
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::parse("infinite_scrolling = \"yes\"\n").is_err());
        assert!(Config::parse("default_sort = \"Sideways\"\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("voyager_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_reads_file() {
        let dir = std::env::temp_dir().join("voyager_config_test_load");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "auto_hide_read = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.auto_hide_read);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_debug_masks_jwt() {
        let config = Config {
            jwt: Some("super-secret-jwt-12345".to_string()),
            ..Config::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("super-secret-jwt-12345"));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[test]
    fn test_env_jwt_wins_over_config() {
        let picked = pick_jwt(Some("from-env".into()), Some("from-config".into()));
        assert_eq!(picked.unwrap().expose_secret(), "from-env");

        let picked = pick_jwt(Some("  ".into()), Some("from-config".into()));
        assert_eq!(picked.unwrap().expose_secret(), "from-config");

        assert!(pick_jwt(None, None).is_none());
    }
}
