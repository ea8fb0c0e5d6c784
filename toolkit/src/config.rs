//! Configuration for the upload and JSON helpers.
//!
//! Every operation takes its configuration by reference, so one value can be shared between
//! concurrent requests without any synchronisation. Build the structs directly, or load them
//! with [`Config::load`] from an optional YAML file plus environment overrides.
//!
//! ## Loading Priority
//!
//! 1. **YAML config file** - optional base configuration
//! 2. **Environment variables** - variables prefixed with `TOOLKIT_` override YAML values
//!
//! Nested values use double underscores, e.g. `TOOLKIT_JSON__ALLOW_UNKNOWN_FIELDS=true`.
//!
//! ```yaml
//! uploads:
//!   max_request_size: 10485760
//!   allowed_content_types: ["image/png", "image/jpeg"]
//! json:
//!   max_body_size: 65536
//!   allow_unknown_fields: false
//! ```

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Default ceiling on a whole multipart upload request (1 GiB)
pub const DEFAULT_MAX_REQUEST_SIZE: u64 = 1024 * 1024 * 1024;

/// Default ceiling on a JSON request body (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024;

/// Root configuration, grouping the per-helper sections.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Multipart upload settings
    pub uploads: UploadConfig,
    /// Strict JSON decoding settings
    pub json: JsonConfig,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed("TOOLKIT_").split("__"))
    }
}

/// Multipart upload configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum size in bytes of the whole multipart request.
    /// Set to 0 to use the default of 1 GiB.
    pub max_request_size: u64,
    /// Content types accepted after sniffing. Empty accepts any type.
    pub allowed_content_types: ContentTypeAllowlist,
}

impl UploadConfig {
    pub fn new(max_request_size: u64, allowed_content_types: impl Into<ContentTypeAllowlist>) -> Self {
        Self {
            max_request_size,
            allowed_content_types: allowed_content_types.into(),
        }
    }

    /// The ceiling actually enforced, with 0 falling back to the default.
    pub fn effective_max_request_size(&self) -> u64 {
        if self.max_request_size == 0 {
            DEFAULT_MAX_REQUEST_SIZE
        } else {
            self.max_request_size
        }
    }
}

/// Set of permitted MIME types, stored lowercased for case-insensitive lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ContentTypeAllowlist(BTreeSet<String>);

impl ContentTypeAllowlist {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether `content_type` is permitted.
    ///
    /// An empty allowlist permits everything. Otherwise either the full type or its essence
    /// (the part before any `;` parameters) must be listed.
    pub fn permits(&self, content_type: &str) -> bool {
        if self.0.is_empty() {
            return true;
        }

        let normalized = content_type.trim().to_ascii_lowercase();
        if self.0.contains(&normalized) {
            return true;
        }

        match normalized.split_once(';') {
            Some((essence, _)) => self.0.contains(essence.trim()),
            None => false,
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for ContentTypeAllowlist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

impl From<Vec<String>> for ContentTypeAllowlist {
    fn from(types: Vec<String>) -> Self {
        types.into_iter().collect()
    }
}

impl From<Vec<&str>> for ContentTypeAllowlist {
    fn from(types: Vec<&str>) -> Self {
        types.into_iter().collect()
    }
}

impl<const N: usize> From<[&str; N]> for ContentTypeAllowlist {
    fn from(types: [&str; N]) -> Self {
        types.into_iter().collect()
    }
}

impl From<ContentTypeAllowlist> for Vec<String> {
    fn from(allowlist: ContentTypeAllowlist) -> Self {
        allowlist.0.into_iter().collect()
    }
}

/// Strict JSON body decoding configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JsonConfig {
    /// Maximum JSON body size in bytes.
    /// Set to 0 to use the default of 1 MiB.
    pub max_body_size: u64,
    /// Accept object keys with no matching field in the destination type
    pub allow_unknown_fields: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self {
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            allow_unknown_fields: false,
        }
    }
}

impl JsonConfig {
    pub fn effective_max_body_size(&self) -> u64 {
        if self.max_body_size == 0 {
            DEFAULT_MAX_BODY_SIZE
        } else {
            self.max_body_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.uploads.effective_max_request_size(), 1024 * 1024 * 1024);
        assert!(config.uploads.allowed_content_types.is_empty());
        assert_eq!(config.json.effective_max_body_size(), 1024 * 1024);
        assert!(!config.json.allow_unknown_fields);
    }

    #[test]
    fn test_zero_limits_fall_back_to_defaults() {
        let uploads = UploadConfig::new(0, ContentTypeAllowlist::default());
        assert_eq!(uploads.effective_max_request_size(), DEFAULT_MAX_REQUEST_SIZE);

        let json = JsonConfig {
            max_body_size: 0,
            allow_unknown_fields: true,
        };
        assert_eq!(json.effective_max_body_size(), DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn test_allowlist_is_case_insensitive() {
        let allowlist = ContentTypeAllowlist::from(["Image/PNG", " image/jpeg "]);
        assert_eq!(allowlist.len(), 2);
        assert!(allowlist.permits("image/png"));
        assert!(allowlist.permits("IMAGE/JPEG"));
        assert!(!allowlist.permits("image/gif"));
    }

    #[test]
    fn test_allowlist_matches_essence_of_parameterised_type() {
        let allowlist = ContentTypeAllowlist::from(["text/plain"]);
        assert!(allowlist.permits("text/plain; charset=utf-8"));
        assert!(!allowlist.permits("text/html; charset=utf-8"));

        let exact = ContentTypeAllowlist::from(["text/plain; charset=utf-8"]);
        assert!(exact.permits("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_empty_allowlist_permits_anything() {
        let allowlist = ContentTypeAllowlist::default();
        assert!(allowlist.permits("application/octet-stream"));
        assert!(allowlist.permits("image/png"));
    }

    #[test]
    fn test_load_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "toolkit.yaml",
                r#"
uploads:
  max_request_size: 2048
  allowed_content_types: ["image/PNG", "image/gif"]
json:
  max_body_size: 512
"#,
            )?;

            let config = Config::load(Some(Path::new("toolkit.yaml")))?;

            assert_eq!(config.uploads.max_request_size, 2048);
            assert!(config.uploads.allowed_content_types.permits("image/png"));
            assert!(config.uploads.allowed_content_types.permits("image/gif"));
            assert_eq!(config.json.max_body_size, 512);
            assert!(!config.json.allow_unknown_fields);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "toolkit.yaml",
                r#"
json:
  max_body_size: 512
"#,
            )?;
            jail.set_env("TOOLKIT_JSON__MAX_BODY_SIZE", "4096");
            jail.set_env("TOOLKIT_JSON__ALLOW_UNKNOWN_FIELDS", "true");

            let config = Config::load(Some(Path::new("toolkit.yaml")))?;

            assert_eq!(config.json.max_body_size, 4096);
            assert!(config.json.allow_unknown_fields);
            Ok(())
        });
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load(None)?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("toolkit.yaml", "json:\n  max_json_size: 10\n")?;
            assert!(Config::load(Some(Path::new("toolkit.yaml"))).is_err());
            Ok(())
        });
    }
}
