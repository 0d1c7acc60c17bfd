use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;

// DESIGN CHOICE: One flat config block for the whole adapter.
// The adapter ships every event to a single collector endpoint, so there
// is no per-source configuration to multiplex. Defaults mirror the hosted
// Sumologic HTTP source conventions.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // Collector hostname, targets the hosted HTTP input
    #[serde(default = "default_host")]
    pub host: String,

    // Receiver path prefix, the key is appended to this
    #[serde(default = "default_path")]
    pub path: String,

    // HTTP source key. May use %{field} lookups, which is aimed at
    // multitenant setups that pull the key from the event itself.
    pub key: String,

    // Full override URL, %{field}-expandable. When set it is the request
    // target; when unset the https://{host}{path}{key} composition is used.
    pub url: Option<String>,

    // Only "post" is supported
    #[serde(default = "default_http_method")]
    pub http_method: String,

    // If unset, derived from `format` at setup time
    pub content_type: Option<String>,

    // Optional reshaping of the body: output key -> %{field} template,
    // applied in configuration order
    pub mapping: Option<IndexMap<String, String>>,

    #[serde(default)]
    pub format: Format,

    // Literal body template, required iff format is "message"
    pub message: Option<String>,

    // Output filter, owned by the hosting loop rather than the adapter:
    // match_on: only ship events matching at least one pattern (whitelist)
    // exclude_on: skip events matching any pattern (blacklist)
    #[serde(default)]
    pub match_on: Vec<String>,

    #[serde(default)]
    pub exclude_on: Vec<String>,
}

/// Structure of the HTTP body.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Mapping (or whole event) serialized as a JSON object
    #[default]
    Json,
    /// Mapping (or whole event) as a form-urlencoded query string
    Form,
    /// The `message` template expanded against the event
    Message,
}

fn default_host() -> String {
    "collectors.sumologic.com".to_string()
}

fn default_path() -> String {
    "/receiver/v1/http/".to_string()
}

fn default_http_method() -> String {
    "post".to_string()
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    // Shape-level validation; the format/message coupling is checked at
    // adapter setup, where the warning side effects belong.
    fn validate(&self) -> anyhow::Result<()> {
        if self.http_method.to_lowercase() != "post" {
            anyhow::bail!(
                "http_method '{}' is not supported (only 'post')",
                self.http_method
            );
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
}
