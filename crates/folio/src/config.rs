//! Configuration of the terminal front end, read from the environment.

use std::env;
use std::path::PathBuf;

use folio_http::{HttpConfig, HttpConfigBuilder};

/// Variable holding the backend base URL.
pub const BASE_URL_VAR: &str = "FOLIO_BASE_URL";
/// Variable holding the path of the state file.
pub const STATE_FILE_VAR: &str = "FOLIO_STATE_FILE";
/// Variable holding an ID token to sign in with at startup.
pub const ID_TOKEN_VAR: &str = "FOLIO_ID_TOKEN";

/// Settings of the terminal front end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CliConfig {
    base_url: Option<String>,
    state_file: PathBuf,
    id_token: Option<String>,
}

impl CliConfig {
    /// Reads the settings from the process environment.
    #[inline]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the settings through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let state_file = match read(STATE_FILE_VAR) {
            Some(path) => PathBuf::from(path),
            None => default_state_file(),
        };
        Self {
            base_url: read(BASE_URL_VAR),
            state_file,
            id_token: read(ID_TOKEN_VAR),
        }
    }

    /// Returns the path the session state is persisted to.
    #[inline]
    pub fn state_file(&self) -> &PathBuf {
        &self.state_file
    }

    /// Returns the ID token to sign in with at startup, if any.
    #[inline]
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }

    /// Builds the configuration of the HTTP backend.
    pub fn http_config(&self) -> HttpConfig {
        let builder = HttpConfigBuilder::new();
        match &self.base_url {
            Some(base_url) => builder.with_base_url(base_url.clone()).build(),
            None => builder.build(),
        }
    }
}

fn default_state_file() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("folio")
        .join("state.json")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(
        vars: &[(&str, &str)],
    ) -> impl Fn(&str) -> Option<String> + use<> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CliConfig::from_lookup(lookup(&[(ID_TOKEN_VAR, "  ")]));
        assert_eq!(config.http_config().base_url(), "http://localhost:8000");
        assert_eq!(config.id_token(), None);
        assert!(config.state_file().ends_with("folio/state.json"));
    }

    #[test]
    fn test_overrides() {
        let config = CliConfig::from_lookup(lookup(&[
            (BASE_URL_VAR, "https://portfolio.example/"),
            (STATE_FILE_VAR, "/tmp/folio-test.json"),
            (ID_TOKEN_VAR, "eyJ0b2tlbiI6dHJ1ZX0"),
        ]));
        assert_eq!(
            config.http_config().base_url(),
            "https://portfolio.example"
        );
        assert_eq!(config.state_file(), &PathBuf::from("/tmp/folio-test.json"));
        assert_eq!(config.id_token(), Some("eyJ0b2tlbiI6dHJ1ZX0"));
    }
}
