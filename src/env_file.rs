//! `.env` loading for the CLI.
//!
//! Two layouts are accepted:
//!
//! ```text
//! # dotenv                         # INI
//! OPENROUTER_API_KEY=sk-or-...     [openrouter]
//! OPENROUTER_MODEL=vendor/model    api_key = sk-or-...
//!                                  model = vendor/model
//!                                  proxy = socks5://127.0.0.1:1080
//!                                  max_concurrent = 12
//! ```
//!
//! A file with an `[openrouter]` section is read as INI and its keys are
//! mapped onto the `OPENROUTER_*` variables; anything else goes through
//! `dotenvy`. Either way, variables already present in the environment are
//! left alone, so flags > environment > `.env`.

use crate::error::SlidegenError;
use std::path::Path;

/// Default location, relative to the working directory.
pub const ENV_FILE: &str = ".env";

const SECTION: &str = "openrouter";

/// What [`load_env_file`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvFileKind {
    /// No file at the given path.
    Missing,
    /// `KEY=value` lines, loaded by dotenvy.
    Dotenv,
    /// An `[openrouter]` INI section; lists the variables it set.
    OpenRouterIni { applied: Vec<&'static str> },
}

/// Values from the `[openrouter]` section of an INI `.env`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenRouterSection {
    pub api_key: Option<String>,
    pub proxy: Option<String>,
    pub model: Option<String>,
    pub max_concurrent: Option<usize>,
}

impl OpenRouterSection {
    /// Parse INI text. Blank values count as absent and a non-integer
    /// `max_concurrent` is ignored.
    pub fn parse(text: &str) -> Result<Self, String> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(text, ::config::FileFormat::Ini))
            .build()
            .map_err(|e| e.to_string())?;

        let get = |key: &str| {
            settings
                .get_string(&format!("{SECTION}.{key}"))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Self {
            api_key: get("api_key"),
            proxy: get("proxy"),
            model: get("model"),
            max_concurrent: get("max_concurrent").and_then(|v| v.parse().ok()),
        })
    }

    /// The environment variables this section stands for.
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref key) = self.api_key {
            pairs.push(("OPENROUTER_API_KEY", key.clone()));
        }
        if let Some(ref proxy) = self.proxy {
            pairs.push(("OPENROUTER_PROXY", proxy.clone()));
        }
        if let Some(ref model) = self.model {
            pairs.push(("OPENROUTER_MODEL", model.clone()));
        }
        if let Some(n) = self.max_concurrent {
            pairs.push(("OPENROUTER_MAX_CONCURRENT", n.to_string()));
        }
        pairs
    }
}

/// Load `path` into the process environment.
///
/// A missing file is not an error. A file that is neither valid dotenv nor
/// an `[openrouter]` INI file is [`SlidegenError::EnvFileInvalid`].
pub fn load_env_file(path: &Path) -> Result<EnvFileKind, SlidegenError> {
    let invalid = |detail: String| SlidegenError::EnvFileInvalid {
        path: path.to_path_buf(),
        detail,
    };

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(EnvFileKind::Missing),
        Err(e) => return Err(invalid(e.to_string())),
    };

    if has_openrouter_section(&text) {
        let section = OpenRouterSection::parse(&text).map_err(invalid)?;
        let applied = apply_unset(
            section.env_pairs(),
            |key| std::env::var_os(key).is_some(),
            |key, value| std::env::set_var(key, value),
        );
        return Ok(EnvFileKind::OpenRouterIni { applied });
    }

    dotenvy::from_path(path).map_err(|e| invalid(e.to_string()))?;
    Ok(EnvFileKind::Dotenv)
}

fn has_openrouter_section(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .any(|line| line == format!("[{SECTION}]"))
}

/// Set every pair whose key is not already set; returns the keys written.
fn apply_unset(
    pairs: Vec<(&'static str, String)>,
    is_set: impl Fn(&str) -> bool,
    mut set: impl FnMut(&str, &str),
) -> Vec<&'static str> {
    let mut applied = Vec::new();
    for (key, value) in pairs {
        if !is_set(key) {
            set(key, &value);
            applied.push(key);
        }
    }
    applied
}
