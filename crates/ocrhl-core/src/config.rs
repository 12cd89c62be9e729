use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::OcrBlock;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Configuration from an inline TOML document, without env overrides.
    pub fn from_toml_str(toml: &str) -> anyhow::Result<Self> {
        let config = Self { figment: Figment::new().merge(Toml::string(toml)) };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[highlight]` section, or defaults when it is absent.
    pub fn highlight(&self) -> anyhow::Result<HighlightConfig> {
        let cfg = if self.figment.contains("highlight") {
            self.get::<HighlightConfig>("highlight")?
        } else {
            HighlightConfig::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.figment.contains("highlight") {
            self.get::<HighlightConfig>("highlight")?.validate()?;
        }
        Ok(())
    }
}

/// Per-field highlighting parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Unit a passage window is built from.
    pub context_block: OcrBlock,
    /// Unit a passage may never cross; `"none"` disables the limit.
    #[serde(deserialize_with = "deserialize_limit_block")]
    pub limit_block: Option<OcrBlock>,
    /// Number of `context_block` units a window extends by in each direction.
    pub context_size: usize,
    /// Maximum number of passages per document and field.
    pub snippets: usize,
    /// Maximum number of summary passages when nothing matched; defaults to `snippets`.
    pub max_no_highlight_passages: Option<usize>,
    pub tag_pre: String,
    pub tag_post: String,
    pub absolute_highlights: bool,
    pub align_spans: bool,
    pub expand_alternatives: bool,
    /// 0-based page highlighting is restricted to; unset highlights the whole document.
    pub page: Option<usize>,
    pub score: ScoreConfig,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            context_block: OcrBlock::Line,
            limit_block: Some(OcrBlock::Block),
            context_size: 2,
            snippets: 1,
            max_no_highlight_passages: None,
            tag_pre: "<em>".to_string(),
            tag_post: "</em>".to_string(),
            absolute_highlights: false,
            align_spans: false,
            expand_alternatives: false,
            page: None,
            score: ScoreConfig::default(),
        }
    }
}

impl HighlightConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.context_size == 0 {
            return Err(Error::InvalidConfig("context_size must be at least 1".to_string()));
        }
        if self.score.k1 < 0.0 || !(0.0..=1.0).contains(&self.score.b) || self.score.pivot <= 0.0 {
            return Err(Error::InvalidConfig(format!("invalid passage scoring parameters {:?}", self.score)));
        }
        Ok(())
    }

    pub fn summary_passages(&self) -> usize {
        self.max_no_highlight_passages.unwrap_or(self.snippets)
    }
}

/// BM25-style passage scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub k1: f32,
    pub b: f32,
    pub pivot: f32,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75, pivot: 87.0 }
    }
}

fn deserialize_limit_block<'de, D>(deserializer: D) -> Result<Option<OcrBlock>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None => Ok(None),
        Some(s) if s.eq_ignore_ascii_case("none") || s.is_empty() => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
