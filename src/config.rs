//! Runtime configuration assembled from the environment.
//!
//! Exactly one backend provider is selected at startup, preferring an
//! explicit OpenRouter key, then DeepSeek, then Gemini. All three are
//! addressed through the OpenAI-compatible chat-completions interface; the
//! provider choice fixes the base URL, the credential, the set of valid
//! model names, and the per-request token ceiling.

use crate::error::{LlmapError, Result};

/// Which chat-completions provider the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenRouter,
    DeepSeek,
    Gemini,
}

impl Provider {
    pub fn base_url(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "https://openrouter.ai/api/v1",
            Provider::DeepSeek => "https://api.deepseek.com",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai/",
        }
    }

    pub fn valid_models(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenRouter => &["deepseek/deepseek-chat", "deepseek/deepseek-r1"],
            Provider::DeepSeek => &["deepseek-chat", "deepseek-reasoner"],
            Provider::Gemini => &[
                "gemini-1.5-flash",
                "gemini-2.0-flash",
                "gemini-1.5-pro",
                "gemini-2.0-pro-exp-02-05",
            ],
        }
    }

    pub fn default_analyze_model(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "deepseek/deepseek-chat",
            Provider::DeepSeek => "deepseek-chat",
            Provider::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn default_refine_model(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "deepseek/deepseek-r1",
            Provider::DeepSeek => "deepseek-reasoner",
            Provider::Gemini => "gemini-2.0-pro-exp-02-05",
        }
    }

    /// Per-request input ceiling in tokens.
    ///
    /// DeepSeek's context is 64k shared with the 8k output budget, so the
    /// input ceiling is 62 000 minus 8 000 of headroom for scaffolding.
    /// OpenRouter serves the same DeepSeek models and inherits the limit.
    pub fn max_tokens(&self) -> usize {
        match self {
            Provider::OpenRouter | Provider::DeepSeek => 54_000,
            Provider::Gemini => 500_000,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "OpenRouter",
            Provider::DeepSeek => "DeepSeek",
            Provider::Gemini => "Gemini",
        }
    }
}

/// Which cache operations are permitted, from `LLMAP_CACHE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    None,
    Read,
    Write,
    #[default]
    ReadWrite,
}

impl CacheMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "none" => Ok(CacheMode::None),
            "read" => Ok(CacheMode::Read),
            "write" => Ok(CacheMode::Write),
            "read/write" => Ok(CacheMode::ReadWrite),
            other => Err(LlmapError::InvalidConfig(format!(
                "LLMAP_CACHE must be one of: none, read, write, read/write (got '{other}')"
            ))),
        }
    }

    pub fn reads(&self) -> bool {
        matches!(self, CacheMode::Read | CacheMode::ReadWrite)
    }

    pub fn writes(&self) -> bool {
        matches!(self, CacheMode::Write | CacheMode::ReadWrite)
    }
}

/// Immutable runtime configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub api_key: String,
    pub analyze_model: String,
    pub refine_model: String,
    pub cache_mode: CacheMode,
    /// Echo every LLM response to stderr (`LLMAP_VERBOSE`).
    pub verbose: bool,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// Requires at least one of `OPENROUTER_API_KEY`, `DEEPSEEK_API_KEY`,
    /// `GEMINI_API_KEY`, selected in that order of preference.
    pub fn from_env() -> Result<Self> {
        let provider_key = [
            (Provider::OpenRouter, "OPENROUTER_API_KEY"),
            (Provider::DeepSeek, "DEEPSEEK_API_KEY"),
            (Provider::Gemini, "GEMINI_API_KEY"),
        ]
        .into_iter()
        .find_map(|(provider, var)| {
            std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|key| (provider, key))
        });

        let (provider, api_key) = provider_key.ok_or_else(|| {
            LlmapError::InvalidConfig(
                "one of OPENROUTER_API_KEY, DEEPSEEK_API_KEY or GEMINI_API_KEY must be set".into(),
            )
        })?;

        let cache_mode = match std::env::var("LLMAP_CACHE") {
            Ok(value) => CacheMode::parse(&value)?,
            Err(_) => CacheMode::default(),
        };

        Self::build(
            provider,
            api_key,
            std::env::var("LLMAP_ANALYZE_MODEL").ok(),
            std::env::var("LLMAP_REFINE_MODEL").ok(),
            cache_mode,
            std::env::var("LLMAP_VERBOSE").is_ok(),
        )
    }

    /// Assemble and validate a configuration from explicit values.
    pub fn build(
        provider: Provider,
        api_key: String,
        analyze_model: Option<String>,
        refine_model: Option<String>,
        cache_mode: CacheMode,
        verbose: bool,
    ) -> Result<Self> {
        let analyze_model =
            analyze_model.unwrap_or_else(|| provider.default_analyze_model().to_string());
        let refine_model =
            refine_model.unwrap_or_else(|| provider.default_refine_model().to_string());

        for (var, model) in [
            ("LLMAP_ANALYZE_MODEL", &analyze_model),
            ("LLMAP_REFINE_MODEL", &refine_model),
        ] {
            if !provider.valid_models().contains(&model.as_str()) {
                return Err(LlmapError::InvalidConfig(format!(
                    "{var} must be one of: {}",
                    provider.valid_models().join(", ")
                )));
            }
        }

        Ok(Self {
            provider,
            api_key,
            analyze_model,
            refine_model,
            cache_mode,
            verbose,
        })
    }

    /// Per-request input ceiling for the selected provider.
    pub fn max_tokens(&self) -> usize {
        self.provider.max_tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_mode_parse() {
        assert_eq!(CacheMode::parse("none").unwrap(), CacheMode::None);
        assert_eq!(CacheMode::parse("read").unwrap(), CacheMode::Read);
        assert_eq!(CacheMode::parse("write").unwrap(), CacheMode::Write);
        assert_eq!(CacheMode::parse("read/write").unwrap(), CacheMode::ReadWrite);
        assert_eq!(CacheMode::parse("READ/WRITE").unwrap(), CacheMode::ReadWrite);
        assert!(CacheMode::parse("sometimes").is_err());
    }

    #[test]
    fn test_cache_mode_permissions() {
        assert!(!CacheMode::None.reads() && !CacheMode::None.writes());
        assert!(CacheMode::Read.reads() && !CacheMode::Read.writes());
        assert!(!CacheMode::Write.reads() && CacheMode::Write.writes());
        assert!(CacheMode::ReadWrite.reads() && CacheMode::ReadWrite.writes());
    }

    #[test]
    fn test_provider_defaults_are_valid() {
        for provider in [Provider::OpenRouter, Provider::DeepSeek, Provider::Gemini] {
            assert!(provider
                .valid_models()
                .contains(&provider.default_analyze_model()));
            assert!(provider
                .valid_models()
                .contains(&provider.default_refine_model()));
        }
    }

    #[test]
    fn test_provider_token_ceilings() {
        assert_eq!(Provider::DeepSeek.max_tokens(), 54_000);
        assert_eq!(Provider::OpenRouter.max_tokens(), 54_000);
        assert_eq!(Provider::Gemini.max_tokens(), 500_000);
    }

    #[test]
    fn test_build_applies_defaults() {
        let config = Config::build(
            Provider::DeepSeek,
            "sk-test".into(),
            None,
            None,
            CacheMode::default(),
            false,
        )
        .unwrap();
        assert_eq!(config.analyze_model, "deepseek-chat");
        assert_eq!(config.refine_model, "deepseek-reasoner");
        assert_eq!(config.cache_mode, CacheMode::ReadWrite);
    }

    #[test]
    fn test_build_rejects_unknown_model() {
        let result = Config::build(
            Provider::DeepSeek,
            "sk-test".into(),
            Some("gpt-4o".into()),
            None,
            CacheMode::default(),
            false,
        );
        assert!(matches!(result, Err(LlmapError::InvalidConfig(_))));
    }

    #[test]
    fn test_build_accepts_valid_override() {
        let config = Config::build(
            Provider::Gemini,
            "key".into(),
            Some("gemini-1.5-flash".into()),
            Some("gemini-1.5-pro".into()),
            CacheMode::None,
            true,
        )
        .unwrap();
        assert_eq!(config.analyze_model, "gemini-1.5-flash");
        assert_eq!(config.refine_model, "gemini-1.5-pro");
        assert!(config.verbose);
    }
}
