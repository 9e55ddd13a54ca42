use crate::synth::{Fallback, PromptVariant};

pub const DEFAULT_LLM_BASE: &str = "https://router.huggingface.co/v1";
pub const DEFAULT_LLM_MODEL: &str = "meta-llama/Llama-3.3-70B-Instruct";

/// Process configuration, resolved once at startup and passed down.
#[derive(Clone, Debug)]
pub struct Config {
    pub llm_api_key: Option<String>,
    pub llm_base: String,
    pub llm_model: String,
    /// Overrides the per-prompt output token budget when set.
    pub llm_max_tokens: Option<u32>,
    pub prompt_variant: PromptVariant,
    pub fallback: Fallback,
    pub seed: Option<u64>,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub export_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            llm_api_key: first_api_key(std::env::var("HF_API_KEY").ok(), std::env::var("LLM_API_KEY").ok()),
            llm_base: std::env::var("LLM_BASE").unwrap_or_else(|_| DEFAULT_LLM_BASE.to_string()),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            llm_max_tokens: std::env::var("LLM_MAX_TOKENS").ok().and_then(|v| v.parse().ok()),
            prompt_variant: std::env::var("PROMPT_VARIANT").ok().and_then(|v| PromptVariant::parse(&v)).unwrap_or(PromptVariant::Surplus),
            fallback: std::env::var("FALLBACK").ok().and_then(|v| Fallback::parse(&v)).unwrap_or(Fallback::Sentinel),
            seed: std::env::var("SEED").ok().and_then(|v| v.parse().ok()),
            supabase_url: std::env::var("SUPABASE_URL").ok(),
            supabase_key: std::env::var("SUPABASE_KEY").ok(),
            export_dir: std::env::var("EXPORT_DIR").unwrap_or_else(|_| ".".to_string()),
        }
    }

    pub fn has_llm_credentials(&self) -> bool {
        self.llm_api_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false)
    }
}

/// `HF_API_KEY` wins over `LLM_API_KEY`; blank values are treated as unset.
fn first_api_key(hf: Option<String>, llm: Option<String>) -> Option<String> {
    let present = |k: &String| !k.trim().is_empty();
    hf.filter(present).or_else(|| llm.filter(present))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: None,
            llm_base: DEFAULT_LLM_BASE.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_max_tokens: None,
            prompt_variant: PromptVariant::Surplus,
            fallback: Fallback::Sentinel,
            seed: None,
            supabase_url: None,
            supabase_key: None,
            export_dir: ".".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_credentials() {
        let cfg = Config::default();
        assert!(!cfg.has_llm_credentials());
        assert_eq!(cfg.llm_model, DEFAULT_LLM_MODEL);
        assert_eq!(cfg.fallback, Fallback::Sentinel);
    }

    #[test]
    fn test_blank_key_is_not_a_credential() {
        let cfg = Config {
            llm_api_key: Some("   ".to_string()),
            ..Config::default()
        };
        assert!(!cfg.has_llm_credentials());
    }

    #[test]
    fn test_blank_hf_key_falls_through() {
        let key = first_api_key(Some(String::new()), Some("llm-key".to_string()));
        assert_eq!(key.as_deref(), Some("llm-key"));
        let key = first_api_key(Some("  ".to_string()), None);
        assert_eq!(key, None);
        let key = first_api_key(Some("hf-key".to_string()), Some("llm-key".to_string()));
        assert_eq!(key.as_deref(), Some("hf-key"));
    }
}
