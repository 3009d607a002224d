use crate::config::Config;
use crate::providers::{OllamaProvider, OpenAICompatProvider};
use crate::traits::Provider;
use anyhow::{Result, anyhow};
use std::sync::Arc;

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("lmstudio");

    match provider_name.to_lowercase().as_str() {
        "lmstudio" | "lm-studio" => {
            let mut provider = OpenAICompatProvider::lmstudio();
            if let Ok(key) = resolve_api_key(&["DELVE_API_KEY"], &config.api_key) {
                provider = provider.with_api_key(key);
            }
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = resolve_api_key(&["DELVE_API_KEY", "OPENAI_API_KEY"], &config.api_key)?;
            let mut provider = OpenAICompatProvider::openai(api_key);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "ollama" => {
            let mut provider = OllamaProvider::new();
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        _ => Err(anyhow!(
            "Unknown provider: {}. Available: lmstudio, ollama, openai",
            provider_name
        )),
    }
}

fn resolve_api_key(env_vars: &[&str], config_key: &str) -> Result<String> {
    for var_name in env_vars {
        if let Ok(key) = std::env::var(var_name)
            && !key.trim().is_empty()
        {
            return Ok(key);
        }
    }
    if !config_key.is_empty() {
        Ok(config_key.to_string())
    } else {
        Err(anyhow!(
            "No API key found (set {} or api_key in the config)",
            env_vars.join(" / ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_lmstudio() {
        let provider = create_provider(&Config::default()).unwrap();
        assert_eq!(provider.name(), "lmstudio");
    }

    #[test]
    fn builds_ollama() {
        let config = Config {
            provider: Some("Ollama".into()),
            ..Config::default()
        };
        assert_eq!(create_provider(&config).unwrap().name(), "ollama");
    }

    #[test]
    fn openai_uses_configured_key() {
        let config = Config {
            provider: Some("openai".into()),
            api_key: "sk-test".into(),
            ..Config::default()
        };
        assert_eq!(create_provider(&config).unwrap().name(), "openai");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let config = Config {
            provider: Some("glm".into()),
            ..Config::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err.to_string().contains("Unknown provider"));
    }
}
