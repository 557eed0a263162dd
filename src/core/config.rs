use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub health_api_url: String,
    pub openai_model: String,
    pub openai_api_hostname: String,
    pub openai_api_key: String,
    pub temperature: f64,
    pub system_message: String,
    pub llm_timeout: Duration,
    pub source_timeout: Duration,
}

// Falls back to `default` when the variable is unset or doesn't parse
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(val) => val.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {}", key, val);
            default
        }),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("HEALTHGPT_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/healthgpt.db", storage_path.trim_end_matches('/'));
        let health_api_url = env::var("HEALTHGPT_HEALTH_API_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8787".to_string());
        let openai_api_hostname = env::var("HEALTHGPT_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        let openai_api_key =
            env::var("OPENAI_API_KEY").unwrap_or_else(|_| "thiswontworkforopenai".to_string());
        let openai_model =
            env::var("HEALTHGPT_LLM_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let system_message = env::var("HEALTHGPT_SYSTEM_MESSAGE")
            .unwrap_or_else(|_| "You are a helpful assistant.".to_string());
        let temperature = env_or("HEALTHGPT_LLM_TEMPERATURE", 0.7);
        let llm_timeout = Duration::from_secs(env_or("HEALTHGPT_LLM_TIMEOUT_SECS", 60));
        let source_timeout = Duration::from_secs(env_or("HEALTHGPT_SOURCE_TIMEOUT_SECS", 30));

        Self {
            storage_path,
            db_path,
            health_api_url,
            openai_model,
            openai_api_hostname,
            openai_api_key,
            temperature,
            system_message,
            llm_timeout,
            source_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_missing_var() {
        let val: u64 = env_or("HEALTHGPT_TEST_SURELY_UNSET_VAR", 42);
        assert_eq!(val, 42);
    }

    #[test]
    fn test_default_db_path_lives_under_storage_path() {
        let config = AppConfig::default();
        assert!(config.db_path.ends_with("/healthgpt.db"));
        assert!(config.db_path.starts_with(config.storage_path.trim_end_matches('/')));
    }

    #[test]
    fn test_defaults_for_unset_llm_settings() {
        let config = AppConfig::default();
        if env::var("OPENAI_API_KEY").is_err() {
            assert_eq!(config.openai_api_key, "thiswontworkforopenai");
        }
        if env::var("HEALTHGPT_SYSTEM_MESSAGE").is_err() {
            assert_eq!(config.system_message, "You are a helpful assistant.");
        }
    }
}
