use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use switchboard::providers::openai::OpenAiConfig;

#[derive(Debug, Default, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerSettings {
    pub fn socket_addr(&self) -> SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .expect("Failed to parse socket address")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProviderSettings {
    OpenAi {
        #[serde(default = "default_openai_host")]
        host: String,
        api_key: String,
        #[serde(default = "default_model")]
        model: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
}

impl ProviderSettings {
    pub fn into_config(self) -> OpenAiConfig {
        match self {
            ProviderSettings::OpenAi {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            } => OpenAiConfig {
                host,
                api_key,
                model,
                temperature,
                max_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        // Start with default configuration
        let config = Config::builder()
            // Server defaults
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            // Provider defaults
            .set_default("provider.host", default_openai_host())?
            .set_default("provider.model", default_model())?
            // Layer on the environment variables
            .add_source(
                Environment::with_prefix("SWITCHBOARD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Try to deserialize the configuration
        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        // Handle missing field errors specially
        match result {
            Ok(settings) => Ok(settings),
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                // Handle both NotFound and missing field message variants
                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    // Extract field name from error message "missing field `type`"
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches("`");
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else if let config::ConfigError::NotFound(field) = &err {
                    let env_var = to_env_var(field);
                    Err(ConfigError::MissingEnvVar { env_var })
                } else {
                    Err(ConfigError::Other(err))
                }
            }
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_host() -> String {
    "https://api.openai.com".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clean_env() {
        for (key, _) in env::vars() {
            if key.starts_with("SWITCHBOARD_") {
                env::remove_var(&key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_default_settings() {
        clean_env();

        // Set required provider settings for test
        env::set_var("SWITCHBOARD_PROVIDER__TYPE", "openai");
        env::set_var("SWITCHBOARD_PROVIDER__API_KEY", "test-key");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 3000);

        let ProviderSettings::OpenAi {
            host,
            api_key,
            model,
            temperature,
            max_tokens,
        } = settings.provider;
        assert_eq!(host, "https://api.openai.com");
        assert_eq!(api_key, "test-key");
        assert_eq!(model, "gpt-4o-mini");
        assert_eq!(temperature, None);
        assert_eq!(max_tokens, None);

        // Clean up
        env::remove_var("SWITCHBOARD_PROVIDER__TYPE");
        env::remove_var("SWITCHBOARD_PROVIDER__API_KEY");
    }

    #[test]
    #[serial]
    fn test_missing_api_key() {
        clean_env();
        env::set_var("SWITCHBOARD_PROVIDER__TYPE", "openai");

        let error = Settings::new().unwrap_err();
        assert!(matches!(error, ConfigError::MissingEnvVar { .. }));
        assert!(error.to_string().contains("SWITCHBOARD_PROVIDER__API_KEY"));

        // Clean up
        env::remove_var("SWITCHBOARD_PROVIDER__TYPE");
    }

    #[test]
    #[serial]
    fn test_environment_override() {
        clean_env();
        env::set_var("SWITCHBOARD_SERVER__PORT", "8080");
        env::set_var("SWITCHBOARD_PROVIDER__TYPE", "openai");
        env::set_var("SWITCHBOARD_PROVIDER__API_KEY", "test-key");
        env::set_var("SWITCHBOARD_PROVIDER__HOST", "https://custom.openai.com");
        env::set_var("SWITCHBOARD_PROVIDER__MODEL", "gpt-4o");
        env::set_var("SWITCHBOARD_PROVIDER__TEMPERATURE", "0.8");

        let settings = Settings::new().unwrap();
        assert_eq!(settings.server.port, 8080);

        let ProviderSettings::OpenAi {
            host,
            api_key,
            model,
            temperature,
            ..
        } = settings.provider;
        assert_eq!(host, "https://custom.openai.com");
        assert_eq!(api_key, "test-key");
        assert_eq!(model, "gpt-4o");
        assert_eq!(temperature, Some(0.8));

        // Clean up
        env::remove_var("SWITCHBOARD_SERVER__PORT");
        env::remove_var("SWITCHBOARD_PROVIDER__TYPE");
        env::remove_var("SWITCHBOARD_PROVIDER__API_KEY");
        env::remove_var("SWITCHBOARD_PROVIDER__HOST");
        env::remove_var("SWITCHBOARD_PROVIDER__MODEL");
        env::remove_var("SWITCHBOARD_PROVIDER__TEMPERATURE");
    }

    #[test]
    fn test_socket_addr_conversion() {
        let server_settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 3000,
        };
        let addr = server_settings.socket_addr();
        assert_eq!(addr.to_string(), "127.0.0.1:3000");
    }
}
