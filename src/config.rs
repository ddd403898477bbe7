use secrecy::Secret;

/// Bounds of the bcrypt work factor; the crate keeps its own limits private.
pub const MIN_PASSWORD_COST: u32 = 4;
pub const MAX_PASSWORD_COST: u32 = 31;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Secret<String>,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,

    // Generated secrets, lengths in random bytes
    pub activation_code_length: usize,
    pub session_token_length: usize,
    pub code_generation_attempts: u32,

    // bcrypt work factor for new password hashes
    pub password_hash_cost: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("host", "127.0.0.1")?
            .set_default("max_connections", 20)?
            .set_default("activation_code_length", 8)?
            .set_default("session_token_length", 16)?
            .set_default("code_generation_attempts", 10)?
            .set_default("password_hash_cost", i64::from(bcrypt::DEFAULT_COST))?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Self::from_source(&config)
    }

    fn from_source(config: &config::Config) -> Result<Self, config::ConfigError> {
        let parsed = Self {
            database_url: Secret::new(config.get("database_url")?),
            host: config.get("host")?,
            port: config.get("port")?,
            max_connections: config.get("max_connections")?,
            activation_code_length: config.get("activation_code_length")?,
            session_token_length: config.get("session_token_length")?,
            code_generation_attempts: config.get("code_generation_attempts")?,
            password_hash_cost: config.get("password_hash_cost")?,
        };

        if parsed.activation_code_length == 0 || parsed.session_token_length == 0 {
            return Err(config::ConfigError::Message(
                "token lengths must be at least one byte".to_string(),
            ));
        }
        if parsed.code_generation_attempts == 0 {
            return Err(config::ConfigError::Message(
                "code_generation_attempts must be at least 1".to_string(),
            ));
        }
        if !(MIN_PASSWORD_COST..=MAX_PASSWORD_COST).contains(&parsed.password_hash_cost) {
            return Err(config::ConfigError::Message(format!(
                "password_hash_cost must be between {MIN_PASSWORD_COST} and {MAX_PASSWORD_COST}"
            )));
        }

        Ok(parsed)
    }
}
