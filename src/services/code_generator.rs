//! Random secret tokens that are unique across every persisted record.
//!
//! A token is drawn from a [`ByteSource`], encoded, and checked against the
//! unscoped record set (soft-deleted rows included) for its column. Collisions
//! are redrawn up to a fixed number of attempts. The check is advisory: the
//! caller persists the token in the same transaction and the column's unique
//! constraint settles any race.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};

use crate::config::Config;
use crate::error::{AppError, Result};

/// A column holding generated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenField {
    /// `cards.activation_code`, uppercase hex
    ActivationCode,
    /// `user_sessions.session_token`, URL-safe base64 without padding
    SessionToken,
}

impl TokenField {
    pub fn name(self) -> &'static str {
        match self {
            TokenField::ActivationCode => "activation_code",
            TokenField::SessionToken => "session_token",
        }
    }

    fn encode(self, bytes: &[u8]) -> String {
        match self {
            TokenField::ActivationCode => hex::encode_upper(bytes),
            TokenField::SessionToken => URL_SAFE_NO_PAD.encode(bytes),
        }
    }
}

/// Existence check against every persisted token of a field.
#[async_trait]
pub trait TokenRegistry: Send {
    async fn token_exists(&mut self, field: TokenField, token: &str) -> Result<bool>;
}

/// Supplies random bytes for new tokens.
pub trait ByteSource: Send + Sync {
    fn fill(&self, dest: &mut [u8]) -> Result<()>;
}

impl ByteSource for SystemRandom {
    fn fill(&self, dest: &mut [u8]) -> Result<()> {
        SecureRandom::fill(self, dest)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system random source failed")))
    }
}

#[derive(Clone)]
pub struct CodeGenerator {
    source: Arc<dyn ByteSource>,
    activation_code_length: usize,
    session_token_length: usize,
    max_attempts: u32,
}

impl std::fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("activation_code_length", &self.activation_code_length)
            .field("session_token_length", &self.session_token_length)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl CodeGenerator {
    /// Lengths are in random bytes; an activation code is twice as many hex
    /// characters.
    pub fn new(
        source: Arc<dyn ByteSource>,
        activation_code_length: usize,
        session_token_length: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            source,
            activation_code_length: activation_code_length.max(1),
            session_token_length: session_token_length.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(SystemRandom::new()),
            config.activation_code_length,
            config.session_token_length,
            config.code_generation_attempts,
        )
    }

    pub fn byte_length(&self, field: TokenField) -> usize {
        match field {
            TokenField::ActivationCode => self.activation_code_length,
            TokenField::SessionToken => self.session_token_length,
        }
    }

    /// Draws one encoded token without any uniqueness check.
    pub fn draw(&self, field: TokenField) -> Result<String> {
        let mut bytes = vec![0u8; self.byte_length(field)];
        self.source.fill(&mut bytes)?;
        Ok(field.encode(&bytes))
    }

    /// Returns a token with no existing match in `registry`.
    #[tracing::instrument(skip_all, fields(field = field.name()))]
    pub async fn generate<R>(&self, registry: &mut R, field: TokenField) -> Result<String>
    where
        R: TokenRegistry + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let token = self.draw(field)?;
            if !registry.token_exists(field, &token).await? {
                if attempt > 1 {
                    tracing::debug!(attempt, "Unique token found after collision");
                }
                return Ok(token);
            }
            tracing::warn!(attempt, "Generated token collides with an existing one");
        }

        tracing::error!(attempts = self.max_attempts, "Token generation exhausted");
        Err(AppError::GenerationExhausted {
            field: field.name(),
            attempts: self.max_attempts,
        })
    }
}
