use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::principal::Principal;
use crate::constants::ACCESS_TOKEN_AUDIENCE;
use crate::error::{GateError, Result};

/// Longest access token accepted before any decoding happens
const MAX_TOKEN_LEN: usize = 8192;

/// Provider-supplied profile data carried in the access token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Access-token claims issued by the hosted identity backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (as UTC timestamp)
    pub exp: usize,
    /// Issued at (as UTC timestamp)
    #[serde(default)]
    pub iat: usize,
    /// Audience, `authenticated` for signed-in users
    pub aud: Option<String>,
    /// Backend role claim (not the portal role)
    pub role: Option<String>,
    /// Optional email
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl Claims {
    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp().max(0) as usize;
        now > self.exp
    }

    pub fn into_principal(self) -> Principal {
        let email = self.email.filter(|e| !e.is_empty());
        let display_name = self
            .user_metadata
            .full_name
            .or(self.user_metadata.name)
            .filter(|n| !n.trim().is_empty());

        Principal {
            id: self.sub,
            email,
            display_name,
            avatar_url: self.user_metadata.avatar_url,
        }
    }
}

/// Verifies HS256 access tokens signed with the backend's JWT secret
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[ACCESS_TOKEN_AUDIENCE]);

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validates and decodes a token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(GateError::InvalidToken("Token too long".to_string()));
        }
        if token.chars().any(|c| c.is_control()) {
            return Err(GateError::InvalidToken(
                "Token contains invalid characters".to_string(),
            ));
        }

        Ok(decode::<Claims>(token, &self.decoding_key, &self.validation)?)
    }

    /// Validates a token and returns the principal it names
    pub fn verify(&self, token: &str) -> Result<Principal> {
        let claims = self.validate_token(token)?.claims;

        if claims.sub.is_empty() {
            return Err(GateError::InvalidToken("Token has no subject".to_string()));
        }
        if claims.is_expired() {
            return Err(GateError::InvalidToken("Token expired".to_string()));
        }

        Ok(claims.into_principal())
    }
}
