use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of JWT: a long-lived session token or a single-purpose reset token.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[serde(alias = "Session")]
    Session,
    #[serde(alias = "Reset")]
    Reset,
}

/// JWT payload used for authentication and password resets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,       // user ID
    pub iat: usize,      // issued at (unix timestamp)
    pub exp: usize,      // expires at (unix timestamp)
    pub iss: String,     // issuer
    pub aud: String,     // audience
    pub kind: TokenKind, // token type
}
