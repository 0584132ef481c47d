use serde::{Deserialize, Serialize};

/// Token claims minted by the external identity provider. This service only
/// verifies; it never issues tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Opaque authenticated user identifier.
    pub sub: String,
    pub exp: usize,
    pub jti: String,
}
