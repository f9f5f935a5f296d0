use secrecy::SecretString;

/// Wraps an API key with secrecy protection (zeroized on drop, redacted in Debug).
#[derive(Clone)]
pub struct ApiKey(pub SecretString);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// HMAC secret used to sign session tokens.
#[derive(Clone)]
pub struct TokenSecret(pub SecretString);

impl std::fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenSecret([REDACTED])")
    }
}

/// Environment variable names the binary reads at startup.
pub mod env_vars {
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
    pub const CONECTA_JWT_SECRET: &str = "CONECTA_JWT_SECRET";
    pub const CONECTA_GOOGLE_CLIENT_ID: &str = "CONECTA_GOOGLE_CLIENT_ID";
    pub const CONECTA_DEV: &str = "CONECTA_DEV";
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn api_key_debug_redacted() {
        let key = ApiKey(SecretString::from("AIzaSy-12345"));
        let debug = format!("{:?}", key);
        assert!(!debug.contains("AIzaSy"), "key leaked in debug: {debug}");
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn token_secret_debug_redacted() {
        let secret = TokenSecret(SecretString::from("super-secret"));
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"), "secret leaked: {debug}");
    }

    #[test]
    fn api_key_expose_secret() {
        let key = ApiKey(SecretString::from("AIzaSy-12345"));
        assert_eq!(key.0.expose_secret(), "AIzaSy-12345");
    }
}
