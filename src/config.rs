//! Application configuration.
//!
//! Everything comes from environment variables, read once at startup. The
//! deploy injects secrets as env vars via secret bindings, so provider
//! credentials and the signing key are plain `env::var` reads here.

use std::env;

/// Read a required variable, naming it in the error.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Runtime configuration, loaded once and shared via `AppState`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava application client ID (public).
    pub strava_client_id: String,
    /// Spotify application client ID (public).
    pub spotify_client_id: String,
    /// Frontend origin, used by the CORS allowlist.
    pub frontend_url: String,
    /// GCP project the Firestore database lives in.
    pub gcp_project_id: String,
    pub port: u16,

    /// Strava client secret, used when refreshing access tokens.
    pub strava_client_secret: String,
    /// Spotify client secret, used when refreshing access tokens.
    pub spotify_client_secret: String,
    /// HMAC key for session JWTs.
    pub jwt_signing_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            strava_client_id: required("STRAVA_CLIENT_ID")?,
            spotify_client_id: required("SPOTIFY_CLIENT_ID")?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            strava_client_secret: required("STRAVA_CLIENT_SECRET")?,
            spotify_client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
        })
    }
}

impl Default for Config {
    /// Test fixture; never used for a real deployment.
    fn default() -> Self {
        Self {
            strava_client_id: "test_strava_id".to_string(),
            spotify_client_id: "test_spotify_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            strava_client_secret: "test_strava_secret".to_string(),
            spotify_client_secret: "test_spotify_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
        }
    }
}

/// Why configuration loading failed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", " test_secret ");
        env::set_var("SPOTIFY_CLIENT_ID", "test_spotify");
        env::set_var("SPOTIFY_CLIENT_SECRET", "test_spotify_secret");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");

        let config = Config::from_env().expect("all required vars are set above");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.spotify_client_id, "test_spotify");
        assert_eq!(config.port, 8080);
        // Pasted secrets tend to carry whitespace; it must not survive.
        assert_eq!(config.strava_client_secret, "test_secret");
    }
}
