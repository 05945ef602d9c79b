//! Access-token acquisition for the storage provider.
//!
//! Order of preference when resolving a token:
//! 1. a refresh token (from `REFRESH_TOKEN` or the token file) exchanged at
//!    the provider's token endpoint,
//! 2. a manually supplied `ACCESS_TOKEN`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config;
use crate::error::AuthError;

/// Everything the token flow needs, read once from the environment.
#[derive(Clone, Debug, Default)]
pub struct AuthSettings {
    pub api_url: String,
    pub authorize_url: String,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub token_file: PathBuf,
}

impl AuthSettings {
    pub fn from_env() -> Self {
        Self {
            api_url: config::get_storage_api_url(),
            authorize_url: config::get_storage_authorize_url(),
            app_key: config::get_app_key(),
            app_secret: config::get_app_secret(),
            redirect_uri: config::get_redirect_uri(),
            refresh_token: config::get_refresh_token(),
            access_token: config::get_access_token(),
            token_file: PathBuf::from(config::get_token_file()),
        }
    }
}

/// Token endpoint response.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Persisted between runs so `auth login` only has to happen once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredToken {
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub obtained_at: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenSource {
    Refreshed,
    Manual,
}

#[derive(Clone, Debug)]
pub struct AccessToken {
    pub token: String,
    pub source: TokenSource,
}

/// URL the user opens to grant access. With a verifier, the plain PKCE
/// challenge is attached.
pub fn authorization_url(settings: &AuthSettings, verifier: Option<&str>) -> Result<String, AuthError> {
    let app_key = settings.app_key.as_deref().ok_or(AuthError::MissingAppKey)?;
    let mut params: Vec<(&str, String)> = vec![
        ("client_id", app_key.to_string()),
        ("response_type", "code".into()),
        ("token_access_type", "offline".into()),
    ];
    if let Some(uri) = settings.redirect_uri.as_deref() {
        params.push(("redirect_uri", uri.to_string()));
    }
    if let Some(v) = verifier {
        params.push(("code_challenge", v.to_string()));
        params.push(("code_challenge_method", "plain".into()));
    }
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Ok(format!("{}?{}", settings.authorize_url, query))
}

async fn post_token_form(
    client: &reqwest::Client,
    settings: &AuthSettings,
    mut form: Vec<(&'static str, String)>,
) -> Result<TokenResponse, AuthError> {
    let app_key = settings.app_key.clone().ok_or(AuthError::MissingAppKey)?;
    form.push(("client_id", app_key));
    if let Some(secret) = settings.app_secret.clone() {
        form.push(("client_secret", secret));
    }
    let url = format!("{}/oauth2/token", settings.api_url);
    let resp = client
        .post(&url)
        .form(&form)
        .send()
        .await
        .map_err(|e| AuthError::Network(e.to_string()))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }
    resp.json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::Network(format!("invalid token response: {}", e)))
}

/// Exchange an authorization code obtained from [`authorization_url`].
pub async fn exchange_code(
    client: &reqwest::Client,
    settings: &AuthSettings,
    code: &str,
    verifier: Option<&str>,
) -> Result<TokenResponse, AuthError> {
    let mut form = vec![
        ("grant_type", "authorization_code".to_string()),
        ("code", code.trim().to_string()),
    ];
    if let Some(uri) = settings.redirect_uri.clone() {
        form.push(("redirect_uri", uri));
    }
    if let Some(v) = verifier {
        form.push(("code_verifier", v.to_string()));
    }
    post_token_form(client, settings, form).await
}

pub async fn refresh_access_token(
    client: &reqwest::Client,
    settings: &AuthSettings,
    refresh_token: &str,
) -> Result<TokenResponse, AuthError> {
    let form = vec![
        ("grant_type", "refresh_token".to_string()),
        ("refresh_token", refresh_token.to_string()),
    ];
    post_token_form(client, settings, form).await
}

pub fn load_stored_token(path: &Path) -> Result<Option<StoredToken>, AuthError> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| AuthError::TokenFile(format!("{}: {}", path.display(), e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AuthError::TokenFile(format!("{}: {}", path.display(), e))),
    }
}

pub fn save_stored_token(path: &Path, token: &StoredToken) -> Result<(), AuthError> {
    let body = serde_json::to_string_pretty(token)
        .map_err(|e| AuthError::TokenFile(e.to_string()))?;
    std::fs::write(path, body).map_err(|e| AuthError::TokenFile(format!("{}: {}", path.display(), e)))
}

/// Refresh token to use: the environment wins over the token file.
pub fn stored_refresh_token(settings: &AuthSettings) -> Option<String> {
    if let Some(t) = settings.refresh_token.clone() {
        return Some(t);
    }
    match load_stored_token(&settings.token_file) {
        Ok(Some(stored)) => stored.refresh_token.filter(|t| !t.is_empty()),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(%e, "ignoring unreadable token file");
            None
        }
    }
}

pub async fn resolve_access_token(
    client: &reqwest::Client,
    settings: &AuthSettings,
) -> Result<AccessToken, AuthError> {
    if let Some(refresh) = stored_refresh_token(settings) {
        if settings.app_key.is_some() {
            match refresh_access_token(client, settings, &refresh).await {
                Ok(resp) => {
                    tracing::info!("access token refreshed");
                    return Ok(AccessToken {
                        token: resp.access_token,
                        source: TokenSource::Refreshed,
                    });
                }
                Err(e) => {
                    tracing::warn!(%e, "refresh failed; falling back to ACCESS_TOKEN");
                    if settings.access_token.is_none() {
                        return Err(e);
                    }
                }
            }
        } else {
            tracing::warn!("refresh token present but APP_KEY missing; cannot refresh");
        }
    }
    manual_token(settings)
}

fn manual_token(settings: &AuthSettings) -> Result<AccessToken, AuthError> {
    settings
        .access_token
        .clone()
        .map(|token| AccessToken {
            token,
            source: TokenSource::Manual,
        })
        .ok_or(AuthError::NoCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings {
            api_url: "https://api.example.test".into(),
            authorize_url: "https://www.example.test/oauth2/authorize".into(),
            app_key: Some("key123".into()),
            token_file: PathBuf::from("/nonexistent/scorebox-token.json"),
            ..Default::default()
        }
    }

    #[test]
    fn authorization_url_contains_offline_access() {
        let mut s = settings();
        s.redirect_uri = Some("http://localhost:3000/callback".into());
        let url = authorization_url(&s, Some("verifier-abc")).unwrap();
        assert!(url.starts_with("https://www.example.test/oauth2/authorize?client_id=key123"));
        assert!(url.contains("token_access_type=offline"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fcallback"));
        assert!(url.contains("code_challenge=verifier-abc&code_challenge_method=plain"));
    }

    #[test]
    fn authorization_url_requires_app_key() {
        let mut s = settings();
        s.app_key = None;
        assert!(matches!(authorization_url(&s, None), Err(AuthError::MissingAppKey)));
    }

    #[tokio::test]
    async fn manual_token_is_used_without_refresh_token() {
        let mut s = settings();
        s.access_token = Some("manual".into());
        let tok = resolve_access_token(&reqwest::Client::new(), &s).await.unwrap();
        assert_eq!(tok.token, "manual");
        assert_eq!(tok.source, TokenSource::Manual);
    }

    #[tokio::test]
    async fn no_credentials_is_an_error() {
        let err = resolve_access_token(&reqwest::Client::new(), &settings())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NoCredentials));
    }

    #[test]
    fn token_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        assert!(load_stored_token(&path).unwrap().is_none());
        save_stored_token(
            &path,
            &StoredToken {
                refresh_token: Some("r1".into()),
                access_token: None,
                obtained_at: "2024-01-01T00:00:00Z".into(),
            },
        )
        .unwrap();
        let mut s = settings();
        s.token_file = path;
        assert_eq!(stored_refresh_token(&s).as_deref(), Some("r1"));
    }
}
