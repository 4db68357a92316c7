//! OAuth 2.0 credentials for the Google Calendar API.
//!
//! This module provides the [`Authenticator`], which owns the client secret and
//! the cached token of the bot's Google account.
//!
//! # Files
//!
//! - `credentials.json` - OAuth client secret downloaded from the Google Cloud console
//!   (`installed` or `web` application). Read-only.
//! - `token.json` - Cached token, written after the first authorization and after each
//!   refresh. The format is the one of Go's `oauth2.Token`, so an existing cache can be
//!   reused as is.
//!
//! When no usable token is cached, an interactive authorization is performed: the
//! authorization url is printed and the code pasted by the operator is exchanged for a
//! token.

use std::{
    path::{Path, PathBuf},
    time::Duration as StdDuration,
};

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use mockall::automock;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::{
    fs,
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt},
    sync::Mutex,
};

/// Read-only access to calendars, nothing else.
pub const CALENDAR_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

/// A token expiring within this many seconds is refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Errors raised while acquiring or refreshing a token.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid client secret file: {0}")]
    InvalidCredentials(String),
    #[error("cannot read authorization code: {0}")]
    Input(std::io::Error),
    #[error("no authorization code entered")]
    MissingCode,
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("access token expired and no refresh token is available")]
    Expired,
    #[error("cannot serialize token: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of bearer tokens for the Calendar API.
#[automock]
pub trait TokenProvider {
    /// Returns a valid access token, refreshing it first if needed.
    async fn access_token(&self) -> Result<String, AuthError>;
}

/// OAuth client of a Google Cloud project.
#[derive(Deserialize, Debug, Clone)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

/// Layout of `credentials.json`, only one of the sections is present.
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    fn from_json(json: &str) -> Result<Self, AuthError> {
        let file: ClientSecretFile = serde_json::from_str(json)
            .map_err(|e| AuthError::InvalidCredentials(e.to_string()))?;

        let secret = file.installed.or(file.web).ok_or_else(|| {
            AuthError::InvalidCredentials("missing installed or web section".to_owned())
        })?;

        if secret.redirect_uris.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "missing redirect url".to_owned(),
            ));
        }

        Ok(secret)
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uris.first().map(String::as_str).unwrap_or_default()
    }
}

/// Cached OAuth token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
struct Token {
    access_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Returns `true` if the token must be refreshed before being used at `now`.
    fn expires_soon(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            // Go writes the zero time for tokens without expiry
            Some(expiry) if expiry.timestamp() > 0 => {
                expiry - Duration::seconds(EXPIRY_MARGIN_SECS) <= now
            }
            _ => false,
        }
    }
}

/// Successful answer of the token endpoint.
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    /// Builds the token to cache. Google usually omits the refresh token when
    /// refreshing, the previous one is kept in that case.
    fn into_token(self, previous_refresh_token: Option<String>) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_owned()),
            refresh_token: self.refresh_token.or(previous_refresh_token),
            expiry: self
                .expires_in
                .filter(|secs| *secs > 0)
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }
}

/// Owner of the Calendar API credentials.
///
/// The token lives behind a mutex so that concurrent callers trigger at most one
/// refresh.
pub struct Authenticator {
    /// OAuth client
    secret: ClientSecret,
    /// Where the token is cached
    token_path: PathBuf,
    /// Current token
    token: Mutex<Token>,
    /// Timeout of a token endpoint request
    request_timeout: StdDuration,
    /// HTTP client for the token endpoint
    client: Client,
}

impl Authenticator {
    /// Loads the credentials and the cached token, authorizing interactively when
    /// no token is cached.
    ///
    /// # Arguments
    ///
    /// * `credentials_path` - Path of the client secret file.
    /// * `token_path` - Path of the token cache, created if missing.
    /// * `request_timeout` - Timeout of a token endpoint request.
    /// * `input` - Where the authorization code is read from, usually stdin.
    ///
    /// # Errors
    ///
    /// Fails if the client secret file is unreadable or invalid, if no code is
    /// entered, if the code exchange fails or if the token cannot be cached. All of
    /// these are fatal at start-up.
    pub async fn bootstrap<R>(
        credentials_path: impl AsRef<Path>,
        token_path: impl AsRef<Path>,
        request_timeout: StdDuration,
        input: R,
    ) -> Result<Self, AuthError>
    where
        R: AsyncBufRead + Unpin,
    {
        let credentials_path = credentials_path.as_ref();
        debug!("read client secret at {}", credentials_path.display());

        let json = fs::read_to_string(credentials_path)
            .await
            .map_err(|source| AuthError::Read {
                path: credentials_path.display().to_string(),
                source,
            })?;
        let secret = ClientSecret::from_json(&json)?;
        let token_path = token_path.as_ref().to_path_buf();

        match Self::load_token(&token_path).await {
            Some(token) => {
                info!("use cached token {}", token_path.display());
                Ok(Authenticator::new(secret, token_path, request_timeout, token))
            }
            None => {
                let mut authenticator =
                    Authenticator::new(secret, token_path, request_timeout, Token::default());
                let token = authenticator.authorize(input).await?;
                authenticator.persist_token(&token).await?;
                authenticator.token = Mutex::new(token);
                Ok(authenticator)
            }
        }
    }

    fn new(
        secret: ClientSecret,
        token_path: PathBuf,
        request_timeout: StdDuration,
        token: Token,
    ) -> Self {
        Authenticator {
            secret,
            token_path,
            token: Mutex::new(token),
            request_timeout,
            client: Client::new(),
        }
    }

    /// Reads the cached token. A missing or corrupted cache is treated as absent.
    async fn load_token(token_path: &Path) -> Option<Token> {
        let json = match fs::read_to_string(token_path).await {
            Ok(json) => json,
            Err(err) => {
                debug!("no cached token at {}: {}", token_path.display(), err);
                return None;
            }
        };

        match serde_json::from_str(&json) {
            Ok(token) => Some(token),
            Err(err) => {
                warn!("ignore invalid token cache {}: {}", token_path.display(), err);
                None
            }
        }
    }

    /// Url the operator must open to grant read-only access to the calendars.
    fn authorization_url(&self) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.secret.auth_uri,
            &[
                ("access_type", "offline"),
                ("client_id", self.secret.client_id.as_str()),
                ("redirect_uri", self.secret.redirect_uri()),
                ("response_type", "code"),
                ("scope", CALENDAR_READONLY_SCOPE),
                ("state", "state-token"),
            ],
        )
        .map_err(|e| AuthError::InvalidCredentials(format!("invalid auth_uri: {}", e)))
    }

    /// Prints the authorization url, reads the code and exchanges it for a token.
    async fn authorize<R>(&self, mut input: R) -> Result<Token, AuthError>
    where
        R: AsyncBufRead + Unpin,
    {
        println!(
            "Go to the following link in your browser then type the authorization code:\n{}",
            self.authorization_url()?
        );

        let mut code = String::new();
        input.read_line(&mut code).await.map_err(AuthError::Input)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("redirect_uri", self.secret.redirect_uri()),
            ])
            .await?
            .into_token(None);

        info!("calendar access authorized");
        Ok(token)
    }

    /// Trades the refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<Token, AuthError> {
        debug!("refresh access token");

        let token = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
            ])
            .await?
            .into_token(Some(refresh_token.to_owned()));

        info!("access token refreshed");
        Ok(token)
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(&self.secret.token_uri)
            .form(form)
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Writes the token cache, readable by the owner only.
    async fn persist_token(&self, token: &Token) -> Result<(), AuthError> {
        let json = serde_json::to_string(token)?;
        let write_error = |source: std::io::Error| AuthError::Write {
            path: self.token_path.display().to_string(),
            source,
        };

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Only applies when the file is created
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.token_path).await.map_err(write_error)?;

        // A cache created by an older version may be more permissive
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(write_error)?;
        }

        file.write_all(json.as_bytes()).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;

        debug!("token cached at {}", self.token_path.display());
        Ok(())
    }
}

impl TokenProvider for Authenticator {
    async fn access_token(&self) -> Result<String, AuthError> {
        let mut token = self.token.lock().await;

        if token.expires_soon(Utc::now()) {
            let refresh_token = token.refresh_token.clone().ok_or(AuthError::Expired)?;
            let refreshed = self.refresh(&refresh_token).await?;

            // The refreshed token is still usable if the cache cannot be written
            if let Err(err) = self.persist_token(&refreshed).await {
                warn!("failed to cache refreshed token: {}", err);
            }
            *token = refreshed;
        }

        Ok(token.access_token.clone())
    }
}

impl Default for Token {
    fn default() -> Self {
        Token {
            access_token: String::new(),
            token_type: "Bearer".to_owned(),
            refresh_token: None,
            expiry: None,
        }
    }
}
