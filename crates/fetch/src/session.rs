//! Session upkeep for the authenticated source.
//!
//! A session is represented by a marker file under the session storage
//! directory. `ensure_session` is cheap when the file is fresh; when it
//! is absent or stale a credential login runs and the marker is
//! rewritten. A failed login surfaces as [`FetchError::Auth`] without
//! corrupting the calling stage.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use jobrail_core::{SessionConfig, SourceConfig};

use crate::error::FetchError;

/// Ensures a live session exists before a batch of fetches.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn ensure_session(&self) -> Result<(), FetchError>;
}

/// No-op authenticator for tests and unauthenticated sources.
pub struct NullAuthenticator;

#[async_trait]
impl Authenticator for NullAuthenticator {
    async fn ensure_session(&self) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Credential login against the source's login endpoint, with a
/// session marker file to skip re-login while the session is fresh.
pub struct SessionLogin {
    client: reqwest::Client,
    login_url: String,
    credentials: SourceConfig,
    session_file: PathBuf,
    max_age: Duration,
}

impl SessionLogin {
    pub fn new(
        client: reqwest::Client,
        login_url: impl Into<String>,
        credentials: SourceConfig,
        session: &SessionConfig,
        session_name: &str,
    ) -> Self {
        Self {
            client,
            login_url: login_url.into(),
            credentials,
            session_file: session.storage_dir.join(format!("{session_name}.json")),
            max_age: Duration::from_secs(session.max_age_hours * 3600),
        }
    }

    fn session_is_fresh(&self) -> bool {
        let Ok(metadata) = std::fs::metadata(&self.session_file) else {
            return false;
        };
        metadata
            .modified()
            .ok()
            .and_then(|modified| modified.elapsed().ok())
            .map(|age| age < self.max_age)
            .unwrap_or(false)
    }

    async fn login(&self) -> Result<(), FetchError> {
        let (Some(username), Some(password)) =
            (&self.credentials.username, &self.credentials.password)
        else {
            return Err(FetchError::Auth("source credentials not configured".into()));
        };

        info!(url = %self.login_url, "session absent or stale, logging in");
        let response = self
            .client
            .post(&self.login_url)
            .form(&[("username", username.as_str()), ("password", password.as_str())])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(FetchError::Auth(format!(
                "login rejected with HTTP {}",
                response.status()
            )));
        }

        if let Some(parent) = self.session_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let marker = serde_json::json!({ "logged_in_at": Utc::now().to_rfc3339() });
        tokio::fs::write(&self.session_file, marker.to_string()).await?;
        Ok(())
    }
}

#[async_trait]
impl Authenticator for SessionLogin {
    async fn ensure_session(&self) -> Result<(), FetchError> {
        if self.session_is_fresh() {
            debug!(file = %self.session_file.display(), "session marker fresh, skipping login");
            return Ok(());
        }
        self.login().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_config(dir: &std::path::Path, max_age_hours: u64) -> SessionConfig {
        SessionConfig {
            storage_dir: dir.to_path_buf(),
            max_age_hours,
        }
    }

    fn credentials() -> SourceConfig {
        SourceConfig {
            username: Some("user".into()),
            password: Some("pass".into()),
        }
    }

    #[tokio::test]
    async fn fresh_session_skips_login() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("worker.json"), "{}").unwrap();

        // The login endpoint is unroutable; reaching it would error.
        let auth = SessionLogin::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/login",
            credentials(),
            &session_config(dir.path(), 12),
            "worker",
        );
        auth.ensure_session().await.unwrap();
    }

    #[tokio::test]
    async fn missing_session_attempts_login() {
        let dir = tempfile::tempdir().unwrap();
        let auth = SessionLogin::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/login",
            credentials(),
            &session_config(dir.path(), 12),
            "worker",
        );
        // Connection refused surfaces as a transport error, proving the
        // login path ran.
        let err = auth.ensure_session().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn stale_session_attempts_login() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("worker.json"), "{}").unwrap();

        let auth = SessionLogin::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/login",
            credentials(),
            &session_config(dir.path(), 0),
            "worker",
        );
        let err = auth.ensure_session().await.unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[tokio::test]
    async fn missing_credentials_fail_as_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let auth = SessionLogin::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1/login",
            SourceConfig {
                username: None,
                password: None,
            },
            &session_config(dir.path(), 12),
            "worker",
        );
        let err = auth.ensure_session().await.unwrap_err();
        assert!(matches!(err, FetchError::Auth(_)));
    }
}
