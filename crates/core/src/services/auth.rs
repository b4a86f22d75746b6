//! Login through an external identity provider and cookie sessions.

use std::time::Duration;

use chrono::Utc;
use enrollo_common::{AppError, AppResult, IdGenerator, config::OAuthConfig};
use enrollo_db::{
    entities::{oauth_account, session, user},
    repositories::{OAuthAccountRepository, SessionRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;

use super::upstream::{status_error, transport_error};

/// Provider name stored with linked Google accounts.
pub const GOOGLE_PROVIDER: &str = "google";

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExternalIdentity {
    /// Stable account id at the provider.
    #[serde(rename = "sub")]
    pub provider_account_id: String,
    pub email: Option<String>,
    #[serde(rename = "name")]
    pub display_name: Option<String>,
    #[serde(rename = "picture")]
    pub avatar_url: Option<String>,
}

/// OAuth identity provider collaborator.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name, e.g. `google`.
    fn name(&self) -> &'static str;

    /// Consent page URL carrying the given anti-forgery state.
    fn authorization_url(&self, state: &str) -> AppResult<String>;

    /// Exchange an authorization code for the user's identity.
    async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google OAuth 2.0 / OpenID Connect client.
#[derive(Clone)]
pub struct GoogleIdentityProvider {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleIdentityProvider {
    /// Create a new Google client.
    pub fn new(config: &OAuthConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            redirect_uri: config.google_redirect_uri.clone(),
        })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn name(&self) -> &'static str {
        GOOGLE_PROVIDER
    }

    fn authorization_url(&self, state: &str) -> AppResult<String> {
        let url = url::Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("access_type", "offline"),
                ("state", state),
            ],
        )
        .map_err(|e| AppError::Internal(format!("Invalid authorization URL: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> AppResult<ExternalIdentity> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| transport_error("Google", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Google", status, &body));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid Google token response: {e}")))?;

        let response = self
            .http_client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| transport_error("Google", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("Google", status, &body));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Invalid Google userinfo response: {e}")))
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    provider: std::sync::Arc<dyn IdentityProvider>,
    user_repo: UserRepository,
    oauth_account_repo: OAuthAccountRepository,
    session_repo: SessionRepository,
    session_ttl_secs: i64,
    id_gen: IdGenerator,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(
        provider: std::sync::Arc<dyn IdentityProvider>,
        user_repo: UserRepository,
        oauth_account_repo: OAuthAccountRepository,
        session_repo: SessionRepository,
        session_ttl_secs: i64,
    ) -> Self {
        Self {
            provider,
            user_repo,
            oauth_account_repo,
            session_repo,
            session_ttl_secs,
            id_gen: IdGenerator::new(),
        }
    }

    /// Session lifetime in seconds.
    #[must_use]
    pub const fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_secs
    }

    /// Fresh anti-forgery state for the consent redirect.
    #[must_use]
    pub fn new_state(&self) -> String {
        self.id_gen.generate_token()
    }

    /// Consent page URL.
    pub fn authorization_url(&self, state: &str) -> AppResult<String> {
        self.provider.authorization_url(state)
    }

    /// Complete a login and open a session. Returns the session.
    pub async fn login(&self, code: &str) -> AppResult<session::Model> {
        let identity = self.provider.exchange_code(code).await?;
        let user = self.find_or_create_user(identity).await?;
        let session = self.create_session(&user.id).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(session)
    }

    async fn find_or_create_user(&self, identity: ExternalIdentity) -> AppResult<user::Model> {
        let provider = self.provider.name();
        if identity.provider_account_id.is_empty() {
            return Err(AppError::BadRequest("Provider account id is required".to_string()));
        }
        let (Some(email), Some(display_name)) = (
            identity.email.filter(|e| !e.is_empty()),
            identity.display_name.filter(|n| !n.is_empty()),
        ) else {
            return Err(AppError::BadRequest("Email and name are required".to_string()));
        };

        if let Some(link) = self
            .oauth_account_repo
            .find_by_provider_account(provider, &identity.provider_account_id)
            .await?
        {
            let user = self.user_repo.get_by_id(&link.user_id).await?;
            return self
                .refresh_profile(user, email, display_name, identity.avatar_url)
                .await;
        }

        let user = match self.user_repo.find_by_email(&email).await? {
            Some(existing) => {
                self.refresh_profile(existing, email, display_name, identity.avatar_url)
                    .await?
            }
            None => {
                let now = Utc::now();
                let created = self
                    .user_repo
                    .create(user::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        email: Set(email.clone()),
                        display_name: Set(display_name),
                        profile_image_url: Set(identity.avatar_url),
                        balance: Set(0),
                        role: Set(user::UserRole::Member),
                        created_at: Set(now.into()),
                        updated_at: Set(now.into()),
                        deleted_at: Set(None),
                    })
                    .await;
                match created {
                    Ok(created) => {
                        tracing::info!(user_id = %created.id, "User created");
                        created
                    }
                    // A concurrent first login created the account
                    Err(AppError::Conflict(msg)) => self
                        .user_repo
                        .find_by_email(&email)
                        .await?
                        .ok_or(AppError::Conflict(msg))?,
                    Err(e) => return Err(e),
                }
            }
        };

        let now = Utc::now();
        let linked = self
            .oauth_account_repo
            .create(oauth_account::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user.id.clone()),
                provider: Set(provider.to_string()),
                provider_account_id: Set(identity.provider_account_id.clone()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            })
            .await;
        match linked {
            Ok(_) => Ok(user),
            Err(AppError::Conflict(msg)) => {
                let link = self
                    .oauth_account_repo
                    .find_by_provider_account(provider, &identity.provider_account_id)
                    .await?
                    .ok_or(AppError::Conflict(msg))?;
                if link.user_id == user.id {
                    Ok(user)
                } else {
                    self.user_repo.get_by_id(&link.user_id).await
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_profile(
        &self,
        user: user::Model,
        email: String,
        display_name: String,
        avatar_url: Option<String>,
    ) -> AppResult<user::Model> {
        if user.email == email
            && user.display_name == display_name
            && user.profile_image_url == avatar_url
        {
            return Ok(user);
        }

        let mut active: user::ActiveModel = user.into();
        active.email = Set(email);
        active.display_name = Set(display_name);
        active.profile_image_url = Set(avatar_url);
        active.updated_at = Set(Utc::now().into());
        self.user_repo.update(active).await
    }

    async fn create_session(&self, user_id: &str) -> AppResult<session::Model> {
        let now = Utc::now();
        self.session_repo
            .create(session::ActiveModel {
                id: Set(self.id_gen.generate_token()),
                user_id: Set(user_id.to_string()),
                created_at: Set(now.into()),
                expired_at: Set((now + chrono::Duration::seconds(self.session_ttl_secs)).into()),
            })
            .await
    }

    /// The user behind a live session.
    pub async fn resolve_session(&self, session_id: &str) -> AppResult<Option<user::Model>> {
        let Some(session) = self.session_repo.find_active(session_id, Utc::now()).await? else {
            return Ok(None);
        };
        self.user_repo.find_by_id(&session.user_id).await
    }

    /// End a session.
    pub async fn logout(&self, session_id: &str) -> AppResult<()> {
        self.session_repo.delete(session_id).await
    }

    /// Remove expired sessions.
    pub async fn purge_expired_sessions(&self) -> AppResult<u64> {
        self.session_repo.delete_expired(Utc::now()).await
    }
}
