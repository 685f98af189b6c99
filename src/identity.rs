//! Who is acting: session lookup, bearer tokens and display names.
//!
//! Production deployments delegate to an external identity provider through
//! [`IdentityProvider`]. [`LocalIdentity`] is the in-process stand-in used for
//! the offline demo and for development against the dev backend.

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::info;

use crate::auth::jwt::JwtService;
use crate::models::Role;

pub const DEMO_USER_ID: &str = "local-demo";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    pub role: Role,
    pub access_token: Option<String>,
    /// Offline demo identity: never talks to the backend.
    pub offline: bool,
}

impl Session {
    pub fn demo(role: Role) -> Self {
        Self {
            user_id: DEMO_USER_ID.to_string(),
            email: None,
            role,
            access_token: None,
            offline: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    LocalDemo(Session),
    Authenticated(Session),
}

impl AuthState {
    pub fn from_session(session: Option<Session>) -> Self {
        match session {
            None => AuthState::SignedOut,
            Some(session) if session.offline => AuthState::LocalDemo(session),
            Some(session) => AuthState::Authenticated(session),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthState::SignedOut => None,
            AuthState::LocalDemo(session) | AuthState::Authenticated(session) => Some(session),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("email must not be empty")]
    MissingEmail,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn current_session(&self) -> Option<Session>;

    async fn token(&self, session: &Session) -> Option<String>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    async fn sign_in_with_link(&self, email: &str) -> Result<(), IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Observes session changes (sign-in, sign-out, token refresh).
    fn subscribe(&self) -> watch::Receiver<Option<Session>>;
}

/// Display name for activity entries: derived from the email local part,
/// falling back to the role label.
pub fn actor_name(session: Option<&Session>, role: Role) -> String {
    let from_email = session
        .and_then(|s| s.email.as_deref())
        .and_then(|email| email.split('@').next())
        .map(|local| {
            local
                .split(['.', '_', '-', '+'])
                .filter(|word| !word.is_empty())
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|name| !name.is_empty());

    from_email.unwrap_or_else(|| role.label().to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub struct LocalIdentity {
    jwt: Option<JwtService>,
    default_role: Role,
    reviewer_emails: Vec<String>,
    sender: watch::Sender<Option<Session>>,
}

impl LocalIdentity {
    /// Starts signed in as the offline demo identity.
    pub fn demo(role: Role) -> Self {
        Self::with_session(None, Some(Session::demo(role)))
    }

    /// Starts signed out; sign-ins mint bearer tokens accepted by the dev backend.
    pub fn signed_out(jwt: JwtService, default_role: Role, reviewer_emails: Vec<String>) -> Self {
        let mut identity = Self::with_session(Some(jwt), None);
        identity.default_role = default_role;
        identity.reviewer_emails = reviewer_emails;
        identity
    }

    pub fn with_session(jwt: Option<JwtService>, session: Option<Session>) -> Self {
        let default_role = session.as_ref().map(|s| s.role).unwrap_or(Role::Creator);
        let (sender, _) = watch::channel(session);
        Self {
            jwt,
            default_role,
            reviewer_emails: Vec::new(),
            sender,
        }
    }

    fn role_for(&self, email: &str) -> Role {
        if self.reviewer_emails.iter().any(|e| e.eq_ignore_ascii_case(email)) {
            Role::Reviewer
        } else {
            self.default_role
        }
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn current_session(&self) -> Option<Session> {
        self.sender.borrow().clone()
    }

    async fn token(&self, session: &Session) -> Option<String> {
        session.access_token.clone()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(IdentityError::MissingEmail);
        }
        if password.is_empty() {
            return Err(IdentityError::InvalidCredentials);
        }
        let jwt = self
            .jwt
            .as_ref()
            .ok_or_else(|| IdentityError::Unavailable("offline identity cannot sign in".into()))?;

        let role = self.role_for(&email);
        let user_id = format!("user:{email}");
        let token = jwt
            .generate_token(&user_id, Some(&email), role)
            .map_err(|err| IdentityError::Unavailable(err.to_string()))?;

        let session = Session {
            user_id,
            email: Some(email),
            role,
            access_token: Some(token),
            offline: false,
        };
        info!(user_id = %session.user_id, role = ?role, "signed in");
        self.sender.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_link(&self, email: &str) -> Result<(), IdentityError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(IdentityError::MissingEmail);
        }
        info!(%email, "one-time sign-in link requested");
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sender.send_replace(None);
        info!("signed out");
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_name_comes_from_email() {
        let session = Session {
            user_id: "u".into(),
            email: Some("jane.doe-smith@example.com".into()),
            role: Role::Creator,
            access_token: None,
            offline: false,
        };
        assert_eq!(actor_name(Some(&session), Role::Creator), "Jane Doe Smith");
        assert_eq!(actor_name(None, Role::Reviewer), "Reviewer");
        assert_eq!(actor_name(Some(&Session::demo(Role::Creator)), Role::Creator), "Creator");
    }

    #[test]
    fn auth_state_distinguishes_demo() {
        assert_eq!(AuthState::from_session(None), AuthState::SignedOut);
        assert!(matches!(
            AuthState::from_session(Some(Session::demo(Role::Reviewer))),
            AuthState::LocalDemo(_)
        ));
    }

    #[tokio::test]
    async fn password_sign_in_mints_verifiable_token() {
        let jwt = JwtService::new("secret", "reviewdesk", "reviewdesk-clients", 5);
        let identity = LocalIdentity::signed_out(jwt.clone(), Role::Creator, vec!["lead@example.com".into()]);
        let mut changes = identity.subscribe();

        let session = identity
            .sign_in_with_password("Lead@Example.com", "pw")
            .await
            .unwrap();
        assert_eq!(session.role, Role::Reviewer);
        assert!(changes.has_changed().unwrap());
        changes.borrow_and_update();

        let token = identity.token(&session).await.unwrap();
        assert_eq!(jwt.verify_token(&token).unwrap().sub, "user:lead@example.com");

        identity.sign_out().await.unwrap();
        assert!(identity.current_session().await.is_none());
        assert!(changes.has_changed().unwrap());
    }

    #[tokio::test]
    async fn demo_identity_cannot_sign_in() {
        let identity = LocalIdentity::demo(Role::Reviewer);
        assert!(identity.current_session().await.unwrap().offline);
        assert!(matches!(
            identity.sign_in_with_password("a@b.c", "pw").await,
            Err(IdentityError::Unavailable(_))
        ));
        assert!(matches!(
            identity.sign_in_with_password(" ", "pw").await,
            Err(IdentityError::MissingEmail)
        ));
    }
}
