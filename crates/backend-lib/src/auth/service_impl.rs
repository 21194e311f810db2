use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use pinboard_common::{LoginRequest, Principal, PrincipalId, SignupRequest};
use tokio::{
    task::JoinHandle,
    time::{timeout_at, Instant},
};
use tracing::{error, info, warn};

use super::{
    csrf::MAX_CSRF_TOKEN_LEN,
    password::{verify_password_blocking, Kdf},
    token_generator::generate_secure_token,
    AuthOutcome, AuthService, CookieMinter, Session, SessionCookie, SessionError, SessionManager,
};
use crate::config::Settings;
use crate::error::AppError;
use crate::metrics::{AUTH_LOGIN_FAILED, AUTH_REGISTER_ROLLED_BACK};
use crate::notifications::ChangeToken;
use crate::storage::{NewUser, UserRecord, UserStore};
use crate::validation::{validate_login, validate_signup};

/// Mint attempts before giving up on a colliding session token
const MAX_MINT_ATTEMPTS: usize = 3;

pub struct DefaultAuth {
    users: Arc<dyn UserStore>,
    sessions: SessionManager,
    minter: CookieMinter,
    kdf: Kdf,
    notifier: Arc<dyn ChangeToken>,
    register_deadline: Duration,
    login_deadline: Duration,
}

impl DefaultAuth {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: SessionManager,
        notifier: Arc<dyn ChangeToken>,
        settings: &Settings,
    ) -> Self {
        Self {
            users,
            sessions,
            minter: CookieMinter::from_settings(settings),
            kdf: Kdf::new(&settings.kdf),
            notifier,
            register_deadline: settings.register_deadline(),
            login_deadline: settings.login_deadline(),
        }
    }

    /// Mint a cookie and store its session, retrying on token collisions
    fn open_session(
        &self,
        principal: &Principal,
        csrf_token: &str,
    ) -> Result<SessionCookie, AppError> {
        for attempt in 1..=MAX_MINT_ATTEMPTS {
            let cookie = self.minter.mint()?;
            let session = Session {
                token: cookie.value.clone(),
                principal: principal.clone(),
                created_at: Utc::now(),
                expires_at: cookie.expires,
                csrf_token: csrf_token.to_string(),
            };
            match self.sessions.put(session) {
                Ok(()) => return Ok(cookie),
                Err(SessionError::Collision) => {
                    warn!(attempt, principal_id = principal.id, "session token collision");
                },
                Err(e) => return Err(AppError::Internal(e.to_string())),
            }
        }
        Err(AppError::Internal("could not allocate a session token".to_string()))
    }

    /// Session CSRF token: the one the client already holds if it is usable,
    /// otherwise a fresh one
    fn session_csrf_token(header: Option<&str>) -> Result<String, AppError> {
        match header {
            Some(token) if !token.is_empty() && token.len() <= MAX_CSRF_TOKEN_LEN => {
                Ok(token.to_string())
            },
            _ => generate_secure_token(),
        }
    }

    async fn rebind(
        &self,
        principal_id: PrincipalId,
        token: Option<&str>,
        deadline: Instant,
    ) -> Result<(), AppError> {
        let result = match timeout_at(deadline, self.notifier.change_token(principal_id, token)).await
        {
            Ok(result) => result,
            Err(elapsed) => Err(elapsed.into()),
        };
        if let Err(e) = &result {
            warn!(principal_id, error = %e, "notification token rebind failed; session kept");
        }
        result
    }

    /// The create outlived the register deadline; delete the user once it lands
    fn roll_back_late_create(&self, create: JoinHandle<Result<UserRecord, AppError>>) {
        let users = Arc::clone(&self.users);
        tokio::spawn(async move {
            let Ok(Ok(record)) = create.await else {
                return;
            };
            counter!(AUTH_REGISTER_ROLLED_BACK).increment(1);
            match users.delete(record.id).await {
                Ok(()) => warn!(principal_id = record.id, "rolled back user created after deadline"),
                Err(e) => error!(principal_id = record.id, error = %e, "failed to roll back late user"),
            }
        });
    }

    async fn roll_back_user(&self, principal_id: PrincipalId) {
        counter!(AUTH_REGISTER_ROLLED_BACK).increment(1);
        if let Err(e) = self.users.delete(principal_id).await {
            error!(principal_id, error = %e, "failed to roll back user after session failure");
        }
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn register(
        &self,
        req: SignupRequest,
        csrf_token: Option<String>,
    ) -> Result<AuthOutcome, AppError> {
        let deadline = Instant::now() + self.register_deadline;

        if let Err(e) = validate_signup(&req) {
            info!(error = %e, "signup rejected");
            return Err(e.into());
        }

        let password_hash =
            timeout_at(deadline, self.kdf.hash_password_blocking(&req.password)).await??;
        let new_user = NewUser {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password_hash,
        };

        // own task, so a create finishing after the deadline can still be undone
        let users = Arc::clone(&self.users);
        let mut create = tokio::spawn(async move { users.create(new_user).await });
        let record = match timeout_at(deadline, &mut create).await {
            Ok(joined) => joined??,
            Err(elapsed) => {
                self.roll_back_late_create(create);
                return Err(elapsed.into());
            },
        };
        let principal = record.principal();

        let session_csrf = match Self::session_csrf_token(csrf_token.as_deref()) {
            Ok(token) => token,
            Err(e) => {
                self.roll_back_user(principal.id).await;
                return Err(e);
            },
        };
        let cookie = match self.open_session(&principal, &session_csrf) {
            Ok(cookie) => cookie,
            Err(e) => {
                self.roll_back_user(principal.id).await;
                return Err(e);
            },
        };

        let rebind = self
            .rebind(principal.id, csrf_token.as_deref(), deadline)
            .await;
        info!(principal_id = principal.id, "user registered");

        Ok(AuthOutcome {
            principal,
            cookie,
            csrf_token: session_csrf,
            rebind,
        })
    }

    async fn login(
        &self,
        req: LoginRequest,
        csrf_token: Option<String>,
    ) -> Result<AuthOutcome, AppError> {
        let deadline = Instant::now() + self.login_deadline;

        if let Err(e) = validate_login(&req) {
            info!(error = %e, "login rejected");
            return Err(e.into());
        }

        let principal = timeout_at(
            deadline,
            self.check_credentials(&req.username, &req.password),
        )
        .await??;

        let session_csrf = Self::session_csrf_token(csrf_token.as_deref())?;
        let cookie = self.open_session(&principal, &session_csrf)?;

        // a profile delete may have landed while the password was checked
        if let Err(e) = self.users.get(principal.id).await {
            self.sessions.delete(&cookie.value);
            info!(principal_id = principal.id, "user deleted during login");
            return Err(e);
        }

        let rebind = self
            .rebind(principal.id, csrf_token.as_deref(), deadline)
            .await;
        info!(principal_id = principal.id, "user logged in");

        Ok(AuthOutcome {
            principal,
            cookie,
            csrf_token: session_csrf,
            rebind,
        })
    }

    fn logout(&self, token: &str) -> SessionCookie {
        if self.sessions.delete(token) {
            info!("session revoked");
        }
        self.minter.expired()
    }

    fn resolve(&self, token: &str) -> Result<Session, AppError> {
        self.sessions
            .get(token)
            .map_err(|_| AppError::Unauthenticated)
    }

    async fn check_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Principal, AppError> {
        let record = match self.users.get_by_username(username).await {
            Ok(record) => record,
            Err(AppError::NotFound(_)) => {
                counter!(AUTH_LOGIN_FAILED).increment(1);
                info!("login for unknown user");
                return Err(AppError::NotFound("no such user".to_string()));
            },
            Err(e) => return Err(e),
        };

        if verify_password_blocking(record.password_hash.clone(), password).await? {
            Ok(record.principal())
        } else {
            counter!(AUTH_LOGIN_FAILED).increment(1);
            info!(principal_id = record.id, "wrong password");
            Err(AppError::Unauthenticated)
        }
    }

    async fn revoke_principal(&self, principal_id: PrincipalId) -> Result<SessionCookie, AppError> {
        self.users.delete(principal_id).await?;
        let revoked = self.sessions.delete_for_principal(principal_id);
        if let Err(e) = self.notifier.change_token(principal_id, None).await {
            warn!(principal_id, error = %e, "failed to clear notification token");
        }
        info!(principal_id, revoked, "user deleted");
        Ok(self.minter.expired())
    }

    fn cookie_name(&self) -> &str {
        self.minter.cookie_name()
    }
}
