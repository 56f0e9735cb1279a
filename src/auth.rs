// 🔐 Auth - sessions, the local provider and the gate in front of the dashboard
//
// The gate never decides who is signed in by itself: it holds whatever
// session the provider last announced, replacing it on every event.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::db;
use crate::error::{Error, Result};

/// Notice shown after a successful sign-up
pub const SIGN_UP_NOTICE: &str = "Account created! Now sign in.";

const SESSION_KEY: &str = "expense_dashboard.auth.session";
const MIN_PASSWORD_LEN: usize = 6;

// ============================================================================
// SESSION + EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl AuthEvent {
    /// The session this event leaves in place
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }
}

/// Identity service consulted by the gate
///
/// Error messages are user-facing and must be passed through untouched.
pub trait AuthProvider: Send {
    fn current_session(&mut self) -> Result<Option<Session>>;

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session>;

    /// Creates the account without signing in
    fn sign_up(&mut self, email: &str, password: &str) -> Result<()>;

    fn sign_out(&mut self) -> Result<()>;

    fn refresh(&mut self) -> Result<Session>;

    /// Stream of session changes for as long as the receiver lives
    fn subscribe(&mut self) -> Receiver<AuthEvent>;
}

// ============================================================================
// LOCAL PROVIDER
// ============================================================================

/// Email/password accounts in the same SQLite file as the remote table
pub struct LocalAuthProvider {
    conn: Connection,
    listeners: Vec<Sender<AuthEvent>>,
}

impl LocalAuthProvider {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_connection(db::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            listeners: Vec::new(),
        }
    }

    fn emit(&mut self, event: AuthEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn issue_session(&self, user_id: &str, email: &str) -> Result<Session> {
        let session = Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            email: email.to_string(),
            issued_at: Utc::now(),
        };

        self.conn.execute(
            "INSERT INTO sessions (token, user_id, issued_at) VALUES (?1, ?2, ?3)",
            params![session.access_token, session.user_id, session.issued_at.to_rfc3339()],
        )?;
        db::kv_set(&self.conn, SESSION_KEY, &serde_json::to_string(&session)?)?;

        Ok(session)
    }

    fn revoke(&self, token: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
    }
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthProvider for LocalAuthProvider {
    fn current_session(&mut self) -> Result<Option<Session>> {
        let raw = match db::kv_get(&self.conn, SESSION_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let session: Session = match serde_json::from_str(&raw) {
            Ok(session) => session,
            Err(_) => {
                db::kv_delete(&self.conn, SESSION_KEY)?;
                return Ok(None);
            }
        };

        let live: Option<String> = self
            .conn
            .query_row(
                "SELECT token FROM sessions WHERE token = ?1",
                params![session.access_token],
                |row| row.get(0),
            )
            .optional()?;

        if live.is_some() {
            Ok(Some(session))
        } else {
            db::kv_delete(&self.conn, SESSION_KEY)?;
            Ok(None)
        }
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);

        let user: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, salt, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let user_id = match user {
            Some((id, salt, hash)) if password_digest(&salt, password) == hash => id,
            _ => return Err(Error::Auth("Invalid login credentials".to_string())),
        };

        let session = self.issue_session(&user_id, &email)?;
        tracing::info!(user_id = %session.user_id, "signed in");
        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    fn sign_up(&mut self, email: &str, password: &str) -> Result<()> {
        let email = normalize_email(email);

        if !email.contains('@') {
            return Err(Error::Auth(
                "Unable to validate email address: invalid format".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::Auth(format!(
                "Password should be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }

        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        if exists > 0 {
            return Err(Error::Auth("User already registered".to_string()));
        }

        let salt = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO users (id, email, salt, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                uuid::Uuid::new_v4().to_string(),
                email,
                salt,
                password_digest(&salt, password),
                Utc::now().to_rfc3339(),
            ],
        )?;

        tracing::info!("account created");
        Ok(())
    }

    fn sign_out(&mut self) -> Result<()> {
        if let Some(session) = self.current_session()? {
            self.revoke(&session.access_token)?;
        }
        db::kv_delete(&self.conn, SESSION_KEY)?;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn refresh(&mut self) -> Result<Session> {
        let current = self
            .current_session()?
            .ok_or_else(|| Error::Auth("Auth session missing!".to_string()))?;

        self.revoke(&current.access_token)?;
        let session = self.issue_session(&current.user_id, &current.email)?;
        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    fn subscribe(&mut self) -> Receiver<AuthEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }
}

// ============================================================================
// CREDENTIALS FORM
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn title(&self) -> &'static str {
        match self {
            AuthMode::SignIn => "Sign in",
            AuthMode::SignUp => "Create account",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
    pub mode: AuthMode,
}

impl CredentialsForm {
    pub fn can_submit(&self) -> bool {
        self.email.trim().chars().count() > 3 && self.password.chars().count() >= MIN_PASSWORD_LEN
    }

    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
    }
}

// ============================================================================
// GATE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Initial session lookup not finished yet
    Loading,
    Unauthenticated,
    Authenticated(Session),
}

pub struct AuthGate {
    provider: Box<dyn AuthProvider>,
    events: Receiver<AuthEvent>,
    session: Option<Session>,
    loading: bool,
}

impl AuthGate {
    /// Subscribes immediately so no event between now and `start` is lost
    pub fn new(mut provider: Box<dyn AuthProvider>) -> Self {
        let events = provider.subscribe();
        Self {
            provider,
            events,
            session: None,
            loading: true,
        }
    }

    /// Initial session lookup; a failed lookup counts as signed out
    pub fn start(&mut self) -> AuthState {
        match self.provider.current_session() {
            Ok(session) => self.session = session,
            Err(err) => {
                tracing::warn!(error = %err, "initial session lookup failed");
                self.session = None;
            }
        }
        self.loading = false;
        self.poll();
        self.state()
    }

    /// Apply every pending session-change notification; true if any arrived
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events.try_recv() {
            tracing::debug!(?event, "auth event");
            self.session = event.session().cloned();
            changed = true;
        }
        changed
    }

    pub fn state(&self) -> AuthState {
        if self.loading {
            return AuthState::Loading;
        }
        match &self.session {
            Some(session) => AuthState::Authenticated(session.clone()),
            None => AuthState::Unauthenticated,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        if self.loading {
            None
        } else {
            self.session.as_ref()
        }
    }

    /// Submit the form in its current mode
    ///
    /// Returns a notice to display (sign-up success) or the provider's
    /// error. Sign-up switches the form back to sign-in.
    pub fn submit(&mut self, form: &mut CredentialsForm) -> Result<Option<String>> {
        match form.mode {
            AuthMode::SignIn => {
                self.provider.sign_in(&form.email, &form.password)?;
                self.poll();
                form.password.clear();
                Ok(None)
            }
            AuthMode::SignUp => {
                self.provider.sign_up(&form.email, &form.password)?;
                form.mode = AuthMode::SignIn;
                Ok(Some(SIGN_UP_NOTICE.to_string()))
            }
        }
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.provider.sign_out()?;
        self.poll();
        Ok(())
    }

    pub fn refresh(&mut self) -> Result<()> {
        self.provider.refresh()?;
        self.poll();
        Ok(())
    }
}
