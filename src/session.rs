use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::{ApiError, StoreError};
use crate::models::User;

// --- Token persistence ---

pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, StoreError>;
    fn save(&self, token: &str) -> Result<(), StoreError>;
    /// Remove the token. Returns whether one was present.
    fn clear(&self) -> Result<bool, StoreError>;
}

/// One token per file, at a fixed path under the data directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        std::fs::write(&self.path, token).map_err(|e| self.io_error(e))
    }

    fn clear(&self) -> Result<bool, StoreError> {
        let had_token = self.load()?.is_some();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(had_token),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

#[cfg(test)]
impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

#[cfg(test)]
impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.token).clone())
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        *lock(&self.token) = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<bool, StoreError> {
        Ok(lock(&self.token).take().is_some())
    }
}

// --- Session ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedIn,
    SignedOut,
    /// The server rejected the token; set by `expire`.
    Expired,
}

/// Current user and token lifecycle. Shared as `Arc<Session>` by the API
/// client, the route guard and the UI; changes are published on a watch
/// channel so the UI can react to an expiry it did not trigger.
pub struct Session {
    store: Box<dyn TokenStore>,
    user: Mutex<Option<User>>,
    transition: Mutex<()>,
    state: watch::Sender<AuthState>,
}

impl Session {
    pub fn new(store: impl TokenStore + 'static) -> Self {
        let initial = match store.load() {
            Ok(Some(_)) => AuthState::SignedIn,
            Ok(None) => AuthState::SignedOut,
            Err(e) => {
                warn!(error = %e, "could not read persisted token");
                AuthState::SignedOut
            }
        };
        let (state, _) = watch::channel(initial);
        Self {
            store: Box::new(store),
            user: Mutex::new(None),
            transition: Mutex::new(()),
            state,
        }
    }

    /// The persisted token, read fresh on every call.
    pub fn token(&self) -> Option<String> {
        match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "could not read persisted token");
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.user).clone()
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn sign_in(&self, token: &str, user: Option<User>) -> Result<(), StoreError> {
        let _guard = lock(&self.transition);
        self.store.save(token)?;
        *lock(&self.user) = user;
        self.state.send_replace(AuthState::SignedIn);
        Ok(())
    }

    /// Clears the token and user unconditionally.
    pub fn sign_out(&self) -> Result<(), StoreError> {
        let _guard = lock(&self.transition);
        *lock(&self.user) = None;
        let result = self.store.clear().map(|_| ());
        self.state.send_replace(AuthState::SignedOut);
        result
    }

    /// Drop a token the server no longer accepts. Only the first of several
    /// concurrent expiries finds a token to clear; it alone notifies.
    pub fn expire(&self) -> bool {
        let _guard = lock(&self.transition);
        let cleared = match self.store.clear() {
            Ok(cleared) => cleared,
            Err(e) => {
                warn!(error = %e, "could not clear expired token");
                false
            }
        };
        if cleared {
            *lock(&self.user) = None;
            self.state.send_replace(AuthState::Expired);
            info!("session expired");
        }
        cleared
    }

    /// `POST /auth/login`, then persist the token. Errors leave the session
    /// untouched.
    pub async fn login(&self, api: &ApiClient, username: &str, password: &str) -> Result<Option<User>, ApiError> {
        let response = api.login(username, password).await?;
        self.sign_in(&response.token, response.user.clone())?;
        info!(username, "logged in");
        Ok(response.user)
    }

    /// `POST /auth/signup`. Does not log the new account in.
    pub async fn signup(&self, api: &ApiClient, username: &str, email: &str, password: &str) -> Result<(), ApiError> {
        api.signup(username, email, password).await?;
        info!(username, "signed up");
        Ok(())
    }

    pub fn logout(&self) -> Result<(), StoreError> {
        self.sign_out()?;
        info!("logged out");
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
