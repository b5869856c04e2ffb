//! Authenticated session against the API

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::{
    api::ApiClient,
    errors::DashboardError,
    models::{AuthResult, AuthUser, RegisterRequest, Role},
};

/// Where the bearer token survives between runs
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, DashboardError>;
    fn save(&self, token: &str) -> Result<(), DashboardError>;
    fn clear(&self) -> Result<(), DashboardError>;
}

/// Token kept in a single file
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, DashboardError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &str) -> Result<(), DashboardError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, token)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), DashboardError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Token kept in memory only
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, DashboardError> {
        Ok(self.token.lock().ok().and_then(|t| t.clone()))
    }

    fn save(&self, token: &str) -> Result<(), DashboardError> {
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), DashboardError> {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
        Ok(())
    }
}

/// The signed-in user and the client acting on their behalf.
///
/// Passed explicitly to whatever needs the current user.
pub struct Session {
    client: ApiClient,
    store: Box<dyn TokenStore>,
    user: Option<AuthUser>,
}

impl Session {
    pub fn new(client: ApiClient, store: Box<dyn TokenStore>) -> Self {
        Self {
            client,
            store,
            user: None,
        }
    }

    /// Resume from a stored token.
    ///
    /// Without a token, or when `/auth/me` rejects it, the session stays
    /// signed out. Only token store failures are errors.
    pub async fn restore(&mut self) -> Result<Option<&AuthUser>, DashboardError> {
        let Some(token) = self.store.load()? else {
            debug!("No stored token");
            self.user = None;
            return Ok(None);
        };

        self.client.set_token(Some(token));
        self.user = match self.client.me().await {
            Ok(user) => {
                info!("Restored session for {}", user.email);
                Some(user)
            }
            Err(e) => {
                warn!("Stored token not accepted: {}", e);
                None
            }
        };
        Ok(self.user.as_ref())
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&AuthUser, DashboardError> {
        let result = self.client.login(email, password).await?;
        self.accept(result)
    }

    pub async fn register(&mut self, request: &RegisterRequest) -> Result<&AuthUser, DashboardError> {
        let result = self.client.register(request).await?;
        self.accept(result)
    }

    fn accept(&mut self, result: AuthResult) -> Result<&AuthUser, DashboardError> {
        self.store.save(&result.token)?;
        self.client.set_token(Some(result.token));
        info!("Signed in as {} ({})", result.user.email, result.user.role);
        Ok(self.user.insert(result.user))
    }

    /// Re-fetch the current user with the active token
    pub async fn refresh(&mut self) -> Result<Option<&AuthUser>, DashboardError> {
        if self.client.token().is_none() {
            self.user = None;
            return Ok(None);
        }
        self.user = self.client.me().await.ok();
        Ok(self.user.as_ref())
    }

    pub fn logout(&mut self) -> Result<(), DashboardError> {
        self.store.clear()?;
        self.client.set_token(None);
        self.user = None;
        Ok(())
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn role(&self) -> Option<&Role> {
        self.user.as_ref().map(|u| &u.role)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Device to show: `explicit`, else the account's device, else `fallback`
    pub fn device_id(&self, explicit: Option<&str>, fallback: &str) -> String {
        explicit
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or_else(|| self.user.as_ref().and_then(|u| u.device_id.as_deref()))
            .unwrap_or(fallback)
            .to_string()
    }
}
