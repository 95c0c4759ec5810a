//! Application context: owns the session, gateway and cache for one process.

use std::sync::Arc;

use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::error::{AuthErrorKind, ClientError};
use crate::gateway::Gateway;
use crate::resources::{LeadClient, Resource, ResourceClient};
use crate::roles::{self, NavItem, PageAccess};
use crate::session::{Credentials, FileStorage, MemoryStorage, SessionStorage, SessionStore};
use crate::types::{Principal, Role};

pub struct App {
    config: ClientConfig,
    session: Arc<SessionStore>,
    gateway: Gateway,
    cache: QueryCache,
    session_expired: bool,
}

impl App {
    /// Builds the client stack and restores any persisted session
    pub fn init(config: ClientConfig) -> Result<Self, ClientError> {
        let storage: Arc<dyn SessionStorage> = match &config.session.storage_dir {
            Some(dir) => Arc::new(FileStorage::in_dir(dir)),
            None => Arc::new(MemoryStorage::new()),
        };
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: ClientConfig, storage: Arc<dyn SessionStorage>) -> Result<Self, ClientError> {
        let session = Arc::new(SessionStore::new(storage));
        let session_expired = match session.restore() {
            Ok(_) => false,
            Err(ClientError::Auth(err)) if err.kind == AuthErrorKind::Expired => true,
            Err(err) => return Err(err),
        };

        let gateway = Gateway::new(&config, Arc::clone(&session))?;
        let cache = QueryCache::new(gateway.clone(), config.stale_after());

        tracing::debug!(
            environment = ?config.environment,
            api = %gateway.base_url(),
            authenticated = session.is_authenticated(),
            "client initialised"
        );

        Ok(Self {
            config,
            session,
            gateway,
            cache,
            session_expired,
        })
    }

    /// Logs in and drops anything cached for the previous principal
    pub async fn login(&self, username: &str, password: &str) -> Result<Principal, ClientError> {
        let principal = self
            .session
            .login(&self.gateway, &Credentials::new(username, password))
            .await?;
        self.cache.clear();
        Ok(principal)
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.session.logout()?;
        self.cache.clear();
        Ok(())
    }

    /// Whether the persisted session was discarded at startup because its token expired
    pub fn session_expired(&self) -> bool {
        self.session_expired
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.session.current_principal()
    }

    pub fn role(&self) -> Option<Role> {
        self.session.role()
    }

    pub fn navigation(&self) -> Vec<NavItem> {
        roles::navigation_for(self.role())
    }

    pub fn can_access(&self, route: &str) -> bool {
        roles::can_access(self.role(), route)
    }

    pub fn guard(&self, route: &str) -> PageAccess {
        roles::guard(self.current_principal().as_ref(), route)
    }

    pub fn resource(&self, resource: Resource) -> ResourceClient {
        ResourceClient::new(self.cache.clone(), resource).with_polling(self.config.poll_interval())
    }

    pub fn leads(&self) -> LeadClient {
        LeadClient::from_client(self.resource(Resource::Leads))
    }

    /// Stops background polling and empties the cache
    pub fn dispose(&self) {
        self.cache.dispose();
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.cache.dispose();
    }
}
