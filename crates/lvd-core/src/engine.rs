//! Control surface: one engine per process, one authenticated session per engine.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::watch;

use crate::auth::{AuthenticatedSession, Authenticator, CredentialEncryptor, Pkcs1v15Encryptor};
use crate::cache::{AccountRecord, AccountStore, CacheStore, StateDb};
use crate::config::LvdConfig;
use crate::discovery::DiscoveryService;
use crate::error::{DiscoveryError, EngineError};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::materials::{MaterialFetcher, MaterialsReport};
use crate::model::{Credentials, DiscoverySnapshot, Term};
use crate::orchestrator::{
    CatalogEntry, LectureCatalog, Orchestrator, TaskId, TaskRecord, TaskStore,
};
use crate::resolver::ViewerPageResolver;
use crate::sink::{DownloadSink, HttpSink};

pub struct Engine {
    transport: Arc<dyn HttpTransport>,
    cache: CacheStore,
    accounts: AccountStore,
    authenticator: Authenticator,
    discovery: DiscoveryService,
    orchestrator: Orchestrator,
    materials: MaterialFetcher,
    session: RwLock<Option<AuthenticatedSession>>,
}

impl Engine {
    /// Engine over the default state database, the reqwest transport and the
    /// streaming HTTP sink.
    pub async fn open(config: LvdConfig) -> Result<Self> {
        let db = StateDb::open_default().await.context("open state database")?;
        let transport = Arc::new(ReqwestTransport::from_config(&config)?);
        let sink = Arc::new(HttpSink::new(&config.user_agent)?);
        Ok(Self::with_parts(
            config,
            db,
            transport,
            Arc::new(Pkcs1v15Encryptor),
            sink,
        ))
    }

    pub fn with_parts(
        config: LvdConfig,
        db: StateDb,
        transport: Arc<dyn HttpTransport>,
        encryptor: Arc<dyn CredentialEncryptor>,
        sink: Arc<dyn DownloadSink>,
    ) -> Self {
        let cache = CacheStore::new(db.clone(), config.cache_ttl());
        let accounts = AccountStore::new(db);
        let authenticator = Authenticator::new(
            Arc::clone(&transport),
            encryptor,
            accounts.clone(),
            config.clone(),
        );
        let discovery = DiscoveryService::new(Arc::clone(&transport), cache.clone(), &config);
        let resolver = Arc::new(ViewerPageResolver::new(
            Arc::clone(&transport),
            config.retry_policy(),
        ));
        let download_root = config
            .download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."));
        let materials = MaterialFetcher::new(
            Arc::clone(&transport),
            config.retry_policy(),
            config.platform_base().to_string(),
            download_root.clone(),
        );
        let orchestrator = Orchestrator::new(
            Arc::new(TaskStore::new()),
            resolver,
            sink,
            Arc::clone(&transport),
            download_root,
            config.min_payload_bytes,
        );
        Self {
            transport,
            cache,
            accounts,
            authenticator,
            discovery,
            orchestrator,
            materials,
            session: RwLock::new(None),
        }
    }

    /// Run the SSO handshake. Any previous session is dropped first, so a
    /// failed login leaves the engine logged out.
    pub async fn login(&self, creds: &Credentials) -> Result<AuthenticatedSession, EngineError> {
        self.logout();
        let session = self.authenticator.login(creds).await?;
        *self.session.write().unwrap() = Some(session.clone());
        Ok(session)
    }

    pub fn logout(&self) {
        self.transport.reset_session();
        if self.session.write().unwrap().take().is_some() {
            tracing::info!("session cleared");
        }
    }

    pub fn session(&self) -> Option<AuthenticatedSession> {
        self.session.read().unwrap().clone()
    }

    fn require_session(&self) -> Result<AuthenticatedSession, EngineError> {
        self.session().ok_or(EngineError::NotLoggedIn)
    }

    /// An expired platform session invalidates the engine's session record.
    fn note_discovery_error(&self, e: DiscoveryError) -> EngineError {
        if matches!(e, DiscoveryError::SessionExpired) {
            tracing::warn!("platform session expired");
            self.session.write().unwrap().take();
        }
        EngineError::Discovery(e)
    }

    pub async fn discover_courses(
        &self,
        term: Term,
        force_refresh: bool,
    ) -> Result<Arc<DiscoverySnapshot>, EngineError> {
        let session = self.require_session()?;
        self.discovery
            .discover(&session, term, force_refresh)
            .await
            .map_err(|e| self.note_discovery_error(e))
    }

    /// Terms of the last `years` years that list at least one course.
    pub async fn available_terms(&self, years: u32) -> Result<Vec<(Term, usize)>, EngineError> {
        let session = self.require_session()?;
        self.discovery
            .available_terms(&session, years)
            .await
            .map_err(|e| self.note_discovery_error(e))
    }

    /// Start a download task over lecture ids or fingerprints of `term`.
    pub fn create_task(&self, items: Vec<String>, term: Term) -> Result<TaskId, EngineError> {
        let session = self.require_session()?;
        let catalog = Arc::new(SessionCatalog {
            discovery: self.discovery.clone(),
            scope: term.scope_key(&session.user_id),
            session,
            term,
        });
        Ok(self.orchestrator.create_task(items, catalog))
    }

    /// Download the file and folder materials of one course of `term`,
    /// looked up in the (possibly cached) discovery snapshot.
    pub async fn download_materials(
        &self,
        course_id: &str,
        term: Term,
    ) -> Result<MaterialsReport, EngineError> {
        let snapshot = self.discover_courses(term, false).await?;
        let course = snapshot
            .courses
            .iter()
            .find(|c| c.id == course_id)
            .ok_or_else(|| EngineError::UnknownCourse(course_id.to_string()))?;
        self.materials
            .download_course(course)
            .await
            .map_err(|e| self.note_discovery_error(e))
    }

    pub fn get_status(&self, id: TaskId) -> Result<TaskRecord, EngineError> {
        Ok(self.orchestrator.get_status(id)?)
    }

    pub fn pause(&self, id: TaskId) -> Result<(), EngineError> {
        Ok(self.orchestrator.pause(id)?)
    }

    pub fn resume(&self, id: TaskId) -> Result<(), EngineError> {
        Ok(self.orchestrator.resume(id)?)
    }

    pub fn stop(&self, id: TaskId) -> Result<(), EngineError> {
        Ok(self.orchestrator.stop(id)?)
    }

    pub fn subscribe(&self, id: TaskId) -> Result<watch::Receiver<TaskRecord>, EngineError> {
        Ok(self.orchestrator.subscribe(id)?)
    }

    pub fn forget(&self, id: TaskId) -> Result<TaskRecord, EngineError> {
        Ok(self.orchestrator.forget(id)?)
    }

    pub async fn wait_terminal(&self, id: TaskId) -> Result<TaskRecord, EngineError> {
        Ok(self.orchestrator.wait_terminal(id).await?)
    }

    /// Drop one scope's cache entry, or every entry. Returns rows removed.
    pub async fn clear_cache(&self, scope: Option<&str>) -> Result<u64, EngineError> {
        self.cache
            .clear(scope)
            .await
            .map_err(|e| EngineError::Cache(format!("{:#}", e)))
    }

    pub async fn last_account(&self) -> Result<Option<AccountRecord>> {
        self.accounts.last_verified().await
    }
}

/// Task catalog bound to one account and term.
struct SessionCatalog {
    discovery: DiscoveryService,
    session: AuthenticatedSession,
    term: Term,
    scope: String,
}

#[async_trait]
impl LectureCatalog for SessionCatalog {
    async fn find(&self, key: &str) -> Result<Option<CatalogEntry>> {
        let found = self.discovery.lookup(&self.scope, key).await?;
        Ok(found.map(|(course, lecture)| CatalogEntry { course, lecture }))
    }

    async fn refresh(&self) -> Result<(), DiscoveryError> {
        self.discovery
            .discover(&self.session, self.term, true)
            .await
            .map(|_| ())
    }
}
