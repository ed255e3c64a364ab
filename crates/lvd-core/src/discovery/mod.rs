//! Resource discovery: courses and lectures for one account and term.
//!
//! Results are cached per scope (`{userId}:{year}-{semester}`). A cache hit
//! costs zero network calls. Refreshes are single-flight per scope: while one
//! is running, further callers await the same shared future and get the same
//! result.

mod fanout;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::auth::AuthenticatedSession;
use crate::cache::CacheStore;
use crate::config::LvdConfig;
use crate::error::DiscoveryError;
use crate::http::HttpTransport;
use crate::model::{Course, DiscoverySnapshot, Lecture, Semester, Term};
use crate::page_model;
use crate::retry::{get_with_retry, RetryPolicy};

type RefreshResult = Result<Arc<DiscoverySnapshot>, DiscoveryError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

fn cache_err(e: anyhow::Error) -> DiscoveryError {
    DiscoveryError::Cache(format!("{:#}", e))
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    cache: CacheStore,
    platform_base: String,
    concurrency: usize,
    retry: RetryPolicy,
    in_flight: Mutex<HashMap<String, SharedRefresh>>,
}

#[derive(Clone)]
pub struct DiscoveryService {
    inner: Arc<Inner>,
}

impl DiscoveryService {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: CacheStore, config: &LvdConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                cache,
                platform_base: config.platform_base().to_string(),
                concurrency: config.discovery_concurrency.max(1),
                retry: config.retry_policy(),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Courses and lectures for `term`. Returns the cached snapshot unchanged
    /// unless it is missing, expired, or `force_refresh` is set.
    pub async fn discover(
        &self,
        session: &AuthenticatedSession,
        term: Term,
        force_refresh: bool,
    ) -> Result<Arc<DiscoverySnapshot>, DiscoveryError> {
        let scope = term.scope_key(&session.user_id);
        if !force_refresh {
            if let Some(snapshot) = self.inner.cache.get(&scope).await.map_err(cache_err)? {
                tracing::debug!(scope = %scope, "discovery cache hit");
                return Ok(Arc::new(snapshot));
            }
        }
        self.refresh(scope, term).await
    }

    /// Join the in-flight refresh for `scope`, or start one.
    async fn refresh(&self, scope: String, term: Term) -> RefreshResult {
        let fut = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            match in_flight.get(&scope) {
                Some(existing) => {
                    tracing::debug!(scope = %scope, "joining in-flight refresh");
                    existing.clone()
                }
                None => {
                    let this = self.clone();
                    let key = scope.clone();
                    let fut = async move {
                        let result = this.run_refresh(&key, term).await;
                        this.inner.in_flight.lock().unwrap().remove(&key);
                        result
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(scope, fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    async fn run_refresh(&self, scope: &str, term: Term) -> RefreshResult {
        let inner = &self.inner;
        let listing_url = term.listing_url(&inner.platform_base);
        tracing::info!(scope, "refreshing course list");

        let page = get_with_retry(inner.transport.as_ref(), &inner.retry, &listing_url).await?;
        if page_model::is_login_page(&page.url, &page.body) {
            return Err(DiscoveryError::SessionExpired);
        }
        let listed = page_model::parse_course_list(&page.body, &inner.platform_base, &term);
        let listed_count = listed.len();

        let (courses, failed_courses) = fanout::fetch_course_details(
            Arc::clone(&inner.transport),
            inner.retry,
            inner.platform_base.clone(),
            inner.concurrency,
            listed,
        )
        .await;
        if failed_courses > 0 {
            tracing::warn!(scope, failed_courses, "some course pages could not be read");
        }

        let lectures: Vec<Lecture> = courses
            .iter()
            .flat_map(|c| c.lectures.iter().cloned())
            .collect();
        tracing::info!(
            scope,
            courses = courses.len(),
            listed = listed_count,
            lectures = lectures.len(),
            "discovery finished"
        );
        let snapshot = DiscoverySnapshot {
            term,
            courses,
            lectures,
            failed_courses,
            discovered_at: Utc::now(),
        };
        inner.cache.put(scope, &snapshot).await.map_err(cache_err)?;
        Ok(Arc::new(snapshot))
    }

    /// Find a lecture (by ordinal id or fingerprint) in the non-expired cache for `scope`.
    pub async fn lookup(
        &self,
        scope: &str,
        key: &str,
    ) -> Result<Option<(Course, Lecture)>, DiscoveryError> {
        let snapshot = self.inner.cache.get(scope).await.map_err(cache_err)?;
        Ok(snapshot.and_then(|s| s.find(key).map(|(c, l)| (c.clone(), l.clone()))))
    }

    /// Probe the listing for the last `years` years (current included) and
    /// report every term that has courses, newest first. Not cached.
    pub async fn available_terms(
        &self,
        _session: &AuthenticatedSession,
        years: u32,
    ) -> Result<Vec<(Term, usize)>, DiscoveryError> {
        let inner = &self.inner;
        let this_year = Utc::now().year();
        let mut found = Vec::new();
        for year in (0..years as i32).map(|back| this_year - back) {
            for semester in Semester::ALL.iter().rev() {
                let term = Term::new(year, *semester);
                let page = inner.transport.get(&term.listing_url(&inner.platform_base)).await?;
                if page_model::is_login_page(&page.url, &page.body) {
                    return Err(DiscoveryError::SessionExpired);
                }
                let n = page_model::parse_course_list(&page.body, &inner.platform_base, &term).len();
                tracing::debug!(term = %term, courses = n, "probed term");
                if n > 0 {
                    found.push((term, n));
                }
            }
        }
        Ok(found)
    }
}
