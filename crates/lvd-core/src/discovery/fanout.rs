//! Bounded fan-out over course detail pages.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::DiscoveryError;
use crate::http::HttpTransport;
use crate::model::Course;
use crate::page_model;
use crate::retry::{get_with_retry, RetryPolicy};

async fn fetch_one(
    transport: &dyn HttpTransport,
    retry: &RetryPolicy,
    platform_base: &str,
    mut course: Course,
) -> Result<Course, DiscoveryError> {
    let page = get_with_retry(transport, retry, &course.url).await?;
    if page_model::is_login_page(&page.url, &page.body) {
        return Err(DiscoveryError::SessionExpired);
    }
    let parsed = page_model::parse_course_page(&page.body, &course.id, platform_base)?;
    if course.professor.is_empty() {
        if let Some(p) = parsed.professor {
            course.professor = p;
        }
    }
    course.lectures = parsed.lectures;
    course.materials = parsed.materials;
    Ok(course)
}

/// Fetch and parse every course page, at most `max_concurrent` at a time.
/// Failed courses are dropped and counted. Output keeps listing order.
pub(super) async fn fetch_course_details(
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    platform_base: String,
    max_concurrent: usize,
    courses: Vec<Course>,
) -> (Vec<Course>, usize) {
    let total = courses.len();
    let mut pending = courses.into_iter().enumerate();
    let mut done: Vec<(usize, Course)> = Vec::with_capacity(total);
    let mut failed = 0usize;
    let mut join_set = JoinSet::new();

    loop {
        while join_set.len() < max_concurrent {
            let Some((idx, course)) = pending.next() else {
                break;
            };
            let transport = Arc::clone(&transport);
            let platform_base = platform_base.clone();
            join_set.spawn(async move {
                let id = course.id.clone();
                let result = fetch_one(transport.as_ref(), &retry, &platform_base, course).await;
                (idx, id, result)
            });
        }

        if join_set.is_empty() {
            break;
        }

        let Some(res) = join_set.join_next().await else {
            break;
        };
        match res {
            Ok((idx, _, Ok(course))) => done.push((idx, course)),
            Ok((_, id, Err(e))) => {
                tracing::warn!(course_id = %id, "dropping course: {}", e);
                failed += 1;
            }
            Err(e) => {
                tracing::warn!("course fetch task failed: {}", e);
                failed += 1;
            }
        }
    }

    done.sort_by_key(|(idx, _)| *idx);
    (done.into_iter().map(|(_, c)| c).collect(), failed)
}
