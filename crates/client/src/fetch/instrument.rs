//! Transport wrapper that records fetch breadcrumbs and network activity.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use leumas_core::{Error, InterceptedRequest, StoredResponse, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreadcrumbLevel {
    Info,
    Warning,
    Error,
}

/// One recorded fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub message: String,
    pub category: String,
    pub level: BreadcrumbLevel,
    pub method: String,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Wraps a transport and observes every request passing through it.
pub struct InstrumentedTransport {
    inner: Arc<dyn Transport>,
    in_flight: AtomicUsize,
    breadcrumbs: Mutex<VecDeque<Breadcrumb>>,
    max_breadcrumbs: usize,
}

impl InstrumentedTransport {
    pub fn new(inner: Arc<dyn Transport>, max_breadcrumbs: usize) -> Self {
        Self { inner, in_flight: AtomicUsize::new(0), breadcrumbs: Mutex::new(VecDeque::new()), max_breadcrumbs }
    }

    /// Whether any request is currently outstanding.
    pub fn is_active(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Recorded breadcrumbs, oldest first.
    pub async fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        self.breadcrumbs.lock().await.iter().cloned().collect()
    }

    async fn record(&self, crumb: Breadcrumb) {
        if self.max_breadcrumbs == 0 {
            return;
        }
        let mut crumbs = self.breadcrumbs.lock().await;
        while crumbs.len() >= self.max_breadcrumbs {
            crumbs.pop_front();
        }
        crumbs.push_back(crumb);
    }
}

#[async_trait::async_trait]
impl Transport for InstrumentedTransport {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<StoredResponse, Error> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        let result = self.inner.fetch(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let crumb = match &result {
            Ok(response) => Breadcrumb {
                message: format!("{} {}", response.status, request.url),
                category: "fetch".into(),
                level: if response.status >= 400 { BreadcrumbLevel::Warning } else { BreadcrumbLevel::Info },
                method: request.method.clone(),
                status: Some(response.status),
                error: None,
                duration_ms,
                timestamp: Utc::now(),
            },
            Err(e) => {
                tracing::debug!("fetch failed for {}: {}", request.url, e);
                Breadcrumb {
                    message: format!("Failed: {}", request.url),
                    category: "fetch".into(),
                    level: BreadcrumbLevel::Error,
                    method: request.method.clone(),
                    status: None,
                    error: Some(e.to_string()),
                    duration_ms,
                    timestamp: Utc::now(),
                }
            }
        };
        self.record(crumb).await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leumas_core::testing::MockTransport;
    use url::Url;

    fn get(url: &str) -> InterceptedRequest {
        InterceptedRequest::get(Url::parse(url).unwrap())
    }

    #[tokio::test]
    async fn test_breadcrumb_levels() {
        let mock = Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/ok", "ok");
        mock.fail("http://localhost:8000/down");
        let transport = InstrumentedTransport::new(mock, 10);

        transport.fetch(&get("http://localhost:8000/ok")).await.unwrap();
        transport.fetch(&get("http://localhost:8000/missing")).await.unwrap();
        assert!(transport.fetch(&get("http://localhost:8000/down")).await.is_err());

        let crumbs = transport.breadcrumbs().await;
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[0].level, BreadcrumbLevel::Info);
        assert_eq!(crumbs[0].message, "200 http://localhost:8000/ok");
        assert_eq!(crumbs[1].level, BreadcrumbLevel::Warning);
        assert_eq!(crumbs[1].status, Some(404));
        assert_eq!(crumbs[2].level, BreadcrumbLevel::Error);
        assert_eq!(crumbs[2].message, "Failed: http://localhost:8000/down");
        assert!(crumbs[2].error.is_some());
    }

    #[tokio::test]
    async fn test_breadcrumbs_bounded() {
        let mock = Arc::new(MockTransport::new());
        let transport = InstrumentedTransport::new(mock, 2);
        for path in ["a", "b", "c"] {
            transport.fetch(&get(&format!("http://localhost:8000/{path}"))).await.unwrap();
        }
        let crumbs = transport.breadcrumbs().await;
        assert_eq!(crumbs.len(), 2);
        assert!(crumbs[0].message.ends_with("/b"));
    }

    #[tokio::test]
    async fn test_activity_tracking() {
        let mock = Arc::new(MockTransport::new());
        mock.route("http://localhost:8000/slow", "slow");
        mock.hold();
        let transport = Arc::new(InstrumentedTransport::new(mock.clone(), 10));

        let task = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.fetch(&get("http://localhost:8000/slow")).await })
        };
        while mock.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(transport.is_active());

        mock.release();
        task.await.unwrap().unwrap();
        assert!(!transport.is_active());
    }
}
