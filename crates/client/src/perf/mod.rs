//! Session performance summary derived from browser timing entries.
//!
//! Nothing here is persisted: the summary is a short-lived session record
//! (`perfMetrics`) rebuilt every time it is reported.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Session record key the summary is stored under.
pub const PERF_SESSION_KEY: &str = "perfMetrics";

/// A performance timeline entry as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingEntry {
    pub name: String,
    pub entry_type: String,
    pub start_time: f64,
    pub render_time: Option<f64>,
    pub load_time: Option<f64>,
    pub fetch_start: Option<f64>,
    pub response_start: Option<f64>,
}

impl TimingEntry {
    pub fn paint(name: &str, start_time: f64) -> Self {
        Self { name: name.into(), entry_type: "paint".into(), start_time, ..Default::default() }
    }

    pub fn largest_contentful_paint(render_time: Option<f64>, load_time: Option<f64>) -> Self {
        Self { entry_type: "largest-contentful-paint".into(), render_time, load_time, ..Default::default() }
    }

    pub fn navigation(fetch_start: f64, response_start: f64) -> Self {
        Self {
            entry_type: "navigation".into(),
            fetch_start: Some(fetch_start),
            response_start: Some(response_start),
            ..Default::default()
        }
    }
}

/// Core Web Vitals in milliseconds; `None` when not observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WebVitals {
    pub fcp: Option<f64>,
    pub lcp: Option<f64>,
    pub fid: Option<f64>,
    pub cls: Option<f64>,
    pub ttfb: Option<f64>,
}

impl WebVitals {
    pub fn from_entries(entries: &[TimingEntry]) -> Self {
        let mut vitals = WebVitals::default();
        for entry in entries {
            if entry.name == "first-contentful-paint" {
                vitals.fcp = Some(entry.start_time);
            }
            if entry.entry_type == "largest-contentful-paint" {
                // later LCP candidates replace earlier ones
                vitals.lcp = entry
                    .render_time
                    .filter(|t| *t > 0.0)
                    .or(entry.load_time);
            }
        }

        if let Some(nav) = entries.iter().find(|e| e.entry_type == "navigation")
            && let (Some(fetch_start), Some(response_start)) = (nav.fetch_start, nav.response_start)
        {
            vitals.ttfb = Some(response_start - fetch_start);
        }

        vitals
    }
}

/// Image and request counters kept by the loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadCounters {
    pub images_total: usize,
    pub images_loaded: usize,
    pub requests_completed: usize,
}

/// Snapshot of page performance at report time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub page_load_time: String,
    pub images_loaded: String,
    pub requests_completed: usize,
    pub web_vitals: WebVitals,
}

impl PerformanceSummary {
    pub fn new(elapsed: Duration, counters: LoadCounters, entries: &[TimingEntry]) -> Self {
        Self {
            page_load_time: format!("{:.2}", elapsed.as_secs_f64() * 1000.0),
            images_loaded: format!("{}/{}", counters.images_loaded, counters.images_total),
            requests_completed: counters.requests_completed,
            web_vitals: WebVitals::from_entries(entries),
        }
    }

    /// JSON form stored under `PERF_SESSION_KEY`.
    pub fn to_session_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn log(&self) {
        tracing::info!(
            page_load_ms = %self.page_load_time,
            images = %self.images_loaded,
            requests = self.requests_completed,
            fcp = ?self.web_vitals.fcp,
            lcp = ?self.web_vitals.lcp,
            ttfb = ?self.web_vitals.ttfb,
            "performance metrics"
        );
    }
}

/// Page speed classification shown to the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadBadge {
    Good,
    Warning,
    Critical,
}

impl LoadBadge {
    pub fn classify(load_ms: f64) -> Self {
        if load_ms > 3000.0 {
            LoadBadge::Critical
        } else if load_ms > 2000.0 {
            LoadBadge::Warning
        } else {
            LoadBadge::Good
        }
    }

    pub fn message(&self, load_ms: f64) -> String {
        let label = match self {
            LoadBadge::Good => "Fast",
            LoadBadge::Warning => "Fair",
            LoadBadge::Critical => "Slow",
        };
        format!("{} ({:.0}ms)", label, load_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_vitals_from_entries() {
        let entries = vec![
            TimingEntry::paint("first-paint", 90.0),
            TimingEntry::paint("first-contentful-paint", 120.5),
            TimingEntry::largest_contentful_paint(Some(300.0), Some(280.0)),
            TimingEntry::largest_contentful_paint(Some(0.0), Some(450.0)),
            TimingEntry::navigation(10.0, 85.0),
        ];
        let vitals = WebVitals::from_entries(&entries);
        assert_eq!(vitals.fcp, Some(120.5));
        assert_eq!(vitals.lcp, Some(450.0));
        assert_eq!(vitals.ttfb, Some(75.0));
        assert_eq!(vitals.fid, None);
        assert_eq!(vitals.cls, None);
    }

    #[test]
    fn test_summary_formatting() {
        let counters = LoadCounters { images_total: 4, images_loaded: 3, requests_completed: 2 };
        let summary = PerformanceSummary::new(Duration::from_micros(1_234_567), counters, &[]);
        assert_eq!(summary.page_load_time, "1234.57");
        assert_eq!(summary.images_loaded, "3/4");

        let json: serde_json::Value = serde_json::from_str(&summary.to_session_json()).unwrap();
        assert_eq!(json["imagesLoaded"], "3/4");
        assert_eq!(json["requestsCompleted"], 2);
    }

    #[test]
    fn test_badge_thresholds() {
        assert_eq!(LoadBadge::classify(1999.0), LoadBadge::Good);
        assert_eq!(LoadBadge::classify(2000.0), LoadBadge::Good);
        assert_eq!(LoadBadge::classify(2500.0), LoadBadge::Warning);
        assert_eq!(LoadBadge::classify(3000.0), LoadBadge::Warning);
        assert_eq!(LoadBadge::classify(3000.5), LoadBadge::Critical);
        assert_eq!(LoadBadge::Critical.message(3400.4), "Slow (3400ms)");
    }
}
