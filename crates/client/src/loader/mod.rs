//! Page-side resource loading: lazy elements, cache priming and resource hints.
//!
//! ### Lazy loading
//! - Native fast path resolves every lazy image at once
//! - Otherwise a `VisibilityWatcher` (50px margin, 1% threshold) decides
//!   when an element loads; each element loads at most once and is
//!   unobserved when it resolves, whether it loaded or failed
//!
//! ### Cache priming
//! - After an image loads, a best-effort task checks the URL with HEAD and
//!   stores a GET of it in the priming cache store
//!
//! ### Failure handling
//! - Load failures mark the element `error`, log a warning and never retry
//! - Missing capabilities disable the matching feature silently

pub mod element;
pub mod hints;
pub mod modules;
pub mod visibility;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

pub use element::{ElementDescriptor, ElementId, ElementKind, LoadState, ObservedElement};
pub use hints::{HintDestination, HintRel, ResourceHint, prefetch_hints, preload_hints};
pub use modules::{ModuleCache, RequestCounters};
pub use visibility::{IntersectionEntry, Rect, VisibilityWatcher};

use crate::perf::{LoadBadge, LoadCounters, PERF_SESSION_KEY, PerformanceSummary, TimingEntry};
use leumas_core::{
    AppConfig, CacheStorage, ConfigError, Destination, Error, InterceptedRequest, Registration, Transport,
    WorkerRegistrar,
};

/// What the hosting page supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `loading="lazy"` on images.
    pub native_lazy_loading: bool,
    /// IntersectionObserver or an equivalent visibility source.
    pub visibility_observer: bool,
    /// Cache Storage is reachable from the page.
    pub cache_storage: bool,
    /// Worker registration is available.
    pub service_worker: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { native_lazy_loading: false, visibility_observer: true, cache_storage: true, service_worker: true }
    }
}

/// Loader settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub origin: Url,
    pub root_margin: f64,
    pub threshold: f64,
    /// Cache store that loaded images are primed into.
    pub prime_cache: String,
    pub script_path: String,
}

impl LoaderConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            origin: config.origin_url()?,
            root_margin: config.lazy_root_margin_px,
            threshold: config.lazy_threshold,
            prime_cache: config.cache_version.clone(),
            script_path: config.script_path.clone(),
        })
    }
}

/// Why a lazy element failed to load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("invalid source {0}")]
    Source(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Fetch(#[from] Error),
}

/// Result of `init_lazy_loading`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LazyInit {
    /// Images resolved immediately through the native fast path.
    pub eager: usize,
    /// Elements handed to the visibility watcher.
    pub observed: usize,
}

pub struct ResourceLoader {
    config: LoaderConfig,
    capabilities: Capabilities,
    transport: Arc<dyn Transport>,
    storage: Option<Arc<dyn CacheStorage>>,
    elements: BTreeMap<ElementId, ObservedElement>,
    watcher: Option<VisibilityWatcher>,
    counters: LoadCounters,
    modules: ModuleCache,
    priming: Vec<JoinHandle<()>>,
    session: HashMap<String, String>,
    started_at: Instant,
}

impl ResourceLoader {
    pub fn new(
        config: LoaderConfig, capabilities: Capabilities, transport: Arc<dyn Transport>,
        storage: Option<Arc<dyn CacheStorage>>,
    ) -> Self {
        let storage = if capabilities.cache_storage { storage } else { None };
        let modules = ModuleCache::new(transport.clone(), config.origin.clone());
        Self {
            config,
            capabilities,
            transport,
            storage,
            elements: BTreeMap::new(),
            watcher: None,
            counters: LoadCounters::default(),
            modules,
            priming: Vec::new(),
            session: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Register every element the loader cares about. Returns how many were taken.
    pub fn discover(&mut self, descriptors: &[ElementDescriptor]) -> usize {
        let mut taken = 0;
        for descriptor in descriptors {
            if let Some(element) = ObservedElement::discover(descriptor) {
                self.elements.insert(element.id, element);
                taken += 1;
            }
        }
        taken
    }

    pub fn element(&self, id: ElementId) -> Option<&ObservedElement> {
        self.elements.get(&id)
    }

    pub fn elements(&self) -> impl Iterator<Item = &ObservedElement> {
        self.elements.values()
    }

    pub fn is_observed(&self, id: ElementId) -> bool {
        self.watcher.as_ref().is_some_and(|w| w.is_observed(id))
    }

    pub fn counters(&self) -> LoadCounters {
        LoadCounters { requests_completed: self.modules.counters().completed, ..self.counters }
    }

    /// Start lazy loading for every discovered lazy element.
    pub fn init_lazy_loading(&mut self) -> LazyInit {
        let mut init = LazyInit::default();

        if self.capabilities.native_lazy_loading {
            for element in self.elements.values_mut() {
                if element.kind != ElementKind::LazyImage || element.state != LoadState::Pending {
                    continue;
                }
                if let Some(src) = element.data_src().map(String::from) {
                    element.finish_loaded(src);
                    init.eager += 1;
                }
            }
            tracing::debug!("native lazy loading resolved {} images", init.eager);
            return init;
        }

        if !self.capabilities.visibility_observer {
            tracing::debug!("no visibility observer available, lazy loading disabled");
            return init;
        }

        let mut watcher = VisibilityWatcher::new(self.config.root_margin, self.config.threshold);
        for element in self.elements.values() {
            if element.is_lazy() && element.state == LoadState::Pending {
                watcher.observe(element.id);
                init.observed += 1;
                if element.kind == ElementKind::LazyImage {
                    self.counters.images_total += 1;
                }
            }
        }
        self.watcher = Some(watcher);
        init
    }

    /// Compute visibility from layout and load whatever became visible.
    pub async fn check_viewport(&mut self, viewport: &Rect, layout: &[(ElementId, Rect)]) -> Vec<(ElementId, LoadState)> {
        let entries = match &self.watcher {
            Some(watcher) => watcher.evaluate(viewport, layout),
            None => return Vec::new(),
        };
        self.on_intersection(&entries).await
    }

    /// Handle visibility observations.
    ///
    /// Every visible, still-pending element with a source loads concurrently;
    /// one element failing does not hold up the others. Returns the final
    /// state of each element that was loaded.
    pub async fn on_intersection(&mut self, entries: &[IntersectionEntry]) -> Vec<(ElementId, LoadState)> {
        let Some(watcher) = &self.watcher else {
            return Vec::new();
        };

        let mut batch = Vec::new();
        for entry in entries {
            if !watcher.is_observed(entry.target) || !watcher.is_visible(entry) {
                continue;
            }
            let Some(element) = self.elements.get_mut(&entry.target) else {
                continue;
            };
            if element.state != LoadState::Pending {
                continue;
            }
            let Some(src) = element.data_src().map(String::from) else {
                continue;
            };
            if batch.iter().any(|(id, _)| *id == element.id) {
                continue;
            }
            element.begin_loading();
            batch.push((element.id, src));
        }

        let loads = batch.iter().map(|(_, src)| {
            let transport = self.transport.clone();
            let origin = self.config.origin.clone();
            let src = src.clone();
            async move {
                let request = InterceptedRequest::parse(&origin, &src)
                    .map_err(|_| LoadError::Source(src.clone()))?
                    .with_destination(Destination::Image);
                let response = transport.fetch(&request).await?;
                if response.is_ok() {
                    Ok::<Url, LoadError>(request.url)
                } else {
                    Err(LoadError::Status(response.status))
                }
            }
        });
        let results = join_all(loads).await;

        let mut outcomes = Vec::with_capacity(batch.len());
        for ((id, src), result) in batch.into_iter().zip(results) {
            if let Some(watcher) = self.watcher.as_mut() {
                watcher.unobserve(id);
            }
            let Some(element) = self.elements.get_mut(&id) else {
                continue;
            };
            match result {
                Ok(url) => {
                    element.finish_loaded(src);
                    if element.kind == ElementKind::LazyImage {
                        self.counters.images_loaded += 1;
                    }
                    outcomes.push((id, LoadState::Loaded));
                    self.prime_cache(url);
                }
                Err(e) => {
                    element.finish_error();
                    tracing::warn!("failed to load image {}: {}", src, e);
                    outcomes.push((id, LoadState::Error));
                }
            }
        }
        outcomes
    }

    /// Ask the cache store to retain `url`. Best effort; the copy happens on
    /// a spawned task, so this is only called from the async load paths.
    fn prime_cache(&mut self, url: Url) {
        let Some(storage) = self.storage.clone() else {
            return;
        };
        let transport = self.transport.clone();
        let cache_name = self.config.prime_cache.clone();

        self.priming.retain(|task| !task.is_finished());
        self.priming.push(tokio::spawn(async move {
            if let Err(e) = prime(transport.as_ref(), storage.as_ref(), &cache_name, url.clone()).await {
                tracing::debug!("image caching skipped for {}: {}", url, e);
            }
        }));
    }

    /// Wait for outstanding cache priming to finish.
    pub async fn settle(&mut self) {
        for task in self.priming.drain(..) {
            if let Err(e) = task.await {
                tracing::debug!("cache priming task failed: {}", e);
            }
        }
    }

    /// Copy `data-srcset`/`data-sizes` onto responsive images.
    pub fn optimize_responsive_images(&mut self) -> usize {
        let mut updated = 0;
        for element in self.elements.values_mut() {
            if element.tag != "img" {
                continue;
            }
            if let Some(srcset) = element.attr(element::ATTR_SRCSET).map(String::from) {
                element.sizes = Some(element.attr(element::ATTR_SIZES).unwrap_or(element::DEFAULT_SIZES).to_string());
                element.srcset = Some(srcset);
                updated += 1;
            }
        }
        updated
    }

    /// Switch deferred stylesheets to `media="print"` until they load.
    pub fn defer_non_critical_styles(&mut self) -> usize {
        let mut deferred = 0;
        for element in self.elements.values_mut() {
            if element.kind == ElementKind::DeferredStylesheet && element.attr("rel") == Some("stylesheet") {
                element.media = Some("print".into());
                deferred += 1;
            }
        }
        deferred
    }

    /// A deferred stylesheet finished loading; apply it to all media.
    pub fn on_stylesheet_loaded(&mut self, id: ElementId) -> bool {
        match self.elements.get_mut(&id) {
            Some(element) if element.kind == ElementKind::DeferredStylesheet && element.media.as_deref() == Some("print") => {
                element.media = Some("all".into());
                true
            }
            _ => false,
        }
    }

    pub async fn load_module(&mut self, path: &str, name: &str) -> Option<Value> {
        self.modules.load(path, name).await
    }

    /// Register the worker script. Failures are logged, never raised.
    pub async fn register_service_worker(&self, registrar: &dyn WorkerRegistrar) -> Option<Registration> {
        if !self.capabilities.service_worker {
            return None;
        }
        match registrar.register(&self.config.script_path).await {
            Ok(registration) => {
                tracing::info!("service worker registered: {}", registration.scope);
                Some(registration)
            }
            Err(e) => {
                tracing::debug!("service worker registration failed: {}", e);
                None
            }
        }
    }

    /// Build, store and log the performance summary.
    pub fn report(&mut self, entries: &[TimingEntry]) -> PerformanceSummary {
        self.report_at(self.started_at.elapsed(), entries)
    }

    pub fn report_at(&mut self, elapsed: Duration, entries: &[TimingEntry]) -> PerformanceSummary {
        let summary = PerformanceSummary::new(elapsed, self.counters(), entries);
        self.session
            .insert(PERF_SESSION_KEY.to_string(), summary.to_session_json());
        summary.log();
        summary
    }

    pub fn badge(&self) -> (LoadBadge, String) {
        let load_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        let badge = LoadBadge::classify(load_ms);
        (badge, badge.message(load_ms))
    }

    pub fn session_record(&self, key: &str) -> Option<&str> {
        self.session.get(key).map(String::as_str)
    }
}

/// HEAD existence check followed by `cache.add` semantics.
async fn prime(transport: &dyn Transport, storage: &dyn CacheStorage, cache_name: &str, url: Url) -> Result<(), Error> {
    let head = InterceptedRequest::new("HEAD", url.clone()).with_destination(Destination::Image);
    transport.fetch(&head).await?;

    let request = InterceptedRequest::get(url).with_destination(Destination::Image);
    let response = transport.fetch(&request).await?;
    if !response.is_ok() {
        return Err(Error::Network(format!("HTTP {}", response.status)));
    }
    storage.put(cache_name, &request.key(), &response).await
}
