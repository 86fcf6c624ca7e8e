//! Elements the loader manages, discovered from their data attributes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

pub const ATTR_LAZY: &str = "data-lazy";
pub const ATTR_SRC: &str = "data-src";
pub const ATTR_LAZY_LOAD: &str = "data-lazy-load";
pub const ATTR_SRCSET: &str = "data-srcset";
pub const ATTR_SIZES: &str = "data-sizes";
pub const ATTR_DEFER: &str = "data-defer";

pub const DEFAULT_SIZES: &str = "(max-width: 768px) 100vw, 50vw";

pub type ElementId = u32;

/// A page element as handed over by the host: tag name plus attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: ElementId,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

impl ElementDescriptor {
    pub fn new(id: ElementId, tag: &str) -> Self {
        Self { id, tag: tag.to_ascii_lowercase(), attributes: BTreeMap::new() }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// `img[data-lazy]`
    LazyImage,
    /// `[data-lazy-load]`
    LazyElement,
    /// `img[data-srcset]` without `data-lazy`
    ResponsiveImage,
    /// `link[data-defer]`
    DeferredStylesheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Pending,
    Loading,
    Loaded,
    Error,
}

impl LoadState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, LoadState::Loaded | LoadState::Error)
    }
}

/// Loader-side state of one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedElement {
    pub id: ElementId,
    pub kind: ElementKind,
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub state: LoadState,
    pub src: Option<String>,
    pub srcset: Option<String>,
    pub sizes: Option<String>,
    pub media: Option<String>,
    pub opacity: Option<f32>,
    pub classes: BTreeSet<String>,
}

impl ObservedElement {
    /// Classify a descriptor; `None` when the loader has no interest in it.
    pub fn discover(descriptor: &ElementDescriptor) -> Option<Self> {
        let is_img = descriptor.tag == "img";
        let kind = if is_img && descriptor.has(ATTR_LAZY) {
            ElementKind::LazyImage
        } else if descriptor.has(ATTR_LAZY_LOAD) {
            ElementKind::LazyElement
        } else if is_img && descriptor.has(ATTR_SRCSET) {
            ElementKind::ResponsiveImage
        } else if descriptor.tag == "link" && descriptor.has(ATTR_DEFER) {
            ElementKind::DeferredStylesheet
        } else {
            return None;
        };

        Some(Self {
            id: descriptor.id,
            kind,
            tag: descriptor.tag.clone(),
            attributes: descriptor.attributes.clone(),
            state: LoadState::Pending,
            src: descriptor.get("src").map(String::from),
            srcset: descriptor.get("srcset").map(String::from),
            sizes: descriptor.get("sizes").map(String::from),
            media: descriptor.get("media").map(String::from),
            opacity: None,
            classes: descriptor
                .get("class")
                .map(|c| c.split_whitespace().map(String::from).collect())
                .unwrap_or_default(),
        })
    }

    pub fn data_src(&self) -> Option<&str> {
        self.attributes.get(ATTR_SRC).map(String::as_str).filter(|s| !s.is_empty())
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self.kind, ElementKind::LazyImage | ElementKind::LazyElement)
    }

    pub(crate) fn begin_loading(&mut self) {
        self.state = LoadState::Loading;
        self.classes.insert("loading".into());
        self.opacity = Some(0.0);
    }

    pub(crate) fn finish_loaded(&mut self, src: String) {
        self.state = LoadState::Loaded;
        self.src = Some(src);
        self.classes.remove("loading");
        self.classes.insert("loaded".into());
        self.opacity = Some(1.0);
        self.attributes.remove(ATTR_LAZY);
    }

    pub(crate) fn finish_error(&mut self) {
        self.state = LoadState::Error;
        self.classes.remove("loading");
        self.classes.insert("error".into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_lazy_image() {
        let d = ElementDescriptor::new(1, "IMG").attr("data-lazy", "").attr("data-src", "/media/a.png");
        let el = ObservedElement::discover(&d).unwrap();
        assert_eq!(el.kind, ElementKind::LazyImage);
        assert_eq!(el.state, LoadState::Pending);
        assert_eq!(el.data_src(), Some("/media/a.png"));
        assert!(el.is_lazy());
    }

    #[test]
    fn test_discover_generic_lazy_element() {
        let d = ElementDescriptor::new(2, "section").attr("data-lazy-load", "").attr("class", "hero fade");
        let el = ObservedElement::discover(&d).unwrap();
        assert_eq!(el.kind, ElementKind::LazyElement);
        assert!(el.has_class("hero"));
        assert!(el.data_src().is_none());
    }

    #[test]
    fn test_discover_responsive_and_deferred() {
        let img = ElementDescriptor::new(3, "img").attr("data-srcset", "a-1x.png 1x, a-2x.png 2x");
        assert_eq!(ObservedElement::discover(&img).unwrap().kind, ElementKind::ResponsiveImage);

        let link = ElementDescriptor::new(4, "link").attr("rel", "stylesheet").attr("data-defer", "");
        assert_eq!(ObservedElement::discover(&link).unwrap().kind, ElementKind::DeferredStylesheet);
    }

    #[test]
    fn test_discover_ignores_plain_elements() {
        let d = ElementDescriptor::new(5, "img").attr("src", "/logo.png");
        assert!(ObservedElement::discover(&d).is_none());
    }

    #[test]
    fn test_state_transitions() {
        let d = ElementDescriptor::new(1, "img").attr("data-lazy", "").attr("data-src", "/a.png");
        let mut el = ObservedElement::discover(&d).unwrap();

        el.begin_loading();
        assert!(el.has_class("loading"));
        assert_eq!(el.opacity, Some(0.0));

        el.finish_loaded("/a.png".into());
        assert_eq!(el.state, LoadState::Loaded);
        assert!(!el.has_class("loading"));
        assert!(el.has_class("loaded"));
        assert!(el.attr(ATTR_LAZY).is_none());
        assert!(el.state.is_resolved());
    }
}
