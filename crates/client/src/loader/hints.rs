//! Preload and prefetch resource hints.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintRel {
    Preload,
    Prefetch,
}

/// The `as` attribute of a preload hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintDestination {
    Font,
    Style,
    Script,
}

impl HintDestination {
    /// Guess the destination from the URL's file extension.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let file = path.rsplit('/').next().unwrap_or(path);
        let ext = file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())?;
        match ext.as_str() {
            "woff" | "woff2" | "ttf" | "otf" => Some(HintDestination::Font),
            "css" => Some(HintDestination::Style),
            "js" | "mjs" => Some(HintDestination::Script),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HintDestination::Font => "font",
            HintDestination::Style => "style",
            HintDestination::Script => "script",
        }
    }
}

/// A `<link>` hint to inject into the document head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHint {
    pub rel: HintRel,
    pub href: String,
    pub destination: Option<HintDestination>,
    pub crossorigin: Option<String>,
}

impl ResourceHint {
    pub fn preload(href: &str) -> Self {
        let destination = HintDestination::from_url(href);
        // font preloads are always fetched in CORS mode
        let crossorigin = matches!(destination, Some(HintDestination::Font)).then(|| "anonymous".to_string());
        Self { rel: HintRel::Preload, href: href.to_string(), destination, crossorigin }
    }

    pub fn prefetch(href: &str) -> Self {
        Self { rel: HintRel::Prefetch, href: href.to_string(), destination: None, crossorigin: None }
    }
}

impl fmt::Display for ResourceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rel = match self.rel {
            HintRel::Preload => "preload",
            HintRel::Prefetch => "prefetch",
        };
        write!(f, r#"<link rel="{}" href="{}""#, rel, escape_attr(&self.href))?;
        if let Some(destination) = self.destination {
            write!(f, r#" as="{}""#, destination.as_str())?;
        }
        if let Some(crossorigin) = &self.crossorigin {
            write!(f, r#" crossorigin="{}""#, escape_attr(crossorigin))?;
        }
        write!(f, ">")
    }
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn preload_hints<S: AsRef<str>>(urls: &[S]) -> Vec<ResourceHint> {
    urls.iter().map(|u| ResourceHint::preload(u.as_ref())).collect()
}

pub fn prefetch_hints<S: AsRef<str>>(urls: &[S]) -> Vec<ResourceHint> {
    urls.iter().map(|u| ResourceHint::prefetch(u.as_ref())).collect()
}
