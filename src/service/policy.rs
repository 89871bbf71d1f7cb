//! Readiness and sub-resource policies for the render worker.
//!
//! - [`ReadinessPolicy`] decides what "loaded" means before export.
//! - [`ResourcePolicy`] is a declarative deny predicate evaluated for every
//!   intercepted sub-resource request.

use std::fmt;
use std::str::FromStr;

/// What the worker waits for after loading the HTML.
///
/// | Policy | Waits for |
/// |--------|-----------|
/// | `Dom` | `DOMContentLoaded`, then fonts and images (each bounded) |
/// | `Load` | window `load`, then fonts and images (each bounded) |
/// | `NetworkIdle` | window `load`, then 500 ms without new resource fetches |
///
/// `Dom` is the default: full network idleness can hang on slow third-party
/// resources, while the bounded font/image waits still catch what matters for
/// print output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessPolicy {
    /// DOM ready plus bounded font and image waits.
    #[default]
    Dom,
    /// Window load plus bounded font and image waits.
    Load,
    /// Window load plus network quiet period.
    NetworkIdle,
}

impl FromStr for ReadinessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dom" | "domcontentloaded" => Ok(ReadinessPolicy::Dom),
            "load" => Ok(ReadinessPolicy::Load),
            "networkidle" | "networkidle0" | "network-idle" => Ok(ReadinessPolicy::NetworkIdle),
            other => Err(format!(
                "unknown readiness policy '{}' (expected dom, load or networkidle)",
                other
            )),
        }
    }
}

impl fmt::Display for ReadinessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadinessPolicy::Dom => "dom",
            ReadinessPolicy::Load => "load",
            ReadinessPolicy::NetworkIdle => "networkidle",
        })
    }
}

/// Kind of a sub-resource request, as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// The page document itself (never blocked).
    Document,
    /// CSS.
    Stylesheet,
    /// Images.
    Image,
    /// Audio and video.
    Media,
    /// Web fonts.
    Font,
    /// JavaScript.
    Script,
    /// XHR, fetch, websockets, beacons, ...
    Other,
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stylesheet" | "css" => Ok(ResourceKind::Stylesheet),
            "image" | "img" => Ok(ResourceKind::Image),
            "media" => Ok(ResourceKind::Media),
            "font" => Ok(ResourceKind::Font),
            "script" | "js" => Ok(ResourceKind::Script),
            "other" => Ok(ResourceKind::Other),
            "document" => Err("the document resource kind cannot be blocked".to_string()),
            other => Err(format!("unknown resource kind '{}'", other)),
        }
    }
}

/// Metadata of one intercepted request.
#[derive(Debug, Clone, Copy)]
pub struct ResourceRequest<'a> {
    /// Full request URL.
    pub url: &'a str,
    /// Resource kind.
    pub kind: ResourceKind,
}

/// Deny-list over resource kinds and URL wildcard patterns.
///
/// The main document and `data:` URLs are always allowed.
///
/// # Example
///
/// ```rust
/// use gerar_pdf_api::service::{ResourceKind, ResourcePolicy, ResourceRequest};
///
/// let policy = ResourcePolicy::default()
///     .deny_kind(ResourceKind::Script)
///     .deny_url("*google-analytics.com*");
///
/// assert!(!policy.allows(&ResourceRequest {
///     url: "https://cdn.example.com/app.js",
///     kind: ResourceKind::Script,
/// }));
/// assert!(policy.allows(&ResourceRequest {
///     url: "https://cdn.example.com/logo.png",
///     kind: ResourceKind::Image,
/// }));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePolicy {
    denied_kinds: Vec<ResourceKind>,
    denied_urls: Vec<String>,
}

impl ResourcePolicy {
    /// Deny every request of `kind` (ignored for [`ResourceKind::Document`]).
    pub fn deny_kind(mut self, kind: ResourceKind) -> Self {
        if kind != ResourceKind::Document && !self.denied_kinds.contains(&kind) {
            self.denied_kinds.push(kind);
        }
        self
    }

    /// Deny every request whose URL matches `pattern` (`*` matches any run).
    pub fn deny_url(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        if !pattern.is_empty() {
            self.denied_urls.push(pattern);
        }
        self
    }

    /// `true` when at least one rule exists, i.e. interception is needed.
    pub fn is_active(&self) -> bool {
        !self.denied_kinds.is_empty() || !self.denied_urls.is_empty()
    }

    /// Evaluate the predicate for one request.
    pub fn allows(&self, request: &ResourceRequest<'_>) -> bool {
        if request.kind == ResourceKind::Document || request.url.starts_with("data:") {
            return true;
        }
        if self.denied_kinds.contains(&request.kind) {
            return false;
        }
        !self
            .denied_urls
            .iter()
            .any(|pattern| wildcard_match(pattern, request.url))
    }

    /// Denied kinds, in insertion order.
    pub fn denied_kinds(&self) -> &[ResourceKind] {
        &self.denied_kinds
    }

    /// Denied URL patterns, in insertion order.
    pub fn denied_urls(&self) -> &[String] {
        &self.denied_urls
    }
}

/// Case-insensitive glob match where `*` matches any (possibly empty) run.
///
/// ```rust
/// use gerar_pdf_api::service::wildcard_match;
///
/// assert!(wildcard_match("https://*.example.com", "https://app.example.com"));
/// assert!(!wildcard_match("https://*.example.com", "https://example.org"));
/// ```
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((star_p, star_t)) = backtrack {
            p = star_p + 1;
            t = star_t + 1;
            backtrack = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readiness_policy_parse() {
        assert_eq!("dom".parse::<ReadinessPolicy>(), Ok(ReadinessPolicy::Dom));
        assert_eq!("DOMContentLoaded".parse::<ReadinessPolicy>(), Ok(ReadinessPolicy::Dom));
        assert_eq!("load".parse::<ReadinessPolicy>(), Ok(ReadinessPolicy::Load));
        assert_eq!("networkidle0".parse::<ReadinessPolicy>(), Ok(ReadinessPolicy::NetworkIdle));
        assert!("eventually".parse::<ReadinessPolicy>().is_err());
        assert_eq!(ReadinessPolicy::NetworkIdle.to_string(), "networkidle");
    }

    #[test]
    fn test_resource_kind_parse() {
        assert_eq!("script".parse::<ResourceKind>(), Ok(ResourceKind::Script));
        assert_eq!("Font".parse::<ResourceKind>(), Ok(ResourceKind::Font));
        assert!("document".parse::<ResourceKind>().is_err());
        assert!("banana".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("*analytics*", "https://www.google-analytics.com/ga.js"));
        assert!(wildcard_match("https://*.netlify.app", "https://preview-42.netlify.app"));
        assert!(wildcard_match("HTTP://LOCALHOST:*", "http://localhost:5173"));
        assert!(!wildcard_match("https://*.netlify.app", "https://netlify.app.evil.com"));
        assert!(!wildcard_match("abc", "abcd"));
        assert!(wildcard_match("a*b*c", "a--b--b--c"));
    }

    /// Verifies that an empty policy allows everything and needs no interception.
    #[test]
    fn test_default_policy_allows_all() {
        let policy = ResourcePolicy::default();
        assert!(!policy.is_active());
        assert!(policy.allows(&ResourceRequest {
            url: "https://fonts.gstatic.com/s/roboto.woff2",
            kind: ResourceKind::Font,
        }));
    }

    #[test]
    fn test_policy_denies_kinds_and_urls() {
        let policy = ResourcePolicy::default()
            .deny_kind(ResourceKind::Font)
            .deny_kind(ResourceKind::Font)
            .deny_url("*doubleclick.net*");

        assert!(policy.is_active());
        assert_eq!(policy.denied_kinds(), &[ResourceKind::Font]);
        assert!(!policy.allows(&ResourceRequest {
            url: "https://fonts.gstatic.com/roboto.woff2",
            kind: ResourceKind::Font,
        }));
        assert!(!policy.allows(&ResourceRequest {
            url: "https://ad.doubleclick.net/pixel.gif",
            kind: ResourceKind::Image,
        }));
        assert!(policy.allows(&ResourceRequest {
            url: "https://cdn.example.com/style.css",
            kind: ResourceKind::Stylesheet,
        }));
    }

    /// Verifies that the document and inline data URLs are never blocked.
    #[test]
    fn test_policy_never_blocks_document_or_data_urls() {
        let policy = ResourcePolicy::default()
            .deny_kind(ResourceKind::Document)
            .deny_kind(ResourceKind::Image)
            .deny_url("*");

        assert!(policy.allows(&ResourceRequest {
            url: "https://example.com/",
            kind: ResourceKind::Document,
        }));
        assert!(policy.allows(&ResourceRequest {
            url: "data:image/png;base64,AAAA",
            kind: ResourceKind::Image,
        }));
        assert!(!policy.denied_kinds().contains(&ResourceKind::Document));
    }
}
