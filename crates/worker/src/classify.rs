//! Request classification.
//!
//! `RoutingRules::classify` is a pure function from a request to the route
//! that handles it. Rules are evaluated in order and the first match wins:
//!
//! 1. non-GET requests are not intercepted
//! 2. always-online endpoints go to the network only
//! 3. navigations use the app shell
//! 4. web fonts
//! 5. images and external media
//! 6. other same-origin assets
//! 7. everything else

use regex::{Regex, RegexSet};
use swcache_core::config::FontStrategy;
use swcache_core::{CacheRole, Destination, Error, Request, RequestMode, WorkerConfig};
use swcache_client::fetch::url::same_origin;
use url::Url;

/// Request category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    AlwaysOnline,
    Navigation,
    Font,
    Media,
    SameOrigin,
    External,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AlwaysOnline => "always-online",
            Self::Navigation => "navigation",
            Self::Font => "font",
            Self::Media => "media",
            Self::SameOrigin => "same-origin",
            Self::External => "external",
        }
    }
}

/// Caching strategy applied to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    NetworkOnly,
    NetworkFirst,
    CacheFirst,
    StaleWhileRevalidate,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NetworkOnly => "network-only",
            Self::NetworkFirst => "network-first",
            Self::CacheFirst => "cache-first",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

/// Outcome of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub route: Route,
    pub strategy: StrategyKind,
    /// Target partition; `None` for network-only routes.
    pub role: Option<CacheRole>,
}

/// Compiled routing rules.
#[derive(Debug, Clone)]
pub struct RoutingRules {
    scope: Url,
    always_online: RegexSet,
    font_hosts: RegexSet,
    media_hosts: RegexSet,
    image_path: Option<Regex>,
    font_strategy: FontStrategy,
    same_origin_role: CacheRole,
}

fn compile_set(field: &str, patterns: &[String]) -> Result<RegexSet, Error> {
    RegexSet::new(patterns).map_err(|e| Error::Config(format!("{field}: {e}")))
}

impl RoutingRules {
    /// Compile rules for requests under `scope`.
    pub fn new(config: &WorkerConfig, scope: &Url) -> Result<Self, Error> {
        let image_path = if config.image_extensions.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = config.image_extensions.iter().map(|ext| regex::escape(ext)).collect();
            let pattern = format!(r"(?i)\.({})$", alternatives.join("|"));
            Some(Regex::new(&pattern).map_err(|e| Error::Config(format!("image_extensions: {e}")))?)
        };

        Ok(Self {
            scope: scope.clone(),
            always_online: compile_set("always_online", &config.always_online)?,
            font_hosts: compile_set("font_hosts", &config.font_hosts)?,
            media_hosts: compile_set("media_hosts", &config.media_hosts)?,
            image_path,
            font_strategy: config.font_strategy,
            same_origin_role: config.same_origin_partition,
        })
    }

    /// Pick the route for `request`, or `None` to leave it to the host.
    pub fn classify(&self, request: &Request) -> Option<Decision> {
        if !request.is_get() {
            return None;
        }

        let url = &request.url;
        let host = url.host_str().unwrap_or_default();

        let decision = if self.always_online.is_match(url.as_str()) {
            Decision { route: Route::AlwaysOnline, strategy: StrategyKind::NetworkOnly, role: None }
        } else if request.mode == RequestMode::Navigate || request.accepts_html() {
            Decision { route: Route::Navigation, strategy: StrategyKind::NetworkFirst, role: Some(CacheRole::Shell) }
        } else if self.font_hosts.is_match(host) {
            let strategy = match self.font_strategy {
                FontStrategy::StaleWhileRevalidate => StrategyKind::StaleWhileRevalidate,
                FontStrategy::CacheFirst => StrategyKind::CacheFirst,
            };
            Decision { route: Route::Font, strategy, role: Some(CacheRole::Fonts) }
        } else if self.is_media(request, host) {
            Decision { route: Route::Media, strategy: StrategyKind::CacheFirst, role: Some(CacheRole::Media) }
        } else if same_origin(url, &self.scope) {
            Decision {
                route: Route::SameOrigin,
                strategy: StrategyKind::StaleWhileRevalidate,
                role: Some(self.same_origin_role),
            }
        } else {
            Decision { route: Route::External, strategy: StrategyKind::NetworkFirst, role: Some(CacheRole::Runtime) }
        };

        Some(decision)
    }

    fn is_media(&self, request: &Request, host: &str) -> bool {
        request.destination == Destination::Image
            || self.image_path.as_ref().is_some_and(|re| re.is_match(request.url.path()))
            || self.media_hosts.is_match(host)
    }
}
