//! Scripted in-memory network.
//!
//! Serves canned responses by exact URL, can be switched offline, and
//! records every attempt so tests can assert on network traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use swcache_core::{Request, Response};

use super::{Network, NetworkError};

#[derive(Debug)]
struct StubState {
    online: bool,
    routes: HashMap<String, Response>,
    fallback: Option<Response>,
    calls: Vec<String>,
}

/// A `Network` that answers from a routing table.
#[derive(Debug, Clone)]
pub struct StubNetwork {
    state: Arc<Mutex<StubState>>,
}

impl Default for StubNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl StubNetwork {
    /// An online stub with no routes; unknown URLs answer 404.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StubState {
                online: true,
                routes: HashMap::new(),
                fallback: None,
                calls: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer requests for `url` with `response`.
    pub fn route(&self, url: &str, response: Response) -> &Self {
        self.state().routes.insert(url.to_string(), response);
        self
    }

    /// Answer every unrouted URL with `response` instead of 404.
    pub fn fallback(&self, response: Response) -> &Self {
        self.state().fallback = Some(response);
        self
    }

    /// Toggle connectivity. Offline attempts fail with `Unreachable`.
    pub fn set_online(&self, online: bool) {
        self.state().online = online;
    }

    /// Total attempts, including failed ones.
    pub fn calls(&self) -> usize {
        self.state().calls.len()
    }

    /// Attempts made for one URL.
    pub fn calls_to(&self, url: &str) -> usize {
        self.state().calls.iter().filter(|u| u.as_str() == url).count()
    }
}

#[async_trait]
impl Network for StubNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let mut state = self.state();
        let url = request.url.as_str().to_string();
        state.calls.push(url.clone());

        if !state.online {
            return Err(NetworkError::Unreachable(format!("offline: {url}")));
        }

        let response = state
            .routes
            .get(&url)
            .or(state.fallback.as_ref())
            .cloned()
            .unwrap_or_else(|| Response::new(404, "").with_status_text("Not Found"));

        Ok(response.with_url(request.url.clone()))
    }
}
