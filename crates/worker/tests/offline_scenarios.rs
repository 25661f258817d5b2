//! End-to-end worker behavior against a scripted network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use swcache_client::StubNetwork;
use swcache_core::config::PrecachePolicy;
use swcache_core::{
    CacheDb, CacheKey, CacheStore, Destination, Error, MemoryStore, Partition, Request, Response, ResponseType,
    WorkerConfig,
};
use swcache_worker::{FetchEvent, Host, LifecycleHandler, LifecycleState, PreloadUnsupported, ServiceWorker};
use url::Url;

const SCOPE: &str = "https://app.example.com/kefo/";

#[derive(Default)]
struct RecordingHost {
    preload: bool,
    skips: AtomicUsize,
    claims: AtomicUsize,
    preload_enabled: AtomicBool,
}

#[async_trait]
impl Host for RecordingHost {
    async fn skip_waiting(&self) {
        self.skips.fetch_add(1, Ordering::SeqCst);
    }

    async fn claim_clients(&self) {
        self.claims.fetch_add(1, Ordering::SeqCst);
    }

    async fn enable_navigation_preload(&self) -> Result<(), PreloadUnsupported> {
        if self.preload {
            self.preload_enabled.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(PreloadUnsupported)
        }
    }
}

fn config(generation: &str) -> WorkerConfig {
    WorkerConfig {
        scope: SCOPE.into(),
        prefix: "kefo".into(),
        generation: generation.into(),
        app_name: "KeFo".into(),
        ..Default::default()
    }
}

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn get(s: &str) -> FetchEvent {
    FetchEvent::new(Request::get(url(s)))
}

/// A network that serves the whole shell.
fn shell_network() -> StubNetwork {
    let network = StubNetwork::new();
    for (path, body) in [
        ("", "root"),
        ("index.html", "index"),
        ("manifest.webmanifest", "{}"),
        ("icons/icon-192.png", "png192"),
        ("icons/icon-512.png", "png512"),
    ] {
        network.route(&format!("{SCOPE}{path}"), Response::new(200, body));
    }
    network
}

struct Harness {
    store: MemoryStore,
    network: StubNetwork,
    host: Arc<RecordingHost>,
    worker: ServiceWorker,
}

async fn activated(config: WorkerConfig) -> Harness {
    let store = MemoryStore::new();
    let network = shell_network();
    let host = Arc::new(RecordingHost::default());
    let worker = ServiceWorker::new(config, Arc::new(store.clone()), Arc::new(network.clone()), host.clone()).unwrap();
    worker.on_install().await.unwrap();
    worker.on_activate().await.unwrap();
    Harness { store, network, host, worker }
}

#[tokio::test]
async fn install_precaches_shell_and_skips_waiting() {
    let h = activated(config("v32")).await;

    assert_eq!(h.store.len("kefo-shell-v32").await, 5);
    assert_eq!(h.host.skips.load(Ordering::SeqCst), 1);
    assert_eq!(h.host.claims.load(Ordering::SeqCst), 1);
    assert_eq!(h.worker.state(), LifecycleState::Activated);
}

#[tokio::test]
async fn always_online_bypasses_cache() {
    let h = activated(config("v32")).await;
    let before = h.store.stats();
    let target = "https://firestore.googleapis.com/v1/projects/kefo/documents/posts";
    h.network.route(target, Response::new(200, "[]"));

    let resp = h.worker.on_fetch(get(target)).await.unwrap();
    assert_eq!(resp.body, "[]");

    h.network.set_online(false);
    let resp = h.worker.on_fetch(get(target)).await.unwrap();
    assert_eq!(resp.status, 504);
    assert_eq!(resp.status_text, "Offline");

    h.worker.settle().await;
    let after = h.store.stats();
    assert_eq!(after.lookups, before.lookups);
    assert_eq!(after.writes, before.writes);
}

#[tokio::test]
async fn offline_navigation_serves_cached_shell() {
    let h = activated(config("v32")).await;
    h.network.set_online(false);

    let event = FetchEvent::new(Request::navigate(url(&format!("{SCOPE}feed?tab=2"))));
    let resp = h.worker.on_fetch(event).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "index");
}

#[tokio::test]
async fn offline_navigation_without_shell_renders_offline_page() {
    let h = activated(config("v32")).await;
    h.store.delete_partition("kefo-shell-v32").await.unwrap();
    h.network.set_online(false);

    let event = FetchEvent::new(Request::navigate(url(SCOPE)));
    let resp = h.worker.on_fetch(event).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type(), Some("text/html; charset=UTF-8"));
    assert!(String::from_utf8_lossy(&resp.body).contains("KeFo"));
}

#[tokio::test]
async fn online_navigation_refreshes_shell_document() {
    let h = activated(config("v32")).await;
    h.network.route(&format!("{SCOPE}about"), Response::new(200, "fresh"));

    let event = FetchEvent::new(Request::navigate(url(&format!("{SCOPE}about"))));
    assert_eq!(h.worker.on_fetch(event).await.unwrap().body, "fresh");

    let shell = Partition::new("kefo-shell-v32");
    let key = CacheKey::new("GET", url(&format!("{SCOPE}index.html")));
    let cached = h.store.lookup(&shell, &key, Default::default()).await.unwrap().unwrap();
    assert_eq!(cached.response.body, "fresh");
}

#[tokio::test]
async fn offline_root_navigation_serves_refreshed_shell() {
    let h = activated(config("v32")).await;
    h.network.route(SCOPE, Response::new(200, "shell-v2"));

    let online = h.worker.on_fetch(FetchEvent::new(Request::navigate(url(SCOPE)))).await.unwrap();
    assert_eq!(online.body, "shell-v2");

    h.network.set_online(false);
    let offline = h.worker.on_fetch(FetchEvent::new(Request::navigate(url(SCOPE)))).await.unwrap();
    assert_eq!(offline.body, "shell-v2");
}

#[tokio::test]
async fn cache_first_media_fetches_once() {
    let h = activated(config("v32")).await;
    let image = "https://cdn.example.net/posts/cover.webp";
    h.network.route(image, Response::new(200, "webp"));

    let first = h.worker.on_fetch(get(image)).await.unwrap();
    let second = h.worker.on_fetch(get(image)).await.unwrap();
    assert_eq!(first.body, second.body);
    assert_eq!(h.network.calls_to(image), 1);

    h.network.set_online(false);
    let third = h.worker.on_fetch(get(&format!("{image}?w=640"))).await.unwrap();
    assert_eq!(third.body, "webp");
}

#[tokio::test]
async fn media_partition_is_bounded() {
    let h = activated(config("v32")).await;
    h.network.fallback(Response::new(200, "jpg"));

    for n in 0..61 {
        h.worker.on_fetch(get(&format!("{SCOPE}photo-{n}.jpg"))).await.unwrap();
        h.worker.settle().await;
    }

    assert_eq!(h.store.len("kefo-media-v32").await, 60);
    let keys = h.store.keys(&Partition::new("kefo-media-v32")).await.unwrap();
    assert_eq!(keys[0].url().as_str(), format!("{SCOPE}photo-1.jpg"));
}

#[tokio::test]
async fn media_bound_converges_after_burst() {
    let h = activated(config("v32")).await;
    h.network.fallback(Response::new(200, "jpg"));

    for n in 0..90 {
        h.worker.on_fetch(get(&format!("{SCOPE}burst-{n}.jpg"))).await.unwrap();
    }
    h.worker.settle().await;

    let media = Partition::new("kefo-media-v32");
    let keys = h.store.keys(&media).await.unwrap();
    assert!(!keys.is_empty());
    assert!(keys.len() <= 60, "media partition holds {} entries", keys.len());
    assert_eq!(keys.last().unwrap().url().as_str(), format!("{SCOPE}burst-89.jpg"));
}

#[tokio::test]
async fn opaque_images_are_cached_by_destination() {
    let h = activated(config("v32")).await;
    let avatar = "https://avatars.example.org/u/42";
    h.network.route(avatar, Response::new(0, "").with_type(ResponseType::Opaque));

    let request = Request::get(url(avatar)).with_destination(Destination::Image);
    h.worker.on_fetch(FetchEvent::new(request.clone())).await.unwrap();
    h.worker.on_fetch(FetchEvent::new(request)).await.unwrap();
    assert_eq!(h.network.calls_to(avatar), 1);
}

#[tokio::test]
async fn fonts_served_from_cache_offline() {
    let h = activated(config("v32")).await;
    let css = "https://fonts.googleapis.com/css2?family=Cairo";
    h.network.route(css, Response::new(200, "@font-face{}"));

    h.worker.on_fetch(get(css)).await.unwrap();
    h.worker.settle().await;

    h.network.set_online(false);
    let resp = h.worker.on_fetch(get(css)).await.unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "@font-face{}");
}

#[tokio::test]
async fn same_origin_assets_revalidate_in_background() {
    let h = activated(config("v32")).await;
    let script = format!("{SCOPE}app.js");
    h.network.route(&script, Response::new(200, "v1"));
    h.worker.on_fetch(get(&script)).await.unwrap();
    h.worker.settle().await;

    h.network.route(&script, Response::new(200, "v2"));
    let resp = h.worker.on_fetch(get(&script)).await.unwrap();
    assert_eq!(resp.body, "v1");

    h.worker.settle().await;
    let resp = h.worker.on_fetch(get(&script)).await.unwrap();
    assert_eq!(resp.body, "v2");
}

#[tokio::test]
async fn external_requests_fall_back_to_runtime_cache() {
    let h = activated(config("v32")).await;
    let api = "https://api.example.org/feed.json";
    h.network.route(api, Response::new(200, "[1,2]"));

    h.worker.on_fetch(get(api)).await.unwrap();
    h.network.set_online(false);
    assert_eq!(h.worker.on_fetch(get(api)).await.unwrap().body, "[1,2]");

    let uncached = h.worker.on_fetch(get("https://api.example.org/other.json")).await.unwrap();
    assert_eq!(uncached.status, 504);
}

#[tokio::test]
async fn non_get_requests_are_not_intercepted() {
    let h = activated(config("v32")).await;
    let event = FetchEvent::new(Request::new("POST", url(&format!("{SCOPE}api/posts"))));
    assert_eq!(h.worker.on_fetch(event).await, None);
}

#[tokio::test]
async fn activation_purges_previous_generation() {
    let store = MemoryStore::new();
    let network = shell_network();
    network.fallback(Response::new(200, "img"));

    let old = ServiceWorker::new(
        config("v31"),
        Arc::new(store.clone()),
        Arc::new(network.clone()),
        Arc::new(RecordingHost::default()),
    )
    .unwrap();
    old.on_install().await.unwrap();
    old.on_activate().await.unwrap();
    old.on_fetch(get("https://cdn.example.net/a.png")).await.unwrap();
    old.settle().await;
    store.open("orphan-cache").await.unwrap();

    let new = ServiceWorker::new(
        config("v32"),
        Arc::new(store.clone()),
        Arc::new(network.clone()),
        Arc::new(RecordingHost::default()),
    )
    .unwrap();
    new.on_install().await.unwrap();
    let report = new.on_activate().await.unwrap();

    assert!(report.deleted.contains(&"kefo-shell-v31".to_string()));
    assert!(report.deleted.contains(&"kefo-media-v31".to_string()));
    assert!(report.deleted.contains(&"orphan-cache".to_string()));
    for name in store.partition_names().await.unwrap() {
        assert!(name.ends_with("-v32"), "{name} survived activation");
    }
}

#[tokio::test]
async fn strict_install_fails_on_missing_asset() {
    let store = MemoryStore::new();
    let network = shell_network();
    network.route(&format!("{SCOPE}icons/icon-512.png"), Response::new(404, ""));
    let host = Arc::new(RecordingHost::default());
    let config = WorkerConfig { precache_policy: PrecachePolicy::Strict, ..config("v32") };
    let worker = ServiceWorker::new(config, Arc::new(store.clone()), Arc::new(network), host.clone()).unwrap();

    let err = worker.on_install().await.unwrap_err();
    assert!(matches!(err, Error::PrecacheFailed(_)));
    assert_eq!(worker.state(), LifecycleState::Redundant);
    assert_eq!(host.skips.load(Ordering::SeqCst), 0);
    assert_eq!(store.len("kefo-shell-v32").await, 0);
    assert!(worker.on_fetch(get(&format!("{SCOPE}app.js"))).await.is_none());
}

#[tokio::test]
async fn tolerant_install_keeps_partial_shell() {
    let store = MemoryStore::new();
    let network = shell_network();
    network.route(&format!("{SCOPE}icons/icon-512.png"), Response::new(404, ""));
    let worker = ServiceWorker::new(
        config("v32"),
        Arc::new(store.clone()),
        Arc::new(network),
        Arc::new(RecordingHost::default()),
    )
    .unwrap();

    let report = worker.on_install().await.unwrap();
    assert_eq!(report.stored.len(), 4);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(store.len("kefo-shell-v32").await, 4);
    assert_eq!(worker.state(), LifecycleState::Installed);
}

#[tokio::test]
async fn preload_enabled_when_host_supports_it() {
    let host = Arc::new(RecordingHost { preload: true, ..Default::default() });
    let worker = ServiceWorker::new(
        config("v32"),
        Arc::new(MemoryStore::new()),
        Arc::new(shell_network()),
        host.clone(),
    )
    .unwrap();
    worker.on_install().await.unwrap();

    let report = worker.on_activate().await.unwrap();
    assert!(report.preload_enabled);
    assert!(host.preload_enabled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn skip_waiting_message_reaches_host() {
    let h = activated(config("v32")).await;
    assert!(h.worker.on_message("SKIP_WAITING").await);
    assert_eq!(h.host.skips.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn sqlite_store_backs_full_flow() {
    let db = Arc::new(CacheDb::open_in_memory().await.unwrap());
    let network = shell_network();
    network.fallback(Response::new(200, "jpg"));
    let config = WorkerConfig { media_ceiling: 3, ..config("v32") };
    let worker = ServiceWorker::new(config, db.clone(), Arc::new(network.clone()), Arc::new(RecordingHost::default()))
        .unwrap();
    worker.on_install().await.unwrap();
    worker.on_activate().await.unwrap();

    for n in 0..5 {
        worker.on_fetch(get(&format!("https://cdn.example.net/{n}.png"))).await.unwrap();
        worker.settle().await;
    }
    let media = Partition::new("kefo-media-v32");
    let keys = db.keys(&media).await.unwrap();
    assert_eq!(keys.len(), 3);
    assert_eq!(keys[0].url().as_str(), "https://cdn.example.net/2.png");

    network.set_online(false);
    let event = FetchEvent::new(Request::navigate(url(SCOPE)));
    assert_eq!(worker.on_fetch(event).await.unwrap().body, "index");
}
