//! Install-time precache and activate-time generation cleanup.

use std::collections::BTreeSet;

use futures_util::future::join_all;
use swcache_client::Network;
use swcache_core::config::PrecachePolicy;
use swcache_core::{CacheKey, CacheStore, Error, Partition, Request};
use url::Url;

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed; install has not run.
    #[default]
    Parsed,
    Installing,
    /// Precache finished; waiting to activate.
    Installed,
    Activating,
    /// Intercepting requests.
    Activated,
    /// Install failed. The worker never intercepts.
    Redundant,
}

impl LifecycleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }
}

/// Outcome of populating the shell partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheReport {
    pub stored: Vec<Url>,
    /// Assets that could not be fetched, with the reason.
    pub failed: Vec<(Url, String)>,
}

/// Outcome of activation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
    pub preload_enabled: bool,
}

/// Fetch every asset and store the successful ones in `partition`.
///
/// All fetches run concurrently. Under [`PrecachePolicy::Strict`] a single
/// failure (transport error or non-2xx status) aborts before anything is
/// written. Under [`PrecachePolicy::Tolerant`] failures are logged and the
/// rest is stored.
///
/// # Errors
///
/// `Error::PrecacheFailed` under the strict policy, or any store error.
pub async fn precache(
    store: &dyn CacheStore, network: &dyn Network, partition: &Partition, assets: &[Url], policy: PrecachePolicy,
) -> Result<PrecacheReport, Error> {
    let fetches = assets.iter().map(|url| async move {
        let request = Request::get(url.clone());
        let outcome = match network.fetch(&request).await {
            Ok(response) if response.ok() => Ok(response),
            Ok(response) => Err(format!("status {}", response.status)),
            Err(err) => Err(err.to_string()),
        };
        (url, outcome)
    });

    let mut fetched = Vec::with_capacity(assets.len());
    let mut report = PrecacheReport::default();
    for (url, outcome) in join_all(fetches).await {
        match outcome {
            Ok(response) => fetched.push((url, response)),
            Err(reason) => {
                tracing::warn!(url = %url, reason = %reason, "precache asset failed");
                report.failed.push((url.clone(), reason));
            }
        }
    }

    if policy == PrecachePolicy::Strict && !report.failed.is_empty() {
        let reasons: Vec<String> = report.failed.iter().map(|(url, reason)| format!("{url}: {reason}")).collect();
        return Err(Error::PrecacheFailed(reasons.join("; ")));
    }

    for (url, response) in fetched {
        store.put(partition, &CacheKey::new("GET", url.clone()), &response).await?;
        report.stored.push(url.clone());
    }

    tracing::info!(
        partition = partition.name(),
        stored = report.stored.len(),
        failed = report.failed.len(),
        "precache complete"
    );
    Ok(report)
}

/// Delete every partition whose name is not in `keep`.
///
/// Returns `(deleted, kept)` in enumeration order.
pub async fn purge_stale_partitions(
    store: &dyn CacheStore, keep: &BTreeSet<String>,
) -> Result<(Vec<String>, Vec<String>), Error> {
    let mut deleted = Vec::new();
    let mut kept = Vec::new();

    for name in store.partition_names().await? {
        if keep.contains(&name) {
            kept.push(name);
        } else if store.delete_partition(&name).await? {
            tracing::info!(partition = %name, "deleted stale partition");
            deleted.push(name);
        }
    }

    Ok((deleted, kept))
}
