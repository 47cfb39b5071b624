//! Per-node health probing.
//!
//! One prober task runs per configured node. Every interval it performs a
//! single `GET /health` against the node and tracks a `down` flag; the node
//! is sent on the shared events channel only when that flag flips. The
//! emission is the edge, not the level - the reconciler uses current ring
//! membership to decide direction. A failed probe is never retried within
//! a tick; the next tick picks it up.
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{event, Level};

use super::ring::Node;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe cadence and per-probe timeout.
#[derive(Debug, Clone, Copy)]
pub struct ProbeConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_PROBE_INTERVAL,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Probes `node` forever, emitting it on `events` at every up/down edge.
/// Returns when the receiving end of `events` is gone.
pub async fn start_prober(node: Node, config: ProbeConfig, events: mpsc::Sender<Node>) {
    let client = match reqwest::Client::builder().timeout(config.timeout).build() {
        Ok(client) => client,
        Err(err) => {
            event!(Level::ERROR, "unable to build probe client: {}", err);
            return;
        }
    };

    let url = format!("http://{}/health", node);
    let mut down = false;

    // fire the first probe one full interval from now, not immediately
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let healthy = match client.get(&url).send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        };

        let edge = if healthy { down } else { !down };
        if !edge {
            continue;
        }

        down = !healthy;
        if down {
            event!(Level::WARN, "node[{}] - down (removing from cluster)", node);
        } else {
            event!(Level::INFO, "node[{}] - up (adding to cluster)", node);
        }

        if events.send(node.clone()).await.is_err() {
            // reconciler is gone; no one left to tell
            return;
        }
    }
}
