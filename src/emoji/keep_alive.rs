//! Keep-alive pinger.
//!
//! The serverless inference backend evicts its warm model after a few
//! minutes without traffic, which turns the next user message into a
//! multi-second cold start. This loop sends a disposable query whenever the
//! client has been idle for a full interval. Latency hiding only; replies
//! stay correct without it.

use rand::distr::{Alphanumeric, SampleString};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::emoji::client::{EmojiClient, KEEP_ALIVE_MARKER};

/// Run the keep-alive loop for the process lifetime. Spawned once from
/// `main`.
pub async fn run(client: Arc<EmojiClient>, interval: Duration) {
    ping(&client).await;

    loop {
        let idle = client.idle_for().await;
        if idle < interval {
            sleep(interval - idle).await;
            continue;
        }

        ping(&client).await;
        client.touch().await;
    }
}

async fn ping(client: &EmojiClient) {
    // Random suffix so neither our LRU nor the provider-side cache answers
    // without touching the model.
    let suffix = Alphanumeric.sample_string(&mut rand::rng(), 3);
    let input = format!("{KEEP_ALIVE_MARKER}{suffix}");

    match client.query(&input).await {
        Ok(_) => debug!("keep-alive ping ok"),
        Err(e) => warn!("keep-alive ping failed: {e}"),
    }

    // The ping result is useless to real traffic; drop it immediately.
    client.invalidate(&input).await;
}
