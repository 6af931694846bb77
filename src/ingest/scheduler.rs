// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::HotspotEngine;

/// Spawn the periodic scoring driver.
///
/// The first tick runs immediately. Shutdown (`true` on `shutdown`, or the
/// sender being dropped) is only observed between ticks; a running tick
/// always completes.
pub fn spawn_scheduler(
    engine: Arc<HotspotEngine>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(target: "ingest", every_secs = interval.as_secs(), "scheduler started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }
            // errors are already logged and counted by the engine
            let _ = engine.update_scores(false).await;
        }
        tracing::info!(target: "ingest", ticks = engine.ticks(), "scheduler stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Sources;
    use crate::ingest::fetcher::FetchError;
    use crate::ingest::types::{Connector, TrendReading};
    use async_trait::async_trait;

    struct Quiet;

    #[async_trait]
    impl Connector<TrendReading> for Quiet {
        fn name(&self) -> &'static str {
            "quiet"
        }
        async fn fetch_all(&self, _force: bool) -> Result<Arc<Vec<TrendReading>>, FetchError> {
            Ok(Arc::new(Vec::new()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_shutdown() {
        let engine = Arc::new(HotspotEngine::new(Sources {
            trends: Some(Arc::new(Quiet)),
            ..Sources::default()
        }));
        let (tx, rx) = watch::channel(false);
        let handle = spawn_scheduler(engine.clone(), Duration::from_secs(30), rx);

        // immediate tick + two more
        tokio::time::sleep(Duration::from_secs(61)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(engine.ticks(), 3);
        assert_eq!(engine.get_history(100).len(), 3);
    }
}
