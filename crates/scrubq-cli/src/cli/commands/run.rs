//! `scrubq run` – drive the scheduler against a simulated node.

use anyhow::Result;
use scrubq_core::config::{secs, ScrubConfig};
use scrubq_core::driver::{run_tick, TickOutcome};
use scrubq_core::env::{NodeEnv, OsEnv};
use scrubq_core::ScrubQueue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::sim::SimNode;

/// Shortest tick/heartbeat period; tokio intervals reject zero.
const MIN_PERIOD: Duration = Duration::from_millis(10);

fn tick_label(tick: &TickOutcome) -> String {
    match tick {
        TickOutcome::NoSlots => "no_slots".to_string(),
        TickOutcome::ReservationInProgress => "reservation_in_progress".to_string(),
        TickOutcome::Attempted { outcome, .. } => serde_json::to_value(outcome)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| format!("{outcome:?}")),
    }
}

async fn heartbeat(queue: Arc<ScrubQueue>, every: Duration) {
    let mut interval = tokio::time::interval(every.max(MIN_PERIOD));
    loop {
        interval.tick().await;
        match queue.update_daily_average() {
            Some(load_pct) => tracing::trace!(load_pct, "heartbeat"),
            None => tracing::debug!("heartbeat: load averages unavailable"),
        }
    }
}

pub async fn run_simulation(
    cfg: &ScrubConfig,
    shards: u32,
    ticks: u32,
    replica_failure_pct: u8,
) -> Result<()> {
    let env: Arc<dyn NodeEnv> = Arc::new(OsEnv);
    let queue = Arc::new(ScrubQueue::new(0, cfg, env));
    let node = SimNode::new(Arc::clone(&queue), shards, replica_failure_pct);

    // Spread last-scrub stamps so some shards are ripe and some overdue.
    let spread = secs(cfg.min_interval_secs.max(cfg.max_interval_secs) * 1.5);
    node.register_all(spread);
    tracing::info!(shards, ticks, replica_failure_pct, "simulation started");

    let heartbeat_handle = tokio::spawn(heartbeat(
        Arc::clone(&queue),
        Duration::from_secs(u64::from(cfg.heartbeat_interval_secs)),
    ));

    let mut tally: BTreeMap<String, u32> = BTreeMap::new();
    let mut interval = tokio::time::interval(cfg.tick_interval().max(MIN_PERIOD));
    for _ in 0..ticks {
        interval.tick().await;
        node.advance();
        let tick = run_tick(&queue, &node, false);
        tracing::debug!(?tick, "tick");
        *tally.entry(tick_label(&tick)).or_default() += 1;
    }

    heartbeat_handle.abort();

    let stats = node.stats();
    let report = serde_json::json!({
        "ticks": tally,
        "simulation": {
            "started": stats.started,
            "completed": stats.completed,
            "reservation_failures": stats.reservation_failures,
            "running": node.running(),
        },
        "reservations": queue.reservations(),
        "queue": queue.dump_state(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    tracing::info!(
        started = stats.started,
        completed = stats.completed,
        "simulation finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrubq_core::{AttemptOutcome, ScrubPreconds};

    #[test]
    fn tick_labels_use_wire_names() {
        assert_eq!(tick_label(&TickOutcome::NoSlots), "no_slots");
        let tick = TickOutcome::Attempted {
            outcome: AttemptOutcome::LocalResourceShortage,
            preconds: ScrubPreconds::default(),
        };
        assert_eq!(tick_label(&tick), "local_resource_shortage");
    }
}
