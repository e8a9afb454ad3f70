//! `scrubq gate` – evaluate the clock and load gates for this host, now.

use anyhow::Result;
use scrubq_core::config::ScrubConfig;
use scrubq_core::env::{NodeEnv, OsEnv};
use scrubq_core::gate::ClockLoadGate;
use std::sync::Arc;

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

pub fn run_gate(cfg: &ScrubConfig) -> Result<()> {
    let env: Arc<dyn NodeEnv> = Arc::new(OsEnv);
    let gate = ClockLoadGate::new(cfg, Arc::clone(&env));
    let now = env.now();

    let loads = env
        .load_averages()
        .map(|[l1, l5, l15]| format!("{l1:.2} {l5:.2} {l15:.2}"))
        .unwrap_or_else(|| "-".to_string());

    println!("{:<16} {}", "time permit:", yes_no(gate.time_permit(now)));
    println!("{:<16} {}", "load permit:", yes_no(gate.load_below_threshold()));
    println!("{:<16} {}", "load averages:", loads);
    println!("{:<16} {}", "cpus:", env.cpu_count());
    println!("{:<16} {:.2}", "daily load:", gate.daily_load_average());
    println!("{:<16} {:?}", "sleep interval:", gate.sleep_interval(false));
    Ok(())
}
