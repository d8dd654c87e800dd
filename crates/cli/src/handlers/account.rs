//! `dashboard`, `leaderboard` and `workers`.

use anyhow::Result;
use horde_core::leaderboard::{LeaderboardKey, RankedUser, SortDirection};
use horde_pipeline::dashboard::DashboardState;
use horde_pipeline::events::HordeEvent;
use horde_pipeline::workers::{WorkerFilter, WorkerSort};
use tokio::sync::broadcast::error::RecvError;

use crate::context::{cancel_on_ctrl_c, AppContext};
use crate::presentation::{print_separator, truncate_string};

pub async fn dashboard(ctx: &AppContext, watch: bool) -> Result<()> {
    let dashboard = ctx.dashboard();
    if !watch {
        // Partial results are still worth showing; failures were reported.
        let _ = dashboard.refresh_fast().await;
        print_dashboard(&dashboard.snapshot().await);
        return Ok(());
    }

    let cancel = cancel_on_ctrl_c();
    let mut events = ctx.events.subscribe();
    let printer = async {
        loop {
            match events.recv().await {
                Ok(HordeEvent::DashboardUpdated) => print_dashboard(&dashboard.snapshot().await),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    };
    tokio::select! {
        _ = dashboard.run(cancel.clone()) => {}
        _ = printer => {}
    }
    Ok(())
}

pub async fn leaderboard(ctx: &AppContext, key: Option<&str>, ascending: bool) -> Result<()> {
    let key = match key {
        Some(k) => k.parse::<LeaderboardKey>()?,
        None => ctx.settings.leaderboard_key,
    };
    let direction = if ascending {
        SortDirection::Ascending
    } else {
        SortDirection::Descending
    };

    let dashboard = ctx.dashboard();
    // Without the current user there is simply no own rank.
    let _ = dashboard.refresh_fast().await;
    dashboard.refresh_slow().await?;
    dashboard.set_leaderboard_order(key, direction).await;
    let state = dashboard.snapshot().await;

    println!("{:<5} {:<30} {:>14} {:>16}", "Rank", "User", "Kudos", "Megapixelsteps");
    print_separator(68);
    for entry in &state.leaderboard.top {
        print_ranked(entry);
    }
    if let Some(own) = &state.leaderboard.own {
        println!("...");
        print_ranked(own);
    }
    Ok(())
}

pub async fn workers(ctx: &AppContext, filter: WorkerFilter, sort: &str, watch: bool) -> Result<()> {
    let sort: WorkerSort = sort.parse()?;
    let monitor = ctx.workers();

    if !watch {
        monitor.refresh().await?;
        print_workers(&monitor.view(&filter, sort).await);
        return Ok(());
    }

    let cancel = cancel_on_ctrl_c();
    let mut events = ctx.events.subscribe();
    let printer = async {
        loop {
            match events.recv().await {
                Ok(HordeEvent::WorkersUpdated { .. }) => {
                    print_workers(&monitor.view(&filter, sort).await);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    };
    tokio::select! {
        _ = monitor.run(cancel.clone()) => {}
        _ = printer => {}
    }
    Ok(())
}

// ---- presentation ----

fn print_dashboard(state: &DashboardState) {
    if let Some(user) = &state.user {
        println!("{} ({} kudos, {} workers)", user.username, user.kudos, user.worker_count);
        println!(
            "  requested {:.0} megapixelsteps, generated {:.0}",
            user.usage.megapixelsteps, user.contributions.megapixelsteps
        );
    }
    if let Some(perf) = &state.performance {
        println!(
            "Horde: {} queued requests, {} workers, {:.0} mps in the last minute",
            perf.queued_requests, perf.worker_count, perf.past_minute_megapixelsteps
        );
    }
    for item in state.news.iter().take(3) {
        println!("[{}] {}", item.date_published, truncate_string(&item.newspiece, 90));
    }
}

fn print_ranked(entry: &RankedUser) {
    println!(
        "{:<5} {:<30} {:>14.0} {:>16.0}",
        entry.rank,
        truncate_string(&entry.user.username, 30),
        entry.user.kudos,
        entry.user.megapixelsteps
    );
}

fn print_workers(workers: &[horde_client::messages::WorkerDetails]) {
    println!(
        "{:<28} {:<7} {:<7} {:>10} {:>10} Models",
        "Name", "Online", "Trusted", "Uptime(h)", "Requests"
    );
    print_separator(90);
    for worker in workers {
        println!(
            "{:<28} {:<7} {:<7} {:>10} {:>10} {}",
            truncate_string(&worker.name, 28),
            worker.online,
            worker.trusted,
            worker.uptime / 3600,
            worker.requests_fulfilled,
            truncate_string(&worker.models.join(", "), 30),
        );
    }
    println!("{} worker(s)", workers.len());
}
