//! E*TRADE order rotator
//!
//! Rotates open equity orders between trading sessions and durations on a
//! wall-clock schedule (good-until-cancel orders become extended-hours day
//! orders in the morning, and back again in the evening), and aggregates
//! transaction history into realized PnL per symbol.
//!
//! The crate is a library: a front end supplies filters and renders the
//! normalized orders and PnL buckets; [`bootstrap`] wires the configured
//! schedule to the rotation service and starts the tick loop.

pub mod brokers;
pub mod config;
pub mod error;
pub mod normalize;
pub mod pnl;
pub mod rotation;
pub mod scheduler;
pub mod services;
pub mod state;

use error::Result;
use scheduler::RotationScheduler;
use services::RotationService;
use state::AppState;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "etrade_rotator=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Arm the scheduler from the configured trigger times and start its tick
/// loop against the rotation service.
///
/// Re-applying a changed schedule later is `scheduler.apply(entries)`; the
/// running loop picks the replacement up on its next tick.
pub fn bootstrap(state: Arc<AppState>) -> Result<Arc<RotationScheduler>> {
    let (tz, entries) = {
        let config = state.config.read();
        (config.schedule.tz()?, config.schedule.entries()?)
    };

    let scheduler = Arc::new(RotationScheduler::new(tz));
    scheduler.apply(entries);

    let task_state = Arc::clone(&state);
    scheduler.start(move |action| {
        let state = Arc::clone(&task_state);
        async move {
            RotationService::run_scheduled(&state, action).await;
        }
    });

    tracing::info!("rotation scheduler started");
    Ok(scheduler)
}
