mod config;
mod models;
mod providers;
mod tracker;

use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use providers::availability::AvailabilityClient;
use providers::catalog::RouteCatalog;
use providers::feed::LocationFeedClient;
use tracker::session::{run_status_watcher, SessionContext, TrackerSession};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqwest=warn".into()),
        )
        .init();

    // Load config
    let config = Config::load("config.yaml").expect("Failed to load config");
    let tz = config.tz().expect("Invalid timezone in config");
    tracing::info!(bus_id = %config.bus_id, timezone = %config.timezone, "Loaded configuration");

    // Load the static route catalog
    let catalog = RouteCatalog::load(&config.catalog_path).expect("Failed to load route catalog");
    let route = match catalog.route(&config.bus_id) {
        Some(route) if !route.stops.is_empty() => route,
        _ => {
            // Distinct "no route data" state - never a silent spinner.
            tracing::error!(bus_id = %config.bus_id, "No route data for bus, cannot track");
            return;
        }
    };
    tracing::info!(bus_id = %route.bus_id, stops = route.stops.len(), "Loaded route");

    // Check the availability registry before polling anything
    let availability = AvailabilityClient::new(&config.availability_base_url)
        .expect("Failed to build availability client");
    match availability.is_not_available(&config.bus_id).await {
        Ok(true) => {
            tracing::warn!(bus_id = %config.bus_id, "Bus is marked out of service, not tracking");
            return;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::warn!(bus_id = %config.bus_id, error = %e, "Availability check failed, continuing");
        }
    }

    let feed =
        LocationFeedClient::new(&config.feed_base_url).expect("Failed to build feed client");

    // Start the tracking session
    let ctx = SessionContext {
        bus_id: config.bus_id.clone(),
        user_stop: config.user_stop.clone(),
        tz,
    };
    let session = TrackerSession::new(ctx, &route, chrono::Utc::now());
    let mut updates_rx = session.subscribe();
    let handle = session.spawn(feed, Duration::from_secs(config.poll_interval_secs));

    // Lightweight status watcher on its own slower cadence
    let (status_tx, mut status_rx) = broadcast::channel(16);
    let (status_shutdown_tx, status_shutdown_rx) = watch::channel(false);
    let status_feed =
        LocationFeedClient::new(&config.feed_base_url).expect("Failed to build feed client");
    let status_bus_id = config.bus_id.clone();
    let status_period = Duration::from_secs(config.status_interval_secs);
    tokio::spawn(async move {
        run_status_watcher(
            status_feed,
            status_bus_id,
            status_period,
            status_tx,
            status_shutdown_rx,
        )
        .await;
    });

    // Consumer loop: stand-in for the presentation layer, the text-to-speech
    // trigger and the arrival alert.
    loop {
        tokio::select! {
            snapshot = updates_rx.recv() => {
                let snapshot = match snapshot {
                    Ok(snapshot) => snapshot,
                    // Skipped updates are fine - only the latest state matters.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if let Some(stop) = &snapshot.announce_stop {
                    tracing::info!(bus_id = %snapshot.bus_id, stop = %stop, "Next stop is {}", stop);
                }
                if snapshot.arrival_alert {
                    tracing::info!(bus_id = %snapshot.bus_id, "Bus is arriving at your stop");
                }
                tracing::info!(
                    bus_id = %snapshot.bus_id,
                    online = snapshot.is_online,
                    current = snapshot.current_stop_index,
                    confirmed = snapshot.last_confirmed_stop_index,
                    eta = %snapshot.eta_label,
                    countdown = %snapshot.countdown_label,
                    "Tracker update"
                );
            }
            status = status_rx.recv() => {
                if let Ok(status) = status {
                    tracing::debug!(bus_id = %status.bus_id, online = status.is_online, "Status check");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    let _ = status_shutdown_tx.send(true);
    handle.stop().await;
}
