use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::models::{
    BusStatus, LocationFix, Route, SessionPhase, Stop, TrackerSnapshot, TrackerState,
};
use crate::providers::feed::{FeedError, LocationFeedClient};
use crate::tracker::eta::{estimate, Eta};
use crate::tracker::geo::distance_meters;
use crate::tracker::matcher::{is_authoritative_online, match_stop};
use crate::tracker::orientation::{active_stops, is_return_schedule};

/// Radius around the user's stop that fires the one-shot arrival alert.
pub const ARRIVAL_ALERT_RADIUS_METERS: f64 = 100.0;

/// Everything a session needs from the outside world, passed in explicitly
/// at construction instead of read from ambient globals.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub bus_id: String,
    /// Stop name the arrival alert is raised for, if the user picked one.
    pub user_stop: Option<String>,
    /// Timezone the schedule cutover is evaluated in.
    pub tz: Tz,
}

/// Tracking session for one bus: owns the `TrackerState`, runs the
/// fix -> orientation -> match -> ETA pipeline on every tick, and broadcasts
/// snapshots to consumers. Exclusively mutated by its own polling loop.
pub struct TrackerSession {
    ctx: SessionContext,
    /// Canonical (outbound) ordering as loaded from the catalog.
    canonical_stops: Vec<Stop>,
    /// Derived ordering for the current schedule direction.
    active: Vec<Stop>,
    return_schedule: bool,
    phase: SessionPhase,
    state: TrackerState,
    updates_tx: broadcast::Sender<TrackerSnapshot>,
}

impl TrackerSession {
    pub fn new(ctx: SessionContext, route: &Route, started_at: DateTime<Utc>) -> Self {
        let return_schedule = is_return_schedule(started_at.with_timezone(&ctx.tz).time());
        let active = active_stops(&route.stops, return_schedule);

        // Capacity 16 - consumers only care about the latest state anyway
        let (updates_tx, _) = broadcast::channel(16);

        Self {
            ctx,
            canonical_stops: route.stops.clone(),
            active,
            return_schedule,
            phase: SessionPhase::Loading,
            state: TrackerState::default(),
            updates_tx,
        }
    }

    /// Subscribe to per-tick snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerSnapshot> {
        self.updates_tx.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Stops in the currently active ordering, with derived fields.
    pub fn active_stops(&self) -> &[Stop] {
        &self.active
    }

    /// Apply one poll result to the session.
    ///
    /// A fetch failure is itself meaningful state: the session degrades to
    /// the offline substate and keeps polling, it never crashes or stalls.
    pub fn process_tick(
        &mut self,
        fetched: Result<Option<LocationFix>, FeedError>,
        now: DateTime<Utc>,
    ) -> TrackerSnapshot {
        // Cutover check first: index semantics change when the ordering
        // flips, so confirmed progress from the old direction is meaningless.
        let return_now = is_return_schedule(now.with_timezone(&self.ctx.tz).time());
        if return_now != self.return_schedule {
            info!(
                bus_id = %self.ctx.bus_id,
                return_schedule = return_now,
                "Schedule cutover crossed, resetting confirmed progress"
            );
            self.return_schedule = return_now;
            self.active = active_stops(&self.canonical_stops, return_now);
            self.state.last_confirmed_stop_index = -1;
            self.state.notified = false;
        }

        let fix = match fetched {
            Ok(fix) => fix,
            Err(e) => {
                warn!(
                    bus_id = %self.ctx.bus_id,
                    error = %e,
                    "Failed to fetch location fix, treating as offline"
                );
                None
            }
        };

        let now_epoch = now.timestamp() as f64;
        let authoritative = fix
            .as_ref()
            .map_or(false, |f| is_authoritative_online(f, now_epoch));
        let usable = if authoritative { fix.as_ref() } else { None };

        let prev_current = self.state.current_stop_index;
        let outcome = match_stop(usable, &self.active, self.state.last_confirmed_stop_index);
        self.state.current_stop_index = outcome.current_index;
        self.state.last_confirmed_stop_index = outcome.confirmed_index;
        self.state.is_online = authoritative;

        let eta = match usable {
            Some(f) => estimate(f, outcome.current_index, &self.active),
            None => Eta::undetermined(),
        };
        self.state.eta_seconds = eta.eta_seconds;
        tracing::debug!(
            bus_id = %self.ctx.bus_id,
            online = authoritative,
            current = outcome.current_index,
            confirmed = outcome.confirmed_index,
            eta_seconds = ?self.state.eta_seconds,
            "Processed tick"
        );

        let upcoming_stop_name = usize::try_from(outcome.current_index)
            .ok()
            .and_then(|i| self.active.get(i))
            .and_then(|s| s.next_stop_name.clone());

        // Voice trigger: the current stop changed and the vehicle is moving.
        let announce_stop = match usable {
            Some(f)
                if outcome.current_index != prev_current
                    && outcome.current_index >= 0
                    && f.speed_kmh > 0.0 =>
            {
                upcoming_stop_name.clone()
            }
            _ => None,
        };

        let arrival_alert = self.check_arrival(usable);

        self.phase = SessionPhase::Tracking;

        let snapshot = TrackerSnapshot {
            bus_id: self.ctx.bus_id.clone(),
            phase: self.phase,
            current_stop_index: self.state.current_stop_index,
            last_confirmed_stop_index: self.state.last_confirmed_stop_index,
            is_online: self.state.is_online,
            eta_label: eta.eta_label,
            countdown_label: eta.countdown_label,
            upcoming_stop_name,
            announce_stop,
            arrival_alert,
        };

        // Ignore send errors - they just mean no one is listening
        let _ = self.updates_tx.send(snapshot.clone());

        snapshot
    }

    /// One-shot arrival alert for the configured user stop.
    fn check_arrival(&mut self, fix: Option<&LocationFix>) -> bool {
        if self.state.notified {
            return false;
        }
        let (fix, user_stop) = match (fix, self.ctx.user_stop.as_deref()) {
            (Some(f), Some(s)) => (f, s),
            _ => return false,
        };
        let stop = match self.active.iter().find(|s| s.name == user_stop) {
            Some(s) => s,
            None => return false,
        };

        if distance_meters(fix.point(), stop.point()) < ARRIVAL_ALERT_RADIUS_METERS {
            info!(
                bus_id = %self.ctx.bus_id,
                stop = user_stop,
                "Bus within arrival radius of user stop"
            );
            self.state.notified = true;
            true
        } else {
            false
        }
    }

    /// Start the polling loop. The returned handle must be stopped (or
    /// dropped) on teardown so no timer keeps updating a discarded session.
    pub fn spawn(mut self, feed: LocationFeedClient, poll_interval: Duration) -> SessionHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let (refresh_tx, mut refresh_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            let bus_id = self.ctx.bus_id.clone();
            let mut ticker = tokio::time::interval(poll_interval);

            info!(bus_id = %bus_id, interval_secs = poll_interval.as_secs(), "Tracking session started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    // A manual refresh gesture is just an out-of-band tick.
                    Some(()) = refresh_rx.recv() => {}
                    _ = shutdown_rx.changed() => {
                        info!(bus_id = %bus_id, "Tracking session stopped");
                        break;
                    }
                }

                let fetched = feed.latest_fix(&bus_id).await;
                let _ = self.process_tick(fetched, Utc::now());
            }
        });

        SessionHandle {
            shutdown_tx,
            refresh_tx,
            task,
        }
    }
}

/// Handle to a running session's polling task.
pub struct SessionHandle {
    shutdown_tx: watch::Sender<bool>,
    refresh_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Trigger an out-of-band tick without disturbing the schedule.
    pub fn refresh(&self) {
        let _ = self.refresh_tx.try_send(());
    }

    /// Cancel the polling timer and wait for the loop to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

/// Lightweight online/offline watcher used where full tracking is overkill
/// (list screens). Polls on its own slower cadence and broadcasts just the
/// status bit; same online-determination rule as the tracker.
pub async fn run_status_watcher(
    feed: LocationFeedClient,
    bus_id: String,
    period: Duration,
    status_tx: broadcast::Sender<BusStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown_rx.changed() => break,
        }

        let is_online = match feed.latest_fix(&bus_id).await {
            Ok(Some(fix)) => is_authoritative_online(&fix, Utc::now().timestamp() as f64),
            Ok(None) => false,
            Err(e) => {
                warn!(bus_id = %bus_id, error = %e, "Status check failed");
                false
            }
        };

        // Ignore send errors - they just mean no one is listening
        let _ = status_tx.send(BusStatus {
            bus_id: bus_id.clone(),
            is_online,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Kolkata;

    fn make_route() -> Route {
        Route {
            bus_id: "bus-12".to_string(),
            stops: vec![
                Stop::new("Main Gate", 0.0, 0.0),
                Stop::new("Library", 0.0, 0.01),
                Stop::new("Hostel", 0.0, 0.02),
            ],
        }
    }

    fn make_session(user_stop: Option<&str>, started_at: DateTime<Utc>) -> TrackerSession {
        let ctx = SessionContext {
            bus_id: "bus-12".to_string(),
            user_stop: user_stop.map(str::to_string),
            tz: Kolkata,
        };
        TrackerSession::new(ctx, &make_route(), started_at)
    }

    /// Local Kolkata wall-clock time converted to UTC.
    fn local(h: u32, m: u32) -> DateTime<Utc> {
        Kolkata
            .with_ymd_and_hms(2026, 3, 2, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn fresh_fix(lat: f64, lng: f64, speed_kmh: f64, now: DateTime<Utc>) -> LocationFix {
        LocationFix {
            lat,
            lng,
            speed_kmh,
            timestamp_epoch_secs: now.timestamp() as f64,
            online_flag: true,
        }
    }

    #[test]
    fn first_tick_enters_tracking_even_on_failure() {
        let now = local(10, 0);
        let mut session = make_session(None, now);
        assert_eq!(session.phase(), SessionPhase::Loading);

        let snapshot = session.process_tick(
            Err(FeedError::NetworkError("connection refused".to_string())),
            now,
        );

        assert_eq!(session.phase(), SessionPhase::Tracking);
        assert_eq!(snapshot.current_stop_index, -1);
        assert!(!snapshot.is_online);
        assert_eq!(snapshot.eta_label, "--");
        assert_eq!(snapshot.countdown_label, "--");
    }

    #[test]
    fn failed_tick_then_success_restores_online_state() {
        let now = local(10, 0);
        let mut session = make_session(None, now);

        let offline =
            session.process_tick(Err(FeedError::ApiError("HTTP error: 503".to_string())), now);
        assert_eq!(offline.current_stop_index, -1);
        assert!(!offline.is_online);

        let fix = fresh_fix(0.0, 0.00999, 36.0, now);
        let online = session.process_tick(Ok(Some(fix)), now);
        assert!(online.is_online);
        assert_eq!(online.current_stop_index, 1);
        assert_eq!(online.last_confirmed_stop_index, 1);
        assert_ne!(online.eta_label, "--");
    }

    #[test]
    fn stale_fix_is_offline() {
        let now = local(10, 0);
        let mut session = make_session(None, now);

        let mut fix = fresh_fix(0.0, 0.0, 20.0, now);
        fix.timestamp_epoch_secs = (now.timestamp() - 31) as f64;

        let snapshot = session.process_tick(Ok(Some(fix)), now);
        assert!(!snapshot.is_online);
        assert_eq!(snapshot.current_stop_index, -1);
        assert_eq!(snapshot.eta_label, "--");
    }

    #[test]
    fn offline_flag_is_offline_even_when_fresh() {
        let now = local(10, 0);
        let mut session = make_session(None, now);

        let mut fix = fresh_fix(0.0, 0.0, 20.0, now);
        fix.online_flag = false;

        let snapshot = session.process_tick(Ok(Some(fix)), now);
        assert!(!snapshot.is_online);
        assert_eq!(snapshot.current_stop_index, -1);
    }

    #[test]
    fn offline_tick_preserves_confirmed_progress() {
        let now = local(10, 0);
        let mut session = make_session(None, now);

        let fix = fresh_fix(0.0, 0.00999, 36.0, now);
        session.process_tick(Ok(Some(fix)), now);
        assert_eq!(session.state().last_confirmed_stop_index, 1);

        let snapshot = session.process_tick(Ok(None), now);
        assert_eq!(snapshot.current_stop_index, -1);
        assert_eq!(snapshot.last_confirmed_stop_index, 1);
    }

    #[test]
    fn announces_upcoming_stop_when_index_changes_while_moving() {
        let now = local(10, 0);
        let mut session = make_session(None, now);

        let fix = fresh_fix(0.0, 0.00999, 36.0, now);
        let snapshot = session.process_tick(Ok(Some(fix)), now);
        assert_eq!(snapshot.current_stop_index, 1);
        assert_eq!(snapshot.upcoming_stop_name.as_deref(), Some("Hostel"));
        assert_eq!(snapshot.announce_stop.as_deref(), Some("Hostel"));

        // Same index next tick: nothing new to announce.
        let fix = fresh_fix(0.0, 0.00999, 36.0, now);
        let snapshot = session.process_tick(Ok(Some(fix)), now);
        assert_eq!(snapshot.announce_stop, None);
    }

    #[test]
    fn parked_vehicle_is_not_announced() {
        let now = local(10, 0);
        let mut session = make_session(None, now);

        let fix = fresh_fix(0.0, 0.00999, 0.0, now);
        let snapshot = session.process_tick(Ok(Some(fix)), now);
        assert_eq!(snapshot.current_stop_index, 1);
        assert_eq!(snapshot.announce_stop, None);
    }

    #[test]
    fn arrival_alert_fires_once_per_session() {
        let now = local(10, 0);
        let mut session = make_session(Some("Library"), now);

        // ~11 m from the Library stop.
        let fix = fresh_fix(0.0001, 0.01, 10.0, now);
        let first = session.process_tick(Ok(Some(fix)), now);
        assert!(first.arrival_alert);

        let fix = fresh_fix(0.0001, 0.01, 10.0, now);
        let second = session.process_tick(Ok(Some(fix)), now);
        assert!(!second.arrival_alert);
    }

    #[test]
    fn arrival_alert_suppressed_while_offline() {
        let now = local(10, 0);
        let mut session = make_session(Some("Library"), now);

        let mut fix = fresh_fix(0.0001, 0.01, 10.0, now);
        fix.online_flag = false;
        let snapshot = session.process_tick(Ok(Some(fix)), now);
        assert!(!snapshot.arrival_alert);
    }

    #[test]
    fn cutover_resets_confirmed_progress_and_reverses_ordering() {
        let morning = local(10, 0);
        let mut session = make_session(None, morning);
        assert_eq!(session.active_stops()[0].name, "Main Gate");

        let fix = fresh_fix(0.0, 0.00999, 36.0, morning);
        session.process_tick(Ok(Some(fix)), morning);
        assert_eq!(session.state().last_confirmed_stop_index, 1);

        // Next tick lands after the 15:55 cutover.
        let evening = local(16, 0);
        let fix = fresh_fix(0.0, 0.0199, 36.0, evening);
        let snapshot = session.process_tick(Ok(Some(fix)), evening);

        assert_eq!(session.active_stops()[0].name, "Hostel");
        // Reversed ordering: the fix near Hostel is index 0, confirmed
        // restarts from the reset and accepts it.
        assert_eq!(snapshot.current_stop_index, 0);
        assert_eq!(snapshot.last_confirmed_stop_index, 0);
    }

    #[test]
    fn session_started_in_the_evening_uses_reversed_ordering() {
        let evening = local(17, 0);
        let session = make_session(None, evening);
        assert_eq!(session.active_stops()[0].name, "Hostel");
        assert_eq!(
            session.active_stops()[0].next_stop_name.as_deref(),
            Some("Library")
        );
    }

    #[test]
    fn empty_route_stays_undetermined() {
        let now = local(10, 0);
        let ctx = SessionContext {
            bus_id: "bus-7".to_string(),
            user_stop: None,
            tz: Kolkata,
        };
        let route = Route {
            bus_id: "bus-7".to_string(),
            stops: vec![],
        };
        let mut session = TrackerSession::new(ctx, &route, now);

        let fix = fresh_fix(0.0, 0.0, 20.0, now);
        let snapshot = session.process_tick(Ok(Some(fix)), now);
        assert_eq!(snapshot.current_stop_index, -1);
        assert_eq!(snapshot.upcoming_stop_name, None);
    }

    #[tokio::test]
    async fn stopping_the_handle_cancels_the_polling_task() {
        let now = local(10, 0);
        let session = make_session(None, now);
        let feed = LocationFeedClient::new("http://127.0.0.1:9/feed").unwrap();

        let handle = session.spawn(feed, Duration::from_secs(3600));
        handle.refresh();
        handle.stop().await;
    }
}
