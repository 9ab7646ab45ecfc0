use crate::models::{LocationFix, Stop};
use crate::tracker::geo::distance_meters;

/// A fix must land within this distance of a stop to count as progress.
pub const ACCEPTANCE_RADIUS_METERS: f64 = 300.0;

/// A fix older than this is treated as offline even if the feed flags the
/// vehicle online; a frozen last-known position must not be trusted.
pub const STALE_FIX_MAX_AGE_SECS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Index of the nearest stop for the latest fix; -1 when undetermined.
    /// May be noisy; reflects the raw nearest-stop computation.
    pub current_index: i32,
    /// Confirmed progress; only ratchets forward within an orientation epoch.
    pub confirmed_index: i32,
}

/// Online determination: a fix is authoritative only if the feed flags the
/// vehicle online AND the sample is fresh.
pub fn is_authoritative_online(fix: &LocationFix, now_epoch_secs: f64) -> bool {
    fix.online_flag && (now_epoch_secs - fix.timestamp_epoch_secs) <= STALE_FIX_MAX_AGE_SECS
}

/// Match a fix against the active stop ordering.
///
/// `fix` is `None` when the feed returned no usable coordinates or the
/// vehicle is not authoritative-online; in that case the current index is -1
/// and confirmed progress is left untouched.
///
/// The confirmed index only advances when the nearest stop is both within
/// the acceptance radius and strictly ahead of the last confirmed position,
/// so a transient GPS glitch near an earlier stop cannot roll the displayed
/// progress backward while the live nearest-stop feedback stays current.
pub fn match_stop(fix: Option<&LocationFix>, stops: &[Stop], last_confirmed: i32) -> MatchOutcome {
    let fix = match fix {
        Some(f) if !stops.is_empty() => f,
        _ => {
            return MatchOutcome {
                current_index: -1,
                confirmed_index: last_confirmed,
            }
        }
    };

    let mut nearest_index = 0usize;
    let mut min_distance = f64::INFINITY;
    for (i, stop) in stops.iter().enumerate() {
        let d = distance_meters(fix.point(), stop.point());
        // Strict comparison keeps the first occurrence on ties.
        if d < min_distance {
            min_distance = d;
            nearest_index = i;
        }
    }

    let nearest = nearest_index as i32;
    let confirmed = if min_distance < ACCEPTANCE_RADIUS_METERS && nearest > last_confirmed {
        nearest
    } else {
        last_confirmed
    };

    MatchOutcome {
        current_index: nearest,
        confirmed_index: confirmed,
    }
}
