use crate::models::{LocationFix, Stop};
use crate::tracker::geo::distance_meters;

/// Placeholder shown while no estimate can be made.
pub const UNDETERMINED_LABEL: &str = "--";

#[derive(Debug, Clone, PartialEq)]
pub struct Eta {
    pub eta_label: String,
    pub countdown_label: String,
    pub eta_seconds: Option<f64>,
}

impl Eta {
    pub fn undetermined() -> Self {
        Self {
            eta_label: UNDETERMINED_LABEL.to_string(),
            countdown_label: UNDETERMINED_LABEL.to_string(),
            eta_seconds: None,
        }
    }
}

/// Point estimate of the time to the next stop in the active ordering.
///
/// Requires a moving vehicle (`speed_kmh > 0`) and a next stop to aim at;
/// anything else yields the undetermined labels. Every tick is an independent
/// estimate from the latest speed and position, with no smoothing across ticks,
/// so the displayed countdown can be volatile.
pub fn estimate(fix: &LocationFix, current_index: i32, stops: &[Stop]) -> Eta {
    if fix.speed_kmh <= 0.0 || current_index < 0 {
        return Eta::undetermined();
    }

    let next_index = current_index as usize + 1;
    let next_stop = match stops.get(next_index) {
        Some(stop) => stop,
        None => return Eta::undetermined(),
    };

    let distance = distance_meters(fix.point(), next_stop.point());
    let speed_mps = fix.speed_kmh * 1000.0 / 3600.0;
    let eta_seconds = distance / speed_mps;

    let whole = eta_seconds.floor().max(0.0) as u64;
    let minutes = whole / 60;
    let seconds = whole % 60;

    Eta {
        eta_label: format!("{} min {} sec", minutes, seconds),
        countdown_label: format!("{}s", whole),
        eta_seconds: Some(eta_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_stops() -> Vec<Stop> {
        vec![
            Stop::new("S0", 0.0, 0.0),
            Stop::new("S1", 0.0, 0.01),
            Stop::new("S2", 0.0, 0.02),
        ]
    }

    fn fix_at(lat: f64, lng: f64, speed_kmh: f64) -> LocationFix {
        LocationFix {
            lat,
            lng,
            speed_kmh,
            timestamp_epoch_secs: 0.0,
            online_flag: true,
        }
    }

    #[test]
    fn zero_speed_yields_undetermined() {
        // Parked exactly at S1.
        let stops = make_stops();
        let fix = fix_at(0.0, 0.01, 0.0);
        let eta = estimate(&fix, 1, &stops);
        assert_eq!(eta.eta_label, "--");
        assert_eq!(eta.countdown_label, "--");
        assert_eq!(eta.eta_seconds, None);
    }

    #[test]
    fn unknown_index_yields_undetermined() {
        let stops = make_stops();
        let fix = fix_at(0.0, 0.0, 20.0);
        assert_eq!(estimate(&fix, -1, &stops).eta_seconds, None);
    }

    #[test]
    fn last_stop_has_no_next_target() {
        let stops = make_stops();
        let fix = fix_at(0.0, 0.02, 20.0);
        let eta = estimate(&fix, 2, &stops);
        assert_eq!(eta.eta_label, "--");
        assert_eq!(eta.eta_seconds, None);
    }

    #[test]
    fn moving_vehicle_gets_a_real_estimate() {
        // 36 km/h = 10 m/s; ~1112 m from S0 to S1 => ~111 s.
        let stops = make_stops();
        let fix = fix_at(0.0, 0.0, 36.0);
        let eta = estimate(&fix, 0, &stops);

        let secs = eta.eta_seconds.expect("estimate expected");
        assert!((secs - 111.2).abs() < 1.0, "got {}", secs);
        assert_eq!(eta.eta_label, "1 min 51 sec");
        assert_eq!(eta.countdown_label, "111s");
    }

    #[test]
    fn countdown_floors_to_whole_seconds() {
        let stops = vec![Stop::new("A", 0.0, 0.0), Stop::new("B", 0.0, 0.0001)];
        // ~11 m at 10 m/s => ~1.1 s.
        let fix = fix_at(0.0, 0.0, 36.0);
        let eta = estimate(&fix, 0, &stops);
        assert_eq!(eta.countdown_label, "1s");
        assert_eq!(eta.eta_label, "0 min 1 sec");
    }
}
