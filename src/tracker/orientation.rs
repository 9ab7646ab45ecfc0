use chrono::NaiveTime;

use crate::models::Stop;
use crate::tracker::geo::distance_meters;

/// Whether the return (reversed) schedule is active at the given local time.
///
/// A single fixed daily cutover pair: return from 15:55 until 05:00 the next
/// morning, outbound otherwise. Not configurable per route.
pub fn is_return_schedule(local: NaiveTime) -> bool {
    let return_start = NaiveTime::from_hms_opt(15, 55, 0).unwrap();
    let outbound_start = NaiveTime::from_hms_opt(5, 0, 0).unwrap();
    local >= return_start || local < outbound_start
}

/// Derive the stop ordering for the active schedule direction.
///
/// Returns the canonical ordering when outbound, the reversed ordering when
/// returning. In both cases the per-segment fields are recomputed from
/// scratch: walking the list from index 0, each stop except the last gets the
/// distance and name of the following stop, and each stop's cumulative
/// distance is the running sum of the segments before it (km, three-decimal
/// precision, index 0 at 0.0). The input list is never mutated.
///
/// Routes with 0 or 1 stops produce no per-segment data.
pub fn active_stops(stops: &[Stop], return_schedule: bool) -> Vec<Stop> {
    let mut derived: Vec<Stop> = if return_schedule {
        stops.iter().rev().cloned().collect()
    } else {
        stops.to_vec()
    };

    for stop in &mut derived {
        stop.distance_to_next_meters = None;
        stop.next_stop_name = None;
        stop.cumulative_km_from_start = 0.0;
    }

    let mut running_meters = 0.0;
    for i in 0..derived.len().saturating_sub(1) {
        let segment = distance_meters(derived[i].point(), derived[i + 1].point());
        running_meters += segment;

        derived[i].distance_to_next_meters = Some(segment);
        derived[i].next_stop_name = Some(derived[i + 1].name.clone());
        derived[i + 1].cumulative_km_from_start = round_km(running_meters / 1000.0);
    }

    derived
}

fn round_km(km: f64) -> f64 {
    (km * 1000.0).round() / 1000.0
}
