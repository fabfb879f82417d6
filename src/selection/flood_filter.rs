/// Flood event narrowing.
///
/// Two independent, composable rules: an optional distance cap and an
/// optional count cap. The distance cap always runs first, so the count
/// cap truncates the already-narrowed candidate set. Events arrive sorted
/// ascending by distance and the filter never reorders, so truncation
/// keeps the nearest N survivors.

use crate::model::FloodEvent;
use crate::selection::intent::FloodEventFilters;

/// Apply the intent's flood-event filters to an event list.
///
/// Deterministic: identical inputs always produce identical output, and
/// filtering an already-filtered list with the same parameters is a
/// no-op.
pub fn filter_flood_events(events: &[FloodEvent], filters: &FloodEventFilters) -> Vec<FloodEvent> {
    let mut filtered: Vec<FloodEvent> = events.to_vec();

    // Distance cap. An event with no recorded distance is treated as
    // infinitely far: it survives only when no cap is active.
    if let Some(max_dist) = filters.max_distance_miles {
        filtered.retain(|event| {
            event
                .distance_from_query_point_miles
                .map_or(false, |d| d <= max_dist)
        });
    }

    // `recent_only` is accepted by the schema but has no defined
    // semantics; until it gets one, it must not silently drop events.

    // Count cap, applied after the distance cap.
    if let Some(max_events) = filters.max_events {
        filtered.truncate(max_events);
    }

    filtered
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
