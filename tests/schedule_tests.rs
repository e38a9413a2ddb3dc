//! Integration-level schedule aggregation scenarios spanning multiple
//! fixtures and multiple source entries, closer to a real fleet import
//! than the per-rule unit tests in `src/schedule.rs`.

use growlink::schedule::{aggregate_schedules, ScheduleAttached};

const DAY: u32 = 24 * 60 * 60;

fn entry(start: u32, stop: u32, levels: [f64; 6], serials: &[u32]) -> ScheduleAttached {
    ScheduleAttached { start, stop, levels, serials: serials.to_vec() }
}

#[test]
fn a_two_room_fleet_aggregates_independently_per_serial() {
    // Room A (serials 1,2) gets a sunrise ramp and a midday hold; room B
    // (serial 3) only gets the midday hold. None of these overlap in time.
    let schedules = vec![
        entry(6 * 3600, 8 * 3600, [20.0; 6], &[1, 2]),
        entry(10 * 3600, 18 * 3600, [40.0; 6], &[1, 2, 3]),
    ];

    let aggregated = aggregate_schedules(&schedules, false).unwrap();

    assert_eq!(aggregated.len(), 3);
    assert_eq!(aggregated[&1].len(), 2);
    assert_eq!(aggregated[&2].len(), 2);
    assert_eq!(aggregated[&3].len(), 1);
    assert_eq!(aggregated[&3][0].levels, [40.0; 6]);
}

#[test]
fn one_fixture_shared_across_two_otherwise_disjoint_schedules_still_catches_their_overlap() {
    // Serial 2 is double-booked between 11:00 and 12:00 even though each
    // schedule individually only targets a subset of the fleet.
    let schedules = vec![entry(9 * 3600, 12 * 3600, [50.0; 6], &[1, 2]), entry(11 * 3600, 14 * 3600, [50.0; 6], &[2, 3])];

    let err = aggregate_schedules(&schedules, false).unwrap_err();
    assert!(matches!(err, growlink::error::Error::ScheduleOverlap { serial: 2, .. }));
}

#[test]
fn day_splitting_a_multi_day_recurring_schedule_produces_one_copy_per_calendar_day_touched() {
    // A schedule starting at noon on day 0 and running for three and a
    // quarter days touches four distinct calendar days (0 through 3).
    let schedules = vec![entry(12 * 3600, 12 * 3600 + 3 * DAY + 6 * 3600, [40.0; 6], &[7])];

    let aggregated = aggregate_schedules(&schedules, true).unwrap();

    // Each day-copy keeps the original within-day offset (6h here), not
    // the full multi-day span — that's what "day split" means.
    assert_eq!(aggregated[&7].len(), 4);
    for detached in &aggregated[&7] {
        assert_eq!(detached.stop - detached.start, 6 * 3600);
    }
}

#[test]
fn cumulative_level_limit_is_enforced_per_entry_not_across_the_whole_fleet_import() {
    // Two schedules that are each within budget individually must not be
    // summed together across the import — only within one entry's levels.
    let schedules = vec![entry(0, 3600, [50.0; 6], &[1]), entry(2 * 3600, 3 * 3600, [50.0; 6], &[1])];

    let aggregated = aggregate_schedules(&schedules, false).unwrap();
    assert_eq!(aggregated[&1].len(), 2);
}
