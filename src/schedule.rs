//! Schedule validation, day-splitting, per-fixture aggregation, and overlap
//! detection.
//!
//! Grounded on `scheduling.go`'s `schdlCheckAllForValidity`,
//! `schdlSplitSchedulesByDay`, `schdlAggregateBySerial`,
//! `schdlCheckAllForOverlap`, and `schdlAggregateSchedules`. CSV file I/O
//! (`schdlReadSchedulesFromFile`/`schdlParseLines`) is out of scope — only
//! the in-memory schedule shape is carried forward.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// A timed recipe for one fixture: `start`/`stop` as seconds-since-epoch
/// (UTC) and six channel levels in `[0,100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDetached {
    pub start: u32,
    pub stop: u32,
    pub levels: [f64; 6],
}

/// A detached entry plus the serials it targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAttached {
    pub start: u32,
    pub stop: u32,
    pub levels: [f64; 6],
    pub serials: Vec<u32>,
}

impl ScheduleAttached {
    fn detach(&self) -> ScheduleDetached {
        ScheduleDetached { start: self.start, stop: self.stop, levels: self.levels }
    }
}

/// Per-serial lists of schedule entries, in the order they should be
/// installed (the slice index becomes the on-wire schedule id).
pub type Aggregated = HashMap<u32, Vec<ScheduleDetached>>;

/// Validates, optionally day-splits, groups by serial, and checks the
/// per-fixture result for overlaps. Day-splitting only affects what gets
/// installed; overlap detection always reasons about day-expanded blocks
/// regardless of `split_by_day`, matching the source's `schdlExtractBlocks`
/// being called unconditionally from the overlap checker.
pub fn aggregate_schedules(schedules: &[ScheduleAttached], split_by_day: bool) -> Result<Aggregated> {
    check_all_for_validity(schedules)?;
    let expanded;
    let schedules = if split_by_day {
        expanded = split_schedules_by_day(schedules);
        &expanded[..]
    } else {
        schedules
    };
    let aggregated = aggregate_by_serial(schedules);
    check_all_for_overlap(&aggregated)?;
    Ok(aggregated)
}

fn check_all_for_validity(schedules: &[ScheduleAttached]) -> Result<()> {
    for schedule in schedules {
        check_levels(&schedule.levels)?;
        check_timespan(schedule.start, schedule.stop)?;
    }
    Ok(())
}

/// Each level must be in `[0,100]`; their sum must not exceed 300. PWM is
/// the only channel kind where percentage sums to power reliably, but the
/// relation to irradiance is close enough to use as a blanket check.
fn check_levels(levels: &[f64; 6]) -> Result<()> {
    let mut total = 0.0;
    for (index, &level) in levels.iter().enumerate() {
        if !(0.0..=100.0).contains(&level) {
            return Err(Error::LevelOutOfBounds { index, value: level });
        }
        total += level;
    }
    if total > 300.0 {
        return Err(Error::CumulativeLevelExceeded(levels.to_vec()));
    }
    Ok(())
}

fn check_timespan(start: u32, stop: u32) -> Result<()> {
    if stop <= start {
        return Err(Error::InvalidTimespan { start, stop });
    }
    Ok(())
}

/// Replaces each attached entry with one per UTC day it spans. The
/// within-day `start..stop` offset is copied unchanged to every day — a
/// schedule that itself spans multiple days produces day-copies that each
/// also span multiple days, rather than being clipped to day boundaries.
/// Preserved as in the source; callers that split should expect this.
fn split_schedules_by_day(schedules: &[ScheduleAttached]) -> Vec<ScheduleAttached> {
    schedules.iter().flat_map(split_one_by_day).collect()
}

fn split_one_by_day(schedule: &ScheduleAttached) -> Vec<ScheduleAttached> {
    let base = drop_time(schedule.start);
    let (days, seconds) = count_delta(schedule.start, schedule.stop);
    let start_time = drop_date(schedule.start);
    let stop_time = start_time + seconds;
    (0..=days)
        .map(|day| {
            let date = shift_by_days(base, day);
            ScheduleAttached {
                start: date + start_time,
                stop: date + stop_time,
                levels: schedule.levels,
                serials: schedule.serials.clone(),
            }
        })
        .collect()
}

fn aggregate_by_serial(schedules: &[ScheduleAttached]) -> Aggregated {
    let mut aggregated: Aggregated = HashMap::new();
    for schedule in schedules {
        let detached = schedule.detach();
        for &serial in &schedule.serials {
            aggregated.entry(serial).or_default().push(detached);
        }
    }
    aggregated
}

/// One day-expanded interval, carrying back the entry it came from for
/// error messages.
#[derive(Debug, Clone, Copy)]
struct Block {
    begin: u32,
    end: u32,
}

fn extract_blocks(schedule: &ScheduleDetached) -> Vec<Block> {
    let base = drop_time(schedule.start);
    let (days, seconds) = count_delta(schedule.start, schedule.stop);
    let start_time = drop_date(schedule.start);
    let stop_time = start_time + seconds;
    (0..=days)
        .map(|day| {
            let date = shift_by_days(base, day);
            Block { begin: date + start_time, end: date + stop_time }
        })
        .collect()
}

/// Sorts each fixture's day-expanded blocks by start and sweeps adjacent
/// pairs, advancing the "active" cursor only when a later block extends
/// past it. This mirrors the source's sweep and, like it, does not detect
/// three-way transitive overlaps a full sweep would catch — kept as-is per
/// the open question rather than upgraded.
fn check_all_for_overlap(aggregated: &Aggregated) -> Result<()> {
    for (&serial, schedules) in aggregated {
        let mut blocks: Vec<Block> = schedules.iter().flat_map(extract_blocks).collect();
        blocks.sort_by_key(|b| b.begin);
        let mut active = 0;
        for current in 1..blocks.len() {
            check_for_overlap(serial, blocks[active], blocks[current])?;
            if blocks[active].end < blocks[current].end {
                active = current;
            }
        }
    }
    Ok(())
}

fn check_for_overlap(serial: u32, x: Block, y: Block) -> Result<()> {
    if x.begin < y.end && y.begin < x.end {
        return Err(Error::ScheduleOverlap { serial, x_start: x.begin, x_stop: x.end, y_start: y.begin, y_stop: y.end });
    }
    Ok(())
}

fn drop_time(timestamp: u32) -> u32 {
    let at = DateTime::<Utc>::from_timestamp(timestamp as i64, 0).expect("timestamp in range");
    let midnight = at.date_naive().and_hms_opt(0, 0, 0).expect("midnight exists").and_utc();
    midnight.timestamp() as u32
}

fn drop_date(timestamp: u32) -> u32 {
    timestamp - drop_time(timestamp)
}

fn count_delta(start: u32, stop: u32) -> (u32, u32) {
    let elapsed = stop - start;
    (elapsed / SECONDS_PER_DAY, elapsed % SECONDS_PER_DAY)
}

fn shift_by_days(timestamp: u32, days: u32) -> u32 {
    timestamp + days * SECONDS_PER_DAY
}
