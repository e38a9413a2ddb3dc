//! Top-level engine: ties gateway discovery, command dispatch, and schedule
//! import together behind one handle.
//!
//! Grounded on `controller1.go`'s `ctrl1Controller` (`ctrl1Init`,
//! `ctrl1GetSerials`, `ctrl1Dispatch` via [`dispatch::dispatch`], and
//! `ctrl1ImportSchedules`).

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::{FunctionCode, Packet, Payload};
use crate::constants::{LEDS_MODULE0_MASK, LEDS_MODULE1_MASK, SERIAL_WAIT_TIMEOUT, USE_PWM};
use crate::dispatch::{self, dispatch};
use crate::error::{Error, Result};
use crate::logging::{log_error, log_info};
use crate::net::transport::{check_replies, illuminance_configuration, module_calibration};
use crate::net::GatewayDiscoverer;
use crate::schedule::{self, ScheduleAttached};

/// Owns the discoverer and exposes the fixture control API: dispatching
/// named commands and importing schedule sets.
pub struct Engine {
    discoverer: Arc<GatewayDiscoverer>,
}

impl Engine {
    /// Starts gateway discovery (and, if `conditioning`, the per-transport
    /// periodic time-sync/toggle/illuminance-scale loop).
    pub async fn start(conditioning: bool) -> Result<Self> {
        let discoverer = GatewayDiscoverer::start(conditioning).await?;
        Ok(Engine { discoverer })
    }

    /// Sorted union of every serial seen by any transport.
    pub fn get_serials(&self) -> Vec<u32> {
        dispatch::get_serials(&self.discoverer)
    }

    /// Decodes a dispatcher call's generic `{serial, payload}` JSON body
    /// and routes it to every transport reporting that serial.
    pub async fn dispatch(&self, name: &str, json_arguments: &[u8]) -> Result<Vec<Packet>> {
        let (serial, function_code, payload) = dispatch::parse_generic_arguments(name, json_arguments)?;
        dispatch(&self.discoverer, serial, function_code, payload).await
    }

    /// Aggregates `schedules` per fixture, waits for every affected serial
    /// to be seen, then installs them one fixture at a time: wipe existing
    /// schedules, sync the clock, push each entry (the aggregated slice
    /// index becomes the on-wire schedule id), resume scheduling, and
    /// recompute the illuminance configuration from both modules'
    /// calibrations. The whole import aborts on the first failing step,
    /// naming the serial and step that failed.
    pub async fn import_schedules(&self, schedules: &[ScheduleAttached]) -> Result<()> {
        let aggregated = schedule::aggregate_schedules(schedules, false)?;

        let mut serials: Vec<u32> = aggregated.keys().copied().collect();
        serials.sort_unstable();
        if !self.discoverer.wait_for_serials(&serials, SERIAL_WAIT_TIMEOUT).await {
            return Err(Error::Other("failed to locate all fixtures for schedule import".into()));
        }

        for (serial, entries) in &aggregated {
            let serial = *serial;
            self.checked_dispatch(serial, FunctionCode::DeleteAllSchedules, Payload::Empty, "delete existing schedules")
                .await?;

            let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as u32;
            self.checked_dispatch(
                serial,
                FunctionCode::SetTimeReference,
                Payload::SetTimeReference { linux_epoch: now },
                "sync time",
            )
            .await?;

            for (schedule_id, entry) in entries.iter().enumerate() {
                let config = USE_PWM | LEDS_MODULE0_MASK | LEDS_MODULE1_MASK;
                let mut levels = [0u32; 6];
                for (index, level) in entry.levels.iter().enumerate() {
                    levels[index] = *level as u32;
                }
                let payload = Payload::SetSchedulePwm {
                    schedule_id: schedule_id as u32,
                    start: entry.start,
                    stop: entry.stop,
                    config,
                    levels,
                };
                self.checked_dispatch(
                    serial,
                    FunctionCode::SetSchedule,
                    payload,
                    &format!("set schedule {schedule_id}"),
                )
                .await?;
            }

            self.checked_dispatch(serial, FunctionCode::ResumeScheduling, Payload::Empty, "resume scheduling").await?;

            let replies0 = self
                .checked_dispatch(
                    serial,
                    FunctionCode::GetModuleCalibration,
                    Payload::GetModuleCalibration { module_id: 0 },
                    "fetch module 0 calibration",
                )
                .await?;
            let replies1 = self
                .checked_dispatch(
                    serial,
                    FunctionCode::GetModuleCalibration,
                    Payload::GetModuleCalibration { module_id: 1 },
                    "fetch module 1 calibration",
                )
                .await?;
            let (Some(calibration0), Some(calibration1)) =
                (replies0.iter().find_map(module_calibration), replies1.iter().find_map(module_calibration))
            else {
                return Err(Error::Other(format!(
                    "missing module calibration reply for device with serial number {serial}"
                )));
            };
            let configuration = illuminance_configuration(&calibration0, &calibration1);
            self.checked_dispatch(
                serial,
                FunctionCode::SetIlluminanceConfiguration,
                Payload::SetIlluminanceConfiguration { configuration },
                "set illuminance configuration",
            )
            .await?;
        }
        Ok(())
    }

    async fn checked_dispatch(
        &self,
        serial: u32,
        function_code: FunctionCode,
        payload: Payload,
        step: &str,
    ) -> Result<Vec<Packet>> {
        let replies = dispatch(&self.discoverer, serial, function_code, payload).await.map_err(|e| {
            let error = Error::Other(format!("failed to {step} for device with serial number {serial} ({e})"));
            log_error(&error.to_string());
            error
        })?;
        if let Err(e) = check_replies(function_code, &replies) {
            let error = Error::Other(format!("failed to {step} for device with serial number {serial} ({e})"));
            log_error(&error.to_string());
            return Err(error);
        }
        Ok(replies)
    }

    /// Stops gateway discovery. Per-transport tasks wind down on their own
    /// once the gateway stops answering.
    pub fn shutdown(&self) {
        log_info("shutting down");
        self.discoverer.shutdown();
    }
}
