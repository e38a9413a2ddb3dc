//! Named command dispatch: maps an API command name to a function code and
//! a strongly-typed payload, then routes it to whichever transport(s) have
//! seen the target serial.
//!
//! Grounded on `controller1.go`'s `ctrl1NameToFunctionCode`,
//! `ctrl1ParseGenericArguments`, `ctrl1GetSerials`, and `ctrl1Dispatch`.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::codec::{ChannelCalibration, FunctionCode, Packet, Payload};
use crate::constants::{SERIAL_WAIT_TIMEOUT, SHORT_ADDRESS_UNASSIGNED};
use crate::error::{Error, Result};
use crate::net::transport::check_replies;
use crate::net::GatewayDiscoverer;

/// Command name to wire function code. `set-leds-pwm`/`set-leds-irradiance`
/// both address `SetLeds`; `set-schedule-pwm`/`set-schedule-irradiance`
/// both address `SetSchedule` — the name alone picks the payload shape.
static NAME_TO_FUNCTION_CODE: Lazy<HashMap<&'static str, FunctionCode>> = Lazy::new(|| {
    use FunctionCode::*;
    HashMap::from([
        ("set-module-calibration", SetModuleCalibration),
        ("get-module-calibration", GetModuleCalibration),
        ("set-serial-number", SetSerialNumber),
        ("get-serial-number", GetSerialNumber),
        ("set-short-address", SetShortAddress),
        ("get-short-address", GetShortAddress),
        ("set-group-id", SetGroupId),
        ("get-group-id", GetGroupId),
        ("set-fixture-info", SetFixtureInfo),
        ("get-fixture-info", GetFixtureInfo),
        ("set-time-reference", SetTimeReference),
        ("get-time-reference", GetTimeReference),
        ("set-leds-pwm", SetLeds),
        ("set-leds-irradiance", SetLeds),
        ("get-leds", GetLeds),
        ("set-schedule-pwm", SetSchedule),
        ("set-schedule-irradiance", SetSchedule),
        ("get-schedule", GetSchedule),
        ("get-schedule-count", GetScheduleCount),
        ("get-scheduling-state", GetSchedulingState),
        ("delete-schedule", DeleteSchedule),
        ("delete-all-schedules", DeleteAllSchedules),
        ("stop-scheduling", StopScheduling),
        ("resume-scheduling", ResumeScheduling),
        ("set-illuminance-configuration", SetIlluminanceConfiguration),
        ("get-illuminance-configuration", GetIlluminanceConfiguration),
        ("get-module-temperature", GetModuleTemperature),
        ("toggle-calibration", ToggleCalibration),
        ("reset-for-firmware-update", ResetForFirmwareUpdate),
        ("confirm-reset-for-firmware-update", ConfirmResetForFirmwareUpdate),
    ])
});

/// The generic `{serial, payload}` wrapper every dispatch call arrives in;
/// `payload`'s shape depends on `name` and is decoded separately.
#[derive(Debug, Deserialize)]
struct GenericArguments {
    #[serde(default)]
    serial: u32,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChannelCalibrationArg {
    coefficient_a: f32,
    coefficient_b: f32,
    coefficient_m: f32,
}

impl From<ChannelCalibrationArg> for ChannelCalibration {
    fn from(a: ChannelCalibrationArg) -> Self {
        ChannelCalibration { coefficient_a: a.coefficient_a, coefficient_b: a.coefficient_b, coefficient_m: a.coefficient_m }
    }
}

#[derive(Debug, Deserialize)]
struct SetModuleCalibrationArgs {
    module_id: u8,
    calibration: [ChannelCalibrationArg; 6],
}

#[derive(Debug, Deserialize)]
struct ModuleIdArgs {
    module_id: u8,
}

#[derive(Debug, Deserialize)]
struct SetSerialNumberArgs {
    serial: u32,
}

#[derive(Debug, Deserialize)]
struct GetSerialNumberArgs {
    #[serde(default)]
    random_backoff: bool,
}

#[derive(Debug, Deserialize)]
struct SetShortAddressArgs {
    serial: u32,
    short_address: u8,
}

#[derive(Debug, Deserialize)]
struct SerialArgs {
    serial: u32,
}

#[derive(Debug, Deserialize)]
struct SetGroupIdArgs {
    group_id: u32,
}

#[derive(Debug, Deserialize)]
struct SetFixtureInfoArgs {
    fw_version: u32,
    hw_version: u32,
}

#[derive(Debug, Deserialize)]
struct SetTimeReferenceArgs {
    linux_epoch: u32,
}

#[derive(Debug, Deserialize)]
struct SetLedsPwmArgs {
    config: u8,
    levels: [u32; 6],
}

#[derive(Debug, Deserialize)]
struct SetLedsIrradianceArgs {
    config: u8,
    levels: [f32; 6],
}

#[derive(Debug, Deserialize)]
struct GetLedsArgs {
    config: u8,
}

#[derive(Debug, Deserialize)]
struct SetSchedulePwmArgs {
    schedule_id: u32,
    start: u32,
    stop: u32,
    config: u8,
    levels: [u32; 6],
}

#[derive(Debug, Deserialize)]
struct SetScheduleIrradianceArgs {
    schedule_id: u32,
    start: u32,
    stop: u32,
    config: u8,
    levels: [f32; 6],
}

#[derive(Debug, Deserialize)]
struct GetScheduleArgs {
    schedule_key: u32,
    schedule_key_type: u8,
}

#[derive(Debug, Deserialize)]
struct DeleteScheduleArgs {
    schedule_id: u32,
}

#[derive(Debug, Deserialize)]
struct SetIlluminanceConfigurationArgs {
    configuration: [f32; 6],
}

#[derive(Debug, Deserialize)]
struct ToggleCalibrationArgs {
    calibration_enabled: bool,
}

/// Decodes the generic `{serial, payload}` wrapper for `name`, then decodes
/// `payload` into whichever shape that command expects. Commands with no
/// arguments (most `Get*` calls and the scheduling toggles) ignore the
/// `payload` field entirely.
pub fn parse_generic_arguments(name: &str, json_arguments: &[u8]) -> Result<(u32, FunctionCode, Payload)> {
    let function_code = *NAME_TO_FUNCTION_CODE.get(name).ok_or_else(|| Error::UnknownCommand(name.to_string()))?;
    let arguments: GenericArguments = serde_json::from_slice(json_arguments)?;

    fn from_payload<T: for<'de> Deserialize<'de>>(v: serde_json::Value) -> std::result::Result<T, serde_json::Error> {
        serde_json::from_value(v)
    }

    let payload = match name {
        "set-module-calibration" => {
            let a: SetModuleCalibrationArgs = from_payload(arguments.payload)?;
            Payload::SetModuleCalibration {
                module_id: a.module_id,
                calibration: a.calibration.map(ChannelCalibration::from),
            }
        }
        "get-module-calibration" => {
            let a: ModuleIdArgs = from_payload(arguments.payload)?;
            Payload::GetModuleCalibration { module_id: a.module_id }
        }
        "set-serial-number" => {
            let a: SetSerialNumberArgs = from_payload(arguments.payload)?;
            Payload::SetSerialNumber { serial: a.serial }
        }
        "get-serial-number" => {
            let a: GetSerialNumberArgs = from_payload(arguments.payload)?;
            Payload::GetSerialNumber { random_backoff: a.random_backoff }
        }
        "set-short-address" => {
            let a: SetShortAddressArgs = from_payload(arguments.payload)?;
            Payload::SetShortAddress { serial: a.serial, short_address: a.short_address }
        }
        "get-short-address" => {
            let a: SerialArgs = from_payload(arguments.payload)?;
            Payload::GetShortAddress { serial: a.serial }
        }
        "set-group-id" => {
            let a: SetGroupIdArgs = from_payload(arguments.payload)?;
            Payload::SetGroupId { group_id: a.group_id }
        }
        "get-group-id" => Payload::Empty,
        "set-fixture-info" => {
            let a: SetFixtureInfoArgs = from_payload(arguments.payload)?;
            Payload::SetFixtureInfo { fw_version: a.fw_version, hw_version: a.hw_version }
        }
        "get-fixture-info" => Payload::Empty,
        "set-time-reference" => {
            let a: SetTimeReferenceArgs = from_payload(arguments.payload)?;
            Payload::SetTimeReference { linux_epoch: a.linux_epoch }
        }
        "get-time-reference" => Payload::Empty,
        "set-leds-pwm" => {
            let a: SetLedsPwmArgs = from_payload(arguments.payload)?;
            Payload::SetLedsPwm { config: a.config, levels: a.levels }
        }
        "set-leds-irradiance" => {
            let a: SetLedsIrradianceArgs = from_payload(arguments.payload)?;
            Payload::SetLedsIrradiance { config: a.config, levels: a.levels }
        }
        "get-leds" => {
            let a: GetLedsArgs = from_payload(arguments.payload)?;
            Payload::GetLeds { config: a.config }
        }
        "set-schedule-pwm" => {
            let a: SetSchedulePwmArgs = from_payload(arguments.payload)?;
            Payload::SetSchedulePwm {
                schedule_id: a.schedule_id,
                start: a.start,
                stop: a.stop,
                config: a.config,
                levels: a.levels,
            }
        }
        "set-schedule-irradiance" => {
            let a: SetScheduleIrradianceArgs = from_payload(arguments.payload)?;
            Payload::SetScheduleIrradiance {
                schedule_id: a.schedule_id,
                start: a.start,
                stop: a.stop,
                config: a.config,
                levels: a.levels,
            }
        }
        "get-schedule" => {
            let a: GetScheduleArgs = from_payload(arguments.payload)?;
            Payload::GetSchedule { schedule_key: a.schedule_key, schedule_key_type: a.schedule_key_type }
        }
        "get-schedule-count" => Payload::Empty,
        "get-scheduling-state" => Payload::Empty,
        "delete-schedule" => {
            let a: DeleteScheduleArgs = from_payload(arguments.payload)?;
            Payload::DeleteSchedule { schedule_id: a.schedule_id }
        }
        "delete-all-schedules" => Payload::Empty,
        "stop-scheduling" => Payload::Empty,
        "resume-scheduling" => Payload::Empty,
        "set-illuminance-configuration" => {
            let a: SetIlluminanceConfigurationArgs = from_payload(arguments.payload)?;
            Payload::SetIlluminanceConfiguration { configuration: a.configuration }
        }
        "get-illuminance-configuration" => Payload::Empty,
        "get-module-temperature" => Payload::Empty,
        "toggle-calibration" => {
            let a: ToggleCalibrationArgs = from_payload(arguments.payload)?;
            Payload::ToggleCalibration { calibration_enabled: a.calibration_enabled }
        }
        "reset-for-firmware-update" => Payload::Empty,
        "confirm-reset-for-firmware-update" => Payload::Empty,
        _ => unreachable!("name already validated against NAME_TO_FUNCTION_CODE"),
    };

    Ok((arguments.serial, function_code, payload))
}

/// Sorted union of every serial seen by any transport.
pub fn get_serials(discoverer: &GatewayDiscoverer) -> Vec<u32> {
    let mut serials: Vec<u32> = discoverer.look_up(0).iter().flat_map(|t| t.list_seen_serials()).collect();
    serials.sort_unstable();
    serials.dedup();
    serials
}

/// Waits for `serial` to be seen, looks up every transport that owns it,
/// exchanges the command on each, and adjudicates the aggregated result
/// with a single `check_replies` call.
pub async fn dispatch(
    discoverer: &GatewayDiscoverer,
    serial: u32,
    function_code: FunctionCode,
    payload: Payload,
) -> Result<Vec<Packet>> {
    if !discoverer.wait_for_serial(serial, SERIAL_WAIT_TIMEOUT).await {
        return Err(Error::SerialTimeout(serial));
    }
    let transports = discoverer.look_up(serial);
    let mut result = Vec::new();
    for transport in &transports {
        let short_address = transport.look_up(serial);
        if short_address == SHORT_ADDRESS_UNASSIGNED {
            return Err(Error::SerialUnresolved(serial));
        }
        let replies = transport.assemble_and_exchange(short_address, function_code, payload.clone()).await?;
        result.extend(replies);
    }
    check_replies(function_code, &result)?;
    Ok(result)
}
