//! Integration-level coverage of the named-command dispatch table across
//! every payload family: addressing, fixture metadata, LEDs, scheduling,
//! and calibration.

use growlink::codec::{FunctionCode, Payload};
use growlink::dispatch::parse_generic_arguments;

fn args(serial: u32, payload: serde_json::Value) -> Vec<u8> {
    serde_json::json!({ "serial": serial, "payload": payload }).to_string().into_bytes()
}

#[test]
fn addressing_commands_route_to_their_function_codes() {
    let (serial, code, payload) = parse_generic_arguments(
        "set-short-address",
        &args(1, serde_json::json!({ "serial": 1, "short_address": 9 })),
    )
    .unwrap();
    assert_eq!(serial, 1);
    assert_eq!(code, FunctionCode::SetShortAddress);
    assert_eq!(payload, Payload::SetShortAddress { serial: 1, short_address: 9 });

    let (_, code, payload) = parse_generic_arguments("get-short-address", &args(1, serde_json::json!({ "serial": 1 }))).unwrap();
    assert_eq!(code, FunctionCode::GetShortAddress);
    assert_eq!(payload, Payload::GetShortAddress { serial: 1 });
}

#[test]
fn set_fixture_info_decodes_both_version_fields() {
    let (_, code, payload) = parse_generic_arguments(
        "set-fixture-info",
        &args(5, serde_json::json!({ "fw_version": 0x0102_0003u32, "hw_version": 2 })),
    )
    .unwrap();
    assert_eq!(code, FunctionCode::SetFixtureInfo);
    assert_eq!(payload, Payload::SetFixtureInfo { fw_version: 0x0102_0003, hw_version: 2 });
}

#[test]
fn get_leds_decodes_the_channel_config_byte() {
    let (_, code, payload) = parse_generic_arguments("get-leds", &args(5, serde_json::json!({ "config": 3 }))).unwrap();
    assert_eq!(code, FunctionCode::GetLeds);
    assert_eq!(payload, Payload::GetLeds { config: 3 });
}

#[test]
fn delete_schedule_and_get_schedule_carry_distinct_shapes() {
    let (_, code, payload) = parse_generic_arguments("delete-schedule", &args(5, serde_json::json!({ "schedule_id": 2 }))).unwrap();
    assert_eq!(code, FunctionCode::DeleteSchedule);
    assert_eq!(payload, Payload::DeleteSchedule { schedule_id: 2 });

    let (_, code, payload) = parse_generic_arguments(
        "get-schedule",
        &args(5, serde_json::json!({ "schedule_key": 7, "schedule_key_type": 1 })),
    )
    .unwrap();
    assert_eq!(code, FunctionCode::GetSchedule);
    assert_eq!(payload, Payload::GetSchedule { schedule_key: 7, schedule_key_type: 1 });
}

#[test]
fn toggle_calibration_decodes_the_enabled_flag() {
    let (_, code, payload) =
        parse_generic_arguments("toggle-calibration", &args(5, serde_json::json!({ "calibration_enabled": false }))).unwrap();
    assert_eq!(code, FunctionCode::ToggleCalibration);
    assert_eq!(payload, Payload::ToggleCalibration { calibration_enabled: false });
}

#[test]
fn every_no_argument_command_name_resolves_to_empty_payload() {
    let no_arg_commands = [
        "get-group-id",
        "get-fixture-info",
        "get-time-reference",
        "get-schedule-count",
        "get-scheduling-state",
        "delete-all-schedules",
        "stop-scheduling",
        "resume-scheduling",
        "get-illuminance-configuration",
        "get-module-temperature",
        "reset-for-firmware-update",
        "confirm-reset-for-firmware-update",
    ];
    for name in no_arg_commands {
        let (serial, _, payload) = parse_generic_arguments(name, &args(42, serde_json::Value::Null)).unwrap();
        assert_eq!(serial, 42, "command {name}");
        assert_eq!(payload, Payload::Empty, "command {name}");
    }
}

#[test]
fn missing_serial_defaults_to_zero_meaning_any_fixture() {
    let body = serde_json::json!({ "payload": serde_json::Value::Null }).to_string();
    let (serial, _, _) = parse_generic_arguments("get-group-id", body.as_bytes()).unwrap();
    assert_eq!(serial, 0);
}
