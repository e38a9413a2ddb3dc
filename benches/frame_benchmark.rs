use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use growlink::codec::{crc16, encode, parse_frames, ChannelCalibration, FunctionCode, Header, Packet, Payload};

fn header(seq: u32, short_address: u8, function_code: FunctionCode) -> Header {
    Header { client_ipv4: [127, 0, 0, 1], sequence_number: seq, short_address, function_code: function_code.wire() }
}

fn command_packet() -> Packet {
    Packet { header: header(1, 0, FunctionCode::GetSerialNumber), payload: Payload::GetSerialNumber { random_backoff: true } }
}

fn reply_packet() -> Packet {
    let channel = ChannelCalibration { coefficient_a: 1.0, coefficient_b: 0.0, coefficient_m: 1.0 };
    Packet {
        header: header(1, 3, FunctionCode::GetModuleCalibration),
        payload: Payload::ReplyGetModuleCalibration { module_id: 0, calibration: [channel; 6] },
    }
}

fn benchmark_crc(c: &mut Criterion) {
    let encoded = encode(&reply_packet());
    c.bench_function("crc16_module_calibration_reply", |b| b.iter(|| crc16(black_box(&encoded))));
}

fn benchmark_encode(c: &mut Criterion) {
    let command = command_packet();
    let reply = reply_packet();
    c.bench_function("encode_short_command", |b| b.iter(|| encode(black_box(&command))));
    c.bench_function("encode_calibration_reply", |b| b.iter(|| encode(black_box(&reply))));
}

fn benchmark_parse(c: &mut Criterion) {
    let encoded = encode(&reply_packet());
    c.bench_function("parse_single_reply", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(&encoded[..]);
            parse_frames(black_box(&mut buf))
        })
    });

    let mut stream = Vec::new();
    for seq in 0..16 {
        stream.extend_from_slice(&encode(&Packet {
            header: header(seq, 3, FunctionCode::GetModuleCalibration),
            payload: reply_packet().payload,
        }));
    }
    c.bench_function("parse_batched_replies", |b| {
        b.iter(|| {
            let mut buf = BytesMut::from(&stream[..]);
            parse_frames(black_box(&mut buf))
        })
    });
}

criterion_group!(benches, benchmark_crc, benchmark_encode, benchmark_parse);
criterion_main!(benches);
