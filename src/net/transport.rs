//! Per-gateway-port TCP transport: connect/reconnect, byte-at-a-time framed
//! reads, a paced sender, the address-assignment probe loop, and the
//! periodic conditioner.
//!
//! One [`PortTransport`] is created per discovered `ip:port` pair and runs
//! for as long as it keeps hearing from the gateway. Four background tasks
//! cooperate over shared state guarded by plain mutexes (never held across
//! an `.await`, except the write half's, which is only ever held for the
//! duration of a single write):
//!
//! - the connector owns the read half, reconnects on failure, and both
//!   reassembles frames and dispatches replies to waiting exchanges
//!   (grounded on `dptr1Connector`/`dptr1Process`, which are one goroutine)
//! - the conduit owns the write half and paces outgoing frames
//!   (`dptr1Conduit`)
//! - the prober periodically assigns short addresses to unassigned or
//!   duplicated fixtures (`dptr1Probe`)
//! - the conditioner, if enabled, periodically syncs time, toggles
//!   scheduling, and rescales illuminance configuration (`dptr1Conditioner`)

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::codec::{encode, parse_frames, ChannelCalibration, FunctionCode, Header, Packet, Payload};
use crate::constants::{
    COMMAND_TIMEOUT, CONDITIONER_INTERVAL, KEEPALIVE_PERIOD, PROBE_INTERVAL, RECONNECT_TIMEOUT, SEND_PACING,
    SHORT_ADDRESS_BEGIN, SHORT_ADDRESS_BROADCAST, SHORT_ADDRESS_END, SHORT_ADDRESS_UNASSIGNED,
    TCP_READ_DEADLINE, TCP_WRITE_DEADLINE,
};
use crate::error::{Error, ErrorEntry, Result};
use crate::logging::{log_debug, log_error, log_info};

use super::udp::match_own_address;

pub fn identify(address: Ipv4Addr, port: u16) -> String {
    format!("{address}:{port}")
}

/// Serial-to-short-address lookup table plus the bookkeeping needed to run
/// one gateway port's worth of fixtures.
pub struct PortTransport {
    identifier: String,
    address: Ipv4Addr,
    port: u16,
    sequence: AtomicU32,
    inbox: Mutex<HashMap<u32, mpsc::UnboundedSender<Packet>>>,
    outbox_tx: mpsc::UnboundedSender<Vec<u8>>,
    outbox_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    write_half: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    lut: Mutex<HashMap<u32, u8>>,
    last_seen: Mutex<Instant>,
}

impl PortTransport {
    pub fn new(address: Ipv4Addr, port: u16) -> Arc<Self> {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        Arc::new(PortTransport {
            identifier: identify(address, port),
            address,
            port,
            sequence: AtomicU32::new(rand::random()),
            inbox: Mutex::new(HashMap::new()),
            outbox_tx,
            outbox_rx: Mutex::new(Some(outbox_rx)),
            write_half: tokio::sync::Mutex::new(None),
            lut: Mutex::new(HashMap::new()),
            last_seen: Mutex::new(Instant::now()),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    fn is_alive(&self) -> bool {
        Instant::now() < *self.last_seen.lock().unwrap() + RECONNECT_TIMEOUT
    }

    /// Moment this transport last saw any traffic from its gateway.
    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock().unwrap()
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap() = Instant::now();
    }

    /// Starts the connector, conduit, and prober tasks, plus the
    /// conditioner if `conditioning` is set.
    pub fn activate(self: &Arc<Self>, conditioning: bool) {
        tokio::spawn(self.clone().connector_loop());
        tokio::spawn(self.clone().conduit_loop());
        tokio::spawn(self.clone().probe_loop());
        if conditioning {
            tokio::spawn(self.clone().conditioner_loop());
        }
    }

    // -- connector ------------------------------------------------------

    async fn connector_loop(self: Arc<Self>) {
        while self.is_alive() {
            *self.write_half.lock().await = None;
            let stream = match self.open().await {
                Ok(stream) => stream,
                Err(e) => {
                    log_info(&format!("[{}] retrying adapter connection ({e})", self.identifier));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            let (mut read_half, write_half) = stream.into_split();
            *self.write_half.lock().await = Some(write_half);
            let mut octets = BytesMut::new();
            while self.is_alive() {
                if let Err(e) = self.process(&mut read_half, &mut octets).await {
                    log_error(&format!("[{}] failed to process incoming octets ({e})", self.identifier));
                    break;
                }
            }
            log_info(&format!("[{}] retrying connection", self.identifier));
        }
    }

    async fn open(&self) -> std::io::Result<TcpStream> {
        let stream = TcpStream::connect((self.address, self.port)).await?;
        if let Err(e) = stream.set_nodelay(true) {
            log_debug(&format!("[{}] failed to set no-delay ({e})", self.identifier));
        }
        let keepalive = socket2::TcpKeepalive::new().with_time(KEEPALIVE_PERIOD).with_interval(KEEPALIVE_PERIOD);
        if let Err(e) = socket2::SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
            log_debug(&format!("[{}] failed to set keep-alive ({e})", self.identifier));
        }
        log_info(&format!("[{}] connected", self.identifier));
        Ok(stream)
    }

    async fn process(&self, read_half: &mut OwnedReadHalf, octets: &mut BytesMut) -> std::io::Result<()> {
        let mut octet = [0u8; 1];
        match timeout(TCP_READ_DEADLINE, read_half.read(&mut octet)).await {
            Ok(Ok(0)) => Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed")),
            Ok(Ok(_)) => {
                octets.extend_from_slice(&octet);
                self.touch();
                for reply in parse_frames(octets) {
                    let present = self
                        .inbox
                        .lock()
                        .unwrap()
                        .get(&reply.header.sequence_number)
                        .map(|tx| tx.send(reply.clone()).is_ok());
                    if present != Some(true) {
                        log_debug(&format!("[{}] dropped orphaned reply - {:?}", self.identifier, reply));
                    }
                }
                Ok(())
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(()), // read deadline elapsed, no data
        }
    }

    // -- conduit ----------------------------------------------------------

    async fn conduit_loop(self: Arc<Self>) {
        let mut rx = self.outbox_rx.lock().unwrap().take().expect("conduit already started");
        while self.is_alive() {
            if self.write_half.lock().await.is_none() {
                tokio::time::sleep(Duration::from_secs(2)).await;
                continue;
            }
            match timeout(Duration::from_secs(1), rx.recv()).await {
                Ok(Some(octets)) => {
                    let mut guard = self.write_half.lock().await;
                    match guard.as_mut() {
                        Some(write_half) => match timeout(TCP_WRITE_DEADLINE, write_half.write_all(&octets)).await {
                            Ok(Ok(())) => {
                                drop(guard);
                                tokio::time::sleep(SEND_PACING).await;
                            }
                            _ => {
                                log_error(&format!("[{}] failed to transmit a packet, dropping", self.identifier));
                                drop(guard);
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                        },
                        None => drop(guard),
                    }
                }
                Ok(None) => break,
                Err(_) => {}
            }
        }
    }

    fn transmit(&self, packet: &Packet) -> Result<()> {
        let octets = encode(packet);
        self.outbox_tx.send(octets).map_err(|_| Error::Transport("transport is shut down".into()))
    }

    // -- request/reply ----------------------------------------------------

    /// Sends `command` and collects its replies (if any), waiting at most
    /// `wait`. A broadcast always waits out the full timeout to gather every
    /// fixture's reply; a unicast stops as soon as its single reply lands.
    pub async fn exchange(&self, command: Packet, wait: Duration) -> Result<Vec<Packet>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();
        let transaction = command.header.sequence_number;
        self.inbox.lock().unwrap().insert(transaction, tx);
        log_info(&format!("[{}] <- {:?}", self.identifier, command));
        self.transmit(&command)?;

        let mut replies = Vec::new();
        let is_replying = FunctionCode::from_wire(command.header.function_code).is_some_and(FunctionCode::is_replying);
        if is_replying {
            if command.header.short_address == SHORT_ADDRESS_BROADCAST {
                tokio::time::sleep(wait).await;
            } else if let Ok(Some(reply)) = timeout(wait, rx.recv()).await {
                replies.push(reply);
            }
            while let Ok(reply) = rx.try_recv() {
                replies.push(reply);
            }
        } else {
            tokio::time::sleep(wait).await;
        }
        self.inbox.lock().unwrap().remove(&transaction);
        Ok(replies)
    }

    /// Builds the header (own client IP, next sequence number, broadcast
    /// short address forced for the two addressing commands), exchanges it,
    /// and reassociates the LUT on a clean `Set{SerialNumber,ShortAddress}`.
    /// A failed reply check is logged, not propagated — callers that need
    /// to gate on it call [`check_replies`] themselves.
    pub async fn assemble_and_exchange(
        &self,
        mut short_address: u8,
        function_code: FunctionCode,
        payload: Payload,
    ) -> Result<Vec<Packet>> {
        if matches!(function_code, FunctionCode::SetShortAddress | FunctionCode::GetShortAddress) {
            short_address = SHORT_ADDRESS_BROADCAST;
        }
        let client_ipv4 = match_own_address(self.address).octets();
        let sequence_number = self.sequence.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
        let header = Header { client_ipv4, sequence_number, short_address, function_code: function_code.wire() };
        let packet = Packet { header, payload: payload.clone() };
        let replies = self.exchange(packet, COMMAND_TIMEOUT).await?;
        match check_replies(function_code, &replies) {
            Ok(()) => match (function_code, &payload) {
                (FunctionCode::SetSerialNumber, Payload::SetSerialNumber { serial }) => {
                    self.reassociate_single(*serial, short_address)
                }
                (FunctionCode::SetShortAddress, Payload::SetShortAddress { serial, short_address: addr }) => {
                    self.reassociate_single(*serial, *addr)
                }
                _ => {}
            },
            Err(e) => log_error(&format!("[{}] failure reported in received replies ({e})", self.identifier)),
        }
        Ok(replies)
    }

    /// Like [`Self::assemble_and_exchange`] but gates on the reply check,
    /// propagating it as an error instead of only logging it.
    pub async fn checked_exchange(
        &self,
        short_address: u8,
        function_code: FunctionCode,
        payload: Payload,
    ) -> Result<Vec<Packet>> {
        let replies = self.assemble_and_exchange(short_address, function_code, payload).await?;
        check_replies(function_code, &replies)?;
        Ok(replies)
    }

    // -- LUT ---------------------------------------------------------------

    pub fn list_seen_serials(&self) -> Vec<u32> {
        self.lut.lock().unwrap().keys().copied().collect()
    }

    pub fn check_seen_serials(&self, serials: &[u32]) -> bool {
        let lut = self.lut.lock().unwrap();
        serials.iter().all(|serial| lut.contains_key(serial))
    }

    pub fn look_up(&self, serial: u32) -> u8 {
        if serial == 0 {
            return SHORT_ADDRESS_BROADCAST;
        }
        *self.lut.lock().unwrap().get(&serial).unwrap_or(&SHORT_ADDRESS_UNASSIGNED)
    }

    fn reassociate_single(&self, serial: u32, short_address: u8) {
        let mut lut = self.lut.lock().unwrap();
        lut.retain(|_, v| *v != short_address);
        lut.insert(serial, short_address);
    }

    fn reassociate_all(&self, lut: HashMap<u32, u8>) {
        *self.lut.lock().unwrap() = lut;
    }

    // -- prober --------------------------------------------------------

    async fn probe_loop(self: Arc<Self>) {
        while self.is_alive() {
            let replies = match self
                .assemble_and_exchange(
                    SHORT_ADDRESS_BROADCAST,
                    FunctionCode::GetSerialNumber,
                    Payload::GetSerialNumber { random_backoff: true },
                )
                .await
            {
                Ok(replies) => replies,
                Err(e) => {
                    log_error(&format!("[{}] could not communicate ({e})", self.identifier));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let mut lut = probe_collect_each(&replies);
            let mut pending = probe_collect_unassigned(&replies);
            pending.extend(probe_collect_duplicated(&replies));
            let mut unused = probe_collect_unused(&replies);

            for serial in pending {
                let Some(available) = unused.first().copied() else {
                    log_error(&format!("[{}] could not find available address", self.identifier));
                    break;
                };
                match self
                    .assemble_and_exchange(
                        SHORT_ADDRESS_BROADCAST,
                        FunctionCode::SetShortAddress,
                        Payload::SetShortAddress { serial, short_address: available },
                    )
                    .await
                {
                    Ok(replies) => match check_replies(FunctionCode::SetShortAddress, &replies) {
                        Ok(()) => {
                            lut.insert(serial, available);
                            unused.remove(0);
                        }
                        Err(e) => log_error(&format!(
                            "[{}] could not assign available address to {serial} ({e})",
                            self.identifier
                        )),
                    },
                    Err(e) => log_error(&format!("[{}] could not communicate ({e})", self.identifier)),
                }
            }
            self.reassociate_all(lut);
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    // -- conditioner --------------------------------------------------

    async fn conditioner_loop(self: Arc<Self>) {
        while self.is_alive() {
            for serial in self.list_seen_serials() {
                let short_address = self.look_up(serial);
                if short_address == SHORT_ADDRESS_UNASSIGNED {
                    continue;
                }
                log_info(&format!("[{}] conditioning {serial}", self.identifier));
                self.conditioner_sync(short_address).await;
                self.conditioner_toggle(short_address).await;
                self.conditioner_scale(short_address).await;
            }
            log_info(&format!("[{}] conditioned", self.identifier));
            tokio::time::sleep(CONDITIONER_INTERVAL).await;
        }
    }

    async fn conditioner_sync(&self, short_address: u8) {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as u32;
        let payload = Payload::SetTimeReference { linux_epoch: now };
        if let Err(e) = self.checked_exchange(short_address, FunctionCode::SetTimeReference, payload).await {
            log_error(&format!("[{}] failure to sync time from {short_address} ({e})", self.identifier));
        }
    }

    async fn conditioner_toggle(&self, short_address: u8) {
        let replies =
            match self.checked_exchange(short_address, FunctionCode::GetScheduleCount, Payload::Empty).await {
                Ok(replies) => replies,
                Err(e) => {
                    log_error(&format!("[{}] failure counting schedules from {short_address} ({e})", self.identifier));
                    return;
                }
            };
        let count = replies.iter().find_map(|r| match r.payload {
            Payload::ReplyGetScheduleCount { schedule_count } => Some(schedule_count),
            _ => None,
        });
        let Some(count) = count else {
            log_error(&format!("[{}] no schedule count reply from {short_address}", self.identifier));
            return;
        };
        let function_code = if count != 0 { FunctionCode::ResumeScheduling } else { FunctionCode::StopScheduling };
        if let Err(e) = self.checked_exchange(short_address, function_code, Payload::Empty).await {
            log_error(&format!("[{}] failure to toggle scheduling from {short_address} ({e})", self.identifier));
        }
    }

    async fn conditioner_scale(&self, short_address: u8) {
        let calibration = |m: u8| Payload::GetModuleCalibration { module_id: m };
        let replies0 = match self.checked_exchange(short_address, FunctionCode::GetModuleCalibration, calibration(0)).await {
            Ok(replies) => replies,
            Err(e) => {
                log_error(&format!("[{}] failure fetching module 0 calibration from {short_address} ({e})", self.identifier));
                return;
            }
        };
        let replies1 = match self.checked_exchange(short_address, FunctionCode::GetModuleCalibration, calibration(1)).await {
            Ok(replies) => replies,
            Err(e) => {
                log_error(&format!("[{}] failure fetching module 1 calibration from {short_address} ({e})", self.identifier));
                return;
            }
        };
        let (Some(calibration0), Some(calibration1)) = (
            replies0.iter().find_map(module_calibration),
            replies1.iter().find_map(module_calibration),
        ) else {
            log_error(&format!("[{}] missing module calibration reply from {short_address}", self.identifier));
            return;
        };
        let configuration = illuminance_configuration(&calibration0, &calibration1);
        if let Err(e) = self
            .checked_exchange(short_address, FunctionCode::SetIlluminanceConfiguration, Payload::SetIlluminanceConfiguration { configuration })
            .await
        {
            log_error(&format!("[{}] failure setting illuminance configuration from {short_address} ({e})", self.identifier));
        }
    }
}

pub fn module_calibration(reply: &Packet) -> Option<[ChannelCalibration; 6]> {
    match reply.payload {
        Payload::ReplyGetModuleCalibration { calibration, .. } => Some(calibration),
        _ => None,
    }
}

/// `100 / min(m0, m1)` per channel, the fixed conversion from calibration
/// slope to an illuminance-configuration coefficient.
pub fn illuminance_configuration(
    calibration0: &[ChannelCalibration; 6],
    calibration1: &[ChannelCalibration; 6],
) -> [f32; 6] {
    let mut configuration = [0f32; 6];
    for index in 0..6 {
        let min_m = calibration0[index].coefficient_m.min(calibration1[index].coefficient_m);
        configuration[index] = 100.0 / min_m;
    }
    configuration
}

/// Adjudicates a batch of replies against the function code that elicited
/// them. Set-family replies are NOK-aggregated; `ToggleCalibration` checks
/// `ack`; fire-and-forget codes must see no replies at all; everything else
/// just needs at least one.
pub fn check_replies(function_code: FunctionCode, replies: &[Packet]) -> Result<()> {
    use FunctionCode::*;
    match function_code {
        SetModuleCalibration | SetSerialNumber | SetShortAddress | SetGroupId | SetFixtureInfo | SetTimeReference
        | SetSchedule | DeleteSchedule | DeleteAllSchedules | StopScheduling | ResumeScheduling
        | SetIlluminanceConfiguration | ResetForFirmwareUpdate => {
            let entries: Vec<ErrorEntry> = replies
                .iter()
                .filter_map(|reply| match reply.payload {
                    Payload::GenericNok { error_code } => {
                        Some(ErrorEntry { short_address: reply.header.short_address, error_code })
                    }
                    _ => None,
                })
                .collect();
            if entries.is_empty() {
                Ok(())
            } else {
                Err(Error::Nack(entries))
            }
        }
        ToggleCalibration => {
            let nacked: Vec<u8> = replies
                .iter()
                .filter_map(|reply| match reply.payload {
                    Payload::ReplyToggleCalibration { ack: false } => Some(reply.header.short_address),
                    _ => None,
                })
                .collect();
            if nacked.is_empty() {
                Ok(())
            } else {
                Err(Error::ToggleCalibrationNack(nacked))
            }
        }
        SetLeds | ConfirmResetForFirmwareUpdate => {
            if replies.is_empty() {
                Ok(())
            } else {
                Err(Error::UnexpectedReply(function_code.wire()))
            }
        }
        _ => {
            if replies.is_empty() {
                Err(Error::NoReplies)
            } else {
                Ok(())
            }
        }
    }
}

fn probe_collect_each(replies: &[Packet]) -> HashMap<u32, u8> {
    replies
        .iter()
        .filter_map(|reply| match reply.payload {
            Payload::ReplyGetSerialNumber { serial } => Some((serial, reply.header.short_address)),
            _ => None,
        })
        .collect()
}

fn probe_collect_unassigned(replies: &[Packet]) -> Vec<u32> {
    replies
        .iter()
        .filter(|reply| reply.header.short_address == SHORT_ADDRESS_UNASSIGNED)
        .filter_map(|reply| match reply.payload {
            Payload::ReplyGetSerialNumber { serial } => Some(serial),
            _ => None,
        })
        .collect()
}

/// Any two distinct serials answering under the same short address are
/// duplicated, regardless of arrival order — broader than a literal port of
/// `dptr1ProbeCollectDuplicated`'s first-seen-wins bookkeeping.
fn probe_collect_duplicated(replies: &[Packet]) -> Vec<u32> {
    let mut by_address: HashMap<u8, Vec<u32>> = HashMap::new();
    for reply in replies {
        if reply.header.short_address == SHORT_ADDRESS_UNASSIGNED {
            continue;
        }
        if let Payload::ReplyGetSerialNumber { serial } = reply.payload {
            let serials = by_address.entry(reply.header.short_address).or_default();
            if !serials.contains(&serial) {
                serials.push(serial);
            }
        }
    }
    by_address.into_values().filter(|serials| serials.len() > 1).flatten().collect()
}

fn probe_collect_unused(replies: &[Packet]) -> Vec<u8> {
    let used: std::collections::HashSet<u8> = replies.iter().map(|reply| reply.header.short_address).collect();
    (SHORT_ADDRESS_BEGIN..=SHORT_ADDRESS_END).filter(|addr| !used.contains(addr)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(short_address: u8, payload: Payload) -> Packet {
        Packet {
            header: Header { client_ipv4: [0, 0, 0, 0], sequence_number: 1, short_address, function_code: 3 },
            payload,
        }
    }

    #[test]
    fn check_replies_aggregates_nacks() {
        let replies = vec![
            reply(1, Payload::GenericOk),
            reply(2, Payload::GenericNok { error_code: 7 }),
            reply(3, Payload::GenericNok { error_code: 9 }),
        ];
        let err = check_replies(FunctionCode::SetTimeReference, &replies).unwrap_err();
        match err {
            Error::Nack(entries) => assert_eq!(entries.len(), 2),
            other => panic!("expected Nack, got {other:?}"),
        }
    }

    #[test]
    fn check_replies_requires_silence_for_fire_and_forget() {
        let replies = vec![reply(1, Payload::GenericOk)];
        assert!(check_replies(FunctionCode::SetLeds, &replies).is_err());
        assert!(check_replies(FunctionCode::SetLeds, &[]).is_ok());
    }

    #[test]
    fn check_replies_requires_at_least_one_for_default_family() {
        assert!(check_replies(FunctionCode::GetSerialNumber, &[]).is_err());
        assert!(check_replies(FunctionCode::GetSerialNumber, &[reply(1, Payload::ReplyGetSerialNumber { serial: 1 })])
            .is_ok());
    }

    #[test]
    fn probe_collects_unassigned_and_duplicated_and_unused() {
        let replies = vec![
            reply(SHORT_ADDRESS_UNASSIGNED, Payload::ReplyGetSerialNumber { serial: 100 }),
            reply(5, Payload::ReplyGetSerialNumber { serial: 200 }),
            reply(5, Payload::ReplyGetSerialNumber { serial: 201 }),
            reply(6, Payload::ReplyGetSerialNumber { serial: 300 }),
        ];
        assert_eq!(probe_collect_unassigned(&replies), vec![100]);
        let mut duplicated = probe_collect_duplicated(&replies);
        duplicated.sort();
        assert_eq!(duplicated, vec![200, 201]);
        let unused = probe_collect_unused(&replies);
        assert!(!unused.contains(&5));
        assert!(!unused.contains(&6));
        assert!(unused.contains(&7));
        assert_eq!(unused.len(), (SHORT_ADDRESS_END - SHORT_ADDRESS_BEGIN + 1) as usize - 2);
    }

    #[test]
    fn illuminance_configuration_takes_the_minimum_slope() {
        let mut c0 = [ChannelCalibration { coefficient_a: 0.0, coefficient_b: 0.0, coefficient_m: 2.0 }; 6];
        let mut c1 = [ChannelCalibration { coefficient_a: 0.0, coefficient_b: 0.0, coefficient_m: 4.0 }; 6];
        c0[3].coefficient_m = 5.0;
        c1[3].coefficient_m = 1.0;
        let configuration = illuminance_configuration(&c0, &c1);
        assert_eq!(configuration[0], 50.0);
        assert_eq!(configuration[3], 100.0);
    }
}
