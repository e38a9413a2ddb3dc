//! Gateway discovery: periodic UDP broadcast, reply validation, per-port
//! transport spawning, and forgetting of adapters that stop answering.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::constants::{
    port_count, DISCOVERY_INTERVAL, DISCOVERY_PORT, DISCOVERY_REPLY_LEN, DISCOVERY_REPLY_LENGTH_OFFSET,
    DISCOVERY_REPLY_MAC_OFFSET, DISCOVERY_REPLY_MODEL_VARIANT_OFFSET, DISCOVERY_REQUEST, FORGETTING_FACTOR,
    GATEWAY_OUI,
};
use crate::error::{Error, Result};
use crate::logging::{log_error, log_info};

use super::transport::{identify, PortTransport};
use super::udp::{broadcast_addresses, UdpBroadcaster};

/// Discovers gateways on the network and keeps one [`PortTransport`] alive
/// per discovered `ip:port`, forgetting ones that go quiet for too long.
pub struct GatewayDiscoverer {
    udp: UdpBroadcaster,
    conditioning: bool,
    transports: Mutex<HashMap<String, Arc<PortTransport>>>,
}

impl GatewayDiscoverer {
    /// Binds the discovery socket and spawns the receive, probe, and
    /// forgetting background tasks.
    pub async fn start(conditioning: bool) -> Result<Arc<Self>> {
        let udp = UdpBroadcaster::bind(DISCOVERY_PORT).await?;
        let discoverer = Arc::new(GatewayDiscoverer { udp, conditioning, transports: Mutex::new(HashMap::new()) });
        tokio::spawn(discoverer.clone().process_loop());
        tokio::spawn(discoverer.clone().probe_routine());
        tokio::spawn(discoverer.clone().forgetting_routine());
        Ok(discoverer)
    }

    async fn process_loop(self: Arc<Self>) {
        let mut rx = self.udp.subscribe();
        while self.udp.running() {
            match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
                Err(_) => continue, // no datagram within the deadline; recheck `running`
                Ok(Ok(observation)) => {
                    log_info(&format!(
                        "[{}:{}] -> {} bytes",
                        observation.address,
                        observation.port,
                        observation.buffer.len()
                    ));
                    if observation.port != DISCOVERY_PORT {
                        continue;
                    }
                    let Some(ports) = check_reply(&observation.buffer) else { continue };
                    for offset in 0..ports {
                        let port = crate::constants::BASE_TCP_PORT + offset as u16;
                        self.clone().spawn_transport(observation.address, port);
                    }
                }
                Ok(Err(tokio::sync::broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => break,
            }
        }
    }

    fn spawn_transport(self: Arc<Self>, address: Ipv4Addr, port: u16) {
        let identifier = identify(address, port);
        let mut transports = self.transports.lock().unwrap();
        if transports.contains_key(&identifier) {
            return;
        }
        let transport = PortTransport::new(address, port);
        transport.activate(self.conditioning);
        transports.insert(identifier, transport);
    }

    async fn probe_routine(self: Arc<Self>) {
        while self.udp.running() {
            sleep(DISCOVERY_INTERVAL).await;
            for broadcast in broadcast_addresses() {
                if let Err(e) = self.udp.transmit(broadcast, DISCOVERY_PORT, &DISCOVERY_REQUEST).await {
                    log_error(&format!("failed to broadcast the discovery request to {broadcast} ({e})"));
                }
            }
        }
    }

    async fn forgetting_routine(self: Arc<Self>) {
        let threshold = DISCOVERY_INTERVAL * FORGETTING_FACTOR;
        while self.udp.running() {
            sleep(DISCOVERY_INTERVAL).await;
            let now = Instant::now();
            self.transports.lock().unwrap().retain(|_, transport| now.duration_since(transport.last_seen()) <= threshold);
        }
    }

    /// Blocks (polling once a second) until at least one transport has seen
    /// any fixture, or `timeout` elapses.
    pub async fn wait_for_any_serials(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, |transports| {
            transports.iter().any(|transport| !transport.list_seen_serials().is_empty())
        })
        .await
    }

    /// Blocks until every serial in `serials` has been seen by some
    /// transport, or `timeout` elapses.
    pub async fn wait_for_serials(&self, serials: &[u32], timeout: Duration) -> bool {
        self.wait_for(timeout, |transports| {
            let mut seen = std::collections::HashSet::new();
            for transport in transports {
                seen.extend(transport.list_seen_serials());
            }
            serials.iter().all(|serial| seen.contains(serial))
        })
        .await
    }

    /// `0` means "any fixture"; otherwise waits for that one serial.
    pub async fn wait_for_serial(&self, serial: u32, timeout: Duration) -> bool {
        if serial == 0 {
            self.wait_for_any_serials(timeout).await
        } else {
            self.wait_for_serials(&[serial], timeout).await
        }
    }

    async fn wait_for(&self, timeout: Duration, predicate: impl Fn(&[Arc<PortTransport>]) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let transports: Vec<Arc<PortTransport>> = self.transports.lock().unwrap().values().cloned().collect();
            if predicate(&transports) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    /// Returns every transport that has seen `serial` (or all transports, if
    /// `serial == 0`).
    pub fn look_up(&self, serial: u32) -> Vec<Arc<PortTransport>> {
        self.transports
            .lock()
            .unwrap()
            .values()
            .filter(|transport| serial == 0 || transport.check_seen_serials(&[serial]))
            .cloned()
            .collect()
    }

    pub fn transport_count(&self) -> usize {
        self.transports.lock().unwrap().len()
    }

    /// Stops the UDP broadcaster; the three background loops here observe
    /// its shared `running` flag and exit within one second. Per-transport
    /// tasks are unaffected — they live and die by their own traffic.
    pub fn shutdown(&self) {
        self.udp.shutdown();
    }
}

/// Validates a discovery reply's fixed length, length field, and OUI, then
/// returns the gateway's serial port count.
fn check_reply(buffer: &[u8]) -> Option<u32> {
    if buffer.len() != DISCOVERY_REPLY_LEN {
        log_error("invalid length of a discovery reply");
        return None;
    }
    if buffer[DISCOVERY_REPLY_LENGTH_OFFSET] as usize != DISCOVERY_REPLY_LEN {
        log_error("invalid length field in a discovery reply");
        return None;
    }
    let oui = &buffer[DISCOVERY_REPLY_MAC_OFFSET..DISCOVERY_REPLY_MAC_OFFSET + GATEWAY_OUI.len()];
    if oui != GATEWAY_OUI {
        log_error("invalid OUI in a discovery reply");
        return None;
    }
    port_count(buffer[DISCOVERY_REPLY_MODEL_VARIANT_OFFSET]).ok_or(Error::Other("unknown model variant".into())).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_bytes(variant_nibble: u8) -> Vec<u8> {
        let mut buf = vec![0u8; DISCOVERY_REPLY_LEN];
        buf[DISCOVERY_REPLY_LENGTH_OFFSET] = DISCOVERY_REPLY_LEN as u8;
        buf[DISCOVERY_REPLY_MODEL_VARIANT_OFFSET] = variant_nibble;
        buf[DISCOVERY_REPLY_MAC_OFFSET..DISCOVERY_REPLY_MAC_OFFSET + 3].copy_from_slice(&GATEWAY_OUI);
        buf
    }

    #[test]
    fn valid_reply_yields_port_count() {
        assert_eq!(check_reply(&reply_bytes(4)), Some(4));
        assert_eq!(check_reply(&reply_bytes(8)), Some(16));
    }

    #[test]
    fn wrong_length_is_rejected() {
        let mut buf = reply_bytes(1);
        buf.push(0);
        assert_eq!(check_reply(&buf), None);
    }

    #[test]
    fn wrong_oui_is_rejected() {
        let mut buf = reply_bytes(1);
        buf[DISCOVERY_REPLY_MAC_OFFSET] = 0xAB;
        assert_eq!(check_reply(&buf), None);
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert_eq!(check_reply(&reply_bytes(0x0F)), None);
    }
}
