//! Broadcast-capable UDP transport used for gateway discovery.
//!
//! Binds to the first available port in an ephemeral range, runs a single
//! receive loop fanning observations out to every subscriber, and exposes a
//! throttled `transmit` so bursts of outbound discovery requests stay spaced
//! out.

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};
use tokio::time::timeout;

use crate::constants::{UDP_BACKOFF, UDP_EPHEMERAL_PORT_RANGE, UDP_READ_DEADLINE};
use crate::error::{Error, Result};
use crate::logging::{log_debug, log_error, log_info};

/// A single UDP datagram observed on the socket, filtered to those whose
/// source port matches the broadcaster's `target_port`.
#[derive(Debug, Clone)]
pub struct Observation {
    pub address: Ipv4Addr,
    pub port: u16,
    pub buffer: Vec<u8>,
}

/// Owns one UDP socket and fans out datagrams from `target_port` senders to
/// any number of subscribers.
pub struct UdpBroadcaster {
    socket: Arc<UdpSocket>,
    target_port: u16,
    running: Arc<AtomicBool>,
    last_transmission: Mutex<Instant>,
    tx: broadcast::Sender<Observation>,
}

impl UdpBroadcaster {
    /// Binds an ephemeral UDP socket and starts the background receive loop.
    pub async fn bind(target_port: u16) -> Result<Self> {
        let socket = bind_ephemeral().await?;
        let (tx, _rx) = broadcast::channel(100);
        let broadcaster = UdpBroadcaster {
            socket: Arc::new(socket),
            target_port,
            running: Arc::new(AtomicBool::new(true)),
            last_transmission: Mutex::new(Instant::now() - UDP_BACKOFF),
            tx,
        };
        broadcaster.spawn_receive_loop();
        Ok(broadcaster)
    }

    fn spawn_receive_loop(&self) {
        let socket = self.socket.clone();
        let running = self.running.clone();
        let tx = self.tx.clone();
        let target_port = self.target_port;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1024 * 1024];
            while running.load(Ordering::SeqCst) {
                match timeout(UDP_READ_DEADLINE, socket.recv_from(&mut buf)).await {
                    Ok(Ok((read, addr))) => {
                        if addr.port() == target_port {
                            if let std::net::IpAddr::V4(ip) = addr.ip() {
                                log_debug(&format!("UDP read {read} bytes from {ip}:{}", addr.port()));
                                let observation =
                                    Observation { address: ip, port: addr.port(), buffer: buf[..read].to_vec() };
                                let _ = tx.send(observation);
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        log_error(&format!("UDP read failed ({e}), backing off"));
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                    Err(_) => {}
                }
            }
        });
    }

    /// Subscribes to observations. Each subscriber gets every datagram
    /// independently; lagging subscribers drop the oldest entries.
    pub fn subscribe(&self) -> broadcast::Receiver<Observation> {
        self.tx.subscribe()
    }

    /// Sends `request` to `destination:port`, spacing sends at least
    /// [`UDP_BACKOFF`] apart.
    pub async fn transmit(&self, destination: Ipv4Addr, port: u16, request: &[u8]) -> Result<()> {
        self.backoff().await;
        let written = self
            .socket
            .send_to(request, (destination, port))
            .await
            .map_err(|e| Error::Transport(format!("UDP write to {destination}:{port} failed: {e}")))?;
        if written != request.len() {
            return Err(Error::Transport(format!(
                "UDP wrote only {written} of {} bytes to {destination}:{port}",
                request.len()
            )));
        }
        *self.last_transmission.lock().await = Instant::now();
        Ok(())
    }

    async fn backoff(&self) {
        let elapsed = self.last_transmission.lock().await.elapsed();
        if elapsed < UDP_BACKOFF {
            tokio::time::sleep(UDP_BACKOFF - elapsed).await;
        }
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

async fn bind_ephemeral() -> Result<UdpSocket> {
    for port in UDP_EPHEMERAL_PORT_RANGE {
        match UdpSocket::bind(("0.0.0.0", port)).await {
            Ok(socket) => {
                log_info(&format!("UDP listening on 0.0.0.0:{port}"));
                return Ok(socket);
            }
            Err(e) => log_debug(&format!("UDP failed to bind 0.0.0.0:{port} ({e}), moving on")),
        }
    }
    Err(Error::Transport("UDP cannot find an available port".into()))
}

/// Lists the broadcast address of every up, non-loopback, broadcast-capable
/// IPv4 interface. Falls back to the global broadcast address if none are
/// found (e.g. in a sandboxed test environment).
pub fn broadcast_addresses() -> Vec<Ipv4Addr> {
    let mut all = Vec::new();
    match if_addrs::get_if_addrs() {
        Ok(interfaces) => {
            for iface in interfaces {
                if iface.is_loopback() {
                    continue;
                }
                if let if_addrs::IfAddr::V4(v4) = iface.addr {
                    if let Some(broadcast) = v4.broadcast {
                        all.push(broadcast);
                    }
                }
            }
        }
        Err(e) => log_error(&format!("could not iterate network interfaces ({e})")),
    }
    if all.is_empty() {
        all.push(Ipv4Addr::BROADCAST);
    }
    log_info(&format!("UDP broadcast addresses - {all:?}"));
    all
}

/// Finds the local interface address sharing a subnet with `other`, falling
/// back to the global broadcast address if none matches.
pub fn match_own_address(other: Ipv4Addr) -> Ipv4Addr {
    let mut matched = Ipv4Addr::BROADCAST;
    if let Ok(interfaces) = if_addrs::get_if_addrs() {
        for iface in interfaces {
            if iface.is_loopback() {
                continue;
            }
            if let if_addrs::IfAddr::V4(v4) = iface.addr {
                if network_matches(v4.ip, v4.netmask, other) {
                    matched = v4.ip;
                    break;
                }
            }
        }
    }
    log_info(&format!("UDP matched {matched} to own interface for {other}"));
    matched
}

fn network_matches(own: Ipv4Addr, netmask: Ipv4Addr, other: Ipv4Addr) -> bool {
    let own_net = u32::from(own) & u32::from(netmask);
    let other_net = u32::from(other) & u32::from(netmask);
    own_net == other_net
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_matches_same_subnet() {
        let own = Ipv4Addr::new(192, 168, 1, 10);
        let netmask = Ipv4Addr::new(255, 255, 255, 0);
        let other = Ipv4Addr::new(192, 168, 1, 200);
        assert!(network_matches(own, netmask, other));
        let outside = Ipv4Addr::new(192, 168, 2, 200);
        assert!(!network_matches(own, netmask, outside));
    }

    #[tokio::test]
    async fn transmit_reaches_a_loopback_peer() {
        let responder = UdpSocket::bind(("127.0.0.1", 0)).await.expect("bind responder");
        let responder_port = responder.local_addr().unwrap().port();

        let broadcaster = UdpBroadcaster::bind(responder_port).await.expect("bind");
        broadcaster.transmit(Ipv4Addr::LOCALHOST, responder_port, b"hello").await.unwrap();

        let mut buf = [0u8; 16];
        let (n, _) = responder.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        broadcaster.shutdown();
    }

    #[tokio::test]
    async fn receive_loop_notifies_subscribers_from_target_port() {
        let responder = UdpSocket::bind(("127.0.0.1", 0)).await.expect("bind responder");
        let responder_port = responder.local_addr().unwrap().port();

        let broadcaster = UdpBroadcaster::bind(responder_port).await.expect("bind");
        let mut rx = broadcaster.subscribe();
        let broadcaster_addr = broadcaster.socket.local_addr().unwrap();

        responder.send_to(b"reply", broadcaster_addr).await.unwrap();

        let observation = timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(observation.buffer, b"reply");
        assert_eq!(observation.port, responder_port);
        broadcaster.shutdown();
    }
}
