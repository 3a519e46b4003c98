//! Wake Protocol (§4.2): bring the remote Processing Worker from
//! asleep/off to serving, then verify readiness.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::wire::{HealthResponse, HealthStatus};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const WAKE_RETRANSMITS: [Duration; 2] = [Duration::from_secs(2), Duration::from_secs(2)];
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const POLL_WINDOW: Duration = Duration::from_secs(120);
const WOL_PORT: u16 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum WakeState {
    Unknown,
    Probing,
    Awake,
    Ready,
    Unreachable,
}

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("worker unavailable after wake attempt")]
    WorkerUnavailable,

    #[error("failed to send magic packet: {0}")]
    MagicPacketSend(#[from] std::io::Error),
}

/// Issues a readiness request to the worker's health endpoint (§4.2 step 1).
/// Returns `true` only when the worker reports `status: ready`; a
/// reachable-but-still-loading-models worker is not ready.
async fn probe_health(client: &reqwest::Client, worker_base_url: &str) -> bool {
    let url = format!("{worker_base_url}/health");
    match client.post(&url).timeout(PROBE_TIMEOUT).send().await {
        Ok(resp) if resp.status().is_success() => match resp.json::<HealthResponse>().await {
            Ok(health) => health.status == HealthStatus::Ready && health.models_loaded,
            Err(e) => {
                warn!(error = %e, "health response did not parse");
                false
            }
        },
        Ok(resp) => {
            warn!(status = %resp.status(), "health probe returned non-success");
            false
        }
        Err(e) => {
            warn!(error = %e, "health probe failed");
            false
        }
    }
}

/// Builds the 102-byte magic packet (§6): six `0xFF` bytes followed by
/// the 48-bit MAC repeated sixteen times.
fn build_magic_packet(mac: [u8; 6]) -> [u8; 102] {
    let mut packet = [0u8; 102];
    packet[..6].copy_from_slice(&[0xFF; 6]);
    for chunk in packet[6..].chunks_mut(6) {
        chunk.copy_from_slice(&mac);
    }
    packet
}

/// Sends the magic packet once, then twice more at 2s intervals (§4.2
/// step 2), to the directed broadcast address of `worker_ip`'s subnet.
async fn send_magic_packet(mac: [u8; 6], broadcast_addr: Ipv4Addr) -> Result<(), WakeError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_broadcast(true)?;
    let dest = SocketAddr::from((broadcast_addr, WOL_PORT));
    let packet = build_magic_packet(mac);

    socket.send_to(&packet, dest).await?;
    info!(%dest, "sent magic packet");

    for delay in WAKE_RETRANSMITS {
        tokio::time::sleep(delay).await;
        socket.send_to(&packet, dest).await?;
        info!(%dest, "retransmitted magic packet");
    }

    Ok(())
}

/// Derives the IPv4 directed broadcast address for a /24, the common
/// case for a single worker host on a flat LAN segment. Operators on a
/// non-/24 subnet should set `WORKER_IP` to the broadcast address
/// directly.
fn broadcast_address(worker_ip: &str) -> Result<Ipv4Addr, WakeError> {
    let addr: Ipv4Addr = worker_ip.parse().map_err(|_| WakeError::WorkerUnavailable)?;
    let octets = addr.octets();
    Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], 255))
}

/// Runs the full wake protocol (§4.2): probe, and if not ready and
/// `wake_enabled`, send the magic packet and poll until ready or the
/// 120s window expires.
pub async fn ensure_ready(
    client: &reqwest::Client,
    worker_base_url: &str,
    worker_mac: [u8; 6],
    worker_ip: Option<&str>,
    wake_enabled: bool,
) -> Result<(), WakeError> {
    let mut state = WakeState::Probing;
    if probe_health(client, worker_base_url).await {
        state = WakeState::Ready;
        info!(?state, "worker already ready");
        return Ok(());
    }

    if !wake_enabled {
        state = WakeState::Unreachable;
        warn!(?state, "worker unreachable and wake disabled");
        return Err(WakeError::WorkerUnavailable);
    }

    let worker_ip = worker_ip.ok_or(WakeError::WorkerUnavailable)?;
    let broadcast = broadcast_address(worker_ip)?;
    send_magic_packet(worker_mac, broadcast).await?;
    state = WakeState::Awake;
    info!(?state, "magic packet sent, polling for readiness");

    let deadline = Instant::now() + POLL_WINDOW;
    while Instant::now() < deadline {
        tokio::time::sleep(POLL_INTERVAL).await;
        if probe_health(client, worker_base_url).await {
            state = WakeState::Ready;
            info!(?state, "worker became ready after wake");
            return Ok(());
        }
    }

    state = WakeState::Unreachable;
    warn!(?state, "worker did not become ready within the poll window");
    Err(WakeError::WorkerUnavailable)
}
