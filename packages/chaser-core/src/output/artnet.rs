//! Art-Net UDP output.
//!
//! Ships each universe's latest DMX frame as an Art-DMX (OpOutput) datagram
//! and retransmits the cached frames on a short refresh so fixtures never
//! latch stale data after a lost packet. Send errors are logged and skipped;
//! the cache survives and the next pass retries.

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{ChaserError, ChaserResult};
use crate::model::ArtnetOutputConfig;
use crate::protocol_constants::{
    artnet_refresh_interval, ARTNET_HEADER_SIZE, ARTNET_MAX_UNIVERSE, ARTNET_OPCODE_OUTPUT,
    ARTNET_PROTOCOL_VERSION, DMX_UNIVERSE_SIZE,
};
use crate::render::{Output, RenderPacket};

/// Encodes one Art-DMX datagram: the fixed 18-byte header plus the payload.
///
/// Sequence is pinned to 0, which tells receivers to disable sequence
/// handling; the refresh loop makes reordering harmless.
#[must_use]
pub fn encode_art_dmx(universe: u16, dmx: &[u8; DMX_UNIVERSE_SIZE]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ARTNET_HEADER_SIZE + DMX_UNIVERSE_SIZE);
    buf.put_slice(b"Art-Net\0");
    buf.put_u16_le(ARTNET_OPCODE_OUTPUT);
    buf.put_u16(ARTNET_PROTOCOL_VERSION);
    buf.put_u8(0); // sequence
    buf.put_u8(0); // physical input port
    buf.put_u16_le(universe & ARTNET_MAX_UNIVERSE);
    buf.put_u16(DMX_UNIVERSE_SIZE as u16);
    buf.put_slice(dmx);
    buf.freeze()
}

/// Datagram transport, injectable for tests.
#[async_trait]
pub trait ArtNetTransport: Send + Sync {
    /// Sends one datagram to the configured target.
    async fn send(&self, datagram: &[u8]) -> io::Result<()>;
}

/// Real UDP transport bound to an ephemeral port.
pub struct UdpArtNetTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpArtNetTransport {
    /// Resolves the target and binds a broadcast-capable socket.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let target = lookup_host((host, port))
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
            })?;
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.set_broadcast(true)?;
        Ok(Self { socket, target })
    }
}

#[async_trait]
impl ArtNetTransport for UdpArtNetTransport {
    async fn send(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send_to(datagram, self.target).await.map(|_| ())
    }
}

/// Art-Net output bound to one configured target.
///
/// Owns the per-universe frame cache (insertion order) and the flush task.
/// `push` never blocks: it updates the cache and requests a flush; the task
/// serializes sends and drains coalesced requests before idling.
pub struct ArtNetOutput {
    name: String,
    universes: Option<HashSet<u16>>,
    cache: Arc<Mutex<Vec<(u16, [u8; DMX_UNIVERSE_SIZE])>>>,
    flush: Arc<Notify>,
    cancel: CancellationToken,
}

impl ArtNetOutput {
    /// Connects a UDP transport for the configured target and starts the
    /// refresh loop at the environment-configured period.
    pub async fn connect(config: &ArtnetOutputConfig) -> ChaserResult<Self> {
        let transport = UdpArtNetTransport::connect(&config.host, config.port)
            .await
            .map_err(|err| ChaserError::OutputInit {
                output: config.id.clone(),
                reason: err.to_string(),
            })?;
        log::info!(
            "[ArtNet] Output '{}' sending to {}:{}",
            config.id,
            config.host,
            config.port
        );
        Ok(Self::with_transport(
            config,
            Arc::new(transport),
            artnet_refresh_interval(),
        ))
    }

    /// Starts the output over an arbitrary transport (tests inject mocks).
    #[must_use]
    pub fn with_transport(
        config: &ArtnetOutputConfig,
        transport: Arc<dyn ArtNetTransport>,
        refresh: Duration,
    ) -> Self {
        let cache: Arc<Mutex<Vec<(u16, [u8; DMX_UNIVERSE_SIZE])>>> =
            Arc::new(Mutex::new(Vec::new()));
        let flush = Arc::new(Notify::new());
        let cancel = CancellationToken::new();

        spawn_flush_loop(
            Arc::clone(&cache),
            Arc::clone(&flush),
            cancel.clone(),
            transport,
            refresh,
        );

        Self {
            name: config.id.clone(),
            universes: config
                .universes
                .as_ref()
                .map(|list| list.iter().copied().collect()),
            cache,
            flush,
            cancel,
        }
    }
}

impl Drop for ArtNetOutput {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Output for ArtNetOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn push(&self, packet: &RenderPacket) {
        let mut cache = self.cache.lock();
        for (&universe, dmx) in &packet.dmx_by_universe {
            if let Some(allowed) = &self.universes {
                if !allowed.contains(&universe) {
                    continue;
                }
            }
            match cache.iter_mut().find(|(u, _)| *u == universe) {
                Some(entry) => entry.1 = *dmx,
                None => cache.push((universe, *dmx)),
            }
        }
        drop(cache);
        self.flush.notify_one();
    }
}

/// Flush loop: wakes on request or refresh tick and sends every cached
/// frame once per pass.
///
/// `Notify` gives the flush-again semantics for free: a request landing
/// during an in-flight pass stores a permit, so the loop immediately runs
/// one more pass before parking.
fn spawn_flush_loop(
    cache: Arc<Mutex<Vec<(u16, [u8; DMX_UNIVERSE_SIZE])>>>,
    flush: Arc<Notify>,
    cancel: CancellationToken,
    transport: Arc<dyn ArtNetTransport>,
    refresh: Duration,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = flush.notified() => {}
                _ = interval.tick() => {}
            }
            let frames = cache.lock().clone();
            for (universe, dmx) in frames {
                if let Err(err) = transport.send(&encode_art_dmx(universe, &dmx)).await {
                    log::warn!("[ArtNet] Send failed for universe {universe}: {err}");
                }
            }
        }
    });
}
