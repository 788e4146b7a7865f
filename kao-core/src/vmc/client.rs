//! The VMC UDP client.
//!
//! Binds a local UDP endpoint, sends blend-shape commands to a fixed
//! peer, and decodes inbound telemetry. UDP gives no transport-level
//! disconnect signal, so liveness is a soft failure detector: a
//! watchdog flips the status to disconnected after a silence threshold
//! and back once telemetry resumes.

use super::osc;
use crate::DEFAULT_CHANNEL_BUFFER;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Connection parameters for the VMC peer.
#[derive(Debug, Clone)]
pub struct VmcConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Local bind port; 0 lets the OS pick.
    pub local_port: u16,
    /// How often the liveness watchdog runs.
    pub watchdog_interval: Duration,
    /// Silence longer than this flips the status to disconnected.
    pub silence_threshold: Duration,
}

impl Default for VmcConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 39539,
            local_port: 0,
            watchdog_interval: Duration::from_secs(5),
            silence_threshold: Duration::from_secs(10),
        }
    }
}

/// Snapshot of the protocol connection.
#[derive(Debug, Clone, PartialEq)]
pub struct VmcStatus {
    pub connected: bool,
    pub host: IpAddr,
    pub port: u16,
    pub last_telemetry: Option<OffsetDateTime>,
}

/// One decoded blend-shape telemetry sample. Ephemeral: handed to
/// subscribers and dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendShapeSample {
    pub shape: String,
    pub value: f32,
}

/// Errors raised while establishing the VMC connection.
#[derive(Debug, thiserror::Error)]
pub enum VmcError {
    #[error("failed to bind UDP socket: {0}")]
    Bind(#[from] std::io::Error),
}

/// Entry point for connecting to a VMC peer.
pub struct VmcClient;

impl VmcClient {
    /// Bind the local endpoint and start the driver task.
    ///
    /// The returned handle is cheap to clone; dropping every clone does
    /// not stop the driver — call [`VmcHandle::disconnect`] for that.
    pub async fn connect(config: VmcConfig) -> Result<VmcHandle, VmcError> {
        let socket =
            UdpSocket::bind((IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.local_port)).await?;
        let local = socket.local_addr()?;
        let socket = Arc::new(socket);
        let peer = SocketAddr::new(config.host, config.port);

        let (connected_tx, connected_rx) = watch::channel(true);
        let (blend_tx, _) = broadcast::channel(DEFAULT_CHANNEL_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let last_seen = Arc::new(Mutex::new(None));

        let driver = Driver {
            socket: socket.clone(),
            config: config.clone(),
            connected_tx,
            blend_tx: blend_tx.clone(),
            last_seen: last_seen.clone(),
        };
        tokio::spawn(driver.run(shutdown_rx));

        info!(%local, %peer, "VMC client connected");
        Ok(VmcHandle {
            socket,
            peer,
            connected_rx,
            blend_tx,
            last_seen,
            shutdown_tx,
        })
    }
}

/// Cloneable handle to a running VMC client.
#[derive(Clone)]
pub struct VmcHandle {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
    connected_rx: watch::Receiver<bool>,
    blend_tx: broadcast::Sender<BlendShapeSample>,
    last_seen: Arc<Mutex<Option<OffsetDateTime>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl VmcHandle {
    /// Send a blend-shape command to the peer.
    ///
    /// The intensity is clamped to `[0, 1]` before encoding. A no-op
    /// with a diagnostic when the client is disconnected; never fails.
    pub fn send_expression(&self, shape: &str, intensity: f32) {
        if !*self.connected_rx.borrow() {
            warn!(shape, "VMC not connected, expression dropped");
            return;
        }
        let value = intensity.clamp(0.0, 1.0);
        let packet = osc::encode_blend_apply(shape, value);
        match self.socket.try_send_to(&packet, self.peer) {
            Ok(_) => debug!(shape, value, "sent blend shape"),
            Err(e) => warn!(shape, error = %e, "failed to send blend shape"),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> VmcStatus {
        let last_telemetry = self.last_seen.lock().map(|g| *g).unwrap_or(None);
        VmcStatus {
            connected: *self.connected_rx.borrow(),
            host: self.peer.ip(),
            port: self.peer.port(),
            last_telemetry,
        }
    }

    /// Subscribe to blend-shape telemetry.
    pub fn subscribe_blend_shapes(&self) -> broadcast::Receiver<BlendShapeSample> {
        self.blend_tx.subscribe()
    }

    /// Subscribe to connected-flag transitions.
    pub fn subscribe_status(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    /// Stop the driver and the watchdog, and mark the client
    /// disconnected. Calling this twice is a no-op with a diagnostic.
    pub fn disconnect(&self) {
        if *self.shutdown_tx.borrow() {
            debug!("VMC client already disconnected");
            return;
        }
        let _ = self.shutdown_tx.send(true);
        info!("VMC client disconnected");
    }

    /// Local endpoint address, mainly useful for tests and diagnostics.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

struct Driver {
    socket: Arc<UdpSocket>,
    config: VmcConfig,
    connected_tx: watch::Sender<bool>,
    blend_tx: broadcast::Sender<BlendShapeSample>,
    last_seen: Arc<Mutex<Option<OffsetDateTime>>>,
}

impl Driver {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut buf = vec![0u8; 1536];
        let mut last_telemetry = Instant::now();
        let mut watchdog = tokio::time::interval(self.config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of an interval fires immediately.
        watchdog.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = watchdog.tick() => {
                    let silent = last_telemetry.elapsed() > self.config.silence_threshold;
                    if silent && *self.connected_tx.borrow() {
                        warn!(
                            threshold_secs = self.config.silence_threshold.as_secs(),
                            "no VMC telemetry within threshold, marking disconnected"
                        );
                        let _ = self.connected_tx.send(false);
                    }
                }

                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, _from)) => {
                        last_telemetry = Instant::now();
                        self.record_telemetry();
                        if !*self.connected_tx.borrow() {
                            info!("VMC telemetry resumed, marking connected");
                            let _ = self.connected_tx.send(true);
                        }
                        match osc::decode(&buf[..len]) {
                            Ok(msg) => self.handle_message(msg),
                            // One corrupt packet must not break the stream.
                            Err(e) => debug!(error = %e, "dropping undecodable VMC packet"),
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "VMC socket receive error");
                    }
                }
            }
        }

        let _ = self.connected_tx.send(false);
        debug!("VMC driver stopped");
    }

    fn record_telemetry(&self) {
        if let Ok(mut guard) = self.last_seen.lock() {
            *guard = Some(OffsetDateTime::now_utc());
        }
    }

    fn handle_message(&self, msg: osc::OscMessage) {
        let Some(suffix) = msg.address.strip_prefix(osc::BLEND_VALUE_PREFIX) else {
            // Bone/root transforms and other VMC traffic still count as
            // liveness but carry nothing the relay consumes.
            return;
        };
        let shape = suffix.trim_start_matches('/');
        if shape.is_empty() {
            return;
        }
        let Some(value) = msg.first_float() else {
            debug!(address = %msg.address, "blend value frame without float argument");
            return;
        };
        let _ = self.blend_tx.send(BlendShapeSample {
            shape: shape.to_owned(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn peer_socket() -> (Arc<UdpSocket>, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (Arc::new(socket), addr)
    }

    fn config_for(peer: SocketAddr) -> VmcConfig {
        VmcConfig {
            host: peer.ip(),
            port: peer.port(),
            ..VmcConfig::default()
        }
    }

    #[tokio::test]
    async fn intensity_is_clamped_before_encoding() {
        let (peer, peer_addr) = peer_socket().await;
        let handle = VmcClient::connect(config_for(peer_addr)).await.unwrap();
        // Park the runtime once so the reactor observes the socket's
        // write readiness; until then the synchronous `try_send_to`
        // sees no cached readiness and drops the packet as WouldBlock.
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.send_expression("Joy", 1.5);
        let mut buf = [0u8; 256];
        let (len, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let msg = osc::decode(&buf[..len]).unwrap();
        assert_eq!(msg.address, osc::BLEND_APPLY_ADDR);
        assert_eq!(
            msg.args,
            vec![osc::OscArg::Str("Joy".into()), osc::OscArg::Float(1.0)]
        );

        handle.send_expression("Sorrow", -0.3);
        let (len, _) = timeout(Duration::from_secs(2), peer.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let msg = osc::decode(&buf[..len]).unwrap();
        assert_eq!(
            msg.args,
            vec![osc::OscArg::Str("Sorrow".into()), osc::OscArg::Float(0.0)]
        );

        handle.disconnect();
    }

    #[tokio::test]
    async fn telemetry_fans_out_and_refreshes_status() {
        let (peer, peer_addr) = peer_socket().await;
        let handle = VmcClient::connect(config_for(peer_addr)).await.unwrap();
        let mut samples = handle.subscribe_blend_shapes();
        let local = handle.local_addr().unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port());

        assert_eq!(handle.status().last_telemetry, None);

        let packet = osc::encode_blend_value("Joy", 0.5);
        peer.send_to(&packet, target).await.unwrap();

        let sample = timeout(Duration::from_secs(2), samples.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            sample,
            BlendShapeSample {
                shape: "Joy".into(),
                value: 0.5
            }
        );
        assert!(handle.status().last_telemetry.is_some());
        assert!(handle.status().connected);

        handle.disconnect();
    }

    #[tokio::test]
    async fn corrupt_packet_does_not_break_the_stream() {
        let (peer, peer_addr) = peer_socket().await;
        let handle = VmcClient::connect(config_for(peer_addr)).await.unwrap();
        let mut samples = handle.subscribe_blend_shapes();
        let local = handle.local_addr().unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port());

        peer.send_to(b"\xff\xfe\xfd", target).await.unwrap();
        peer.send_to(&osc::encode_blend_value("Fun", 0.9), target)
            .await
            .unwrap();

        let sample = timeout(Duration::from_secs(2), samples.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sample.shape, "Fun");

        handle.disconnect();
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_marks_silent_peer_disconnected() {
        let handle = VmcClient::connect(VmcConfig::default()).await.unwrap();
        assert!(handle.status().connected);
        // Let the spawned driver start its clocks at t=0 before the
        // virtual clock jumps.
        tokio::task::yield_now().await;

        // Watchdog runs every 5s; the tick at t=15s sees 15s of silence,
        // which exceeds the 10s threshold.
        tokio::time::advance(Duration::from_secs(16)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(!handle.status().connected);
        handle.disconnect();
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_spares_a_peer_within_the_window() {
        let handle = VmcClient::connect(VmcConfig::default()).await.unwrap();

        // Two watchdog passes with under 10s of silence each.
        tokio::time::advance(Duration::from_secs(6)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(handle.status().connected);

        handle.disconnect();
    }

    #[tokio::test]
    async fn telemetry_within_window_keeps_peer_connected() {
        // Real clock with short intervals: packet arrival has to race
        // the watchdog for this property, which the virtual clock
        // cannot reproduce faithfully.
        let (peer, peer_addr) = peer_socket().await;
        let config = VmcConfig {
            watchdog_interval: Duration::from_millis(50),
            silence_threshold: Duration::from_millis(200),
            ..config_for(peer_addr)
        };
        let handle = VmcClient::connect(config).await.unwrap();
        let mut samples = handle.subscribe_blend_shapes();
        let local = handle.local_addr().unwrap();
        let target = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), local.port());

        // A peer chatting every ~100ms stays connected well past the
        // 200ms threshold measured from connect.
        for _ in 0..6 {
            peer.send_to(&osc::encode_blend_value("Joy", 0.4), target)
                .await
                .unwrap();
            timeout(Duration::from_secs(2), samples.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(handle.status().connected);
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        // Silence past the threshold still flips it, so the timer was
        // genuinely being reset rather than never armed.
        let mut status = handle.subscribe_status();
        timeout(Duration::from_secs(2), status.wait_for(|connected| !*connected))
            .await
            .unwrap()
            .unwrap();

        handle.disconnect();
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let (_peer, peer_addr) = peer_socket().await;
        let handle = VmcClient::connect(config_for(peer_addr)).await.unwrap();
        let mut status = handle.subscribe_status();

        handle.disconnect();
        timeout(Duration::from_secs(2), status.wait_for(|connected| !*connected))
            .await
            .unwrap()
            .unwrap();

        // Second call is a logged no-op.
        handle.disconnect();
        assert!(!handle.status().connected);
        handle.send_expression("Joy", 1.0); // dropped, no panic
    }
}
