//! UDP transport session.
//!
//! Owns the outbound telemetry socket, the inbound command socket and the
//! receive worker thread. The host drives [`TransportSession::tick`] once per
//! frame; the worker blocks on the command socket and hands decoded effects
//! back to the tick through a channel.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use telem_protocol::{decode_command, encode_line};

use crate::config::BridgeConfig;
use crate::control::{apply_controls, BatchSink, CommandDispatcher, SharedControls, SinkWrite};
use crate::error::SessionError;
use crate::snapshot::SnapshotBuilder;
use crate::xplm_shim::{ControlSink, TelemetrySource};

const WORKER_NAME: &str = "telemffb-rx";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Outbound datagram counters since the session was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub sent: u64,
    pub dropped: u64,
}

// ── Running resources ─────────────────────────────────────────────────────────

struct Running {
    outbound: UdpSocket,
    command_addr: SocketAddr,
    builder: SnapshotBuilder,
    batches: mpsc::Receiver<Vec<SinkWrite>>,
    shutdown: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

// ── TransportSession ──────────────────────────────────────────────────────────

pub struct TransportSession {
    config: BridgeConfig,
    state: SessionState,
    controls: SharedControls,
    stats: SessionStats,
    running: Option<Running>,
}

impl TransportSession {
    pub fn new(config: BridgeConfig) -> Self {
        TransportSession {
            config,
            state: SessionState::Stopped,
            controls: SharedControls::new(),
            stats: SessionStats::default(),
            running: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn controls(&self) -> &SharedControls {
        &self.controls
    }

    pub fn telemetry_addr(&self) -> SocketAddr {
        self.config.telemetry_addr
    }

    /// Local address of the command socket while running.
    pub fn command_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.command_addr)
    }

    /// Bind both sockets and spawn the receive worker.
    ///
    /// On error no resources are kept and the session is back in `Stopped`.
    pub fn start<S: TelemetrySource + ?Sized>(&mut self, host: &S) -> Result<(), SessionError> {
        if self.state != SessionState::Stopped {
            return Err(SessionError::InvalidState(self.state));
        }
        self.state = SessionState::Starting;

        match self.open(host) {
            Ok(running) => {
                tracing::info!(
                    telemetry = %self.config.telemetry_addr,
                    commands = %running.command_addr,
                    tier = ?running.builder.tier(),
                    "telemetry session running"
                );
                self.running = Some(running);
                self.state = SessionState::Running;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "telemetry session failed to start");
                self.state = SessionState::Stopped;
                Err(e)
            }
        }
    }

    fn open<S: TelemetrySource + ?Sized>(&self, host: &S) -> Result<Running, SessionError> {
        let builder = SnapshotBuilder::probe(host);

        let outbound_addr = unspecified_for(self.config.telemetry_addr);
        let outbound = UdpSocket::bind(outbound_addr).map_err(|source| SessionError::Bind {
            role: "telemetry",
            addr: outbound_addr,
            source,
        })?;
        if outbound_addr.is_ipv4() {
            outbound.set_broadcast(true).map_err(SessionError::Socket)?;
        }
        outbound.set_nonblocking(true).map_err(SessionError::Socket)?;

        let inbound = UdpSocket::bind(self.config.command_addr).map_err(|source| SessionError::Bind {
            role: "command",
            addr: self.config.command_addr,
            source,
        })?;
        inbound
            .set_read_timeout(Some(self.config.recv_timeout()))
            .map_err(SessionError::Socket)?;
        let command_addr = inbound.local_addr().map_err(SessionError::Socket)?;

        let (tx, batches) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker = ReceiveWorker {
            socket: inbound,
            dispatcher: CommandDispatcher::new(self.controls.clone()),
            batches: tx,
            shutdown: Arc::clone(&shutdown),
            buffer_len: self.config.recv_buffer_len.max(1),
        };
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(SessionError::Worker)?;

        Ok(Running { outbound, command_addr, builder, batches, shutdown, worker })
    }

    /// One publish cycle. Never blocks; a no-op unless running.
    ///
    /// Host writes queued by the receive worker are applied first, then the
    /// overridden axes, then one telemetry datagram is sent.
    pub fn tick<H>(&mut self, host: &H)
    where
        H: TelemetrySource + ControlSink + ?Sized,
    {
        let Some(running) = &self.running else { return };

        for batch in running.batches.try_iter() {
            for write in &batch {
                write.apply(host);
            }
        }
        apply_controls(&self.controls, host);

        let line = encode_line(&running.builder.build(host));
        match running.outbound.send_to(line.as_bytes(), self.config.telemetry_addr) {
            Ok(_) => self.stats.sent += 1,
            Err(e) => {
                self.stats.dropped += 1;
                tracing::trace!(error = %e, "telemetry datagram dropped");
            }
        }
    }

    /// Signal the worker, unblock it, join it and close both sockets.
    pub fn stop(&mut self) {
        let Some(Running { outbound, command_addr, shutdown, worker, .. }) = self.running.take() else {
            return;
        };
        self.state = SessionState::Stopping;

        shutdown.store(true, Ordering::Release);
        // Zero-length wake-up; if it is lost the read timeout still ends the wait.
        let _ = outbound.send_to(&[], wake_addr(command_addr));
        if worker.join().is_err() {
            tracing::warn!("receive worker panicked");
        }
        drop(outbound);

        self.state = SessionState::Stopped;
        tracing::info!(sent = self.stats.sent, dropped = self.stats.dropped, "telemetry session stopped");
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Receive worker ────────────────────────────────────────────────────────────

struct ReceiveWorker {
    socket: UdpSocket,
    dispatcher: CommandDispatcher,
    batches: mpsc::Sender<Vec<SinkWrite>>,
    shutdown: Arc<AtomicBool>,
    buffer_len: usize,
}

impl ReceiveWorker {
    fn run(self) {
        let mut buf = vec![0u8; self.buffer_len];
        while !self.shutdown.load(Ordering::Acquire) {
            match self.socket.recv_from(&mut buf) {
                Ok((0, _)) => {}
                Ok((n, from)) => self.handle_datagram(&buf[..n], from),
                Err(e) if is_timeout(&e) => {}
                Err(e) => {
                    if self.shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    tracing::debug!(error = %e, "command receive failed");
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
        tracing::debug!("receive worker exiting");
    }

    fn handle_datagram(&self, bytes: &[u8], from: SocketAddr) {
        let text = String::from_utf8_lossy(bytes);
        let msg = decode_command(&text);
        let sink = BatchSink::new();

        match self.dispatcher.dispatch(&msg, &sink) {
            Ok(()) => {
                let writes = sink.into_writes();
                if !writes.is_empty() {
                    // A closed channel means the session is shutting down.
                    let _ = self.batches.send(writes);
                }
            }
            Err(e) => tracing::debug!(error = %e, %from, kind = msg.kind.as_str(), "dropped command"),
        }
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

/// Wildcard bind address of the same family as `dest`, ephemeral port.
fn unspecified_for(dest: SocketAddr) -> SocketAddr {
    match dest {
        SocketAddr::V4(_) => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        SocketAddr::V6(_) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
    }
}

/// A wildcard-bound socket is reached through loopback.
fn wake_addr(bound: SocketAddr) -> SocketAddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, bound.port())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
