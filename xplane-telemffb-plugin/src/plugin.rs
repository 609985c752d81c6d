//! TelemFfbPlugin: glue between the XPLM lifecycle and the transport session.
//!
//! This module is free of any XPLM types so it can be fully unit-tested via
//! the `MockXplm` shim.

use crate::config::BridgeConfig;
use crate::session::{SessionState, TransportSession};
use crate::xplm_shim::XplmApi;

// ── Constants ─────────────────────────────────────────────────────────────────

pub const PLUGIN_NAME: &str = "TelemFFB-XPP";
pub const PLUGIN_SIGNATURE: &str = "vpforce.telemffb.xpplugin";
pub const PLUGIN_DESCRIPTION: &str = "Streams flight telemetry to TelemFFB and accepts axis overrides";

/// Negative flight-loop interval: call back every frame.
pub const EVERY_FRAME: f32 = -1.0;

// ── TelemFfbPlugin ────────────────────────────────────────────────────────────

pub struct TelemFfbPlugin {
    xplm: Box<dyn XplmApi>,
    session: TransportSession,
}

impl TelemFfbPlugin {
    pub fn new(xplm: Box<dyn XplmApi>, config: BridgeConfig) -> Self {
        TelemFfbPlugin { xplm, session: TransportSession::new(config) }
    }

    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    /// Write to the simulator log with the plugin prefix.
    pub fn log(&self, message: &str) {
        self.xplm.log(&format!("{PLUGIN_NAME}: {message}"));
    }

    /// Start the session. Failure is reported to the host log and leaves the
    /// plugin disabled.
    pub fn enable(&mut self) -> bool {
        match self.session.start(&*self.xplm) {
            Ok(()) => {
                let commands = self
                    .session
                    .command_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_default();
                self.log(&format!(
                    "telemetry to {}, commands on {commands}",
                    self.session.telemetry_addr()
                ));
                true
            }
            Err(e) => {
                self.log(&format!("failed to start: {e}"));
                false
            }
        }
    }

    pub fn disable(&mut self) {
        if self.session.state() != SessionState::Stopped {
            self.session.stop();
            self.log("stopped");
        }
    }

    /// Called from the X-Plane flight loop callback.
    ///
    /// Returns the interval for the next call (negative = frames).
    pub fn flight_loop_tick(&mut self) -> f32 {
        self.session.tick(&*self.xplm);
        EVERY_FRAME
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
