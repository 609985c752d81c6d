//! Axis override state and the command dispatcher that mutates it.
//!
//! The receive worker dispatches commands into [`SharedControls`]; the flight
//! loop reads it back once per tick in [`apply_controls`]. One mutex guards
//! the whole state and is only ever held for a copy or a small merge.

use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use telem_protocol::{
    decode_axis_payload, decode_override_payload, CommandKind, CommandMessage, ProtocolError,
};
use telem_schema::{Axis, OverrideChannel};

use crate::xplm_shim::ControlSink;

// ── AxisOverrideState ─────────────────────────────────────────────────────────

/// Last received value per axis, nominally in [-1, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisValues {
    pub jx: f32,
    pub jy: f32,
    pub px: f32,
    pub cy: f32,
}

impl AxisValues {
    pub fn get(&self, axis: Axis) -> f32 {
        match axis {
            Axis::JoystickX => self.jx,
            Axis::JoystickY => self.jy,
            Axis::PedalsX => self.px,
            Axis::CollectiveY => self.cy,
        }
    }

    pub fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::JoystickX => self.jx = value,
            Axis::JoystickY => self.jy = value,
            Axis::PedalsX => self.px = value,
            Axis::CollectiveY => self.cy = value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisOverrideState {
    pub joystick: bool,
    pub pedals: bool,
    pub collective: bool,
    pub axes: AxisValues,
}

impl AxisOverrideState {
    pub fn is_overridden(&self, channel: OverrideChannel) -> bool {
        match channel {
            OverrideChannel::Joystick => self.joystick,
            OverrideChannel::Pedals => self.pedals,
            OverrideChannel::Collective => self.collective,
        }
    }

    pub fn set_overridden(&mut self, channel: OverrideChannel, enabled: bool) {
        match channel {
            OverrideChannel::Joystick => self.joystick = enabled,
            OverrideChannel::Pedals => self.pedals = enabled,
            OverrideChannel::Collective => self.collective = enabled,
        }
    }
}

/// Cloneable handle to the state shared by the receive worker and the tick.
#[derive(Clone, Default)]
pub struct SharedControls {
    inner: Arc<Mutex<AxisOverrideState>>,
}

impl SharedControls {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AxisOverrideState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> AxisOverrideState {
        *self.lock()
    }

    /// Run `f` with exclusive access. Keep `f` short and free of I/O.
    pub fn update<R>(&self, f: impl FnOnce(&mut AxisOverrideState) -> R) -> R {
        f(&mut *self.lock())
    }
}

// ── CommandDispatcher ─────────────────────────────────────────────────────────

pub struct CommandDispatcher {
    controls: SharedControls,
}

impl CommandDispatcher {
    pub fn new(controls: SharedControls) -> Self {
        CommandDispatcher { controls }
    }

    pub fn controls(&self) -> &SharedControls {
        &self.controls
    }

    /// Apply one decoded command.
    ///
    /// A payload that fails to decode changes nothing. Unknown kinds, axis
    /// keys and override keywords are ignored.
    pub fn dispatch(&self, msg: &CommandMessage, sink: &dyn ControlSink) -> Result<(), ProtocolError> {
        match &msg.kind {
            CommandKind::Axis => self.merge_axes(&msg.payload),
            CommandKind::Override => self.toggle_override(&msg.payload, sink),
            CommandKind::Other(tag) => {
                tracing::trace!(kind = %tag, "ignoring command");
                Ok(())
            }
        }
    }

    fn merge_axes(&self, payload: &str) -> Result<(), ProtocolError> {
        let decoded = decode_axis_payload(payload)?;
        let updates: Vec<(Axis, f32)> = decoded
            .into_iter()
            .filter_map(|(key, value)| match Axis::from_key(&key) {
                Some(axis) => Some((axis, value)),
                None => {
                    tracing::trace!(key = %key, "unknown axis");
                    None
                }
            })
            .collect();

        self.controls.update(|state| {
            for (axis, value) in updates {
                state.axes.set(axis, value);
            }
        });
        Ok(())
    }

    fn toggle_override(&self, payload: &str, sink: &dyn ControlSink) -> Result<(), ProtocolError> {
        let (keyword, enabled) = decode_override_payload(payload)?;
        let Some(channel) = OverrideChannel::from_keyword(&keyword) else {
            tracing::debug!(keyword = %keyword, "unknown override channel");
            return Ok(());
        };

        self.controls.update(|state| state.set_overridden(channel, enabled));
        for dataref in channel.override_datarefs() {
            sink.set_int(dataref, i32::from(enabled));
        }
        tracing::info!(channel = channel.keyword(), enabled, "override changed");
        Ok(())
    }
}

// ── Per-tick control application ──────────────────────────────────────────────

/// Write every overridden channel's axis values to the host.
///
/// Channels that are not overridden are left alone; the simulator's own
/// input handling owns them.
pub fn apply_controls<S: ControlSink + ?Sized>(controls: &SharedControls, sink: &S) {
    let state = controls.snapshot();
    for channel in OverrideChannel::ALL {
        if !state.is_overridden(channel) {
            continue;
        }
        for &axis in channel.axes() {
            sink.set_float(axis.dataref(), state.axes.get(axis));
        }
    }
}

// ── Batched writes (receive thread → flight loop) ─────────────────────────────

/// One deferred host write.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkWrite {
    Float(String, f32),
    Int(String, i32),
}

impl SinkWrite {
    pub fn apply<S: ControlSink + ?Sized>(&self, sink: &S) {
        match self {
            SinkWrite::Float(name, value) => sink.set_float(name, *value),
            SinkWrite::Int(name, value) => sink.set_int(name, *value),
        }
    }
}

/// `ControlSink` that records writes instead of performing them, so they
/// can be shipped to the thread that owns the host API.
#[derive(Default)]
pub struct BatchSink {
    writes: RefCell<Vec<SinkWrite>>,
}

impl BatchSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_writes(self) -> Vec<SinkWrite> {
        self.writes.into_inner()
    }
}

impl ControlSink for BatchSink {
    fn set_float(&self, name: &str, value: f32) {
        self.writes.borrow_mut().push(SinkWrite::Float(name.to_string(), value));
    }

    fn set_int(&self, name: &str, value: i32) {
        self.writes.borrow_mut().push(SinkWrite::Int(name.to_string(), value));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplm_shim::{MockXplm, TelemetrySource};
    use telem_protocol::{decode_command, encode_axis_command};
    use telem_schema::paths;

    fn dispatch(d: &CommandDispatcher, datagram: &str, sink: &dyn ControlSink) -> Result<(), ProtocolError> {
        d.dispatch(&decode_command(datagram), sink)
    }

    #[test]
    fn joystick_override_toggles_roll_and_pitch() {
        let d = CommandDispatcher::new(SharedControls::new());
        let m = MockXplm::new();

        dispatch(&d, "OVERRIDE:joystick=true", &m).unwrap();

        assert!(d.controls().snapshot().joystick);
        assert_eq!(m.get_int(paths::OVERRIDE_ROLL), 1);
        assert_eq!(m.get_int(paths::OVERRIDE_PITCH), 1);
        assert_eq!(m.set_int_calls().len(), 2);

        dispatch(&d, "OVERRIDE:joystick=FALSE", &m).unwrap();
        assert!(!d.controls().snapshot().joystick);
        assert_eq!(m.get_int(paths::OVERRIDE_ROLL), 0);
        assert_eq!(m.get_int(paths::OVERRIDE_PITCH), 0);
    }

    #[test]
    fn pedals_and_collective_toggle_one_channel_each() {
        let d = CommandDispatcher::new(SharedControls::new());
        let m = MockXplm::new();

        dispatch(&d, "OVERRIDE:pedals=true", &m).unwrap();
        dispatch(&d, "OVERRIDE:collective=true", &m).unwrap();

        let state = d.controls().snapshot();
        assert!(state.pedals && state.collective && !state.joystick);
        assert_eq!(
            m.set_int_calls(),
            vec![
                (paths::OVERRIDE_HEADING.to_string(), 1),
                (paths::OVERRIDE_PROP_PITCH.to_string(), 1),
            ]
        );
    }

    #[test]
    fn axis_merge_keeps_unspecified_axes() {
        let controls = SharedControls::new();
        controls.update(|s| {
            s.axes.jx = 0.2;
            s.axes.jy = 0.0;
        });
        let d = CommandDispatcher::new(controls.clone());

        dispatch(&d, "AXIS:jx=0.7", &MockXplm::new()).unwrap();

        let axes = controls.snapshot().axes;
        assert!((axes.jx - 0.7).abs() < 1e-6);
        assert_eq!(axes.jy, 0.0);
    }

    #[test]
    fn bad_number_rejects_whole_axis_datagram() {
        let controls = SharedControls::new();
        let d = CommandDispatcher::new(controls.clone());

        let err = dispatch(&d, "AXIS:jx=0.5,jy=oops", &MockXplm::new()).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidNumber { .. }));
        assert_eq!(controls.snapshot(), AxisOverrideState::default());
    }

    #[test]
    fn unknown_axes_keywords_and_kinds_are_ignored() {
        let controls = SharedControls::new();
        let d = CommandDispatcher::new(controls.clone());
        let m = MockXplm::new();

        dispatch(&d, "AXIS:zz=0.9,px=0.5 ", &m).unwrap();
        dispatch(&d, "OVERRIDE:throttle=true", &m).unwrap();
        dispatch(&d, "HELLO:jx=1", &m).unwrap();
        dispatch(&d, "no colon at all", &m).unwrap();

        let state = controls.snapshot();
        assert!((state.axes.px - 0.5).abs() < 1e-6);
        assert_eq!(state.axes.jx, 0.0);
        assert!(!state.joystick && !state.pedals && !state.collective);
        assert!(m.set_int_calls().is_empty());
    }

    #[test]
    fn apply_writes_only_overridden_channels() {
        let controls = SharedControls::new();
        controls.update(|s| {
            s.joystick = true;
            s.axes = AxisValues { jx: 0.25, jy: -0.5, px: 0.75, cy: 0.1 };
        });
        let m = MockXplm::new();

        apply_controls(&controls, &m);

        assert_eq!(
            m.set_float_calls(),
            vec![
                (paths::YOKE_ROLL_RATIO.to_string(), 0.25),
                (paths::YOKE_PITCH_RATIO.to_string(), -0.5),
            ]
        );
    }

    #[test]
    fn apply_with_no_override_leaves_host_untouched() {
        let controls = SharedControls::new();
        controls.update(|s| s.axes.px = 0.9);
        let m = MockXplm::new();

        apply_controls(&controls, &m);

        assert!(m.set_float_calls().is_empty());
        assert!(m.set_int_calls().is_empty());
    }

    #[test]
    fn batch_sink_replays_writes_in_order() {
        let d = CommandDispatcher::new(SharedControls::new());
        let batch = BatchSink::new();
        dispatch(&d, "OVERRIDE:joystick=true", &batch).unwrap();

        let writes = batch.into_writes();
        assert_eq!(
            writes,
            vec![
                SinkWrite::Int(paths::OVERRIDE_ROLL.to_string(), 1),
                SinkWrite::Int(paths::OVERRIDE_PITCH.to_string(), 1),
            ]
        );

        let m = MockXplm::new();
        for w in &writes {
            w.apply(&m);
        }
        assert_eq!(m.get_int(paths::OVERRIDE_ROLL), 1);
        assert_eq!(m.get_int(paths::OVERRIDE_PITCH), 1);
    }

    #[test]
    fn concurrent_merge_and_apply_never_tear() {
        const ROUNDS: usize = 1000;
        let controls = SharedControls::new();
        controls.update(|s| s.joystick = true);
        let d = CommandDispatcher::new(controls.clone());
        let reader_host = MockXplm::new();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let sink = BatchSink::new();
                for i in 0..ROUNDS {
                    let v = i as f32 / ROUNDS as f32;
                    let cmd = encode_axis_command(&[("jx", v), ("jy", v)]);
                    dispatch(&d, &cmd, &sink).unwrap();
                }
            });
            scope.spawn(|| {
                for _ in 0..ROUNDS {
                    let s = controls.snapshot();
                    assert_eq!(s.axes.jx, s.axes.jy, "torn axis pair");
                    apply_controls(&controls, &reader_host);
                }
            });
        });

        // Every application wrote a matching roll/pitch pair.
        let calls = reader_host.set_float_calls();
        assert_eq!(calls.len(), ROUNDS * 2);
        for pair in calls.chunks(2) {
            assert_eq!(pair[0].0, paths::YOKE_ROLL_RATIO);
            assert_eq!(pair[1].0, paths::YOKE_PITCH_RATIO);
            assert_eq!(pair[0].1, pair[1].1, "torn axis pair");
        }

        let last = (ROUNDS - 1) as f32 / ROUNDS as f32;
        assert_eq!(controls.snapshot().axes.jx, last);
    }
}
