//! Host capability layer.
//!
//! Everything the bridge needs from X-Plane goes through [`TelemetrySource`]
//! (reads) and [`ControlSink`] (writes), so that unit tests can substitute
//! `MockXplm` without a running simulator.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use telem_schema::HostVersionTier;

// ── Traits ────────────────────────────────────────────────────────────────────

/// Read access to named simulator values.
///
/// Unknown names read as zero / empty; there is no "absent" value.
pub trait TelemetrySource {
    fn get_float(&self, name: &str) -> f64;
    fn get_int(&self, name: &str) -> i32;
    /// The whole array; its length is the host's current array size.
    fn get_float_array(&self, name: &str) -> Vec<f32>;
    fn get_string(&self, name: &str) -> String;
    /// Seconds since the simulator started.
    fn elapsed_time(&self) -> f64;
    /// Model file name of the user aircraft (e.g. `Cessna_172SP.acf`).
    fn aircraft_identity(&self) -> String;
    fn version_tier(&self) -> HostVersionTier;
}

/// Write access to named simulator values.
pub trait ControlSink {
    fn set_float(&self, name: &str, value: f32);
    fn set_int(&self, name: &str, value: i32);
}

/// The full host API used by the plugin.
///
/// `Send` so the plugin can live in a global `OnceLock<Mutex<_>>`.
pub trait XplmApi: TelemetrySource + ControlSink + Send {
    /// Write a line to the simulator's own log.
    fn log(&self, message: &str);
}

// ── DataRefValue (mock storage) ───────────────────────────────────────────────

/// Value stored in the mock shim for a single dataref.
#[derive(Debug, Clone)]
pub enum DataRefValue {
    Float(f32),
    Double(f64),
    Int(i32),
    FloatArray(Vec<f32>),
    Text(String),
}

// ── MockXplm ─────────────────────────────────────────────────────────────────

struct MockInner {
    datarefs: HashMap<String, DataRefValue>,
    elapsed: f64,
    aircraft_file: String,
    tier: HostVersionTier,
    tier_queries: usize,
    /// recorded set_float calls: (name, value)
    set_float_log: Vec<(String, f32)>,
    /// recorded set_int calls: (name, value)
    set_int_log: Vec<(String, i32)>,
    log_messages: Vec<String>,
}

/// In-memory host: returns configured values and records writes.
///
/// Clones share the same state, so a test can keep a handle after boxing one
/// into the plugin.
#[derive(Clone)]
pub struct MockXplm {
    inner: Arc<Mutex<MockInner>>,
}

impl MockXplm {
    pub fn new() -> Self {
        MockXplm {
            inner: Arc::new(Mutex::new(MockInner {
                datarefs:      HashMap::new(),
                elapsed:       0.0,
                aircraft_file: String::new(),
                tier:          HostVersionTier::Modern,
                tier_queries:  0,
                set_float_log: Vec::new(),
                set_int_log:   Vec::new(),
                log_messages:  Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_dataref(&self, name: &str, value: DataRefValue) {
        self.lock().datarefs.insert(name.to_string(), value);
    }

    pub fn set_elapsed_time(&self, seconds: f64) {
        self.lock().elapsed = seconds;
    }

    pub fn set_aircraft_file(&self, file: &str) {
        self.lock().aircraft_file = file.to_string();
    }

    pub fn set_version_tier(&self, tier: HostVersionTier) {
        self.lock().tier = tier;
    }

    /// How many times `version_tier` has been called.
    pub fn version_tier_queries(&self) -> usize {
        self.lock().tier_queries
    }

    /// Snapshot the recorded `set_float` calls (name, value).
    pub fn set_float_calls(&self) -> Vec<(String, f32)> {
        self.lock().set_float_log.clone()
    }

    /// Snapshot the recorded `set_int` calls (name, value).
    pub fn set_int_calls(&self) -> Vec<(String, i32)> {
        self.lock().set_int_log.clone()
    }

    /// Snapshot all logged messages.
    pub fn log_messages(&self) -> Vec<String> {
        self.lock().log_messages.clone()
    }
}

impl Default for MockXplm {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for MockXplm {
    fn get_float(&self, name: &str) -> f64 {
        match self.lock().datarefs.get(name) {
            Some(DataRefValue::Float(v))  => f64::from(*v),
            Some(DataRefValue::Double(v)) => *v,
            Some(DataRefValue::Int(v))    => f64::from(*v),
            _ => 0.0,
        }
    }

    fn get_int(&self, name: &str) -> i32 {
        match self.lock().datarefs.get(name) {
            Some(DataRefValue::Int(v))    => *v,
            Some(DataRefValue::Float(v))  => *v as i32,
            Some(DataRefValue::Double(v)) => *v as i32,
            _ => 0,
        }
    }

    fn get_float_array(&self, name: &str) -> Vec<f32> {
        match self.lock().datarefs.get(name) {
            Some(DataRefValue::FloatArray(arr)) => arr.clone(),
            _ => Vec::new(),
        }
    }

    fn get_string(&self, name: &str) -> String {
        match self.lock().datarefs.get(name) {
            Some(DataRefValue::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    fn elapsed_time(&self) -> f64 {
        self.lock().elapsed
    }

    fn aircraft_identity(&self) -> String {
        self.lock().aircraft_file.clone()
    }

    fn version_tier(&self) -> HostVersionTier {
        let mut g = self.lock();
        g.tier_queries += 1;
        g.tier
    }
}

impl ControlSink for MockXplm {
    fn set_float(&self, name: &str, value: f32) {
        let mut g = self.lock();
        g.datarefs.insert(name.to_string(), DataRefValue::Float(value));
        g.set_float_log.push((name.to_string(), value));
    }

    fn set_int(&self, name: &str, value: i32) {
        let mut g = self.lock();
        g.datarefs.insert(name.to_string(), DataRefValue::Int(value));
        g.set_int_log.push((name.to_string(), value));
    }
}

impl XplmApi for MockXplm {
    fn log(&self, message: &str) {
        self.lock().log_messages.push(message.to_string());
    }
}

// ── RealXplm (production builds only) ────────────────────────────────────────

#[cfg(not(test))]
pub use real::RealXplm;

#[cfg(not(test))]
mod real {
    use super::{ControlSink, TelemetrySource, XplmApi};
    use crate::xplm_sys as sys;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::ffi::{c_char, c_int, CString};
    use telem_schema::HostVersionTier;

    /// Opaque handle to a cached X-Plane dataref (pointer-sized).
    type DataRefHandle = usize;

    const TYPE_INT: c_int = 1;
    const TYPE_FLOAT: c_int = 2;
    const TYPE_DOUBLE: c_int = 4;

    /// Production implementation over the raw XPLM extern calls.
    ///
    /// Dataref handles are looked up by name on first use and cached for the
    /// lifetime of the plugin; a failed lookup is cached too and logged once.
    #[derive(Default)]
    pub struct RealXplm {
        handles: RefCell<HashMap<String, Option<DataRefHandle>>>,
    }

    impl RealXplm {
        pub fn new() -> Self {
            Self::default()
        }

        fn handle(&self, name: &str) -> Option<DataRefHandle> {
            if let Some(cached) = self.handles.borrow().get(name) {
                return *cached;
            }
            let found = CString::new(name).ok().and_then(|c| {
                let h = unsafe { sys::XPLMFindDataRef(c.as_ptr()) };
                if h.is_null() { None } else { Some(h as usize) }
            });
            if found.is_none() {
                tracing::warn!(dataref = name, "dataref not found");
            }
            self.handles.borrow_mut().insert(name.to_string(), found);
            found
        }

        fn types(handle: DataRefHandle) -> c_int {
            unsafe { sys::XPLMGetDataRefTypes(handle as _) }
        }
    }

    impl TelemetrySource for RealXplm {
        fn get_float(&self, name: &str) -> f64 {
            let Some(h) = self.handle(name) else { return 0.0 };
            let types = Self::types(h);
            unsafe {
                if types & TYPE_DOUBLE != 0 {
                    sys::XPLMGetDatad(h as _)
                } else if types & TYPE_FLOAT != 0 {
                    f64::from(sys::XPLMGetDataf(h as _))
                } else if types & TYPE_INT != 0 {
                    f64::from(sys::XPLMGetDatai(h as _))
                } else {
                    0.0
                }
            }
        }

        fn get_int(&self, name: &str) -> i32 {
            let Some(h) = self.handle(name) else { return 0 };
            let types = Self::types(h);
            unsafe {
                if types & TYPE_INT != 0 {
                    sys::XPLMGetDatai(h as _)
                } else if types & TYPE_FLOAT != 0 {
                    sys::XPLMGetDataf(h as _) as i32
                } else if types & TYPE_DOUBLE != 0 {
                    sys::XPLMGetDatad(h as _) as i32
                } else {
                    0
                }
            }
        }

        fn get_float_array(&self, name: &str) -> Vec<f32> {
            let Some(h) = self.handle(name) else { return Vec::new() };
            unsafe {
                let len = sys::XPLMGetDatavf(h as _, std::ptr::null_mut(), 0, 0).max(0);
                let mut out = vec![0f32; len as usize];
                let read = sys::XPLMGetDatavf(h as _, out.as_mut_ptr(), 0, len);
                out.truncate(read.max(0) as usize);
                out
            }
        }

        fn get_string(&self, name: &str) -> String {
            let Some(h) = self.handle(name) else { return String::new() };
            unsafe {
                let len = sys::XPLMGetDatab(h as _, std::ptr::null_mut(), 0, 0).max(0);
                let mut buf = vec![0u8; len as usize];
                let read = sys::XPLMGetDatab(h as _, buf.as_mut_ptr().cast(), 0, len);
                buf.truncate(read.max(0) as usize);
                c_buf_to_string(&buf)
            }
        }

        fn elapsed_time(&self) -> f64 {
            f64::from(unsafe { sys::XPLMGetElapsedTime() })
        }

        fn aircraft_identity(&self) -> String {
            let mut file = [0 as c_char; 256];
            let mut path = [0 as c_char; 512];
            unsafe { sys::XPLMGetNthAircraftModel(0, file.as_mut_ptr(), path.as_mut_ptr()) };
            let bytes: Vec<u8> = file.iter().map(|&c| c as u8).collect();
            c_buf_to_string(&bytes)
        }

        fn version_tier(&self) -> HostVersionTier {
            let (mut xplane, mut xplm, mut host) = (0, 0, 0);
            unsafe { sys::XPLMGetVersions(&mut xplane, &mut xplm, &mut host) };
            HostVersionTier::from_xplane_version(xplane)
        }
    }

    impl ControlSink for RealXplm {
        fn set_float(&self, name: &str, value: f32) {
            if let Some(h) = self.handle(name) {
                unsafe { sys::XPLMSetDataf(h as _, value) }
            }
        }

        fn set_int(&self, name: &str, value: i32) {
            if let Some(h) = self.handle(name) {
                unsafe { sys::XPLMSetDatai(h as _, value) }
            }
        }
    }

    impl XplmApi for RealXplm {
        fn log(&self, message: &str) {
            if let Ok(c) = CString::new(format!("{message}\n")) {
                unsafe { sys::XPLMDebugString(c.as_ptr()) }
            }
        }
    }

    fn c_buf_to_string(buf: &[u8]) -> String {
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        String::from_utf8_lossy(&buf[..end]).into_owned()
    }
}
