//! X-Plane telemetry bridge for TelemFFB.
//!
//! Compiles to a `.xpl` shared library loaded by X-Plane. The `XPLM*` entry
//! points below are only present in non-test builds; unit tests use `MockXplm`
//! and call `TelemFfbPlugin` methods directly.

pub mod config;
pub mod control;
pub mod debug_log;
pub mod error;
pub mod plugin;
pub mod session;
pub mod snapshot;
pub mod xplm_shim;

// Raw X-Plane SDK extern declarations, production builds only.
// Symbols are resolved at runtime by X-Plane when the .xpl is loaded.
#[cfg(not(test))]
pub(crate) mod xplm_sys {
    use std::ffi::{c_char, c_float, c_int, c_void};

    pub type XPLMDataRef = *mut c_void;

    extern "C" {
        pub fn XPLMFindDataRef(inDataRefName: *const c_char) -> XPLMDataRef;
        pub fn XPLMGetDataRefTypes(inDataRef: XPLMDataRef) -> c_int;
        pub fn XPLMGetDataf(inDataRef: XPLMDataRef) -> c_float;
        pub fn XPLMGetDatad(inDataRef: XPLMDataRef) -> f64;
        pub fn XPLMGetDatai(inDataRef: XPLMDataRef) -> c_int;
        pub fn XPLMGetDatavf(
            inDataRef:  XPLMDataRef,
            outValues:  *mut c_float,
            inOffset:   c_int,
            inMax:      c_int,
        ) -> c_int;
        pub fn XPLMGetDatab(
            inDataRef:  XPLMDataRef,
            outValue:   *mut c_void,
            inOffset:   c_int,
            inMaxBytes: c_int,
        ) -> c_int;
        pub fn XPLMSetDataf(inDataRef: XPLMDataRef, inValue: c_float);
        pub fn XPLMSetDatai(inDataRef: XPLMDataRef, inValue: c_int);
        pub fn XPLMGetElapsedTime() -> c_float;
        pub fn XPLMGetNthAircraftModel(
            inIndex:     c_int,
            outFileName: *mut c_char,
            outPath:     *mut c_char,
        );
        pub fn XPLMGetVersions(
            outXPlaneVersion: *mut c_int,
            outXPLMVersion:   *mut c_int,
            outHostID:        *mut c_int,
        );
        pub fn XPLMDebugString(inString: *const c_char);
        pub fn XPLMRegisterFlightLoopCallback(
            inFlightLoop: Option<
                unsafe extern "C" fn(f32, f32, c_int, *mut c_void) -> f32,
            >,
            inInterval: c_float,
            inRefcon:   *mut c_void,
        );
        pub fn XPLMUnregisterFlightLoopCallback(
            inFlightLoop: Option<
                unsafe extern "C" fn(f32, f32, c_int, *mut c_void) -> f32,
            >,
            inRefcon: *mut c_void,
        );
    }
}

// ── XPLM entry points (production only) ──────────────────────────────────────

#[cfg(not(test))]
mod entry {
    use super::config::{BridgeConfig, CONFIG_PATH};
    use super::plugin::{
        TelemFfbPlugin, EVERY_FRAME, PLUGIN_DESCRIPTION, PLUGIN_NAME, PLUGIN_SIGNATURE,
    };
    use super::xplm_shim::RealXplm;
    use std::ffi::{c_int, c_void, CString};
    use std::path::Path;
    use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

    static PLUGIN: OnceLock<Mutex<TelemFfbPlugin>> = OnceLock::new();

    fn plugin() -> Option<MutexGuard<'static, TelemFfbPlugin>> {
        PLUGIN.get().map(|p| p.lock().unwrap_or_else(PoisonError::into_inner))
    }

    #[no_mangle]
    pub unsafe extern "C" fn XPluginStart(
        out_name: *mut std::ffi::c_char,
        out_sig:  *mut std::ffi::c_char,
        out_desc: *mut std::ffi::c_char,
    ) -> c_int {
        write_cstr(out_name, PLUGIN_NAME);
        write_cstr(out_sig,  PLUGIN_SIGNATURE);
        write_cstr(out_desc, PLUGIN_DESCRIPTION);

        let (config, config_err) = BridgeConfig::load_or_default(Path::new(CONFIG_PATH));
        super::debug_log::init(config.debug_log.as_deref(), config.level_filter());
        if let Some(e) = config_err {
            tracing::warn!(error = %e, "using default configuration");
            log(&format!("{PLUGIN_NAME}: {e}; using defaults"));
        }

        let plugin = TelemFfbPlugin::new(Box::new(RealXplm::new()), config);
        if PLUGIN.set(Mutex::new(plugin)).is_err() {
            log(&format!("{PLUGIN_NAME}: already initialized"));
            return 0;
        }

        tracing::info!("XPluginStart");
        1
    }

    #[no_mangle]
    pub unsafe extern "C" fn XPluginStop() {
        if let Some(mut p) = plugin() {
            p.disable();
        }
        tracing::info!("XPluginStop");
    }

    #[no_mangle]
    pub unsafe extern "C" fn XPluginEnable() -> c_int {
        let Some(mut p) = plugin() else {
            log(&format!("{PLUGIN_NAME}: XPluginEnable before XPluginStart"));
            return 0;
        };
        if !p.enable() {
            return 0;
        }
        super::xplm_sys::XPLMRegisterFlightLoopCallback(
            Some(flight_loop_cb),
            EVERY_FRAME,
            std::ptr::null_mut(),
        );
        1
    }

    #[no_mangle]
    pub unsafe extern "C" fn XPluginDisable() {
        super::xplm_sys::XPLMUnregisterFlightLoopCallback(
            Some(flight_loop_cb),
            std::ptr::null_mut(),
        );
        if let Some(mut p) = plugin() {
            p.disable();
        }
    }

    #[no_mangle]
    pub unsafe extern "C" fn XPluginReceiveMessage(
        _from:  c_int,
        _msg:   c_int,
        _param: *mut c_void,
    ) {
    }

    unsafe extern "C" fn flight_loop_cb(
        _since_last_call:  f32,
        _since_last_floop: f32,
        _counter:          c_int,
        _refcon:           *mut c_void,
    ) -> f32 {
        match plugin() {
            Some(mut p) => p.flight_loop_tick(),
            None => EVERY_FRAME,
        }
    }

    fn log(msg: &str) {
        if let Ok(c) = CString::new(format!("{msg}\n")) {
            unsafe { super::xplm_sys::XPLMDebugString(c.as_ptr()) }
        }
    }

    unsafe fn write_cstr(dst: *mut std::ffi::c_char, s: &str) {
        let bytes = s.as_bytes();
        let len = bytes.len().min(255);
        std::ptr::copy_nonoverlapping(bytes.as_ptr().cast(), dst, len);
        *dst.add(len) = 0;
    }
}

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::BridgeConfig;
pub use plugin::TelemFfbPlugin;
pub use session::{SessionState, SessionStats, TransportSession};
