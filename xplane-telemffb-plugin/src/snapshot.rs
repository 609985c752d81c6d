//! Per-tick telemetry snapshot.
//!
//! Walks the static field registry and reads every field through
//! [`TelemetrySource`]. The result is rebuilt from scratch each call; nothing
//! is carried over between ticks.

use std::path::Path;

use telem_protocol::{encode_array, encode_scalar, Snapshot};
use telem_schema::{
    paths, Arity, Field, FieldSpec, HostVersionTier, Source, ENGINE_COUNT_DATAREF,
    GEAR_COUNT_DATAREF,
};

use crate::xplm_shim::TelemetrySource;

/// Per-aircraft counts read fresh every tick; they change when the user
/// loads a different aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArraySizes {
    engines: usize,
    gears: usize,
}

impl ArraySizes {
    fn read<S: TelemetrySource + ?Sized>(source: &S) -> Self {
        ArraySizes {
            engines: usize::try_from(source.get_int(ENGINE_COUNT_DATAREF)).unwrap_or(0),
            gears: source.get_float_array(GEAR_COUNT_DATAREF).len(),
        }
    }

    fn fixed_arity(self, arity: Arity) -> Option<usize> {
        match arity {
            Arity::Trimmed => None,
            Arity::EngineCount => Some(self.engines),
            Arity::GearCount => Some(self.gears),
        }
    }
}

pub struct SnapshotBuilder {
    tier: HostVersionTier,
}

impl SnapshotBuilder {
    /// Query the host version tier once; the choice is kept for the session.
    pub fn probe<S: TelemetrySource + ?Sized>(source: &S) -> Self {
        SnapshotBuilder { tier: source.version_tier() }
    }

    pub fn tier(&self) -> HostVersionTier {
        self.tier
    }

    /// Read every registered field. All keys are always present.
    pub fn build<S: TelemetrySource + ?Sized>(&self, source: &S) -> Snapshot {
        let sizes = ArraySizes::read(source);
        Field::ALL
            .iter()
            .map(|field| {
                let spec = field.spec();
                (spec.key.to_string(), self.encode_field(&spec, source, sizes))
            })
            .collect()
    }

    fn encode_field<S>(&self, spec: &FieldSpec, source: &S, sizes: ArraySizes) -> String
    where
        S: TelemetrySource + ?Sized,
    {
        match spec.source {
            Source::Constant(text) => text.to_string(),
            Source::AircraftIdentity => self.aircraft_name(source),
            Source::ElapsedTime => encode_scalar(source.elapsed_time(), spec.precision, spec.factor),
            Source::Float(name) => encode_scalar(source.get_float(name), spec.precision, spec.factor),
            Source::Int(name) => source.get_int(name).to_string(),
            Source::Array(name, arity) => {
                let values: Vec<f64> = source.get_float_array(name).into_iter().map(f64::from).collect();
                encode_array(&values, spec.factor, sizes.fixed_arity(arity))
            }
            Source::Vector(names) => {
                let values = names.map(|name| source.get_float(name));
                encode_array(&values, spec.factor, Some(values.len()))
            }
            Source::ArrayLen(name) => source.get_float_array(name).len().to_string(),
        }
    }

    /// Identity text never contains the `;` pair separator.
    fn aircraft_name<S: TelemetrySource + ?Sized>(&self, source: &S) -> String {
        let file_name = strip_extension(&source.aircraft_identity());
        let name = match self.tier {
            HostVersionTier::Legacy => file_name,
            HostVersionTier::Modern => {
                let ui_name = source.get_string(paths::ACF_UI_NAME);
                let ui_name = ui_name.trim();
                if ui_name.is_empty() { file_name } else { ui_name.to_string() }
            }
        };
        name.replace(';', ",")
    }
}

/// `Cessna_172SP.acf` → `Cessna_172SP`.
fn strip_extension(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xplm_shim::{DataRefValue, MockXplm};
    use telem_protocol::{decode_wire_line, encode_line};
    use telem_schema::paths;

    fn make_mock() -> MockXplm {
        let m = MockXplm::new();
        m.set_aircraft_file("Cessna_172SP.acf");
        m.set_elapsed_time(12.5);
        m.set_dataref(paths::G_NRML,             DataRefValue::Float(1.0));
        m.set_dataref(paths::INDICATED_AIRSPEED, DataRefValue::Float(100.0));
        m.set_dataref(paths::LATITUDE,           DataRefValue::Double(-26.1367));
        m.set_dataref(paths::LONGITUDE,          DataRefValue::Double(28.2411));
        m.set_dataref(paths::LOCAL_AX,           DataRefValue::Float(9.80665));
        m.set_dataref(paths::NUM_ENGINES,        DataRefValue::Int(2));
        m.set_dataref(paths::ENGINE_RPM,         DataRefValue::FloatArray(vec![2400.0, 2350.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]));
        m.set_dataref(paths::PROP_SPEED_RADPS,   DataRefValue::FloatArray(vec![251.327]));
        m.set_dataref(paths::TIRE_DEFLECTION,    DataRefValue::FloatArray(vec![0.01, 0.02, 0.0]));
        m.set_dataref(paths::GEAR_DEPLOY,        DataRefValue::FloatArray(vec![1.0, 1.0, 1.0, 0.0, 0.0]));
        m.set_dataref(paths::SPOILER_DEG,        DataRefValue::FloatArray(vec![5.0, 0.0, 0.0, 0.0]));
        m
    }

    #[test]
    fn every_registered_key_is_present() {
        let m = MockXplm::new();
        let snap = SnapshotBuilder::probe(&m).build(&m);
        assert_eq!(snap.len(), Field::ALL.len());
        for f in Field::ALL {
            assert!(snap.contains_key(f.key()), "missing {}", f.key());
        }
        // An empty host still produces well-formed zero values.
        assert_eq!(snap["src"], "XPLANE");
        assert_eq!(snap["G"], "0.000");
        assert_eq!(snap["EngRPM"], "");
        assert_eq!(snap["VelAcf"], "0.000~0.000~0.000");
    }

    #[test]
    fn scalars_apply_precision_and_conversion() {
        let m = make_mock();
        let snap = SnapshotBuilder::probe(&m).build(&m);
        assert_eq!(snap["T"], "12.500");
        assert_eq!(snap["G"], "1.000");
        assert_eq!(snap["IAS"], "51.444");
        assert_eq!(snap["Latitude"], "-26.136700");
        assert_eq!(snap["Longitude"], "28.241100");
        assert_eq!(snap["AccBody"], "1.000~0.000~0.000");
    }

    #[test]
    fn engine_arrays_follow_current_engine_count() {
        let m = make_mock();
        let builder = SnapshotBuilder::probe(&m);

        let snap = builder.build(&m);
        assert_eq!(snap["NumEngines"], "2");
        assert_eq!(snap["EngRPM"], "2400.000~2350.000");
        assert_eq!(snap["PropRPM"], "2399.996~0.000");
        assert_eq!(snap["AfterBurner"], "0.000~0.000");

        // Aircraft swapped for a single: no restart needed.
        m.set_dataref(paths::NUM_ENGINES, DataRefValue::Int(1));
        let snap = builder.build(&m);
        assert_eq!(snap["EngRPM"], "2400.000");
    }

    #[test]
    fn gear_arrays_follow_tire_array_length() {
        let m = make_mock();
        let snap = SnapshotBuilder::probe(&m).build(&m);
        assert_eq!(snap["NumGear"], "3");
        assert_eq!(snap["WeightOnWheels"], "0.010~0.020~0.000");
        assert_eq!(snap["Gear"], "1.000~1.000~1.000");
    }

    #[test]
    fn spoilers_are_trimmed() {
        let m = make_mock();
        let snap = SnapshotBuilder::probe(&m).build(&m);
        assert_eq!(snap["Spoilers"], "5.000");
    }

    #[test]
    fn legacy_identity_is_stripped_file_name() {
        let m = make_mock();
        m.set_version_tier(HostVersionTier::Legacy);
        m.set_dataref(paths::ACF_UI_NAME, DataRefValue::Text("Cessna Skyhawk".into()));
        let snap = SnapshotBuilder::probe(&m).build(&m);
        assert_eq!(snap["N"], "Cessna_172SP");
    }

    #[test]
    fn modern_identity_prefers_ui_name() {
        let m = make_mock();
        m.set_version_tier(HostVersionTier::Modern);
        m.set_dataref(paths::ACF_UI_NAME, DataRefValue::Text("Cessna Skyhawk".into()));
        let builder = SnapshotBuilder::probe(&m);
        assert_eq!(builder.build(&m)["N"], "Cessna Skyhawk");

        m.set_dataref(paths::ACF_UI_NAME, DataRefValue::Text(String::new()));
        assert_eq!(builder.build(&m)["N"], "Cessna_172SP");
    }

    #[test]
    fn identity_cannot_inject_wire_keys() {
        let m = make_mock();
        m.set_version_tier(HostVersionTier::Modern);
        m.set_dataref(paths::ACF_UI_NAME, DataRefValue::Text("Bell 407;AoA=99".into()));
        m.set_dataref(paths::ALPHA, DataRefValue::Float(4.0));
        let snap = SnapshotBuilder::probe(&m).build(&m);
        assert_eq!(snap["N"], "Bell 407,AoA=99");
        assert_eq!(snap["AoA"], "4.000");
        assert_eq!(decode_wire_line(&encode_line(&snap)), snap);

        m.set_version_tier(HostVersionTier::Legacy);
        m.set_aircraft_file("odd;name.acf");
        assert_eq!(SnapshotBuilder::probe(&m).build(&m)["N"], "odd,name");
    }

    #[test]
    fn version_tier_is_probed_once() {
        let m = make_mock();
        let builder = SnapshotBuilder::probe(&m);
        for _ in 0..5 {
            builder.build(&m);
        }
        assert_eq!(m.version_tier_queries(), 1);

        // A tier change after probing is not picked up.
        m.set_version_tier(HostVersionTier::Legacy);
        assert_eq!(builder.tier(), HostVersionTier::Modern);
    }

    #[test]
    fn strip_extension_handles_odd_names() {
        assert_eq!(strip_extension("A320.acf"), "A320");
        assert_eq!(strip_extension("my.plane.acf"), "my.plane");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension(""), "");
    }
}
