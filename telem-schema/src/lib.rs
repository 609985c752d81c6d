//! Static telemetry field registry shared by the X-Plane plugin and the
//! `telem-probe` tool.
//!
//! Every key published on the wire is described here exactly once: which
//! dataref it is read from, how many decimals it is formatted with, and the
//! multiplicative unit conversion applied at the point of reading. The set of
//! keys is part of the wire protocol; every key is present in every datagram.

use serde::Serialize;

// ── Unit conversions ──────────────────────────────────────────────────────────

pub mod units {
    /// Knots → metres per second.
    pub const KT_TO_MPS: f64 = 0.514_444;
    /// Radians per second → revolutions per minute.
    pub const RADPS_TO_RPM: f64 = 9.549_297;
    /// Feet per second squared → g.
    pub const FTPS2_TO_G: f64 = 0.031_081;
    /// Metres → feet.
    pub const M_TO_FT: f64 = 3.280_84;
    /// Pounds per square foot → pascals.
    pub const PSF_TO_PA: f64 = 47.880_258;
}

// ── X-Plane dataref paths ─────────────────────────────────────────────────────

pub mod paths {
    pub const PAUSED:              &str = "sim/time/paused";
    pub const ACF_UI_NAME:         &str = "sim/aircraft/view/acf_ui_name";
    // Loads
    pub const G_NRML:              &str = "sim/flightmodel/forces/g_nrml";
    pub const G_AXIL:              &str = "sim/flightmodel/forces/g_axil";
    pub const G_SIDE:              &str = "sim/flightmodel/forces/g_side";
    pub const LOCAL_AX:            &str = "sim/flightmodel/position/local_ax";
    pub const LOCAL_AY:            &str = "sim/flightmodel/position/local_ay";
    pub const LOCAL_AZ:            &str = "sim/flightmodel/position/local_az";
    // Air data
    pub const TRUE_AIRSPEED:       &str = "sim/flightmodel/position/true_airspeed";
    pub const INDICATED_AIRSPEED:  &str = "sim/flightmodel/position/indicated_airspeed";
    pub const GROUNDSPEED:         &str = "sim/flightmodel/position/groundspeed";
    pub const AIR_DENSITY:         &str = "sim/weather/rho";
    pub const DYN_PRESSURE_PSF:    &str = "sim/flightmodel/misc/Qstatic_psf";
    pub const ALPHA:               &str = "sim/flightmodel/position/alpha";
    pub const BETA:                &str = "sim/flightmodel/position/beta";
    pub const STALL_WARN_ALPHA:    &str = "sim/aircraft/overflow/acf_stall_warn_alpha";
    pub const VNE_KT:              &str = "sim/aircraft/view/acf_Vne";
    pub const VSO_KT:              &str = "sim/aircraft/view/acf_Vso";
    pub const VLE_KT:              &str = "sim/aircraft/overflow/acf_Vle";
    // Position and attitude
    pub const LATITUDE:            &str = "sim/flightmodel/position/latitude";
    pub const LONGITUDE:           &str = "sim/flightmodel/position/longitude";
    pub const ELEVATION:           &str = "sim/flightmodel/position/elevation";
    pub const Y_AGL:               &str = "sim/flightmodel/position/y_agl";
    pub const PSI:                 &str = "sim/flightmodel/position/psi";
    pub const THETA:               &str = "sim/flightmodel/position/theta";
    pub const PHI:                 &str = "sim/flightmodel/position/phi";
    pub const P_RAD:               &str = "sim/flightmodel/position/Prad";
    pub const Q_RAD:               &str = "sim/flightmodel/position/Qrad";
    pub const R_RAD:               &str = "sim/flightmodel/position/Rrad";
    pub const VX_ACF:              &str = "sim/flightmodel/forces/vx_acf_axis";
    pub const VY_ACF:              &str = "sim/flightmodel/forces/vy_acf_axis";
    pub const VZ_ACF:              &str = "sim/flightmodel/forces/vz_acf_axis";
    // Engines (arrays, one slot per engine)
    pub const NUM_ENGINES:         &str = "sim/aircraft/engine/acf_num_engines";
    pub const ENGINE_RPM:          &str = "sim/cockpit2/engine/indicators/engine_speed_rpm";
    pub const N1_PERCENT:          &str = "sim/cockpit2/engine/indicators/N1_percent";
    pub const PROP_SPEED_RADPS:    &str = "sim/flightmodel2/engines/prop_rotation_speed_rad_sec";
    pub const POINT_THRUST:        &str = "sim/flightmodel/engine/POINT_thrust";
    pub const AFTERBURNER_RATIO:   &str = "sim/flightmodel2/engines/afterburner_ratio";
    // Gear (arrays, one slot per gear leg)
    pub const TIRE_DEFLECTION:     &str = "sim/flightmodel2/gear/tire_vertical_deflection_mtr";
    pub const GEAR_DEPLOY:         &str = "sim/flightmodel2/gear/deploy_ratio";
    pub const GEAR_RETRACT:        &str = "sim/aircraft/gear/acf_gear_retract";
    pub const ON_GROUND_ANY:       &str = "sim/flightmodel/failures/onground_any";
    // Surfaces
    pub const FLAP_RATIO:          &str = "sim/flightmodel2/controls/flap1_deploy_ratio";
    pub const SPEEDBRAKE_RATIO:    &str = "sim/cockpit2/controls/speedbrake_ratio";
    pub const SPOILER_DEG:         &str = "sim/flightmodel2/wing/spoiler1_deg";
    pub const ELEVATOR_TRIM:       &str = "sim/cockpit2/controls/elevator_trim";
    pub const AILERON_TRIM:        &str = "sim/cockpit2/controls/aileron_trim";
    pub const RUDDER_TRIM:         &str = "sim/cockpit2/controls/rudder_trim";
    pub const RUDDER_DEFL:         &str = "sim/flightmodel/controls/ldruddef";
    pub const CANOPY_RATIO:        &str = "sim/flightmodel2/misc/canopy_open_ratio";
    // Systems
    pub const AP_SERVOS_ON:        &str = "sim/cockpit2/autopilot/servos_on";
    pub const STALL_WARNING:       &str = "sim/cockpit2/annunciators/stall_warning";
    pub const IS_HELICOPTER:       &str = "sim/aircraft2/metadata/is_helicopter";
    // Override flags (int, 0/1)
    pub const OVERRIDE_ROLL:       &str = "sim/operation/override/override_joystick_roll";
    pub const OVERRIDE_PITCH:      &str = "sim/operation/override/override_joystick_pitch";
    pub const OVERRIDE_HEADING:    &str = "sim/operation/override/override_joystick_heading";
    pub const OVERRIDE_PROP_PITCH: &str = "sim/operation/override/override_prop_pitch";
    // Axis ratios written while overridden
    pub const YOKE_ROLL_RATIO:     &str = "sim/joystick/yoke_roll_ratio";
    pub const YOKE_PITCH_RATIO:    &str = "sim/joystick/yoke_pitch_ratio";
    pub const YOKE_HEADING_RATIO:  &str = "sim/joystick/yoke_heading_ratio";
    pub const PROP_RATIO_ALL:      &str = "sim/cockpit2/engine/actuators/prop_ratio_all";
}

/// Value of the `src` key identifying this simulator to the receiver.
pub const SOURCE_TAG: &str = "XPLANE";

/// Dataref whose value is the current engine count.
pub const ENGINE_COUNT_DATAREF: &str = paths::NUM_ENGINES;
/// Array dataref whose current length is taken as the gear count.
pub const GEAR_COUNT_DATAREF: &str = paths::TIRE_DEFLECTION;

// ── Host version tier ─────────────────────────────────────────────────────────

/// Discrete host capability level, probed once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostVersionTier {
    /// X-Plane 11 and older: aircraft identity is the `.acf` file name.
    Legacy,
    /// X-Plane 12+: aircraft identity is the `acf_ui_name` dataref.
    Modern,
}

impl HostVersionTier {
    /// Map an `XPLMGetVersions` simulator version (e.g. `12100`) to a tier.
    pub fn from_xplane_version(version: i32) -> Self {
        if version >= 12_000 {
            Self::Modern
        } else {
            Self::Legacy
        }
    }
}

// ── Field specification ───────────────────────────────────────────────────────

/// How many entries an array field carries on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    /// Variable length; trailing `0.000` entries are stripped.
    Trimmed,
    /// Exactly the current engine count.
    EngineCount,
    /// Exactly the current gear count.
    GearCount,
}

/// Where a field's value comes from on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "dataref", rename_all = "snake_case")]
pub enum Source {
    Constant(&'static str),
    AircraftIdentity,
    ElapsedTime,
    Float(&'static str),
    Int(&'static str),
    Array(&'static str, Arity),
    /// Three scalar datarefs published as one fixed 3-entry array.
    Vector([&'static str; 3]),
    /// Current length of an array dataref.
    ArrayLen(&'static str),
}

/// Registry entry for a single wire key.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldSpec {
    pub key: &'static str,
    pub source: Source,
    /// Decimal places for scalar floats. Array entries always use 3.
    pub precision: usize,
    /// Multiplicative conversion applied before formatting.
    pub factor: f64,
}

const fn text(key: &'static str, source: Source) -> FieldSpec {
    FieldSpec { key, source, precision: 0, factor: 1.0 }
}

const fn float(key: &'static str, dataref: &'static str, precision: usize, factor: f64) -> FieldSpec {
    FieldSpec { key, source: Source::Float(dataref), precision, factor }
}

const fn int(key: &'static str, dataref: &'static str) -> FieldSpec {
    FieldSpec { key, source: Source::Int(dataref), precision: 0, factor: 1.0 }
}

const fn array(key: &'static str, dataref: &'static str, arity: Arity, factor: f64) -> FieldSpec {
    FieldSpec { key, source: Source::Array(dataref, arity), precision: 3, factor }
}

const fn vector(key: &'static str, datarefs: [&'static str; 3], factor: f64) -> FieldSpec {
    FieldSpec { key, source: Source::Vector(datarefs), precision: 3, factor }
}

// ── Field ─────────────────────────────────────────────────────────────────────

/// Strongly typed identifier for every published telemetry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Src,
    Name,
    Time,
    Paused,
    GNormal,
    GAxial,
    GSide,
    Tas,
    Ias,
    GroundSpeed,
    AirDensity,
    DynPressure,
    AoA,
    SideSlip,
    WarnAlpha,
    Vne,
    Vso,
    Vle,
    Latitude,
    Longitude,
    Elevation,
    Agl,
    Heading,
    Pitch,
    Roll,
    VelAcf,
    AccBody,
    RollRate,
    PitchRate,
    YawRate,
    NumEngines,
    EngRpm,
    EngPct,
    PropRpm,
    PropThrust,
    AfterBurner,
    NumGear,
    WeightOnWheels,
    Gear,
    RetractableGear,
    SimOnGround,
    Flaps,
    SpeedbrakePos,
    Spoilers,
    ElevTrimPct,
    AileronTrimPct,
    RudderTrimPct,
    RudderDefl,
    CanopyPos,
    ApServos,
    StallWarning,
    IsHelicopter,
    JoystickOverride,
    PedalsOverride,
    CollectiveOverride,
}

impl Field {
    /// Every field, in declaration order.
    pub const ALL: &'static [Field] = &[
        Field::Src,
        Field::Name,
        Field::Time,
        Field::Paused,
        Field::GNormal,
        Field::GAxial,
        Field::GSide,
        Field::Tas,
        Field::Ias,
        Field::GroundSpeed,
        Field::AirDensity,
        Field::DynPressure,
        Field::AoA,
        Field::SideSlip,
        Field::WarnAlpha,
        Field::Vne,
        Field::Vso,
        Field::Vle,
        Field::Latitude,
        Field::Longitude,
        Field::Elevation,
        Field::Agl,
        Field::Heading,
        Field::Pitch,
        Field::Roll,
        Field::VelAcf,
        Field::AccBody,
        Field::RollRate,
        Field::PitchRate,
        Field::YawRate,
        Field::NumEngines,
        Field::EngRpm,
        Field::EngPct,
        Field::PropRpm,
        Field::PropThrust,
        Field::AfterBurner,
        Field::NumGear,
        Field::WeightOnWheels,
        Field::Gear,
        Field::RetractableGear,
        Field::SimOnGround,
        Field::Flaps,
        Field::SpeedbrakePos,
        Field::Spoilers,
        Field::ElevTrimPct,
        Field::AileronTrimPct,
        Field::RudderTrimPct,
        Field::RudderDefl,
        Field::CanopyPos,
        Field::ApServos,
        Field::StallWarning,
        Field::IsHelicopter,
        Field::JoystickOverride,
        Field::PedalsOverride,
        Field::CollectiveOverride,
    ];

    pub fn spec(self) -> FieldSpec {
        use units::*;
        match self {
            Field::Src => text("src", Source::Constant(SOURCE_TAG)),
            Field::Name => text("N", Source::AircraftIdentity),
            Field::Time => FieldSpec { key: "T", source: Source::ElapsedTime, precision: 3, factor: 1.0 },
            Field::Paused => int("STOP", paths::PAUSED),
            Field::GNormal => float("G", paths::G_NRML, 3, 1.0),
            Field::GAxial => float("Gaxil", paths::G_AXIL, 3, 1.0),
            Field::GSide => float("Gside", paths::G_SIDE, 3, 1.0),
            Field::Tas => float("TAS", paths::TRUE_AIRSPEED, 3, 1.0),
            Field::Ias => float("IAS", paths::INDICATED_AIRSPEED, 3, KT_TO_MPS),
            Field::GroundSpeed => float("GS", paths::GROUNDSPEED, 3, 1.0),
            Field::AirDensity => float("AirDensity", paths::AIR_DENSITY, 3, 1.0),
            Field::DynPressure => float("DynPressure", paths::DYN_PRESSURE_PSF, 3, PSF_TO_PA),
            Field::AoA => float("AoA", paths::ALPHA, 3, 1.0),
            Field::SideSlip => float("SideSlip", paths::BETA, 3, 1.0),
            Field::WarnAlpha => float("WarnAlpha", paths::STALL_WARN_ALPHA, 3, 1.0),
            Field::Vne => float("Vne", paths::VNE_KT, 3, KT_TO_MPS),
            Field::Vso => float("Vso", paths::VSO_KT, 3, KT_TO_MPS),
            Field::Vle => float("Vle", paths::VLE_KT, 3, KT_TO_MPS),
            Field::Latitude => float("Latitude", paths::LATITUDE, 6, 1.0),
            Field::Longitude => float("Longitude", paths::LONGITUDE, 6, 1.0),
            Field::Elevation => float("Elevation", paths::ELEVATION, 3, 1.0),
            Field::Agl => float("AGL", paths::Y_AGL, 3, 1.0),
            Field::Heading => float("Heading", paths::PSI, 3, 1.0),
            Field::Pitch => float("Pitch", paths::THETA, 3, 1.0),
            Field::Roll => float("Roll", paths::PHI, 3, 1.0),
            Field::VelAcf => vector("VelAcf", [paths::VX_ACF, paths::VY_ACF, paths::VZ_ACF], 1.0),
            Field::AccBody => vector(
                "AccBody",
                [paths::LOCAL_AX, paths::LOCAL_AY, paths::LOCAL_AZ],
                M_TO_FT * FTPS2_TO_G,
            ),
            Field::RollRate => float("RollRate", paths::P_RAD, 3, 1.0),
            Field::PitchRate => float("PitchRate", paths::Q_RAD, 3, 1.0),
            Field::YawRate => float("YawRate", paths::R_RAD, 3, 1.0),
            Field::NumEngines => int("NumEngines", ENGINE_COUNT_DATAREF),
            Field::EngRpm => array("EngRPM", paths::ENGINE_RPM, Arity::EngineCount, 1.0),
            Field::EngPct => array("EngPCT", paths::N1_PERCENT, Arity::EngineCount, 1.0),
            Field::PropRpm => array("PropRPM", paths::PROP_SPEED_RADPS, Arity::EngineCount, RADPS_TO_RPM),
            Field::PropThrust => array("PropThrust", paths::POINT_THRUST, Arity::EngineCount, 1.0),
            Field::AfterBurner => array("AfterBurner", paths::AFTERBURNER_RATIO, Arity::EngineCount, 1.0),
            Field::NumGear => text("NumGear", Source::ArrayLen(GEAR_COUNT_DATAREF)),
            Field::WeightOnWheels => array("WeightOnWheels", paths::TIRE_DEFLECTION, Arity::GearCount, 1.0),
            Field::Gear => array("Gear", paths::GEAR_DEPLOY, Arity::GearCount, 1.0),
            Field::RetractableGear => int("RetractableGear", paths::GEAR_RETRACT),
            Field::SimOnGround => int("SimOnGround", paths::ON_GROUND_ANY),
            Field::Flaps => float("Flaps", paths::FLAP_RATIO, 3, 1.0),
            Field::SpeedbrakePos => float("SpeedbrakePos", paths::SPEEDBRAKE_RATIO, 3, 1.0),
            Field::Spoilers => array("Spoilers", paths::SPOILER_DEG, Arity::Trimmed, 1.0),
            Field::ElevTrimPct => float("ElevTrimPct", paths::ELEVATOR_TRIM, 3, 1.0),
            Field::AileronTrimPct => float("AileronTrimPct", paths::AILERON_TRIM, 3, 1.0),
            Field::RudderTrimPct => float("RudderTrimPct", paths::RUDDER_TRIM, 3, 1.0),
            Field::RudderDefl => float("RudderDefl", paths::RUDDER_DEFL, 3, 1.0),
            Field::CanopyPos => float("CanopyPos", paths::CANOPY_RATIO, 3, 1.0),
            Field::ApServos => int("APServos", paths::AP_SERVOS_ON),
            Field::StallWarning => int("StallWarning", paths::STALL_WARNING),
            Field::IsHelicopter => int("IsHelicopter", paths::IS_HELICOPTER),
            Field::JoystickOverride => int("jOvrd", paths::OVERRIDE_ROLL),
            Field::PedalsOverride => int("pOvrd", paths::OVERRIDE_HEADING),
            Field::CollectiveOverride => int("cOvrd", paths::OVERRIDE_PROP_PITCH),
        }
    }

    /// Wire key for this field.
    pub fn key(self) -> &'static str {
        self.spec().key
    }
}

// ── Override channels and axes ────────────────────────────────────────────────

/// Simulator input channel that can be handed over to the external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverrideChannel {
    Joystick,
    Pedals,
    Collective,
}

impl OverrideChannel {
    pub const ALL: [OverrideChannel; 3] = [Self::Joystick, Self::Pedals, Self::Collective];

    /// Keyword used in `OVERRIDE:<keyword>=<bool>` commands.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Joystick => "joystick",
            Self::Pedals => "pedals",
            Self::Collective => "collective",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.keyword() == keyword)
    }

    /// Host override flags toggled together for this channel.
    pub fn override_datarefs(self) -> &'static [&'static str] {
        match self {
            Self::Joystick => &[paths::OVERRIDE_ROLL, paths::OVERRIDE_PITCH],
            Self::Pedals => &[paths::OVERRIDE_HEADING],
            Self::Collective => &[paths::OVERRIDE_PROP_PITCH],
        }
    }

    /// Axes whose values are written while this channel is overridden.
    pub fn axes(self) -> &'static [Axis] {
        match self {
            Self::Joystick => &[Axis::JoystickX, Axis::JoystickY],
            Self::Pedals => &[Axis::PedalsX],
            Self::Collective => &[Axis::CollectiveY],
        }
    }
}

/// A single externally driven control axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    JoystickX,
    JoystickY,
    PedalsX,
    CollectiveY,
}

impl Axis {
    pub const ALL: [Axis; 4] = [Self::JoystickX, Self::JoystickY, Self::PedalsX, Self::CollectiveY];

    /// Key used in `AXIS:<key>=<value>,...` commands.
    pub fn key(self) -> &'static str {
        match self {
            Self::JoystickX => "jx",
            Self::JoystickY => "jy",
            Self::PedalsX => "px",
            Self::CollectiveY => "cy",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }

    /// Host ratio dataref this axis value is written to.
    pub fn dataref(self) -> &'static str {
        match self {
            Self::JoystickX => paths::YOKE_ROLL_RATIO,
            Self::JoystickY => paths::YOKE_PITCH_RATIO,
            Self::PedalsX => paths::YOKE_HEADING_RATIO,
            Self::CollectiveY => paths::PROP_RATIO_ALL,
        }
    }

    pub fn channel(self) -> OverrideChannel {
        match self {
            Self::JoystickX | Self::JoystickY => OverrideChannel::Joystick,
            Self::PedalsX => OverrideChannel::Pedals,
            Self::CollectiveY => OverrideChannel::Collective,
        }
    }
}
