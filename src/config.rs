//! Drivetrain configuration, loaded from JSON.

use std::path::Path;
use std::time::Duration;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use uom::si::f64::{Length, Velocity};
use uom::si::length::meter;
use uom::si::velocity::meter_per_second;

use crate::constants::config::{PERIOD_SECONDS, WHEELBASE_LENGTH_METERS, WHEELBASE_WIDTH_METERS};
use crate::constants::drivetrain::{
    ABSOLUTE_ENCODER_OFFSETS, MAX_MODULE_SPEED_MPS, SWERVE_DRIVE_RATIO, SWERVE_TURN_RATIO,
    SWERVE_WHEEL_DIAMETER_INCHES,
};
use crate::constants::robotmap::drivetrain_map::MODULE_NAMES;
use crate::error::{Result, SwerveError};
use crate::subsystems::swerve::kinematics::ModuleGeometry;
use crate::subsystems::swerve::module::ModuleConstants;

const METERS_PER_INCH: f64 = 0.0254;

/// One module's placement and encoder calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    /// Forward offset from the robot center (meters).
    pub offset_x_meters: f64,
    /// Leftward offset from the robot center (meters).
    pub offset_y_meters: f64,
    /// Absolute encoder reading when the wheel points forward (rotations).
    pub encoder_offset_rotations: f64,
}

/// Full drivetrain configuration.
///
/// Modules are listed left-front, left-rear, right-front, right-rear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    pub modules: Vec<ModuleConfig>,

    /// Default: 4 inches
    pub wheel_diameter_meters: f64,

    /// Drive motor rotations per wheel rotation.
    /// Default: 6.12
    pub drive_gear_ratio: f64,

    /// Steer motor rotations per steering rotation.
    /// Default: 12.8
    pub steer_gear_ratio: f64,

    /// Desaturation ceiling.
    /// Default: 4.5
    pub max_module_speed_mps: f64,

    /// Control loop period.
    /// Default: 0.02
    pub period_seconds: f64,

    /// Let drive motors coast instead of brake at zero speed.
    /// Default: false
    pub coast_on_neutral: bool,
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        let half_length = WHEELBASE_LENGTH_METERS / 2.0;
        let half_width = WHEELBASE_WIDTH_METERS / 2.0;
        let offsets = [
            (half_length, half_width),
            (-half_length, half_width),
            (half_length, -half_width),
            (-half_length, -half_width),
        ];

        let modules = MODULE_NAMES
            .iter()
            .zip(offsets)
            .zip(ABSOLUTE_ENCODER_OFFSETS)
            .map(|((name, (x, y)), encoder_offset)| ModuleConfig {
                name: (*name).to_owned(),
                offset_x_meters: x,
                offset_y_meters: y,
                encoder_offset_rotations: encoder_offset,
            })
            .collect();

        Self {
            modules,
            wheel_diameter_meters: SWERVE_WHEEL_DIAMETER_INCHES * METERS_PER_INCH,
            drive_gear_ratio: SWERVE_DRIVE_RATIO,
            steer_gear_ratio: SWERVE_TURN_RATIO,
            max_module_speed_mps: MAX_MODULE_SPEED_MPS,
            period_seconds: PERIOD_SECONDS,
            coast_on_neutral: false,
        }
    }
}

impl DrivetrainConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON string. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: DrivetrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.modules.len() != 4 {
            return Err(SwerveError::ModuleCount {
                found: self.modules.len(),
            });
        }

        for (name, ratio) in [
            ("drive_gear_ratio", self.drive_gear_ratio),
            ("steer_gear_ratio", self.steer_gear_ratio),
        ] {
            if !ratio.is_finite() || ratio == 0.0 {
                return Err(SwerveError::Config(format!(
                    "{name} must be finite and non-zero, got {ratio}"
                )));
            }
        }

        for (name, value) in [
            ("wheel_diameter_meters", self.wheel_diameter_meters),
            ("max_module_speed_mps", self.max_module_speed_mps),
            ("period_seconds", self.period_seconds),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SwerveError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        for module in &self.modules {
            if !module.offset_x_meters.is_finite()
                || !module.offset_y_meters.is_finite()
                || !module.encoder_offset_rotations.is_finite()
            {
                return Err(SwerveError::Config(format!(
                    "module {} has a non-finite offset",
                    module.name
                )));
            }
        }

        Ok(())
    }

    /// Module offsets from the robot center.
    pub fn geometry(&self) -> Result<ModuleGeometry> {
        let locations: [Vector2<f64>; 4] = self
            .modules
            .iter()
            .map(|module| Vector2::new(module.offset_x_meters, module.offset_y_meters))
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|locations: Vec<_>| SwerveError::ModuleCount {
                found: locations.len(),
            })?;
        Ok(ModuleGeometry::new(locations))
    }

    pub fn wheel_circumference(&self) -> Length {
        Length::new::<meter>(self.wheel_diameter_meters * std::f64::consts::PI)
    }

    /// Mechanical constants for the module at `index`. Out-of-range indices get a zero
    /// encoder offset.
    pub fn module_constants(&self, index: usize) -> ModuleConstants {
        ModuleConstants {
            drive_gear_ratio: self.drive_gear_ratio,
            steer_gear_ratio: self.steer_gear_ratio,
            wheel_circumference: self.wheel_circumference(),
            encoder_offset_rotations: self
                .modules
                .get(index)
                .map_or(0.0, |module| module.encoder_offset_rotations),
        }
    }

    pub fn max_module_speed(&self) -> Velocity {
        Velocity::new::<meter_per_second>(self.max_module_speed_mps)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period_seconds)
    }
}
