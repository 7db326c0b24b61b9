use crate::error::{Result, SwerveError};
use crate::hardware::{AbsoluteEncoder, ControlMode, HardwareError, ModuleHardware, MotorController};
use crate::subsystems::swerve::conversions::{
    degrees_to_rotations, distance_to_rotations, normalize_angle, rotations_to_degrees,
    rotations_to_distance, wrap_degrees,
};
use crate::subsystems::swerve::kinematics::{ModuleId, ModuleState};
use crate::subsystems::swerve::odometry::ModulePosition;
use std::cell::Cell;
use tracing::{debug, warn};
use uom::si::angle::degree;
use uom::si::f64::{Angle, Length, Velocity};
use uom::si::length::meter;
use uom::si::velocity::meter_per_second;

/// Per-module mechanical constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleConstants {
    /// Drive motor rotations per wheel rotation.
    pub drive_gear_ratio: f64,
    /// Steer motor rotations per steering rotation.
    pub steer_gear_ratio: f64,
    pub wheel_circumference: Length,
    /// Absolute encoder reading when the wheel points forward.
    pub encoder_offset_rotations: f64,
}

/// ## Steering continuity for one module.
/// last_commanded_angle: the wheel heading sent last cycle, degrees in [0, 360). <br>
/// steering_rotations: accumulated steering target in mechanism rotations. It never wraps,
/// so the steer motor always takes the short way. <br>
/// inverted: whether last cycle's drive speed was flipped.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveTargetState {
    pub last_commanded_angle: f64,
    pub steering_rotations: f64,
    pub inverted: bool,
}

/// Last good sensor values, reused when a read fails.
#[derive(Debug, Clone, Copy, Default)]
struct LastReadings {
    steer_position: f64,
    drive_position: f64,
    drive_velocity: f64,
}

/// One independently steered and driven wheel.
pub struct SwerveModule {
    id: ModuleId,
    drive: Box<dyn MotorController>,
    steer: Box<dyn MotorController>,
    encoder: Box<dyn AbsoluteEncoder>,
    constants: ModuleConstants,
    target: DriveTargetState,
    last_readings: Cell<LastReadings>,
}

impl SwerveModule {
    pub fn new(id: ModuleId, hardware: ModuleHardware, constants: ModuleConstants) -> SwerveModule {
        SwerveModule {
            id,
            drive: hardware.drive,
            steer: hardware.steer,
            encoder: hardware.encoder,
            constants,
            target: DriveTargetState::default(),
            last_readings: Cell::new(LastReadings::default()),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn target_state(&self) -> &DriveTargetState {
        &self.target
    }

    /// ## Seeds the steer motor's relative encoder from the absolute encoder.
    /// Lets the robot start without physically zeroing the wheels. Also resets the
    /// steering continuity to the measured angle.
    pub fn seed_from_absolute(&mut self) -> Result<()> {
        let absolute = self.encoder.get_absolute()?;
        if !absolute.is_finite() {
            return Err(SwerveError::NonFinite {
                what: "absolute encoder reading",
            });
        }

        let steering_rotations = absolute - self.constants.encoder_offset_rotations;
        let motor_rotations = steering_rotations * self.constants.steer_gear_ratio;
        self.steer.set_position(motor_rotations)?;

        let mut readings = self.last_readings.get();
        readings.steer_position = motor_rotations;
        self.last_readings.set(readings);

        self.target = DriveTargetState {
            last_commanded_angle: wrap_degrees(rotations_to_degrees(steering_rotations)),
            steering_rotations,
            inverted: false,
        };
        debug!(
            "{} seeded at {:.1} degrees",
            self.id.name(),
            self.target.last_commanded_angle
        );
        Ok(())
    }

    /// Current wheel speed and heading. Heading is wrapped to (-180°, 180°].
    pub fn get_state(&self) -> ModuleState {
        let velocity = self.read_drive_velocity();
        let speed = rotations_to_distance(
            velocity,
            self.constants.drive_gear_ratio,
            self.constants.wheel_circumference,
        );

        ModuleState::new(
            Velocity::new::<meter_per_second>(speed.get::<meter>()),
            self.get_angle(),
        )
    }

    /// Accumulated drive distance and current heading.
    pub fn get_position(&self) -> ModulePosition {
        let position = self.read_drive_position();
        let distance = rotations_to_distance(
            position,
            self.constants.drive_gear_ratio,
            self.constants.wheel_circumference,
        );

        ModulePosition::new(distance, self.get_angle())
    }

    /// Steering angle wrapped to (-180°, 180°]. The motor position itself never wraps.
    fn get_angle(&self) -> Angle {
        let steer_position = self.read_steer_position();
        normalize_angle(Angle::new::<degree>(rotations_to_degrees(
            steer_position / self.constants.steer_gear_ratio,
        )))
    }

    /// ## Commands the module toward `desired`.
    /// The wrap reference is the last commanded angle, not the sensor angle, so sensor noise
    /// can't flip the direction of rotation from one cycle to the next. If the target is
    /// more than 90° away, the wheel aims at the opposite heading and drives backwards
    /// instead, so the steering never turns more than a quarter turn per call.
    /// Non-finite targets are rejected and the previous command is held.
    pub fn set_desired_state(&mut self, desired: ModuleState, coast_on_neutral: bool) -> Result<()> {
        if !desired.is_finite() {
            return Err(SwerveError::NonFinite {
                what: "module target",
            });
        }

        let desired_angle = wrap_degrees(desired.angle.get::<degree>());
        let last_angle = self.target.last_commanded_angle;
        let angle_distance = (desired_angle - last_angle).abs();

        let (target_angle, inverted) = if angle_distance > 90.0 && angle_distance < 270.0 {
            (wrap_degrees(desired_angle + 180.0), true)
        } else {
            (desired_angle, false)
        };

        // shortest signed travel, in (-180, 180].
        let mut angle_delta = wrap_degrees(target_angle - last_angle);
        if angle_delta > 180.0 {
            angle_delta -= 360.0;
        }

        self.target = DriveTargetState {
            last_commanded_angle: target_angle,
            steering_rotations: self.target.steering_rotations + degrees_to_rotations(angle_delta),
            inverted,
        };

        let invert_factor = if inverted { -1.0 } else { 1.0 };
        let drive_rotations_per_second = distance_to_rotations(
            Length::new::<meter>(desired.speed.get::<meter_per_second>() * invert_factor),
            self.constants.drive_gear_ratio,
            self.constants.wheel_circumference,
        );

        let steer_result = self.steer.set(
            ControlMode::Position,
            self.target.steering_rotations * self.constants.steer_gear_ratio,
        );
        let drive_result = self.drive.set(
            ControlMode::Velocity { coast_on_neutral },
            drive_rotations_per_second,
        );

        steer_result?;
        drive_result?;
        Ok(())
    }

    /// Stops both motors.
    pub fn stop(&mut self) {
        self.drive.stop();
        self.steer.stop();
    }

    fn read_steer_position(&self) -> f64 {
        let mut readings = self.last_readings.get();
        readings.steer_position = self.fallback(
            "steer position",
            self.steer.get_position(),
            readings.steer_position,
        );
        self.last_readings.set(readings);
        readings.steer_position
    }

    fn read_drive_position(&self) -> f64 {
        let mut readings = self.last_readings.get();
        readings.drive_position = self.fallback(
            "drive position",
            self.drive.get_position(),
            readings.drive_position,
        );
        self.last_readings.set(readings);
        readings.drive_position
    }

    fn read_drive_velocity(&self) -> f64 {
        let mut readings = self.last_readings.get();
        readings.drive_velocity = self.fallback(
            "drive velocity",
            self.drive.get_velocity(),
            readings.drive_velocity,
        );
        self.last_readings.set(readings);
        readings.drive_velocity
    }

    /// Falls back to the last good value on a failed or non-finite read.
    fn fallback(
        &self,
        what: &str,
        reading: std::result::Result<f64, HardwareError>,
        last: f64,
    ) -> f64 {
        match reading {
            Ok(value) if value.is_finite() => value,
            Ok(value) => {
                warn!("{} {} read {}, using last value", self.id.name(), what, value);
                last
            }
            Err(e) => {
                warn!("{} {} read failed ({}), using last value", self.id.name(), what, e);
                last
            }
        }
    }
}
