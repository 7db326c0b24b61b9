//! Hardware capabilities the swerve core drives.
//!
//! Motor controllers, absolute steering encoders and the gyro are external
//! collaborators. Every call is expected to be non-blocking with bounded latency;
//! nothing here is atomic across modules.

pub mod sim;

use thiserror::Error;
use uom::si::f64::Angle;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HardwareError {
    #[error("{device} is not responding")]
    Disconnected { device: String },

    #[error("{device} reported a fault: {reason}")]
    Fault { device: String, reason: String },
}

/// How a motor controller should interpret a setpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMode {
    /// Closed-loop position, value in rotor rotations.
    Position,
    /// Closed-loop velocity, value in rotor rotations/second.
    /// `coast_on_neutral` lets the motor coast instead of brake when the target is zero.
    Velocity { coast_on_neutral: bool },
}

/// A motor with an integrated relative encoder.
pub trait MotorController {
    fn set(&mut self, mode: ControlMode, value: f64) -> Result<(), HardwareError>;

    /// Rotor position in rotations.
    fn get_position(&self) -> Result<f64, HardwareError>;

    /// Rotor velocity in rotations/second.
    fn get_velocity(&self) -> Result<f64, HardwareError>;

    /// Overwrites the relative encoder's current position.
    fn set_position(&mut self, rotations: f64) -> Result<(), HardwareError>;

    fn stop(&mut self);
}

/// Absolute steering angle sensor.
pub trait AbsoluteEncoder {
    /// Absolute position in rotations.
    fn get_absolute(&self) -> Result<f64, HardwareError>;
}

/// Robot heading sensor, counter-clockwise positive.
pub trait Gyro {
    fn get_angle(&self) -> Result<Angle, HardwareError>;
}

/// The three devices making up one swerve module.
pub struct ModuleHardware {
    pub drive: Box<dyn MotorController>,
    pub steer: Box<dyn MotorController>,
    pub encoder: Box<dyn AbsoluteEncoder>,
}
