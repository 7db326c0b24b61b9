//! Simulated hardware.
//!
//! Every device is a cheap handle around shared state: clone it before boxing it into the
//! drivetrain and keep the clone to inspect commands or inject faults.

use crate::config::DrivetrainConfig;
use crate::error::Result;
use crate::hardware::{AbsoluteEncoder, ControlMode, Gyro, HardwareError, ModuleHardware, MotorController};
use crate::subsystems::swerve::conversions::{rotations_to_degrees, rotations_to_distance};
use crate::subsystems::swerve::kinematics::{Kinematics, ModuleState};
use crate::subsystems::swerve::module::ModuleConstants;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use uom::si::angle::{degree, radian};
use uom::si::angular_velocity::radian_per_second;
use uom::si::f64::{Angle, Velocity};
use uom::si::length::meter;
use uom::si::velocity::meter_per_second;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimMotorState {
    /// None until the first command, and again after `stop`.
    pub mode: Option<ControlMode>,
    pub target: f64,
    /// Rotor rotations.
    pub position: f64,
    /// Rotor rotations/second.
    pub velocity: f64,
    pub faulted: bool,
    /// Number of accepted `set` calls.
    pub commands: u64,
}

#[derive(Debug, Clone)]
pub struct SimMotor {
    name: String,
    state: Rc<RefCell<SimMotorState>>,
}

impl SimMotor {
    pub fn new(name: &str) -> SimMotor {
        SimMotor {
            name: name.to_owned(),
            state: Rc::new(RefCell::new(SimMotorState::default())),
        }
    }

    pub fn state(&self) -> SimMotorState {
        *self.state.borrow()
    }

    pub fn set_faulted(&self, faulted: bool) {
        self.state.borrow_mut().faulted = faulted;
    }

    /// Overwrites what the motor's sensors report.
    pub fn set_sensor(&self, position: f64, velocity: f64) {
        let mut state = self.state.borrow_mut();
        state.position = position;
        state.velocity = velocity;
    }

    /// Advances the motor by `dt`. Position targets are reached immediately, velocity
    /// targets are integrated into position.
    pub fn step(&self, dt: Duration) {
        let mut state = self.state.borrow_mut();
        match state.mode {
            Some(ControlMode::Position) => {
                state.position = state.target;
                state.velocity = 0.0;
            }
            Some(ControlMode::Velocity { .. }) => {
                state.velocity = state.target;
                state.position += state.velocity * dt.as_secs_f64();
            }
            None => state.velocity = 0.0,
        }
    }

    fn check(&self) -> std::result::Result<(), HardwareError> {
        if self.state.borrow().faulted {
            return Err(HardwareError::Disconnected {
                device: self.name.clone(),
            });
        }
        Ok(())
    }
}

impl MotorController for SimMotor {
    fn set(&mut self, mode: ControlMode, value: f64) -> std::result::Result<(), HardwareError> {
        self.check()?;
        let mut state = self.state.borrow_mut();
        state.mode = Some(mode);
        state.target = value;
        state.commands += 1;
        Ok(())
    }

    fn get_position(&self) -> std::result::Result<f64, HardwareError> {
        self.check()?;
        Ok(self.state.borrow().position)
    }

    fn get_velocity(&self) -> std::result::Result<f64, HardwareError> {
        self.check()?;
        Ok(self.state.borrow().velocity)
    }

    fn set_position(&mut self, rotations: f64) -> std::result::Result<(), HardwareError> {
        self.check()?;
        self.state.borrow_mut().position = rotations;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.mode = None;
        state.target = 0.0;
        state.velocity = 0.0;
    }
}

#[derive(Debug, Clone)]
pub struct SimEncoder {
    name: String,
    // (absolute rotations, faulted)
    state: Rc<RefCell<(f64, bool)>>,
}

impl SimEncoder {
    pub fn new(name: &str, absolute: f64) -> SimEncoder {
        SimEncoder {
            name: name.to_owned(),
            state: Rc::new(RefCell::new((absolute, false))),
        }
    }

    pub fn set_absolute(&self, absolute: f64) {
        self.state.borrow_mut().0 = absolute;
    }

    pub fn set_faulted(&self, faulted: bool) {
        self.state.borrow_mut().1 = faulted;
    }
}

impl AbsoluteEncoder for SimEncoder {
    fn get_absolute(&self) -> std::result::Result<f64, HardwareError> {
        let (absolute, faulted) = *self.state.borrow();
        if faulted {
            return Err(HardwareError::Disconnected {
                device: self.name.clone(),
            });
        }
        Ok(absolute)
    }
}

#[derive(Debug, Clone)]
pub struct SimGyro {
    // (heading, faulted)
    state: Rc<RefCell<(Angle, bool)>>,
}

impl SimGyro {
    pub fn new() -> SimGyro {
        SimGyro {
            state: Rc::new(RefCell::new((Angle::new::<degree>(0.0), false))),
        }
    }

    pub fn set_angle(&self, angle: Angle) {
        self.state.borrow_mut().0 = angle;
    }

    pub fn angle(&self) -> Angle {
        self.state.borrow().0
    }

    pub fn set_faulted(&self, faulted: bool) {
        self.state.borrow_mut().1 = faulted;
    }
}

impl Default for SimGyro {
    fn default() -> Self {
        Self::new()
    }
}

impl Gyro for SimGyro {
    fn get_angle(&self) -> std::result::Result<Angle, HardwareError> {
        let (angle, faulted) = *self.state.borrow();
        if faulted {
            return Err(HardwareError::Fault {
                device: "gyro".to_owned(),
                reason: "no data".to_owned(),
            });
        }
        Ok(angle)
    }
}

/// ## A whole simulated drivetrain.
/// Owns handles to every simulated device. `step` advances the motors, then integrates
/// the gyro from the chassis rotation the modules' actual states produce.
pub struct SimRobot {
    pub drive: [SimMotor; 4],
    pub steer: [SimMotor; 4],
    pub encoders: [SimEncoder; 4],
    pub gyro: SimGyro,
    kinematics: Kinematics,
    constants: [ModuleConstants; 4],
}

impl SimRobot {
    /// Wheels start pointing forward, so each encoder reads its configured offset.
    pub fn new(config: &DrivetrainConfig) -> Result<SimRobot> {
        config.validate()?;
        let kinematics = Kinematics::new(config.geometry()?)?;
        let names: Vec<&str> = config.modules.iter().map(|module| module.name.as_str()).collect();
        let constants: [ModuleConstants; 4] = std::array::from_fn(|i| config.module_constants(i));

        Ok(SimRobot {
            drive: std::array::from_fn(|i| SimMotor::new(&format!("{} drive", names[i]))),
            steer: std::array::from_fn(|i| SimMotor::new(&format!("{} steer", names[i]))),
            encoders: std::array::from_fn(|i| {
                SimEncoder::new(
                    &format!("{} encoder", names[i]),
                    constants[i].encoder_offset_rotations,
                )
            }),
            gyro: SimGyro::new(),
            kinematics,
            constants,
        })
    }

    /// Boxed handles in module order, ready for the drivetrain.
    pub fn module_hardware(&self) -> Vec<ModuleHardware> {
        (0..4)
            .map(|i| ModuleHardware {
                drive: Box::new(self.drive[i].clone()),
                steer: Box::new(self.steer[i].clone()),
                encoder: Box::new(self.encoders[i].clone()),
            })
            .collect()
    }

    pub fn gyro_hardware(&self) -> Box<dyn Gyro> {
        Box::new(self.gyro.clone())
    }

    /// What the modules are physically doing.
    pub fn module_states(&self) -> [ModuleState; 4] {
        std::array::from_fn(|i| {
            let constants = &self.constants[i];
            let drive = self.drive[i].state();
            let steer = self.steer[i].state();
            let speed = rotations_to_distance(
                drive.velocity,
                constants.drive_gear_ratio,
                constants.wheel_circumference,
            );
            ModuleState::new(
                Velocity::new::<meter_per_second>(speed.get::<meter>()),
                Angle::new::<degree>(rotations_to_degrees(
                    steer.position / constants.steer_gear_ratio,
                )),
            )
        })
    }

    pub fn step(&mut self, dt: Duration) {
        for motor in self.drive.iter().chain(self.steer.iter()) {
            motor.step(dt);
        }

        let chassis = self.kinematics.to_chassis_velocity(&self.module_states());
        let turned = chassis.rotation.get::<radian_per_second>() * dt.as_secs_f64();
        let heading = self.gyro.angle().get::<radian>() + turned;
        self.gyro.set_angle(Angle::new::<radian>(heading));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn velocity_mode_integrates_position() {
        let mut motor = SimMotor::new("drive");
        motor
            .set(ControlMode::Velocity { coast_on_neutral: false }, 10.0)
            .unwrap();

        for _ in 0..50 {
            motor.step(Duration::from_millis(20));
        }

        assert_approx_eq!(f64, motor.get_position().unwrap(), 10.0, epsilon = 1e-9);
        assert_eq!(motor.get_velocity().unwrap(), 10.0);

        motor.stop();
        motor.step(Duration::from_millis(20));
        assert_eq!(motor.get_velocity().unwrap(), 0.0);
    }

    #[test]
    fn faulted_devices_report_errors() {
        let mut motor = SimMotor::new("steer");
        motor.set_faulted(true);
        assert!(motor.get_position().is_err());
        assert!(motor.set(ControlMode::Position, 1.0).is_err());
        assert_eq!(motor.state().commands, 0);

        let encoder = SimEncoder::new("encoder", 0.5);
        assert_eq!(encoder.get_absolute().unwrap(), 0.5);
        encoder.set_faulted(true);
        assert!(encoder.get_absolute().is_err());

        let gyro = SimGyro::new();
        gyro.set_faulted(true);
        assert!(gyro.get_angle().is_err());
    }

    #[test]
    fn sim_robot_integrates_rotation() {
        let config = DrivetrainConfig::default();
        let mut robot = SimRobot::new(&config).unwrap();
        assert_eq!(robot.module_hardware().len(), 4);

        // point every wheel tangentially and spin counter-clockwise at 1 m/s.
        let tangents = [135.0, -135.0, 45.0, -45.0];
        for i in 0..4 {
            let constants = config.module_constants(i);
            robot.steer[i].set_sensor(tangents[i] / 360.0 * constants.steer_gear_ratio, 0.0);
            robot.drive[i].set_sensor(0.0, 0.0);
            let wheel_rotations_per_second =
                1.0 / constants.wheel_circumference.get::<meter>();
            robot.drive[i]
                .clone()
                .set(
                    ControlMode::Velocity { coast_on_neutral: false },
                    wheel_rotations_per_second * constants.drive_gear_ratio,
                )
                .unwrap();
        }

        robot.step(Duration::from_secs(1));

        // 1 m/s at the corner radius.
        let radius = config.geometry().unwrap().locations[0].magnitude();
        assert_approx_eq!(f64, robot.gyro.angle().get::<radian>(), 1.0 / radius, epsilon = 1e-9);
    }
}
