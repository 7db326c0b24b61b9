use crate::config::DrivetrainConfig;
use crate::error::Result;
use crate::hardware::sim::SimRobot;
use crate::subsystems::swerve::drivetrain::Drivetrain;
use crate::subsystems::swerve::kinematics::{ChassisVelocity, Frame};
use crate::subsystems::swerve::odometry::RobotPose;
use nalgebra::Vector2;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

pub mod config;
pub mod constants;
pub mod error;
pub mod hardware;
pub mod subsystems;

pub use error::SwerveError;

/// One cycle's drive request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveCommand {
    pub velocity: ChassisVelocity,
    pub frame: Frame,
    /// Rotation center in meters, robot frame.
    pub center_of_rotation: Vector2<f64>,
}

impl DriveCommand {
    pub fn field_relative(velocity: ChassisVelocity) -> DriveCommand {
        DriveCommand {
            velocity,
            frame: Frame::Field,
            center_of_rotation: Vector2::zeros(),
        }
    }

    pub fn robot_relative(velocity: ChassisVelocity) -> DriveCommand {
        DriveCommand {
            velocity,
            frame: Frame::Robot,
            center_of_rotation: Vector2::zeros(),
        }
    }
}

/// The drivetrain wired to simulated hardware.
/// The drivetrain is shared so a watchdog task can stop it.
#[derive(Clone)]
pub struct SimBot {
    pub drivetrain: Rc<RefCell<Drivetrain>>,
    pub robot: Rc<RefCell<SimRobot>>,
    pub period: Duration,
}

impl SimBot {
    pub fn new(config: &DrivetrainConfig) -> Result<Self> {
        let robot = SimRobot::new(config)?;
        let drivetrain = Drivetrain::new(
            config,
            robot.module_hardware(),
            robot.gyro_hardware(),
            RobotPose::origin(),
        )?;

        Ok(SimBot {
            drivetrain: Rc::new(RefCell::new(drivetrain)),
            robot: Rc::new(RefCell::new(robot)),
            period: config.period(),
        })
    }

    pub fn stop(&self) {
        if let Ok(mut drivetrain) = self.drivetrain.try_borrow_mut() {
            drivetrain.stop();
        }
    }
}

/// Runs one control cycle: command the drivetrain, advance the simulation, update the pose.
/// Returns None if another task holds the drivetrain this cycle.
pub fn cycle(bot: &SimBot, command: &DriveCommand) -> Option<RobotPose> {
    let mut drivetrain = bot.drivetrain.try_borrow_mut().ok()?;
    drivetrain.drive(command.velocity, command.frame, command.center_of_rotation);

    if let Ok(mut robot) = bot.robot.try_borrow_mut() {
        robot.step(bot.period);
    }

    Some(drivetrain.tick())
}
