use crate::config::DrivetrainConfig;
use crate::error::{Result, SwerveError};
use crate::hardware::{Gyro, ModuleHardware};
use crate::subsystems::swerve::kinematics::{
    ChassisVelocity, Frame, Kinematics, ModuleId, ModuleState,
};
use crate::subsystems::swerve::module::SwerveModule;
use crate::subsystems::swerve::odometry::{ModulePosition, PoseEstimator, RobotPose, SharedPose};
use nalgebra::Vector2;
use std::time::Duration;
use tracing::{debug, info, warn};
use uom::si::angle::radian;
use uom::si::f64::{Angle, Velocity};
use uom::si::velocity::meter_per_second;

/// Drivetrain struct.
/// Owns the four modules, the gyro and the pose estimator. One caller drives it: a command
/// (`drive_*`) and a `tick` per control cycle. <br>
/// last_gyro_angle is the last good gyro reading, reused when a read fails.
pub struct Drivetrain {
    kinematics: Kinematics,
    modules: [SwerveModule; 4],
    gyro: Box<dyn Gyro>,
    estimator: PoseEstimator,
    shared_pose: SharedPose,

    max_module_speed: Velocity,
    coast_on_neutral: bool,
    period: Duration,

    last_gyro_angle: Angle,
}

impl Drivetrain {
    /// ## Returns a new Drivetrain.
    /// `hardware` is in module order (LF, LR, RF, RR). Each module's steer encoder is seeded
    /// from its absolute encoder, so the wheels don't need to be zeroed by hand. A failed seed
    /// is logged and the module keeps its relative sensor as-is.
    pub fn new(
        config: &DrivetrainConfig,
        hardware: Vec<ModuleHardware>,
        gyro: Box<dyn Gyro>,
        starting_pose: RobotPose,
    ) -> Result<Drivetrain> {
        config.validate()?;
        let mut kinematics = Kinematics::new(config.geometry()?)?;

        let [lf, lr, rf, rr]: [ModuleHardware; 4] =
            hardware
                .try_into()
                .map_err(|hardware: Vec<ModuleHardware>| SwerveError::ModuleCount {
                    found: hardware.len(),
                })?;
        let mut modules = [
            (ModuleId::LeftFront, lf),
            (ModuleId::LeftRear, lr),
            (ModuleId::RightFront, rf),
            (ModuleId::RightRear, rr),
        ]
        .map(|(id, hardware)| SwerveModule::new(id, hardware, config.module_constants(id.index())));

        for module in &mut modules {
            if let Err(e) = module.seed_from_absolute() {
                warn!("{} could not be seeded from its absolute encoder: {}", module.id().name(), e);
            }
        }

        // a zero command before the first real one holds the seeded angles.
        kinematics.set_last_angles(modules.each_ref().map(|module| module.get_state().angle));

        let last_gyro_angle = match gyro.get_angle() {
            Ok(angle) => angle,
            Err(e) => {
                warn!("Gyro unavailable at startup, assuming 0: {}", e);
                Angle::new::<radian>(0.0)
            }
        };

        let positions = modules.each_ref().map(|module| module.get_position());
        let estimator =
            PoseEstimator::new(kinematics.clone(), last_gyro_angle, positions, starting_pose);
        let shared_pose = SharedPose::new(estimator.get_pose());

        info!(
            "Drivetrain ready, max module speed {} m/s, period {:?}",
            config.max_module_speed_mps,
            config.period()
        );

        Ok(Drivetrain {
            kinematics,
            modules,
            gyro,
            estimator,
            shared_pose,
            max_module_speed: config.max_module_speed(),
            coast_on_neutral: config.coast_on_neutral,
            period: config.period(),
            last_gyro_angle,
        })
    }

    /// ## Drives the robot.
    /// Field-relative commands are rotated into the robot frame by the estimated heading.
    /// The command is then discretized for one control period, decomposed around
    /// `center_of_rotation` (meters, robot frame), desaturated and sent to the modules.
    /// Non-finite commands are dropped and the modules hold their last targets.
    pub fn drive(
        &mut self,
        velocity: ChassisVelocity,
        frame: Frame,
        center_of_rotation: Vector2<f64>,
    ) {
        if !velocity.is_finite() || !center_of_rotation.iter().all(|v| v.is_finite()) {
            warn!("Dropping non-finite drive command {:?}", velocity);
            return;
        }

        let robot_relative = match frame {
            Frame::Field => velocity.to_robot_relative(self.heading()),
            Frame::Robot => velocity,
        };

        let discretized = robot_relative.discretize(self.period);
        let states = self
            .kinematics
            .to_module_states(&discretized, center_of_rotation);
        self.set_module_states(states);
    }

    pub fn drive_field_relative(&mut self, velocity: ChassisVelocity, center_of_rotation: Vector2<f64>) {
        self.drive(velocity, Frame::Field, center_of_rotation);
    }

    pub fn drive_robot_relative(&mut self, velocity: ChassisVelocity, center_of_rotation: Vector2<f64>) {
        self.drive(velocity, Frame::Robot, center_of_rotation);
    }

    /// ## Sets module targets directly.
    /// Speeds are always desaturated against the current ceiling first.
    pub fn set_module_states(&mut self, states: [ModuleState; 4]) {
        let states = Kinematics::desaturate_wheel_speeds(states, self.max_module_speed);

        for (module, state) in self.modules.iter_mut().zip(states) {
            if let Err(e) = module.set_desired_state(state, self.coast_on_neutral) {
                warn!("{}: {}", module.id().name(), e);
            }
        }
    }

    /// Robot-relative velocity measured from the modules.
    pub fn robot_relative_velocity(&self) -> ChassisVelocity {
        self.kinematics.to_chassis_velocity(&self.module_states())
    }

    /// Field-relative velocity measured from the modules and the estimated heading.
    pub fn field_relative_velocity(&self) -> ChassisVelocity {
        self.robot_relative_velocity().to_field_relative(self.heading())
    }

    /// ## Sets the desaturation ceiling.
    /// Non-positive or non-finite values are rejected and the previous ceiling is kept.
    pub fn set_max_module_speed(&mut self, max_speed: Velocity) -> Result<()> {
        let value = max_speed.get::<meter_per_second>();
        if !value.is_finite() {
            return Err(SwerveError::NonFinite {
                what: "max module speed",
            });
        }
        if value <= 0.0 {
            return Err(SwerveError::Config(format!(
                "max module speed must be positive, got {value}"
            )));
        }

        debug!("Max module speed set to {} m/s", value);
        self.max_module_speed = max_speed;
        Ok(())
    }

    pub fn max_module_speed(&self) -> Velocity {
        self.max_module_speed
    }

    /// Applies from the next module command on.
    pub fn set_coast_on_neutral(&mut self, coast_on_neutral: bool) {
        self.coast_on_neutral = coast_on_neutral;
    }

    /// ## Periodic update, once per control cycle.
    /// Reads the gyro and module positions, updates the estimator and publishes the pose.
    /// A failed gyro read reuses the last good heading.
    pub fn tick(&mut self) -> RobotPose {
        let gyro_angle = self.read_gyro();
        let positions = self.module_positions();

        let pose = self.estimator.update(gyro_angle, positions);
        self.shared_pose.set(pose);
        pose
    }

    pub fn pose(&self) -> RobotPose {
        self.estimator.get_pose()
    }

    /// Cloneable read handle to the pose published by `tick`.
    pub fn pose_handle(&self) -> SharedPose {
        self.shared_pose.clone()
    }

    /// ## Overwrites the pose estimate.
    /// Odometry continues from fresh readings taken now.
    pub fn reset_pose(&mut self, pose: RobotPose) {
        let gyro_angle = self.read_gyro();
        let positions = self.module_positions();

        self.estimator.reset_pose(gyro_angle, positions, pose);
        self.shared_pose.set(self.estimator.get_pose());
        info!("Pose reset to {:?}", self.estimator.get_pose());
    }

    /// Makes the current heading zero. Translation is kept.
    pub fn reset_heading(&mut self) {
        let pose = self.pose();
        self.reset_pose(RobotPose::new(pose.x, pose.y, Angle::new::<radian>(0.0)));
    }

    /// Estimated heading, counter-clockwise positive.
    pub fn heading(&self) -> Angle {
        self.estimator.get_pose().heading
    }

    /// Stops the drivetrain.
    pub fn stop(&mut self) {
        for module in &mut self.modules {
            module.stop();
        }
    }

    pub fn module_states(&self) -> [ModuleState; 4] {
        self.modules.each_ref().map(|module| module.get_state())
    }

    pub fn module_positions(&self) -> [ModulePosition; 4] {
        self.modules.each_ref().map(|module| module.get_position())
    }

    fn read_gyro(&mut self) -> Angle {
        match self.gyro.get_angle() {
            Ok(angle) => self.last_gyro_angle = angle,
            Err(e) => warn!("Gyro read failed, reusing last heading: {}", e),
        }
        self.last_gyro_angle
    }
}
