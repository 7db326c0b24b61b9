use crate::subsystems::swerve::conversions::{normalize_angle, wrap_radians};
use crate::subsystems::swerve::kinematics::Kinematics;
use nalgebra::{Rotation2, Vector2};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;
use uom::si::angle::radian;
use uom::si::f64::{Angle, Length};
use uom::si::length::meter;

/// ## Module odometry sample: <br>
/// -total linear distance the module's drive wheel has traveled <br>
/// -module's current angle
// Clone lets us use .clone, Debug and PartialEq lets us use assert_eq!() in tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModulePosition {
    pub distance: Length,
    pub angle: Angle,
}

impl ModulePosition {
    pub fn new(distance: Length, angle: Angle) -> ModulePosition {
        ModulePosition { distance, angle }
    }

    pub fn is_finite(&self) -> bool {
        self.distance.value.is_finite() && self.angle.value.is_finite()
    }
}

/// ## Where the robot thinks it is.
/// Heading is counter-clockwise positive and always wrapped to (-PI, PI].
/// Position accumulates without bound.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RobotPose {
    pub x: Length,
    pub y: Length,
    pub heading: Angle,
}

impl RobotPose {
    pub fn new(x: Length, y: Length, heading: Angle) -> RobotPose {
        Self {
            x,
            y,
            heading: normalize_angle(heading),
        }
    }

    /// Builds a pose from meters and radians.
    pub fn from_si(x: f64, y: f64, heading: f64) -> RobotPose {
        RobotPose::new(
            Length::new::<meter>(x),
            Length::new::<meter>(y),
            Angle::new::<radian>(heading),
        )
    }

    pub fn origin() -> RobotPose {
        RobotPose::from_si(0.0, 0.0, 0.0)
    }

    fn translation(&self) -> Vector2<f64> {
        Vector2::new(self.x.get::<meter>(), self.y.get::<meter>())
    }

    /// ## Applies a robot-relative twist, following a constant-curvature arc.
    pub fn exp(&self, twist: &Twist2d) -> RobotPose {
        let dx = twist.dx.get::<meter>();
        let dy = twist.dy.get::<meter>();
        let dtheta = twist.dtheta.get::<radian>();

        let sin_theta = dtheta.sin();
        let cos_theta = dtheta.cos();

        // Taylor expansions keep small rotations from dividing by ~0.
        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let robot_relative = Vector2::new(dx * s - dy * c, dx * c + dy * s);
        let field_relative = Rotation2::new(self.heading.get::<radian>()) * robot_relative;
        let translation = self.translation() + field_relative;

        RobotPose::from_si(
            translation.x,
            translation.y,
            self.heading.get::<radian>() + dtheta,
        )
    }

    /// ## The twist that takes this pose to `end` along a constant-curvature arc.
    /// Inverse of [`RobotPose::exp`].
    pub fn log(&self, end: &RobotPose) -> Twist2d {
        let heading = self.heading.get::<radian>();
        let delta = Rotation2::new(-heading) * (end.translation() - self.translation());
        let dtheta = wrap_radians(end.heading.get::<radian>() - heading);

        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan_of_half_dtheta = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        // Rotate by -half_dtheta and scale; (a, b) is that rotation's unnormalized (cos, sin).
        let a = half_theta_by_tan_of_half_dtheta;
        let b = -half_dtheta;
        Twist2d::from_si(delta.x * a - delta.y * b, delta.x * b + delta.y * a, dtheta)
    }
}

/// Robot-relative displacement over one update: translation plus rotation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Twist2d {
    pub dx: Length,
    pub dy: Length,
    pub dtheta: Angle,
}

impl Twist2d {
    /// Builds a twist from meters and radians.
    pub fn from_si(dx: f64, dy: f64, dtheta: f64) -> Twist2d {
        Twist2d {
            dx: Length::new::<meter>(dx),
            dy: Length::new::<meter>(dy),
            dtheta: Angle::new::<radian>(dtheta),
        }
    }
}

/// ## Robot pose estimator.
/// Integrates module travel through forward kinematics each cycle. Heading comes from the
/// gyro: its change since the last update replaces the kinematic rotation estimate.
/// last_module_positions and last_gyro_angle are the readings from the previous update;
/// deltas are taken against them.
pub struct PoseEstimator {
    kinematics: Kinematics,
    pose: RobotPose,
    last_module_positions: [ModulePosition; 4],
    last_gyro_angle: Angle,
}

impl PoseEstimator {
    /// ## Makes a new PoseEstimator.
    /// `gyro_angle` and `module_positions` are the current readings; `pose` is where the
    /// robot starts from.
    pub fn new(
        kinematics: Kinematics,
        gyro_angle: Angle,
        module_positions: [ModulePosition; 4],
        pose: RobotPose,
    ) -> PoseEstimator {
        PoseEstimator {
            kinematics,
            pose: RobotPose::new(pose.x, pose.y, pose.heading),
            last_module_positions: module_positions,
            last_gyro_angle: gyro_angle,
        }
    }

    /// ## Updates the pose for this cycle.
    /// Non-finite readings are skipped and the previous estimate is returned.
    pub fn update(&mut self, gyro_angle: Angle, module_positions: [ModulePosition; 4]) -> RobotPose {
        if !gyro_angle.value.is_finite() || module_positions.iter().any(|p| !p.is_finite()) {
            warn!("Skipping odometry update with non-finite readings");
            return self.pose;
        }

        let deltas = calculate_differences(&module_positions, &self.last_module_positions);

        let mut twist = self.kinematics.to_twist(&deltas);
        let delta_heading =
            wrap_radians(gyro_angle.get::<radian>() - self.last_gyro_angle.get::<radian>());
        twist.dtheta = Angle::new::<radian>(delta_heading);

        let moved = self.pose.exp(&twist);
        self.pose = RobotPose::from_si(
            moved.x.get::<meter>(),
            moved.y.get::<meter>(),
            self.pose.heading.get::<radian>() + delta_heading,
        );

        self.last_module_positions = module_positions;
        self.last_gyro_angle = gyro_angle;

        self.pose
    }

    pub fn get_pose(&self) -> RobotPose {
        self.pose
    }

    /// ## Overwrites the estimate and the odometry baseline.
    /// `gyro_angle` and `module_positions` are the readings at the moment of the reset;
    /// the next update measures its deltas against them.
    pub fn reset_pose(
        &mut self,
        gyro_angle: Angle,
        module_positions: [ModulePosition; 4],
        pose: RobotPose,
    ) {
        self.pose = RobotPose::new(pose.x, pose.y, pose.heading);
        self.last_module_positions = module_positions;
        self.last_gyro_angle = gyro_angle;
    }
}

/// ## Calculates the change in distance between the current and last module positions.
/// Each delta carries the current module angle, which is the direction the wheel ended up rolling.
fn calculate_differences(
    current_module_positions: &[ModulePosition; 4],
    last_module_positions: &[ModulePosition; 4],
) -> [ModulePosition; 4] {
    let mut deltas = *current_module_positions;
    for (delta, last) in deltas.iter_mut().zip(last_module_positions.iter()) {
        delta.distance -= last.distance;
    }
    deltas
}

/// ## Latest pose, readable from anywhere.
/// The drivetrain's periodic update is the only writer. Readers get a copy, so a read
/// never observes a half-written pose.
#[derive(Clone, Debug)]
pub struct SharedPose {
    pose: Arc<RwLock<RobotPose>>,
}

impl SharedPose {
    pub fn new(pose: RobotPose) -> SharedPose {
        SharedPose {
            pose: Arc::new(RwLock::new(pose)),
        }
    }

    pub fn get(&self) -> RobotPose {
        *self.pose.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, pose: RobotPose) {
        *self.pose.write().unwrap_or_else(PoisonError::into_inner) = pose;
    }
}
