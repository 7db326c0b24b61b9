use crate::constants::drivetrain::ZERO_VELOCITY_EPSILON;
use crate::error::{Result, SwerveError};
use crate::subsystems::swerve::conversions::normalize_angle;
use crate::subsystems::swerve::odometry::{ModulePosition, RobotPose, Twist2d};
use nalgebra::{Rotation2, SMatrix, SVector, Vector2};
use std::time::Duration;
use uom::si::angle::radian;
use uom::si::angular_velocity::radian_per_second;
use uom::si::f64::{Angle, AngularVelocity, Length, Velocity};
use uom::si::length::meter;
use uom::si::velocity::meter_per_second;

/// Fixed module ordering used by every `[_; 4]` in the swerve subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleId {
    LeftFront,
    LeftRear,
    RightFront,
    RightRear,
}

impl ModuleId {
    pub const ALL: [ModuleId; 4] = [
        ModuleId::LeftFront,
        ModuleId::LeftRear,
        ModuleId::RightFront,
        ModuleId::RightRear,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModuleId::LeftFront => "LF",
            ModuleId::LeftRear => "LR",
            ModuleId::RightFront => "RF",
            ModuleId::RightRear => "RR",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// ## Offsets of each module's steering axis from the robot's center, in meters.
/// +x is forward and +y is left. Order follows [`ModuleId::ALL`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleGeometry {
    pub locations: [Vector2<f64>; 4],
}

impl ModuleGeometry {
    pub fn new(locations: [Vector2<f64>; 4]) -> ModuleGeometry {
        ModuleGeometry { locations }
    }

    /// Modules on the corners of a rectangle centered on the robot.
    pub fn rectangular(wheelbase_length: Length, wheelbase_width: Length) -> ModuleGeometry {
        let half_length = wheelbase_length.get::<meter>() / 2.0;
        let half_width = wheelbase_width.get::<meter>() / 2.0;

        ModuleGeometry::new([
            Vector2::new(half_length, half_width),   //   LF
            Vector2::new(-half_length, half_width),  //  LR
            Vector2::new(half_length, -half_width),  //  RF
            Vector2::new(-half_length, -half_width), // RR
        ])
    }
}

/// Speed and heading of one module. Angle is wrapped to (-180°, 180°].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModuleState {
    pub speed: Velocity,
    pub angle: Angle,
}

impl ModuleState {
    pub fn new(speed: Velocity, angle: Angle) -> ModuleState {
        ModuleState {
            speed,
            angle: normalize_angle(angle),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.speed.value.is_finite() && self.angle.value.is_finite()
    }
}

impl Default for ModuleState {
    fn default() -> Self {
        ModuleState {
            speed: Velocity::new::<meter_per_second>(0.0),
            angle: Angle::new::<radian>(0.0),
        }
    }
}

/// Reference frame a [`ChassisVelocity`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    /// Relative to the robot's current heading.
    Robot,
    /// Relative to the fixed field frame.
    Field,
}

/// Planar chassis velocity. Rotation is counter-clockwise positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChassisVelocity {
    pub forward: Velocity,
    pub strafe: Velocity,
    pub rotation: AngularVelocity,
}

impl ChassisVelocity {
    pub fn new(forward: Velocity, strafe: Velocity, rotation: AngularVelocity) -> ChassisVelocity {
        ChassisVelocity {
            forward,
            strafe,
            rotation,
        }
    }

    /// Builds a velocity from meters/second and radians/second.
    pub fn from_si(forward: f64, strafe: f64, rotation: f64) -> ChassisVelocity {
        ChassisVelocity::new(
            Velocity::new::<meter_per_second>(forward),
            Velocity::new::<meter_per_second>(strafe),
            AngularVelocity::new::<radian_per_second>(rotation),
        )
    }

    pub fn zero() -> ChassisVelocity {
        ChassisVelocity::from_si(0.0, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.forward.value.is_finite()
            && self.strafe.value.is_finite()
            && self.rotation.value.is_finite()
    }

    fn translation(&self) -> Vector2<f64> {
        Vector2::new(
            self.forward.get::<meter_per_second>(),
            self.strafe.get::<meter_per_second>(),
        )
    }

    fn with_translation(&self, translation: Vector2<f64>) -> ChassisVelocity {
        ChassisVelocity::new(
            Velocity::new::<meter_per_second>(translation.x),
            Velocity::new::<meter_per_second>(translation.y),
            self.rotation,
        )
    }

    /// Field-relative to robot-relative: rotate the translation by -heading.
    pub fn to_robot_relative(&self, heading: Angle) -> ChassisVelocity {
        let rotation = Rotation2::new(-heading.get::<radian>());
        self.with_translation(rotation * self.translation())
    }

    /// Robot-relative to field-relative: rotate the translation by heading.
    pub fn to_field_relative(&self, heading: Angle) -> ChassisVelocity {
        let rotation = Rotation2::new(heading.get::<radian>());
        self.with_translation(rotation * self.translation())
    }

    /// ## Corrects a continuous velocity for a control period of length `period`.
    /// Holding a constant twist for one period while rotating makes the robot skew
    /// sideways. This returns the velocity whose constant-curvature arc over `period`
    /// ends at the pose the straight-line command would have reached.
    pub fn discretize(&self, period: Duration) -> ChassisVelocity {
        let dt = period.as_secs_f64();
        if dt <= 0.0 {
            return *self;
        }

        let desired_delta = RobotPose::from_si(
            self.forward.get::<meter_per_second>() * dt,
            self.strafe.get::<meter_per_second>() * dt,
            self.rotation.get::<radian_per_second>() * dt,
        );
        let twist = RobotPose::origin().log(&desired_delta);

        ChassisVelocity::from_si(
            twist.dx.get::<meter>() / dt,
            twist.dy.get::<meter>() / dt,
            twist.dtheta.get::<radian>() / dt,
        )
    }

    fn is_zero(&self) -> bool {
        self.forward.value.abs() < ZERO_VELOCITY_EPSILON
            && self.strafe.value.abs() < ZERO_VELOCITY_EPSILON
            && self.rotation.value.abs() < ZERO_VELOCITY_EPSILON
    }
}

/// ## Swerve kinematics for four modules.
/// Inverse kinematics treats the chassis as a rigid body: each module's velocity is the
/// chassis translation plus `rotation x offset`. Forward kinematics solves that system
/// in the least-squares sense for the four measured module vectors.
#[derive(Debug, Clone)]
pub struct Kinematics {
    geometry: ModuleGeometry,
    forward_kinematics: SMatrix<f64, 3, 8>,
    last_states: [ModuleState; 4],
}

impl Kinematics {
    /// ## Builds the kinematics for `geometry`.
    /// Fails when the module offsets do not determine the chassis rotation (for example,
    /// all four modules at the same point).
    pub fn new(geometry: ModuleGeometry) -> Result<Kinematics> {
        if geometry
            .locations
            .iter()
            .any(|location| !location.x.is_finite() || !location.y.is_finite())
        {
            return Err(SwerveError::NonFinite {
                what: "module location",
            });
        }

        let inverse = inverse_kinematics(&geometry, Vector2::zeros());
        let normal = inverse.transpose() * inverse;
        let normal_inverse = normal
            .try_inverse()
            .ok_or(SwerveError::DegenerateGeometry)?;

        Ok(Kinematics {
            geometry,
            forward_kinematics: normal_inverse * inverse.transpose(),
            last_states: [ModuleState::default(); 4],
        })
    }

    /// ## Sets the angles a zero command holds.
    /// Called once the modules' real angles are known, so the first zero command
    /// doesn't swing the wheels back to 0°.
    pub fn set_last_angles(&mut self, angles: [Angle; 4]) {
        for (state, angle) in self.last_states.iter_mut().zip(angles) {
            *state = ModuleState::new(Velocity::new::<meter_per_second>(0.0), angle);
        }
    }

    /// ## Decomposes a robot-relative chassis velocity into module states.
    /// `center_of_rotation` is in meters, robot frame. A zero velocity keeps each
    /// module's previous angle with zero speed so the wheels don't snap back to 0°.
    pub fn to_module_states(
        &mut self,
        velocity: &ChassisVelocity,
        center_of_rotation: Vector2<f64>,
    ) -> [ModuleState; 4] {
        if velocity.is_zero() {
            for state in &mut self.last_states {
                state.speed = Velocity::new::<meter_per_second>(0.0);
            }
            return self.last_states;
        }

        let translation = velocity.translation();
        let rotation = velocity.rotation.get::<radian_per_second>();

        let mut states = [ModuleState::default(); 4];
        for (state, location) in states.iter_mut().zip(self.geometry.locations.iter()) {
            let offset = location - center_of_rotation;
            // rotation x offset, z-axis cross product in the plane.
            let module_velocity = translation + Vector2::new(-offset.y, offset.x) * rotation;

            *state = ModuleState::new(
                Velocity::new::<meter_per_second>(module_velocity.x.hypot(module_velocity.y)),
                Angle::new::<radian>(f64::atan2(module_velocity.y, module_velocity.x)),
            );
        }

        self.last_states = states;
        states
    }

    /// Least-squares robot-relative chassis velocity from measured module states.
    pub fn to_chassis_velocity(&self, states: &[ModuleState; 4]) -> ChassisVelocity {
        let module_vectors = SVector::<f64, 8>::from_iterator(states.iter().flat_map(|state| {
            let speed = state.speed.get::<meter_per_second>();
            let angle = state.angle.get::<radian>();
            [speed * angle.cos(), speed * angle.sin()]
        }));

        let chassis = self.forward_kinematics * module_vectors;
        ChassisVelocity::from_si(chassis[0], chassis[1], chassis[2])
    }

    /// Robot-relative twist from per-module travel since the last update.
    pub fn to_twist(&self, deltas: &[ModulePosition; 4]) -> Twist2d {
        let module_deltas = SVector::<f64, 8>::from_iterator(deltas.iter().flat_map(|delta| {
            let distance = delta.distance.get::<meter>();
            let angle = delta.angle.get::<radian>();
            [distance * angle.cos(), distance * angle.sin()]
        }));

        let chassis = self.forward_kinematics * module_deltas;
        Twist2d::from_si(chassis[0], chassis[1], chassis[2])
    }

    /// ## Scales all four speeds by the same factor so none exceeds `max_speed`.
    /// Angles are untouched, so the commanded direction of travel is preserved.
    /// States already within bounds are returned unchanged. An infinite request keeps its
    /// sign at `max_speed` and every finite speed goes to zero, the limit of the same scaling.
    pub fn desaturate_wheel_speeds(states: [ModuleState; 4], max_speed: Velocity) -> [ModuleState; 4] {
        let max_requested = states
            .iter()
            .map(|state| state.speed.get::<meter_per_second>().abs())
            .fold(0.0, f64::max);
        let max_speed = max_speed.get::<meter_per_second>();

        if max_requested <= max_speed {
            return states;
        }

        if max_requested.is_infinite() {
            return states.map(|state| {
                let speed = state.speed.get::<meter_per_second>();
                let clamped = if speed.is_infinite() {
                    max_speed.copysign(speed)
                } else {
                    0.0
                };
                ModuleState {
                    speed: Velocity::new::<meter_per_second>(clamped),
                    angle: state.angle,
                }
            });
        }

        let scale = max_speed / max_requested;
        states.map(|state| ModuleState {
            speed: state.speed * scale,
            angle: state.angle,
        })
    }
}

/// Rows `[1, 0, -y]` and `[0, 1, x]` per module, offsets taken from `center_of_rotation`.
fn inverse_kinematics(geometry: &ModuleGeometry, center_of_rotation: Vector2<f64>) -> SMatrix<f64, 8, 3> {
    let mut matrix = SMatrix::<f64, 8, 3>::zeros();
    for (i, location) in geometry.locations.iter().enumerate() {
        let offset = location - center_of_rotation;
        matrix[(i * 2, 0)] = 1.0;
        matrix[(i * 2, 2)] = -offset.y;
        matrix[(i * 2 + 1, 1)] = 1.0;
        matrix[(i * 2 + 1, 2)] = offset.x;
    }
    matrix
}

// run tests with
//      cargo test -- --nocapture
// to show prints even for successful tests.
#[cfg(test)]
mod kinematics_tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use std::f64::consts::PI;
    use uom::si::angle::degree;

    fn square_kinematics() -> Kinematics {
        Kinematics::new(ModuleGeometry::rectangular(
            Length::new::<meter>(1.0),
            Length::new::<meter>(1.0),
        ))
        .unwrap()
    }

    fn assert_velocity_eq(results: ChassisVelocity, expected: ChassisVelocity) {
        println!("expected: {:?}", expected);
        println!("results: {:?}", results);
        assert_approx_eq!(f64, results.forward.value, expected.forward.value, epsilon = 1e-9);
        assert_approx_eq!(f64, results.strafe.value, expected.strafe.value, epsilon = 1e-9);
        assert_approx_eq!(f64, results.rotation.value, expected.rotation.value, epsilon = 1e-9);
    }

    #[test]
    fn module_id_order_matches_names() {
        let names: Vec<&str> = ModuleId::ALL.iter().map(|id| id.name()).collect();
        assert_eq!(names, crate::constants::robotmap::drivetrain_map::MODULE_NAMES);
        assert_eq!(ModuleId::RightFront.index(), 2);
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        let result = Kinematics::new(ModuleGeometry::new([Vector2::new(0.5, 0.5); 4]));
        assert!(matches!(result, Err(SwerveError::DegenerateGeometry)));
    }

    #[test]
    fn forward_full_speed_test() {
        let mut kinematics = square_kinematics();

        let results =
            kinematics.to_module_states(&ChassisVelocity::from_si(1.0, 0.0, 0.0), Vector2::zeros());

        for state in results {
            assert_approx_eq!(f64, state.speed.get::<meter_per_second>(), 1.0, epsilon = 1e-12);
            assert_approx_eq!(f64, state.angle.get::<degree>(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn strafe_left_test() {
        let mut kinematics = square_kinematics();

        let results =
            kinematics.to_module_states(&ChassisVelocity::from_si(0.0, 0.5, 0.0), Vector2::zeros());

        for state in results {
            assert_approx_eq!(f64, state.speed.get::<meter_per_second>(), 0.5, epsilon = 1e-12);
            assert_approx_eq!(f64, state.angle.get::<degree>(), 90.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn backward_is_180_degrees() {
        let mut kinematics = square_kinematics();

        let results =
            kinematics.to_module_states(&ChassisVelocity::from_si(-1.0, 0.0, 0.0), Vector2::zeros());

        for state in results {
            assert_approx_eq!(f64, state.angle.get::<radian>(), PI, epsilon = 1e-12);
        }
    }

    #[test]
    fn counter_clockwise_rotation_test() {
        let geometry = ModuleGeometry::rectangular(Length::new::<meter>(1.0), Length::new::<meter>(1.0));
        let mut kinematics = Kinematics::new(geometry).unwrap();

        let results =
            kinematics.to_module_states(&ChassisVelocity::from_si(0.0, 0.0, 1.0), Vector2::zeros());

        // modules sit sqrt(0.5) from the center.
        let expected_angles = [135.0, -135.0, 45.0, -45.0];
        for (state, (expected_angle, location)) in results
            .iter()
            .zip(expected_angles.iter().zip(geometry.locations.iter()))
        {
            assert_approx_eq!(
                f64,
                state.speed.get::<meter_per_second>(),
                location.magnitude(),
                epsilon = 1e-12
            );
            assert_approx_eq!(f64, state.angle.get::<degree>(), *expected_angle, epsilon = 1e-9);

            // perpendicular to the offset vector.
            let angle = state.angle.get::<radian>();
            let heading = Vector2::new(angle.cos(), angle.sin());
            assert_approx_eq!(f64, heading.dot(location), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn rotation_about_offset_center_scales_with_distance() {
        let mut kinematics = square_kinematics();
        let center = Vector2::new(0.5, 0.5);

        let results =
            kinematics.to_module_states(&ChassisVelocity::from_si(0.0, 0.0, 2.0), center);

        // LF sits on the center of rotation.
        assert_approx_eq!(f64, results[0].speed.get::<meter_per_second>(), 0.0, epsilon = 1e-12);
        // LR and RF are one meter away, RR is sqrt(2) away.
        assert_approx_eq!(f64, results[1].speed.get::<meter_per_second>(), 2.0, epsilon = 1e-12);
        assert_approx_eq!(f64, results[2].speed.get::<meter_per_second>(), 2.0, epsilon = 1e-12);
        assert_approx_eq!(
            f64,
            results[3].speed.get::<meter_per_second>(),
            2.0 * 2.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn zero_velocity_keeps_previous_angles() {
        let mut kinematics = square_kinematics();

        kinematics.to_module_states(&ChassisVelocity::from_si(0.0, 1.0, 0.0), Vector2::zeros());
        let results = kinematics.to_module_states(&ChassisVelocity::zero(), Vector2::zeros());

        for state in results {
            assert_eq!(state.speed.get::<meter_per_second>(), 0.0);
            assert_approx_eq!(f64, state.angle.get::<degree>(), 90.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn zero_velocity_holds_seeded_angles() {
        let mut kinematics = square_kinematics();
        kinematics.set_last_angles([
            Angle::new::<degree>(45.0),
            Angle::new::<degree>(-30.0),
            Angle::new::<degree>(270.0),
            Angle::new::<degree>(0.0),
        ]);

        let results = kinematics.to_module_states(&ChassisVelocity::zero(), Vector2::zeros());

        let expected = [45.0, -30.0, -90.0, 0.0];
        for (state, expected) in results.iter().zip(expected) {
            assert_eq!(state.speed.get::<meter_per_second>(), 0.0);
            assert_approx_eq!(f64, state.angle.get::<degree>(), expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn round_trip_test() {
        let mut kinematics = square_kinematics();

        for velocity in [
            ChassisVelocity::from_si(1.0, 0.0, 0.0),
            ChassisVelocity::from_si(-0.3, 2.0, 0.0),
            ChassisVelocity::from_si(0.0, 0.0, -3.0),
            ChassisVelocity::from_si(1.5, -0.7, 2.2),
        ] {
            let states = kinematics.to_module_states(&velocity, Vector2::zeros());
            assert_velocity_eq(kinematics.to_chassis_velocity(&states), velocity);
        }
    }

    #[test]
    fn inverted_module_reports_same_velocity() {
        let kinematics = square_kinematics();
        let forward = [ModuleState::new(
            Velocity::new::<meter_per_second>(1.0),
            Angle::new::<degree>(0.0),
        ); 4];
        let mut flipped = forward;
        flipped[1] = ModuleState::new(
            Velocity::new::<meter_per_second>(-1.0),
            Angle::new::<degree>(180.0),
        );

        assert_velocity_eq(
            kinematics.to_chassis_velocity(&flipped),
            kinematics.to_chassis_velocity(&forward),
        );
    }

    #[test]
    fn twist_from_straight_deltas() {
        let kinematics = square_kinematics();
        let deltas = [ModulePosition::new(
            Length::new::<meter>(0.2),
            Angle::new::<degree>(90.0),
        ); 4];

        let twist = kinematics.to_twist(&deltas);

        assert_approx_eq!(f64, twist.dx.get::<meter>(), 0.0, epsilon = 1e-12);
        assert_approx_eq!(f64, twist.dy.get::<meter>(), 0.2, epsilon = 1e-12);
        assert_approx_eq!(f64, twist.dtheta.get::<radian>(), 0.0, epsilon = 1e-12);
    }

    fn states_from_speeds(speeds: [f64; 4]) -> [ModuleState; 4] {
        std::array::from_fn(|i| {
            ModuleState::new(
                Velocity::new::<meter_per_second>(speeds[i]),
                Angle::new::<degree>(i as f64 * 70.0 - 100.0),
            )
        })
    }

    #[test]
    fn desaturate_scales_uniformly() {
        let max_speed = 4.0;
        let mut sets = vec![
            [5.0, -2.5, 1.0, 4.0],
            [-9.0, -6.0, -4.5, -12.0],
            [8.0, -8.0, 8.0, -8.0],
            [100.0, 0.0, -0.001, 4.0],
        ];
        // mixed-sign sets where at least one speed is over the limit.
        for seed in 0..40_u32 {
            let speeds: [f64; 4] =
                std::array::from_fn(|i| ((seed * 7 + i as u32 * 13) % 29) as f64 - 14.0);
            if speeds.iter().any(|speed| speed.abs() > max_speed) {
                sets.push(speeds);
            }
        }

        for speeds in sets {
            let original = states_from_speeds(speeds);
            let results = Kinematics::desaturate_wheel_speeds(
                original,
                Velocity::new::<meter_per_second>(max_speed),
            );

            let max_requested = speeds.iter().map(|speed| speed.abs()).fold(0.0, f64::max);
            let expected_ratio = max_speed / max_requested;
            for (result, original) in results.iter().zip(original.iter()) {
                assert!(result.speed.get::<meter_per_second>().abs() <= max_speed + 1e-12);
                if original.speed.value != 0.0 {
                    assert_approx_eq!(
                        f64,
                        result.speed.value / original.speed.value,
                        expected_ratio,
                        epsilon = 1e-12
                    );
                }
                assert_eq!(result.angle, original.angle);
            }
        }
    }

    #[test]
    fn desaturate_infinite_request_clamps() {
        let original = states_from_speeds([f64::INFINITY, 3.0, f64::NEG_INFINITY, -1.0]);

        let results =
            Kinematics::desaturate_wheel_speeds(original, Velocity::new::<meter_per_second>(4.0));

        let speeds: Vec<f64> = results.iter().map(|state| state.speed.value).collect();
        assert_eq!(speeds, vec![4.0, 0.0, -4.0, 0.0]);
        for (result, original) in results.iter().zip(original.iter()) {
            assert_eq!(result.angle, original.angle);
        }
    }

    #[test]
    fn huge_command_stays_finite() {
        let mut kinematics = square_kinematics();

        let results = kinematics
            .to_module_states(&ChassisVelocity::from_si(1e300, 1e300, 0.0), Vector2::zeros());
        let results =
            Kinematics::desaturate_wheel_speeds(results, Velocity::new::<meter_per_second>(4.0));

        for state in results {
            assert!(state.is_finite());
            assert_approx_eq!(f64, state.speed.get::<meter_per_second>(), 4.0, epsilon = 1e-9);
            assert_approx_eq!(f64, state.angle.get::<degree>(), 45.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn desaturate_within_bounds_is_noop() {
        let original = [
            ModuleState::new(Velocity::new::<meter_per_second>(1.0), Angle::new::<degree>(10.0)),
            ModuleState::new(Velocity::new::<meter_per_second>(-4.0), Angle::new::<degree>(20.0)),
            ModuleState::new(Velocity::new::<meter_per_second>(0.0), Angle::new::<degree>(30.0)),
            ModuleState::new(Velocity::new::<meter_per_second>(3.9), Angle::new::<degree>(40.0)),
        ];

        let results =
            Kinematics::desaturate_wheel_speeds(original, Velocity::new::<meter_per_second>(4.0));

        assert_eq!(results, original);
    }

    #[test]
    fn frame_conversion_round_trip() {
        let velocity = ChassisVelocity::from_si(1.0, 0.0, 0.5);
        let heading = Angle::new::<degree>(90.0);

        let robot_relative = velocity.to_robot_relative(heading);
        // facing +y, field forward is the robot's right.
        assert_approx_eq!(f64, robot_relative.forward.value, 0.0, epsilon = 1e-12);
        assert_approx_eq!(f64, robot_relative.strafe.value, -1.0, epsilon = 1e-12);
        assert_eq!(robot_relative.rotation, velocity.rotation);

        assert_velocity_eq(robot_relative.to_field_relative(heading), velocity);
    }

    #[test]
    fn discretize_without_rotation_is_identity() {
        let velocity = ChassisVelocity::from_si(1.2, -0.4, 0.0);
        assert_velocity_eq(velocity.discretize(Duration::from_millis(20)), velocity);
    }

    #[test]
    fn discretize_compensates_for_rotation() {
        let period = Duration::from_millis(20);
        let velocity = ChassisVelocity::from_si(2.0, 0.0, 4.0);

        let discretized = velocity.discretize(period);

        // integrating the discretized twist for one period lands on the straight-line target.
        let dt = period.as_secs_f64();
        let end = RobotPose::origin().exp(&Twist2d::from_si(
            discretized.forward.value * dt,
            discretized.strafe.value * dt,
            discretized.rotation.value * dt,
        ));
        assert_approx_eq!(f64, end.x.get::<meter>(), 2.0 * dt, epsilon = 1e-12);
        assert_approx_eq!(f64, end.y.get::<meter>(), 0.0, epsilon = 1e-12);
        assert_approx_eq!(f64, end.heading.get::<radian>(), 4.0 * dt, epsilon = 1e-12);
        // turning left while driving straight means starting out slightly to the right.
        assert!(discretized.strafe.value < 0.0);
    }
}
