pub mod config {
    /// Wheel-Wheel width of robot.
    pub const WHEELBASE_WIDTH_METERS: f64 = 0.5715;
    /// Wheel-Wheel length of robot.
    pub const WHEELBASE_LENGTH_METERS: f64 = 0.5715;

    /// Control loop period. Also used to discretize chassis velocity commands.
    pub const PERIOD_SECONDS: f64 = 0.02;
}

pub mod robotmap {
    pub mod drivetrain_map {
        /// Module names in the fixed module order.
        pub const MODULE_NAMES: [&str; 4] = ["LF", "LR", "RF", "RR"];
    }
}

pub mod drivetrain {
    /// Motor rotations per steering rotation.
    pub const SWERVE_TURN_RATIO: f64 = 12.8;
    /// Motor rotations per wheel rotation.
    pub const SWERVE_DRIVE_RATIO: f64 = 6.12;
    pub const SWERVE_WHEEL_DIAMETER_INCHES: f64 = 4.0;

    /// Desaturation ceiling for a single module, meters/second.
    pub const MAX_MODULE_SPEED_MPS: f64 = 4.5;

    /// Absolute encoder readings (rotations) when each wheel points forward.
    /// Order is LF, LR, RF, RR.
    pub const ABSOLUTE_ENCODER_OFFSETS: [f64; 4] = [
        -0.77001953125,
        -0.49951171875,
        0.569580078125,
        0.596435546875,
    ];

    /// Below this magnitude a chassis velocity component counts as zero.
    pub const ZERO_VELOCITY_EPSILON: f64 = 1e-9;
}
