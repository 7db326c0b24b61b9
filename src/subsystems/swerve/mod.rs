pub mod conversions;
pub mod drivetrain;
pub mod kinematics;
pub mod module;
pub mod odometry;
