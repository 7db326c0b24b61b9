pub mod swerve;
