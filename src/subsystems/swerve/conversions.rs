//! Conversions between motor rotations, wheel travel and steering angle.
//!
//! `ratio` is always motor rotations per mechanism rotation.

use std::f64::consts::{PI, TAU};
use uom::si::angle::radian;
use uom::si::f64::{Angle, Length};

/// Motor rotations to linear wheel travel.
pub fn rotations_to_distance(rotations: f64, ratio: f64, wheel_circumference: Length) -> Length {
    wheel_circumference * (rotations / ratio)
}

/// Linear wheel travel to motor rotations.
pub fn distance_to_rotations(distance: Length, ratio: f64, wheel_circumference: Length) -> f64 {
    (distance / wheel_circumference).value * ratio
}

pub fn rotations_to_degrees(rotations: f64) -> f64 {
    rotations * 360.0
}

pub fn degrees_to_rotations(degrees: f64) -> f64 {
    degrees / 360.0
}

/// Wraps degrees into [0, 360).
pub fn wrap_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Wraps radians into (-PI, PI]. Values already in range are returned untouched.
pub fn wrap_radians(radians: f64) -> f64 {
    if radians > -PI && radians <= PI {
        return radians;
    }
    let wrapped = radians.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

pub fn normalize_angle(angle: Angle) -> Angle {
    Angle::new::<radian>(wrap_radians(angle.get::<radian>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use std::f64::consts::PI;
    use uom::si::length::{inch, meter};

    fn four_inch_wheel() -> Length {
        Length::new::<inch>(4.0) * PI
    }

    #[test]
    fn one_wheel_rotation_is_one_circumference() {
        let travelled = rotations_to_distance(6.12, 6.12, four_inch_wheel());
        assert_approx_eq!(
            f64,
            travelled.get::<meter>(),
            four_inch_wheel().get::<meter>(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn distance_round_trip() {
        let circumference = four_inch_wheel();
        for ratio in [1.0, 6.12, 12.8, -3.5, 0.25] {
            for rotations in [-1000.0, -2.5, 0.0, 0.001, 7.0, 12345.678] {
                let distance = rotations_to_distance(rotations, ratio, circumference);
                let back = distance_to_rotations(distance, ratio, circumference);
                assert_approx_eq!(f64, back, rotations, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn wrap_degrees_range() {
        assert_eq!(wrap_degrees(370.0), 10.0);
        assert_eq!(wrap_degrees(-90.0), 270.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert_eq!(wrap_degrees(-1e-17), 0.0);
    }

    #[test]
    fn wrap_radians_range() {
        assert_eq!(wrap_radians(PI), PI);
        assert_approx_eq!(f64, wrap_radians(-PI), PI, epsilon = 1e-12);
        assert_approx_eq!(f64, wrap_radians(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_approx_eq!(f64, wrap_radians(-5.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_eq!(wrap_radians(0.3), 0.3);
    }

    #[test]
    fn degrees_round_trip() {
        assert_eq!(rotations_to_degrees(0.25), 90.0);
        assert_eq!(degrees_to_rotations(-180.0), -0.5);
        for degrees in [-720.0, -90.0, 0.0, 45.0, 359.9] {
            assert_approx_eq!(
                f64,
                rotations_to_degrees(degrees_to_rotations(degrees)),
                degrees,
                epsilon = 1e-12
            );
        }
    }
}
