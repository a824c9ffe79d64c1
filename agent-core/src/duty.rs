//! Duty-cycle math shared by the LED channels and the servo.
//! All values are on a 16-bit scale; the PWM backend rescales to its own resolution.

/// Full-scale duty (100%).
pub const DUTY_FULL_SCALE: u16 = u16::MAX;

/// ~2.5% of full scale: 0.5 ms pulse at 50 Hz.
pub const SERVO_MIN_DUTY: u16 = 1638;

/// ~12.5% of full scale: 2.5 ms pulse at 50 Hz.
pub const SERVO_MAX_DUTY: u16 = 8192;

pub const SERVO_MAX_ANGLE: f32 = 180.0;

/// Clamp an angle to [0, 180]. NaN maps to 0.
pub fn clamp_angle(degrees: f32) -> f32 {
    if degrees.is_nan() {
        return 0.0;
    }
    degrees.clamp(0.0, SERVO_MAX_ANGLE)
}

/// Map an angle affinely onto `[min_duty, max_duty]`, rounded to the nearest unit.
pub fn angle_to_duty(degrees: f32, min_duty: u16, max_duty: u16) -> u16 {
    let angle = clamp_angle(degrees);
    let span = max_duty.saturating_sub(min_duty) as f32;
    let duty = min_duty as f32 + span * angle / SERVO_MAX_ANGLE;
    duty.round() as u16
}

/// `round(value * 65535)`.
///
/// Out-of-range input is not rejected. The cast saturates, so negative
/// values write 0 and values above 1.0 write full scale.
pub fn brightness_to_duty(value: f32) -> u16 {
    (value * DUTY_FULL_SCALE as f32).round() as u16
}

/// Rescale a 16-bit duty onto a peripheral whose full scale is `max_duty`.
pub fn scale_duty(duty: u16, max_duty: u32) -> u32 {
    ((duty as u64 * max_duty as u64 + DUTY_FULL_SCALE as u64 / 2) / DUTY_FULL_SCALE as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_angle_endpoints() {
        assert_eq!(angle_to_duty(0.0, SERVO_MIN_DUTY, SERVO_MAX_DUTY), SERVO_MIN_DUTY);
        assert_eq!(angle_to_duty(180.0, SERVO_MIN_DUTY, SERVO_MAX_DUTY), SERVO_MAX_DUTY);
        // 1638 + 6554 / 2 = 4915
        assert_eq!(angle_to_duty(90.0, SERVO_MIN_DUTY, SERVO_MAX_DUTY), 4915);
    }

    #[test]
    fn test_angle_clamped() {
        assert_eq!(angle_to_duty(-45.0, SERVO_MIN_DUTY, SERVO_MAX_DUTY), SERVO_MIN_DUTY);
        assert_eq!(angle_to_duty(720.0, SERVO_MIN_DUTY, SERVO_MAX_DUTY), SERVO_MAX_DUTY);
        assert_eq!(clamp_angle(f32::NAN), 0.0);
        assert_eq!(clamp_angle(f32::INFINITY), 180.0);
    }

    #[test]
    fn test_brightness() {
        assert_eq!(brightness_to_duty(0.0), 0);
        assert_eq!(brightness_to_duty(1.0), DUTY_FULL_SCALE);
        assert_eq!(brightness_to_duty(0.5), 32768);
        // Not validated, but saturating
        assert_eq!(brightness_to_duty(-0.3), 0);
        assert_eq!(brightness_to_duty(2.0), DUTY_FULL_SCALE);
    }

    #[test]
    fn test_scale_duty() {
        assert_eq!(scale_duty(DUTY_FULL_SCALE, 16383), 16383);
        assert_eq!(scale_duty(0, 16383), 0);
        assert_eq!(scale_duty(32768, 1023), 512);
    }

    proptest! {
        #[test]
        fn prop_angle_duty_in_range(angle in 0.0f32..=180.0) {
            let duty = angle_to_duty(angle, SERVO_MIN_DUTY, SERVO_MAX_DUTY);
            prop_assert!(duty >= SERVO_MIN_DUTY && duty <= SERVO_MAX_DUTY);
        }

        #[test]
        fn prop_angle_duty_monotonic(a in 0.0f32..=180.0, b in 0.0f32..=180.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(
                angle_to_duty(lo, SERVO_MIN_DUTY, SERVO_MAX_DUTY)
                    <= angle_to_duty(hi, SERVO_MIN_DUTY, SERVO_MAX_DUTY)
            );
        }

        #[test]
        fn prop_clamp_idempotent(angle in any::<f32>()) {
            let once = clamp_angle(angle);
            prop_assert_eq!(clamp_angle(once), once);
            if angle < 0.0 {
                prop_assert_eq!(once, 0.0);
            }
            if angle > 180.0 {
                prop_assert_eq!(once, 180.0);
            }
        }
    }
}
