//! Actuator registry: the fixed set of PWM outputs owned by the agent.
//!
//! The number and identity of outputs is fixed by [`ActuatorRegistry::initialize`];
//! nothing can add or remove a handle afterwards.
use crate::duty::{angle_to_duty, brightness_to_duty, SERVO_MAX_DUTY, SERVO_MIN_DUTY};
use crate::error::ActuatorError;

/// A single duty-cycle output on the 16-bit duty scale.
///
/// # Implementations
/// - **Device:** `LedcOutput` in the firmware crate (ESP32 LEDC peripheral)
/// - **Host:** [`crate::sim::MemoryOutput`] (in-memory)
pub trait DutyOutput {
    fn set_duty(&mut self, duty: u16) -> Result<(), ActuatorError>;
}

impl<T: DutyOutput + ?Sized> DutyOutput for Box<T> {
    fn set_duty(&mut self, duty: u16) -> Result<(), ActuatorError> {
        (**self).set_duty(duty)
    }
}

/// Angle-addressable actuator on top of a duty output.
pub struct Servo<O> {
    output: O,
    min_duty: u16,
    max_duty: u16,
    last_duty: u16,
}

impl<O: DutyOutput> Servo<O> {
    pub fn new(output: O) -> Self {
        Self::with_calibration(output, SERVO_MIN_DUTY, SERVO_MAX_DUTY)
    }

    pub fn with_calibration(output: O, min_duty: u16, max_duty: u16) -> Self {
        Self {
            output,
            min_duty,
            max_duty,
            last_duty: 0,
        }
    }

    /// Move to `degrees`, clamped to [0, 180].
    pub fn set_angle(&mut self, degrees: f32) -> Result<(), ActuatorError> {
        let duty = angle_to_duty(degrees, self.min_duty, self.max_duty);
        self.output.set_duty(duty)?;
        self.last_duty = duty;
        log::debug!("Servo -> {:.1} deg (duty {})", degrees, duty);
        Ok(())
    }

    /// Stop driving the servo (duty 0, no holding torque).
    pub fn release(&mut self) -> Result<(), ActuatorError> {
        self.output.set_duty(0)?;
        self.last_duty = 0;
        Ok(())
    }

    pub fn last_duty(&self) -> u16 {
        self.last_duty
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}

pub struct ActuatorRegistry<L, S> {
    leds: Vec<L>,
    servo: Option<Servo<S>>,
}

impl<L: DutyOutput, S: DutyOutput> ActuatorRegistry<L, S> {
    /// Take ownership of the outputs and force each one to idle (duty 0).
    pub fn initialize(mut leds: Vec<L>, servo: Option<Servo<S>>) -> Result<Self, ActuatorError> {
        for led in leds.iter_mut() {
            led.set_duty(0)?;
        }
        let mut servo = servo;
        if let Some(servo) = servo.as_mut() {
            servo.release()?;
        }
        log::info!(
            "Actuators ready: {} LED channel(s), servo {}",
            leds.len(),
            if servo.is_some() { "attached" } else { "absent" }
        );
        Ok(Self { leds, servo })
    }

    /// Pair channels with `values` positionally; the shorter side wins.
    pub fn set_brightness(&mut self, values: &[f32]) -> Result<(), ActuatorError> {
        for (led, value) in self.leds.iter_mut().zip(values) {
            led.set_duty(brightness_to_duty(*value))?;
        }
        Ok(())
    }

    pub fn set_channel(&mut self, index: usize, value: f32) -> Result<(), ActuatorError> {
        let count = self.leds.len();
        let led = self
            .leds
            .get_mut(index)
            .ok_or(ActuatorError::NoSuchChannel { index, count })?;
        led.set_duty(brightness_to_duty(value))
    }

    pub fn set_angle(&mut self, degrees: f32) -> Result<(), ActuatorError> {
        self.servo
            .as_mut()
            .ok_or(ActuatorError::NoServo)?
            .set_angle(degrees)
    }

    /// Return every output to idle.
    pub fn all_off(&mut self) -> Result<(), ActuatorError> {
        for led in self.leds.iter_mut() {
            led.set_duty(0)?;
        }
        if let Some(servo) = self.servo.as_mut() {
            servo.release()?;
        }
        Ok(())
    }

    pub fn channel_count(&self) -> usize {
        self.leds.len()
    }

    pub fn has_servo(&self) -> bool {
        self.servo.is_some()
    }

    pub fn leds(&self) -> &[L] {
        &self.leds
    }

    pub fn servo(&self) -> Option<&Servo<S>> {
        self.servo.as_ref()
    }
}
