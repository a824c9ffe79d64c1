//! Runs a validated [`Program`] against an explicit capability set.
//!
//! [`Namespace`] is the only thing a payload can reach. It is built fresh for
//! every run, borrows the actuator registry for the duration of that run and
//! is dropped afterwards.

use std::f32::consts::TAU;
use std::time::Duration;

use crate::actuator::{ActuatorRegistry, DutyOutput};
use crate::error::{ActuatorError, ExecError};
use crate::program::{step_path, Level, Program, Shape, Step};

pub trait Clock {
    /// Monotonic time since an arbitrary origin.
    fn now(&self) -> Duration;
    fn sleep(&mut self, duration: Duration);
}

pub trait Entropy {
    fn next_u32(&mut self) -> u32;
}

/// Everything a payload is allowed to do.
pub trait Capabilities {
    fn shape(&self) -> Shape;
    fn set_brightness(&mut self, values: &[f32]) -> Result<(), ActuatorError>;
    fn set_channel(&mut self, channel: usize, value: f32) -> Result<(), ActuatorError>;
    fn set_angle(&mut self, degrees: f32) -> Result<(), ActuatorError>;
    fn all_off(&mut self) -> Result<(), ActuatorError>;
    fn sleep(&mut self, duration: Duration);
    /// Uniform in `[0, 1)`.
    fn random(&mut self) -> f32;
    /// Time since the run started.
    fn elapsed(&self) -> Duration;
}

pub struct Namespace<'a, L, S> {
    registry: &'a mut ActuatorRegistry<L, S>,
    clock: &'a mut dyn Clock,
    entropy: &'a mut dyn Entropy,
    started: Duration,
}

impl<'a, L: DutyOutput, S: DutyOutput> Namespace<'a, L, S> {
    pub fn new(
        registry: &'a mut ActuatorRegistry<L, S>,
        clock: &'a mut dyn Clock,
        entropy: &'a mut dyn Entropy,
    ) -> Self {
        let started = clock.now();
        Self {
            registry,
            clock,
            entropy,
            started,
        }
    }
}

impl<L: DutyOutput, S: DutyOutput> Capabilities for Namespace<'_, L, S> {
    fn shape(&self) -> Shape {
        Shape {
            channels: self.registry.channel_count(),
            servo: self.registry.has_servo(),
        }
    }

    fn set_brightness(&mut self, values: &[f32]) -> Result<(), ActuatorError> {
        self.registry.set_brightness(values)
    }

    fn set_channel(&mut self, channel: usize, value: f32) -> Result<(), ActuatorError> {
        self.registry.set_channel(channel, value)
    }

    fn set_angle(&mut self, degrees: f32) -> Result<(), ActuatorError> {
        self.registry.set_angle(degrees)
    }

    fn all_off(&mut self) -> Result<(), ActuatorError> {
        self.registry.all_off()
    }

    fn sleep(&mut self, duration: Duration) {
        self.clock.sleep(duration);
    }

    fn random(&mut self) -> f32 {
        // 24 bits fit exactly in an f32 mantissa
        (self.entropy.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    fn elapsed(&self) -> Duration {
        self.clock.now().saturating_sub(self.started)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStats {
    pub steps_executed: u64,
    pub slept: Duration,
}

pub fn run<C: Capabilities + ?Sized>(program: &Program, caps: &mut C) -> Result<RunStats, ExecError> {
    let mut stats = RunStats::default();
    run_steps(&program.steps, caps, "", &mut stats)?;
    Ok(stats)
}

fn run_steps<C: Capabilities + ?Sized>(
    steps: &[Step],
    caps: &mut C,
    prefix: &str,
    stats: &mut RunStats,
) -> Result<(), ExecError> {
    for (index, step) in steps.iter().enumerate() {
        stats.steps_executed += 1;
        let fail = |source| ExecError::Actuator {
            step: step_path(prefix, index),
            source,
        };
        match step {
            Step::SetBrightness { values } => {
                let values: Vec<f32> = values.iter().map(|level| eval(level, caps)).collect();
                caps.set_brightness(&values).map_err(fail)?;
            }
            Step::SetChannel { channel, value } => {
                let value = eval(value, caps);
                caps.set_channel(*channel, value).map_err(fail)?;
            }
            Step::SetAngle { degrees } => {
                let degrees = eval(degrees, caps);
                caps.set_angle(degrees).map_err(fail)?;
            }
            Step::Sleep { ms } => {
                let duration = Duration::from_millis(*ms as u64);
                caps.sleep(duration);
                stats.slept += duration;
            }
            Step::Repeat { times, steps } => {
                let path = step_path(prefix, index);
                for _ in 0..*times {
                    run_steps(steps, caps, &path, stats)?;
                }
            }
            Step::AllOff => caps.all_off().map_err(fail)?,
        }
    }
    Ok(())
}

fn eval<C: Capabilities + ?Sized>(level: &Level, caps: &mut C) -> f32 {
    match level {
        Level::Fixed(value) => *value,
        Level::Random { random: [min, max] } => min + (max - min) * caps.random(),
        Level::Wave { wave } => {
            let period = wave.period_ms as f32;
            let t = (caps.elapsed().as_millis() % wave.period_ms as u128) as f32 / period;
            let s = 0.5 + 0.5 * (TAU * (t + wave.phase)).sin();
            wave.min + (wave.max - wave.min) * s
        }
    }
}
