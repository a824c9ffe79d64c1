//! Payload schema for code delivered by the server.
//!
//! The server sends data, not source text: a JSON document holding a list of
//! steps drawn from a closed set of opcodes. A payload is decoded with
//! [`Program::parse`] and must pass [`Program::validate`] against the
//! actuator layout before anything is executed.
//!
//! ```json
//! {"format": 1, "steps": [
//!     {"op": "repeat", "times": 20, "steps": [
//!         {"op": "set_brightness", "values": [1, 0, {"random": [0.2, 0.8]}]},
//!         {"op": "set_angle", "degrees": {"wave": {"period_ms": 2000, "min": 0, "max": 180}}},
//!         {"op": "sleep", "ms": 100}
//!     ]}
//! ]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ProgramError;

pub const FORMAT_VERSION: u32 = 1;
pub const MAX_DEPTH: usize = 8;
pub const MAX_EXPANDED_STEPS: u64 = 4096;
pub const MAX_SLEEP_MS: u32 = 10_000;
pub const MAX_TOTAL_SLEEP_MS: u64 = 120_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Program {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<u32>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    SetBrightness { values: Vec<Level> },
    SetChannel { channel: usize, value: Level },
    SetAngle { degrees: Level },
    Sleep { ms: u32 },
    Repeat { times: u32, steps: Vec<Step> },
    AllOff,
}

/// A numeric argument, re-evaluated every time its step runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Level {
    Fixed(f32),
    /// Uniform in `[min, max)`.
    Random { random: [f32; 2] },
    /// Sine over the program's elapsed time, swinging between `min` and `max`.
    Wave { wave: Wave },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    pub period_ms: u32,
    /// Fraction of a period, 0.0..1.0.
    #[serde(default)]
    pub phase: f32,
    #[serde(default)]
    pub min: f32,
    #[serde(default = "Wave::default_max")]
    pub max: f32,
}

impl Wave {
    fn default_max() -> f32 {
        1.0
    }
}

/// What the validator needs to know about the actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub channels: usize,
    pub servo: bool,
}

/// Totals computed while validating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Footprint {
    pub expanded_steps: u64,
    pub total_sleep_ms: u64,
    pub depth: usize,
}

impl Program {
    /// Decode a response body. Schema limits are checked separately.
    pub fn parse(body: &[u8]) -> Result<Self, ProgramError> {
        let text = std::str::from_utf8(body)?;
        let program: Program = serde_json::from_str(text)?;
        match program.format {
            None | Some(FORMAT_VERSION) => Ok(program),
            Some(other) => Err(ProgramError::Format(other)),
        }
    }

    pub fn validate(&self, shape: Shape) -> Result<Footprint, ProgramError> {
        let footprint = check_steps(&self.steps, shape, "", 1)?;
        if footprint.expanded_steps > MAX_EXPANDED_STEPS {
            return Err(ProgramError::TooLong { max: MAX_EXPANDED_STEPS });
        }
        if footprint.total_sleep_ms > MAX_TOTAL_SLEEP_MS {
            return Err(ProgramError::TooSlow { max_ms: MAX_TOTAL_SLEEP_MS });
        }
        Ok(footprint)
    }
}

/// Dotted position of a step inside nested repeats, e.g. `2.0.1`.
pub(crate) fn step_path(prefix: &str, index: usize) -> String {
    if prefix.is_empty() {
        index.to_string()
    } else {
        format!("{}.{}", prefix, index)
    }
}

fn invalid(step: &str, reason: impl Into<String>) -> ProgramError {
    ProgramError::Invalid {
        step: step.to_string(),
        reason: reason.into(),
    }
}

fn check_steps(steps: &[Step], shape: Shape, prefix: &str, depth: usize) -> Result<Footprint, ProgramError> {
    if depth > MAX_DEPTH {
        return Err(ProgramError::TooDeep { max: MAX_DEPTH });
    }

    let mut total = Footprint { depth, ..Footprint::default() };
    for (index, step) in steps.iter().enumerate() {
        let path = step_path(prefix, index);
        let part = match step {
            Step::SetBrightness { values } => {
                for level in values {
                    check_level(level, &path)?;
                }
                Footprint { expanded_steps: 1, ..Footprint::default() }
            }
            Step::SetChannel { channel, value } => {
                if *channel >= shape.channels {
                    return Err(invalid(
                        &path,
                        format!("channel {} out of range ({} configured)", channel, shape.channels),
                    ));
                }
                check_level(value, &path)?;
                Footprint { expanded_steps: 1, ..Footprint::default() }
            }
            Step::SetAngle { degrees } => {
                if !shape.servo {
                    return Err(invalid(&path, "no servo configured"));
                }
                check_level(degrees, &path)?;
                Footprint { expanded_steps: 1, ..Footprint::default() }
            }
            Step::Sleep { ms } => {
                if *ms > MAX_SLEEP_MS {
                    return Err(invalid(&path, format!("sleep {} ms exceeds {} ms", ms, MAX_SLEEP_MS)));
                }
                Footprint {
                    expanded_steps: 1,
                    total_sleep_ms: *ms as u64,
                    ..Footprint::default()
                }
            }
            Step::Repeat { times, steps } => {
                let inner = check_steps(steps, shape, &path, depth + 1)?;
                let times = *times as u64;
                // An iteration costs at least one step, even with an empty body
                Footprint {
                    expanded_steps: inner.expanded_steps.max(1).saturating_mul(times).saturating_add(1),
                    total_sleep_ms: inner.total_sleep_ms.saturating_mul(times),
                    depth: inner.depth,
                }
            }
            Step::AllOff => Footprint { expanded_steps: 1, ..Footprint::default() },
        };

        total.expanded_steps = total.expanded_steps.saturating_add(part.expanded_steps);
        total.total_sleep_ms = total.total_sleep_ms.saturating_add(part.total_sleep_ms);
        total.depth = total.depth.max(part.depth);

        // Fail early instead of walking a huge program to the end
        if total.expanded_steps > MAX_EXPANDED_STEPS {
            return Err(ProgramError::TooLong { max: MAX_EXPANDED_STEPS });
        }
    }
    Ok(total)
}

fn check_level(level: &Level, path: &str) -> Result<(), ProgramError> {
    match level {
        Level::Fixed(v) if !v.is_finite() => Err(invalid(path, "value is not finite")),
        Level::Fixed(_) => Ok(()),
        Level::Random { random: [min, max] } => {
            if !min.is_finite() || !max.is_finite() {
                Err(invalid(path, "random bounds are not finite"))
            } else if min > max {
                Err(invalid(path, format!("random range {}..{} is inverted", min, max)))
            } else {
                Ok(())
            }
        }
        Level::Wave { wave } => {
            if wave.period_ms == 0 {
                Err(invalid(path, "wave period must be non-zero"))
            } else if ![wave.phase, wave.min, wave.max].iter().all(|v| v.is_finite()) {
                Err(invalid(path, "wave parameters are not finite"))
            } else {
                Ok(())
            }
        }
    }
}
