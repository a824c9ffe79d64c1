use thiserror::Error;

/// Station bring-up failure. Fatal at boot.
#[derive(Debug, Error, PartialEq)]
pub enum BootstrapError {
    #[error("association request failed: {0}")]
    Request(String),

    #[error("association rejected: {0}")]
    Rejected(String),

    #[error("no IP after {ticks} status checks")]
    Timeout { ticks: u32 },
}

/// Failure to complete an HTTP exchange at all (no status line was received).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Read(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ActuatorError {
    #[error("channel {index} out of range ({count} channels configured)")]
    NoSuchChannel { index: usize, count: usize },

    #[error("no servo configured")]
    NoServo,

    #[error("PWM write failed: {0}")]
    Write(String),
}

/// A payload that could not be turned into a runnable [`crate::Program`].
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("payload is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("payload is not a valid program: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported program format {0}")]
    Format(u32),

    #[error("step {step}: {reason}")]
    Invalid { step: String, reason: String },

    #[error("program nests deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("program expands to more than {max} steps")]
    TooLong { max: u64 },

    #[error("program sleeps for more than {max_ms} ms in total")]
    TooSlow { max_ms: u64 },
}

/// Runtime failure of a validated program.
#[derive(Debug, Error, PartialEq)]
pub enum ExecError {
    #[error("step {step}: {source}")]
    Actuator {
        step: String,
        #[source]
        source: ActuatorError,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("server URL must start with http:// or https:// (got '{0}')")]
    ServerUrl(String),

    #[error("poll interval must be at least one second")]
    PollInterval,

    #[error("WiFi timeout must be at least one tick")]
    WifiTimeout,

    #[error("servo duty range is empty or inverted ({min}..{max})")]
    ServoRange { min: u16, max: u16 },
}
