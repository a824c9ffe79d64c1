//! Configuration structures that can be tested independently
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duty::{SERVO_MAX_DUTY, SERVO_MIN_DUTY};
use crate::error::ConfigError;

pub const VERSION_PATH: &str = "/api/latestVersion";
pub const CODE_PATH: &str = "/api/picoCode";

/// What the loop does with the version counter when a fetch does not
/// produce a runnable program.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Adopt the new version whatever the fetch outcome. A transient fetch
    /// failure skips that version for good.
    #[default]
    AdvanceAlways,
    /// Keep the old version until the server has delivered the payload
    /// (HTTP 200), so the next tick retries. A payload that is rejected or
    /// fails at runtime still advances.
    UntilFetched,
}

impl RetryPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "advance" | "advance_always" => Some(Self::AdvanceAlways),
            "retry" | "until_fetched" => Some(Self::UntilFetched),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Number of one-second status polls before bootstrap gives up.
    pub wifi_timeout_ticks: u32,
    pub server_url: String,
    pub poll_interval_secs: u32,
    pub retry_policy: RetryPolicy,
    pub actuators: ActuatorConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_password: String::new(),
            wifi_timeout_ticks: 10,
            server_url: "http://192.168.1.221:3000".to_string(),
            poll_interval_secs: 2,
            retry_policy: RetryPolicy::AdvanceAlways,
            actuators: ActuatorConfig::default(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.server_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ServerUrl(self.server_url.clone()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::PollInterval);
        }
        if self.wifi_timeout_ticks == 0 {
            return Err(ConfigError::WifiTimeout);
        }
        self.actuators.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs as u64)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.server_url)
    }
}

/// Pin assignment and PWM calibration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActuatorConfig {
    pub led_pins: Vec<i32>,
    pub led_freq_hz: u32,
    pub servo_pin: Option<i32>,
    pub servo_freq_hz: u32,
    pub servo_min_duty: u16,
    pub servo_max_duty: u16,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            // LEDC has 8 channels; the servo takes the last one
            led_pins: vec![4, 5, 6, 7, 15, 16, 17],
            led_freq_hz: 1000,
            servo_pin: Some(18),
            servo_freq_hz: 50,
            servo_min_duty: SERVO_MIN_DUTY,
            servo_max_duty: SERVO_MAX_DUTY,
        }
    }
}

impl ActuatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servo_min_duty >= self.servo_max_duty {
            return Err(ConfigError::ServoRange {
                min: self.servo_min_duty,
                max: self.servo_max_duty,
            });
        }
        Ok(())
    }
}

/// The two URLs the agent talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub version_url: String,
    pub code_url: String,
}

impl Endpoints {
    pub fn new(server_url: &str) -> Self {
        let base = server_url.trim().trim_end_matches('/');
        Self {
            version_url: format!("{}{}", base, VERSION_PATH),
            code_url: format!("{}{}", base, CODE_PATH),
        }
    }
}
