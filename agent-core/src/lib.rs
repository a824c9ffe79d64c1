//! Agent Core - Hardware-independent logic for the ESP32 remote-code agent
//!
//! This crate contains network bring-up, the poll/fetch/execute loop and
//! everything it drives (duty math, actuator registry, payload schema,
//! interpreter) behind small traits, so it can be tested on the host
//! platform without ESP32 hardware.

pub mod actuator;
pub mod agent;
pub mod bootstrap;
pub mod config;
pub mod duty;
pub mod error;
pub mod fetcher;
pub mod interpreter;
pub mod poller;
pub mod program;
pub mod sim;
pub mod transport;

pub use actuator::{ActuatorRegistry, DutyOutput, Servo};
pub use agent::{AgentState, TickReport, UpdateAgent};
pub use bootstrap::{Link, LinkStatus};
pub use config::{ActuatorConfig, AgentConfig, Endpoints, RetryPolicy};
pub use error::{ActuatorError, BootstrapError, ConfigError, ExecError, ProgramError, TransportError};
pub use fetcher::FetchOutcome;
pub use interpreter::{Capabilities, Clock, Entropy, Namespace};
pub use program::Program;
pub use transport::{HttpResponse, HttpTransport};
