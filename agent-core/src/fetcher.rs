//! Code fetch & execute: download the current payload and run it.
//!
//! Nothing here propagates; every outcome is logged and reported as a
//! [`FetchOutcome`] so the loop can decide what to do with the version counter.
use crate::config::Endpoints;
use crate::interpreter::{self, Capabilities, RunStats};
use crate::program::Program;
use crate::transport::HttpTransport;

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The program ran to completion.
    Applied(RunStats),
    /// Server answered with something other than 200.
    HttpStatus(u16),
    /// No response at all.
    Transport(String),
    /// Body could not be decoded or failed schema validation.
    Rejected(String),
    /// The program started but an actuator write failed.
    Failed(String),
}

impl FetchOutcome {
    /// True when the server handed over a payload, whatever became of it.
    /// Only HTTP and transport failures count as "not delivered".
    pub fn was_delivered(&self) -> bool {
        !matches!(self, FetchOutcome::HttpStatus(_) | FetchOutcome::Transport(_))
    }
}

/// `GET {server}/api/picoCode`, then validate and run it against a fresh namespace.
pub fn fetch_and_run<T, F, N>(transport: &mut T, endpoints: &Endpoints, namespace_builder: F) -> FetchOutcome
where
    T: HttpTransport + ?Sized,
    F: FnOnce() -> N,
    N: Capabilities,
{
    let response = match transport.get(&endpoints.code_url) {
        Ok(response) => response,
        Err(e) => {
            log::error!("Error fetching code: {}", e);
            return FetchOutcome::Transport(e.to_string());
        }
    };

    if !response.is_ok() {
        log::error!("Code fetch failed: HTTP {}", response.status);
        return FetchOutcome::HttpStatus(response.status);
    }

    let program = match Program::parse(&response.body) {
        Ok(program) => program,
        Err(e) => {
            log::error!("Rejected payload ({} bytes): {}", response.body.len(), e);
            return FetchOutcome::Rejected(e.to_string());
        }
    };
    drop(response);

    let mut namespace = namespace_builder();
    let footprint = match program.validate(namespace.shape()) {
        Ok(footprint) => footprint,
        Err(e) => {
            log::error!("Rejected payload: {}", e);
            return FetchOutcome::Rejected(e.to_string());
        }
    };

    log::info!(
        "Executing new code ({} steps, {} ms of sleep)...",
        footprint.expanded_steps,
        footprint.total_sleep_ms
    );
    match interpreter::run(&program, &mut namespace) {
        Ok(stats) => {
            log::info!("Code executed successfully ({} steps)", stats.steps_executed);
            FetchOutcome::Applied(stats)
        }
        Err(e) => {
            log::error!("Error executing code: {}", e);
            FetchOutcome::Failed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{ActuatorRegistry, Servo};
    use crate::interpreter::Namespace;
    use crate::sim::{FixedEntropy, ManualClock, MemoryOutput, Reply, ScriptedTransport};

    struct Rig {
        endpoints: Endpoints,
        transport: ScriptedTransport,
        registry: ActuatorRegistry<MemoryOutput, MemoryOutput>,
        clock: ManualClock,
        entropy: FixedEntropy,
    }

    impl Rig {
        fn new(reply: Reply, servo: bool) -> Self {
            let endpoints = Endpoints::new("http://server");
            let mut transport = ScriptedTransport::new();
            transport.push(&endpoints.code_url, reply);
            let leds = (0..4).map(|_| MemoryOutput::default()).collect();
            let servo = servo.then(|| Servo::new(MemoryOutput::default()));
            Self {
                endpoints,
                transport,
                registry: ActuatorRegistry::initialize(leds, servo).unwrap(),
                clock: ManualClock::default(),
                entropy: FixedEntropy::default(),
            }
        }

        fn fetch(&mut self) -> FetchOutcome {
            let Rig { endpoints, transport, registry, clock, entropy } = self;
            fetch_and_run(transport, endpoints, || Namespace::new(registry, clock, entropy))
        }
    }

    #[test]
    fn test_applied() {
        let mut rig = Rig::new(Reply::ok(r#"{"steps": [{"op": "set_brightness", "values": [1]}]}"#), true);
        assert!(matches!(rig.fetch(), FetchOutcome::Applied(_)));
        assert_eq!(rig.registry.leds()[0].duty(), u16::MAX);
    }

    #[test]
    fn test_http_error_changes_nothing() {
        let mut rig = Rig::new(Reply::Status(404, b"Not Found".to_vec()), true);
        assert_eq!(rig.fetch(), FetchOutcome::HttpStatus(404));
        assert!(rig.registry.leds().iter().all(|l| l.writes() == 1));
    }

    #[test]
    fn test_transport_error() {
        let mut rig = Rig::new(Reply::Fail("timed out".into()), true);
        assert!(matches!(rig.fetch(), FetchOutcome::Transport(_)));
    }

    #[test]
    fn test_schema_rejection_runs_nothing() {
        // First step is fine, second targets a servo that does not exist
        let mut rig = Rig::new(
            Reply::ok(r#"{"steps": [{"op": "set_brightness", "values": [1]}, {"op": "set_angle", "degrees": 1}]}"#),
            false,
        );
        let outcome = rig.fetch();
        assert!(matches!(outcome, FetchOutcome::Rejected(_)));
        assert!(outcome.was_delivered());
        assert_eq!(rig.registry.leds()[0].duty(), 0);
    }

    #[test]
    fn test_outcome_delivery() {
        assert!(FetchOutcome::Failed("x".into()).was_delivered());
        assert!(!FetchOutcome::HttpStatus(500).was_delivered());
        assert!(!FetchOutcome::Transport("x".into()).was_delivered());
    }
}
