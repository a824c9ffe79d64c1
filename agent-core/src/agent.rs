//! Control loop: poll -> compare -> fetch -> adopt -> sleep, forever.

use std::time::Duration;

use crate::actuator::{ActuatorRegistry, DutyOutput};
use crate::config::{AgentConfig, Endpoints, RetryPolicy};
use crate::fetcher::{self, FetchOutcome};
use crate::interpreter::{Clock, Entropy, Namespace};
use crate::poller;
use crate::transport::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Bootstrapping,
    Polling,
    Fetching,
}

/// What happened during one loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Version reported by the server, `None` when the poll failed.
    pub latest: Option<u64>,
    /// Outcome of the fetch, if one was attempted.
    pub fetched: Option<FetchOutcome>,
    /// Applied version after the tick.
    pub current: Option<u64>,
    /// States entered during the tick, in order.
    pub states: Vec<AgentState>,
}

pub struct UpdateAgent<T, L, S, C, E> {
    transport: T,
    registry: ActuatorRegistry<L, S>,
    clock: C,
    entropy: E,
    endpoints: Endpoints,
    poll_interval: Duration,
    retry_policy: RetryPolicy,
    // None sorts below every Some, so the first successful poll always fetches
    current_version: Option<u64>,
    state: AgentState,
}

impl<T, L, S, C, E> UpdateAgent<T, L, S, C, E>
where
    T: HttpTransport,
    L: DutyOutput,
    S: DutyOutput,
    C: Clock,
    E: Entropy,
{
    pub fn new(config: &AgentConfig, transport: T, registry: ActuatorRegistry<L, S>, clock: C, entropy: E) -> Self {
        Self {
            transport,
            registry,
            clock,
            entropy,
            endpoints: config.endpoints(),
            poll_interval: config.poll_interval(),
            retry_policy: config.retry_policy,
            current_version: None,
            state: AgentState::Bootstrapping,
        }
    }

    /// One iteration without the trailing sleep. Never fails: poll and fetch
    /// problems are logged and folded into the report.
    pub fn tick(&mut self) -> TickReport {
        let mut states = Vec::with_capacity(3);
        self.enter(AgentState::Polling, &mut states);
        let latest = poller::check_version(&mut self.transport, &self.endpoints);

        let mut fetched = None;
        if let Some(latest) = latest.filter(|v| Some(*v) > self.current_version) {
            log::info!("New version available: {} (current: {})", latest, display_version(self.current_version));
            self.enter(AgentState::Fetching, &mut states);

            let registry = &mut self.registry;
            let clock = &mut self.clock;
            let entropy = &mut self.entropy;
            let outcome = fetcher::fetch_and_run(&mut self.transport, &self.endpoints, || {
                Namespace::new(registry, clock, entropy)
            });

            if self.retry_policy == RetryPolicy::UntilFetched && !outcome.was_delivered() {
                log::warn!("Version {} not delivered, will retry next poll", latest);
            } else {
                self.current_version = Some(latest);
            }
            self.enter(AgentState::Polling, &mut states);
            fetched = Some(outcome);
        }

        TickReport {
            latest,
            fetched,
            current: self.current_version,
            states,
        }
    }

    fn enter(&mut self, state: AgentState, trail: &mut Vec<AgentState>) {
        if self.state != state {
            log::debug!("{:?} -> {:?}", self.state, state);
        }
        self.state = state;
        trail.push(state);
    }

    /// One full iteration: [`tick`](Self::tick) followed by the poll interval sleep.
    pub fn step(&mut self) -> TickReport {
        let report = self.tick();
        self.clock.sleep(self.poll_interval);
        report
    }

    pub fn run(&mut self) -> ! {
        log::info!(
            "Polling {} every {}s (retry policy: {:?})",
            self.endpoints.version_url,
            self.poll_interval.as_secs(),
            self.retry_policy
        );
        loop {
            self.step();
        }
    }

    pub fn current_version(&self) -> Option<u64> {
        self.current_version
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn registry(&self) -> &ActuatorRegistry<L, S> {
        &self.registry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

fn display_version(version: Option<u64>) -> String {
    version.map_or_else(|| "none".to_string(), |v| v.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Servo;
    use crate::sim::{FixedEntropy, ManualClock, MemoryOutput, Reply, ScriptedTransport};

    type TestAgent = UpdateAgent<ScriptedTransport, MemoryOutput, MemoryOutput, ManualClock, FixedEntropy>;

    const PROGRAM: &str = r#"{"steps": [{"op": "set_channel", "channel": 0, "value": 1}]}"#;

    fn agent(policy: RetryPolicy) -> (TestAgent, Endpoints) {
        let config = AgentConfig {
            server_url: "http://server".into(),
            retry_policy: policy,
            ..AgentConfig::default()
        };
        let endpoints = config.endpoints();
        let leds = (0..3).map(|_| MemoryOutput::default()).collect();
        let registry = ActuatorRegistry::initialize(leds, Some(Servo::new(MemoryOutput::default()))).unwrap();
        let agent = UpdateAgent::new(
            &config,
            ScriptedTransport::new(),
            registry,
            ManualClock::default(),
            FixedEntropy::default(),
        );
        (agent, endpoints)
    }

    #[test]
    fn test_starts_bootstrapping_with_no_version() {
        let (agent, _) = agent(RetryPolicy::AdvanceAlways);
        assert_eq!(agent.state(), AgentState::Bootstrapping);
        assert_eq!(agent.current_version(), None);
    }

    #[test]
    fn test_version_zero_is_fetched_first_time() {
        let (mut agent, ep) = agent(RetryPolicy::AdvanceAlways);
        agent.transport_mut().push(&ep.version_url, Reply::ok(r#"{"version": 0}"#));
        agent.transport_mut().push(&ep.code_url, Reply::ok(PROGRAM));

        let report = agent.tick();
        assert!(matches!(report.fetched, Some(FetchOutcome::Applied(_))));
        assert_eq!(agent.current_version(), Some(0));
        assert_eq!(
            report.states,
            vec![AgentState::Polling, AgentState::Fetching, AgentState::Polling]
        );
        assert_eq!(agent.state(), AgentState::Polling);

        // Same version again: no second fetch
        let report = agent.tick();
        assert_eq!(report.states, vec![AgentState::Polling]);
        assert_eq!(agent.transport().count(&ep.code_url), 1);
    }

    #[test]
    fn test_unknown_poll_never_fetches() {
        let (mut agent, ep) = agent(RetryPolicy::AdvanceAlways);
        agent.transport_mut().push(&ep.version_url, Reply::Status(500, Vec::new()));
        let report = agent.step();
        assert_eq!(report.latest, None);
        assert_eq!(report.fetched, None);
        assert_eq!(report.states, vec![AgentState::Polling]);
        assert_eq!(agent.transport().requests(), &[ep.version_url.clone()]);
        assert_eq!(agent.clock().sleeps(), &[Duration::from_secs(2)]);
    }

    #[test]
    fn test_older_version_ignored() {
        let (mut agent, ep) = agent(RetryPolicy::AdvanceAlways);
        agent
            .transport_mut()
            .push(&ep.version_url, Reply::ok(r#"{"version": 4}"#))
            .push(&ep.version_url, Reply::ok(r#"{"version": 2}"#));
        agent.transport_mut().push(&ep.code_url, Reply::ok(PROGRAM));

        agent.tick();
        let report = agent.tick();
        assert_eq!(report.latest, Some(2));
        assert_eq!(report.fetched, None);
        assert_eq!(agent.current_version(), Some(4));
        assert_eq!(agent.transport().count(&ep.code_url), 1);
    }

    #[test]
    fn test_until_fetched_retries_transient_failure() {
        let (mut agent, ep) = agent(RetryPolicy::UntilFetched);
        agent.transport_mut().push(&ep.version_url, Reply::ok(r#"{"version": 3}"#));
        agent
            .transport_mut()
            .push(&ep.code_url, Reply::Status(503, Vec::new()))
            .push(&ep.code_url, Reply::ok(PROGRAM));

        let first = agent.tick();
        assert_eq!(first.fetched, Some(FetchOutcome::HttpStatus(503)));
        assert_eq!(agent.current_version(), None);

        let second = agent.tick();
        assert!(matches!(second.fetched, Some(FetchOutcome::Applied(_))));
        assert_eq!(agent.current_version(), Some(3));
        assert_eq!(agent.registry().leds()[0].duty(), u16::MAX);
    }

    #[test]
    fn test_until_fetched_still_advances_on_bad_payload() {
        let (mut agent, ep) = agent(RetryPolicy::UntilFetched);
        agent.transport_mut().push(&ep.version_url, Reply::ok(r#"{"version": 8}"#));
        agent.transport_mut().push(&ep.code_url, Reply::ok("not json"));

        let report = agent.tick();
        assert!(matches!(report.fetched, Some(FetchOutcome::Rejected(_))));
        assert_eq!(agent.current_version(), Some(8));
    }
}
