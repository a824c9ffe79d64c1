//! In-memory stand-ins for the hardware and network capabilities.
//!
//! Used by unit tests, the host scenario tests and the `payload-check` dry run.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use crate::actuator::DutyOutput;
use crate::bootstrap::{Link, LinkStatus};
use crate::error::{ActuatorError, BootstrapError, TransportError};
use crate::interpreter::{Clock, Entropy};
use crate::transport::{HttpResponse, HttpTransport};

/// Duty output that remembers the last value and how often it was written.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryOutput {
    duty: u16,
    writes: usize,
    fail_after: Option<usize>,
}

impl MemoryOutput {
    /// Start from a non-idle duty, to observe that initialization resets it.
    pub fn with_duty(duty: u16) -> Self {
        Self { duty, ..Self::default() }
    }

    /// Output that accepts `writes` writes and fails every one after that.
    pub fn failing_after(writes: usize) -> Self {
        Self { fail_after: Some(writes), ..Self::default() }
    }

    pub fn duty(&self) -> u16 {
        self.duty
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl DutyOutput for MemoryOutput {
    fn set_duty(&mut self, duty: u16) -> Result<(), ActuatorError> {
        if self.fail_after.is_some_and(|limit| self.writes >= limit) {
            return Err(ActuatorError::Write("simulated fault".to_string()));
        }
        self.duty = duty;
        self.writes += 1;
        Ok(())
    }
}

/// Clock that records requested sleeps instead of blocking.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl ManualClock {
    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.iter().sum()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.now += duration;
        self.sleeps.push(duration);
    }
}

/// Entropy source that cycles through a fixed list of words.
#[derive(Debug, Clone)]
pub struct FixedEntropy {
    words: Vec<u32>,
    next: usize,
}

impl FixedEntropy {
    pub fn new(words: Vec<u32>) -> Self {
        Self { words, next: 0 }
    }
}

impl Default for FixedEntropy {
    fn default() -> Self {
        Self::new(vec![0])
    }
}

impl Entropy for FixedEntropy {
    fn next_u32(&mut self) -> u32 {
        if self.words.is_empty() {
            return 0;
        }
        let word = self.words[self.next % self.words.len()];
        self.next += 1;
        word
    }
}

/// One scripted reply.
#[derive(Debug)]
pub enum Reply {
    Status(u16, Vec<u8>),
    Fail(String),
}

impl Reply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Reply::Status(200, body.into())
    }
}

/// Transport that answers from per-URL queues of scripted replies.
///
/// The last reply queued for a URL is repeated once the queue drains; an
/// unscripted URL answers 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, VecDeque<Reply>>,
    requests: Vec<String>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, url: &str, reply: Reply) -> &mut Self {
        self.replies.entry(url.to_string()).or_default().push_back(reply);
        self
    }

    /// Drop whatever is queued for `url` and answer `reply` from now on.
    pub fn replace(&mut self, url: &str, reply: Reply) -> &mut Self {
        self.replies.insert(url.to_string(), VecDeque::from([reply]));
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests.iter().filter(|u| u.as_str() == url).count()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError> {
        self.requests.push(url.to_string());
        let Some(queue) = self.replies.get_mut(url) else {
            return Ok(HttpResponse::new(404, b"Not Found".to_vec()));
        };
        let reply = if queue.len() > 1 { queue.pop_front() } else { None };
        match reply.as_ref().or(queue.front()) {
            Some(Reply::Status(status, body)) => Ok(HttpResponse::new(*status, body.clone())),
            Some(Reply::Fail(msg)) => Err(TransportError::Connect(msg.clone())),
            None => Ok(HttpResponse::new(404, b"Not Found".to_vec())),
        }
    }
}

/// Station that walks through a scripted list of statuses, repeating the last.
#[derive(Debug)]
pub struct ScriptedLink {
    statuses: VecDeque<LinkStatus>,
    scan: Option<i8>,
    association_error: Option<String>,
    associations: usize,
    ticks_waited: u32,
}

impl ScriptedLink {
    pub fn new(statuses: Vec<LinkStatus>) -> Self {
        Self {
            statuses: statuses.into(),
            scan: Some(-60),
            association_error: None,
            associations: 0,
            ticks_waited: 0,
        }
    }

    pub fn set_scan(&mut self, rssi: Option<i8>) {
        self.scan = rssi;
    }

    pub fn fail_association(&mut self, reason: &str) {
        self.association_error = Some(reason.to_string());
    }

    pub fn associations(&self) -> usize {
        self.associations
    }

    pub fn ticks_waited(&self) -> u32 {
        self.ticks_waited
    }
}

impl Link for ScriptedLink {
    fn scan(&mut self) -> Option<i8> {
        self.scan
    }

    fn associate(&mut self) -> Result<(), BootstrapError> {
        self.associations += 1;
        match &self.association_error {
            Some(reason) => Err(BootstrapError::Request(reason.clone())),
            None => Ok(()),
        }
    }

    fn status(&mut self) -> LinkStatus {
        if self.statuses.len() > 1 {
            if let Some(status) = self.statuses.pop_front() {
                return status;
            }
        }
        self.statuses.front().cloned().unwrap_or(LinkStatus::Pending)
    }

    fn wait_tick(&mut self) {
        self.ticks_waited += 1;
    }
}
