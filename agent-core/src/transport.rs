//! Blocking HTTP GET seam between the agent and the network stack.
use crate::error::TransportError;

/// A fully-read response. The underlying connection is already released
/// by the time one of these exists.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub trait HttpTransport {
    fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &mut T {
    fn get(&mut self, url: &str) -> Result<HttpResponse, TransportError> {
        (**self).get(url)
    }
}
