//! The transfer seam: one request message in, one response message out.
//!
//! The engine performs no I/O of its own; a [`Transfer`] implementation
//! carries the message to the peer. An HTTP implementation would POST the
//! DER as `application/pkixcmp`; [`LocalResponder`] connects the client to
//! an in-process responder for offline use and tests.

use async_trait::async_trait;

use crate::error::{CmpError, Result};
use crate::server::CmpResponder;
use crate::types::PkiMessage;

/// Carries one request to the peer and returns its response.
///
/// One call is one network round trip; any per-message timeout is enforced
/// by the implementation.
#[async_trait]
pub trait Transfer: Send {
    /// Deliver `req` and return the peer's answer.
    async fn transfer(&mut self, req: &PkiMessage) -> Result<PkiMessage>;
}

/// In-process adapter connecting a client to a [`CmpResponder`].
///
/// Both directions are round-tripped through DER, so every exchanged
/// message is checked for wire validity exactly as it would be on a real
/// transport.
pub struct LocalResponder {
    responder: CmpResponder,
}

impl LocalResponder {
    /// Wrap a responder.
    pub fn new(responder: CmpResponder) -> Self {
        Self { responder }
    }

    /// Access the wrapped responder.
    pub fn responder(&self) -> &CmpResponder {
        &self.responder
    }

    /// Mutable access to the wrapped responder, e.g. to adjust knobs
    /// between exchanges.
    pub fn responder_mut(&mut self) -> &mut CmpResponder {
        &mut self.responder
    }
}

#[async_trait]
impl Transfer for LocalResponder {
    async fn transfer(&mut self, req: &PkiMessage) -> Result<PkiMessage> {
        let wire_req = req
            .dup()
            .map_err(|e| CmpError::decoding(format!("request failed DER round-trip: {e}")))?;

        let rsp = self.responder.respond(&wire_req)?;

        rsp.dup()
            .map_err(|e| CmpError::decoding(format!("response failed DER round-trip: {e}")))
    }
}
