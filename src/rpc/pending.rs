//! Outstanding request registrations.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use crate::core::Envelope;

/// One outstanding request.
#[derive(Debug)]
pub(crate) struct PendingCall {
    tag: String,
    reply: oneshot::Sender<Envelope>,
    deadline: Instant,
}

impl PendingCall {
    pub(crate) fn new(tag: &str, reply: oneshot::Sender<Envelope>, timeout: Duration) -> Self {
        Self {
            tag: tag.to_owned(),
            reply,
            deadline: Instant::now() + timeout,
        }
    }

    pub(crate) fn tag(&self) -> &str {
        &self.tag
    }

    /// Time left before the caller gives up.
    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Hand the response to the waiting caller. Gives the envelope back if
    /// the caller is gone.
    pub(crate) fn complete(self, response: Envelope) -> Result<(), Envelope> {
        self.reply.send(response)
    }
}

/// Registrations keyed by request id.
///
/// Ids are allocated in increasing order, so iteration order is also
/// registration order.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    calls: BTreeMap<u64, PendingCall>,
}

impl PendingTable {
    pub(crate) fn register(&mut self, id: u64, call: PendingCall) {
        self.calls.insert(id, call);
    }

    pub(crate) fn remove(&mut self, id: u64) -> Option<PendingCall> {
        self.calls.remove(&id)
    }

    /// Consume the registration a response belongs to.
    ///
    /// A response carrying an id matches only the registration with that id
    /// and tag. A response without an id matches the oldest registration
    /// with its tag.
    pub(crate) fn take_for(&mut self, response: &Envelope) -> Option<(u64, PendingCall)> {
        let id = match response.id() {
            Some(id) => self
                .calls
                .get(&id)
                .filter(|call| call.tag == response.tag())
                .map(|_| id)?,
            None => self
                .calls
                .iter()
                .find(|(_, call)| call.tag == response.tag())
                .map(|(id, _)| *id)?,
        };
        self.calls.remove(&id).map(|call| (id, call))
    }

    /// Remove every registration.
    pub(crate) fn drain(&mut self) -> Vec<PendingCall> {
        std::mem::take(&mut self.calls).into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}
