//! Pending Request List (spec.md §2.6, §3): in-flight client requests
//! awaiting commitment, plus a count for timer arming. Grounded on the
//! Go source's `requestlist.List`.

use std::{collections::HashMap, sync::Mutex};

use crate::message::{ClientId, Request};

#[derive(Default)]
pub struct PendingRequestList {
    pending: Mutex<HashMap<ClientId, Request>>,
}

impl PendingRequestList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, request: Request) {
        self.pending.lock().unwrap().insert(request.client_id, request);
    }

    /// Removes the client's pending request, if still present. A repeat
    /// removal (e.g. a duplicate `retireSeq`) is a no-op.
    pub fn remove(&self, client_id: ClientId) {
        self.pending.lock().unwrap().remove(&client_id);
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, client_id: ClientId) -> bool {
        self.pending.lock().unwrap().contains_key(&client_id)
    }
}
