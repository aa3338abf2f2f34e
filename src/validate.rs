//! Message Validator (spec.md §2.1, §4.3): syntactic and cryptographic
//! checks applied before a message enters processing. Grounded on the Go
//! source's `makeMessageValidator` dispatch and its per-type validators
//! (`validateRequest`, `validatePrepare`, `validateCommit`,
//! `validateReqViewChange`, `validateViewChange`, `validateNewView`).

use crate::crypto::{SignatureScheme, Usig};
use crate::error::CoreError;
use crate::message::{primary_of_view, Commit, Message, NewView, Prepare, ReqViewChange, Request, ViewChange};

/// Stateless structural/cryptographic validation (spec.md §4.3). Owns no
/// mutable state: every check here is a pure function of the message (and
/// the deployment's `n`).
pub struct MessageValidator {
    n: usize,
    usig: std::sync::Arc<dyn Usig>,
    signer: std::sync::Arc<dyn SignatureScheme>,
}

impl MessageValidator {
    pub fn new(n: usize, usig: std::sync::Arc<dyn Usig>, signer: std::sync::Arc<dyn SignatureScheme>) -> Self {
        Self { n, usig, signer }
    }

    /// Dispatches to the per-variant validator (spec.md §4.3). Embedded
    /// messages are validated separately by their own re-entry into the
    /// pipeline (spec.md §4.2's "embedded extraction"), not recursively
    /// here, matching the Go source's non-recursive `validateX` bodies.
    pub fn validate(&self, message: &Message) -> Result<(), CoreError> {
        match message {
            Message::Request(m) => self.validate_request(m),
            Message::Prepare(m) => self.validate_prepare(m),
            Message::Commit(m) => self.validate_commit(m),
            Message::ReqViewChange(m) => self.validate_req_view_change(m),
            Message::ViewChange(m) => self.validate_view_change(m),
            Message::NewView(m) => self.validate_new_view(m),
        }
    }

    fn validate_request(&self, request: &Request) -> Result<(), CoreError> {
        let bytes = request_preimage(request);
        if !self.signer.verify(&bytes, &request.signature, None) {
            return Err(CoreError::validation("request signature does not verify"));
        }
        Ok(())
    }

    fn validate_prepare(&self, prepare: &Prepare) -> Result<(), CoreError> {
        let expected_primary = primary_of_view(prepare.view, self.n);
        if prepare.replica_id != expected_primary {
            return Err(CoreError::validation(format!(
                "prepare from replica {} but primary of view {} is {}",
                prepare.replica_id, prepare.view, expected_primary
            )));
        }
        let bytes = prepare_preimage(prepare);
        if !self.usig.verify_ui(&bytes, &prepare.ui, prepare.replica_id) {
            return Err(CoreError::validation("prepare UI does not verify"));
        }
        self.validate_request(&prepare.request)
    }

    fn validate_commit(&self, commit: &Commit) -> Result<(), CoreError> {
        let bytes = commit_preimage(commit);
        if !self.usig.verify_ui(&bytes, &commit.ui, commit.replica_id) {
            return Err(CoreError::validation("commit UI does not verify"));
        }
        self.validate_prepare(&commit.prepare)
    }

    /// spec.md §9 REDESIGN FLAGS: the Go source's `validateReqViewChange`
    /// has its body commented out entirely, accepting anything. This
    /// implements the check the comments describe: the requested view must
    /// be strictly ahead of the sender's claimed current view, and the
    /// sender must not itself be that current view's primary (a primary has
    /// no reason to request a view change away from itself).
    fn validate_req_view_change(&self, rvc: &ReqViewChange) -> Result<(), CoreError> {
        if rvc.requested_view <= rvc.current_view {
            return Err(CoreError::validation(
                "requested view must exceed the sender's current view",
            ));
        }
        let current_primary = primary_of_view(rvc.current_view, self.n);
        if rvc.replica_id == current_primary {
            return Err(CoreError::validation(
                "primary of current view cannot request a view change",
            ));
        }
        let bytes = req_view_change_preimage(rvc);
        if !self.signer.verify(&bytes, &rvc.signature, Some(rvc.replica_id)) {
            return Err(CoreError::validation("req-view-change signature does not verify"));
        }
        Ok(())
    }

    fn validate_view_change(&self, vc: &ViewChange) -> Result<(), CoreError> {
        let bytes = view_change_preimage(vc);
        if !self.usig.verify_ui(&bytes, &vc.ui, vc.replica_id) {
            return Err(CoreError::validation("view-change UI does not verify"));
        }
        self.validate_req_view_change(&vc.req_view_change)
    }

    /// spec.md §9: `NewView` assembly/verification is out of scope for this
    /// core (checkpointing and view-change completion are Non-goals); this
    /// stays a structural stub mirroring the Go source's `_ = newView`.
    fn validate_new_view(&self, _new_view: &NewView) -> Result<(), CoreError> {
        Ok(())
    }
}

fn request_preimage(request: &Request) -> Vec<u8> {
    bincode::serialize(&(request.client_id, request.seq, &request.operation))
        .expect("request preimage always serializes")
}

fn prepare_preimage(prepare: &Prepare) -> Vec<u8> {
    bincode::serialize(&(prepare.replica_id, prepare.view, &prepare.request))
        .expect("prepare preimage always serializes")
}

fn commit_preimage(commit: &Commit) -> Vec<u8> {
    bincode::serialize(&(commit.replica_id, &commit.prepare)).expect("commit preimage always serializes")
}

fn req_view_change_preimage(rvc: &ReqViewChange) -> Vec<u8> {
    bincode::serialize(&(rvc.replica_id, rvc.current_view, rvc.requested_view))
        .expect("req-view-change preimage always serializes")
}

fn view_change_preimage(vc: &ViewChange) -> Vec<u8> {
    bincode::serialize(&(vc.replica_id, vc.new_view, &vc.req_view_change))
        .expect("view-change preimage always serializes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::nop::{NopSignatureScheme, NopUsig};
    use crate::message::Signature;
    use std::sync::Arc;

    fn validator(n: usize) -> MessageValidator {
        MessageValidator::new(n, Arc::new(NopUsig::new()), Arc::new(NopSignatureScheme))
    }

    fn signed_request(client_id: u32, seq: u64) -> Request {
        let mut request = Request {
            client_id,
            seq,
            operation: vec![],
            signature: Signature(vec![]),
        };
        request.signature = NopSignatureScheme.sign(&request_preimage(&request));
        request
    }

    #[test]
    fn request_with_tampered_signature_is_rejected() {
        let v = validator(4);
        let mut request = signed_request(1, 1);
        request.signature = Signature(b"not it".to_vec());
        assert!(v.validate_request(&request).is_err());
    }

    #[test]
    fn request_with_valid_signature_passes() {
        let v = validator(4);
        let request = signed_request(1, 1);
        assert!(v.validate_request(&request).is_ok());
    }

    #[test]
    fn prepare_from_non_primary_is_rejected() {
        let v = validator(4);
        let usig = NopUsig::new();
        let request = signed_request(1, 1);
        let bytes = prepare_preimage(&Prepare {
            replica_id: 1,
            view: 0,
            request: request.clone(),
            ui: crate::message::Ui { counter: 0, attestation: vec![] },
        });
        let ui = usig.assign_ui(&bytes).unwrap();
        let prepare = Prepare {
            replica_id: 1,
            view: 0,
            request,
            ui,
        };
        assert!(v.validate_prepare(&prepare).is_err());
    }

    #[test]
    fn req_view_change_requires_requested_view_ahead_of_current() {
        let v = validator(4);
        let mut rvc = ReqViewChange {
            replica_id: 1,
            current_view: 1,
            requested_view: 1,
            signature: Signature(vec![]),
        };
        rvc.signature = NopSignatureScheme.sign(&req_view_change_preimage(&rvc));
        assert!(v.validate_req_view_change(&rvc).is_err());
    }

    #[test]
    fn req_view_change_from_current_primary_is_rejected() {
        let v = validator(4);
        // primary_of_view(0, 4) == 0
        let mut rvc = ReqViewChange {
            replica_id: 0,
            current_view: 0,
            requested_view: 1,
            signature: Signature(vec![]),
        };
        rvc.signature = NopSignatureScheme.sign(&req_view_change_preimage(&rvc));
        assert!(v.validate_req_view_change(&rvc).is_err());
    }

    #[test]
    fn req_view_change_from_backup_with_later_requested_view_passes() {
        let v = validator(4);
        let mut rvc = ReqViewChange {
            replica_id: 1,
            current_view: 0,
            requested_view: 1,
            signature: Signature(vec![]),
        };
        rvc.signature = NopSignatureScheme.sign(&req_view_change_preimage(&rvc));
        assert!(v.validate_req_view_change(&rvc).is_ok());
    }
}
