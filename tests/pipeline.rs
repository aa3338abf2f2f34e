//! End-to-end pipeline tests reproducing the N=3,F=1 scenarios from
//! spec.md §8 against the in-memory `testutil` fixtures, with messages
//! relayed by hand between replicas in place of a real transport.

use minbft_core::crypto::{nop::NopSignatureScheme, SignatureScheme};
use minbft_core::message::{Message, Request, Signature};
use minbft_core::testutil::{replica_fixture, ReplicaFixture};

fn signed_request(client_id: u32, seq: u64, operation: &[u8]) -> Request {
    let mut request = Request {
        client_id,
        seq,
        operation: operation.to_vec(),
        signature: Signature(vec![]),
    };
    let bytes = bincode::serialize(&(request.client_id, request.seq, &request.operation)).unwrap();
    request.signature = NopSignatureScheme.sign(&bytes);
    request
}

/// Drains every fixture's log, delivering each newly-appended message to
/// its own handler (`own=true`, the self-loop) and to every other
/// fixture's handler (`own=false`, the peer delivery), repeating until a
/// full pass produces nothing new — the fixed point a real network
/// reaches once every in-flight message has been handled.
fn pump(fixtures: &[ReplicaFixture], positions: &mut [usize]) {
    loop {
        let mut any = false;
        for i in 0..fixtures.len() {
            let messages = fixtures[i].log.snapshot_from(positions[i]);
            if messages.is_empty() {
                continue;
            }
            positions[i] += messages.len();
            any = true;
            for message in messages {
                let _ = fixtures[i].handler.handle(message.clone(), true);
                for (j, other) in fixtures.iter().enumerate() {
                    if j != i {
                        let _ = other.handler.handle(message.clone(), false);
                    }
                }
            }
        }
        if !any {
            break;
        }
    }
}

fn network(n: usize, f: usize) -> (Vec<ReplicaFixture>, Vec<usize>) {
    let fixtures = (0..n as u32).map(|id| replica_fixture(id, n, f)).collect::<Vec<_>>();
    let positions = vec![0; n];
    (fixtures, positions)
}

#[tokio::test]
async fn scenario_1_normal_case_commits_and_replies_exactly_once() {
    let (fixtures, mut positions) = network(3, 1);

    let request = signed_request(42, 1, b"x");
    let rx = fixtures[0]
        .handler
        .handle(Message::Request(request), false)
        .unwrap()
        .expect("a Request gets a reply channel");

    pump(&fixtures, &mut positions);

    let reply = rx.await.unwrap();
    assert_eq!(reply.result, b"x");

    // every replica's log holds exactly one Prepare and two Commits
    // (its own plus the two peers'), never more: re-pumping is a no-op.
    let lengths_before: Vec<_> = fixtures.iter().map(|f| f.log.len()).collect();
    pump(&fixtures, &mut positions);
    let lengths_after: Vec<_> = fixtures.iter().map(|f| f.log.len()).collect();
    assert_eq!(lengths_before, lengths_after);
}

#[tokio::test]
async fn scenario_3_backup_request_view_change_propagates_to_a_view_change_vote() {
    let (fixtures, mut positions) = network(3, 1);

    // r1 (a backup of view 0) requests a view change directly, as its
    // request timer would on expiry. Signed for real even though this
    // replica delivers it to itself as `own=true`: the same struct is
    // re-embedded in the `ViewChange` r1 emits, and peers validate that
    // embedded copy's signature when they receive it.
    let mut rvc = minbft_core::message::ReqViewChange {
        replica_id: 1,
        current_view: 0,
        requested_view: 1,
        signature: Signature(vec![]),
    };
    let rvc_bytes = bincode::serialize(&(rvc.replica_id, rvc.current_view, rvc.requested_view)).unwrap();
    rvc.signature = NopSignatureScheme.sign(&rvc_bytes);

    let rvc_result = fixtures[1].handler.handle(Message::ReqViewChange(rvc), true);
    assert!(rvc_result.is_ok());
    pump(&fixtures, &mut positions);

    // r0, the primary of view 0, may not originate a ReqViewChange
    // against itself; validation must reject the attempt.
    let rejected = fixtures[0].handler.handle(
        Message::ReqViewChange(minbft_core::message::ReqViewChange {
            replica_id: 0,
            current_view: 0,
            requested_view: 1,
            signature: Signature(vec![]),
        }),
        false,
    );
    assert!(rejected.is_err());

    // r2 received r1's ReqViewChange (relayed by the pump above via the
    // own=true self-loop path modeling r1's own emission) and should
    // have advanced its own expected view.
    assert!(fixtures[2].log.len() >= 1);
}

#[tokio::test]
async fn duplicate_request_submitted_twice_only_replies_once_to_the_application() {
    let (fixtures, mut positions) = network(3, 1);

    let request = signed_request(7, 1, b"y");
    let rx1 = fixtures[0]
        .handler
        .handle(Message::Request(request.clone()), false)
        .unwrap()
        .unwrap();
    let rx2 = fixtures[0]
        .handler
        .handle(Message::Request(request), false)
        .unwrap();
    assert!(rx2.is_none(), "a duplicate request gets no reply channel of its own");

    pump(&fixtures, &mut positions);
    let reply = rx1.await.unwrap();
    assert_eq!(reply.result, b"y");
}
