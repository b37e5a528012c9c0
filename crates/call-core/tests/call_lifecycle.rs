//! Timeouts, races, cancellation and teardown guarantees

mod common;

use common::{connect, peer, peer_with, relay, WAIT};
use pretty_assertions::assert_eq;
use std::time::Duration;
use voxlink_call_core::{CallConfig, CallError, CallEvent, CallState, EndReason, RejectReason};
use voxlink_media_core::mock::CaptureBehavior;
use voxlink_signaling_core::{
    OpaquePayload, SignalKind, SignalMessage, SignalingConnection, SignalingEnvelope, DEFAULT_INBOUND_CAPACITY,
};

#[tokio::test(start_paused = true)]
async fn test_unanswered_call_times_out() {
    let relay = relay();
    let config = CallConfig::new().with_answer_timeout(Duration::from_secs(30));
    let mut alice = peer_with(&relay, "alice", config, CaptureBehavior::Grant);
    let mut bob = peer(&relay, "bob");

    alice.handle.initiate("bob").await.unwrap();
    bob.incoming().await;

    tokio::time::advance(Duration::from_secs(29)).await;
    assert_eq!(alice.handle.state(), CallState::Calling);

    tokio::time::advance(Duration::from_secs(2)).await;
    let (reason, error) = alice.ended().await;
    assert_eq!(reason, EndReason::Timeout);
    assert_eq!(
        error,
        Some(CallError::Timeout {
            timeout: Duration::from_secs(30),
        })
    );
    assert_eq!(alice.handle.state(), CallState::Idle);
    alice.assert_released();
    assert_eq!(alice.media_stats().releases, 1);

    // The callee stops ringing too.
    assert_eq!(bob.ended().await, (EndReason::RemoteHangup, None));
    assert_eq!(bob.media_stats().releases, 1);
}

#[tokio::test(start_paused = true)]
async fn test_answer_cancels_timeout() {
    let relay = relay();
    let config = CallConfig::new().with_answer_timeout(Duration::from_secs(30));
    let mut alice = peer_with(&relay, "alice", config, CaptureBehavior::Grant);
    let mut bob = peer(&relay, "bob");

    connect(&mut alice, &mut bob).await;
    tokio::time::advance(Duration::from_secs(120)).await;

    assert_eq!(alice.handle.state(), CallState::Active);
    let elapsed = alice.handle.elapsed().unwrap();
    assert!(elapsed >= Duration::from_secs(120) && elapsed < Duration::from_secs(121));
}

#[tokio::test]
async fn test_glare_ends_both_calls_as_busy() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = SignalingConnection::attach(&relay, "bob", DEFAULT_INBOUND_CAPACITY);

    let ours = alice.handle.initiate("bob").await.unwrap();
    let invite = tokio::time::timeout(WAIT, bob.recv()).await.unwrap().unwrap();
    assert_eq!(invite.kind(), SignalKind::Invite);

    // Bob dialed Alice at the same moment; his invite crosses hers.
    let theirs = voxlink_call_core::CallId::new();
    bob.link()
        .send(SignalingEnvelope::invite(
            theirs,
            "bob".into(),
            "alice".into(),
            OpaquePayload::new("bob-offer"),
            None,
        ))
        .await
        .unwrap();

    let refusal = tokio::time::timeout(WAIT, bob.recv()).await.unwrap().unwrap();
    assert_eq!(
        refusal,
        SignalingEnvelope::reject(theirs, "alice".into(), "bob".into(), RejectReason::Busy)
    );
    assert_eq!(alice.handle.state(), CallState::Calling);

    // Bob's machine refuses Alice's invite the same way.
    bob.link().send(invite.reply_reject(RejectReason::Busy)).await.unwrap();
    assert_eq!(alice.ended().await, (EndReason::Rejected(RejectReason::Busy), None));
    assert_eq!(alice.handle.session(), None);
    assert_ne!(ours, theirs);
    alice.assert_released();
}

#[tokio::test]
async fn test_simultaneous_calls_never_both_connect() {
    let relay = relay();
    let mut alice = peer_with(
        &relay,
        "alice",
        CallConfig::new(),
        CaptureBehavior::GrantAfter(Duration::from_millis(20)),
    );
    let mut bob = peer_with(
        &relay,
        "bob",
        CallConfig::new(),
        CaptureBehavior::GrantAfter(Duration::from_millis(20)),
    );

    let (a, b) = tokio::join!(alice.handle.initiate("bob"), bob.handle.initiate("alice"));
    a.unwrap();
    b.unwrap();

    // Whichever way the invites cross, at least one side is refused as busy
    // and neither side ends up with two calls.
    let (reason, _) = alice.ended().await;
    if reason != EndReason::Rejected(RejectReason::Busy) {
        assert_eq!(bob.ended().await.0, EndReason::Rejected(RejectReason::Busy));
    }
    alice.handle.end().await.unwrap();
    bob.handle.end().await.unwrap();
    alice.handle.wait_for_state(CallState::Idle, WAIT).await.unwrap();
    bob.handle.wait_for_state(CallState::Idle, WAIT).await.unwrap();
    alice.assert_released();
    bob.assert_released();
}

#[tokio::test]
async fn test_second_initiate_is_busy() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = peer(&relay, "bob");
    let _carol = peer(&relay, "carol");

    connect(&mut alice, &mut bob).await;
    assert_eq!(alice.handle.initiate("carol").await, Err(CallError::Busy));
    assert_eq!(alice.source.requests(), 1);
}

#[tokio::test]
async fn test_cannot_call_self() {
    let relay = relay();
    let alice = peer(&relay, "alice");

    assert_eq!(
        alice.handle.initiate("alice").await,
        Err(CallError::InvalidTarget {
            target: "alice".into(),
        })
    );
    assert_eq!(alice.source.requests(), 0);
}

#[tokio::test]
async fn test_end_is_idempotent() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = peer(&relay, "bob");

    alice.handle.end().await.unwrap();
    assert_eq!(alice.media_stats().releases, 0);

    connect(&mut alice, &mut bob).await;
    alice.handle.end().await.unwrap();
    alice.handle.end().await.unwrap();
    alice.handle.end().await.unwrap();

    assert_eq!(alice.ended().await.0, EndReason::LocalHangup);
    assert_eq!(bob.ended().await.0, EndReason::RemoteHangup);
    assert_eq!(alice.media_stats().releases, 1);
    assert_eq!(alice.transport.stops(), 1);
    assert_eq!(alice.source.stopped(), 1);
}

#[tokio::test]
async fn test_pending_microphone_prompt_does_not_block() {
    let relay = relay();
    let alice = peer_with(&relay, "alice", CallConfig::new(), CaptureBehavior::Hang);
    let mut bob = peer(&relay, "bob");
    let mut carol = peer(&relay, "carol");

    let dialing = {
        let handle = alice.handle.clone();
        tokio::spawn(async move { handle.initiate("bob").await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(alice.source.requests(), 1);
    // No session exists yet, but Alice is already engaged.
    assert_eq!(alice.handle.state(), CallState::Idle);
    assert_eq!(alice.handle.session(), None);
    assert_eq!(alice.handle.initiate("carol").await, Err(CallError::Busy));

    // Alice is busy setting up; Carol's call is refused without waiting on the prompt.
    carol.handle.initiate("alice").await.unwrap();
    assert_eq!(carol.ended().await.0, EndReason::Rejected(RejectReason::Busy));

    // Hanging up abandons the prompt; nothing was ever sent to Bob.
    alice.handle.end().await.unwrap();
    assert_eq!(dialing.await.unwrap(), Err(CallError::Cancelled));
    assert_eq!(alice.handle.state(), CallState::Idle);
    assert!(tokio::time::timeout(Duration::from_millis(50), bob.events.recv())
        .await
        .is_err());
    alice.assert_released();
}

#[tokio::test]
async fn test_remote_end_during_accept_cancels_acquisition() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = peer_with(&relay, "bob", CallConfig::new(), CaptureBehavior::Hang);

    alice.handle.initiate("bob").await.unwrap();
    bob.incoming().await;

    let accepting = {
        let handle = bob.handle.clone();
        tokio::spawn(async move { handle.accept().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(bob.handle.state(), CallState::Incoming);

    alice.handle.end().await.unwrap();
    assert_eq!(bob.ended().await, (EndReason::RemoteHangup, None));
    assert_eq!(accepting.await.unwrap(), Err(CallError::Cancelled));
    bob.assert_released();
}

#[tokio::test]
async fn test_transport_loss_ends_active_call() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = peer(&relay, "bob");
    connect(&mut alice, &mut bob).await;

    relay.registry().unregister("bob");

    let (reason, error) = bob.ended().await;
    assert_eq!(reason, EndReason::TransportLost);
    assert!(matches!(error, Some(CallError::SignalingTransport { .. })));
    bob.assert_released();
    assert_eq!(bob.media_stats().releases, 1);

    // Bob can no longer place calls on the dead connection.
    assert!(matches!(
        bob.handle.initiate("alice").await,
        Err(CallError::SignalingTransport { .. })
    ));

    // Alice finds out when she hangs up or next signals; her own teardown still works.
    alice.handle.end().await.unwrap();
    assert_eq!(alice.ended().await.0, EndReason::LocalHangup);
    alice.assert_released();
    assert_eq!(alice.media_stats().releases, 1);
    assert_eq!(bob.media_stats().releases, 1);
}

#[tokio::test]
async fn test_answer_to_departed_caller_ends_call() {
    let relay = relay();
    let mut bob = peer(&relay, "bob");
    let caller = SignalingConnection::attach(&relay, "alice", DEFAULT_INBOUND_CAPACITY);
    let call_id = voxlink_call_core::CallId::new();

    caller
        .link()
        .send(SignalingEnvelope::invite(
            call_id,
            "alice".into(),
            "bob".into(),
            OpaquePayload::new("offer"),
            None,
        ))
        .await
        .unwrap();
    bob.incoming().await;

    // The caller vanishes without saying goodbye.
    drop(caller);
    relay.registry().unregister("alice");

    bob.handle.accept().await.unwrap();
    let (reason, error) = bob.ended().await;
    assert_eq!(reason, EndReason::Rejected(RejectReason::PeerUnreachable));
    assert_eq!(
        error,
        Some(CallError::PeerUnreachable {
            user_id: "alice".into(),
        })
    );
    bob.assert_released();
}

#[tokio::test]
async fn test_foreign_envelopes_are_ignored() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = peer(&relay, "bob");
    let mallory = SignalingConnection::attach(&relay, "mallory", DEFAULT_INBOUND_CAPACITY);

    let call_id = connect(&mut alice, &mut bob).await;

    // Right call id, wrong sender.
    mallory
        .link()
        .send(SignalingEnvelope::end(call_id, "mallory".into(), "bob".into()))
        .await
        .unwrap();
    // Right sender, unknown call.
    mallory
        .link()
        .send(SignalingEnvelope::new(
            voxlink_call_core::CallId::new(),
            "alice".into(),
            "bob".into(),
            SignalMessage::End,
        ))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(bob.handle.state(), CallState::Active);
    assert_eq!(alice.handle.state(), CallState::Active);
}

#[tokio::test]
async fn test_renegotiated_offer_replaces_stored_offer() {
    let relay = relay();
    let mut bob = peer(&relay, "bob");
    let mut caller = SignalingConnection::attach(&relay, "alice", DEFAULT_INBOUND_CAPACITY);
    let call_id = voxlink_call_core::CallId::new();

    caller
        .link()
        .send(SignalingEnvelope::invite(
            call_id,
            "alice".into(),
            "bob".into(),
            OpaquePayload::new("first-offer"),
            None,
        ))
        .await
        .unwrap();
    bob.incoming().await;

    caller
        .link()
        .send(SignalingEnvelope::offer(
            call_id,
            "alice".into(),
            "bob".into(),
            OpaquePayload::new("second-offer"),
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    bob.handle.accept().await.unwrap();

    assert_eq!(bob.transport.last_remote().unwrap().as_str(), "second-offer");
    let answer = tokio::time::timeout(WAIT, caller.recv()).await.unwrap().unwrap();
    assert_eq!(answer.kind(), SignalKind::NegotiationAnswer);
    assert_eq!(answer.call_id, call_id);
    assert_eq!(
        answer.message,
        SignalMessage::NegotiationAnswer {
            answer_payload: OpaquePayload::new("loopback-answer-to-second-offer"),
        }
    );
}

#[tokio::test]
async fn test_shutdown_hangs_up_and_stops() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = peer(&relay, "bob");
    connect(&mut alice, &mut bob).await;

    bob.handle.shutdown().await;
    assert!(!bob.handle.is_running());
    assert_eq!(alice.ended().await.0, EndReason::RemoteHangup);
    bob.assert_released();
    assert_eq!(bob.handle.end().await, Err(CallError::MachineStopped));
}

#[tokio::test]
async fn test_every_session_releases_media_once() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let mut bob = peer(&relay, "bob");

    for _ in 0..3 {
        connect(&mut alice, &mut bob).await;
        alice.handle.end().await.unwrap();
        alice.ended().await;
        bob.ended().await;
    }

    alice.handle.initiate("bob").await.unwrap();
    bob.incoming().await;
    bob.handle.reject().await.unwrap();
    alice.ended().await;
    bob.ended().await;

    assert_eq!(alice.media_stats().releases, 4);
    assert_eq!(bob.media_stats().releases, 4);
    assert_eq!(alice.source.opened(), 4);
    assert_eq!(alice.source.stopped(), 4);
    assert_eq!(bob.source.opened(), 3);
    alice.assert_released();
    bob.assert_released();

    // CallEnded is the last word on each call.
    assert!(alice.events.try_recv().is_err());
    assert_eq!(bob.handle.session(), None);
}

#[tokio::test]
async fn test_end_completes_when_callee_never_reads() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    // Bob's queue holds one envelope and nobody ever drains it.
    let _bob = SignalingConnection::attach(&relay, "bob", 1);

    alice.handle.initiate("bob").await.unwrap();
    assert_eq!(alice.handle.state(), CallState::Calling);

    tokio::time::timeout(WAIT, alice.handle.end())
        .await
        .expect("end blocked on a stalled callee")
        .unwrap();
    assert_eq!(alice.ended().await, (EndReason::LocalHangup, None));
    assert_eq!(alice.handle.state(), CallState::Idle);
    assert_eq!(alice.media_stats().releases, 1);
    alice.assert_released();
}

#[tokio::test]
async fn test_stalled_caller_cannot_freeze_busy_callee() {
    let relay = relay();
    let mut bob = peer(&relay, "bob");
    let mut carol = peer(&relay, "carol");
    let mallory = SignalingConnection::attach(&relay, "mallory", 1);

    connect(&mut carol, &mut bob).await;

    for n in 0..4 {
        mallory
            .link()
            .send(SignalingEnvelope::invite(
                voxlink_call_core::CallId::new(),
                "mallory".into(),
                "bob".into(),
                OpaquePayload::new(format!("offer-{}", n)),
                None,
            ))
            .await
            .unwrap();
    }

    // Every busy refusal past the first finds Mallory's queue full and is dropped.
    for _ in 0..4 {
        bob.wait_for(|e| matches!(e, CallEvent::MissedCall { .. })).await;
    }
    let muted = tokio::time::timeout(WAIT, bob.handle.toggle_mute())
        .await
        .expect("bob's machine stopped serving commands")
        .unwrap();
    assert!(muted);
    assert_eq!(bob.handle.state(), CallState::Active);
    assert_eq!(relay.stats().congested, 3);
}

#[tokio::test]
async fn test_invite_to_congested_callee_is_unreachable() {
    let relay = relay();
    let mut alice = peer(&relay, "alice");
    let _bob = SignalingConnection::attach(&relay, "bob", 1);
    let carol = SignalingConnection::attach(&relay, "carol", DEFAULT_INBOUND_CAPACITY);

    // Fill Bob's queue before Alice dials.
    carol
        .link()
        .send(SignalingEnvelope::end(voxlink_call_core::CallId::new(), "carol".into(), "bob".into()))
        .await
        .unwrap();

    alice.handle.initiate("bob").await.unwrap();
    let (reason, error) = alice.ended().await;
    assert_eq!(reason, EndReason::Rejected(RejectReason::PeerUnreachable));
    assert_eq!(
        error,
        Some(CallError::PeerUnreachable {
            user_id: "bob".into(),
        })
    );
    assert_eq!(alice.media_stats().releases, 1);
    // Congestion is not a disconnect.
    assert!(relay.registry().is_online("bob"));
}
