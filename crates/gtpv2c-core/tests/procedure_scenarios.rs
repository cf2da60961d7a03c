//! Procedure lifecycle scenarios
//!
//! Drives the engine with a recording transport and a shared deadline timer
//! service, so every expiry is delivered exactly as an event loop would.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use epcgw_gtpv2c_core::events::RecordingSink;
use epcgw_gtpv2c_core::prelude::*;

struct Harness {
    engine: TransactionEngine,
    transport: Arc<RecordingTransport>,
    timers: Arc<Mutex<DeadlineTimerService>>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(config: TransactionConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("epcgw_gtpv2c_core=debug")
            .with_test_writer()
            .try_init();

        let transport = Arc::new(RecordingTransport::new());
        let timers = Arc::new(Mutex::new(DeadlineTimerService::new()));
        let sink = Arc::new(RecordingSink::new());
        let engine = TransactionEngine::new(config, transport.clone(), Box::new(timers.clone()))
            .unwrap()
            .with_notification_sink(sink.clone())
            .with_sequence_generator(Arc::new(SequenceGenerator::with_seed(1000)));

        Self {
            engine,
            transport,
            timers,
            sink,
        }
    }

    /// Advance the clock and feed every expiry to the engine
    fn advance(&mut self, by: Duration) -> Vec<TimeoutOutcome> {
        let fired = self.timers.lock().advance(by);
        fired.into_iter().map(|handle| self.engine.on_timeout(handle)).collect()
    }
}

fn peer() -> SocketAddr {
    "198.51.100.7:2123".parse().unwrap()
}

fn msg(kind: MessageType, seq: u32) -> Gtpv2cMessage {
    let mut msg = Gtpv2cMessage::new(kind, 0x0A0B_0C0D, Bytes::from_static(&[0x03, 0x00, 0x01, 0x00, 0x01]));
    msg.set_sequence_number(seq);
    msg
}

#[test]
fn initial_send_then_retry_exhaustion() {
    let mut h = Harness::new(TransactionConfig::default());
    let (seq, id) = h
        .engine
        .send_initial(msg(MessageType::CreateSessionRequest, 0), peer(), Some(42))
        .unwrap();

    for retry_count in 1..=3u8 {
        let retry = h.engine.procedure(id).unwrap().retry_timer().unwrap();
        assert_eq!(
            h.engine.on_timeout(retry),
            TimeoutOutcome::RetryScheduled { correlation_id: id, retry_count }
        );
    }

    let retry = h.engine.procedure(id).unwrap().retry_timer().unwrap();
    assert_eq!(
        h.engine.on_timeout(retry),
        TimeoutOutcome::ProcedureAbortedRetryExhausted {
            correlation_id: id,
            caller_tag: Some(42),
            remote_endpoint: peer(),
        }
    );
    assert!(h.engine.procedure_by_sequence(seq).is_none());
    assert!(h.engine.procedure(id).is_none());

    // One original transmission plus N3 identical retransmissions
    let sent = h.transport.sent();
    assert_eq!(sent.len(), 4);
    assert!(sent.iter().all(|(datagram, dest)| *datagram == sent[0].0 && *dest == peer()));

    let notifications = h.sink.notifications();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].caller_tag, Some(42));
    assert_eq!(notifications[0].correlation_id, id);
}

#[test]
fn retry_exhaustion_driven_by_clock() {
    let mut h = Harness::new(TransactionConfig::default());
    let (_, id) = h
        .engine
        .send_initial(msg(MessageType::EchoRequest, 0), peer(), None)
        .unwrap();

    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.extend(h.advance(Duration::from_millis(1000)));
    }

    assert_eq!(outcomes.len(), 4);
    assert!(matches!(outcomes[2], TimeoutOutcome::RetryScheduled { retry_count: 3, .. }));
    assert!(matches!(
        outcomes[3],
        TimeoutOutcome::ProcedureAbortedRetryExhausted { correlation_id, .. } if correlation_id == id
    ));
    assert!(h.engine.is_empty());
    assert_eq!(h.engine.armed_timers(), 0);

    // The cancelled cleanup timer never reaches the engine
    assert!(h.advance(Duration::from_secs(10)).is_empty());
    assert!(h.timers.lock().is_empty());
}

#[test]
fn inbound_procedure_garbage_collection() {
    let mut h = Harness::new(TransactionConfig::default());
    let outcome = h.engine.on_receive(&msg(MessageType::ModifyBearerRequest, 7), peer());
    let id = match outcome {
        ReceiveOutcome::NewProcedure(id) => id,
        other => panic!("expected a new procedure, got {:?}", other),
    };
    assert_eq!(h.engine.procedure(id).unwrap().sequence_number(), 7);

    // Nothing fires within the retry window: inbound procedures never retransmit
    assert!(h.advance(Duration::from_secs(4)).is_empty());
    assert!(h.transport.sent().is_empty());

    let outcomes = h.advance(Duration::from_secs(1));
    assert_eq!(outcomes, vec![TimeoutOutcome::ProcedureAbortedCleanup { correlation_id: id }]);
    assert!(h.engine.is_empty());
    assert!(h.sink.notifications().is_empty());
}

#[test]
fn late_duplicate_after_completion() {
    let mut h = Harness::new(TransactionConfig::default());
    let (seq, id) = h
        .engine
        .send_initial(msg(MessageType::ModifyBearerRequest, 0), peer(), None)
        .unwrap();

    let response = msg(MessageType::ModifyBearerResponse, seq);
    assert_eq!(h.engine.on_receive(&response, peer()), ReceiveOutcome::MatchedProcedure(id));

    let before = h.engine.procedure(id).unwrap().clone();
    let armed = h.engine.armed_timers();

    let duplicate = h.engine.on_receive(&response, peer());
    assert_eq!(duplicate, ReceiveOutcome::Discarded(DiscardReason::AlreadyAnswered));

    let after = h.engine.procedure(id).unwrap();
    assert_eq!(after.retry_count(), before.retry_count());
    assert_eq!(after.retry_timer(), None);
    assert_eq!(after.cleanup_timer(), before.cleanup_timer());
    assert_eq!(h.engine.armed_timers(), armed);

    // Cleanup releases the completed procedure, after which duplicates do
    // not resurrect it
    let outcomes = h.advance(Duration::from_secs(5));
    assert_eq!(outcomes, vec![TimeoutOutcome::ProcedureReleased { correlation_id: id }]);
    assert_eq!(
        h.engine.on_receive(&response, peer()),
        ReceiveOutcome::Discarded(DiscardReason::UnclassifiableInitial)
    );
    assert!(h.engine.procedure(id).is_none());
}

#[test]
fn round_trip_makes_cancelled_retry_a_no_op() {
    let mut h = Harness::new(TransactionConfig::default());
    let (seq, id) = h
        .engine
        .send_initial(msg(MessageType::DeleteSessionRequest, 0), peer(), None)
        .unwrap();
    let retry = h.engine.procedure(id).unwrap().retry_timer().unwrap();

    let outcome = h.engine.on_receive(&msg(MessageType::DeleteSessionResponse, seq), peer());
    assert_eq!(outcome, ReceiveOutcome::MatchedProcedure(id));
    assert_eq!(h.engine.procedure(id).unwrap().state(), ProcedureState::Completed);
    assert!(!h.timers.lock().is_armed(retry));

    assert_eq!(h.engine.on_timeout(retry), TimeoutOutcome::Ignored);
    assert_eq!(h.engine.procedure(id).unwrap().retry_count(), 0);
    assert_eq!(h.transport.sent().len(), 1);
}

#[test]
fn response_after_retransmission_completes() {
    let mut h = Harness::new(TransactionConfig::default());
    let (seq, id) = h
        .engine
        .send_initial(msg(MessageType::EchoRequest, 0), peer(), None)
        .unwrap();

    h.advance(Duration::from_millis(1000));
    h.advance(Duration::from_millis(1000));
    assert_eq!(h.engine.procedure(id).unwrap().state(), ProcedureState::WaitingTriggered);
    assert_eq!(h.engine.procedure(id).unwrap().retry_count(), 2);

    let outcome = h.engine.on_receive(&msg(MessageType::EchoResponse, seq), peer());
    assert_eq!(outcome, ReceiveOutcome::MatchedProcedure(id));

    // No further retransmission; cleanup fires at the five second mark
    let outcomes = h.advance(Duration::from_secs(3));
    assert_eq!(outcomes, vec![TimeoutOutcome::ProcedureReleased { correlation_id: id }]);
    assert_eq!(h.transport.sent().len(), 3);
}

#[test]
fn closing_triggered_message_removes_inbound_procedure() {
    let mut h = Harness::new(TransactionConfig::default());
    let id = h
        .engine
        .on_receive(&msg(MessageType::DeleteSessionRequest, 0x00AB_CDEF), peer())
        .correlation_id()
        .unwrap();
    let cleanup = h.engine.procedure(id).unwrap().cleanup_timer().unwrap();

    let seq = h
        .engine
        .send_triggered(msg(MessageType::DeleteSessionResponse, 0), id, true)
        .unwrap();
    assert_eq!(seq, 0x00AB_CDEF);
    assert!(h.engine.is_empty());
    assert_eq!(h.engine.on_timeout(cleanup), TimeoutOutcome::Ignored);

    assert_eq!(
        h.engine.send_triggered(msg(MessageType::DeleteSessionResponse, 0), id, true),
        Err(Error::CorrelationNotFound(id))
    );
}

#[test]
fn sequence_numbers_are_stamped_within_wire_width() {
    let transport = Arc::new(RecordingTransport::new());
    let mut engine = TransactionEngine::new(
        TransactionConfig::default(),
        transport.clone(),
        Box::new(DeadlineTimerService::new()),
    )
    .unwrap()
    .with_sequence_generator(Arc::new(SequenceGenerator::with_seed(0x7FFF_FFFE)));

    let (first, _) = engine.send_initial(msg(MessageType::EchoRequest, 0), peer(), None).unwrap();
    let (second, _) = engine.send_initial(msg(MessageType::EchoRequest, 0), peer(), None).unwrap();

    assert_eq!(first, 0x00FF_FFFF);
    assert_eq!(second, 0);
    assert!(engine.procedure_by_sequence(first).is_some());
    assert!(engine.procedure_by_sequence(second).is_some());
}

#[test]
fn bearer_request_answers_bearer_command() {
    let mut h = Harness::new(TransactionConfig::default());
    let (seq, id) = h
        .engine
        .send_initial(msg(MessageType::BearerResourceCommand, 0), peer(), None)
        .unwrap();

    let outcome = h.engine.on_receive(&msg(MessageType::CreateBearerRequest, seq), peer());
    assert_eq!(outcome, ReceiveOutcome::MatchedProcedure(id));
    assert_eq!(
        h.engine.procedure(id).unwrap().triggered_message_type(),
        Some(MessageType::CreateBearerRequest.code())
    );
}

#[test]
fn shorter_timers_from_config() {
    let config = TransactionConfig::default()
        .with_t3_response(Duration::from_millis(100))
        .with_n3_requests(1)
        .with_proc_cleanup(Duration::from_millis(300));
    let mut h = Harness::new(config);
    let (_, id) = h
        .engine
        .send_initial(msg(MessageType::EchoRequest, 0), peer(), Some(1))
        .unwrap();

    assert_eq!(
        h.advance(Duration::from_millis(100)),
        vec![TimeoutOutcome::RetryScheduled { correlation_id: id, retry_count: 1 }]
    );
    assert!(matches!(
        h.advance(Duration::from_millis(100)).as_slice(),
        [TimeoutOutcome::ProcedureAbortedRetryExhausted { caller_tag: Some(1), .. }]
    ));
    assert!(h.engine.is_empty());
}
