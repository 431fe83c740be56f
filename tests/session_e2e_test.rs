//! End-to-end session negotiation tests
//!
//! Two orchestrators negotiate over the in-process signaling hub with
//! synthetic capture devices: offer/answer exchange, trickled
//! candidates, loopback connectivity, aux channel delivery and
//! remote-initiated teardown.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use interview_rtc::{
    AuxMessage, ConnectionState, EndReason, MemorySignaling, Result, Role, SessionConfig,
    SessionOrchestrator, SignalingMessage, SignalingTransport, SyntheticDevices,
};

/// Initialize tracing for tests (call once per test)
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,webrtc=warn")
        .try_init();
}

/// Transport decorator that records every message a side sends
struct RecordingSignaling {
    hub: Arc<MemorySignaling>,
    sent: Arc<Mutex<Vec<SignalingMessage>>>,
}

impl RecordingSignaling {
    fn new(hub: Arc<MemorySignaling>) -> (Self, Arc<Mutex<Vec<SignalingMessage>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                hub,
                sent: Arc::clone(&sent),
            },
            sent,
        )
    }
}

#[async_trait]
impl SignalingTransport for RecordingSignaling {
    async fn send(&self, msg: SignalingMessage) -> Result<()> {
        self.sent.lock().await.push(msg.clone());
        self.hub.send(msg).await
    }

    async fn subscribe(
        &self,
        session_id: &str,
        participant_id: &str,
    ) -> Result<tokio::sync::mpsc::UnboundedReceiver<SignalingMessage>> {
        self.hub.subscribe(session_id, participant_id).await
    }
}

fn session_on(
    session_id: &str,
    signaling: Arc<dyn SignalingTransport>,
) -> SessionOrchestrator {
    SessionOrchestrator::new(
        session_id,
        SessionConfig::default(),
        signaling,
        Arc::new(SyntheticDevices::new()),
    )
    .unwrap()
}

/// Poll `check` until it passes or the deadline expires
async fn wait_for<F, Fut>(what: &str, timeout: Duration, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn test_e2e_offer_yields_exactly_one_answer() {
    init_test_tracing();

    let hub = Arc::new(MemorySignaling::new());
    let (callee_transport, callee_sent) = RecordingSignaling::new(Arc::clone(&hub));

    let callee = session_on("S1", Arc::new(callee_transport));
    callee.join(Role::Candidate, "Dana").await.unwrap();

    let caller = session_on("S1", hub);
    caller.join(Role::Interviewer, "Avery").await.unwrap();

    wait_for("callee answer", Duration::from_secs(10), || {
        let sent = Arc::clone(&callee_sent);
        async move {
            sent.lock()
                .await
                .iter()
                .any(|m| m.kind() == "answer")
        }
    })
    .await;

    // Let any stray duplicate arrive before counting.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let sent = callee_sent.lock().await;
    let answers: Vec<&SignalingMessage> =
        sent.iter().filter(|m| m.kind() == "answer").collect();
    assert_eq!(answers.len(), 1, "callee must answer exactly once");
    assert_eq!(answers[0].to, "interviewer");
    assert_eq!(answers[0].session_id, "S1");
    drop(sent);

    caller.leave().await;
    callee.leave().await;
}

#[tokio::test]
async fn test_e2e_loopback_connects_and_delivers_aux_messages() {
    init_test_tracing();

    let hub = Arc::new(MemorySignaling::new());
    let callee = session_on("S2", Arc::clone(&hub) as Arc<dyn SignalingTransport>);
    let caller = session_on("S2", Arc::clone(&hub) as Arc<dyn SignalingTransport>);

    let received = Arc::new(Mutex::new(Vec::<AuxMessage>::new()));
    {
        let received = Arc::clone(&received);
        callee
            .on_aux_message(move |msg| {
                let received = Arc::clone(&received);
                tokio::spawn(async move {
                    received.lock().await.push(msg);
                });
            })
            .await;
    }

    callee.join(Role::Candidate, "Dana").await.unwrap();
    caller.join(Role::Interviewer, "Avery").await.unwrap();

    wait_for("both sides connected", Duration::from_secs(30), || {
        let caller = caller.clone();
        let callee = callee.clone();
        async move {
            caller.snapshot().await.connection == ConnectionState::Connected
                && callee.snapshot().await.connection == ConnectionState::Connected
        }
    })
    .await;

    let view = caller.snapshot().await;
    assert!(view.remote.unwrap().online);
    assert!(view.elapsed.is_some());

    wait_for("aux channel open on caller", Duration::from_secs(10), || {
        let caller = caller.clone();
        async move { caller.snapshot().await.aux_channel_open }
    })
    .await;

    let score = AuxMessage::json(&serde_json::json!({
        "dimension": "communication",
        "value": 5
    }))
    .unwrap();
    assert!(caller.send_aux_message(&score).await);

    wait_for("score delivery", Duration::from_secs(10), || {
        let received = Arc::clone(&received);
        async move { !received.lock().await.is_empty() }
    })
    .await;

    let got = received.lock().await;
    assert_eq!(got[0].as_json().unwrap()["value"], 5);
    drop(got);

    caller.leave().await;
    callee.leave().await;
}

#[tokio::test]
async fn test_e2e_remote_end_is_distinguished_from_local_leave() {
    init_test_tracing();

    let hub = Arc::new(MemorySignaling::new());
    let callee = session_on("S3", Arc::clone(&hub) as Arc<dyn SignalingTransport>);
    let caller = session_on("S3", Arc::clone(&hub) as Arc<dyn SignalingTransport>);

    callee.join(Role::Candidate, "Dana").await.unwrap();
    caller.join(Role::Interviewer, "Avery").await.unwrap();

    // Let the offer/answer exchange settle before hanging up.
    wait_for("callee negotiation start", Duration::from_secs(10), || {
        let callee = callee.clone();
        async move { callee.snapshot().await.connection != ConnectionState::New }
    })
    .await;

    caller.leave().await;
    assert_eq!(caller.snapshot().await.ended, Some(EndReason::Local));

    wait_for("remote end surfaced", Duration::from_secs(10), || {
        let callee = callee.clone();
        async move { callee.snapshot().await.ended == Some(EndReason::Remote) }
    })
    .await;

    // A later local leave neither errors nor rewrites the end reason.
    callee.leave().await;
    assert_eq!(callee.snapshot().await.ended, Some(EndReason::Remote));
}

#[tokio::test]
async fn test_e2e_candidate_before_offer_is_tolerated() {
    init_test_tracing();

    let hub = Arc::new(MemorySignaling::new());
    let callee = session_on("S4", Arc::clone(&hub) as Arc<dyn SignalingTransport>);
    callee.join(Role::Candidate, "Dana").await.unwrap();

    // A candidate trickling in ahead of the offer must be buffered, not
    // applied or rejected.
    hub.send(SignalingMessage::ice_candidate(
        "S4",
        "interviewer",
        "candidate",
        "candidate:1 1 udp 2130706431 192.0.2.7 50000 typ host".to_string(),
        Some("0".to_string()),
        Some(0),
    ))
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    let view = callee.snapshot().await;
    assert_eq!(view.connection, ConnectionState::New);
    assert!(view.last_error.is_none());

    callee.leave().await;
}
