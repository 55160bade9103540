//! End-to-end conversation flows against the real sqlite store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use sandgate_core::api::{
    ButtonPress, GatewayError, OperatorDirectory, OperatorEvent, OperatorRecord, OperatorRole,
    QuotaLedger, QuotaProfile, RemoteJobId, ScanGateway, ScanOutcome, ScanState, ScanTarget,
    SessionContext, SessionEngine, Stage, StatusReply, Verdict,
};
use sandgate_plugins::store::SqliteStore;

struct ScriptedGateway {
    status_replies: Mutex<Vec<Result<StatusReply, GatewayError>>>,
    submit_calls: AtomicUsize,
}

impl ScriptedGateway {
    fn new(status_replies: Vec<Result<StatusReply, GatewayError>>) -> Self {
        Self {
            status_replies: Mutex::new(status_replies),
            submit_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ScanGateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(
        &self,
        _target: &ScanTarget,
        _priority: u8,
        _passwords: &[String],
    ) -> Result<RemoteJobId, GatewayError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        Ok("job-1".to_string())
    }

    async fn get_status(&self, _job_id: &str) -> Result<StatusReply, GatewayError> {
        let mut replies = self.status_replies.lock().unwrap();
        if replies.is_empty() {
            Ok(StatusReply::Pending)
        } else {
            replies.remove(0)
        }
    }

    async fn healthcheck(&self) -> Result<(), GatewayError> {
        Ok(())
    }

    fn job_link(&self, job_id: &str) -> String {
        format!("https://sandbox.test/tasks/{job_id}")
    }
}

async fn provisioned_store(operator: i64, max_daily: u32) -> Arc<SqliteStore> {
    let store = Arc::new(SqliteStore::connect_in_memory().await.unwrap());
    store
        .insert(&OperatorRecord::new(
            operator,
            OperatorRole::Standard,
            "integration operator",
            1,
            Utc::now(),
        ))
        .await
        .unwrap();
    store
        .create_profile(&QuotaProfile::new(operator, max_daily, 3, false))
        .await
        .unwrap();
    store
}

fn engine_over(store: Arc<SqliteStore>, gateway: Arc<ScriptedGateway>) -> SessionEngine {
    SessionEngine::new(gateway, store.clone(), store)
}

#[tokio::test]
async fn full_conversation_from_submission_to_verdict() {
    let store = provisioned_store(100, 2).await;
    let gateway = Arc::new(ScriptedGateway::new(vec![
        Ok(StatusReply::Pending),
        Ok(StatusReply::Ready(ScanOutcome {
            state: ScanState::Full,
            verdict: Verdict::Dangerous,
            threat_label: "Backdoor.Linux".to_string(),
            failure: None,
        })),
    ]));
    let engine = engine_over(store.clone(), gateway.clone());

    let mut ctx = SessionContext::new(100);
    engine.handle(&mut ctx, OperatorEvent::Start).await;
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::OpenSandbox))
        .await;
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
        .await;
    engine
        .handle(
            &mut ctx,
            OperatorEvent::Text("https://example.org/dropper".to_string()),
        )
        .await;
    let replies = engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
        .await;

    assert_eq!(ctx.stage, Stage::AwaitingOutcome);
    assert!(replies.iter().any(|reply| reply.text.contains("job-1")));

    let profile = store.profile(100).await.unwrap().unwrap();
    assert_eq!(profile.remaining_units, 1);
    assert_eq!(profile.lifetime_total_units, 1);

    // First refresh: still pending; the stage holds.
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::RefreshOutcome))
        .await;
    assert_eq!(ctx.stage, Stage::AwaitingOutcome);

    // Open the poll gate by hand instead of waiting out the window.
    ctx.poll.clear();
    let replies = engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::RefreshOutcome))
        .await;

    assert_eq!(ctx.stage, Stage::MenuSandbox);
    let text: String = replies
        .iter()
        .map(|reply| reply.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(text.contains("dangerous object"));
    assert!(text.contains("Backdoor.Linux"));
}

#[tokio::test]
async fn exhausted_allowance_blocks_before_the_gateway() {
    let store = provisioned_store(101, 1).await;
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let engine = engine_over(store.clone(), gateway.clone());

    let mut ctx = SessionContext::new(101);
    engine.handle(&mut ctx, OperatorEvent::Start).await;
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::OpenSandbox))
        .await;

    // Burn the single unit.
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
        .await;
    engine
        .handle(
            &mut ctx,
            OperatorEvent::Text("https://example.org/a".to_string()),
        )
        .await;
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
        .await;
    assert_eq!(gateway.submit_calls.load(Ordering::SeqCst), 1);

    // Back to the menu, then a second attempt must stop at the gate.
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::ReturnToMenu))
        .await;
    let replies = engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
        .await;

    assert_eq!(ctx.stage, Stage::MenuSandbox);
    assert_eq!(gateway.submit_calls.load(Ordering::SeqCst), 1);
    assert!(replies
        .iter()
        .any(|reply| reply.text.contains("no submissions left")));

    // The daily reset reopens the gate.
    store.daily_reset().await.unwrap();
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
        .await;
    assert!(matches!(ctx.stage, Stage::CollectingTarget(_)));
}

#[tokio::test]
async fn deleting_the_operator_revokes_the_session() {
    let store = provisioned_store(102, 3).await;
    let gateway = Arc::new(ScriptedGateway::new(vec![]));
    let engine = engine_over(store.clone(), gateway);

    let mut ctx = SessionContext::new(102);
    engine.handle(&mut ctx, OperatorEvent::Start).await;
    engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::OpenSandbox))
        .await;
    assert_eq!(ctx.stage, Stage::MenuSandbox);

    // Both rows disappear in one transaction.
    store.delete(102).await.unwrap();

    let replies = engine
        .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitFile))
        .await;
    assert_eq!(ctx.stage, Stage::AwaitingApproval);
    assert!(replies
        .iter()
        .any(|reply| reply.text.contains("not registered")));
}
