use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::gateway::{ScanGateway, ScanOutcome, ScanTarget, StatusReply, TargetKind};
use crate::ledger::QuotaLedger;
use crate::operators::{OperatorDirectory, OperatorRecord, OperatorRole};
use crate::poll::{RefreshDecision, REFRESH_WAIT_SECS};

use super::context::{JobHandle, PendingRequest, QuotaSnapshot, SessionContext};
use super::event::{ButtonPress, OperatorEvent};
use super::reply::{Reply, ReplyButton};
use super::stage::Stage;

/// Drives one operator conversation from submission to delivered verdict.
///
/// One event is handled to completion before the next event for the same
/// operator is accepted; the engine itself is stateless and shared, all
/// session state lives in the [`SessionContext`] value.
pub struct SessionEngine {
    gateway: Arc<dyn ScanGateway>,
    ledger: Arc<dyn QuotaLedger>,
    directory: Arc<dyn OperatorDirectory>,
}

enum AccessCheck {
    Granted(OperatorRecord),
    Denied(Vec<Reply>),
}

impl SessionEngine {
    pub fn new(
        gateway: Arc<dyn ScanGateway>,
        ledger: Arc<dyn QuotaLedger>,
        directory: Arc<dyn OperatorDirectory>,
    ) -> Self {
        Self {
            gateway,
            ledger,
            directory,
        }
    }

    /// Handle one transport event and return the replies to render.
    pub async fn handle(&self, ctx: &mut SessionContext, event: OperatorEvent) -> Vec<Reply> {
        // Access is re-evaluated on every stage entry; any failure forces
        // the session back to AwaitingApproval regardless of where it was.
        let operator = match self.ensure_access(ctx).await {
            AccessCheck::Granted(record) => record,
            AccessCheck::Denied(replies) => return replies,
        };

        match ctx.stage {
            Stage::Unauthenticated | Stage::AwaitingApproval => self.enter_menus(ctx, &operator),
            Stage::MenuRoot => self.on_menu_root(ctx, &operator, event),
            Stage::MenuSandbox => self.on_menu_sandbox(ctx, &operator, event).await,
            Stage::CollectingTarget(kind) => self.on_collect_target(ctx, &operator, kind, event),
            Stage::CollectingPasswords => self.on_collect_passwords(ctx, &operator, event).await,
            Stage::Submitting => vec![Reply::text(
                "Your submission is still being processed. One moment.",
            )],
            Stage::AwaitingOutcome => self.on_awaiting_outcome(ctx, &operator, event).await,
        }
    }

    async fn ensure_access(&self, ctx: &mut SessionContext) -> AccessCheck {
        match self.directory.lookup(ctx.operator_id).await {
            Ok(Some(record)) if !record.blocked => AccessCheck::Granted(record),
            Ok(Some(_)) => {
                info!(operator = ctx.operator_id, "blocked operator turned away");
                ctx.revoke();
                AccessCheck::Denied(vec![Reply::with_buttons(
                    format!(
                        "Access denied. If you believe this is a mistake, contact the \
                         service administrator.\nYour operator id: {}.",
                        ctx.operator_id
                    ),
                    vec![ButtonPress::CheckAccess],
                )])
            }
            Ok(None) => {
                info!(operator = ctx.operator_id, "unregistered operator turned away");
                ctx.revoke();
                AccessCheck::Denied(vec![Reply::with_buttons(
                    format!(
                        "You are not registered. Forward this message to the service \
                         administrator to request access.\nYour operator id: {}.",
                        ctx.operator_id
                    ),
                    vec![ButtonPress::CheckAccess],
                )])
            }
            Err(err) => {
                warn!(operator = ctx.operator_id, error = %err, "operator lookup failed");
                AccessCheck::Denied(vec![Reply::text(
                    "The operator directory is temporarily unavailable. Try again in a moment.",
                )])
            }
        }
    }

    /// Access granted from a cold or revoked session: land on the root menu.
    fn enter_menus(&self, ctx: &mut SessionContext, operator: &OperatorRecord) -> Vec<Reply> {
        info!(
            operator = ctx.operator_id,
            role = operator.role.as_str(),
            "operator authorized"
        );
        ctx.stage = Stage::MenuRoot;
        let greeting = match operator.role {
            OperatorRole::Admin => "Welcome, administrator!",
            OperatorRole::Standard => "Welcome!",
        };
        vec![Reply::with_buttons(
            format!("{greeting}\nChoose an action from the menu below."),
            vec![ButtonPress::OpenSandbox],
        )]
    }

    fn on_menu_root(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
        event: OperatorEvent,
    ) -> Vec<Reply> {
        match event {
            OperatorEvent::Button(ButtonPress::OpenSandbox) => {
                ctx.stage = Stage::MenuSandbox;
                vec![self.sandbox_menu(operator)]
            }
            _ => vec![
                Reply::text("Use the menu buttons to continue."),
                self.root_menu(),
            ],
        }
    }

    async fn on_menu_sandbox(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
        event: OperatorEvent,
    ) -> Vec<Reply> {
        match event {
            OperatorEvent::Button(ButtonPress::SubmitFile) => {
                self.gate_submission(ctx, TargetKind::File).await
            }
            OperatorEvent::Button(ButtonPress::SubmitLink) => {
                self.gate_submission(ctx, TargetKind::Link).await
            }
            OperatorEvent::Button(ButtonPress::ShowStats) => self.show_stats(ctx, operator).await,
            OperatorEvent::Button(ButtonPress::ServiceHealth)
                if operator.role == OperatorRole::Admin =>
            {
                self.run_healthcheck(operator).await
            }
            OperatorEvent::Button(ButtonPress::ReturnToMenu) => {
                ctx.stage = Stage::MenuRoot;
                vec![self.root_menu()]
            }
            _ => vec![
                Reply::text("Use the menu buttons to continue."),
                self.sandbox_menu(operator),
            ],
        }
    }

    /// Entry gate for a submission attempt: the quota must have headroom
    /// before any target is accepted.
    async fn gate_submission(&self, ctx: &mut SessionContext, kind: TargetKind) -> Vec<Reply> {
        match self.ledger.reserve_check(ctx.operator_id).await {
            Ok(0) => {
                info!(operator = ctx.operator_id, "daily quota exhausted");
                vec![Reply::text(
                    "You have no submissions left for today.\nThe allowance renews once a \
                     day; try again tomorrow.",
                )]
            }
            Ok(remaining) => {
                let profile = match self.ledger.profile(ctx.operator_id).await {
                    Ok(Some(profile)) => profile,
                    Ok(None) => return self.render_revoked(ctx),
                    Err(err) => {
                        warn!(operator = ctx.operator_id, error = %err, "quota snapshot failed");
                        return vec![Reply::text(
                            "The quota ledger is temporarily unavailable. Try again in a moment.",
                        )];
                    }
                };
                info!(
                    operator = ctx.operator_id,
                    remaining,
                    kind = kind.noun(),
                    "submission attempt approved"
                );
                ctx.pending = Some(PendingRequest::new(kind));
                ctx.quota = Some(QuotaSnapshot {
                    priority_tier: profile.priority_tier,
                    link_disclosure_allowed: profile.link_disclosure_allowed,
                });
                ctx.stage = Stage::CollectingTarget(kind);
                let prompt = match kind {
                    TargetKind::File => "Send the file you want scanned (one file only).",
                    TargetKind::Link => "Enter the link you want scanned (one link only).",
                };
                vec![Reply::with_buttons(prompt, vec![ButtonPress::ReturnToMenu])]
            }
            Err(err) if err.is_revocation() => self.render_revoked(ctx),
            Err(err) => {
                warn!(operator = ctx.operator_id, error = %err, "quota check failed");
                vec![Reply::text(
                    "The quota ledger is temporarily unavailable. Try again in a moment.",
                )]
            }
        }
    }

    async fn show_stats(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
    ) -> Vec<Reply> {
        match self.ledger.profile(ctx.operator_id).await {
            Ok(Some(profile)) => vec![
                Reply::text(format!(
                    "Your statistics\n\nAllowed per day: {}\nLeft today: {}\nJobs created \
                     in total: {}",
                    profile.max_daily_units, profile.remaining_units, profile.lifetime_total_units
                )),
                self.sandbox_menu(operator),
            ],
            Ok(None) => self.render_revoked(ctx),
            Err(err) => {
                warn!(operator = ctx.operator_id, error = %err, "stats lookup failed");
                vec![Reply::text(
                    "The quota ledger is temporarily unavailable. Try again in a moment.",
                )]
            }
        }
    }

    async fn run_healthcheck(&self, operator: &OperatorRecord) -> Vec<Reply> {
        let mut replies = vec![Reply::text(
            "Health query sent; this can take up to 10 seconds.",
        )];
        match self.gateway.healthcheck().await {
            Ok(()) => replies.push(Reply::text("The scanning service is reachable.")),
            Err(err) => {
                warn!(error = %err, "healthcheck failed");
                replies.push(Reply::text(format!(
                    "The health query reported a problem.\n\n{err}"
                )));
            }
        }
        replies.push(self.sandbox_menu(operator));
        replies
    }

    fn on_collect_target(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
        kind: TargetKind,
        event: OperatorEvent,
    ) -> Vec<Reply> {
        if let OperatorEvent::Button(ButtonPress::ReturnToMenu) = event {
            ctx.reset_to_sandbox();
            return vec![self.sandbox_menu(operator)];
        }

        let target = match (kind, event) {
            (TargetKind::Link, OperatorEvent::Text(text)) => {
                // One link only: the first whitespace-delimited token.
                match text.split_whitespace().next() {
                    Some(url) => ScanTarget::Link {
                        url: url.to_string(),
                    },
                    None => {
                        return vec![Reply::with_buttons(
                            "A link was expected but the message carried no text.\nEnter \
                             the link to scan:",
                            vec![ButtonPress::ReturnToMenu],
                        )]
                    }
                }
            }
            (TargetKind::File, OperatorEvent::File(file)) => ScanTarget::File {
                path: file.local_path,
                file_name: file.file_name,
            },
            (TargetKind::Link, _) => {
                return vec![Reply::with_buttons(
                    "A link was expected. Enter the link to scan as text:",
                    vec![ButtonPress::ReturnToMenu],
                )]
            }
            (TargetKind::File, _) => {
                return vec![Reply::with_buttons(
                    "A file was expected. Send the file to scan:",
                    vec![ButtonPress::ReturnToMenu],
                )]
            }
        };

        if let Some(pending) = ctx.pending.as_mut() {
            pending.target = Some(target);
        } else {
            // Gate was bypassed somehow; start the attempt over.
            ctx.reset_to_sandbox();
            return vec![self.sandbox_menu(operator)];
        }
        ctx.stage = Stage::CollectingPasswords;
        vec![Reply::with_buttons(
            "If the content is protected by passwords, enter them now, one per line \
             (five at most).\nIf there are none, use the button below.",
            vec![ButtonPress::SubmitNow, ButtonPress::ReturnToMenu],
        )]
    }

    async fn on_collect_passwords(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
        event: OperatorEvent,
    ) -> Vec<Reply> {
        match event {
            OperatorEvent::Button(ButtonPress::ReturnToMenu) => {
                ctx.reset_to_sandbox();
                vec![self.sandbox_menu(operator)]
            }
            OperatorEvent::Button(ButtonPress::SubmitNow) => {
                self.perform_submission(ctx, operator).await
            }
            OperatorEvent::Text(text) => {
                // Silently keep the first five candidates.
                let passwords: Vec<String> =
                    text.lines().take(5).map(|line| line.to_string()).collect();
                if let Some(pending) = ctx.pending.as_mut() {
                    pending.passwords = passwords;
                }
                self.perform_submission(ctx, operator).await
            }
            _ => vec![Reply::with_buttons(
                "Password input was expected. Enter the passwords again, or submit \
                 without any using the button below.",
                vec![ButtonPress::SubmitNow, ButtonPress::ReturnToMenu],
            )],
        }
    }

    async fn perform_submission(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
    ) -> Vec<Reply> {
        let Some(pending) = ctx.pending.take() else {
            ctx.reset_to_sandbox();
            return vec![self.sandbox_menu(operator)];
        };
        let Some(target) = pending.target else {
            ctx.reset_to_sandbox();
            return vec![self.sandbox_menu(operator)];
        };
        let priority = ctx.quota.map(|quota| quota.priority_tier).unwrap_or(1);

        ctx.stage = Stage::Submitting;
        info!(
            operator = ctx.operator_id,
            kind = target.kind().noun(),
            priority,
            "submitting scan job"
        );

        match self
            .gateway
            .submit(&target, priority, &pending.passwords)
            .await
        {
            Ok(job_id) => self.settle_submission(ctx, job_id).await,
            Err(err) => {
                warn!(operator = ctx.operator_id, error = %err, "scan submission failed");
                ctx.reset_to_sandbox();
                vec![
                    Reply::text(format!(
                        "The submission could not be sent.\nPass this on to your \
                         administrator:\n{err}"
                    )),
                    self.sandbox_menu(operator),
                ]
            }
        }
    }

    /// Debit the ledger and park the session on the new job handle.
    async fn settle_submission(&self, ctx: &mut SessionContext, job_id: String) -> Vec<Reply> {
        if let Err(err) = self.ledger.record_submission(ctx.operator_id).await {
            if err.is_revocation() {
                warn!(
                    operator = ctx.operator_id,
                    "quota row vanished during settlement"
                );
                ctx.force_unauthenticated();
                return vec![Reply::with_buttons(
                    "It appears your access has been withdrawn.",
                    vec![ButtonPress::CheckAccess],
                )];
            }
            // The remote job exists either way; losing one counter update is
            // preferable to failing the conversation.
            warn!(operator = ctx.operator_id, error = %err, "post-submission settlement failed");
        }

        let link_allowed = ctx
            .quota
            .map(|quota| quota.link_disclosure_allowed)
            .unwrap_or(false);
        ctx.handle = Some(JobHandle {
            remote_job_id: job_id.clone(),
            owning_operator: ctx.operator_id,
        });
        ctx.poll.clear();
        ctx.stage = Stage::AwaitingOutcome;

        let mut created = Reply::text(format!("Job created!\nIts id: {job_id}."));
        if link_allowed {
            created.buttons.push(ReplyButton::JobLink {
                url: self.gateway.job_link(&job_id),
            });
        } else {
            created.text.push_str(
                "\nKeep the id: an administrator can look the job up for you if the \
                 results need a follow-up.",
            );
        }
        vec![
            created,
            Reply::with_buttons(
                "Refresh the job status with the button below to collect the verdict.",
                vec![ButtonPress::RefreshOutcome, ButtonPress::ReturnToMenu],
            ),
        ]
    }

    async fn on_awaiting_outcome(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
        event: OperatorEvent,
    ) -> Vec<Reply> {
        match event {
            OperatorEvent::Button(ButtonPress::ReturnToMenu) => {
                // Immediate cancellation: no waiting out the poll window, no
                // signal to the remote service.
                ctx.reset_to_sandbox();
                vec![self.sandbox_menu(operator)]
            }
            OperatorEvent::Button(ButtonPress::RefreshOutcome) => {
                self.refresh_outcome(ctx, operator).await
            }
            _ => vec![Reply::with_buttons(
                "Refresh the job status with the button below to collect the verdict.",
                vec![ButtonPress::RefreshOutcome, ButtonPress::ReturnToMenu],
            )],
        }
    }

    async fn refresh_outcome(
        &self,
        ctx: &mut SessionContext,
        operator: &OperatorRecord,
    ) -> Vec<Reply> {
        let Some(handle) = ctx.handle.clone() else {
            ctx.reset_to_sandbox();
            return vec![self.sandbox_menu(operator)];
        };

        if let RefreshDecision::Wait { remaining_secs } = ctx.poll.decide(Utc::now()) {
            return vec![Reply::with_buttons(
                format!("Results are not in yet. Try again in {remaining_secs} seconds."),
                vec![ButtonPress::RefreshOutcome, ButtonPress::ReturnToMenu],
            )];
        }

        match self.gateway.get_status(&handle.remote_job_id).await {
            Ok(StatusReply::Pending) => {
                ctx.poll.arm(Utc::now());
                vec![Reply::with_buttons(
                    format!(
                        "Results are not in yet. You can refresh again in {REFRESH_WAIT_SECS} \
                         seconds."
                    ),
                    vec![ButtonPress::RefreshOutcome, ButtonPress::ReturnToMenu],
                )]
            }
            Ok(StatusReply::Ready(outcome)) => {
                info!(
                    operator = ctx.operator_id,
                    job = %handle.remote_job_id,
                    "scan outcome delivered"
                );
                let link_allowed = ctx
                    .quota
                    .map(|quota| quota.link_disclosure_allowed)
                    .unwrap_or(false);
                let mut reply = Reply::text(render_outcome(&outcome));
                if link_allowed {
                    reply.buttons.push(ReplyButton::JobLink {
                        url: self.gateway.job_link(&handle.remote_job_id),
                    });
                }
                ctx.reset_to_sandbox();
                vec![reply, self.sandbox_menu(operator)]
            }
            Err(err) => {
                warn!(
                    operator = ctx.operator_id,
                    job = %handle.remote_job_id,
                    error = %err,
                    "status query failed"
                );
                ctx.reset_to_sandbox();
                vec![
                    Reply::text(format!(
                        "Could not fetch the results.\nPass this on to your \
                         administrator:\n{err}"
                    )),
                    self.sandbox_menu(operator),
                ]
            }
        }
    }

    fn render_revoked(&self, ctx: &mut SessionContext) -> Vec<Reply> {
        info!(operator = ctx.operator_id, "access revoked mid-conversation");
        ctx.revoke();
        vec![Reply::with_buttons(
            "It appears your access has been withdrawn.",
            vec![ButtonPress::CheckAccess],
        )]
    }

    fn root_menu(&self) -> Reply {
        Reply::with_buttons(
            "Choose an action from the menu below.",
            vec![ButtonPress::OpenSandbox],
        )
    }

    fn sandbox_menu(&self, operator: &OperatorRecord) -> Reply {
        let mut presses = vec![
            ButtonPress::SubmitFile,
            ButtonPress::SubmitLink,
            ButtonPress::ShowStats,
        ];
        if operator.role == OperatorRole::Admin {
            presses.push(ButtonPress::ServiceHealth);
        }
        presses.push(ButtonPress::ReturnToMenu);
        Reply::with_buttons("Scanning menu.\nChoose an action:", presses)
    }
}

fn render_outcome(outcome: &ScanOutcome) -> String {
    let mut text = format!(
        "Scan finished!\n\nStatus: {}\nVerdict: {}\nThreat: {}",
        outcome.state.describe(),
        outcome.verdict.describe(),
        outcome.threat_label
    );
    if let Some(failure) = outcome.failure {
        text.push_str(&format!("\nProcessing note: {}", failure.describe()));
    }
    text
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use crate::errors::{GatewayError, LedgerError};
    use crate::gateway::{RemoteJobId, ScanState, Verdict};
    use crate::ledger::QuotaProfile;
    use crate::operators::OperatorId;
    use crate::session::event::IncomingFile;

    use super::*;

    struct StubGateway {
        submit_reply: Mutex<Result<RemoteJobId, GatewayError>>,
        status_reply: Mutex<Result<StatusReply, GatewayError>>,
        submit_calls: AtomicUsize,
        status_calls: AtomicUsize,
        last_passwords: Mutex<Vec<String>>,
    }

    impl Default for StubGateway {
        fn default() -> Self {
            Self {
                submit_reply: Mutex::new(Ok("abc123".to_string())),
                status_reply: Mutex::new(Ok(StatusReply::Pending)),
                submit_calls: AtomicUsize::new(0),
                status_calls: AtomicUsize::new(0),
                last_passwords: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ScanGateway for StubGateway {
        fn name(&self) -> &str {
            "stub"
        }

        async fn submit(
            &self,
            _target: &ScanTarget,
            _priority: u8,
            passwords: &[String],
        ) -> Result<RemoteJobId, GatewayError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_passwords.lock().unwrap() = passwords.to_vec();
            self.submit_reply.lock().unwrap().clone()
        }

        async fn get_status(&self, _job_id: &str) -> Result<StatusReply, GatewayError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            self.status_reply.lock().unwrap().clone()
        }

        async fn healthcheck(&self) -> Result<(), GatewayError> {
            Ok(())
        }

        fn job_link(&self, job_id: &str) -> String {
            format!("https://sandbox.test/tasks/{job_id}")
        }
    }

    #[derive(Default)]
    struct MemoryLedger {
        rows: Mutex<HashMap<OperatorId, QuotaProfile>>,
    }

    #[async_trait]
    impl QuotaLedger for MemoryLedger {
        async fn profile(&self, id: OperatorId) -> Result<Option<QuotaProfile>, LedgerError> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }

        async fn reserve_check(&self, id: OperatorId) -> Result<u32, LedgerError> {
            self.rows
                .lock()
                .unwrap()
                .get(&id)
                .map(|row| row.remaining_units)
                .ok_or(LedgerError::OperatorNotFound(id))
        }

        async fn commit_decrement(&self, id: OperatorId, amount: u32) -> Result<(), LedgerError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(&id).ok_or(LedgerError::OperatorNotFound(id))?;
            row.remaining_units = row.remaining_units.saturating_sub(amount);
            Ok(())
        }

        async fn increment_lifetime(&self, id: OperatorId, amount: u32) -> Result<(), LedgerError> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows.get_mut(&id).ok_or(LedgerError::OperatorNotFound(id))?;
            row.lifetime_total_units += u64::from(amount);
            Ok(())
        }

        async fn create_profile(&self, profile: &QuotaProfile) -> Result<(), LedgerError> {
            self.rows
                .lock()
                .unwrap()
                .insert(profile.operator_id, profile.clone());
            Ok(())
        }

        async fn daily_reset(&self) -> Result<(), LedgerError> {
            for row in self.rows.lock().unwrap().values_mut() {
                row.remaining_units = row.max_daily_units;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryDirectory {
        rows: Mutex<HashMap<OperatorId, OperatorRecord>>,
    }

    #[async_trait]
    impl OperatorDirectory for MemoryDirectory {
        async fn lookup(&self, id: OperatorId) -> anyhow::Result<Option<OperatorRecord>> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }

        async fn insert(&self, record: &OperatorRecord) -> anyhow::Result<()> {
            self.rows
                .lock()
                .unwrap()
                .insert(record.operator_id, record.clone());
            Ok(())
        }

        async fn set_blocked(&self, id: OperatorId, blocked: bool) -> anyhow::Result<()> {
            if let Some(record) = self.rows.lock().unwrap().get_mut(&id) {
                record.blocked = blocked;
            }
            Ok(())
        }

        async fn delete(&self, id: OperatorId) -> anyhow::Result<()> {
            self.rows.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    struct Fixture {
        engine: SessionEngine,
        gateway: Arc<StubGateway>,
        ledger: Arc<MemoryLedger>,
        directory: Arc<MemoryDirectory>,
    }

    fn fixture() -> Fixture {
        let gateway = Arc::new(StubGateway::default());
        let ledger = Arc::new(MemoryLedger::default());
        let directory = Arc::new(MemoryDirectory::default());
        let engine = SessionEngine::new(gateway.clone(), ledger.clone(), directory.clone());
        Fixture {
            engine,
            gateway,
            ledger,
            directory,
        }
    }

    const OPERATOR: OperatorId = 7;

    async fn register(fx: &Fixture, role: OperatorRole, remaining: u32) {
        fx.directory
            .insert(&OperatorRecord::new(
                OPERATOR,
                role,
                "test operator",
                1,
                Utc::now(),
            ))
            .await
            .unwrap();
        let mut profile = QuotaProfile::new(OPERATOR, 5, 2, true);
        profile.remaining_units = remaining;
        fx.ledger.create_profile(&profile).await.unwrap();
    }

    fn all_text(replies: &[Reply]) -> String {
        replies
            .iter()
            .map(|reply| reply.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Start -> root menu -> sandbox menu.
    async fn walk_to_sandbox(fx: &Fixture, ctx: &mut SessionContext) {
        fx.engine.handle(ctx, OperatorEvent::Start).await;
        fx.engine
            .handle(ctx, OperatorEvent::Button(ButtonPress::OpenSandbox))
            .await;
        assert_eq!(ctx.stage, Stage::MenuSandbox);
    }

    #[tokio::test]
    async fn unregistered_operator_waits_for_approval() {
        let fx = fixture();
        let mut ctx = SessionContext::new(OPERATOR);

        let replies = fx.engine.handle(&mut ctx, OperatorEvent::Start).await;

        assert_eq!(ctx.stage, Stage::AwaitingApproval);
        assert!(all_text(&replies).contains("not registered"));
        assert!(all_text(&replies).contains('7'));
    }

    #[tokio::test]
    async fn blocked_operator_is_turned_away_from_any_stage() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 5).await;
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.directory.set_blocked(OPERATOR, true).await.unwrap();
        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::ShowStats))
            .await;

        assert_eq!(ctx.stage, Stage::AwaitingApproval);
        assert!(all_text(&replies).contains("Access denied"));
        assert!(ctx.pending.is_none());
    }

    #[tokio::test]
    async fn granted_operator_lands_on_root_menu() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 5).await;
        let mut ctx = SessionContext::new(OPERATOR);

        let replies = fx.engine.handle(&mut ctx, OperatorEvent::Start).await;

        assert_eq!(ctx.stage, Stage::MenuRoot);
        assert!(all_text(&replies).contains("Welcome"));
    }

    #[tokio::test]
    async fn exhausted_quota_never_reaches_gateway() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 0).await;
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;

        assert_eq!(ctx.stage, Stage::MenuSandbox);
        assert!(all_text(&replies).contains("no submissions left"));
        assert_eq!(fx.gateway.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn link_submission_debits_and_awaits_outcome() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 1).await;
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;
        assert_eq!(ctx.stage, Stage::CollectingTarget(TargetKind::Link));

        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::Text("https://example.com/sample".to_string()),
            )
            .await;
        assert_eq!(ctx.stage, Stage::CollectingPasswords);

        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
            .await;

        assert_eq!(ctx.stage, Stage::AwaitingOutcome);
        assert!(all_text(&replies).contains("abc123"));
        assert_eq!(
            ctx.handle.as_ref().map(|handle| handle.remote_job_id.as_str()),
            Some("abc123")
        );

        let profile = fx.ledger.profile(OPERATOR).await.unwrap().unwrap();
        assert_eq!(profile.remaining_units, 0);
        assert_eq!(profile.lifetime_total_units, 1);
    }

    #[tokio::test]
    async fn password_input_is_truncated_to_five() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 3).await;
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;
        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::Text("https://example.com/archive".to_string()),
            )
            .await;
        fx.engine
            .handle(&mut ctx, OperatorEvent::Text("a\nb\nc\nd\ne\nf".to_string()))
            .await;

        assert_eq!(
            *fx.gateway.last_passwords.lock().unwrap(),
            vec!["a", "b", "c", "d", "e"]
        );
    }

    #[tokio::test]
    async fn oversized_file_submission_returns_to_menu_with_quota_untouched() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 4).await;
        *fx.gateway.submit_reply.lock().unwrap() = Err(GatewayError::PayloadTooLarge);
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitFile))
            .await;
        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::File(IncomingFile {
                    file_name: "huge.bin".to_string(),
                    local_path: PathBuf::from("/tmp/huge.bin"),
                }),
            )
            .await;
        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
            .await;

        assert_eq!(ctx.stage, Stage::MenuSandbox);
        assert!(all_text(&replies).contains(&GatewayError::PayloadTooLarge.to_string()));

        let profile = fx.ledger.profile(OPERATOR).await.unwrap().unwrap();
        assert_eq!(profile.remaining_units, 4);
        assert_eq!(profile.lifetime_total_units, 0);
    }

    #[tokio::test]
    async fn pending_status_keeps_stage_and_paces_refreshes() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 2).await;
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;
        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::Text("https://example.com/slow".to_string()),
            )
            .await;
        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
            .await;

        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::RefreshOutcome))
            .await;
        assert_eq!(ctx.stage, Stage::AwaitingOutcome);
        assert!(all_text(&replies).contains("10"));
        assert_eq!(fx.gateway.status_calls.load(Ordering::SeqCst), 1);

        // Inside the wait window the engine answers without a status query.
        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::RefreshOutcome))
            .await;
        assert_eq!(ctx.stage, Stage::AwaitingOutcome);
        assert!(all_text(&replies).contains("Try again in"));
        assert_eq!(fx.gateway.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ready_status_renders_verdict_and_returns_to_menu() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 2).await;
        *fx.gateway.status_reply.lock().unwrap() = Ok(StatusReply::Ready(ScanOutcome {
            state: ScanState::Full,
            verdict: Verdict::Clean,
            threat_label: "benign".to_string(),
            failure: None,
        }));
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;
        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::Text("https://example.com/ok".to_string()),
            )
            .await;
        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
            .await;
        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::RefreshOutcome))
            .await;

        assert_eq!(ctx.stage, Stage::MenuSandbox);
        assert!(all_text(&replies).contains("no threats detected"));
        assert!(ctx.handle.is_none());
    }

    #[tokio::test]
    async fn failed_status_query_renders_taxonomy_text() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 2).await;
        *fx.gateway.status_reply.lock().unwrap() = Err(GatewayError::JobNotFound);
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;
        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::Text("https://example.com/old".to_string()),
            )
            .await;
        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
            .await;
        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::RefreshOutcome))
            .await;

        assert_eq!(ctx.stage, Stage::MenuSandbox);
        assert!(all_text(&replies).contains(&GatewayError::JobNotFound.to_string()));
    }

    #[tokio::test]
    async fn missing_quota_row_during_settlement_forces_unauthenticated() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 2).await;
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;
        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::Text("https://example.com/gone".to_string()),
            )
            .await;

        // The quota row disappears between the gate and the settlement.
        fx.ledger.rows.lock().unwrap().remove(&OPERATOR);

        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
            .await;

        assert_eq!(ctx.stage, Stage::Unauthenticated);
        assert!(all_text(&replies).contains("withdrawn"));
        assert!(ctx.handle.is_none());
    }

    #[tokio::test]
    async fn return_to_menu_discards_in_flight_poll_immediately() {
        let fx = fixture();
        register(&fx, OperatorRole::Standard, 2).await;
        let mut ctx = SessionContext::new(OPERATOR);
        walk_to_sandbox(&fx, &mut ctx).await;

        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitLink))
            .await;
        fx.engine
            .handle(
                &mut ctx,
                OperatorEvent::Text("https://example.com/busy".to_string()),
            )
            .await;
        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::SubmitNow))
            .await;
        fx.engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::RefreshOutcome))
            .await;

        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::ReturnToMenu))
            .await;

        assert_eq!(ctx.stage, Stage::MenuSandbox);
        assert!(ctx.handle.is_none());
        assert!(!all_text(&replies).is_empty());
    }

    #[tokio::test]
    async fn admin_is_offered_and_can_run_the_service_healthcheck() {
        let fx = fixture();
        register(&fx, OperatorRole::Admin, 2).await;
        let mut ctx = SessionContext::new(OPERATOR);
        fx.engine.handle(&mut ctx, OperatorEvent::Start).await;
        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::OpenSandbox))
            .await;

        let has_health = replies.iter().any(|reply| {
            reply
                .buttons
                .iter()
                .any(|button| matches!(button, ReplyButton::Press(ButtonPress::ServiceHealth)))
        });
        assert!(has_health);

        let replies = fx
            .engine
            .handle(&mut ctx, OperatorEvent::Button(ButtonPress::ServiceHealth))
            .await;
        assert!(all_text(&replies).contains("reachable"));
    }
}
