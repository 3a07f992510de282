//! Top-level gateway operations: submit for review, OSC progress, workflow
//! status and OSC cancellation.

use std::sync::Arc;

use crate::errors::{GatewayError, STATUS_NOT_OSC};
use crate::models::envelope::Envelope;
use crate::models::review::ReviewResult;
use crate::models::workflow::{Workflow, WorkflowStatus};
use crate::services::audit_client::AuditEngine;
use crate::services::fingerprint_cache::{FingerprintCache, FingerprintMap};
use crate::services::reconciler::reconcile;
use crate::services::workflow_store::WorkflowStore;

/// Result of an OSC progress or cancel request.
#[derive(Debug, Clone, PartialEq)]
pub enum OscOutcome {
    /// The engine's own reply, passed through unchanged.
    Engine(Envelope),
    /// The statement has no fingerprint, so it did not run through OSC.
    NotOscExecuted,
}

impl OscOutcome {
    pub fn into_envelope(self) -> Envelope {
        match self {
            OscOutcome::Engine(envelope) => envelope,
            OscOutcome::NotOscExecuted => {
                Envelope::failure(STATUS_NOT_OSC, "statement was not executed via pt-OSC")
            }
        }
    }
}

/// Check that `actor` may cancel an OSC job on `workflow`.
///
/// The workflow must be executing and the actor must be one of its reviewers.
/// State is checked first, so a finished workflow is rejected for everyone.
pub fn authorize_cancel(actor: Option<&str>, workflow: &Workflow) -> Result<(), GatewayError> {
    if workflow.workflow_status() != Some(WorkflowStatus::Executing) {
        return Err(GatewayError::InvalidState(
            "workflow is not executing, refresh the page".to_string(),
        ));
    }
    match actor {
        Some(user) if workflow.is_reviewer(user) => Ok(()),
        _ => Err(GatewayError::Forbidden(
            "current user is not a reviewer of this workflow, log in again".to_string(),
        )),
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    audit: Arc<dyn AuditEngine>,
    store: Arc<dyn WorkflowStore>,
    cache: FingerprintCache,
    split_reconcile: bool,
}

impl Orchestrator {
    pub fn new(
        audit: Arc<dyn AuditEngine>,
        store: Arc<dyn WorkflowStore>,
        cache: FingerprintCache,
        split_reconcile: bool,
    ) -> Self {
        Self {
            audit,
            store,
            cache,
            split_reconcile,
        }
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    /// Run the audit engine over submitted SQL and return its rows.
    ///
    /// Nothing is persisted here; workflow creation stores the result later.
    pub async fn submit_for_review(
        &self,
        sql: Option<&str>,
        cluster: Option<&str>,
    ) -> Result<ReviewResult, GatewayError> {
        let (Some(sql), Some(cluster)) = (sql, cluster) else {
            return Err(GatewayError::MissingParameter(
                "sql_content or cluster_name is missing".to_string(),
            ));
        };
        let cluster = cluster.trim();
        if cluster.is_empty() {
            return Err(GatewayError::MissingParameter("cluster_name is empty".to_string()));
        }
        let sql = sql.trim_end();
        if sql.trim_start().is_empty() {
            return Err(GatewayError::MissingParameter("sql_content is empty".to_string()));
        }

        if !sql.ends_with(';') {
            return Err(GatewayError::MalformedInput(
                "SQL must end with ';', fix it and submit again".to_string(),
            ));
        }

        let result = self.audit.review(sql, cluster).await;
        match &result {
            Ok(rows) => {
                crate::metrics::review_submitted("ok");
                tracing::info!(cluster, rows = rows.len(), "SQL reviewed");
            }
            Err(e) => {
                crate::metrics::review_submitted("failed");
                tracing::warn!(cluster, "SQL review failed: {e}");
            }
        }
        result
    }

    /// Fingerprint map for a workflow, from cache or rebuilt from storage.
    pub async fn fingerprints(&self, workflow_id: i64) -> Result<FingerprintMap, GatewayError> {
        if let Some(map) = self.cached_fingerprints(workflow_id) {
            return Ok(map);
        }
        let workflow = self.load(workflow_id).await?;
        self.rebuild_fingerprints(&workflow).await
    }

    async fn fingerprints_of(&self, workflow: &Workflow) -> Result<FingerprintMap, GatewayError> {
        if let Some(map) = self.cached_fingerprints(workflow.id) {
            return Ok(map);
        }
        self.rebuild_fingerprints(workflow).await
    }

    fn cached_fingerprints(&self, workflow_id: i64) -> Option<FingerprintMap> {
        let hit = self.cache.get(workflow_id);
        crate::metrics::fingerprint_lookup(hit.is_some());
        hit
    }

    async fn rebuild_fingerprints(&self, workflow: &Workflow) -> Result<FingerprintMap, GatewayError> {
        let workflow_id = workflow.id;
        let initial = workflow.initial_review().map_err(|e| {
            GatewayError::Storage(anyhow::anyhow!(
                "workflow {workflow_id} has unreadable review_content: {e}"
            ))
        })?;
        let split = if self.split_reconcile {
            self.audit
                .review_split(&workflow.sql_content, &workflow.cluster_name)
                .await?
        } else {
            initial.clone()
        };

        let map = reconcile(&initial, &split);
        tracing::debug!(workflow_id, fingerprints = map.len(), "Fingerprints reconciled");
        if !map.is_empty() {
            self.cache.insert(workflow_id, map.clone());
            crate::metrics::fingerprint_cache_size(self.cache.len());
        }
        Ok(map)
    }

    /// OSC progress for one statement of a workflow.
    pub async fn progress(&self, workflow_id: i64, sql_id: i64) -> Result<OscOutcome, GatewayError> {
        let Some(sqlsha1) = self.fingerprints(workflow_id).await?.remove(&sql_id) else {
            crate::metrics::osc_request("progress", "not_osc");
            return Ok(OscOutcome::NotOscExecuted);
        };

        let reply = self.audit.progress(&sqlsha1).await;
        crate::metrics::osc_request("progress", if reply.is_ok() { "ok" } else { "failed" });
        Ok(OscOutcome::Engine(reply?))
    }

    /// Current status string of a workflow.
    pub async fn status(&self, workflow_id: i64) -> Result<String, GatewayError> {
        Ok(self.load(workflow_id).await?.status)
    }

    /// Stop the OSC job of one statement, on behalf of `actor`.
    pub async fn cancel(
        &self,
        actor: Option<&str>,
        workflow_id: i64,
        sql_id: i64,
    ) -> Result<OscOutcome, GatewayError> {
        let workflow = self.load(workflow_id).await?;
        if let Err(e) = authorize_cancel(actor, &workflow) {
            crate::metrics::osc_request("cancel", "denied");
            tracing::warn!(workflow_id, sql_id, actor = actor.unwrap_or(""), "OSC cancel rejected: {e}");
            return Err(e);
        }

        let Some(sqlsha1) = self.fingerprints_of(&workflow).await?.remove(&sql_id) else {
            crate::metrics::osc_request("cancel", "not_osc");
            return Ok(OscOutcome::NotOscExecuted);
        };

        tracing::info!(workflow_id, sql_id, sqlsha1 = %sqlsha1, "Stopping OSC job");
        let reply = self.audit.cancel(&sqlsha1).await;
        crate::metrics::osc_request("cancel", if reply.is_ok() { "ok" } else { "failed" });
        Ok(OscOutcome::Engine(reply?))
    }

    async fn load(&self, workflow_id: i64) -> Result<Workflow, GatewayError> {
        self.store
            .get(workflow_id)
            .await
            .map_err(GatewayError::Storage)?
            .ok_or(GatewayError::NotFound { id: workflow_id })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::review::parse_review_content;
    use crate::models::workflow::sample_workflow;
    use crate::services::workflow_store::MemoryWorkflowStore;

    const OSC_REVIEW: &str = r#"[[1, "CHECKED", 0, "Audit completed", "None", "use bksnap", 0, "'0_0_0'", "None", "0", ""], [2, "CHECKED", 0, "Audit completed", "None", "alter table t comment='1'", 599668, "'0_0_1'", "db_bksnap", "0", "*43AE56C1"]]"#;

    #[derive(Default)]
    struct FakeEngine {
        calls: Mutex<Vec<String>>,
        split_rows: Option<String>,
        empty: bool,
    }

    impl FakeEngine {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AuditEngine for FakeEngine {
        async fn review(&self, sql: &str, cluster: &str) -> Result<ReviewResult, GatewayError> {
            self.calls.lock().unwrap().push(format!("review {cluster} {sql}"));
            if self.empty {
                return Err(GatewayError::EmptyResult);
            }
            Ok(parse_review_content(OSC_REVIEW).unwrap())
        }

        async fn review_split(&self, sql: &str, _cluster: &str) -> Result<ReviewResult, GatewayError> {
            self.calls.lock().unwrap().push(format!("split {sql}"));
            let raw = self.split_rows.as_deref().unwrap_or(OSC_REVIEW);
            Ok(parse_review_content(raw).unwrap())
        }

        async fn progress(&self, sqlsha1: &str) -> Result<Envelope, GatewayError> {
            self.calls.lock().unwrap().push(format!("progress {sqlsha1}"));
            Ok(Envelope::ok(serde_json::json!({"percent": 40, "timeRemained": "00:03"})))
        }

        async fn cancel(&self, sqlsha1: &str) -> Result<Envelope, GatewayError> {
            self.calls.lock().unwrap().push(format!("cancel {sqlsha1}"));
            Ok(Envelope::ok(""))
        }
    }

    fn setup(engine: FakeEngine, split_reconcile: bool) -> (Orchestrator, Arc<FakeEngine>, MemoryWorkflowStore) {
        let engine = Arc::new(engine);
        let store = MemoryWorkflowStore::new();
        store.put(sample_workflow(1, WorkflowStatus::Executing, r#"["bob","carol"]"#, OSC_REVIEW));
        store.put(sample_workflow(2, WorkflowStatus::Completed, r#"["bob"]"#, OSC_REVIEW));
        let orch = Orchestrator::new(
            engine.clone(),
            Arc::new(store.clone()),
            FingerprintCache::new(),
            split_reconcile,
        );
        (orch, engine, store)
    }

    #[tokio::test]
    async fn submit_without_terminator_never_reaches_engine() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let err = orch.submit_for_review(Some("select 1"), Some("cluster-a")).await.unwrap_err();
        assert!(matches!(err, GatewayError::MalformedInput(_)));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn submit_with_empty_cluster_is_missing_parameter() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let err = orch.submit_for_review(Some("select 1;"), Some("  ")).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingParameter(_)));
        let err = orch.submit_for_review(None, Some("cluster-a")).await.unwrap_err();
        assert!(matches!(err, GatewayError::MissingParameter(_)));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn submit_with_blank_sql_is_missing_parameter() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        for sql in ["", "  \n\t"] {
            let err = orch.submit_for_review(Some(sql), Some("cluster-a")).await.unwrap_err();
            assert!(matches!(err, GatewayError::MissingParameter(_)), "{sql:?}");
        }
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn cached_fingerprints_skip_storage() {
        let (orch, engine, store) = setup(FakeEngine::default(), false);
        orch.progress(1, 2).await.unwrap();
        store.put(sample_workflow(1, WorkflowStatus::Executing, "bob", "not json"));
        let map = orch.fingerprints(1).await.unwrap();
        assert_eq!(map.get(&2).map(String::as_str), Some("*43AE56C1"));
        orch.cancel(Some("bob"), 1, 2).await.unwrap();
        assert_eq!(
            engine.calls(),
            vec!["progress *43AE56C1".to_string(), "cancel *43AE56C1".to_string()]
        );
    }

    #[tokio::test]
    async fn submit_trims_trailing_whitespace_before_review() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let rows = orch
            .submit_for_review(Some("alter table t comment='1';\n\n  "), Some("cluster-a"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(engine.calls(), vec!["review cluster-a alter table t comment='1';".to_string()]);
    }

    #[tokio::test]
    async fn submit_surfaces_empty_result() {
        let engine = FakeEngine {
            empty: true,
            ..FakeEngine::default()
        };
        let (orch, _, _) = setup(engine, false);
        let err = orch.submit_for_review(Some("selec 1;"), Some("cluster-a")).await.unwrap_err();
        assert!(matches!(err, GatewayError::EmptyResult));
    }

    #[tokio::test]
    async fn progress_uses_reconciled_fingerprint_and_caches_it() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let outcome = orch.progress(1, 2).await.unwrap();
        assert!(matches!(outcome, OscOutcome::Engine(ref env) if env.status == 0));
        assert_eq!(engine.calls(), vec!["progress *43AE56C1".to_string()]);
        assert!(orch.cache().contains(1));

        let first = orch.cache().get(1);
        orch.progress(1, 2).await.unwrap();
        assert_eq!(orch.cache().get(1), first);
    }

    #[tokio::test]
    async fn progress_for_plain_statement_is_not_osc() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let outcome = orch.progress(1, 1).await.unwrap();
        assert_eq!(outcome, OscOutcome::NotOscExecuted);
        assert_eq!(outcome.into_envelope().status, 4);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn progress_for_unknown_workflow_is_not_found() {
        let (orch, _, _) = setup(FakeEngine::default(), false);
        let err = orch.progress(404, 1).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { id: 404 }));
    }

    #[tokio::test]
    async fn workflows_without_fingerprints_are_not_cached() {
        let (orch, _, store) = setup(FakeEngine::default(), false);
        let plain = r#"[[1, "CHECKED", 0, "Audit completed", "None", "update t set a=1", 3, "'0_0_0'", "db", "0", ""]]"#;
        store.put(sample_workflow(5, WorkflowStatus::Executing, "bob", plain));
        assert!(orch.fingerprints(5).await.unwrap().is_empty());
        assert!(!orch.cache().contains(5));
    }

    #[tokio::test]
    async fn split_reconcile_reads_fingerprint_from_split_review() {
        let split = r#"[[1, "CHECKED", 0, "Audit completed", "None", "use bksnap", 0, "'0_0_0'", "None", "0", ""], [2, "CHECKED", 0, "Audit completed", "None", "update t set a=1", 3, "'0_1_0'", "db_bksnap", "0", ""], [3, "CHECKED", 0, "Audit completed", "None", "alter table t comment='1'", 599668, "'0_1_1'", "db_bksnap", "0", "*SPLIT01"]]"#;
        let engine = FakeEngine {
            split_rows: Some(split.to_string()),
            ..FakeEngine::default()
        };
        let (orch, engine, _) = setup(engine, true);
        orch.progress(1, 2).await.unwrap();
        assert_eq!(
            engine.calls(),
            vec![
                "split alter table t add column c int;".to_string(),
                "progress *SPLIT01".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn cancel_by_non_reviewer_is_forbidden_without_engine_call() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let err = orch.cancel(Some("mallory"), 1, 2).await.unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden(_)));
        let err = orch.cancel(None, 1, 2).await.unwrap_err();
        assert!(matches!(err, GatewayError::Forbidden(_)));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_on_completed_workflow_is_invalid_state_for_anyone() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let err = orch.cancel(Some("bob"), 2, 2).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
        let err = orch.cancel(Some("mallory"), 2, 2).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidState(_)));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn cancel_by_reviewer_stops_osc_job() {
        let (orch, engine, _) = setup(FakeEngine::default(), false);
        let outcome = orch.cancel(Some("carol"), 1, 2).await.unwrap();
        assert!(matches!(outcome, OscOutcome::Engine(_)));
        assert_eq!(engine.calls(), vec!["cancel *43AE56C1".to_string()]);

        let outcome = orch.cancel(Some("carol"), 1, 1).await.unwrap();
        assert_eq!(outcome, OscOutcome::NotOscExecuted);
    }

    #[tokio::test]
    async fn status_returns_stored_value() {
        let (orch, _, _) = setup(FakeEngine::default(), false);
        assert_eq!(orch.status(2).await.unwrap(), "completed");
        assert!(matches!(orch.status(77).await, Err(GatewayError::NotFound { id: 77 })));
    }
}
