//! Workflow persistence.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use diesel::prelude::*;
use diesel_async::pooled_connection::deadpool::Pool;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::dashboard::charts::{self, MonthCount, PersonCount};
use crate::models::workflow::{Workflow, WorkflowStatus};
use crate::schema::sql_workflow;

pub type PgPool = Pool<AsyncPgConnection>;

/// Accessor over persisted workflows.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, id: i64) -> anyhow::Result<Option<Workflow>>;

    async fn update_status(&self, id: i64, status: WorkflowStatus) -> anyhow::Result<()>;

    /// Workflows created per month, oldest first.
    async fn month_counts(&self) -> anyhow::Result<Vec<MonthCount>>;

    /// Recent workflows per engineer, busiest first.
    async fn person_counts(&self) -> anyhow::Result<Vec<PersonCount>>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: PgPool,
}

impl PgWorkflowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn get(&self, id: i64) -> anyhow::Result<Option<Workflow>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("diesel pool: {e}"))?;
        let result = sql_workflow::table
            .find(id)
            .select(Workflow::as_select())
            .first::<Workflow>(&mut *conn)
            .await
            .optional()?;
        Ok(result)
    }

    async fn update_status(&self, id: i64, status: WorkflowStatus) -> anyhow::Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("diesel pool: {e}"))?;
        diesel::update(sql_workflow::table.find(id))
            .set(sql_workflow::status.eq(status.as_str()))
            .execute(&mut *conn)
            .await?;

        tracing::info!(workflow_id = id, status = %status, "Workflow status updated");
        Ok(())
    }

    async fn month_counts(&self) -> anyhow::Result<Vec<MonthCount>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("diesel pool: {e}"))?;
        charts::query_month_counts(&mut conn).await
    }

    async fn person_counts(&self) -> anyhow::Result<Vec<PersonCount>> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("diesel pool: {e}"))?;
        charts::query_person_counts(&mut conn).await
    }
}

/// In-process store for tests and local runs without a database.
#[derive(Clone, Default)]
pub struct MemoryWorkflowStore {
    workflows: Arc<DashMap<i64, Workflow>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed workflow, keeping its id.
    pub fn put(&self, workflow: Workflow) {
        self.workflows.insert(workflow.id, workflow);
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn get(&self, id: i64) -> anyhow::Result<Option<Workflow>> {
        Ok(self.workflows.get(&id).map(|r| r.clone()))
    }

    async fn update_status(&self, id: i64, status: WorkflowStatus) -> anyhow::Result<()> {
        let mut entry = self
            .workflows
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("workflow {id} not found"))?;
        entry.status = status.to_string();
        Ok(())
    }

    async fn month_counts(&self) -> anyhow::Result<Vec<MonthCount>> {
        let snapshot: Vec<Workflow> = self.workflows.iter().map(|r| r.value().clone()).collect();
        Ok(charts::month_counts(&snapshot, chrono::Utc::now()))
    }

    async fn person_counts(&self) -> anyhow::Result<Vec<PersonCount>> {
        let snapshot: Vec<Workflow> = self.workflows.iter().map(|r| r.value().clone()).collect();
        Ok(charts::person_counts(&snapshot, chrono::Utc::now()))
    }
}
