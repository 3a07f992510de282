//! Bootstrap SQL for the gateway tables.

use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};

/// Creates the workflow and user tables if they are missing.
pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sql_users (
    id              BIGSERIAL PRIMARY KEY,
    username        VARCHAR(150) NOT NULL UNIQUE,
    password        VARCHAR(128) NOT NULL,
    display         VARCHAR(50) NOT NULL DEFAULT '',
    role            VARCHAR(20) NOT NULL DEFAULT 'engineer',
    is_active       BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS sql_workflow (
    id              BIGSERIAL PRIMARY KEY,
    workflow_name   VARCHAR(50) NOT NULL,
    engineer        VARCHAR(50) NOT NULL,
    review_man      TEXT NOT NULL,
    create_time     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    finish_time     TIMESTAMPTZ,
    status          VARCHAR(50) NOT NULL DEFAULT 'pending',
    is_backup       BOOLEAN NOT NULL DEFAULT TRUE,
    review_content  TEXT NOT NULL,
    cluster_name    VARCHAR(50) NOT NULL,
    reviewok_time   TIMESTAMPTZ,
    sql_content     TEXT NOT NULL,
    execute_result  TEXT
);

CREATE INDEX IF NOT EXISTS idx_sql_workflow_status ON sql_workflow (status);
CREATE INDEX IF NOT EXISTS idx_sql_workflow_engineer ON sql_workflow (engineer);
CREATE INDEX IF NOT EXISTS idx_sql_workflow_created ON sql_workflow (create_time DESC);
"#;

/// Run the gateway migration.
pub async fn run_migration(conn: &mut AsyncPgConnection) -> anyhow::Result<()> {
    conn.batch_execute(MIGRATION_SQL)
        .await
        .map_err(|e| anyhow::anyhow!("gateway migration failed: {e}"))?;
    Ok(())
}
