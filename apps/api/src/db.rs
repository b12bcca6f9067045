use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const CREATE_USER_PROGRESS: &str = r#"
CREATE TABLE IF NOT EXISTS user_progress (
    user_id                  UUID PRIMARY KEY,
    points                   BIGINT NOT NULL DEFAULT 0 CHECK (points >= 0),
    level                    TEXT NOT NULL DEFAULT 'Eco Beginner',
    total_scans              BIGINT NOT NULL DEFAULT 0 CHECK (total_scans >= 0),
    correct_classifications  BIGINT NOT NULL DEFAULT 0 CHECK (correct_classifications >= 0),
    current_streak           INTEGER NOT NULL DEFAULT 0 CHECK (current_streak >= 0),
    longest_streak           INTEGER NOT NULL DEFAULT 0 CHECK (longest_streak >= current_streak),
    last_scan_date           DATE,
    badges                   JSONB NOT NULL DEFAULT '[]'::jsonb,
    version                  BIGINT NOT NULL DEFAULT 1,
    updated_at               TIMESTAMPTZ NOT NULL DEFAULT now(),
    CHECK (correct_classifications <= total_scans)
)
"#;

const CREATE_CLASSIFICATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS classifications (
    id                        UUID PRIMARY KEY,
    user_id                   UUID NOT NULL,
    category                  TEXT NOT NULL,
    confidence                DOUBLE PRECISION NOT NULL CHECK (confidence >= 0 AND confidence <= 100),
    recyclable                BOOLEAN NOT NULL,
    points_awarded            INTEGER NOT NULL CHECK (points_awarded >= 0),
    image_ref                 TEXT NOT NULL,
    created_at                TIMESTAMPTZ NOT NULL,
    feedback_is_correct       BOOLEAN,
    feedback_actual_category  TEXT,
    feedback_comment          TEXT,
    feedback_submitted_at     TIMESTAMPTZ
)
"#;

const CREATE_CLASSIFICATIONS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS classifications_user_created_idx
    ON classifications (user_id, created_at DESC)
"#;

/// Creates and returns a PostgreSQL connection pool with the schema in place.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");

    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Idempotent; safe on every startup.
async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for (name, ddl) in [
        ("user_progress", CREATE_USER_PROGRESS),
        ("classifications", CREATE_CLASSIFICATIONS),
        ("classifications_user_created_idx", CREATE_CLASSIFICATIONS_INDEX),
    ] {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .with_context(|| format!("Failed to create {name}"))?;
    }
    info!("Database schema ready");
    Ok(())
}
