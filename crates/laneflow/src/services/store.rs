use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::jobs::error_codes::JobError;
use crate::services::{Company, NewDemoRecord, NewQaRecord, NewVideoRecord, RecordStore};

/// Postgres-backed record store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(what: &'static str) -> impl FnOnce(sqlx::Error) -> JobError {
    move |e| JobError::persistence(format!("{what}: {e}"))
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_company(&self, name: &str) -> Result<Option<Company>, JobError> {
        sqlx::query_as::<_, Company>(
            r#"
            SELECT id, name
            FROM companies
            WHERE name = $1
            "#,
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("find company"))
    }

    async fn upsert_company(&self, name: &str) -> Result<Company, JobError> {
        sqlx::query_as::<_, Company>(
            r#"
            INSERT INTO companies (id, name)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name.trim())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("upsert company"))
    }

    async fn insert_video(&self, rec: &NewVideoRecord) -> Result<Uuid, JobError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO videos (
                id,
                company_id,
                video_url,
                is_youtube,
                upstream_video_id,
                transcript_chunks
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(rec.company_id)
        .bind(&rec.video_url)
        .bind(rec.is_youtube)
        .bind(&rec.upstream_video_id)
        .bind(i32::try_from(rec.transcript_chunks).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await
        .map_err(db_err("insert video"))?;

        Ok(id)
    }

    async fn insert_demo(&self, rec: &NewDemoRecord) -> Result<Uuid, JobError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO demos (id, company_id, video_id, title)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(rec.company_id)
        .bind(rec.video_id)
        .bind(&rec.title)
        .execute(&self.pool)
        .await
        .map_err(db_err("insert demo"))?;

        Ok(id)
    }

    async fn insert_qa(&self, rec: &NewQaRecord) -> Result<Uuid, JobError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO qa_interactions (
                id,
                company_id,
                interaction_id,
                question,
                answer,
                confidence,
                sources
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(id)
        .bind(rec.company_id)
        .bind(&rec.interaction_id)
        .bind(&rec.question)
        .bind(&rec.answer)
        .bind(rec.confidence)
        .bind(Json(&rec.sources))
        .execute(&self.pool)
        .await
        .map_err(db_err("insert qa interaction"))?;

        Ok(id)
    }
}
