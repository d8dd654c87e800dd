//! Repository for the `outputs` table.

use horde_core::types::DbId;
use sqlx::{SqliteConnection, SqlitePool};

use crate::models::output::{CreateOutput, OutputRow};

const COLUMNS: &str = "id, image, prompt, request, seed, model, worker_id, worker_name, \
     job_id, generation_id, starred, rated, censored, created_at";

const INSERT: &str = "INSERT INTO outputs \
        (image, prompt, request, seed, model, worker_id, worker_name, \
         job_id, generation_id, starred, rated, censored, created_at) \
     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Provides CRUD operations for stored outputs.
pub struct OutputRepo;

impl OutputRepo {
    /// Insert a new output, returning the created row.
    pub async fn create(pool: &SqlitePool, input: &CreateOutput) -> Result<OutputRow, sqlx::Error> {
        let query = format!("{INSERT} RETURNING {COLUMNS}");
        bind_create(sqlx::query_as::<_, OutputRow>(&query), input)
            .fetch_one(pool)
            .await
    }

    /// Insert several outputs in one transaction, preserving input order.
    pub async fn create_many(
        pool: &SqlitePool,
        inputs: &[CreateOutput],
    ) -> Result<Vec<OutputRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let rows = Self::insert_all(&mut tx, inputs).await?;
        tx.commit().await?;
        Ok(rows)
    }

    /// Insert several outputs on `conn`, typically inside an open transaction.
    pub async fn insert_all(
        conn: &mut SqliteConnection,
        inputs: &[CreateOutput],
    ) -> Result<Vec<OutputRow>, sqlx::Error> {
        let query = format!("{INSERT} RETURNING {COLUMNS}");
        let mut rows = Vec::with_capacity(inputs.len());
        for input in inputs {
            let row = bind_create(sqlx::query_as::<_, OutputRow>(&query), input)
                .fetch_one(&mut *conn)
                .await?;
            rows.push(row);
        }
        Ok(rows)
    }

    /// Find an output by its storage key.
    pub async fn find_by_id(pool: &SqlitePool, id: DbId) -> Result<Option<OutputRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM outputs WHERE id = ?");
        sqlx::query_as::<_, OutputRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All outputs in storage order.
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<OutputRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM outputs ORDER BY id ASC");
        sqlx::query_as::<_, OutputRow>(&query).fetch_all(pool).await
    }

    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM outputs")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Set the starred flag. Returns `true` if the row exists.
    pub async fn set_starred(pool: &SqlitePool, id: DbId, starred: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE outputs SET starred = ? WHERE id = ?")
            .bind(starred)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark an output as rated. Returns `true` if the row exists.
    pub async fn set_rated(pool: &SqlitePool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE outputs SET rated = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete one output. Returns `true` if a row was removed.
    pub async fn delete(pool: &SqlitePool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM outputs WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete several outputs in one transaction. Returns the number removed.
    pub async fn delete_many(pool: &SqlitePool, ids: &[DbId]) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query("DELETE FROM outputs WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        Ok(removed)
    }
}

type OutputQuery<'q> =
    sqlx::query::QueryAs<'q, sqlx::Sqlite, OutputRow, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_create<'q>(query: OutputQuery<'q>, input: &'q CreateOutput) -> OutputQuery<'q> {
    query
        .bind(&input.image)
        .bind(&input.prompt)
        .bind(&input.request)
        .bind(&input.seed)
        .bind(&input.model)
        .bind(&input.worker_id)
        .bind(&input.worker_name)
        .bind(&input.job_id)
        .bind(&input.generation_id)
        .bind(input.starred)
        .bind(input.rated)
        .bind(input.censored)
        .bind(input.created_at)
}
