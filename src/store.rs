//! The bot's long-term memory: a small sqlite database holding the jokes
//! table and one info table of named odds and ends. The pool is opened once
//! at session start and lives for the whole process; process exit is the
//! only close.
use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;

/// Info-table key for the timestamp of the most recent run.
pub const LASTRUN: &str = "lastrun";

/// One joke row. `used` counts how many times we've told it, so the whole
/// table gets a turn over time.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Joke {
    pub id: i64,
    pub joke: String,
    pub used: i64,
}

/// Storage handle. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open an existing database. The file must already exist: seeding is a
    /// deployment step, so a missing path means the deployment is broken and
    /// the caller should give up loudly. This check is what makes that
    /// failure testable apart from actual process exit.
    pub async fn open(path: impl AsRef<Path>) -> Result<Store> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!(
                "Database path \"{}\" does not exist or is not readable.",
                path.display()
            );
        }
        let options = SqliteConnectOptions::new().filename(path);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Unable to open sqlite database @ {}", path.display()))?;
        Ok(Store { pool })
    }

    /// Create the database file if needed and make sure the schema exists.
    /// The seed tool goes through here; the bot itself never touches schema.
    pub async fn create(path: impl AsRef<Path>) -> Result<Store> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Unable to create sqlite database @ {}", path.display()))?;
        let store = Store { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// An in-memory store with schema applied. Tests run on this.
    pub async fn in_memory() -> Result<Store> {
        // One connection, or every pool checkout would see a fresh empty db.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Store { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS jokes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                joke TEXT NOT NULL,
                used INTEGER NOT NULL DEFAULT 0
            )",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS info (
                name TEXT PRIMARY KEY,
                val TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The least-told joke, ties broken uniformly at random.
    pub async fn random_least_used(&self) -> Result<Joke> {
        let joke: Option<Joke> =
            sqlx::query_as("SELECT id, joke, used FROM jokes ORDER BY used ASC, RANDOM() LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        joke.ok_or_else(|| anyhow::anyhow!("the jokes table is empty; has SEED been run?"))
    }

    /// Record that we've told a joke.
    pub async fn mark_used(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE jokes SET used = used + 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Add one joke with a zeroed counter. Seed-tool helper.
    pub async fn add_joke(&self, joke: &str) -> Result<()> {
        sqlx::query("INSERT INTO jokes (joke, used) VALUES (?1, 0)")
            .bind(joke)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Point read of an info record by key.
    pub async fn info_get(&self, name: &str) -> Result<Option<String>> {
        let val: Option<String> = sqlx::query_scalar("SELECT val FROM info WHERE name = ?1 LIMIT 1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(val)
    }

    pub async fn info_insert(&self, name: &str, val: &str) -> Result<()> {
        sqlx::query("INSERT INTO info (name, val) VALUES (?1, ?2)")
            .bind(name)
            .bind(val)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn info_update(&self, name: &str, val: &str) -> Result<()> {
        sqlx::query("UPDATE info SET val = ?1 WHERE name = ?2")
            .bind(val)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
