//! SQLite-backed ledger: one row per participant, one transaction per mutation.
//!
//! Record rules are not duplicated in SQL. A mutation reads the current row,
//! applies the same [`ParticipantRecord`] transitions as the file-backed
//! ledger, and writes the row back inside a single transaction.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use tokio::sync::Mutex;

use roster_core::{Clock, Lang, ListLimit, ParticipantRecord, Participation, SourceTag, SystemClock, UserId};

use super::r#trait::{empty_lang_counts, LedgerError, LedgerResult, ParticipantLedger};
use crate::export::{format_timestamp, parse_timestamp};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS participants (
    seq               INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id           INTEGER NOT NULL UNIQUE,
    username          TEXT    NOT NULL DEFAULT '',
    full_name         TEXT    NOT NULL DEFAULT '',
    first_seen        TEXT    NOT NULL,
    last_participated TEXT    NOT NULL,
    source            TEXT    NOT NULL,
    lang              TEXT    NOT NULL DEFAULT 'ru'
)
"#;

const SELECT_ONE: &str = "SELECT user_id, username, full_name, first_seen, last_participated, source, lang \
     FROM participants WHERE user_id = ?1";

const SELECT_ALL: &str = "SELECT user_id, username, full_name, first_seen, last_participated, source, lang \
     FROM participants ORDER BY seq ASC";

const SELECT_RECENT: &str = "SELECT user_id, username, full_name, first_seen, last_participated, source, lang \
     FROM participants ORDER BY last_participated DESC, seq ASC LIMIT ?1";

pub struct SqliteLedger {
    pool: SqlitePool,
    /// Serializes read-modify-write cycles across pool connections.
    write_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger").finish_non_exhaustive()
    }
}

impl SqliteLedger {
    /// Connect using a `sqlite://` URL, creating the database if needed.
    pub async fn open(url: &str) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // Every connection to `:memory:` is a separate database.
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };
        Self::connect(options, max_connections, Arc::new(SystemClock)).await
    }

    pub async fn open_path(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true);
        Self::connect(options, 4, clock).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
        clock: Arc<dyn Clock>,
    ) -> LedgerResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;
        tracing::info!("participant ledger (sqlite) ready");

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
            clock,
        })
    }

    async fn fetch(tx: &mut Transaction<'_, Sqlite>, user_id: UserId) -> LedgerResult<Option<ParticipantRecord>> {
        let row = sqlx::query(SELECT_ONE)
            .bind(user_id.get())
            .fetch_optional(&mut **tx)
            .await?;
        row.map(|r| decode_row(&r)).transpose()
    }

    async fn store(tx: &mut Transaction<'_, Sqlite>, record: &ParticipantRecord) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO participants (user_id, username, full_name, first_seen, last_participated, source, lang)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (user_id) DO UPDATE SET
                username = excluded.username,
                full_name = excluded.full_name,
                last_participated = excluded.last_participated,
                source = excluded.source,
                lang = excluded.lang
            "#,
        )
        .bind(record.user_id.get())
        .bind(&record.username)
        .bind(&record.full_name)
        .bind(format_timestamp(&record.first_seen))
        .bind(format_timestamp(&record.last_participated))
        .bind(record.source.as_str())
        .bind(record.lang.as_str())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Load-modify-store one record in a single transaction.
    async fn modify(
        &self,
        user_id: UserId,
        op: impl FnOnce(Option<ParticipantRecord>, DateTime<Utc>) -> ParticipantRecord + Send,
    ) -> LedgerResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let existing = Self::fetch(&mut tx, user_id).await?;
        let created = existing.is_none();
        let record = op(existing, self.clock.now());
        Self::store(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(created)
    }
}

fn decode_row(row: &SqliteRow) -> LedgerResult<ParticipantRecord> {
    let user_id = UserId::new(row.try_get::<i64, _>("user_id")?);
    let first_seen_raw: String = row.try_get("first_seen")?;
    let last_raw: String = row.try_get("last_participated")?;
    let source_raw: String = row.try_get("source")?;
    let lang_raw: Option<String> = row.try_get("lang")?;

    let first_seen = parse_timestamp(&first_seen_raw)
        .ok_or_else(|| LedgerError::corrupt(format!("user {user_id}: bad first_seen {first_seen_raw:?}")))?;
    let last_participated = parse_timestamp(&last_raw)
        .ok_or_else(|| LedgerError::corrupt(format!("user {user_id}: bad last_participated {last_raw:?}")))?;
    let source = SourceTag::new(source_raw).map_err(|e| LedgerError::corrupt(format!("user {user_id}: {e}")))?;

    Ok(ParticipantRecord {
        user_id,
        username: row.try_get("username")?,
        full_name: row.try_get("full_name")?,
        first_seen,
        last_participated: last_participated.max(first_seen),
        source,
        lang: Lang::or_default(lang_raw.as_deref()),
    })
}

#[async_trait]
impl ParticipantLedger for SqliteLedger {
    async fn upsert(&self, event: Participation) -> LedgerResult<()> {
        let created = self
            .modify(event.user_id, |existing, now| match existing {
                Some(mut rec) => {
                    rec.apply_participation(&event, now);
                    rec
                }
                None => ParticipantRecord::from_participation(&event, now),
            })
            .await?;
        tracing::debug!(user_id = %event.user_id, source = %event.source, created, "participant upserted");
        Ok(())
    }

    async fn get_lang(&self, user_id: UserId) -> LedgerResult<Lang> {
        let lang: Option<Option<String>> = sqlx::query_scalar("SELECT lang FROM participants WHERE user_id = ?1")
            .bind(user_id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(Lang::or_default(lang.flatten().as_deref()))
    }

    async fn set_lang(&self, user_id: UserId, lang: &str) -> LedgerResult<()> {
        let lang = Lang::or_default(Some(lang));
        let created = self
            .modify(user_id, |existing, now| match existing {
                Some(mut rec) => {
                    rec.apply_lang(lang);
                    rec
                }
                None => ParticipantRecord::from_lang_change(user_id, lang, now),
            })
            .await?;
        tracing::debug!(user_id = %user_id, lang = %lang, created, "language preference stored");
        Ok(())
    }

    async fn count(&self) -> LedgerResult<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    async fn count_by_lang(&self) -> LedgerResult<BTreeMap<Lang, usize>> {
        let rows = sqlx::query("SELECT lang, COUNT(*) AS n FROM participants GROUP BY lang")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = empty_lang_counts();
        for row in rows {
            let lang: Option<String> = row.try_get("lang")?;
            let n: i64 = row.try_get("n")?;
            *counts.entry(Lang::or_default(lang.as_deref())).or_insert(0) += usize::try_from(n).unwrap_or(0);
        }
        Ok(counts)
    }

    async fn list_recent(&self, limit: ListLimit) -> LedgerResult<Vec<ParticipantRecord>> {
        let limit = i64::try_from(limit.get()).unwrap_or(i64::MAX);
        let rows = sqlx::query(SELECT_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn snapshot(&self) -> LedgerResult<Vec<ParticipantRecord>> {
        let rows = sqlx::query(SELECT_ALL)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode_row).collect()
    }

    async fn reset(&self) -> LedgerResult<()> {
        let _guard = self.write_lock.lock().await;
        sqlx::query("DELETE FROM participants").execute(&self.pool).await?;
        tracing::info!("participant ledger (sqlite) reset");
        Ok(())
    }
}
