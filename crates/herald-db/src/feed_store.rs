use chrono::{DateTime, Utc};
use herald_core::error::AppError;
use herald_core::models::{Entry, EntryProbe, Feed, NewEntry, NewFeed};
use herald_core::traits::{FeedStore, FeedTransaction};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

const FEED_COLUMNS: &str = "id, title, feed_url, description, last_update, last_checked, \
     next_check, last_status, number_of_errors, is_active, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, feed_id, title, url, guid, content, publish_date, created_at";

fn db_err(e: sqlx::Error) -> AppError {
    AppError::DatabaseError(e.to_string())
}

/// Feed persistence in PostgreSQL.
#[derive(Clone)]
pub struct PgFeedStore {
    pool: PgPool,
}

impl PgFeedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl FeedStore for PgFeedStore {
    type Tx = PgFeedTransaction;

    async fn begin(&self) -> Result<PgFeedTransaction, AppError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(PgFeedTransaction { tx })
    }

    async fn select_feeds_due(&self, now: DateTime<Utc>) -> Result<Vec<Feed>, AppError> {
        let rows = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE next_check <= $1 ORDER BY next_check ASC"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

/// An open PostgreSQL transaction. Rolled back on drop unless committed.
pub struct PgFeedTransaction {
    tx: Transaction<'static, Postgres>,
}

impl FeedTransaction for PgFeedTransaction {
    async fn find_feed_by(
        &mut self,
        title: &str,
        feed_url: &str,
    ) -> Result<Option<Feed>, AppError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE title = $1 AND feed_url = $2"
        ))
        .bind(title)
        .bind(feed_url)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn find_feed_by_url(&mut self, feed_url: &str) -> Result<Option<Feed>, AppError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds WHERE feed_url = $1"
        ))
        .bind(feed_url)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn lock_feed_if_due(
        &mut self,
        feed_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Feed>, AppError> {
        // SKIP LOCKED: a feed held by another worker is simply not returned.
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds \
             WHERE id = $1 AND next_check <= $2 \
             FOR UPDATE SKIP LOCKED"
        ))
        .bind(feed_id)
        .bind(now)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn insert_feed(&mut self, feed: &NewFeed) -> Result<Feed, AppError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            INSERT INTO feeds (title, feed_url, description, last_update, last_checked, next_check, last_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (feed_url) DO NOTHING
            RETURNING {FEED_COLUMNS}
            "#
        ))
        .bind(&feed.title)
        .bind(&feed.feed_url)
        .bind(&feed.description)
        .bind(feed.last_update)
        .bind(feed.last_checked)
        .bind(feed.next_check)
        .bind(feed.last_status.map(i32::from))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(Into::into).ok_or_else(|| {
            AppError::PersistenceConflict(format!("feed_url '{}' already exists", feed.feed_url))
        })
    }

    async fn update_feed(&mut self, feed: &Feed) -> Result<Feed, AppError> {
        let row = sqlx::query_as::<_, FeedRow>(&format!(
            r#"
            UPDATE feeds
            SET title = $2,
                description = $3,
                last_update = $4,
                last_checked = $5,
                next_check = $6,
                last_status = $7,
                number_of_errors = $8,
                is_active = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {FEED_COLUMNS}
            "#
        ))
        .bind(feed.id)
        .bind(&feed.title)
        .bind(&feed.description)
        .bind(feed.last_update)
        .bind(feed.last_checked)
        .bind(feed.next_check)
        .bind(feed.last_status.map(i32::from))
        .bind(i32::try_from(feed.number_of_errors).unwrap_or(i32::MAX))
        .bind(feed.is_active)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;

        row.map(Into::into)
            .ok_or_else(|| AppError::DatabaseError(format!("feed {} not found", feed.id)))
    }

    async fn find_entry_matching(
        &mut self,
        feed_id: Uuid,
        probe: &EntryProbe,
    ) -> Result<Option<Entry>, AppError> {
        if probe.is_empty() {
            return Ok(None);
        }

        let mut query = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE feed_id = "
        ));
        query.push_bind(feed_id);
        for (key, value) in probe.fields() {
            query
                .push(" AND ")
                .push(key.as_str())
                .push(" = ")
                .push_bind(value.clone());
        }
        query.push(" ORDER BY created_at ASC, id ASC LIMIT 1");

        let row = query
            .build_query_as::<EntryRow>()
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;

        Ok(row.map(Into::into))
    }

    async fn insert_entry(&mut self, entry: &NewEntry) -> Result<Entry, AppError> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            r#"
            INSERT INTO entries (feed_id, title, url, guid, content, publish_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(entry.feed_id)
        .bind(&entry.title)
        .bind(&entry.url)
        .bind(&entry.guid)
        .bind(&entry.content)
        .bind(entry.publish_date)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await.map_err(db_err)
    }
}

// -- Internal row types for sqlx deserialization --

#[derive(sqlx::FromRow)]
struct FeedRow {
    id: Uuid,
    title: String,
    feed_url: String,
    description: String,
    last_update: Option<DateTime<Utc>>,
    last_checked: Option<DateTime<Utc>>,
    next_check: Option<DateTime<Utc>>,
    last_status: Option<i32>,
    number_of_errors: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            title: row.title,
            feed_url: row.feed_url,
            description: row.description,
            last_update: row.last_update,
            last_checked: row.last_checked,
            next_check: row.next_check,
            last_status: row.last_status.and_then(|s| u16::try_from(s).ok()),
            number_of_errors: u32::try_from(row.number_of_errors).unwrap_or(0),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    feed_id: Uuid,
    title: Option<String>,
    url: Option<String>,
    guid: Option<String>,
    content: String,
    publish_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: row.id,
            feed_id: row.feed_id,
            title: row.title,
            url: row.url,
            guid: row.guid,
            content: row.content,
            publish_date: row.publish_date,
            created_at: row.created_at,
        }
    }
}
