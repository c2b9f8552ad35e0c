use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use futures_util::stream;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Result, Version,
    store::{EventStore, EventStream, validate_events_for_append},
};

const DEFAULT_PAGE_SIZE: i64 = 500;

const SELECT_COLUMNS: &str =
    "seq, id, event_type, aggregate_id, aggregate_type, version, timestamp, event_data, metadata";

/// PostgreSQL-backed event store implementation.
///
/// Appends for one aggregate are serialised with a transaction-scoped
/// advisory lock; the `unique_aggregate_version` constraint backs it up.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    page_size: i64,
}

/// Which slice of the table a paged read walks.
#[derive(Debug, Clone, Copy)]
enum Scope {
    /// One aggregate, cursor is the version.
    Aggregate(AggregateId),
    /// Every event, cursor is the global sequence number.
    ///
    /// `seq` is assigned at insert, not at commit, so a page can pass over
    /// a row whose transaction is still open. Such rows are not revisited.
    All,
}

struct Cursor {
    pool: PgPool,
    scope: Scope,
    after: i64,
    page_size: i64,
    buffer: VecDeque<(i64, EventEnvelope)>,
    exhausted: bool,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets how many rows a streaming read fetches per round trip.
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_event(row: &PgRow) -> Result<(i64, EventEnvelope)> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;

        let event = EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            event_data: row.try_get("event_data")?,
            timestamp: row.try_get("timestamp")?,
            version: Version::new(row.try_get("version")?),
            metadata,
        };
        Ok((row.try_get("seq")?, event))
    }

    fn paged(&self, scope: Scope, after: i64) -> EventStream {
        let cursor = Cursor {
            pool: self.pool.clone(),
            scope,
            after,
            page_size: self.page_size,
            buffer: VecDeque::new(),
            exhausted: false,
        };

        let stream = stream::unfold(cursor, |mut cursor| async move {
            loop {
                if let Some((position, event)) = cursor.buffer.pop_front() {
                    cursor.after = position;
                    return Some((Ok(event), cursor));
                }
                if cursor.exhausted {
                    return None;
                }
                match cursor.fetch_page().await {
                    Ok(page) => {
                        cursor.exhausted = (page.len() as i64) < cursor.page_size;
                        cursor.buffer.extend(page);
                    }
                    Err(e) => {
                        cursor.exhausted = true;
                        return Some((Err(e), cursor));
                    }
                }
            }
        });

        Box::pin(stream)
    }
}

impl Cursor {
    async fn fetch_page(&self) -> Result<Vec<(i64, EventEnvelope)>> {
        let rows = match self.scope {
            Scope::Aggregate(aggregate_id) => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM events \
                     WHERE aggregate_id = $1 AND version > $2 \
                     ORDER BY version ASC LIMIT $3"
                );
                sqlx::query(&sql)
                    .bind(aggregate_id.as_uuid())
                    .bind(self.after)
                    .bind(self.page_size)
                    .fetch_all(&self.pool)
                    .await?
            }
            Scope::All => {
                let sql = format!(
                    "SELECT {SELECT_COLUMNS} FROM events \
                     WHERE seq > $1 ORDER BY seq ASC LIMIT $2"
                );
                sqlx::query(&sql)
                    .bind(self.after)
                    .bind(self.page_size)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(|row| {
                let (seq, event) = PostgresEventStore::row_to_event(row)?;
                let position = match self.scope {
                    Scope::Aggregate(_) => event.version.as_i64(),
                    Scope::All => seq,
                };
                Ok((position, event))
            })
            .collect()
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(
        &self,
        aggregate_id: AggregateId,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Result<Version> {
        validate_events_for_append(aggregate_id, expected_version, &events)?;

        let mut tx = self.pool.begin().await?;

        // Serialises check-then-insert per aggregate until the transaction ends
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(aggregate_id.to_string())
            .execute(&mut *tx)
            .await?;

        let current: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        let actual = Version::new(current.unwrap_or(0));

        if actual != expected_version {
            tracing::debug!(%aggregate_id, %expected_version, %actual, "append rejected");
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        for event in &events {
            let metadata_json = serde_json::to_value(&event.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO events (id, event_type, aggregate_id, aggregate_type, version, timestamp, event_data, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(event.event_id.as_uuid())
            .bind(&event.event_type)
            .bind(event.aggregate_id.as_uuid())
            .bind(&event.aggregate_type)
            .bind(event.version.as_i64())
            .bind(event.timestamp)
            .bind(&event.event_data)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_aggregate_version")
                {
                    return EventStoreError::ConcurrencyConflict {
                        aggregate_id,
                        expected: expected_version,
                        actual: event.version,
                    };
                }
                EventStoreError::Database(e)
            })?;
        }

        tx.commit().await?;
        metrics::counter!("events_appended").increment(events.len() as u64);

        Ok(expected_version.advanced_by(events.len()))
    }

    async fn read_events(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<EventStream> {
        Ok(self.paged(Scope::Aggregate(aggregate_id), from_version.as_i64()))
    }

    async fn current_version(&self, aggregate_id: AggregateId) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;

        Ok(Version::new(version.unwrap_or(0)))
    }

    async fn events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM events WHERE event_type = $1 ORDER BY seq ASC");
        let rows = sqlx::query(&sql)
            .bind(event_type)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Self::row_to_event(row).map(|(_, event)| event))
            .collect()
    }

    /// Pages through the log by `seq`.
    ///
    /// Appends that commit while the stream is open may be missed when a
    /// later `seq` committed first. Use this for catch-up at startup; live
    /// delivery goes through the publisher, and the projection processor
    /// fills per-aggregate gaps from `read_events`.
    async fn stream_all_events(&self) -> Result<EventStream> {
        Ok(self.paged(Scope::All, 0))
    }
}
