//! PostgreSQL integration tests
//!
//! These tests start a shared PostgreSQL container and are ignored by
//! default. Run them with Docker available:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use event_store::{
    AggregateId, EventEnvelope, EventStore, EventStoreError, EventStoreExt, PostgresEventStore,
    Version,
};
use futures_util::StreamExt;
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_events_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an empty events table
async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool).with_page_size(2)
}

fn create_test_event(
    aggregate_id: AggregateId,
    version: Version,
    event_type: &str,
) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Produce")
        .event_type(event_type)
        .version(version)
        .data_raw(serde_json::json!({"test": true}))
        .build()
        .unwrap()
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn append_and_read_back() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let event = create_test_event(aggregate_id, Version::first(), "ProduceRegistered");
    let version = store
        .append(aggregate_id, Version::initial(), vec![event.clone()])
        .await
        .unwrap();
    assert_eq!(version, Version::first());

    let events = store.load_events(aggregate_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, event.event_id);
    assert_eq!(events[0].event_data, event.event_data);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn reads_page_through_long_histories() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let events: Vec<_> = (1..=5)
        .map(|v| create_test_event(aggregate_id, Version::new(v), "Event"))
        .collect();
    store
        .append(aggregate_id, Version::initial(), events)
        .await
        .unwrap();

    let read: Vec<_> = store
        .read_events(aggregate_id, Version::new(1))
        .await
        .unwrap()
        .collect()
        .await;
    let versions: Vec<i64> = read
        .into_iter()
        .map(|e| e.unwrap().version.as_i64())
        .collect();
    assert_eq!(versions, vec![2, 3, 4, 5]);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn stale_expected_version_conflicts() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            aggregate_id,
            Version::initial(),
            vec![create_test_event(aggregate_id, Version::first(), "Event1")],
        )
        .await
        .unwrap();

    let result = store
        .append(
            aggregate_id,
            Version::initial(),
            vec![create_test_event(aggregate_id, Version::first(), "Event2")],
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
    assert_eq!(
        store.current_version(aggregate_id).await.unwrap(),
        Version::first()
    );
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn concurrent_appends_admit_exactly_one_writer() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let event = create_test_event(aggregate_id, Version::first(), "Racer");
            store
                .append(aggregate_id, Version::initial(), vec![event])
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(EventStoreError::ConcurrencyConflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
#[serial]
async fn stream_all_and_by_type_follow_commit_order() {
    let store = get_test_store().await;
    let id1 = AggregateId::new();
    let id2 = AggregateId::new();

    store
        .append(
            id1,
            Version::initial(),
            vec![create_test_event(id1, Version::first(), "ProduceRegistered")],
        )
        .await
        .unwrap();
    store
        .append(
            id2,
            Version::initial(),
            vec![create_test_event(id2, Version::first(), "ProduceRegistered")],
        )
        .await
        .unwrap();
    store
        .append(
            id1,
            Version::first(),
            vec![create_test_event(id1, Version::new(2), "ProducePriceUpdated")],
        )
        .await
        .unwrap();

    let all: Vec<_> = store.stream_all_events().await.unwrap().collect().await;
    let order: Vec<_> = all
        .into_iter()
        .map(|e| {
            let e = e.unwrap();
            (e.aggregate_id, e.version.as_i64())
        })
        .collect();
    assert_eq!(order, vec![(id1, 1), (id2, 1), (id1, 2)]);

    let registered = store.events_by_type("ProduceRegistered").await.unwrap();
    assert_eq!(registered.len(), 2);
}
