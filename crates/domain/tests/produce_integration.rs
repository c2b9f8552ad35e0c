//! Integration tests for the produce write side.
//!
//! Commands go through the bus into an in-memory event store, and the
//! aggregate is reconstructed from what was actually persisted.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    Aggregate, CommandBus, DeactivateProduce, DomainError, ErrorKind, ErrorResponse, Price,
    ProduceAggregate, ProduceCommand, ProduceCommandHandler, ProduceError, ProduceStatus,
    RegisterProduce, RetryPolicy, UpdatePrice, UpdateQuality, register_produce_handlers,
};
use event_store::{EventStore, EventStoreExt, InMemoryEventStore, Version};

struct Harness {
    store: InMemoryEventStore,
    bus: CommandBus<ProduceCommand>,
}

fn setup() -> Harness {
    let store = InMemoryEventStore::new();
    let handler = Arc::new(ProduceCommandHandler::new(store.clone()));
    let mut bus = CommandBus::new();
    register_produce_handlers(&mut bus, handler).unwrap();
    Harness { store, bus }
}

async fn register(harness: &Harness) -> AggregateId {
    let cmd = RegisterProduce::new("farmer-1", "CA", "Grade A", Price::new(150));
    let id = cmd.produce_id;
    harness.bus.send(cmd.into()).await.unwrap();
    id
}

async fn load(harness: &Harness, id: AggregateId) -> ProduceAggregate {
    let history = harness.store.load_events(id).await.unwrap();
    ProduceAggregate::rebuild(history).unwrap()
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn registration() {
        let harness = setup();
        let id = register(&harness).await;

        let produce = load(&harness, id).await;
        assert_eq!(produce.version(), Version::first());
        assert_eq!(produce.status(), ProduceStatus::Registered);
        assert_eq!(produce.current_price(), Price::new(150));
    }

    #[tokio::test]
    async fn negative_price_is_rejected() {
        let harness = setup();
        let id = register(&harness).await;

        let err = harness
            .bus
            .send(UpdatePrice::new(id, Price::new(-5), "farmer-1").into())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidPrice);
        assert_eq!(load(&harness, id).await.version(), Version::first());
    }

    #[tokio::test]
    async fn foreign_updater_is_rejected() {
        let harness = setup();
        let id = register(&harness).await;

        let err = harness
            .bus
            .send(UpdateQuality::new(id, "Organic", "inspector-9").into())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        let produce = load(&harness, id).await;
        assert_eq!(produce.version(), Version::first());
        assert_eq!(produce.quality(), "Grade A");
        assert_eq!(harness.store.event_count().await, 1);
    }

    #[tokio::test]
    async fn owner_updates_quality() {
        let harness = setup();
        let id = register(&harness).await;

        let outcome = harness
            .bus
            .send(UpdateQuality::new(id, "Organic", "farmer-1").into())
            .await
            .unwrap();

        assert_eq!(outcome.version, Version::new(2));
        let produce = load(&harness, id).await;
        assert_eq!(produce.quality(), "Organic");
    }

    #[tokio::test]
    async fn deactivated_produce_rejects_price_changes() {
        let harness = setup();
        let id = register(&harness).await;

        harness
            .bus
            .send(DeactivateProduce::new(id).into())
            .await
            .unwrap();

        let err = harness
            .bus
            .send(UpdatePrice::new(id, Price::new(200), "farmer-1").into())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let produce = load(&harness, id).await;
        assert_eq!(produce.version(), Version::new(2));
        assert_eq!(produce.status(), ProduceStatus::Inactive);
    }
}

mod properties {
    use super::*;

    #[tokio::test]
    async fn versions_increase_by_one_from_one() {
        let harness = setup();
        let id = register(&harness).await;
        for price in [160, 170, 180] {
            harness
                .bus
                .send(UpdatePrice::new(id, Price::new(price), "farmer-1").into())
                .await
                .unwrap();
        }

        let versions: Vec<i64> = harness
            .store
            .load_events(id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.version.as_i64())
            .collect();
        assert_eq!(versions, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn replay_is_deterministic() {
        let harness = setup();
        let id = register(&harness).await;
        harness
            .bus
            .send(UpdateQuality::new(id, "Organic", "farmer-1").into())
            .await
            .unwrap();
        harness
            .bus
            .send(UpdatePrice::new(id, Price::new(210), "farmer-1").into())
            .await
            .unwrap();

        let first = load(&harness, id).await;
        let second = load(&harness, id).await;

        assert_eq!(first, second);
        assert_eq!(first.version(), Version::new(3));
        assert_eq!(first.current_price(), Price::new(210));
    }

    #[tokio::test]
    async fn concurrent_commands_on_one_produce_all_land() {
        let store = InMemoryEventStore::new();
        let handler = Arc::new(
            ProduceCommandHandler::new(store.clone()).with_retry_policy(RetryPolicy::new(20)),
        );
        let mut bus = CommandBus::new();
        register_produce_handlers(&mut bus, handler).unwrap();
        let bus = Arc::new(bus);

        let cmd = RegisterProduce::new("farmer-1", "CA", "Grade A", Price::new(150));
        let id = cmd.produce_id;
        bus.send(cmd.into()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..5 {
            let bus = bus.clone();
            handles.push(tokio::spawn(async move {
                bus.send(UpdatePrice::new(id, Price::new(200 + i), "farmer-1").into())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.current_version(id).await.unwrap(), Version::new(6));
    }
}

mod errors {
    use super::*;

    #[tokio::test]
    async fn absent_produce_is_not_found() {
        let harness = setup();

        let err = harness
            .bus
            .send(UpdateQuality::new(AggregateId::new(), "Organic", "farmer-1").into())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
        let response = ErrorResponse::from(&err);
        assert_eq!(response.kind, ErrorKind::NotFound);
        assert!(!response.retryable);
    }

    #[tokio::test]
    async fn unrouted_kind_is_reported() {
        let bus: CommandBus<ProduceCommand> = CommandBus::new();

        let err = bus
            .send(DeactivateProduce::new(AggregateId::new()).into())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoHandlerRegistered);
        assert!(err.to_string().contains("DeactivateProduce"));
    }

    #[tokio::test]
    async fn wire_command_round_trips_through_bus() {
        let harness = setup();
        let id = register(&harness).await;

        let command: ProduceCommand = serde_json::from_value(serde_json::json!({
            "kind": "UpdatePrice",
            "produceId": id.to_string(),
            "newPrice": 175,
            "updaterId": "farmer-1"
        }))
        .unwrap();
        harness.bus.send(command).await.unwrap();

        assert_eq!(load(&harness, id).await.current_price(), Price::new(175));
    }

    #[test]
    fn rebuild_of_nothing_is_empty_history() {
        let err = DomainError::from(ProduceAggregate::rebuild(vec![]).unwrap_err());
        assert_eq!(err.kind(), ErrorKind::EmptyHistory);
        assert!(matches!(err, DomainError::Produce(ProduceError::EmptyHistory)));
    }
}
