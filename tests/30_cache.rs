mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::{json, Value};

use common::FakeBackend;
use lendflow_client::cache::{
    CacheStatus, Invalidation, MutationIntent, MutationState, OptimisticUpdate, QueryOptions,
    ResourceKey,
};
use lendflow_client::ClientError;

fn bank_ids(data: Option<&Value>) -> Vec<u64> {
    data.and_then(|d| d["banks"].as_array())
        .map(|banks| banks.iter().filter_map(|b| b["id"].as_u64()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn concurrent_reads_share_one_request() -> Result<()> {
    common::init_tracing();
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    backend.state.set_delay(Some(Duration::from_millis(150)));

    let cache = app.cache();
    let (a, b, c) = tokio::join!(
        cache.read("/api/banks"),
        cache.read("/api/banks"),
        cache.read(ResourceKey::new("api/banks/")),
    );

    assert_eq!(backend.state.hits("GET /api/banks"), 1);
    for entry in [&a, &b, &c] {
        assert_eq!(entry.status, CacheStatus::Success);
        assert_eq!(bank_ids(entry.data()), vec![1, 2, 3]);
    }
    Ok(())
}

#[tokio::test]
async fn fresh_entries_are_served_without_network() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    cache.read("/api/banks").await;
    let second = cache.read("/api/banks").await;
    assert!(second.is_success());
    assert_eq!(backend.state.hits("GET /api/banks"), 1);

    let forced = cache
        .read_with("/api/banks", QueryOptions::default().stale_after(Duration::ZERO))
        .await;
    assert!(forced.is_success());
    assert_eq!(backend.state.hits("GET /api/banks"), 2);
    Ok(())
}

#[tokio::test]
async fn filters_are_part_of_the_key() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    let all = cache.read("/api/leads").await;
    let new = cache
        .read(ResourceKey::new("/api/leads").with_filter("status", "new"))
        .await;
    let new_again = cache.read("/api/leads?status=new").await;

    assert_eq!(all.data().map(|d| d["total"].clone()), Some(json!(2)));
    assert_eq!(new.data().map(|d| d["total"].clone()), Some(json!(1)));
    assert!(new_again.is_success());
    assert_eq!(backend.state.hits("GET /api/leads"), 2);
    Ok(())
}

#[tokio::test]
async fn invalidation_forces_refetch_without_fetching_itself() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    cache.read("/api/leads").await;
    cache.read("/api/leads?status=new").await;
    cache.read("/api/banks").await;
    assert_eq!(backend.state.hits("GET /api/leads"), 2);

    assert_eq!(cache.invalidate(Invalidation::prefix("/api/leads")), 2);
    assert_eq!(backend.state.hits("GET /api/leads"), 2);
    assert!(cache.peek(&ResourceKey::new("/api/leads")).map(|e| e.stale).unwrap_or(false));
    assert!(!cache.peek(&ResourceKey::new("/api/banks")).map(|e| e.stale).unwrap_or(true));

    cache.read("/api/leads").await;
    assert_eq!(backend.state.hits("GET /api/leads"), 3);
    cache.read("/api/banks").await;
    assert_eq!(backend.state.hits("GET /api/banks"), 1);
    Ok(())
}

#[tokio::test]
async fn read_after_invalidation_waits_for_the_running_fetch() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache().clone();
    backend.state.set_delay(Some(Duration::from_millis(150)));

    let first = tokio::spawn({
        let cache = cache.clone();
        async move { cache.read("/api/banks").await }
    });
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(cache.invalidate(ResourceKey::new("/api/banks")), 1);

    let second = cache.read("/api/banks").await;
    let first = first.await?;

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(backend.state.hits("GET /api/banks"), 2);
    assert_eq!(backend.state.peak_in_flight(), 1);
    assert_eq!(
        cache.peek(&ResourceKey::new("/api/banks")).map(|e| e.stale),
        Some(false)
    );
    Ok(())
}

#[tokio::test]
async fn successful_mutation_invalidates_declared_keys() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    cache.read("/api/banks").await;
    let intent = MutationIntent::post("/api/banks", json!({"name": "Axis Bank"}))
        .invalidates_prefix("/api/banks");
    let created = cache.mutate(intent).await?;
    assert_eq!(created["id"], json!(4));

    let after = cache.read("/api/banks").await;
    assert_eq!(backend.state.hits("GET /api/banks"), 2);
    assert_eq!(bank_ids(after.data()), vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn failed_read_keeps_last_good_data() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    let first = cache.read("/api/banks").await;
    assert!(first.is_success());

    backend
        .state
        .fail("GET /api/banks", 500, json!({"message": "Database unavailable"}));
    cache.invalidate(ResourceKey::new("/api/banks"));
    let failed = cache.read("/api/banks").await;

    assert_eq!(failed.status, CacheStatus::Error);
    assert_eq!(bank_ids(failed.data()), vec![1, 2, 3]);
    assert_eq!(failed.error.as_ref().and_then(ClientError::status), Some(500));
    assert!(cache.fetch("/api/banks").await.is_err());

    backend.state.recover("GET /api/banks");
    let recovered = cache.read("/api/banks").await;
    assert!(recovered.is_success());
    assert!(recovered.error.is_none());
    Ok(())
}

#[tokio::test]
async fn failed_optimistic_mutation_rolls_back() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();
    let key = ResourceKey::new("/api/banks");

    let before = cache.read(key.clone()).await;
    backend
        .state
        .fail("DELETE /api/banks/2", 409, json!({"message": "Bank has active loans"}));

    let update = OptimisticUpdate::new(key.clone(), |data| {
        let mut data = data.cloned().unwrap_or(Value::Null);
        if let Some(banks) = data["banks"].as_array_mut() {
            banks.retain(|bank| bank["id"] != json!(2));
        }
        data
    });
    let intent = MutationIntent::delete("/api/banks/2")
        .invalidates_prefix("/api/banks")
        .optimistic(update);

    let err = cache.mutate(intent).await.unwrap_err();
    assert_eq!(err.user_message(), "Bank has active loans");

    let after = cache.peek(&key).expect("entry kept");
    assert_eq!(after.data, before.data);
    assert_eq!(after.status, CacheStatus::Success);
    assert_eq!(backend.state.hits("GET /api/banks"), 1);
    Ok(())
}

#[tokio::test]
async fn mutation_handle_reports_state() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;

    let mutation = app
        .cache()
        .execute(MutationIntent::post("/api/banks", json!({"name": "Kotak"})));
    match mutation.settled().await {
        MutationState::Committed(value) => assert_eq!(value["name"], json!("Kotak")),
        other => panic!("expected commit, got {:?}", other),
    }

    backend.state.fail("POST /api/banks", 422, json!({"message": "Duplicate bank"}));
    let failed = app
        .cache()
        .execute(MutationIntent::post("/api/banks", json!({"name": "Kotak"})))
        .settled()
        .await;
    assert_eq!(failed.error().and_then(ClientError::status), Some(422));
    Ok(())
}

#[tokio::test]
async fn dropped_reader_does_not_abort_fetch() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();
    backend.state.set_delay(Some(Duration::from_millis(200)));

    let timed_out = tokio::time::timeout(Duration::from_millis(20), cache.read("/api/banks")).await;
    assert!(timed_out.is_err());
    assert_eq!(
        cache.peek(&ResourceKey::new("/api/banks")).map(|e| e.status),
        Some(CacheStatus::Loading)
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    let entry = cache.peek(&ResourceKey::new("/api/banks")).expect("entry");
    assert_eq!(entry.status, CacheStatus::Success);
    assert_eq!(bank_ids(entry.data()), vec![1, 2, 3]);

    backend.state.set_delay(None);
    cache.read("/api/banks").await;
    assert_eq!(backend.state.hits("GET /api/banks"), 1);
    Ok(())
}

#[tokio::test]
async fn polling_refreshes_until_cancelled() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    cache.read("/api/telecallers").await;
    let handle = cache.poll("/api/telecallers", Duration::from_millis(50));
    assert!(handle.is_active());

    tokio::time::sleep(Duration::from_millis(280)).await;
    let polled = backend.state.hits("GET /api/telecallers");
    assert!(polled >= 3, "expected several polls, saw {}", polled);

    handle.cancel();
    tokio::time::sleep(Duration::from_millis(60)).await;
    let settled = backend.state.hits("GET /api/telecallers");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.state.hits("GET /api/telecallers"), settled);
    Ok(())
}

#[tokio::test]
async fn dispose_stops_polls_and_evicts() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    cache.read("/api/leads").await;
    let handle = cache.poll("/api/leads", Duration::from_millis(40));
    let _ = cache
        .read_with("/api/banks", QueryOptions::default().refresh_every(Duration::from_millis(40)))
        .await;

    app.dispose();
    assert!(cache.is_empty());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!handle.is_active());

    let leads = backend.state.hits("GET /api/leads");
    let banks = backend.state.hits("GET /api/banks");
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.state.hits("GET /api/leads"), leads);
    assert_eq!(backend.state.hits("GET /api/banks"), banks);
    Ok(())
}

#[tokio::test]
async fn remove_and_clear_evict_entries() -> Result<()> {
    let backend = FakeBackend::start().await?;
    let app = backend.logged_in("asha").await?;
    let cache = app.cache();

    cache.read("/api/banks").await;
    cache.read("/api/leads").await;
    assert_eq!(cache.len(), 2);

    let removed = cache.remove(&ResourceKey::new("/api/banks")).expect("removed entry");
    assert!(removed.is_success());
    assert!(cache.peek(&ResourceKey::new("/api/banks")).is_none());

    cache.clear();
    assert!(cache.is_empty());
    let _: Arc<Value> = cache.fetch("/api/banks").await?;
    assert_eq!(backend.state.hits("GET /api/banks"), 2);
    Ok(())
}
