use agentworks_core::{
    engine::SimEngine,
    event::{EventLogEntry, SimEvent},
    map_gen::MapSize,
    store::SimStore,
};

fn store_with_run(run_id: &str) -> SimStore {
    let store = SimStore::in_memory().expect("open");
    store.migrate().expect("migrate");
    store.insert_run(run_id, 42, "test").expect("insert run");
    store
}

#[test]
fn migrate_is_idempotent() {
    let store = SimStore::in_memory().expect("open");
    store.migrate().expect("first migrate");
    store.migrate().expect("second migrate");
}

#[test]
fn seeds_above_i64_max_come_back_unchanged() {
    let store = store_with_run("run-a");
    store.insert_run("run-big", u64::MAX, "test").expect("insert run");
    store.insert_run("run-edge", i64::MAX as u64 + 1, "test").expect("insert run");

    assert_eq!(store.run_seed("run-a").expect("query"), Some(42));
    assert_eq!(store.run_seed("run-big").expect("query"), Some(u64::MAX));
    assert_eq!(store.run_seed("run-edge").expect("query"), Some(i64::MAX as u64 + 1));
    assert_eq!(store.run_seed("missing").expect("query"), None);
}

#[test]
fn events_come_back_in_append_order() {
    let store = store_with_run("run-a");
    let events = [
        SimEvent::WorldInitialized { seed: 42, width: 16, height: 16 },
        SimEvent::DayClosed { day: 1, income: 40, expense: 22, net: 18, money_after: 818 },
    ];
    for event in &events {
        let entry = EventLogEntry::from_event("run-a", 7, event).expect("entry");
        store.append_event(&entry).expect("append");
    }
    let other = EventLogEntry::from_event("run-a", 8, &events[0]).expect("entry");
    store.append_event(&other).expect("append");

    let stored = store.events_for_tick("run-a", 7).expect("query");

    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].event_type, "world_initialized");
    assert_eq!(stored[1].event_type, "day_closed");
    assert!(stored[0].id < stored[1].id);
    assert_eq!(stored[1].event().expect("decode"), events[1]);
    assert!(store.events_for_tick("run-b", 7).expect("query").is_empty());
}

#[test]
fn latest_save_returns_the_newest_blob() {
    let store = store_with_run("run-a");
    let mut engine = SimEngine::default();
    engine.init(42, MapSize::new(16, 16)).expect("init");

    engine.step(10).expect("step");
    let early = engine.save();
    let early_id = store.save_blob("run-a", &early).expect("save");
    engine.step(40).expect("step");
    let late = engine.save();
    let late_id = store.save_blob("run-a", &late).expect("save");

    assert_eq!(early_id.len(), 36);
    assert_ne!(early_id, late_id);
    assert_eq!(store.latest_save("run-a").expect("query"), Some(late));
    assert_eq!(store.latest_save("missing").expect("query"), None);
}

#[test]
fn latest_snapshot_before_picks_the_closest_earlier_tick() {
    let store = store_with_run("run-a");
    store.save_snapshot("run-a", 100, "{\"tick\":100}").expect("save");
    store.save_snapshot("run-a", 200, "{\"tick\":200}").expect("save");
    store.save_snapshot("run-a", 200, "{\"tick\":200,\"v\":2}").expect("replace");

    assert_eq!(
        store.latest_snapshot_before("run-a", 250).expect("query"),
        Some((200, "{\"tick\":200,\"v\":2}".to_string()))
    );
    assert_eq!(
        store.latest_snapshot_before("run-a", 150).expect("query").map(|(tick, _)| tick),
        Some(100)
    );
    assert_eq!(store.latest_snapshot_before("run-a", 50).expect("query"), None);
}
