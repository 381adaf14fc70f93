use std::sync::{Arc, Mutex};
use std::time::Duration;

use dircontents::{
    AllowedPaths, Entry, FileSelectionHandler, MemoryFileSystem, MetadataModel, ScanConfig, SelectionEvent,
    SelectionStore, SelectionUpdate,
};
use tokio::sync::broadcast;

#[derive(Default)]
struct RecordingStore {
    updates: Mutex<Vec<SelectionUpdate>>,
}

impl SelectionStore for RecordingStore {
    fn dispatch(&self, update: SelectionUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}

fn listing() -> Vec<Entry> {
    (0..5)
        .map(|i| Entry::file("mem:", &format!("/photo{i}.jpg")))
        .collect()
}

fn handler() -> FileSelectionHandler<MemoryFileSystem> {
    let model = Arc::new(MetadataModel::new(Arc::new(MemoryFileSystem::new())));
    FileSelectionHandler::new(model, AllowedPaths::AnyPathOrUrl, ScanConfig::default())
}

fn drain(events: &mut broadcast::Receiver<SelectionEvent>) -> Vec<SelectionEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test(start_paused = true)]
async fn rapid_changes_are_throttled_to_the_last_selection() {
    let handler = handler();
    let mut events = handler.subscribe();
    let list = listing();

    for index in 0..5 {
        handler.on_selection_changed(vec![index], &list);
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    let received = drain(&mut events);
    let changes = received.iter().filter(|&&event| event == SelectionEvent::Change).count();
    let throttled = received
        .iter()
        .filter(|&&event| event == SelectionEvent::ChangeThrottled)
        .count();
    assert_eq!(changes, 5);
    assert_eq!(throttled, 1);
    assert_eq!(received.last(), Some(&SelectionEvent::ChangeThrottled));

    let selection = handler.selection();
    assert_eq!(selection.indexes(), [4]);
    assert!(selection.is_additional_computed());
}

#[tokio::test(start_paused = true)]
async fn changes_right_after_a_computation_wait_the_full_delay() {
    let handler = handler();
    let mut events = handler.subscribe();
    let list = listing();

    handler.on_selection_changed(vec![0], &list);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(drain(&mut events), vec![SelectionEvent::Change, SelectionEvent::ChangeThrottled]);

    handler.on_selection_changed(vec![1], &list);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(drain(&mut events), vec![SelectionEvent::Change]);
    assert!(!handler.selection().is_additional_computed());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(drain(&mut events), vec![SelectionEvent::ChangeThrottled]);
}

#[tokio::test(start_paused = true)]
async fn store_receives_one_update_per_frame() {
    let handler = handler();
    let store = Arc::new(RecordingStore::default());
    handler.set_store(store.clone());
    let list = listing();

    handler.on_selection_changed(vec![0], &list);
    handler.on_selection_changed(vec![0, 1], &list);
    handler.on_selection_changed(vec![2, 3], &list);
    tokio::time::sleep(Duration::from_millis(20)).await;
    handler.clear();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let updates = store.updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0].selected_keys, vec!["mem:/photo2.jpg", "mem:/photo3.jpg"]);
    assert_eq!(updates[0].entries, vec![list[2].clone(), list[3].clone()]);
    assert!(updates[1].selected_keys.is_empty());
}
