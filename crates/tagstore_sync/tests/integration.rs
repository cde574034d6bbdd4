//! End-to-end tests: two devices, each with its own command pipeline and
//! backing store, converging through one shared replica.

use std::sync::mpsc;
use std::sync::{Arc, Once};
use std::time::Duration;
use tagstore_core::{Command, CommandPipeline, NewPage, NewTag, TagPatch};
use tagstore_storage::MemoryBackend;
use tagstore_sync::{InMemoryReplica, SyncCoordinator, SyncWorker};

static TRACING: Once = Once::new();

/// Opt-in log output: `TAGSTORE_LOG=debug cargo test -p tagstore_sync`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_env("TAGSTORE_LOG"))
            .with_test_writer()
            .try_init();
    });
}

type Device = (
    Arc<CommandPipeline<MemoryBackend>>,
    SyncCoordinator<MemoryBackend, Arc<InMemoryReplica>>,
);

fn device(replica: &Arc<InMemoryReplica>) -> Device {
    init_tracing();
    let pipeline = Arc::new(CommandPipeline::new(MemoryBackend::new()));
    let coordinator = SyncCoordinator::new(Arc::clone(&pipeline), Arc::clone(replica));
    (pipeline, coordinator)
}

fn create_tag(pipeline: &CommandPipeline<MemoryBackend>, name: &str) -> String {
    let response = pipeline.execute(Command::CreateTag(NewTag {
        name: name.into(),
        ..NewTag::default()
    }));
    assert!(response.success, "create_tag failed: {:?}", response.error);
    response.data.unwrap()["id"].as_str().unwrap().to_owned()
}

fn tag_names(pipeline: &CommandPipeline<MemoryBackend>) -> Vec<String> {
    let listed = pipeline.execute(Command::ListTags);
    listed
        .data
        .unwrap()
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_owned())
        .collect()
}

#[test]
fn two_devices_converge_on_independent_creations() {
    let replica = Arc::new(InMemoryReplica::new());
    let (pipeline_a, sync_a) = device(&replica);
    let (pipeline_b, sync_b) = device(&replica);

    create_tag(&pipeline_a, "rust");
    create_tag(&pipeline_b, "serde");

    sync_a.sync().unwrap();
    sync_b.sync().unwrap();
    // A needs a second cycle to learn what B pushed after A's first.
    sync_a.sync().unwrap();

    let mut names_a = tag_names(&pipeline_a);
    let mut names_b = tag_names(&pipeline_b);
    names_a.sort();
    names_b.sort();
    assert_eq!(names_a, vec!["rust".to_owned(), "serde".to_owned()]);
    assert_eq!(names_a, names_b);
}

#[test]
fn deletion_propagates_across_devices() {
    let replica = Arc::new(InMemoryReplica::new());
    let (pipeline_a, sync_a) = device(&replica);
    let (pipeline_b, sync_b) = device(&replica);

    let id = create_tag(&pipeline_a, "obsolete");
    sync_a.sync().unwrap();
    sync_b.sync().unwrap();
    assert_eq!(tag_names(&pipeline_b), vec!["obsolete".to_owned()]);

    let response = pipeline_b.execute(Command::DeleteTag { id: id.clone() });
    assert!(response.success);
    sync_b.sync().unwrap();

    sync_a.sync().unwrap();
    assert!(tag_names(&pipeline_a).is_empty());
    assert!(tag_names(&pipeline_b).is_empty());

    // Both ledgers end empty; the delete lives on only as the replica's
    // soft-delete marker.
    for pipeline in [&pipeline_a, &pipeline_b] {
        pipeline
            .with_store(|store| {
                assert!(store.tombstones().is_empty());
                Ok(())
            })
            .unwrap();
    }
}

#[test]
fn deleted_entity_does_not_come_back_on_later_cycles() {
    let replica = Arc::new(InMemoryReplica::new());
    let (pipeline_a, sync_a) = device(&replica);
    let (pipeline_b, sync_b) = device(&replica);

    let id = create_tag(&pipeline_a, "ghost");
    sync_a.sync().unwrap();
    sync_b.sync().unwrap();

    pipeline_a.execute(Command::DeleteTag { id });
    sync_a.sync().unwrap();

    // Several extra cycles on both sides; the id must stay gone.
    for _ in 0..3 {
        sync_b.sync().unwrap();
        sync_a.sync().unwrap();
    }
    assert!(tag_names(&pipeline_a).is_empty());
    assert!(tag_names(&pipeline_b).is_empty());
}

#[test]
fn newer_edit_wins_across_devices() {
    let replica = Arc::new(InMemoryReplica::new());
    let (pipeline_a, sync_a) = device(&replica);
    let (pipeline_b, sync_b) = device(&replica);

    let id = create_tag(&pipeline_a, "draft");
    sync_a.sync().unwrap();
    sync_b.sync().unwrap();

    // Millisecond timestamps order the writes; make B's strictly later.
    std::thread::sleep(Duration::from_millis(5));
    let response = pipeline_b.execute(Command::UpdateTag {
        id: id.clone(),
        patch: TagPatch {
            name: Some("final".into()),
            ..TagPatch::default()
        },
    });
    assert!(response.success);

    sync_b.sync().unwrap();
    sync_a.sync().unwrap();

    assert_eq!(tag_names(&pipeline_a), vec!["final".to_owned()]);
    assert_eq!(tag_names(&pipeline_b), vec!["final".to_owned()]);
}

#[test]
fn pages_and_their_tag_links_sync() {
    let replica = Arc::new(InMemoryReplica::new());
    let (pipeline_a, sync_a) = device(&replica);
    let (pipeline_b, sync_b) = device(&replica);

    let tag_id = create_tag(&pipeline_a, "reading");
    let response = pipeline_a.execute(Command::CreatePage(NewPage {
        url: "https://example.com/post".into(),
        title: "A post".into(),
        tags: [tag_id.clone()].into_iter().collect(),
        ..NewPage::default()
    }));
    assert!(response.success);

    sync_a.sync().unwrap();
    sync_b.sync().unwrap();

    let pages = pipeline_b.execute(Command::ListPages).data.unwrap();
    let page = &pages.as_array().unwrap()[0];
    assert_eq!(page["title"], "A post");
    assert_eq!(page["domain"], "example.com");
    assert_eq!(page["tags"][0], tag_id.as_str());
}

#[test]
fn state_survives_a_restart_between_cycles() {
    let replica = Arc::new(InMemoryReplica::new());
    let (pipeline, coordinator) = device(&replica);

    create_tag(&pipeline, "rust");
    coordinator.sync().unwrap();

    // Rebuild the device over the same persisted bytes.
    let bytes = pipeline.backend().data();
    drop(coordinator);
    let revived = Arc::new(CommandPipeline::new(MemoryBackend::with_data(bytes)));
    let coordinator = SyncCoordinator::new(Arc::clone(&revived), Arc::clone(&replica));

    let result = coordinator.sync().unwrap();
    assert_eq!(result.pushed_entities, 0);
    assert_eq!(tag_names(&revived), vec!["rust".to_owned()]);
}

#[test]
fn background_worker_propagates_a_mutation() {
    init_tracing();
    let replica = Arc::new(InMemoryReplica::new());
    let pipeline = Arc::new(CommandPipeline::new(MemoryBackend::new()));
    let coordinator = Arc::new(SyncCoordinator::new(
        Arc::clone(&pipeline),
        Arc::clone(&replica),
    ));

    let (tx, rx) = mpsc::channel();
    let worker = SyncWorker::spawn(Arc::clone(&coordinator), tx, rx);
    pipeline.set_sync_trigger(worker.trigger_sender());

    create_tag(&pipeline, "rust");

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while std::time::Instant::now() < deadline && replica.state().tags.is_empty() {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(replica.state().tags.len(), 1);
    worker.shutdown();
}
