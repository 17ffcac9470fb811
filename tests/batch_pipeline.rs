//! End-to-end batch runs against in-memory storage

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use certrender::batch::BatchOrchestrator;
use certrender::rendering::{Bitmap, CanvasRenderer, RenderSize, SceneRenderer};
use certrender::storage::{MemoryStorage, ObjectStore, StorageError, StorageResult};
use certrender::{Design, Outcome, Participant, RenderConfig, SceneGraph};
use serde_json::json;

const DESIGN: &str = r##"{"background":"#ffffff","objects":[
    {"type":"rect","left":20,"top":20,"width":760,"height":560,"fill":"","stroke":"#1f3a5f","strokeWidth":6},
    {"type":"textbox","id":"PLACEHOLDER-name","text":"Full Name","left":400,"top":280,"width":600,
     "originX":"center","originY":"center","fontSize":48,"textAlign":"center","fill":"#000000"},
    {"type":"text","text":"Certificate of Completion","left":200,"top":80,"fontSize":32}
]}"##;

fn design() -> Design {
    Design {
        id: "c1".into(),
        name: "Rust 101".into(),
        scene_graph: DESIGN.into(),
        owner_id: "u1".into(),
    }
}

fn participant(id: &str, revoked: bool, name: &str) -> Participant {
    let data = match json!({ "name": name }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    Participant {
        id: id.into(),
        design_id: "c1".into(),
        is_revoked: revoked,
        data,
    }
}

fn zip_members(bytes: Vec<u8>) -> Vec<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).expect("valid zip");
    (0..archive.len())
        .map(|i| archive.by_index(i).expect("member").name().to_string())
        .collect()
}

/// Counts render calls and delegates to the real renderer
struct CountingRenderer {
    inner: CanvasRenderer,
    calls: AtomicUsize,
}

#[async_trait]
impl SceneRenderer for CountingRenderer {
    async fn render(&self, scene: &SceneGraph, size: RenderSize) -> certrender::Result<Bitmap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.render(scene, size).await
    }
}

/// Memory store whose downloads fail for keys containing `poisoned`
struct FlakyStore {
    inner: MemoryStorage,
    poisoned: String,
}

#[async_trait]
impl ObjectStore for FlakyStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        self.inner.put(key, bytes, content_type).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        if key.contains(&self.poisoned) {
            return Err(StorageError::Other(format!("connection reset while reading {}", key)));
        }
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn presign(&self, key: &str, ttl_secs: u64) -> StorageResult<String> {
        self.inner.presign(key, ttl_secs).await
    }
}

/// Store that accepts nothing
struct ReadOnlyStore;

#[async_trait]
impl ObjectStore for ReadOnlyStore {
    async fn put(&self, key: &str, _: Vec<u8>, _: &str) -> StorageResult<String> {
        Err(StorageError::Other(format!("bucket is read-only, cannot write {}", key)))
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, _: &str) -> StorageResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn presign(&self, key: &str, _: u64) -> StorageResult<String> {
        Err(StorageError::NotFound(key.to_string()))
    }
}

/// Memory store that refuses to write archives
struct ArchiveRejectingStore {
    inner: MemoryStorage,
}

#[async_trait]
impl ObjectStore for ArchiveRejectingStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> StorageResult<String> {
        if key.ends_with(".zip") {
            return Err(StorageError::Other(format!("quota exceeded writing {}", key)));
        }
        self.inner.put(key, bytes, content_type).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn presign(&self, key: &str, ttl_secs: u64) -> StorageResult<String> {
        self.inner.presign(key, ttl_secs).await
    }
}

fn offline_config() -> RenderConfig {
    RenderConfig {
        enable_images: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn revoked_participant_is_skipped_and_archive_holds_the_rest() {
    let store = Arc::new(MemoryStorage::new());
    let orchestrator = BatchOrchestrator::with_canvas_renderer(offline_config(), store.clone()).unwrap();

    let result = orchestrator
        .run(&design(), &[participant("p1", false, "Alice"), participant("p2", true, "Bob")])
        .await;

    assert_eq!(result.outcomes.len(), 2);
    assert_eq!(result.outcomes[0].participant_id, "p1");
    let key1 = match &result.outcomes[0].outcome {
        Outcome::Success { artifact_key } => artifact_key.clone(),
        other => panic!("expected success, got {:?}", other),
    };
    assert!(key1.as_str().starts_with("c1/certificate_p1_"));
    assert_eq!(result.outcomes[1].participant_id, "p2");
    assert_eq!(result.outcomes[1].outcome, Outcome::SkippedRevoked);

    let pdf = store.get(key1.as_str()).await.unwrap();
    assert!(pdf.starts_with(b"%PDF-"));

    let archive_key = result.archive_key.expect("archive key");
    assert!(archive_key.as_str().starts_with("c1/certificates_c1_"));
    let zip = store.get(archive_key.as_str()).await.unwrap();
    assert_eq!(zip_members(zip), vec![key1.as_str().to_string()]);
}

#[tokio::test]
async fn ledger_has_one_entry_per_participant_in_order() {
    let store = Arc::new(MemoryStorage::new());
    let orchestrator = BatchOrchestrator::with_canvas_renderer(offline_config(), store).unwrap();
    let participants: Vec<Participant> = (0..5)
        .map(|i| participant(&format!("p{}", i), i % 2 == 1, &format!("Person {}", i)))
        .collect();

    let result = orchestrator.run(&design(), &participants).await;

    let ids: Vec<&str> = result.outcomes.iter().map(|o| o.participant_id.as_str()).collect();
    assert_eq!(ids, vec!["p0", "p1", "p2", "p3", "p4"]);
    assert_eq!(result.counts(), (3, 2, 0));
}

#[tokio::test]
async fn revoked_participants_never_reach_the_renderer() {
    let renderer = Arc::new(CountingRenderer {
        inner: CanvasRenderer::new(&offline_config()).unwrap(),
        calls: AtomicUsize::new(0),
    });
    let store = Arc::new(MemoryStorage::new());
    let orchestrator = BatchOrchestrator::new(renderer.clone(), store.clone(), offline_config());

    let result = orchestrator
        .run(&design(), &[participant("p1", true, "A"), participant("p2", true, "B")])
        .await;

    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert!(result.outcomes.iter().all(|o| o.outcome == Outcome::SkippedRevoked));
    assert!(result.archive_key.is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn storage_failures_are_recorded_per_participant() {
    let orchestrator =
        BatchOrchestrator::with_canvas_renderer(offline_config(), Arc::new(ReadOnlyStore)).unwrap();

    let result = orchestrator
        .run(&design(), &[participant("p1", false, "Alice"), participant("p2", false, "Bob")])
        .await;

    assert_eq!(result.counts(), (0, 0, 2));
    for entry in &result.outcomes {
        match &entry.outcome {
            Outcome::Failed { error } => assert!(error.contains("read-only"), "{}", error),
            other => panic!("expected failure, got {:?}", other),
        }
    }
    assert!(result.archive_key.is_none());
    assert_eq!(result.message, "Certificate generation completed");
}

#[tokio::test]
async fn archive_skips_members_whose_download_fails() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStorage::new(),
        poisoned: "certificate_p2_".into(),
    });
    let orchestrator = BatchOrchestrator::with_canvas_renderer(offline_config(), store.clone()).unwrap();

    let result = orchestrator
        .run(
            &design(),
            &[
                participant("p1", false, "Alice"),
                participant("p2", false, "Bob"),
                participant("p3", false, "Carol"),
            ],
        )
        .await;

    assert_eq!(result.counts(), (3, 0, 0));
    let expected: Vec<String> = result
        .outcomes
        .iter()
        .filter_map(|o| match &o.outcome {
            Outcome::Success { artifact_key } if o.participant_id != "p2" => {
                Some(artifact_key.as_str().to_string())
            }
            _ => None,
        })
        .collect();

    let archive_key = result.archive_key.expect("archive key");
    let zip = store.inner.get(archive_key.as_str()).await.unwrap();
    assert_eq!(zip_members(zip), expected);
}

#[tokio::test]
async fn archive_upload_failure_keeps_participant_results() {
    let store = Arc::new(ArchiveRejectingStore {
        inner: MemoryStorage::new(),
    });
    let orchestrator = BatchOrchestrator::with_canvas_renderer(offline_config(), store.clone()).unwrap();

    let result = orchestrator
        .run(&design(), &[participant("p1", false, "Alice"), participant("p2", false, "Bob")])
        .await;

    assert_eq!(result.counts(), (2, 0, 0));
    for entry in &result.outcomes {
        match &entry.outcome {
            Outcome::Success { artifact_key } => {
                let pdf = store.inner.get(artifact_key.as_str()).await.unwrap();
                assert!(pdf.starts_with(b"%PDF-"));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }
    assert!(result.archive_key.is_none());
    assert!(store.inner.list("c1/").await.unwrap().iter().all(|k| k.ends_with(".pdf")));
    assert_eq!(result.message, "Certificate generation completed");
}

#[tokio::test]
async fn handle_render_round_trips_the_wire_format() {
    let store = Arc::new(MemoryStorage::new());
    let orchestrator = BatchOrchestrator::with_canvas_renderer(offline_config(), store).unwrap();
    let body = json!({
        "certificate": {"id": "c1", "name": "Rust 101", "design": DESIGN, "user_id": "u1"},
        "participants": [
            {"id": "p1", "certificate_id": "c1", "is_revoked": false, "data": {"name": "Alice"}},
            {"id": "p2", "certificate_id": "c1", "is_revoked": true, "data": {"name": "Bob"}}
        ]
    });

    let result = orchestrator.handle_render(body.to_string().as_bytes()).await.unwrap();
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["message"], "Certificate generation completed");
    assert_eq!(value["results"][0]["status"], "success");
    assert_eq!(value["results"][1]["status"], "skipped_revoked");
    assert!(value["results"][1]["filePath"].is_null());
    assert!(value["zipFilePath"].as_str().unwrap().ends_with(".zip"));
}
