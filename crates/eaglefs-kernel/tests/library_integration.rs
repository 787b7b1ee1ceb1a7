//! Integration tests over real on-disk libraries.
//!
//! # Tiers
//!
//! - **Tier 1:** Loading and resolution against a static library
//! - **Tier 2:** Reconciliation batches applied by hand
//! - **Tier 3:** The background watcher picking up real filesystem edits
//! - **Tier 4:** Foreground lookups racing reconciliation on other threads

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use eaglefs_kernel::{
    Change, FileId, FolderId, Library, LibraryConfig, Metadata, OpenFlags, VfsError, VfsOps,
    WatchConfig,
};
use parking_lot::Mutex;
use tempfile::TempDir;

// ============================================================================
// Shared test setup
// ============================================================================

/// A library written into a temp directory.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(folder_tree: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("metadata.json"), folder_tree).unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn item_dir(&self, id: &str) -> PathBuf {
        self.root().join("images").join(format!("{}.info", id))
    }

    fn write_sidecar(&self, id: &str, sidecar: &str) {
        let dir = self.item_dir(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("metadata.json"), sidecar).unwrap();
    }

    fn write_payload(&self, id: &str, file_name: &str, bytes: &[u8]) {
        let dir = self.item_dir(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(file_name), bytes).unwrap();
    }

    fn remove_item(&self, id: &str) {
        fs::remove_dir_all(self.item_dir(id)).unwrap();
    }

    fn write_folder_tree(&self, folder_tree: &str) {
        fs::write(self.root().join("metadata.json"), folder_tree).unwrap();
    }

    fn open(&self) -> Library {
        Library::open(LibraryConfig::new(self.root()).with_watch(WatchConfig::disabled())).unwrap()
    }
}

fn sidecar(id: &str, name: &str, folders: &[&str], size: u64) -> String {
    let folders: Vec<String> = folders.iter().map(|f| format!("\"{}\"", f)).collect();
    format!(
        r#"{{"id": "{}", "name": "{}", "ext": "png", "folders": [{}], "isDeleted": false,
            "size": {}, "width": 66, "height": 65,
            "modificationTime": 1757000000000, "lastModified": 1757000000500}}"#,
        id,
        name,
        folders.join(", "),
        size
    )
}

const ONE_FOLDER: &str = r#"{"folders": [{"id": "F1", "name": "A", "children": [], "modificationTime": 1000}]}"#;

/// Folder `A` (F1) holding `photo` (X1, png, 100 bytes).
fn photo_library() -> Fixture {
    let fixture = Fixture::new(ONE_FOLDER);
    fixture.write_sidecar("X1", &sidecar("X1", "photo", &["F1"], 100));
    let payload: Vec<u8> = (0..100u8).collect();
    fixture.write_payload("X1", "photo.png", &payload);
    fixture
}

/// Log lines written while a test runs.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a fmt subscriber recording into the returned buffer.
fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, CapturedLogs) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    (value, logs)
}

// ============================================================================
// Tier 1: loading and resolution
// ============================================================================

#[test]
fn test_scenario_photo_in_folder() {
    let fixture = photo_library();
    let library = fixture.open();

    assert_eq!(library.list("/").unwrap(), vec!["A_F1"]);
    assert_eq!(library.list("/A_F1").unwrap(), vec!["photo_X1.png"]);

    let bytes = library.read("/A_F1/photo_X1.png", 0, 50).unwrap();
    assert_eq!(bytes, (0..50u8).collect::<Vec<_>>());
}

#[test]
fn test_read_past_end_is_short_or_empty() {
    let fixture = photo_library();
    let library = fixture.open();

    assert_eq!(library.read("/A_F1/photo_X1.png", 90, 50).unwrap().len(), 10);
    assert!(library.read("/A_F1/photo_X1.png", 100, 50).unwrap().is_empty());
    assert!(library.read("/A_F1/photo_X1.png", 1_000, 50).unwrap().is_empty());
}

#[test]
fn test_read_missing_payload_looks_missing() {
    let fixture = photo_library();
    fs::remove_file(fixture.item_dir("X1").join("photo.png")).unwrap();
    let library = fixture.open();

    let err = library.read("/A_F1/photo_X1.png", 0, 10).unwrap_err();
    assert!(err.is_not_found());
    assert!(library.read("/A_F1/other_X9.png", 0, 10).unwrap_err().is_not_found());
}

#[test]
fn test_file_without_folders_sits_under_root() {
    let fixture = photo_library();
    fixture.write_sidecar("X2", &sidecar("X2", "loose", &[], 5));
    let library = fixture.open();

    assert_eq!(library.list("/").unwrap(), vec!["A_F1", "loose_X2.png"]);
    assert_eq!(library.search_file("/loose_X2.png"), Some(FileId::new("X2")));
    assert_eq!(library.stats().root_files, 1);
}

#[test]
fn test_malformed_sidecar_is_skipped() {
    let fixture = photo_library();
    fixture.write_sidecar("X2", "{ this is not json");
    let (library, logs) = with_captured_logs(|| fixture.open());

    assert_eq!(library.list("/A_F1").unwrap(), vec!["photo_X1.png"]);
    assert_eq!(library.stats().files, 1);

    let logs = logs.text();
    assert!(logs.contains("WARN"), "no warning logged: {}", logs);
    assert!(logs.contains("skipping broken sidecar"), "{}", logs);
    assert!(logs.contains("X2.info"), "{}", logs);
}

#[test]
fn test_deleted_sidecar_never_resolves() {
    let fixture = photo_library();
    fixture.write_sidecar(
        "X2",
        r#"{"id": "X2", "name": "trash", "ext": "png", "folders": ["F1"], "isDeleted": true}"#,
    );
    let library = fixture.open();

    assert_eq!(library.search_file("/A_F1/trash_X2.png"), None);
    assert_eq!(library.list("/A_F1").unwrap(), vec!["photo_X1.png"]);
}

#[test]
fn test_missing_folder_tree_is_fatal() {
    let dir = TempDir::new().unwrap();
    let result = Library::open(LibraryConfig::new(dir.path()));
    assert!(matches!(result, Err(VfsError::StorageUnavailable { .. })));

    fs::write(dir.path().join("metadata.json"), "{ nope").unwrap();
    let result = Library::open(LibraryConfig::new(dir.path()));
    assert!(matches!(result, Err(VfsError::CorruptMetadata { .. })));
}

#[test]
fn test_same_name_different_ids_are_distinct() {
    let fixture = photo_library();
    fixture.write_sidecar("X2", &sidecar("X2", "photo", &["F1"], 1));
    let library = fixture.open();

    assert_eq!(
        library.list("/A_F1").unwrap(),
        vec!["photo_X1.png", "photo_X2.png"]
    );
}

#[test]
fn test_round_trip_listing_to_search() {
    let fixture = Fixture::new(
        r#"{"folders": [
            {"id": "F1", "name": "A", "children": [{"id": "F2", "name": "a/b", "children": []}]},
            {"id": "F3", "name": "C"}
        ]}"#,
    );
    fixture.write_sidecar("X1", &sidecar("X1", "one", &["F1"], 1));
    fixture.write_sidecar("X2", &sidecar("X2", "two", &["F2", "F3"], 2));
    fixture.write_sidecar("X3", &sidecar("X3", "three", &[], 3));
    let library = fixture.open();

    let mut pending = vec![String::new()];
    let mut files_seen = 0;
    while let Some(parent) = pending.pop() {
        for entry in library.list_entries(&format!("{}/", parent)).unwrap() {
            let path = format!("{}/{}", parent, entry.name);
            if entry.kind.is_dir() {
                assert!(library.search_folder(&path).is_some(), "{}", path);
                pending.push(path);
            } else {
                assert!(library.search_file(&path).is_some(), "{}", path);
                files_seen += 1;
            }
        }
    }
    // X2 is listed under both of its folders.
    assert_eq!(files_seen, 4);
}

#[test]
fn test_root_queries() {
    let fixture = photo_library();
    let library = fixture.open();

    assert_eq!(library.search_folder("/"), Some(FolderId::root()));
    assert_eq!(library.search_file("/"), None);
    assert_eq!(library.get_metadata("/").unwrap(), Metadata::Root);

    let attr = library.attributes("/").unwrap();
    assert!(attr.is_dir());
    assert_eq!(attr.perm, 0o775);
}

#[test]
fn test_listing_a_file_path_is_not_found() {
    let fixture = photo_library();
    let library = fixture.open();

    assert!(library.list("/A_F1/photo_X1.png").unwrap_err().is_not_found());
    let err = library.readdir(Path::new("/A_F1/photo_X1.png")).unwrap_err();
    assert!(matches!(err, VfsError::NotFound(_)));
}

#[test]
fn test_attributes() {
    let fixture = photo_library();
    let library = fixture.open();

    let folder = library.attributes("/A_F1").unwrap();
    assert!(folder.is_dir());
    assert_eq!(folder.perm, 0o755);
    assert_eq!(folder.nlink, 2);

    let file = library.attributes("/A_F1/photo_X1.png").unwrap();
    assert!(file.is_file());
    assert_eq!(file.perm, 0o444);
    assert_eq!(file.size, 100);
    assert_eq!(file.nlink, 1);

    assert!(library.attributes("/A_F1/nope").unwrap_err().is_not_found());
}

#[test]
fn test_open_is_read_only() {
    let fixture = photo_library();
    let library = fixture.open();

    assert!(library.can_open_read_only("/A_F1/photo_X1.png", OpenFlags::read()).unwrap());
    assert!(!library.can_open_read_only("/A_F1/photo_X1.png", OpenFlags::write()).unwrap());
    assert!(library.can_open_read_only("/nope", OpenFlags::read()).unwrap_err().is_not_found());

    let path = Path::new("/A_F1/photo_X1.png");
    assert!(VfsOps::open(&library, path, OpenFlags::read()).is_ok());
    assert!(matches!(
        VfsOps::open(&library, path, OpenFlags::write_only()),
        Err(VfsError::AccessDenied(_))
    ));
}

#[test]
fn test_vfs_ops_rejects_writes() {
    let fixture = photo_library();
    let library = fixture.open();
    let path = Path::new("/A_F1/photo_X1.png");

    assert!(library.read_only());
    assert!(matches!(library.write(path, 0, b"x"), Err(VfsError::ReadOnly)));
    assert!(matches!(library.unlink(path), Err(VfsError::ReadOnly)));
    assert!(matches!(library.mkdir(Path::new("/new"), 0o755), Err(VfsError::ReadOnly)));
    assert!(matches!(
        library.rename(path, Path::new("/A_F1/other.png")),
        Err(VfsError::ReadOnly)
    ));
    assert!(matches!(library.truncate(path, 0), Err(VfsError::ReadOnly)));
}

#[test]
fn test_vfs_ops_reads() {
    let fixture = photo_library();
    let library = fixture.open();

    let entries = library.readdir(Path::new("/")).unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].kind.is_dir());

    let all = library.read_all(Path::new("/A_F1/photo_X1.png")).unwrap();
    assert_eq!(all.len(), 100);

    let statfs = library.statfs().unwrap();
    assert_eq!(statfs.files, 2);
    assert_eq!(statfs.bsize, 4096);
    assert_eq!(statfs.bfree, 0);
}

// ============================================================================
// Tier 2: reconciliation
// ============================================================================

#[test]
fn test_reconcile_new_item() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_sidecar("X2", &sidecar("X2", "fresh", &["F1"], 7));
    fixture.write_payload("X2", "fresh.png", b"1234567");
    let outcome = reconciler.apply_batch(&[
        Change::created("images/X2.info"),
        Change::created("images/X2.info/metadata.json"),
        Change::created("images/X2.info/fresh.png"),
    ]);

    assert_eq!(outcome.updated, 1);
    assert_eq!(
        library.list("/A_F1").unwrap(),
        vec!["photo_X1.png", "fresh_X2.png"]
    );
    assert_eq!(library.read("/A_F1/fresh_X2.png", 2, 3).unwrap(), b"345");
}

#[test]
fn test_reconcile_is_idempotent() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_sidecar("X1", &sidecar("X1", "renamed", &["F1"], 100));
    let batch = [Change::modified("images/X1.info/metadata.json")];

    reconciler.apply_batch(&batch);
    let once = (library.list("/A_F1").unwrap(), library.get_metadata("/A_F1/renamed_X1.png").unwrap());
    reconciler.apply_batch(&batch);
    let twice = (library.list("/A_F1").unwrap(), library.get_metadata("/A_F1/renamed_X1.png").unwrap());

    assert_eq!(once, twice);
    assert_eq!(once.0, vec!["renamed_X1.png"]);
}

#[test]
fn test_reconcile_tombstone() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();
    assert_eq!(library.list("/A_F1").unwrap(), vec!["photo_X1.png"]);

    fixture.remove_item("X1");
    let outcome = reconciler.apply_batch(&[Change::deleted("images/X1.info")]);

    assert_eq!(outcome.removed, 1);
    assert!(library.index().file(&FileId::new("X1")).is_none());
    assert!(library.list("/A_F1").unwrap().is_empty());
    assert_eq!(library.search_file("/A_F1/photo_X1.png"), None);
}

#[test]
fn test_reconcile_edit_then_delete() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_sidecar("X1", &sidecar("X1", "edited", &["F1"], 100));
    reconciler.apply_batch(&[Change::modified("images/X1.info/metadata.json")]);
    assert_eq!(library.list("/A_F1").unwrap(), vec!["edited_X1.png"]);

    fixture.remove_item("X1");
    reconciler.apply_batch(&[Change::deleted("images/X1.info/metadata.json")]);
    assert!(library.list("/A_F1").unwrap().is_empty());
}

#[test]
fn test_reconcile_membership_move_hides_old_folder() {
    let fixture = Fixture::new(
        r#"{"folders": [{"id": "F1", "name": "A"}, {"id": "F2", "name": "B"}]}"#,
    );
    fixture.write_sidecar("X1", &sidecar("X1", "photo", &["F1"], 1));
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_sidecar("X1", &sidecar("X1", "photo", &["F2"], 1));
    reconciler.apply_batch(&[Change::modified("images/X1.info/metadata.json")]);

    assert!(library.list("/A_F1").unwrap().is_empty());
    assert_eq!(library.list("/B_F2").unwrap(), vec!["photo_X1.png"]);

    // Moving to the root keeps root listings consistent too.
    fixture.write_sidecar("X1", &sidecar("X1", "photo", &[], 1));
    reconciler.apply_batch(&[Change::modified("images/X1.info/metadata.json")]);
    assert!(library.list("/B_F2").unwrap().is_empty());
    assert_eq!(library.list("/").unwrap(), vec!["A_F1", "B_F2", "photo_X1.png"]);
}

#[test]
fn test_reconcile_sidecar_marked_deleted() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_sidecar(
        "X1",
        r#"{"id": "X1", "name": "photo", "ext": "png", "folders": ["F1"], "isDeleted": true}"#,
    );
    reconciler.apply_batch(&[Change::modified("images/X1.info/metadata.json")]);

    assert_eq!(library.search_file("/A_F1/photo_X1.png"), None);
    assert!(library.list("/A_F1").unwrap().is_empty());
    assert_eq!(library.stats().files, 0);
}

#[test]
fn test_reconcile_malformed_keeps_previous_entry() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_sidecar("X1", "{ half written");
    let (outcome, logs) = with_captured_logs(|| {
        reconciler.apply_batch(&[Change::modified("images/X1.info/metadata.json")])
    });

    assert_eq!(outcome.skipped, 1);
    assert!(logs.text().contains("skipping item this batch"));
    assert_eq!(library.list("/A_F1").unwrap(), vec!["photo_X1.png"]);
}

#[test]
fn test_reconcile_folder_tree_reload() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_folder_tree(
        r#"{"folders": [
            {"id": "F2", "name": "New"},
            {"id": "F1", "name": "A", "children": [{"id": "F3", "name": "Inner"}]}
        ]}"#,
    );
    let outcome = reconciler.apply_batch(&[Change::modified("metadata.json")]);

    assert!(outcome.tree_reloaded);
    assert_eq!(library.list("/").unwrap(), vec!["New_F2", "A_F1"]);
    assert_eq!(library.search_folder("/A_F1/Inner_F3"), Some(FolderId::new("F3")));
    assert_eq!(library.list("/A_F1").unwrap(), vec!["Inner_F3", "photo_X1.png"]);

    fixture.write_folder_tree(r#"{"folders": []}"#);
    reconciler.apply_batch(&[Change::modified("metadata.json")]);
    assert_eq!(library.search_folder("/A_F1"), None);
}

#[test]
fn test_reconcile_broken_folder_tree_keeps_previous() {
    let fixture = photo_library();
    let library = fixture.open();
    let reconciler = library.reconciler();

    fixture.write_folder_tree("{ broken");
    let outcome = reconciler.apply_batch(&[Change::modified("metadata.json")]);

    assert!(!outcome.tree_reloaded);
    assert_eq!(library.list("/").unwrap(), vec!["A_F1"]);
}

#[test]
fn test_reconcile_ignores_unrelated_paths() {
    let fixture = photo_library();
    let library = fixture.open();
    let outcome = library.reconciler().apply_batch(&[
        Change::modified("tags.json"),
        Change::modified("backup/metadata.json"),
        Change::created("images/stray"),
    ]);
    assert!(outcome.is_noop());
    assert_eq!(outcome.ignored, 3);
}

// ============================================================================
// Tier 3: background watcher
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watcher_picks_up_new_item() {
    let fixture = photo_library();
    let library = Library::open(
        LibraryConfig::new(fixture.root()).with_watch(WatchConfig::default().with_coalesce_ms(50)),
    )
    .unwrap();
    let handle = library.watch().unwrap().expect("watching enabled");

    fixture.write_sidecar("X2", &sidecar("X2", "watched", &["F1"], 3));

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut seen = false;
    while tokio::time::Instant::now() < deadline {
        if library.search_file("/A_F1/watched_X2.png").is_some() {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    handle.stop().await;
    assert!(seen, "watcher never reconciled the new item");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watcher_stops_promptly() {
    let fixture = photo_library();
    let library = Library::open(LibraryConfig::new(fixture.root())).unwrap();
    let handle = library.watch().unwrap().expect("watching enabled");

    tokio::time::timeout(Duration::from_secs(5), handle.stop())
        .await
        .expect("watcher did not stop");
}

#[tokio::test]
async fn test_watch_respects_disabled_config() {
    let fixture = photo_library();
    let library = fixture.open();
    assert!(!library.config().watch.enabled);
    assert!(library.watch().unwrap().is_none());
}

// ============================================================================
// Tier 4: concurrent lookups and reconciliation
// ============================================================================

#[test]
fn test_lookups_race_membership_moves() {
    const MOVES: usize = 500;
    const READERS: usize = 4;

    let fixture = Fixture::new(
        r#"{"folders": [{"id": "F1", "name": "A"}, {"id": "F2", "name": "B"}]}"#,
    );
    fixture.write_sidecar("X1", &sidecar("X1", "p", &["F1"], 1));
    let library = Arc::new(fixture.open());
    let reconciler = library.reconciler();

    let in_a = sidecar("X1", "p", &["F1"], 1);
    let in_b = sidecar("X1", "p", &["F2"], 1);

    let done = Arc::new(AtomicBool::new(false));
    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let library = Arc::clone(&library);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut calls = 0usize;
                while !done.load(Ordering::Relaxed) {
                    for folder in ["/A_F1", "/B_F2"] {
                        let names = library.list(folder).unwrap();
                        assert!(names.len() <= 1, "{} listed {:?}", folder, names);
                        let _ = library.search_file(&format!("{}/p_X1.png", folder));
                        calls += 1;
                    }
                }
                calls
            })
        })
        .collect();

    for i in 0..MOVES {
        let sidecar = if i % 2 == 0 { &in_b } else { &in_a };
        fixture.write_sidecar("X1", sidecar);
        let outcome = reconciler.apply_batch(&[Change::modified("images/X1.info/metadata.json")]);
        assert_eq!(outcome.updated, 1);
    }
    done.store(true, Ordering::Relaxed);

    for reader in readers {
        let calls = reader.join().expect("reader thread panicked");
        assert!(calls > 0);
    }

    // MOVES is even, so the last batch put the item back in A.
    assert_eq!(library.list("/A_F1").unwrap(), vec!["p_X1.png"]);
    assert!(library.list("/B_F2").unwrap().is_empty());
    assert_eq!(library.search_file("/A_F1/p_X1.png"), Some(FileId::new("X1")));
    assert_eq!(library.search_file("/B_F2/p_X1.png"), None);
}
