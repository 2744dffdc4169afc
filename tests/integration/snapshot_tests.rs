use filetime::{set_file_mtime, FileTime};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use tempfile::tempdir;
use updir::cache::{DirectoryCache, FileRecord, UNSET_HASH};
use updir::config::SyncOptions;
use updir::progress::ProgressCallback;
use updir::scanner::path_utils::directory_key;
use updir::snapshot::{SnapshotBuilder, SnapshotError};
use xxhash_rust::xxh64::xxh64;

/// Records every path the hasher announces.
#[derive(Default)]
struct HashLog {
    paths: Mutex<Vec<String>>,
}

impl HashLog {
    fn names(&self) -> Vec<String> {
        self.paths
            .lock()
            .unwrap()
            .iter()
            .map(|p| {
                Path::new(p)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

impl ProgressCallback for HashLog {
    fn on_phase_start(&self, _phase: &str, _total: usize) {}
    fn on_progress(&self, _current: usize, path: &str) {
        self.paths.lock().unwrap().push(path.to_string());
    }
    fn on_phase_end(&self, _phase: &str) {}
}

fn write_tree(root: &Path) {
    fs::write(root.join("one.txt"), b"first file").unwrap();
    fs::write(root.join("two.txt"), b"second file").unwrap();
    fs::create_dir_all(root.join("nested/deeper")).unwrap();
    fs::write(root.join("nested/three.txt"), b"third").unwrap();
    fs::write(root.join("nested/deeper/four.txt"), b"fourth").unwrap();
}

#[test]
fn test_unchanged_tree_hashes_nothing_on_second_build() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    write_tree(tree.path());
    let cache = DirectoryCache::open(cache_dir.path()).unwrap();
    let options = SyncOptions::default().with_deep(true);

    let first_log = HashLog::default();
    SnapshotBuilder::new(&cache, &options)
        .with_progress(&first_log)
        .build(tree.path())
        .unwrap();
    assert_eq!(first_log.names().len(), 4);

    let second_log = HashLog::default();
    let (_, stats) = SnapshotBuilder::new(&cache, &options)
        .with_progress(&second_log)
        .build(tree.path())
        .unwrap();

    assert!(second_log.names().is_empty());
    assert_eq!(stats.cache_hits, 4);
}

#[test]
fn test_changed_mtime_rehashes_exactly_that_file() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    write_tree(tree.path());
    let cache = DirectoryCache::open(cache_dir.path()).unwrap();
    let options = SyncOptions::default().with_deep(true);
    SnapshotBuilder::new(&cache, &options)
        .build(tree.path())
        .unwrap();

    set_file_mtime(
        tree.path().join("nested/three.txt"),
        FileTime::from_unix_time(1_000_000_000, 0),
    )
    .unwrap();

    let log = HashLog::default();
    let (snapshot, stats) = SnapshotBuilder::new(&cache, &options)
        .with_progress(&log)
        .build(tree.path())
        .unwrap();

    assert_eq!(log.names(), vec!["three.txt"]);
    assert_eq!(stats.hashed, 1);
    assert_eq!(
        snapshot.get("nested/three.txt").unwrap().hash,
        xxh64(b"third", 0)
    );
}

#[test]
fn test_changed_content_same_length_and_mtime_is_trusted() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    fs::write(tree.path().join("a.bin"), b"aaaa").unwrap();
    let cache = DirectoryCache::open(cache_dir.path()).unwrap();
    let options = SyncOptions::default();
    let (before, _) = SnapshotBuilder::new(&cache, &options)
        .build(tree.path())
        .unwrap();
    let mtime = FileTime::from_last_modification_time(
        &fs::metadata(tree.path().join("a.bin")).unwrap(),
    );

    fs::write(tree.path().join("a.bin"), b"bbbb").unwrap();
    set_file_mtime(tree.path().join("a.bin"), mtime).unwrap();
    let (after, stats) = SnapshotBuilder::new(&cache, &options)
        .build(tree.path())
        .unwrap();

    assert_eq!(stats.hashed, 0);
    assert_eq!(after.get("a.bin").unwrap().hash, before.get("a.bin").unwrap().hash);
}

#[test]
fn test_encounter_order_is_sorted_walk_order() {
    let tree = tempdir().unwrap();
    for name in ["b.txt", "c.txt", "a.txt"] {
        fs::write(tree.path().join(name), name).unwrap();
    }
    let options = SyncOptions::default();

    let log = HashLog::default();
    let (snapshot, _) = SnapshotBuilder::without_cache(&options)
        .with_progress(&log)
        .build(tree.path())
        .unwrap();

    let keys: Vec<&str> = snapshot.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a.txt", "b.txt", "c.txt"]);
    assert_eq!(log.names(), vec!["a.txt", "b.txt", "c.txt"]);
}

#[test]
fn test_relative_paths_use_forward_slashes_and_keep_case() {
    let tree = tempdir().unwrap();
    fs::create_dir_all(tree.path().join("Album")).unwrap();
    fs::write(tree.path().join("Album/Track 01.MP3"), b"x").unwrap();
    let options = SyncOptions::default().with_deep(true);

    let (snapshot, _) = SnapshotBuilder::without_cache(&options)
        .build(tree.path())
        .unwrap();

    let record = snapshot.get("album/track 01.mp3").unwrap();
    assert_eq!(record.relative_path, "Album/Track 01.MP3");
}

#[test]
fn test_empty_directory_gives_empty_snapshot() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    let cache = DirectoryCache::open(cache_dir.path()).unwrap();
    let options = SyncOptions::default();

    let (snapshot, stats) = SnapshotBuilder::new(&cache, &options)
        .build(tree.path())
        .unwrap();

    assert!(snapshot.is_empty());
    assert_eq!(stats.files, 0);
    let key = directory_key(&fs::canonicalize(tree.path()).unwrap());
    assert_eq!(cache.get(&key).unwrap(), Some(Vec::<FileRecord>::new()));
}

#[test]
fn test_hash_failure_leaves_cache_untouched() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    write_tree(tree.path());
    let cache = DirectoryCache::open(cache_dir.path()).unwrap();
    let options = SyncOptions::default();
    SnapshotBuilder::new(&cache, &options)
        .build(tree.path())
        .unwrap();
    let key = directory_key(&fs::canonicalize(tree.path()).unwrap());
    let before = cache.get(&key).unwrap();

    // A dangling symlink is listed when links are followed but cannot be read.
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(tree.path().join("gone"), tree.path().join("dangling"))
            .unwrap();
        fs::write(tree.path().join("zzz.txt"), b"new").unwrap();
        let follow = SyncOptions::default().with_follow_symlinks(true);

        let result = SnapshotBuilder::new(&cache, &follow).build(tree.path());

        assert!(matches!(
            result,
            Err(SnapshotError::Scan(_)) | Err(SnapshotError::Hash(_))
        ));
        assert_eq!(cache.get(&key).unwrap(), before);
    }
}

#[test]
fn test_same_directory_through_different_spellings_shares_entry() {
    let parent = tempdir().unwrap();
    let tree = parent.path().join("Tree");
    fs::create_dir(&tree).unwrap();
    fs::write(tree.join("f.txt"), b"f").unwrap();
    let cache_dir = tempdir().unwrap();
    let cache = DirectoryCache::open(cache_dir.path()).unwrap();
    let options = SyncOptions::default();

    SnapshotBuilder::new(&cache, &options).build(&tree).unwrap();
    let (_, stats) = SnapshotBuilder::new(&cache, &options)
        .build(&tree.join("..").join("Tree"))
        .unwrap();

    assert_eq!(stats.hashed, 0);
    assert_eq!(cache.count(), 1);
}

#[test]
fn test_cached_record_without_hash_is_rehashed() {
    let tree = tempdir().unwrap();
    let cache_dir = tempdir().unwrap();
    write_tree(tree.path());
    let cache = DirectoryCache::open(cache_dir.path()).unwrap();
    let options = SyncOptions::default();
    SnapshotBuilder::new(&cache, &options)
        .build(tree.path())
        .unwrap();

    let key = directory_key(&fs::canonicalize(tree.path()).unwrap());
    let mut records = cache.get(&key).unwrap().unwrap();
    let two = records
        .iter_mut()
        .find(|r| r.relative_path == "two.txt")
        .unwrap();
    two.hash = UNSET_HASH;
    cache.set(&key, &records).unwrap();

    let log = HashLog::default();
    let (snapshot, stats) = SnapshotBuilder::new(&cache, &options)
        .with_progress(&log)
        .build(tree.path())
        .unwrap();

    assert_eq!(log.names(), vec!["two.txt"]);
    assert_eq!(stats.hashed, 1);
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(
        snapshot.get("two.txt").unwrap().hash,
        xxh64(b"second file", 0)
    );
    let persisted = cache.get(&key).unwrap().unwrap();
    assert!(persisted.iter().all(|r| !r.needs_hash()));
}
