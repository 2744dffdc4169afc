use chrono::{TimeZone, Utc};
use std::fs;
use std::io::{Read, Write};
use tempfile::tempdir;
use updir::cache::store::{bucket_name, COUNT_FILE_NAME, KEYS_FILE_NAME};
use updir::cache::{
    AddError, Codec, CodecError, DirMap, DirectoryCache, FileRecord, StoreError,
    DEFAULT_BUCKET_COUNT,
};

fn records() -> Vec<FileRecord> {
    let modified = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let mut a = FileRecord::new("a.txt", modified, 3);
    a.hash = 0x1234;
    let mut b = FileRecord::new("Sub/B.txt", modified, 7);
    b.hash = 0xbeef;
    vec![a, b]
}

/// Stores a list of strings as plain lines.
#[derive(Default)]
struct LinesCodec;

impl Codec<Vec<String>> for LinesCodec {
    fn encode(&self, value: &Vec<String>, writer: &mut dyn Write) -> Result<(), CodecError> {
        for line in value {
            writeln!(writer, "{line}")?;
        }
        Ok(())
    }

    fn decode(&self, reader: &mut dyn Read) -> Result<Vec<String>, CodecError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Ok(content.lines().map(str::to_string).collect())
    }
}

#[test]
fn test_round_trip_through_reopened_map() {
    let dir = tempdir().unwrap();
    let key = "/home/user/music";

    {
        let cache = DirectoryCache::open(dir.path()).unwrap();
        cache.set(key, &records()).unwrap();
    }

    let reopened = DirectoryCache::open(dir.path()).unwrap();
    assert_eq!(reopened.get(key).unwrap(), Some(records()));
    assert_eq!(reopened.count(), 1);
}

#[test]
fn test_on_disk_layout() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    let key = "/data/photos";

    cache.set(key, &records()).unwrap();

    let bucket = dir.path().join(bucket_name(key, DEFAULT_BUCKET_COUNT));
    assert_eq!(
        fs::read_to_string(bucket.join(KEYS_FILE_NAME)).unwrap(),
        format!("{key}\n")
    );
    assert_eq!(
        fs::read_to_string(dir.path().join(COUNT_FILE_NAME))
            .unwrap()
            .trim(),
        "1"
    );

    let slot: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(bucket.join("0")).unwrap()).unwrap();
    assert_eq!(slot[0]["relativePath"], "a.txt");
    assert_eq!(slot[0]["length"], 3);
    assert_eq!(slot[1]["hash"], 0xbeef);
}

#[test]
fn test_reads_pascal_case_slots() {
    let dir = tempdir().unwrap();
    let key = "c:/games/mods";
    let bucket = dir.path().join(bucket_name(key, DEFAULT_BUCKET_COUNT));
    fs::create_dir_all(&bucket).unwrap();
    fs::write(bucket.join(KEYS_FILE_NAME), format!("{key}\n")).unwrap();
    fs::write(
        bucket.join("0"),
        r#"[{"RelativePath":"Mod.pak","Modified":"2023-09-14T20:52:10.1234567Z","Length":12,"Hash":99}]"#,
    )
    .unwrap();
    fs::write(dir.path().join(COUNT_FILE_NAME), "1").unwrap();

    let cache = DirectoryCache::open(dir.path()).unwrap();
    let stored = cache.get(key).unwrap().unwrap();

    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].relative_path, "Mod.pak");
    assert_eq!(stored[0].length, 12);
    assert_eq!(stored[0].hash, 99);
}

#[test]
fn test_set_twice_keeps_count_and_keys() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();

    cache.set("k", &records()).unwrap();
    let keys = cache.keys().unwrap();
    cache.set("k", &records()[..1].to_vec()).unwrap();

    assert_eq!(cache.count(), 1);
    assert_eq!(cache.keys().unwrap(), keys);
    assert_eq!(cache.get("k").unwrap().unwrap().len(), 1);
}

#[test]
fn test_add_existing_key_fails_without_change() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    cache.add("k", &records()).unwrap();

    let result = cache.add("k", &Vec::new());

    assert!(matches!(result, Err(AddError::Duplicate(ref k)) if k == "k"));
    assert_eq!(cache.count(), 1);
    assert_eq!(cache.get("k").unwrap(), Some(records()));
}

#[test]
fn test_remove_keeps_remaining_keys_reachable() {
    let dir = tempdir().unwrap();
    let map: DirMap<Vec<String>, LinesCodec> =
        DirMap::open_with(dir.path(), 1, LinesCodec).unwrap();
    for name in ["one", "two", "three", "four"] {
        map.set(name, &vec![name.to_uppercase()]).unwrap();
    }

    assert!(map.remove("two").unwrap());
    assert!(!map.remove("two").unwrap());

    assert_eq!(map.count(), 3);
    assert_eq!(map.keys().unwrap(), vec!["one", "three", "four"]);
    assert_eq!(map.get("three").unwrap(), Some(vec!["THREE".to_string()]));
    assert_eq!(map.get("four").unwrap(), Some(vec!["FOUR".to_string()]));

    let bucket = dir.path().join("0000");
    assert!(bucket.join("0").exists());
    assert!(bucket.join("2").exists());
    assert!(!bucket.join("3").exists());
    assert_eq!(fs::read_to_string(bucket.join("1")).unwrap(), "THREE\n");
}

#[test]
fn test_missing_key_is_absent_not_an_error() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();

    assert_eq!(cache.get("/nowhere").unwrap(), None);
    assert!(!cache.contains_key("/nowhere").unwrap());
    assert!(!cache.remove("/nowhere").unwrap());
}

#[test]
fn test_corrupt_count_is_a_storage_fault() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(COUNT_FILE_NAME), "twelve").unwrap();

    let result = DirectoryCache::open(dir.path());

    assert!(matches!(result, Err(StoreError::CorruptCount { .. })));
}

#[test]
fn test_corrupt_slot_is_a_storage_fault() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    cache.set("k", &records()).unwrap();
    let bucket = dir.path().join(bucket_name("k", DEFAULT_BUCKET_COUNT));
    fs::write(bucket.join("0"), "{ not json").unwrap();

    let result = cache.get("k");

    assert!(matches!(result, Err(StoreError::Decode { .. })));
}

#[test]
fn test_clear_empties_the_map() {
    let dir = tempdir().unwrap();
    let cache = DirectoryCache::open(dir.path()).unwrap();
    cache.set("a", &records()).unwrap();
    cache.set("b", &records()).unwrap();

    cache.clear().unwrap();

    assert_eq!(cache.count(), 0);
    assert!(cache.keys().unwrap().is_empty());
    assert_eq!(cache.get("a").unwrap(), None);
    assert_eq!(DirectoryCache::open(dir.path()).unwrap().count(), 0);
}

#[test]
fn test_concurrent_writers_share_one_instance() {
    let dir = tempdir().unwrap();
    let map: DirMap<Vec<String>, LinesCodec> =
        DirMap::open_with(dir.path(), 4, LinesCodec).unwrap();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let map = &map;
            scope.spawn(move || {
                for i in 0..10 {
                    map.set(&format!("t{t}-{i}"), &vec![format!("{t}:{i}")])
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(map.count(), 40);
    assert_eq!(map.keys().unwrap().len(), 40);
    assert_eq!(map.get("t3-9").unwrap(), Some(vec!["3:9".to_string()]));
}
