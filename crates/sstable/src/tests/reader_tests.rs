use crate::*;
use memtable::Memtable;
use tempfile::tempdir;

fn make_sample_memtable() -> Memtable {
    let mut m = Memtable::new(4096);
    m.set(b"a".to_vec(), b"apple".to_vec());
    m.set(b"b".to_vec(), b"banana".to_vec());
    m.set(b"c".to_vec(), b"cherry".to_vec());
    m
}

#[test]
fn open_missing_file_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("does-not-exist.table");
    assert!(TableReader::open(1, &path).is_err());
}

#[test]
fn open_rejects_truncated_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let truncated = &bytes[..bytes.len() - 4];
    std::fs::write(&path, truncated).unwrap();

    assert!(TableReader::open(1, &path).is_err());
}

#[test]
fn open_rejects_bad_magic() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let len = bytes.len();
    // Last 4 bytes are the magic; corrupt them.
    bytes[len - 1] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    assert!(TableReader::open(1, &path).is_err());
}

#[test]
fn get_missing_key_is_none_not_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let reader = TableReader::open(1, &path).unwrap();
    assert_eq!(reader.get(b"nonexistent").unwrap(), None);
}

#[test]
fn iter_returns_every_payload_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let reader = TableReader::open(1, &path).unwrap();
    let mut entries = reader.iter().unwrap();
    entries.sort_by(|a, b| a.1.cmp(&b.1));

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].1, b"a");
    assert_eq!(entries[0].2, b"apple");
    assert_eq!(entries[1].1, b"b");
    assert_eq!(entries[2].1, b"c");
}

#[test]
fn entries_matches_iter() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let reader = TableReader::open(1, &path).unwrap();
    assert_eq!(reader.iter().unwrap().len(), reader.entries().unwrap().len());
}

#[test]
fn id_and_size_are_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("7.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let reader = TableReader::open(7, &path).unwrap();
    assert_eq!(reader.id(), 7);
    assert_eq!(reader.size(), std::fs::metadata(&path).unwrap().len());
}

#[test]
fn seek_begin_allows_repeated_iteration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let reader = TableReader::open(1, &path).unwrap();
    let first = reader.iter().unwrap();
    reader.seek_begin().unwrap();
    let second = reader.iter().unwrap();
    assert_eq!(first.len(), second.len());
}

#[test]
fn key_mismatch_on_collision_is_reported_as_miss() {
    // get() trusts the index offset but still verifies the full key; a
    // fingerprint collision against a key never written degrades to a miss.
    let dir = tempdir().unwrap();
    let path = dir.path().join("1.table");
    let mem = make_sample_memtable();
    write_from_memtable(&path, &mem).unwrap();

    let reader = TableReader::open(1, &path).unwrap();
    // "a" was written; a different key that happens to fingerprint-collide
    // with "a" (if one existed) would read through the same offset and
    // fail the key comparison. We can't force a collision deterministically
    // here without brute force, so this test instead pins down that the
    // stored key is exactly verified against a similar-but-different key.
    assert_eq!(reader.get(b"aa").unwrap(), None);
}
