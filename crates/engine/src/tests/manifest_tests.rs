use super::{L1Policy, Manifest, TableMeta, MANIFEST_FILENAME};
use anyhow::Result;
use tempfile::tempdir;

fn meta(file_id: u32, entries: u32, min_fp: u32, max_fp: u32, size_bytes: u64) -> TableMeta {
    TableMeta {
        file_id,
        entries,
        min_fp,
        max_fp,
        size_bytes,
    }
}

#[test]
fn fresh_manifest_is_empty() -> Result<()> {
    let dir = tempdir()?;
    let m = Manifest::load_or_create(dir.path())?;
    assert_eq!(m.l0_len(), 0);
    assert_eq!(m.l1_len(), 0);
    assert_eq!(m.next_file_id(), 0);
    Ok(())
}

#[test]
fn file_ids_are_monotonic_within_a_run() -> Result<()> {
    let dir = tempdir()?;
    let m = Manifest::load_or_create(dir.path())?;
    let a = m.next_file_id();
    let b = m.next_file_id();
    let c = m.next_file_id();
    assert!(a < b && b < c);
    Ok(())
}

#[test]
fn save_and_reload_round_trips_tables_and_counter() -> Result<()> {
    let dir = tempdir()?;
    let m = Manifest::load_or_create(dir.path())?;
    let id0 = m.next_file_id();
    let id1 = m.next_file_id();
    let id2 = m.next_file_id();
    m.add_l0_file(meta(id0, 10, 0, 100, 500));
    m.add_l0_file(meta(id1, 20, 200, 300, 900));
    m.add_l1_file(meta(id2, 5, 400, 500, 1200));
    m.save()?;

    let reloaded = Manifest::load_or_create(dir.path())?;
    assert_eq!(reloaded.l0_len(), 2);
    assert_eq!(reloaded.l1_len(), 1);
    // The counter must resume past the highest id ever issued.
    assert!(reloaded.next_file_id() > id2);
    Ok(())
}

#[test]
fn delete_removes_from_the_right_level_only() -> Result<()> {
    let dir = tempdir()?;
    let m = Manifest::load_or_create(dir.path())?;
    m.add_l0_file(meta(1, 1, 0, 10, 100));
    m.add_l1_file(meta(2, 1, 0, 10, 100));

    m.delete_l0_table(1);
    assert_eq!(m.l0_len(), 0);
    assert_eq!(m.l1_len(), 1);

    m.delete_l1_table(2);
    assert_eq!(m.l1_len(), 0);
    Ok(())
}

#[test]
fn sort_l0_orders_by_descending_density() {
    let dir = tempdir().unwrap();
    let m = Manifest::load_or_create(dir.path()).unwrap();
    // density = entries / size_bytes
    m.add_l0_file(meta(1, 10, 0, 10, 1000)); // density 0.01
    m.add_l0_file(meta(2, 100, 0, 10, 1000)); // density 0.1 (densest)
    m.add_l0_file(meta(3, 50, 0, 10, 1000)); // density 0.05

    m.sort_l0();
    let sorted = m.copy_l0();
    assert_eq!(sorted[0].file_id, 2);
    assert_eq!(sorted[1].file_id, 3);
    assert_eq!(sorted[2].file_id, 1);
}

#[test]
fn find_l1_policy_not_union_when_no_overlap() {
    let dir = tempdir().unwrap();
    let m = Manifest::load_or_create(dir.path()).unwrap();
    m.add_l1_file(meta(1, 10, 0, 100, 1000));

    let policy = m.find_l1_policy(200, 300);
    assert_eq!(policy, L1Policy::NotUnion);
}

#[test]
fn find_l1_policy_union_when_one_l1_overlaps() {
    let dir = tempdir().unwrap();
    let m = Manifest::load_or_create(dir.path()).unwrap();
    m.add_l1_file(meta(7, 10, 0, 1000, 1000));

    // [200, 300] is fully contained in [0, 1000].
    let policy = m.find_l1_policy(200, 300);
    assert_eq!(policy, L1Policy::Union(7));
}

#[test]
fn find_l1_policy_overlapping_when_ranges_partially_intersect() {
    let dir = tempdir().unwrap();
    let m = Manifest::load_or_create(dir.path()).unwrap();
    m.add_l1_file(meta(7, 10, 0, 250, 1000));

    // [200, 300] overlaps [0, 250] without being contained by it.
    let policy = m.find_l1_policy(200, 300);
    assert_eq!(policy, L1Policy::Union(7));
}

#[test]
fn find_l1_policy_overlapping_multiple_l1_ties_break_by_smallest_min_fp() {
    let dir = tempdir().unwrap();
    let m = Manifest::load_or_create(dir.path()).unwrap();
    m.add_l1_file(meta(5, 10, 150, 220, 1000));
    m.add_l1_file(meta(6, 10, 50, 180, 1000));

    let policy = m.find_l1_policy(100, 200);
    match policy {
        L1Policy::Overlapping(ids) => assert_eq!(ids, vec![6, 5]),
        other => panic!("expected Overlapping, got {other:?}"),
    }
}

#[test]
fn manifest_file_survives_on_disk_after_save() -> Result<()> {
    let dir = tempdir()?;
    let m = Manifest::load_or_create(dir.path())?;
    m.add_l0_file(meta(1, 1, 0, 10, 100));
    m.save()?;
    assert!(dir.path().join(MANIFEST_FILENAME).exists());
    Ok(())
}

#[test]
fn malformed_manifest_file_is_an_error() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(MANIFEST_FILENAME), b"not a manifest\n").unwrap();
    assert!(Manifest::load_or_create(dir.path()).is_err());
}
