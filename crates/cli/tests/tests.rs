#[cfg(test)]
mod memtable_and_sstable {
    use memtable::Memtable;
    use sstable::{write_from_memtable, TableReader};

    #[test]
    fn memtable_overflows_are_rejected_by_is_enough_space() {
        let mut mem = Memtable::new(64);
        for i in 0..100u32 {
            let key = format!("key{i}").into_bytes();
            let value = vec![b'x'; 32];
            if mem.is_enough_space(key.len() + value.len()) {
                mem.set(key, value);
            }
        }
        assert!(mem.occupied_space() <= mem.capacity());
    }

    #[test]
    fn write_then_read_round_trips_through_a_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.table");

        let mut mem = Memtable::new(4096);
        for i in 0..200u32 {
            mem.set(format!("key{i}").into_bytes(), format!("val{i}").into_bytes());
        }
        write_from_memtable(&path, &mem).unwrap();

        let reader = TableReader::open(0, &path).unwrap();
        for i in 0..200u32 {
            let got = reader.get(format!("key{i}").as_bytes()).unwrap();
            assert_eq!(got, Some(format!("val{i}").into_bytes()));
        }
        assert!(reader.get(b"missing").unwrap().is_none());
    }
}

#[cfg(test)]
mod load_test {
    use memtable::Memtable;

    #[test]
    fn high_churn_workload_keeps_the_newest_value_per_key() {
        let mut mem = Memtable::new(16 * 1024 * 1024);
        for round in 0..5_000u32 {
            let key = format!("key{}", round % 500).into_bytes();
            let value = format!("round{round}").into_bytes();
            mem.set(key, value);
        }
        assert_eq!(mem.len(), 500);
        assert_eq!(mem.get(b"key0"), Some(b"round4500".as_slice()));
    }
}
