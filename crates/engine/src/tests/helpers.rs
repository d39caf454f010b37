use crate::Options;
use std::path::Path;
use std::time::{Duration, Instant};

/// Options with a small memtable so a handful of `set` calls trigger a
/// rotation/flush without needing megabytes of test data.
pub fn small_options(dir: &Path) -> Options {
    Options::builder(dir)
        .memtable_size(256)
        .no_of_l0_files(4)
        .max_l1_size(4096)
        .build()
}

/// Polls `condition` until it returns `true` or `timeout` elapses, for
/// asserting on the eventual convergence properties of the background
/// compaction and load-balance loops (spec.md §8 properties 6/7).
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}
