//! Benchmark utilities.

use rand::RngCore;
use std::fs::File;
use std::path::Path;

/// Size of the payload used by the whole-file benchmarks.
pub const PAYLOAD_SIZE: usize = 75_000;

/// Raw key used by the encrypted benchmarks.
pub const BENCH_KEY: [u8; 32] = [0x42; 32];

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut data = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut data);
    data
}

/// Create `count` empty files named with zero-padded indices in `dir`.
pub fn populate(dir: &Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        File::create(dir.join(format!("{i:010}"))).unwrap();
    }
}
