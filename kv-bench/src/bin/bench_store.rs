//! # Store Benchmark Harness
//!
//! Purpose: Provide a dependency-free, repeatable benchmark driver for the
//! store facade so baseline throughput and latency can be compared over
//! time.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: Use a fixed PRNG seed for stable comparisons.
//! 2. **Allocation Control**: Pre-build keys/values to keep setup costs off the hot path.
//! 3. **Facade-Level Dispatch**: Call `Store` directly, the same boundary a
//!    server connection handler would use.

use std::env;
use std::hint::black_box;
use std::time::{Duration, Instant};

use kv_engine::{Store, StoreConfig};

const DEFAULT_KEY_COUNT: usize = 1 << 14;
const DEFAULT_OP_COUNT: usize = 200_000;
const DEFAULT_KEY_SIZE: usize = 16;
const DEFAULT_VALUE_SIZE: usize = 128;

struct BenchConfig {
    requested_keys: usize,
    key_count: usize,
    key_mask: usize,
    op_count: usize,
    key_size: usize,
    value_size: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        let requested_keys = parse_usize(args.next(), DEFAULT_KEY_COUNT);
        let op_count = parse_usize(args.next(), DEFAULT_OP_COUNT);
        let key_size = parse_usize(args.next(), DEFAULT_KEY_SIZE);
        let value_size = parse_usize(args.next(), DEFAULT_VALUE_SIZE);

        let key_count = requested_keys.max(1);
        let key_mask = key_count.next_power_of_two() - 1;

        BenchConfig {
            requested_keys,
            key_count,
            key_mask,
            op_count,
            key_size,
            value_size,
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

/// Tiny deterministic PRNG used to avoid external dependencies.
///
/// XorShift is fast enough for benchmarks and keeps the workload reproducible.
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    #[inline]
    fn next_index(&mut self, mask: usize) -> usize {
        (self.next_u64() as usize) & mask
    }
}

fn write_u64_le(value: u64, buffer: &mut [u8]) {
    let bytes = value.to_le_bytes();
    let copy_len = buffer.len().min(bytes.len());
    buffer[..copy_len].copy_from_slice(&bytes[..copy_len]);
}

fn build_strings(count: usize, size: usize, seed: u64) -> Vec<String> {
    let mut strings = Vec::with_capacity(count);
    for i in 0..count {
        let mut buffer = vec![b'x'; size];
        write_u64_le(seed ^ (i as u64), &mut buffer);
        strings.push(String::from_utf8_lossy(&buffer).into_owned());
    }
    strings
}

fn report(label: &str, ops: usize, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let ops_per_sec = (ops as f64) / secs;
    let nanos_per_op = (secs * 1e9) / (ops as f64);
    println!("{label}: {ops} ops in {secs:.3}s ({ops_per_sec:.0} ops/s, {nanos_per_op:.1} ns/op)");
}

fn main() {
    let runtime = tokio::runtime::Runtime::new().expect("build tokio runtime");
    if let Err(err) = runtime.block_on(run()) {
        eprintln!("bench_store failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> kv_engine::StoreResult<()> {
    let config = BenchConfig::from_args();
    let scratch = tempfile::tempdir().expect("create scratch dir for WAL");

    let store_config = StoreConfig {
        capacity: config.key_count,
        log_file: scratch.path().join("bench.wal"),
        compaction_interval: Duration::from_secs(3600),
        cleanup_interval: Duration::from_secs(3600),
        ..StoreConfig::default()
    };
    let handle = Store::initialize(store_config).await?;
    let store = handle.store.clone();

    let keys = build_strings(config.key_count, config.key_size, 0xA5A5_A5A5_A5A5_A5A5);
    let values = build_strings(config.key_count, config.value_size, 0x5A5A_5A5A_5A5A_5A5A);

    for idx in 0..config.key_count {
        store.set(None, &keys[idx], values[idx].clone(), None).await?;
    }

    println!(
        "keys: requested={}, actual={}, ops={}, key_size={}, value_size={}",
        config.requested_keys, config.key_count, config.op_count, config.key_size, config.value_size
    );

    let mut rng = XorShift64::new(0x1234_5678_9ABC_DEF0);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask) % config.key_count;
        let value = store.get(None, &keys[idx]).await;
        black_box(value);
    }
    report("GET", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x0FED_CBA9_8765_4321);
    let start = Instant::now();
    for _ in 0..config.op_count {
        let idx = rng.next_index(config.key_mask) % config.key_count;
        let mut value = values[idx].clone();
        value.push('!');
        store.set(None, &keys[idx], value, None).await?;
    }
    report("SET", config.op_count, start.elapsed());

    let mut rng = XorShift64::new(0x9E37_79B9_7F4A_7C15);
    let sample_count = config.op_count / 10;
    let start = Instant::now();
    for _ in 0..sample_count {
        let idx = rng.next_index(config.key_mask) % config.key_count;
        let _ = store.delete(None, &keys[idx]).await?;
    }
    report("DEL", sample_count, start.elapsed());

    handle.shutdown().await;
    Ok(())
}
