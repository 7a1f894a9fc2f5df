// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience
//
// Manual-timing throughput probe, adapted from the teacher's own
// `benches/spsc_queue.rs`. CPU pinning via `libc` is dropped along with
// that dependency (see DESIGN.md); what's measured here is the cost of
// the full blocking `Read`/`Write` protocol end to end, not the bare ring
// buffer in isolation.

use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use taskstream::{Mode, ParkTask, Stream, TaskHandle};

const RUNS: usize = 1_000_000;

fn bench_spsc(capacity: usize) {
    let stream: Arc<Stream<u32>> = Stream::create(capacity);
    let producer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("bench-producer"));
    let consumer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("bench-consumer"));

    let wr = stream.open(producer, Mode::Write, None).unwrap();
    let rd = stream.open(consumer, Mode::Read, None).unwrap();

    let consumer_thread = thread::spawn(move || {
        let start = Instant::now();
        for _ in 0..RUNS {
            black_box(rd.read());
        }
        start.elapsed()
    });

    let start = Instant::now();
    for i in 0..RUNS {
        wr.write(i as u32);
    }
    let prod_elapsed = start.elapsed();
    let cons_elapsed = consumer_thread.join().unwrap();

    let prod_ns = prod_elapsed.as_nanos() as f64 / RUNS as f64;
    let cons_ns = cons_elapsed.as_nanos() as f64 / RUNS as f64;
    let prod_kops = (1e9 / prod_ns) / 1e3;
    let cons_kops = (1e9 / cons_ns) / 1e3;

    println!(
        "Cap {:>6} | Prod {:>8.2} ns/op ({:>10.2} KOPS) | Cons {:>8.2} ns/op ({:>10.2} KOPS)",
        capacity, prod_ns, prod_kops, cons_ns, cons_kops
    );
}

fn main() {
    for &capacity in &[1, 16, 1024, 4096, 10_000] {
        bench_spsc(capacity);
    }
}
