// Unless explicitly stated otherwise all files in this repository are licensed
// under the MIT/Apache-2.0 License, at your convenience
//
// Randomized producer/consumer stress run, in the spirit of
// `glommio::channels::spsc_queue`'s own `test_threaded`, generalized to the
// blocking `Read`/`Write` protocol and a randomly chosen capacity/sequence
// length per run rather than one fixed shape.

use std::sync::Arc;
use std::thread;

use rand::Rng;

use taskstream::{Mode, ParkTask, Stream, TaskHandle};

#[test]
fn random_capacity_and_sequence_length_round_trips_every_item() {
    let mut rng = rand::rng();

    for _ in 0..20 {
        let capacity = rng.random_range(1..=64);
        let count = rng.random_range(0..=5_000);

        let stream: Arc<Stream<u64>> = Stream::create(capacity);
        let producer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("stress-producer"));
        let consumer: Arc<dyn TaskHandle> = Arc::new(ParkTask::new("stress-consumer"));

        let wr = stream.open(producer, Mode::Write, None).unwrap();
        let rd = stream.open(consumer, Mode::Read, None).unwrap();

        let writer = thread::spawn(move || {
            for i in 0..count {
                wr.write(i);
            }
        });

        for i in 0..count {
            assert_eq!(rd.read(), i, "capacity={capacity} count={count}");
        }
        writer.join().unwrap();
    }
}
