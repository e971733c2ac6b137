#![forbid(unsafe_code)]

//! Property tests for the FIFO and no-loss guarantees under randomized
//! per-unit delay.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use proptest::collection::vec;
use proptest::prelude::*;
use taskcell::SerialTaskQueue;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 16,
        ..ProptestConfig::default()
    })]

    /// Completions arrive in submission order no matter how each unit's
    /// delay interleaves with later submissions, and none are lost.
    #[test]
    fn completions_preserve_submission_order(delays in vec(0u64..8, 1..8)) {
        let queue = SerialTaskQueue::new();
        let collected = Arc::new(Mutex::new(Vec::new()));

        for (index, delay_ms) in delays.iter().copied().enumerate() {
            let collected = Arc::clone(&collected);
            queue.submit_then(
                move || {
                    thread::sleep(Duration::from_millis(delay_ms));
                    index
                },
                move |result| collected.lock().unwrap().push(result),
            );
        }

        let (reached_tx, reached_rx) = mpsc::channel();
        queue.submit(move || {
            let _ = reached_tx.send(());
            usize::MAX
        });
        reached_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("queue did not drain");

        let expected: Vec<usize> = (0..delays.len()).collect();
        prop_assert_eq!(&*collected.lock().unwrap(), &expected);
    }
}
