//! End-to-end check that file configuration reaches pool behavior.
//!
//! Lives in its own integration binary: the `FETCHPOOL_CONFIG` variable must
//! be set before anything touches the shared configuration, and other test
//! binaries would race with that.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fetchpool::Job;
use tempfile::TempDir;

#[tokio::test]
async fn configured_default_workers_bound_pool_concurrency() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("fetchpool.toml");
    fs::write(&config_path, "[pool]\ndefault_workers = 2\n").unwrap();

    // Safety: this test binary is single-threaded at this point and nothing
    // has read the shared configuration yet.
    unsafe {
        std::env::set_var("FETCHPOOL_CONFIG", &config_path);
    }

    let current = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let task = {
        let current = Arc::clone(&current);
        let peak = Arc::clone(&peak);
        move |n: u32| {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            async move {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                current.fetch_sub(1, Ordering::SeqCst);
                Ok::<u32, ()>(n)
            }
        }
    };

    // workers(0) means "use the configured default", which the file above
    // pins to two.
    let run = Job::new(task, (0..10).collect::<Vec<u32>>())
        .workers(0)
        .run()
        .await;

    assert!(run.error.is_none());
    for (index, slot) in run.results.iter().enumerate() {
        assert_eq!(slot.as_ref().and_then(|r| r.as_ref().ok()), Some(&(index as u32)));
    }

    let observed_peak = peak.load(Ordering::SeqCst);
    assert!(observed_peak >= 1, "pool never ran a task");
    assert!(
        observed_peak <= 2,
        "configured worker cap exceeded: peak concurrency was {observed_peak}"
    );
}
