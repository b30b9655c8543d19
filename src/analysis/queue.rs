use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::runner::{AnalysisListener, AnalysisRunner};
use crate::modules::QcModule;
use crate::seq::SequenceSource;

/// How often the coordinator wakes to check for free slots. Analyses run
/// for seconds to minutes, so start latency at this scale is invisible.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

struct Task {
    source: Box<dyn SequenceSource>,
    modules: Vec<Box<dyn QcModule>>,
    listeners: Vec<Arc<dyn AnalysisListener>>,
}

struct QueueState {
    slots: usize,
    running: AtomicUsize,
    queued: AtomicUsize,
    shutdown: AtomicBool,
}

/// Bounded-concurrency FIFO scheduler. Tasks are started in submission
/// order, at most `slots` at a time, each on its own thread; the slot is
/// released exactly once when the task's runner returns, whether it ended
/// in completion or error.
pub struct AnalysisQueue {
    tx: Sender<Task>,
    state: Arc<QueueState>,
    coordinator: Option<thread::JoinHandle<()>>,
}

impl AnalysisQueue {
    pub fn new(slots: usize) -> AnalysisQueue {
        let slots = slots.max(1);
        let (tx, rx) = unbounded::<Task>();
        let state = Arc::new(QueueState {
            slots,
            running: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });

        let coordinator_state = Arc::clone(&state);
        let coordinator = thread::spawn(move || coordinate(rx, coordinator_state));

        AnalysisQueue {
            tx,
            state,
            coordinator: Some(coordinator),
        }
    }

    /// Queue one analysis. The task starts when a slot frees up; listeners
    /// hear nothing until it does.
    pub fn enqueue(
        &self,
        source: Box<dyn SequenceSource>,
        modules: Vec<Box<dyn QcModule>>,
        listeners: Vec<Arc<dyn AnalysisListener>>,
    ) {
        self.state.queued.fetch_add(1, Ordering::SeqCst);
        // The receiver outlives every sender until shutdown, so this only
        // fails after drop, when nothing should be enqueueing anyway.
        if self.tx
            .send(Task {
                source,
                modules,
                listeners,
            })
            .is_err()
        {
            self.state.queued.fetch_sub(1, Ordering::SeqCst);
            log::warn!("analysis queue is shut down; task dropped");
        }
    }

    /// Block until every queued and running task has finished.
    pub fn wait_idle(&self) {
        while self.state.queued.load(Ordering::SeqCst) > 0
            || self.state.running.load(Ordering::SeqCst) > 0
        {
            thread::sleep(Duration::from_millis(50));
        }
    }

    pub fn running(&self) -> usize {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.state.queued.load(Ordering::SeqCst)
    }
}

impl Drop for AnalysisQueue {
    fn drop(&mut self) {
        self.state.shutdown.store(true, Ordering::SeqCst);
        if let Some(coordinator) = self.coordinator.take() {
            let _ = coordinator.join();
        }
    }
}

fn coordinate(rx: Receiver<Task>, state: Arc<QueueState>) {
    loop {
        if state.shutdown.load(Ordering::SeqCst) {
            break;
        }

        while state.running.load(Ordering::SeqCst) < state.slots {
            let Ok(task) = rx.try_recv() else {
                break;
            };
            state.running.fetch_add(1, Ordering::SeqCst);
            state.queued.fetch_sub(1, Ordering::SeqCst);

            let task_state = Arc::clone(&state);
            thread::spawn(move || {
                let runner = AnalysisRunner::with_listeners(task.listeners);
                runner.run(task.source, task.modules);
                task_state.running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::error::{QcError, Result};
    use crate::modules::BasicStats;
    use crate::seq::{SeqRecord, SequenceSource};

    struct SlowSource {
        name: String,
        remaining: usize,
        total: usize,
    }

    impl SlowSource {
        fn new(name: &str, records: usize) -> SlowSource {
            SlowSource {
                name: name.to_string(),
                remaining: records,
                total: records,
            }
        }
    }

    impl SequenceSource for SlowSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn path(&self) -> &std::path::Path {
            std::path::Path::new("slow")
        }

        fn has_next(&mut self) -> bool {
            self.remaining > 0
        }

        fn next_record(&mut self) -> Result<SeqRecord> {
            std::thread::sleep(Duration::from_millis(10));
            self.remaining -= 1;
            Ok(SeqRecord::new(
                std::sync::Arc::from(self.name.as_str()),
                "read".to_string(),
                b"ACGT".to_vec(),
                b"IIII".to_vec(),
            ))
        }

        fn percent_complete(&self) -> f64 {
            (self.total - self.remaining) as f64 / self.total as f64 * 100.0
        }
    }

    /// Tracks how many tasks are between their started and terminal
    /// events at once.
    #[derive(Default)]
    struct GaugeListener {
        active: AtomicUsize,
        peak: AtomicUsize,
        order: Mutex<Vec<String>>,
    }

    impl GaugeListener {
        fn settle(&self, delta_done: &str) {
            self.order.lock().unwrap().push(delta_done.to_string());
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl AnalysisListener for GaugeListener {
        fn analysis_started(&self, _source_name: &str) {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn analysis_progress(&self, _source_name: &str, _records: u64, _percent: f64) {}

        fn analysis_complete(&self, source_name: &str, _modules: &[Box<dyn QcModule>]) {
            self.settle(source_name);
        }

        fn analysis_error(&self, source_name: &str, _error: &QcError) {
            self.settle(source_name);
        }
    }

    #[test]
    fn concurrency_never_exceeds_slot_count() {
        let queue = AnalysisQueue::new(2);
        let listener = Arc::new(GaugeListener::default());

        for i in 0..5 {
            queue.enqueue(
                Box::new(SlowSource::new(&format!("sample{}", i), 20)),
                vec![Box::new(BasicStats::new())],
                vec![listener.clone()],
            );
        }
        queue.wait_idle();

        assert_eq!(listener.order.lock().unwrap().len(), 5);
        assert!(listener.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn single_slot_preserves_submission_order() {
        let queue = AnalysisQueue::new(1);
        let listener = Arc::new(GaugeListener::default());

        for i in 0..3 {
            queue.enqueue(
                Box::new(SlowSource::new(&format!("sample{}", i), 5)),
                vec![Box::new(BasicStats::new())],
                vec![listener.clone()],
            );
        }
        queue.wait_idle();

        let order = listener.order.lock().unwrap();
        assert_eq!(*order, vec!["sample0", "sample1", "sample2"]);
    }

    #[test]
    fn wait_idle_on_empty_queue_returns_immediately() {
        let queue = AnalysisQueue::new(1);
        queue.wait_idle();
        assert_eq!(queue.running(), 0);
        assert_eq!(queue.queued(), 0);
    }
}
