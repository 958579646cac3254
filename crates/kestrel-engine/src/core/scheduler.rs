use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// FIFO of closures run later on the thread that owns the queue.
///
/// The engine keeps two: the main (platform) queue and the update queue.
/// Cloning shares the queue.
#[derive(Clone)]
pub struct TaskQueue {
    name: &'static str,
    tx: flume::Sender<Task>,
    rx: flume::Receiver<Task>,
}

impl TaskQueue {
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = flume::unbounded();
        Self { name, tx, rx }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queues `task`. Never blocks.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.tx.send(Box::new(task));
    }

    /// Runs the tasks queued so far, in order. Tasks queued by those tasks
    /// run on the next call. Returns the number executed.
    pub fn run_pending(&self) -> usize {
        let count = self.rx.len();
        let mut ran = 0;
        for task in self.rx.try_iter().take(count) {
            task();
            ran += 1;
        }
        if ran > 0 {
            log::trace!("{} queue ran {ran} task(s)", self.name);
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.name)
            .field("pending", &self.len())
            .finish()
    }
}

/// Shared "please stop" flag raised by window close or the application.
#[derive(Debug, Clone, Default)]
pub struct ExitSignal(Arc<AtomicBool>);

impl ExitSignal {
    pub fn raise(&self) {
        if !self.0.swap(true, Ordering::AcqRel) {
            log::info!("exit requested");
        }
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn tasks_run_in_fifo_order() {
        let queue = TaskQueue::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.execute(move || log.lock().push(i));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert!(queue.is_empty());
    }

    #[test]
    fn requeued_task_waits_for_next_run() {
        let queue = TaskQueue::new("test");
        let inner = queue.clone();
        queue.execute(move || inner.execute(|| {}));

        assert_eq!(queue.run_pending(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn exit_signal_is_shared() {
        let signal = ExitSignal::default();
        let other = signal.clone();
        other.raise();
        assert!(signal.is_raised());
    }
}
