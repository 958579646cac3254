use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::coords::Size2;

use super::command::{DeviceCommand, DeviceTask};
use super::id::IdAllocator;
use super::{DeviceBackend, DeviceId, ResourceId, ResourceKey};

/// Application-side handle to a device's command queue.
///
/// Cloning is cheap; every clone feeds the same FIFO. Submitting never blocks
/// and never waits for the device thread.
#[derive(Clone)]
pub struct RenderDevice {
    shared: Arc<Shared>,
}

struct Shared {
    id: DeviceId,
    ids: IdAllocator,
    tx: flume::Sender<DeviceCommand>,
    alive: AtomicBool,
    back_buffer: Mutex<Size2>,
    stats: Arc<StatsCounters>,
}

/// Receiving end handed to the worker.
pub(crate) struct CommandReceiver {
    pub(crate) rx: flume::Receiver<DeviceCommand>,
    pub(crate) stats: Arc<StatsCounters>,
}

impl RenderDevice {
    pub(crate) fn new() -> (Self, CommandReceiver) {
        let id = DeviceId::next();
        let (tx, rx) = flume::unbounded();
        let stats = Arc::new(StatsCounters::default());

        let device = Self {
            shared: Arc::new(Shared {
                id,
                ids: IdAllocator::new(id),
                tx,
                alive: AtomicBool::new(true),
                back_buffer: Mutex::new(Size2::zero()),
                stats: Arc::clone(&stats),
            }),
        };

        (device, CommandReceiver { rx, stats })
    }

    #[inline]
    pub fn id(&self) -> DeviceId {
        self.shared.id
    }

    /// False once the device has been shut down.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    pub(crate) fn allocate<T: From<ResourceId>>(&self) -> T {
        self.shared.ids.allocate()
    }

    /// Enqueues a command. Commands submitted after shutdown are dropped.
    pub fn submit(&self, command: DeviceCommand) {
        if !self.is_alive() {
            log::debug!("device {} is shut down, dropping {command:?}", self.shared.id);
            return;
        }

        self.shared.stats.submitted.fetch_add(1, Ordering::Relaxed);
        if let Err(flume::SendError(command)) = self.shared.tx.send(command) {
            log::debug!("device {} worker is gone, dropping {command:?}", self.shared.id);
        }
    }

    /// Runs `task` on the device thread, after every command already queued.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce(&mut dyn DeviceBackend) + Send + 'static,
    {
        let task: DeviceTask = Box::new(task);
        self.submit(DeviceCommand::Execute(task));
    }

    /// Schedules release of a back-end resource if the device is still running.
    pub(crate) fn release(&self, key: ResourceKey) {
        if self.is_alive() {
            self.submit(DeviceCommand::Release(key));
        }
    }

    /// Records the new back-buffer size and schedules the resize.
    pub fn set_size(&self, size: Size2) {
        *self.shared.back_buffer.lock() = size;
        self.submit(DeviceCommand::Resize(size));
    }

    /// Last back-buffer size requested through [`RenderDevice::set_size`].
    pub fn size(&self) -> Size2 {
        *self.shared.back_buffer.lock()
    }

    /// Number of commands waiting for the device thread.
    pub fn pending(&self) -> usize {
        self.shared.tx.len()
    }

    pub fn stats(&self) -> DeviceStats {
        self.shared.stats.snapshot()
    }

    pub(crate) fn mark_shut_down(&self) {
        self.shared.alive.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for RenderDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDevice")
            .field("id", &self.shared.id)
            .field("alive", &self.is_alive())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Counters shared between the queue handle and the worker.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) applied: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) unknown_resource: AtomicU64,
    pub(crate) draw_calls: AtomicU64,
    pub(crate) frames: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> DeviceStats {
        DeviceStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unknown_resource: self.unknown_resource.load(Ordering::Relaxed),
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of device activity.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct DeviceStats {
    pub submitted: u64,
    /// Commands executed successfully.
    pub applied: u64,
    /// Commands that failed on the device thread (including unknown ids).
    pub failed: u64,
    /// Commands that named a resource missing from the device tables.
    pub unknown_resource: u64,
    pub draw_calls: u64,
    pub frames: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_after_shutdown_is_dropped() {
        let (device, receiver) = RenderDevice::new();
        device.submit(DeviceCommand::Present);
        device.mark_shut_down();
        device.submit(DeviceCommand::Present);

        assert_eq!(receiver.rx.len(), 1);
        assert_eq!(device.stats().submitted, 1);
    }

    #[test]
    fn set_size_updates_cache_and_queues_resize() {
        let (device, receiver) = RenderDevice::new();
        device.set_size(Size2::new(640.0, 480.0));

        assert_eq!(device.size(), Size2::new(640.0, 480.0));
        assert!(matches!(receiver.rx.try_recv(), Ok(DeviceCommand::Resize(s)) if s.width == 640.0));
    }

    #[test]
    fn submit_with_dropped_receiver_does_not_panic() {
        let (device, receiver) = RenderDevice::new();
        drop(receiver);
        device.submit(DeviceCommand::Present);
        assert!(device.is_alive());
    }
}
