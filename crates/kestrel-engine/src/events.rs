//! Engine events and the dispatcher that carries them.
//!
//! Posting is fire-and-forget from any thread. Events are delivered to the
//! registered handlers when the owner of the engine loop calls
//! [`EventDispatcher::dispatch_events`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::coords::Size2;

/// Window fields captured when a window event is posted.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    pub size: Size2,
    pub title: String,
    pub fullscreen: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WindowSizeChange(WindowSnapshot),
    WindowTitleChange(WindowSnapshot),
    FullscreenChange(WindowSnapshot),
    /// Back-buffer resolution changed (physical pixels).
    ResolutionChange { resolution: Size2 },
    /// The window moved to another display.
    ScreenChange { display_id: u32 },
}

/// Token returned by [`EventDispatcher::add_handler`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&Event) + Send + 'static>;

/// FIFO of posted events plus the handlers they are dispatched to.
///
/// Cloning shares the queue and the handler list.
#[derive(Clone)]
pub struct EventDispatcher {
    tx: flume::Sender<Event>,
    rx: flume::Receiver<Event>,
    handlers: Arc<Mutex<Vec<(HandlerId, Handler)>>>,
    next_handler: Arc<AtomicU64>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            handlers: Arc::new(Mutex::new(Vec::new())),
            next_handler: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Queues an event. Never blocks.
    pub fn post_event(&self, event: Event) {
        log::trace!("event posted: {event:?}");
        // Both ends live in `self`, so the channel cannot be disconnected here.
        let _ = self.tx.send(event);
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Takes the oldest undelivered event without running handlers.
    pub fn poll(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Takes every undelivered event without running handlers.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    /// Registers a handler. Handlers run in registration order and must not
    /// add or remove handlers themselves.
    pub fn add_handler<F>(&self, handler: F) -> HandlerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        self.handlers.lock().push((id, Box::new(handler)));
        id
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(h, _)| *h != id);
        handlers.len() != before
    }

    /// Delivers the events queued so far to every handler. Events posted by
    /// handlers wait for the next call.
    pub fn dispatch_events(&self) -> usize {
        let events = self.drain();
        if events.is_empty() {
            return 0;
        }

        let mut handlers = self.handlers.lock();
        for event in &events {
            for (_, handler) in handlers.iter_mut() {
                handler(event);
            }
        }
        events.len()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("pending", &self.pending())
            .field("handlers", &self.handlers.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(id: u32) -> Event {
        Event::ScreenChange { display_id: id }
    }

    #[test]
    fn handlers_receive_events_in_post_order() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        dispatcher.add_handler(move |e| sink.lock().push(e.clone()));

        dispatcher.post_event(screen(1));
        dispatcher.post_event(screen(2));
        assert_eq!(dispatcher.dispatch_events(), 2);

        assert_eq!(*seen.lock(), vec![screen(1), screen(2)]);
        assert_eq!(dispatcher.pending(), 0);
    }

    #[test]
    fn removed_handler_is_not_called() {
        let dispatcher = EventDispatcher::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let id = dispatcher.add_handler(move |_| {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        assert!(dispatcher.remove_handler(id));
        assert!(!dispatcher.remove_handler(id));
        dispatcher.post_event(screen(0));
        dispatcher.dispatch_events();

        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn events_posted_during_dispatch_wait_for_next_round() {
        let dispatcher = EventDispatcher::new();
        let poster = dispatcher.clone();
        dispatcher.add_handler(move |e| {
            if *e == screen(1) {
                poster.post_event(screen(2));
            }
        });

        dispatcher.post_event(screen(1));
        assert_eq!(dispatcher.dispatch_events(), 1);
        assert_eq!(dispatcher.drain(), vec![screen(2)]);
    }
}
