use std::sync::Arc;

use parking_lot::Mutex;

use crate::coords::Size2;
use crate::core::{ExitSignal, TaskQueue};
use crate::device::RenderDevice;
use crate::error::Result;
use crate::events::{Event, EventDispatcher, WindowSnapshot};

use super::{WindowBackend, WindowBackendKind, WindowConfig, WindowListener};

#[derive(Debug, Clone, Default, PartialEq)]
struct WindowState {
    size: Size2,
    resolution: Size2,
    resizable: bool,
    fullscreen: bool,
    exclusive_fullscreen: bool,
    high_dpi: bool,
    title: String,
    display_id: u32,
}

impl WindowState {
    fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            size: self.size,
            title: self.title.clone(),
            fullscreen: self.fullscreen,
        }
    }
}

/// Engine services a [`Window`] talks to.
#[derive(Debug, Clone)]
pub struct WindowContext {
    /// Runs platform calls; drained by the thread that owns the native window.
    pub main_queue: TaskQueue,
    /// Runs inbound notifications.
    pub update_queue: TaskQueue,
    pub events: EventDispatcher,
    pub device: RenderDevice,
    pub exit: ExitSignal,
}

type SharedBackend = Arc<Mutex<Box<dyn WindowBackend>>>;

/// Application-side window: a cache of the logical window state plus the
/// platform back-end it drives.
///
/// Setters update the cache immediately and defer the platform call to the
/// main queue. Platform notifications come back through [`WindowNotifier`] on
/// the update queue.
pub struct Window {
    state: Arc<Mutex<WindowState>>,
    backend: SharedBackend,
    kind: WindowBackendKind,
    main_queue: TaskQueue,
    events: EventDispatcher,
}

impl Window {
    pub fn new(mut backend: Box<dyn WindowBackend>, ctx: WindowContext) -> Self {
        let state = Arc::new(Mutex::new(WindowState::default()));
        let notifier = WindowNotifier {
            state: Arc::clone(&state),
            update_queue: ctx.update_queue,
            events: ctx.events.clone(),
            device: ctx.device,
            exit: ctx.exit,
        };
        backend.set_listener(Some(Arc::new(notifier)));

        Self {
            state,
            kind: backend.kind(),
            backend: Arc::new(Mutex::new(backend)),
            main_queue: ctx.main_queue,
            events: ctx.events,
        }
    }

    /// Creates the platform window and seeds the cache from what it reports.
    pub fn init(&mut self, config: &WindowConfig) -> Result<()> {
        let mut backend = self.backend.lock();
        backend.init(config)?;

        let mut state = self.state.lock();
        state.size = backend.size();
        state.resolution = backend.resolution();
        state.resizable = config.resizable;
        state.fullscreen = config.fullscreen;
        state.exclusive_fullscreen = config.exclusive_fullscreen;
        state.high_dpi = config.high_dpi;
        state.title = config.title.clone();
        Ok(())
    }

    pub fn backend_kind(&self) -> WindowBackendKind {
        self.kind
    }

    pub fn size(&self) -> Size2 {
        self.state.lock().size
    }

    pub fn resolution(&self) -> Size2 {
        self.state.lock().resolution
    }

    pub fn is_resizable(&self) -> bool {
        self.state.lock().resizable
    }

    pub fn is_fullscreen(&self) -> bool {
        self.state.lock().fullscreen
    }

    pub fn is_exclusive_fullscreen(&self) -> bool {
        self.state.lock().exclusive_fullscreen
    }

    pub fn is_high_dpi(&self) -> bool {
        self.state.lock().high_dpi
    }

    pub fn title(&self) -> String {
        self.state.lock().title.clone()
    }

    pub fn display_id(&self) -> u32 {
        self.state.lock().display_id
    }

    pub fn set_size(&mut self, size: Size2) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.size == size {
                return;
            }
            state.size = size;
            state.snapshot()
        };

        self.on_main(move |backend| backend.set_size(size));
        self.events.post_event(Event::WindowSizeChange(snapshot));
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        let snapshot = {
            let mut state = self.state.lock();
            if state.fullscreen == fullscreen {
                return;
            }
            state.fullscreen = fullscreen;
            state.snapshot()
        };

        self.on_main(move |backend| backend.set_fullscreen(fullscreen));
        self.events.post_event(Event::FullscreenChange(snapshot));
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        let snapshot = {
            let mut state = self.state.lock();
            if state.title == title {
                return;
            }
            state.title.clone_from(&title);
            state.snapshot()
        };

        self.on_main(move |backend| backend.set_title(&title));
        self.events.post_event(Event::WindowTitleChange(snapshot));
    }

    /// Asks the platform to close the window. The exit signal is raised when
    /// the back-end reports the close.
    pub fn close(&self) {
        self.on_main(|backend| backend.close());
    }

    /// Feeds a native event to the back-end. Main thread only.
    pub fn handle_native_event(&self, event: &winit::event::WindowEvent) {
        self.backend.lock().handle_native_event(event);
    }

    fn on_main<F>(&self, f: F)
    where
        F: FnOnce(&mut dyn WindowBackend) + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        self.main_queue.execute(move || f(backend.lock().as_mut()));
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        // Pending main-queue tasks may still hold the back-end; it is torn
        // down when the last of them drops, after this detach.
        self.backend.lock().set_listener(None);
        log::trace!("window detached from {:?} back-end", self.kind);
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("kind", &self.kind)
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// Listener installed on the back-end. Every notification becomes an
/// update-queue task.
struct WindowNotifier {
    state: Arc<Mutex<WindowState>>,
    update_queue: TaskQueue,
    events: EventDispatcher,
    device: RenderDevice,
    exit: ExitSignal,
}

impl WindowNotifier {
    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut WindowState, &EventDispatcher) + Send + 'static,
    {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        self.update_queue.execute(move || f(&mut state.lock(), &events));
    }
}

impl WindowListener for WindowNotifier {
    fn on_size_change(&self, size: Size2) {
        self.update(move |state, events| {
            state.size = size;
            events.post_event(Event::WindowSizeChange(state.snapshot()));
        });
    }

    fn on_resolution_change(&self, resolution: Size2) {
        let device = self.device.clone();
        self.update(move |state, events| {
            state.resolution = resolution;
            device.set_size(resolution);
            events.post_event(Event::ResolutionChange { resolution });
        });
    }

    fn on_fullscreen_change(&self, fullscreen: bool) {
        self.update(move |state, events| {
            state.fullscreen = fullscreen;
            events.post_event(Event::FullscreenChange(state.snapshot()));
        });
    }

    fn on_screen_change(&self, display_id: u32) {
        self.update(move |state, events| {
            state.display_id = display_id;
            events.post_event(Event::ScreenChange { display_id });
        });
    }

    fn on_close(&self) {
        self.exit.raise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{CommandReceiver, DeviceCommand};
    use crate::window::{HeadlessWindow, HeadlessWindowProbe, WindowOp};

    struct Fixture {
        window: Window,
        probe: HeadlessWindowProbe,
        ctx: WindowContext,
        rx: CommandReceiver,
    }

    fn fixture() -> Fixture {
        let (device, rx) = RenderDevice::new();
        let ctx = WindowContext {
            main_queue: TaskQueue::new("main"),
            update_queue: TaskQueue::new("update"),
            events: EventDispatcher::new(),
            device,
            exit: ExitSignal::default(),
        };
        let backend = HeadlessWindow::new();
        let probe = backend.probe();
        let mut window = Window::new(Box::new(backend), ctx.clone());
        window
            .init(&WindowConfig {
                size: Size2::new(800.0, 600.0),
                title: "test".into(),
                ..WindowConfig::default()
            })
            .unwrap();
        Fixture { window, probe, ctx, rx }
    }

    // ── init ──────────────────────────────────────────────────────────────

    #[test]
    fn init_seeds_cache_from_backend() {
        let f = fixture();
        assert_eq!(f.window.size(), Size2::new(800.0, 600.0));
        assert_eq!(f.window.resolution(), Size2::new(800.0, 600.0));
        assert_eq!(f.window.title(), "test");
        assert!(f.window.is_resizable());
        assert!(!f.window.is_fullscreen());
    }

    #[test]
    fn init_failure_is_platform_error_and_keeps_cache() {
        let f = fixture();
        let mut window = Window::new(Box::new(HeadlessWindow::new()), f.ctx.clone());
        let err = window.init(&WindowConfig {
            size: Size2::zero(),
            ..WindowConfig::default()
        });
        assert!(matches!(err, Err(crate::Error::Platform(_))));
        assert_eq!(window.title(), "");
    }

    // ── setters ───────────────────────────────────────────────────────────

    #[test]
    fn unchanged_size_schedules_nothing() {
        let mut f = fixture();
        f.window.set_size(Size2::new(800.0, 600.0));
        assert!(f.ctx.main_queue.is_empty());
        assert_eq!(f.ctx.events.pending(), 0);
    }

    #[test]
    fn changed_size_schedules_one_task_and_one_event() {
        let mut f = fixture();
        f.window.set_size(Size2::new(1024.0, 768.0));

        assert_eq!(f.ctx.main_queue.len(), 1);
        assert_eq!(f.ctx.events.pending(), 1);
        assert_eq!(f.window.size(), Size2::new(1024.0, 768.0));

        match f.ctx.events.poll() {
            Some(Event::WindowSizeChange(snapshot)) => {
                assert_eq!(snapshot.size, Size2::new(1024.0, 768.0));
                assert_eq!(snapshot.title, "test");
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(!f.probe.ops().contains(&WindowOp::SetSize(Size2::new(1024.0, 768.0))));
        f.ctx.main_queue.run_pending();
        assert!(f.probe.ops().contains(&WindowOp::SetSize(Size2::new(1024.0, 768.0))));
    }

    #[test]
    fn title_and_fullscreen_publish_snapshots() {
        let mut f = fixture();
        f.window.set_title("renamed");
        f.window.set_title("renamed");
        f.window.set_fullscreen(true);

        let events = f.ctx.events.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], Event::WindowTitleChange(s) if s.title == "renamed"));
        assert!(matches!(&events[1], Event::FullscreenChange(s) if s.fullscreen && s.title == "renamed"));

        f.ctx.main_queue.run_pending();
        let ops = f.probe.ops();
        assert!(ops.contains(&WindowOp::SetTitle("renamed".into())));
        assert!(ops.contains(&WindowOp::SetFullscreen(true)));
    }

    // ── notifications ─────────────────────────────────────────────────────

    #[test]
    fn notifications_apply_on_update_queue() {
        let f = fixture();
        f.probe.notify_size_change(Size2::new(640.0, 480.0));
        f.probe.notify_screen_change(2);

        assert_eq!(f.window.size(), Size2::new(800.0, 600.0));
        assert_eq!(f.ctx.update_queue.run_pending(), 2);
        assert_eq!(f.window.size(), Size2::new(640.0, 480.0));
        assert_eq!(f.window.display_id(), 2);

        let events = f.ctx.events.drain();
        assert!(matches!(&events[0], Event::WindowSizeChange(s) if s.size == Size2::new(640.0, 480.0)));
        assert_eq!(events[1], Event::ScreenChange { display_id: 2 });
    }

    #[test]
    fn resolution_change_resizes_back_buffer() {
        let f = fixture();
        f.probe.notify_resolution_change(Size2::new(1600.0, 1200.0));
        f.ctx.update_queue.run_pending();

        assert_eq!(f.window.resolution(), Size2::new(1600.0, 1200.0));
        assert_eq!(f.ctx.device.size(), Size2::new(1600.0, 1200.0));
        assert!(matches!(
            f.rx.rx.try_recv(),
            Ok(DeviceCommand::Resize(s)) if s == Size2::new(1600.0, 1200.0)
        ));
        assert_eq!(
            f.ctx.events.poll(),
            Some(Event::ResolutionChange { resolution: Size2::new(1600.0, 1200.0) })
        );
    }

    #[test]
    fn platform_resize_round_trips_through_listener() {
        let mut f = fixture();
        f.window.set_size(Size2::new(300.0, 200.0));
        f.ctx.main_queue.run_pending();
        f.ctx.update_queue.run_pending();
        assert_eq!(f.window.resolution(), Size2::new(300.0, 200.0));
    }

    #[test]
    fn close_raises_exit_through_main_queue() {
        let f = fixture();
        f.window.close();
        assert!(!f.ctx.exit.is_raised());
        f.ctx.main_queue.run_pending();
        assert!(f.ctx.exit.is_raised());
        assert_eq!(f.probe.ops().last(), Some(&WindowOp::Close));
    }

    #[test]
    fn drop_detaches_listener() {
        let f = fixture();
        assert!(f.probe.has_listener());
        let Fixture { window, probe, ctx, .. } = f;
        drop(window);
        assert!(!probe.has_listener());

        probe.notify_close();
        assert!(!ctx.exit.is_raised());
    }
}
