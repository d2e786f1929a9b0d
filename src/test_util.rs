//! Shared helpers for the unit tests.

pub(crate) mod test_sync {
    use std::sync::{Mutex, MutexGuard, Once, OnceLock};

    static CONTEXT_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    static TRACING: Once = Once::new();

    /// Serializes tests that touch the global ImGui context.
    ///
    /// The library keeps the current context in thread-agnostic global
    /// state, so context-creating tests must not overlap. Also installs a
    /// capture-friendly subscriber so the crate's tracing output shows up
    /// in failing tests (filter via `RUST_LOG`).
    pub(crate) fn lock_context() -> MutexGuard<'static, ()> {
        TRACING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
        CONTEXT_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) mod mock {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    use crate::error::HostBackendResult;
    use crate::host::{
        DisplayInfo, HostRenderer, HostTextureId, HostWindow, HostWindowing, RenderTargetId,
        ViewportEvents, WindowDesc,
    };

    /// Observable state of one mock window, shared between the window
    /// handle and the engine's registry.
    #[derive(Debug, Clone)]
    pub(crate) struct WindowState {
        pub pos: [i32; 2],
        pub size: [i32; 2],
        pub title: String,
        pub visible: bool,
        pub focused: bool,
        pub minimized: bool,
    }

    struct EngineState {
        next_native_id: u64,
        windows: HashMap<u64, Rc<RefCell<WindowState>>>,
        destroyed: usize,
        embeds_subwindows: bool,
        displays: Vec<DisplayInfo>,
    }

    /// In-memory stand-in for a host engine's window manager.
    ///
    /// Clones share state, so a test can keep one handle for assertions
    /// while the backend owns another.
    #[derive(Clone)]
    pub(crate) struct MockEngine {
        state: Rc<RefCell<EngineState>>,
    }

    impl MockEngine {
        pub(crate) fn new() -> Self {
            Self {
                state: Rc::new(RefCell::new(EngineState {
                    next_native_id: 1,
                    windows: HashMap::new(),
                    destroyed: 0,
                    embeds_subwindows: false,
                    displays: Vec::new(),
                })),
            }
        }

        /// Second handle onto the same engine state.
        pub(crate) fn handle(&self) -> Self {
            self.clone()
        }

        pub(crate) fn live_window_count(&self) -> usize {
            self.state.borrow().windows.len()
        }

        pub(crate) fn destroyed_window_count(&self) -> usize {
            self.state.borrow().destroyed
        }

        pub(crate) fn window_state(&self, native_id: u64) -> Option<WindowState> {
            self.state
                .borrow()
                .windows
                .get(&native_id)
                .map(|s| s.borrow().clone())
        }

        pub(crate) fn set_displays(&self, displays: Vec<DisplayInfo>) {
            self.state.borrow_mut().displays = displays;
        }

        pub(crate) fn set_embeds_subwindows(&self, embed: bool) {
            self.state.borrow_mut().embeds_subwindows = embed;
        }

        pub(crate) fn embeds_subwindows(&self) -> bool {
            self.state.borrow().embeds_subwindows
        }

        /// Window created by the host itself, outside any platform
        /// callback. Used as a stand-in for the engine's primary window.
        pub(crate) fn create_external_window(
            &self,
            pos: [i32; 2],
            size: [i32; 2],
        ) -> Box<dyn HostWindow> {
            self.register_window(WindowState {
                pos,
                size,
                title: "host main".to_owned(),
                visible: true,
                focused: true,
                minimized: false,
            })
        }

        fn register_window(&self, state: WindowState) -> Box<dyn HostWindow> {
            let mut engine = self.state.borrow_mut();
            let native_id = engine.next_native_id;
            engine.next_native_id += 1;
            let state = Rc::new(RefCell::new(state));
            engine.windows.insert(native_id, state.clone());
            Box::new(MockWindow { native_id, state })
        }
    }

    struct MockWindow {
        native_id: u64,
        state: Rc<RefCell<WindowState>>,
    }

    impl HostWindow for MockWindow {
        fn native_id(&self) -> u64 {
            self.native_id
        }

        fn show(&mut self) {
            self.state.borrow_mut().visible = true;
        }

        fn position(&self) -> [i32; 2] {
            self.state.borrow().pos
        }

        fn set_position(&mut self, pos: [i32; 2]) {
            self.state.borrow_mut().pos = pos;
        }

        fn size(&self) -> [i32; 2] {
            self.state.borrow().size
        }

        fn set_size(&mut self, size: [i32; 2]) {
            self.state.borrow_mut().size = size;
        }

        fn focus(&mut self) {
            self.state.borrow_mut().focused = true;
        }

        fn has_focus(&self) -> bool {
            self.state.borrow().focused
        }

        fn is_minimized(&self) -> bool {
            self.state.borrow().minimized
        }

        fn set_title(&mut self, title: &str) {
            self.state.borrow_mut().title = title.to_owned();
        }
    }

    impl HostWindowing for MockEngine {
        fn create_window(
            &mut self,
            desc: &WindowDesc,
            _events: ViewportEvents,
        ) -> HostBackendResult<Box<dyn HostWindow>> {
            Ok(self.register_window(WindowState {
                pos: desc.pos,
                size: desc.size,
                title: desc.title.clone(),
                visible: false,
                focused: false,
                minimized: false,
            }))
        }

        fn destroy_window(&mut self, window: Box<dyn HostWindow>) {
            let mut engine = self.state.borrow_mut();
            engine.windows.remove(&window.native_id());
            engine.destroyed += 1;
        }

        fn displays(&self) -> Vec<DisplayInfo> {
            self.state.borrow().displays.clone()
        }

        fn embeds_subwindows(&self) -> bool {
            self.state.borrow().embeds_subwindows
        }

        fn set_embeds_subwindows(&mut self, embed: bool) {
            self.state.borrow_mut().embeds_subwindows = embed;
        }
    }

    #[derive(Debug, PartialEq)]
    enum RendererOp {
        CreateTexture(HostTextureId),
        FreeTexture(HostTextureId),
        CreateTarget(RenderTargetId),
        ReleaseTarget(RenderTargetId),
    }

    /// Records every renderer call in order so tests can assert on
    /// resource lifetimes, not just final counts.
    pub(crate) struct MockRenderer {
        next_id: u64,
        ops: Vec<RendererOp>,
        live_textures: Vec<HostTextureId>,
        live_targets: Vec<RenderTargetId>,
    }

    impl MockRenderer {
        pub(crate) fn new() -> Self {
            Self {
                next_id: 1,
                ops: Vec::new(),
                live_textures: Vec::new(),
                live_targets: Vec::new(),
            }
        }

        pub(crate) fn live_textures(&self) -> usize {
            self.live_textures.len()
        }

        pub(crate) fn live_render_targets(&self) -> usize {
            self.live_targets.len()
        }

        /// Position of the creation of `texture` in the op log.
        pub(crate) fn op_index_create(&self, texture: HostTextureId) -> Option<usize> {
            self.ops
                .iter()
                .position(|op| *op == RendererOp::CreateTexture(texture))
        }

        /// Position of the release of `texture` in the op log.
        pub(crate) fn op_index_free(&self, texture: HostTextureId) -> Option<usize> {
            self.ops
                .iter()
                .position(|op| *op == RendererOp::FreeTexture(texture))
        }
    }

    impl HostRenderer for MockRenderer {
        fn create_render_target(&mut self, _window: &dyn HostWindow) -> RenderTargetId {
            let target = RenderTargetId(self.next_id);
            self.next_id += 1;
            self.live_targets.push(target);
            self.ops.push(RendererOp::CreateTarget(target));
            target
        }

        fn release_render_target(&mut self, target: RenderTargetId) {
            self.live_targets.retain(|t| *t != target);
            self.ops.push(RendererOp::ReleaseTarget(target));
        }

        fn create_texture_rgba(&mut self, width: u32, height: u32, pixels: &[u8]) -> HostTextureId {
            assert_eq!(pixels.len(), width as usize * height as usize * 4);
            let texture = HostTextureId(self.next_id);
            self.next_id += 1;
            self.live_textures.push(texture);
            self.ops.push(RendererOp::CreateTexture(texture));
            texture
        }

        fn free_texture(&mut self, texture: HostTextureId) {
            self.live_textures.retain(|t| *t != texture);
            self.ops.push(RendererOp::FreeTexture(texture));
        }
    }
}
