//! Multi-viewport support: the platform callback table and the window table
//! behind it.
//!
//! Dear ImGui drives secondary windows through a table of C function
//! pointers. The table is installed once at init; each entry is a free
//! function that recovers the single [`ViewportManager`] through
//! thread-local storage and forwards to a method on it. Viewports carry only
//! a small slot key in their `PlatformUserData` field, so no Rust reference
//! ever lives inside library-owned memory.
//!
//! Callback failure policy: a callback invoked with a stale slot key is a
//! contract violation on the library side. It trips a `debug_assert!` in
//! debug builds and no-ops in release builds; a null key falls back to the
//! viewport's stored geometry (that is the normal state of the main viewport
//! before [`set_main_window`] runs).

use std::cell::RefCell;
use std::ffi::{CStr, c_char, c_void};
use std::rc::Rc;

use dear_imgui_rs::platform_io::Viewport;
use dear_imgui_rs::{BackendFlags, Context};
use dear_imgui_sys as sys;
use tracing::{debug, warn};

use crate::error::{HostBackendError, HostBackendResult};
use crate::host::{
    HostRenderer, HostWindow, HostWindowing, RenderTargetId, ViewportEvents, WindowDesc,
    WindowHints, decode_slot, encode_slot,
};
use crate::monitors;

// One manager per UI thread; callbacks always arrive on the thread that
// installed it.
thread_local! {
    static MANAGER: RefCell<Option<ViewportManager>> = const { RefCell::new(None) };
}

/// One entry of the window table.
struct ViewportWindow {
    window: Box<dyn HostWindow>,
    render_target: Option<RenderTargetId>,
    /// `false` only for the borrowed main window.
    owned: bool,
}

/// Owns every host window created on the library's behalf.
pub struct ViewportManager {
    windowing: Box<dyn HostWindowing>,
    renderer: Rc<RefCell<dyn HostRenderer>>,
    slots: Vec<Option<ViewportWindow>>,
    free_slots: Vec<u32>,
    warned_embedding: bool,
}

impl ViewportManager {
    fn new(windowing: Box<dyn HostWindowing>, renderer: Rc<RefCell<dyn HostRenderer>>) -> Self {
        Self {
            windowing,
            renderer,
            slots: Vec::new(),
            free_slots: Vec::new(),
            warned_embedding: false,
        }
    }

    fn insert_slot(&mut self, entry: ViewportWindow) -> u32 {
        if let Some(key) = self.free_slots.pop() {
            self.slots[key as usize] = Some(entry);
            key
        } else {
            self.slots.push(Some(entry));
            (self.slots.len() - 1) as u32
        }
    }

    fn slot(&self, key: u32) -> Option<&ViewportWindow> {
        self.slots.get(key as usize)?.as_ref()
    }

    fn slot_mut(&mut self, key: u32) -> Option<&mut ViewportWindow> {
        self.slots.get_mut(key as usize)?.as_mut()
    }

    // Removes the entry without recycling the key; call `recycle_slot` once
    // the window and render target are actually gone.
    fn take_slot(&mut self, key: u32) -> Option<ViewportWindow> {
        self.slots.get_mut(key as usize)?.take()
    }

    fn recycle_slot(&mut self, key: u32) {
        self.free_slots.push(key);
    }

    fn live_windows(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    fn owned_windows(&self) -> usize {
        self.slots.iter().flatten().filter(|s| s.owned).count()
    }

    fn resolve(&self, vp: &Viewport) -> Option<&ViewportWindow> {
        let key = decode_slot(vp.platform_user_data())?;
        let slot = self.slot(key);
        debug_assert!(slot.is_some(), "callback with stale viewport slot {key}");
        slot
    }

    fn resolve_mut(&mut self, vp: &Viewport) -> Option<&mut ViewportWindow> {
        let key = decode_slot(vp.platform_user_data())?;
        let slot = self.slot_mut(key);
        debug_assert!(slot.is_some(), "callback with stale viewport slot {key}");
        slot
    }

    fn create_window(&mut self, vp: &mut Viewport) {
        self.correct_embedding_conflict();

        let pos = vp.pos();
        let size = vp.size();
        let desc = WindowDesc {
            title: "ImGui Viewport".to_owned(),
            pos: [pos[0].round() as i32, pos[1].round() as i32],
            size: [size[0].round() as i32, size[1].round() as i32],
            hints: WindowHints::from_viewport_flags(vp.flags() as i32),
        };
        let events = ViewportEvents::new(vp.id());

        match self.windowing.create_window(&desc, events) {
            Ok(window) => {
                let render_target = self
                    .renderer
                    .borrow_mut()
                    .create_render_target(window.as_ref());
                let native_id = window.native_id();
                let key = self.insert_slot(ViewportWindow {
                    window,
                    render_target: Some(render_target),
                    owned: true,
                });
                vp.set_platform_user_data(encode_slot(key));
                vp.set_platform_handle(native_id as *mut c_void);
                debug!(viewport = vp.id(), slot = key, "created viewport window");
            }
            Err(err) => {
                warn!(viewport = vp.id(), error = %err, "viewport window creation failed");
            }
        }
    }

    fn destroy_window(&mut self, vp: &mut Viewport) {
        let Some(key) = decode_slot(vp.platform_user_data()) else {
            return;
        };
        let owned = match self.slot(key) {
            Some(slot) => slot.owned,
            None => {
                debug_assert!(false, "destroy callback with stale viewport slot {key}");
                return;
            }
        };
        if !owned {
            // The borrowed main window is never destroyed through this path.
            return;
        }
        if let Some(slot) = self.take_slot(key) {
            if let Some(target) = slot.render_target {
                self.renderer.borrow_mut().release_render_target(target);
            }
            self.windowing.destroy_window(slot.window);
            self.recycle_slot(key);
        }
        vp.set_platform_user_data(std::ptr::null_mut());
        vp.set_platform_handle(std::ptr::null_mut());
        debug!(viewport = vp.id(), slot = key, "destroyed viewport window");
    }

    fn show_window(&mut self, vp: &Viewport) {
        if let Some(slot) = self.resolve_mut(vp) {
            slot.window.show();
        }
    }

    fn window_pos(&self, vp: &Viewport) -> sys::ImVec2 {
        match self.resolve(vp) {
            Some(slot) => {
                let pos = slot.window.position();
                sys::ImVec2 {
                    x: pos[0] as f32,
                    y: pos[1] as f32,
                }
            }
            None => {
                let pos = vp.pos();
                sys::ImVec2 {
                    x: pos[0],
                    y: pos[1],
                }
            }
        }
    }

    fn set_window_pos(&mut self, vp: &Viewport, pos: sys::ImVec2) {
        if let Some(slot) = self.resolve_mut(vp) {
            slot.window
                .set_position([pos.x.round() as i32, pos.y.round() as i32]);
        }
    }

    fn window_size(&self, vp: &Viewport) -> sys::ImVec2 {
        match self.resolve(vp) {
            Some(slot) => {
                let size = slot.window.size();
                sys::ImVec2 {
                    x: size[0] as f32,
                    y: size[1] as f32,
                }
            }
            None => {
                let size = vp.size();
                sys::ImVec2 {
                    x: size[0],
                    y: size[1],
                }
            }
        }
    }

    fn set_window_size(&mut self, vp: &Viewport, size: sys::ImVec2) {
        if let Some(slot) = self.resolve_mut(vp) {
            slot.window
                .set_size([size.x.round() as i32, size.y.round() as i32]);
        }
    }

    fn set_window_focus(&mut self, vp: &Viewport) {
        if let Some(slot) = self.resolve_mut(vp) {
            slot.window.focus();
        }
    }

    fn window_focus(&self, vp: &Viewport) -> bool {
        match self.resolve(vp) {
            Some(slot) => slot.window.has_focus(),
            // A main viewport we never adopted is assumed focused while the
            // host runs.
            None => vp.is_main(),
        }
    }

    fn window_minimized(&self, vp: &Viewport) -> bool {
        match self.resolve(vp) {
            Some(slot) => slot.window.is_minimized(),
            None => false,
        }
    }

    fn set_window_title(&mut self, vp: &Viewport, title: &str) {
        if let Some(slot) = self.resolve_mut(vp) {
            slot.window.set_title(title);
        }
    }

    fn correct_embedding_conflict(&mut self) {
        let viewports_enabled = unsafe {
            let io = sys::igGetIO_Nil();
            !io.is_null()
                && (*io).ConfigFlags & (sys::ImGuiConfigFlags_ViewportsEnable as i32) != 0
        };
        if !viewports_enabled || !self.windowing.embeds_subwindows() {
            return;
        }
        if !self.warned_embedding {
            warn!("subwindow embedding is incompatible with multi-viewport mode, disabling it");
            self.warned_embedding = true;
        }
        self.windowing.set_embeds_subwindows(false);
    }
}

fn with_manager<R>(f: impl FnOnce(&mut ViewportManager) -> R) -> Option<R> {
    MANAGER.with(|m| m.borrow_mut().as_mut().map(f))
}

/// Install the platform callback table and populate the monitor list.
///
/// The host supplies its window manager and renderer; the manager takes
/// ownership of every secondary window it creates from then on. Call
/// [`set_main_window`] afterwards to adopt the host's primary window, and
/// enable viewports on the context (`Context::enable_multi_viewport`) for
/// the callbacks to fire.
pub fn init_multi_viewport_support(
    ctx: &mut Context,
    windowing: Box<dyn HostWindowing>,
    renderer: Rc<RefCell<dyn HostRenderer>>,
) -> HostBackendResult<()> {
    {
        let io = ctx.io_mut();
        let mut flags = io.backend_flags();
        flags.insert(BackendFlags::PLATFORM_HAS_VIEWPORTS);
        flags.insert(BackendFlags::RENDERER_HAS_VIEWPORTS);
        io.set_backend_flags(flags);
    }

    // The typed setters route through panic-safe trampolines, so no unwind
    // can cross the callback boundary.
    unsafe {
        let pio = ctx.platform_io_mut();
        pio.set_platform_create_window(Some(host_create_window));
        pio.set_platform_destroy_window(Some(host_destroy_window));
        pio.set_platform_show_window(Some(host_show_window));
        pio.set_platform_set_window_pos(Some(host_set_window_pos));
        pio.set_platform_get_window_pos(Some(host_get_window_pos));
        pio.set_platform_set_window_size(Some(host_set_window_size));
        pio.set_platform_get_window_size(Some(host_get_window_size));
        pio.set_platform_set_window_focus(Some(host_set_window_focus));
        pio.set_platform_get_window_focus(Some(host_get_window_focus));
        pio.set_platform_get_window_minimized(Some(host_get_window_minimized));
        pio.set_platform_set_window_title(Some(host_set_window_title));
    }

    let displays = windowing.displays();
    monitors::write_monitors(&displays);

    MANAGER.with(|m| {
        *m.borrow_mut() = Some(ViewportManager::new(windowing, renderer));
    });
    debug!("multi-viewport support initialized");
    Ok(())
}

/// Adopt the host's primary window as the main viewport.
///
/// The window is borrowed: the manager forwards property calls to it but
/// never destroys it, and its render target is left untouched at teardown.
/// Calling this again releases the previous wrapper first.
pub fn set_main_window(
    window: Box<dyn HostWindow>,
    render_target: RenderTargetId,
) -> HostBackendResult<()> {
    with_manager(|mgr| unsafe {
        let vp = sys::igGetMainViewport();
        if vp.is_null() {
            return Err(HostBackendError::not_initialized(
                "set_main_window: no main viewport",
            ));
        }
        if let Some(key) = decode_slot((*vp).PlatformUserData) {
            // Drop the previous borrowed wrapper; the host window behind it
            // stays alive.
            mgr.take_slot(key);
            mgr.recycle_slot(key);
        }
        let native_id = window.native_id();
        let key = mgr.insert_slot(ViewportWindow {
            window,
            render_target: Some(render_target),
            owned: false,
        });
        (*vp).PlatformUserData = encode_slot(key);
        (*vp).PlatformHandle = native_id as *mut c_void;
        debug!(slot = key, "adopted main window");
        Ok(())
    })
    .unwrap_or_else(|| {
        Err(HostBackendError::not_initialized(
            "set_main_window before init_multi_viewport_support",
        ))
    })
}

/// Re-snapshot the host displays into the platform monitor list.
pub fn refresh_monitors() -> HostBackendResult<()> {
    with_manager(|mgr| {
        let displays = mgr.windowing.displays();
        monitors::write_monitors(&displays);
    })
    .ok_or_else(|| {
        HostBackendError::not_initialized("refresh_monitors before init_multi_viewport_support")
    })
}

/// Resolve a host-embedding conflict, warning once.
///
/// Hosts call this at frame begin; it is also applied before every window
/// creation. When viewports are enabled while the host still embeds
/// subwindows in its main window, embedding is switched off.
pub fn sync_embedding_mode() {
    with_manager(|mgr| mgr.correct_embedding_conflict());
}

/// Destroy every owned secondary window and drop the manager.
///
/// The borrowed main window and its render target are left untouched.
pub fn shutdown_multi_viewport_support(ctx: &mut Context) {
    ctx.destroy_platform_windows();

    MANAGER.with(|m| {
        if let Some(mut mgr) = m.borrow_mut().take() {
            // Anything still in the table is either the borrowed main
            // wrapper or a window the library never asked to destroy.
            for slot in mgr.slots.drain(..).flatten() {
                if slot.owned {
                    if let Some(target) = slot.render_target {
                        mgr.renderer.borrow_mut().release_render_target(target);
                    }
                    mgr.windowing.destroy_window(slot.window);
                }
            }
        }
    });

    unsafe {
        let vp = sys::igGetMainViewport();
        if !vp.is_null() {
            (*vp).PlatformUserData = std::ptr::null_mut();
            (*vp).PlatformHandle = std::ptr::null_mut();
        }
    }
    debug!("multi-viewport support shut down");
}

// Platform callbacks. Each one recovers the thread-local manager and
// forwards; a missing manager (shutdown already ran) is a no-op.

unsafe extern "C" fn host_create_window(vp: *mut Viewport) {
    let Some(vp) = (unsafe { vp.as_mut() }) else {
        return;
    };
    with_manager(|mgr| mgr.create_window(vp));
}

unsafe extern "C" fn host_destroy_window(vp: *mut Viewport) {
    let Some(vp) = (unsafe { vp.as_mut() }) else {
        return;
    };
    with_manager(|mgr| mgr.destroy_window(vp));
}

unsafe extern "C" fn host_show_window(vp: *mut Viewport) {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return;
    };
    with_manager(|mgr| mgr.show_window(vp));
}

unsafe extern "C" fn host_get_window_pos(vp: *mut Viewport) -> sys::ImVec2 {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return sys::ImVec2 { x: 0.0, y: 0.0 };
    };
    with_manager(|mgr| mgr.window_pos(vp)).unwrap_or(sys::ImVec2 { x: 0.0, y: 0.0 })
}

unsafe extern "C" fn host_set_window_pos(vp: *mut Viewport, pos: sys::ImVec2) {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return;
    };
    with_manager(|mgr| mgr.set_window_pos(vp, pos));
}

unsafe extern "C" fn host_get_window_size(vp: *mut Viewport) -> sys::ImVec2 {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return sys::ImVec2 { x: 0.0, y: 0.0 };
    };
    with_manager(|mgr| mgr.window_size(vp)).unwrap_or(sys::ImVec2 { x: 0.0, y: 0.0 })
}

unsafe extern "C" fn host_set_window_size(vp: *mut Viewport, size: sys::ImVec2) {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return;
    };
    with_manager(|mgr| mgr.set_window_size(vp, size));
}

unsafe extern "C" fn host_set_window_focus(vp: *mut Viewport) {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return;
    };
    with_manager(|mgr| mgr.set_window_focus(vp));
}

unsafe extern "C" fn host_get_window_focus(vp: *mut Viewport) -> bool {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return false;
    };
    with_manager(|mgr| mgr.window_focus(vp)).unwrap_or(false)
}

unsafe extern "C" fn host_get_window_minimized(vp: *mut Viewport) -> bool {
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return false;
    };
    with_manager(|mgr| mgr.window_minimized(vp)).unwrap_or(false)
}

unsafe extern "C" fn host_set_window_title(vp: *mut Viewport, title: *const c_char) {
    if title.is_null() {
        return;
    }
    let Some(vp) = (unsafe { vp.as_ref() }) else {
        return;
    };
    let Ok(title) = unsafe { CStr::from_ptr(title) }.to_str() else {
        return;
    };
    with_manager(|mgr| mgr.set_window_title(vp, title));
}
