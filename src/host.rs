//! Host-engine abstraction consumed by the backend.
//!
//! A retained-mode engine plugs in by implementing [`HostWindowing`] for its
//! window manager and [`HostRenderer`] for its GPU resources. Every method is
//! called on the engine's main thread; the backend itself never spawns
//! threads and holds no locks around these calls.

use std::ffi::c_void;

use bitflags::bitflags;
use dear_imgui_sys as sys;

use crate::error::HostBackendResult;

bitflags! {
    /// Window configuration derived from a viewport's requested flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WindowHints: u32 {
        /// No title bar, no resize border.
        const BORDERLESS = 1 << 0;
        /// Per-pixel transparent background.
        const TRANSPARENT = 1 << 1;
        /// Keep above regular windows.
        const ALWAYS_ON_TOP = 1 << 2;
        /// Never steal focus from the window under the cursor.
        const NO_FOCUS = 1 << 3;
    }
}

impl WindowHints {
    /// Derive hints from `ImGuiViewportFlags`.
    pub fn from_viewport_flags(flags: i32) -> Self {
        let mut hints = WindowHints::empty();
        if flags & (sys::ImGuiViewportFlags_NoDecoration as i32) != 0 {
            hints |= WindowHints::BORDERLESS | WindowHints::TRANSPARENT;
        }
        if flags & (sys::ImGuiViewportFlags_TopMost as i32) != 0 {
            hints |= WindowHints::ALWAYS_ON_TOP;
        }
        let no_focus = (sys::ImGuiViewportFlags_NoFocusOnAppearing as i32)
            | (sys::ImGuiViewportFlags_NoFocusOnClick as i32);
        if flags & no_focus != 0 {
            hints |= WindowHints::NO_FOCUS;
        }
        hints
    }
}

/// Everything the host needs to create one secondary window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowDesc {
    /// Initial window title.
    pub title: String,
    /// Outer position in screen pixels.
    pub pos: [i32; 2],
    /// Inner size in pixels.
    pub size: [i32; 2],
    /// Flag-derived configuration.
    pub hints: WindowHints,
}

/// One host display, snapshotted on demand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayInfo {
    /// Top-left corner of the display in the virtual desktop, pixels.
    pub main_pos: [f32; 2],
    /// Full display extent in pixels.
    pub main_size: [f32; 2],
    /// Top-left corner of the usable area (excludes task bars, docks).
    pub work_pos: [f32; 2],
    /// Usable area extent.
    pub work_size: [f32; 2],
    /// DPI / content-scale multiplier.
    pub dpi_scale: f32,
}

/// Identifier of a render target the host renderer bound to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub u64);

/// Identifier of a GPU texture owned by the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostTextureId(pub u64);

/// One window in the host's window tree.
pub trait HostWindow {
    /// Stable host-side id for this window (stored in the viewport's
    /// platform handle for debugging).
    fn native_id(&self) -> u64;
    /// Make the window visible.
    fn show(&mut self);
    /// Outer position in screen pixels.
    fn position(&self) -> [i32; 2];
    /// Move the window.
    fn set_position(&mut self, pos: [i32; 2]);
    /// Inner size in pixels.
    fn size(&self) -> [i32; 2];
    /// Resize the window.
    fn set_size(&mut self, size: [i32; 2]);
    /// Bring the window to the foreground and give it keyboard focus.
    fn focus(&mut self);
    /// Whether the window currently has keyboard focus.
    fn has_focus(&self) -> bool;
    /// Whether the window is minimized / iconified.
    fn is_minimized(&self) -> bool;
    /// Replace the window title.
    fn set_title(&mut self, title: &str);
}

/// The host engine's window manager.
pub trait HostWindowing {
    /// Create a top-level window. The host must deliver that window's
    /// close/resize signals through `events` (on the main thread).
    fn create_window(
        &mut self,
        desc: &WindowDesc,
        events: ViewportEvents,
    ) -> HostBackendResult<Box<dyn HostWindow>>;

    /// Destroy a window previously returned by [`Self::create_window`].
    fn destroy_window(&mut self, window: Box<dyn HostWindow>);

    /// Snapshot of the connected displays. May be empty (headless).
    fn displays(&self) -> Vec<DisplayInfo>;

    /// Whether the host currently embeds subwindows inside the main
    /// window instead of creating native ones.
    fn embeds_subwindows(&self) -> bool;

    /// Switch subwindow embedding on or off.
    fn set_embeds_subwindows(&mut self, embed: bool);
}

/// The host engine's GPU resources.
pub trait HostRenderer {
    /// Bind a render target to a window so the engine presents into it.
    fn create_render_target(&mut self, window: &dyn HostWindow) -> RenderTargetId;
    /// Release a render target created by [`Self::create_render_target`].
    fn release_render_target(&mut self, target: RenderTargetId);
    /// Upload a tightly packed RGBA8 image and return its texture id.
    fn create_texture_rgba(&mut self, width: u32, height: u32, pixels: &[u8]) -> HostTextureId;
    /// Free a texture created by [`Self::create_texture_rgba`].
    fn free_texture(&mut self, texture: HostTextureId);
}

/// Routes a host window's close/resize signals back to its viewport.
///
/// Handed to [`HostWindowing::create_window`]; the host keeps it alongside
/// the window and invokes it from its signal handlers. Both methods resolve
/// the viewport by id at call time, so a signal arriving after the viewport
/// is gone is silently dropped.
#[derive(Debug, Clone, Copy)]
pub struct ViewportEvents {
    viewport_id: sys::ImGuiID,
}

impl ViewportEvents {
    pub(crate) fn new(viewport_id: sys::ImGuiID) -> Self {
        Self { viewport_id }
    }

    /// Id of the viewport this window belongs to.
    pub fn viewport_id(&self) -> sys::ImGuiID {
        self.viewport_id
    }

    /// The user asked the host window to close.
    pub fn close_requested(&self) {
        self.with_viewport(|vp| unsafe { (*vp).PlatformRequestClose = true });
    }

    /// The host window was resized outside of Dear ImGui's control.
    pub fn size_changed(&self) {
        self.with_viewport(|vp| unsafe { (*vp).PlatformRequestResize = true });
    }

    fn with_viewport(&self, f: impl FnOnce(*mut sys::ImGuiViewport)) {
        unsafe {
            if sys::igGetCurrentContext().is_null() {
                return;
            }
            let pio = sys::igGetPlatformIO_Nil();
            let viewports = &(*pio).Viewports;
            if viewports.Data.is_null() {
                return;
            }
            for i in 0..viewports.Size {
                let vp = *viewports.Data.add(i as usize);
                if !vp.is_null() && (*vp).ID == self.viewport_id {
                    f(vp);
                    return;
                }
            }
        }
    }
}

pub(crate) fn encode_slot(key: u32) -> *mut c_void {
    (key as usize + 1) as *mut c_void
}

pub(crate) fn decode_slot(data: *mut c_void) -> Option<u32> {
    let v = data as usize;
    if v == 0 { None } else { Some((v - 1) as u32) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_follow_viewport_flags() {
        let flags =
            (sys::ImGuiViewportFlags_NoDecoration as i32) | (sys::ImGuiViewportFlags_TopMost as i32);
        let hints = WindowHints::from_viewport_flags(flags);
        assert!(hints.contains(WindowHints::BORDERLESS));
        assert!(hints.contains(WindowHints::TRANSPARENT));
        assert!(hints.contains(WindowHints::ALWAYS_ON_TOP));
        assert!(!hints.contains(WindowHints::NO_FOCUS));
    }

    #[test]
    fn hints_empty_for_plain_viewport() {
        assert_eq!(
            WindowHints::from_viewport_flags(sys::ImGuiViewportFlags_None as i32),
            WindowHints::empty()
        );
    }

    #[test]
    fn slot_encoding_round_trips_and_reserves_null() {
        assert_eq!(decode_slot(std::ptr::null_mut()), None);
        for key in [0u32, 1, 17, 4095] {
            assert_eq!(decode_slot(encode_slot(key)), Some(key));
        }
    }
}
