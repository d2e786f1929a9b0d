//! Shared-context adoption.
//!
//! When the GUI context is created on the host side (a plugin loaded into an
//! engine process), both sides must agree on the Dear ImGui version and on
//! the binary layout of the structs that cross the boundary before the
//! context pointer can be trusted. The handshake carries the version tag and
//! the three layout-sensitive struct sizes; any disagreement is fatal.

use std::ffi::{CStr, c_void};
use std::mem::size_of;

use dear_imgui_sys as sys;
use tracing::debug;

use crate::error::{HostBackendError, HostBackendResult};

/// The values exchanged before a context created elsewhere is adopted.
#[derive(Debug, Clone)]
pub struct ContextHandshake {
    /// Dear ImGui version tag the other side was compiled against.
    pub version: String,
    /// `sizeof(ImGuiIO)` on the other side.
    pub io_size: usize,
    /// `sizeof(ImDrawVert)` on the other side.
    pub draw_vert_size: usize,
    /// `sizeof(ImDrawIdx)` on the other side.
    pub draw_idx_size: usize,
    /// The shared context.
    pub context: *mut sys::ImGuiContext,
    /// Allocator installed in the shared context.
    pub alloc_fn: sys::ImGuiMemAllocFunc,
    /// Deallocator paired with `alloc_fn`.
    pub free_fn: sys::ImGuiMemFreeFunc,
    /// User pointer passed to both allocator functions.
    pub alloc_user_data: *mut c_void,
}

/// Version tag of the Dear ImGui build linked into this backend.
pub fn linked_version() -> &'static str {
    unsafe { CStr::from_ptr(sys::igGetVersion()) }
        .to_str()
        .unwrap_or("")
}

/// Build the handshake for the context that is current on this side.
///
/// This is the producer half of the exchange: a host that lets the Rust side
/// create the context calls this and forwards the result to any other module
/// that needs to share it.
pub fn local_handshake() -> ContextHandshake {
    let mut alloc_fn: sys::ImGuiMemAllocFunc = None;
    let mut free_fn: sys::ImGuiMemFreeFunc = None;
    let mut alloc_user_data: *mut c_void = std::ptr::null_mut();
    unsafe {
        sys::igGetAllocatorFunctions(&mut alloc_fn, &mut free_fn, &mut alloc_user_data);
    }
    ContextHandshake {
        version: linked_version().to_owned(),
        io_size: size_of::<sys::ImGuiIO>(),
        draw_vert_size: size_of::<sys::ImDrawVert>(),
        draw_idx_size: size_of::<sys::ImDrawIdx>(),
        context: unsafe { sys::igGetCurrentContext() },
        alloc_fn,
        free_fn,
        alloc_user_data,
    }
}

/// Adopt a context created on the other side of the boundary.
///
/// Validates the version tag and the three struct sizes against the linked
/// library before touching any global state. On success the shared context
/// becomes current and its allocator pair is installed, so every component
/// sharing the context uses the same heap.
pub fn adopt_shared_context(handshake: &ContextHandshake) -> HostBackendResult<()> {
    let linked = linked_version();
    if handshake.version != linked {
        return Err(HostBackendError::version_mismatch(
            handshake.version.clone(),
            linked,
        ));
    }
    check_layout("ImGuiIO", handshake.io_size, size_of::<sys::ImGuiIO>())?;
    check_layout(
        "ImDrawVert",
        handshake.draw_vert_size,
        size_of::<sys::ImDrawVert>(),
    )?;
    check_layout(
        "ImDrawIdx",
        handshake.draw_idx_size,
        size_of::<sys::ImDrawIdx>(),
    )?;
    if handshake.context.is_null() {
        return Err(HostBackendError::not_initialized(
            "adopt_shared_context: handshake carries a null context",
        ));
    }

    unsafe {
        sys::igSetCurrentContext(handshake.context);
        sys::igSetAllocatorFunctions(
            handshake.alloc_fn,
            handshake.free_fn,
            handshake.alloc_user_data,
        );
    }
    debug!(version = %handshake.version, "adopted shared ImGui context");
    Ok(())
}

fn check_layout(field: &'static str, provided: usize, linked: usize) -> HostBackendResult<()> {
    if provided != linked {
        return Err(HostBackendError::layout_mismatch(field, provided, linked));
    }
    Ok(())
}
