//! Host-engine platform backend for Dear ImGui
//!
//! This crate embeds a Dear ImGui platform backend inside a retained-mode
//! host engine (a game engine or editor that owns the window tree and the
//! renderer). The host stays in charge of windows, GPU textures, and the
//! frame loop; the backend wires Dear ImGui's multi-viewport machinery and
//! font atlas into it through two traits the host implements.
//!
//! # Features
//!
//! - **Shared-Context Adoption**: validate and adopt a context created on
//!   the other side of a plugin boundary ([`sync`])
//! - **Multi-Viewport Support**: secondary ImGui windows become native host
//!   windows ([`viewports`])
//! - **Font Atlas Lifecycle**: ordered font list, scale-aware rebuilds,
//!   host-owned atlas textures ([`fonts`])
//! - **Monitor Reporting**: host displays published to the platform monitor
//!   list, with a headless fallback ([`monitors`])
//!
//! # Example
//!
//! ```rust,no_run
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use dear_imgui_host::fonts::FontAtlasBuilder;
//! use dear_imgui_host::viewports;
//! use dear_imgui_rs::Context;
//!
//! # fn host_windowing() -> Box<dyn dear_imgui_host::HostWindowing> { unimplemented!() }
//! # fn host_renderer() -> Rc<RefCell<dyn dear_imgui_host::HostRenderer>> { unimplemented!() }
//! let mut ctx = Context::create();
//! ctx.enable_multi_viewport();
//!
//! let renderer = host_renderer();
//! viewports::init_multi_viewport_support(&mut ctx, host_windowing(), renderer.clone())?;
//!
//! let mut fonts = FontAtlasBuilder::new(renderer);
//! fonts.add_default_font(13.0)?;
//! fonts.rebuild_atlas(&mut ctx, 1.0)?;
//! # Ok::<(), dear_imgui_host::HostBackendError>(())
//! ```

mod error;
pub mod fonts;
pub mod host;
pub mod monitors;
pub mod sync;
#[cfg(test)]
mod test_util;
pub mod viewports;

pub use error::{HostBackendError, HostBackendResult};
pub use host::{
    DisplayInfo, HostRenderer, HostTextureId, HostWindow, HostWindowing, RenderTargetId,
    ViewportEvents, WindowDesc, WindowHints,
};
pub use sync::{ContextHandshake, adopt_shared_context, linked_version, local_handshake};
pub use viewports::{
    init_multi_viewport_support, refresh_monitors, set_main_window,
    shutdown_multi_viewport_support, sync_embedding_mode,
};
