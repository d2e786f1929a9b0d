//! Error types for the host backend.

use thiserror::Error;
use tracing::{error, warn};

/// Result type for host backend operations
pub type HostBackendResult<T> = Result<T, HostBackendError>;

/// Errors that can occur while bridging Dear ImGui into a host engine
#[derive(Error, Debug)]
pub enum HostBackendError {
    /// The shared context was built against a different binary layout
    #[error("layout mismatch: sizeof({field}) is {provided} on the host side, {linked} in the linked library")]
    LayoutMismatch {
        field: &'static str,
        provided: usize,
        linked: usize,
    },

    /// The shared context reports a different Dear ImGui version tag
    #[error("version mismatch: host linked Dear ImGui {provided}, this backend linked {linked}")]
    VersionMismatch { provided: String, linked: String },

    /// An operation was attempted before the backend was initialized
    #[error("backend not initialized: {operation}")]
    NotInitialized { operation: String },

    /// The host engine failed to create a window
    #[error("window creation failed: {reason}")]
    WindowCreation { reason: String },

    /// A font spec was rejected before it reached the atlas
    #[error("invalid font spec: {reason}")]
    InvalidFontSpec { reason: String },

    /// The atlas build produced no usable texture
    #[error("font atlas build failed: {reason}")]
    AtlasBuild { reason: String },
}

impl HostBackendError {
    /// Create a layout mismatch error
    pub fn layout_mismatch(field: &'static str, provided: usize, linked: usize) -> Self {
        error!(
            "layout mismatch: sizeof({}) host={} linked={}",
            field, provided, linked
        );
        Self::LayoutMismatch {
            field,
            provided,
            linked,
        }
    }

    /// Create a version mismatch error
    pub fn version_mismatch(provided: impl Into<String>, linked: impl Into<String>) -> Self {
        let provided = provided.into();
        let linked = linked.into();
        error!("version mismatch: host={} linked={}", provided, linked);
        Self::VersionMismatch { provided, linked }
    }

    /// Create a not-initialized error
    pub fn not_initialized(operation: impl Into<String>) -> Self {
        let operation = operation.into();
        warn!("backend not initialized: {}", operation);
        Self::NotInitialized { operation }
    }

    /// Create a window creation error
    pub fn window_creation(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        error!("window creation failed: {}", reason);
        Self::WindowCreation { reason }
    }

    /// Create an invalid font spec error
    pub fn invalid_font_spec(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("invalid font spec: {}", reason);
        Self::InvalidFontSpec { reason }
    }

    /// Create an atlas build error
    pub fn atlas_build(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        error!("font atlas build failed: {}", reason);
        Self::AtlasBuild { reason }
    }
}
