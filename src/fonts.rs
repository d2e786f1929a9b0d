//! Font atlas lifecycle.
//!
//! The builder owns the ordered list of font specifications and rebuilds the
//! glyph atlas wholesale whenever the display scale changes. List order is
//! the only addressing scheme: it determines atlas build order, and the
//! default-font selection survives a rebuild by ordinal position, not by
//! identity.

use std::cell::RefCell;
use std::rc::Rc;

use dear_imgui_rs::{Context, FontAtlas, FontConfig, TextureId};
use dear_imgui_sys as sys;
use tracing::{debug, warn};

use crate::error::{HostBackendError, HostBackendResult};
use crate::host::{HostRenderer, HostTextureId};

/// One entry in the ordered font list.
#[derive(Clone)]
pub struct FontSpec {
    /// Complete font-file image; `None` selects the built-in default glyph set.
    pub data: Option<Vec<u8>>,
    /// Rasterization size before scaling, in pixels.
    pub size_pixels: f32,
    /// Overlay these glyphs onto the previous entry instead of starting a
    /// new logical font.
    pub merge: bool,
    /// Explicit codepoint ranges as `[start, end, ..., 0]`; `None` uses the
    /// library's default glyph ranges.
    pub ranges: Option<Vec<sys::ImWchar>>,
}

impl FontSpec {
    /// Spec for the built-in default font at the given pixel size.
    pub fn default_font(size_pixels: f32) -> Self {
        Self {
            data: None,
            size_pixels,
            merge: false,
            ranges: None,
        }
    }

    /// Spec for a font-file image at the given pixel size.
    pub fn from_bytes(data: Vec<u8>, size_pixels: f32) -> Self {
        Self {
            data: Some(data),
            size_pixels,
            merge: false,
            ranges: None,
        }
    }
}

/// Owns the font-spec list and the host texture behind the atlas.
///
/// Dropping the builder returns the installed texture to the host
/// renderer. Hosts tear down in order: owned secondary windows first,
/// then this builder, then the shared context.
pub struct FontAtlasBuilder {
    renderer: Rc<RefCell<dyn HostRenderer>>,
    specs: Vec<FontSpec>,
    font_texture: Option<HostTextureId>,
}

impl FontAtlasBuilder {
    /// Create a builder that uploads atlas textures through `renderer`.
    pub fn new(renderer: Rc<RefCell<dyn HostRenderer>>) -> Self {
        Self {
            renderer,
            specs: Vec::new(),
            font_texture: None,
        }
    }

    /// The configured specs, in build order.
    pub fn specs(&self) -> &[FontSpec] {
        &self.specs
    }

    /// Host texture currently installed in the atlas, if any.
    pub fn font_texture(&self) -> Option<HostTextureId> {
        self.font_texture
    }

    /// Append a spec to the list.
    ///
    /// A zero-length buffer is accepted here and skipped at build time, so a
    /// single bad asset never aborts the whole atlas. Callers wanting
    /// stricter guarantees validate before calling.
    pub fn add_font(&mut self, spec: FontSpec) -> HostBackendResult<()> {
        if spec.size_pixels <= 0.0 {
            return Err(HostBackendError::invalid_font_spec(format!(
                "pixel size must be positive, got {}",
                spec.size_pixels
            )));
        }
        if spec.merge && self.specs.is_empty() {
            return Err(HostBackendError::invalid_font_spec(
                "merge requires a preceding font to merge into",
            ));
        }
        self.specs.push(spec);
        Ok(())
    }

    /// Append the built-in default font at the given pixel size.
    pub fn add_default_font(&mut self, size_pixels: f32) -> HostBackendResult<()> {
        self.add_font(FontSpec::default_font(size_pixels))
    }

    /// Clear the spec list, the atlas, and the default-font selection.
    ///
    /// The current host texture stays alive until the next rebuild installs
    /// its replacement; frames in flight may still reference it.
    pub fn reset_fonts(&mut self, ctx: &mut Context) {
        self.specs.clear();
        ctx.font_atlas_mut().clear();
        unsafe {
            (*sys::igGetIO_Nil()).FontDefault = std::ptr::null_mut();
        }
    }

    /// Rebuild the atlas at the given scale factor.
    ///
    /// The sequence is deterministic: remember the default font's ordinal,
    /// clear the atlas, re-add every spec at `size × scale_factor`, bake,
    /// upload the RGBA bitmap as a new host texture, install it, release the
    /// previous texture, restore the default-font ordinal, and finally reset
    /// style metrics to the library baseline before scaling them once.
    /// Rebuilds are idempotent relative to that baseline, never cumulative.
    pub fn rebuild_atlas(&mut self, ctx: &mut Context, scale_factor: f32) -> HostBackendResult<()> {
        if scale_factor <= 0.0 {
            return Err(HostBackendError::atlas_build(format!(
                "scale factor must be positive, got {scale_factor}"
            )));
        }

        let default_ordinal = take_default_font_ordinal();

        let mut atlas = ctx.font_atlas_mut();
        atlas.clear();

        for (index, spec) in self.specs.iter().enumerate() {
            if !add_spec_to_atlas(&mut atlas, spec, scale_factor) {
                warn!(index, "font entry rejected by the rasterizer, skipping");
            }
        }

        if !atlas.build() {
            return Err(HostBackendError::atlas_build(
                "atlas bake produced no texture",
            ));
        }
        let (pixels, width, height) = unsafe { atlas.get_tex_data_ptr() }
            .ok_or_else(|| HostBackendError::atlas_build("atlas has no pixel data"))?;
        let byte_len = width as usize * height as usize * 4;
        let rgba = unsafe { std::slice::from_raw_parts(pixels, byte_len) };

        let new_texture = self
            .renderer
            .borrow_mut()
            .create_texture_rgba(width, height, rgba);
        atlas.set_texture_id(TextureId::new(new_texture.0));
        atlas.clear_tex_data();

        // The swap is ordered so no frame ever references a freed handle.
        if let Some(old) = self.font_texture.replace(new_texture) {
            self.renderer.borrow_mut().free_texture(old);
        }

        restore_default_font_ordinal(default_ordinal);

        unsafe {
            let default_style = sys::ImGuiStyle_ImGuiStyle();
            *sys::igGetStyle() = *default_style;
            sys::ImGuiStyle_destroy(default_style);
            sys::ImGuiStyle_ScaleAllSizes(sys::igGetStyle(), scale_factor);
        }

        debug!(
            width,
            height,
            scale = scale_factor,
            specs = self.specs.len(),
            "font atlas rebuilt"
        );
        Ok(())
    }
}

impl Drop for FontAtlasBuilder {
    fn drop(&mut self) {
        if let Some(texture) = self.font_texture.take() {
            self.renderer.borrow_mut().free_texture(texture);
        }
    }
}

/// Record which slot the default font occupies, then unset the selection
/// so the clear below cannot leave a dangling pointer.
fn take_default_font_ordinal() -> Option<usize> {
    unsafe {
        let io = &mut *sys::igGetIO_Nil();
        if io.FontDefault.is_null() || io.Fonts.is_null() {
            return None;
        }
        let fonts = &(*io.Fonts).Fonts;
        let mut ordinal = None;
        for i in 0..fonts.Size {
            if *fonts.Data.add(i as usize) == io.FontDefault {
                ordinal = Some(i as usize);
                break;
            }
        }
        io.FontDefault = std::ptr::null_mut();
        ordinal
    }
}

fn restore_default_font_ordinal(ordinal: Option<usize>) {
    let Some(ordinal) = ordinal else { return };
    unsafe {
        let io = &mut *sys::igGetIO_Nil();
        if io.Fonts.is_null() {
            return;
        }
        let fonts = &(*io.Fonts).Fonts;
        if (ordinal as i32) < fonts.Size {
            io.FontDefault = *fonts.Data.add(ordinal);
        }
    }
}

/// Returns false when the rasterizer rejects the entry.
fn add_spec_to_atlas(atlas: &mut FontAtlas, spec: &FontSpec, scale_factor: f32) -> bool {
    // Integer-snap the scaled size so rebuilds at the same scale are exact.
    let size_pixels = (spec.size_pixels * scale_factor).floor();

    let added = match &spec.data {
        None => {
            let config = FontConfig::new()
                .size_pixels(size_pixels)
                .merge_mode(spec.merge)
                .oversample_h(1)
                .oversample_v(1)
                .pixel_snap_h(true);
            atlas.add_font_default(Some(&config));
            true
        }
        Some(bytes) => {
            let config = FontConfig::new()
                .merge_mode(spec.merge)
                .name(&format!("memory, {size_pixels:.0}px"));
            atlas
                .add_font_from_memory_ttf(bytes, size_pixels, Some(&config), spec.ranges.as_deref())
                .is_some()
        }
    };

    // Merged glyphs overlay the previous slot; bake right away so they land
    // in it instead of allocating a new one.
    if added && spec.merge {
        atlas.build();
    }
    added
}
