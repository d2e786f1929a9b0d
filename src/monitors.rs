//! Host display snapshot into the platform monitor list.
//!
//! Dear ImGui's multi-viewport logic clamps window placement against
//! `ImGuiPlatformIO::Monitors`, so the list must be populated before the
//! first frame and refreshed when the host's display configuration changes.
//! Storage is allocated through the library allocator to keep ownership
//! consistent with the shared context.

use dear_imgui_sys as sys;
use tracing::debug;

use crate::host::DisplayInfo;

/// Extent used for the synthesized monitor when the host reports no
/// displays and the main viewport has no size yet.
pub(crate) const FALLBACK_DISPLAY_SIZE: [f32; 2] = [1280.0, 720.0];

/// Rewrite `ImGuiPlatformIO::Monitors` from a display snapshot.
///
/// A current context is required. If `displays` is empty (headless host),
/// a single monitor is synthesized from the main viewport's extent so that
/// downstream clamping always sees a non-empty list; its work area equals
/// its main area.
pub fn write_monitors(displays: &[DisplayInfo]) {
    let mut records: Vec<sys::ImGuiPlatformMonitor> =
        displays.iter().map(to_platform_monitor).collect();

    if records.is_empty() {
        records.push(synthesized_monitor());
        debug!("host reported zero displays, synthesizing one monitor");
    }

    unsafe {
        let pio = sys::igGetPlatformIO_Nil();
        let vec = &mut (*pio).Monitors;

        // Existing storage was allocated below with the library allocator.
        if vec.Capacity > 0 && !vec.Data.is_null() {
            sys::igMemFree(vec.Data as *mut _);
            vec.Data = std::ptr::null_mut();
            vec.Size = 0;
            vec.Capacity = 0;
        }

        let count = records.len();
        let bytes = count * std::mem::size_of::<sys::ImGuiPlatformMonitor>();
        let data_ptr = sys::igMemAlloc(bytes) as *mut sys::ImGuiPlatformMonitor;
        if data_ptr.is_null() {
            return;
        }
        for (i, m) in records.iter().enumerate() {
            *data_ptr.add(i) = *m;
        }
        vec.Data = data_ptr;
        vec.Size = count as i32;
        vec.Capacity = count as i32;
    }
    debug!(monitors = records.len(), "platform monitor list updated");
}

fn to_platform_monitor(display: &DisplayInfo) -> sys::ImGuiPlatformMonitor {
    let mut monitor = sys::ImGuiPlatformMonitor::default();
    monitor.MainPos = sys::ImVec2 {
        x: display.main_pos[0],
        y: display.main_pos[1],
    };
    monitor.MainSize = sys::ImVec2 {
        x: display.main_size[0],
        y: display.main_size[1],
    };
    monitor.WorkPos = sys::ImVec2 {
        x: display.work_pos[0],
        y: display.work_pos[1],
    };
    monitor.WorkSize = sys::ImVec2 {
        x: display.work_size[0],
        y: display.work_size[1],
    };
    monitor.DpiScale = display.dpi_scale;
    monitor.PlatformHandle = std::ptr::null_mut();
    monitor
}

fn synthesized_monitor() -> sys::ImGuiPlatformMonitor {
    let size = unsafe {
        let vp = sys::igGetMainViewport();
        if !vp.is_null() && (*vp).Size.x > 0.0 && (*vp).Size.y > 0.0 {
            [(*vp).Size.x, (*vp).Size.y]
        } else {
            FALLBACK_DISPLAY_SIZE
        }
    };
    let mut monitor = sys::ImGuiPlatformMonitor::default();
    monitor.MainPos = sys::ImVec2 { x: 0.0, y: 0.0 };
    monitor.MainSize = sys::ImVec2 {
        x: size[0],
        y: size[1],
    };
    monitor.WorkPos = monitor.MainPos;
    monitor.WorkSize = monitor.MainSize;
    monitor.DpiScale = 1.0;
    monitor.PlatformHandle = std::ptr::null_mut();
    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::test_sync;
    use dear_imgui_rs::Context;

    fn display(pos: [f32; 2], size: [f32; 2], scale: f32) -> DisplayInfo {
        DisplayInfo {
            main_pos: pos,
            main_size: size,
            work_pos: [pos[0], pos[1] + 24.0],
            work_size: [size[0], size[1] - 24.0],
            dpi_scale: scale,
        }
    }

    unsafe fn monitor_list<'a>() -> &'a [sys::ImGuiPlatformMonitor] {
        unsafe {
            let pio = sys::igGetPlatformIO_Nil();
            let vec = &(*pio).Monitors;
            if vec.Data.is_null() {
                &[]
            } else {
                std::slice::from_raw_parts(vec.Data, vec.Size as usize)
            }
        }
    }

    #[test]
    fn one_record_per_display() {
        let _guard = test_sync::lock_context();
        let _ctx = Context::create();

        let displays = [
            display([0.0, 0.0], [2560.0, 1440.0], 1.0),
            display([2560.0, 0.0], [1920.0, 1080.0], 1.5),
        ];
        write_monitors(&displays);

        let monitors = unsafe { monitor_list() };
        assert_eq!(monitors.len(), 2);
        for (monitor, display) in monitors.iter().zip(&displays) {
            assert_eq!(monitor.MainPos.x, display.main_pos[0]);
            assert_eq!(monitor.DpiScale, display.dpi_scale);
            assert!(monitor.WorkSize.x <= monitor.MainSize.x);
            assert!(monitor.WorkSize.y <= monitor.MainSize.y);
        }
    }

    #[test]
    fn headless_host_still_gets_one_monitor() {
        let _guard = test_sync::lock_context();
        let _ctx = Context::create();

        write_monitors(&[]);

        let monitors = unsafe { monitor_list() };
        assert_eq!(monitors.len(), 1);
        assert!(monitors[0].MainSize.x > 0.0);
        assert_eq!(monitors[0].WorkSize.x, monitors[0].MainSize.x);
        assert_eq!(monitors[0].DpiScale, 1.0);
    }

    #[test]
    fn refresh_replaces_the_previous_snapshot() {
        let _guard = test_sync::lock_context();
        let _ctx = Context::create();

        write_monitors(&[display([0.0, 0.0], [1920.0, 1080.0], 1.0)]);
        write_monitors(&[
            display([0.0, 0.0], [1920.0, 1080.0], 1.0),
            display([1920.0, 0.0], [1920.0, 1080.0], 1.0),
        ]);

        assert_eq!(unsafe { monitor_list() }.len(), 2);
    }
}
