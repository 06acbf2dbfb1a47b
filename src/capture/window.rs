//! Window discovery for the live capture source.

use anyhow::{anyhow, Result};
use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::ClientToScreen;
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    IsWindowVisible,
};

/// Title of our own windows, never selected as a capture target.
const OWN_TITLE_PREFIX: &str = "EXP Tracker";

/// Reads a window's title.
unsafe fn window_title(hwnd: HWND) -> String {
    unsafe {
        let title_len = GetWindowTextLengthW(hwnd);
        if title_len <= 0 {
            return String::new();
        }
        let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
        let copied = GetWindowTextW(hwnd, &mut title_buf);
        OsString::from_wide(&title_buf[..copied.max(0) as usize])
            .to_string_lossy()
            .to_string()
    }
}

/// Finds the first visible top-level window whose title contains `needle`
/// (case-insensitive).
///
/// Returns the window handle and its full title.
pub fn find_window_by_title(needle: &str) -> Result<(HWND, String)> {
    struct EnumData {
        needle: String,
        found: Option<(HWND, String)>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }

            let title = window_title(hwnd);
            if title.is_empty() || title.starts_with(OWN_TITLE_PREFIX) {
                return TRUE;
            }

            if title.to_lowercase().contains(&data.needle) {
                data.found = Some((hwnd, title));
                return BOOL(0); // Stop enumeration
            }

            TRUE
        }
    }

    tracing::info!("Searching for a window titled \"{}\"...", needle);
    let mut data = EnumData {
        needle: needle.to_lowercase(),
        found: None,
    };
    unsafe {
        // EnumWindows reports FALSE when the callback stops it early, which is
        // the success case here
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }

    let (hwnd, title) = data
        .found
        .ok_or_else(|| anyhow!("Could not find a window titled \"{}\". Is it open?", needle))?;
    tracing::info!("Found window: \"{}\"", title);
    Ok((hwnd, title))
}

/// Gets the client area rectangle and its offset relative to the window origin.
///
/// Captured frames include the title bar and borders; the offset is where the
/// client area starts inside them.
pub fn get_client_area_info(hwnd: HWND) -> Result<(RECT, POINT)> {
    let mut client_rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut client_rect)? };

    let mut client_origin = POINT { x: 0, y: 0 };
    unsafe {
        if !ClientToScreen(hwnd, &mut client_origin).as_bool() {
            return Err(anyhow!("ClientToScreen failed"));
        }
    }

    let mut window_rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut window_rect)? };

    let offset = POINT {
        x: client_origin.x - window_rect.left,
        y: client_origin.y - window_rect.top,
    };

    Ok((client_rect, offset))
}
