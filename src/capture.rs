use tracing::debug;

use crate::{geometry::DisplayInfo, host::WindowSystem, workspace::WindowDescriptor};

/// Picks the display whose name contains `pattern` (case-insensitive),
/// falling back to the first display the host reports.
pub fn managed_display<H: WindowSystem + ?Sized>(host: &H, pattern: &str) -> Option<DisplayInfo> {
    let displays = host.displays();
    let needle = pattern.trim().to_lowercase();
    if !needle.is_empty() {
        if let Some(found) = displays
            .iter()
            .find(|d| d.name.to_lowercase().contains(&needle))
        {
            return Some(found.clone());
        }
        debug!(pattern, "no display matches, using the first one");
    }
    displays.into_iter().next()
}

/// Snapshots the capturable windows of every running application on
/// `display`, skipping the `ignored` shell applications.
pub fn capture<H: WindowSystem + ?Sized>(
    host: &H,
    display: &DisplayInfo,
    ignored: &[String],
) -> Vec<WindowDescriptor> {
    let mut out = Vec::new();
    for app in host.running_apps() {
        if ignored.iter().any(|i| *i == app.id) {
            continue;
        }
        for window in host.app_windows(&app.id) {
            if !window.is_capturable(&display.name) {
                continue;
            }
            out.push(WindowDescriptor {
                app_id: app.id.clone(),
                title: window.title.clone(),
                frame: display.normalize(&window.frame),
                fullscreen: window.fullscreen,
                minimized: window.minimized,
                window_id: Some(window.id),
            });
        }
    }
    let name = &display.name;
    debug!(display_name = %name, windows = out.len(), "layout captured");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{Rect, UnitFrame},
        host::{WindowKind, memory::MemoryHost},
    };

    fn host() -> MemoryHost {
        MemoryHost::new(vec![
            DisplayInfo::new("Built-in Retina", Rect::new(0.0, 0.0, 1000.0, 800.0)),
            DisplayInfo::new("DELL U2720Q", Rect::new(1000.0, 0.0, 2000.0, 1000.0)),
        ])
    }

    #[test]
    fn display_is_selected_by_name_fragment() {
        let host = host();
        assert_eq!(managed_display(&host, "dell").unwrap().name, "DELL U2720Q");
        assert_eq!(managed_display(&host, "lg").unwrap().name, "Built-in Retina");
        assert_eq!(managed_display(&host, "").unwrap().name, "Built-in Retina");
    }

    #[test]
    fn keeps_only_eligible_windows_on_the_managed_display() {
        let host = host();
        let dell = managed_display(&host, "dell").unwrap();
        let editor = host.open_window("editor", "main.rs", Rect::new(1000.0, 0.0, 1000.0, 1000.0));
        host.open_window("editor", "other screen", Rect::new(0.0, 0.0, 500.0, 400.0));
        let palette = host.open_window("editor", "palette", Rect::new(1100.0, 100.0, 200.0, 200.0));
        host.set_kind(palette, WindowKind::Utility);
        let hidden = host.open_window("term", "shell", Rect::new(2000.0, 0.0, 1000.0, 500.0));
        host.minimize(hidden);
        host.open_window("com.apple.finder", "Desktop", Rect::new(1000.0, 0.0, 2000.0, 1000.0));

        let captured = capture(&host, &dell, &["com.apple.finder".to_string()]);
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].title, "main.rs");
        assert_eq!(captured[0].window_id, Some(editor));
        assert_eq!(captured[0].frame, UnitFrame::new(0.0, 0.0, 0.5, 1.0));
    }
}
