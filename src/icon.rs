//! Icon loading, scaling and caching.
//!
//! Icons are addressed by the path string the sender supplied. Decode
//! results are memoized for the life of the process, including failures, so
//! a broken icon path stalls the event loop at most once.

use std::collections::HashMap;

use image::imageops::FilterType;

/// A decoded icon scaled for popup rendering (BGRA pixel data, the layout
/// X11 put_image expects).
#[derive(Debug, Clone)]
pub struct Icon {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Permanent per-path icon cache.
pub struct IconCache {
    /// Target size of the larger icon dimension
    size: u32,
    /// Decode results by source path; `None` records a failed decode
    entries: HashMap<String, Option<Icon>>,
}

impl IconCache {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            entries: HashMap::new(),
        }
    }

    /// Look up an icon, decoding and caching it on first use.
    ///
    /// Returns `None` both for paths that never decode and for paths that
    /// failed before; failures are cached so they are never retried.
    pub fn get(&mut self, path: &str) -> Option<&Icon> {
        if !self.entries.contains_key(path) {
            let icon = match load_icon(path, self.size) {
                Ok(icon) => Some(icon),
                Err(e) => {
                    log::warn!("Failed to load icon {:?}: {:#}", path, e);
                    None
                }
            };
            self.entries.insert(path.to_string(), icon);
        }
        self.entries.get(path).and_then(|entry| entry.as_ref())
    }

    /// Whether a decode result (success or failure) is already recorded.
    pub fn is_cached(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }
}

/// Decode an icon file and scale its larger dimension down to `size`,
/// preserving aspect ratio.
fn load_icon(path: &str, size: u32) -> anyhow::Result<Icon> {
    let expanded = shellexpand::tilde(path);
    let img = image::open(expanded.as_ref())?;
    let scaled = img.resize(size, size, FilterType::Triangle);
    let rgba = scaled.to_rgba8();
    let (width, height) = rgba.dimensions();

    // RGBA -> BGRA for X11
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for px in rgba.pixels() {
        let [r, g, b, a] = px.0;
        pixels.extend_from_slice(&[b, g, r, a]);
    }

    Ok(Icon { pixels, width, height })
}
