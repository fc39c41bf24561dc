//! X11 implementation of the popup drawing seam.
//!
//! Popups are small override-redirect windows on the root, drawn with core
//! protocol requests: solid fills through a per-window GC and text/icons
//! uploaded as ZPixmap data. Glyphs are rasterized with FreeType into BGRA
//! buffers before upload.
//!
//! Screen geometry comes from RandR 1.5 GetMonitors with a fallback to the
//! core screen dimensions, mirroring how compositors without RandR report a
//! single output.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use freetype::Library as FtLibrary;
use x11rb::connection::Connection;
use x11rb::protocol::randr;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;

use crate::config::NotifyConfig;
use crate::icon::Icon;
use crate::surface::PopupSurface;
use crate::types::{Point, Rect};

// =============================================================================
// Screen geometry
// =============================================================================

/// Known output geometries, in RandR order.
pub struct Screens {
    rects: Vec<Rect>,
}

impl Screens {
    /// Query output geometry via RandR. When RandR reports nothing (bare
    /// Xvfb, some nested servers) the core screen acts as a single output.
    pub fn query(conn: &RustConnection, root: Window) -> Result<Self> {
        let reply = randr::get_monitors(conn, root, true)?
            .reply()
            .context("Failed to get monitors from RandR")?;

        let mut rects: Vec<Rect> = reply
            .monitors
            .iter()
            .map(|m| Rect::new(m.x as i32, m.y as i32, m.width as u32, m.height as u32))
            .collect();

        if rects.is_empty() {
            log::warn!("No RandR monitors, falling back to screen dimensions");
            let screen = &conn.setup().roots[0];
            rects.push(Rect::new(
                0,
                0,
                screen.width_in_pixels as u32,
                screen.height_in_pixels as u32,
            ));
        }

        log::info!("{} screen(s) available for popups", rects.len());
        Ok(Self { rects })
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Origin of a fixed screen index. Out of range means the config names
    /// a screen that doesn't exist, which is fatal.
    pub fn origin_of(&self, index: usize) -> Result<Point> {
        match self.rects.get(index) {
            Some(rect) => Ok(rect.origin()),
            None => bail!(
                "configured screen index {} out of range ({} screens)",
                index,
                self.rects.len()
            ),
        }
    }

    /// Origin of the screen containing a point (e.g. the pointer or the
    /// focused window's center), defaulting to the first screen.
    pub fn origin_at(&self, x: i32, y: i32) -> Point {
        self.rects
            .iter()
            .find(|r| r.contains(x, y))
            .unwrap_or(&self.rects[0])
            .origin()
    }
}

/// Current pointer position on the root window.
pub fn pointer_position(conn: &RustConnection, root: Window) -> Result<Point> {
    let reply = conn.query_pointer(root)?.reply()?;
    Ok(Point::new(reply.root_x as i32, reply.root_y as i32))
}

// =============================================================================
// Glyph rasterization
// =============================================================================

/// A rasterized line of text (BGRX pixels ready for put_image)
struct TextImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

/// Font renderer using FreeType for anti-aliased popup text
pub struct FontRenderer {
    _library: FtLibrary,
    face: freetype::Face,
    line_height: u32,
    ascender: i32,
}

impl FontRenderer {
    /// Load the configured font at the configured size.
    pub fn new(font_name: &str, font_size: u32) -> Result<Self> {
        let library = FtLibrary::init().context("Failed to initialize FreeType")?;
        let font_path = find_font(font_name)?;
        log::info!("Loading font: {:?}", font_path);

        let face = library
            .new_face(&font_path, 0)
            .context("Failed to load font face")?;
        // Size in 1/64th points at 96 DPI
        face.set_char_size(0, (font_size as isize) * 64, 96, 96)
            .context("Failed to set font size")?;

        let metrics = face.size_metrics().context("Failed to get font metrics")?;
        Ok(Self {
            _library: library,
            face,
            line_height: (metrics.height >> 6) as u32,
            ascender: (metrics.ascender >> 6) as i32,
        })
    }

    /// Height of one text line in pixels
    pub fn line_height(&self) -> u32 {
        self.line_height
    }

    /// Width of a string in pixels
    pub fn measure(&self, text: &str) -> u32 {
        let mut width: i32 = 0;
        for ch in text.chars() {
            if self
                .face
                .load_char(ch as usize, freetype::face::LoadFlag::DEFAULT)
                .is_ok()
            {
                width += (self.face.glyph().advance().x >> 6) as i32;
            }
        }
        width.max(0) as u32
    }

    /// Rasterize one line over a solid background.
    fn rasterize(&self, text: &str, fg: u32, bg: u32) -> TextImage {
        let width = self.measure(text);
        let height = self.line_height;
        if width == 0 || height == 0 {
            return TextImage {
                pixels: Vec::new(),
                width: 0,
                height: 0,
            };
        }

        let mut pixels = solid_bgrx(bg, (width * height) as usize);
        let (fg_b, fg_g, fg_r) = channels(fg);
        let (bg_b, bg_g, bg_r) = channels(bg);

        let mut pen_x: i32 = 0;
        for ch in text.chars() {
            if self
                .face
                .load_char(ch as usize, freetype::face::LoadFlag::RENDER)
                .is_err()
            {
                continue;
            }
            let glyph = self.face.glyph();
            let bitmap = glyph.bitmap();
            let left = pen_x + glyph.bitmap_left();
            let top = self.ascender - glyph.bitmap_top();

            for row in 0..bitmap.rows() {
                for col in 0..bitmap.width() {
                    let px = left + col;
                    let py = top + row;
                    if px < 0 || px >= width as i32 || py < 0 || py >= height as i32 {
                        continue;
                    }
                    let alpha = bitmap.buffer()[(row * bitmap.pitch() + col) as usize] as u32;
                    if alpha == 0 {
                        continue;
                    }
                    let idx = ((py as u32 * width + px as u32) * 4) as usize;
                    pixels[idx] = mix(fg_b, bg_b, alpha);
                    pixels[idx + 1] = mix(fg_g, bg_g, alpha);
                    pixels[idx + 2] = mix(fg_r, bg_r, alpha);
                }
            }
            pen_x += (glyph.advance().x >> 6) as i32;
        }

        TextImage { pixels, width, height }
    }
}

/// Alpha blend one channel of foreground over background
fn mix(fg: u8, bg: u8, alpha: u32) -> u8 {
    ((fg as u32 * alpha + bg as u32 * (255 - alpha)) / 255) as u8
}

/// Split a color into (b, g, r) channel bytes
fn channels(color: u32) -> (u8, u8, u8) {
    (
        (color & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        ((color >> 16) & 0xFF) as u8,
    )
}

/// A solid-color BGRX buffer of `count` pixels
fn solid_bgrx(color: u32, count: usize) -> Vec<u8> {
    let (b, g, r) = channels(color);
    let mut pixels = vec![0u8; count * 4];
    for px in pixels.chunks_exact_mut(4) {
        px[0] = b;
        px[1] = g;
        px[2] = r;
        px[3] = 0;
    }
    pixels
}

/// Find a font file for the given family name, searching the standard
/// directories; falls back to any regular TTF/OTF it can find.
fn find_font(font_name: &str) -> Result<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    if let Some(home) = dirs::home_dir() {
        roots.push(home.join(".local/share/fonts"));
    }
    roots.push(PathBuf::from("/usr/local/share/fonts"));
    roots.push(PathBuf::from("/usr/share/fonts"));
    roots.retain(|d| d.exists());

    // Generic family names map to a list of common concrete fonts
    let patterns: Vec<String> = match font_name {
        "sans" | "sans-serif" => vec!["dejavusans", "liberationsans", "notosans", "freesans"]
            .into_iter()
            .map(String::from)
            .collect(),
        "monospace" | "mono" => vec!["dejavusansmono", "liberationmono", "notosansmono"]
            .into_iter()
            .map(String::from)
            .collect(),
        other => vec![other.replace(' ', "").to_lowercase()],
    };

    for pattern in &patterns {
        for dir in &roots {
            if let Some(path) = find_in_dir(dir, Some(pattern)) {
                return Ok(path);
            }
        }
    }
    for dir in &roots {
        if let Some(path) = find_in_dir(dir, None) {
            log::warn!("Font '{}' not found, using fallback: {:?}", font_name, path);
            return Ok(path);
        }
    }
    bail!("No suitable font found for '{}'", font_name)
}

/// Recursively search a directory for a regular-weight font file, optionally
/// requiring the file name to contain `pattern`.
fn find_in_dir(dir: &Path, pattern: Option<&str>) -> Option<PathBuf> {
    for entry in std::fs::read_dir(dir).ok()?.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_in_dir(&path, pattern) {
                return Some(found);
            }
            continue;
        }
        let name = path.file_name()?.to_str()?.to_lowercase();
        let is_font = name.ends_with(".ttf") || name.ends_with(".otf");
        let is_regular =
            !name.contains("bold") && !name.contains("italic") && !name.contains("oblique");
        let matches = pattern.map_or(true, |p| name.replace('-', "").contains(p));
        if is_font && is_regular && matches {
            return Some(path);
        }
    }
    None
}

// =============================================================================
// Popup windows
// =============================================================================

/// One override-redirect popup window with its GC.
pub struct X11Popup {
    conn: Rc<RustConnection>,
    font: Rc<FontRenderer>,
    window: Window,
    gc: Gcontext,
    width: u32,
    height: u32,
    /// Last cleared background, used to pre-blend text and icons
    background: u32,
}

impl X11Popup {
    /// Create an unmapped popup window on the root.
    pub fn new(
        conn: Rc<RustConnection>,
        font: Rc<FontRenderer>,
        root: Window,
        config: &NotifyConfig,
    ) -> Result<Self> {
        let window = conn.generate_id()?;
        conn.create_window(
            x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            root,
            config.x as i16,
            config.y as i16,
            config.width as u16,
            config.height as u16,
            config.border_width as u16,
            WindowClass::INPUT_OUTPUT,
            x11rb::COPY_FROM_PARENT,
            &CreateWindowAux::new()
                .background_pixel(config.background[1])
                .border_pixel(config.border[1])
                .override_redirect(1) // Don't let the WM manage popups
                .event_mask(EventMask::BUTTON_PRESS),
        )?;

        let gc = conn.generate_id()?;
        conn.create_gc(gc, window, &CreateGCAux::new().graphics_exposures(0))?;

        Ok(Self {
            conn,
            font,
            window,
            gc,
            width: config.width,
            height: config.height,
            background: config.background[1],
        })
    }

    /// Build one popup per slot, sharing the connection and font.
    pub fn create_pool(
        conn: &Rc<RustConnection>,
        font: &Rc<FontRenderer>,
        root: Window,
        config: &NotifyConfig,
    ) -> Result<Vec<X11Popup>> {
        (0..config.max_windows)
            .map(|_| X11Popup::new(Rc::clone(conn), Rc::clone(font), root, config))
            .collect()
    }

    /// X window id, for routing button press events back to a slot
    pub fn window(&self) -> Window {
        self.window
    }

    /// Upload a BGRX buffer at the given position, cropped to the popup.
    fn put_pixels(&self, x: i32, y: i32, pixels: &[u8], width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || x >= self.width as i32 || y >= self.height as i32 {
            return Ok(());
        }
        let visible_w = width.min(self.width.saturating_sub(x.max(0) as u32));
        let visible_h = height.min(self.height.saturating_sub(y.max(0) as u32));
        if visible_w == 0 || visible_h == 0 {
            return Ok(());
        }

        // Crop row by row when the buffer overhangs the right/bottom edge
        let data: std::borrow::Cow<[u8]> = if visible_w == width && visible_h == height {
            pixels.into()
        } else {
            let mut cropped = Vec::with_capacity((visible_w * visible_h * 4) as usize);
            for row in 0..visible_h {
                let start = (row * width * 4) as usize;
                cropped.extend_from_slice(&pixels[start..start + (visible_w * 4) as usize]);
            }
            cropped.into()
        };

        self.conn.put_image(
            ImageFormat::Z_PIXMAP,
            self.window,
            self.gc,
            visible_w as u16,
            visible_h as u16,
            x as i16,
            y as i16,
            0,
            24,
            &data,
        )?;
        Ok(())
    }
}

impl PopupSurface for X11Popup {
    fn clear(&mut self, background: u32) -> Result<()> {
        self.background = background;
        self.conn.change_window_attributes(
            self.window,
            &ChangeWindowAttributesAux::new().background_pixel(background),
        )?;
        self.conn
            .change_gc(self.gc, &ChangeGCAux::new().foreground(background))?;
        self.conn.poly_fill_rectangle(
            self.window,
            self.gc,
            &[Rectangle {
                x: 0,
                y: 0,
                width: self.width as u16,
                height: self.height as u16,
            }],
        )?;
        Ok(())
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, foreground: u32) -> Result<()> {
        let image = self.font.rasterize(text, foreground, self.background);
        self.put_pixels(x, y, &image.pixels, image.width, image.height)
    }

    fn draw_image(&mut self, x: i32, y: i32, icon: &Icon) -> Result<()> {
        // Pre-blend the icon's alpha against the popup background; core X
        // put_image has no alpha channel
        let (bg_b, bg_g, bg_r) = channels(self.background);
        let mut blended = Vec::with_capacity(icon.pixels.len());
        for px in icon.pixels.chunks_exact(4) {
            let alpha = px[3] as u32;
            blended.push(mix(px[0], bg_b, alpha));
            blended.push(mix(px[1], bg_g, alpha));
            blended.push(mix(px[2], bg_r, alpha));
            blended.push(0);
        }
        self.put_pixels(x, y, &blended, icon.width, icon.height)
    }

    fn set_border(&mut self, color: u32) -> Result<()> {
        self.conn.change_window_attributes(
            self.window,
            &ChangeWindowAttributesAux::new().border_pixel(color),
        )?;
        Ok(())
    }

    fn place(&mut self, position: Point) -> Result<()> {
        self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new()
                .x(position.x)
                .y(position.y)
                .stack_mode(StackMode::ABOVE),
        )?;
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        self.conn.map_window(self.window)?;
        self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        self.conn.flush()?;
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        self.conn.unmap_window(self.window)?;
        self.conn.flush()?;
        Ok(())
    }

    fn text_width(&self, text: &str) -> u32 {
        self.font.measure(text)
    }

    fn line_height(&self) -> u32 {
        self.font.line_height()
    }
}
