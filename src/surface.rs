//! The drawing seam between the popup manager and the host toolkit.
//!
//! The manager drives one [`PopupSurface`] per slot through these
//! primitives and never touches the toolkit directly, which is what lets
//! the whole state machine run against in-memory fakes in tests.

use anyhow::Result;

use crate::icon::Icon;
use crate::types::Point;

/// A drawable popup rectangle with a fixed size and a movable position.
///
/// Implementations own whatever toolkit resources back the rectangle (an
/// X11 window, a wayland surface, a test buffer). All drawing happens into
/// a back state that becomes visible on [`show`](PopupSurface::show);
/// the manager always issues a full clear/draw/place/show sequence per
/// render, so implementations don't need damage tracking.
pub trait PopupSurface {
    /// Fill the whole surface with a background color
    fn clear(&mut self, background: u32) -> Result<()>;

    /// Draw one line of text at the given surface-relative position
    fn draw_text(&mut self, x: i32, y: i32, text: &str, foreground: u32) -> Result<()>;

    /// Draw a decoded icon at the given surface-relative position
    fn draw_image(&mut self, x: i32, y: i32, icon: &Icon) -> Result<()>;

    /// Set the border color (border width is fixed at surface creation)
    fn set_border(&mut self, color: u32) -> Result<()>;

    /// Move the surface to a screen-absolute position
    fn place(&mut self, position: Point) -> Result<()>;

    /// Make the surface visible, above other windows
    fn show(&mut self) -> Result<()>;

    /// Hide the surface
    fn hide(&mut self) -> Result<()>;

    /// Width of a string in pixels, used for word wrapping
    fn text_width(&self, text: &str) -> u32;

    /// Height of one rendered text line in pixels
    fn line_height(&self) -> u32;
}
