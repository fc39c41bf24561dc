//! Host integration trait.
//!
//! The embedding window manager owns the event loop, the timer facility and
//! the screen layout. Every public server operation takes a `&mut impl
//! Host` so the manager can schedule auto-close callbacks and resolve the
//! active screen without owning either.

use anyhow::Result;

use crate::config::ScreenSelect;
use crate::server::SlotId;
use crate::types::Point;

/// Token carried by a scheduled auto-close callback.
///
/// The host hands it back through `Server::handle_timeout` when the delay
/// elapses. The render id makes stale fires harmless: timers are never
/// cancelled, a fire whose render id no longer matches the slot's is
/// silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseToken {
    pub slot: SlotId,
    pub render_id: u64,
}

/// Services the host event loop provides to the notification server.
pub trait Host {
    /// Schedule `Server::handle_timeout(token)` to be invoked on the event
    /// loop after `delay_ms` milliseconds. There is no cancellation handle;
    /// stale fires are filtered by the token's render id.
    fn schedule_close(&mut self, delay_ms: u32, token: CloseToken);

    /// Root-window origin of the screen popups should appear on.
    ///
    /// `ScreenSelect::Index` out of range is a configuration error and must
    /// fail; focus/mouse resolution always succeeds (the host always has
    /// some current screen).
    fn screen_origin(&self, select: ScreenSelect) -> Result<Point>;
}
