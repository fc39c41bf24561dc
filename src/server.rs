//! The notification popup server.
//!
//! Owns a fixed pool of popup slots and decides, per incoming notification,
//! whether to draw it, update a visible popup in place, or queue it. Also
//! runs the history browsing cursor and the pause/resume queue draining.
//!
//! Everything here executes on the host's single event-loop thread:
//! `submit` from the notification delivery callback, `handle_timeout` from
//! deferred timer callbacks, the rest from key-triggered actions. The only
//! ordering hazard is an auto-close timer firing after its slot was reused;
//! timers carry a render id and fires with a stale id are dropped.

use std::collections::VecDeque;

use anyhow::{ensure, Result};
use slotmap::{new_key_type, SlotMap};

use crate::actions::Action;
use crate::config::{FullscreenPolicy, NotifyConfig};
use crate::host::{CloseToken, Host};
use crate::icon::IconCache;
use crate::notification::Notification;
use crate::surface::PopupSurface;
use crate::text;

new_key_type! {
    /// Stable identifier for a popup slot
    pub struct SlotId;
}

/// One reusable popup surface and its current binding.
struct Slot<S> {
    surface: S,
    /// Sender-supplied id of the notification on screen, for in-place updates
    replaces_id: Option<u32>,
    /// Epoch of the slot's current occupant; auto-close callbacks carrying
    /// an older value are stale and ignored
    render_id: u64,
}

/// History browsing state: one borrowed slot and a cursor into the log.
struct Browse {
    slot: SlotId,
    cursor: usize,
}

/// The notification popup manager.
///
/// Every slot is, at any time, in exactly one of three ownership states:
/// in the hidden pool, in the shown list (oldest first), or bound to the
/// browsing cursor. `hidden + shown + (1 if browsing) == max_windows`
/// always holds.
pub struct Server<S: PopupSurface> {
    config: NotifyConfig,
    slots: SlotMap<SlotId, Slot<S>>,
    /// Free pool
    hidden: Vec<SlotId>,
    /// Slots displaying live notifications, oldest first (stacking order)
    shown: Vec<SlotId>,
    /// History indices of notifications waiting for a free slot
    queue: VecDeque<usize>,
    /// Append-only log of every notification ever received
    history: Vec<Notification>,
    browse: Option<Browse>,
    icons: IconCache,
    last_render_id: u64,
    paused: bool,
    fullscreen: bool,
}

impl<S: PopupSurface> Server<S> {
    /// Create a server over a fixed set of popup surfaces, one per slot.
    ///
    /// The number of surfaces must match `config.max_windows`; the slot
    /// pool never grows or shrinks afterwards.
    pub fn new(config: NotifyConfig, surfaces: Vec<S>) -> Result<Self> {
        ensure!(
            surfaces.len() == config.max_windows,
            "expected {} popup surfaces, got {}",
            config.max_windows,
            surfaces.len()
        );
        let mut slots = SlotMap::with_key();
        let hidden = surfaces
            .into_iter()
            .map(|surface| {
                slots.insert(Slot {
                    surface,
                    replaces_id: None,
                    render_id: 0,
                })
            })
            .collect();
        let icons = IconCache::new(config.icon_size);
        Ok(Self {
            config,
            slots,
            hidden,
            shown: Vec::new(),
            queue: VecDeque::new(),
            history: Vec::new(),
            browse: None,
            icons,
            last_render_id: 0,
            paused: false,
            fullscreen: false,
        })
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Handle a newly delivered notification: record it in history, then
    /// draw it, update a visible popup in place, or queue it.
    pub fn submit(&mut self, notif: Notification, host: &mut impl Host) -> Result<()> {
        log::debug!(
            "notification from {:?}: {:?} (urgency {:?})",
            notif.app_name,
            notif.summary,
            notif.urgency
        );
        let index = self.history.len();
        self.history.push(notif);
        self.admit(index, host)
    }

    /// Admission decision for the history entry at `index`.
    fn admit(&mut self, index: usize, host: &mut impl Host) -> Result<()> {
        if self.paused {
            self.queue.push_back(index);
            return Ok(());
        }

        if self.fullscreen && self.config.fullscreen != FullscreenPolicy::Show {
            if self.config.fullscreen == FullscreenPolicy::Queue {
                self.queue.push_back(index);
            } else {
                log::debug!("dropping notification {} (fullscreen)", index);
            }
            return Ok(());
        }

        // In-place update of a visible popup keeps its screen position and
        // never touches the queue
        if let Some(id) = self.history[index].replaces_id {
            if let Some(rank) = self
                .shown
                .iter()
                .position(|&sid| self.slots[sid].replaces_id == Some(id))
            {
                let slot_id = self.shown[rank];
                self.render(slot_id, index, rank, None, host)?;
                self.reposition(host)?;
                return Ok(());
            }
        }

        if let Some(slot_id) = self.hidden.pop() {
            self.shown.push(slot_id);
            let rank = self.shown.len() - 1;
            self.render(slot_id, index, rank, None, host)
        } else {
            self.queue.push_back(index);
            Ok(())
        }
    }

    /// Re-admit everything in the queue in original order. Entries that
    /// still find no slot end up queued again, order preserved.
    fn drain_queue(&mut self, host: &mut impl Host) -> Result<()> {
        let pending: Vec<usize> = self.queue.drain(..).collect();
        for index in pending {
            self.admit(index, host)?;
        }
        Ok(())
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Draw the history entry at `index` into a slot positioned at stacking
    /// rank `rank`, and schedule its auto-close.
    ///
    /// Timeout resolution: an explicit `timeout_override` >= 0 wins, else
    /// the notification's own timeout if the sender set one, else the
    /// per-urgency default. A resolved timeout of 0 never auto-closes.
    fn render(
        &mut self,
        slot_id: SlotId,
        index: usize,
        rank: usize,
        timeout_override: Option<u32>,
        host: &mut impl Host,
    ) -> Result<()> {
        self.last_render_id += 1;
        let render_id = self.last_render_id;

        let notif = &self.history[index];
        let urgency = notif.urgency.index();
        let formatted = text::format_text(&self.config.format, notif);
        let icon_path = notif.app_icon.clone();
        let notif_timeout = notif.timeout_ms;
        let replaces_id = notif.replaces_id;

        let origin = host.screen_origin(self.config.screen)?;
        let position = self.config.base_position(rank).offset(origin);

        let icon = match icon_path.as_deref() {
            Some(path) => self.icons.get(path),
            None => None,
        };
        let max_width = self.config.text_width(icon.is_some());

        let slot = &mut self.slots[slot_id];
        slot.render_id = render_id;
        slot.replaces_id = replaces_id;

        slot.surface.clear(self.config.background[urgency])?;

        let pad = self.config.horizontal_padding;
        let mut text_x = pad as i32;
        if let Some(icon) = icon {
            let icon_y = 1 + (self.config.height as i32 - icon.height as i32) / 2;
            slot.surface.draw_image(pad as i32, icon_y, icon)?;
            text_x += (self.config.icon_size + pad / 2) as i32;
        }

        let lines = text::wrap_text(&formatted, max_width, |s| slot.surface.text_width(s));
        let line_step = (slot.surface.line_height() + self.config.line_spacing) as i32;
        for (num, line) in lines.iter().enumerate() {
            let y = self.config.vertical_padding as i32 + num as i32 * line_step;
            slot.surface.draw_text(text_x, y, line, self.config.foreground[urgency])?;
        }

        if self.config.border_width > 0 {
            slot.surface.set_border(self.config.border[urgency])?;
        }
        slot.surface.place(position)?;
        slot.surface.show()?;

        let timeout = timeout_override
            .or(notif_timeout)
            .unwrap_or(self.config.timeout_ms[urgency]);
        if timeout > 0 {
            host.schedule_close(
                timeout,
                CloseToken {
                    slot: slot_id,
                    render_id,
                },
            );
        }
        Ok(())
    }

    /// Move every shown slot to the position for its current rank.
    fn reposition(&mut self, host: &mut impl Host) -> Result<()> {
        let origin = host.screen_origin(self.config.screen)?;
        for (rank, &slot_id) in self.shown.iter().enumerate() {
            let position = self.config.base_position(rank).offset(origin);
            self.slots[slot_id].surface.place(position)?;
        }
        Ok(())
    }

    // =========================================================================
    // Close & recycle
    // =========================================================================

    /// Deferred auto-close callback. A no-op unless the token's render id
    /// still matches the slot's: a mismatch means the slot was reused (or
    /// re-rendered) after the timer was scheduled.
    pub fn handle_timeout(&mut self, token: CloseToken, host: &mut impl Host) -> Result<()> {
        let current = self
            .slots
            .get(token.slot)
            .map_or(false, |slot| slot.render_id == token.render_id);
        if current {
            self.close_slot(token.slot, host)
        } else {
            log::debug!("ignoring stale auto-close for {:?}", token.slot);
            Ok(())
        }
    }

    /// Close one slot: hide it, clear any browsing binding to it, and either
    /// recycle it straight into the oldest queued notification or return it
    /// to the free pool. Remaining popups are restacked either way.
    fn close_slot(&mut self, slot_id: SlotId, host: &mut impl Host) -> Result<()> {
        let shown_rank = self.shown.iter().position(|&sid| sid == slot_id);
        let browsing = self.browse.as_ref().map_or(false, |b| b.slot == slot_id);
        if shown_rank.is_none() && !browsing {
            return Ok(());
        }

        if let Some(rank) = shown_rank {
            self.shown.remove(rank);
        }
        if browsing {
            self.browse = None;
        }

        let slot = &mut self.slots[slot_id];
        slot.replaces_id = None;
        slot.surface.hide()?;

        let next = if self.paused { None } else { self.queue.pop_front() };
        if let Some(index) = next {
            // Skip the free pool: the queued notification takes the slot
            // immediately
            self.shown.push(slot_id);
            let rank = self.shown.len() - 1;
            self.render(slot_id, index, rank, None, host)?;
        } else {
            self.hidden.push(slot_id);
        }

        self.reposition(host)
    }

    /// Close the oldest visible popup (key-triggered). With no live popups
    /// on screen this closes the browsing popup instead, ending the
    /// browsing session.
    pub fn close(&mut self, host: &mut impl Host) -> Result<()> {
        if let Some(&oldest) = self.shown.first() {
            self.close_slot(oldest, host)?;
        } else if let Some(browse) = self.browse.as_ref() {
            let slot_id = browse.slot;
            self.close_slot(slot_id, host)?;
        }
        Ok(())
    }

    /// Close a specific popup, e.g. on a click on its surface.
    pub fn dismiss(&mut self, slot_id: SlotId, host: &mut impl Host) -> Result<()> {
        self.close_slot(slot_id, host)
    }

    /// Clear the queue, then close every popup oldest-first. Closes go one
    /// at a time so the usual recycle logic runs (the queue being already
    /// empty, each close just frees its slot).
    pub fn close_all(&mut self, host: &mut impl Host) -> Result<()> {
        self.queue.clear();
        while let Some(&oldest) = self.shown.first() {
            self.close_slot(oldest, host)?;
        }
        Ok(())
    }

    // =========================================================================
    // History browsing
    // =========================================================================

    /// Show the previous notification in the history.
    ///
    /// The first call borrows a slot (free pool preferred, else the oldest
    /// visible popup) and starts the cursor past the end of the log, so it
    /// lands on the newest entry.
    pub fn previous(&mut self, host: &mut impl Host) -> Result<()> {
        if self.history.is_empty() {
            return Ok(());
        }
        if self.browse.is_none() {
            let slot_id = if self.hidden.is_empty() {
                self.shown.remove(0)
            } else {
                self.hidden.remove(0)
            };
            self.browse = Some(Browse {
                slot: slot_id,
                cursor: self.history.len(),
            });
        }
        let Some(browse) = self.browse.as_mut() else {
            return Ok(());
        };
        if browse.cursor > 0 {
            browse.cursor -= 1;
        }
        let (slot_id, cursor) = (browse.slot, browse.cursor);
        self.render_history(slot_id, cursor, host)
    }

    /// Show the next notification in the history. No-op when not browsing.
    pub fn next(&mut self, host: &mut impl Host) -> Result<()> {
        let Some(browse) = self.browse.as_mut() else {
            return Ok(());
        };
        if browse.cursor + 1 < self.history.len() {
            browse.cursor += 1;
        }
        let (slot_id, cursor) = (browse.slot, browse.cursor);
        // Browsing yields to real-time notifications: if one claimed this
        // slot since the last step, take the slot back out of the shown list
        // (last write wins)
        if let Some(rank) = self.shown.iter().position(|&sid| sid == slot_id) {
            self.shown.remove(rank);
        }
        self.render_history(slot_id, cursor, host)
    }

    /// Render a history entry into the browsing slot, below all live popups.
    /// With sticky history the popup never auto-closes.
    fn render_history(&mut self, slot_id: SlotId, cursor: usize, host: &mut impl Host) -> Result<()> {
        let timeout_override = if self.config.sticky_history { Some(0) } else { None };
        let rank = self.shown.len();
        self.render(slot_id, cursor, rank, timeout_override, host)
    }

    // =========================================================================
    // Pause / resume
    // =========================================================================

    /// Stop displaying notifications. Visible popups are closed (they stay
    /// in history but are not re-queued); new submissions queue up.
    pub fn pause(&mut self, host: &mut impl Host) -> Result<()> {
        if self.paused {
            return Ok(());
        }
        log::info!("notifications paused");
        self.paused = true;
        while let Some(&oldest) = self.shown.first() {
            self.close_slot(oldest, host)?;
        }
        Ok(())
    }

    /// Resume display and drain the queue in submission order; whatever
    /// doesn't fit the free slots stays queued.
    pub fn resume(&mut self, host: &mut impl Host) -> Result<()> {
        if !self.paused {
            return Ok(());
        }
        log::info!("notifications resumed");
        self.paused = false;
        self.drain_queue(host)
    }

    pub fn toggle_pause(&mut self, host: &mut impl Host) -> Result<()> {
        if self.paused {
            self.resume(host)
        } else {
            self.pause(host)
        }
    }

    // =========================================================================
    // Host lifecycle
    // =========================================================================

    /// Host callback for fullscreen focus transitions. Leaving fullscreen
    /// under the queue policy releases deferred notifications.
    pub fn set_fullscreen(&mut self, active: bool, host: &mut impl Host) -> Result<()> {
        if self.fullscreen == active {
            return Ok(());
        }
        self.fullscreen = active;
        if !active && self.config.fullscreen == FullscreenPolicy::Queue {
            self.drain_queue(host)?;
        }
        Ok(())
    }

    /// Dispatch a key-triggered action.
    pub fn handle_action(&mut self, action: Action, host: &mut impl Host) -> Result<()> {
        log::debug!("action: {}", action.name());
        match action {
            Action::Close => self.close(host),
            Action::CloseAll => self.close_all(host),
            Action::Previous => self.previous(host),
            Action::Next => self.next(host),
            Action::TogglePause => self.toggle_pause(host),
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Slots currently displaying live notifications, oldest first.
    pub fn shown(&self) -> &[SlotId] {
        &self.shown
    }

    /// Number of slots in the free pool.
    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }

    /// Number of notifications waiting for a slot.
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Total notifications ever received.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The slot bound to history browsing, if any.
    pub fn browsing_slot(&self) -> Option<SlotId> {
        self.browse.as_ref().map(|b| b.slot)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Borrow a slot's surface, e.g. to map a clicked window back to a slot.
    pub fn surface(&self, slot_id: SlotId) -> Option<&S> {
        self.slots.get(slot_id).map(|slot| &slot.surface)
    }

    /// Render epoch of a slot's current occupant.
    pub fn render_id(&self, slot_id: SlotId) -> Option<u64> {
        self.slots.get(slot_id).map(|slot| slot.render_id)
    }

    pub fn config(&self) -> &NotifyConfig {
        &self.config
    }
}
