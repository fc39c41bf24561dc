//! End-to-end scenarios for the notification server state machine.
//!
//! The server never touches X directly - all drawing goes through the
//! PopupSurface trait and all timers/screens through the Host trait - so
//! these tests drive the full admission/queue/browse/pause lifecycle with
//! in-memory fakes and assert on the recorded draw calls.

use std::collections::HashMap;

use anyhow::{bail, Result};
use notipop::{
    Action, CloseToken, Config, Host, Notification, NotifyConfig, Point, PopupSurface, Server,
    ScreenSelect, SlotId, Urgency,
};

// =============================================================================
// Fakes
// =============================================================================

/// Popup surface that records draw calls instead of drawing.
#[derive(Debug, Default)]
struct FakeSurface {
    visible: bool,
    position: Option<Point>,
    background: Option<u32>,
    border: Option<u32>,
    /// Text lines drawn since the last clear
    lines: Vec<String>,
    images_drawn: usize,
}

impl PopupSurface for FakeSurface {
    fn clear(&mut self, background: u32) -> Result<()> {
        self.background = Some(background);
        self.lines.clear();
        self.images_drawn = 0;
        Ok(())
    }

    fn draw_text(&mut self, _x: i32, _y: i32, text: &str, _foreground: u32) -> Result<()> {
        self.lines.push(text.to_string());
        Ok(())
    }

    fn draw_image(&mut self, _x: i32, _y: i32, _icon: &notipop::icon::Icon) -> Result<()> {
        self.images_drawn += 1;
        Ok(())
    }

    fn set_border(&mut self, color: u32) -> Result<()> {
        self.border = Some(color);
        Ok(())
    }

    fn place(&mut self, position: Point) -> Result<()> {
        self.position = Some(position);
        Ok(())
    }

    fn show(&mut self) -> Result<()> {
        self.visible = true;
        Ok(())
    }

    fn hide(&mut self) -> Result<()> {
        self.visible = false;
        Ok(())
    }

    fn text_width(&self, text: &str) -> u32 {
        // Monospace cell of 8 pixels, wide enough that short test
        // summaries stay on one line
        text.chars().count() as u32 * 8
    }

    fn line_height(&self) -> u32 {
        16
    }
}

/// Host that records scheduled timers and serves fixed screen origins.
struct FakeHost {
    scheduled: Vec<(u32, CloseToken)>,
    origins: Vec<Point>,
}

impl Default for FakeHost {
    fn default() -> Self {
        Self {
            scheduled: Vec::new(),
            origins: vec![Point::new(0, 0)],
        }
    }
}

impl Host for FakeHost {
    fn schedule_close(&mut self, delay_ms: u32, token: CloseToken) {
        self.scheduled.push((delay_ms, token));
    }

    fn screen_origin(&self, select: ScreenSelect) -> Result<Point> {
        match select {
            ScreenSelect::Focus | ScreenSelect::Mouse => Ok(self.origins[0]),
            ScreenSelect::Index(i) => match self.origins.get(i) {
                Some(&origin) => Ok(origin),
                None => bail!("screen index {} out of range", i),
            },
        }
    }
}

// =============================================================================
// Fixture
// =============================================================================

/// Test fixture bundling a server over fakes with assertion helpers.
struct Fixture {
    server: Server<FakeSurface>,
    host: FakeHost,
}

impl Fixture {
    fn new(max_windows: usize) -> Self {
        Self::with_config(max_windows, |_| {})
    }

    fn with_config(max_windows: usize, tweak: impl FnOnce(&mut NotifyConfig)) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut config = Config::default().resolve();
        config.max_windows = max_windows;
        // One text line per popup keeps assertions simple
        config.format = "{summary}".to_string();
        tweak(&mut config);
        let surfaces = (0..max_windows).map(|_| FakeSurface::default()).collect();
        let server = Server::new(config, surfaces).unwrap();
        Fixture {
            server,
            host: FakeHost::default(),
        }
    }

    fn submit(&mut self, notif: Notification) {
        self.server.submit(notif, &mut self.host).unwrap();
        self.check_invariant();
    }

    /// Fire every timer scheduled so far, in scheduling order
    fn fire_timers(&mut self) {
        let pending: Vec<_> = self.host.scheduled.drain(..).collect();
        for (_, token) in pending {
            self.server.handle_timeout(token, &mut self.host).unwrap();
        }
        self.check_invariant();
    }

    fn action(&mut self, action: Action) {
        self.server.handle_action(action, &mut self.host).unwrap();
        self.check_invariant();
    }

    /// Pool partition invariant: every slot is hidden, shown, or browsing
    fn check_invariant(&self) {
        let browsing = self.server.browsing_slot().is_some() as usize;
        assert_eq!(
            self.server.hidden_count() + self.server.shown().len() + browsing,
            self.server.config().max_windows,
            "slot pool invariant violated"
        );
    }

    /// First text line of each shown popup, in stacking order
    fn shown_lines(&self) -> Vec<String> {
        self.server
            .shown()
            .iter()
            .map(|&sid| self.surface(sid).lines[0].clone())
            .collect()
    }

    fn surface(&self, sid: SlotId) -> &FakeSurface {
        self.server.surface(sid).unwrap()
    }

    fn browsing_surface(&self) -> &FakeSurface {
        self.surface(self.server.browsing_slot().expect("not browsing"))
    }
}

fn notif(summary: &str) -> Notification {
    Notification {
        summary: summary.to_string(),
        body: String::new(),
        app_name: "test".to_string(),
        app_icon: None,
        urgency: Urgency::Normal,
        timeout_ms: None,
        replaces_id: None,
        hints: HashMap::new(),
    }
}

fn notif_replacing(summary: &str, id: u32) -> Notification {
    Notification {
        replaces_id: Some(id),
        ..notif(summary)
    }
}

// =============================================================================
// Admission & queueing
// =============================================================================

#[test]
fn shows_up_to_max_windows_then_queues() {
    let mut fx = Fixture::new(2);
    fx.submit(notif("N1"));
    fx.submit(notif("N2"));
    fx.submit(notif("N3"));

    assert_eq!(fx.shown_lines(), vec!["N1", "N2"]);
    assert_eq!(fx.server.queued_count(), 1);
    assert_eq!(fx.server.hidden_count(), 0);
    assert_eq!(fx.server.history_len(), 3);
}

#[test]
fn close_recycles_queued_notification_fifo() {
    let mut fx = Fixture::new(2);
    for name in ["N1", "N2", "N3", "N4"] {
        fx.submit(notif(name));
    }
    assert_eq!(fx.server.queued_count(), 2);

    // Closing the oldest popup pulls N3 straight into the freed slot
    fx.action(Action::Close);
    assert_eq!(fx.shown_lines(), vec!["N2", "N3"]);
    assert_eq!(fx.server.queued_count(), 1);

    fx.action(Action::Close);
    assert_eq!(fx.shown_lines(), vec!["N3", "N4"]);
    assert_eq!(fx.server.queued_count(), 0);
}

#[test]
fn closing_repositions_remaining_popups() {
    let mut fx = Fixture::new(2);
    fx.submit(notif("N1"));
    fx.submit(notif("N2"));

    let rank1 = fx.server.config().base_position(1);
    let n2 = fx.server.shown()[1];
    assert_eq!(fx.surface(n2).position, Some(rank1));

    fx.action(Action::Close);
    // N2 moves up to the top position
    let rank0 = fx.server.config().base_position(0);
    assert_eq!(fx.surface(n2).position, Some(rank0));
}

#[test]
fn popups_are_placed_relative_to_screen_origin() {
    let mut fx = Fixture::new(1);
    fx.host.origins = vec![Point::new(1920, 0)];
    fx.submit(notif("N1"));

    let sid = fx.server.shown()[0];
    assert_eq!(fx.surface(sid).position, Some(Point::new(1920 + 32, 64)));
    assert!(fx.surface(sid).visible);
}

#[test]
fn out_of_range_screen_index_is_fatal() {
    let mut fx = Fixture::with_config(1, |c| c.screen = ScreenSelect::Index(3));
    let err = fx.server.submit(notif("N1"), &mut fx.host);
    assert!(err.is_err());
}

// =============================================================================
// Replace semantics
// =============================================================================

#[test]
fn replace_updates_shown_slot_in_place() {
    let mut fx = Fixture::new(2);
    fx.submit(notif_replacing("Track A", 7));
    fx.submit(notif("Other"));

    let slot = fx.server.shown()[0];
    let rid_before = fx.server.render_id(slot).unwrap();

    // Same sender id updates the same popup without consuming a slot
    fx.submit(notif_replacing("Track B", 7));
    assert_eq!(fx.shown_lines(), vec!["Track B", "Other"]);
    assert_eq!(fx.server.shown()[0], slot);
    assert_eq!(fx.server.hidden_count(), 0);
    assert_eq!(fx.server.queued_count(), 0);
    assert!(fx.server.render_id(slot).unwrap() > rid_before);
}

#[test]
fn replace_keeps_queue_order() {
    let mut fx = Fixture::new(1);
    fx.submit(notif_replacing("Track A", 7));
    fx.submit(notif("Queued"));
    fx.submit(notif_replacing("Track B", 7));

    // The replacement bypassed the queue entirely
    assert_eq!(fx.shown_lines(), vec!["Track B"]);
    assert_eq!(fx.server.queued_count(), 1);

    fx.action(Action::Close);
    assert_eq!(fx.shown_lines(), vec!["Queued"]);
}

#[test]
fn replace_without_match_takes_a_free_slot() {
    let mut fx = Fixture::new(2);
    fx.submit(notif_replacing("A", 7));
    fx.action(Action::Close);
    // The popup bound to id 7 is gone; a new id-7 notification is ordinary
    fx.submit(notif_replacing("B", 7));
    assert_eq!(fx.shown_lines(), vec!["B"]);
    assert_eq!(fx.server.hidden_count(), 1);
}

// =============================================================================
// Timers
// =============================================================================

#[test]
fn auto_close_fires_for_current_render() {
    let mut fx = Fixture::new(1);
    fx.submit(notif("N1"));
    assert_eq!(fx.host.scheduled.len(), 1);
    assert_eq!(fx.host.scheduled[0].0, 5000);

    fx.fire_timers();
    assert!(fx.server.shown().is_empty());
    assert_eq!(fx.server.hidden_count(), 1);
}

#[test]
fn stale_timer_never_closes_a_reused_slot() {
    let mut fx = Fixture::new(1);
    fx.submit(notif_replacing("Track A", 7));
    let stale: Vec<_> = fx.host.scheduled.drain(..).collect();

    // The slot is re-rendered before the first timer fires
    fx.submit(notif_replacing("Track B", 7));
    for (_, token) in stale {
        fx.server.handle_timeout(token, &mut fx.host).unwrap();
    }
    assert_eq!(fx.shown_lines(), vec!["Track B"]);

    // The second render's own timer still works
    fx.fire_timers();
    assert!(fx.server.shown().is_empty());
}

#[test]
fn render_ids_strictly_increase_across_slot_reuse() {
    let mut fx = Fixture::new(2);
    fx.submit(notif("A"));
    fx.submit(notif("B"));
    fx.submit(notif("C"));
    fx.submit(notif("D"));

    let ids = |fx: &Fixture| -> Vec<u64> {
        fx.server
            .shown()
            .iter()
            .map(|&sid| fx.server.render_id(sid).unwrap())
            .collect()
    };
    assert_eq!(ids(&fx), vec![1, 2]);

    // Each recycle from the queue gets a fresh, larger id
    fx.action(Action::Close);
    assert_eq!(ids(&fx), vec![2, 3]);
    fx.action(Action::Close);
    assert_eq!(ids(&fx), vec![3, 4]);
}

#[test]
fn sender_timeout_overrides_urgency_default() {
    let mut fx = Fixture::new(1);
    fx.submit(Notification {
        timeout_ms: Some(1234),
        ..notif("N1")
    });
    assert_eq!(fx.host.scheduled[0].0, 1234);
}

#[test]
fn zero_timeout_never_schedules() {
    let mut fx = Fixture::new(2);
    fx.submit(Notification {
        timeout_ms: Some(0),
        ..notif("sticky")
    });
    // Critical urgency defaults to no timeout
    fx.submit(Notification {
        urgency: Urgency::Critical,
        ..notif("critical")
    });
    assert!(fx.host.scheduled.is_empty());
}

#[test]
fn urgency_selects_colors_and_timeout() {
    let mut fx = Fixture::with_config(2, |c| {
        c.background = [0x111111, 0x222222, 0x333333];
        c.border = [0xaaaaaa, 0xbbbbbb, 0xcccccc];
        c.timeout_ms = [1000, 2000, 3000];
    });
    fx.submit(Notification {
        urgency: Urgency::Low,
        ..notif("low")
    });
    fx.submit(Notification {
        urgency: Urgency::Critical,
        ..notif("crit")
    });

    let low = fx.surface(fx.server.shown()[0]);
    assert_eq!(low.background, Some(0x111111));
    assert_eq!(low.border, Some(0xaaaaaa));
    let crit = fx.surface(fx.server.shown()[1]);
    assert_eq!(crit.background, Some(0x333333));
    assert_eq!(crit.border, Some(0xcccccc));
    assert_eq!(fx.host.scheduled[0].0, 1000);
    assert_eq!(fx.host.scheduled[1].0, 3000);
}

// =============================================================================
// Pause / resume
// =============================================================================

#[test]
fn pause_hides_everything_and_resume_drains_queue() {
    let mut fx = Fixture::new(2);
    fx.submit(notif("N1"));
    fx.submit(notif("N2"));

    fx.action(Action::TogglePause);
    assert!(fx.server.is_paused());
    assert!(fx.server.shown().is_empty());
    assert_eq!(fx.server.hidden_count(), 2);
    // Closed popups are not re-queued
    assert_eq!(fx.server.queued_count(), 0);

    fx.submit(notif("N3"));
    assert!(fx.server.shown().is_empty());
    assert_eq!(fx.server.queued_count(), 1);

    fx.action(Action::TogglePause);
    assert!(!fx.server.is_paused());
    assert_eq!(fx.shown_lines(), vec!["N3"]);
    assert_eq!(fx.server.queued_count(), 0);
}

#[test]
fn resume_displays_in_submission_order_and_requeues_overflow() {
    let mut fx = Fixture::new(2);
    fx.action(Action::TogglePause);
    for name in ["N1", "N2", "N3"] {
        fx.submit(notif(name));
    }
    fx.action(Action::TogglePause);

    assert_eq!(fx.shown_lines(), vec!["N1", "N2"]);
    assert_eq!(fx.server.queued_count(), 1);
}

// =============================================================================
// Close all
// =============================================================================

#[test]
fn close_all_clears_queue_first() {
    let mut fx = Fixture::new(2);
    for name in ["N1", "N2", "N3", "N4"] {
        fx.submit(notif(name));
    }

    fx.action(Action::CloseAll);
    // Queued notifications must not reappear as slots free up
    assert!(fx.server.shown().is_empty());
    assert_eq!(fx.server.queued_count(), 0);
    assert_eq!(fx.server.hidden_count(), 2);
}

#[test]
fn dismiss_closes_a_specific_popup() {
    let mut fx = Fixture::new(3);
    for name in ["N1", "N2", "N3"] {
        fx.submit(notif(name));
    }
    let middle = fx.server.shown()[1];
    fx.server.dismiss(middle, &mut fx.host).unwrap();
    fx.check_invariant();
    assert_eq!(fx.shown_lines(), vec!["N1", "N3"]);
}

// =============================================================================
// History browsing
// =============================================================================

#[test]
fn previous_walks_history_backward_from_the_end() {
    let mut fx = Fixture::new(2);
    for name in ["A", "B", "C"] {
        fx.submit(notif(name));
    }
    fx.action(Action::Close);
    fx.action(Action::Close);
    fx.action(Action::Close);

    fx.action(Action::Previous);
    assert_eq!(fx.browsing_surface().lines, vec!["C"]);
    fx.action(Action::Previous);
    assert_eq!(fx.browsing_surface().lines, vec!["B"]);
    fx.action(Action::Previous);
    assert_eq!(fx.browsing_surface().lines, vec!["A"]);
    // Cursor floors at the oldest entry
    fx.action(Action::Previous);
    assert_eq!(fx.browsing_surface().lines, vec!["A"]);
}

#[test]
fn next_walks_forward_and_ceilings_at_newest() {
    let mut fx = Fixture::new(1);
    for name in ["A", "B", "C"] {
        fx.submit(notif(name));
        fx.action(Action::Close);
    }
    fx.action(Action::Previous);
    fx.action(Action::Previous);
    fx.action(Action::Previous);
    assert_eq!(fx.browsing_surface().lines, vec!["A"]);

    fx.action(Action::Next);
    assert_eq!(fx.browsing_surface().lines, vec!["B"]);
    fx.action(Action::Next);
    assert_eq!(fx.browsing_surface().lines, vec!["C"]);
    fx.action(Action::Next);
    assert_eq!(fx.browsing_surface().lines, vec!["C"]);
}

#[test]
fn next_is_a_noop_when_idle() {
    let mut fx = Fixture::new(1);
    fx.submit(notif("A"));
    fx.action(Action::Next);
    assert_eq!(fx.shown_lines(), vec!["A"]);
    assert!(fx.server.browsing_slot().is_none());
}

#[test]
fn previous_is_a_noop_on_empty_history() {
    let mut fx = Fixture::new(1);
    fx.action(Action::Previous);
    assert!(fx.server.browsing_slot().is_none());
    assert_eq!(fx.server.hidden_count(), 1);
}

#[test]
fn browsing_borrows_the_oldest_shown_slot_when_pool_is_empty() {
    let mut fx = Fixture::new(1);
    fx.submit(notif("live"));
    let slot = fx.server.shown()[0];

    fx.action(Action::Previous);
    assert_eq!(fx.server.browsing_slot(), Some(slot));
    assert!(fx.server.shown().is_empty());

    // With every slot browsing, real-time notifications queue up
    fx.submit(notif("blocked"));
    assert_eq!(fx.server.queued_count(), 1);
}

#[test]
fn sticky_history_disables_auto_close_while_browsing() {
    let mut fx = Fixture::new(1);
    fx.submit(Notification {
        timeout_ms: Some(1000),
        ..notif("A")
    });
    fx.action(Action::Close);
    fx.host.scheduled.clear();

    fx.action(Action::Previous);
    // sticky_history defaults to true: no timer even though the
    // notification carries its own timeout
    assert!(fx.host.scheduled.is_empty());
}

#[test]
fn non_sticky_history_uses_normal_timeout_resolution() {
    let mut fx = Fixture::with_config(1, |c| c.sticky_history = false);
    fx.submit(notif("A"));
    fx.action(Action::Close);
    fx.host.scheduled.clear();

    fx.action(Action::Previous);
    assert_eq!(fx.host.scheduled.len(), 1);
    assert_eq!(fx.host.scheduled[0].0, 5000);

    // The timer closes the browsing popup and ends the session
    fx.fire_timers();
    assert!(fx.server.browsing_slot().is_none());
    assert_eq!(fx.server.hidden_count(), 1);
}

#[test]
fn closing_the_browsing_slot_ends_the_session() {
    let mut fx = Fixture::new(2);
    fx.submit(notif("A"));
    fx.action(Action::Close);

    fx.action(Action::Previous);
    let slot = fx.server.browsing_slot().unwrap();
    fx.server.dismiss(slot, &mut fx.host).unwrap();
    fx.check_invariant();

    assert!(fx.server.browsing_slot().is_none());
    assert_eq!(fx.server.hidden_count(), 2);
    // Browsing is over; next does nothing
    fx.action(Action::Next);
    assert!(fx.server.browsing_slot().is_none());
}

#[test]
fn close_action_ends_browsing_when_nothing_else_is_shown() {
    let mut fx = Fixture::new(1);
    fx.submit(notif("A"));
    fx.action(Action::Close);

    fx.action(Action::Previous);
    assert!(fx.server.browsing_slot().is_some());

    fx.action(Action::Close);
    assert!(fx.server.browsing_slot().is_none());
    assert_eq!(fx.server.hidden_count(), 1);
}

#[test]
fn close_action_prefers_live_popups_over_the_browsing_slot() {
    let mut fx = Fixture::new(3);
    fx.submit(notif("old"));
    fx.action(Action::Close);

    fx.action(Action::Previous);
    fx.submit(notif("live"));

    fx.action(Action::Close);
    assert!(fx.server.shown().is_empty());
    assert!(fx.server.browsing_slot().is_some());
}

// =============================================================================
// Fullscreen policies
// =============================================================================

#[test]
fn fullscreen_hide_drops_but_keeps_history() {
    let mut fx = Fixture::with_config(1, |c| c.fullscreen = notipop::FullscreenPolicy::Hide);
    fx.server.set_fullscreen(true, &mut fx.host).unwrap();
    fx.submit(notif("dropped"));

    assert!(fx.server.shown().is_empty());
    assert_eq!(fx.server.queued_count(), 0);
    assert_eq!(fx.server.history_len(), 1);

    // Still reachable by browsing afterwards
    fx.server.set_fullscreen(false, &mut fx.host).unwrap();
    fx.action(Action::Previous);
    assert_eq!(fx.browsing_surface().lines, vec!["dropped"]);
}

#[test]
fn fullscreen_queue_defers_until_fullscreen_ends() {
    let mut fx = Fixture::with_config(2, |c| c.fullscreen = notipop::FullscreenPolicy::Queue);
    fx.server.set_fullscreen(true, &mut fx.host).unwrap();
    fx.submit(notif("N1"));
    fx.submit(notif("N2"));
    assert!(fx.server.shown().is_empty());
    assert_eq!(fx.server.queued_count(), 2);

    fx.server.set_fullscreen(false, &mut fx.host).unwrap();
    fx.check_invariant();
    assert_eq!(fx.shown_lines(), vec!["N1", "N2"]);
    assert_eq!(fx.server.queued_count(), 0);
}

#[test]
fn fullscreen_show_displays_normally() {
    let mut fx = Fixture::new(1);
    fx.server.set_fullscreen(true, &mut fx.host).unwrap();
    fx.submit(notif("N1"));
    assert_eq!(fx.shown_lines(), vec!["N1"]);
}
