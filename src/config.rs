//! Configuration file support for notipop.
//!
//! Loads settings from ~/.config/notipop/config.toml if it exists,
//! otherwise uses sensible defaults.
//!
//! Also provides `NotifyConfig` - the runtime configuration struct with
//! resolved color values and per-urgency triples. Colors, border colors and
//! timeouts may be given in the file either as a single value (applied to
//! all three urgency levels) or as a three-element array in ascending order
//! of urgency.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::actions::Action;
use crate::types::Point;

// =============================================================================
// Runtime Configuration (resolved values)
// =============================================================================

/// What to do with notifications that arrive while a fullscreen window
/// has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FullscreenPolicy {
    /// Draw popups over the fullscreen window
    Show,
    /// Drop the notification (it stays in history)
    Hide,
    /// Hold the notification until fullscreen ends
    Queue,
}

/// How to pick the screen that popups appear on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSelect {
    /// The screen holding the focused window
    Focus,
    /// The screen under the mouse pointer
    Mouse,
    /// A fixed screen index; out-of-range is a fatal configuration error
    Index(usize),
}

/// Runtime notification configuration with resolved color values.
///
/// This struct holds the actual u32 color values and geometry used during
/// rendering. It's constructed from the file-based config types at startup.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// X position on the screen to start drawing popups
    pub x: i32,
    /// Y position on the screen to start drawing popups
    pub y: i32,
    /// Popup width
    pub width: u32,
    /// Popup height
    pub height: u32,
    /// Text template; `{summary}`, `{body}` and `{app_name}` are substituted
    pub format: String,
    /// Font used for popup text
    pub font: String,
    /// Font size in points
    pub font_size: u32,
    /// Padding at the sides of the text
    pub horizontal_padding: u32,
    /// Padding at the top and bottom of the text
    pub vertical_padding: u32,
    /// Space between wrapped text lines
    pub line_spacing: u32,
    /// Line width of drawn borders (0 disables borders)
    pub border_width: u32,
    /// Vertical gap between stacked popups
    pub gap: u32,
    /// Number of popup slots (maximum popups visible at once)
    pub max_windows: usize,
    /// Pixel size icons are scaled to
    pub icon_size: u32,
    /// Foreground colors in ascending order of urgency
    pub foreground: [u32; 3],
    /// Background colors in ascending order of urgency
    pub background: [u32; 3],
    /// Border colors in ascending order of urgency
    pub border: [u32; 3],
    /// Millisecond auto-close timeouts in ascending order of urgency
    /// (0 means never auto-close)
    pub timeout_ms: [u32; 3],
    /// Disable auto-close while browsing notification history
    pub sticky_history: bool,
    /// Behavior while a fullscreen window has focus
    pub fullscreen: FullscreenPolicy,
    /// Screen selection for popup placement
    pub screen: ScreenSelect,
}

impl NotifyConfig {
    /// Screen-relative base position for the popup at the given stacking
    /// rank (0 = topmost/oldest). Popups stack downward with `gap` pixels
    /// between their borders.
    pub fn base_position(&self, rank: usize) -> Point {
        let step = (self.height + 2 * self.border_width + self.gap) as i32;
        Point::new(self.x, self.y + rank as i32 * step)
    }

    /// Width available for text once padding (and optionally an icon) is
    /// taken out.
    pub fn text_width(&self, with_icon: bool) -> u32 {
        let mut pad = 2 * self.horizontal_padding;
        if with_icon {
            pad += self.icon_size + self.horizontal_padding / 2;
        }
        self.width.saturating_sub(pad)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Config::default().resolve()
    }
}

// =============================================================================
// File-based Configuration (TOML parsing)
// =============================================================================

/// A config value given either once (broadcast to all three urgency
/// levels) or as a `[low, normal, critical]` array.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum OneOrThree<T> {
    One(T),
    Three([T; 3]),
}

impl<T: Clone> OneOrThree<T> {
    /// Broadcast a scalar to a fixed-size triple; arrays pass through.
    pub fn broadcast(self) -> [T; 3] {
        match self {
            OneOrThree::One(v) => [v.clone(), v.clone(), v],
            OneOrThree::Three(a) => a,
        }
    }
}

/// Screen selection as written in the file: "focus", "mouse", or an index
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum ScreenField {
    Index(usize),
    Name(String),
}

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub popup: PopupConfig,
    pub colors: ColorConfig,
    pub behavior: BehaviorConfig,
    pub keybindings: KeybindingConfig,
}

/// Popup geometry and text settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub font: String,
    pub font_size: u32,
    /// Defaults to half the font size when absent
    pub horizontal_padding: Option<u32>,
    /// Defaults to half the font size when absent
    pub vertical_padding: Option<u32>,
    pub line_spacing: u32,
    pub border_width: u32,
    pub gap: u32,
    pub max_windows: usize,
    pub icon_size: u32,
}

/// Color settings (hex strings like "#111111", scalar or per-urgency array)
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    pub foreground: OneOrThree<String>,
    pub background: OneOrThree<String>,
    pub border: OneOrThree<String>,
}

/// Queueing and placement behavior
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Millisecond timeouts, scalar or per-urgency array (0 = no timeout)
    pub timeout: OneOrThree<u32>,
    pub sticky_history: bool,
    pub fullscreen: FullscreenPolicy,
    screen: ScreenField,
}

/// Keybinding configuration (strings like "Mod4+Shift+grave")
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct KeybindingConfig {
    pub close: Option<String>,
    pub close_all: Option<String>,
    pub previous: Option<String>,
    pub next: Option<String>,
    pub toggle_pause: Option<String>,
}

/// Parsed keybinding (ready for X11 grab)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedBinding {
    pub keysym: u32,
    pub modifiers: u16,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            x: 32,
            y: 64,
            width: 192,
            height: 64,
            format: "{summary}\n{body}".to_string(),
            font: "sans".to_string(),
            font_size: 14,
            horizontal_padding: None,
            vertical_padding: None,
            line_spacing: 4,
            border_width: 4,
            gap: 12,
            max_windows: 2,
            icon_size: 36,
        }
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            foreground: OneOrThree::One("#ffffff".to_string()),
            background: OneOrThree::One("#111111".to_string()),
            border: OneOrThree::One("#111111".to_string()),
        }
    }
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            timeout: OneOrThree::Three([5000, 5000, 0]),
            sticky_history: true,
            fullscreen: FullscreenPolicy::Show,
            screen: ScreenField::Name("focus".to_string()),
        }
    }
}

impl Default for KeybindingConfig {
    fn default() -> Self {
        Self {
            close: Some("Control+space".to_string()),
            close_all: Some("Mod4+Control+space".to_string()),
            previous: Some("Mod4+grave".to_string()),
            next: Some("Mod4+Shift+grave".to_string()),
            toggle_pause: Some("Mod4+Control+grave".to_string()),
        }
    }
}

impl Config {
    /// Load config from default path (~/.config/notipop/config.toml)
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("notipop")
            .join("config.toml")
    }

    /// Load config from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config: {}", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Resolve file values into the runtime configuration.
    pub fn resolve(self) -> NotifyConfig {
        let p = self.popup;
        NotifyConfig {
            x: p.x,
            y: p.y,
            width: p.width,
            height: p.height,
            format: p.format,
            horizontal_padding: p.horizontal_padding.unwrap_or(p.font_size / 2),
            vertical_padding: p.vertical_padding.unwrap_or(p.font_size / 2),
            font: p.font,
            font_size: p.font_size,
            line_spacing: p.line_spacing,
            border_width: p.border_width,
            gap: p.gap,
            max_windows: p.max_windows.max(1),
            icon_size: p.icon_size,
            foreground: resolve_colors(self.colors.foreground, 0xffffff),
            background: resolve_colors(self.colors.background, 0x111111),
            border: resolve_colors(self.colors.border, 0x111111),
            timeout_ms: self.behavior.timeout.broadcast(),
            sticky_history: self.behavior.sticky_history,
            fullscreen: self.behavior.fullscreen,
            screen: match self.behavior.screen {
                ScreenField::Index(i) => ScreenSelect::Index(i),
                ScreenField::Name(name) => match name.as_str() {
                    "focus" => ScreenSelect::Focus,
                    "mouse" => ScreenSelect::Mouse,
                    other => {
                        log::warn!("Unknown screen selection {:?}, using focus", other);
                        ScreenSelect::Focus
                    }
                },
            },
        }
    }

    /// Parse keybindings into action -> ParsedBinding map
    pub fn parse_keybindings(&self) -> HashMap<Action, ParsedBinding> {
        let mut bindings = HashMap::new();

        let mut insert = |action: Action, key_str: &Option<String>| {
            if let Some(s) = key_str {
                if let Some(parsed) = parse_key_binding(s) {
                    bindings.insert(action, parsed);
                } else {
                    log::warn!("Failed to parse keybinding: {}", s);
                }
            }
        };

        insert(Action::Close, &self.keybindings.close);
        insert(Action::CloseAll, &self.keybindings.close_all);
        insert(Action::Previous, &self.keybindings.previous);
        insert(Action::Next, &self.keybindings.next);
        insert(Action::TogglePause, &self.keybindings.toggle_pause);

        bindings
    }
}

/// Broadcast and parse a color triple, falling back per entry on bad hex
fn resolve_colors(field: OneOrThree<String>, fallback: u32) -> [u32; 3] {
    field.broadcast().map(|s| match parse_color(&s) {
        Some(c) => c,
        None => {
            log::warn!("Invalid color {:?}, using #{:06x}", s, fallback);
            fallback
        }
    })
}

/// Parse hex color string (e.g., "#5294e2" or "5294e2") to u32
pub fn parse_color(s: &str) -> Option<u32> {
    let s = s.trim_start_matches('#');
    if s.len() != 6 {
        return None;
    }
    u32::from_str_radix(s, 16).ok()
}

/// Parse a key binding string like "Mod4+Shift+grave" into keysym and modifiers
pub fn parse_key_binding(s: &str) -> Option<ParsedBinding> {
    let parts: Vec<&str> = s.split('+').collect();
    let key_part = parts.last()?;

    // X11 modifier masks
    const SHIFT_MASK: u16 = 1;
    const CONTROL_MASK: u16 = 4;
    const MOD1_MASK: u16 = 8; // Alt
    const MOD4_MASK: u16 = 64; // Super/Win

    let mut modifiers: u16 = 0;
    for part in &parts[..parts.len() - 1] {
        match part.to_lowercase().as_str() {
            "mod4" | "super" | "win" => modifiers |= MOD4_MASK,
            "shift" => modifiers |= SHIFT_MASK,
            "control" | "ctrl" => modifiers |= CONTROL_MASK,
            "mod1" | "alt" => modifiers |= MOD1_MASK,
            _ => {
                log::warn!("Unknown modifier: {}", part);
            }
        }
    }

    let keysym = key_to_keysym(key_part)?;
    Some(ParsedBinding { keysym, modifiers })
}

/// Convert key name to X11 keysym.
///
/// Printable ASCII keysyms equal their codepoint, so single-character names
/// need no lookup table; only the named keys do.
fn key_to_keysym(key: &str) -> Option<u32> {
    let lower = key.to_lowercase();
    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_graphic() || c == ' ' {
            return Some(c as u32);
        }
    }
    match lower.as_str() {
        "return" | "enter" => Some(0xff0d),
        "tab" => Some(0xff09),
        "escape" | "esc" => Some(0xff1b),
        "space" => Some(0x20),
        "backspace" => Some(0xff08),
        "delete" => Some(0xffff),
        "grave" => Some(0x60),
        "slash" => Some(0x2f),
        "bracketleft" => Some(0x5b),
        "bracketright" => Some(0x5d),
        "left" => Some(0xff51),
        "up" => Some(0xff52),
        "right" => Some(0xff53),
        "down" => Some(0xff54),
        "home" => Some(0xff50),
        "end" => Some(0xff57),
        "page_up" | "prior" => Some(0xff55),
        "page_down" | "next" => Some(0xff56),
        _ => {
            // F1-F12
            if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<u32>().ok()) {
                if (1..=12).contains(&n) {
                    return Some(0xffbe + n - 1);
                }
            }
            log::warn!("Unknown key: {}", key);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_binding() {
        let binding = parse_key_binding("Mod4+grave").unwrap();
        assert_eq!(binding.keysym, 0x60);
        assert_eq!(binding.modifiers, 64); // Mod4

        let binding = parse_key_binding("Mod4+Shift+grave").unwrap();
        assert_eq!(binding.keysym, 0x60);
        assert_eq!(binding.modifiers, 64 | 1); // Mod4 + Shift

        let binding = parse_key_binding("Control+space").unwrap();
        assert_eq!(binding.keysym, 0x20);
        assert_eq!(binding.modifiers, 4); // Control
    }

    #[test]
    fn test_key_to_keysym() {
        assert_eq!(key_to_keysym("a"), Some(0x61));
        assert_eq!(key_to_keysym("A"), Some(0x61));
        assert_eq!(key_to_keysym("9"), Some(0x39));
        assert_eq!(key_to_keysym("Return"), Some(0xff0d));
        assert_eq!(key_to_keysym("F11"), Some(0xffc8));
        assert_eq!(key_to_keysym("nosuchkey"), None);
    }

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#5294e2"), Some(0x5294e2));
        assert_eq!(parse_color("5294e2"), Some(0x5294e2));
        assert_eq!(parse_color("#111111"), Some(0x111111));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("not a color"), None);
    }

    #[test]
    fn test_scalar_broadcast() {
        let toml = r##"
[colors]
foreground = "#aabbcc"
background = ["#000000", "#111111", "#222222"]

[behavior]
timeout = 3000
"##;
        let config: Config = toml::from_str(toml).unwrap();
        let resolved = config.resolve();
        assert_eq!(resolved.foreground, [0xaabbcc; 3]);
        assert_eq!(resolved.background, [0x000000, 0x111111, 0x222222]);
        assert_eq!(resolved.timeout_ms, [3000; 3]);
    }

    #[test]
    fn test_defaults_match_plugin() {
        let resolved = NotifyConfig::default();
        assert_eq!(resolved.x, 32);
        assert_eq!(resolved.y, 64);
        assert_eq!(resolved.width, 192);
        assert_eq!(resolved.height, 64);
        assert_eq!(resolved.max_windows, 2);
        assert_eq!(resolved.timeout_ms, [5000, 5000, 0]);
        assert_eq!(resolved.foreground, [0xffffff; 3]);
        // Padding falls back to half the font size
        assert_eq!(resolved.horizontal_padding, 7);
        assert_eq!(resolved.vertical_padding, 7);
        assert!(resolved.sticky_history);
        assert_eq!(resolved.fullscreen, FullscreenPolicy::Show);
        assert_eq!(resolved.screen, ScreenSelect::Focus);
    }

    #[test]
    fn test_screen_selection_forms() {
        let config: Config = toml::from_str("[behavior]\nscreen = 1\n").unwrap();
        assert_eq!(config.resolve().screen, ScreenSelect::Index(1));

        let config: Config = toml::from_str("[behavior]\nscreen = \"mouse\"\n").unwrap();
        assert_eq!(config.resolve().screen, ScreenSelect::Mouse);

        // Unknown names fall back to focus instead of failing
        let config: Config = toml::from_str("[behavior]\nscreen = \"keyboard\"\n").unwrap();
        assert_eq!(config.resolve().screen, ScreenSelect::Focus);
    }

    #[test]
    fn test_fullscreen_policy_parse() {
        let config: Config = toml::from_str("[behavior]\nfullscreen = \"queue\"\n").unwrap();
        assert_eq!(config.resolve().fullscreen, FullscreenPolicy::Queue);
    }

    #[test]
    fn test_base_positions_stack_downward() {
        let config = NotifyConfig::default();
        // height 64 + 2 * border 4 + gap 12 = 84 per rank
        assert_eq!(config.base_position(0), Point::new(32, 64));
        assert_eq!(config.base_position(1), Point::new(32, 148));
        assert_eq!(config.base_position(2), Point::new(32, 232));
    }

    #[test]
    fn test_default_keybindings() {
        let config = Config::default();
        let bindings = config.parse_keybindings();
        assert!(bindings.contains_key(&Action::Close));
        assert!(bindings.contains_key(&Action::Previous));
        assert!(bindings.contains_key(&Action::Next));
        assert!(bindings.contains_key(&Action::TogglePause));
    }
}
