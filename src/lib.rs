//! notipop - notification popup manager for X11 window managers
//!
//! The embedding window manager feeds notification events and key-triggered
//! actions into a [`Server`]; the server owns a fixed pool of popup slots
//! and handles queueing, in-place replacement, history browsing, pause/
//! resume and auto-close timers. Drawing goes through the [`PopupSurface`]
//! trait; an X11 implementation (override-redirect windows, FreeType text)
//! is provided in [`x11`].
//!
//! Minimal embedding sketch:
//!
//! ```no_run
//! use std::rc::Rc;
//! use notipop::{Config, Server};
//! use notipop::x11::{FontRenderer, X11Popup};
//!
//! # fn main() -> anyhow::Result<()> {
//! # let (conn, root): (Rc<x11rb::rust_connection::RustConnection>, u32) = unimplemented!();
//! let config = Config::load().resolve();
//! let font = Rc::new(FontRenderer::new(&config.font, config.font_size)?);
//! let popups = X11Popup::create_pool(&conn, &font, root, &config)?;
//! let mut server = Server::new(config, popups)?;
//! // then, from the event loop:
//! //   server.submit(notification, &mut host)?      on delivery
//! //   server.handle_timeout(token, &mut host)?     on timer fire
//! //   server.handle_action(action, &mut host)?     on key press
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod config;
pub mod host;
pub mod icon;
pub mod notification;
pub mod server;
pub mod surface;
pub mod text;
pub mod types;
pub mod x11;

pub use actions::Action;
pub use config::{Config, FullscreenPolicy, NotifyConfig, ScreenSelect};
pub use host::{CloseToken, Host};
pub use notification::{Notification, Urgency};
pub use server::{Server, SlotId};
pub use surface::PopupSurface;
pub use types::{Point, Rect};
