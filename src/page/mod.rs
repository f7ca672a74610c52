//! Page context: selection tracking, the tooltip / popup / chip presenters,
//! and the session that wires them to a [`surface::PageSurface`].

pub mod chip;
pub mod client;
mod defer;
pub mod enablement;
pub mod popup;
pub mod selection;
pub mod session;
pub mod surface;
pub mod timings;
pub mod tooltip;

pub use client::PageTranslator;
pub use session::{PageSession, PointerTarget};
pub use surface::{MemorySurface, PageSurface};
