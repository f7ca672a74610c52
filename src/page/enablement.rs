//! Enablement controller: owns the `enabled` / `attached` flags that decide
//! whether the page reacts to selections at all.

use tracing::info;

use super::surface::PageSurface;

#[derive(Debug, Default)]
pub struct Enablement {
    enabled: bool,
    attached: bool,
}

impl Enablement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach listeners unless already attached. Returns whether anything
    /// changed.
    pub fn enable(&mut self, surface: &dyn PageSurface) -> bool {
        self.enabled = true;
        if self.attached {
            return false;
        }
        surface.set_listeners(true);
        self.attached = true;
        info!("selection listeners attached");
        true
    }

    /// Detach listeners unless already detached. The caller purges the UI.
    pub fn disable(&mut self, surface: &dyn PageSurface) -> bool {
        self.enabled = false;
        if !self.attached {
            return false;
        }
        surface.set_listeners(false);
        self.attached = false;
        info!("selection listeners detached");
        true
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }
}
