//! Page-side timer constants.

use std::time::Duration;

pub const POINTER_UP_DEBOUNCE: Duration = Duration::from_millis(0);
pub const SELECTION_CHANGE_DEBOUNCE: Duration = Duration::from_millis(120);
/// Delay before checking whether the selection still matches the tooltip.
pub const SELECTION_HIDE_CHECK: Duration = Duration::from_millis(80);
/// Deferred check after an outside pointer-down.
pub const OUTSIDE_CLICK_FOLLOW_UP: Duration = Duration::from_millis(0);

pub const TOOLTIP_AUTO_HIDE: Duration = Duration::from_millis(3000);
pub const TOOLTIP_AUTO_HIDE_ON_UPDATE: Duration = Duration::from_millis(3500);
pub const TOOLTIP_HOVER_LEAVE_HIDE: Duration = Duration::from_millis(1500);
pub const TOOLTIP_EXIT: Duration = Duration::from_millis(120);

pub const MISS_HIDE: Duration = Duration::from_millis(1200);
pub const ERROR_HIDE: Duration = Duration::from_millis(1500);
pub const WARNING_HIDE: Duration = Duration::from_millis(2500);

pub const POPUP_EXIT: Duration = Duration::from_millis(150);
pub const SAVE_LABEL_REVERT: Duration = Duration::from_millis(2000);

pub const CHIP_INFO: Duration = Duration::from_millis(2000);
pub const CHIP_SUCCESS: Duration = Duration::from_millis(3000);
pub const CHIP_ERROR: Duration = Duration::from_millis(5000);
pub const CHIP_EXIT: Duration = Duration::from_millis(300);
