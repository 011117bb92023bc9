//! Unread-count badge and notification dropdown.

pub mod center;
pub mod hub;

pub use center::{NotificationCenter, UnreadState};
pub use hub::{NotificationHub, UnreadSnapshot, UnreadSubscription};

use placement_shared::constants::BADGE_CAP;

/// Badge text for an unread count: nothing for zero, the number up to the
/// cap, `"99+"` above it.
pub fn badge_label(count: u64) -> Option<String> {
    match count {
        0 => None,
        n if n <= BADGE_CAP => Some(n.to_string()),
        _ => Some(format!("{BADGE_CAP}+")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_label() {
        assert_eq!(badge_label(0), None);
        assert_eq!(badge_label(7).as_deref(), Some("7"));
        assert_eq!(badge_label(99).as_deref(), Some("99"));
        assert_eq!(badge_label(100).as_deref(), Some("99+"));
        assert_eq!(badge_label(120).as_deref(), Some("99+"));
    }
}
