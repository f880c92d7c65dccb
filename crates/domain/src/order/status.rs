//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Processing ──► Completed
///    │            │
///    └────────────┴──► Expired
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order was created and stock reserved; no payment attempt yet.
    #[default]
    Pending,

    /// A payment attempt is in flight (or failed silently).
    Processing,

    /// Payment succeeded (terminal state).
    Completed,

    /// Order was reclaimed by the expiry sweep (terminal state).
    Expired,
}

impl OrderStatus {
    /// All recognized statuses.
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Expired,
    ];

    /// Statuses the expiry sweep may reclaim.
    pub const OPEN: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Processing];

    /// Returns the statuses an automated transition into `self` may start from.
    ///
    /// `Pending` is only ever an initial status, so nothing leads into it.
    pub fn allowed_from(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[],
            OrderStatus::Processing => &[OrderStatus::Pending],
            OrderStatus::Completed => &[OrderStatus::Processing],
            OrderStatus::Expired => &[OrderStatus::Pending, OrderStatus::Processing],
        }
    }

    /// Returns true if the automated lifecycle allows moving from `self` to `target`.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        target.allowed_from().contains(self)
    }

    /// Returns true if moving to `target` keeps the status sequence monotonic.
    ///
    /// Rewriting the same status is monotonic.
    pub fn is_monotonic_to(&self, target: OrderStatus) -> bool {
        *self == target || self.can_transition_to(target)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Expired)
    }

    /// Returns the status as stored and displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    /// Parses a status case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "expired" => Ok(OrderStatus::Expired),
            _ => Err(OrderError::InvalidStatus {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_pending_can_move_forward() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Expired));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_processing_transitions() {
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Expired));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for target in OrderStatus::ALL {
            assert!(!OrderStatus::Completed.can_transition_to(target));
            assert!(!OrderStatus::Expired.can_transition_to(target));
        }
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
    }

    #[test]
    fn test_nothing_leads_back_to_pending() {
        assert!(OrderStatus::Pending.allowed_from().is_empty());
    }

    #[test]
    fn test_monotonic_detection() {
        assert!(OrderStatus::Processing.is_monotonic_to(OrderStatus::Processing));
        assert!(OrderStatus::Pending.is_monotonic_to(OrderStatus::Expired));
        assert!(!OrderStatus::Completed.is_monotonic_to(OrderStatus::Pending));
        assert!(!OrderStatus::Expired.is_monotonic_to(OrderStatus::Completed));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("PENDING".parse(), Ok(OrderStatus::Pending));
        assert_eq!("Completed".parse(), Ok(OrderStatus::Completed));
        assert_eq!(" expired ".parse(), Ok(OrderStatus::Expired));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(
            err,
            OrderError::InvalidStatus {
                value: "shipped".to_string()
            }
        );
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>(), Ok(status));
        }
    }

    #[test]
    fn test_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
