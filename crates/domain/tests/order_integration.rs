//! Lifecycle tests for the order aggregate and its status state machine.

use chrono::{Duration, Utc};
use common::{OrderId, ProductId, UserId};
use domain::{
    CreateOrder, DomainEvent, Money, NewOrder, OrderError, OrderEvent, OrderItem, OrderLine,
    OrderStatus,
};

/// Every status sequence the automated lifecycle may produce.
const VALID_SEQUENCES: [&[OrderStatus]; 3] = [
    &[
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Completed,
    ],
    &[OrderStatus::Pending, OrderStatus::Expired],
    &[
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Expired,
    ],
];

fn is_prefix_of_valid_sequence(observed: &[OrderStatus]) -> bool {
    VALID_SEQUENCES
        .iter()
        .any(|seq| observed.len() <= seq.len() && seq[..observed.len()] == *observed)
}

/// Walks every path through the state machine starting from pending.
fn walk(path: &mut Vec<OrderStatus>, out: &mut Vec<Vec<OrderStatus>>) {
    out.push(path.clone());
    let current = *path.last().unwrap();
    for next in OrderStatus::ALL {
        if current.can_transition_to(next) {
            path.push(next);
            walk(path, out);
            path.pop();
        }
    }
}

#[test]
fn test_every_reachable_sequence_is_a_valid_prefix() {
    let mut paths = Vec::new();
    walk(&mut vec![OrderStatus::Pending], &mut paths);

    assert!(!paths.is_empty());
    for path in &paths {
        assert!(
            is_prefix_of_valid_sequence(path),
            "unexpected status sequence {path:?}"
        );
    }
    // [pending], [pending, processing], three full sequences
    assert_eq!(paths.len(), 5);
}

#[test]
fn test_no_transition_moves_backward() {
    for from in OrderStatus::ALL {
        for to in OrderStatus::ALL {
            if from.can_transition_to(to) {
                assert!(!to.can_transition_to(from), "{from} <-> {to} is a cycle");
            }
        }
    }
}

#[test]
fn test_create_order_scenario_total() {
    let cmd = CreateOrder::new(UserId::new(1), vec![OrderLine::new(ProductId::new(1), 2)]);
    let lines = cmd.validated_lines().unwrap();

    let items: Vec<OrderItem> = lines
        .into_iter()
        .map(|(product_id, quantity)| {
            OrderItem::new(product_id, quantity, Money::from_cents(9999))
        })
        .collect();

    let order = NewOrder::new(cmd.user_id, items, Utc::now())
        .unwrap()
        .into_order(OrderId::new(1));

    assert_eq!(order.total, Money::from_cents(19998));
    assert_eq!(order.total.to_string(), "$199.98");
    assert_eq!(order.status, OrderStatus::Pending);
}

#[test]
fn test_total_is_not_recomputed_from_items() {
    let mut order = NewOrder::new(
        UserId::new(1),
        vec![OrderItem::new(ProductId::new(1), 1, Money::from_cents(1000))],
        Utc::now(),
    )
    .unwrap()
    .into_order(OrderId::new(2));

    // A later price change never touches the captured snapshot or the total.
    order.items[0].unit_price = Money::from_cents(5000);
    assert_eq!(order.total, Money::from_cents(1000));
}

#[test]
fn test_lifecycle_events_carry_transition_timestamps() {
    let created_at = Utc::now() - Duration::minutes(10);
    let mut order = NewOrder::new(
        UserId::new(7),
        vec![OrderItem::new(ProductId::new(2), 1, Money::from_cents(14999))],
        created_at,
    )
    .unwrap()
    .into_order(OrderId::new(3));

    let created = order.created_event();
    assert_eq!(created.occurred_at(), created_at);

    order.status = OrderStatus::Processing;
    order.updated_at = Utc::now();
    order.status = OrderStatus::Completed;

    let completed = order.completed_event();
    assert_eq!(completed.event_type(), OrderEvent::COMPLETED);
    assert_eq!(completed.occurred_at(), order.updated_at);
    assert_ne!(created.idempotency_key(), completed.idempotency_key());
}

#[test]
fn test_invalid_status_string_is_rejected() {
    assert!(matches!(
        "cancelled".parse::<OrderStatus>(),
        Err(OrderError::InvalidStatus { .. })
    ));
}
