// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Deferred Values
//!
//! The functor laws of `map`, the product behaviour of the `all`
//! combinators, and failure propagation, checked for resolved and for
//! late-resolved values.

use cim_stack::deferred::{all, all2, Deferred, ResolutionError};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn values() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(any::<i64>(), 0..16)
}

/// Resolve `value` through a pending cell rather than `Deferred::ready`
fn late(value: i64) -> (Deferred<i64>, impl FnOnce()) {
    let (deferred, resolver) = Deferred::<i64>::pending();
    (deferred, move || resolver.resolve(value))
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// d.map(id) == d
    #[test]
    fn prop_map_identity(value in any::<i64>()) {
        let deferred = Deferred::ready(value);
        prop_assert_eq!(deferred.map(|v| v).peek(), deferred.peek());
    }

    /// d.map(f).map(g) == d.map(g . f), also when resolved late
    #[test]
    fn prop_map_composition(value in any::<i64>(), offset in any::<i64>()) {
        let f = move |v: i64| v.wrapping_add(offset);
        let g = |v: i64| v.wrapping_mul(3);

        let (deferred, resolve) = late(value);
        let chained = deferred.map(f).map(g);
        let composed = deferred.map(move |v| g(f(v)));
        prop_assert!(chained.peek().is_none());

        resolve();
        prop_assert_eq!(chained.peek(), composed.peek());
        prop_assert_eq!(chained.peek(), Some(Ok(g(f(value)))));
    }

    /// all2(a, b).map(|(x, y)| (f(x), g(y))) == all2(a.map(f), b.map(g))
    #[test]
    fn prop_all2_commutes_with_map(a in any::<i64>(), b in any::<i64>()) {
        let f = |v: i64| v.wrapping_sub(1);
        let g = |v: i64| v.to_string();

        let (left, resolve_left) = late(a);
        let right = Deferred::ready(b);

        let mapped_after = all2(&left, &right).map(move |(x, y)| (f(x), g(y)));
        let mapped_before = all2(&left.map(f), &right.map(g));

        resolve_left();
        prop_assert_eq!(mapped_after.peek(), mapped_before.peek());
    }

    /// all keeps length and order
    #[test]
    fn prop_all_preserves_order(items in values()) {
        let deferred: Vec<Deferred<i64>> = items.iter().copied().map(Deferred::ready).collect();
        prop_assert_eq!(all(&deferred).peek(), Some(Ok(items)));
    }

    /// A single failure fails the combination, whatever its position
    #[test]
    fn prop_all_fails_on_any_failure(items in values(), position in any::<prop::sample::Index>()) {
        let mut deferred: Vec<Deferred<i64>> = items.iter().copied().map(Deferred::ready).collect();
        let error = ResolutionError::failed("queue", "rejected");
        let at = if deferred.is_empty() { 0 } else { position.index(deferred.len() + 1) };
        deferred.insert(at, Deferred::failed(error.clone()));

        prop_assert_eq!(all(&deferred).peek(), Some(Err(error)));
    }

    /// and_then failures surface as transform errors downstream
    #[test]
    fn prop_and_then_failure_propagates(value in any::<i64>()) {
        let checked = Deferred::ready(value)
            .and_then(|v| if v % 2 == 0 { Ok(v) } else { Err(format!("{v} is odd")) });
        let downstream = checked.map(|v| v / 2);

        match downstream.peek() {
            Some(Ok(half)) => prop_assert_eq!(half, value / 2),
            Some(Err(ResolutionError::Transform(message))) => {
                prop_assert!(value % 2 != 0);
                prop_assert!(message.contains("is odd"));
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_dropped_resolver_abandons_dependents() {
        let (deferred, resolver) = Deferred::<i64>::pending();
        let mapped = deferred.map(|v| v + 1);
        drop(resolver);
        assert!(matches!(mapped.peek(), Some(Err(ResolutionError::Abandoned(_)))));
    }

    #[test]
    fn test_resolved_returns_settled_value() {
        let (deferred, resolver) = Deferred::<i64>::pending();
        let doubled = deferred.map(|v| v * 2);
        resolver.resolve(21);
        assert_eq!(tokio_test::block_on(doubled.resolved()), Ok(42));
    }
}
