// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Combinators
//!
//! Combine several deferred values into one. The combined value resolves
//! once every input has resolved, or fails with the first failure observed.
//! Dependency sets are unioned.
//!
//! ```rust,ignore
//! use cim_stack::deferred::*;
//!
//! let topic_arn = topic.arn();
//! let queue_arn = queue.arn();
//! let policy = all2(&topic_arn, &queue_arn).map(|(topic, queue)| {
//!     PolicyFactory::queue_send_from_topic(&topic, &queue)
//! });
//! ```

use parking_lot::Mutex;
use std::sync::Arc;

use super::value::{Deferred, ResolutionError, Resolver};

struct Gather<T: Clone + Send + 'static> {
    slots: Vec<Option<T>>,
    remaining: usize,
    resolver: Option<Resolver<Vec<T>>>,
}

/// Combine N deferred values into one deferred vector, preserving order
pub fn all<T>(items: &[Deferred<T>]) -> Deferred<Vec<T>>
where
    T: Clone + Send + 'static,
{
    let dependencies: Vec<_> = items
        .iter()
        .flat_map(|d| d.dependencies().iter().cloned())
        .collect();

    if items.is_empty() {
        return Deferred::ready(Vec::new());
    }

    let (out, resolver) = Deferred::pending_labeled(format!("all[{}]", items.len()));
    let gather = Arc::new(Mutex::new(Gather {
        slots: vec![None; items.len()],
        remaining: items.len(),
        resolver: Some(resolver),
    }));

    for (index, item) in items.iter().enumerate() {
        let gather = Arc::clone(&gather);
        item.on_resolved(move |result| {
            let settled = {
                let mut state = gather.lock();
                if state.resolver.is_none() {
                    return;
                }
                match result {
                    Ok(value) => {
                        state.slots[index] = Some(value);
                        state.remaining -= 1;
                        if state.remaining == 0 {
                            let values: Vec<T> = state.slots.iter_mut().filter_map(Option::take).collect();
                            state.resolver.take().map(|r| (r, Ok(values)))
                        } else {
                            None
                        }
                    }
                    Err(err) => state.resolver.take().map(|r| (r, Err(err))),
                }
            };

            if let Some((resolver, result)) = settled {
                resolver.settle(result);
            }
        });
    }

    out.with_dependencies(dependencies)
}

/// Combine two deferred values into a deferred pair
pub fn all2<A, B>(a: &Deferred<A>, b: &Deferred<B>) -> Deferred<(A, B)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
{
    let (out, resolver) = Deferred::pending_labeled("all2");
    let state: Arc<Mutex<Pair<A, B>>> = Arc::new(Mutex::new(Pair {
        left: None,
        right: None,
        resolver: Some(resolver),
    }));

    let left = Arc::clone(&state);
    a.on_resolved(move |result| Pair::offer(&left, result.map(Side::Left)));
    let right = Arc::clone(&state);
    b.on_resolved(move |result| Pair::offer(&right, result.map(Side::Right)));

    out.with_dependencies(a.dependencies().iter().cloned())
        .with_dependencies(b.dependencies().iter().cloned())
}

/// Combine three deferred values into a deferred triple
pub fn all3<A, B, C>(a: &Deferred<A>, b: &Deferred<B>, c: &Deferred<C>) -> Deferred<(A, B, C)>
where
    A: Clone + Send + 'static,
    B: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    all2(&all2(a, b), c).map(|((a, b), c)| (a, b, c))
}

enum Side<A, B> {
    Left(A),
    Right(B),
}

struct Pair<A: Clone + Send + 'static, B: Clone + Send + 'static> {
    left: Option<A>,
    right: Option<B>,
    resolver: Option<Resolver<(A, B)>>,
}

impl<A: Clone + Send + 'static, B: Clone + Send + 'static> Pair<A, B> {
    fn offer(state: &Mutex<Self>, result: Result<Side<A, B>, ResolutionError>) {
        let settled = {
            let mut pair = state.lock();
            if pair.resolver.is_none() {
                return;
            }
            match result {
                Ok(Side::Left(a)) => pair.left = Some(a),
                Ok(Side::Right(b)) => pair.right = Some(b),
                Err(err) => {
                    let resolver = pair.resolver.take();
                    drop(pair);
                    if let Some(resolver) = resolver {
                        resolver.fail(err);
                    }
                    return;
                }
            }
            if pair.left.is_some() && pair.right.is_some() {
                let resolver = pair.resolver.take();
                match (pair.left.take(), pair.right.take(), resolver) {
                    (Some(a), Some(b), Some(resolver)) => Some((resolver, (a, b))),
                    _ => None,
                }
            } else {
                None
            }
        };

        if let Some((resolver, value)) = settled {
            resolver.resolve(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::{ResourceId, ResourceKind};

    #[test]
    fn test_all_preserves_order() {
        let (first, first_resolver) = Deferred::<i32>::pending();
        let second = Deferred::ready(2);
        let (third, third_resolver) = Deferred::<i32>::pending();

        let combined = all(&[first, second, third]);
        assert_eq!(combined.peek(), None);

        third_resolver.resolve(3);
        assert_eq!(combined.peek(), None);
        first_resolver.resolve(1);
        assert_eq!(combined.peek(), Some(Ok(vec![1, 2, 3])));
    }

    #[test]
    fn test_all_empty_is_ready() {
        let combined = all::<i32>(&[]);
        assert_eq!(combined.peek(), Some(Ok(vec![])));
    }

    #[test]
    fn test_all_fails_with_first_failure() {
        let (first, first_resolver) = Deferred::<i32>::pending();
        let (second, second_resolver) = Deferred::<i32>::pending();
        let combined = all(&[first, second]);

        second_resolver.fail(ResolutionError::failed("queue", "throttled"));
        first_resolver.fail(ResolutionError::failed("topic", "denied"));

        assert_eq!(
            combined.peek(),
            Some(Err(ResolutionError::failed("queue", "throttled")))
        );
    }

    #[test]
    fn test_all2_and_all3() {
        let pair = all2(&Deferred::ready(3), &Deferred::ready("x".to_string()));
        assert_eq!(pair.peek(), Some(Ok((3, "x".to_string()))));

        let triple = all3(&Deferred::ready(1), &Deferred::ready(2), &Deferred::ready(3));
        assert_eq!(triple.map(|(a, b, c)| a + b + c).peek(), Some(Ok(6)));
    }

    #[test]
    fn test_all2_unions_dependencies() {
        let topic = ResourceId::new(ResourceKind::Topic, "orders");
        let queue = ResourceId::new(ResourceKind::Queue, "orders-audit");
        let a = Deferred::ready(1).with_dependency(topic.clone());
        let b = Deferred::ready(2).with_dependency(queue.clone());

        let combined = all2(&a, &b);
        assert!(combined.dependencies().contains(&topic));
        assert!(combined.dependencies().contains(&queue));
    }

    #[test]
    fn test_all2_failure() {
        let (a, resolver) = Deferred::<i32>::pending();
        let combined = all2(&a, &Deferred::ready(1));
        resolver.fail(ResolutionError::Transform("bad".to_string()));
        assert!(matches!(combined.peek(), Some(Err(_))));
    }
}
