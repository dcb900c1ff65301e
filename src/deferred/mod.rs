// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Values
//!
//! A `Deferred<T>` is a value that is not known while the stack is being
//! composed. The provisioning engine resolves it later, exactly once, with
//! either a value or a `ResolutionError`.
//!
//! ```text
//! compose time                         apply time
//! ────────────                         ──────────
//! bucket.arn() ──map──> policy doc     engine resolves arn
//!                          │                  │
//!                          ▼                  ▼
//!                  Deferred<Value>  ◄── continuations run
//! ```
//!
//! # Rules
//!
//! - Observers are continuations registered with `on_resolved`; they run
//!   only after resolution, never against a partial value.
//! - Nothing here blocks. `resolved().await` suspends the task, not the thread.
//! - Every deferred carries the set of resources it was derived from. `map`
//!   keeps the set and the `all*` combinators union it, which is how a
//!   request learns what it must wait for.
//!
//! # Laws
//!
//! ```text
//! d.map(id) == d
//! d.map(f).map(g) == d.map(g . f)
//! all2(a, b).map(|(x, y)| (f(x), g(y))) == all2(a.map(f), b.map(g))
//! ```
//!
//! ```rust,ignore
//! use cim_stack::deferred::*;
//!
//! let (arn, resolver) = Deferred::<String>::pending();
//! let resource = arn.map(|arn| format!("{arn}/*"));
//! resolver.resolve("arn:aws:s3:::assets".to_string());
//! assert_eq!(resource.peek(), Some(Ok("arn:aws:s3:::assets/*".to_string())));
//! ```

pub mod combinators;
pub mod properties;
pub mod value;

pub use combinators::{all, all2, all3};
pub use properties::Properties;
pub use value::{Deferred, ResolutionError, Resolver};
