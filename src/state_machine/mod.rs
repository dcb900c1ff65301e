// Copyright (c) 2025 - Cowboy AI, Inc.
//! Finite State Machine Abstractions
//!
//! Builders expose chained steps with ordering preconditions ("log bucket
//! before main bucket", "request models before method"). Each builder keeps
//! its progress as a small state machine whose inputs are the builder's
//! steps. Transitions are pure; an illegal step is a `TransitionError`,
//! which the builder surfaces as a typed `StackError` before enqueuing
//! anything.
//!
//! ```text
//! (Stage, Step) → Ok((Stage', Output))
//!              → Err(OutOfOrder | AlreadyConfigured)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cim_stack::state_machine::*;
//!
//! #[derive(Debug, Clone, PartialEq, Eq)]
//! enum CertificateStage { Empty, Issued }
//!
//! impl StateMachine for CertificateStage {
//!     type Input = CertificateStep;
//!     type Output = ();
//!
//!     fn transition(&self, input: &CertificateStep) -> TransitionResult<(Self, ())> {
//!         match (self, input) {
//!             (Self::Empty, CertificateStep::Certificate) => Ok((Self::Issued, ())),
//!             (Self::Empty, CertificateStep::DnsValidation) => Err(TransitionError::out_of_order(
//!                 input, "certificate must be defined before DNS validation records",
//!             )),
//!             // ...
//!         }
//!     }
//! }
//! ```

pub mod tracker;

pub use tracker::StageTracker;

/// Result of a state transition
pub type TransitionResult<S> = Result<S, TransitionError>;

/// A named builder step, used as state machine input
pub trait Step {
    /// Step name as exposed on the builder (`with_bucket`, `with_method`, ...)
    fn name(&self) -> &'static str;
}

/// Errors that can occur during state transitions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// Step invoked before its predecessor, or after a step it must precede
    #[error("`{step}` out of order: {reason}")]
    OutOfOrder { step: String, reason: String },

    /// Step that must be unique was invoked again
    #[error("`{step}` already configured for {key}")]
    AlreadyConfigured { step: String, key: String },
}

impl TransitionError {
    pub fn out_of_order(step: &impl Step, reason: impl Into<String>) -> Self {
        TransitionError::OutOfOrder {
            step: step.name().to_string(),
            reason: reason.into(),
        }
    }

    pub fn already_configured(step: &impl Step, key: impl Into<String>) -> Self {
        TransitionError::AlreadyConfigured {
            step: step.name().to_string(),
            key: key.into(),
        }
    }
}

/// Trait for finite state machines
///
/// Implement this trait to define a state machine with typed states,
/// inputs, and outputs.
pub trait StateMachine: Sized + Clone {
    /// Input type that triggers transitions
    type Input;

    /// Output type produced by transitions (use () if none)
    type Output;

    /// Attempt to transition to a new state given an input
    ///
    /// # Returns
    /// - Ok((new_state, output)) if transition is valid
    /// - Err(TransitionError) if transition is invalid
    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;
}

/// Transition metadata
///
/// Records information about a state transition for auditing.
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    /// State before transition
    pub from: S,

    /// State after transition
    pub to: S,

    /// Input that triggered transition
    pub input: I,

    /// Timestamp of transition
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<S, I> Transition<S, I> {
    /// Create a new transition record
    pub fn new(from: S, to: S, input: I, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            from,
            to,
            input,
            timestamp,
        }
    }
}

/// State machine with history
///
/// Wraps a state machine and tracks transition history.
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    /// Current state
    pub current: FSM,

    /// Transition history
    pub history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    /// Create a new state machine with history tracking
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Transition with history recording
    ///
    /// A rejected input leaves both state and history untouched.
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> TransitionResult<FSM::Output> {
        let from = self.current.clone();
        let (to, output) = self.current.transition(&input)?;

        self.history
            .push(Transition::new(from, to.clone(), input, timestamp));

        self.current = to;
        Ok(output)
    }

    /// Get transition history
    pub fn get_history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    /// Get current state
    pub fn current_state(&self) -> &FSM {
        &self.current
    }
}
