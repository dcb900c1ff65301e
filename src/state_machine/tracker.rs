// Copyright (c) 2025 - Cowboy AI, Inc.
//! Builder stage tracking
//!
//! Binds a builder label to a `StateMachineWithHistory` so rejected steps
//! come back as `StackError::ConfigurationOrder` or
//! `StackError::DuplicateConfiguration` naming the builder.

use chrono::Utc;
use std::fmt::Debug;
use tracing::debug;

use super::{StateMachine, StateMachineWithHistory, Step, Transition};
use crate::errors::{StackError, StackResult};

/// Stage machine owned by one builder instance
#[derive(Debug, Clone)]
pub struct StageTracker<S: StateMachine>
where
    S::Input: Clone + Debug,
{
    builder: String,
    machine: StateMachineWithHistory<S>,
}

impl<S> StageTracker<S>
where
    S: StateMachine + Debug,
    S::Input: Step + Clone + Debug,
{
    pub fn new(builder: impl Into<String>, initial: S) -> Self {
        Self {
            builder: builder.into(),
            machine: StateMachineWithHistory::new(initial),
        }
    }

    /// Apply a step, or report why it is not allowed yet
    pub fn advance(&mut self, step: S::Input) -> StackResult<S::Output> {
        let name = step.name();
        match self.machine.transition_with_history(step, Utc::now()) {
            Ok(output) => {
                debug!(
                    builder = %self.builder,
                    step = name,
                    stage = ?self.machine.current_state(),
                    "Builder step accepted"
                );
                Ok(output)
            }
            Err(err) => {
                debug!(builder = %self.builder, step = name, error = %err, "Builder step rejected");
                Err(StackError::from_transition(self.builder.clone(), err))
            }
        }
    }

    pub fn builder(&self) -> &str {
        &self.builder
    }

    pub fn current(&self) -> &S {
        self.machine.current_state()
    }

    pub fn history(&self) -> &[Transition<S, S::Input>] {
        self.machine.get_history()
    }
}
