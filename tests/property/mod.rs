// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Laws of deferred values and validity of generated policy documents.

mod deferred_laws;
mod policy_documents;
