//! openEHR Reference Model (RM) 1.1.0 wire support.
//!
//! This module implements the RM 1.1.0 YAML representation of compositions and the translation
//! between it and the validated domain types.

pub mod composition;
