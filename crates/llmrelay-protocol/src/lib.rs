//! Minimal, dialect-tagging types shared by the relay core.
//!
//! The teacher crate this workspace is descended from (`gproxy-protocol`)
//! carries a fully typed request/response tree per dialect per operation, so
//! that it can losslessly transform a request from one dialect's wire shape
//! into another's. This gateway never transforms across dialects — a
//! "claude" request is only ever forwarded to "claude"-kind providers — so
//! there is no need for that type tree, or a dialect-tag type of its own
//! (`llmrelay_provider_core::Kind` already fills that role). What remains
//! is the handful of JSON shapes the Tool-Use Repair step has to
//! understand.

pub mod claude;
