//! This module holds typed parameters for the relay endpoint inputs.
//!
//! Malformed input (a missing field, a non-integer value) is rejected by the
//! axum extractor before a handler runs, so engine state is never touched by
//! a request that fails validation.

pub(crate) mod client_data;
