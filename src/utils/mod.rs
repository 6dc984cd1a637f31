//! Common utilities for loading problems from disk.
//!
//! - **`data_loader`**: reads square sparse matrices in the Matrix Market
//!   coordinate format into `faer` sparse matrices, used by the `eigs` binary
//!   and available to library callers.

pub mod data_loader;
