//! Switchboard is a tool-dispatch gateway: one process, one operation
//! catalog, many concurrent callers, each running under its own credential.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the per-call credential scope, the lifespan of background
//!   resources, and configuration loading.
//! - [`catalog`] is the immutable registry of operations, their input
//!   contracts, and their handlers.
//! - [`dispatch`] resolves, validates, and invokes calls, and folds handler
//!   failures into the closed error taxonomy.
//! - [`mcp`] frames calls as JSON-RPC and serves them over the event-stream
//!   and stateless HTTP transports.
//! - [`ops`] holds the built-in diagnostic operations.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`], which loads configuration, starts the
//! [`core::lifespan::Lifespan`], and serves [`mcp::transport::router`].

pub mod catalog;
pub mod cli;
pub mod core;
pub mod dispatch;
pub mod mcp;
pub mod ops;
