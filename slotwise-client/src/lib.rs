//! Node-client boundary for the slotwise cluster router.
//!
//! The cluster routing layer never speaks a wire protocol itself. Everything
//! it needs from a single store node is expressed here as traits: connect to
//! an address, execute one typed command (or a pipelined batch of them), and
//! report failures in a way that lets the router tell a stale-routing
//! redirect apart from a transient connection problem.
//!
//! Concrete implementations (real sockets, TLS, pooling) live outside this
//! workspace; the cluster crate's tests provide an in-memory one.

mod address;
mod client;
mod command;
mod error;

pub use address::Address;
pub use client::{ClusterProbe, Connector, NodeClient, Pipeline};
pub use command::{Command, Reply};
pub use error::ClientError;
