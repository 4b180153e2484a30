//! JSON-RPC listener for the flowgate server.
//!
//! Exposes the management bridge, the viewer listing and request dispatch to
//! operational tooling and to the routing host.

pub mod handlers;
pub mod server;

pub use handlers::{ApiImpl, FlowgateApiServer, ViewerInfo};
pub use server::{start_server, start_server_on};
