//! JSON-RPC 2.0 request/reply exchange over host-local Unix domain
//! sockets.
//!
//! A listening [`endpoint::ServerEndpoint`] accepts one connection per
//! request/reply pair; a [`dispatch::MethodTable`] maps method names to
//! handler chains; [`server::run_server`] drives the accept loop.
//! [`client::call`] is the matching client-side primitive.

pub mod client;
mod codec;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
