//! Dual-protocol networking: the binary RPC listener, the in-process RPC
//! client, the HTTP/JSON gateway, and the shared shutdown controller.

pub mod client;
pub mod handlers;
pub mod http;
pub mod rpc;
pub mod shutdown;

pub use client::RpcClient;
pub use handlers::AppState;
pub use http::{build_router, HttpModule};
pub use rpc::RpcModule;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
