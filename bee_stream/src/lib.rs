mod batch;
mod messages;
mod routes;
mod server;
mod session;
mod telemetry;
mod transport;

pub mod app;
pub mod config;

pub use app::start_app;
pub use batch::{AccumulatorError, BatchAccumulator};
pub use messages::ServerMessage;
pub use server::{build_router, HttpServer, SharedState};
pub use session::{Session, SessionError, SessionReport, SessionState};
pub use telemetry::Metrics;
pub use transport::{Inbound, Transport, TransportError};
