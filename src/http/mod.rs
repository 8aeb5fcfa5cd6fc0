//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (pipeline assembly, serve loop)
//!     → request.rs (client address, deadline, cookies, arrival time)
//!     → body.rs (JSON / form parsing under the size ceiling)
//!     → params.rs (query map, parameter de-duplication)
//!     → [routing]
//!     → response.rs (error rendering)
//!     → Send to client
//! ```

pub mod body;
pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use server::{build_router, AppState, HttpServer};
