//! Supervised browser automation over the WebDriver wire protocol.
//!
//! `drover` owns the lifecycle of a chromedriver-compatible engine process:
//! it adopts an instance that is already listening on the target port, or
//! spawns and health-checks a new one, and tears an owned process down
//! exactly once. On top of that it keeps a concurrency-safe registry of
//! open sessions with orderly shutdown (including SIGINT/SIGTERM), and
//! funnels every "element may not exist yet" wait through a single bounded
//! polling primitive so callers get deterministic timeout semantics out of
//! an unreliable page-rendering world.
//!
//! The wire protocol itself is delegated to [`thirtyfour`]; this crate
//! never retries at the transport layer, only at the semantic "is this
//! element present and ready yet" layer.

mod element;
pub mod error;
mod lifecycle;
mod poll;
mod query;
mod registry;
mod session;
mod snapshot;

pub use element::Element;
pub use error::{DroverError, Result};
pub use lifecycle::{acquire, DriverProcess};
pub use poll::{poll_until, Tick};
pub use query::Queryable;
pub use registry::Drover;
pub use session::{Session, SessionOptions};
