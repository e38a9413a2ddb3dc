//! # growlink — fleet control engine for horticultural LED fixtures
//!
//! Discovers serial-to-Ethernet gateways over UDP broadcast, maintains a TCP
//! transport per discovered gateway port, assigns short addresses to
//! fixtures behind each gateway, and exposes a name-based command dispatcher
//! plus a schedule aggregator on top.
//!
//! ## Usage
//!
//! ```no_run
//! use growlink::manager::Engine;
//!
//! # async fn run() -> growlink::error::Result<()> {
//! let engine = Engine::start(true).await?;
//! let serials = engine.get_serials();
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod manager;
pub mod net;
pub mod schedule;

pub use error::{Error, Result};
pub use logging::init_logger;
pub use manager::Engine;
