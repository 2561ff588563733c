//! GBQ Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the Cloud Storage accessor and the BigQuery load
//! pipeline.
//!
//! - **Configuration**: typed environment lookups with defaults
//! - **Errors**: the configuration error type shared by both crates
//! - **Logging**: `tracing` subscriber setup for the binaries
//!
//! # Example
//!
//! ```no_run
//! use gbq_common::env;
//!
//! fn main() -> gbq_common::Result<()> {
//!     env::load_dotenv();
//!     let timeout: u64 = env::parse_or("GBQ_HTTP_TIMEOUT_SECS", 60)?;
//!     println!("timeout = {timeout}s");
//!     Ok(())
//! }
//! ```

pub mod env;
pub mod error;
pub mod logging;

pub use error::{ConfigError, Result};
