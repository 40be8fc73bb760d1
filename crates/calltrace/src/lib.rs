//! In-process call tracing.
//!
//! This crate records what a unit of work did as a tree of [`Trace`] nodes:
//!
//! - **Types**: `Trace` and its `Status`, with status aggregation and lap timing
//! - **Clock**: Injectable time source (`SystemClock`, `ManualClock` for tests)
//! - **Message**: printf-style templates that never fail
//! - **Config**: TOML settings for new traces
//!
//! # Usage
//!
//! ```rust
//! use calltrace::{Status, Trace, trace_message};
//!
//! let mut trace = Trace::new("OrderService", "place_order");
//! trace.parameter("order_id", "42");
//!
//! let payment = trace.create_child("PaymentGateway", "charge");
//! trace_message!(payment, "amount=%.2f", 19.99);
//! payment.set_status(Status::Warn);
//! payment.finish();
//!
//! trace.finish();
//! assert!(trace.has_warning());
//! ```
//!
//! A tree belongs to one call stack. It carries no locks and must not be
//! mutated from several threads at once.

pub mod clock;
pub mod config;
pub mod error;
pub mod message;
pub mod types;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock, system_clock};
pub use config::TraceConfig;
pub use error::{Result, TraceError};
pub use message::{Arg, NULL_MESSAGE, interpolate};
pub use types::{Status, Trace, TraceBuilder};
