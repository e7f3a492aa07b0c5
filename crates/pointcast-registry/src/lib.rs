//! Live-connection tracking for Pointcast.
//!
//! This crate answers one question for the coordinator: *which transport
//! connection currently speaks for which participant?* It handles:
//!
//! 1. **Binding** — associating a participant id with its live connection
//! 2. **Reconnect detection** — a rebind within the grace period is the
//!    same person coming back, not a new arrival
//! 3. **Grace timers** — a dropped connection only becomes a departure
//!    after a short window with no rebind
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← consumes departures, broadcasts presence events
//!     ↕
//! Registry (this crate)  ← tracks participant ↔ connection bindings
//!     ↕
//! Transport (below)  ← reports connections opening and closing
//! ```

mod binding;
mod registry;

pub use binding::{BindOutcome, Departure, RegistryConfig};
pub use registry::ConnectionRegistry;
