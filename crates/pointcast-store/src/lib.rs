//! Session storage for Pointcast.
//!
//! The coordination core never talks to a database directly — it talks to
//! the [`SessionStore`] trait. This crate defines that trait and ships an
//! in-memory implementation ([`MemoryStore`]) used by tests and the demo
//! server. A durable backend would implement the same trait.
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← validates and applies every real-time action
//!     ↕
//! Store Layer (this crate)  ← owns sessions, participants, features, votes
//! ```
//!
//! Every store call is a suspension point for the coordinator, which is
//! why the trait is async even though [`MemoryStore`] never blocks.

mod error;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::SessionStore;
