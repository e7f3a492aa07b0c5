//! Session-room broadcasting for Pointcast.
//!
//! A "room" is the set of live connections subscribed to one session's
//! event stream. This crate owns the room membership maps and the
//! fan-out: the coordinator decides *what* to send, the broadcaster
//! decides *who* receives it.
//!
//! Room membership lives in an explicit map rather than inside the
//! transport, so the whole layer is constructible per test with no
//! network stack underneath.

mod broadcaster;

pub use broadcaster::{ClientSender, RoomBroadcaster, send_to_one};
