//! Wire protocol for Pointcast.
//!
//! This crate defines the "language" that estimation clients and the
//! coordination server speak:
//!
//! - **Model** ([`Session`], [`Participant`], [`Feature`], [`Vote`],
//!   [`SessionSnapshot`]) — the records that travel on the wire.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]) — the actions clients
//!   send and the notifications the server fans out.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how frames are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong doing that.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the
//! coordination core (session state). It doesn't know about connections,
//! rooms, or the store — it only knows shapes.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Coordinator (session state)
//! ```

mod codec;
mod error;
mod events;
mod model;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{ClientEvent, ServerEvent};
pub use model::{
    EstimationScale, Feature, FeatureId, Participant, ParticipantId,
    SENTINEL_VALUES, Session, SessionId, SessionSnapshot, Vote, VoteId,
    is_sentinel,
};
