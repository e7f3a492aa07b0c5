//! Unified error type for the Pointcast server crate.

use pointcast_protocol::ProtocolError;
use pointcast_store::StoreError;
use pointcast_transport::TransportError;

/// Top-level error that wraps all layer-specific errors.
///
/// When using the `pointcast` crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PointcastError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid frame).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A store-level error (missing records, backend failure).
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let pointcast_err: PointcastError = err.into();
        assert!(matches!(pointcast_err, PointcastError::Transport(_)));
        assert!(pointcast_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let pointcast_err: PointcastError = err.into();
        assert!(matches!(pointcast_err, PointcastError::Protocol(_)));
    }

    #[test]
    fn test_from_store_error() {
        let err = StoreError::Backend("db went away".into());
        let pointcast_err: PointcastError = err.into();
        assert!(matches!(pointcast_err, PointcastError::Store(_)));
        assert!(pointcast_err.to_string().contains("db went away"));
    }
}
