//! Frames exchanged between endpoints.
//!
//! Each frame is one line of JSON.

use serde::{Deserialize, Serialize};
use tokio_util::codec::LinesCodec;

use super::Address;
use crate::pool::{PoolError, PoolMessage};
use crate::roi::WorkUnit;

/// Longest frame a connection accepts, in bytes.
///
/// Work units may carry whole datasets, so this is generous; a peer that
/// exceeds it is disconnected.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Line codec bounded to `max_len` bytes per frame.
pub(crate) fn line_codec(max_len: usize) -> LinesCodec {
    LinesCodec::new_with_max_length(max_len)
}

/// A top-level frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Asks whether `pool` is exposed by actor system `system`.
    Resolve { system: String, pool: String },
    /// Positive answer to `Resolve`.
    Resolved { address: Address },
    /// Negative answer to `Resolve`.
    NotFound { system: String, pool: String },
    /// Delivers a message to a registered pool.
    Deliver { pool: String, message: WireMessage },
}

impl Frame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(line: &str) -> Result<Frame, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// [`PoolMessage`] as it travels over the wire.
///
/// Origins are not transmitted: a result received from the network always
/// comes from outside the receiving pool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireMessage {
    Link { address: Address },
    Work { unit: WorkUnit },
    Result { unit: WorkUnit },
    Shutdown,
}

impl WireMessage {
    /// Converts an outbound message. Links require the target to have a
    /// remote address.
    pub fn from_message(message: PoolMessage) -> Result<Self, PoolError> {
        Ok(match message {
            PoolMessage::Link(target) => match target.address() {
                Some(address) => WireMessage::Link {
                    address: address.clone(),
                },
                None => {
                    return Err(PoolError::Unaddressable {
                        pool: target.name().to_string(),
                    })
                }
            },
            PoolMessage::Work(unit) => WireMessage::Work { unit },
            PoolMessage::Result { unit, .. } => WireMessage::Result { unit },
            PoolMessage::Shutdown => WireMessage::Shutdown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolRef;
    use crate::roi::{Metadata, Payload, RegionBox};

    #[test]
    fn test_frame_shape() {
        let frame = Frame::Resolve {
            system: "RoiMill".into(),
            pool: "PyramidPool".into(),
        };
        assert_eq!(
            frame.encode().unwrap(),
            r#"{"type":"resolve","system":"RoiMill","pool":"PyramidPool"}"#
        );
    }

    #[test]
    fn test_deliver_frame_decodes() {
        let line = r#"{"type":"deliver","pool":"ROIFinderPool","message":{"kind":"result","unit":{"payload":{"kind":"region","data":{"x":1,"y":2,"width":3,"height":4}},"metadata":"source:k"}}}"#;
        let frame = Frame::decode(line).unwrap();
        let expected = Frame::Deliver {
            pool: "ROIFinderPool".into(),
            message: WireMessage::Result {
                unit: WorkUnit::new(
                    Payload::Region(RegionBox::new(1, 2, 3, 4)),
                    Metadata::parse("source:k"),
                ),
            },
        };
        assert_eq!(frame, expected);
        assert!(Frame::decode(r#"{"type":"shout"}"#).is_err());
    }

    #[test]
    fn test_link_requires_address() {
        let (target, _rx) = PoolRef::channel("Receiver");
        let err = WireMessage::from_message(PoolMessage::Link(target.clone())).unwrap_err();
        assert!(matches!(err, PoolError::Unaddressable { pool } if pool == "Receiver"));

        let address = Address::new("RoiMill", "localhost", 9000, "Receiver");
        let wire = WireMessage::from_message(PoolMessage::Link(target.with_address(address.clone()))).unwrap();
        assert_eq!(wire, WireMessage::Link { address });
    }
}
