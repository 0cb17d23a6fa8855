//! Binary envelope for the document channel.
//!
//! # Wire Format (y-protocols compatible)
//!
//! Messages use varUint encoding (variable-length unsigned integers):
//! - `varUint(0)`: Sync message, followed by one or more sub-messages
//!   - `varUint(0)`: SyncStep1 - contains state vector
//!   - `varUint(1)`: SyncStep2 - contains missing updates
//!   - `varUint(2)`: Update - contains incremental update
//! - `varUint(1)`: Presence message, followed by `varByteArray(presence update)`
//! - `varUint(3)`: Presence query, no payload
//!
//! Byte arrays are encoded as: `varUint(length) + raw bytes`
//!
//! The older framing that sent `varUint(0) + varByteArray(full state)` with no
//! sub-type is not accepted; such frames fail to decode.

use super::encoding::{Decoder, write_var_byte_array, write_var_uint};
use super::presence::PresenceUpdate;
use crate::error::{Result, SyncError};

/// Message type tags.
mod msg_type {
    pub const SYNC: u64 = 0;
    pub const PRESENCE: u64 = 1;
    pub const QUERY_PRESENCE: u64 = 3;
}

/// Sync sub-message types.
mod sync_type {
    pub const STEP1: u64 = 0;
    pub const STEP2: u64 = 1;
    pub const UPDATE: u64 = 2;
}

/// Y-sync sub-messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// SyncStep1 contains a state vector
    SyncStep1(Vec<u8>),
    /// SyncStep2 contains the updates missing from a state vector
    SyncStep2(Vec<u8>),
    /// Update contains an incremental update
    Update(Vec<u8>),
}

impl SyncMessage {
    /// Encode as a standalone Sync frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.payload().len() + 5);
        write_var_uint(&mut buf, msg_type::SYNC);
        self.encode_body(&mut buf);
        buf
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            SyncMessage::SyncStep1(p) | SyncMessage::SyncStep2(p) | SyncMessage::Update(p) => p,
        }
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        let sub_type = match self {
            SyncMessage::SyncStep1(_) => sync_type::STEP1,
            SyncMessage::SyncStep2(_) => sync_type::STEP2,
            SyncMessage::Update(_) => sync_type::UPDATE,
        };
        write_var_uint(buf, sub_type);
        write_var_byte_array(buf, self.payload());
    }

    fn decode_body(dec: &mut Decoder<'_>) -> Result<Self> {
        let sub_type = dec.read_var_uint("sync type")?;
        let payload = dec.read_var_byte_array("sync payload")?.to_vec();
        match sub_type {
            sync_type::STEP1 => Ok(SyncMessage::SyncStep1(payload)),
            sync_type::STEP2 => Ok(SyncMessage::SyncStep2(payload)),
            sync_type::UPDATE => Ok(SyncMessage::Update(payload)),
            other => Err(SyncError::UnknownSyncType(other)),
        }
    }
}

/// One decoded document-channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// One or more sync sub-messages sharing a single frame
    Sync(Vec<SyncMessage>),
    Presence(PresenceUpdate),
    /// Peer asks for the full presence table
    QueryPresence,
}

impl Message {
    /// Decode a complete frame. Trailing garbage or a truncated field fails
    /// the whole frame so nothing half-parsed reaches the document.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(SyncError::Empty);
        }

        let mut dec = Decoder::new(data);
        match dec.read_var_uint("message type")? {
            msg_type::SYNC => {
                let mut messages = Vec::new();
                while dec.has_remaining() {
                    messages.push(SyncMessage::decode_body(&mut dec)?);
                }
                if messages.is_empty() {
                    return Err(SyncError::EmptySync);
                }
                log::debug!("[Y-sync] Decoded {} sync sub-messages", messages.len());
                Ok(Message::Sync(messages))
            }
            msg_type::PRESENCE => {
                let payload = dec.read_var_byte_array("presence payload")?;
                dec.finish("presence payload")?;
                Ok(Message::Presence(PresenceUpdate::decode(payload)?))
            }
            msg_type::QUERY_PRESENCE => {
                dec.finish("presence query")?;
                Ok(Message::QueryPresence)
            }
            other => Err(SyncError::UnknownMessageType(other)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Message::Sync(messages) => {
                write_var_uint(&mut buf, msg_type::SYNC);
                for msg in messages {
                    msg.encode_body(&mut buf);
                }
            }
            Message::Presence(update) => {
                write_var_uint(&mut buf, msg_type::PRESENCE);
                write_var_byte_array(&mut buf, &update.encode());
            }
            Message::QueryPresence => write_var_uint(&mut buf, msg_type::QUERY_PRESENCE),
        }
        buf
    }
}
