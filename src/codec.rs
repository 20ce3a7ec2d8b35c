//! Byte encodings for values that travel between map and reduce.
//!
//! A [`GroupedValue`] is a single tag byte followed by its UTF-8 payload.
//! Counts are big-endian `u64`s, as written by [`BufMut::put_u64`].

use anyhow::{bail, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const YEAR_TAG: u8 = b'Y';
const ACTOR_TAG: u8 = b'A';

/// The value a join-stage extractor contributes under a title id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupedValue {
    /// Release year, from the title source.
    Year(String),
    /// Credited actor name, from the credit source.
    ActorMarker(String),
}

impl GroupedValue {
    /// The payload without its tag.
    pub fn payload(&self) -> &str {
        match self {
            GroupedValue::Year(s) | GroupedValue::ActorMarker(s) => s,
        }
    }

    pub fn encode(&self) -> Bytes {
        let (tag, payload) = match self {
            GroupedValue::Year(s) => (YEAR_TAG, s),
            GroupedValue::ActorMarker(s) => (ACTOR_TAG, s),
        };
        let mut buf = BytesMut::with_capacity(1 + payload.len());
        buf.put_u8(tag);
        buf.put_slice(payload.as_bytes());
        buf.freeze()
    }

    pub fn decode(mut buf: Bytes) -> Result<Self> {
        if !buf.has_remaining() {
            bail!("empty grouped value");
        }
        let tag = buf.get_u8();
        let payload = String::from_utf8(buf.to_vec())?;
        match tag {
            YEAR_TAG => Ok(GroupedValue::Year(payload)),
            ACTOR_TAG => Ok(GroupedValue::ActorMarker(payload)),
            other => bail!("unknown grouped value tag {:#04x}", other),
        }
    }
}

/// Encodes a count contribution.
pub fn encode_count(n: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u64(n);
    buf.freeze()
}

/// Decodes a count contribution written by [`encode_count`].
pub fn decode_count(mut buf: Bytes) -> Result<u64> {
    if buf.len() != 8 {
        bail!("count value must be 8 bytes, got {}", buf.len());
    }
    Ok(buf.get_u64())
}
