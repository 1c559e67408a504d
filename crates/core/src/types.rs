use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Milliseconds since the unix epoch.
pub type Timestamp = u64;
/// Delay in milliseconds.
pub type DelayMs = u64;
/// A bit stream, one `bool` per bit.
pub type Bits = Vec<bool>;

pub fn now_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub fn ms_elapsed(since: Timestamp) -> DelayMs {
    now_ms().saturating_sub(since)
}

fn random_hex_id() -> String {
    let raw: [u8; 16] = rand::rng().random();
    hex::encode(raw)
}

/// Identifies one UE session across every buffer of the network.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(random_hex_id())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Groups the MAC frames cut from one IP packet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(pub String);

impl PacketId {
    pub fn generate() -> Self {
        Self(random_hex_id())
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bits travel as `"0110..."` strings in snapshots.
pub mod serde_bits {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bits: &[bool], s: S) -> Result<S::Ok, S::Error> {
        let text: String = bits.iter().map(|&b| if b { '1' } else { '0' }).collect();
        s.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<bool>, D::Error> {
        let text = String::deserialize(d)?;
        text.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(serde::de::Error::custom(format!("invalid bit {other:?}"))),
            })
            .collect()
    }
}

pub fn random_bits<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Bits {
    (0..len).map(|_| rng.random::<bool>()).collect()
}

pub fn flip_bits(bits: &[bool]) -> Bits {
    bits.iter().map(|b| !b).collect()
}
