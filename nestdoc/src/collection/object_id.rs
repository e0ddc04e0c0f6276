use crate::errors::{ErrorKind, NestdocError, NestdocResult};
use crate::ID_GENERATOR;
use chrono::{DateTime, TimeZone, Utc};
use log::{info, warn};
use rand::rngs::OsRng;
use rand::Rng;
use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// The database-native identifier of a document.
///
/// An `ObjectId` is 12 bytes: a 4-byte big-endian timestamp in seconds, a
/// 5-byte value unique to the process, and a 3-byte counter. Callers see it
/// as a 24-character lower-case hex string; documents store it natively as
/// [crate::common::Value::ObjectId].
///
/// ```rust,ignore
/// let id = ObjectId::new();
/// let parsed = ObjectId::parse_str(&id.to_hex())?;
/// assert_eq!(id, parsed);
/// ```
#[derive(PartialEq, Eq, Ord, PartialOrd, Hash, Clone, Copy)]
pub struct ObjectId {
    bytes: [u8; 12],
}

impl ObjectId {
    /// Generates a new unique `ObjectId`.
    pub fn new() -> Self {
        ID_GENERATOR.next_id()
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId { bytes }
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.bytes
    }

    /// Parses a 24-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::InvalidId] when the input is not exactly 24 hex
    /// digits.
    pub fn parse_str(value: &str) -> NestdocResult<ObjectId> {
        if !ObjectId::is_valid(value) {
            log::error!("Invalid object id {}", value);
            return Err(NestdocError::new(
                &format!("ObjectId validation error: '{}' is not a 24 character hex string", value),
                ErrorKind::InvalidId,
            ));
        }

        let mut bytes = [0u8; 12];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = &value[index * 2..index * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| {
                log::error!("Invalid object id {}", value);
                NestdocError::new(
                    &format!("ObjectId validation error: '{}' is not a 24 character hex string", value),
                    ErrorKind::InvalidId,
                )
            })?;
        }
        Ok(ObjectId { bytes })
    }

    /// Returns true if the value would parse as an `ObjectId`.
    pub fn is_valid(value: &str) -> bool {
        value.len() == 24 && value.chars().all(|c| c.is_ascii_hexdigit())
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// The creation time embedded in the identifier, to the second.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]]);
        Utc.timestamp_opt(secs as i64, 0)
            .single()
            .unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl FromStr for ObjectId {
    type Err = NestdocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Process-wide generator for [ObjectId]s.
///
/// Ids generated within the same second are distinguished by a counter that
/// starts at a random value and wraps at 24 bits.
pub(crate) struct ObjectIdGenerator {
    process_unique: [u8; 5],
    counter: AtomicU32,
    mutex: Mutex<()>,
}

impl ObjectIdGenerator {
    pub(crate) fn new() -> Self {
        let process_unique: [u8; 5] = OsRng.gen();
        let counter = OsRng.gen_range(0..=COUNTER_MASK);
        info!("Initialized object id generator with counter seed {}", counter);

        ObjectIdGenerator {
            process_unique,
            counter: AtomicU32::new(counter),
            mutex: Mutex::new(()),
        }
    }

    pub(crate) fn next_id(&self) -> ObjectId {
        let _lock = match self.mutex.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("Object id lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        let seconds = Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32;
        let count = self.counter.fetch_add(1, Ordering::Relaxed) & COUNTER_MASK;
        drop(_lock);

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.process_unique);
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        ObjectId { bytes }
    }
}
