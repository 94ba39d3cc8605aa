use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::LazyLock;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use time::OffsetDateTime;

/// Random value fixed for the lifetime of the process.
static PROCESS_UNIQUE: LazyLock<[u8; 5]> = LazyLock::new(rand::random);

static COUNTER: LazyLock<AtomicU32> =
    LazyLock::new(|| AtomicU32::new(rand::random::<u32>() & 0x00ff_ffff));

/// A 12-byte document identifier, rendered as 24 lowercase hex characters.
///
/// Layout: 4 bytes of big-endian Unix seconds, 5 bytes of per-process
/// randomness, 3 bytes of a wrapping counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidObjectId {
    #[error("identifier must be 24 characters long, got {0}")]
    Length(usize),
    #[error("identifier must be lowercase hexadecimal, found {0:?}")]
    Character(char),
}

impl ObjectId {
    pub fn new() -> Self {
        let seconds = OffsetDateTime::now_utc().unix_timestamp() as u32;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_UNIQUE);
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Seconds since the Unix epoch at which the id was generated.
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(c) = s.chars().find(|c| !matches!(c, '0'..='9' | 'a'..='f')) {
            return Err(InvalidObjectId::Character(c));
        }
        if s.len() != 24 {
            return Err(InvalidObjectId::Length(s.len()));
        }

        let mut bytes = [0u8; 12];
        let digits = s.as_bytes();
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = (nibble(digits[2 * i])? << 4) | nibble(digits[2 * i + 1])?;
        }
        Ok(ObjectId(bytes))
    }
}

fn nibble(c: u8) -> Result<u8, InvalidObjectId> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(InvalidObjectId::Character(char::from(c))),
    }
}

impl ToSql for ObjectId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for ObjectId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}
