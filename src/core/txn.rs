//! Transaction number dan UUID
//!
//! Layout transaction number (64 bit):
//! ```text
//! year (13 bit) | month (4 bit) | day (5 bit) | sequence (42 bit)
//! ```
//! UUID textual: `storageId:collectionId:year:month:day:sequence:uid`

use std::fmt;
use std::str::FromStr;

use crate::error::{JbError, Result};

const SEQ_BITS: u32 = 42;
const DAY_BITS: u32 = 5;
const MONTH_BITS: u32 = 4;
const YEAR_BITS: u32 = 13;

const SEQ_MAX: u64 = (1 << SEQ_BITS) - 1;
const DAY_SHIFT: u32 = SEQ_BITS;
const MONTH_SHIFT: u32 = SEQ_BITS + DAY_BITS;
const YEAR_SHIFT: u32 = SEQ_BITS + DAY_BITS + MONTH_BITS;
const YEAR_MAX: u32 = (1 << YEAR_BITS) - 1;

/// Packed 64-bit transaction number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Txn(u64);

impl Txn {
    pub fn new(year: u32, month: u32, day: u32, seq: u64) -> Result<Self> {
        if year > YEAR_MAX {
            return Err(JbError::InvalidInput(format!("txn year {year} out of range")));
        }
        if !(1..=12).contains(&month) {
            return Err(JbError::InvalidInput(format!("txn month {month} out of range")));
        }
        if !(1..=31).contains(&day) {
            return Err(JbError::InvalidInput(format!("txn day {day} out of range")));
        }
        if seq > SEQ_MAX {
            return Err(JbError::InvalidInput(format!("txn sequence {seq} out of range")));
        }
        Ok(Self(
            ((year as u64) << YEAR_SHIFT)
                | ((month as u64) << MONTH_SHIFT)
                | ((day as u64) << DAY_SHIFT)
                | seq,
        ))
    }

    /// Wrap raw value (misal hasil `read_int64`)
    #[inline(always)]
    pub const fn from_value(value: u64) -> Self {
        Self(value)
    }

    #[inline(always)]
    pub const fn value(self) -> u64 {
        self.0
    }

    pub const fn year(self) -> u32 {
        (self.0 >> YEAR_SHIFT) as u32
    }

    pub const fn month(self) -> u32 {
        ((self.0 >> MONTH_SHIFT) & ((1 << MONTH_BITS) - 1)) as u32
    }

    pub const fn day(self) -> u32 {
        ((self.0 >> DAY_SHIFT) & ((1 << DAY_BITS) - 1)) as u32
    }

    pub const fn seq(self) -> u64 {
        self.0 & SEQ_MAX
    }
}

impl fmt::Display for Txn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.year(), self.month(), self.day(), self.seq())
    }
}

/// Feature UUID: storage, collection, txn, dan uid di dalam txn
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NakshaUuid {
    pub storage_id: String,
    pub collection_id: String,
    pub txn: Txn,
    pub uid: u32,
}

impl NakshaUuid {
    pub fn new(
        storage_id: impl Into<String>,
        collection_id: impl Into<String>,
        txn: Txn,
        uid: u32,
    ) -> Result<Self> {
        let storage_id = storage_id.into();
        let collection_id = collection_id.into();
        for part in [&storage_id, &collection_id] {
            if part.is_empty() || part.contains(':') {
                return Err(JbError::InvalidInput(format!("invalid uuid part {part:?}")));
            }
        }
        Ok(Self {
            storage_id,
            collection_id,
            txn,
            uid,
        })
    }
}

impl fmt::Display for NakshaUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.storage_id, self.collection_id, self.txn, self.uid
        )
    }
}

impl FromStr for NakshaUuid {
    type Err = JbError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 7 {
            return Err(JbError::InvalidInput(format!("invalid uuid {s:?}")));
        }
        let invalid = || JbError::InvalidInput(format!("invalid uuid {s:?}"));
        let number = |i: usize| -> Result<u64> { parts[i].parse::<u64>().map_err(|_| invalid()) };
        let small = |i: usize| -> Result<u32> { u32::try_from(number(i)?).map_err(|_| invalid()) };
        let txn = Txn::new(small(2)?, small(3)?, small(4)?, number(5)?)?;
        let uid = small(6)?;
        Self::new(parts[0], parts[1], txn, uid)
    }
}
