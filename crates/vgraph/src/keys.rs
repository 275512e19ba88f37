//! Canonical ordering of table keys.
//!
//! Entries are emitted in an order that depends only on the keys themselves:
//! `false < true < integers < floats < strings`. Integers and floats compare
//! numerically, strings by byte length and then by bytes. The order is cheap
//! and total; it is not meant to agree with any numeric order across kinds.

use std::cmp::Ordering;

use crate::error::EncodeError;
use crate::heap::{Table, TableKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KeyRank {
    False,
    True,
    Integer,
    Float,
    String,
}

impl KeyRank {
    pub fn of(key: &TableKey) -> Result<Self, EncodeError> {
        match key {
            TableKey::Bool(false) => Ok(KeyRank::False),
            TableKey::Bool(true) => Ok(KeyRank::True),
            TableKey::Int(_) => Ok(KeyRank::Integer),
            TableKey::Float(_) => Ok(KeyRank::Float),
            TableKey::Str(_) => Ok(KeyRank::String),
            TableKey::Table(_) => Err(EncodeError::UnsupportedKey { type_name: "table" }),
            TableKey::Function(_) => Err(EncodeError::UnsupportedKey {
                type_name: "function",
            }),
            TableKey::Foreign(_) => Err(EncodeError::UnsupportedKey {
                type_name: "foreign",
            }),
        }
    }
}

/// A key that passed validation, paired with its rank.
#[derive(Clone, Copy, Debug)]
pub struct CanonicalKey<'a> {
    pub rank: KeyRank,
    pub key: &'a TableKey,
}

pub fn compare(a: &CanonicalKey<'_>, b: &CanonicalKey<'_>) -> Ordering {
    a.rank.cmp(&b.rank).then_with(|| match (a.key, b.key) {
        (TableKey::Int(x), TableKey::Int(y)) => x.cmp(y),
        (TableKey::Float(x), TableKey::Float(y)) => f64::from_bits(*x).total_cmp(&f64::from_bits(*y)),
        (TableKey::Str(x), TableKey::Str(y)) => x.len().cmp(&y.len()).then_with(|| x.cmp(y)),
        _ => Ordering::Equal,
    })
}

/// Validates every key of `table` and returns them in canonical order.
///
/// Fails on the first key that is not a boolean, integer, float or string.
pub fn canonical_keys(table: &Table) -> Result<Vec<CanonicalKey<'_>>, EncodeError> {
    let mut keys = Vec::new();
    keys.try_reserve_exact(table.len())
        .map_err(|_| EncodeError::OutOfMemory {
            requested: table.len(),
        })?;
    for key in table.keys() {
        keys.push(CanonicalKey {
            rank: KeyRank::of(key)?,
            key,
        });
    }
    keys.sort_unstable_by(compare);
    Ok(keys)
}
