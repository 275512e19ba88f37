//! Arena that owns every identity-bearing object of a value graph.
//!
//! Tables, closures, captured-variable cells and foreign objects live in
//! separate vectors and are addressed by `Copy` handles. A handle is the
//! object's identity: two empty tables are two different handles, and a cycle
//! is just a handle stored inside the object it names.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::HeapError;
use crate::value::{Chunk, ClosureRef, ForeignRef, TableRef, UpvalRef, Value};

pub const MAX_UPVALUES: usize = 255;

/// A table key under raw equality.
///
/// Floats holding an exact integer are stored as `Int`, so `1` and `1.0`
/// address the same entry and `-0.0` is `0`. The remaining floats are
/// compared by bit pattern, which is numeric equality once NaN is excluded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(Vec<u8>),
    Table(TableRef),
    Function(ClosureRef),
    Foreign(ForeignRef),
}

impl TableKey {
    pub fn from_value(value: Value) -> Result<Self, HeapError> {
        Ok(match value {
            Value::Nil => return Err(HeapError::NilKey),
            Value::Boolean(b) => TableKey::Bool(b),
            Value::Integer(i) => TableKey::Int(i),
            Value::Float(n) => {
                if n.is_nan() {
                    return Err(HeapError::NanKey);
                }
                match float_to_int(n) {
                    Some(i) => TableKey::Int(i),
                    None => TableKey::Float(n.to_bits()),
                }
            }
            Value::String(s) => TableKey::Str(s),
            Value::Table(t) => TableKey::Table(t),
            Value::Function(f) => TableKey::Function(f),
            Value::Foreign(u) => TableKey::Foreign(u),
        })
    }
}

fn float_to_int(n: f64) -> Option<i64> {
    // 2^63 is exactly representable; anything at or above it overflows i64.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if n.fract() == 0.0 && (-LIMIT..LIMIT).contains(&n) {
        Some(n as i64)
    } else {
        None
    }
}

#[derive(Clone, Debug, Default)]
pub struct Table {
    entries: HashMap<TableKey, Value>,
}

impl Table {
    pub fn get(&self, key: &TableKey) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Assigning `Nil` removes the entry.
    pub fn set(&mut self, key: Value, value: Value) -> Result<(), HeapError> {
        let key = TableKey::from_value(key)?;
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in the map's own (unspecified) iteration order.
    pub fn keys(&self) -> impl Iterator<Item = &TableKey> {
        self.entries.keys()
    }
}

#[derive(Clone, Debug)]
pub struct Closure {
    chunk: Rc<Chunk>,
    upvals: Vec<UpvalRef>,
}

impl Closure {
    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn upvals(&self) -> &[UpvalRef] {
        &self.upvals
    }
}

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct Heap {
    id: u64,
    tables: Vec<Table>,
    closures: Vec<Closure>,
    upvals: Vec<Value>,
    foreign: Vec<String>,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            id: NEXT_HEAP_ID.fetch_add(1, AtomicOrdering::Relaxed),
            tables: Vec::new(),
            closures: Vec::new(),
            upvals: Vec::new(),
            foreign: Vec::new(),
        }
    }

    pub fn new_table(&mut self) -> Result<TableRef, HeapError> {
        let index = next_index(self.tables.len(), "table")?;
        self.tables.push(Table::default());
        Ok(TableRef::new(self.id, index))
    }

    /// `None` for handles issued by another heap.
    pub fn table(&self, t: TableRef) -> Option<&Table> {
        if t.heap != self.id {
            return None;
        }
        self.tables.get(t.index as usize)
    }

    pub fn table_mut(&mut self, t: TableRef) -> Option<&mut Table> {
        if t.heap != self.id {
            return None;
        }
        self.tables.get_mut(t.index as usize)
    }

    pub fn set(
        &mut self,
        t: TableRef,
        key: impl Into<Value>,
        value: impl Into<Value>,
    ) -> Result<(), HeapError> {
        let table = self.table_mut(t).ok_or(HeapError::StaleHandle {
            kind: "table",
            index: t.index,
        })?;
        table.set(key.into(), value.into())
    }

    pub fn new_upval(&mut self, value: impl Into<Value>) -> Result<UpvalRef, HeapError> {
        let index = next_index(self.upvals.len(), "upvalue")?;
        self.upvals.push(value.into());
        Ok(UpvalRef::new(self.id, index))
    }

    pub fn upval(&self, u: UpvalRef) -> Option<&Value> {
        if u.heap != self.id {
            return None;
        }
        self.upvals.get(u.index as usize)
    }

    pub fn set_upval(&mut self, u: UpvalRef, value: impl Into<Value>) -> Result<(), HeapError> {
        let stale = HeapError::StaleHandle {
            kind: "upvalue",
            index: u.index,
        };
        if u.heap != self.id {
            return Err(stale);
        }
        let slot = self.upvals.get_mut(u.index as usize).ok_or(stale)?;
        *slot = value.into();
        Ok(())
    }

    pub fn new_closure(
        &mut self,
        chunk: Rc<Chunk>,
        upvals: Vec<UpvalRef>,
    ) -> Result<ClosureRef, HeapError> {
        if upvals.len() > MAX_UPVALUES {
            return Err(HeapError::TooManyUpvalues {
                count: upvals.len(),
                max: MAX_UPVALUES,
            });
        }
        if let Some(stale) = upvals.iter().find(|u| self.upval(**u).is_none()) {
            return Err(HeapError::StaleHandle {
                kind: "upvalue",
                index: stale.index,
            });
        }
        let index = next_index(self.closures.len(), "closure")?;
        self.closures.push(Closure { chunk, upvals });
        Ok(ClosureRef::new(self.id, index))
    }

    pub fn closure(&self, f: ClosureRef) -> Option<&Closure> {
        if f.heap != self.id {
            return None;
        }
        self.closures.get(f.index as usize)
    }

    pub fn new_foreign(&mut self, type_name: impl Into<String>) -> Result<ForeignRef, HeapError> {
        let index = next_index(self.foreign.len(), "foreign")?;
        self.foreign.push(type_name.into());
        Ok(ForeignRef::new(self.id, index))
    }

    pub fn foreign_type(&self, u: ForeignRef) -> Option<&str> {
        if u.heap != self.id {
            return None;
        }
        self.foreign.get(u.index as usize).map(String::as_str)
    }
}

fn next_index(len: usize, kind: &'static str) -> Result<u32, HeapError> {
    u32::try_from(len).map_err(|_| HeapError::ArenaFull { kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_keys_collapse_to_integers() {
        let mut heap = Heap::new();
        let t = heap.new_table().unwrap();
        heap.set(t, 1i64, "int").unwrap();
        heap.set(t, 1.0f64, "float").unwrap();
        heap.set(t, -0.0f64, "zero").unwrap();

        let table = heap.table(t).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&TableKey::Int(1)), Some(&Value::from("float")));
        assert_eq!(table.get(&TableKey::Int(0)), Some(&Value::from("zero")));
    }

    #[test]
    fn non_integral_floats_stay_floats() {
        assert_eq!(
            TableKey::from_value(Value::Float(0.5)).unwrap(),
            TableKey::Float(0.5f64.to_bits())
        );
        assert_eq!(
            TableKey::from_value(Value::Float(1e300)).unwrap(),
            TableKey::Float(1e300f64.to_bits())
        );
        assert_eq!(
            TableKey::from_value(Value::Float(f64::INFINITY)).unwrap(),
            TableKey::Float(f64::INFINITY.to_bits())
        );
    }

    #[test]
    fn nil_and_nan_keys_are_rejected() {
        let mut heap = Heap::new();
        let t = heap.new_table().unwrap();
        assert_eq!(heap.set(t, Value::Nil, 1i64), Err(HeapError::NilKey));
        assert_eq!(heap.set(t, f64::NAN, 1i64), Err(HeapError::NanKey));
    }

    #[test]
    fn assigning_nil_removes_entry() {
        let mut heap = Heap::new();
        let t = heap.new_table().unwrap();
        heap.set(t, "k", 1i64).unwrap();
        heap.set(t, "k", Value::Nil).unwrap();
        assert!(heap.table(t).unwrap().is_empty());
    }

    #[test]
    fn distinct_empty_tables_have_distinct_handles() {
        let mut heap = Heap::new();
        let a = heap.new_table().unwrap();
        let b = heap.new_table().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn closure_upvalue_limit_is_enforced() {
        let mut heap = Heap::new();
        let u = heap.new_upval(Value::Nil).unwrap();
        let ok = heap.new_closure(Chunk::new(b"x".to_vec()), vec![u; MAX_UPVALUES]);
        assert!(ok.is_ok());

        let err = heap
            .new_closure(Chunk::new(b"x".to_vec()), vec![u; MAX_UPVALUES + 1])
            .unwrap_err();
        assert_eq!(
            err,
            HeapError::TooManyUpvalues {
                count: 256,
                max: 255
            }
        );
    }

    #[test]
    fn closure_rejects_foreign_upvalue_handles() {
        let mut heap = Heap::new();
        let dangling = UpvalRef::new(heap.id, 3);
        let err = heap
            .new_closure(Chunk::new(Vec::new()), vec![dangling])
            .unwrap_err();
        assert_eq!(
            err,
            HeapError::StaleHandle {
                kind: "upvalue",
                index: 3
            }
        );
    }

    #[test]
    fn handles_do_not_resolve_on_another_heap() {
        let mut a = Heap::new();
        let mut b = Heap::new();
        let ta = a.new_table().unwrap();
        let tb = b.new_table().unwrap();
        let ua = a.new_upval(1i64).unwrap();
        let fa = a.new_closure(Chunk::new(Vec::new()), Vec::new()).unwrap();
        let xa = a.new_foreign("thread").unwrap();
        assert_eq!(ta.index(), tb.index());

        assert!(b.table(ta).is_none());
        assert!(b.upval(ua).is_none());
        assert!(b.closure(fa).is_none());
        assert!(b.foreign_type(xa).is_none());
        assert_eq!(
            b.set(ta, "k", 1i64),
            Err(HeapError::StaleHandle {
                kind: "table",
                index: 0
            })
        );
        assert!(b.set_upval(ua, 2i64).is_err());
        assert!(b.new_closure(Chunk::new(Vec::new()), vec![ua]).is_err());
        assert!(a.table(ta).is_some());
    }

    #[test]
    fn arena_index_overflow_is_an_error() {
        assert_eq!(next_index(0, "table"), Ok(0));
        assert_eq!(next_index(u32::MAX as usize, "table"), Ok(u32::MAX));
        if let Some(past) = (u32::MAX as usize).checked_add(1) {
            assert_eq!(
                next_index(past, "closure"),
                Err(HeapError::ArenaFull { kind: "closure" })
            );
        }
    }
}
