//! Identity registries scoped to a single encode call.

use std::collections::HashMap;

use crate::value::{ClosureRef, TableRef, UpvalRef};

/// An object that receives a reference id when first encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjId {
    Table(TableRef),
    Closure(ClosureRef),
}

/// Assigns ids to tables and closures in first-encounter order.
#[derive(Debug, Default)]
pub struct RefRegistry {
    ids: HashMap<ObjId, u64>,
    next_id: u64,
}

impl RefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the object's id and whether it was assigned by this call.
    pub fn intern(&mut self, obj: ObjId) -> (u64, bool) {
        if let Some(&id) = self.ids.get(&obj) {
            return (id, false);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(obj, id);
        tracing::trace!(?obj, id, "interned");
        (id, true)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.ids.len()
    }
}

/// The closure slot that first encoded a captured variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpvalOwner {
    pub closure_id: u64,
    pub slot: u16,
}

/// Tracks which closure slot owns each captured variable.
#[derive(Debug, Default)]
pub struct UpvalRegistry {
    owner_ids: HashMap<UpvalRef, u64>,
    owner_slots: HashMap<UpvalRef, u16>,
}

impl UpvalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `upval` for `(closure_id, slot)` unless already claimed.
    ///
    /// Returns the earlier owner when the variable was claimed before; the
    /// registry is left unchanged in that case.
    pub fn claim(&mut self, upval: UpvalRef, closure_id: u64, slot: u16) -> Option<UpvalOwner> {
        if let (Some(&owner_id), Some(&owner_slot)) =
            (self.owner_ids.get(&upval), self.owner_slots.get(&upval))
        {
            return Some(UpvalOwner {
                closure_id: owner_id,
                slot: owner_slot,
            });
        }
        self.owner_ids.insert(upval, closure_id);
        self.owner_slots.insert(upval, slot);
        tracing::trace!(upval = upval.index(), closure_id, slot, "claimed upvalue");
        None
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.owner_ids.len()
    }
}
