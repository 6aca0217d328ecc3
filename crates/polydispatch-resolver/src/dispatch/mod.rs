//! Dispatch tables.
//!
//! Every concrete type owns one [`VirtualTable`] and one
//! [`InterfaceSlotTable`] per interface it conforms to. Virtual calls index the
//! receiver's VMT; interface calls go through the receiver's interface table,
//! whose entries point at VMT slots (double indirection) or directly at a
//! non-virtual implementation.
//!
//! Tables are immutable once built and safe to share across threads.

mod builder;

pub use builder::{build_dispatch_tables, slot_introducer};

use std::sync::Arc;

use polydispatch_core::TypeHash;
use rustc_hash::FxHashMap;

/// One entry of a virtual slot table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSlot {
    /// Owner-free `(name, parameter types)` key.
    pub key: TypeHash,
    /// The `Virtual` member that introduced this slot.
    pub introduced_by: TypeHash,
    /// The currently winning implementation.
    pub implementation: TypeHash,
    /// The type declaring the winning implementation.
    pub implementing_type: TypeHash,
}

/// Virtual slot table of one concrete type.
///
/// Slots are only appended or overwritten in place, so a derived type's table
/// is never shorter than its base's and slot indices are stable down the
/// hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualTable {
    slots: Vec<VirtualSlot>,
    by_introducer: FxHashMap<TypeHash, usize>,
    latest_by_key: FxHashMap<TypeHash, usize>,
}

impl VirtualTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot for a newly introduced virtual member.
    pub fn introduce(&mut self, key: TypeHash, member: TypeHash, declaring: TypeHash) -> usize {
        let index = self.slots.len();
        self.slots.push(VirtualSlot {
            key,
            introduced_by: member,
            implementation: member,
            implementing_type: declaring,
        });
        self.by_introducer.insert(member, index);
        self.latest_by_key.insert(key, index);
        index
    }

    /// Replace the implementation of the nearest slot for `key`.
    ///
    /// Returns the slot index, or `None` if no slot exists for the key.
    pub fn override_slot(
        &mut self,
        key: TypeHash,
        member: TypeHash,
        declaring: TypeHash,
    ) -> Option<usize> {
        let index = *self.latest_by_key.get(&key)?;
        let slot = self.slots.get_mut(index)?;
        slot.implementation = member;
        slot.implementing_type = declaring;
        Some(index)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in index order.
    pub fn slots(&self) -> &[VirtualSlot] {
        &self.slots
    }

    /// Get a slot by index.
    pub fn slot(&self, index: usize) -> Option<&VirtualSlot> {
        self.slots.get(index)
    }

    /// Index of the slot introduced by a member.
    pub fn index_of(&self, introducer: TypeHash) -> Option<usize> {
        self.by_introducer.get(&introducer).copied()
    }

    /// Index of the most recently introduced slot for a key.
    pub fn latest_for_key(&self, key: TypeHash) -> Option<usize> {
        self.latest_by_key.get(&key).copied()
    }

    /// Winning implementation of the slot introduced by a member.
    pub fn implementation(&self, introducer: TypeHash) -> Option<TypeHash> {
        self.index_of(introducer)
            .and_then(|i| self.slots.get(i))
            .map(|s| s.implementation)
    }
}

/// Target of an interface table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceSlot {
    /// Index into the receiver's virtual slot table.
    Virtual(usize),
    /// A non-virtual implementation.
    Direct(TypeHash),
}

/// Interface slot table of one `(concrete type, interface)` pair.
///
/// Equality is structural (interface and entries); two types resolving an
/// interface identically have equal tables even though each owns its own.
#[derive(Debug, Clone)]
pub struct InterfaceSlotTable {
    /// The interface.
    pub interface: TypeHash,
    /// The hierarchy level whose conformance record produced the entries.
    pub declared_at: TypeHash,
    entries: FxHashMap<TypeHash, InterfaceSlot>,
}

impl PartialEq for InterfaceSlotTable {
    fn eq(&self, other: &Self) -> bool {
        self.interface == other.interface && self.entries == other.entries
    }
}

impl Eq for InterfaceSlotTable {}

impl InterfaceSlotTable {
    /// Create an empty table.
    pub fn new(interface: TypeHash, declared_at: TypeHash) -> Self {
        Self {
            interface,
            declared_at,
            entries: FxHashMap::default(),
        }
    }

    /// Map an interface member to a slot.
    pub fn insert(&mut self, interface_member: TypeHash, slot: InterfaceSlot) {
        self.entries.insert(interface_member, slot);
    }

    /// Entry for an interface member.
    pub fn get(&self, interface_member: TypeHash) -> Option<InterfaceSlot> {
        self.entries.get(&interface_member).copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(interface member, slot)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (TypeHash, InterfaceSlot)> + '_ {
        self.entries.iter().map(|(&k, &v)| (k, v))
    }

    /// Follow an entry to its implementation through `vmt`.
    pub fn resolve(&self, interface_member: TypeHash, vmt: &VirtualTable) -> Option<TypeHash> {
        match self.get(interface_member)? {
            InterfaceSlot::Virtual(index) => vmt.slot(index).map(|s| s.implementation),
            InterfaceSlot::Direct(member) => Some(member),
        }
    }
}

/// All dispatch tables of one concrete type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTables {
    /// The concrete type.
    pub type_hash: TypeHash,
    /// Virtual slot table.
    pub vmt: VirtualTable,
    /// Interface slot tables by interface.
    pub interfaces: FxHashMap<TypeHash, Arc<InterfaceSlotTable>>,
}

impl DispatchTables {
    /// Interface table for an interface this type conforms to.
    pub fn interface_table(&self, interface: TypeHash) -> Option<&Arc<InterfaceSlotTable>> {
        self.interfaces.get(&interface)
    }

    /// Implementation reached through the slot introduced by `introducer`.
    pub fn resolve_virtual(&self, introducer: TypeHash) -> Option<TypeHash> {
        self.vmt.implementation(introducer)
    }

    /// Implementation reached through an interface member.
    pub fn resolve_interface(&self, interface: TypeHash, member: TypeHash) -> Option<TypeHash> {
        self.interfaces.get(&interface)?.resolve(member, &self.vmt)
    }
}
