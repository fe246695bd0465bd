use crate::id::ItemId;
use crate::registry::SlotSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Name under which every machine exposes its single output slot.
pub const OUTPUT_SLOT: &str = "output";

/// A typed item-holding compartment: holds at most one item type, up to
/// `capacity` units.
///
/// Invariants, upheld by every method:
/// - `amount == 0` iff `item` is `None`
/// - `amount <= capacity`
/// - a held item is a member of `accepts` (when the slot restricts inputs)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    item: Option<ItemId>,
    amount: u32,
    capacity: u32,
    /// `None` means unrestricted (output slots, filled by production only).
    accepts: Option<BTreeSet<ItemId>>,
}

impl Slot {
    /// An input slot restricted to the given items.
    pub fn input(capacity: u32, accepts: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            item: None,
            amount: 0,
            capacity,
            accepts: Some(accepts.into_iter().collect()),
        }
    }

    /// An unrestricted output slot.
    pub fn output(capacity: u32) -> Self {
        Self {
            item: None,
            amount: 0,
            capacity,
            accepts: None,
        }
    }

    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }

    pub fn is_full(&self) -> bool {
        self.amount >= self.capacity
    }

    /// Whether `item` is in this slot's valid input set.
    pub fn is_valid_input(&self, item: ItemId) -> bool {
        self.accepts.as_ref().is_none_or(|set| set.contains(&item))
    }

    /// Whether one more unit of `item` fits.
    pub fn can_accept(&self, item: ItemId) -> bool {
        self.has_room_for(item, 1)
    }

    /// Whether `amount` more units of `item` fit.
    pub fn has_room_for(&self, item: ItemId, amount: u32) -> bool {
        self.is_valid_input(item)
            && self.item.is_none_or(|held| held == item)
            && self
                .amount
                .checked_add(amount)
                .is_some_and(|total| total <= self.capacity)
    }

    /// Deposit `amount` units of `item`. All or nothing: if any unit
    /// would be rejected nothing is stored. Returns the amount stored.
    #[must_use = "zero means the deposit was rejected"]
    pub fn deposit(&mut self, item: ItemId, amount: u32) -> u32 {
        if amount == 0 || !self.has_room_for(item, amount) {
            return 0;
        }
        self.item = Some(item);
        self.amount += amount;
        amount
    }

    /// Remove up to `requested` units. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn extract(&mut self, requested: u32) -> u32 {
        let taken = requested.min(self.amount);
        self.amount -= taken;
        if self.amount == 0 {
            self.item = None;
        }
        taken
    }

    /// Like [`extract`](Self::extract) but also reports the item type.
    pub fn take(&mut self, requested: u32) -> Option<(ItemId, u32)> {
        let item = self.item?;
        match self.extract(requested) {
            0 => None,
            taken => Some((item, taken)),
        }
    }

    /// Overwrite the contents (used when restoring saved state). Rejects
    /// contents that would break an invariant and leaves the slot as is.
    pub fn restore(&mut self, item: Option<ItemId>, amount: u32) -> bool {
        match item {
            None if amount == 0 => {
                self.item = None;
                self.amount = 0;
                true
            }
            Some(item) if amount > 0 && amount <= self.capacity && self.is_valid_input(item) => {
                self.item = Some(item);
                self.amount = amount;
                true
            }
            _ => false,
        }
    }
}

/// A named input slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedSlot {
    pub name: String,
    pub slot: Slot,
}

/// Inventory for one machine: zero or more named input slots (fuel, smelt,
/// ...) plus exactly one output slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInventory {
    inputs: Vec<NamedSlot>,
    output: Slot,
}

impl MachineInventory {
    pub fn new(inputs: Vec<NamedSlot>, output: Slot) -> Self {
        Self { inputs, output }
    }

    /// Build the empty inventory described by a machine kind's slot specs.
    pub fn from_specs(specs: &[SlotSpec], output_capacity: u32) -> Self {
        let inputs = specs
            .iter()
            .map(|spec| NamedSlot {
                name: spec.name.clone(),
                slot: Slot::input(spec.capacity, spec.accepts.iter().copied()),
            })
            .collect();
        Self::new(inputs, Slot::output(output_capacity))
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        if name == OUTPUT_SLOT {
            return Some(&self.output);
        }
        self.inputs.iter().find(|s| s.name == name).map(|s| &s.slot)
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        if name == OUTPUT_SLOT {
            return Some(&mut self.output);
        }
        self.inputs
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| &mut s.slot)
    }

    pub fn inputs(&self) -> &[NamedSlot] {
        &self.inputs
    }

    pub fn output(&self) -> &Slot {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut Slot {
        &mut self.output
    }

    /// `false` for unknown slot names.
    pub fn can_accept(&self, slot: &str, item: ItemId) -> bool {
        self.slot(slot).is_some_and(|s| s.can_accept(item))
    }

    /// Deposit into a named slot. Unknown slots and rejected items store
    /// nothing and return 0.
    #[must_use = "zero means the deposit was rejected"]
    pub fn deposit(&mut self, slot: &str, item: ItemId, amount: u32) -> u32 {
        self.slot_mut(slot).map_or(0, |s| s.deposit(item, amount))
    }

    /// Extract up to `amount` from a named slot.
    pub fn extract(&mut self, slot: &str, amount: u32) -> Option<(ItemId, u32)> {
        self.slot_mut(slot)?.take(amount)
    }

    /// Name of the first input slot (in declaration order) that can take
    /// one more unit of `item`.
    pub fn first_accepting_input(&self, item: ItemId) -> Option<&str> {
        self.inputs
            .iter()
            .find(|s| s.slot.can_accept(item))
            .map(|s| s.name.as_str())
    }
}
