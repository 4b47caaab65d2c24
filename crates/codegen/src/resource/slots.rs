//! Slot and location bookkeeping
//!
//! Three independent numbering spaces: interstage slots (relative to one stage interface, reset
//! whenever generation advances to the next stage), fragment output slots, and the global location
//! counter shared by every uniform and buffer declaration of one compile.

use crate::shader::ShaderStage;
use std::collections::BTreeMap;

/// Assigns interstage slots, fragment output slots and resource locations
#[derive(Debug, Clone, Default)]
pub struct SlotAllocator {
    /// Locations requested by name outside the element itself (custom bindings)
    explicit: BTreeMap<String, u32>,
    interstage: BTreeMap<String, u32>,
    next_interstage: u32,
    outputs: BTreeMap<String, u32>,
    next_output: u32,
    locations: BTreeMap<String, u32>,
    next_location: u32,
    stage: Option<ShaderStage>,
}

impl SlotAllocator {
    /// Creates an allocator resolving the given names to fixed locations
    pub fn new(explicit: BTreeMap<String, u32>) -> Self {
        Self { explicit, ..Self::default() }
    }

    /// Moves on to the next stage; interstage numbering restarts at zero
    pub fn advance_stage(&mut self, stage: ShaderStage) {
        tracing::trace!(from = ?self.stage, to = %stage, "advancing slot allocation");
        self.stage = Some(stage);
        self.next_interstage = 0;
    }

    /// Current stage, `None` before the first [`advance_stage`](Self::advance_stage)
    pub fn stage(&self) -> Option<ShaderStage> {
        self.stage
    }

    /// Resolves an explicit location: the element's own location first, then the named table
    ///
    /// # Arguments
    /// * `location` - Location carried by the element
    /// * `names` - Names the element is known by (its own name, then member names)
    pub fn explicit<'a>(&self, location: Option<u32>, names: impl IntoIterator<Item = &'a str>) -> Option<u32> {
        location.or_else(|| names.into_iter().find_map(|name| self.explicit.get(name).copied()))
    }

    /// Slot of an interstage value or block
    ///
    /// A name seen before (usually declared by the producing stage) keeps its slot; a new name
    /// reserves `count` consecutive slots at the interstage counter.
    pub fn interstage(&mut self, name: &str, count: u32) -> u32 {
        if let Some(slot) = self.interstage.get(name) {
            return *slot;
        }
        let slot = self.next_interstage;
        self.next_interstage += count;
        self.interstage.insert(name.to_string(), slot);
        tracing::trace!(resource = name, slot, count, "reserved interstage slots");
        slot
    }

    /// Slot of a fragment output, numbered globally
    pub fn output(&mut self, name: &str, count: u32) -> u32 {
        if let Some(slot) = self.outputs.get(name) {
            return *slot;
        }
        let slot = self.next_output;
        self.next_output += count;
        self.outputs.insert(name.to_string(), slot);
        tracing::trace!(resource = name, slot, count, "reserved output slots");
        slot
    }

    /// Location of a uniform or buffer without an explicit one
    ///
    /// Memoized by name so a resource visible in several stages keeps one location.
    pub fn location(&mut self, name: &str, count: u32) -> u32 {
        if let Some(location) = self.locations.get(name) {
            return *location;
        }
        let location = self.next_location;
        self.next_location += count;
        self.locations.insert(name.to_string(), location);
        tracing::trace!(resource = name, location, count, "assigned location");
        location
    }
}
