//! The channel registry: a fixed-capacity slot arena with O(1) id
//! lookup. All per-channel state (value, config, workspace) lives in
//! the slot row.

use crate::channel::{
    self, Channel, ChannelFlags, ChannelId, ChannelKind, CH_REF_NONE, ID_SPACE, SYS_CONST_ONE,
    SYS_CONST_ZERO,
};
use crate::config::ChannelConfig;
use crate::engine::Workspace;
use crate::ChannelName;

/// Most channels the registry can hold.
pub const MAX_CHANNELS: usize = 256;

const NO_SLOT: u16 = u16::MAX;

/// One registry row.
pub struct Slot {
    pub channel: Channel,
    pub config: ChannelConfig,
    pub workspace: Workspace,
}

/// Registration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    DuplicateId,
    Full,
    InvalidId,
}

impl core::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Self::DuplicateId => write!(f, "duplicate channel id"),
            Self::Full => write!(f, "registry full"),
            Self::InvalidId => write!(f, "invalid channel id"),
        }
    }
}

/// O(1) population counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegistryStats {
    pub total: u16,
    pub inputs: u16,
    pub outputs: u16,
    pub physical: u16,
    pub virtuals: u16,
}

pub struct Registry {
    slots: [Option<Slot>; MAX_CHANNELS],
    index: [u16; ID_SPACE],
    len: usize,
    stats: RegistryStats,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            index: [NO_SLOT; ID_SPACE],
            len: 0,
            stats: RegistryStats::default(),
        }
    }

    /// An empty registry pre-populated with the built-in system
    /// channels.
    pub fn with_system_channels() -> Self {
        let mut reg = Self::new();

        let system = [
            (channel::SYS_BATTERY_MV, "battery voltage", 0),
            (channel::SYS_TOTAL_CURRENT_MA, "total current", 0),
            (channel::SYS_MCU_TEMP, "mcu temperature", 0),
            (channel::SYS_BOARD_TEMP1, "board temperature 1", 0),
            (channel::SYS_BOARD_TEMP2, "board temperature 2", 0),
            (channel::SYS_UPTIME_S, "uptime", 0),
            (channel::SYS_STATUS, "status", 0),
            (SYS_CONST_ZERO, "zero", 0),
            (SYS_CONST_ONE, "one", 1),
        ];

        for (id, name, value) in system {
            let mut ch = Channel::new(id, ChannelKind::System);
            ch.flags = ChannelFlags::ENABLED | ChannelFlags::BUILTIN | ChannelFlags::READ_ONLY;
            // names are static and in bounds
            if let Ok(n) = ChannelName::new_from_str(name) {
                ch.name = n;
            }
            ch.value = value;
            ch.default_value = value;
            // full registry at construction time is impossible
            let _ = reg.register(ch, ChannelConfig::System);
        }

        reg
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    fn stats_apply(&mut self, kind: ChannelKind, add: bool) {
        let d: i32 = if add { 1 } else { -1 };
        let bump = |v: &mut u16| *v = (*v as i32 + d) as u16;

        bump(&mut self.stats.total);
        if kind.is_input() {
            bump(&mut self.stats.inputs);
            bump(&mut self.stats.physical);
        } else if kind.is_output() {
            bump(&mut self.stats.outputs);
            bump(&mut self.stats.physical);
        } else if kind.is_computed() {
            bump(&mut self.stats.virtuals);
        }
    }

    /// Register a channel. Fails on a duplicate or invalid id, or a
    /// full registry.
    pub fn register(
        &mut self,
        channel: Channel,
        config: ChannelConfig,
    ) -> Result<(), RegistryError> {
        if !channel::is_valid_id(channel.id) {
            return Err(RegistryError::InvalidId);
        }
        if self.index[channel.id as usize] != NO_SLOT {
            return Err(RegistryError::DuplicateId);
        }
        if self.len >= MAX_CHANNELS {
            return Err(RegistryError::Full);
        }

        let kind = channel.kind;
        let workspace = Workspace::for_config(&config);
        self.index[channel.id as usize] = self.len as u16;
        self.slots[self.len] = Some(Slot {
            channel,
            config,
            workspace,
        });
        self.len += 1;
        self.stats_apply(kind, true);
        Ok(())
    }

    /// Remove a channel, preserving the registration order of the
    /// rest.
    pub fn remove(&mut self, id: ChannelId) -> bool {
        let Some(at) = self.slot_index(id) else {
            return false;
        };

        if let Some(slot) = self.slots[at].take() {
            self.stats_apply(slot.channel.kind, false);
        }
        self.index[id as usize] = NO_SLOT;

        // compact to keep pass order = registration order
        for i in at..self.len - 1 {
            self.slots[i] = self.slots[i + 1].take();
            if let Some(slot) = &self.slots[i] {
                self.index[slot.channel.id as usize] = i as u16;
            }
        }
        self.len -= 1;
        true
    }

    /// Remove every channel that did not come from the built-in set.
    pub fn clear_configured(&mut self) {
        let mut keep = 0;
        for i in 0..self.len {
            let Some(slot) = self.slots[i].take() else {
                continue;
            };
            if slot.channel.flags.contains(ChannelFlags::BUILTIN) {
                self.index[slot.channel.id as usize] = keep as u16;
                self.slots[keep] = Some(slot);
                keep += 1;
            } else {
                self.index[slot.channel.id as usize] = NO_SLOT;
                self.stats_apply(slot.channel.kind, false);
            }
        }
        self.len = keep;
    }

    fn slot_index(&self, id: ChannelId) -> Option<usize> {
        if id == CH_REF_NONE || (id as usize) >= ID_SPACE {
            return None;
        }
        let at = self.index[id as usize];
        if at == NO_SLOT {
            None
        } else {
            Some(at as usize)
        }
    }

    pub fn get(&self, id: ChannelId) -> Option<&Slot> {
        self.slot_index(id).and_then(|i| self.slots[i].as_ref())
    }

    pub fn get_mut(&mut self, id: ChannelId) -> Option<&mut Slot> {
        let i = self.slot_index(id)?;
        self.slots[i].as_mut()
    }

    /// The current value of a channel. Unknown, disabled, and
    /// unreferenced channels read as zero.
    pub fn get_value(&self, id: ChannelId) -> i32 {
        match self.get(id) {
            Some(slot) if slot.channel.is_enabled() => slot.channel.value,
            _ => 0,
        }
    }

    /// Store a value, for outputs and external force writes.
    pub fn set_value(&mut self, id: ChannelId, value: i32) -> bool {
        match self.get_mut(id) {
            Some(slot) => {
                slot.channel.set_value(value);
                true
            }
            None => false,
        }
    }

    /// Reflect a sampled hardware value on an input or system channel.
    pub fn update_value(&mut self, id: ChannelId, value: i32) -> bool {
        self.set_value(id, value)
    }

    pub fn find_by_name(&self, name: &str) -> Option<ChannelId> {
        self.iter()
            .find(|slot| slot.channel.name.as_str() == Ok(name))
            .map(|slot| slot.channel.id)
    }

    /// Fill `out` with registered ids in registration order.
    pub fn list(&self, out: &mut [ChannelId]) -> usize {
        let mut n = 0;
        for slot in self.iter() {
            if n >= out.len() {
                break;
            }
            out[n] = slot.channel.id;
            n += 1;
        }
        n
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots[..self.len].iter().filter_map(|s| s.as_ref())
    }

    pub(crate) fn slot_at(&self, at: usize) -> Option<&Slot> {
        self.slots.get(at)?.as_ref()
    }

    pub(crate) fn slot_at_mut(&mut self, at: usize) -> Option<&mut Slot> {
        self.slots.get_mut(at)?.as_mut()
    }

    /// Reset every per-channel workspace and restore default values.
    pub fn reset_runtime(&mut self) {
        for i in 0..self.len {
            if let Some(slot) = self.slots[i].as_mut() {
                slot.workspace.reset(&slot.config);
                slot.channel.value = slot.channel.default_value;
                slot.channel.prev_value = slot.channel.default_value;
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
