use bitfield_struct::bitfield;
use embedded_can::{nb::Can, Frame};

use crate::constant::{
    DUMMY_BYTE_INDICES, DUMMY_LONG_INDICES, DUMMY_WORD_INDICES, MAX_PDO_MAPPED_SIGNALS,
    MAX_PDO_PAYLOAD_BYTES, MAX_SYNC_TRANSMISSION_TYPE, REG_RPDO_COMMUNICATION, REG_RPDO_MAPPING,
    RPDO_SUB_COB_ID, RPDO_SUB_TRANSMISSION_TYPE,
};
use crate::data_type::ObjectWidth;
use crate::diagnostics::FailureEvent;
use crate::error::ErrorCode;
use crate::lock::ObjectLockGuard;
use crate::node::Node;
use crate::object_directory::ObjectRef;
use crate::prelude::*;
use crate::services::Services;
use crate::{debug, info, warn};

/// Sub-index 1 of an RPDO communication record.
#[bitfield(u32)]
pub struct RpdoCobId {
    #[bits(29)]
    pub can_id: u32,
    pub extended: bool,
    /// Must be set: remote frames are not accepted on a receive PDO.
    pub no_rtr: bool,
    pub invalid: bool,
}

/// One sub-entry of an RPDO mapping record.
#[bitfield(u32)]
pub struct PdoMapping {
    #[bits(8)]
    pub bit_length: u8,
    #[bits(8)]
    pub sub_index: u8,
    #[bits(16)]
    pub index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Never configured, or its configuration was rejected.
    Unconfigured,
    /// Configured with the invalid bit set in its COB-ID.
    Disabled,
    Enabled { message_id: u32, synchronous: bool },
}

/// One step of the decode walk. Dummy mappings expand into one `Padding`
/// per byte they cover; every real object is a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappedEntry {
    Object { obj: ObjectRef, width: ObjectWidth },
    Padding,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpdoSlot {
    state: SlotState,
    transmission_type: u8,
    entries: Vec<MappedEntry>,
}

impl RpdoSlot {
    fn new() -> Self {
        RpdoSlot {
            state: SlotState::Unconfigured,
            transmission_type: 0,
            entries: Vec::new(),
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn transmission_type(&self) -> u8 {
        self.transmission_type
    }

    pub fn entries(&self) -> &[MappedEntry] {
        &self.entries
    }

    pub fn message_id(&self) -> Option<u32> {
        match self.state {
            SlotState::Enabled { message_id, .. } => Some(message_id),
            _ => None,
        }
    }

    pub fn is_synchronous(&self) -> bool {
        matches!(self.state, SlotState::Enabled { synchronous: true, .. })
    }

    fn clear(&mut self) {
        *self = RpdoSlot::new();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpdoTable {
    slots: Vec<RpdoSlot>,
}

impl RpdoTable {
    pub fn new(count: usize) -> Self {
        RpdoTable { slots: vec![RpdoSlot::new(); count] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&RpdoSlot> {
        self.slots.get(index)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(RpdoSlot::clear);
    }

    /// First enabled slot listening on `message_id`.
    pub fn match_frame(&self, message_id: u32) -> Option<usize> {
        self.slots.iter().position(|slot| slot.message_id() == Some(message_id))
    }

    fn slot_mut(&mut self, index: usize) -> Result<&mut RpdoSlot, ErrorCode> {
        self.slots.get_mut(index).ok_or_else(|| ErrorCode::invalid_argument("no such rpdo slot"))
    }
}

fn dummy_bytes(index: u16) -> Option<usize> {
    if DUMMY_BYTE_INDICES.contains(&index) {
        Some(1)
    } else if DUMMY_WORD_INDICES.contains(&index) {
        Some(2)
    } else if DUMMY_LONG_INDICES.contains(&index) {
        Some(4)
    } else {
        None
    }
}

fn is_synchronous_type(transmission_type: u8) -> bool {
    transmission_type <= MAX_SYNC_TRANSMISSION_TYPE
}

impl<CAN, S> Node<CAN, S> where CAN: Can, CAN::Frame: Frame + Debug, S: Services {
    /// Rebuild every slot that has a communication record in the dictionary.
    ///
    /// A broken slot does not stop the others from being configured; the
    /// first error is returned once all slots were visited.
    pub fn init_rpdo(&mut self) -> Result<(), ErrorCode> {
        self.clear_rpdo();
        let mut first_err = None;
        for index in 0..self.rpdos.len() {
            let comm = REG_RPDO_COMMUNICATION + index as u16;
            if self.object_directory.find(comm, RPDO_SUB_COB_ID).is_err() {
                continue;
            }
            if let Err(err) = self.reset_rpdo_slot(index) {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Slot whose communication or mapping record lives at `index`.
    pub(crate) fn rpdo_slot_of(&self, index: u16) -> Option<usize> {
        let count = self.rpdos.len();
        [REG_RPDO_COMMUNICATION, REG_RPDO_MAPPING].iter().find_map(|base| {
            let slot = index.checked_sub(*base)? as usize;
            (slot < count).then_some(slot)
        })
    }

    pub(crate) fn clear_rpdo(&mut self) {
        for index in 0..self.rpdos.len() {
            self.release_rpdo_slot(index);
        }
        self.rpdos.clear();
    }

    fn release_rpdo_slot(&mut self, index: usize) {
        if let Some(slot) = self.rpdos.slots.get_mut(index) {
            if slot.is_synchronous() {
                self.services.sync_remove_rpdo(index);
            }
            slot.clear();
        }
    }

    /// Re-read the communication and mapping records of one slot.
    pub fn reset_rpdo_slot(&mut self, index: usize) -> Result<(), ErrorCode> {
        let result = self.configure_rpdo_slot(index);
        if let Err(err) = &result {
            self.report(FailureEvent::RpdoConfig, err);
        }
        result
    }

    fn configure_rpdo_slot(&mut self, index: usize) -> Result<(), ErrorCode> {
        self.rpdos.slot_mut(index)?;
        self.release_rpdo_slot(index);

        let comm = REG_RPDO_COMMUNICATION + index as u16;
        let transmission_type = self.object_directory.read_u8(comm, RPDO_SUB_TRANSMISSION_TYPE)?;
        let synchronous = is_synchronous_type(transmission_type);
        if synchronous && !cfg!(feature = "sync") {
            debug!("rpdo {} is synchronous, SYNC support is not built in", index);
            return Ok(());
        }

        let cob_id = RpdoCobId::from(self.object_directory.read_u32(comm, RPDO_SUB_COB_ID)?);
        if !cob_id.no_rtr() {
            warn!("rpdo {} left unconfigured: COB-ID {:#x} allows RTR", index, u32::from(cob_id));
            return Ok(());
        }
        if cob_id.extended() {
            warn!("rpdo {} left unconfigured: extended COB-ID {:#x}", index, u32::from(cob_id));
            return Ok(());
        }

        let state = if cob_id.invalid() {
            SlotState::Disabled
        } else {
            SlotState::Enabled { message_id: cob_id.can_id(), synchronous }
        };
        let slot = self.rpdos.slot_mut(index)?;
        slot.state = state;
        slot.transmission_type = transmission_type;

        if let Err(cause) = self.resolve_rpdo_mapping(index) {
            self.rpdos.slot_mut(index)?.clear();
            return Err(ErrorCode::MappingInvalid { slot: index, cause: Box::new(cause) });
        }

        if let SlotState::Enabled { synchronous: true, .. } = state {
            self.services.sync_add_rpdo(index, transmission_type);
        }
        info!("rpdo {} configured: {:?}", index, state);
        Ok(())
    }

    /// Resolve the mapping record of a slot into its entry list.
    ///
    /// The entry list is only replaced when the whole record resolves.
    pub fn resolve_rpdo_mapping(&mut self, index: usize) -> Result<(), ErrorCode> {
        self.rpdos.slot_mut(index)?;
        let map = REG_RPDO_MAPPING + index as u16;
        let count = self.object_directory.read_u8(map, 0)?;
        if count > MAX_PDO_MAPPED_SIGNALS {
            return Err(ErrorCode::invalid_argument("more than 8 mapped signals"));
        }

        let mut entries = Vec::new();
        let mut total_bytes = 0usize;
        for sub in 1..=count {
            let mapping = PdoMapping::from(self.object_directory.read_u32(map, sub)?);
            // Lengths that are not whole bytes are counted by their whole bytes.
            total_bytes += (mapping.bit_length() / 8) as usize;
            if total_bytes > MAX_PDO_PAYLOAD_BYTES {
                return Err(ErrorCode::InvalidSize { bytes: total_bytes });
            }
            match dummy_bytes(mapping.index()) {
                Some(n) => entries.extend(core::iter::repeat(MappedEntry::Padding).take(n)),
                None => {
                    let obj = self.object_directory.find(mapping.index(), mapping.sub_index())?;
                    let width = self.object_directory.width(obj)?;
                    entries.push(MappedEntry::Object { obj, width });
                }
            }
        }

        self.rpdos.slot_mut(index)?.entries = entries;
        Ok(())
    }

    /// Route a frame that matched slot `index`.
    pub fn on_rpdo_frame(&mut self, index: usize, frame: &CAN::Frame) {
        let synchronous = match self.rpdos.slot(index) {
            Some(slot) => slot.is_synchronous(),
            None => return,
        };
        if synchronous {
            self.services.sync_receive_rpdo(index, frame.data());
            return;
        }
        if let Some(intercept) = self.rpdo_intercept.as_mut() {
            if intercept(self.node_id, frame) {
                debug!("rpdo {} taken by the intercept hook", index);
                return;
            }
        }
        if let Err(err) = self.decode_rpdo(index, frame.data()) {
            self.report(FailureEvent::RpdoDecode, &err);
        }
    }

    /// Write the payload of slot `index` into the dictionary.
    ///
    /// Widths are looked up again for every frame. A write that fails is
    /// counted and the walk moves on; a lock that cannot be taken or an
    /// object that no longer fits in the frame stops the walk.
    pub fn decode_rpdo(&mut self, index: usize, data: &[u8]) -> Result<(), ErrorCode> {
        let count = self.rpdos.slot_mut(index)?.entries.len();
        let mut payload = [0u8; MAX_PDO_PAYLOAD_BYTES];
        let len = data.len().min(MAX_PDO_PAYLOAD_BYTES);
        payload[..len].copy_from_slice(&data[..len]);

        let mut offset = 0usize;
        for position in 0..count {
            let entry = match self.rpdos.slots[index].entries.get(position) {
                Some(entry) => *entry,
                None => break,
            };
            let obj = match entry {
                MappedEntry::Padding => {
                    offset += 1;
                    continue;
                }
                MappedEntry::Object { obj, .. } => obj,
            };
            let width = self.object_directory.width(obj)?.bytes();
            if offset + width > MAX_PDO_PAYLOAD_BYTES {
                return Err(ErrorCode::InvalidSize { bytes: offset + width });
            }
            let mut raw = [0u8; 4];
            raw[..width].copy_from_slice(&payload[offset..offset + width]);
            offset += width;

            let written = {
                let _guard = if self.object_directory.is_read_only(obj) {
                    None
                } else {
                    Some(ObjectLockGuard::acquire(&*self.object_lock, self.config.lock_timeout_ms)?)
                };
                self.object_directory.write(obj, u32::from_le_bytes(raw), self.node_id)
            };
            if let Err(err) = written {
                self.report(FailureEvent::RpdoWrite, &err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cob_id_bits() {
        let cob_id = RpdoCobId::from(0x4000_0205);
        assert_eq!(cob_id.can_id(), 0x205);
        assert!(cob_id.no_rtr());
        assert!(!cob_id.extended());
        assert!(!cob_id.invalid());

        let cob_id = RpdoCobId::from(0xE000_0181);
        assert!(cob_id.invalid());
        assert!(cob_id.extended());
        assert_eq!(cob_id.can_id(), 0x181);
    }

    #[test]
    fn test_mapping_word_layout() {
        let mapping = PdoMapping::from(0x6000_0110);
        assert_eq!(mapping.index(), 0x6000);
        assert_eq!(mapping.sub_index(), 0x01);
        assert_eq!(mapping.bit_length(), 16);
    }

    #[test]
    fn test_dummy_indices() {
        assert_eq!(dummy_bytes(0x0002), Some(1));
        assert_eq!(dummy_bytes(0x0006), Some(2));
        assert_eq!(dummy_bytes(0x0004), Some(4));
        assert_eq!(dummy_bytes(0x0001), None);
        assert_eq!(dummy_bytes(0x6000), None);
    }

    #[test]
    fn test_match_frame_skips_disabled() {
        let mut table = RpdoTable::new(3);
        table.slots[0].state = SlotState::Disabled;
        table.slots[1].state = SlotState::Enabled { message_id: 0x205, synchronous: false };
        table.slots[2].state = SlotState::Enabled { message_id: 0x205, synchronous: true };
        assert_eq!(table.match_frame(0x205), Some(1));
        assert_eq!(table.match_frame(0x206), None);

        table.clear();
        assert_eq!(table.match_frame(0x205), None);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_record_indices_to_slots() {
        let node = crate::node::tests::node_with_slots(4);
        assert_eq!(node.rpdo_slot_of(0x1400), Some(0));
        assert_eq!(node.rpdo_slot_of(0x1403), Some(3));
        assert_eq!(node.rpdo_slot_of(0x1404), None);
        assert_eq!(node.rpdo_slot_of(0x1602), Some(2));
        assert_eq!(node.rpdo_slot_of(0x1604), None);
        assert_eq!(node.rpdo_slot_of(0x13FF), None);
        assert_eq!(node.rpdo_slot_of(0x2000), None);
    }

    #[test]
    fn test_synchronous_range() {
        assert!(is_synchronous_type(0));
        assert!(is_synchronous_type(240));
        assert!(!is_synchronous_type(241));
        assert!(!is_synchronous_type(255));
    }
}
