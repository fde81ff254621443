use core::ops::RangeInclusive;

/// Canopen Function code prefixes on COB_ID
pub(crate) const COB_FUNC_NMT: u16 = 0x000;
pub(crate) const COB_FUNC_NMT_ERROR_CONTROL: u16 = 0x700;

/// CANOPEN Registers
pub(crate) const REG_RPDO_COMMUNICATION: u16 = 0x1400;
pub(crate) const REG_RPDO_MAPPING: u16 = 0x1600;
pub(crate) const RPDO_SUB_COB_ID: u8 = 1;
pub(crate) const RPDO_SUB_TRANSMISSION_TYPE: u8 = 2;

pub(crate) const COMMUNICATION_REGISTERS_RANGE: RangeInclusive<u16> = 0x1000..=0x1FFF;
pub(crate) const APPLICATION_REGISTERS_RANGE: RangeInclusive<u16> = 0x2000..=0x9FFF;

/// PDO limits
pub const MAX_RPDO_SLOTS: usize = 512;
pub(crate) const MAX_PDO_PAYLOAD_BYTES: usize = 8;
pub(crate) const MAX_PDO_MAPPED_SIGNALS: u8 = 8;
pub(crate) const MAX_SYNC_TRANSMISSION_TYPE: u8 = 240;

/// Dummy mapping indices, keyed by the byte width they reserve.
pub(crate) const DUMMY_BYTE_INDICES: [u16; 2] = [0x0002, 0x0005];
pub(crate) const DUMMY_WORD_INDICES: [u16; 2] = [0x0003, 0x0006];
pub(crate) const DUMMY_LONG_INDICES: [u16; 2] = [0x0004, 0x0007];

/// NMT
pub(crate) const NMT_BROADCAST_NODE_ID: u8 = 0;
pub(crate) const MAX_NODE_ID: u8 = 127;
pub(crate) const BOOT_UP_PAYLOAD: u8 = 0;

/// Misc
pub(crate) const DEFAULT_RPDO_SLOTS: usize = 4;
pub(crate) const DEFAULT_LOCK_TIMEOUT_MS: u32 = 10;
