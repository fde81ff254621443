use crate::error::ErrorCode;

/// Hooks into the parts of the stack that live outside this crate.
///
/// The NMT controller drives these during resets and when entering
/// OPERATIONAL; the RPDO engine hands synchronous slots to the SYNC hooks.
/// Every method defaults to a successful no-op.
pub trait Services {
    /// (Re)build the transmit PDO table.
    fn init_tpdo(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn clear_timers(&mut self) {}

    fn init_heartbeat(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn init_sdo(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn reset_can(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn init_emergency(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn init_sync(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }

    fn sync_add_rpdo(&mut self, _slot: usize, _transmission_type: u8) {}

    fn sync_remove_rpdo(&mut self, _slot: usize) {}

    /// Buffer the payload of a synchronous slot until the next SYNC.
    fn sync_receive_rpdo(&mut self, _slot: usize, _data: &[u8]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoServices;

impl Services for NoServices {}
