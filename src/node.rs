use embedded_can::{nb::Can, Frame};

use crate::constant::{DEFAULT_LOCK_TIMEOUT_MS, DEFAULT_RPDO_SLOTS, MAX_NODE_ID, MAX_RPDO_SLOTS};
use crate::diagnostics::{FailureCounters, FailureEvent, FailureHook};
use crate::error::ErrorCode;
use crate::lock::{ObjectLock, SpinLock};
use crate::nmt::{AllowedObjects, NmtState};
use crate::object_directory::{ObjectAccess, ObjectDirectory};
use crate::prelude::*;
use crate::rpdo::RpdoTable;
use crate::services::{NoServices, Services};
use crate::util::{create_frame, get_cob_id};
use crate::{error, info};

/// Invoked with (node id, new state) after every real state change.
pub type StateHook = Box<dyn FnMut(u8, NmtState)>;

/// Run-time knobs that are not part of the object dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    /// Number of receive PDO slots, at most [`MAX_RPDO_SLOTS`].
    pub rpdo_count: usize,
    /// Bounded wait for the object lock while decoding a receive PDO.
    pub lock_timeout_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            rpdo_count: DEFAULT_RPDO_SLOTS,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

/// Outcome of [`Node::communication_object_dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// The frame was on the NMT identifier, whether or not it addressed us.
    Nmt,
    /// The frame matched the receive PDO slot with this index.
    Rpdo(usize),
    Ignored,
}

/// The implementation of Node here is not thread-safe. It is intended for
/// MCU environments: frames and NMT requests are fed in from one context,
/// and the only blocking point is the bounded object lock taken while a
/// receive PDO is written into the dictionary.
pub struct Node<CAN, S = NoServices>
    where CAN: Can, CAN::Frame: Frame + Debug, S: Services {
    pub(crate) node_id: u8,
    pub(crate) config: NodeConfig,
    pub(crate) can_network: CAN,
    pub(crate) object_directory: Box<dyn ObjectAccess>,
    pub(crate) services: S,
    pub(crate) rpdos: RpdoTable,
    pub(crate) object_lock: Box<dyn ObjectLock>,

    pub(crate) state: NmtState,
    pub(crate) allowed: AllowedObjects,

    pub(crate) counters: FailureCounters,
    pub(crate) failure_hook: Option<FailureHook>,
    pub(crate) state_hook: Option<StateHook>,
    pub(crate) rpdo_intercept: Option<Box<dyn FnMut(u8, &CAN::Frame) -> bool>>,
}

impl<CAN> Node<CAN, NoServices> where CAN: Can, CAN::Frame: Frame + Debug {
    pub fn new(node_id: u8, eds_content: &str, can_network: CAN) -> Result<Self, ErrorCode> {
        let object_directory = ObjectDirectory::new(node_id, eds_content)?;
        Node::with_services(
            NodeConfig::default(),
            node_id,
            Box::new(object_directory),
            can_network,
            NoServices,
        )
    }
}

impl<CAN, S> Node<CAN, S> where CAN: Can, CAN::Frame: Frame + Debug, S: Services {
    pub fn with_services(
        config: NodeConfig,
        node_id: u8,
        object_directory: Box<dyn ObjectAccess>,
        can_network: CAN,
        services: S,
    ) -> Result<Self, ErrorCode> {
        if node_id == 0 || node_id > MAX_NODE_ID {
            return Err(ErrorCode::invalid_argument("node id must be within 1..=127"));
        }
        if config.rpdo_count > MAX_RPDO_SLOTS {
            return Err(ErrorCode::invalid_argument("too many rpdo slots"));
        }
        let mut node = Node {
            node_id,
            config,
            can_network,
            object_directory,
            services,
            rpdos: RpdoTable::new(config.rpdo_count),
            object_lock: Box::new(SpinLock::new()),
            state: NmtState::Initializing,
            allowed: NmtState::Initializing.allowed_objects(),
            counters: FailureCounters::new(),
            failure_hook: None,
            state_hook: None,
            rpdo_intercept: None,
        };
        node.init_rpdo()?;
        Ok(node)
    }

    /// Announce the node on the bus and enter PRE-OPERATIONAL.
    pub fn init(&mut self) -> Result<(), ErrorCode> {
        self.boot_up()
    }

    pub fn node_id(&self) -> u8 {
        self.node_id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn object_directory(&self) -> &dyn ObjectAccess {
        &*self.object_directory
    }

    pub fn object_directory_mut(&mut self) -> &mut dyn ObjectAccess {
        &mut *self.object_directory
    }

    /// Write a dictionary entry on behalf of this node.
    ///
    /// A write into the communication or mapping record of a receive PDO
    /// reconfigures that slot right away and returns its configuration
    /// result. Mapping records are edited by zeroing sub-index 0 first and
    /// writing the count last.
    pub fn write_object(&mut self, index: u16, sub_index: u8, value: u32) -> Result<(), ErrorCode> {
        let obj = self.object_directory.find(index, sub_index)?;
        self.object_directory.write(obj, value, self.node_id)?;
        match self.rpdo_slot_of(index) {
            Some(slot) => self.reset_rpdo_slot(slot),
            None => Ok(()),
        }
    }

    pub fn rpdos(&self) -> &RpdoTable {
        &self.rpdos
    }

    pub fn services(&self) -> &S {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut S {
        &mut self.services
    }

    pub fn can_network(&self) -> &CAN {
        &self.can_network
    }

    pub fn can_network_mut(&mut self) -> &mut CAN {
        &mut self.can_network
    }

    pub fn counters(&self) -> &FailureCounters {
        &self.counters
    }

    pub fn set_state_hook(&mut self, hook: StateHook) {
        self.state_hook = Some(hook);
    }

    pub fn set_failure_hook(&mut self, hook: FailureHook) {
        self.failure_hook = Some(hook);
    }

    /// A hook returning `true` consumes the frame before it is decoded.
    pub fn set_rpdo_intercept(&mut self, hook: Box<dyn FnMut(u8, &CAN::Frame) -> bool>) {
        self.rpdo_intercept = Some(hook);
    }

    pub fn set_object_lock(&mut self, lock: Box<dyn ObjectLock>) {
        self.object_lock = lock;
    }

    pub(crate) fn report(&mut self, event: FailureEvent, err: &ErrorCode) {
        error!("{:?} failed: {:?}", event, err);
        self.counters.record(event);
        if let Some(hook) = self.failure_hook.as_mut() {
            hook(event, err);
        }
    }

    pub(crate) fn fail(&mut self, event: FailureEvent, err: ErrorCode) -> ErrorCode {
        self.report(event, &err);
        err
    }

    pub(crate) fn send_frame(&mut self, cob_id: u16, data: &[u8]) -> Result<(), ErrorCode> {
        let frame: CAN::Frame = create_frame(cob_id, data)?;
        match self.can_network.transmit(&frame) {
            Ok(_) => {
                info!("sent a frame : {:?}", frame);
                Ok(())
            }
            Err(nb::Error::WouldBlock) => Err(ErrorCode::IoFailure),
            Err(nb::Error::Other(err)) => {
                error!("Failed to transmit {:?}, err: {:?}", frame, err);
                Err(ErrorCode::IoFailure)
            }
        }
    }

    pub fn communication_object_dispatch(&mut self, frame: &CAN::Frame) -> FrameKind {
        if self.handle_nmt_frame(frame) {
            return FrameKind::Nmt;
        }
        if !self.allowed.pdo() {
            return FrameKind::Ignored;
        }
        let slot = get_cob_id(frame).and_then(|cob_id| self.rpdos.match_frame(cob_id as u32));
        match slot {
            Some(index) => {
                self.on_rpdo_frame(index, frame);
                FrameKind::Rpdo(index)
            }
            None => FrameKind::Ignored,
        }
    }

    // Need to be non-blocking.
    pub fn process_one_frame(&mut self) -> Option<FrameKind> {
        let frame = match self.can_network.receive() {
            Ok(f) => f,
            Err(nb::Error::WouldBlock) => return None, // try next time
            Err(nb::Error::Other(err)) => {
                info!("Errors in reading CAN frame, {:?}", err);
                return None;
            }
        };
        Some(self.communication_object_dispatch(&frame))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use core::ops::RangeInclusive;

    use super::*;
    use crate::data_type::ObjectWidth;
    use crate::object_directory::ObjectRef;

    /// Dictionary with nothing in it, for tests that only need a node.
    pub(crate) struct EmptyDictionary;

    impl ObjectAccess for EmptyDictionary {
        fn read_u8(&self, index: u16, sub_index: u8) -> Result<u8, ErrorCode> {
            Err(ErrorCode::NotFound { index, sub_index })
        }
        fn read_u16(&self, index: u16, sub_index: u8) -> Result<u16, ErrorCode> {
            Err(ErrorCode::NotFound { index, sub_index })
        }
        fn read_u32(&self, index: u16, sub_index: u8) -> Result<u32, ErrorCode> {
            Err(ErrorCode::NotFound { index, sub_index })
        }
        fn find(&self, index: u16, sub_index: u8) -> Result<ObjectRef, ErrorCode> {
            Err(ErrorCode::NotFound { index, sub_index })
        }
        fn width(&self, obj: ObjectRef) -> Result<ObjectWidth, ErrorCode> {
            Err(ErrorCode::NotFound { index: obj.index(), sub_index: obj.sub_index() })
        }
        fn is_read_only(&self, _obj: ObjectRef) -> bool {
            true
        }
        fn write(&mut self, obj: ObjectRef, _value: u32, _writer: u8) -> Result<(), ErrorCode> {
            Err(ErrorCode::NotFound { index: obj.index(), sub_index: obj.sub_index() })
        }
        fn restore_defaults(&mut self, _range: RangeInclusive<u16>) -> Result<(), ErrorCode> {
            Ok(())
        }
    }

    pub(crate) struct NullCan;

    #[derive(Debug)]
    pub(crate) struct NullError;

    impl embedded_can::Error for NullError {
        fn kind(&self) -> embedded_can::ErrorKind {
            embedded_can::ErrorKind::Other
        }
    }

    #[derive(Debug)]
    pub(crate) struct NullFrame;

    impl Frame for NullFrame {
        fn new(_id: impl Into<embedded_can::Id>, _data: &[u8]) -> Option<Self> {
            Some(NullFrame)
        }
        fn new_remote(_id: impl Into<embedded_can::Id>, _dlc: usize) -> Option<Self> {
            Some(NullFrame)
        }
        fn is_extended(&self) -> bool {
            false
        }
        fn is_remote_frame(&self) -> bool {
            false
        }
        fn id(&self) -> embedded_can::Id {
            embedded_can::Id::Standard(embedded_can::StandardId::ZERO)
        }
        fn dlc(&self) -> usize {
            0
        }
        fn data(&self) -> &[u8] {
            &[]
        }
    }

    impl Can for NullCan {
        type Frame = NullFrame;
        type Error = NullError;

        fn transmit(&mut self, _frame: &NullFrame) -> nb::Result<Option<NullFrame>, NullError> {
            Ok(None)
        }
        fn receive(&mut self) -> nb::Result<NullFrame, NullError> {
            Err(nb::Error::WouldBlock)
        }
    }

    pub(crate) fn node_with_slots(rpdo_count: usize) -> Node<NullCan> {
        let config = NodeConfig { rpdo_count, ..NodeConfig::default() };
        Node::with_services(config, 1, Box::new(EmptyDictionary), NullCan, NoServices).unwrap()
    }

    #[test]
    fn test_config_limits() {
        assert_eq!(node_with_slots(0).rpdos().len(), 0);
        assert_eq!(node_with_slots(MAX_RPDO_SLOTS).rpdos().len(), MAX_RPDO_SLOTS);
        let config = NodeConfig { rpdo_count: MAX_RPDO_SLOTS + 1, ..NodeConfig::default() };
        let result = Node::with_services(config, 1, Box::new(EmptyDictionary), NullCan, NoServices);
        assert!(matches!(result, Err(ErrorCode::InvalidArgument { .. })));
    }

    #[test]
    fn test_write_outside_dictionary() {
        let mut node = node_with_slots(1);
        assert_eq!(node.write_object(0x1400, 1, 0), Err(ErrorCode::NotFound { index: 0x1400, sub_index: 1 }));
    }
}
