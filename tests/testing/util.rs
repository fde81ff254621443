use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};

use canopen_node::node::NodeConfig;
use canopen_node::{ErrorCode, Node, ObjectDirectory, Services};
use embedded_can::{ErrorKind, Frame, Id, StandardId};
use lazy_static::lazy_static;

pub const EDS_PATH: &str = "tests/fixtures/node.eds";
pub const NODE_ID: u8 = 5;

lazy_static! {
    pub static ref EDS_CONTENT: String =
        std::fs::read_to_string(EDS_PATH).expect("Failed to read EDS file");
}

#[derive(Clone, PartialEq, Eq)]
pub struct MockFrame {
    id: Id,
    data: Vec<u8>,
    remote: bool,
}

impl MockFrame {
    pub fn standard(cob_id: u16, data: &[u8]) -> Self {
        MockFrame::new(StandardId::new(cob_id).unwrap(), data).unwrap()
    }

    pub fn raw_id(&self) -> u32 {
        match self.id {
            Id::Standard(sid) => sid.as_raw() as u32,
            Id::Extended(eid) => eid.as_raw(),
        }
    }
}

impl Debug for MockFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", frame_to_string(self))
    }
}

impl Frame for MockFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > 8 {
            return None;
        }
        Some(MockFrame { id: id.into(), data: data.to_vec(), remote: false })
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > 8 {
            return None;
        }
        Some(MockFrame { id: id.into(), data: vec![0; dlc], remote: true })
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.remote
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.data.len()
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

pub fn frame_to_string<F: Frame>(frame: &F) -> String {
    let id = match frame.id() {
        Id::Standard(sid) => sid.as_raw() as u32,
        Id::Extended(eid) => eid.as_raw(),
    };
    let data_string = frame
        .data()
        .iter()
        .fold(String::from(""), |a, b| format!("{} {:02x}", a, b));

    format!("{:X}  [{}] {}", id, frame.dlc(), data_string)
}

#[derive(Debug)]
pub struct MockError;

impl embedded_can::Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// In-memory bus: frames queued in `inbox` are received in order, every
/// transmitted frame lands in `sent`.
#[derive(Debug, Default)]
pub struct MockCan {
    pub inbox: VecDeque<MockFrame>,
    pub sent: Vec<MockFrame>,
    pub fail_transmit: bool,
}

impl embedded_can::nb::Can for MockCan {
    type Frame = MockFrame;
    type Error = MockError;

    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        if self.fail_transmit {
            return Err(nb::Error::Other(MockError));
        }
        self.sent.push(frame.clone());
        Ok(None)
    }

    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        self.inbox.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

/// Records every call the node makes; `fail_on` names one call to fail.
#[derive(Debug, Default)]
pub struct MockServices {
    pub calls: Vec<&'static str>,
    pub fail_on: Option<&'static str>,
    pub sync_added: Vec<(usize, u8)>,
    pub sync_removed: Vec<usize>,
    pub sync_frames: Vec<(usize, Vec<u8>)>,
}

impl MockServices {
    fn step(&mut self, name: &'static str) -> Result<(), ErrorCode> {
        self.calls.push(name);
        if self.fail_on == Some(name) {
            return Err(ErrorCode::IoFailure);
        }
        Ok(())
    }
}

impl Services for MockServices {
    fn init_tpdo(&mut self) -> Result<(), ErrorCode> {
        self.step("init_tpdo")
    }

    fn clear_timers(&mut self) {
        self.calls.push("clear_timers");
    }

    fn init_heartbeat(&mut self) -> Result<(), ErrorCode> {
        self.step("init_heartbeat")
    }

    fn init_sdo(&mut self) -> Result<(), ErrorCode> {
        self.step("init_sdo")
    }

    fn reset_can(&mut self) -> Result<(), ErrorCode> {
        self.step("reset_can")
    }

    fn init_emergency(&mut self) -> Result<(), ErrorCode> {
        self.step("init_emergency")
    }

    fn init_sync(&mut self) -> Result<(), ErrorCode> {
        self.step("init_sync")
    }

    fn sync_add_rpdo(&mut self, slot: usize, transmission_type: u8) {
        self.sync_added.push((slot, transmission_type));
    }

    fn sync_remove_rpdo(&mut self, slot: usize) {
        self.sync_removed.push(slot);
    }

    fn sync_receive_rpdo(&mut self, slot: usize, data: &[u8]) {
        self.sync_frames.push((slot, data.to_vec()));
    }
}

pub type TestNode = Node<MockCan, MockServices>;

pub fn new_node() -> TestNode {
    new_node_with(NodeConfig::default())
}

pub fn new_node_with(config: NodeConfig) -> TestNode {
    let od = ObjectDirectory::new(NODE_ID, &EDS_CONTENT).unwrap();
    Node::with_services(config, NODE_ID, Box::new(od), MockCan::default(), MockServices::default())
        .unwrap()
}

/// A node that already announced itself and sits in PRE-OPERATIONAL.
pub fn booted_node() -> TestNode {
    let mut node = new_node();
    node.init().unwrap();
    node.can_network_mut().sent.clear();
    node
}

pub fn nmt(cs: u8, node_id: u8) -> MockFrame {
    MockFrame::standard(0x000, &[cs, node_id])
}

/// Write through the dictionary the way a local configuration tool would.
pub fn od_write(node: &mut TestNode, index: u16, sub_index: u8, value: u32) {
    let od = node.object_directory_mut();
    let obj = od.find(index, sub_index).unwrap();
    od.write(obj, value, 0).unwrap();
}
