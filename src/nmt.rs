use bitfield_struct::bitfield;
use embedded_can::{nb::Can, Frame};

use crate::constant::{
    APPLICATION_REGISTERS_RANGE, BOOT_UP_PAYLOAD, COB_FUNC_NMT, COB_FUNC_NMT_ERROR_CONTROL,
    COMMUNICATION_REGISTERS_RANGE, MAX_NODE_ID, NMT_BROADCAST_NODE_ID,
};
use crate::diagnostics::FailureEvent;
use crate::error::ErrorCode;
use crate::node::Node;
use crate::prelude::*;
use crate::services::Services;
use crate::util::get_cob_id;
use crate::{debug, info, warn};

/// Network management state of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NmtState {
    /// Not a state the node can be put into; only decoded from unknown codes.
    Invalid,
    Initializing,
    PreOperational,
    Operational,
    Stopped,
}

impl NmtState {
    /// Code carried in the heartbeat and boot-up messages.
    pub fn heartbeat_code(&self) -> u8 {
        match self {
            NmtState::Initializing => 0x00,
            NmtState::Stopped => 0x04,
            NmtState::Operational => 0x05,
            NmtState::PreOperational => 0x7F,
            NmtState::Invalid => 0xFF,
        }
    }

    pub fn from_heartbeat_code(code: u8) -> Self {
        match code {
            0x00 => NmtState::Initializing,
            0x04 => NmtState::Stopped,
            0x05 => NmtState::Operational,
            0x7F => NmtState::PreOperational,
            _ => NmtState::Invalid,
        }
    }

    pub fn allowed_objects(&self) -> AllowedObjects {
        let none = AllowedObjects::new();
        match self {
            NmtState::Invalid | NmtState::Initializing => none,
            NmtState::PreOperational => none
                .with_sdo(true)
                .with_sync(true)
                .with_time(true)
                .with_emcy(true)
                .with_nmt(true),
            NmtState::Operational => none
                .with_pdo(true)
                .with_sdo(true)
                .with_sync(true)
                .with_time(true)
                .with_emcy(true)
                .with_nmt(true),
            NmtState::Stopped => none.with_nmt(true),
        }
    }
}

pub fn encode_state(state: NmtState) -> u8 {
    state.heartbeat_code()
}

pub fn decode_state(code: u8) -> NmtState {
    NmtState::from_heartbeat_code(code)
}

/// Communication objects the node may process in its current state.
#[bitfield(u8)]
pub struct AllowedObjects {
    pub pdo: bool,
    pub sdo: bool,
    pub sync: bool,
    pub time: bool,
    pub emcy: bool,
    pub nmt: bool,
    #[bits(2)]
    _reserved: u8,
}

impl AllowedObjects {
    pub fn bits(&self) -> u8 {
        u8::from(*self)
    }
}

/// Command specifier of a frame on the NMT identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NmtCommand {
    Start = 0x01,
    Stop = 0x02,
    EnterPreOperational = 0x80,
    ResetNode = 0x81,
    ResetCommunication = 0x82,
}

impl NmtCommand {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(NmtCommand::Start),
            0x02 => Some(NmtCommand::Stop),
            0x80 => Some(NmtCommand::EnterPreOperational),
            0x81 => Some(NmtCommand::ResetNode),
            0x82 => Some(NmtCommand::ResetCommunication),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Reload application and communication parameters.
    Node,
    /// Reload communication parameters only.
    Communication,
}

impl<CAN, S> Node<CAN, S> where CAN: Can, CAN::Frame: Frame + Debug, S: Services {
    pub fn state(&self) -> NmtState {
        self.state
    }

    pub fn allowed_objects(&self) -> AllowedObjects {
        self.allowed
    }

    /// Move to `target`.
    ///
    /// Entering OPERATIONAL from any other state rebuilds the transmit PDO
    /// table and the receive PDO table first; if either fails the node stays
    /// where it was. While INITIALIZING the only way out is PRE-OPERATIONAL.
    pub fn set_state(&mut self, target: NmtState) -> Result<(), ErrorCode> {
        let current = self.state;
        if target == NmtState::Invalid {
            return Err(ErrorCode::invalid_argument("INVALID is not a reachable state"));
        }
        if current == NmtState::Initializing
            && !matches!(target, NmtState::Initializing | NmtState::PreOperational) {
            return Err(ErrorCode::InvalidState { state: current });
        }

        if target == NmtState::Operational && current != NmtState::Operational {
            self.services.init_tpdo()?;
            self.init_rpdo()?;
        }

        if target != current {
            info!("NMT state {:?} -> {:?}", current, target);
            self.state = target;
            if let Some(hook) = self.state_hook.as_mut() {
                hook(self.node_id, target);
            }
        }
        self.allowed = target.allowed_objects();
        Ok(())
    }

    /// Send the boot-up message and enter PRE-OPERATIONAL.
    ///
    /// The state change happens even when the frame could not be sent; the
    /// send failure is still returned.
    pub fn boot_up(&mut self) -> Result<(), ErrorCode> {
        if self.state != NmtState::Initializing {
            return Err(ErrorCode::InvalidState { state: self.state });
        }
        let sent = self.send_frame(
            COB_FUNC_NMT_ERROR_CONTROL | self.node_id as u16,
            &[BOOT_UP_PAYLOAD],
        );
        self.set_state(NmtState::PreOperational)?;
        sent
    }

    pub fn reset(&mut self, kind: ResetKind) -> Result<(), ErrorCode> {
        let mut boot_up_owed = false;
        if self.state != NmtState::Initializing {
            self.set_state(NmtState::Initializing)?;
            boot_up_owed = true;
        }

        if kind == ResetKind::Node {
            if let Err(err) = self.object_directory.restore_defaults(APPLICATION_REGISTERS_RANGE) {
                return Err(self.fail(FailureEvent::ResetApplication, err));
            }
        }
        self.reset_communication()?;

        if boot_up_owed {
            if let Err(err) = self.boot_up() {
                self.report(FailureEvent::BootUp, &err);
            }
        }
        Ok(())
    }

    fn reset_communication(&mut self) -> Result<(), ErrorCode> {
        if let Err(err) = self.object_directory.restore_defaults(COMMUNICATION_REGISTERS_RANGE) {
            return Err(self.fail(FailureEvent::ResetCommunication, err));
        }
        self.clear_rpdo();
        self.services.clear_timers();

        // No rollback: whatever was brought up before a failure stays up.
        self.services.init_heartbeat().map_err(|err| self.fail(FailureEvent::HeartbeatInit, err))?;
        self.services.init_sdo().map_err(|err| self.fail(FailureEvent::SdoInit, err))?;
        self.services.reset_can().map_err(|err| self.fail(FailureEvent::CanReset, err))?;
        self.services.init_emergency().map_err(|err| self.fail(FailureEvent::EmergencyInit, err))?;
        self.services.init_sync().map_err(|err| self.fail(FailureEvent::SyncInit, err))?;
        debug!("communication reset done");
        Ok(())
    }

    pub fn set_node_id(&mut self, node_id: u8) -> Result<(), ErrorCode> {
        if node_id == 0 || node_id > MAX_NODE_ID {
            return Err(ErrorCode::invalid_argument("node id must be within 1..=127"));
        }
        if self.state != NmtState::Initializing {
            return Err(ErrorCode::InvalidState { state: self.state });
        }
        self.node_id = node_id;
        self.object_directory.set_node_id(node_id);
        Ok(())
    }

    /// Returns `true` when the frame was on the NMT identifier, i.e. it is
    /// consumed here whether or not it was addressed to this node.
    pub fn handle_nmt_frame(&mut self, frame: &CAN::Frame) -> bool {
        if get_cob_id(frame) != Some(COB_FUNC_NMT) {
            return false;
        }
        if frame.is_remote_frame() {
            debug!("remote frame on the NMT identifier dropped");
            return true;
        }
        let data = frame.data();
        if data.len() < 2 {
            warn!("NMT frame too short: {:?}", frame);
            return true;
        }
        let (cs, target) = (data[0], data[1]);
        if target != self.node_id && target != NMT_BROADCAST_NODE_ID {
            return true;
        }

        let result = match NmtCommand::from_code(cs) {
            Some(NmtCommand::Start) => self.set_state(NmtState::Operational),
            Some(NmtCommand::Stop) => self.set_state(NmtState::Stopped),
            Some(NmtCommand::EnterPreOperational) => self.set_state(NmtState::PreOperational),
            Some(NmtCommand::ResetNode) => self.reset(ResetKind::Node),
            Some(NmtCommand::ResetCommunication) => self.reset(ResetKind::Communication),
            None => {
                debug!("unknown NMT command {:#x}", cs);
                Ok(())
            }
        };
        if let Err(err) = result {
            self.report(FailureEvent::NmtCommand, &err);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_codes() {
        assert_eq!(NmtState::PreOperational.heartbeat_code(), 127);
        assert_eq!(NmtState::Stopped.heartbeat_code(), 4);
        assert_eq!(decode_state(5), NmtState::Operational);
        assert_eq!(decode_state(0), NmtState::Initializing);
        assert_eq!(decode_state(0x42), NmtState::Invalid);
        assert_eq!(encode_state(NmtState::Invalid), 0xFF);
        for state in [
            NmtState::Invalid,
            NmtState::Initializing,
            NmtState::PreOperational,
            NmtState::Operational,
            NmtState::Stopped,
        ] {
            assert_eq!(decode_state(encode_state(state)), state);
        }
    }

    #[test]
    fn test_allowed_objects_per_state() {
        assert_eq!(NmtState::Initializing.allowed_objects().bits(), 0);
        assert_eq!(NmtState::Invalid.allowed_objects().bits(), 0);
        assert_eq!(NmtState::Operational.allowed_objects().bits(), 0b0011_1111);
        assert_eq!(NmtState::PreOperational.allowed_objects().bits(), 0b0011_1110);
        let stopped = NmtState::Stopped.allowed_objects();
        assert!(stopped.nmt());
        assert!(!stopped.pdo());
        assert!(!stopped.sdo());
    }

    #[test]
    fn test_command_codes() {
        assert_eq!(NmtCommand::from_code(0x81), Some(NmtCommand::ResetNode));
        assert_eq!(NmtCommand::from_code(0x03), None);
        assert_eq!(NmtCommand::ResetCommunication.code(), 130);
    }
}
