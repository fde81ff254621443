//! CANopen slave node core: the NMT state machine and the receive PDO engine.
//!
//! Builds for hosted targets with `log` and for bare-metal targets
//! (`target_os = "none"`) with `defmt`:
//!   cargo build --target thumbv6m-none-eabi
//!   cargo build --target x86_64-unknown-linux-gnu

#![cfg_attr(target_os = "none", no_std)]

extern crate alloc;

pub mod constant;
pub mod data_type;
pub mod diagnostics;
pub mod error;
pub mod lock;
pub mod nmt;
pub mod node;
pub mod object_directory;
pub mod rpdo;
pub mod services;
pub mod util;
pub mod value;

mod prelude;

pub use error::ErrorCode;
pub use nmt::{decode_state, encode_state, AllowedObjects, NmtCommand, NmtState, ResetKind};
pub use node::{FrameKind, Node, NodeConfig};
pub use object_directory::{ObjectAccess, ObjectDirectory, ObjectRef};
pub use services::{NoServices, Services};
