#[cfg(not(target_os = "none"))]
mod std_items {
    pub use std::boxed::Box;
    pub use std::collections::HashMap;
    pub use std::fmt::{self, Debug};
    pub use std::format;
    pub use std::string::{String, ToString};
    pub use std::vec;
    pub use std::vec::Vec;
}

#[cfg(not(target_os = "none"))]
pub use std_items::*;

#[cfg(target_os = "none")]
mod no_std_items {
    pub use alloc::boxed::Box;
    pub use alloc::fmt::{self, Debug};
    pub use alloc::format;
    pub use alloc::string::{String, ToString};
    pub use alloc::vec;
    pub use alloc::vec::Vec;
    pub use hashbrown::HashMap;
}

#[cfg(target_os = "none")]
pub use no_std_items::*;

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        let value_str = ::alloc::format!($($arg)*);
        #[cfg(not(target_os = "none"))]
        {
            log::info!("[node] {}", value_str);
        }
        #[cfg(target_os = "none")]
        {
            defmt::info!("[node] {}", defmt::Debug2Format(&value_str));
        }
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        let value_str = ::alloc::format!($($arg)*);
        #[cfg(not(target_os = "none"))]
        {
            log::debug!("[node] {}", value_str);
        }
        #[cfg(target_os = "none")]
        {
            defmt::debug!("[node] {}", defmt::Debug2Format(&value_str));
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        let value_str = ::alloc::format!($($arg)*);
        #[cfg(not(target_os = "none"))]
        {
            log::warn!("[node] {}", value_str);
        }
        #[cfg(target_os = "none")]
        {
            defmt::warn!("[node] {}", defmt::Debug2Format(&value_str));
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        let value_str = ::alloc::format!($($arg)*);
        #[cfg(not(target_os = "none"))]
        {
            log::error!("[node] {}", value_str);
        }
        #[cfg(target_os = "none")]
        {
            defmt::error!("[node] {}", defmt::Debug2Format(&value_str));
        }
    };
}
