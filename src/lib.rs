#![no_std]
#![doc = include_str!("../README.md")]

#[cfg(test)]
extern crate std;

mod address;
mod bus;
mod channel;
mod command;
mod config;
mod controller;
mod family;
mod iowire;
mod logger;
mod platform;
mod result;
pub mod scratchpad;
mod search;
mod sensor;
#[cfg(test)]
mod sim;
mod status;
pub mod symbol;

pub use address::{Address, AddressError};
pub use bus::{Bus, SharedBus};
pub use channel::{Channels, Completion};
pub use command::{Command, FunctionCommand, OpCode};
pub use config::Config;
pub use controller::BusController;
pub use family::Family;
pub use iowire::{BitBang, IoWire};
pub use logger::{LogSink, Logger, NoopLogger};
pub use platform::Platform;
pub use result::{BusError, Error};
pub use scratchpad::{MeasureResolution, Scratchpad};
pub use search::{DeviceSearch, DeviceSearchIter};
pub use sensor::{Callback, Ds18};
pub use status::Status;
pub use symbol::Symbol;

pub fn compute_partial_crc8(crc: u8, data: &[u8]) -> u8 {
    let mut crc = crc;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}

/// Dallas/Maxim CRC-8 over `data`. Running it over a block that ends with
/// its own CRC byte yields zero.
pub fn compute_crc8(data: &[u8]) -> u8 {
    compute_partial_crc8(0, data)
}
