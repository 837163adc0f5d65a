pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM commands, understood by every device on the bus
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum Command {
    MatchRom = 0x55,
    SearchRom = 0xF0,
    SkipRom = 0xCC,
    ReadRom = 0x33,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// DS18 function commands, valid after a ROM command
#[derive(Clone, Copy, Debug)]
#[repr(u8)]
pub enum FunctionCommand {
    Convert = 0x44,
    ReadScratchpad = 0xBE,
}

impl OpCode for FunctionCommand {
    fn op_code(&self) -> u8 {
        *self as _
    }
}
