//! Request/response opcode table (§6.1). The full set is fixed; the
//! dispatcher rejects anything outside it with a BBC `BRK` error rather
//! than silently ignoring it.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Request type byte (`T`, §4.1 "Packet format").
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum RequestOp {
    GetRom = 0x02,
    Reset = 0x03,
    EchoData = 0x04,
    ReadString = 0x05,
    StarCat = 0x06,
    ReadStringVerbose = 0x08,
    StarRun = 0x09,
    StarCommand = 0x0A,
    OsFile = 0x0B,
    OsFindOpen = 0x0C,
    OsFindClose = 0x0D,
    OsArgs = 0x0E,
    Eof = 0x0F,
    OsBGet = 0x10,
    OsBPut = 0x11,
    OsGbpb = 0x14,
    Opt = 0x15,
    BootOption = 0x16,
    SetFileHandleRange = 0x1A,
    Wrapped = 0x20,
    ReadDiskImage = 0x21,
    WriteDiskImage = 0x22,
}

impl RequestOp {
    pub fn from_byte(byte: u8) -> Option<Self> {
        FromPrimitive::from_u8(byte)
    }
}

/// Link-reserved type codes that never reach the dispatcher (§4.1).
pub fn is_link_reserved(byte: u8) -> bool {
    matches!(byte, 0x00 | 0x01 | 0x7F | 0xFF)
}

/// Response type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseOp {
    Yes = 0x80,
    No = 0x81,
    Data = 0x82,
    Error = 0x83,
    Text = 0x84,
    Run = 0x85,
    OsFile = 0x86,
    OsFind = 0x87,
    OsArgs = 0x88,
    Eof = 0x89,
    OsBGet = 0x8A,
    OsBGetEof = 0x8B,
    OsGbpb = 0x8C,
    BootOption = 0x8D,
    Special = 0x8E,
    VolumeBrowser = 0x8F,
}

impl ResponseOp {
    pub fn byte(self) -> u8 {
        self as u8
    }
}

/// `OSFILE` A-register subcommands (§6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum OsFileOp {
    Save = 0,
    WriteCat = 1,
    WriteLoad = 2,
    WriteExec = 3,
    WriteAttr = 4,
    ReadCat = 5,
    Delete = 6,
    Create = 7,
    Load = 255,
}

impl OsFileOp {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            255 => Some(OsFileOp::Load),
            0..=7 => FromPrimitive::from_u8(byte),
            _ => None,
        }
    }
}

/// `OSGBPB` A-register subcommands (§6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum OsGbpbOp {
    WriteMultiple = 1,
    WriteMultipleNoPtr = 2,
    ReadMultiple = 3,
    ReadMultipleNoPtr = 4,
    GetTitleAndBootOpt = 5,
    ReadCurrentDriveDir = 6,
    ReadLibraryDriveDir = 7,
    EnumerateNames = 8,
}

impl OsGbpbOp {
    pub fn from_byte(byte: u8) -> Option<Self> {
        FromPrimitive::from_u8(byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_opcodes() {
        assert_eq!(RequestOp::from_byte(0x0B), Some(RequestOp::OsFile));
        assert_eq!(RequestOp::from_byte(0x20), Some(RequestOp::Wrapped));
        assert_eq!(RequestOp::from_byte(0x99), None);
    }

    #[test]
    fn link_reserved_bytes() {
        assert!(is_link_reserved(0x00));
        assert!(is_link_reserved(0x7F));
        assert!(!is_link_reserved(0x0B));
    }

    #[test]
    fn osfile_op_load_is_255() {
        assert_eq!(OsFileOp::from_byte(255), Some(OsFileOp::Load));
        assert_eq!(OsFileOp::from_byte(6), Some(OsFileOp::Delete));
        assert_eq!(OsFileOp::from_byte(8), None);
    }
}
