//! `OSFILE` request/result block codec (§6.2): a 16-byte little-endian
//! block of `(load, exec, size, attr)` words, alongside the CR-terminated
//! name and optional inline data.

use byteorder::{ByteOrder, LittleEndian};

/// The 16-byte `(load, exec, size, attr)` block carried in both the
/// `OSFILE` request and its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OsFileBlock {
    pub load: u32,
    pub exec: u32,
    pub size: u32,
    pub attr: u32,
}

impl OsFileBlock {
    pub fn decode(bytes: &[u8; 16]) -> Self {
        Self {
            load: LittleEndian::read_u32(&bytes[0..4]),
            exec: LittleEndian::read_u32(&bytes[4..8]),
            size: LittleEndian::read_u32(&bytes[8..12]),
            attr: LittleEndian::read_u32(&bytes[12..16]),
        }
    }

    pub fn encode(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        LittleEndian::write_u32(&mut out[0..4], self.load);
        LittleEndian::write_u32(&mut out[4..8], self.exec);
        LittleEndian::write_u32(&mut out[8..12], self.size);
        LittleEndian::write_u32(&mut out[12..16], self.attr);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_block() {
        let block = OsFileBlock { load: 0x1900, exec: 0x8023, size: 5, attr: 3 };
        let encoded = block.encode();
        assert_eq!(OsFileBlock::decode(&encoded), block);
    }

    #[test]
    fn scenario_e1_block_bytes() {
        let block = OsFileBlock { load: 0x1900, exec: 0x8023, size: 5, attr: 3 };
        let encoded = block.encode();
        assert_eq!(&encoded[0..4], &[0x00, 0x19, 0x00, 0x00]);
        assert_eq!(&encoded[4..8], &[0x23, 0x80, 0x00, 0x00]);
    }
}
