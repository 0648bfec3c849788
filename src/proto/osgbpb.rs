//! `OSGBPB` parameter block codec (§6.3): a 13-byte little-endian block of
//! `(handle, dataAddr, numBytes, ptr)` plus the trailing inline data for
//! write ops.

use byteorder::{ByteOrder, LittleEndian};

/// The 13-byte block carried in an `OSGBPB` request: handle, a 4-byte
/// data address (opaque here, echoed back), the requested byte count, and
/// the sequential pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OsGbpbBlock {
    pub handle: u8,
    pub data_addr: u32,
    pub num_bytes: u32,
    pub ptr: u32,
}

impl OsGbpbBlock {
    pub fn decode(bytes: &[u8; 13]) -> Self {
        Self {
            handle: bytes[0],
            data_addr: LittleEndian::read_u32(&bytes[1..5]),
            num_bytes: LittleEndian::read_u32(&bytes[5..9]),
            ptr: LittleEndian::read_u32(&bytes[9..13]),
        }
    }

    pub fn encode(&self) -> [u8; 13] {
        let mut out = [0u8; 13];
        out[0] = self.handle;
        LittleEndian::write_u32(&mut out[1..5], self.data_addr);
        LittleEndian::write_u32(&mut out[5..9], self.num_bytes);
        LittleEndian::write_u32(&mut out[9..13], self.ptr);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_block() {
        let block = OsGbpbBlock { handle: 0xB0, data_addr: 0x1234, num_bytes: 5, ptr: 10 };
        let encoded = block.encode();
        assert_eq!(OsGbpbBlock::decode(&encoded), block);
    }
}
