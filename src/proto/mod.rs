//! Wire protocol: opcodes, packet framing, and the per-opcode parameter
//! block codecs (§6).

pub mod opcode;
pub mod osfile;
pub mod osgbpb;
pub mod packet;

pub use opcode::{OsFileOp, OsGbpbOp, RequestOp, ResponseOp};
pub use packet::Packet;

/// BBC error wire format: `BRK, code, message, BRK` (`BRK = 0x00`).
pub fn encode_error(code: u8, message: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + 3);
    out.push(0x00);
    out.push(code);
    out.extend_from_slice(message.as_bytes());
    out.push(0x00);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_is_brk_framed() {
        let payload = encode_error(0xD6, "File not found");
        assert_eq!(payload[0], 0x00);
        assert_eq!(payload[1], 0xD6);
        assert_eq!(*payload.last().unwrap(), 0x00);
        assert_eq!(&payload[2..payload.len() - 1], b"File not found");
    }
}
