//! Packet framing shared by all three link types (§4.1 "Packet format").
//!
//! `Byte 0` is a type byte `T` whose top bit is a size-mode flag, not part
//! of the opcode: bit 7 clear means exactly one payload byte follows; bit
//! 7 set means a 4-byte little-endian size follows, then that many payload
//! bytes. USB and serial read this directly off their byte streams; HTTP
//! bodies already carry exactly one encoded packet (§4.1.3), so the same
//! encode/decode functions serve both.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::BbcResult;

const SIZE_FLAG: u8 = 0x80;

/// A decoded packet: the opcode (with the size-mode flag stripped) and its
/// payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(opcode: u8, payload: Vec<u8>) -> Self {
        Self { opcode, payload }
    }

    /// Serialises this packet into wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        if self.payload.len() == 1 {
            let mut out = Vec::with_capacity(2);
            out.push(self.opcode & !SIZE_FLAG);
            out.push(self.payload[0]);
            out
        } else {
            let mut out = Vec::with_capacity(5 + self.payload.len());
            out.push(self.opcode | SIZE_FLAG);
            out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
            out.extend_from_slice(&self.payload);
            out
        }
    }

    /// Decodes a packet from an in-memory buffer (used for HTTP bodies,
    /// which carry exactly one packet with no additional framing).
    pub fn decode_from_slice(data: &[u8]) -> BbcResult<Self> {
        let &type_byte = data.first().ok_or_else(eof_error)?;
        let opcode = type_byte & !SIZE_FLAG;
        if type_byte & SIZE_FLAG == 0 {
            let byte = *data.get(1).ok_or_else(eof_error)?;
            return Ok(Packet::new(opcode, vec![byte]));
        }
        let size_bytes: [u8; 4] = data.get(1..5).ok_or_else(eof_error)?.try_into().unwrap();
        let size = u32::from_le_bytes(size_bytes) as usize;
        let payload = data.get(5..5 + size).ok_or_else(eof_error)?.to_vec();
        Ok(Packet::new(opcode, payload))
    }
}

fn eof_error() -> crate::error::BbcError {
    crate::error::BbcError::Eof
}

/// Reads one packet off an async byte stream (USB bulk endpoint, serial
/// port).
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Packet> {
    let type_byte = reader.read_u8().await?;
    let opcode = type_byte & !SIZE_FLAG;
    if type_byte & SIZE_FLAG == 0 {
        let byte = reader.read_u8().await?;
        return Ok(Packet::new(opcode, vec![byte]));
    }
    let mut size_buf = [0u8; 4];
    reader.read_exact(&mut size_buf).await?;
    let size = u32::from_le_bytes(size_buf) as usize;
    let mut payload = vec![0u8; size];
    reader.read_exact(&mut payload).await?;
    Ok(Packet::new(opcode, payload))
}

/// Writes one packet to an async byte stream.
pub async fn write_packet<W: AsyncWrite + Unpin>(writer: &mut W, packet: &Packet) -> std::io::Result<()> {
    writer.write_all(&packet.encode()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_single_byte_payload_without_size_prefix() {
        let packet = Packet::new(0x03, vec![0x42]);
        assert_eq!(packet.encode(), vec![0x03, 0x42]);
    }

    #[test]
    fn encodes_multi_byte_payload_with_size_prefix() {
        let packet = Packet::new(0x0B, vec![1, 2, 3]);
        let encoded = packet.encode();
        assert_eq!(encoded[0], 0x0B | SIZE_FLAG);
        assert_eq!(&encoded[1..5], &3u32.to_le_bytes());
        assert_eq!(&encoded[5..], &[1, 2, 3]);
    }

    #[test]
    fn round_trips_through_decode_from_slice() {
        let packet = Packet::new(0x14, vec![9, 8, 7, 6, 5]);
        let encoded = packet.encode();
        let decoded = Packet::decode_from_slice(&encoded).unwrap();
        assert_eq!(decoded, packet);
    }

    #[tokio::test]
    async fn round_trips_through_async_stream() {
        let packet = Packet::new(0x20, vec![1, 2, 3, 4, 5, 6, 7]);
        let mut buf = Vec::new();
        write_packet(&mut buf, &packet).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let decoded = read_packet(&mut cursor).await.unwrap();
        assert_eq!(decoded, packet);
    }
}
