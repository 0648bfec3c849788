//! Serial link (§4.1.2): a byte stream with an explicit sync protocol and
//! per-256-byte confirmation bytes, since a raw UART carries no framing of
//! its own.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPort, SerialPortBuilderExt, SerialStream};

use crate::transport::Link;

/// Baud rate and consecutive-zero count from §4.1.2.
pub const BAUD_RATE: u32 = 115_200;
pub const NUM_SERIAL_SYNC_ZEROS: usize = 300;

/// Command bytes that trigger resync when seen where a type byte is
/// expected (§4.1.2 step 1); `0x00` is the sync marker itself and `0x7F` is
/// link-reserved.
fn triggers_resync(byte: u8) -> bool {
    byte == 0x00 || byte == 0x7F
}

/// Whether payload index `i` (of a payload of length `len`) is followed by
/// a confirmation byte: true at `i = len-1`, and every 256 bytes back from
/// there (§9 "Open question — serial confirmation offsets").
fn needs_confirmation(i: usize, len: usize) -> bool {
    len != 0 && (len - 1 - i) % 256 == 0
}

pub struct SerialLink {
    port: SerialStream,
    path: String,
}

impl SerialLink {
    pub fn open(path: &str) -> tokio_serial::Result<Self> {
        let port = tokio_serial::new(path, BAUD_RATE).open_native_async()?;
        // FTDI latency timer forced to 1 ms (§4.1.2) where the platform exposes it;
        // tokio-serial has no portable knob for this, so it is left to the OS driver.
        Ok(Self { port, path: path.to_owned() })
    }

    /// The sync loop (§4.1.2 step 1): entered on startup, on an unexpected
    /// `0x00`/`0x7F` command byte, on a confirmation mismatch, or on any
    /// transport error.
    async fn sync(&mut self) -> std::io::Result<()> {
        let _ = self.port.clear(tokio_serial::ClearBuffer::All);
        loop {
            let mut zero_run = 0usize;
            let mut byte = [0u8; 1];
            while zero_run < NUM_SERIAL_SYNC_ZEROS {
                self.port.read_exact(&mut byte).await?;
                zero_run = if byte[0] == 0 { zero_run + 1 } else { 0 };
            }

            let mut reply = vec![0u8; NUM_SERIAL_SYNC_ZEROS];
            reply.push(0x01);
            self.port.write_all(&reply).await?;

            loop {
                self.port.read_exact(&mut byte).await?;
                if byte[0] != 0 {
                    if byte[0] == 0x01 {
                        tracing::info!(path = %self.path, "serial link synchronised");
                        return Ok(());
                    }
                    break;
                }
            }
        }
    }

    /// Reads `len` payload bytes, acknowledging every confirmation offset
    /// with a `0x01` sent back to the sender.
    async fn read_payload(&mut self, len: usize) -> std::io::Result<Vec<u8>> {
        let mut payload = vec![0u8; len];
        for i in 0..len {
            self.port.read_exact(&mut payload[i..i + 1]).await?;
            if needs_confirmation(i, len) {
                self.port.write_all(&[0x01]).await?;
            }
        }
        Ok(payload)
    }

    /// Writes `payload`, reading back a confirmation byte at every
    /// confirmation offset. Returns `false` on the first mismatch.
    async fn write_payload(&mut self, payload: &[u8]) -> std::io::Result<bool> {
        let len = payload.len();
        for i in 0..len {
            self.port.write_all(&payload[i..i + 1]).await?;
            if needs_confirmation(i, len) {
                let mut confirm = [0u8; 1];
                self.port.read_exact(&mut confirm).await?;
                if confirm[0] != 0x01 {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Link for SerialLink {
    fn session_id(&self) -> &str {
        &self.path
    }

    async fn read_request(&mut self) -> std::io::Result<Option<(u8, Vec<u8>)>> {
        loop {
            let mut type_byte = [0u8; 1];
            self.port.read_exact(&mut type_byte).await?;
            let byte = type_byte[0];

            if triggers_resync(byte) {
                tracing::warn!(path = %self.path, byte, "serial resync triggered");
                self.sync().await?;
                continue;
            }

            let opcode = byte & !0x80;
            let len = if byte & 0x80 == 0 {
                1
            } else {
                let mut size_buf = [0u8; 4];
                self.port.read_exact(&mut size_buf).await?;
                u32::from_le_bytes(size_buf) as usize
            };

            let payload = self.read_payload(len).await?;
            return Ok(Some((opcode, payload)));
        }
    }

    async fn write_response(&mut self, opcode: u8, payload: &[u8]) -> std::io::Result<()> {
        if payload.len() == 1 {
            self.port.write_all(&[opcode & !0x80]).await?;
        } else {
            self.port.write_all(&[opcode | 0x80]).await?;
            self.port.write_all(&(payload.len() as u32).to_le_bytes()).await?;
        }

        if !self.write_payload(payload).await? {
            tracing::warn!(path = %self.path, "confirmation mismatch writing response, resyncing");
            self.sync().await?;
        }
        Ok(())
    }
}
