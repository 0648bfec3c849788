//! USB link (§4.1.1): bulk in/out endpoints on a device identified by a
//! fixed VID/PID pair, with stall/pipe-error recovery and polled hotplug.
//!
//! `rusb`'s transfer functions are blocking; each one runs via
//! [`tokio::task::block_in_place`] rather than `spawn_blocking`, since the
//! device handle is borrowed for the call's duration and the multi-thread
//! runtime (`tokio` "full" feature) guarantees a worker thread to shunt to.

use std::time::Duration;

use async_trait::async_trait;
use rusb::{Context, Direction, TransferType, UsbContext};

use crate::transport::Link;

/// Default device identity; overridable via configuration since the wire
/// protocol does not pin one down.
pub const DEFAULT_VENDOR_ID: u16 = 0x1209;
pub const DEFAULT_PRODUCT_ID: u16 = 0xBEEB;

const READ_TIMEOUT: Duration = Duration::from_millis(2000);
const WRITE_TIMEOUT: Duration = Duration::from_millis(2000);
const BULK_CHUNK_SIZE: usize = 4096;

/// Hotplug / device-presence poll interval (§4.1.1: "polled at ≥1 Hz").
pub const HOTPLUG_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct UsbLink {
    handle: rusb::DeviceHandle<Context>,
    in_endpoint: u8,
    out_endpoint: u8,
    session_id: String,
    pending: Vec<u8>,
}

impl UsbLink {
    /// Opens the first device matching `vendor_id`/`product_id`, finds its
    /// bulk in/out endpoints, and claims the interface. The session id is
    /// the device's USB serial number (§4.1.1: "keyed by its USB serial
    /// number"), falling back to the VID/PID pair if the device has none.
    pub fn open(context: &Context, vendor_id: u16, product_id: u16) -> rusb::Result<Self> {
        for device in context.devices()?.iter() {
            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() != vendor_id || descriptor.product_id() != product_id {
                continue;
            }

            let handle = device.open()?;
            let session_id = handle
                .read_serial_number_string_ascii(&descriptor)
                .unwrap_or_else(|_| format!("usb-{vendor_id:04x}-{product_id:04x}"));

            let config = device.active_config_descriptor()?;
            let mut in_endpoint = None;
            let mut out_endpoint = None;
            for interface in config.interfaces() {
                for interface_descriptor in interface.descriptors() {
                    handle.claim_interface(interface_descriptor.interface_number())?;
                    for endpoint in interface_descriptor.endpoint_descriptors() {
                        if endpoint.transfer_type() != TransferType::Bulk {
                            continue;
                        }
                        match endpoint.direction() {
                            Direction::In => in_endpoint = Some(endpoint.address()),
                            Direction::Out => out_endpoint = Some(endpoint.address()),
                        }
                    }
                }
            }

            let (Some(in_endpoint), Some(out_endpoint)) = (in_endpoint, out_endpoint) else {
                continue;
            };

            return Ok(Self { handle, in_endpoint, out_endpoint, session_id, pending: Vec::new() });
        }
        Err(rusb::Error::NoDevice)
    }

    /// Polls at [`HOTPLUG_POLL_INTERVAL`] until a matching device appears.
    pub async fn wait_for_device(vendor_id: u16, product_id: u16) -> rusb::Result<Self> {
        let context = Context::new()?;
        loop {
            match Self::open(&context, vendor_id, product_id) {
                Ok(link) => return Ok(link),
                Err(rusb::Error::NoDevice) => tokio::time::sleep(HOTPLUG_POLL_INTERVAL).await,
                Err(err) => return Err(err),
            }
        }
    }

    /// Reads one bulk transfer's worth of bytes into `self.pending`,
    /// recovering from a stall by clearing the endpoint halt (§4.1.1) and
    /// treating a pipe error as session loss.
    fn fill_buffer(&mut self) -> std::io::Result<()> {
        let mut chunk = [0u8; BULK_CHUNK_SIZE];
        loop {
            let result = tokio::task::block_in_place(|| self.handle.read_bulk(self.in_endpoint, &mut chunk, READ_TIMEOUT));
            match result {
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(rusb::Error::Timeout) => continue,
                Err(rusb::Error::Pipe) => {
                    tracing::warn!(session_id = %self.session_id, "USB stall on IN endpoint, clearing halt");
                    if tokio::task::block_in_place(|| self.handle.clear_halt(self.in_endpoint)).is_err() {
                        return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "USB pipe error, session lost"));
                    }
                }
                Err(err) => return Err(std::io::Error::other(err)),
            }
        }
    }

    fn write_bulk(&self, data: &[u8]) -> std::io::Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let result = tokio::task::block_in_place(|| self.handle.write_bulk(self.out_endpoint, &data[offset..], WRITE_TIMEOUT));
            match result {
                Ok(n) => offset += n,
                Err(rusb::Error::Timeout) => continue,
                Err(rusb::Error::Pipe) => {
                    tracing::warn!(session_id = %self.session_id, "USB stall on OUT endpoint, clearing halt");
                    if tokio::task::block_in_place(|| self.handle.clear_halt(self.out_endpoint)).is_err() {
                        return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "USB pipe error, session lost"));
                    }
                }
                Err(err) => return Err(std::io::Error::other(err)),
            }
        }
        Ok(())
    }
}

fn wire_len(type_byte: u8, payload_len: usize) -> usize {
    if type_byte & 0x80 == 0 { 2 } else { 5 + payload_len }
}

#[async_trait]
impl Link for UsbLink {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn read_request(&mut self) -> std::io::Result<Option<(u8, Vec<u8>)>> {
        loop {
            if let Ok(packet) = crate::proto::Packet::decode_from_slice(&self.pending) {
                let type_byte = self.pending[0];
                let consumed = wire_len(type_byte, packet.payload.len());
                self.pending.drain(..consumed);
                return Ok(Some((packet.opcode, packet.payload)));
            }
            self.fill_buffer()?;
        }
    }

    async fn write_response(&mut self, opcode: u8, payload: &[u8]) -> std::io::Result<()> {
        let packet = crate::proto::Packet::new(opcode, payload.to_vec());
        self.write_bulk(&packet.encode())
    }
}
