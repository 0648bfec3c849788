#[path = "support/mod.rs"]
mod support;

use support::Fixture;

/// `GET_ROM` returns the configured ROM image bytes on the `Data` opcode,
/// regardless of which transport carried the request.
#[tokio::test]
async fn get_rom_returns_configured_bytes() {
    let mut fixture = Fixture::with_rom(b"\x00\x28ROM CONTENTS".to_vec()).await;
    let (opcode, payload) = fixture.dispatch(0x02, &[]).await;
    assert_eq!(opcode, 0x82, "expected DATA opcode");
    assert_eq!(payload, b"\x00\x28ROM CONTENTS");
}

/// With no ROM configured, `GET_ROM` is `NotSupported`.
#[tokio::test]
async fn get_rom_without_configured_image_is_not_supported() {
    let mut fixture = Fixture::new().await;
    let (opcode, payload) = fixture.dispatch(0x02, &[]).await;
    assert_eq!(opcode, 0x83, "expected ERROR response");
    assert_eq!(payload[1], 0xFF);
}
