#[path = "support/mod.rs"]
mod support;

use support::{osfile_payload, Fixture};

/// E1: `OSFILE` SAVE then LOAD round-trips load/exec/size/attr and the
/// saved bytes.
#[tokio::test]
async fn scenario_e1_dfs_save_then_load() {
    let mut fixture = Fixture::new().await;
    fixture.make_dfs_volume("V").await;
    fixture.select_volume("V").await;

    let save = osfile_payload(0, 0x1900, 0x8023, 0, 0, "$.TEST", b"HELLO");
    let (opcode, payload) = fixture.dispatch(0x0B, &save).await;
    assert_eq!(opcode, 0x86, "unexpected opcode: {payload:?}");
    assert_eq!(payload[0], 1, "file type");
    assert_eq!(&payload[1..5], &0x1900u32.to_le_bytes());
    assert_eq!(&payload[5..9], &0x8023u32.to_le_bytes());
    assert_eq!(&payload[9..13], &5u32.to_le_bytes());
    assert_eq!(&payload[13..17], &3u32.to_le_bytes());

    let load = osfile_payload(255, 0, 0, 0, 0, "$.TEST", &[]);
    let (opcode, payload) = fixture.dispatch(0x0B, &load).await;
    assert_eq!(opcode, 0x86);
    assert_eq!(payload[0], 1);
    assert_eq!(&payload[1..5], &0x1900u32.to_le_bytes());
    assert_eq!(&payload[5..9], &0x8023u32.to_le_bytes());
    assert_eq!(&payload[17..], b"HELLO");
}

/// Loading a name that doesn't exist is `FileNotFound`, not a panic or a
/// silently empty buffer.
#[tokio::test]
async fn load_missing_file_is_file_not_found() {
    let mut fixture = Fixture::new().await;
    fixture.make_dfs_volume("V").await;
    fixture.select_volume("V").await;

    let load = osfile_payload(255, 0, 0, 0, 0, "$.NOPE", &[]);
    let (opcode, payload) = fixture.dispatch(0x0B, &load).await;
    assert_eq!(opcode, 0x83, "expected ERROR response");
    assert_eq!(payload[1], 0xD6, "File not found code");
}
