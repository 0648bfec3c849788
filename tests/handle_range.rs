#[path = "support/mod.rs"]
mod support;

use support::{osfind_payload, star_command_payload, Fixture};

/// E3: the default handle range holds exactly 16 handles; the 17th open
/// fails with `TooManyOpen`, and `SET_FILE_HANDLE_RANGE` both resizes the
/// range and closes everything currently open.
#[tokio::test]
async fn exhausting_then_resetting_the_handle_range() {
    let mut fixture = Fixture::new().await;
    fixture.make_dfs_volume("V").await;
    fixture.select_volume("V").await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let name = format!("$.F{i:02X}");
        let (opcode, payload) = fixture.dispatch(0x0C, &osfind_payload(0x80, &name)).await;
        assert_eq!(opcode, 0x87, "open {i} failed: {payload:?}");
        handles.push(payload[0]);
    }

    let (opcode, payload) = fixture.dispatch(0x0C, &osfind_payload(0x80, "$.OVERFLOW")).await;
    assert_eq!(opcode, 0x83, "17th open should fail");
    assert_eq!(payload[1], 0xC0, "TooManyOpen code");

    let mut range_payload = vec![0xC0u8, 16];
    range_payload.push(0);
    let (opcode, _) = fixture.dispatch(0x1A, &range_payload[..2]).await;
    assert_eq!(opcode, 0x80);

    // The old handles are gone; a name from the old range can't be closed again.
    let (opcode, payload) = fixture.dispatch(0x0D, &[handles[0]]).await;
    assert_eq!(opcode, 0x83);
    assert_eq!(payload[1], 0xDE, "Channel code for an already-closed handle");

    // But the new range accepts opens again.
    let (opcode, _) = fixture.dispatch(0x0C, &osfind_payload(0x80, "$.NEWRANGE")).await;
    assert_eq!(opcode, 0x87);
}

/// `*BACK` without a prior `*DIN`/directory change is still a well-defined
/// no-op pivot between `$` and itself on a freshly selected volume.
#[tokio::test]
async fn star_vol_then_back_on_fresh_session() {
    let mut fixture = Fixture::new().await;
    fixture.make_dfs_volume("V").await;
    fixture.select_volume("V").await;

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*BACK")).await;
    assert_eq!(opcode, 0x83, "ADFS *BACK on a DFS volume is NotSupported");
}
