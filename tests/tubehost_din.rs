#[path = "support/mod.rs"]
mod support;

use beeblink_server::fs::volume::DiscoveryConfig;
use support::{star_command_payload, Fixture};
use tempfile::TempDir;
use tokio::fs;

/// E5 through the dispatcher: `*DIN`/`*DOUT` on a TubeHost volume reached
/// via `tubehost_roots`, including the `*CAT :3` listing and the
/// "Drive empty" fault once ejected.
#[tokio::test]
async fn scenario_e5_din_dout_through_dispatcher() {
    let tempdir = TempDir::new().unwrap();
    fs::write(tempdir.path().join(".volume"), b"T\n").await.unwrap();
    fs::create_dir_all(tempdir.path().join("misc")).await.unwrap();
    fs::write(tempdir.path().join("misc").join("GAME"), b"x").await.unwrap();

    let discovery = DiscoveryConfig { tubehost_roots: vec![tempdir.path().to_path_buf()], ..Default::default() };
    let mut fixture = Fixture::with_discovery(tempdir, discovery);
    fixture.select_volume("T").await;

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*DIN 3 misc")).await;
    assert_eq!(opcode, 0x80, "*DIN should succeed");

    let (opcode, _) = fixture.dispatch(0x06, &star_command_payload(":3")).await;
    assert_eq!(opcode, 0x80);

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*DOUT 3")).await;
    assert_eq!(opcode, 0x80, "*DOUT should succeed");

    let (opcode, payload) = fixture.dispatch(0x06, &star_command_payload(":3")).await;
    assert_eq!(opcode, 0x83, "listing an empty slot is a disc fault");
    assert_eq!(payload[1], 0xFF);
}
