#[path = "support/mod.rs"]
mod support;

use support::{osfile_payload, Fixture};
use tokio::fs;

/// E2 through the dispatcher: an ADFS volume's hierarchical `$.DOCS.LETTER`
/// directory walk, reached via a `.adfs` sidecar promoting a DFS-shaped
/// volume root to the ADFS adapter.
#[tokio::test]
async fn scenario_e2_adfs_directory_walk_through_dispatcher() {
    let mut fixture = Fixture::new().await;
    let volume_root = fixture.volume_path("V");
    fs::create_dir_all(volume_root.join("0").join("$").join("DOCS")).await.unwrap();
    fs::write(volume_root.join(".adfs"), b"").await.unwrap();
    fixture.select_volume("V").await;

    let save = osfile_payload(0, 0x2000, 0x8000, 0, 0, "$.DOCS.LETTER", b"DEAR SIR");
    let (opcode, payload) = fixture.dispatch(0x0B, &save).await;
    assert_eq!(opcode, 0x86, "unexpected opcode: {payload:?}");
    assert_eq!(payload[0], 1, "file type");

    let load = osfile_payload(255, 0, 0, 0, 0, "$.DOCS.LETTER", &[]);
    let (opcode, payload) = fixture.dispatch(0x0B, &load).await;
    assert_eq!(opcode, 0x86);
    assert_eq!(&payload[17..], b"DEAR SIR");
}

/// Writing into an intermediate directory that doesn't exist yet is
/// `FileNotFound`, not a silently created tree (§4.4.2).
#[tokio::test]
async fn missing_intermediate_dir_through_dispatcher_is_file_not_found() {
    let mut fixture = Fixture::new().await;
    let volume_root = fixture.volume_path("V");
    fs::create_dir_all(volume_root.join("0").join("$")).await.unwrap();
    fs::write(volume_root.join(".adfs"), b"").await.unwrap();
    fixture.select_volume("V").await;

    let save = osfile_payload(0, 0x2000, 0x8000, 0, 0, "$.DOCS.LETTER", b"DEAR SIR");
    let (opcode, payload) = fixture.dispatch(0x0B, &save).await;
    assert_eq!(opcode, 0x83, "expected ERROR response");
    assert_eq!(payload[1], 0xD6, "File not found code");
}
