#[path = "support/mod.rs"]
mod support;

use support::{osfile_payload, star_command_payload, Fixture};
use tokio::fs;

/// `*CDIR` creates a new ADFS directory, reachable only through the
/// `STAR_COMMAND` opcode (no `OSFILE` subcommand creates directories).
#[tokio::test]
async fn cdir_creates_adfs_directory() {
    let mut fixture = Fixture::new().await;
    let volume_root = fixture.volume_path("V");
    fs::create_dir_all(volume_root.join("0").join("$")).await.unwrap();
    fs::write(volume_root.join(".adfs"), b"").await.unwrap();
    fixture.select_volume("V").await;

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*CDIR $.DOCS")).await;
    assert_eq!(opcode, 0x80, "*CDIR should succeed");

    let save = osfile_payload(0, 0, 0, 0, 0, "$.DOCS.LETTER", b"HI");
    let (opcode, payload) = fixture.dispatch(0x0B, &save).await;
    assert_eq!(opcode, 0x86, "unexpected opcode: {payload:?}");
}

/// `*CDIR` on a directory that already exists is `Exists`, not a silent
/// success.
#[tokio::test]
async fn cdir_existing_directory_is_exists_error() {
    let mut fixture = Fixture::new().await;
    let volume_root = fixture.volume_path("V");
    fs::create_dir_all(volume_root.join("0").join("$").join("DOCS")).await.unwrap();
    fs::write(volume_root.join(".adfs"), b"").await.unwrap();
    fixture.select_volume("V").await;

    let (opcode, payload) = fixture.dispatch(0x0A, &star_command_payload("*CDIR $.DOCS")).await;
    assert_eq!(opcode, 0x83, "expected ERROR response");
    assert_eq!(payload[1], 0xC4, "Exists code");
}

/// `*RENAME` moves a file within the same ADFS volume.
#[tokio::test]
async fn rename_moves_file_within_volume() {
    let mut fixture = Fixture::new().await;
    let volume_root = fixture.volume_path("V");
    fs::create_dir_all(volume_root.join("0").join("$")).await.unwrap();
    fs::write(volume_root.join(".adfs"), b"").await.unwrap();
    fixture.select_volume("V").await;

    let save = osfile_payload(0, 0x1900, 0x8023, 0, 0, "$.OLD", b"CONTENT");
    let (opcode, _) = fixture.dispatch(0x0B, &save).await;
    assert_eq!(opcode, 0x86);

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*RENAME $.OLD $.NEW")).await;
    assert_eq!(opcode, 0x80, "*RENAME should succeed");

    let load = osfile_payload(255, 0, 0, 0, 0, "$.NEW", &[]);
    let (opcode, payload) = fixture.dispatch(0x0B, &load).await;
    assert_eq!(opcode, 0x86);
    assert_eq!(&payload[17..], b"CONTENT");

    let load_old = osfile_payload(255, 0, 0, 0, 0, "$.OLD", &[]);
    let (opcode, payload) = fixture.dispatch(0x0B, &load_old).await;
    assert_eq!(opcode, 0x83, "old name should be gone");
    assert_eq!(payload[1], 0xD6);
}

/// `*RENAME` onto a name that already exists fails `Exists` rather than
/// overwriting it.
#[tokio::test]
async fn rename_onto_existing_name_is_exists_error() {
    let mut fixture = Fixture::new().await;
    let volume_root = fixture.volume_path("V");
    fs::create_dir_all(volume_root.join("0").join("$")).await.unwrap();
    fs::write(volume_root.join(".adfs"), b"").await.unwrap();
    fixture.select_volume("V").await;

    for name in ["$.OLD", "$.NEW"] {
        let save = osfile_payload(0, 0, 0, 0, 0, name, b"X");
        let (opcode, _) = fixture.dispatch(0x0B, &save).await;
        assert_eq!(opcode, 0x86);
    }

    let (opcode, payload) = fixture.dispatch(0x0A, &star_command_payload("*RENAME $.OLD $.NEW")).await;
    assert_eq!(opcode, 0x83, "expected ERROR response");
    assert_eq!(payload[1], 0xC4, "Exists code");
}

/// `*LOCATE` (and its `*LCAT`/`*LEX` aliases) searches the current volume
/// for a wildcard match and reports `volume:name` pairs via the server
/// string.
#[tokio::test]
async fn locate_finds_file_across_the_current_volume() {
    let mut fixture = Fixture::new().await;
    fixture.make_dfs_volume("V").await;
    fixture.select_volume("V").await;

    let save = osfile_payload(0, 0, 0, 0, 0, "$.TARGET", b"X");
    let (opcode, _) = fixture.dispatch(0x0B, &save).await;
    assert_eq!(opcode, 0x86);

    for command in ["*LOCATE TARGET", "*LCAT TARGET", "*LEX TARGET"] {
        let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload(command)).await;
        assert_eq!(opcode, 0x80, "{command} should succeed");

        let (opcode, payload) = fixture.dispatch(0x05, &[0xFF]).await;
        assert_eq!(opcode, 0x82, "expected DATA opcode");
        assert_eq!(payload, b"V:TARGET");
    }
}
