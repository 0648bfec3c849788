#[path = "support/mod.rs"]
mod support;

use beeblink_server::fs::volume::DiscoveryConfig;
use support::{star_command_payload, Fixture};
use tempfile::TempDir;
use tokio::fs;

/// `*HFOLDERS`/`*HCF`/`*HMKF`/`*DCAT`/`*DCREATE` manage a TubeHost volume's
/// host namespace independently of the drive-slot changer commands.
#[tokio::test]
async fn host_namespace_commands_manage_folders_and_disks() {
    let tempdir = TempDir::new().unwrap();
    fs::write(tempdir.path().join(".volume"), b"T\n").await.unwrap();
    fs::create_dir_all(tempdir.path().join("games")).await.unwrap();
    fs::create_dir_all(tempdir.path().join("games").join("0.ARCADE")).await.unwrap();

    let discovery = DiscoveryConfig { tubehost_roots: vec![tempdir.path().to_path_buf()], ..Default::default() };
    let mut fixture = Fixture::with_discovery(tempdir, discovery);
    fixture.select_volume("T").await;

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*HFOLDERS")).await;
    assert_eq!(opcode, 0x80);
    let (opcode, payload) = fixture.dispatch(0x05, &[0xFF]).await;
    assert_eq!(opcode, 0x82);
    assert_eq!(payload, b"games");

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*HMKF utils")).await;
    assert_eq!(opcode, 0x80, "*HMKF should create a new folder");

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*HFOLDERS")).await;
    assert_eq!(opcode, 0x80);
    let (opcode, payload) = fixture.dispatch(0x05, &[0xFF]).await;
    assert_eq!(opcode, 0x82);
    assert_eq!(payload, b"games utils");

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*HCF games")).await;
    assert_eq!(opcode, 0x80, "*HCF should select the folder");

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*DCAT")).await;
    assert_eq!(opcode, 0x80, "*DCAT with no argument uses the *HCF selection");
    let (opcode, payload) = fixture.dispatch(0x05, &[0xFF]).await;
    assert_eq!(opcode, 0x82);
    assert_eq!(payload, b"0.ARCADE");

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*DCREATE 1.NEWDISK")).await;
    assert_eq!(opcode, 0x80, "*DCREATE should create a disk inside the selected folder");

    let (opcode, _) = fixture.dispatch(0x0A, &star_command_payload("*DCAT games")).await;
    assert_eq!(opcode, 0x80, "*DCAT with an explicit folder name");
    let (opcode, payload) = fixture.dispatch(0x05, &[0xFF]).await;
    assert_eq!(opcode, 0x82);
    assert_eq!(payload, b"0.ARCADE 1.NEWDISK");
}

/// `*HMKF` on a folder that already exists is `Exists`, not a silent
/// no-op.
#[tokio::test]
async fn hmkf_existing_folder_is_exists_error() {
    let tempdir = TempDir::new().unwrap();
    fs::write(tempdir.path().join(".volume"), b"T\n").await.unwrap();
    fs::create_dir_all(tempdir.path().join("games")).await.unwrap();

    let discovery = DiscoveryConfig { tubehost_roots: vec![tempdir.path().to_path_buf()], ..Default::default() };
    let mut fixture = Fixture::with_discovery(tempdir, discovery);
    fixture.select_volume("T").await;

    let (opcode, payload) = fixture.dispatch(0x0A, &star_command_payload("*HMKF games")).await;
    assert_eq!(opcode, 0x83, "expected ERROR response");
    assert_eq!(payload[1], 0xC4, "Exists code");
}
