use seed_server::openvpn::{
    ArtifactKind, ArtifactWriter, FileStore, GenerateError, LocalFileStore, OutputLayout,
    SeedServerValues, TeraRenderer, Templates, layout_in,
};
use shared_utils::network::{AllocationError, IpFamilies};
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn values(is_ha: bool, vpn_index: usize, ha_vpn_clients: usize) -> SeedServerValues {
    SeedServerValues {
        device: "tun0".to_string(),
        ip_families: IpFamilies::Ipv4,
        status_path: "/srv/status/openvpn.status".to_string(),
        openvpn_network: "192.168.123.0/24".parse().unwrap(),
        openvpn_network_pool: "192.168.123.0/24".parse().unwrap(),
        shoot_networks: vec![
            "100.64.0.0/13".parse().unwrap(),
            "10.250.0.0/16".parse().unwrap(),
        ],
        ha_vpn_clients,
        is_ha,
        vpn_index,
        local_node_ip: String::new(),
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_non_ha_writes_server_and_client_config() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let writer = ArtifactWriter::new(layout.clone());

    // the client count is ignored while HA is off
    let report = writer
        .write_server_config_files(&values(false, 0, 5))
        .unwrap();

    assert_eq!(
        report.written,
        vec![
            (ArtifactKind::ServerConfig, layout.server_config.clone()),
            (ArtifactKind::ClientConfig, layout.client_config_path()),
        ]
    );
    assert_eq!(files_in(dir.path()), vec!["client-config-dir", "openvpn.config"]);
    assert_eq!(files_in(&layout.client_config_dir), vec!["vpn-shoot-client"]);

    let server = fs::read_to_string(&layout.server_config).unwrap();
    assert!(server.lines().any(|l| l == "server 192.168.123.0 255.255.255.0"));
    assert!(
        server
            .lines()
            .any(|l| l == format!("client-config-dir {}", layout.client_config_dir.display()))
    );

    let client = fs::read_to_string(layout.client_config_path()).unwrap();
    assert!(client.contains("iroute 100.64.0.0 255.248.0.0"));
}

#[test]
fn test_ha_writes_one_config_per_client() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let writer = ArtifactWriter::new(layout.clone());

    let report = writer
        .write_server_config_files(&values(true, 0, 3))
        .unwrap();
    assert_eq!(report.written.len(), 5);

    assert_eq!(
        files_in(&layout.client_config_dir),
        vec![
            "vpn-shoot-client",
            "vpn-shoot-client-0",
            "vpn-shoot-client-1",
            "vpn-shoot-client-2",
        ]
    );

    for (index, host) in [(0, 2), (1, 3), (2, 4)] {
        let content = fs::read_to_string(layout.ha_client_config_path(index)).unwrap();
        assert_eq!(
            content.trim(),
            format!("ifconfig-push 192.168.123.{host} 255.255.255.0")
        );
    }
}

#[test]
fn test_ha_second_slot_addresses() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let writer = ArtifactWriter::new(layout.clone());

    writer
        .write_server_config_files(&values(true, 1, 2))
        .unwrap();

    let first = fs::read_to_string(layout.ha_client_config_path(0)).unwrap();
    let second = fs::read_to_string(layout.ha_client_config_path(1)).unwrap();
    assert_eq!(first.trim(), "ifconfig-push 192.168.123.66 255.255.255.0");
    assert_eq!(second.trim(), "ifconfig-push 192.168.123.67 255.255.255.0");
}

#[test]
fn test_ipv6_ha_server_sits_before_its_clients() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let writer = ArtifactWriter::new(layout.clone());

    let mut config = shared_utils::config::Config::default();
    config.tunnel.ip_families = IpFamilies::Ipv6;
    config.tunnel.openvpn_network = Some("fd8f:6d53:b97a:1::/120".parse().unwrap());
    config.ha.enabled = true;
    config.ha.vpn_clients = 2;
    config.ha.vpn_index = 1;
    config.validate().unwrap();
    let values = SeedServerValues::from_config(&config).unwrap();

    writer.write_server_config_files(&values).unwrap();

    let server = fs::read_to_string(&layout.server_config).unwrap();
    assert!(
        server
            .lines()
            .any(|l| l == "ifconfig-ipv6 fd8f:6d53:b97a:1::41/120 fd8f:6d53:b97a:1::41"),
        "{server}"
    );
    let first = fs::read_to_string(layout.ha_client_config_path(0)).unwrap();
    assert!(first.contains("fd8f:6d53:b97a:1::42"), "{first}");
}

#[test]
fn test_repeated_runs_are_identical() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let writer = ArtifactWriter::new(layout.clone());
    let values = values(true, 1, 2);

    let first = writer.write_server_config_files(&values).unwrap();
    let snapshot: Vec<Vec<u8>> = first
        .written
        .iter()
        .map(|(_, path)| fs::read(path).unwrap())
        .collect();

    // the client config directory exists now
    let second = writer.write_server_config_files(&values).unwrap();
    assert_eq!(first, second);

    let again: Vec<Vec<u8>> = second
        .written
        .iter()
        .map(|(_, path)| fs::read(path).unwrap())
        .collect();
    assert_eq!(snapshot, again);
}

#[test]
fn test_render_all_matches_written_files() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let writer = ArtifactWriter::new(layout.clone());
    let values = values(true, 0, 2);

    let rendered = writer.render_all(&values).unwrap();
    assert!(!dir.path().join("openvpn.config").exists());
    assert_eq!(
        rendered.iter().map(|a| a.kind).collect::<Vec<_>>(),
        vec![
            ArtifactKind::ServerConfig,
            ArtifactKind::ClientConfig,
            ArtifactKind::HaClientConfig(0),
            ArtifactKind::HaClientConfig(1),
        ]
    );

    writer.write_server_config_files(&values).unwrap();
    for artifact in rendered {
        assert_eq!(fs::read(&artifact.path).unwrap(), artifact.content);
    }
}

#[test]
fn test_allocation_overflow_aborts_remaining_clients() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let writer = ArtifactWriter::new(layout.clone());
    let values = values(true, 3, 63);

    let err = writer.write_server_config_files(&values).unwrap_err();
    match &err {
        GenerateError::AllocationOverflow { index, source, .. } => {
            assert_eq!(*index, 62);
            assert_eq!(
                *source,
                AllocationError::Overflow {
                    slot: 3,
                    instance: 62
                }
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.artifact(), ArtifactKind::HaClientConfig(62));
    assert_eq!(err.values(), &values);

    // earlier artifacts stay on disk
    assert!(layout.server_config.exists());
    assert!(layout.client_config_path().exists());
    assert!(layout.ha_client_config_path(61).exists());
    assert!(!layout.ha_client_config_path(62).exists());

    let last = fs::read_to_string(layout.ha_client_config_path(61)).unwrap();
    assert_eq!(last.trim(), "ifconfig-push 192.168.123.255 255.255.255.0");
}

#[test]
fn test_render_failure_names_artifact() {
    let dir = tempdir().unwrap();
    let layout = layout_in(dir.path());
    let templates = Templates {
        ha_client: "ifconfig-push {{ no_such_value }}".into(),
        ..Templates::embedded()
    };
    let writer = ArtifactWriter::with_parts(templates, TeraRenderer, LocalFileStore, layout.clone());

    let err = writer
        .write_server_config_files(&values(true, 0, 2))
        .unwrap_err();

    assert!(matches!(
        err,
        GenerateError::Render {
            artifact: ArtifactKind::HaClientConfig(0),
            ..
        }
    ));
    assert_eq!(err.to_string(), "could not generate HA shoot client config 0");
    assert!(layout.client_config_path().exists());
    assert!(!layout.ha_client_config_path(0).exists());
}

#[test]
fn test_directory_failure_is_reported() {
    let dir = tempdir().unwrap();
    let layout = OutputLayout {
        server_config: dir.path().join("openvpn.config"),
        client_config_dir: dir.path().join("missing").join("client-config-dir"),
        client_config_prefix: "vpn-shoot-client".to_string(),
    };
    let writer = ArtifactWriter::new(layout.clone());

    let err = writer
        .write_server_config_files(&values(false, 0, 0))
        .unwrap_err();

    match err {
        GenerateError::Storage {
            artifact,
            path,
            source,
            ..
        } => {
            assert_eq!(artifact, ArtifactKind::ClientConfig);
            assert_eq!(path, layout.client_config_dir);
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(layout.server_config.exists());
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Mkdir(PathBuf, u32),
    Write(PathBuf, u32),
}

#[derive(Default)]
struct RecordingStore {
    ops: RefCell<Vec<Op>>,
}

impl FileStore for RecordingStore {
    fn write(&self, path: &Path, _contents: &[u8], mode: u32) -> io::Result<()> {
        self.ops
            .borrow_mut()
            .push(Op::Write(path.to_path_buf(), mode));
        Ok(())
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.ops
            .borrow_mut()
            .push(Op::Mkdir(path.to_path_buf(), mode));
        Ok(())
    }
}

#[test]
fn test_stages_run_in_order() {
    let store = RecordingStore::default();
    let layout = OutputLayout::default();
    let writer =
        ArtifactWriter::with_parts(Templates::embedded(), TeraRenderer, &store, layout.clone());

    writer
        .write_server_config_files(&values(true, 1, 2))
        .unwrap();

    assert_eq!(
        *store.ops.borrow(),
        vec![
            Op::Write(PathBuf::from("/openvpn.config"), 0o644),
            Op::Mkdir(PathBuf::from("/client-config-dir"), 0o750),
            Op::Write(PathBuf::from("/client-config-dir/vpn-shoot-client"), 0o644),
            Op::Write(PathBuf::from("/client-config-dir/vpn-shoot-client-0"), 0o644),
            Op::Write(PathBuf::from("/client-config-dir/vpn-shoot-client-1"), 0o644),
        ]
    );
}

struct FailingStore {
    fail_on: PathBuf,
}

impl FileStore for FailingStore {
    fn write(&self, path: &Path, _contents: &[u8], _mode: u32) -> io::Result<()> {
        if path == self.fail_on {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        Ok(())
    }

    fn mkdir(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_write_failure_stops_the_pass() {
    let layout = OutputLayout::default();
    let store = FailingStore {
        fail_on: layout.ha_client_config_path(0),
    };
    let writer = ArtifactWriter::with_parts(Templates::embedded(), TeraRenderer, store, layout);

    let err = writer
        .write_server_config_files(&values(true, 0, 3))
        .unwrap_err();

    assert_eq!(err.artifact(), ArtifactKind::HaClientConfig(0));
    assert!(matches!(
        err,
        GenerateError::Storage { ref source, .. } if source.kind() == io::ErrorKind::PermissionDenied
    ));
}
