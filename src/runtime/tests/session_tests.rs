//! GuestSession behaviour against a recording in-memory disk.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use guestdisk_core::config::{AugeasOptions, InspectConfig};
use guestdisk_core::error::{InspectError, Result};
use guestdisk_runtime::{DiskHandle, GuestSession, MountMap, UserAccount};
use parking_lot::Mutex;
use tracing::Dispatch;

#[derive(Default)]
struct DiskState {
    roots: Vec<String>,
    mountpoints: MountMap,
    files: HashMap<String, String>,
    /// Directory -> listing relative to it
    dirs: HashMap<String, Vec<String>>,
    fail_mount: Option<String>,
    fail_find: Option<String>,

    mount_calls: Vec<String>,
    aug_init_calls: Vec<(String, AugeasOptions)>,
    cat_calls: usize,
    find_calls: usize,
    shutdowns: usize,
    drops: usize,
}

struct RecordingDisk {
    state: Arc<Mutex<DiskState>>,
}

impl DiskHandle for RecordingDisk {
    fn inspect_os(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().roots.clone())
    }

    fn inspect_get_mountpoints(&self, _root: &str) -> Result<MountMap> {
        Ok(self.state.lock().mountpoints.clone())
    }

    fn mount(&self, _partition: &str, mountpoint: &str) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_mount.as_deref() == Some(mountpoint) {
            return Err(InspectError::backend("mount", "wrong fs type"));
        }
        state.mount_calls.push(mountpoint.to_string());
        Ok(())
    }

    fn cat(&self, path: &str) -> Result<String> {
        let mut state = self.state.lock();
        state.cat_calls += 1;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| InspectError::backend("cat", format!("{}: No such file", path)))
    }

    fn find(&self, directory: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.find_calls += 1;
        if state.fail_find.as_deref() == Some(directory) {
            return Err(InspectError::backend("find", "Input/output error"));
        }
        state
            .dirs
            .get(directory)
            .cloned()
            .ok_or_else(|| InspectError::backend("find", format!("{}: No such directory", directory)))
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        Ok(self.state.lock().dirs.contains_key(path))
    }

    fn aug_init(&self, root: &str, options: AugeasOptions) -> Result<()> {
        self.state
            .lock()
            .aug_init_calls
            .push((root.to_string(), options));
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.state.lock().shutdowns += 1;
        Ok(())
    }
}

impl Drop for RecordingDisk {
    fn drop(&mut self) {
        self.state.lock().drops += 1;
    }
}

fn single_root_state() -> DiskState {
    let mut state = DiskState {
        roots: vec!["/dev/sda2".to_string()],
        ..Default::default()
    };
    state.mountpoints.insert("/".to_string(), "/dev/sda2".to_string());
    state.mountpoints.insert("/boot".to_string(), "/dev/sda1".to_string());
    state
}

fn open(state: DiskState) -> (Arc<Mutex<DiskState>>, Result<GuestSession<RecordingDisk>>) {
    open_with(state, Dispatch::none())
}

fn open_with(
    state: DiskState,
    dispatch: Dispatch,
) -> (Arc<Mutex<DiskState>>, Result<GuestSession<RecordingDisk>>) {
    let state = Arc::new(Mutex::new(state));
    let disk = RecordingDisk {
        state: state.clone(),
    };
    let session = GuestSession::with_handle(disk, "/images/guest.qcow2", InspectConfig::default(), dispatch);
    (state, session)
}

fn set_dir(state: &mut DiskState, dir: &str, entries: &[&str]) {
    state
        .dirs
        .insert(dir.to_string(), entries.iter().map(|e| e.to_string()).collect());
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_construction_with_single_root() {
    let (state, session) = open(single_root_state());
    let session = session.unwrap();

    assert_eq!(session.root_filesystem(), "/dev/sda2");
    assert_eq!(session.disk_path().to_str(), Some("/images/guest.qcow2"));
    assert_eq!(session.mountpoints().len(), 2);
    assert!(session.config_editor_ready());

    let state = state.lock();
    assert_eq!(state.mount_calls, vec!["/", "/boot"]);
    assert_eq!(state.aug_init_calls.len(), 1);
    let (root, options) = &state.aug_init_calls[0];
    assert_eq!(root, "/");
    assert_eq!(*options, AugeasOptions::default());
    assert!(options.save_backup);
    assert_eq!(state.drops, 0);
}

#[test]
fn test_construction_without_root_fails() {
    let (state, session) = open(DiskState::default());
    match session.unwrap_err() {
        InspectError::AmbiguousRoot { found } => assert!(found.is_empty()),
        other => panic!("unexpected error: {other}"),
    }

    let state = state.lock();
    assert!(state.mount_calls.is_empty());
    assert!(state.aug_init_calls.is_empty());
    // Disk released on the error path
    assert_eq!(state.drops, 1);
}

#[test]
fn test_construction_with_two_roots_fails() {
    let mut disk = single_root_state();
    disk.roots.push("/dev/sdb1".to_string());
    let (state, session) = open(disk);

    match session.unwrap_err() {
        InspectError::AmbiguousRoot { found } => {
            assert_eq!(found, vec!["/dev/sda2", "/dev/sdb1"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let state = state.lock();
    assert!(state.mount_calls.is_empty());
    assert_eq!(state.drops, 1);
}

#[test]
fn test_mounts_parents_before_children() {
    let mut disk = single_root_state();
    for (mountpoint, partition) in [
        ("/var/log", "/dev/vg0/log"),
        ("/home", "/dev/sda4"),
        ("/var", "/dev/sda3"),
        ("/usr", "/dev/vg0/usr"),
    ] {
        disk.mountpoints
            .insert(mountpoint.to_string(), partition.to_string());
    }

    let (state, session) = open(disk);
    let session = session.unwrap();

    let expected = vec!["/", "/boot", "/home", "/usr", "/var", "/var/log"];
    assert_eq!(state.lock().mount_calls, expected);
    let order: Vec<&str> = session.mountpoints().keys().map(String::as_str).collect();
    assert_eq!(order, expected);
}

#[test]
fn test_mount_failure_aborts_construction() {
    let mut disk = single_root_state();
    disk.mountpoints
        .insert("/var".to_string(), "/dev/sda3".to_string());
    disk.mountpoints
        .insert("/var/log".to_string(), "/dev/sda5".to_string());
    disk.fail_mount = Some("/var".to_string());

    let (state, session) = open(disk);
    match session.unwrap_err() {
        InspectError::MountFailed {
            mountpoint,
            partition,
            message,
        } => {
            assert_eq!(mountpoint, "/var");
            assert_eq!(partition, "/dev/sda3");
            assert_eq!(message, "wrong fs type");
        }
        other => panic!("unexpected error: {other}"),
    }

    let state = state.lock();
    // Earlier mounts stay, nothing after the failure is attempted
    assert_eq!(state.mount_calls, vec!["/", "/boot"]);
    assert!(state.aug_init_calls.is_empty());
    assert_eq!(state.drops, 1);
}

#[test]
fn test_close_shuts_down_disk() {
    let (state, session) = open(single_root_state());
    session.unwrap().close().unwrap();

    let state = state.lock();
    assert_eq!(state.shutdowns, 1);
    assert_eq!(state.drops, 1);
}

// ============================================================================
// Accounts
// ============================================================================

const PASSWD: &str = "\
root:x:0:0:root:/root:/bin/bash
games:x:500:100:games:/usr/games:/usr/sbin/nologin
nobody:x:999:999:nobody:/:/usr/sbin/nologin
alice:x:1000:1000:Alice:/home/alice:/bin/bash
bob:x:1001:1001:Bob:/home/bob:/bin/bash
";

fn state_with_passwd(content: &str) -> DiskState {
    let mut disk = single_root_state();
    disk.files
        .insert("/etc/passwd".to_string(), content.to_string());
    disk
}

#[test]
fn test_users_filters_by_uid() {
    let (_state, session) = open(state_with_passwd(PASSWD));
    let mut session = session.unwrap();

    let users = session.users().unwrap();
    let mut names: Vec<&str> = users.keys().map(String::as_str).collect();
    names.sort();
    assert_eq!(names, vec!["alice", "bob"]);
    assert_eq!(
        users["alice"],
        UserAccount {
            uid: 1000,
            gid: 1000,
            home: "/home/alice".to_string(),
        }
    );
}

#[test]
fn test_users_read_once() {
    let (state, session) = open(state_with_passwd(PASSWD));
    let mut session = session.unwrap();

    let first = session.users().unwrap().clone();

    // Changing the file afterwards is not observed
    state.lock().files.insert(
        "/etc/passwd".to_string(),
        "carol:x:2000:2000::/home/carol:/bin/sh\n".to_string(),
    );

    let second = session.users().unwrap();
    assert_eq!(&first, second);
    assert!(!second.contains_key("carol"));
    assert_eq!(state.lock().cat_calls, 1);
}

#[test]
fn test_users_malformed_record_is_error() {
    let (_state, session) = open(state_with_passwd(
        "root:x:0:0:root:/root:/bin/bash\nalice:x:10O0:1000::/home/alice:/bin/sh\n",
    ));
    let mut session = session.unwrap();

    let err = session.users().unwrap_err();
    assert!(matches!(err, InspectError::MalformedAccount { line: 2, .. }));
}

#[test]
fn test_users_missing_database_is_error() {
    let (_state, session) = open(single_root_state());
    let mut session = session.unwrap();
    assert!(matches!(
        session.users().unwrap_err(),
        InspectError::Backend { .. }
    ));
}

// ============================================================================
// Executables
// ============================================================================

fn state_with_bins() -> DiskState {
    let mut disk = single_root_state();
    set_dir(&mut disk, "/bin", &["ls", "foo", "foobar"]);
    set_dir(&mut disk, "/usr/bin", &["foo", "python3", "x86_64/ld-helper"]);
    set_dir(&mut disk, "/sbin", &["init"]);
    set_dir(&mut disk, "/usr/sbin", &["sshd", "ld-helper"]);
    disk
}

#[test]
fn test_executable_root_precedence() {
    let (_state, session) = open(state_with_bins());
    let mut session = session.unwrap();

    for _ in 0..3 {
        assert_eq!(
            session.get_executable_path("foo").unwrap().as_deref(),
            Some("/bin/foo")
        );
    }
}

#[test]
fn test_executable_in_later_roots() {
    let (_state, session) = open(state_with_bins());
    let mut session = session.unwrap();

    assert_eq!(
        session.get_executable_path("sshd").unwrap().as_deref(),
        Some("/usr/sbin/sshd")
    );
    assert_eq!(
        session.get_executable_path("init").unwrap().as_deref(),
        Some("/sbin/init")
    );
    // Nested entries keep their subdirectory and win by root order
    assert_eq!(
        session.get_executable_path("ld-helper").unwrap().as_deref(),
        Some("/usr/bin/x86_64/ld-helper")
    );
}

#[test]
fn test_executable_match_is_anchored() {
    let mut disk = single_root_state();
    set_dir(&mut disk, "/bin", &["foobar", "xfoo"]);
    set_dir(&mut disk, "/usr/bin", &[]);
    set_dir(&mut disk, "/sbin", &[]);
    set_dir(&mut disk, "/usr/sbin", &[]);
    let (_state, session) = open(disk);
    let mut session = session.unwrap();

    assert_eq!(session.get_executable_path("foo").unwrap(), None);
}

#[test]
fn test_executable_miss_is_cached() {
    let (state, session) = open(state_with_bins());
    let mut session = session.unwrap();

    assert_eq!(session.get_executable_path("missing").unwrap(), None);
    let listings = state.lock().find_calls;
    assert_eq!(listings, 4);

    // A binary appearing later is not seen; no re-scan happens
    state
        .lock()
        .dirs
        .get_mut("/bin")
        .unwrap()
        .push("missing".to_string());
    assert_eq!(session.get_executable_path("missing").unwrap(), None);
    assert_eq!(state.lock().find_calls, listings);
}

#[test]
fn test_executable_hit_is_cached_per_name() {
    let (state, session) = open(state_with_bins());
    let mut session = session.unwrap();

    session.get_executable_path("ls").unwrap();
    session.get_executable_path("ls").unwrap();
    assert_eq!(state.lock().find_calls, 4);

    // A different name triggers its own scan
    session.get_executable_path("python3").unwrap();
    assert_eq!(state.lock().find_calls, 8);
}

#[test]
fn test_missing_search_root_is_skipped() {
    let mut disk = single_root_state();
    set_dir(&mut disk, "/usr/bin", &["bash"]);
    set_dir(&mut disk, "/usr/sbin", &["useradd"]);
    let (state, session) = open(disk);
    let mut session = session.unwrap();

    assert_eq!(
        session.get_executable_path("useradd").unwrap().as_deref(),
        Some("/usr/sbin/useradd")
    );
    assert_eq!(state.lock().find_calls, 2);
}

#[test]
fn test_listing_failure_is_error_and_not_cached() {
    let mut disk = state_with_bins();
    disk.fail_find = Some("/usr/bin".to_string());
    let (state, session) = open(disk);
    let mut session = session.unwrap();

    let err = session.get_executable_path("python3").unwrap_err();
    assert!(matches!(err, InspectError::Backend { .. }));
    // Scan stopped at the failing root
    let listings = state.lock().find_calls;
    assert_eq!(listings, 2);

    state.lock().fail_find = None;
    assert_eq!(
        session.get_executable_path("python3").unwrap().as_deref(),
        Some("/usr/bin/python3")
    );
    assert_eq!(state.lock().find_calls, listings + 4);
}

// ============================================================================
// Logging
// ============================================================================

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_events_go_to_injected_dispatch() {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();

    let (_state, session) = open_with(state_with_bins(), Dispatch::new(subscriber));
    let mut session = session.unwrap();
    session.get_executable_path("foo").unwrap();

    let output = String::from_utf8(buf.0.lock().clone()).unwrap();
    assert!(output.contains("Found root filesystem"));
    assert!(output.contains("Found partition"));
    assert!(output.contains("Mounted partition"));
    assert!(output.contains("Resolved executable"));
    assert!(output.contains("matches=2"));
}
