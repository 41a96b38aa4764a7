//! Guest filesystem session - one inspected, fully mounted disk image.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use guestdisk_core::config::InspectConfig;
use guestdisk_core::error::{InspectError, Result};
use tracing::dispatcher::{self, Dispatch};

use crate::accounts::{parse_passwd, UserAccount};
use crate::disk::{DiskHandle, GuestfishHandle};
use crate::executables::resolve_executable;

/// An inspected guest whose partitions are mounted in a single tree.
///
/// Construction performs root discovery, mounts every partition and
/// initializes the config-tree editor. It either completes or returns an
/// error; there is no partially built session. Account and executable
/// queries are computed on first use and cached for the session's life.
///
/// All logging goes to the `Dispatch` given at construction. Pass
/// `Dispatch::none()` to silence it.
pub struct GuestSession<H: DiskHandle = GuestfishHandle> {
    handle: H,
    disk_path: PathBuf,
    config: InspectConfig,
    dispatch: Dispatch,
    root_fs: String,
    /// Ordered by path, so parents precede their children
    mountpoints: BTreeMap<String, String>,
    config_editor_ready: bool,
    /// None until first `users()` call
    users: Option<HashMap<String, UserAccount>>,
    /// None until the first executable lookup; a `None` entry is a cached miss
    executables: Option<HashMap<String, Option<String>>>,
}

impl<H: DiskHandle> std::fmt::Debug for GuestSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestSession")
            .field("disk_path", &self.disk_path)
            .field("root_fs", &self.root_fs)
            .field("mountpoints", &self.mountpoints)
            .finish_non_exhaustive()
    }
}

impl GuestSession<GuestfishHandle> {
    /// Attach `disk_path` through guestfish and build a session on it.
    pub fn open(
        disk_path: impl AsRef<Path>,
        config: InspectConfig,
        dispatch: Dispatch,
    ) -> Result<Self> {
        config.validate()?;
        let disk_path = disk_path.as_ref().to_path_buf();
        let handle =
            dispatcher::with_default(&dispatch, || GuestfishHandle::launch(&disk_path, &config))?;
        Self::with_handle(handle, disk_path, config, dispatch)
    }
}

impl<H: DiskHandle> GuestSession<H> {
    /// Build a session on an already launched handle.
    ///
    /// On failure the handle is dropped, releasing the disk. Partitions
    /// mounted before a mount failure are left as they are.
    pub fn with_handle(
        handle: H,
        disk_path: impl Into<PathBuf>,
        config: InspectConfig,
        dispatch: Dispatch,
    ) -> Result<Self> {
        let disk_path = disk_path.into();
        dispatcher::with_default(&dispatch.clone(), move || {
            let root_fs = inspect_root(&handle)?;
            tracing::info!(root = %root_fs, disk = %disk_path.display(), "Found root filesystem");

            let mountpoints: BTreeMap<String, String> =
                handle.inspect_get_mountpoints(&root_fs)?.into_iter().collect();
            for (mountpoint, partition) in &mountpoints {
                tracing::debug!(mountpoint = %mountpoint, partition = %partition, "Found partition");
            }

            mount_tree(&handle, &mountpoints)?;

            handle.aug_init("/", config.augeas)?;
            tracing::debug!(options = ?config.augeas, "Config-tree editor initialized");

            Ok(Self {
                handle,
                disk_path,
                config,
                dispatch,
                root_fs,
                mountpoints,
                config_editor_ready: true,
                users: None,
                executables: None,
            })
        })
    }

    /// Path of the inspected disk image.
    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    /// Root filesystem identifier of the guest operating system.
    pub fn root_filesystem(&self) -> &str {
        &self.root_fs
    }

    /// Mountpoint to partition map, in mount order.
    pub fn mountpoints(&self) -> &BTreeMap<String, String> {
        &self.mountpoints
    }

    pub fn config_editor_ready(&self) -> bool {
        self.config_editor_ready
    }

    /// Human accounts (uid at or above the configured threshold) by username.
    ///
    /// The account database is read once; later calls return the cached
    /// map even if the file changed on disk.
    pub fn users(&mut self) -> Result<&HashMap<String, UserAccount>> {
        let users = match self.users.take() {
            Some(users) => users,
            None => dispatcher::with_default(&self.dispatch, || {
                let content = self.handle.cat(&self.config.passwd_path)?;
                let users = parse_passwd(&content, self.config.min_uid)?;
                tracing::debug!(
                    path = %self.config.passwd_path,
                    count = users.len(),
                    "Loaded guest accounts"
                );
                Ok::<_, InspectError>(users)
            })?,
        };
        Ok(self.users.insert(users))
    }

    /// Absolute guest path of executable `name`, or `None` if no search
    /// root contains it.
    ///
    /// Both hits and misses are cached per name. Backend errors are not
    /// cached.
    pub fn get_executable_path(&mut self, name: &str) -> Result<Option<String>> {
        let cache = self.executables.get_or_insert_with(HashMap::new);

        if let Some(cached) = cache.get(name) {
            return Ok(cached.clone());
        }

        let resolved = dispatcher::with_default(&self.dispatch, || {
            resolve_executable(&self.handle, &self.config.search_roots, name)
        })?;
        cache.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Release the disk, reporting any shutdown error.
    pub fn close(mut self) -> Result<()> {
        let dispatch = self.dispatch.clone();
        dispatcher::with_default(&dispatch, || self.handle.shutdown())
    }
}

fn inspect_root<H: DiskHandle + ?Sized>(handle: &H) -> Result<String> {
    let mut roots = handle.inspect_os()?;
    if roots.len() != 1 {
        return Err(InspectError::AmbiguousRoot { found: roots });
    }
    Ok(roots.swap_remove(0))
}

/// Mount partitions in map order. The first failure aborts.
fn mount_tree<H: DiskHandle + ?Sized>(
    handle: &H,
    mountpoints: &BTreeMap<String, String>,
) -> Result<()> {
    for (mountpoint, partition) in mountpoints {
        handle.mount(partition, mountpoint).map_err(|e| {
            let message = match e {
                InspectError::Backend { message, .. } => message,
                other => other.to_string(),
            };
            InspectError::MountFailed {
                mountpoint: mountpoint.clone(),
                partition: partition.clone(),
                message,
            }
        })?;
        tracing::info!(mountpoint = %mountpoint, partition = %partition, "Mounted partition");
    }
    Ok(())
}
