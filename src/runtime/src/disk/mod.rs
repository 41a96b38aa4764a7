//! Disk module - the inspection primitive a session is built on.
//!
//! - `DiskHandle`: capability surface of one attached, launched disk image
//! - `GuestfishHandle`: backend driving a `guestfish --listen` daemon

mod guestfish;

pub use guestfish::{augeas_flags, parse_listen_pid, parse_mountpoints, GuestfishHandle};

use std::collections::HashMap;

use guestdisk_core::config::AugeasOptions;
use guestdisk_core::error::Result;

/// Mountpoint path to partition identifier, as reported by inspection.
///
/// Unordered: callers that mount must impose their own order.
pub type MountMap = HashMap<String, String>;

/// Trait for one attached and launched disk image.
///
/// Every method is a blocking call into the inspection backend. A handle
/// is exclusively owned by one session.
pub trait DiskHandle: Send {
    /// Root filesystem identifiers of the operating systems found on the disk.
    fn inspect_os(&self) -> Result<Vec<String>>;

    /// Mountpoints of the operating system rooted at `root`.
    fn inspect_get_mountpoints(&self, root: &str) -> Result<MountMap>;

    /// Mount `partition` at `mountpoint` inside the guest view.
    fn mount(&self, partition: &str, mountpoint: &str) -> Result<()>;

    /// Full content of a guest file as text.
    fn cat(&self, path: &str) -> Result<String>;

    /// Recursive listing of `directory`, paths relative to it.
    fn find(&self, directory: &str) -> Result<Vec<String>>;

    /// Whether `path` is a directory in the guest, following symlinks.
    fn is_dir(&self, path: &str) -> Result<bool>;

    /// Initialize the config-tree editor rooted at `root`.
    fn aug_init(&self, root: &str, options: AugeasOptions) -> Result<()>;

    /// Release the attached disk. Calling it twice is a no-op.
    fn shutdown(&mut self) -> Result<()>;
}
