//! Guestdisk Runtime - offline inspection of virtual machine disk images.
//!
//! A [`GuestSession`] attaches a disk image through a [`DiskHandle`],
//! discovers the single root operating system, mounts its partitions in
//! path order and prepares the config-tree editor. Afterwards it answers
//! account and executable queries against the mounted tree, caching each
//! answer for the life of the session.

pub mod accounts;
pub mod disk;
pub mod executables;
pub mod session;

// Re-export common types
pub use accounts::{parse_passwd, UserAccount};
pub use disk::{DiskHandle, GuestfishHandle, MountMap};
pub use executables::resolve_executable;
pub use session::GuestSession;

/// Guestdisk Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
