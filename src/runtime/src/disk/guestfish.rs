//! Guestfish backend for `DiskHandle`.
//!
//! Starts a `guestfish --listen` daemon and drives it with
//! `guestfish --remote=<pid> -- <command>` invocations, one per primitive.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use guestdisk_core::config::{AugeasOptions, InspectConfig};
use guestdisk_core::error::{InspectError, Result};

use super::{DiskHandle, MountMap};

/// A disk image attached to a guestfish daemon.
#[derive(Debug)]
pub struct GuestfishHandle {
    /// Path to the guestfish binary
    guestfish: PathBuf,
    /// Attached disk image
    disk_path: PathBuf,
    /// Daemon PID (None once shut down)
    pid: Option<u32>,
}

impl GuestfishHandle {
    /// Start a guestfish daemon, attach `disk_path` and launch the appliance.
    ///
    /// If any step after the daemon starts fails, the returned error drops
    /// the half-built handle, which shuts the daemon down.
    pub fn launch(disk_path: impl AsRef<Path>, config: &InspectConfig) -> Result<Self> {
        let disk_path = disk_path.as_ref().to_path_buf();
        if !disk_path.exists() {
            return Err(InspectError::LaunchFailed {
                message: format!("Disk image not found: {}", disk_path.display()),
                hint: None,
            });
        }

        tracing::debug!(guestfish = %config.guestfish.display(), "Starting guestfish daemon");
        let output = Command::new(&config.guestfish)
            .arg("--listen")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| InspectError::LaunchFailed {
                message: format!("Failed to spawn {}: {}", config.guestfish.display(), e),
                hint: Some("Install libguestfs-tools or set `guestfish` in the config".to_string()),
            })?;

        if !output.status.success() {
            return Err(InspectError::LaunchFailed {
                message: format!(
                    "guestfish --listen exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                hint: None,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let pid = parse_listen_pid(&stdout).ok_or_else(|| InspectError::LaunchFailed {
            message: format!("Unexpected guestfish --listen output: {}", stdout.trim()),
            hint: None,
        })?;

        let handle = Self {
            guestfish: config.guestfish.clone(),
            disk_path,
            pid: Some(pid),
        };
        tracing::debug!(pid, disk = %handle.disk_path.display(), "guestfish daemon listening");

        let disk = handle.disk_path.to_string_lossy().into_owned();
        let mut add_drive = vec!["add-drive".to_string(), disk];
        if let Some(ref format) = config.format {
            add_drive.push(format!("format:{}", format));
        }
        if config.readonly {
            add_drive.push("readonly:true".to_string());
        }
        let add_drive: Vec<&str> = add_drive.iter().map(String::as_str).collect();
        handle.run(&add_drive)?;

        if config.selinux {
            handle.run(&["set-selinux", "true"])?;
        }

        handle.run(&["launch"])?;
        tracing::info!(pid, disk = %handle.disk_path.display(), "Disk image launched");

        Ok(handle)
    }

    /// Get the attached disk image path.
    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    /// Get the daemon PID, if still running.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Run one remote command and return its stdout.
    fn run(&self, args: &[&str]) -> Result<String> {
        let operation = args.first().copied().unwrap_or_default();
        let pid = self.pid.ok_or_else(|| {
            InspectError::backend(operation, "guestfish daemon has been shut down")
        })?;
        remote(&self.guestfish, pid, args)
    }
}

fn remote(guestfish: &Path, pid: u32, args: &[&str]) -> Result<String> {
    let operation = args.first().copied().unwrap_or_default();
    tracing::debug!(pid, ?args, "guestfish remote command");

    let output = Command::new(guestfish)
        .arg(format!("--remote={}", pid))
        .arg("--")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| InspectError::backend(operation, format!("failed to spawn guestfish: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InspectError::backend(operation, stderr.trim()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl DiskHandle for GuestfishHandle {
    fn inspect_os(&self) -> Result<Vec<String>> {
        let out = self.run(&["inspect-os"])?;
        Ok(non_empty_lines(&out))
    }

    fn inspect_get_mountpoints(&self, root: &str) -> Result<MountMap> {
        let out = self.run(&["inspect-get-mountpoints", root])?;
        Ok(parse_mountpoints(&out))
    }

    fn mount(&self, partition: &str, mountpoint: &str) -> Result<()> {
        self.run(&["mount", partition, mountpoint]).map(|_| ())
    }

    fn cat(&self, path: &str) -> Result<String> {
        self.run(&["cat", path])
    }

    fn find(&self, directory: &str) -> Result<Vec<String>> {
        let out = self.run(&["find", directory])?;
        Ok(non_empty_lines(&out))
    }

    fn is_dir(&self, path: &str) -> Result<bool> {
        let out = self.run(&["is-dir", path, "followsymlinks:true"])?;
        match out.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(InspectError::backend(
                "is-dir",
                format!("unexpected output: {}", other),
            )),
        }
    }

    fn aug_init(&self, root: &str, options: AugeasOptions) -> Result<()> {
        let flags = augeas_flags(&options).to_string();
        self.run(&["aug-init", root, &flags]).map(|_| ())
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(pid) = self.pid.take() {
            remote(&self.guestfish, pid, &["exit"])?;
            tracing::debug!(pid, "guestfish daemon stopped");
        }
        Ok(())
    }
}

impl Drop for GuestfishHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "Failed to stop guestfish daemon");
        }
    }
}

/// Extract the daemon PID from `guestfish --listen` output
/// (`GUESTFISH_PID=4242; export GUESTFISH_PID`).
pub fn parse_listen_pid(output: &str) -> Option<u32> {
    let rest = output.split("GUESTFISH_PID=").nth(1)?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parse `inspect-get-mountpoints` output (`/boot: /dev/sda1` per line).
pub fn parse_mountpoints(output: &str) -> MountMap {
    output
        .lines()
        .filter_map(|line| line.split_once(": "))
        .map(|(mountpoint, partition)| (mountpoint.trim().to_string(), partition.trim().to_string()))
        .collect()
}

/// Numeric `aug-init` flag word for the given options.
pub fn augeas_flags(options: &AugeasOptions) -> u32 {
    const AUG_SAVE_BACKUP: u32 = 1;
    const AUG_SAVE_NEWFILE: u32 = 2;
    const AUG_TYPE_CHECK: u32 = 4;
    const AUG_NO_STDINC: u32 = 8;
    const AUG_SAVE_NOOP: u32 = 16;
    const AUG_NO_LOAD: u32 = 32;

    [
        (options.save_backup, AUG_SAVE_BACKUP),
        (options.save_new_file, AUG_SAVE_NEWFILE),
        (options.type_check, AUG_TYPE_CHECK),
        (options.no_std_include, AUG_NO_STDINC),
        (options.save_noop, AUG_SAVE_NOOP),
        (options.no_load, AUG_NO_LOAD),
    ]
    .iter()
    .filter(|(enabled, _)| *enabled)
    .fold(0, |flags, (_, bit)| flags | bit)
}

fn non_empty_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
