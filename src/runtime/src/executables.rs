//! Executable lookup across the guest's binary search roots.

use guestdisk_core::error::Result;

use crate::disk::DiskHandle;

/// Find `name` under `roots` on the guest.
///
/// Each root is listed recursively and the listings are concatenated in
/// root order. The first entry whose last path component equals `name`
/// wins. Roots that are not directories in the guest are skipped.
/// Returns `Ok(None)` when nothing matches.
pub fn resolve_executable<H>(handle: &H, roots: &[String], name: &str) -> Result<Option<String>>
where
    H: DiskHandle + ?Sized,
{
    let mut candidates = Vec::new();
    for root in roots {
        if !handle.is_dir(root)? {
            tracing::warn!(root = %root, "Search root missing from guest, skipping");
            continue;
        }
        candidates.extend(handle.find(root)?.iter().map(|rel| join_root(root, rel)));
    }

    let matches: Vec<&String> = candidates
        .iter()
        .filter(|path| last_component(path) == name)
        .collect();

    match matches.first() {
        Some(path) => {
            tracing::debug!(name, path = %path, matches = matches.len(), "Resolved executable");
            Ok(Some((*path).clone()))
        }
        None => Ok(None),
    }
}

/// Re-prepend the search root to a path `find` returned relative to it.
fn join_root(root: &str, relative: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), relative.trim_start_matches('/'))
}

fn last_component(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
