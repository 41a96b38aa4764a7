//! Guest account database parsing.

use std::collections::HashMap;

use guestdisk_core::error::{InspectError, Result};
use serde::{Deserialize, Serialize};

/// A human account from the guest's `/etc/passwd`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Numeric user id
    pub uid: i64,
    /// Numeric primary group id
    pub gid: i64,
    /// Home directory
    pub home: String,
}

/// Parse passwd-format `content`, keeping accounts with `uid >= min_uid`.
///
/// Records are `name:password:uid:gid:gecos:home:shell`. Blank lines are
/// skipped. A record with too few fields, or whose uid or gid is not an
/// integer, fails the whole parse. Negative ids (`nobody:x:-2:...`) are
/// valid and fall below any threshold. When a username repeats, the later
/// record replaces the earlier one.
pub fn parse_passwd(content: &str, min_uid: u32) -> Result<HashMap<String, UserAccount>> {
    let mut accounts = HashMap::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = index + 1;

        let fields: Vec<&str> = line.split(':').collect();
        if fields.len() < 6 {
            return Err(InspectError::MalformedAccount {
                line: line_no,
                reason: format!("expected at least 6 fields, found {}", fields.len()),
            });
        }

        let uid = parse_id(fields[2], "uid", line_no)?;
        let gid = parse_id(fields[3], "gid", line_no)?;
        if uid < i64::from(min_uid) {
            continue;
        }

        accounts.insert(
            fields[0].to_string(),
            UserAccount {
                uid,
                gid,
                home: fields[5].to_string(),
            },
        );
    }

    Ok(accounts)
}

fn parse_id(value: &str, field: &str, line: usize) -> Result<i64> {
    value.parse().map_err(|_| InspectError::MalformedAccount {
        line,
        reason: format!("{} '{}' is not an integer", field, value),
    })
}
