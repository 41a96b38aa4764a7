//! `guestdisk users` command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use guestdisk_core::InspectConfig;

use crate::output;

#[derive(Args)]
pub struct UsersArgs {
    /// Disk image to inspect
    pub disk: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: UsersArgs, config: InspectConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = super::open_session(&args.disk, config)?;

    // Sorted by username for stable output
    let users: BTreeMap<_, _> = session.users()?.iter().collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else {
        let mut table = output::new_table(&["USER", "UID", "GID", "HOME"]);
        for (name, account) in &users {
            table.add_row(&[
                name.to_string(),
                account.uid.to_string(),
                account.gid.to_string(),
                account.home.clone(),
            ]);
        }
        println!("{table}");
    }

    session.close()?;
    Ok(())
}
