//! `guestdisk which` command - locate executables in the guest.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use guestdisk_core::InspectConfig;

use crate::output;

#[derive(Args)]
pub struct WhichArgs {
    /// Disk image to inspect
    pub disk: PathBuf,

    /// Executable names to look up
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: WhichArgs, config: InspectConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = super::open_session(&args.disk, config)?;

    let mut found = BTreeMap::new();
    for name in &args.names {
        found.insert(name.as_str(), session.get_executable_path(name)?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        let mut table = output::new_table(&["NAME", "PATH"]);
        for (name, path) in &found {
            table.add_row(&[*name, output::or_dash(path.as_deref())]);
        }
        println!("{table}");
    }

    session.close()?;
    Ok(())
}
