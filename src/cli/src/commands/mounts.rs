//! `guestdisk mounts` command - root filesystem and mount tree.

use std::path::PathBuf;

use clap::Args;
use guestdisk_core::InspectConfig;

use crate::output;

#[derive(Args)]
pub struct MountsArgs {
    /// Disk image to inspect
    pub disk: PathBuf,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: MountsArgs, config: InspectConfig) -> Result<(), Box<dyn std::error::Error>> {
    let session = super::open_session(&args.disk, config)?;

    if args.json {
        let json = serde_json::json!({
            "root": session.root_filesystem(),
            "mountpoints": session.mountpoints(),
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("Root filesystem: {}", session.root_filesystem());
        let mut table = output::new_table(&["MOUNTPOINT", "PARTITION"]);
        for (mountpoint, partition) in session.mountpoints() {
            table.add_row(&[mountpoint, partition]);
        }
        println!("{table}");
    }

    session.close()?;
    Ok(())
}
