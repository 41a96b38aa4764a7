//! guestdisk CLI - inspect virtual machine disk images offline.

pub mod commands;
pub mod output;
