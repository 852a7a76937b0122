//! One module per `pwvault` subcommand.

pub mod add;
pub mod autotype;
pub mod completions;
pub mod delete;
pub mod history;
pub mod info;
pub mod init;
pub mod list;
pub mod policy;
pub mod rotate;
pub mod set;
pub mod show;
pub mod version;
