//! `pwvault version`: display version information.

use console::style;

use crate::errors::Result;
use crate::vault::DEFAULT_VERSION;

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    let current = env!("CARGO_PKG_VERSION");
    println!("pwvault {current}");
    println!(
        "{} PWS3 {}.{:02}",
        style("Writes format").dim(),
        DEFAULT_VERSION >> 8,
        DEFAULT_VERSION & 0xff
    );
    Ok(())
}
