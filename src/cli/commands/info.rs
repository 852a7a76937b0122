//! `pwvault info`: print the vault's header summary.

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::Result;

/// Execute the `info` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let vault = open_vault(cli)?;
    let doc = &vault.document;

    let version = doc.version();
    let rows = vec![
        ("file".to_string(), vault.path.display().to_string()),
        (
            "format".to_string(),
            format!("PWS3 {}.{:02}", version >> 8, version & 0xff),
        ),
        (
            "uuid".to_string(),
            doc.uuid().map(|u| u.to_string()).unwrap_or_default(),
        ),
        ("name".to_string(), doc.name()),
        ("description".to_string(), doc.description()),
        ("entries".to_string(), doc.entries().len().to_string()),
        ("iterations".to_string(), doc.iterations().to_string()),
        ("named policies".to_string(), doc.named_policies().len().to_string()),
        ("last saved".to_string(), output::format_time(doc.last_save_time())),
        ("saved by app".to_string(), doc.last_save_application()),
        ("saved by user".to_string(), doc.last_save_user()),
        ("saved on host".to_string(), doc.last_save_host()),
    ];
    output::print_fields_table(&rows);

    Ok(())
}
