use clap::Parser;
use tracing_subscriber::EnvFilter;

use pwvault::cli::commands::add::NewEntry;
use pwvault::cli::commands::history::HistoryChange;
use pwvault::cli::commands::policy::PolicyOptions;
use pwvault::cli::commands::set::NewValue;
use pwvault::cli::{Cli, Commands, PolicyAction};

/// Log to stderr, filtered by `PWVAULT_LOG` (default: warnings only).
fn init_logging() {
    let filter = EnvFilter::try_from_env("PWVAULT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            ref name,
            ref description,
        } => pwvault::cli::commands::init::execute(&cli, name.as_deref(), description.as_deref()),
        Commands::List { ref group, json } => {
            pwvault::cli::commands::list::execute(&cli, group.as_deref(), json)
        }
        Commands::Show {
            ref title,
            reveal,
            ref field,
        } => pwvault::cli::commands::show::execute(&cli, title, reveal, field.as_deref()),
        Commands::Add {
            ref title,
            ref group,
            ref user,
            ref url,
            ref email,
            ref notes,
            ref password,
            generate,
            ref policy,
        } => {
            let fields = NewEntry {
                group: group.as_deref(),
                user: user.as_deref(),
                url: url.as_deref(),
                email: email.as_deref(),
                notes: notes.as_deref(),
                password: password.as_deref(),
                generate,
                policy: policy.as_deref(),
            };
            pwvault::cli::commands::add::execute(&cli, title, &fields)
        }
        Commands::Set {
            ref title,
            ref field,
            ref value,
            generate,
            ref policy,
        } => {
            let value = if generate {
                NewValue::Generate(policy.as_deref())
            } else {
                NewValue::Given(value.as_deref())
            };
            pwvault::cli::commands::set::execute(&cli, title, field, value)
        }
        Commands::Delete { ref title, force } => {
            pwvault::cli::commands::delete::execute(&cli, title, force)
        }
        Commands::History {
            ref title,
            enable,
            disable,
            reveal,
        } => {
            let change = match (enable, disable) {
                (Some(max), _) => HistoryChange::Enable(max),
                (None, true) => HistoryChange::Disable,
                (None, false) => HistoryChange::None,
            };
            pwvault::cli::commands::history::execute(&cli, title, change, reveal)
        }
        Commands::Autotype { ref title, raw } => {
            pwvault::cli::commands::autotype::execute(&cli, title, raw)
        }
        Commands::Policy { ref action } => match action {
            PolicyAction::List => pwvault::cli::commands::policy::list(&cli),
            PolicyAction::Add {
                ref name,
                length,
                lower,
                upper,
                digits,
                symbols,
                hex,
                easy_vision,
                pronounceable,
                ref special,
            } => {
                let options = PolicyOptions {
                    length: *length,
                    lower: *lower,
                    upper: *upper,
                    digits: *digits,
                    symbols: *symbols,
                    hex: *hex,
                    easy_vision: *easy_vision,
                    pronounceable: *pronounceable,
                    special: special.clone(),
                };
                pwvault::cli::commands::policy::add(&cli, name, &options)
            }
            PolicyAction::Remove { ref name } => pwvault::cli::commands::policy::remove(&cli, name),
        },
        Commands::Info => pwvault::cli::commands::info::execute(&cli),
        Commands::RotateKey => pwvault::cli::commands::rotate::execute(&cli),
        Commands::Version => pwvault::cli::commands::version::execute(),
        Commands::Completions { shell } => pwvault::cli::commands::completions::execute(shell),
    };

    if let Err(e) = result {
        tracing::debug!(error = ?e, "command failed");
        pwvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
