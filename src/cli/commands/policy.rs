//! `pwvault policy`: manage the vault's named password policies.

use comfy_table::{ContentArrangement, Table};

use crate::cli::output;
use crate::cli::{open_vault, Cli};
use crate::errors::{PwVaultError, Result};
use crate::vault::generator;
use crate::vault::{Document, NamedPasswordPolicy, PasswordPolicy, PasswordPolicyStyle};

/// Options of `policy add`. A character class is used when its minimum
/// count is given; `--hex` overrides every class.
#[derive(Debug, Default)]
pub struct PolicyOptions {
    pub length: u16,
    pub lower: Option<u16>,
    pub upper: Option<u16>,
    pub digits: Option<u16>,
    pub symbols: Option<u16>,
    pub hex: bool,
    pub easy_vision: bool,
    pub pronounceable: bool,
    pub special: Option<String>,
}

impl PolicyOptions {
    /// Build the policy these options describe.
    pub fn to_policy(&self) -> Result<PasswordPolicy> {
        let mut policy = PasswordPolicy::new(self.length)?;
        let mut style = PasswordPolicyStyle::NONE;

        if let Some(n) = self.lower {
            style |= PasswordPolicyStyle::USE_LOWERCASE;
            policy.set_minimum_lowercase_count(n)?;
        }
        if let Some(n) = self.upper {
            style |= PasswordPolicyStyle::USE_UPPERCASE;
            policy.set_minimum_uppercase_count(n)?;
        }
        if let Some(n) = self.digits {
            style |= PasswordPolicyStyle::USE_DIGITS;
            policy.set_minimum_digit_count(n)?;
        }
        if let Some(n) = self.symbols {
            style |= PasswordPolicyStyle::USE_SYMBOLS;
            policy.set_minimum_symbol_count(n)?;
        }
        if self.hex {
            style |= PasswordPolicyStyle::USE_HEX_DIGITS;
        }
        if self.easy_vision {
            style |= PasswordPolicyStyle::USE_EASY_VISION;
        }
        if self.pronounceable {
            style |= PasswordPolicyStyle::MAKE_PRONOUNCEABLE;
        }
        policy.set_style(style);

        if let Some(special) = &self.special {
            policy.set_special_symbols(special);
        }
        Ok(policy)
    }
}

/// Execute `policy list`.
pub fn list(cli: &Cli) -> Result<()> {
    let vault = open_vault(cli)?;
    let policies = vault.document.named_policies();

    if policies.is_empty() {
        output::info("No named password policies in this vault.");
        output::tip("Run `pwvault policy add <NAME>` to add one.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Length", "Classes", "Symbols"]);
    for named in &policies {
        let policy = named.policy();
        table.add_row(vec![
            named.name().to_string(),
            policy.total_password_length().to_string(),
            describe_classes(policy),
            policy.special_symbol_text(),
        ]);
    }
    println!("{table}");

    Ok(())
}

/// Execute `policy add`.
pub fn add(cli: &Cli, name: &str, options: &PolicyOptions) -> Result<()> {
    let policy = NamedPasswordPolicy::from_policy(name, options.to_policy()?)?;

    let mut vault = open_vault(cli)?;
    vault.document.named_policies_mut()?.add(policy)?;
    vault.save()?;

    tracing::info!(%name, "password policy added");
    output::success(&format!("Added password policy '{name}'"));
    Ok(())
}

/// Execute `policy remove`.
pub fn remove(cli: &Cli, name: &str) -> Result<()> {
    let mut vault = open_vault(cli)?;
    if vault.document.named_policies_mut()?.remove(name)?.is_none() {
        return Err(PwVaultError::InvalidArgument(format!(
            "no password policy '{name}'"
        )));
    }
    vault.save()?;

    tracing::info!(%name, "password policy removed");
    output::success(&format!("Removed password policy '{name}'"));
    Ok(())
}

/// Policy a generated password follows: the one named on the command
/// line, else the entry's named policy, else the entry's own policy, else
/// the default.
pub fn generation_policy(
    document: &Document,
    requested: Option<&str>,
    entry_policy_name: &str,
    own_policy: Option<PasswordPolicy>,
) -> Result<PasswordPolicy> {
    if let Some(name) = requested {
        return named_policy(document, name);
    }
    if !entry_policy_name.is_empty() {
        return named_policy(document, entry_policy_name);
    }
    match own_policy {
        Some(policy) => Ok(policy),
        None => generator::default_policy(),
    }
}

fn named_policy(document: &Document, name: &str) -> Result<PasswordPolicy> {
    document
        .named_policies()
        .into_iter()
        .find(|p| p.name() == name)
        .map(|p| p.policy().clone())
        .ok_or_else(|| PwVaultError::InvalidArgument(format!("no password policy '{name}'")))
}

/// Short form of the style, e.g. `lower>=2 upper digits>=1`.
fn describe_classes(policy: &PasswordPolicy) -> String {
    let style = policy.style();
    let classes = [
        (PasswordPolicyStyle::USE_LOWERCASE, "lower", policy.minimum_lowercase_count()),
        (PasswordPolicyStyle::USE_UPPERCASE, "upper", policy.minimum_uppercase_count()),
        (PasswordPolicyStyle::USE_DIGITS, "digits", policy.minimum_digit_count()),
        (PasswordPolicyStyle::USE_SYMBOLS, "symbols", policy.minimum_symbol_count()),
    ];

    let mut parts: Vec<String> = classes
        .iter()
        .filter(|(flag, _, _)| style.contains(*flag))
        .map(|(_, label, min)| match min {
            0 => label.to_string(),
            n => format!("{label}>={n}"),
        })
        .collect();
    for (flag, label) in [
        (PasswordPolicyStyle::USE_HEX_DIGITS, "hex"),
        (PasswordPolicyStyle::USE_EASY_VISION, "easy-vision"),
        (PasswordPolicyStyle::MAKE_PRONOUNCEABLE, "pronounceable"),
    ] {
        if style.contains(flag) {
            parts.push(label.to_string());
        }
    }
    parts.join(" ")
}
