//! Password generation from a `PasswordPolicy`.
//!
//! Without `MAKE_PRONOUNCEABLE` the generator first draws each enabled
//! class's minimum count, fills the rest from the union of enabled
//! classes and shuffles. Pronounceable passwords alternate consonants and
//! vowels, with digits and symbols standing in for vowels; only "at least
//! one of each enabled class" is enforced for them.

use rand::seq::SliceRandom;
use rand::Rng;
use zeroize::Zeroizing;

use super::policy::{PasswordPolicy, PasswordPolicyStyle};
use crate::errors::{PwVaultError, Result};

/// Length used when no policy gives one.
pub const DEFAULT_LENGTH: u16 = 14;

const LOWER_CONSONANTS: &str = "bcdfghjklmnpqrstvwxz";
const LOWER_VOWELS: &str = "aeiouy";
const UPPER_CONSONANTS: &str = "BCDFGHJKLMNPQRSTVWXZ";
const UPPER_VOWELS: &str = "AEIOUY";
const DIGITS: &str = "0123456789";
const HEX_DIGITS: &str = "0123456789abcdef";
const DEFAULT_SYMBOLS: &str = "~!@#$%^&*()-_=+[{]}\\|;:,<.>/?";

/// Characters that are easy to confuse with one another.
const SIMILAR: &str = "IOQl0`-_;:,.";

const PRONOUNCEABLE_ATTEMPTS: usize = 1000;

/// Policy used by `add --generate` when no named policy is chosen:
/// 14 characters from all four classes.
pub fn default_policy() -> Result<PasswordPolicy> {
    let mut policy = PasswordPolicy::new(DEFAULT_LENGTH)?;
    policy.set_style(
        PasswordPolicyStyle::USE_LOWERCASE
            | PasswordPolicyStyle::USE_UPPERCASE
            | PasswordPolicyStyle::USE_DIGITS
            | PasswordPolicyStyle::USE_SYMBOLS,
    );
    Ok(policy)
}

/// One character class with its alphabet and required count.
struct Class {
    consonants: Vec<char>,
    vowels: Vec<char>,
    minimum: usize,
}

impl Class {
    fn new(consonants: &str, vowels: &str, minimum: u16, easy_vision: bool) -> Self {
        let keep = |c: &char| !(easy_vision && SIMILAR.contains(*c));
        Self {
            consonants: consonants.chars().filter(keep).collect(),
            vowels: vowels.chars().filter(keep).collect(),
            minimum: usize::from(minimum),
        }
    }

    fn all(&self) -> Vec<char> {
        self.consonants.iter().chain(&self.vowels).copied().collect()
    }

    fn contains(&self, c: char) -> bool {
        self.consonants.contains(&c) || self.vowels.contains(&c)
    }
}

/// Build the enabled classes in lowercase, uppercase, digit, symbol order.
fn classes(policy: &PasswordPolicy) -> Vec<Class> {
    let style = policy.style();
    let easy = style.contains(PasswordPolicyStyle::USE_EASY_VISION);
    let symbols: String = if policy.special_symbols().is_empty() {
        DEFAULT_SYMBOLS.to_string()
    } else {
        policy.special_symbol_text()
    };

    let mut out = Vec::new();
    if style.contains(PasswordPolicyStyle::USE_LOWERCASE) {
        out.push(Class::new(
            LOWER_CONSONANTS,
            LOWER_VOWELS,
            policy.minimum_lowercase_count(),
            easy,
        ));
    }
    if style.contains(PasswordPolicyStyle::USE_UPPERCASE) {
        out.push(Class::new(
            UPPER_CONSONANTS,
            UPPER_VOWELS,
            policy.minimum_uppercase_count(),
            easy,
        ));
    }
    if style.contains(PasswordPolicyStyle::USE_DIGITS) {
        out.push(Class::new("", DIGITS, policy.minimum_digit_count(), easy));
    }
    if style.contains(PasswordPolicyStyle::USE_SYMBOLS) {
        out.push(Class::new("", &symbols, policy.minimum_symbol_count(), easy));
    }
    out.retain(|class| !class.all().is_empty());
    out
}

/// Generate a password that satisfies `policy`.
pub fn generate(policy: &PasswordPolicy) -> Result<Zeroizing<String>> {
    let length = usize::from(policy.total_password_length());
    if length == 0 {
        return Err(PwVaultError::InvalidArgument(
            "password length must be at least 1".into(),
        ));
    }

    let mut rng = rand::rng();
    if policy
        .style()
        .contains(PasswordPolicyStyle::USE_HEX_DIGITS)
    {
        let hex: Vec<char> = HEX_DIGITS.chars().collect();
        let password = (0..length)
            .map(|_| hex[rng.random_range(0..hex.len())])
            .collect();
        return Ok(Zeroizing::new(password));
    }

    let classes = classes(policy);
    if classes.is_empty() {
        return Err(PwVaultError::InvalidArgument(
            "policy enables no character class".into(),
        ));
    }

    if policy
        .style()
        .contains(PasswordPolicyStyle::MAKE_PRONOUNCEABLE)
    {
        return pronounceable(&classes, length, &mut rng);
    }

    let required: usize = classes.iter().map(|c| c.minimum).sum();
    if required > length {
        return Err(PwVaultError::InvalidArgument(format!(
            "policy asks for {required} minimum characters but the length is {length}"
        )));
    }

    let mut chars: Zeroizing<Vec<char>> = Zeroizing::new(Vec::with_capacity(length));
    for class in &classes {
        let alphabet = class.all();
        for _ in 0..class.minimum {
            chars.push(alphabet[rng.random_range(0..alphabet.len())]);
        }
    }
    let union: Vec<char> = classes.iter().flat_map(Class::all).collect();
    while chars.len() < length {
        chars.push(union[rng.random_range(0..union.len())]);
    }
    chars.shuffle(&mut rng);

    Ok(Zeroizing::new(chars.iter().collect()))
}

fn pronounceable(
    classes: &[Class],
    length: usize,
    rng: &mut impl Rng,
) -> Result<Zeroizing<String>> {
    let vowels: Vec<char> = classes.iter().flat_map(|c| c.vowels.clone()).collect();
    let consonants: Vec<char> = classes.iter().flat_map(|c| c.consonants.clone()).collect();
    let only = |set: &[char]| -> Vec<char> {
        if set.is_empty() {
            classes.iter().flat_map(Class::all).collect()
        } else {
            set.to_vec()
        }
    };
    let vowels = only(vowels.as_slice());
    let consonants = only(consonants.as_slice());

    for _ in 0..PRONOUNCEABLE_ATTEMPTS {
        let password: Zeroizing<String> = Zeroizing::new(
            (0..length)
                .map(|i| {
                    let set = if i % 2 == 0 { &consonants } else { &vowels };
                    set[rng.random_range(0..set.len())]
                })
                .collect(),
        );
        if length < classes.len()
            || classes
                .iter()
                .all(|class| password.chars().any(|c| class.contains(c)))
        {
            return Ok(password);
        }
    }
    Err(PwVaultError::CommandFailed(
        "could not generate a pronounceable password for this policy".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(style: PasswordPolicyStyle, length: u16) -> PasswordPolicy {
        let mut policy = PasswordPolicy::new(length).unwrap();
        policy.set_style(style);
        policy
    }

    fn count(password: &str, alphabet: &str) -> usize {
        password.chars().filter(|c| alphabet.contains(*c)).count()
    }

    #[test]
    fn default_policy_gives_requested_length_and_unique_passwords() {
        let policy = default_policy().unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let password = generate(&policy).unwrap();
            assert_eq!(password.chars().count(), 14);
            assert!(seen.insert(password.to_string()));
        }
    }

    #[test]
    fn length_eight_is_honoured() {
        let policy = policy(
            PasswordPolicyStyle::USE_LOWERCASE | PasswordPolicyStyle::USE_DIGITS,
            8,
        );
        for _ in 0..200 {
            assert_eq!(generate(&policy).unwrap().len(), 8);
        }
    }

    #[test]
    fn minimum_counts_are_met() {
        let mut policy = default_policy().unwrap();
        policy.set_total_password_length(12).unwrap();
        policy.set_minimum_lowercase_count(2).unwrap();
        policy.set_minimum_uppercase_count(3).unwrap();
        policy.set_minimum_digit_count(4).unwrap();
        policy.set_minimum_symbol_count(1).unwrap();

        for _ in 0..200 {
            let password = generate(&policy).unwrap();
            assert_eq!(password.len(), 12);
            assert!(count(&password, "abcdefghijklmnopqrstuvwxyz") >= 2);
            assert!(count(&password, "ABCDEFGHIJKLMNOPQRSTUVWXYZ") >= 3);
            assert!(count(&password, DIGITS) >= 4);
            assert!(count(&password, DEFAULT_SYMBOLS) >= 1);
        }
    }

    #[test]
    fn minimums_beyond_length_are_rejected() {
        let mut policy = policy(PasswordPolicyStyle::USE_DIGITS, 4);
        policy.set_minimum_digit_count(5).unwrap();
        assert!(matches!(
            generate(&policy),
            Err(PwVaultError::InvalidArgument(_))
        ));
    }

    #[test]
    fn hex_only_output() {
        let policy = policy(PasswordPolicyStyle::USE_HEX_DIGITS, 32);
        for _ in 0..100 {
            let password = generate(&policy).unwrap();
            assert_eq!(password.len(), 32);
            assert!(password.chars().all(|c| HEX_DIGITS.contains(c)));
        }
    }

    #[test]
    fn no_class_is_an_error() {
        let policy = policy(PasswordPolicyStyle::NONE, 14);
        assert!(matches!(
            generate(&policy),
            Err(PwVaultError::InvalidArgument(_))
        ));
    }

    #[test]
    fn easy_vision_drops_similar_characters() {
        let policy = policy(
            PasswordPolicyStyle::USE_LOWERCASE
                | PasswordPolicyStyle::USE_UPPERCASE
                | PasswordPolicyStyle::USE_DIGITS
                | PasswordPolicyStyle::USE_SYMBOLS
                | PasswordPolicyStyle::USE_EASY_VISION,
            64,
        );
        for _ in 0..100 {
            let password = generate(&policy).unwrap();
            assert_eq!(count(&password, SIMILAR), 0);
        }
    }

    #[test]
    fn own_special_symbols_replace_the_default_set() {
        let mut policy = policy(PasswordPolicyStyle::USE_SYMBOLS, 20);
        policy.set_special_symbols("#!");
        for _ in 0..50 {
            let password = generate(&policy).unwrap();
            assert!(password.chars().all(|c| c == '#' || c == '!'));
        }
    }

    #[test]
    fn pronounceable_alternates_consonants_and_vowels() {
        let policy = policy(
            PasswordPolicyStyle::USE_LOWERCASE | PasswordPolicyStyle::MAKE_PRONOUNCEABLE,
            10,
        );
        for _ in 0..50 {
            let password = generate(&policy).unwrap();
            assert_eq!(password.len(), 10);
            for (i, c) in password.chars().enumerate() {
                if i % 2 == 0 {
                    assert!(LOWER_CONSONANTS.contains(c), "{}", *password);
                } else {
                    assert!(LOWER_VOWELS.contains(c), "{}", *password);
                }
            }
        }
    }
}
