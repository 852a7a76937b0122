//! Autotype sequence tokenizer.
//!
//! An autotype sequence is literal text with backslash escapes for entry
//! fields and special keys, e.g. `\u\t\p\n`. `AutotypeTokens` turns it into
//! a stream of keystroke strings and field commands; `Entry::autotype_tokens`
//! then replaces the field commands with the entry's values.
//!
//! Literal characters in the sequence itself are passed through as single
//! keys. Only text that comes out of entry fields goes through
//! `text_to_keys`, which brace-escapes the characters that have a meaning
//! to key senders (`+^%~(){}[]`).

use std::collections::VecDeque;
use std::fmt;
use std::str::Chars;

/// A field reference or action inside an autotype sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutotypeCommand {
    UserName,
    Password,
    TwoFactorCode,
    Group,
    Title,
    Url,
    Email,
    CreditCardNumber,
    CreditCardNumberTabbed,
    CreditCardExpiration,
    CreditCardVerificationValue,
    CreditCardPin,
    /// All notes, or a single 1-based line.
    Notes(Option<u32>),
    /// Pause between keystrokes, in milliseconds.
    Delay(u32),
    /// One-off wait, in milliseconds.
    Wait(u32),
    Legacy,
}

impl fmt::Display for AutotypeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutotypeCommand::UserName => f.write_str("UserName"),
            AutotypeCommand::Password => f.write_str("Password"),
            AutotypeCommand::TwoFactorCode => f.write_str("TwoFactorCode"),
            AutotypeCommand::Group => f.write_str("Group"),
            AutotypeCommand::Title => f.write_str("Title"),
            AutotypeCommand::Url => f.write_str("Url"),
            AutotypeCommand::Email => f.write_str("Email"),
            AutotypeCommand::CreditCardNumber => f.write_str("CreditCardNumber"),
            AutotypeCommand::CreditCardNumberTabbed => f.write_str("CreditCardNumberTabbed"),
            AutotypeCommand::CreditCardExpiration => f.write_str("CreditCardExpiration"),
            AutotypeCommand::CreditCardVerificationValue => {
                f.write_str("CreditCardVerificationValue")
            }
            AutotypeCommand::CreditCardPin => f.write_str("CreditCardPin"),
            AutotypeCommand::Notes(None) => f.write_str("Notes"),
            AutotypeCommand::Notes(Some(line)) => write!(f, "Notes:{line}"),
            AutotypeCommand::Delay(ms) => write!(f, "Delay:{ms}"),
            AutotypeCommand::Wait(ms) => write!(f, "Wait:{ms}"),
            AutotypeCommand::Legacy => f.write_str("Legacy"),
        }
    }
}

/// One element of a tokenized sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutotypeToken {
    /// Keystrokes in key-sender notation (`a`, `{Tab}`, `+{Tab}`, `{+}`).
    Key(String),
    Command(AutotypeCommand),
}

impl AutotypeToken {
    fn key(text: &str) -> Self {
        AutotypeToken::Key(text.to_string())
    }

    pub fn is_command(&self) -> bool {
        matches!(self, AutotypeToken::Command(_))
    }
}

impl fmt::Display for AutotypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutotypeToken::Key(key) => f.write_str(key),
            AutotypeToken::Command(command) => fmt::Display::fmt(command, f),
        }
    }
}

/// Convert literal text to one key token per character.
pub fn text_to_keys(text: &str) -> Vec<AutotypeToken> {
    text.chars()
        .map(|ch| match ch {
            '+' | '^' | '%' | '~' | '(' | ')' | '{' | '}' | '[' | ']' => {
                AutotypeToken::Key(format!("{{{ch}}}"))
            }
            '\u{8}' => AutotypeToken::key("{Backspace}"),
            '\n' | '\r' => AutotypeToken::key("{Enter}"),
            '\t' => AutotypeToken::key("{Tab}"),
            _ => AutotypeToken::Key(ch.to_string()),
        })
        .collect()
}

/// Keep only the digits of a card number. The tabbed form puts a tab
/// before every group of four digits counted from the end.
pub fn credit_card_digits(number: &str, tabbed: bool) -> String {
    let digits: Vec<char> = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if !tabbed {
        return digits.into_iter().collect();
    }

    let mut out = String::with_capacity(digits.len() + digits.len() / 4);
    for (i, ch) in digits.iter().enumerate() {
        let remaining = digits.len() - i;
        if i > 0 && remaining % 4 == 0 {
            out.push('\t');
        }
        out.push(*ch);
    }
    out
}

/// Split notes on any line ending.
pub fn note_lines(notes: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = notes;
    while let Some(pos) = rest.find(['\r', '\n']) {
        lines.push(&rest[..pos]);
        let skip = if rest[pos..].starts_with("\r\n") { 2 } else { 1 };
        rest = &rest[pos + skip..];
    }
    lines.push(rest);
    lines
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Default,
    Escape,
    CreditCard,
    MandatoryNumber,
    OptionalNumber,
}

/// Lazy tokenizer over an autotype sequence. Clone it to restart.
#[derive(Debug, Clone)]
pub struct AutotypeTokens<'a> {
    chars: Chars<'a>,
    state: State,
    command: Option<char>,
    digits: String,
    pending: VecDeque<AutotypeToken>,
    finished: bool,
}

impl<'a> AutotypeTokens<'a> {
    /// Tokenize `text`. An empty sequence means `\u\t\p\n`.
    pub fn new(text: &'a str) -> Self {
        let mut tokens = Self {
            chars: text.chars(),
            state: State::Default,
            command: None,
            digits: String::new(),
            pending: VecDeque::new(),
            finished: false,
        };
        if text.is_empty() {
            tokens.pending.extend([
                AutotypeToken::Command(AutotypeCommand::UserName),
                AutotypeToken::key("{Tab}"),
                AutotypeToken::Command(AutotypeCommand::Password),
                AutotypeToken::key("{Enter}"),
            ]);
            tokens.finished = true;
        }
        tokens
    }

    fn emit(&mut self, token: AutotypeToken) {
        self.pending.push_back(token);
    }

    fn emit_text(&mut self, text: &str) {
        self.pending.extend(text_to_keys(text));
    }

    fn step(&mut self, ch: char) {
        match self.state {
            State::Default => {
                if ch == '\\' {
                    self.state = State::Escape;
                } else {
                    self.emit(AutotypeToken::Key(ch.to_string()));
                }
            }

            State::Escape => {
                self.state = State::Default;
                let command = match ch {
                    'u' => Some(AutotypeCommand::UserName),
                    'p' => Some(AutotypeCommand::Password),
                    '2' => Some(AutotypeCommand::TwoFactorCode),
                    'g' => Some(AutotypeCommand::Group),
                    'i' => Some(AutotypeCommand::Title),
                    'l' => Some(AutotypeCommand::Url),
                    'm' => Some(AutotypeCommand::Email),
                    'z' => Some(AutotypeCommand::Legacy),
                    _ => None,
                };
                if let Some(command) = command {
                    self.emit(AutotypeToken::Command(command));
                    return;
                }
                match ch {
                    'c' => self.state = State::CreditCard,
                    'b' => self.emit(AutotypeToken::key("{Backspace}")),
                    't' => self.emit(AutotypeToken::key("{Tab}")),
                    's' => self.emit(AutotypeToken::key("+{Tab}")),
                    'n' => self.emit(AutotypeToken::key("{Enter}")),
                    'd' | 'w' | 'W' => {
                        self.command = Some(ch);
                        self.state = State::MandatoryNumber;
                    }
                    'o' => {
                        self.command = Some(ch);
                        self.state = State::OptionalNumber;
                    }
                    _ => self.emit(AutotypeToken::Key(ch.to_string())),
                }
            }

            State::CreditCard => {
                self.state = State::Default;
                let command = match ch {
                    'n' => AutotypeCommand::CreditCardNumber,
                    't' => AutotypeCommand::CreditCardNumberTabbed,
                    'e' => AutotypeCommand::CreditCardExpiration,
                    'v' => AutotypeCommand::CreditCardVerificationValue,
                    'p' => AutotypeCommand::CreditCardPin,
                    _ => {
                        self.emit_text(&format!("c{ch}"));
                        return;
                    }
                };
                self.emit(AutotypeToken::Command(command));
            }

            State::MandatoryNumber => {
                if ch.is_ascii_digit() {
                    self.digits.push(ch);
                    self.state = State::OptionalNumber;
                } else {
                    let letter = self.command.take().unwrap_or_default();
                    self.emit_text(&format!("{letter}{ch}"));
                    self.state = State::Default;
                }
            }

            State::OptionalNumber => {
                if ch.is_ascii_digit() && self.digits.len() < 3 {
                    self.digits.push(ch);
                    return;
                }
                self.flush_command();
                if ch == '\\' {
                    self.state = State::Escape;
                } else {
                    self.emit(AutotypeToken::Key(ch.to_string()));
                    self.state = State::Default;
                }
            }
        }
    }

    /// Emit the pending numbered command and reset its arguments.
    fn flush_command(&mut self) {
        let Some(letter) = self.command.take() else {
            return;
        };
        let digits = std::mem::take(&mut self.digits);
        let number = digits.parse::<u32>().ok();
        let command = match (letter, number) {
            ('o', line) => AutotypeCommand::Notes(line),
            ('d', Some(ms)) => AutotypeCommand::Delay(ms),
            ('w', Some(ms)) => AutotypeCommand::Wait(ms),
            ('W', Some(seconds)) => AutotypeCommand::Wait(seconds * 1000),
            (other, _) => {
                self.emit_text(&other.to_string());
                return;
            }
        };
        self.emit(AutotypeToken::Command(command));
    }

    fn finish(&mut self) {
        match self.state {
            State::Escape => self.emit(AutotypeToken::key("\\")),
            State::CreditCard => self.emit_text("c"),
            State::MandatoryNumber | State::OptionalNumber => self.flush_command(),
            State::Default => {}
        }
        self.state = State::Default;
    }
}

impl Iterator for AutotypeTokens<'_> {
    type Item = AutotypeToken;

    fn next(&mut self) -> Option<AutotypeToken> {
        loop {
            if let Some(token) = self.pending.pop_front() {
                return Some(token);
            }
            if self.finished {
                return None;
            }
            match self.chars.next() {
                Some(ch) => self.step(ch),
                None => {
                    self.finish();
                    self.finished = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> Vec<String> {
        AutotypeTokens::new(text).map(|t| t.to_string()).collect()
    }

    #[test]
    fn empty_sequence_is_default_login() {
        let tokens: Vec<_> = AutotypeTokens::new("").collect();
        assert_eq!(
            tokens,
            vec![
                AutotypeToken::Command(AutotypeCommand::UserName),
                AutotypeToken::Key("{Tab}".into()),
                AutotypeToken::Command(AutotypeCommand::Password),
                AutotypeToken::Key("{Enter}".into()),
            ]
        );
    }

    #[test]
    fn explicit_default_matches_empty() {
        let explicit: Vec<_> = AutotypeTokens::new(r"\u\t\p\n").collect();
        let empty: Vec<_> = AutotypeTokens::new("").collect();
        assert_eq!(explicit, empty);
    }

    #[test]
    fn single_letter_escapes() {
        assert_eq!(
            render(r"\2\g\i\l\m\z\b\s"),
            vec![
                "TwoFactorCode",
                "Group",
                "Title",
                "Url",
                "Email",
                "Legacy",
                "{Backspace}",
                "+{Tab}"
            ]
        );
    }

    #[test]
    fn literals_pass_through_raw() {
        assert_eq!(render("a+b"), vec!["a", "+", "b"]);
    }

    #[test]
    fn unknown_escape_is_literal() {
        assert_eq!(render(r"\x\\"), vec!["x", "\\"]);
    }

    #[test]
    fn credit_card_escapes() {
        assert_eq!(
            render(r"\cn\ct\ce\cv\cp"),
            vec![
                "CreditCardNumber",
                "CreditCardNumberTabbed",
                "CreditCardExpiration",
                "CreditCardVerificationValue",
                "CreditCardPin"
            ]
        );
        assert_eq!(render(r"\cx"), vec!["c", "x"]);
        assert_eq!(render(r"\c+"), vec!["c", "{+}"]);
    }

    #[test]
    fn numbered_commands() {
        assert_eq!(render(r"\d100\w5\W2"), vec!["Delay:100", "Wait:5", "Wait:2000"]);
        assert_eq!(render(r"\o"), vec!["Notes"]);
        assert_eq!(render(r"\o3x"), vec!["Notes:3", "x"]);
    }

    #[test]
    fn numbers_take_at_most_three_digits() {
        assert_eq!(render(r"\d1234"), vec!["Delay:123", "4"]);
    }

    #[test]
    fn missing_mandatory_number_is_literal() {
        assert_eq!(render(r"\dx"), vec!["d", "x"]);
        assert_eq!(render(r"\W"), vec!["W"]);
    }

    #[test]
    fn backslash_after_number_starts_escape() {
        assert_eq!(render(r"\d5\p"), vec!["Delay:5", "Password"]);
    }

    #[test]
    fn dangling_escapes_at_end() {
        assert_eq!(render("a\\"), vec!["a", "\\"]);
        assert_eq!(render(r"\c"), vec!["c"]);
        assert_eq!(render(r"\w12"), vec!["Wait:12"]);
    }

    #[test]
    fn tokenizer_is_restartable() {
        let tokens = AutotypeTokens::new(r"\u\n");
        let first: Vec<_> = tokens.clone().collect();
        let second: Vec<_> = tokens.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn text_conversion_escapes_specials() {
        let keys: Vec<String> = text_to_keys("a+%{\t\n\r\u{8}")
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["a", "{+}", "{%}", "{{}", "{Tab}", "{Enter}", "{Enter}", "{Backspace}"]
        );
    }

    #[test]
    fn credit_card_trimming() {
        assert_eq!(credit_card_digits("1234 5678-9012 3456", false), "1234567890123456");
        assert_eq!(
            credit_card_digits("1234 5678 9012 3456", true),
            "1234\t5678\t9012\t3456"
        );
        assert_eq!(credit_card_digits("123456", true), "12\t3456");
        assert_eq!(credit_card_digits("1234", true), "1234");
    }

    #[test]
    fn notes_split_on_any_line_ending() {
        assert_eq!(note_lines("a\r\nb\nc\rd"), vec!["a", "b", "c", "d"]);
        assert_eq!(note_lines(""), vec![""]);
        assert_eq!(note_lines("a\n"), vec!["a", ""]);
    }
}
