pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";
pub const SPECIAL: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

/// Characters that are easy to misread in most fonts.
pub const AMBIGUOUS: &str = "il1Lo0O";

/// Trailing symbol pool for memorable passwords.
pub const TRAILING_SPECIAL: &str = "!@#$%^&*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Lowercase,
    Uppercase,
    Digits,
    Special,
}

impl CharClass {
    pub fn chars(self) -> &'static str {
        match self {
            CharClass::Lowercase => LOWERCASE,
            CharClass::Uppercase => UPPERCASE,
            CharClass::Digits => DIGITS,
            CharClass::Special => SPECIAL,
        }
    }

    /// Members of this class, minus ambiguous characters when asked.
    pub fn members(self, exclude_ambiguous: bool) -> Vec<char> {
        filter(self.chars(), exclude_ambiguous)
    }
}

pub fn filter(chars: &str, exclude_ambiguous: bool) -> Vec<char> {
    chars
        .chars()
        .filter(|c| !exclude_ambiguous || !AMBIGUOUS.contains(*c))
        .collect()
}

/// Union of the given classes. Falls back to lowercase + digits when the
/// union would be empty.
pub fn active(classes: &[CharClass], exclude_ambiguous: bool) -> Vec<char> {
    let mut out: Vec<char> = classes
        .iter()
        .flat_map(|c| c.members(exclude_ambiguous))
        .collect();

    if out.is_empty() {
        out = filter(LOWERCASE, exclude_ambiguous);
        out.extend(filter(DIGITS, exclude_ambiguous));
    }
    out
}
