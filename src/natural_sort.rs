//! Natural ordering for path-like strings
//!
//! Splits a string into alternating text and digit runs so that embedded
//! numbers compare by value: `Episode 2` sorts before `Episode 10`.

use regex::Regex;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::LazyLock;

// `\d` matches every Unicode decimal digit, not only ASCII ones
static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit pattern is valid"));
static DECIMAL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d$").expect("digit pattern is valid"));

/// A single run of a natural sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortToken {
    /// Lower-cased non-digit run (may be empty at the start or end of a key)
    Text(String),
    /// Digit run with leading zeros stripped
    Number(String),
}

impl Ord for SortToken {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortToken::Text(a), SortToken::Text(b)) => a.cmp(b),
            // Without leading zeros, a longer digit run is always the larger number
            (SortToken::Number(a), SortToken::Number(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (SortToken::Text(_), SortToken::Number(_)) => Ordering::Greater,
            (SortToken::Number(_), SortToken::Text(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for SortToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparison key implementing natural sort
///
/// Keys always begin with a `Text` token and alternate from there, so tokens
/// at the same position in two keys are of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<SortToken>);

/// Generates the natural sort key for `s`
///
/// # Examples
///
/// ```
/// use tv_rename::natural_key;
///
/// assert!(natural_key("Episode 2") < natural_key("Episode 10"));
/// assert!("Episode 2" > "Episode 10");
/// ```
pub fn natural_key(s: &str) -> NaturalKey {
    let mut tokens = Vec::new();
    let mut text_start = 0;

    for digits in DIGIT_RUN.find_iter(s) {
        tokens.push(SortToken::Text(s[text_start..digits.start()].to_lowercase()));
        tokens.push(number_token(digits.as_str()));
        text_start = digits.end();
    }
    tokens.push(SortToken::Text(s[text_start..].to_lowercase()));

    NaturalKey(tokens)
}

/// Builds a number token, normalizing every decimal digit to ASCII
fn number_token(digits: &str) -> SortToken {
    let ascii: String = digits.chars().map(ascii_digit).collect();
    SortToken::Number(ascii.trim_start_matches('0').to_string())
}

/// Maps a Unicode decimal digit to its ASCII counterpart
///
/// Decimal digits are encoded in contiguous runs of ten starting at zero, so
/// a digit's value is its distance from the start of its run, modulo ten.
fn ascii_digit(c: char) -> char {
    if c.is_ascii_digit() {
        return c;
    }

    let mut offset = 0;
    let mut code = c as u32;
    while let Some(prev) = code.checked_sub(1).and_then(char::from_u32) {
        if !is_decimal_digit(prev) {
            break;
        }
        offset += 1;
        code -= 1;
    }

    char::from_digit(offset % 10, 10).unwrap_or('0')
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0; 4];
    DECIMAL_DIGIT.is_match(c.encode_utf8(&mut buf))
}

/// How listings of local files and directories are ordered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Natural order over the full path string
    #[default]
    Natural,
    /// Plain component-wise path ordering
    Lexicographic,
}

impl SortOrder {
    /// Selects lexicographic ordering when `lexicographic` is set
    pub fn from_flag(lexicographic: bool) -> Self {
        if lexicographic {
            SortOrder::Lexicographic
        } else {
            SortOrder::Natural
        }
    }

    /// Sorts `paths` in place according to this order
    pub fn sort_paths(self, paths: &mut [PathBuf]) {
        match self {
            SortOrder::Natural => {
                paths.sort_by_cached_key(|p| natural_key(&p.to_string_lossy()))
            }
            SortOrder::Lexicographic => paths.sort(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_beats_lexicographic_for_numbers() {
        assert!(natural_key("Episode 10") > natural_key("Episode 2"));
        assert!("Episode 10" < "Episode 2");
    }

    #[test]
    fn test_key_layout_alternates_text_and_numbers() {
        let key = natural_key("10abc");
        assert_eq!(
            key.0,
            vec![
                SortToken::Text(String::new()),
                SortToken::Number("10".to_string()),
                SortToken::Text("abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_text_is_case_insensitive() {
        assert_eq!(natural_key("Show S01E02"), natural_key("show s01e02"));
    }

    #[test]
    fn test_leading_zeros_compare_by_value() {
        assert_eq!(natural_key("e007"), natural_key("e7"));
        assert!(natural_key("e09") < natural_key("e10"));
    }

    #[test]
    fn test_fullwidth_digits_compare_by_value() {
        assert!(natural_key("第２話") < natural_key("第１０話"));
        assert_eq!(natural_key("第１０話"), natural_key("第10話"));
        assert_eq!(ascii_digit('٣'), '3');
    }

    #[test]
    fn test_huge_numbers_do_not_overflow() {
        let a = natural_key("x99999999999999999999999999");
        let b = natural_key("x100000000000000000000000000");
        assert!(a < b);
    }

    #[test]
    fn test_sort_paths() {
        let mut paths = vec![
            PathBuf::from("Season 10/a.mkv"),
            PathBuf::from("Season 2/b.mkv"),
            PathBuf::from("Season 1/c.mkv"),
        ];

        SortOrder::Natural.sort_paths(&mut paths);
        assert_eq!(
            paths,
            vec![
                PathBuf::from("Season 1/c.mkv"),
                PathBuf::from("Season 2/b.mkv"),
                PathBuf::from("Season 10/a.mkv"),
            ]
        );

        SortOrder::Lexicographic.sort_paths(&mut paths);
        assert_eq!(paths[1], PathBuf::from("Season 10/a.mkv"));
    }
}
