//! Invocation argument bag. Arguments arrive as a CLI-ish token stream
//! (`-rr 3 -d 1d6 adv -phrase "a phrase"`); the automation engine consults
//! them by key. Ephemeral reads go through the `take_*` methods, which
//! remove what they read so a later sibling effect cannot re-see it:
//! `take_last` consumes the rightmost occurrence, `take_join` and
//! `take_list` consume every occurrence.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ArgEntry {
    key: String,
    value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    entries: Vec<ArgEntry>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a token stream. A token starting with `-` (and not a bare
    /// negative number) opens a key; the following token is its value
    /// unless it opens another key, in which case the key is a flag with
    /// value `true`. Bare leading tokens are flags too (`adv`, `dis`).
    pub fn parse(input: &str) -> Self {
        let tokens = tokenize(input);
        let mut entries = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let token = &tokens[i];
            if let Some(key) = key_of(token) {
                let value = match tokens.get(i + 1) {
                    Some(next) if key_of(next).is_none() => {
                        i += 1;
                        next.clone()
                    }
                    _ => "true".to_string(),
                };
                entries.push(ArgEntry {
                    key: key.to_string(),
                    value,
                });
            } else {
                // bare flags like `adv`
                entries.push(ArgEntry {
                    key: token.clone(),
                    value: "true".to_string(),
                });
            }
            i += 1;
        }
        Self { entries }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            entries: pairs
                .into_iter()
                .map(|(key, value)| ArgEntry {
                    key: key.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last-supplied value for `key`, parsed. Unparsable values read as
    /// absent.
    pub fn last<T: FromStr>(&self, key: &str) -> Option<T> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .and_then(|e| e.value.parse().ok())
    }

    pub fn last_str(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// Consumes the rightmost occurrence of `key`.
    pub fn take_last<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let index = self.entries.iter().rposition(|e| e.key == key)?;
        let entry = self.entries.remove(index);
        entry.value.parse().ok()
    }

    /// Consumes the rightmost occurrence of a boolean flag.
    pub fn take_flag(&mut self, key: &str) -> bool {
        match self.entries.iter().rposition(|e| e.key == key) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn join(&self, key: &str, separator: &str) -> Option<String> {
        let values: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| e.key == key)
            .map(|e| e.value.as_str())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.join(separator))
        }
    }

    /// Consumes every occurrence of `key`, joining the values.
    pub fn take_join(&mut self, key: &str, separator: &str) -> Option<String> {
        let values = self.take_list(key);
        if values.is_empty() {
            None
        } else {
            Some(values.join(separator))
        }
    }

    /// Consumes every occurrence of `key`.
    pub fn take_list(&mut self, key: &str) -> Vec<String> {
        let mut values = Vec::new();
        self.entries.retain(|e| {
            if e.key == key {
                values.push(e.value.clone());
                false
            } else {
                true
            }
        });
        values
    }

    /// Folds the advantage flags into a single state: elven accuracy
    /// (when honored) +2, advantage +1, disadvantage -1, conflicting or
    /// absent 0. Consumes the flags when `ephem` is set.
    pub fn advantage(&mut self, ea: bool, ephem: bool) -> i32 {
        let (adv, dis, ea_flag) = if ephem {
            (
                self.take_flag("adv"),
                self.take_flag("dis"),
                ea && self.take_flag("ea"),
            )
        } else {
            (self.flag("adv"), self.flag("dis"), ea && self.flag("ea"))
        };
        if ea_flag && !dis {
            2
        } else if adv && !dis {
            1
        } else if dis && !(adv || ea_flag) {
            -1
        } else {
            0
        }
    }

    /// Advantage as the saving-throw roller wants it: `Some(true)` for
    /// advantage, `Some(false)` for disadvantage, `None` for straight.
    pub fn advantage_bool(&mut self) -> Option<bool> {
        match self.advantage(false, false) {
            n if n > 0 => Some(true),
            n if n < 0 => Some(false),
            _ => None,
        }
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "-{} {}", entry.key, entry.value)?;
        }
        Ok(())
    }
}

fn key_of(token: &str) -> Option<&str> {
    let rest = token.strip_prefix('-')?;
    if rest.chars().next().is_some_and(|c| c.is_alphabetic()) {
        Some(rest)
    } else {
        None
    }
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in input.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
