//! Autocomplete for the formula editor

use crate::functions::registry;
use std::collections::BTreeSet;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum SuggestionKind {
    Field,
    Function,
}

/// One completion candidate
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub label: String,
    /// Text that replaces `replace`
    pub insert_text: String,
    /// Char range of the partial token being completed
    pub replace: Range<usize>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub detail: Option<String>,
}

/// Completion candidates at `cursor` (a char offset, clamped to the text)
///
/// Inside an open `{` this offers known names; after a bare word it offers
/// functions. Never fails: anything else yields no suggestions.
pub fn suggest(expression: &str, cursor: usize, known_names: &BTreeSet<String>) -> Vec<Suggestion> {
    let before: Vec<char> = expression.chars().take(cursor).collect();
    let cursor = before.len();

    let mut in_string = false;
    let mut open_brace = None;
    for (i, &c) in before.iter().enumerate() {
        match c {
            '"' => in_string = !in_string,
            '{' if !in_string => open_brace = Some(i),
            '}' if !in_string => open_brace = None,
            _ => {}
        }
    }
    if in_string {
        return Vec::new();
    }

    if let Some(brace) = open_brace {
        let typed: String = before[brace + 1..].iter().collect();
        if !typed.chars().all(is_word_char) {
            return Vec::new();
        }
        return field_suggestions(&typed, brace + 1..cursor, known_names);
    }

    let word_start = before
        .iter()
        .rposition(|&c| !is_word_char(c))
        .map_or(0, |i| i + 1);
    let word: String = before[word_start..].iter().collect();
    let starts_like_name = word
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_');
    // "1e" is the start of a number, not a function name
    let follows_number = word_start > 0
        && before
            .get(word_start - 1)
            .map_or(false, |&c| c == '.' || c.is_ascii_digit());
    if !starts_like_name || follows_number {
        return Vec::new();
    }

    registry()
        .by_prefix(&word)
        .into_iter()
        .map(|func| Suggestion {
            kind: SuggestionKind::Function,
            label: func.name.to_string(),
            insert_text: format!("{}(", func.name),
            replace: word_start..cursor,
            detail: Some(format!("{} - {}", func.signature, func.description)),
        })
        .collect()
}

fn field_suggestions(
    typed: &str,
    replace: Range<usize>,
    known_names: &BTreeSet<String>,
) -> Vec<Suggestion> {
    let typed = typed.to_ascii_lowercase();
    known_names
        .iter()
        .filter(|name| name.to_ascii_lowercase().starts_with(&typed))
        .map(|name| Suggestion {
            kind: SuggestionKind::Field,
            label: name.clone(),
            insert_text: format!("{}}}", name),
            replace: replace.clone(),
            detail: None,
        })
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
