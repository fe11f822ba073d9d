use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};
use thiserror::Error;

use super::expr::{self, EvalError};
use super::model::{Dataset, TableView, Value};

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

/// Why a filter request failed. Every variant leaves the previous display
/// data untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("No data loaded. Open a file first.")]
    NoDataLoaded,
    #[error(
        "Unknown column(s): {}. Wrap names containing spaces or symbols in backticks, \
         e.g. `Col A` > 10, and check View → Available columns for the exact names.",
        join_names(.0)
    )]
    UnknownColumn(BTreeSet<String>),
    #[error("Undefined name '{0}' in filter expression")]
    UndefinedIdentifier(String),
    #[error("The filter matched no rows")]
    EmptyResult,
    #[error("Invalid filter expression: {0}")]
    InvalidExpression(String),
}

fn join_names(names: &BTreeSet<String>) -> String {
    names.iter().cloned().collect::<Vec<_>>().join(", ")
}

impl From<EvalError> for FilterError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::UndefinedName(name) => FilterError::UndefinedIdentifier(name),
            EvalError::UnknownColumn(name) => FilterError::UnknownColumn(BTreeSet::from([name])),
            other => FilterError::InvalidExpression(other.to_string()),
        }
    }
}

/// Successful filter request.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Selected rows; `None` when the expression was empty (filter cleared).
    pub view: Option<TableView>,
    /// Status line for the UI.
    pub message: String,
    /// The expression after connective normalisation and quoting.
    pub expression: String,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Filter `dataset` with a user-typed boolean expression.
///
/// An empty (or whitespace-only) expression is not an error: it clears the
/// filter and the outcome carries no view. An expression that selects zero
/// rows is reported as [`FilterError::EmptyResult`].
pub fn apply_filter(
    expression: &str,
    dataset: Option<&Arc<Dataset>>,
) -> Result<FilterOutcome, FilterError> {
    let dataset = dataset.ok_or(FilterError::NoDataLoaded)?;
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Ok(FilterOutcome {
            view: None,
            message: "Filter cleared".to_string(),
            expression: String::new(),
        });
    }

    let prepared = prepare_expression(trimmed, dataset.column_names());
    log::debug!("Processed filter expression: {prepared}");

    let missing: BTreeSet<String> = referenced_columns(&prepared)
        .into_iter()
        .filter(|name| !dataset.has_column(name))
        .collect();
    if !missing.is_empty() {
        return Err(FilterError::UnknownColumn(missing));
    }

    let bound = expr::bind(expr::parse(&prepared)?, dataset.column_names())?;
    let mut rows = Vec::new();
    for row in 0..dataset.n_rows() {
        match bound.eval(dataset, row)? {
            Value::Bool(true) => rows.push(row),
            Value::Bool(false) | Value::Null => {}
            other => {
                return Err(FilterError::InvalidExpression(format!(
                    "expression must evaluate to a boolean, got {}",
                    other.type_name()
                )));
            }
        }
    }
    if rows.is_empty() {
        return Err(FilterError::EmptyResult);
    }

    let message = format!("Found {} of {} rows", rows.len(), dataset.n_rows());
    Ok(FilterOutcome {
        view: Some(TableView::filtered(dataset.clone(), rows)),
        message,
        expression: prepared,
    })
}

/// Column names wrapped in backticks, ready to paste into an expression.
pub fn quoted_column_names(dataset: &Dataset) -> Vec<String> {
    dataset
        .column_names()
        .iter()
        .map(|name| format!("`{name}`"))
        .collect()
}

/// Characters that force a name to be backtick-quoted.
const QUOTE_TRIGGERS: [char; 6] = [' ', ':', '-', '%', '#', '@'];

/// Whether `name` must be wrapped in backticks to be read as one column.
pub fn needs_quoting(name: &str) -> bool {
    name.contains(QUOTE_TRIGGERS)
}

// ---------------------------------------------------------------------------
// Quoting
// ---------------------------------------------------------------------------

/// A slice of the expression, classified so that the quoting passes only
/// touch plain text.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment<'a> {
    Plain(&'a str),
    /// Backtick-quoted name, without the backticks.
    Quoted(&'a str),
    /// String literal (with its quotes) or an unterminated tail.
    Literal(&'a str),
}

fn segments(src: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut plain_start = 0;
    let mut iter = src.char_indices();
    while let Some((i, c)) = iter.next() {
        if !matches!(c, '`' | '\'' | '"') {
            continue;
        }
        if plain_start < i {
            out.push(Segment::Plain(&src[plain_start..i]));
        }
        let Some(end) = closing_quote(src, i, c) else {
            out.push(Segment::Literal(&src[i..]));
            return out;
        };
        if c == '`' {
            out.push(Segment::Quoted(&src[i + 1..end]));
        } else {
            out.push(Segment::Literal(&src[i..=end]));
        }
        plain_start = end + 1;
        // skip to just after the closing quote
        for (j, _) in iter.by_ref() {
            if j >= end {
                break;
            }
        }
    }
    if plain_start < src.len() {
        out.push(Segment::Plain(&src[plain_start..]));
    }
    out
}

/// Byte offset of the quote closing the one at `open`.
fn closing_quote(src: &str, open: usize, quote: char) -> Option<usize> {
    let mut escaped = false;
    for (j, c) in src[open + 1..].char_indices() {
        if quote != '`' && c == '\\' && !escaped {
            escaped = true;
            continue;
        }
        if c == quote && !escaped {
            return Some(open + 1 + j);
        }
        escaped = false;
    }
    None
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Normalise connectives and backtick-quote column references.
///
/// Plain text is scanned once: at every position that can start a name the
/// dataset's columns are tried longest first (so `Col AB` wins over `Col A`).
/// A hit on word boundaries is wrapped in backticks unless the name is already
/// a plain identifier such as `x` or `mag_err`. A hit that the typed
/// identifier run continues past with a space (`mag err` when only `mag`
/// exists) is not taken; the whole run is left to the bare-text pass.
/// Text between hits has whitespace-delimited `and`/`or` rewritten to `&`/`|`,
/// and any remaining identifier run that contains a space, `:` or `-` is
/// quoted too so the validation step can name it. Quoted names and string
/// literals are copied through untouched.
pub fn prepare_expression(expression: &str, columns: &[String]) -> String {
    let mut by_length: Vec<&str> = columns
        .iter()
        .map(String::as_str)
        .filter(|c| !c.is_empty() && !c.contains('`') && !is_reserved(c))
        .collect();
    by_length.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = String::with_capacity(expression.len() + 8);
    for segment in segments(expression) {
        match segment {
            Segment::Plain(text) => quote_plain(text, &by_length, &mut out),
            Segment::Quoted(name) => {
                out.push('`');
                out.push_str(name);
                out.push('`');
            }
            Segment::Literal(text) => out.push_str(text),
        }
    }
    out
}

fn quote_plain(text: &str, columns_by_length: &[&str], out: &mut String) {
    let mut pending_start = 0;
    let mut pos = 0;
    while pos < text.len() {
        let at_boundary = text[..pos].chars().next_back().is_none_or(|c| !is_word_char(c));
        let hit = if at_boundary {
            columns_by_length
                .iter()
                .find(|name| matches_column_at(text, pos, name))
        } else {
            None
        };
        if let Some(name) = hit {
            let run = run_length_at(text, pos);
            if run > name.len() && text[pos + name.len()..].starts_with(' ') {
                pos += run;
                continue;
            }
        }
        match hit {
            Some(name) => {
                out.push_str(&rewrite_bare_text(&text[pending_start..pos]));
                if is_plain_identifier(name) {
                    out.push_str(name);
                } else {
                    out.push('`');
                    out.push_str(name);
                    out.push('`');
                }
                pos += name.len();
                pending_start = pos;
            }
            None => {
                pos += text[pos..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }
    out.push_str(&rewrite_bare_text(&text[pending_start..]));
}

fn matches_column_at(text: &str, pos: usize, name: &str) -> bool {
    if !text[pos..].starts_with(name) {
        return false;
    }
    let end = pos + name.len();
    let ends_in_word = name.chars().next_back().is_some_and(is_word_char);
    !ends_in_word || !text[end..].chars().next().is_some_and(is_word_char)
}

// Same spellings the expression lexer accepts as keywords.
static CONNECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\s)(and|AND|or|OR)(\s)").expect("valid connective regex")
});

static IDENTIFIER_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[\p{L}_]\w*(?:(?: +|[:\-])\w+)*").expect("valid identifier regex")
});

const RESERVED: [&str; 10] = [
    "and", "or", "not", "AND", "OR", "NOT", "True", "False", "true", "false",
];

fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

/// Length of the leading non-reserved words of the identifier run starting
/// at `pos`, or 0 when no run starts there.
fn run_length_at(text: &str, pos: usize) -> usize {
    let Some(run) = IDENTIFIER_RUN.find_at(text, pos).filter(|m| m.start() == pos) else {
        return 0;
    };
    let mut end = 0;
    let mut offset = 0;
    for word in run.as_str().split(' ') {
        if is_reserved(word) {
            break;
        }
        if !word.is_empty() {
            end = offset + word.len();
        }
        offset += word.len() + 1;
    }
    end
}

/// A name the expression parser reads as a single bare identifier.
fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(is_word_char)
        && !is_reserved(name)
}

/// Text outside any column hit: connectives, then leftover identifier runs.
fn rewrite_bare_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let normalized = CONNECTIVE.replace_all(text, |caps: &Captures<'_>| {
        let op = if caps[2].eq_ignore_ascii_case("and") { "&" } else { "|" };
        format!("{}{op}{}", &caps[1], &caps[3])
    });
    IDENTIFIER_RUN
        .replace_all(&normalized, |caps: &Captures<'_>| quote_run(&caps[0]))
        .into_owned()
}

/// Quote the non-reserved groups of a space-joined run.
fn quote_run(run: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for word in run.split(' ') {
        if is_reserved(word) {
            if !pending.is_empty() {
                parts.push(quote_if_needed(&pending.join(" ")));
                pending.clear();
            }
            parts.push(word.to_string());
        } else {
            pending.push(word);
        }
    }
    if !pending.is_empty() {
        parts.push(quote_if_needed(&pending.join(" ")));
    }
    parts.join(" ")
}

fn quote_if_needed(group: &str) -> String {
    let name = group.trim();
    if name.is_empty() || !needs_quoting(name) {
        return group.to_string();
    }
    let lead = &group[..group.len() - group.trim_start().len()];
    let tail = &group[group.trim_end().len()..];
    format!("{lead}`{name}`{tail}")
}

/// Backtick-quoted names in a prepared expression, in order of appearance.
pub fn referenced_columns(prepared: &str) -> Vec<String> {
    segments(prepared)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Quoted(name) => Some(name.to_string()),
            _ => None,
        })
        .collect()
}
