use std::collections::BTreeMap;

use crate::types::SqlValue;

/// Values for the `$name` / `$1` placeholders of a statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Parameters {
    #[default]
    None,
    /// Looked up by placeholder name.
    Named(BTreeMap<String, SqlValue>),
    /// Looked up by 1-based placeholder number.
    Positional(Vec<SqlValue>),
}

impl Parameters {
    pub fn named<K: Into<String>, V: Into<SqlValue>>(
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Parameters::Named(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn positional<V: Into<SqlValue>>(values: impl IntoIterator<Item = V>) -> Self {
        Parameters::Positional(values.into_iter().map(Into::into).collect())
    }

    fn lookup(&self, key: &str) -> Option<&SqlValue> {
        match self {
            Parameters::None => None,
            Parameters::Named(values) => values.get(key),
            Parameters::Positional(values) => key
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| values.get(i)),
        }
    }
}

fn is_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lexical context of the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    Code,
    /// `'...'`, where `''` closes and reopens the literal.
    Literal,
    /// `"..."` quoted identifier.
    Identifier,
    /// `--` up to the end of the line.
    LineComment,
    /// `/* ... */`
    BlockComment,
}

/// Rewrites `$name` placeholders into positional `?` markers.
///
/// Every placeholder with a value becomes `?` and its value is appended to
/// the bind list, in order of appearance. Placeholders without a value are
/// left as written for the driver to reject. `$$` is an escaped `$`.
/// Placeholders glued to a preceding word, or inside string literals,
/// quoted identifiers and comments, are not touched. The bind list is
/// `None` when nothing was bound.
pub fn format_bind_parameters(sql: &str, values: &Parameters) -> (String, Option<Vec<SqlValue>>) {
    let mut out = String::with_capacity(sql.len());
    let mut bind = Vec::new();
    let mut state = Scan::Code;
    let mut prev: Option<char> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if state != Scan::Code {
            out.push(c);
            prev = Some(c);
            state = match (state, c) {
                (Scan::Literal, '\'')
                | (Scan::Identifier, '"')
                | (Scan::LineComment, '\n') => Scan::Code,
                (Scan::BlockComment, '*') => match chars.next_if(|&(_, next)| next == '/') {
                    Some(_) => {
                        out.push('/');
                        prev = Some('/');
                        Scan::Code
                    }
                    None => state,
                },
                _ => state,
            };
            continue;
        }

        let opened = match c {
            '\'' => Some(Scan::Literal),
            '"' => Some(Scan::Identifier),
            '-' => chars
                .next_if(|&(_, next)| next == '-')
                .map(|_| Scan::LineComment),
            '/' => chars
                .next_if(|&(_, next)| next == '*')
                .map(|_| Scan::BlockComment),
            _ => None,
        };
        if let Some(opened) = opened {
            out.push(c);
            match opened {
                Scan::LineComment => out.push('-'),
                Scan::BlockComment => out.push('*'),
                _ => {}
            }
            state = opened;
            continue;
        }

        if c != '$' || prev.is_some_and(is_word) {
            out.push(c);
            prev = Some(c);
            continue;
        }
        if chars.next_if(|&(_, next)| next == '$').is_some() {
            out.push('$');
            prev = Some('$');
            continue;
        }
        let mut end = start + 1;
        while let Some((i, next)) = chars.next_if(|&(_, next)| is_word(next)) {
            end = i + next.len_utf8();
        }
        let key = &sql[start + 1..end];
        match values.lookup(key) {
            Some(value) if !key.is_empty() => {
                out.push('?');
                bind.push(value.clone());
            }
            _ => out.push_str(&sql[start..end]),
        }
        prev = sql[..end].chars().next_back();
    }

    let bind = if bind.is_empty() { None } else { Some(bind) };
    (out, bind)
}
