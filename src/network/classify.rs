//! Statement classification shared by all platform parsers.

use super::{ParseError, RawShape, RawStatement};
use crate::snapshot::{Statement, StatementKind, StatementPath, FLAG_NEGATED, FLAG_SET};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Classify raw statements and reject duplicate paths.
///
/// Returns statements sorted by path.
pub(crate) fn collect(
    raw: Vec<RawStatement>,
    keyed: &[&[&str]],
    negation: Option<&str>,
) -> Result<Vec<Statement>, ParseError> {
    let mut by_path: BTreeMap<StatementPath, (usize, Statement)> = BTreeMap::new();

    for entry in raw {
        let line = entry.line;
        let statement = classify(&entry, keyed, negation);

        match by_path.entry(statement.path.clone()) {
            Entry::Vacant(slot) => {
                slot.insert((line, statement));
            }
            Entry::Occupied(mut slot) => {
                let (first_line, existing) = slot.get_mut();
                if !merge_continuation(existing, &statement) {
                    return Err(ParseError::DuplicatePath {
                        line,
                        first_line: *first_line,
                        path: statement.path.to_string(),
                    });
                }
            }
        }
    }

    Ok(by_path.into_values().map(|(_, s)| s).collect())
}

/// IOS splits long VLAN lists over several lines:
/// `switchport trunk allowed vlan 10,20` followed by
/// `switchport trunk allowed vlan add 30`. Fold those into one body.
fn merge_continuation(existing: &mut Statement, next: &Statement) -> bool {
    let continued = next.body.strip_prefix("add ");
    match continued {
        Some(rest)
            if existing.kind == StatementKind::Setting
                && next.kind == StatementKind::Setting
                && existing.keyword == next.keyword =>
        {
            existing.body = format!("{},{}", existing.body, rest.trim());
            true
        }
        _ => false,
    }
}

/// Trailing qualifiers that let a keyed setting repeat within one scope,
/// as in `ip address 10.0.1.1 255.255.255.0 secondary`. The first value
/// token then becomes part of the path.
const REPEATABLE_QUALIFIERS: &[&str] = &["secondary"];

/// Position just past the first keyed setting in `tokens`, if any.
///
/// A key only matches when at least one value token follows it; `keyed` is
/// ordered longest first so the most specific key wins at a position.
fn key_end(tokens: &[&str], keyed: &[&[&str]]) -> Option<usize> {
    (0..tokens.len()).find_map(|start| {
        keyed
            .iter()
            .find(|key| tokens[start..].starts_with(key) && tokens.len() > start + key.len())
            .map(|key| start + key.len())
    })
}

fn classify(raw: &RawStatement, keyed: &[&[&str]], negation: Option<&str>) -> Statement {
    let mut path: Vec<String> = raw
        .parents
        .iter()
        .flat_map(|p| p.split_whitespace())
        .map(str::to_string)
        .collect();

    match &raw.shape {
        RawShape::Literal { body } => {
            path.extend(raw.text.split_whitespace().map(str::to_string));
            Statement {
                path: StatementPath::new(path),
                body: body.clone(),
                kind: StatementKind::Setting,
                parents: raw.parents.clone(),
                keyword: raw.text.clone(),
            }
        }
        RawShape::Section => {
            let keyword = raw.text.split_whitespace().collect::<Vec<_>>().join(" ");
            path.extend(keyword.split(' ').map(str::to_string));
            Statement {
                path: StatementPath::new(path),
                body: FLAG_SET.to_string(),
                kind: StatementKind::Section,
                parents: raw.parents.clone(),
                keyword,
            }
        }
        RawShape::Line => {
            let mut tokens: Vec<&str> = raw.text.split_whitespace().collect();
            let negated = matches!(negation, Some(n) if tokens.len() > 1 && tokens[0] == n);
            if negated {
                tokens.remove(0);
            }

            let matched = key_end(&tokens, keyed);
            let mut split = matched.unwrap_or(tokens.len());
            if matched.is_some()
                && tokens.len() > split + 1
                && tokens
                    .last()
                    .is_some_and(|t| REPEATABLE_QUALIFIERS.contains(t))
            {
                split += 1;
            }
            path.extend(tokens[..split].iter().map(|t| t.to_string()));

            let (kind, body) = if negated {
                (StatementKind::Negated, FLAG_NEGATED.to_string())
            } else if matched.is_some() {
                (StatementKind::Setting, tokens[split..].join(" "))
            } else {
                (StatementKind::Flag, FLAG_SET.to_string())
            };

            Statement {
                path: StatementPath::new(path),
                body,
                kind,
                parents: raw.parents.clone(),
                keyword: tokens[..split].join(" "),
            }
        }
    }
}
