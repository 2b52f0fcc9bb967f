//! Parser for Junos configuration, both hierarchical and `set` formats.

use super::{ParseError, RawShape, RawStatement};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open,
    Close,
    Terminator,
}

/// Annotations Junos prints in front of a statement.
const ANNOTATIONS: &[&str] = &["inactive:", "protect:", "replace:"];

/// Remove `/* ... */` comments, keeping line breaks so line numbers survive.
fn strip_block_comments(text: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut line = 1;

    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        line += rest[..start].matches('\n').count();
        let after = &rest[start + 2..];
        let end = after
            .find("*/")
            .ok_or_else(|| ParseError::malformed(line, "unterminated comment"))?;
        let newlines = after[..end].matches('\n').count();
        out.extend(std::iter::repeat('\n').take(newlines));
        line += newlines;
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn tokenize(line: &str, number: usize) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut chars = line.chars();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    };

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                word.push('"');
                let mut closed = false;
                for q in chars.by_ref() {
                    word.push(q);
                    if q == '"' {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(ParseError::malformed(number, "unterminated quoted string"));
                }
            }
            '#' if word.is_empty() => break,
            '{' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Open);
            }
            '}' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Close);
            }
            ';' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Terminator);
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

fn take_statement(words: &mut Vec<String>) -> String {
    let skip = words
        .iter()
        .take_while(|w| ANNOTATIONS.contains(&w.as_str()))
        .count();
    let text = words[skip..].join(" ");
    words.clear();
    text
}

/// Expand a bracketed value list, `members [ V10 V20 ]`, into one statement
/// per value so every member has its own path.
fn expand_list(text: &str) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let open = words.iter().position(|w| *w == "[");
    let close = words.iter().rposition(|w| *w == "]");
    let (open, close) = match (open, close) {
        (Some(open), Some(close)) if open < close => (open, close),
        _ => return vec![text.to_string()],
    };

    words[open + 1..close]
        .iter()
        .map(|value| {
            words[..open]
                .iter()
                .chain(std::iter::once(value))
                .chain(&words[close + 1..])
                .copied()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn parse_hierarchical(text: &str) -> Result<Vec<RawStatement>, ParseError> {
    let mut statements = Vec::new();
    let mut open: Vec<(usize, String)> = Vec::new();
    let mut words: Vec<String> = Vec::new();
    let mut started = 0;

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;

        for token in tokenize(line, number)? {
            match token {
                Token::Word(word) => {
                    if words.is_empty() {
                        started = number;
                    }
                    words.push(word);
                }
                Token::Open => {
                    if words.is_empty() {
                        return Err(ParseError::malformed(number, "block without a name"));
                    }
                    let header = take_statement(&mut words);
                    statements.push(RawStatement {
                        line: started,
                        parents: open.iter().map(|(_, h)| h.clone()).collect(),
                        text: header.clone(),
                        shape: RawShape::Section,
                    });
                    open.push((started, header));
                }
                Token::Terminator => {
                    if words.is_empty() {
                        continue;
                    }
                    let text = take_statement(&mut words);
                    if text.is_empty() {
                        continue;
                    }
                    for text in expand_list(&text) {
                        statements.push(RawStatement {
                            line: started,
                            parents: open.iter().map(|(_, h)| h.clone()).collect(),
                            text,
                            shape: RawShape::Line,
                        });
                    }
                }
                Token::Close => {
                    if !words.is_empty() {
                        return Err(ParseError::malformed(started, "statement is missing ';'"));
                    }
                    if open.pop().is_none() {
                        return Err(ParseError::malformed(number, "unbalanced '}'"));
                    }
                }
            }
        }
    }

    if !words.is_empty() {
        return Err(ParseError::malformed(started, "statement is missing ';'"));
    }
    if let Some((line, header)) = open.last() {
        return Err(ParseError::malformed(
            *line,
            format!("block '{}' opened here is never closed", header),
        ));
    }
    Ok(statements)
}

fn parse_set(text: &str) -> Result<Vec<RawStatement>, ParseError> {
    let mut statements = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let tokens = tokenize(line, number)?;
        let mut words = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                Token::Word(w) => words.push(w),
                _ => {
                    return Err(ParseError::malformed(
                        number,
                        "braces are not allowed in set-format configuration",
                    ))
                }
            }
        }

        match words.first().map(String::as_str) {
            None => continue,
            Some("set") if words.len() > 1 => {
                statements.extend(expand_list(&words[1..].join(" ")).into_iter().map(|text| {
                    RawStatement {
                        line: number,
                        parents: Vec::new(),
                        text,
                        shape: RawShape::Line,
                    }
                }))
            }
            // Activation state and plan-level deletions are not configuration
            Some("deactivate" | "activate" | "delete" | "commit" | "top") => continue,
            Some(other) => {
                return Err(ParseError::malformed(
                    number,
                    format!("expected a 'set' statement, found '{}'", other),
                ))
            }
        }
    }
    Ok(statements)
}

fn is_set_format(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .is_some_and(|l| l.starts_with("set ") || l.starts_with("delete "))
}

/// Parse Junos output into raw statements.
pub(crate) fn parse(text: &str) -> Result<Vec<RawStatement>, ParseError> {
    let cleaned = strip_block_comments(text)?;
    if is_set_format(&cleaned) {
        parse_set(&cleaned)
    } else {
        parse_hierarchical(&cleaned)
    }
}
