//! Parser for indentation-structured configuration (IOS, EOS, NX-OS).

use super::{ParseError, RawShape, RawStatement};

/// How a platform terminates multi-line banners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BannerStyle {
    /// `banner motd ^C ... ^C` with a delimiter chosen per banner
    Delimited,
    /// `banner motd` followed by text lines and a lone `EOF`
    EofTerminated,
}

/// Per-platform lexical rules for line-oriented output.
#[derive(Debug)]
pub(crate) struct LineDialect {
    /// Lines starting with these are comments
    pub comment_prefixes: &'static [&'static str],
    /// Non-configuration lines printed around the configuration
    pub noise_prefixes: &'static [&'static str],
    /// Mode-navigation keywords that carry no configuration
    pub navigation: &'static [&'static str],
    pub banner: BannerStyle,
}

pub(crate) const IOS: LineDialect = LineDialect {
    comment_prefixes: &["!"],
    noise_prefixes: &[
        "Building configuration",
        "Current configuration",
        "Last configuration change",
        "NVRAM config last updated",
    ],
    navigation: &["end", "exit", "exit-address-family"],
    banner: BannerStyle::Delimited,
};

pub(crate) const EOS: LineDialect = LineDialect {
    comment_prefixes: &["!"],
    noise_prefixes: &[],
    navigation: &["end", "exit"],
    banner: BannerStyle::EofTerminated,
};

pub(crate) const NXOS: LineDialect = LineDialect {
    comment_prefixes: &["!"],
    noise_prefixes: &["Building configuration", "Current configuration"],
    navigation: &["end", "exit"],
    banner: BannerStyle::Delimited,
};

impl LineDialect {
    fn is_noise(&self, trimmed: &str) -> bool {
        self.comment_prefixes.iter().any(|p| trimmed.starts_with(p))
            || self.noise_prefixes.iter().any(|p| trimmed.starts_with(p))
            || self.navigation.contains(&trimmed)
    }
}

struct Line {
    number: usize,
    indent: usize,
    text: String,
    literal: Option<String>,
}

/// Column width of leading whitespace; tabs advance to the next multiple of 8.
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 8 - width % 8,
            _ => break,
        }
    }
    width
}

/// `banner motd`, `banner login`, ... but not `banner` alone.
fn banner_keyword(trimmed: &str) -> Option<String> {
    let mut tokens = trimmed.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some("banner"), Some(kind)) => Some(format!("banner {}", kind)),
        _ => None,
    }
}

fn read_banner<'a, I>(
    trimmed: &str,
    keyword: &str,
    number: usize,
    style: BannerStyle,
    lines: &mut I,
) -> Result<String, ParseError>
where
    I: Iterator<Item = (usize, &'a str)>,
{
    let mut body: Vec<String> = Vec::new();

    match style {
        BannerStyle::EofTerminated => {
            for (_, raw) in lines.by_ref() {
                if raw.trim() == "EOF" {
                    return Ok(body.join("\n"));
                }
                body.push(raw.trim_end().to_string());
            }
            Err(ParseError::malformed(number, format!("{} is not terminated by EOF", keyword)))
        }
        BannerStyle::Delimited => {
            let rest = trimmed
                .strip_prefix("banner")
                .map(str::trim_start)
                .and_then(|r| r.split_once(char::is_whitespace))
                .map(|(_, rest)| rest.trim_start())
                .unwrap_or("");
            let delimiter: String = if rest.starts_with("^C") {
                "^C".to_string()
            } else {
                match rest.chars().next() {
                    Some(c) => c.to_string(),
                    None => {
                        return Err(ParseError::malformed(
                            number,
                            format!("{} has no delimiter", keyword),
                        ))
                    }
                }
            };

            let first = &rest[delimiter.len()..];
            if let Some(end) = first.find(&delimiter) {
                return Ok(first[..end].to_string());
            }
            if !first.is_empty() {
                body.push(first.to_string());
            }

            for (_, raw) in lines.by_ref() {
                if let Some(end) = raw.find(&delimiter) {
                    if end > 0 {
                        body.push(raw[..end].to_string());
                    }
                    return Ok(body.join("\n"));
                }
                body.push(raw.trim_end().to_string());
            }
            Err(ParseError::malformed(
                number,
                format!("{} is not terminated by '{}'", keyword, delimiter),
            ))
        }
    }
}

/// Split indented output into raw statements with their enclosing headers.
pub(crate) fn parse(text: &str, dialect: &LineDialect) -> Result<Vec<RawStatement>, ParseError> {
    let mut lines = Vec::new();
    let mut source = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    while let Some((number, raw)) = source.next() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || dialect.is_noise(trimmed) {
            continue;
        }

        let indent = indent_width(raw);
        if let Some(keyword) = banner_keyword(trimmed) {
            let body = read_banner(trimmed, &keyword, number, dialect.banner, &mut source)?;
            lines.push(Line {
                number,
                indent,
                text: keyword,
                literal: Some(body),
            });
            continue;
        }

        lines.push(Line {
            number,
            indent,
            text: trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
            literal: None,
        });
    }

    let mut statements = Vec::with_capacity(lines.len());
    let mut open: Vec<(usize, String)> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        while open.last().is_some_and(|(indent, _)| *indent >= line.indent) {
            open.pop();
        }
        let parents: Vec<String> = open.iter().map(|(_, header)| header.clone()).collect();
        let has_children = lines
            .get(i + 1)
            .is_some_and(|next| next.indent > line.indent);

        let shape = match &line.literal {
            Some(body) => RawShape::Literal { body: body.clone() },
            None if has_children => {
                open.push((line.indent, line.text.clone()));
                RawShape::Section
            }
            None => RawShape::Line,
        };

        statements.push(RawStatement {
            line: line.number,
            parents,
            text: line.text.clone(),
            shape,
        });
    }

    Ok(statements)
}
