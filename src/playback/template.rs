// SPDX-License-Identifier: GPL-2.0-or-later

//! Parses the configured record-path template (tokens `%path, %Y, %m, %d,
//! %H, %M, %S, %f`) and uses it both to resolve the on-disk directory for a
//! path and to parse a segment filename back into a wall-clock instant.

use crate::error::TemplateError;
use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Micro,
    Literal(String),
}

/// A parsed template: literal directory components (with `%path` already a
/// placeholder) and a tokenized filename pattern.
pub struct Template {
    dir_components: Vec<DirComponent>,
    file_tokens: Vec<Token>,
}

enum DirComponent {
    Literal(String),
    Path,
}

impl Template {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut components: Vec<&str> = template.split('/').collect();
        let Some(file_part) = components.pop() else {
            return Err(TemplateError::NoMatch);
        };

        let dir_components = components
            .into_iter()
            .map(|c| {
                if c == "%path" {
                    DirComponent::Path
                } else {
                    DirComponent::Literal(c.to_owned())
                }
            })
            .collect();

        let file_tokens = tokenize(file_part)?;
        if !file_tokens.contains(&Token::Year) {
            return Err(TemplateError::MissingYear);
        }

        Ok(Self {
            dir_components,
            file_tokens,
        })
    }

    /// Resolves the directory to scan for segments of `path`.
    #[must_use]
    pub fn directory(&self, recordings_dir: &Path, path: &str) -> PathBuf {
        let mut dir = recordings_dir.to_path_buf();
        for component in &self.dir_components {
            match component {
                DirComponent::Literal(s) => dir.push(s),
                DirComponent::Path => dir.push(path),
            }
        }
        dir
    }

    /// Parses a filename (without its directory) into the wall-clock
    /// instant it encodes, or `None` if it doesn't match the template.
    #[must_use]
    pub fn parse_filename(&self, filename: &str) -> Option<NaiveDateTime> {
        let mut year = 0_i32;
        let (mut month, mut day, mut hour, mut minute, mut second, mut micro) = (1_u32, 1_u32, 0_u32, 0_u32, 0_u32, 0_u32);

        let mut rest = filename;
        for token in &self.file_tokens {
            match token {
                Token::Year => {
                    let (v, r) = take_digits(rest, 4)?;
                    year = i32::try_from(v).ok()?;
                    rest = r;
                }
                Token::Month => {
                    let (v, r) = take_digits(rest, 2)?;
                    month = v;
                    rest = r;
                }
                Token::Day => {
                    let (v, r) = take_digits(rest, 2)?;
                    day = v;
                    rest = r;
                }
                Token::Hour => {
                    let (v, r) = take_digits(rest, 2)?;
                    hour = v;
                    rest = r;
                }
                Token::Minute => {
                    let (v, r) = take_digits(rest, 2)?;
                    minute = v;
                    rest = r;
                }
                Token::Second => {
                    let (v, r) = take_digits(rest, 2)?;
                    second = v;
                    rest = r;
                }
                Token::Micro => {
                    let (v, r) = take_digits(rest, 6)?;
                    micro = v;
                    rest = r;
                }
                Token::Literal(lit) => {
                    rest = rest.strip_prefix(lit.as_str())?;
                }
            }
        }
        if !rest.is_empty() {
            return None;
        }

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = date.and_hms_micro_opt(hour, minute, second, micro)?;
        Some(time)
    }
}

fn take_digits(s: &str, width: usize) -> Option<(u32, &str)> {
    if s.len() < width || !s.as_bytes()[..width].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let (digits, rest) = s.split_at(width);
    Some((digits.parse().ok()?, rest))
}

fn token_width(token: &Token) -> usize {
    match token {
        Token::Year => 4,
        Token::Micro => 6,
        Token::Month | Token::Day | Token::Hour | Token::Minute | Token::Second => 2,
        Token::Literal(_) => 0,
    }
}

fn tokenize(pattern: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        let mut width_digits = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() {
                width_digits.push(d);
                chars.next();
            } else {
                break;
            }
        }
        let Some(&next) = chars.peek() else {
            literal.push(c);
            literal.push_str(&width_digits);
            continue;
        };
        let token = match next {
            'Y' => Some(Token::Year),
            'm' => Some(Token::Month),
            'd' => Some(Token::Day),
            'H' => Some(Token::Hour),
            'M' => Some(Token::Minute),
            'S' => Some(Token::Second),
            'f' => Some(Token::Micro),
            _ => None,
        };
        let Some(token) = token else {
            // Unrecognised `%` sequence: kept literal, including the `%`.
            literal.push(c);
            literal.push_str(&width_digits);
            continue;
        };
        if !width_digits.is_empty() {
            let width: usize = width_digits.parse().map_err(|_| TemplateError::UnsupportedWidth)?;
            if width != token_width(&token) {
                return Err(TemplateError::UnsupportedWidth);
            }
        }
        chars.next();
        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }
        tokens.push(token);
    }
    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}
