//! Loads a directory of `.sql` files into a logical schema.
//!
//! Files are read in name order and split into statements on the current
//! delimiter, honoring quotes, comments and `DELIMITER` lines. Only the
//! statement kind and object name are recognized; the text is kept verbatim.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use declaro_core::{LogicalSchema, Statement, StatementKind};

use crate::CliError;

/// Reads every `.sql` file directly inside `dir`.
///
/// A CREATE qualified with `schema_name` has the qualifier removed so the
/// statement lands in whatever workspace runs it. Any other qualifier is an
/// error: the statement would write outside the workspace.
pub fn load_dir(dir: &Path, schema_name: &str) -> Result<LogicalSchema, CliError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|err| CliError::Io(dir.to_path_buf(), err))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
        })
        .collect();
    files.sort();

    let mut logical = LogicalSchema::new(schema_name);
    for file in files {
        let source = std::fs::read_to_string(&file).map_err(|err| CliError::Io(file.clone(), err))?;
        for mut statement in split_statements(&source, &file) {
            if statement.kind != StatementKind::Other {
                if let Some((qualifier, range)) = schema_qualifier(&statement.text) {
                    if qualifier != schema_name {
                        return Err(CliError::ForeignSchema {
                            location: statement.location(),
                            schema: qualifier,
                            expected: schema_name.to_string(),
                        });
                    }
                    statement.text.replace_range(range, "");
                }
            }
            logical.push(statement);
        }
    }
    tracing::debug!(
        event = "schema_dir_loaded",
        dir = %dir.display(),
        statements = logical.statements.len()
    );
    Ok(logical)
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    Quote(u8),
    LineComment,
    BlockComment,
}

/// Splits `source` into statements attributed to `file`.
pub fn split_statements(source: &str, file: &Path) -> Vec<Statement> {
    let bytes = source.as_bytes();
    let mut statements = Vec::new();
    let mut delimiter = ";".to_string();
    let mut state = State::Normal;
    let (mut start, mut start_line, mut line) = (0, 1, 1);
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            State::Quote(quote) => {
                if b == b'\\' && quote != b'`' {
                    if next == Some(b'\n') {
                        line += 1;
                    }
                    i += 2;
                    continue;
                }
                if b == quote {
                    if next == Some(quote) {
                        i += 2;
                        continue;
                    }
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = State::Normal;
                    i += 2;
                    continue;
                }
            }
            State::Normal => {
                if bytes[i..].starts_with(delimiter.as_bytes()) {
                    push_statement(&mut statements, &source[start..i], file, start_line);
                    i += delimiter.len();
                    start = i;
                    start_line = line;
                    continue;
                }
                match b {
                    b'\'' | b'"' | b'`' => state = State::Quote(b),
                    b'#' => state = State::LineComment,
                    b'-' if next == Some(b'-')
                        && bytes.get(i + 2).is_none_or(|ch| ch.is_ascii_whitespace()) =>
                    {
                        state = State::LineComment;
                    }
                    b'/' if next == Some(b'*') => {
                        state = State::BlockComment;
                        i += 2;
                        continue;
                    }
                    b'D' | b'd' if is_delimiter_command(&bytes[i..]) && is_trivia(&source[start..i]) => {
                        let line_end = source[i..].find('\n').map_or(source.len(), |pos| i + pos);
                        if let Some(new) = source[i..line_end].split_whitespace().nth(1) {
                            delimiter = new.to_string();
                        }
                        i = line_end;
                        start = line_end;
                        start_line = line;
                        continue;
                    }
                    _ => {}
                }
            }
        }
        if b == b'\n' {
            line += 1;
        }
        i += 1;
    }
    push_statement(&mut statements, &source[start..], file, start_line);
    statements
}

fn is_delimiter_command(rest: &[u8]) -> bool {
    rest.len() > 9 && rest[..9].eq_ignore_ascii_case(b"DELIMITER") && rest[9].is_ascii_whitespace()
}

fn is_trivia(text: &str) -> bool {
    leading_trivia(text).0 == text.len()
}

/// Byte length and newline count of the whitespace and comments that open
/// `text`.
fn leading_trivia(text: &str) -> (usize, usize) {
    let mut pos = 0;
    let mut newlines = 0;
    loop {
        let rest = &text[pos..];
        let trimmed = rest.trim_start();
        newlines += rest[..rest.len() - trimmed.len()].matches('\n').count();
        pos += rest.len() - trimmed.len();

        let comment_end = if trimmed.starts_with('#')
            || (trimmed.starts_with("--") && trimmed[2..].chars().next().is_none_or(char::is_whitespace))
        {
            Some(trimmed.find('\n').map_or(trimmed.len(), |end| end + 1))
        } else if trimmed.starts_with("/*") {
            Some(trimmed.find("*/").map_or(trimmed.len(), |end| end + 2))
        } else {
            None
        };
        match comment_end {
            Some(end) => {
                newlines += trimmed[..end].matches('\n').count();
                pos += end;
            }
            None => return (pos, newlines),
        }
    }
}

fn push_statement(statements: &mut Vec<Statement>, raw: &str, file: &Path, start_line: usize) {
    let (skip, newlines) = leading_trivia(raw);
    let text = raw[skip..].trim_end();
    if text.is_empty() {
        return;
    }
    let (kind, name) = classify(text);
    let statement = Statement::new(kind, text, file, start_line + newlines);
    statements.push(match name {
        Some(name) => statement.with_object(name),
        None => statement,
    });
}

fn create_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"(?is)^CREATE\s+(?:DEFINER\s*=\s*\S+\s+)?(?:SQL\s+SECURITY\s+\w+\s+)?(TABLE|PROCEDURE|FUNCTION)\s+(?:IF\s+NOT\s+EXISTS\s+)?((?:`([^`]+)`|(\w+))\s*\.\s*)?(?:`([^`]+)`|(\w+))",
            )
            .ok()
        })
        .as_ref()
}

/// Statement kind and declared object name.
pub fn classify(text: &str) -> (StatementKind, Option<String>) {
    let Some(captures) = create_pattern().and_then(|re| re.captures(text)) else {
        return (StatementKind::Other, None);
    };
    let kind = match captures[1].to_ascii_uppercase().as_str() {
        "TABLE" => StatementKind::CreateTable,
        "PROCEDURE" => StatementKind::CreateProcedure,
        _ => StatementKind::CreateFunction,
    };
    let name = captures
        .get(5)
        .or_else(|| captures.get(6))
        .map(|name| name.as_str().to_string());
    (kind, name)
}

/// Schema named before the object in a CREATE, with the byte range of the
/// `schema.` prefix in `text`.
pub fn schema_qualifier(text: &str) -> Option<(String, Range<usize>)> {
    let captures = create_pattern()?.captures(text)?;
    let prefix = captures.get(2)?;
    let schema = captures.get(3).or_else(|| captures.get(4))?;
    Some((schema.as_str().to_string(), prefix.range()))
}
