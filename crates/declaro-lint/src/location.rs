//! Maps findings on introspected structure back to declaration lines.
//!
//! The server normalizes what it reports (display widths, quoting, keyword
//! case), so matching is done on names only: identifiers with or without
//! backticks, case-insensitively. When nothing matches, the finding is placed
//! on the statement's first line.

use regex::Regex;

use declaro_core::Statement;

use crate::checker::{TableOption, Target};

const CLAUSE_KEYWORDS: [&str; 8] = [
    "KEY", "INDEX", "PRIMARY", "UNIQUE", "CONSTRAINT", "FOREIGN", "FULLTEXT", "SPATIAL",
];

/// Line offset within `statement` of the clause `target` refers to.
pub fn line_offset(statement: &Statement, target: &Target) -> usize {
    let lines: Vec<&str> = statement.lines().collect();
    let found = match target {
        Target::Statement => None,
        Target::Column(name) => pattern(&format!(r"(?i)(?:^|[(,])\s*{}\s+[a-z]", ident(name)))
            .and_then(|re| {
                lines
                    .iter()
                    .position(|line| !starts_with_clause_keyword(line) && re.is_match(line))
            }),
        Target::Index(name) if name.eq_ignore_ascii_case("PRIMARY") => {
            pattern(r"(?i)\bPRIMARY\s+KEY\b").and_then(|re| lines.iter().position(|line| re.is_match(line)))
        }
        Target::Index(name) => pattern(&format!(r"(?i)\b(?:KEY|INDEX)\s+{}(?:\s|\(|$)", ident(name)))
            .and_then(|re| lines.iter().position(|line| re.is_match(line))),
        Target::ForeignKey(name) => pattern(&format!(r"(?i)\bCONSTRAINT\s+{}(?:\s|$)", ident(name)))
            .and_then(|re| lines.iter().position(|line| re.is_match(line))),
        // Table options follow the column list, so search from the end.
        Target::Option(TableOption::Engine) => {
            pattern(r"(?i)\bENGINE\s*=").and_then(|re| lines.iter().rposition(|line| re.is_match(line)))
        }
        Target::Option(TableOption::Charset) => {
            pattern(r"(?i)\b(?:CHARSET|CHARACTER\s+SET|COLLATE)\b")
                .and_then(|re| lines.iter().rposition(|line| re.is_match(line)))
        }
    };
    found.unwrap_or(0)
}

fn ident(name: &str) -> String {
    format!("`?{}`?", regex::escape(name))
}

fn pattern(source: &str) -> Option<Regex> {
    match Regex::new(source) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::debug!(event = "location_pattern_invalid", pattern = source, error = %err);
            None
        }
    }
}

fn starts_with_clause_keyword(line: &str) -> bool {
    let first = line
        .trim_start()
        .split(|ch: char| ch.is_whitespace() || ch == '(' || ch == '`')
        .next()
        .unwrap_or("");
    CLAUSE_KEYWORDS
        .iter()
        .any(|keyword| first.eq_ignore_ascii_case(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;
    use declaro_core::StatementKind;

    fn statement(text: &str) -> Statement {
        Statement::new(StatementKind::CreateTable, text, "t.sql", 1)
    }

    const CREATE: &str = "CREATE TABLE `orders` (\n  ID INT(11) NOT NULL,\n  `customer_id` int(10) unsigned,\n  note varchar(20),\n  PRIMARY KEY (id),\n  KEY idx_customer (customer_id, note),\n  CONSTRAINT fk_customer FOREIGN KEY (customer_id) REFERENCES customers (id)\n) ENGINE=MyISAM DEFAULT CHARSET=latin1";

    #[test]
    fn columns_match_without_backticks_or_case() {
        let stmt = statement(CREATE);
        assert_eq!(line_offset(&stmt, &Target::Column("id".to_string())), 1);
        assert_eq!(line_offset(&stmt, &Target::Column("customer_id".to_string())), 2);
        assert_eq!(line_offset(&stmt, &Target::Column("note".to_string())), 3);
    }

    #[test]
    fn keys_and_options_are_located() {
        let stmt = statement(CREATE);
        assert_eq!(line_offset(&stmt, &Target::Index("PRIMARY".to_string())), 4);
        assert_eq!(line_offset(&stmt, &Target::Index("idx_customer".to_string())), 5);
        assert_eq!(line_offset(&stmt, &Target::ForeignKey("fk_customer".to_string())), 6);
        assert_eq!(line_offset(&stmt, &Target::Option(TableOption::Engine)), 7);
        assert_eq!(line_offset(&stmt, &Target::Option(TableOption::Charset)), 7);
    }

    #[test]
    fn unknown_clauses_fall_back_to_first_line() {
        let stmt = statement(CREATE);
        assert_eq!(line_offset(&stmt, &Target::Column("missing".to_string())), 0);
        assert_eq!(line_offset(&stmt, &Target::Index("idx_missing".to_string())), 0);
        let one_line = statement("CREATE TABLE t (id int, name text)");
        assert_eq!(line_offset(&one_line, &Target::Column("name".to_string())), 0);
    }
}
