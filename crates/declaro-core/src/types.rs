use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parsed view of a server-rendered column type such as `int(10) unsigned`,
/// `varchar(255)`, `decimal(10,2)` or `enum('a','b')`.
///
/// The structural model stores the server's `COLUMN_TYPE` text verbatim; this
/// type is derived from it on demand for comparisons that need to reason about
/// sizes (diff safety, lint rules).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnType {
    /// Lowercase base type name, e.g. `int`, `varchar`, `enum`.
    pub base: String,
    /// Parenthesized arguments: display width, length, precision/scale, or
    /// unquoted enum/set values.
    pub args: Vec<String>,
    pub unsigned: bool,
    pub zerofill: bool,
}

/// Broad family of a column type, used for safety and lint reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Decimal,
    Float,
    Bit,
    Char,
    Binary,
    Text,
    Blob,
    Temporal,
    EnumSet,
    Json,
    Spatial,
    Other,
}

impl ColumnType {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let (head, args, tail) = match trimmed.find('(') {
            Some(open) => {
                let close = find_closing_paren(trimmed, open).unwrap_or(trimmed.len());
                let inner = &trimmed[open + 1..close.min(trimmed.len())];
                let tail = trimmed.get(close + 1..).unwrap_or("");
                (&trimmed[..open], split_args(inner), tail)
            }
            None => match trimmed.find(' ') {
                Some(space) => (&trimmed[..space], Vec::new(), &trimmed[space..]),
                None => (trimmed, Vec::new(), ""),
            },
        };
        let base = head.trim().to_ascii_lowercase();
        let tail = tail.to_ascii_lowercase();
        let words: Vec<&str> = tail.split_whitespace().collect();
        Self {
            base,
            args,
            unsigned: words.contains(&"unsigned"),
            zerofill: words.contains(&"zerofill"),
        }
    }

    pub fn family(&self) -> TypeFamily {
        match self.base.as_str() {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" => {
                TypeFamily::Integer
            }
            "decimal" | "numeric" => TypeFamily::Decimal,
            "float" | "double" | "real" => TypeFamily::Float,
            "bit" => TypeFamily::Bit,
            "char" | "varchar" => TypeFamily::Char,
            "binary" | "varbinary" => TypeFamily::Binary,
            "tinytext" | "text" | "mediumtext" | "longtext" => TypeFamily::Text,
            "tinyblob" | "blob" | "mediumblob" | "longblob" => TypeFamily::Blob,
            "date" | "datetime" | "timestamp" | "time" | "year" => TypeFamily::Temporal,
            "enum" | "set" => TypeFamily::EnumSet,
            "json" => TypeFamily::Json,
            "geometry" | "point" | "linestring" | "polygon" | "multipoint"
            | "multilinestring" | "multipolygon" | "geometrycollection" => TypeFamily::Spatial,
            _ => TypeFamily::Other,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.family() == TypeFamily::Integer
    }

    /// Storage size in bytes for integer types.
    pub fn integer_bytes(&self) -> Option<u8> {
        match self.base.as_str() {
            "tinyint" => Some(1),
            "smallint" => Some(2),
            "mediumint" => Some(3),
            "int" | "integer" => Some(4),
            "bigint" => Some(8),
            _ => None,
        }
    }

    /// Display width of an integer type, when the server reports one.
    pub fn display_width(&self) -> Option<u32> {
        if !self.is_integer() {
            return None;
        }
        self.args.first().and_then(|arg| arg.parse().ok())
    }

    /// The display width MySQL assigns when none is declared.
    pub fn default_display_width(&self) -> Option<u32> {
        let width = match (self.base.as_str(), self.unsigned) {
            ("tinyint", false) => 4,
            ("tinyint", true) => 3,
            ("smallint", false) => 6,
            ("smallint", true) => 5,
            ("mediumint", false) => 9,
            ("mediumint", true) => 8,
            ("int" | "integer", false) => 11,
            ("int" | "integer", true) => 10,
            ("bigint", _) => 20,
            _ => return None,
        };
        Some(width)
    }

    /// Declared length for char/binary/bit types.
    pub fn length(&self) -> Option<u64> {
        match self.family() {
            TypeFamily::Char | TypeFamily::Binary | TypeFamily::Bit => {
                self.args.first().and_then(|arg| arg.parse().ok())
            }
            _ => None,
        }
    }

    /// Precision and scale for decimal types.
    pub fn precision_scale(&self) -> Option<(u32, u32)> {
        if self.family() != TypeFamily::Decimal {
            return None;
        }
        let precision = self.args.first().and_then(|arg| arg.parse().ok()).unwrap_or(10);
        let scale = self.args.get(1).and_then(|arg| arg.parse().ok()).unwrap_or(0);
        Some((precision, scale))
    }

    /// Relative capacity for text and blob types.
    pub fn lob_rank(&self) -> Option<u8> {
        match self.base.as_str() {
            "tinytext" | "tinyblob" => Some(1),
            "text" | "blob" => Some(2),
            "mediumtext" | "mediumblob" => Some(3),
            "longtext" | "longblob" => Some(4),
            _ => None,
        }
    }

    /// Values of an `enum` or `set` type, in declaration order.
    pub fn values(&self) -> Option<&[String]> {
        if self.family() == TypeFamily::EnumSet {
            Some(&self.args)
        } else {
            None
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        if !self.args.is_empty() {
            if self.family() == TypeFamily::EnumSet {
                let quoted: Vec<String> = self
                    .args
                    .iter()
                    .map(|value| format!("'{}'", value.replace('\'', "''")))
                    .collect();
                write!(f, "({})", quoted.join(","))?;
            } else {
                write!(f, "({})", self.args.join(","))?;
            }
        }
        if self.unsigned {
            f.write_str(" unsigned")?;
        }
        if self.zerofill {
            f.write_str(" zerofill")?;
        }
        Ok(())
    }
}

fn find_closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut in_quote = false;
    let bytes = text.as_bytes();
    let mut idx = open + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\'' if in_quote && bytes.get(idx + 1) == Some(&b'\'') => idx += 1,
            b'\'' => in_quote = !in_quote,
            b')' if !in_quote => return Some(idx),
            _ => {}
        }
        idx += 1;
    }
    None
}

/// Splits a type's argument list. Quoted values are kept exactly, including
/// surrounding spaces and empty strings; whitespace outside quotes is dropped.
fn split_args(inner: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quote = false;
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\'' if in_quote && chars.peek() == Some(&'\'') => {
                current.push('\'');
                chars.next();
            }
            '\'' => {
                in_quote = !in_quote;
                quoted = true;
            }
            ',' if !in_quote => {
                args.push(std::mem::take(&mut current));
                quoted = false;
            }
            other if in_quote || !other.is_whitespace() => current.push(other),
            _ => {}
        }
    }
    if quoted || !current.is_empty() || !args.is_empty() {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integer_with_width_and_modifiers() {
        let ty = ColumnType::parse("int(10) unsigned zerofill");
        assert_eq!(ty.base, "int");
        assert_eq!(ty.display_width(), Some(10));
        assert!(ty.unsigned);
        assert!(ty.zerofill);
        assert_eq!(ty.default_display_width(), Some(10));
        assert_eq!(ty.integer_bytes(), Some(4));
    }

    #[test]
    fn parses_integer_without_width() {
        let ty = ColumnType::parse("bigint unsigned");
        assert_eq!(ty.base, "bigint");
        assert!(ty.args.is_empty());
        assert!(ty.unsigned);
        assert_eq!(ty.display_width(), None);
    }

    #[test]
    fn parses_enum_values_with_embedded_quotes_and_commas() {
        let ty = ColumnType::parse("enum('a','b,c','it''s')");
        assert_eq!(ty.values().unwrap(), &["a", "b,c", "it's"]);
        assert_eq!(ty.to_string(), "enum('a','b,c','it''s')");
    }

    #[test]
    fn enum_values_keep_spaces_and_empty_members() {
        let ty = ColumnType::parse("enum(' a','', 'b ' )");
        assert_eq!(ty.values().unwrap(), &[" a", "", "b "]);
        assert_eq!(ty.to_string(), "enum(' a','','b ')");

        let only_empty = ColumnType::parse("set('')");
        assert_eq!(only_empty.values().unwrap(), &[""]);
        assert_eq!(ColumnType::parse("decimal(10, 2)").args, vec!["10", "2"]);
    }

    #[test]
    fn parses_decimal_precision() {
        let ty = ColumnType::parse("decimal(12,4)");
        assert_eq!(ty.precision_scale(), Some((12, 4)));
        assert_eq!(ColumnType::parse("varchar(64)").length(), Some(64));
        assert_eq!(ColumnType::parse("mediumtext").lob_rank(), Some(3));
    }
}
