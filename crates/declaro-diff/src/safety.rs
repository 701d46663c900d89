use std::fmt;

use serde::Serialize;

use declaro_core::{Column, ColumnDefault, ColumnType, TypeFamily};

/// How much a change can affect existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Safety {
    Safe,
    /// The outcome depends on data or server behavior and cannot be proven
    /// harmless.
    Unsafe,
    /// The change can discard data.
    Destructive,
}

impl fmt::Display for Safety {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => f.write_str("safe"),
            Self::Unsafe => f.write_str("unsafe"),
            Self::Destructive => f.write_str("destructive"),
        }
    }
}

/// Two types are equivalent when they differ only by an integer display
/// width that one side omits. Servers that drop display widths report
/// `int` where older servers report `int(11)`.
pub(crate) fn types_equivalent(left: &ColumnType, right: &ColumnType) -> bool {
    if left == right {
        return true;
    }
    left.is_integer()
        && left.base == right.base
        && left.unsigned == right.unsigned
        && left.zerofill == right.zerofill
        && (left.args.is_empty() || right.args.is_empty())
}

/// Classifies changing a column definition from `from` to `to`.
pub fn column_change(from: &Column, to: &Column) -> Safety {
    let old = from.parsed_type();
    let new = to.parsed_type();
    let mut safety = if types_equivalent(&old, &new) {
        Safety::Safe
    } else {
        type_change(&old, &new)
    };

    let mut raise = |condition: bool, level: Safety| {
        if condition {
            safety = safety.max(level);
        }
    };
    raise(
        from.charset != to.charset || from.collation != to.collation,
        Safety::Unsafe,
    );
    raise(from.nullable && !to.nullable, Safety::Unsafe);
    raise(
        from.default != to.default
            && (is_expression(from.default.as_ref()) || is_expression(to.default.as_ref())),
        Safety::Unsafe,
    );
    raise(from.generated != to.generated, Safety::Unsafe);
    raise(from.auto_increment != to.auto_increment, Safety::Unsafe);
    safety
}

fn is_expression(default: Option<&ColumnDefault>) -> bool {
    matches!(default, Some(ColumnDefault::Expression(_)))
}

/// Classifies a change of column type.
///
/// Widening an integer (`int` to `bigint`) is still unsafe: the column is
/// rebuilt and dependent foreign keys must match.
pub fn type_change(old: &ColumnType, new: &ColumnType) -> Safety {
    if old.family() == TypeFamily::EnumSet && old.base == new.base {
        return enum_change(&old.args, &new.args);
    }
    if is_narrowing(old, new) {
        return Safety::Destructive;
    }
    let width_only = old.is_integer()
        && old.base == new.base
        && old.unsigned == new.unsigned
        && old.zerofill == new.zerofill;
    if width_only { Safety::Safe } else { Safety::Unsafe }
}

fn enum_change(old: &[String], new: &[String]) -> Safety {
    if old.iter().any(|value| !new.contains(value)) {
        Safety::Destructive
    } else if new.starts_with(old) {
        Safety::Safe
    } else {
        Safety::Unsafe
    }
}

/// Whether some value representable in `old` cannot be stored in `new`.
pub fn is_narrowing(old: &ColumnType, new: &ColumnType) -> bool {
    use TypeFamily::*;

    match (old.family(), new.family()) {
        (Integer, Integer) => match (integer_range(old), integer_range(new)) {
            (Some((old_min, old_max)), Some((new_min, new_max))) => {
                new_min > old_min || new_max < old_max
            }
            _ => true,
        },
        (Integer, Decimal) => match (integer_digits(old), new.precision_scale()) {
            (Some(digits), Some((precision, scale))) => {
                precision.saturating_sub(scale) < digits || (new.unsigned && !old.unsigned)
            }
            _ => true,
        },
        (Decimal, Decimal) => match (old.precision_scale(), new.precision_scale()) {
            (Some((old_p, old_s)), Some((new_p, new_s))) => {
                new_s < old_s
                    || new_p.saturating_sub(new_s) < old_p.saturating_sub(old_s)
                    || (new.unsigned && !old.unsigned)
            }
            _ => true,
        },
        (Float, Float) => float_rank(new) < float_rank(old) || (new.unsigned && !old.unsigned),
        (Char, Char) | (Binary, Binary) | (Bit, Bit) => match (old.length(), new.length()) {
            (Some(old_len), Some(new_len)) => new_len < old_len,
            _ => false,
        },
        (Char, Text) | (Binary, Blob) => {
            let bytes_per_char = if old.family() == Char { 4 } else { 1 };
            let needed = old.length().unwrap_or(0) * bytes_per_char;
            needed > lob_capacity(new)
        }
        (Text, Text) | (Blob, Blob) => new.lob_rank() < old.lob_rank(),
        (Temporal, Temporal) => temporal_narrowing(old, new),
        (EnumSet, EnumSet) => match (old.values(), new.values()) {
            (Some(old_values), Some(new_values)) => {
                old.base != new.base || old_values.iter().any(|value| !new_values.contains(value))
            }
            _ => true,
        },
        (EnumSet, Char) => {
            let longest = old
                .values()
                .map(|values| values.iter().map(|value| value.chars().count()).max().unwrap_or(0))
                .unwrap_or(0);
            old.base == "set" || new.length().unwrap_or(0) < longest as u64
        }
        (EnumSet, Text) => false,
        _ => old.base != new.base,
    }
}

fn integer_range(ty: &ColumnType) -> Option<(i128, i128)> {
    let bits = u32::from(ty.integer_bytes()?) * 8;
    if ty.unsigned {
        Some((0, (1i128 << bits) - 1))
    } else {
        Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
    }
}

fn integer_digits(ty: &ColumnType) -> Option<u32> {
    let (_, max) = integer_range(ty)?;
    Some(max.to_string().len() as u32)
}

fn float_rank(ty: &ColumnType) -> u8 {
    match ty.base.as_str() {
        "float" => 1,
        _ => 2,
    }
}

fn lob_capacity(ty: &ColumnType) -> u64 {
    match ty.lob_rank() {
        Some(1) => 255,
        Some(2) => 65_535,
        Some(3) => 16_777_215,
        _ => u64::from(u32::MAX),
    }
}

fn fractional_digits(ty: &ColumnType) -> u32 {
    ty.args.first().and_then(|arg| arg.parse().ok()).unwrap_or(0)
}

fn temporal_narrowing(old: &ColumnType, new: &ColumnType) -> bool {
    match (old.base.as_str(), new.base.as_str()) {
        (a, b) if a == b => fractional_digits(new) < fractional_digits(old),
        ("date", "datetime") | ("date", "timestamp") => false,
        ("timestamp", "datetime") => fractional_digits(new) < fractional_digits(old),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(from: &str, to: &str) -> Safety {
        type_change(&ColumnType::parse(from), &ColumnType::parse(to))
    }

    #[test]
    fn integer_widening_is_unsafe_and_narrowing_destructive() {
        assert_eq!(change("int", "bigint"), Safety::Unsafe);
        assert_eq!(change("bigint", "int"), Safety::Destructive);
        assert_eq!(change("int unsigned", "bigint"), Safety::Unsafe);
        assert_eq!(change("int", "int unsigned"), Safety::Destructive);
        assert_eq!(change("int unsigned", "int"), Safety::Destructive);
        assert_eq!(change("int(10)", "int(11)"), Safety::Safe);
    }

    #[test]
    fn string_lengths_and_lob_ranks() {
        assert_eq!(change("varchar(64)", "varchar(255)"), Safety::Unsafe);
        assert_eq!(change("varchar(255)", "varchar(64)"), Safety::Destructive);
        assert_eq!(change("varchar(32)", "text"), Safety::Unsafe);
        assert_eq!(change("varchar(100)", "tinytext"), Safety::Destructive);
        assert_eq!(change("mediumtext", "text"), Safety::Destructive);
        assert_eq!(change("text", "varchar(255)"), Safety::Destructive);
    }

    #[test]
    fn decimals_and_temporals() {
        assert_eq!(change("decimal(10,2)", "decimal(12,2)"), Safety::Unsafe);
        assert_eq!(change("decimal(10,2)", "decimal(10,1)"), Safety::Destructive);
        assert_eq!(change("int", "decimal(12,0)"), Safety::Unsafe);
        assert_eq!(change("int", "decimal(5,0)"), Safety::Destructive);
        assert_eq!(change("date", "datetime"), Safety::Unsafe);
        assert_eq!(change("datetime(6)", "datetime"), Safety::Destructive);
        assert_eq!(change("datetime", "date"), Safety::Destructive);
    }

    #[test]
    fn enum_value_changes() {
        assert_eq!(change("enum('a','b')", "enum('a','b','c')"), Safety::Safe);
        assert_eq!(change("enum('a','b')", "enum('b','a')"), Safety::Unsafe);
        assert_eq!(change("enum('a','b')", "enum('a')"), Safety::Destructive);
    }

    #[test]
    fn column_attributes_raise_safety() {
        let base = Column::new("c", "int");
        let mut tightened = base.clone();
        tightened.nullable = false;
        assert_eq!(column_change(&base, &tightened), Safety::Unsafe);
        assert_eq!(column_change(&tightened, &base), Safety::Safe);

        let mut literal = base.clone();
        literal.default = Some(ColumnDefault::Literal("1".to_string()));
        assert_eq!(column_change(&base, &literal), Safety::Safe);

        let mut expression = base.clone();
        expression.default = Some(ColumnDefault::Expression("(rand())".to_string()));
        assert_eq!(column_change(&literal, &expression), Safety::Unsafe);

        let mut width = base.clone();
        width.type_name = "int(11)".to_string();
        assert_eq!(column_change(&base, &width), Safety::Safe);
    }
}
