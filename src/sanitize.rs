//! Rendering of application values as SQL literal text.
//!
//! Number formatting reproduces the classic dynamic-language rules the generated SQL has
//! always used: five significant digits for numbers inside string literals, shortest
//! round-trip text for doubles, and fixed-point re-rendering whenever either would need an
//! exponent. Nothing here validates a value's domain; the only guarantee is that the literal
//! cannot break out of its quotes.

use serde_json::Value as JsonValue;

use crate::type_map::InternalType;
use crate::types::{BackendKind, RowValues};

/// Unquoted SQL null literal.
pub const NULL: &str = "NULL";

/// Decimal places used when a decimal column declares none (or an out-of-range count).
pub const DEFAULT_DECIMALS: u8 = 5;

const MAX_DECLARED_DECIMALS: u8 = 9;

/// Literal encoder bound to one backend's escape rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sanitizer {
    kind: BackendKind,
}

enum Numeric {
    Int(i64),
    Float(f64),
}

impl Sanitizer {
    #[must_use]
    pub const fn new(kind: BackendKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn kind(self) -> BackendKind {
        self.kind
    }

    /// Quote a value as a string literal.
    ///
    /// Numbers are rendered with five significant digits, booleans as `'1'`/`'0'`, byte
    /// buffers as UTF-8 text. `NULL`, JSON containers and (with `null_if_blank`) empty
    /// strings render as `NULL`.
    #[must_use]
    pub fn sql_string(self, value: &RowValues, null_if_blank: bool) -> String {
        match value {
            RowValues::Null => NULL.to_string(),
            RowValues::Text(text) => {
                if null_if_blank && text.is_empty() {
                    NULL.to_string()
                } else {
                    self.quote(text)
                }
            }
            RowValues::Blob(bytes) => self.quote(&String::from_utf8_lossy(bytes)),
            RowValues::Int(i) => format!("'{}'", int_precision5(*i)),
            RowValues::Float(f) if f.is_finite() => format!("'{}'", to_precision5(*f)),
            RowValues::Float(_) => NULL.to_string(),
            RowValues::Bool(b) => if *b { "'1'" } else { "'0'" }.to_string(),
            RowValues::Timestamp(ts) => {
                self.quote(&ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())
            }
            RowValues::JSON(JsonValue::Array(_) | JsonValue::Object(_)) => NULL.to_string(),
            RowValues::JSON(scalar) => self.sql_string(&RowValues::from(scalar), null_if_blank),
        }
    }

    /// Unquoted double literal; non-numbers and non-finite values render `NULL`.
    #[must_use]
    pub fn sql_double(self, value: &RowValues) -> String {
        match numeric(value) {
            Some(Numeric::Int(i)) => i.to_string(),
            Some(Numeric::Float(f)) if f.is_finite() => shortest_without_exponent(f),
            _ => NULL.to_string(),
        }
    }

    /// Unquoted fixed-point literal with `decimals` places.
    #[must_use]
    pub fn sql_fixed(self, value: &RowValues, decimals: u8) -> String {
        let digits = usize::from(decimals);
        match numeric(value) {
            Some(Numeric::Int(i)) if digits == 0 => i.to_string(),
            Some(Numeric::Int(i)) => format!("{i}.{}", "0".repeat(digits)),
            Some(Numeric::Float(f)) if f.is_finite() => to_fixed(f, digits),
            _ => NULL.to_string(),
        }
    }

    /// Unquoted integer literal (zero-decimal fixed formatting).
    #[must_use]
    pub fn sql_integer(self, value: &RowValues) -> String {
        self.sql_fixed(value, 0)
    }

    /// Boolean literal from the value's truthiness.
    ///
    /// `PostgreSQL` gets the quoted form because it has no implicit integer to boolean cast.
    #[must_use]
    pub fn sql_boolean(self, value: &RowValues) -> String {
        let truthy = is_truthy(value);
        match (self.kind, truthy) {
            (BackendKind::Postgres, true) => "'1'".to_string(),
            (BackendKind::Postgres, false) => "'0'".to_string(),
            (_, true) => "1".to_string(),
            (_, false) => "0".to_string(),
        }
    }

    /// Render `value` for a column of `internal_type`.
    #[must_use]
    pub fn sanitize(
        self,
        value: &RowValues,
        internal_type: InternalType,
        decimals: Option<u8>,
    ) -> String {
        match internal_type {
            InternalType::Boolean => self.sql_boolean(value),
            InternalType::Int8
            | InternalType::Int16
            | InternalType::Int32
            | InternalType::Int64 => self.sql_integer(value),
            InternalType::Float32 | InternalType::Float64 => self.sql_double(value),
            InternalType::Decimal => {
                let places = decimals
                    .filter(|d| *d <= MAX_DECLARED_DECIMALS)
                    .unwrap_or(DEFAULT_DECIMALS);
                self.sql_fixed(value, places)
            }
            InternalType::Varchar | InternalType::Text => self.sql_string(value, false),
            InternalType::Unknown => NULL.to_string(),
        }
    }

    /// [`Sanitizer::sanitize`] for a JSON payload value.
    #[must_use]
    pub fn sanitize_json(
        self,
        value: &JsonValue,
        internal_type: InternalType,
        decimals: Option<u8>,
    ) -> String {
        self.sanitize(&RowValues::from(value), internal_type, decimals)
    }

    /// SQL Server literals carry the `N` prefix so text reaches `nvarchar` columns intact
    /// whatever the database code page. An embedded NUL cuts the statement short in `SQLite`
    /// and SQL Server, so it is spliced in with `char(0)` / `NCHAR(0)`; `PostgreSQL` text
    /// cannot hold NUL at all and drops it.
    fn quote(self, text: &str) -> String {
        let mut body = String::with_capacity(text.len() + 3);
        let mut backslash_escaped = false;
        for ch in text.chars() {
            match (self.kind, ch) {
                (BackendKind::Postgres, '\0') => {}
                (BackendKind::Sqlite, '\0') => body.push_str("'||char(0)||'"),
                (BackendKind::Mssql, '\0') => body.push_str("'+NCHAR(0)+N'"),
                (BackendKind::Postgres | BackendKind::Mysql, '\'') => {
                    body.push_str("\\'");
                    backslash_escaped = true;
                }
                (BackendKind::Postgres | BackendKind::Mysql, '\\') => {
                    body.push_str("\\\\");
                    backslash_escaped = true;
                }
                (BackendKind::Postgres, c) if c < '\u{20}' => {
                    body.push('\\');
                    body.push(c);
                    backslash_escaped = true;
                }
                (BackendKind::Mysql, '\0') => body.push_str("\\0"),
                (BackendKind::Mysql, '\u{8}') => body.push_str("\\b"),
                (BackendKind::Mysql, '\t') => body.push_str("\\t"),
                (BackendKind::Mysql, '\u{1a}') => body.push_str("\\Z"),
                // no backslash escapes in these dialects; doubling is the only quote escape
                (BackendKind::Mssql | BackendKind::Sqlite, '\'') => body.push_str("''"),
                (_, c) => body.push(c),
            }
        }
        match self.kind {
            BackendKind::Postgres if backslash_escaped => format!("E'{body}'"),
            BackendKind::Mssql => format!("N'{body}'"),
            _ => format!("'{body}'"),
        }
    }
}

fn numeric(value: &RowValues) -> Option<Numeric> {
    match value {
        RowValues::Int(i) => Some(Numeric::Int(*i)),
        RowValues::Float(f) => Some(Numeric::Float(*f)),
        RowValues::JSON(JsonValue::Number(n)) => n
            .as_i64()
            .map(Numeric::Int)
            .or_else(|| n.as_f64().map(Numeric::Float)),
        _ => None,
    }
}

fn is_truthy(value: &RowValues) -> bool {
    match value {
        RowValues::Null => false,
        RowValues::Bool(b) => *b,
        RowValues::Int(i) => *i != 0,
        RowValues::Float(f) => *f != 0.0 && !f.is_nan(),
        RowValues::Text(s) => !s.is_empty(),
        RowValues::JSON(json) => match json {
            JsonValue::Null => false,
            JsonValue::Bool(b) => *b,
            JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            JsonValue::String(s) => !s.is_empty(),
            JsonValue::Array(_) | JsonValue::Object(_) => true,
        },
        RowValues::Timestamp(_) | RowValues::Blob(_) => true,
    }
}

fn decimal_exponent(scientific: &str) -> i32 {
    scientific
        .rsplit_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

fn int_precision5(value: i64) -> String {
    // five significant digits already need an exponent here, which re-renders as the integer
    if value.unsigned_abs() >= 100_000 {
        value.to_string()
    } else {
        #[allow(clippy::cast_precision_loss)]
        let exact = value as f64;
        to_precision5(exact)
    }
}

fn to_precision5(value: f64) -> String {
    let exponent = decimal_exponent(&format!("{value:.4e}"));
    if (-6..5).contains(&exponent) {
        let places = usize::try_from(4 - exponent).unwrap_or(0);
        to_fixed(value, places)
    } else if exponent < 0 {
        to_fixed(value, 9)
    } else {
        to_fixed(value, 0)
    }
}

fn shortest_without_exponent(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let exponent = decimal_exponent(&format!("{value:e}"));
    if exponent < -6 {
        to_fixed(value, 9)
    } else if exponent >= 21 {
        to_fixed(value, 0)
    } else {
        format!("{value}")
    }
}

/// Fixed-point text with ties rounded away from zero, decided on the exact binary value.
pub(crate) fn to_fixed(value: f64, digits: usize) -> String {
    let magnitude = value.abs();
    let body = if is_exact_tie(magnitude, digits) {
        let exact = format!("{magnitude:.1100}");
        let cut = match exact.find('.') {
            Some(dot) if digits > 0 => dot + 1 + digits,
            Some(dot) => dot,
            None => exact.len(),
        };
        increment_decimal(&exact[..cut])
    } else {
        format!("{magnitude:.digits$}")
    };
    if value < 0.0 {
        format!("-{body}")
    } else {
        body
    }
}

fn is_exact_tie(magnitude: f64, digits: usize) -> bool {
    let widened = format!("{:.*}", digits + 20, magnitude);
    tail_is_half(&widened, digits) && tail_is_half(&format!("{magnitude:.1100}"), digits)
}

fn tail_is_half(rendered: &str, digits: usize) -> bool {
    let Some((_, fraction)) = rendered.split_once('.') else {
        return false;
    };
    let Some(tail) = fraction.get(digits..) else {
        return false;
    };
    let mut chars = tail.chars();
    chars.next() == Some('5') && chars.all(|c| c == '0')
}

fn increment_decimal(truncated: &str) -> String {
    let mut bytes = truncated.as_bytes().to_vec();
    let mut idx = bytes.len();
    loop {
        if idx == 0 {
            bytes.insert(0, b'1');
            break;
        }
        idx -= 1;
        match bytes[idx] {
            b'.' => {}
            b'9' => bytes[idx] = b'0',
            digit => {
                bytes[idx] = digit + 1;
                break;
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RowValues {
        RowValues::Text(s.to_string())
    }

    #[test]
    fn postgres_escapes_mark_escape_strings() {
        let pg = Sanitizer::new(BackendKind::Postgres);
        assert_eq!(pg.sql_string(&text("D01"), false), "'D01'");
        assert_eq!(pg.sql_string(&text("O'Brien"), false), "E'O\\'Brien'");
        assert_eq!(pg.sql_string(&text("a\\b"), false), "E'a\\\\b'");
        assert_eq!(pg.sql_string(&text("x\ny"), false), "E'x\\\ny'");
    }

    #[test]
    fn mysql_uses_its_escape_table() {
        let my = Sanitizer::new(BackendKind::Mysql);
        assert_eq!(
            my.sql_string(&text("it's\\\0\u{8}\t\u{1a}\n"), false),
            "'it\\'s\\\\\\0\\b\\t\\Z\n'"
        );
    }

    #[test]
    fn mssql_and_sqlite_double_quotes() {
        let lite = Sanitizer::new(BackendKind::Sqlite);
        assert_eq!(lite.sql_string(&text("O'Brien\\"), false), "'O''Brien\\'");
        assert_eq!(
            lite.sql_string(&text("'; DROP TABLE t; --"), false),
            "'''; DROP TABLE t; --'"
        );

        let ms = Sanitizer::new(BackendKind::Mssql);
        assert_eq!(ms.sql_string(&text("O'Brien\\"), false), "N'O''Brien\\'");
        assert_eq!(ms.sql_string(&text("é漢字"), false), "N'é漢字'");
        assert_eq!(ms.sql_string(&text(""), false), "N''");
    }

    #[test]
    fn nul_is_spliced_or_dropped() {
        let nul = text("a\0b");
        assert_eq!(
            Sanitizer::new(BackendKind::Sqlite).sql_string(&nul, false),
            "'a'||char(0)||'b'"
        );
        assert_eq!(
            Sanitizer::new(BackendKind::Mssql).sql_string(&nul, false),
            "N'a'+NCHAR(0)+N'b'"
        );
        assert_eq!(Sanitizer::new(BackendKind::Postgres).sql_string(&nul, false), "'ab'");
        assert_eq!(Sanitizer::new(BackendKind::Mysql).sql_string(&nul, false), "'a\\0b'");
    }

    #[test]
    fn blank_and_null_strings() {
        let s = Sanitizer::new(BackendKind::Sqlite);
        assert_eq!(s.sql_string(&text(""), true), "NULL");
        assert_eq!(s.sql_string(&text(""), false), "''");
        assert_eq!(s.sql_string(&RowValues::Null, false), "NULL");
        assert_eq!(s.sql_string(&RowValues::Blob(b"abc".to_vec()), false), "'abc'");
        assert_eq!(s.sql_string(&RowValues::Bool(true), false), "'1'");
        assert_eq!(
            s.sql_string(&RowValues::JSON(serde_json::json!({"a": 1})), false),
            "NULL"
        );
    }

    #[test]
    fn numbers_in_string_literals_use_five_significant_digits() {
        let s = Sanitizer::new(BackendKind::Postgres);
        assert_eq!(s.sql_string(&RowValues::Float(1.99), false), "'1.9900'");
        assert_eq!(s.sql_string(&RowValues::Int(1234), false), "'1234.0'");
        assert_eq!(s.sql_string(&RowValues::Float(123_456.789), false), "'123457'");
        assert_eq!(s.sql_string(&RowValues::Int(9_876_543_210), false), "'9876543210'");
        assert_eq!(s.sql_string(&RowValues::Float(0.000_000_123_4), false), "'0.000000123'");
        assert_eq!(s.sql_string(&RowValues::Float(0.0), false), "'0.0000'");
        assert_eq!(s.sql_string(&RowValues::Float(f64::NAN), false), "NULL");
    }

    #[test]
    fn doubles_never_carry_an_exponent() {
        let s = Sanitizer::new(BackendKind::Mysql);
        assert_eq!(s.sql_double(&RowValues::Float(1.99)), "1.99");
        assert_eq!(s.sql_double(&RowValues::Float(100.0)), "100");
        assert_eq!(s.sql_double(&RowValues::Float(1e-7)), "0.000000100");
        assert_eq!(s.sql_double(&RowValues::Float(1e21)), "1000000000000000000000");
        assert_eq!(s.sql_double(&RowValues::Int(-42)), "-42");
        for value in [1e-300, 3.5e-9, -2.25e-7, 6.02e23, -1.7e308, 1e20, 123.456] {
            for rendered in [
                s.sql_double(&RowValues::Float(value)),
                s.sql_string(&RowValues::Float(value), false),
            ] {
                assert!(!rendered.contains('e'), "{value} rendered as {rendered}");
            }
        }
    }

    #[test]
    fn non_numbers_render_null() {
        let s = Sanitizer::new(BackendKind::Mssql);
        for value in [
            RowValues::Float(f64::NAN),
            RowValues::Float(f64::INFINITY),
            text("12"),
            RowValues::Bool(true),
            RowValues::Null,
        ] {
            assert_eq!(s.sql_double(&value), "NULL");
            assert_eq!(s.sql_fixed(&value, 2), "NULL");
            assert_eq!(s.sql_integer(&value), "NULL");
        }
    }

    #[test]
    fn fixed_rounds_ties_away_from_zero() {
        let s = Sanitizer::new(BackendKind::Sqlite);
        assert_eq!(s.sql_fixed(&RowValues::Float(2.5), 0), "3");
        assert_eq!(s.sql_fixed(&RowValues::Float(-1.5), 0), "-2");
        assert_eq!(s.sql_fixed(&RowValues::Float(0.125), 2), "0.13");
        // 1.005 is stored just below the tie
        assert_eq!(s.sql_fixed(&RowValues::Float(1.005), 2), "1.00");
        assert_eq!(s.sql_fixed(&RowValues::Float(9.995), 2), "9.99");
        assert_eq!(s.sql_fixed(&RowValues::Float(99.5), 0), "100");
        assert_eq!(s.sql_integer(&RowValues::Float(0.5)), "1");
        assert_eq!(s.sql_fixed(&RowValues::Int(7), 3), "7.000");
    }

    #[test]
    fn booleans_follow_truthiness() {
        let pg = Sanitizer::new(BackendKind::Postgres);
        let my = Sanitizer::new(BackendKind::Mysql);
        assert_eq!(pg.sql_boolean(&RowValues::Bool(true)), "'1'");
        assert_eq!(my.sql_boolean(&RowValues::Bool(true)), "1");
        assert_eq!(my.sql_boolean(&RowValues::Int(0)), "0");
        assert_eq!(my.sql_boolean(&text("")), "0");
        assert_eq!(my.sql_boolean(&text("no")), "1");
        assert_eq!(my.sql_boolean(&RowValues::Null), "0");
    }

    #[test]
    fn sanitize_dispatches_on_internal_type() {
        let s = Sanitizer::new(BackendKind::Sqlite);
        let price = RowValues::Float(1.5);
        assert_eq!(s.sanitize(&price, InternalType::Decimal, None), "1.50000");
        assert_eq!(s.sanitize(&price, InternalType::Decimal, Some(2)), "1.50");
        assert_eq!(s.sanitize(&price, InternalType::Decimal, Some(12)), "1.50000");
        assert_eq!(s.sanitize(&price, InternalType::Float64, None), "1.5");
        assert_eq!(s.sanitize(&price, InternalType::Int32, None), "2");
        assert_eq!(s.sanitize(&price, InternalType::Varchar, None), "'1.5000'");
        assert_eq!(s.sanitize(&price, InternalType::Boolean, None), "1");
        assert_eq!(s.sanitize(&price, InternalType::Unknown, None), "NULL");
        assert_eq!(
            s.sanitize_json(&serde_json::json!("D01"), InternalType::Varchar, None),
            "'D01'"
        );
    }
}
