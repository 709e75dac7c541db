//! MySQL type handling for the text protocol.
//!
//! This module provides:
//! - MySQL field type codes and column classification
//! - decoding of text-protocol cells into [`Value`]s under [`TypeCastOptions`]
//! - SQL literal escaping and the `?` / `??` placeholder formatter
//! - statement counting and the generated `CALL` / record lookup statements

#![allow(clippy::cast_possible_truncation)]

use syncmysql_core::temporal;
use syncmysql_core::{Error, Result, Value, quote_ident_mysql, quote_qualified_mysql};

use crate::config::TimeZone;

/// Character set number MySQL reports for binary columns.
pub const BINARY_CHARSET: u16 = 63;

/// MySQL field type codes.
///
/// These are the `MYSQL_TYPE_*` constants from the MySQL C API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldType {
    Decimal = 0x00,
    Tiny = 0x01,
    Short = 0x02,
    Long = 0x03,
    Float = 0x04,
    Double = 0x05,
    Null = 0x06,
    Timestamp = 0x07,
    LongLong = 0x08,
    Int24 = 0x09,
    Date = 0x0A,
    Time = 0x0B,
    DateTime = 0x0C,
    Year = 0x0D,
    NewDate = 0x0E,
    VarChar = 0x0F,
    Bit = 0x10,
    Timestamp2 = 0x11,
    DateTime2 = 0x12,
    Time2 = 0x13,
    Vector = 0xF2,
    Json = 0xF5,
    NewDecimal = 0xF6,
    Enum = 0xF7,
    Set = 0xF8,
    TinyBlob = 0xF9,
    MediumBlob = 0xFA,
    LongBlob = 0xFB,
    Blob = 0xFC,
    VarString = 0xFD,
    String = 0xFE,
    Geometry = 0xFF,
}

impl FieldType {
    /// Parse a field type from its wire code. Unknown codes are strings.
    #[must_use]
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => FieldType::Decimal,
            0x01 => FieldType::Tiny,
            0x02 => FieldType::Short,
            0x03 => FieldType::Long,
            0x04 => FieldType::Float,
            0x05 => FieldType::Double,
            0x06 => FieldType::Null,
            0x07 => FieldType::Timestamp,
            0x08 => FieldType::LongLong,
            0x09 => FieldType::Int24,
            0x0A => FieldType::Date,
            0x0B => FieldType::Time,
            0x0C => FieldType::DateTime,
            0x0D => FieldType::Year,
            0x0E => FieldType::NewDate,
            0x0F => FieldType::VarChar,
            0x10 => FieldType::Bit,
            0x11 => FieldType::Timestamp2,
            0x12 => FieldType::DateTime2,
            0x13 => FieldType::Time2,
            0xF2 => FieldType::Vector,
            0xF5 => FieldType::Json,
            0xF6 => FieldType::NewDecimal,
            0xF7 => FieldType::Enum,
            0xF8 => FieldType::Set,
            0xF9 => FieldType::TinyBlob,
            0xFA => FieldType::MediumBlob,
            0xFB => FieldType::LongBlob,
            0xFC => FieldType::Blob,
            0xFD => FieldType::VarString,
            0xFF => FieldType::Geometry,
            _ => FieldType::String,
        }
    }

    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            FieldType::Tiny
                | FieldType::Short
                | FieldType::Long
                | FieldType::LongLong
                | FieldType::Int24
                | FieldType::Year
        )
    }

    #[must_use]
    pub const fn is_decimal(self) -> bool {
        matches!(self, FieldType::Decimal | FieldType::NewDecimal)
    }

    /// Types whose payload may be binary depending on the column charset.
    #[must_use]
    pub const fn is_string_or_blob(self) -> bool {
        matches!(
            self,
            FieldType::VarChar
                | FieldType::VarString
                | FieldType::String
                | FieldType::TinyBlob
                | FieldType::MediumBlob
                | FieldType::LongBlob
                | FieldType::Blob
        )
    }

    #[must_use]
    pub const fn is_datetime(self) -> bool {
        matches!(
            self,
            FieldType::DateTime
                | FieldType::Timestamp
                | FieldType::DateTime2
                | FieldType::Timestamp2
        )
    }
}

/// How text cells are turned into values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCastOptions {
    /// When false every cell stays text (or bytes for binary columns).
    pub type_cast: bool,
    /// DECIMAL and out-of-range BIGINT UNSIGNED stay exact as `Decimal`.
    pub supports_big_numbers: bool,
    /// BIGINT and DECIMAL are always `Decimal`.
    pub big_number_strings: bool,
    /// DATE / DATETIME / TIMESTAMP stay text.
    pub date_strings: bool,
    pub timezone: TimeZone,
}

impl Default for TypeCastOptions {
    fn default() -> Self {
        Self {
            type_cast: true,
            supports_big_numbers: false,
            big_number_strings: false,
            date_strings: false,
            timezone: TimeZone::Local,
        }
    }
}

/// What the decoder needs to know about a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnKind {
    pub field_type: FieldType,
    pub unsigned: bool,
    pub binary: bool,
}

impl ColumnKind {
    pub fn from_column(column: &mysql_async::Column) -> Self {
        use mysql_async::consts::ColumnFlags;

        Self {
            field_type: FieldType::from_u8(column.column_type() as u8),
            unsigned: column.flags().contains(ColumnFlags::UNSIGNED_FLAG),
            binary: column.character_set() == BINARY_CHARSET,
        }
    }
}

fn text_or<T>(text: &str, parsed: Option<T>, wrap: impl FnOnce(T) -> Value) -> Value {
    parsed.map_or_else(|| Value::Text(text.to_string()), wrap)
}

fn decode_big_unsigned(text: &str, opts: &TypeCastOptions) -> Value {
    match text.parse::<u64>() {
        Ok(v) if opts.big_number_strings => Value::Decimal(v.to_string()),
        Ok(v) => match i64::try_from(v) {
            Ok(signed) => Value::BigInt(signed),
            Err(_) if opts.supports_big_numbers => Value::Decimal(text.to_string()),
            Err(_) => Value::Double(v as f64),
        },
        Err(_) => Value::Text(text.to_string()),
    }
}

/// Decode one text-protocol cell.
///
/// `None` is SQL NULL. Cells that do not parse for their declared type
/// (zero dates, for instance) fall back to `Value::Text`.
pub fn decode_text_value(kind: ColumnKind, data: Option<&[u8]>, opts: &TypeCastOptions) -> Value {
    let Some(data) = data else {
        return Value::Null;
    };

    let binary_payload = kind.field_type == FieldType::Bit
        || kind.field_type == FieldType::Geometry
        || (kind.binary && kind.field_type.is_string_or_blob());
    if binary_payload {
        return Value::Bytes(data.to_vec());
    }

    let text = String::from_utf8_lossy(data);
    let text = text.as_ref();
    if !opts.type_cast {
        return Value::Text(text.to_string());
    }

    match kind.field_type {
        FieldType::Tiny if kind.unsigned => text_or(text, text.parse::<u8>().ok(), |v| {
            Value::SmallInt(i16::from(v))
        }),
        FieldType::Tiny => text_or(text, text.parse::<i8>().ok(), Value::TinyInt),
        FieldType::Short if kind.unsigned => text_or(text, text.parse::<u16>().ok(), |v| {
            Value::Int(i32::from(v))
        }),
        FieldType::Short | FieldType::Year => {
            text_or(text, text.parse::<i16>().ok(), Value::SmallInt)
        }
        FieldType::Long | FieldType::Int24 if kind.unsigned => {
            text_or(text, text.parse::<u32>().ok(), |v| Value::BigInt(i64::from(v)))
        }
        FieldType::Long | FieldType::Int24 => text_or(text, text.parse::<i32>().ok(), Value::Int),
        FieldType::LongLong if kind.unsigned => decode_big_unsigned(text, opts),
        FieldType::LongLong if opts.big_number_strings => Value::Decimal(text.to_string()),
        FieldType::LongLong => text_or(text, text.parse::<i64>().ok(), Value::BigInt),

        FieldType::Float => text_or(text, text.parse::<f32>().ok(), Value::Float),
        FieldType::Double => text_or(text, text.parse::<f64>().ok(), Value::Double),
        FieldType::Decimal | FieldType::NewDecimal => {
            if opts.supports_big_numbers || opts.big_number_strings {
                Value::Decimal(text.to_string())
            } else {
                text_or(text, text.parse::<f64>().ok(), Value::Double)
            }
        }

        FieldType::Date | FieldType::NewDate if !opts.date_strings => {
            text_or(text, temporal::parse_date(text), Value::Date)
        }
        ft if ft.is_datetime() && !opts.date_strings => text_or(
            text,
            temporal::parse_datetime(text),
            |micros| Value::Timestamp(micros - opts.timezone.offset_micros()),
        ),
        FieldType::Time | FieldType::Time2 => text_or(text, temporal::parse_time(text), Value::Time),

        FieldType::Json => text_or(text, serde_json::from_str(text).ok(), Value::Json),
        FieldType::Null => Value::Null,

        _ => Value::Text(text.to_string()),
    }
}

/// Raw bytes of a cell as sent by the server.
///
/// The text protocol only produces `NULL` and `Bytes`; the other variants
/// are rendered in their MySQL text form so they decode the same way.
pub fn cell_bytes(value: mysql_async::Value) -> Option<Vec<u8>> {
    use mysql_async::Value as My;

    match value {
        My::NULL => None,
        My::Bytes(bytes) => Some(bytes),
        My::Int(v) => Some(v.to_string().into_bytes()),
        My::UInt(v) => Some(v.to_string().into_bytes()),
        My::Float(v) => Some(v.to_string().into_bytes()),
        My::Double(v) => Some(v.to_string().into_bytes()),
        My::Date(year, month, day, hour, minute, second, micros) => Some(
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
                year, month, day, hour, minute, second, micros
            )
            .into_bytes(),
        ),
        My::Time(negative, days, hours, minutes, seconds, micros) => Some(
            format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                if negative { "-" } else { "" },
                days * 24 + u32::from(hours),
                minutes,
                seconds,
                micros
            )
            .into_bytes(),
        ),
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('\'');
    for ch in s.chars() {
        match ch {
            '\0' => result.push_str("\\0"),
            '\x08' => result.push_str("\\b"),
            '\t' => result.push_str("\\t"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\x1a' => result.push_str("\\Z"),
            '"' => result.push_str("\\\""),
            '\'' => result.push_str("\\'"),
            '\\' => result.push_str("\\\\"),
            _ => result.push(ch),
        }
    }
    result.push('\'');
    result
}

fn escape_bytes(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 2 + 3);
    result.push_str("X'");
    for byte in data {
        result.push_str(&format!("{byte:02X}"));
    }
    result.push('\'');
    result
}

fn is_numeric_literal(s: &str) -> bool {
    let body = s.strip_prefix(['-', '+']).unwrap_or(s);
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e.strip_prefix(['-', '+']).unwrap_or(e))),
        None => (body, None),
    };
    let digits_only = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => {
            (!int.is_empty() || !frac.is_empty()) && digits_only(int) && digits_only(frac)
        }
        None => !mantissa.is_empty() && digits_only(mantissa),
    };
    mantissa_ok && exponent.is_none_or(|e| !e.is_empty() && digits_only(e))
}

fn format_float(v: f64) -> String {
    if v.is_finite() {
        v.to_string()
    } else {
        "NULL".to_string()
    }
}

/// Format a value as a MySQL SQL literal.
///
/// Timestamps are rendered in `timezone`. Non-finite floats become `NULL`.
/// A `Decimal` that is not a plain number is quoted like text.
pub fn format_value(value: &Value, timezone: TimeZone) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::TinyInt(i) => i.to_string(),
        Value::SmallInt(i) => i.to_string(),
        Value::Int(i) => i.to_string(),
        Value::BigInt(i) => i.to_string(),
        Value::Float(f) => format_float(f64::from(*f)),
        Value::Double(f) => format_float(*f),
        Value::Decimal(s) if is_numeric_literal(s) => s.clone(),
        Value::Decimal(s) | Value::Text(s) => escape_string(s),
        Value::Bytes(b) => escape_bytes(b),
        Value::Json(j) => escape_string(&j.to_string()),
        Value::Date(d) => format!("'{}'", temporal::format_date(*d)),
        Value::Time(t) => format!("'{}'", temporal::format_time(*t)),
        Value::Timestamp(t) => format!(
            "'{}'",
            temporal::format_datetime(t + timezone.offset_micros())
        ),
    }
}

/// Format a value as an identifier for a `??` placeholder.
pub fn format_identifier(value: &Value) -> Result<String> {
    match value {
        Value::Text(name) => Ok(quote_qualified_mysql(name)),
        other => Err(Error::config(format!(
            "`??` placeholder expects a text identifier, got {}",
            other.type_name()
        ))),
    }
}

/// Replace `?` with escaped literals and `??` with quoted identifiers.
///
/// Placeholders inside `'...'`, `"..."` and `` `...` `` are left alone.
/// Surplus placeholders stay as they are and surplus values are ignored.
pub fn format_query(sql: &str, values: &[Value], timezone: TimeZone) -> Result<String> {
    if values.is_empty() {
        return Ok(sql.to_string());
    }

    let mut result = String::with_capacity(sql.len() + values.len() * 16);
    let mut values = values.iter();
    let mut chars = sql.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            result.push(ch);
            if ch == '\\' && q != '`' {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                result.push(ch);
            }
            '?' if chars.peek() == Some(&'?') => {
                chars.next();
                match values.next() {
                    Some(value) => result.push_str(&format_identifier(value)?),
                    None => result.push_str("??"),
                }
            }
            '?' => match values.next() {
                Some(value) => result.push_str(&format_value(value, timezone)),
                None => result.push('?'),
            },
            _ => result.push(ch),
        }
    }

    Ok(result)
}

/// Tracks `BEGIN ... END` nesting inside a stored program definition
/// (`CREATE PROCEDURE | FUNCTION | TRIGGER | EVENT`), where `;` separates
/// the body's own statements instead of top-level ones.
#[derive(Debug, Default)]
struct CompoundBody {
    words: usize,
    create: bool,
    definition: bool,
    depth: usize,
    pending_end: bool,
}

impl CompoundBody {
    fn inside(&self) -> bool {
        self.depth > 0
    }

    /// A plain `END` closes the innermost block once the next token shows
    /// it is not `END IF` / `END LOOP` / `END WHILE` / `END REPEAT`.
    fn close_pending(&mut self) {
        if self.pending_end {
            self.pending_end = false;
            self.depth = self.depth.saturating_sub(1);
        }
    }

    fn word(&mut self, word: &str, qualified: bool) {
        self.words += 1;
        let word = word.to_ascii_uppercase();
        if self.words == 1 {
            self.create = word == "CREATE";
        }
        if self.create
            && !self.definition
            && matches!(word.as_str(), "PROCEDURE" | "FUNCTION" | "TRIGGER" | "EVENT")
        {
            self.definition = true;
        }
        if !self.definition || qualified {
            self.close_pending();
            return;
        }

        if self.pending_end {
            self.pending_end = false;
            match word.as_str() {
                "IF" | "LOOP" | "WHILE" | "REPEAT" => {}
                // `END CASE` or `END label`
                _ => self.depth = self.depth.saturating_sub(1),
            }
            return;
        }
        match word.as_str() {
            "BEGIN" | "CASE" => self.depth += 1,
            "END" if self.depth > 0 => self.pending_end = true,
            _ => {}
        }
    }
}

/// Count the statements in a query text.
///
/// Splits on `;` outside of quoted literals and comments; segments holding
/// only whitespace and comments are not counted. The body of a stored
/// program definition is part of its `CREATE` statement.
pub fn count_statements(sql: &str) -> usize {
    let mut count = 0;
    let mut has_content = false;
    let mut body = CompoundBody::default();
    let mut after_dot = false;
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' => {
                has_content = true;
                body.close_pending();
                after_dot = false;
                while let Some(c) = chars.next() {
                    if c == '\\' && ch != '`' {
                        chars.next();
                    } else if c == ch {
                        break;
                    }
                }
            }
            '#' => skip_line(&mut chars),
            '-' if chars.peek() == Some(&'-') => {
                chars.next();
                if chars.peek().is_none_or(|c| c.is_whitespace()) {
                    skip_line(&mut chars);
                } else {
                    has_content = true;
                    body.close_pending();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            ';' => {
                body.close_pending();
                if body.inside() {
                    continue;
                }
                if has_content {
                    count += 1;
                }
                has_content = false;
                body = CompoundBody::default();
            }
            c if c.is_whitespace() => {}
            c if c.is_alphanumeric() || c == '_' || c == '$' => {
                has_content = true;
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' || next == '$' {
                        word.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                body.word(&word, after_dot);
                after_dot = false;
            }
            c => {
                has_content = true;
                body.close_pending();
                after_dot = c == '.';
            }
        }
    }

    count + usize::from(has_content)
}

fn skip_line(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

/// `CALL <name>(?, ?, ...)` with one placeholder per argument.
pub fn call_statement(procedure: &str, arg_count: usize) -> String {
    let placeholders = vec!["?"; arg_count].join(", ");
    format!("CALL {}({})", quote_qualified_mysql(procedure), placeholders)
}

/// Single-row lookup by key column.
pub fn record_statement(table: &str, key_column: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = ? LIMIT 1",
        quote_qualified_mysql(table),
        quote_ident_mysql(key_column)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(field_type: FieldType) -> ColumnKind {
        ColumnKind {
            field_type,
            unsigned: false,
            binary: false,
        }
    }

    fn unsigned(field_type: FieldType) -> ColumnKind {
        ColumnKind {
            unsigned: true,
            ..kind(field_type)
        }
    }

    #[test]
    fn test_field_type_from_u8() {
        assert_eq!(FieldType::from_u8(0x01), FieldType::Tiny);
        assert_eq!(FieldType::from_u8(0xF6), FieldType::NewDecimal);
        assert_eq!(FieldType::from_u8(0xF5), FieldType::Json);
        assert_eq!(FieldType::from_u8(0x42), FieldType::String);
        assert!(FieldType::Year.is_integer());
        assert!(FieldType::NewDecimal.is_decimal());
    }

    #[test]
    fn integers_decode_to_matching_width() {
        let opts = TypeCastOptions::default();
        assert_eq!(
            decode_text_value(kind(FieldType::Tiny), Some(b"-5"), &opts),
            Value::TinyInt(-5)
        );
        assert_eq!(
            decode_text_value(unsigned(FieldType::Tiny), Some(b"200"), &opts),
            Value::SmallInt(200)
        );
        assert_eq!(
            decode_text_value(unsigned(FieldType::Long), Some(b"4294967295"), &opts),
            Value::BigInt(4_294_967_295)
        );
        assert_eq!(
            decode_text_value(kind(FieldType::LongLong), Some(b"-9000000000"), &opts),
            Value::BigInt(-9_000_000_000)
        );
        assert_eq!(decode_text_value(kind(FieldType::Long), None, &opts), Value::Null);
    }

    #[test]
    fn big_numbers_follow_flags() {
        let plain = TypeCastOptions::default();
        let big = TypeCastOptions {
            supports_big_numbers: true,
            ..plain
        };
        let strings = TypeCastOptions {
            supports_big_numbers: true,
            big_number_strings: true,
            ..plain
        };
        let max = b"18446744073709551615";

        assert_eq!(
            decode_text_value(unsigned(FieldType::LongLong), Some(max), &plain),
            Value::Double(u64::MAX as f64)
        );
        assert_eq!(
            decode_text_value(unsigned(FieldType::LongLong), Some(max), &big),
            Value::Decimal("18446744073709551615".to_string())
        );
        assert_eq!(
            decode_text_value(kind(FieldType::NewDecimal), Some(b"12.50"), &plain),
            Value::Double(12.5)
        );
        assert_eq!(
            decode_text_value(kind(FieldType::NewDecimal), Some(b"12.50"), &big),
            Value::Decimal("12.50".to_string())
        );
        assert_eq!(
            decode_text_value(kind(FieldType::LongLong), Some(b"7"), &strings),
            Value::Decimal("7".to_string())
        );
    }

    #[test]
    fn temporal_decoding() {
        let opts = TypeCastOptions::default();
        let day = temporal::days_from_civil(2024, 1, 15);
        assert_eq!(
            decode_text_value(kind(FieldType::Date), Some(b"2024-01-15"), &opts),
            Value::Date(day)
        );
        assert_eq!(
            decode_text_value(kind(FieldType::Date), Some(b"0000-00-00"), &opts),
            Value::Text("0000-00-00".to_string())
        );
        assert_eq!(
            decode_text_value(kind(FieldType::Time), Some(b"-01:00:00"), &opts),
            Value::Time(-3_600_000_000)
        );

        let shifted = TypeCastOptions {
            timezone: TimeZone::Offset(60),
            ..opts
        };
        let midnight = i64::from(day) * temporal::MICROS_PER_DAY;
        assert_eq!(
            decode_text_value(kind(FieldType::DateTime), Some(b"2024-01-15 01:00:00"), &shifted),
            Value::Timestamp(midnight)
        );

        let strings = TypeCastOptions {
            date_strings: true,
            ..opts
        };
        assert_eq!(
            decode_text_value(kind(FieldType::Timestamp), Some(b"2024-01-15 01:00:00"), &strings),
            Value::Text("2024-01-15 01:00:00".to_string())
        );
    }

    #[test]
    fn binary_and_text_columns() {
        let opts = TypeCastOptions::default();
        let blob = ColumnKind {
            binary: true,
            ..kind(FieldType::Blob)
        };
        assert_eq!(
            decode_text_value(blob, Some(&[0xFF, 0x00]), &opts),
            Value::Bytes(vec![0xFF, 0x00])
        );
        // TEXT columns arrive as BLOB with a text charset
        assert_eq!(
            decode_text_value(kind(FieldType::Blob), Some(b"hello"), &opts),
            Value::Text("hello".to_string())
        );
        assert_eq!(
            decode_text_value(kind(FieldType::Json), Some(br#"{"a":1}"#), &opts),
            Value::Json(serde_json::json!({"a": 1}))
        );

        let raw = TypeCastOptions {
            type_cast: false,
            ..opts
        };
        assert_eq!(
            decode_text_value(kind(FieldType::Long), Some(b"42"), &raw),
            Value::Text("42".to_string())
        );
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hello"), "'hello'");
        assert_eq!(escape_string("it's"), "'it\\'s'");
        assert_eq!(escape_string("say \"hi\""), "'say \\\"hi\\\"'");
        assert_eq!(escape_string("a\\b"), "'a\\\\b'");
        assert_eq!(escape_string("line\nbreak\0\x1a"), "'line\\nbreak\\0\\Z'");
    }

    #[test]
    fn test_format_value() {
        let tz = TimeZone::Local;
        assert_eq!(format_value(&Value::Null, tz), "NULL");
        assert_eq!(format_value(&Value::Bool(true), tz), "true");
        assert_eq!(format_value(&Value::Int(-42), tz), "-42");
        assert_eq!(format_value(&Value::Double(f64::NAN), tz), "NULL");
        assert_eq!(format_value(&Value::Double(1.5), tz), "1.5");
        assert_eq!(format_value(&Value::Bytes(vec![0xDE, 0xAD]), tz), "X'DEAD'");
        assert_eq!(format_value(&Value::Decimal("-1.5e3".into()), tz), "-1.5e3");
        assert_eq!(
            format_value(&Value::Decimal("1; DROP".into()), tz),
            "'1; DROP'"
        );
        assert_eq!(
            format_value(&Value::Date(temporal::days_from_civil(2024, 3, 9)), tz),
            "'2024-03-09'"
        );
        assert_eq!(
            format_value(&Value::Json(serde_json::json!({"k": "v"})), tz),
            "'{\\\"k\\\":\\\"v\\\"}'"
        );
    }

    #[test]
    fn timestamps_render_in_connection_zone() {
        let micros = temporal::parse_datetime("2024-01-15 00:00:00").unwrap();
        assert_eq!(
            format_value(&Value::Timestamp(micros), TimeZone::Utc),
            "'2024-01-15 00:00:00'"
        );
        assert_eq!(
            format_value(&Value::Timestamp(micros), TimeZone::Offset(-60)),
            "'2024-01-14 23:00:00'"
        );
    }

    #[test]
    fn test_format_query() {
        let tz = TimeZone::Local;
        let sql = format_query(
            "SELECT * FROM ?? WHERE id = ? AND name = ?",
            &[Value::from("shop.users"), Value::Int(1), Value::from("O'Brien")],
            tz,
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM `shop`.`users` WHERE id = 1 AND name = 'O\\'Brien'"
        );
    }

    #[test]
    fn format_query_skips_quoted_literals() {
        let sql = format_query(
            r#"SELECT '?', "it\"s ?", `col?` FROM t WHERE a = ?"#,
            &[Value::Int(5)],
            TimeZone::Local,
        )
        .unwrap();
        assert_eq!(sql, r#"SELECT '?', "it\"s ?", `col?` FROM t WHERE a = 5"#);
    }

    #[test]
    fn format_query_surplus_handling() {
        let tz = TimeZone::Local;
        assert_eq!(
            format_query("SELECT ?, ?", &[Value::Int(1)], tz).unwrap(),
            "SELECT 1, ?"
        );
        assert_eq!(
            format_query("SELECT ?", &[Value::Int(1), Value::Int(2)], tz).unwrap(),
            "SELECT 1"
        );
        assert_eq!(format_query("SELECT ?", &[], tz).unwrap(), "SELECT ?");
        assert!(format_query("SELECT ??", &[Value::Int(1)], tz).is_err());
    }

    #[test]
    fn statement_counting() {
        assert_eq!(count_statements("SELECT 1"), 1);
        assert_eq!(count_statements("SELECT 1;"), 1);
        assert_eq!(count_statements("SELECT 1; SELECT 2"), 2);
        assert_eq!(count_statements("SELECT ';' AS semi"), 1);
        assert_eq!(count_statements("SELECT 1 -- trailing; comment"), 1);
        assert_eq!(count_statements("SELECT 1; /* ; */ "), 1);
        assert_eq!(count_statements("SELECT 1 # note;\n; SELECT 2"), 2);
        assert_eq!(count_statements("   "), 0);
    }

    #[test]
    fn stored_program_bodies_are_one_statement() {
        assert_eq!(
            count_statements(
                "CREATE PROCEDURE p(IN n INT) BEGIN SELECT n AS first; SELECT n + 1 AS second; END"
            ),
            1
        );
        assert_eq!(
            count_statements(
                "CREATE DEFINER = CURRENT_USER TRIGGER t BEFORE INSERT ON x FOR EACH ROW \
                 BEGIN IF NEW.a < 0 THEN SET NEW.a = 0; END IF; \
                 SET NEW.b = CASE WHEN NEW.a > 9 THEN 'big' ELSE 'small' END; END"
            ),
            1
        );
        assert_eq!(
            count_statements(
                "CREATE FUNCTION f() RETURNS INT DETERMINISTIC \
                 outer_block: BEGIN DECLARE i INT DEFAULT 0; \
                 l: LOOP SET i = i + 1; IF i > 3 THEN LEAVE l; END IF; END LOOP l; \
                 BEGIN RETURN i; END; END outer_block"
            ),
            1
        );
        // The body ends at its `END`; what follows is counted again.
        assert_eq!(
            count_statements("CREATE PROCEDURE p() BEGIN SELECT 1; END; SELECT 2"),
            2
        );
        // Without a stored program, `BEGIN` starts a transaction.
        assert_eq!(count_statements("BEGIN; INSERT INTO t VALUES (1); COMMIT"), 3);
        assert_eq!(
            count_statements("CREATE TRIGGER t BEFORE INSERT ON x FOR EACH ROW SET NEW.a = 1; SELECT 1"),
            2
        );
        assert_eq!(count_statements("SELECT t.begin FROM t; SELECT 2"), 2);
    }

    #[test]
    fn generated_statements() {
        assert_eq!(call_statement("reports.totals", 2), "CALL `reports`.`totals`(?, ?)");
        assert_eq!(call_statement("noop", 0), "CALL `noop`()");
        assert_eq!(
            record_statement("users", "id"),
            "SELECT * FROM `users` WHERE `id` = ? LIMIT 1"
        );
    }

    #[test]
    fn cell_bytes_renders_typed_cells() {
        assert_eq!(cell_bytes(mysql_async::Value::NULL), None);
        assert_eq!(
            cell_bytes(mysql_async::Value::Int(-3)),
            Some(b"-3".to_vec())
        );
        assert_eq!(
            cell_bytes(mysql_async::Value::Time(true, 1, 2, 3, 4, 0)),
            Some(b"-26:03:04.000000".to_vec())
        );
    }
}
