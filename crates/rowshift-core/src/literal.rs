//! Parser for the literal forms produced by [`Value::to_literal`].
//!
//! Grammar:
//!
//! ```text
//! value  := null | bool | number | text | blob | list | map
//! text   := '\'' ( [^'] | "''" )* '\''
//! blob   := "0x" hex*
//! list   := '[' ( value ( ',' value )* )? ']'
//! map    := '{' ( value ':' value ( ',' value ':' value )* )? '}'
//! ```
//!
//! Keywords (`null`, `true`, `false`, `NaN`, `Infinity`) are matched
//! case-insensitively. Whitespace between tokens is ignored.

use thiserror::Error;

use crate::value::Value;

/// Error raised for malformed literals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid literal at byte {position}: {message}")]
pub struct LiteralError {
    /// Byte offset of the failure.
    pub position: usize,
    /// What was expected.
    pub message: String,
}

/// Parses a single literal.
pub fn parse_literal(input: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser::new(input);
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < input.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct LiteralParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> LiteralError {
        LiteralError {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LiteralError> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", char::from(byte))))
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some(b'\'') => self.parse_text().map(Value::Text),
            Some(b'[') => self.parse_list(),
            Some(b'{') => self.parse_map(),
            Some(b'0') if matches!(self.bytes.get(self.pos + 1), Some(b'x' | b'X')) => {
                self.parse_blob()
            }
            Some(b) if b == b'-' || b.is_ascii_digit() => self.parse_number(),
            Some(b) if b.is_ascii_alphabetic() => self.parse_keyword(),
            Some(_) => Err(self.error("unexpected character")),
        }
    }

    fn parse_text(&mut self) -> Result<String, LiteralError> {
        // Opening quote
        self.pos += 1;
        let mut text = String::new();
        let mut start = self.pos;
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated text literal")),
                Some(b'\'') => {
                    text.push_str(&self.src[start..self.pos]);
                    if self.bytes.get(self.pos + 1) == Some(&b'\'') {
                        text.push('\'');
                        self.pos += 2;
                        start = self.pos;
                    } else {
                        self.pos += 1;
                        return Ok(text);
                    }
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn parse_blob(&mut self) -> Result<Value, LiteralError> {
        self.pos += 2;
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_hexdigit()) {
            self.pos += 1;
        }
        let digits = &self.src[start..self.pos];
        if digits.len() % 2 != 0 {
            return Err(self.error("odd number of hex digits in blob"));
        }
        let bytes = (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_| self.error("invalid hex digit in blob"))?;
        Ok(Value::Blob(bytes))
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
            if self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
                let keyword = self.parse_keyword()?;
                return match keyword {
                    Value::Float(f) if f.is_infinite() => Ok(Value::Float(-f)),
                    _ => Err(self.error("expected number after '-'")),
                };
            }
        }

        let mut is_float = false;
        while let Some(b) = self.peek() {
            match b {
                b'0'..=b'9' => {}
                b'.' | b'e' | b'E' => is_float = true,
                b'+' | b'-' if matches!(self.bytes[self.pos - 1], b'e' | b'E') => {}
                _ => break,
            }
            self.pos += 1;
        }

        let text = &self.src[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.error("invalid float literal"))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|_| self.error("invalid integer literal"))
        }
    }

    fn parse_keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        if word.eq_ignore_ascii_case("null") {
            Ok(Value::Null)
        } else if word.eq_ignore_ascii_case("true") {
            Ok(Value::Bool(true))
        } else if word.eq_ignore_ascii_case("false") {
            Ok(Value::Bool(false))
        } else if word.eq_ignore_ascii_case("nan") {
            Ok(Value::Float(f64::NAN))
        } else if word.eq_ignore_ascii_case("infinity") {
            Ok(Value::Float(f64::INFINITY))
        } else {
            self.pos = start;
            Err(self.error("unknown keyword"))
        }
    }

    fn parse_list(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(Value::List(items));
        }
        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(Value::List(items));
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    fn parse_map(&mut self) -> Result<Value, LiteralError> {
        self.pos += 1;
        let mut entries = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(Value::Map(entries));
        }
        loop {
            let key = self.parse_value()?;
            self.expect(b':')?;
            let value = self.parse_value()?;
            entries.push((key, value));
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(Value::Map(entries));
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(parse_literal("null").unwrap(), Value::Null);
        assert_eq!(parse_literal("TRUE").unwrap(), Value::Bool(true));
        assert_eq!(parse_literal("-12").unwrap(), Value::Int(-12));
        assert_eq!(parse_literal("2.5").unwrap(), Value::Float(2.5));
        assert_eq!(parse_literal("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(
            parse_literal("-Infinity").unwrap(),
            Value::Float(f64::NEG_INFINITY)
        );
        assert_eq!(parse_literal("0x00ff").unwrap(), Value::Blob(vec![0, 255]));
    }

    #[test]
    fn test_text_unescapes_doubled_quotes() {
        assert_eq!(
            parse_literal("'O''Brien'").unwrap(),
            Value::from("O'Brien")
        );
        assert_eq!(parse_literal("''").unwrap(), Value::from(""));
        assert_eq!(parse_literal("'日本'").unwrap(), Value::from("日本"));
    }

    #[test]
    fn test_composites_parse_what_values_render() {
        let value = Value::map([
            (Value::from("tags"), Value::list(["a", "b'c"])),
            (Value::from("n"), Value::Int(3)),
        ]);
        assert_eq!(parse_literal(&value.to_literal()).unwrap(), value);
        assert_eq!(
            parse_literal("[ 1, 'x' ,[] ]").unwrap(),
            Value::List(vec![
                Value::Int(1),
                Value::from("x"),
                Value::List(Vec::new())
            ])
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse_literal("'open").is_err());
        assert!(parse_literal("[1,2").is_err());
        assert!(parse_literal("{1 2}").is_err());
        assert!(parse_literal("bogus").is_err());
        assert!(parse_literal("0xabc").is_err());

        let err = parse_literal("1 2").unwrap_err();
        assert_eq!(err.position, 2);
    }
}
