//! Keypad expression evaluation.
//!
//! Accepts digits, `.`, parentheses and `+ - * / ^` (`**` is accepted as a
//! spelling of `^`). Whitespace is stripped; any other character rejects the
//! whole expression. Results are formatted the way a browser prints numbers,
//! so `1/0` shows `Infinity` and `0.1+0.2` shows `0.30000000000000004`.

use crate::error::CalcError;

const ALLOWED: &str = "0123456789.+-*/()^";

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Num(n) => format_number(*n),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Pow => "^".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

/// Drop whitespace and reject anything outside the whitelist.
pub fn sanitize(input: &str) -> Result<String, CalcError> {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c.is_whitespace() {
            continue;
        }
        if !ALLOWED.contains(c) {
            return Err(CalcError::DisallowedChar(c));
        }
        out.push(c);
    }
    if out.is_empty() {
        return Err(CalcError::Empty);
    }
    Ok(out)
}

fn tokenize(src: &str) -> Result<Vec<Token>, CalcError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let tok = match c {
            b'0'..=b'9' | b'.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                let literal = &src[start..i];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::BadNumber(literal.to_string()))?;
                tokens.push(Token::Num(value));
                continue;
            }
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' if bytes.get(i + 1) == Some(&b'*') => {
                i += 1;
                Token::Pow
            }
            b'*' => Token::Star,
            b'/' => Token::Slash,
            b'^' => Token::Pow,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            other => return Err(CalcError::DisallowedChar(other as char)),
        };
        tokens.push(tok);
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn unexpected(&self) -> CalcError {
        match self.tokens.get(self.pos) {
            Some(tok) => CalcError::Unexpected { found: tok.text(), pos: self.pos },
            None => CalcError::UnexpectedEnd,
        }
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    acc += self.term()?;
                }
                Some(Token::Minus) => {
                    self.bump();
                    acc -= self.term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, CalcError> {
        let mut acc = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    acc *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.bump();
                    acc /= self.unary()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    // unary := ('-' | '+') unary | power
    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.bump();
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power := primary ('^' unary)?   right-associative, binds tighter than unary minus
    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if let Some(Token::Pow) = self.peek() {
            self.bump();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Num(n)) => {
                let n = *n;
                self.bump();
                Ok(n)
            }
            Some(Token::LParen) => {
                self.bump();
                let inner = self.expr()?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.bump();
                        Ok(inner)
                    }
                    _ => Err(self.unexpected()),
                }
            }
            _ => Err(self.unexpected()),
        }
    }
}

/// Evaluate a keypad expression to a number.
pub fn evaluate(input: &str) -> Result<f64, CalcError> {
    let clean = sanitize(input)?;
    let tokens = tokenize(&clean)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.unexpected());
    }
    Ok(value)
}

/// Evaluate and format in one step; this is what the display shows.
pub fn evaluate_display(input: &str) -> Result<String, CalcError> {
    evaluate(input).map(format_number)
}

/// Number → text, matching JavaScript's `Number.prototype.toString`.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let magnitude = value.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let sci = format!("{:e}", value);
        return match sci.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => sci,
        };
    }

    format!("{}", value)
}
