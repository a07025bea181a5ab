//! Side-effect-free utility tools: current time and arithmetic.

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{ExecContext, Tool, ToolError, ToolFut, parse_args};

#[derive(Debug, Default)]
pub struct GetTimeTool;

impl Tool for GetTimeTool {
    fn name(&self) -> &'static str {
        "get_time"
    }

    fn description(&self) -> &'static str {
        "Current date and time."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, _args: Value, _ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let now = Utc::now();
            Ok(json!({
                "iso": now.to_rfc3339_opts(SecondsFormat::Secs, true),
                "unix": now.timestamp(),
            }))
        })
    }
}

#[derive(Debug, Default)]
pub struct CalculateTool;

#[derive(Debug, Deserialize)]
struct CalculateArgs {
    expression: String,
}

impl Tool for CalculateTool {
    fn name(&self) -> &'static str {
        "calculate"
    }

    fn description(&self) -> &'static str {
        "Evaluate an arithmetic expression (+, -, *, /, %, ^, parentheses)."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Expression to evaluate, e.g. '2 * (3 + 4)'"
                }
            },
            "required": ["expression"],
            "additionalProperties": false
        })
    }

    fn execute<'a>(&'a self, args: Value, _ctx: &'a ExecContext) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: CalculateArgs = parse_args(&args)?;
            let result = evaluate(&typed.expression)
                .map_err(|e| ToolError::bad_args(format!("cannot evaluate expression: {e}")))?;
            if !result.is_finite() {
                return Err(ToolError::failed("expression does not evaluate to a finite number"));
            }
            Ok(json!({"expression": typed.expression, "result": result}))
        })
    }
}

/// Recursive-descent evaluator.
///
/// Grammar: expr := term (('+'|'-') term)*; term := power (('*'|'/'|'%')
/// power)*; power := unary ('^' power)?; unary := '-' unary | atom;
/// atom := number | '(' expr ')'.
fn evaluate(input: &str) -> Result<f64, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected trailing input at token {}", parser.pos));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '^' => {
                chars.next();
                tokens.push(Token::Caret);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: f64 = literal
                    .parse()
                    .map_err(|_| format!("bad number literal '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.next();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.next();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.power()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.next();
                    value *= self.power()?;
                }
                Token::Slash => {
                    self.next();
                    let rhs = self.power()?;
                    if rhs == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= rhs;
                }
                Token::Percent => {
                    self.next();
                    let rhs = self.power()?;
                    if rhs == 0.0 {
                        return Err("modulo by zero".to_string());
                    }
                    value %= rhs;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some(Token::Caret) {
            self.next();
            // Right-associative.
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                Ok(-self.unary()?)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            other => Err(format!("expected a number, found {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::evaluate;

    #[test]
    fn precedence_and_parens() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
    }

    #[test]
    fn unary_minus_and_modulo() {
        assert_eq!(evaluate("-3 + 10").unwrap(), 7.0);
        assert_eq!(evaluate("10 % 3").unwrap(), 1.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(evaluate("1 / 0").is_err());
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("two plus two").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("(1 + 2").is_err());
    }

    #[test]
    fn decimals_parse() {
        assert!((evaluate("0.1 + 0.2").unwrap() - 0.3).abs() < 1e-9);
    }
}
