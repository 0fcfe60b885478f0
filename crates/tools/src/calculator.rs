//! Arithmetic evaluation for the `calculator` tool.
//!
//! Grammar (whitespace ignored):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('+' | '-') unary | postfix
//! postfix := primary '%'*
//! primary := number | '(' expr ')'
//! ```
//!
//! A postfix `%` divides by 100, so `15% * 250` is `37.5`.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{parse_args, schema_for, Tool, ToolError};

const ALLOWED: &str = "0123456789+-*/().% ";

/// Deepest allowed nesting of parentheses and unary signs.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CalculatorInput {
    /// Arithmetic expression using numbers, + - * / % and parentheses
    pub expression: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ToolError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        let token = match c {
            ' ' => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| ToolError::InvalidExpression(format!("bad number '{literal}'")))?;
                tokens.push(Token::Num(value));
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::Open,
            ')' => Token::Close,
            other => {
                return Err(ToolError::InvalidExpression(format!(
                    "unexpected character '{other}'"
                )))
            }
        };
        tokens.push(token);
        chars.next();
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    /// Run `f` one nesting level deeper, refusing past [`MAX_DEPTH`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ToolError>,
    ) -> Result<T, ToolError> {
        if self.depth >= MAX_DEPTH {
            return Err(ToolError::InvalidExpression(
                "expression nested too deeply".into(),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<f64, ToolError> {
        let mut value = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.bump();
            let rhs = self.term()?;
            value = if op == Token::Plus { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ToolError> {
        let mut value = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.bump();
            let rhs = self.unary()?;
            value = if op == Token::Star {
                value * rhs
            } else {
                if rhs == 0.0 {
                    return Err(ToolError::DivisionByZero);
                }
                value / rhs
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, ToolError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(-self.nested(Self::unary)?)
            }
            Some(Token::Plus) => {
                self.bump();
                self.nested(Self::unary)
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<f64, ToolError> {
        let mut value = self.primary()?;
        while self.peek() == Some(Token::Percent) {
            self.bump();
            value /= 100.0;
        }
        Ok(value)
    }

    fn primary(&mut self) -> Result<f64, ToolError> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.nested(Self::expr)?;
                match self.bump() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(ToolError::InvalidExpression("missing ')'".into())),
                }
            }
            Some(other) => Err(ToolError::InvalidExpression(format!(
                "unexpected {other:?}"
            ))),
            None => Err(ToolError::InvalidExpression("unexpected end of expression".into())),
        }
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expression: &str) -> Result<f64, ToolError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(ToolError::InvalidExpression("empty expression".into()));
    }
    if !expression.chars().all(|c| ALLOWED.contains(c)) {
        return Err(ToolError::InvalidExpression(
            "only numbers and + - * / % ( ) are allowed".into(),
        ));
    }

    let mut parser = Parser {
        tokens: tokenize(expression)?,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.peek() {
        return Err(ToolError::InvalidExpression(format!("unexpected {extra:?}")));
    }
    if !value.is_finite() {
        return Err(ToolError::InvalidExpression("result is not a finite number".into()));
    }
    Ok(value)
}

/// Render a result without a trailing `.0` for whole numbers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let text = format!("{value:.10}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// `calculator`: basic arithmetic and percentages.
#[derive(Debug, Default)]
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform mathematical calculations. Supports basic arithmetic, \
         percentages and parentheses."
    }

    fn parameters(&self) -> Value {
        schema_for::<CalculatorInput>()
    }

    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let input: CalculatorInput = parse_args(args)?;
        let value = evaluate(&input.expression)?;
        Ok(format!("Result: {}", format_number(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("(5 * 3) / 2").unwrap(), 7.5);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("2 * -3").unwrap(), -6.0);
    }

    #[test]
    fn percentages() {
        assert_eq!(evaluate("15% * 250").unwrap(), 37.5);
        assert_eq!(evaluate("50%").unwrap(), 0.5);
        assert_eq!(evaluate("(15/100)*250").unwrap(), 37.5);
    }

    #[test]
    fn rejects_unsafe_or_malformed_input() {
        assert!(matches!(
            evaluate("2 ** 3; rm -rf /"),
            Err(ToolError::InvalidExpression(_))
        ));
        assert!(matches!(evaluate("abc"), Err(ToolError::InvalidExpression(_))));
        assert!(matches!(evaluate("(1 + 2"), Err(ToolError::InvalidExpression(_))));
        assert!(matches!(evaluate("1 +"), Err(ToolError::InvalidExpression(_))));
        assert!(matches!(evaluate("1.2.3"), Err(ToolError::InvalidExpression(_))));
        assert!(matches!(evaluate("4 2"), Err(ToolError::InvalidExpression(_))));
        assert!(matches!(evaluate(""), Err(ToolError::InvalidExpression(_))));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let too_deep = format!("{}1+1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert_eq!(
            evaluate(&too_deep),
            Err(ToolError::InvalidExpression("expression nested too deeply".into()))
        );

        let signs = format!("{}5", "-".repeat(20_000));
        assert_eq!(
            evaluate(&signs),
            Err(ToolError::InvalidExpression("expression nested too deeply".into()))
        );

        let at_limit = format!("{}7{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert_eq!(evaluate(&at_limit).unwrap(), 7.0);
        assert_eq!(evaluate(&format!("{}2", "-".repeat(MAX_DEPTH))).unwrap(), 2.0);
    }

    #[test]
    fn division_by_zero_is_typed() {
        assert_eq!(evaluate("1 / 0"), Err(ToolError::DivisionByZero));
        assert_eq!(evaluate("1 / (2 - 2)"), Err(ToolError::DivisionByZero));
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(37.5), "37.5");
        assert_eq!(format_number(-6.0), "-6");
        assert_eq!(format_number(1.0 / 3.0), "0.3333333333");
    }

    #[tokio::test]
    async fn tool_call_formats_result() {
        let out = CalculatorTool
            .call(serde_json::json!({"expression": "2 + 2"}))
            .await
            .unwrap();
        assert_eq!(out, "Result: 4");
    }
}
