//! Arithmetic tools

use agent_core::{Arguments, ParameterSchema, Tool, ToolSchema};
use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use serde_json::{Value, json};

fn operand_schema(name: &str, description: &str) -> ToolSchema {
    ToolSchema::new(name, description)
        .param(ParameterSchema::required("a", "integer", "First number"))
        .param(ParameterSchema::required("b", "integer", "Second number"))
        .returns("integer")
        .category("math")
}

/// `add_numbers(a, b) -> a + b`
pub struct AddNumbersTool;

#[async_trait]
impl Tool for AddNumbersTool {
    fn schema(&self) -> ToolSchema {
        operand_schema("add_numbers", "Add two integers and return their sum")
    }

    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value> {
        let (a, b) = (args.integer("a")?, args.integer("b")?);
        tracing::debug!(a, b, "add_numbers");
        let sum = a.checked_add(b).ok_or_else(|| anyhow!("{a} + {b} overflows"))?;
        Ok(json!(sum))
    }
}

/// `multiply_numbers(a, b) -> a * b`
pub struct MultiplyNumbersTool;

#[async_trait]
impl Tool for MultiplyNumbersTool {
    fn schema(&self) -> ToolSchema {
        operand_schema("multiply_numbers", "Multiply two integers and return their product")
    }

    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value> {
        let (a, b) = (args.integer("a")?, args.integer("b")?);
        tracing::debug!(a, b, "multiply_numbers");
        let product = a.checked_mul(b).ok_or_else(|| anyhow!("{a} * {b} overflows"))?;
        Ok(json!(product))
    }
}

/// Calculator tool - evaluates mathematical expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("calculate", "Evaluate a mathematical expression")
            .param(ParameterSchema::required(
                "expression",
                "string",
                "Expression using + - * / ^ and parentheses (e.g., '(2 + 3) * 4')",
            ))
            .returns("number")
            .category("math")
    }

    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value> {
        let expression = args.str("expression")?;
        let result = evaluate_expression(expression)
            .with_context(|| format!("could not evaluate '{expression}'"))?;

        serde_json::Number::from_f64(result)
            .map(Value::Number)
            .ok_or_else(|| anyhow!("'{expression}' is not a finite number"))
    }
}

/// Evaluate `expr` with the usual precedence: `^` (right-associative)
/// binds tighter than unary minus, which binds tighter than `* /`, then `+ -`.
pub fn evaluate_expression(expr: &str) -> anyhow::Result<f64> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expression()?;

    if let Some(token) = parser.peek() {
        bail!("unexpected '{token}'");
    }
    Ok(value)
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(f64),
    Op(char),
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Op(c) => write!(f, "{c}"),
            Token::Open => f.write_str("("),
            Token::Close => f.write_str(")"),
        }
    }
}

fn tokenize(expr: &str) -> anyhow::Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
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
                let literal = &expr[start..end];
                let number = literal
                    .parse()
                    .map_err(|_| anyhow!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(number));
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            other => bail!("unsupported character '{other}'"),
        }
    }

    Ok(tokens)
}

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_DEPTH: usize = 64;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn expression(&mut self) -> anyhow::Result<f64> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> anyhow::Result<f64> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op == '/' {
                if rhs == 0.0 {
                    bail!("Division by zero");
                }
                value /= rhs;
            } else {
                value *= rhs;
            }
        }
        Ok(value)
    }

    /// Every recursive path passes through here, so this is where depth is bounded
    fn unary(&mut self) -> anyhow::Result<f64> {
        if self.depth >= MAX_DEPTH {
            bail!("expression nests deeper than {MAX_DEPTH} levels");
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> anyhow::Result<f64> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> anyhow::Result<f64> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> anyhow::Result<f64> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => bail!("missing ')'"),
                }
            }
            Some(token) => bail!("unexpected '{token}'"),
            None => bail!("unexpected end of expression"),
        }
    }
}
