//! Boolean selector expressions.
//!
//! Selectors decide whether a recipe line (`specs: - pywin32  # [win]`) or a
//! template block (`#if osx and not keep_pkgs`) applies. An expression is
//! built from names looked up in a namespace, `True`/`False`, `not`, `and`,
//! `or` and parentheses, with the usual precedence (`not` > `and` > `or`).
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use condabundle_lib::selector::evaluate;
//!
//! let mut ns = BTreeMap::new();
//! ns.insert("linux".to_string(), true);
//! ns.insert("aarch64".to_string(), false);
//!
//! assert!(evaluate("linux and not aarch64", &ns).unwrap());
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
  #[error("empty selector")]
  Empty,

  #[error("unknown name '{name}' in selector '{expr}'")]
  UnknownName { name: String, expr: String },

  #[error("unexpected '{token}' in selector '{expr}'")]
  Unexpected { token: String, expr: String },

  #[error("unexpected end of selector '{0}'")]
  UnexpectedEnd(String),

  #[error("invalid character '{ch}' in selector '{expr}'")]
  InvalidChar { ch: char, expr: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
  Name(String),
  Not,
  And,
  Or,
  Open,
  Close,
}

impl Token {
  fn text(&self) -> &str {
    match self {
      Token::Name(name) => name,
      Token::Not => "not",
      Token::And => "and",
      Token::Or => "or",
      Token::Open => "(",
      Token::Close => ")",
    }
  }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, SelectorError> {
  let mut tokens = Vec::new();
  let mut chars = expr.chars().peekable();

  while let Some(&ch) = chars.peek() {
    if ch.is_whitespace() {
      chars.next();
    } else if ch == '(' {
      chars.next();
      tokens.push(Token::Open);
    } else if ch == ')' {
      chars.next();
      tokens.push(Token::Close);
    } else if ch.is_ascii_alphanumeric() || ch == '_' {
      let mut word = String::new();
      while let Some(&c) = chars.peek() {
        if c.is_ascii_alphanumeric() || c == '_' {
          word.push(c);
          chars.next();
        } else {
          break;
        }
      }
      tokens.push(match word.as_str() {
        "not" => Token::Not,
        "and" => Token::And,
        "or" => Token::Or,
        _ => Token::Name(word),
      });
    } else {
      return Err(SelectorError::InvalidChar {
        ch,
        expr: expr.to_string(),
      });
    }
  }

  Ok(tokens)
}

struct Parser<'a> {
  tokens: Vec<Token>,
  pos: usize,
  expr: &'a str,
  namespace: &'a BTreeMap<String, bool>,
}

impl Parser<'_> {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Option<Token> {
    let token = self.tokens.get(self.pos).cloned();
    self.pos += 1;
    token
  }

  fn or_expr(&mut self) -> Result<bool, SelectorError> {
    let mut value = self.and_expr()?;
    while self.peek() == Some(&Token::Or) {
      self.next();
      let rhs = self.and_expr()?;
      value = value || rhs;
    }
    Ok(value)
  }

  fn and_expr(&mut self) -> Result<bool, SelectorError> {
    let mut value = self.not_expr()?;
    while self.peek() == Some(&Token::And) {
      self.next();
      let rhs = self.not_expr()?;
      value = value && rhs;
    }
    Ok(value)
  }

  fn not_expr(&mut self) -> Result<bool, SelectorError> {
    if self.peek() == Some(&Token::Not) {
      self.next();
      return Ok(!self.not_expr()?);
    }
    self.atom()
  }

  fn atom(&mut self) -> Result<bool, SelectorError> {
    match self.next() {
      Some(Token::Open) => {
        let value = self.or_expr()?;
        match self.next() {
          Some(Token::Close) => Ok(value),
          Some(token) => Err(self.unexpected(&token)),
          None => Err(SelectorError::UnexpectedEnd(self.expr.to_string())),
        }
      }
      Some(Token::Name(name)) => match name.as_str() {
        "True" => Ok(true),
        "False" => Ok(false),
        _ => self
          .namespace
          .get(&name)
          .copied()
          .ok_or_else(|| SelectorError::UnknownName {
            name,
            expr: self.expr.to_string(),
          }),
      },
      Some(token) => Err(self.unexpected(&token)),
      None => Err(SelectorError::UnexpectedEnd(self.expr.to_string())),
    }
  }

  fn unexpected(&self, token: &Token) -> SelectorError {
    SelectorError::Unexpected {
      token: token.text().to_string(),
      expr: self.expr.to_string(),
    }
  }
}

/// Evaluate a selector expression against a namespace of named booleans.
///
/// # Errors
///
/// Returns an error for empty or malformed expressions and for names that
/// are not in the namespace.
pub fn evaluate(expr: &str, namespace: &BTreeMap<String, bool>) -> Result<bool, SelectorError> {
  let tokens = tokenize(expr)?;
  if tokens.is_empty() {
    return Err(SelectorError::Empty);
  }

  let mut parser = Parser {
    tokens,
    pos: 0,
    expr,
    namespace,
  };
  let value = parser.or_expr()?;

  match parser.next() {
    None => Ok(value),
    Some(token) => Err(parser.unexpected(&token)),
  }
}
