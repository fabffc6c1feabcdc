//! Predicate language understood by the in-memory database.
//!
//! A small SQL `WHERE`-clause subset plus an optional `ORDER BY`:
//!
//! ```text
//! name = 'Franco' AND (age >= 18 OR admin = TRUE) ORDER BY email DESC, id
//! ```
//!
//! Fields address keys of a record's document; dotted paths reach into
//! nested objects and a double-quoted name is a single key taken verbatim.
//! Comparing mismatched types, or comparing against `NULL` with an
//! operator, is false. Use `IS [NOT] NULL` for null checks.
//!
//! Parentheses and `NOT` may nest at most [`MAX_DEPTH`] levels.

use crate::error::{StoreError, StoreResult};
use crate::record::Document;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Maximum nesting of parentheses and `NOT` in one predicate.
pub const MAX_DEPTH: usize = 128;

static NULL: Document = Document::Null;

/// A parsed predicate: an optional condition and sort keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    condition: Option<Expr>,
    order_by: Vec<SortKey>,
}

/// A field reference: the keys walked from the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    segments: Vec<String>,
}

impl Field {
    /// Splits a dotted path into nested keys.
    #[must_use]
    pub fn path(path: &str) -> Self {
        Self {
            segments: path.split('.').map(str::to_string).collect(),
        }
    }

    /// A single key, dots included.
    #[must_use]
    pub fn verbatim(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Returns the keys in lookup order.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolves the field in `row`; missing keys read as null.
    #[must_use]
    pub fn lookup<'a>(&self, row: &'a Document) -> &'a Document {
        self.segments
            .iter()
            .try_fold(row, |value, key| value.get(key.as_str()))
            .unwrap_or(&NULL)
    }
}

impl From<&str> for Field {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            if segment.contains(['.', '"']) {
                write!(f, "\"{}\"", segment.replace('"', "\"\""))?;
            } else {
                f.write_str(segment)?;
            }
        }
        Ok(())
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Field to sort on.
    pub field: Field,
    /// Whether the key sorts descending.
    pub descending: bool,
}

/// Boolean condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Every operand holds.
    And(Vec<Expr>),
    /// At least one operand holds.
    Or(Vec<Expr>),
    /// The inner condition does not hold.
    Not(Box<Expr>),
    /// `field op literal`.
    Compare {
        /// Left-hand field.
        field: Field,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand literal.
        value: Literal,
    },
    /// `field IS NULL` / `field IS NOT NULL`.
    IsNull {
        /// Tested field.
        field: Field,
        /// Set for `IS NOT NULL`.
        negated: bool,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=` or `<>`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::NotEq => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::LtEq => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::GtEq => ordering != Ordering::Less,
        }
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Single-quoted text.
    Text(String),
    /// Integer or decimal number.
    Number(f64),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// `NULL`.
    Null,
}

impl Filter {
    /// Parses predicate text.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidQuery`] if the text is malformed.
    pub fn parse(input: &str) -> StoreResult<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
        .parse_filter()
    }

    /// Returns the condition, if the predicate has one.
    #[must_use]
    pub fn condition(&self) -> Option<&Expr> {
        self.condition.as_ref()
    }

    /// Returns the sort keys.
    #[must_use]
    pub fn order_by(&self) -> &[SortKey] {
        &self.order_by
    }

    /// Returns true if `row` satisfies the condition. An empty condition
    /// matches every row.
    #[must_use]
    pub fn matches(&self, row: &Document) -> bool {
        self.condition.as_ref().map_or(true, |expr| expr.eval(row))
    }

    /// Stable-sorts rows by the `ORDER BY` keys; a no-op without keys.
    pub fn sort(&self, rows: &mut [&Document]) {
        if self.order_by.is_empty() {
            return;
        }
        rows.sort_by(|a, b| {
            for key in &self.order_by {
                let ordering = order_values(key.field.lookup(a), key.field.lookup(b));
                let ordering = if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

impl FromStr for Filter {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Expr {
    fn eval(&self, row: &Document) -> bool {
        match self {
            Self::And(operands) => operands.iter().all(|expr| expr.eval(row)),
            Self::Or(operands) => operands.iter().any(|expr| expr.eval(row)),
            Self::Not(inner) => !inner.eval(row),
            Self::Compare { field, op, value } => {
                compare(field.lookup(row), value).is_some_and(|ordering| op.holds(ordering))
            }
            Self::IsNull { field, negated } => field.lookup(row).is_null() != *negated,
        }
    }
}

fn compare(value: &Document, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (Document::String(s), Literal::Text(t)) => Some(s.as_str().cmp(t.as_str())),
        (Document::Number(n), Literal::Number(x)) => n.as_f64()?.partial_cmp(x),
        (Document::Bool(b), Literal::Bool(c)) => Some(b.cmp(c)),
        _ => None,
    }
}

fn sort_rank(value: &Document) -> u8 {
    match value {
        Document::Null => 0,
        Document::Bool(_) => 1,
        Document::Number(_) => 2,
        Document::String(_) => 3,
        Document::Array(_) | Document::Object(_) => 4,
    }
}

// Total order used by ORDER BY: null < bool < number < string < composite.
fn order_values(a: &Document, b: &Document) -> Ordering {
    sort_rank(a).cmp(&sort_rank(b)).then_with(|| match (a, b) {
        (Document::Bool(x), Document::Bool(y)) => x.cmp(y),
        (Document::Number(x), Document::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Document::String(x), Document::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    QuotedIdent(String),
    Text(String),
    Number(f64),
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
    Is,
    Null,
    True,
    False,
    Order,
    By,
    Asc,
    Desc,
}

impl Token {
    fn keyword(word: &str) -> Option<Self> {
        let token = match word.to_ascii_uppercase().as_str() {
            "AND" => Self::And,
            "OR" => Self::Or,
            "NOT" => Self::Not,
            "IS" => Self::Is,
            "NULL" => Self::Null,
            "TRUE" => Self::True,
            "FALSE" => Self::False,
            "ORDER" => Self::Order,
            "BY" => Self::By,
            "ASC" => Self::Asc,
            "DESC" => Self::Desc,
            _ => return None,
        };
        Some(token)
    }
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> StoreResult<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(&ch) = self.chars.peek() {
            let token = match ch {
                c if c.is_whitespace() => {
                    self.chars.next();
                    continue;
                }
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                ',' => self.single(Token::Comma),
                '=' => self.single(Token::Op(CompareOp::Eq)),
                '!' => {
                    self.chars.next();
                    if self.chars.next_if_eq(&'=').is_none() {
                        return Err(StoreError::invalid_query("expected '=' after '!'"));
                    }
                    Token::Op(CompareOp::NotEq)
                }
                '<' => {
                    self.chars.next();
                    if self.chars.next_if_eq(&'=').is_some() {
                        Token::Op(CompareOp::LtEq)
                    } else if self.chars.next_if_eq(&'>').is_some() {
                        Token::Op(CompareOp::NotEq)
                    } else {
                        Token::Op(CompareOp::Lt)
                    }
                }
                '>' => {
                    self.chars.next();
                    if self.chars.next_if_eq(&'=').is_some() {
                        Token::Op(CompareOp::GtEq)
                    } else {
                        Token::Op(CompareOp::Gt)
                    }
                }
                '\'' => Token::Text(self.read_quoted('\'')?),
                '"' => Token::QuotedIdent(self.read_quoted('"')?),
                c if c.is_ascii_digit() || c == '-' => self.read_number()?,
                c if c.is_alphabetic() || c == '_' => self.read_word(),
                other => {
                    return Err(StoreError::invalid_query(format!(
                        "unexpected character {other:?}"
                    )))
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.chars.next();
        token
    }

    // A doubled quote inside the literal stands for one quote.
    fn read_quoted(&mut self, quote: char) -> StoreResult<String> {
        self.chars.next();
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => {
                    if self.chars.next_if_eq(&quote).is_some() {
                        text.push(quote);
                    } else {
                        return Ok(text);
                    }
                }
                Some(c) => text.push(c),
                None => return Err(StoreError::invalid_query("unterminated quoted literal")),
            }
        }
    }

    fn read_number(&mut self) -> StoreResult<Token> {
        let mut raw = String::new();
        if let Some(sign) = self.chars.next_if_eq(&'-') {
            raw.push(sign);
        }
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            raw.push(c);
        }
        raw.parse()
            .map(Token::Number)
            .map_err(|_| StoreError::invalid_query(format!("invalid number {raw:?}")))
    }

    fn read_word(&mut self) -> Token {
        let mut word = String::new();
        while let Some(c) = self
            .chars
            .next_if(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        {
            word.push(c);
        }
        Token::keyword(&word).unwrap_or(Token::Ident(word))
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn parse_filter(mut self) -> StoreResult<Filter> {
        let condition = match self.peek() {
            None | Some(Token::Order) => None,
            Some(_) => Some(self.parse_or()?),
        };

        let mut order_by = Vec::new();
        if self.eat(&Token::Order) {
            self.expect(&Token::By)?;
            loop {
                let field = self.expect_field()?;
                let descending = if self.eat(&Token::Desc) {
                    true
                } else {
                    self.eat(&Token::Asc);
                    false
                };
                order_by.push(SortKey { field, descending });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }

        match self.peek() {
            None => Ok(Filter {
                condition,
                order_by,
            }),
            Some(token) => Err(StoreError::invalid_query(format!(
                "unexpected trailing {token:?}"
            ))),
        }
    }

    fn parse_or(&mut self) -> StoreResult<Expr> {
        let mut operands = vec![self.parse_and()?];
        while self.eat(&Token::Or) {
            operands.push(self.parse_and()?);
        }
        Ok(flatten(operands, Expr::Or))
    }

    fn parse_and(&mut self) -> StoreResult<Expr> {
        let mut operands = vec![self.parse_unary()?];
        while self.eat(&Token::And) {
            operands.push(self.parse_unary()?);
        }
        Ok(flatten(operands, Expr::And))
    }

    fn parse_unary(&mut self) -> StoreResult<Expr> {
        if self.eat(&Token::Not) {
            let inner = self.nested(Self::parse_unary)?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.eat(&Token::LParen) {
            let inner = self.nested(Self::parse_or)?;
            self.expect(&Token::RParen)?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn nested(&mut self, parse: fn(&mut Self) -> StoreResult<Expr>) -> StoreResult<Expr> {
        if self.depth >= MAX_DEPTH {
            return Err(StoreError::invalid_query("predicate nested too deeply"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_comparison(&mut self) -> StoreResult<Expr> {
        let field = self.expect_field()?;
        if self.eat(&Token::Is) {
            let negated = self.eat(&Token::Not);
            self.expect(&Token::Null)?;
            return Ok(Expr::IsNull { field, negated });
        }
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            other => {
                return Err(StoreError::invalid_query(format!(
                    "expected comparison operator after {field}, found {other:?}"
                )))
            }
        };
        let value = match self.next() {
            Some(Token::Text(text)) => Literal::Text(text),
            Some(Token::Number(n)) => Literal::Number(n),
            Some(Token::True) => Literal::Bool(true),
            Some(Token::False) => Literal::Bool(false),
            Some(Token::Null) => Literal::Null,
            other => {
                return Err(StoreError::invalid_query(format!(
                    "expected literal after {field}, found {other:?}"
                )))
            }
        };
        Ok(Expr::Compare { field, op, value })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> StoreResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(StoreError::invalid_query(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn expect_field(&mut self) -> StoreResult<Field> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Field::path(&name)),
            Some(Token::QuotedIdent(name)) => Ok(Field::verbatim(name)),
            other => Err(StoreError::invalid_query(format!(
                "expected field name, found {other:?}"
            ))),
        }
    }
}

fn flatten(mut operands: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        combine(operands)
    }
}
