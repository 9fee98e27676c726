//! Formula parser
//!
//! A recursive descent parser for calculator formulas with proper operator
//! precedence. Positions reported in errors and call sites are char offsets
//! into the original text.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};

/// Deepest nesting of parentheses, calls, prefix signs and operator chains
pub const MAX_NESTING: usize = 256;

/// Parse a formula string into an AST
///
/// # Example
/// ```rust
/// use calcsmith_formula::parse_formula;
///
/// let ast = parse_formula("1 + 2").unwrap();
/// let ast = parse_formula("SUM({a}, {b})").unwrap();
/// let ast = parse_formula("IF({qty} > 100, \"bulk\", \"retail\")").unwrap();
/// ```
pub fn parse_formula(formula: &str) -> FormulaResult<FormulaExpr> {
    parse_with_sites(formula).map(|parsed| parsed.expr)
}

/// Parse a formula and record where each reference and call appears
pub fn parse_with_sites(formula: &str) -> FormulaResult<ParsedFormula> {
    if formula.trim().is_empty() {
        return Err(FormulaError::syntax("Expression is empty", 0));
    }

    let mut parser = FormulaParser::new(formula)?;
    let expr = parser.parse_expression()?;

    // Make sure we consumed all input
    match parser.current_token() {
        Token::Eof => {}
        Token::RightParen => {
            return Err(FormulaError::syntax("Unmatched ')'", parser.token_start))
        }
        other => {
            return Err(FormulaError::syntax(
                format!("Unexpected {} after expression", other.describe()),
                parser.token_start,
            ))
        }
    }

    Ok(ParsedFormula {
        expr,
        references: parser.references,
        calls: parser.calls,
    })
}

/// A parsed formula together with its reference and call sites
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFormula {
    pub expr: FormulaExpr,
    /// Every `{name}` occurrence, in source order
    pub references: Vec<ReferenceSite>,
    /// Every function call, in source order of the function name
    pub calls: Vec<CallSite>,
}

/// One `{name}` occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSite {
    pub name: String,
    /// Char offset of the opening `{`
    pub position: usize,
}

/// One function call
#[derive(Debug, Clone, PartialEq)]
pub struct CallSite {
    /// Upper-cased function name
    pub name: String,
    /// Char offset of the function name
    pub position: usize,
    pub args: Vec<FormulaExpr>,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),

    // Identifiers and references
    Identifier(String), // Function name
    FieldRef(String),   // {name}

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    EqualEqual,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::String(_) => "string".to_string(),
            Token::Identifier(name) => format!("'{}'", name),
            Token::FieldRef(name) => format!("reference {{{}}}", name),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::EqualEqual => "'=='".to_string(),
            Token::NotEqual => "'!='".to_string(),
            Token::LessThan => "'<'".to_string(),
            Token::LessEqual => "'<='".to_string(),
            Token::GreaterThan => "'>'".to_string(),
            Token::GreaterEqual => "'>='".to_string(),
            Token::Comma => "','".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Eof => "end of formula".to_string(),
        }
    }

    fn comparison(&self) -> Option<BinaryOperator> {
        match self {
            Token::EqualEqual => Some(BinaryOperator::Equal),
            Token::NotEqual => Some(BinaryOperator::NotEqual),
            Token::LessThan => Some(BinaryOperator::LessThan),
            Token::LessEqual => Some(BinaryOperator::LessEqual),
            Token::GreaterThan => Some(BinaryOperator::GreaterThan),
            Token::GreaterEqual => Some(BinaryOperator::GreaterEqual),
            _ => None,
        }
    }
}

/// Formula parser
struct FormulaParser<'a> {
    input: &'a str,
    /// Byte position in `input`
    pos: usize,
    /// Char offset matching `pos`
    offset: usize,
    current_token: Option<Token>,
    /// Char offset where the current token starts
    token_start: usize,
    references: Vec<ReferenceSite>,
    calls: Vec<CallSite>,
    /// Current nesting, bounded by `MAX_NESTING`
    depth: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(input: &'a str) -> FormulaResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            offset: 0,
            current_token: None,
            token_start: 0,
            references: Vec::new(),
            calls: Vec::new(),
            depth: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> FormulaResult<()> {
        self.skip_whitespace();
        self.token_start = self.offset;
        self.current_token = Some(self.scan_token()?);
        Ok(())
    }

    fn scan_token(&mut self) -> FormulaResult<Token> {
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };
        let start = self.offset;

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            ',' => Some(Token::Comma),
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            _ => None,
        };
        if let Some(token) = single {
            self.advance();
            return Ok(token);
        }

        // One- or two-character operators
        match c {
            '<' | '>' => {
                self.advance();
                let or_equal = self.peek_char() == Some('=');
                if or_equal {
                    self.advance();
                }
                return Ok(match (c, or_equal) {
                    ('<', true) => Token::LessEqual,
                    ('<', false) => Token::LessThan,
                    (_, true) => Token::GreaterEqual,
                    (_, false) => Token::GreaterThan,
                });
            }
            '=' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::EqualEqual);
                }
                return Err(FormulaError::syntax(
                    "Unexpected '='; use '==' to compare",
                    start,
                ));
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::NotEqual);
                }
                return Err(FormulaError::syntax("Unexpected '!'; use '!=' to compare", start));
            }
            '{' => return self.scan_field_ref(),
            '}' => return Err(FormulaError::syntax("Unmatched '}'", start)),
            '"' => return self.scan_string(),
            _ => {}
        }

        // Number
        if c.is_ascii_digit()
            || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Function name
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        Err(FormulaError::syntax(
            format!("Unexpected character '{}'", c),
            start,
        ))
    }

    fn scan_field_ref(&mut self) -> FormulaResult<Token> {
        let start = self.offset;
        self.advance(); // Skip '{'

        let name_start = self.pos;
        loop {
            match self.peek_char() {
                Some('}') => break,
                Some('{') | None => {
                    return Err(FormulaError::syntax("Unmatched '{'", start));
                }
                Some(_) => self.advance(),
            }
        }
        let name = &self.input[name_start..self.pos];
        self.advance(); // Skip '}'

        if name.is_empty() {
            return Err(FormulaError::syntax("Empty reference '{}'", start));
        }
        if !calcsmith_core::Field::is_valid_name(name) {
            return Err(FormulaError::syntax(
                format!("Invalid reference name '{}'", name),
                start,
            ));
        }

        self.references.push(ReferenceSite {
            name: name.to_string(),
            position: start,
        });
        Ok(Token::FieldRef(name.to_string()))
    }

    fn scan_string(&mut self) -> FormulaResult<Token> {
        let start = self.offset;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some('"') => {
                    // Check for escaped quote ("")
                    if self.peek_char_at(1) == Some('"') {
                        s.push('"');
                        self.advance();
                        self.advance();
                    } else {
                        self.advance();
                        return Ok(Token::String(s));
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => return Err(FormulaError::syntax("Unterminated string", start)),
            }
        }
    }

    fn scan_number(&mut self) -> FormulaResult<Token> {
        let start = self.pos;
        let start_offset = self.offset;

        // Integer part
        self.skip_digits();

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            self.skip_digits();
        }

        let num_str = &self.input[start..self.pos];
        match num_str.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(Token::Number(n)),
            Ok(_) => Err(FormulaError::syntax(
                format!("Number out of range: {}", num_str),
                start_offset,
            )),
            Err(_) => Err(FormulaError::syntax(
                format!("Malformed number '{}'", num_str),
                start_offset,
            )),
        }
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        Token::Identifier(self.input[start..self.pos].to_string())
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
            self.offset += 1;
        }
    }

    fn skip_digits(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn current_token(&self) -> &Token {
        self.current_token.as_ref().unwrap_or(&Token::Eof)
    }

    fn consume(&mut self) -> FormulaResult<Token> {
        let token = self.current_token.take().unwrap_or(Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token, what: &str) -> FormulaResult<()> {
        if self.current_token() == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(FormulaError::syntax(
                format!("Expected {}, found {}", what, self.current_token().describe()),
                self.token_start,
            ))
        }
    }

    fn enter(&mut self, start: usize) -> FormulaResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(FormulaError::syntax("Formula nests too deeply", start));
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Comparison: ==, !=, <, <=, >, >= (non-associative)
    // 2. Addition/Subtraction: +, -
    // 3. Multiplication/Division: *, /
    // 4. Unary: -, +
    // 5. Primary: literals, references, function calls, parentheses

    fn parse_expression(&mut self) -> FormulaResult<FormulaExpr> {
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FormulaResult<FormulaExpr> {
        let left = self.parse_additive()?;

        let op = match self.current_token().comparison() {
            Some(op) => op,
            None => return Ok(left),
        };
        self.consume()?;
        let right = self.parse_additive()?;

        if self.current_token().comparison().is_some() {
            return Err(FormulaError::syntax(
                "Comparisons cannot be chained; use parentheses",
                self.token_start,
            ));
        }

        Ok(FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_multiplicative()?;
        // Each link deepens the left spine of the tree
        let mut links = 0;

        loop {
            let op = match self.current_token() {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.enter(self.token_start)?;
            links += 1;
            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.leave(links);
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> FormulaResult<FormulaExpr> {
        let mut left = self.parse_unary()?;
        let mut links = 0;

        loop {
            let op = match self.current_token() {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.enter(self.token_start)?;
            links += 1;
            self.consume()?;
            let right = self.parse_unary()?;
            left = FormulaExpr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        self.leave(links);
        Ok(left)
    }

    fn parse_unary(&mut self) -> FormulaResult<FormulaExpr> {
        match self.current_token() {
            Token::Minus => {
                self.enter(self.token_start)?;
                self.consume()?;
                let operand = self.parse_unary()?;
                self.leave(1);
                Ok(FormulaExpr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            // Prefix plus (no-op)
            Token::Plus => {
                self.enter(self.token_start)?;
                self.consume()?;
                let operand = self.parse_unary()?;
                self.leave(1);
                Ok(operand)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> FormulaResult<FormulaExpr> {
        let start = self.token_start;
        match self.current_token().clone() {
            Token::Number(n) => {
                self.consume()?;
                Ok(FormulaExpr::Number(n))
            }

            Token::String(s) => {
                self.consume()?;
                Ok(FormulaExpr::String(s))
            }

            Token::FieldRef(name) => {
                self.consume()?;
                Ok(FormulaExpr::FieldRef(name))
            }

            Token::LeftParen => {
                self.enter(start)?;
                self.consume()?;
                let expr = self.parse_expression()?;
                if self.current_token() == &Token::Eof {
                    return Err(FormulaError::syntax("Unmatched '('", start));
                }
                self.expect(&Token::RightParen, "')'")?;
                self.leave(1);
                Ok(expr)
            }

            Token::Identifier(name) => {
                self.consume()?;
                // Only function calls may be written bare
                if matches!(self.current_token(), Token::LeftParen) {
                    self.parse_function_call(name, start)
                } else {
                    Err(FormulaError::syntax(
                        format!(
                            "Bare identifier '{}'; write field references as {{{}}}",
                            name, name
                        ),
                        start,
                    ))
                }
            }

            Token::RightParen => Err(FormulaError::syntax("Unmatched ')'", start)),

            Token::Eof => Err(FormulaError::syntax("Unexpected end of formula", start)),

            other => Err(FormulaError::syntax(
                format!("Unexpected {}", other.describe()),
                start,
            )),
        }
    }

    fn parse_function_call(&mut self, name: String, start: usize) -> FormulaResult<FormulaExpr> {
        let open = self.token_start;
        self.enter(start)?;
        self.expect(&Token::LeftParen, "'('")?;

        // Reserve the slot so calls stay in source order of their names
        let slot = self.calls.len();
        let name = name.to_uppercase();
        self.calls.push(CallSite {
            name: name.clone(),
            position: start,
            args: Vec::new(),
        });

        let mut args = Vec::new();

        // Parse arguments
        if !matches!(self.current_token(), Token::RightParen) {
            args.push(self.parse_expression()?);

            while matches!(self.current_token(), Token::Comma) {
                self.consume()?;
                args.push(self.parse_expression()?);
            }
        }

        if self.current_token() == &Token::Eof {
            return Err(FormulaError::syntax("Unmatched '('", open));
        }
        self.expect(&Token::RightParen, "',' or ')'")?;

        self.leave(1);
        self.calls[slot].args = args.clone();
        Ok(FormulaExpr::Function { name, args })
    }
}
