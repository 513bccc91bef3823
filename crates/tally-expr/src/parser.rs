//! Expression parser
//!
//! A recursive descent parser for arithmetic/boolean expressions with proper
//! operator precedence.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{ExprError, ExprResult};

/// Parse an expression string into an AST
///
/// # Example
/// ```rust
/// use tally_expr::parse_expression;
///
/// let ast = parse_expression("fieldA + 10").unwrap();
/// let ast = parse_expression("where(price > 100, price * 0.9, price)").unwrap();
/// let ast = parse_expression("(a >= 1) and not flag").unwrap();
/// ```
pub fn parse_expression(text: &str) -> ExprResult<Expr> {
    let mut parser = ExprParser::new(text)?;

    if parser.current_token == Token::Eof {
        return Err(ExprError::Parse("Empty expression".into()));
    }

    let node = parser.parse_or()?;

    // Make sure we consumed all input
    if parser.current_token != Token::Eof {
        return Err(ExprError::Parse(format!(
            "Unexpected {:?} at position {}",
            parser.current_token, parser.token_start
        )));
    }

    Ok(node.expr)
}

/// Deepest expression tree the parser will build. Evaluating and dropping an
/// `Expr` recurse once per level, so the limit also bounds those.
pub const MAX_DEPTH: usize = 256;

/// Token types
#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Literals
    Number(f64),
    String(String),
    Boolean(bool),

    // Variable or function name
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    EqualEqual,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    Ampersand,
    Pipe,
    Tilde,
    And,
    Or,
    Not,
    Comma,

    // Delimiters
    LeftParen,
    RightParen,

    // End of input
    Eof,
}

/// A parsed subexpression and the height of its tree
struct Node {
    expr: Expr,
    depth: usize,
}

impl Node {
    fn leaf(expr: Expr) -> Self {
        Node { expr, depth: 1 }
    }
}

/// Expression parser
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    /// Byte offset where the current token starts
    token_start: usize,
    current_token: Token,
    /// Open parentheses, calls and prefix operators around the current token
    nesting: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> ExprResult<Self> {
        let mut parser = Self {
            input,
            pos: 0,
            token_start: 0,
            current_token: Token::Eof,
            nesting: 0,
        };
        parser.advance_token()?;
        Ok(parser)
    }

    // === Token scanning ===

    fn advance_token(&mut self) -> ExprResult<()> {
        self.current_token = self.scan_token()?;
        Ok(())
    }

    fn scan_token(&mut self) -> ExprResult<Token> {
        self.skip_whitespace();
        self.token_start = self.pos;

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(Token::Eof),
        };

        // Single-character tokens
        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '/' => Some(Token::Slash),
            '%' => Some(Token::Percent),
            '&' => Some(Token::Ampersand),
            '|' => Some(Token::Pipe),
            '~' => Some(Token::Tilde),
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
            '*' => {
                self.advance();
                if self.peek_char() == Some('*') {
                    self.advance();
                    return Ok(Token::StarStar);
                }
                return Ok(Token::Star);
            }
            '<' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::LessEqual);
                }
                return Ok(Token::LessThan);
            }
            '>' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::GreaterEqual);
                }
                return Ok(Token::GreaterThan);
            }
            '=' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::EqualEqual);
                }
                return Err(ExprError::Parse(format!(
                    "Unexpected '=' at position {}, use '==' for comparison",
                    self.token_start
                )));
            }
            '!' => {
                self.advance();
                if self.peek_char() == Some('=') {
                    self.advance();
                    return Ok(Token::NotEqual);
                }
                return Err(ExprError::Parse(format!(
                    "Unexpected '!' at position {}",
                    self.token_start
                )));
            }
            _ => {}
        }

        // String literal
        if c == '"' || c == '\'' {
            return self.scan_string(c);
        }

        // Number
        if c.is_ascii_digit() || (c == '.' && self.peek_char_at(1).map_or(false, |c| c.is_ascii_digit()))
        {
            return self.scan_number();
        }

        // Identifier or keyword
        if c.is_alphabetic() || c == '_' {
            return Ok(self.scan_identifier());
        }

        Err(ExprError::Parse(format!(
            "Unexpected character '{}' at position {}",
            c, self.pos
        )))
    }

    fn scan_string(&mut self, quote: char) -> ExprResult<Token> {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(Token::String(s));
                }
                Some('\\') => {
                    self.advance();
                    if let Some(escaped) = self.peek_char() {
                        s.push(escaped);
                        self.advance();
                    }
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
                None => {
                    return Err(ExprError::Parse(format!(
                        "Unterminated string literal starting at position {}",
                        start
                    )))
                }
            }
        }
    }

    fn scan_number(&mut self) -> ExprResult<Token> {
        let start = self.pos;

        // Integer part
        while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
            self.advance();
        }

        // Decimal part
        if self.peek_char() == Some('.') {
            self.advance();
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Exponent part
        if self.peek_char().map_or(false, |c| c == 'e' || c == 'E') {
            self.advance();
            if self.peek_char().map_or(false, |c| c == '+' || c == '-') {
                self.advance();
            }
            while self.peek_char().map_or(false, |c| c.is_ascii_digit()) {
                self.advance();
            }
        }

        let num_str = &self.input[start..self.pos];
        num_str.parse::<f64>().map(Token::Number).map_err(|_| {
            ExprError::Parse(format!(
                "Invalid number '{}' at position {}",
                num_str, start
            ))
        })
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.pos;

        while self
            .peek_char()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];

        match text {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "True" | "true" => Token::Boolean(true),
            "False" | "false" => Token::Boolean(false),
            _ => Token::Identifier(text.to_string()),
        }
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
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn consume(&mut self) -> ExprResult<Token> {
        let token = std::mem::replace(&mut self.current_token, Token::Eof);
        self.advance_token()?;
        Ok(token)
    }

    fn expect(&mut self, expected: &Token) -> ExprResult<()> {
        if &self.current_token == expected {
            self.consume()?;
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {:?}", expected)))
        }
    }

    fn unexpected(&self, context: &str) -> ExprError {
        match &self.current_token {
            Token::Eof => ExprError::Parse(format!("Unexpected end of expression, {}", context)),
            token => ExprError::Parse(format!(
                "Unexpected {:?} at position {}, {}",
                token, self.token_start, context
            )),
        }
    }

    // === Depth limits ===

    fn enter(&mut self) -> ExprResult<()> {
        self.nesting += 1;
        if self.nesting > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.nesting -= 1;
    }

    fn too_deep(&self) -> ExprError {
        ExprError::Parse(format!(
            "Expression nested deeper than {} levels at position {}",
            MAX_DEPTH, self.token_start
        ))
    }

    fn node(&self, expr: Expr, depth: usize) -> ExprResult<Node> {
        if depth > MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(Node { expr, depth })
    }

    fn unary(&self, op: UnaryOperator, operand: Node) -> ExprResult<Node> {
        let depth = operand.depth + 1;
        let expr = Expr::UnaryOp {
            op,
            operand: Box::new(operand.expr),
        };
        self.node(expr, depth)
    }

    fn binary(&self, op: BinaryOperator, left: Node, right: Node) -> ExprResult<Node> {
        let depth = left.depth.max(right.depth) + 1;
        let expr = Expr::BinaryOp {
            op,
            left: Box::new(left.expr),
            right: Box::new(right.expr),
        };
        self.node(expr, depth)
    }

    // === Expression parsing with precedence ===
    // Precedence (lowest to highest):
    // 1. Or: or, |
    // 2. And: and, &
    // 3. Not: not
    // 4. Comparison: ==, !=, <, <=, >, >=
    // 5. Addition/Subtraction: +, -
    // 6. Multiplication/Division/Modulo: *, /, %
    // 7. Unary: -, +, ~
    // 8. Exponentiation: ** (right associative, binds tighter than a unary
    //    operator on its left: -2**2 == -4)
    // 9. Primary: literals, variables, function calls, parentheses

    fn parse_or(&mut self) -> ExprResult<Node> {
        let mut left = self.parse_and()?;

        while matches!(self.current_token, Token::Or | Token::Pipe) {
            self.consume()?;
            let right = self.parse_and()?;
            left = self.binary(BinaryOperator::Or, left, right)?;
        }

        Ok(left)
    }

    fn parse_and(&mut self) -> ExprResult<Node> {
        let mut left = self.parse_not()?;

        while matches!(self.current_token, Token::And | Token::Ampersand) {
            self.consume()?;
            let right = self.parse_not()?;
            left = self.binary(BinaryOperator::And, left, right)?;
        }

        Ok(left)
    }

    fn parse_not(&mut self) -> ExprResult<Node> {
        if self.current_token == Token::Not {
            self.consume()?;
            self.enter()?;
            let operand = self.parse_not();
            self.leave();
            return self.unary(UnaryOperator::Not, operand?);
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> ExprResult<Node> {
        let mut left = self.parse_additive()?;

        loop {
            let op = match self.current_token {
                Token::EqualEqual => BinaryOperator::Equal,
                Token::NotEqual => BinaryOperator::NotEqual,
                Token::LessThan => BinaryOperator::LessThan,
                Token::LessEqual => BinaryOperator::LessEqual,
                Token::GreaterThan => BinaryOperator::GreaterThan,
                Token::GreaterEqual => BinaryOperator::GreaterEqual,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_additive()?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> ExprResult<Node> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ExprResult<Node> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.current_token {
                Token::Star => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                Token::Percent => BinaryOperator::Modulo,
                _ => break,
            };

            self.consume()?;
            let right = self.parse_unary()?;
            left = self.binary(op, left, right)?;
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> ExprResult<Node> {
        let op = match self.current_token {
            Token::Minus => Some(UnaryOperator::Negate),
            Token::Tilde => Some(UnaryOperator::Not),
            Token::Plus => None,
            _ => return self.parse_power(),
        };

        self.consume()?;
        self.enter()?;
        let operand = self.parse_unary();
        self.leave();
        let operand = operand?;

        match op {
            Some(op) => self.unary(op, operand),
            // Prefix plus (no-op)
            None => Ok(operand),
        }
    }

    fn parse_power(&mut self) -> ExprResult<Node> {
        let left = self.parse_primary()?;

        if self.current_token == Token::StarStar {
            self.consume()?;
            // Right associative, and allows 2 ** -1
            self.enter()?;
            let right = self.parse_unary();
            self.leave();
            return self.binary(BinaryOperator::Power, left, right?);
        }

        Ok(left)
    }

    fn parse_primary(&mut self) -> ExprResult<Node> {
        match self.current_token.clone() {
            Token::Number(n) => {
                self.consume()?;
                Ok(Node::leaf(Expr::Number(n)))
            }

            Token::String(s) => {
                self.consume()?;
                Ok(Node::leaf(Expr::String(s)))
            }

            Token::Boolean(b) => {
                self.consume()?;
                Ok(Node::leaf(Expr::Boolean(b)))
            }

            Token::LeftParen => {
                self.consume()?;
                self.enter()?;
                let node = self.parse_or();
                self.leave();
                let node = node?;
                self.expect(&Token::RightParen)?;
                Ok(node)
            }

            Token::Identifier(name) => {
                self.consume()?;
                // Check if it's a function call
                if self.current_token == Token::LeftParen {
                    self.enter()?;
                    let call = self.parse_function_call(name);
                    self.leave();
                    call
                } else {
                    Ok(Node::leaf(Expr::Variable(name)))
                }
            }

            _ => Err(self.unexpected("expected a value")),
        }
    }

    fn parse_function_call(&mut self, name: String) -> ExprResult<Node> {
        self.expect(&Token::LeftParen)?;

        let mut args = Vec::new();
        let mut depth = 0;

        // Parse arguments
        if self.current_token != Token::RightParen {
            let arg = self.parse_or()?;
            depth = depth.max(arg.depth);
            args.push(arg.expr);

            while self.current_token == Token::Comma {
                self.consume()?;
                let arg = self.parse_or()?;
                depth = depth.max(arg.depth);
                args.push(arg.expr);
            }
        }

        self.expect(&Token::RightParen)?;

        let expr = Expr::Function {
            name: name.to_lowercase(),
            args,
        };
        self.node(expr, depth + 1)
    }
}
