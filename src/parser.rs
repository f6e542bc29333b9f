use thiserror::Error;
use tracing::debug;

use crate::{
    ast::{Assign, BinaryOperator, Expr, Program, Stmt, VarDecl, AUTO},
    lexer::{self, extract},
    registry,
    token::{Span, Spanned, Token, TokenKind},
};

pub type Error = Spanned<ErrorKind>;

type Result<T, E = Error> = std::result::Result<T, E>;

pub fn parse_program(src: &str) -> Result<Program> {
    let tokens = lexer::lex_in_new(src);
    parse(&tokens)
}

/// Parses a full program. The first error aborts parsing.
pub fn parse(tokens: &[Token]) -> Result<Program> {
    let program = Parser::new(tokens).parse_program()?;
    debug!(statements = program.statements.len(), "parsed program");
    Ok(program)
}

pub fn parse_expr(src: &str) -> Result<Expr> {
    let tokens = lexer::lex_in_new(src);
    let mut p = Parser::new(&tokens);
    let expr = p.parse_expr()?;
    p.consume(TokenKind::EndOfInput)?;
    Ok(expr)
}

struct Parser<'tok> {
    tokens: &'tok [Token],
    cursor: usize,
    /// Returned once `tokens` is exhausted, so a buffer without a trailing
    /// [`TokenKind::EndOfInput`] still parses.
    eof: Token,
}

impl Parser<'_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        while !self.is(TokenKind::EndOfInput) {
            statements.push(self.parse_stmt()?);
        }
        Ok(Program { statements })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        let token = self.peek();
        match token.kind {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl = self.parse_var_decl()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(Stmt::VarDecl(decl))
            }
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.advance();
                let cond = self.parse_paren_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::While { cond, body })
            }
            TokenKind::Do => {
                self.advance();
                let body = self.parse_block()?;
                self.consume(TokenKind::While)?;
                let cond = self.parse_paren_expr()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(Stmt::DoWhile { body, cond })
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Identifier => {
                let stmt = self.parse_simple_stmt()?;
                self.consume(TokenKind::Semicolon)?;
                Ok(stmt)
            }
            actual => Err(error_at(token, ErrorKind::ExpectedStatement { actual })),
        }
    }

    /// Parses `let name [: type] [= expr]`, without the trailing `;`.
    fn parse_var_decl(&mut self) -> Result<VarDecl> {
        self.advance(); // let, const or var
        let name = self.consume(TokenKind::Identifier)?.text;
        let ty = if self.take(TokenKind::Colon) {
            self.parse_type()?
        } else {
            AUTO.to_owned()
        };
        let init = if self.take(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(VarDecl { name, ty, init })
    }

    /// Type names are kept as written; `T[]` becomes `"T[]"`.
    fn parse_type(&mut self) -> Result<String> {
        let token = self.peek();
        if !token.kind.is_type_name() && token.kind != TokenKind::Identifier {
            return Err(error_at(
                token,
                ErrorKind::ExpectedType { actual: token.kind },
            ));
        }
        let mut name = self.advance().text;
        if self.take(TokenKind::LBracket) {
            self.consume(TokenKind::RBracket)?;
            name.push_str("[]");
        }
        Ok(name)
    }

    /// Parses a statement led by an identifier: a call, an assignment, an
    /// increment or an element assignment. Does not consume the `;`.
    fn parse_simple_stmt(&mut self) -> Result<Stmt> {
        if registry::is_known(&self.peek().text) {
            return Ok(Stmt::Expr(self.parse_expr()?));
        }

        let ident = self.advance();
        let next = self.peek();
        match next.kind {
            TokenKind::Assign => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Stmt::Assign(Assign {
                    name: ident.text,
                    value,
                }))
            }
            TokenKind::PlusPlus | TokenKind::MinusMinus => {
                let op = if next.kind == TokenKind::PlusPlus {
                    BinaryOperator::Add
                } else {
                    BinaryOperator::Sub
                };
                self.advance();
                let value = Expr::binary(op, Expr::var(&ident.text), Expr::Int(1));
                Ok(Stmt::Assign(Assign {
                    name: ident.text,
                    value,
                }))
            }
            TokenKind::LBracket => {
                if !self.is_element_assignment() {
                    return Err(next.span.wrap(ErrorKind::BareIndexExpression));
                }
                self.advance();
                let index = self.parse_expr()?;
                self.consume(TokenKind::RBracket)?;
                self.consume(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                Ok(Stmt::IndexAssign {
                    array: Box::new(Expr::Var(ident.text)),
                    index: Box::new(index),
                    value: Box::new(value),
                })
            }
            TokenKind::LParen => Err(ident
                .span
                .wrap(ErrorKind::UnknownFunction { name: ident.text })),
            actual => Err(error_at(
                next,
                ErrorKind::Unexpected {
                    expected: TokenKind::Assign,
                    actual,
                },
            )),
        }
    }

    /// With the cursor on a `[`, scans ahead to its matching `]` and reports
    /// whether an `=` follows.
    fn is_element_assignment(&self) -> bool {
        let mut depth = 0usize;
        for (offset, token) in self.tokens[self.cursor..].iter().enumerate() {
            match token.kind {
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return self.peek_nth(offset + 1).kind == TokenKind::Assign;
                    }
                }
                TokenKind::EndOfInput => return false,
                _ => {}
            }
        }
        false
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        self.consume(TokenKind::If)?;
        let cond = self.parse_paren_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if !self.take(TokenKind::Else) {
            Vec::new()
        } else if self.is(TokenKind::If) {
            vec![self.parse_if()?]
        } else {
            self.parse_block()?
        };
        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt> {
        self.consume(TokenKind::For)?;
        self.consume(TokenKind::LParen)?;
        let init = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(Box::new(self.parse_for_clause()?))
        };
        self.consume(TokenKind::Semicolon)?;
        let cond = if self.is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.consume(TokenKind::Semicolon)?;
        let step = if self.is(TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_for_clause()?))
        };
        self.consume(TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn parse_for_clause(&mut self) -> Result<Stmt> {
        let token = self.peek();
        match token.kind {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                Ok(Stmt::VarDecl(self.parse_var_decl()?))
            }
            TokenKind::Identifier => self.parse_simple_stmt(),
            actual => Err(error_at(token, ErrorKind::ExpectedStatement { actual })),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.consume(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.is(TokenKind::RBrace) && !self.is(TokenKind::EndOfInput) {
            stmts.push(self.parse_stmt()?);
        }
        self.consume(TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_paren_expr(&mut self) -> Result<Expr> {
        self.consume(TokenKind::LParen)?;
        let expr = self.parse_expr()?;
        self.consume(TokenKind::RParen)?;
        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_postfix()?;

        loop {
            let Some((op, lbp, rbp)) = Self::infix_binding_power(self.peek().kind) else {
                // Not a binary operator
                break;
            };
            if lbp < min_bp {
                // Operator binds less tightly than the minimum required
                break;
            }
            self.advance(); // Operator
            let rhs = self.parse_expr_bp(rbp)?;
            lhs = Expr::binary(op, lhs, rhs);
        }

        Ok(lhs)
    }

    /// Parses a primary followed by any `[index]` and `.name` suffixes.
    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_nud()?;
        loop {
            if self.take(TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.consume(TokenKind::RBracket)?;
                expr = Expr::Index {
                    array: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.take(TokenKind::Dot) {
                let name = self.consume(TokenKind::Identifier)?.text;
                expr = Expr::Member {
                    base: Box::new(expr),
                    name,
                };
            } else {
                break Ok(expr);
            }
        }
    }

    /// nud: Parses tokens that start an expression (literals, names, calls,
    /// grouping and aggregate literals).
    fn parse_nud(&mut self) -> Result<Expr> {
        let token = self.advance();
        let expr = match token.kind {
            TokenKind::StringLiteral => Expr::String(token.text),
            TokenKind::IntegerLiteral => {
                let value = extract::int(&token)
                    .map_err(|_| token.span.wrap(ErrorKind::IntegerOutOfRange))?;
                Expr::Int(value)
            }
            TokenKind::FloatLiteral => {
                let value = extract::float(&token)
                    .map_err(|_| token.span.wrap(ErrorKind::InvalidFloat))?;
                Expr::Float(value)
            }
            TokenKind::True => Expr::Bool(true),
            TokenKind::False => Expr::Bool(false),
            TokenKind::Identifier if self.is(TokenKind::LParen) => {
                if !registry::is_known(&token.text) {
                    return Err(token
                        .span
                        .wrap(ErrorKind::UnknownFunction { name: token.text }));
                }
                self.advance(); // (
                let args = self.parse_list(TokenKind::RParen, Self::parse_expr)?;
                self.consume(TokenKind::RParen)?;
                Expr::Call {
                    name: token.text,
                    args,
                }
            }
            TokenKind::Identifier => Expr::Var(token.text),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.consume(TokenKind::RParen)?;
                expr
            }
            TokenKind::LBracket => {
                let elements = self.parse_list(TokenKind::RBracket, Self::parse_expr)?;
                self.consume(TokenKind::RBracket)?;
                let elem_hint = match elements.first() {
                    Some(Expr::String(_)) => "string",
                    Some(Expr::Float(_)) => "f64",
                    Some(Expr::Bool(_)) => "boolean",
                    _ => "i32",
                };
                Expr::Array {
                    elem_hint: elem_hint.to_owned(),
                    elements,
                }
            }
            TokenKind::LBrace => {
                let properties = self.parse_list(TokenKind::RBrace, Self::parse_property)?;
                self.consume(TokenKind::RBrace)?;
                Expr::Object { properties }
            }
            actual => {
                return Err(error_at(&token, ErrorKind::ExpectedExpression { actual }));
            }
        };
        Ok(expr)
    }

    fn parse_property(&mut self) -> Result<(String, Expr)> {
        let key = self.peek();
        if !matches!(key.kind, TokenKind::Identifier | TokenKind::StringLiteral) {
            return Err(error_at(
                key,
                ErrorKind::Unexpected {
                    expected: TokenKind::Identifier,
                    actual: key.kind,
                },
            ));
        }
        let key = self.advance().text;
        self.consume(TokenKind::Colon)?;
        let value = self.parse_expr()?;
        Ok((key, value))
    }

    /// Parses `item (, item)* [,]` until `end_delim` is found. Does **NOT**
    /// consume the end delimiter.
    fn parse_list<T>(
        &mut self,
        end_delim: TokenKind,
        parse_item: impl Fn(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        while !self.is(end_delim) {
            items.push(parse_item(self)?);
            if !self.take(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(BinaryOperator, u8, u8)> {
        let bp = match kind {
            // Comparisons (left-associative)
            TokenKind::EqEq => (BinaryOperator::Eq, 1, 2),
            TokenKind::NotEq => (BinaryOperator::Ne, 1, 2),
            TokenKind::Less => (BinaryOperator::Lt, 1, 2),
            TokenKind::LessEq => (BinaryOperator::Le, 1, 2),
            TokenKind::Greater => (BinaryOperator::Gt, 1, 2),
            TokenKind::GreaterEq => (BinaryOperator::Ge, 1, 2),

            // Addition/Subtraction (left-associative)
            TokenKind::Plus => (BinaryOperator::Add, 3, 4),
            TokenKind::Minus => (BinaryOperator::Sub, 3, 4),

            // Multiplication/Division/Remainder (left-associative)
            TokenKind::Star => (BinaryOperator::Mul, 5, 6),
            TokenKind::Slash => (BinaryOperator::Div, 5, 6),
            TokenKind::Percent => (BinaryOperator::Rem, 5, 6),

            _ => return None,
        };
        Some(bp)
    }
}

impl<'tok> Parser<'tok> {
    fn new(tokens: &'tok [Token]) -> Parser<'tok> {
        let end = tokens.last().map_or(0, |t| t.span.hi);
        Parser {
            tokens,
            cursor: 0,
            eof: Token::new(
                TokenKind::EndOfInput,
                "",
                Span::new_of_bounds(end..end),
            ),
        }
    }

    /// Returns the current token.
    fn peek(&self) -> &Token {
        self.peek_nth(0)
    }

    fn peek_nth(&self, n: usize) -> &Token {
        self.tokens.get(self.cursor + n).unwrap_or(&self.eof)
    }

    /// Returns the current token and advances. Never moves past the end.
    fn advance(&mut self) -> Token {
        let c = self.peek().clone();
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one, returning true.
    /// If not, returns false and doesn't advance.
    fn take(&mut self, expect: TokenKind) -> bool {
        if self.is(expect) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Advances if the current token matches the provided one. If not,
    /// returns an error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if c.kind == expect {
            Ok(self.advance())
        } else {
            Err(error_at(
                c,
                ErrorKind::Unexpected {
                    expected: expect,
                    actual: c.kind,
                },
            ))
        }
    }
}

/// Builds an error located at `token`. Invalid tokens report the lexer's
/// message instead of `kind`.
fn error_at(token: &Token, kind: ErrorKind) -> Error {
    if token.is_invalid() {
        token.span.wrap(ErrorKind::Lexer {
            message: token.text.clone(),
        })
    } else {
        token.span.wrap(kind)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("expected {expected:?}, but got {actual:?}")]
    Unexpected {
        expected: TokenKind,
        actual: TokenKind,
    },
    #[error("expected expression, but got {actual:?}")]
    ExpectedExpression { actual: TokenKind },
    #[error("expected statement, but got {actual:?}")]
    ExpectedStatement { actual: TokenKind },
    #[error("expected type name, but got {actual:?}")]
    ExpectedType { actual: TokenKind },
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },
    #[error("bare index expression statements are not supported")]
    BareIndexExpression,
    #[error("integer literal out of range")]
    IntegerOutOfRange,
    #[error("invalid float literal")]
    InvalidFloat,
    /// Raised for the first [`TokenKind::Invalid`] token the parser meets.
    #[error("{message}")]
    Lexer { message: String },
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_precedence_mul_plus() {
            let expr = "2 + 3 * 4";
            let tree_ok = "
                binary Add
                  int 2
                  binary Mul
                    int 3
                    int 4
            ";
        }

        fn test_parenthesized_expr() {
            let expr = "(2 + 3) * 4";
            let tree_ok = "
                binary Mul
                  binary Add
                    int 2
                    int 3
                  int 4
            ";
        }

        fn test_precedence_arith_compare() {
            let expr = "a + 1 < b * 2 % 3";
            let tree_ok = "
                binary Lt
                  binary Add
                    var a
                    int 1
                  binary Rem
                    binary Mul
                      var b
                      int 2
                    int 3
            ";
        }

        fn test_left_associativity() {
            let expr = "10 - 4 - 3";
            let tree_ok = "
                binary Sub
                  binary Sub
                    int 10
                    int 4
                  int 3
            ";
        }

        fn test_literals() {
            let expr = r#"[0x1F, 017, 0b11, 1.5e1, "hi", true]"#;
            let tree_ok = r#"
                array i32
                  int 31
                  int 15
                  int 3
                  float 15
                  string "hi"
                  bool true
            "#;
        }

        fn test_array_hint_and_trailing_comma() {
            let expr = r#"["a", "b",]"#;
            let tree_ok = r#"
                array string
                  string "a"
                  string "b"
            "#;
        }

        fn test_postfix_chain() {
            let expr = "grid[i + 1].length";
            let tree_ok = "
                member length
                  index
                    var grid
                    binary Add
                      var i
                      int 1
            ";
        }

        fn test_object_literal() {
            let expr = r#"{ x: 1, "y": [2], }"#;
            let tree_ok = "
                object
                  property x
                    int 1
                  property y
                    array i32
                      int 2
            ";
        }

        fn test_call_expr() {
            let expr = "math_pow(2.0, x,)";
            let tree_ok = "
                call math_pow
                  float 2
                  var x
            ";
        }

        fn test_unknown_call_expr() {
            let expr = "frobnicate(1)";
            let expected_errors = &["0..10: unknown function `frobnicate`"];
        }

        fn test_missing_operand() {
            let expr = "1 + ;";
            let expected_errors = &["4..5: expected expression, but got Semicolon"];
        }

        fn test_declarations() {
            let program = r#"
                let x = "hi";
                const y: i32 = 5;
                var list: string[];
                let p: Point;
            "#;
            let tree_ok = r#"
                let x: auto
                  string "hi"
                let y: i32
                  int 5
                let list: string[]
                let p: Point
            "#;
        }

        fn test_assignments() {
            let program = "x = x * 2; i++; j--; a[i + 1] = 99;";
            let tree_ok = "
                assign x
                  binary Mul
                    var x
                    int 2
                assign i
                  binary Add
                    var i
                    int 1
                assign j
                  binary Sub
                    var j
                    int 1
                index-assign
                  var a
                  binary Add
                    var i
                    int 1
                  int 99
            ";
        }

        fn test_nested_brackets_in_element_assignment() {
            let program = "a[b[0]] = 1;";
            let tree_ok = "
                index-assign
                  var a
                  index
                    var b
                    int 0
                  int 1
            ";
        }

        fn test_bare_index_statement() {
            let program = "a[0];";
            let expected_errors = &["1..2: bare index expression statements are not supported"];
        }

        fn test_call_statement() {
            let program = r#"println("hello"); print(1 + 2);"#;
            let tree_ok = r#"
                expr
                  call println
                    string "hello"
                expr
                  call print
                    binary Add
                      int 1
                      int 2
            "#;
        }

        fn test_unknown_function_statement() {
            let program = "foo(1);";
            let expected_errors = &["0..3: unknown function `foo`"];
        }

        fn test_if_else_if_chain() {
            let program = "
                if (x < 1) { println(1); }
                else if (x < 2) { println(2); }
                else { println(3); }
            ";
            let tree_ok = "
                if
                  cond
                    binary Lt
                      var x
                      int 1
                  then
                    expr
                      call println
                        int 1
                  else
                    if
                      cond
                        binary Lt
                          var x
                          int 2
                      then
                        expr
                          call println
                            int 2
                      else
                        expr
                          call println
                            int 3
            ";
        }

        fn test_loops() {
            let program = "
                while (i < 3) { i++; }
                do { i = i - 1; } while (i > 0);
                for (let k: i32 = 0; k < 3; k++) { }
                for (;;) { }
            ";
            let tree_ok = "
                while
                  cond
                    binary Lt
                      var i
                      int 3
                  body
                    assign i
                      binary Add
                        var i
                        int 1
                do-while
                  body
                    assign i
                      binary Sub
                        var i
                        int 1
                  cond
                    binary Gt
                      var i
                      int 0
                for
                  init
                    let k: i32
                      int 0
                  cond
                    binary Lt
                      var k
                      int 3
                  step
                    assign k
                      binary Add
                        var k
                        int 1
                  body
                for
                  body
            ";
        }

        fn test_missing_semicolon() {
            let program = "let x = 1 let y = 2;";
            let expected_errors = &["10..13: expected Semicolon, but got Let"];
        }

        fn test_missing_closing_brace() {
            let program = "while (x) { x = 0;";
            let expected_errors = &["18..18: expected RBrace, but got EndOfInput"];
        }

        fn test_statement_cannot_start_with_literal() {
            let program = "42;";
            let expected_errors = &["0..2: expected statement, but got IntegerLiteral"];
        }

        fn test_lexer_error_surfaces() {
            let program = "let s = \"abc";
            let expected_errors = &["8..12: unterminated string literal"];
        }

        fn test_bad_type_name() {
            let program = "let x: 5 = 1;";
            let expected_errors = &["7..8: expected type name, but got IntegerLiteral"];
        }
    );

    #[test]
    fn test_parse_without_eof_token() {
        let mut tokens = crate::lexer::lex_in_new("let x = 1;");
        tokens.pop();
        let program = super::parse(&tokens).unwrap();
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = super::parse_program("let x = 99999999999999999999;").unwrap_err();
        assert_eq!(err.inner, super::ErrorKind::IntegerOutOfRange);
        assert_eq!(err.span.lo, 8);
    }
}
