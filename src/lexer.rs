use std::{iter::Peekable, str::Chars};

use tracing::warn;

use crate::token::{Span, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 1_024;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The last token pushed is always [`TokenKind::EndOfInput`].
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    assert!(tokens.is_empty(), "must pass clean tokens buffer");
    tokens.extend(Lexer::new(src));
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> Vec<Token> {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    lex(src, &mut tokens);
    tokens
}

/// The Cype lexer.
///
/// Tokens are produced lazily, one per [`Lexer::next_token`] call. Once the
/// input is exhausted every further call yields [`TokenKind::EndOfInput`].
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Constructs a new lexer with the default state.
    pub fn new(src: &'src str) -> Lexer<'src> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            finished: false,
        }
    }

    /// Scans the next token.
    pub fn next_token(&mut self) -> Token {
        let token = match self.skip_trivia() {
            Some(invalid) => invalid,
            None => self.scan_token(),
        };
        if token.is_invalid() {
            warn!(span = %token.span, "lexer: {}", token.text);
        }
        token
    }

    fn scan_token(&mut self) -> Token {
        use TokenKind::*;
        let kind = match self.mark_advance() {
            '\0' if self.is_at_end() => return self.produce_text(EndOfInput, ""),
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ';' => Semicolon,
            ':' => Colon,
            ',' => Comma,
            '.' => Dot,
            '+' => match self.peek() {
                '+' => self.advance_with(PlusPlus),
                _ => Plus,
            },
            '-' => match self.peek() {
                '-' => self.advance_with(MinusMinus),
                _ => Minus,
            },
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            '=' => match self.peek() {
                '=' => self.advance_with(EqEq),
                '>' => self.advance_with(FatArrow),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => Bang,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '&' => match self.peek() {
                '&' => self.advance_with(AndAnd),
                _ => return self.invalid("unexpected character '&'"),
            },
            '|' => match self.peek() {
                '|' => self.advance_with(OrOr),
                _ => return self.invalid("unexpected character '|'"),
            },
            '"' => return self.string(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            c if c.is_ascii_digit() => return self.number(c),
            c => return self.invalid(format!("unexpected character '{c}'")),
        };
        self.produce(kind)
    }

    /// Skips whitespace and comments. Returns an invalid token if a block
    /// comment is left unterminated.
    fn skip_trivia(&mut self) -> Option<Token> {
        loop {
            match self.peek() {
                c if c.is_ascii_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_second() == '/' => {
                    while !matches!(self.peek(), '\n' | '\0') {
                        self.advance();
                    }
                }
                '/' if self.peek_second() == '*' => {
                    self.mark_advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            '*' if self.peek() == '/' => {
                                self.advance();
                                break;
                            }
                            '\0' if self.is_at_end() => {
                                return Some(self.invalid("unterminated block comment"));
                            }
                            _ => (),
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    /// Lexes an integer or float literal. The token text keeps the literal as
    /// written; see [`extract`] for the conversion into a value.
    fn number(&mut self, first: char) -> Token {
        if first == '0' {
            match self.peek() {
                'x' | 'X' => {
                    self.advance();
                    return self.radix_integer(16, "hexadecimal");
                }
                'b' | 'B' => {
                    self.advance();
                    return self.radix_integer(2, "binary");
                }
                _ => (),
            }
        }

        self.eat_digits();
        if self.peek() == '.' && self.peek_second().is_ascii_digit() {
            return self.fraction();
        }

        if first == '0' && self.substr().len() > 1 {
            if let Some(bad) = self.substr().chars().find(|c| !matches!(c, '0'..='7')) {
                return self.invalid(format!("invalid digit '{bad}' in octal literal"));
            }
        }
        self.produce(TokenKind::IntegerLiteral)
    }

    fn fraction(&mut self) -> Token {
        assert_eq!(self.advance(), '.');
        self.eat_digits();
        if matches!(self.peek(), 'e' | 'E') {
            self.advance();
            if matches!(self.peek(), '+' | '-') {
                self.advance();
            }
            if !self.peek().is_ascii_digit() {
                return self.invalid("expected digits in float exponent");
            }
            self.eat_digits();
        }
        self.produce(TokenKind::FloatLiteral)
    }

    fn radix_integer(&mut self, radix: u32, name: &str) -> Token {
        let digits_lo = self.cursor;
        while self.peek().is_ascii_alphanumeric() {
            self.advance();
        }
        let digits = &self.src[digits_lo..self.cursor];
        if digits.is_empty() {
            return self.invalid(format!("expected digits in {name} literal"));
        }
        if let Some(bad) = digits.chars().find(|c| !c.is_digit(radix)) {
            return self.invalid(format!("invalid digit '{bad}' in {name} literal"));
        }
        self.produce(TokenKind::IntegerLiteral)
    }

    fn eat_digits(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
    }

    /// Lexes a string literal, performing escapes as it goes. The opening
    /// quote was already consumed.
    fn string(&mut self) -> Token {
        let mut buf = String::new();
        loop {
            match self.advance() {
                '\0' if self.is_at_end() => {
                    return self.invalid("unterminated string literal");
                }
                '"' => break,
                '\\' => {
                    let escaped = match self.advance() {
                        '\0' if self.is_at_end() => {
                            return self.invalid("unterminated string literal");
                        }
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '0' => '\0',
                        // Covers `\\` and `\"` too.
                        other => other,
                    };
                    buf.push(escaped);
                }
                c => buf.push(c),
            }
        }
        self.produce_text(TokenKind::StringLiteral, buf)
    }
}

impl<'src> Lexer<'src> {
    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.advance()
    }

    /// Returns the next char and advances the iterator. Returns `'\0'` at the
    /// end of input.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next char without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the char after the next one, without advancing.
    fn peek_second(&self) -> char {
        self.src[self.cursor..].chars().nth(1).unwrap_or('\0')
    }

    fn is_at_end(&self) -> bool {
        self.cursor >= self.src.len()
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo..self.cursor)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &'src str {
        self.span().substr(self.src)
    }

    /// Produces a token whose text is the marked lexeme.
    fn produce(&self, kind: TokenKind) -> Token {
        Token::new(kind, self.substr(), self.span())
    }

    fn produce_text(&self, kind: TokenKind, text: impl Into<String>) -> Token {
        Token::new(kind, text, self.span())
    }

    fn invalid(&self, message: impl Into<String>) -> Token {
        self.produce_text(TokenKind::Invalid, message)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    /// Yields every token up to and including the first
    /// [`TokenKind::EndOfInput`].
    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        self.finished = token.is_eof();
        Some(token)
    }
}

pub mod extract {
    use std::num::{ParseFloatError, ParseIntError};

    use crate::token::{Token, TokenKind};

    /// Converts an integer literal token into its value, honoring the `0x`,
    /// `0b` and leading-zero octal prefixes.
    pub fn int(token: &Token) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::IntegerLiteral);
        let text = token.text.as_str();
        let (digits, radix) = match text.get(..2) {
            Some("0x" | "0X") => (&text[2..], 16),
            Some("0b" | "0B") => (&text[2..], 2),
            _ if text.len() > 1 && text.starts_with('0') => (&text[1..], 8),
            _ => (text, 10),
        };
        i64::from_str_radix(digits, radix)
    }

    pub fn float(token: &Token) -> Result<f64, ParseFloatError> {
        debug_assert_eq!(token.kind, TokenKind::FloatLiteral);
        token.text.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds_and_spans(src: &str) -> Vec<(TokenKind, std::ops::Range<usize>)> {
        lex_in_new(src)
            .into_iter()
            .map(|t| (t.kind, t.span.lo..t.span.hi))
            .collect()
    }

    fn texts(src: &str) -> Vec<(TokenKind, String)> {
        lex_in_new(src)
            .into_iter()
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "+-*/%" => [
                (Plus, 0..1),
                (Minus, 1..2),
                (Star, 2..3),
                (Slash, 3..4),
                (Percent, 4..5),
                (EndOfInput, 5..5),
            ],
            "== != <= >= && || ++ -- =>" => [
                (EqEq, 0..2),
                (NotEq, 3..5),
                (LessEq, 6..8),
                (GreaterEq, 9..11),
                (AndAnd, 12..14),
                (OrOr, 15..17),
                (PlusPlus, 18..20),
                (MinusMinus, 21..23),
                (FatArrow, 24..26),
                (EndOfInput, 26..26),
            ],
            "(<=<>=>=!)" => [
                (LParen, 0..1),
                (LessEq, 1..3),
                (Less, 3..4),
                (GreaterEq, 4..6),
                (GreaterEq, 6..8),
                (Bang, 8..9),
                (RParen, 9..10),
                (EndOfInput, 10..10),
            ],
            "let x: i32[] = [1, 2];" => [
                (Let, 0..3),
                (Identifier, 4..5),
                (Colon, 5..6),
                (TyI32, 7..10),
                (LBracket, 10..11),
                (RBracket, 11..12),
                (Assign, 13..14),
                (LBracket, 15..16),
                (IntegerLiteral, 16..17),
                (Comma, 17..18),
                (IntegerLiteral, 19..20),
                (RBracket, 20..21),
                (Semicolon, 21..22),
                (EndOfInput, 22..22),
            ],
            "a.length {k: v}" => [
                (Identifier, 0..1),
                (Dot, 1..2),
                (Identifier, 2..8),
                (LBrace, 9..10),
                (Identifier, 10..11),
                (Colon, 11..12),
                (Identifier, 13..14),
                (RBrace, 14..15),
                (EndOfInput, 15..15),
            ],
            "x // line comment\n/* block\n comment */ y" => [
                (Identifier, 0..1),
                (Identifier, 39..40),
                (EndOfInput, 40..40),
            ],
            "a /* unclosed" => [
                (Identifier, 0..1),
                (Invalid, 2..13),
                (EndOfInput, 13..13),
            ],
            "a $ b" => [
                (Identifier, 0..1),
                (Invalid, 2..3),
                (Identifier, 4..5),
                (EndOfInput, 5..5),
            ],
        });

        for (input, tokens) in cases {
            assert_eq!(kinds_and_spans(input), *tokens, "input: {input:?}");
        }
    }

    #[test]
    fn test_keywords_and_types() {
        use TokenKind::*;
        let src = "let const var function if else while for do return true false null \
                   undefined number string boolean i32 f64 lets _x9";
        let kinds: Vec<_> = lex_in_new(src).into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [
                Let, Const, Var, Function, If, Else, While, For, Do, Return, True, False, Null,
                Undefined, TyNumber, TyString, TyBoolean, TyI32, TyF64, Identifier, Identifier,
                EndOfInput,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        use TokenKind::*;
        assert_eq!(
            texts("0 42 0x1F 0b101 017 3.25 1.5e3 2.0E-2 7."),
            [
                (IntegerLiteral, "0".into()),
                (IntegerLiteral, "42".into()),
                (IntegerLiteral, "0x1F".into()),
                (IntegerLiteral, "0b101".into()),
                (IntegerLiteral, "017".into()),
                (FloatLiteral, "3.25".into()),
                (FloatLiteral, "1.5e3".into()),
                (FloatLiteral, "2.0E-2".into()),
                (IntegerLiteral, "7".into()),
                (Dot, ".".into()),
                (EndOfInput, String::new()),
            ]
        );

        let values: Vec<_> = lex_in_new("0 42 0x1F 0b101 017 0755")
            .iter()
            .filter(|t| t.kind == IntegerLiteral)
            .map(|t| extract::int(t).unwrap())
            .collect();
        assert_eq!(values, [0, 42, 31, 5, 15, 493]);

        let float = &lex_in_new("1.5e3")[0];
        assert_eq!(extract::float(float), Ok(1500.0));
    }

    #[test]
    fn test_malformed_numbers() {
        use TokenKind::*;
        assert_eq!(
            texts("09 0x 0b12 1.5e"),
            [
                (Invalid, "invalid digit '9' in octal literal".into()),
                (Invalid, "expected digits in hexadecimal literal".into()),
                (Invalid, "invalid digit '2' in binary literal".into()),
                (Invalid, "expected digits in float exponent".into()),
                (EndOfInput, String::new()),
            ]
        );
        // A leading zero with a fraction is a plain decimal float.
        assert_eq!(texts("09.5")[0], (FloatLiteral, "09.5".into()));
    }

    #[test]
    fn test_strings() {
        use TokenKind::*;
        assert_eq!(
            texts(r#""" "hello" "a\nb\t\"q\"\\" "\q\0""#),
            [
                (StringLiteral, String::new()),
                (StringLiteral, "hello".into()),
                (StringLiteral, "a\nb\t\"q\"\\".into()),
                (StringLiteral, "q\0".into()),
                (EndOfInput, String::new()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        use TokenKind::*;
        assert_eq!(
            kinds_and_spans(r#"print("oops);"#),
            [
                (Identifier, 0..5),
                (LParen, 5..6),
                (Invalid, 6..13),
                (EndOfInput, 13..13),
            ]
        );
        assert_eq!(texts(r#""abc\"#)[0].1, "unterminated string literal");
    }

    #[test]
    fn test_end_of_input_repeats() {
        let mut lexer = Lexer::new("x");
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier);
        assert!(lexer.next_token().is_eof());
        assert!(lexer.next_token().is_eof());
    }

    #[test]
    fn test_lexing_is_idempotent() {
        let src = "let a: i32[] = [1, 2, 3];\nfor (let i = 0; i < a.length; i++) { println(a[i]); }";
        assert_eq!(lex_in_new(src), lex_in_new(src));
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![$(($kind, $range)),*],
            )),*]
        }};
    }
    use cases;
}
