use std::{fmt, ops::Range};

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The lexeme, with a few exceptions: string literals hold their unescaped
    /// contents and [`TokenKind::Invalid`] holds the diagnostic message.
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, span: Span) -> Token {
        Token {
            kind,
            text: text.into(),
            span,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::EndOfInput
    }

    pub fn is_invalid(&self) -> bool {
        self.kind == TokenKind::Invalid
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {:?}, {})", self.kind, self.text, self.span)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Span {
    pub lo: usize,
    pub hi: usize,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Span { lo, hi }
    }

    pub fn len(&self) -> usize {
        self.hi - self.lo
    }

    pub fn is_empty(&self) -> bool {
        self.lo == self.hi
    }

    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.lo..self.hi]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { inner, span: self }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self})")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lo, self.hi)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub inner: T,
    pub span: Span,
}

/// The alternate form (`{:#}`) prefixes the span.
impl<T: fmt::Display> fmt::Display for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}: ", self.span)?;
        }
        write!(f, "{}", self.inner)
    }
}

impl<T: fmt::Debug + fmt::Display> std::error::Error for Spanned<T> {}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Let,
    Const,
    Var,
    Function,
    If,
    Else,
    While,
    For,
    Do,
    Return,
    True,
    False,
    Null,
    Undefined,

    TyNumber,
    TyString,
    TyBoolean,
    TyI32,
    TyF64,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Colon,
    Comma,
    Dot,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    /// `=`
    Assign,
    Less,
    Greater,
    Bang,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    LessEq,
    GreaterEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    /// `++`
    PlusPlus,
    /// `--`
    MinusMinus,
    /// `=>`
    FatArrow,

    Identifier,
    StringLiteral,
    IntegerLiteral,
    FloatLiteral,

    EndOfInput,
    Invalid,
}

impl TokenKind {
    /// Whether this kind names one of the language's built-in types.
    pub fn is_type_name(self) -> bool {
        matches!(
            self,
            TokenKind::TyNumber
                | TokenKind::TyString
                | TokenKind::TyBoolean
                | TokenKind::TyI32
                | TokenKind::TyF64
        )
    }
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "let" => TokenKind::Let,
    "const" => TokenKind::Const,
    "var" => TokenKind::Var,
    "function" => TokenKind::Function,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "do" => TokenKind::Do,
    "return" => TokenKind::Return,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "null" => TokenKind::Null,
    "undefined" => TokenKind::Undefined,
    "number" => TokenKind::TyNumber,
    "string" => TokenKind::TyString,
    "boolean" => TokenKind::TyBoolean,
    "i32" => TokenKind::TyI32,
    "f64" => TokenKind::TyF64,
};
