// program ::= stmt*
// stmt ::= let ID [':' type] ['=' expr] ';'
//        | ID '=' expr ';'
//        | ID ('++' | '--') ';'
//        | ID '[' expr ']' '=' expr ';'
//        | CALL ';'
//        | if '(' expr ')' block [else (block | if ...)]
//        | while '(' expr ')' block
//        | do block while '(' expr ')' ';'
//        | for '(' [decl | assign] ';' [expr] ';' [assign] ')' block
// type ::= (TYPE | ID) ['[' ']']
// block ::= '{' stmt* '}'
// expr ::= expr ('==' | '!=' | '<' | '<=' | '>' | '>=') expr
//        | expr ('+' | '-') expr
//        | expr ('*' | '/' | '%') expr
//        | postfix
// postfix ::= primary ('[' expr ']' | '.' ID)*
// primary ::= integer | float | string | true | false | ID | CALL
//           | '(' expr ')'
//           | '[' [expr (',' expr)* [',']] ']'
//           | '{' [key ':' expr (',' key ':' expr)* [',']] '}'
// CALL ::= KNOWN_FUNCTION '(' [expr (',' expr)* [',']] ')'

// Precedence (tightest first)
//
// [] .
// * / %
// + -
// == != < <= > >=

/// Declared type of a variable whose annotation was omitted.
pub const AUTO: &str = "auto";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl(VarDecl),
    Assign(Assign),
    IndexAssign {
        array: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    Expr(Expr),
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        /// Empty when there is no `else`.
        else_block: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    /// A type name as written (`i32`, `string[]`), or [`AUTO`].
    pub ty: String,
    pub init: Option<Expr>,
}

impl VarDecl {
    pub fn is_auto(&self) -> bool {
        self.ty == AUTO
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Var(String),
    Binary {
        op: BinaryOperator,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Array {
        /// Element type name seeded from the first element's syntactic form.
        elem_hint: String,
        elements: Vec<Expr>,
    },
    Index {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    Object {
        properties: Vec<(String, Expr)>,
    },
    Member {
        base: Box<Expr>,
        name: String,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOperator, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOperator {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Eq
                | BinaryOperator::Ne
                | BinaryOperator::Lt
                | BinaryOperator::Le
                | BinaryOperator::Gt
                | BinaryOperator::Ge
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
        }
    }
}
