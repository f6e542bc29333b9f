//! Lowers a parsed [`Program`] into an LLVM [`Module`] with a single `main`.

use inkwell::{builder::BuilderError, context::Context, module::Module};
use thiserror::Error;

use crate::{ast::Program, types::Ty};

mod generator;
mod runtime;

pub use generator::Generator;
pub use runtime::BOUNDS_FAIL;

pub fn generate<'ctx>(context: &'ctx Context, program: &Program) -> Result<Output<'ctx>, Error> {
    Generator::with_options(Options::default()).generate(context, program)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub module_name: String,
    /// Emit a runtime range check before every element access.
    pub bounds_checks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            module_name: "cype".to_owned(),
            bounds_checks: true,
        }
    }
}

#[derive(Debug)]
pub struct Output<'ctx> {
    /// A module that passed LLVM verification.
    pub module: Module<'ctx>,
    pub warnings: Vec<Warning>,
}

/// A questionable construct that does not stop compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("cannot infer the type of `{name}`, defaulting to i32")]
    InferredDefault { name: String },
    #[error("`{name}` has type {declared} but is given a value of type {actual}")]
    TypeMismatch {
        name: String,
        declared: Ty,
        actual: Ty,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unknown type `{0}`")]
    UnknownType(String),
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("`{name}` takes {expected} argument(s), but {actual} were given")]
    ArgumentCount {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("argument {position} of `{name}` must be {expected}, found {actual}")]
    ArgumentType {
        name: String,
        position: usize,
        expected: Ty,
        actual: Ty,
    },
    #[error("cannot print a value of type {0}")]
    PrintArgument(Ty),
    #[error("invalid operands for `{op}`: {lhs} and {rhs}")]
    InvalidOperands {
        op: &'static str,
        lhs: Ty,
        rhs: Ty,
    },
    #[error("`.length` on non-array type {0}")]
    LengthOfNonArray(Ty),
    #[error("cannot index into a value of type {0}")]
    NotAnArray(Ty),
    #[error("array index must be i32, found {0}")]
    IndexType(Ty),
    #[error("array element must be {expected}, found {actual}")]
    ArrayElementType { expected: Ty, actual: Ty },
    #[error("`{0}` does not produce a value")]
    VoidValue(String),
    #[error("condition must be boolean or i32, found {0}")]
    ConditionType(Ty),
    #[error("cannot store a value of type {actual} into `{name}` of type {expected}")]
    IncompatibleValue {
        name: String,
        expected: Ty,
        actual: Ty,
    },
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("failed to build instruction: {0}")]
    Builder(String),
    #[error("invalid module: {0}")]
    Verification(String),
}

impl From<BuilderError> for Error {
    fn from(error: BuilderError) -> Self {
        Error::Builder(error.to_string())
    }
}
