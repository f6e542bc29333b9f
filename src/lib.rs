//! Compiler front end for Cype, a small statically typed scripting language.
//!
//! Source text flows through the [`lexer`], the [`parser`] and the
//! [`codegen`] stage, which emits a verified LLVM [`Module`](inkwell::module::Module)
//! with a single `main` entry function. The module prints as textual LLVM IR
//! and can be run in-process with [`jit::run`].

pub use inkwell::context::Context;
use thiserror::Error;
use tracing::debug;

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST.
pub mod parser;

/// The code generator takes an AST and lowers it into an LLVM module.
pub mod codegen;

/// Runs a generated module on the host.
pub mod jit;

pub mod ast;
pub mod registry;
pub mod token;
pub mod types;

pub mod util {
    pub mod fmt {
        pub mod tree;
    }
    #[cfg(test)]
    pub(crate) mod test_utils;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] parser::Error),
    #[error(transparent)]
    Codegen(#[from] codegen::Error),
}

/// Compiles `src` into a module owned by `context`, with the default
/// [`codegen::Options`].
pub fn compile<'ctx>(context: &'ctx Context, src: &str) -> Result<codegen::Output<'ctx>, Error> {
    compile_with(context, src, codegen::Options::default())
}

pub fn compile_with<'ctx>(
    context: &'ctx Context,
    src: &str,
    options: codegen::Options,
) -> Result<codegen::Output<'ctx>, Error> {
    debug!(bytes = src.len(), "compiling");
    let program = parser::parse_program(src)?;
    let output = codegen::Generator::with_options(options).generate(context, &program)?;
    Ok(output)
}
