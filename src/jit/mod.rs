//! Runs a compiled module in-process on LLVM's MCJIT engine.
//!
//! Runtime library declarations are mapped onto the Rust definitions in
//! [`library`]; `printf`, `puts` and `strcmp` resolve to the C library the
//! process already links.

use inkwell::{
    execution_engine::ExecutionEngine,
    module::Module,
    targets::{InitializationConfig, Target},
    OptimizationLevel,
};
use thiserror::Error;
use tracing::debug;

mod library;

/// Process exit status after a failed array bounds check.
pub const BOUNDS_FAIL_STATUS: i32 = 101;

const C_LIBRARY: &[&str] = &["printf", "puts", "strcmp"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("failed to initialize the native target: {0}")]
    Target(String),
    #[error("failed to create the execution engine: {0}")]
    Engine(String),
    #[error("no runtime definition for `{0}`")]
    MissingSymbol(String),
    #[error("cannot find `main`: {0}")]
    Lookup(String),
}

type Main = unsafe extern "C" fn() -> i32;

/// Runs `main` and returns its result. Output goes straight to the process's
/// standard output.
pub fn run(module: &Module) -> Result<i32, Error> {
    Target::initialize_native(&InitializationConfig::default()).map_err(Error::Target)?;
    ExecutionEngine::link_in_mc_jit();
    let engine = module
        .create_jit_execution_engine(OptimizationLevel::None)
        .map_err(|e| Error::Engine(e.to_string()))?;

    for function in module.get_functions() {
        if function.count_basic_blocks() > 0 {
            continue;
        }
        let name = function.get_name().to_string_lossy();
        match library::address_of(&name) {
            Some(address) => engine.add_global_mapping(&function, address),
            None if C_LIBRARY.contains(&&*name) => {}
            None => return Err(Error::MissingSymbol(name.into_owned())),
        }
    }

    // SAFETY: the code generator always emits `main` as `i32 ()`.
    let main = unsafe { engine.get_function::<Main>("main") }
        .map_err(|e| Error::Lookup(e.to_string()))?;
    debug!(module = ?module.get_name(), "running main");
    // SAFETY: every declaration the module calls was mapped above.
    Ok(unsafe { main.call() })
}
