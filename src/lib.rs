//! minic: lexer, parser, and LLVM IR generator for a tiny C-like language.
//!
//! - `lexer` turns source text into a token stream, skipping illegal characters.
//! - `parser` builds the `ast::Program` or fails with a syntax error.
//! - `codegen` lowers the AST to LLVM IR with Inkwell and prints it as text.
//! - `toolchain` drives `llc` and a C compiler to build and run the result.
//!
//! Every entry point builds fresh lexer/parser/codegen state, so independent
//! compilations can run side by side.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod toolchain;

use inkwell::context::Context as LlvmContext;
use tracing::{debug, info};

pub use codegen::{CodeGen, CodegenOptions};
pub use error::{CodegenError, CompileError, ParseError, ToolchainError};
pub use lexer::{tokenize, LexDiagnostic};

/// Everything the front-end produces for one source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compilation {
    pub tokens: Vec<token::Token>,
    pub diagnostics: Vec<LexDiagnostic>,
    pub ast: ast::Program,
    pub ir: String,
}

impl Compilation {
    /// One token per line, for debugging.
    pub fn token_listing(&self) -> String {
        token::listing(&self.tokens)
    }

    /// Indented tree rendering of the AST.
    pub fn ast_listing(&self) -> String {
        self.ast.to_string()
    }
}

/// Lex and parse, stopping before code generation.
pub fn parse_source(source: &str) -> Result<ast::Program, ParseError> {
    let (tokens, _) = tokenize(source);
    parser::parse(tokens)
}

/// Lower an already parsed program into IR text, in an LLVM context of its own.
pub fn generate_ir(program: &ast::Program, options: &CodegenOptions) -> Result<String, CodegenError> {
    let ctx = LlvmContext::create();
    CodeGen::new(&ctx, options).generate(program)
}

/// Run the whole front-end with default options.
pub fn compile(source: &str) -> Result<Compilation, CompileError> {
    compile_with(source, &CodegenOptions::default())
}

/// Run the whole front-end: tokens, AST, and IR.
pub fn compile_with(source: &str, options: &CodegenOptions) -> Result<Compilation, CompileError> {
    let (tokens, diagnostics) = tokenize(source);
    debug!(tokens = tokens.len(), illegal = diagnostics.len(), "lexed source");

    let ast = parser::parse(tokens.iter().cloned()).map_err(|e| CompileError::from(e).logged())?;
    let ir = generate_ir(&ast, options).map_err(|e| CompileError::from(e).logged())?;
    info!(bytes = ir.len(), "generated IR");

    Ok(Compilation {
        tokens,
        diagnostics,
        ast,
        ir,
    })
}
