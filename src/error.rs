use std::io;

use inkwell::builder::BuilderError;
use thiserror::Error;
use tracing::debug;

/// Syntax faults. Parsing stops at the first one; no partial AST is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error at `{found}` (line {line}): expected {expected}")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
    },
    #[error("syntax error at end of input: expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("syntax error at `{op}` (line {line}): comparison operators cannot be chained")]
    ChainedComparison { op: String, line: usize },
    #[error("syntax error at `{text}` (line {line}): integer literal does not fit in i32")]
    LiteralOutOfRange { text: String, line: usize },
}

/// Faults raised while lowering the AST. Generation stops immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodegenError {
    #[error("undefined symbol `{0}`")]
    UndefinedSymbol(String),
    #[error("undefined function `{0}`")]
    UndefinedFunction(String),
    #[error("function `{name}` expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("function `{0}` is already declared by the runtime")]
    Redefinition(String),
    #[error("LLVM builder error: {0}")]
    Builder(String),
    #[error("module verification failed: {0}")]
    Verify(String),
}

impl From<BuilderError> for CodegenError {
    fn from(err: BuilderError) -> Self {
        CodegenError::Builder(err.to_string())
    }
}

/// Any fault that aborts the front-end pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

impl CompileError {
    /// Short classification string used for logging.
    pub fn category(&self) -> &'static str {
        match self {
            CompileError::Parse(_) => "parse-error",
            CompileError::Codegen(CodegenError::UndefinedSymbol(_)) => "undefined-symbol",
            CompileError::Codegen(CodegenError::UndefinedFunction(_)) => "undefined-function",
            CompileError::Codegen(CodegenError::Arity { .. }) => "arity",
            CompileError::Codegen(CodegenError::Redefinition(_)) => "redefinition",
            CompileError::Codegen(CodegenError::Builder(_) | CodegenError::Verify(_)) => "internal",
        }
    }

    /// Log the fault with its category before handing it back to the caller.
    pub fn logged(self) -> Self {
        debug!(category = %self.category(), message = %self, "compilation aborted");
        self
    }
}

/// Failures of the downstream toolchain. Tool output is carried verbatim.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("{tool} not found (tried: {tried})")]
    ToolNotFound { tool: &'static str, tried: String },
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("{tool} failed ({status})\n{stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },
}

impl ToolchainError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        ToolchainError::Io {
            context: context.into(),
            source,
        }
    }
}
