//! The CLI's own error type: every subcommand failure folds into one enum
//! so `main` has a single place to turn a failure into an exit code and a
//! message on stderr.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Parse(#[from] kiln_syntax::ParseError),

    #[error("{0}")]
    Compile(#[from] kiln_compiler::CompileError),

    #[error("{0}")]
    Vm(#[from] kiln_vm::VmError),

    #[error("{0}")]
    Option(#[from] kiln_vm::OptionError),

    #[error("{0}")]
    Wrap(#[from] kiln_wrap::WrapError),

    #[error("{0}")]
    Analyzer(#[from] kiln_analyzer::AnalyzerError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("build directory has unresolved diagnostics")]
    DiagnosedErrors,

    #[error("{0}")]
    Usage(String),

    #[error("'{0}' is not implemented")]
    NotImplemented(&'static str),
}

pub type CliResult<T> = Result<T, CliError>;
