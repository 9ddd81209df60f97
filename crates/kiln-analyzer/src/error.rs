//! The analyzer driver's own error type — everything that can stop an
//! analysis run before [`crate::report::synthesize`] ever runs. Findings
//! the analysis itself produces (dead code, unused variables) are
//! warning-level diagnostics, not errors, and go into the diagnostic
//! store instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("{0}")]
    Parse(#[from] kiln_syntax::ParseError),

    #[error("{0}")]
    Compile(#[from] kiln_compiler::CompileError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

pub type AnalyzerResult<T> = Result<T, AnalyzerError>;
