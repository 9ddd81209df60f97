//! `kiln fmt`: the formatter is out of scope for this interpreter core
//! (`spec.md` names it explicitly as an external collaborator specified
//! only by its interface). Accepted so scripts invoking it uniformly
//! don't fail argument parsing; always reports "not implemented".

use crate::cli::FmtArgs;
use crate::error::{CliError, CliResult};

pub fn run(_args: FmtArgs) -> CliResult<()> {
    Err(CliError::NotImplemented("fmt"))
}
