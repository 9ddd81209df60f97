//! `kiln test`: the test runner itself is out of scope for this
//! interpreter core (`spec.md` names it explicitly as an external
//! collaborator specified only by its interface). This accepts every
//! documented flag so a caller's invocation doesn't fail argument
//! parsing, then reports the same "not implemented" outcome `fmt` does.

use crate::cli::TestArgs;
use crate::error::{CliError, CliResult};

pub fn run(args: TestArgs) -> CliResult<()> {
    if args.list {
        println!("(test runner not implemented; nothing to list for {})", args.build_dir);
        return Ok(());
    }
    Err(CliError::NotImplemented("test"))
}
