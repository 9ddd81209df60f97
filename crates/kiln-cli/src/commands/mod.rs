//! One module per subcommand; `dispatch` is `main`'s only entry point
//! into any of them.

pub mod analyze;
pub mod fmt;
pub mod install;
pub mod internal;
pub mod options;
pub mod setup;
pub mod subprojects;
pub mod test_cmd;

use crate::cli::Command;
use crate::error::CliResult;

pub fn dispatch(command: Command) -> CliResult<()> {
    match command {
        Command::Setup(args) => setup::run(args),
        Command::Install(args) => install::run(args),
        Command::Test(args) => test_cmd::run(args),
        Command::Subprojects(args) => subprojects::run(args),
        Command::Fmt(args) => fmt::run(args),
        Command::Analyze(args) => analyze::run(args),
        Command::Options(args) => options::run(args),
        Command::Internal(args) => internal::run(args.action),
    }
}
