//! The `clap`-derived argument surface. One struct/enum pair per
//! subcommand in `commands::dispatch`; this module only describes the
//! shape of the command line, never executes anything.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kiln", version, about = "A from-scratch, Meson-compatible build description interpreter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Configure a project into a build directory.
    Setup(SetupArgs),
    /// Run install actions recorded by the last `setup`.
    Install(InstallArgs),
    /// Dispatch to the test runner (out of scope: interface only).
    Test(TestArgs),
    /// Manage wrap-based subprojects.
    Subprojects(SubprojectsArgs),
    /// Format meson.build files (out of scope: interface only).
    Fmt(FmtArgs),
    /// Static analysis: trace, lsp, root-for, file.
    Analyze(AnalyzeArgs),
    /// List declared and built-in options.
    Options(OptionsArgs),
    /// Internal developer commands.
    Internal(InternalArgs),
}

#[derive(Args)]
pub struct SetupArgs {
    pub build_dir: String,
    /// Directory holding the project's top-level meson.build.
    #[arg(long = "source-dir", default_value = ".")]
    pub source_dir: String,
    /// `-Dname=value`, repeatable.
    #[arg(short = 'D', value_name = "name=value")]
    pub define: Vec<String>,
    /// Stop and report once the instruction at this source line executes.
    #[arg(long = "break", value_name = "LINE")]
    pub break_line: Option<u32>,
    /// Reconfigure an existing build directory.
    #[arg(long)]
    pub reconfigure: bool,
}

#[derive(Args)]
pub struct InstallArgs {
    #[arg(default_value = "build")]
    pub build_dir: String,
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
    #[arg(short = 'd', long = "destdir")]
    pub destdir: Option<String>,
}

#[derive(Args)]
pub struct TestArgs {
    #[arg(default_value = "build")]
    pub build_dir: String,
    #[arg(short = 's', long = "suite")]
    pub suite: Vec<String>,
    #[arg(short = 'j', long = "num-processes")]
    pub jobs: Option<usize>,
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
    #[arg(short = 'l', long = "list")]
    pub list: bool,
    #[arg(short = 'R', long = "no-rebuild")]
    pub no_rebuild: bool,
    #[arg(short = 'f', long = "fail-fast")]
    pub fail_fast: bool,
    #[arg(short = 'e', long = "setup")]
    pub setup: Option<String>,
    #[arg(short = 'd', long = "display-mode")]
    pub display_mode: Option<String>,
    #[arg(short = 'o', long = "output-mode")]
    pub output_mode: Option<String>,
}

#[derive(Args)]
pub struct SubprojectsArgs {
    #[command(subcommand)]
    pub action: SubprojectsAction,
    #[arg(long = "source-dir", default_value = ".")]
    pub source_dir: String,
}

#[derive(Subcommand)]
pub enum SubprojectsAction {
    Update,
    List,
    Clean,
    Fetch,
}

#[derive(Args)]
pub struct FmtArgs {
    pub files: Vec<String>,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    #[command(subcommand)]
    pub action: AnalyzeAction,
    /// `[no-]diagnostic`, `error`, or `list`, repeatable.
    #[arg(short = 'W', value_name = "spec")]
    pub warnings: Vec<String>,
}

#[derive(Subcommand)]
pub enum AnalyzeAction {
    /// Run the analyzer over a file and print every diagnostic.
    Trace { file: String },
    /// Speak JSON-RPC over stdio (delegates to the `kiln-lsp` binary).
    Lsp,
    /// Walk up from `path` to the nearest directory containing meson.build.
    RootFor { path: String },
    /// Alias for `trace` taking the file as the subcommand's own argument.
    File { path: String },
}

#[derive(Args)]
pub struct OptionsArgs {
    pub build_dir: Option<String>,
    #[arg(short = 'a', long = "all")]
    pub all: bool,
    #[arg(short = 'm', long = "machine-readable")]
    pub machine_readable: bool,
}

#[derive(Args)]
pub struct InternalArgs {
    #[command(subcommand)]
    pub action: InternalAction,
}

#[derive(Subcommand)]
pub enum InternalAction {
    /// Evaluate a single file and print its result value.
    Eval { file: String, args: Vec<String> },
    /// Read-eval-print loop over stdin, one line per evaluated unit.
    Repl,
    /// Run a subprocess the way the reference implementation's internal
    /// `exe` wrapper does: optional stdin feed, captured-output file.
    Exe {
        #[arg(short = 'f', long = "feed")]
        feed: Option<String>,
        #[arg(short = 'c', long = "capture")]
        capture: Option<String>,
        #[arg(short = 'e', long = "envfile")]
        envfile: Option<String>,
        #[arg(short = 'a', long = "argsfile")]
        argsfile: Option<String>,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },
    /// Parse and compile a file, dumping its AST and disassembly.
    Check { file: String },
    DumpFuncs,
    DumpDocs,
    DumpToolchains,
}
