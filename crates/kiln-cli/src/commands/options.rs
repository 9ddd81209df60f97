//! `kiln options [-a] [-m] [build-dir]`: lists built-in (and, with `-a`,
//! project) options, from a configured build directory's persisted
//! snapshot if one is given, or from fresh defaults otherwise.

use std::path::Path;

use kiln_vm::OptionTable;

use crate::cli::OptionsArgs;
use crate::error::CliResult;
use crate::persist::{self, PersistedOptions, STANDARD_OPTION_NAMES};

pub fn run(args: OptionsArgs) -> CliResult<()> {
    let persisted = match &args.build_dir {
        Some(build_dir) => {
            let path = persist::private_dir(Path::new(build_dir)).join("options.json");
            if path.exists() {
                persist::read_json(&path)?
            } else {
                fresh_snapshot()
            }
        }
        None => fresh_snapshot(),
    };

    let rows: Vec<_> = if args.all {
        persisted.global_opts.iter().chain(persisted.project_opts.iter()).collect()
    } else {
        persisted.global_opts.iter().collect()
    };

    if args.machine_readable {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for opt in rows {
            println!("{:<20} {:<10} {}", opt.name, opt.value, opt.source);
        }
    }
    Ok(())
}

fn fresh_snapshot() -> PersistedOptions {
    let table = OptionTable::with_standard_options();
    PersistedOptions::from_table(&table, STANDARD_OPTION_NAMES)
}
