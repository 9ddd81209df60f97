//! `kiln internal {eval,repl,exe,check,dump_funcs,dump_docs,dump_toolchains}`:
//! the driver's low-level escape hatches onto the interpreter core, mirrored
//! after Meson's own `--internal` front door.

use std::io::{BufRead, Write};

use colored::Colorize;
use kiln_compiler::{Chunk, Compiler, Opcode};
use kiln_syntax::{Ast, LexMode, Node, NodeId, Parser};
use kiln_vm::{ops, Vm};

use crate::cli::InternalAction;
use crate::error::{CliError, CliResult};
use crate::eval;

pub fn run(action: InternalAction) -> CliResult<()> {
    match action {
        InternalAction::Eval { file, args: _ } => eval_cmd(&file),
        InternalAction::Repl => repl(),
        InternalAction::Exe { feed, capture, envfile, argsfile, argv } => exe(feed, capture, envfile, argsfile, argv),
        InternalAction::Check { file } => check(&file),
        InternalAction::DumpFuncs => dump_funcs(),
        InternalAction::DumpDocs => Err(CliError::NotImplemented("internal dump_docs")),
        InternalAction::DumpToolchains => Err(CliError::NotImplemented("internal dump_toolchains")),
    }
}

fn eval_cmd(file: &str) -> CliResult<()> {
    let run = eval::eval_file(file)?;
    println!("{}", ops::display(&run.vm.store, &run.vm.strings, run.result));
    if run.vm.diagnostics.has_errors() {
        return Err(CliError::DiagnosedErrors);
    }
    Ok(())
}

/// One line in, one result out, variables carried forward the way a
/// REPL's users expect `x = 1` on one line to still be visible on the
/// next — threaded through [`Vm::run_unit_in_scope`] rather than
/// reseeding globals (and losing every earlier assignment) per line.
fn repl() -> CliResult<()> {
    let mut vm = Vm::new();
    let mut sources = kiln_diagnostics::SourceTable::new();
    let mut scope = vm.seeded_scope();
    let stdin = std::io::stdin();
    print!("> ");
    std::io::stdout().flush()?;
    for (lineno, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            print!("> ");
            std::io::stdout().flush()?;
            continue;
        }
        let path = format!("<repl:{}>", lineno + 1);
        let source_id = sources.add(&path, &line);
        match Parser::new(&line, LexMode::Normal).parse() {
            Ok((root, ast)) => match Compiler::compile(&ast, root, &mut vm.store, &mut vm.strings, source_id) {
                Ok(unit) => match vm.run_unit_in_scope(unit, scope.clone()) {
                    Ok((value, new_scope)) => {
                        scope = new_scope;
                        println!("{}", ops::display(&vm.store, &vm.strings, value));
                    }
                    Err(err) => println!("{}", format!("error: {err}").red()),
                },
                Err(err) => println!("{}", format!("error: {err}").red()),
            },
            Err(err) => println!("{}", format!("error: {err}").red()),
        }
        if !vm.diagnostics.has_errors() {
            print!("> ");
            std::io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Runs a subprocess the way the reference implementation's internal `exe`
/// wrapper does: optional stdin feed, optional captured-stdout file,
/// optional extra environment/argument files, child's exit status
/// propagated verbatim (0/1 mapping doesn't apply here — the point of
/// `exe` is to forward whatever the child actually returned).
fn exe(feed: Option<String>, capture: Option<String>, envfile: Option<String>, argsfile: Option<String>, mut argv: Vec<String>) -> CliResult<()> {
    if let Some(argsfile) = &argsfile {
        let text = std::fs::read_to_string(argsfile)?;
        argv.extend(text.lines().map(str::to_string));
    }
    let Some((program, rest)) = argv.split_first() else {
        return Err(CliError::Usage("internal exe: no command given".to_string()));
    };

    let mut command = std::process::Command::new(program);
    command.args(rest);

    if let Some(envfile) = &envfile {
        let text = std::fs::read_to_string(envfile)?;
        for line in text.lines() {
            if let Some((key, value)) = line.split_once('=') {
                command.env(key, value);
            }
        }
    }

    if let Some(feed) = &feed {
        command.stdin(std::fs::File::open(feed)?);
    }
    if capture.is_some() {
        command.stdout(std::process::Stdio::piped());
    }

    let output = command.output()?;
    if let Some(capture) = &capture {
        std::fs::write(capture, &output.stdout)?;
    } else {
        std::io::stdout().write_all(&output.stdout)?;
    }
    std::io::stderr().write_all(&output.stderr)?;

    std::process::exit(output.status.code().unwrap_or(1));
}

fn check(file: &str) -> CliResult<()> {
    let text = std::fs::read_to_string(file)?;
    let (root, ast) = Parser::new(&text, LexMode::Normal).parse()?;
    println!("{}", "== ast ==".cyan().bold());
    dump_node(&ast, root, 0);

    let mut store = kiln_collections::ObjectStore::new();
    let mut strings = kiln_collections::StringInterner::new();
    let mut sources = kiln_diagnostics::SourceTable::new();
    let source_id = sources.add(file, &text);
    let unit = Compiler::compile(&ast, root, &mut store, &mut strings, source_id)?;
    println!();
    println!("{}", disassemble(&unit.chunk, "<module>"));
    for func in &unit.functions {
        println!("{}", disassemble(&func.chunk, &func.name));
    }
    Ok(())
}

fn dump_node(ast: &Ast, id: NodeId, depth: usize) {
    if id.is_none() {
        return;
    }
    let node: &Node = ast.get(id);
    let indent = "  ".repeat(depth);
    println!("{indent}{:?} @{}  {:?}", node.kind, node.offset, node.data);
    dump_node(ast, node.left, depth + 1);
    dump_node(ast, node.mid, depth + 1);
    dump_node(ast, node.right, depth + 1);
    for child in &node.extra {
        dump_node(ast, *child, depth + 1);
    }
}

fn disassemble(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {name} ==\n");
    let mut ip = 0usize;
    while ip < chunk.code.len() {
        let byte = chunk.code[ip];
        let Some(op) = Opcode::from_u8(byte) else {
            out.push_str(&format!("{ip:>6}  <unknown opcode {byte}>\n"));
            ip += 1;
            continue;
        };
        let operand_count = op.operand_count() as usize;
        let mut operands = Vec::with_capacity(operand_count);
        for i in 0..operand_count {
            operands.push(chunk.read_u24(ip + 1 + i * 3));
        }
        if operands.is_empty() {
            out.push_str(&format!("{ip:>6}  {op:?}\n"));
        } else {
            out.push_str(&format!("{ip:>6}  {op:?} {operands:?}\n"));
        }
        ip += 1 + operand_count * 3;
    }
    out
}

fn dump_funcs() -> CliResult<()> {
    let vm = Vm::new();
    let mut names: Vec<_> = vm.builtin_names().collect();
    names.sort_unstable();
    for name in names {
        println!("{name}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disassemble_walks_every_instruction_without_misaligning_on_operands() {
        let mut chunk = Chunk::new();
        chunk.emit(Opcode::Constant, &[7]);
        chunk.emit_op(Opcode::Pop);
        chunk.emit(Opcode::Jmp, &[0]);
        let text = disassemble(&chunk, "<module>");
        assert!(text.contains("== <module> =="));
        assert!(text.contains("Constant"));
        assert!(text.contains("Pop"));
        assert!(text.contains("Jmp"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn dump_node_does_not_recurse_on_a_none_child() {
        let mut ast = Ast::new();
        let root = ast.push(Node::new(kiln_syntax::NodeKind::Literal, 0));
        dump_node(&ast, root, 0);
        dump_node(&ast, NodeId::NONE, 0);
    }
}
