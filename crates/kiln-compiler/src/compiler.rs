//! Walks a [`kiln_syntax::Ast`] and emits a [`Chunk`] per function (plus one
//! for the top-level script), allocating literal constants directly into
//! the shared [`ObjectStore`]/[`StringInterner`] the VM will later run
//! against.
//!
//! Parameter type annotations are carried through as plain strings on
//! [`ParamProto`] rather than resolved to a [`kiln_types::TypeTag`] here:
//! that resolution needs a name → type registry (built-in type names,
//! enum/preset lookups) that belongs to the function-registration step in
//! `kiln-vm`, not to this crate. `pop_args` is where the actual
//! `kiln_types::typecheck` call happens; the bytecode `typecheck` opcode is
//! reserved for explicit runtime assertions this compiler does not itself
//! emit.

use std::collections::HashMap;

use kiln_collections::{ObjectHandle, ObjectStore, StringInterner};
use kiln_diagnostics::SourceId;
use kiln_syntax::{Ast, FStringPart, NodeData, NodeId, NodeKind};
use thiserror::Error;

use crate::chunk::Chunk;
use crate::opcode::{store_flags, Opcode};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("invalid assignment target at offset {offset}")]
    InvalidAssignmentTarget { offset: usize },
}

#[derive(Debug, Clone)]
pub struct ParamProto {
    pub name: String,
    pub type_name: Option<String>,
}

#[derive(Debug)]
pub struct FunctionProto {
    pub name: String,
    pub params: Vec<ParamProto>,
    pub chunk: Chunk,
}

/// Everything `compile_program` produces: the top-level chunk plus every
/// nested function's chunk, indexed by the `constant_func` operand that
/// references it.
#[derive(Debug)]
pub struct CompiledUnit {
    pub chunk: Chunk,
    pub functions: Vec<FunctionProto>,
}

pub struct Compiler<'a> {
    ast: &'a Ast,
    store: &'a mut ObjectStore,
    strings: &'a mut StringInterner,
    source: SourceId,
    chunk: Chunk,
    functions: Vec<FunctionProto>,
    str_consts: HashMap<String, ObjectHandle>,
    num_consts: HashMap<i64, ObjectHandle>,
    /// One break-patch list per enclosing loop; a `break` statement pushes
    /// its jump's patch offset onto the innermost list.
    break_patches: Vec<Vec<usize>>,
    /// One `iterator_next` offset per enclosing loop, the jump target for
    /// `continue`.
    continue_targets: Vec<usize>,
}

impl<'a> Compiler<'a> {
    pub fn compile(
        ast: &'a Ast,
        root: NodeId,
        store: &'a mut ObjectStore,
        strings: &'a mut StringInterner,
        source: SourceId,
    ) -> Result<CompiledUnit, CompileError> {
        let mut compiler = Self {
            ast,
            store,
            strings,
            source,
            chunk: Chunk::new(),
            functions: Vec::new(),
            str_consts: HashMap::new(),
            num_consts: HashMap::new(),
            break_patches: Vec::new(),
            continue_targets: Vec::new(),
        };
        compiler.compile_statement(root)?;
        compiler.chunk.emit_op(Opcode::ReturnEnd);
        tracing::debug!(bytes = compiler.chunk.len(), functions = compiler.functions.len(), "compiled to bytecode");
        Ok(CompiledUnit { chunk: compiler.chunk, functions: compiler.functions })
    }

    fn mark(&mut self, id: NodeId) {
        let offset = self.ast.get(id).offset;
        self.chunk.mark(self.source, offset);
    }

    fn const_str(&mut self, s: &str) -> u32 {
        if let Some(h) = self.str_consts.get(s) {
            return h.0;
        }
        let sh = self.strings.make_str(s);
        let handle = self.store.alloc_str(sh);
        self.str_consts.insert(s.to_string(), handle);
        handle.0
    }

    fn const_num(&mut self, n: i64) -> u32 {
        if let Some(h) = self.num_consts.get(&n) {
            return h.0;
        }
        let handle = self.store.alloc_num(n);
        self.num_consts.insert(n, handle);
        handle.0
    }

    fn emit_load_const_str(&mut self, s: &str) {
        let k = self.const_str(s);
        self.chunk.emit(Opcode::Constant, &[k]);
    }

    // --- statements ---

    fn compile_statement(&mut self, id: NodeId) -> Result<(), CompileError> {
        self.mark(id);
        let node = self.ast.get(id);
        match node.kind {
            NodeKind::Block => {
                let stmts = node.extra.clone();
                for stmt in stmts {
                    self.compile_statement(stmt)?;
                }
                Ok(())
            }
            NodeKind::If => {
                let branch = node.left;
                self.chunk.emit_op(Opcode::AzBranch);
                self.compile_if_branch(branch)?;
                self.chunk.emit_op(Opcode::AzMerge);
                Ok(())
            }
            NodeKind::Foreach => self.compile_foreach(id),
            NodeKind::Break => {
                let at = self.chunk.emit(Opcode::Jmp, &[0]);
                self.break_patches.last_mut().expect("break only parses inside a loop").push(at + 1);
                Ok(())
            }
            NodeKind::Continue => {
                let target = *self.continue_targets.last().expect("continue only parses inside a loop");
                self.chunk.emit(Opcode::Jmp, &[target as u32]);
                Ok(())
            }
            NodeKind::FuncDef => self.compile_func_def(id),
            NodeKind::Return => {
                let value = node.left;
                if value.is_none() {
                    self.emit_load_const_str("");
                } else {
                    self.compile_expr(value)?;
                }
                self.chunk.emit_op(Opcode::Return);
                Ok(())
            }
            _ => {
                self.compile_expr(id)?;
                self.chunk.emit_op(Opcode::Pop);
                Ok(())
            }
        }
    }

    fn compile_if_branch(&mut self, id: NodeId) -> Result<(), CompileError> {
        let node = self.ast.get(id);
        let cond = node.left;
        let then_block = node.mid;
        let tail = node.right;

        self.compile_expr(cond)?;
        let false_patch = self.chunk.emit(Opcode::JmpIfFalse, &[0]);
        self.compile_statement(then_block)?;

        if tail.is_none() {
            let here = self.chunk.len() as u32;
            self.chunk.patch_u24(false_patch + 1, here);
            return Ok(());
        }

        let end_patch = self.chunk.emit(Opcode::Jmp, &[0]);
        let here = self.chunk.len() as u32;
        self.chunk.patch_u24(false_patch + 1, here);

        if self.ast.get(tail).kind == NodeKind::IfBranch {
            self.compile_if_branch(tail)?;
        } else {
            self.compile_statement(tail)?;
        }

        let here = self.chunk.len() as u32;
        self.chunk.patch_u24(end_patch + 1, here);
        Ok(())
    }

    fn compile_foreach(&mut self, id: NodeId) -> Result<(), CompileError> {
        let node = self.ast.get(id);
        let iterable = node.left;
        let body = node.mid;
        let vars: Vec<String> = match &node.data {
            NodeData::FString(parts) => parts
                .iter()
                .map(|p| match p {
                    FStringPart::Interpolation(name) => name.clone(),
                    FStringPart::Literal(s) => s.clone(),
                })
                .collect(),
            _ => Vec::new(),
        };

        self.compile_expr(iterable)?;
        self.chunk.emit(Opcode::Iterator, &[vars.len() as u32]);

        let next_at = self.chunk.len();
        let break_patch = self.chunk.emit(Opcode::IteratorNext, &[0]);

        for name in vars.iter().rev() {
            let k = self.const_str(name);
            self.chunk.emit(Opcode::Store, &[store_flags::PLAIN, k]);
        }

        self.break_patches.push(Vec::new());
        self.continue_targets.push(next_at);
        self.compile_statement(body)?;
        let patches = self.break_patches.pop().expect("pushed above");
        self.continue_targets.pop();

        self.chunk.emit(Opcode::Jmp, &[next_at as u32]);

        let here = self.chunk.len() as u32;
        self.chunk.patch_u24(break_patch + 1, here);
        for patch in patches {
            self.chunk.patch_u24(patch, here);
        }
        // The iterator object itself is still on the stack under the loop;
        // every exit path (natural exhaustion or `break`) lands here.
        self.chunk.emit_op(Opcode::Pop);
        Ok(())
    }

    fn compile_func_def(&mut self, id: NodeId) -> Result<(), CompileError> {
        let node = self.ast.get(id);
        let name = match &node.data {
            NodeData::Identifier(n) => n.clone(),
            _ => String::new(),
        };
        let params_id = node.left;
        let body = node.mid;

        let params_node = self.ast.get(params_id);
        let param_ids = params_node.extra.clone();
        let mut params = Vec::with_capacity(param_ids.len());
        for pid in &param_ids {
            let p = self.ast.get(*pid);
            let pname = match &p.data {
                NodeData::Identifier(n) => n.clone(),
                _ => String::new(),
            };
            let type_name = if p.left.is_none() {
                None
            } else {
                match &self.ast.get(p.left).data {
                    NodeData::Identifier(n) => Some(n.clone()),
                    _ => None,
                }
            };
            params.push(ParamProto { name: pname, type_name });
        }

        let (func_chunk, nested_functions) = {
            let mut sub = Compiler {
                ast: self.ast,
                store: &mut *self.store,
                strings: &mut *self.strings,
                source: self.source,
                chunk: Chunk::new(),
                functions: Vec::new(),
                str_consts: self.str_consts.clone(),
                num_consts: self.num_consts.clone(),
                break_patches: Vec::new(),
                continue_targets: Vec::new(),
            };
            sub.compile_statement(body)?;
            sub.chunk.emit_op(Opcode::ReturnEnd);
            (sub.chunk, sub.functions)
        };
        self.functions.extend(nested_functions);

        self.functions.push(FunctionProto { name: name.clone(), params, chunk: func_chunk });
        let func_idx = (self.functions.len() - 1) as u32;

        self.chunk.emit(Opcode::ConstantDict, &[0]); // empty defaults dict
        self.chunk.emit(Opcode::ConstantFunc, &[func_idx]);
        let k = self.const_str(&name);
        self.chunk.emit(Opcode::Store, &[store_flags::PLAIN, k]);
        Ok(())
    }

    // --- expressions ---

    fn compile_expr(&mut self, id: NodeId) -> Result<(), CompileError> {
        self.mark(id);
        let node = self.ast.get(id);
        match node.kind {
            NodeKind::Literal => {
                match node.data.clone() {
                    NodeData::Number(text) => {
                        let value = parse_number(&text);
                        let k = self.const_num(value);
                        self.chunk.emit(Opcode::Constant, &[k]);
                    }
                    NodeData::String(text) => self.emit_load_const_str(&text),
                    NodeData::Bool(b) => {
                        let handle = if b { ObjectHandle::TRUE } else { ObjectHandle::FALSE };
                        self.chunk.emit(Opcode::Constant, &[handle.0]);
                    }
                    NodeData::FString(parts) => self.compile_fstring(&parts),
                    NodeData::Identifier(_) | NodeData::None => unreachable!("literal node without literal data"),
                }
                Ok(())
            }
            NodeKind::Identifier => {
                let name = match &node.data {
                    NodeData::Identifier(n) => n.clone(),
                    _ => unreachable!("identifier node without a name"),
                };
                let k = self.const_str(&name);
                self.chunk.emit(Opcode::Load, &[k]);
                Ok(())
            }
            NodeKind::ArrayLit => {
                let items = node.extra.clone();
                let n = items.len() as u32;
                for item in items {
                    self.compile_expr(item)?;
                }
                self.chunk.emit(Opcode::ConstantList, &[n]);
                Ok(())
            }
            NodeKind::DictLit => {
                let pairs = node.extra.clone();
                let n = pairs.len() as u32;
                for pair in pairs {
                    let kv = self.ast.get(pair);
                    let (key, value) = (kv.left, kv.right);
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.chunk.emit(Opcode::ConstantDict, &[n]);
                Ok(())
            }
            NodeKind::UnaryNot => {
                self.compile_expr(node.left)?;
                self.chunk.emit_op(Opcode::Not);
                Ok(())
            }
            NodeKind::UnaryNeg => {
                self.compile_expr(node.left)?;
                self.chunk.emit_op(Opcode::Negate);
                Ok(())
            }
            NodeKind::BinaryAnd => self.compile_and(node.left, node.right),
            NodeKind::BinaryOr => self.compile_or(node.left, node.right),
            NodeKind::BinaryAdd
            | NodeKind::BinarySub
            | NodeKind::BinaryMul
            | NodeKind::BinaryDiv
            | NodeKind::BinaryMod
            | NodeKind::BinaryEq
            | NodeKind::BinaryNeq
            | NodeKind::BinaryGt
            | NodeKind::BinaryGeq
            | NodeKind::BinaryLt
            | NodeKind::BinaryLeq
            | NodeKind::BinaryIn
            | NodeKind::BinaryNotIn => {
                let (left, right, kind) = (node.left, node.right, node.kind);
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.chunk.emit_op(binary_opcode(kind));
                Ok(())
            }
            NodeKind::Ternary => {
                let (cond, then_value, else_value) = (node.left, node.mid, node.right);
                self.compile_expr(cond)?;
                let false_patch = self.chunk.emit(Opcode::JmpIfFalse, &[0]);
                self.compile_expr(then_value)?;
                let end_patch = self.chunk.emit(Opcode::Jmp, &[0]);
                let here = self.chunk.len() as u32;
                self.chunk.patch_u24(false_patch + 1, here);
                self.compile_expr(else_value)?;
                let here = self.chunk.len() as u32;
                self.chunk.patch_u24(end_patch + 1, here);
                Ok(())
            }
            NodeKind::Assign
            | NodeKind::PlusAssign
            | NodeKind::MinusAssign
            | NodeKind::StarAssign
            | NodeKind::SlashAssign
            | NodeKind::ModuloAssign => self.compile_assign(id),
            NodeKind::Index => {
                let (left, right) = (node.left, node.right);
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.chunk.emit_op(Opcode::Index);
                Ok(())
            }
            NodeKind::Member => {
                let left = node.left;
                let name = match &node.data {
                    NodeData::Identifier(n) => n.clone(),
                    _ => String::new(),
                };
                self.compile_expr(left)?;
                let k = self.const_str(&name);
                self.chunk.emit(Opcode::Member, &[k]);
                Ok(())
            }
            NodeKind::Call => self.compile_call(id),
            other => unreachable!("node kind {other:?} is not a compilable expression"),
        }
    }

    fn compile_and(&mut self, left: NodeId, right: NodeId) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        self.chunk.emit_op(Opcode::Dup);
        let short_circuit = self.chunk.emit(Opcode::JmpIfFalse, &[0]);
        self.chunk.emit_op(Opcode::Pop);
        self.compile_expr(right)?;
        let here = self.chunk.len() as u32;
        self.chunk.patch_u24(short_circuit + 1, here);
        Ok(())
    }

    fn compile_or(&mut self, left: NodeId, right: NodeId) -> Result<(), CompileError> {
        self.compile_expr(left)?;
        self.chunk.emit_op(Opcode::Dup);
        let short_circuit = self.chunk.emit(Opcode::JmpIfTrue, &[0]);
        self.chunk.emit_op(Opcode::Pop);
        self.compile_expr(right)?;
        let here = self.chunk.len() as u32;
        self.chunk.patch_u24(short_circuit + 1, here);
        Ok(())
    }

    fn compile_fstring(&mut self, parts: &[FStringPart]) {
        self.emit_load_const_str("");
        for part in parts {
            match part {
                FStringPart::Literal(text) => self.emit_load_const_str(text),
                FStringPart::Interpolation(name) => {
                    let k = self.const_str(name);
                    self.chunk.emit(Opcode::Load, &[k]);
                    self.chunk.emit_op(Opcode::Stringify);
                }
            }
            self.chunk.emit_op(Opcode::Add);
        }
    }

    fn compile_call(&mut self, id: NodeId) -> Result<(), CompileError> {
        let node = self.ast.get(id);
        let callee = node.left;
        let method_name = match &node.data {
            NodeData::Identifier(n) => Some(n.clone()),
            _ => None,
        };
        let args = node.extra.clone();

        self.compile_expr(callee)?;
        if let Some(name) = method_name {
            let k = self.const_str(&name);
            self.chunk.emit(Opcode::Member, &[k]);
        }

        let mut nargs = 0u32;
        let mut nkwargs = 0u32;
        for arg in args {
            let arg_node = self.ast.get(arg);
            if arg_node.kind == NodeKind::KwArg {
                let key = match &arg_node.data {
                    NodeData::Identifier(n) => n.clone(),
                    _ => String::new(),
                };
                let value = arg_node.left;
                self.compile_expr(value)?;
                self.emit_load_const_str(&key);
                nkwargs += 1;
            } else {
                self.compile_expr(arg)?;
                nargs += 1;
            }
        }
        self.chunk.emit(Opcode::Call, &[nargs, nkwargs]);
        Ok(())
    }

    fn compile_assign(&mut self, id: NodeId) -> Result<(), CompileError> {
        let node = self.ast.get(id);
        let kind = node.kind;
        let lhs = node.left;
        let rhs = node.right;

        match kind {
            NodeKind::Assign => self.compile_expr(rhs)?,
            NodeKind::PlusAssign | NodeKind::MinusAssign | NodeKind::StarAssign | NodeKind::SlashAssign | NodeKind::ModuloAssign => {
                self.compile_expr(lhs)?;
                self.compile_expr(rhs)?;
                let op = match kind {
                    NodeKind::PlusAssign => Opcode::Add,
                    NodeKind::MinusAssign => Opcode::Sub,
                    NodeKind::StarAssign => Opcode::Mul,
                    NodeKind::SlashAssign => Opcode::Div,
                    NodeKind::ModuloAssign => Opcode::Mod,
                    _ => unreachable!(),
                };
                self.chunk.emit_op(op);
            }
            _ => unreachable!("compile_assign called on non-assignment node"),
        }

        self.chunk.emit_op(Opcode::Dup);
        self.store_to_lvalue(lhs)
    }

    fn store_to_lvalue(&mut self, lhs: NodeId) -> Result<(), CompileError> {
        let lhs_node = self.ast.get(lhs);
        match lhs_node.kind {
            NodeKind::Identifier => {
                let name = match &lhs_node.data {
                    NodeData::Identifier(n) => n.clone(),
                    _ => unreachable!(),
                };
                let k = self.const_str(&name);
                self.chunk.emit(Opcode::Store, &[store_flags::PLAIN, k]);
                Ok(())
            }
            NodeKind::Member => {
                let container = lhs_node.left;
                let name = match &lhs_node.data {
                    NodeData::Identifier(n) => n.clone(),
                    _ => String::new(),
                };
                self.compile_expr(container)?;
                self.emit_load_const_str(&name);
                self.chunk.emit(Opcode::Store, &[store_flags::MEMBER, 0]);
                Ok(())
            }
            NodeKind::Index => {
                let container = lhs_node.left;
                let key = lhs_node.right;
                self.compile_expr(container)?;
                self.compile_expr(key)?;
                self.chunk.emit_op(Opcode::IndexSet);
                Ok(())
            }
            _ => Err(CompileError::InvalidAssignmentTarget { offset: lhs_node.offset }),
        }
    }
}

fn binary_opcode(kind: NodeKind) -> Opcode {
    match kind {
        NodeKind::BinaryAdd => Opcode::Add,
        NodeKind::BinarySub => Opcode::Sub,
        NodeKind::BinaryMul => Opcode::Mul,
        NodeKind::BinaryDiv => Opcode::Div,
        NodeKind::BinaryMod => Opcode::Mod,
        NodeKind::BinaryEq => Opcode::Eq,
        NodeKind::BinaryNeq => Opcode::Neq,
        NodeKind::BinaryGt => Opcode::Gt,
        NodeKind::BinaryGeq => Opcode::Geq,
        NodeKind::BinaryLt => Opcode::Lt,
        NodeKind::BinaryLeq => Opcode::Leq,
        NodeKind::BinaryIn => Opcode::In,
        NodeKind::BinaryNotIn => Opcode::NotIn,
        other => unreachable!("{other:?} is not a binary opcode"),
    }
}

/// Parses a lexed number literal's raw text (`0x..`/`0o..`/`0b..`/decimal)
/// into its value. The lexer only ever hands the parser digits it already
/// validated, so this does not need to return a `Result`.
fn parse_number(text: &str) -> i64 {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).unwrap_or(0);
    }
    if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        return i64::from_str_radix(oct, 8).unwrap_or(0);
    }
    if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        return i64::from_str_radix(bin, 2).unwrap_or(0);
    }
    text.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_syntax::{LexMode, Parser};

    fn compile(src: &str) -> (CompiledUnit, ObjectStore) {
        let (root, ast) = Parser::new(src, LexMode::Normal).parse().expect("parses");
        let mut store = ObjectStore::new();
        let mut strings = StringInterner::new();
        let source = SourceId::from_raw(0);
        let unit = Compiler::compile(&ast, root, &mut store, &mut strings, source).expect("compiles");
        (unit, store)
    }

    #[test]
    fn compiles_a_simple_call() {
        let (unit, _store) = compile("executable('a', 'b.c')\n");
        assert!(unit.chunk.code.contains(&(Opcode::Call as u8)));
        assert!(unit.chunk.code.contains(&(Opcode::Load as u8)));
    }

    #[test]
    fn compiles_assignment_and_reload() {
        let (unit, _store) = compile("x = 1\ny = x + 2\n");
        assert!(unit.chunk.code.contains(&(Opcode::Store as u8)));
        assert!(unit.chunk.code.contains(&(Opcode::Add as u8)));
    }

    #[test]
    fn compiles_if_with_else() {
        let (unit, _store) = compile("if a\n  b()\nelse\n  c()\nendif\n");
        assert!(unit.chunk.code.contains(&(Opcode::JmpIfFalse as u8)));
        assert!(unit.chunk.code.contains(&(Opcode::Jmp as u8)));
    }

    #[test]
    fn compiles_foreach_with_iterator_opcodes() {
        let (unit, _store) = compile("foreach v : arr\n  message(v)\nendforeach\n");
        assert!(unit.chunk.code.contains(&(Opcode::Iterator as u8)));
        assert!(unit.chunk.code.contains(&(Opcode::IteratorNext as u8)));
    }

    #[test]
    fn compiles_function_def_into_a_separate_chunk() {
        let (unit, _store) = compile("func add(a int, b int) int\n  return a + b\nendfunc\n");
        assert_eq!(unit.functions.len(), 1);
        assert_eq!(unit.functions[0].name, "add");
        assert_eq!(unit.functions[0].params.len(), 2);
        assert!(unit.functions[0].chunk.code.contains(&(Opcode::Return as u8)));
    }

    #[test]
    fn invalid_assignment_target_is_rejected() {
        let (root, ast) = Parser::new("1 = 2\n", LexMode::Normal).parse().expect("parses");
        let mut store = ObjectStore::new();
        let mut strings = StringInterner::new();
        let err = Compiler::compile(&ast, root, &mut store, &mut strings, SourceId::from_raw(0)).unwrap_err();
        assert!(matches!(err, CompileError::InvalidAssignmentTarget { .. }));
    }
}
