//! Recursive-descent parser over a [`Lexer`] token stream.

use kiln_diagnostics::{Diagnostic, Level, SourceId};
use thiserror::Error;

use crate::ast::{Ast, FStringPart, Node, NodeData, NodeId, NodeKind};
use crate::lexer::{LexMode, Lexer};
use crate::token::{Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token at offset {offset}: expected {expected}, found {found:?}")]
    Unexpected { offset: usize, expected: &'static str, found: TokenKind },
    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid number literal '{text}' at offset {offset}")]
    InvalidNumber { offset: usize, text: String },
    #[error("break/continue outside a loop at offset {offset}")]
    JumpOutsideLoop { offset: usize },
}

impl ParseError {
    #[must_use]
    pub fn offset(&self) -> usize {
        match *self {
            Self::Unexpected { offset, .. }
            | Self::UnterminatedString { offset }
            | Self::InvalidNumber { offset, .. }
            | Self::JumpOutsideLoop { offset } => offset,
        }
    }

    /// Converts into a located [`Diagnostic`] against `source`, the form
    /// every caller that owns a `DiagnosticStore` actually wants.
    #[must_use]
    pub fn into_diagnostic(self, source: SourceId) -> Diagnostic {
        let offset = self.offset();
        Diagnostic::new(Level::Error, source, offset, self.to_string())
    }
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    ast: Ast,
    current: Token,
    mode: LexMode,
    loop_depth: u32,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(src: &'a str, mode: LexMode) -> Self {
        let mut lexer = Lexer::new(src, mode);
        let current = lexer.next_token();
        Self { lexer, ast: Ast::new(), current, mode, loop_depth: 0 }
    }

    fn bump(&mut self) -> Token {
        let next = loop {
            let tok = self.lexer.next_token();
            if tok.kind == TokenKind::Eol {
                // Statement boundaries are handled explicitly by callers
                // that want them (`parse_block`); expression parsing skips
                // over stray EOLs the caller doesn't expect.
                continue;
            }
            break tok;
        };
        std::mem::replace(&mut self.current, next)
    }

    /// Like `bump`, but does not skip EOLs — used inside `parse_block`
    /// where statement separators matter.
    fn bump_raw(&mut self) -> Token {
        let next = self.lexer.next_token();
        std::mem::replace(&mut self.current, next)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, ParseError> {
        if self.current.kind == kind {
            Ok(self.bump())
        } else {
            Err(ParseError::Unexpected { offset: self.current.offset, expected, found: self.current.kind })
        }
    }

    /// Parses a whole source file into `(root_node, ast)`.
    pub fn parse(mut self) -> Result<(NodeId, Ast), ParseError> {
        self.skip_leading_eols_raw();
        let root = self.parse_block(&[TokenKind::Eof])?;
        Ok((root, self.ast))
    }

    fn skip_leading_eols_raw(&mut self) {
        while self.current.kind == TokenKind::Eol {
            self.bump_raw();
        }
    }

    /// Parses statements until one of `terminators` is the current token
    /// (which is left unconsumed for the caller to check/consume).
    fn parse_block(&mut self, terminators: &[TokenKind]) -> Result<NodeId, ParseError> {
        let start = self.current.offset;
        let mut stmts = Vec::new();
        loop {
            self.skip_leading_eols_raw();
            if terminators.contains(&self.current.kind) {
                break;
            }
            if self.current.kind == TokenKind::Eof {
                break;
            }
            let stmt = self.parse_statement()?;
            stmts.push(stmt);
            // A statement ends at EOL or a terminator; consume trailing EOLs.
            while self.current.kind == TokenKind::Eol {
                self.bump_raw();
            }
        }
        let mut node = Node::new(NodeKind::Block, start);
        node.extra = stmts;
        Ok(self.ast.push(node))
    }

    fn parse_statement(&mut self) -> Result<NodeId, ParseError> {
        match self.current.kind {
            TokenKind::If => self.parse_if(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::Break => {
                let offset = self.current.offset;
                if self.loop_depth == 0 {
                    return Err(ParseError::JumpOutsideLoop { offset });
                }
                self.bump();
                Ok(self.ast.push(Node::new(NodeKind::Break, offset)))
            }
            TokenKind::Continue => {
                let offset = self.current.offset;
                if self.loop_depth == 0 {
                    return Err(ParseError::JumpOutsideLoop { offset });
                }
                self.bump();
                Ok(self.ast.push(Node::new(NodeKind::Continue, offset)))
            }
            TokenKind::Func if self.mode == LexMode::Extended || self.mode == LexMode::Format => self.parse_func_def(),
            TokenKind::Return if self.mode == LexMode::Extended || self.mode == LexMode::Format => {
                let offset = self.current.offset;
                self.bump();
                let value = if matches!(self.current.kind, TokenKind::Eol | TokenKind::Eof) {
                    NodeId::NONE
                } else {
                    self.parse_expr()?
                };
                let mut node = Node::new(NodeKind::Return, offset);
                node.left = value;
                Ok(self.ast.push(node))
            }
            _ => self.parse_expr_or_assignment(),
        }
    }

    fn parse_expr_or_assignment(&mut self) -> Result<NodeId, ParseError> {
        let lhs = self.parse_expr()?;
        let assign_kind = match self.current.kind {
            TokenKind::Assign => Some(NodeKind::Assign),
            TokenKind::PlusAssign => Some(NodeKind::PlusAssign),
            TokenKind::MinusAssign => Some(NodeKind::MinusAssign),
            TokenKind::StarAssign => Some(NodeKind::StarAssign),
            TokenKind::SlashAssign => Some(NodeKind::SlashAssign),
            TokenKind::ModuloAssign => Some(NodeKind::ModuloAssign),
            _ => None,
        };
        let Some(kind) = assign_kind else { return Ok(lhs) };
        let offset = self.current.offset;
        self.bump();
        let rhs = self.parse_expr()?;
        let mut node = Node::new(kind, offset);
        node.left = lhs;
        node.right = rhs;
        Ok(self.ast.push(node))
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        let offset = self.current.offset;
        self.bump(); // `if`
        let cond = self.parse_expr()?;
        self.skip_leading_eols_raw();
        let then_block = self.parse_block(&[TokenKind::Elif, TokenKind::Else, TokenKind::Endif])?;

        let mut branch = Node::new(NodeKind::IfBranch, offset);
        branch.left = cond;
        branch.mid = then_block;

        if self.current.kind == TokenKind::Elif {
            branch.right = self.parse_if_tail()?;
        } else if self.current.kind == TokenKind::Else {
            self.bump();
            self.skip_leading_eols_raw();
            branch.right = self.parse_block(&[TokenKind::Endif])?;
        }
        self.expect(TokenKind::Endif, "endif")?;

        let mut node = Node::new(NodeKind::If, offset);
        node.left = self.ast.push(branch);
        Ok(self.ast.push(node))
    }

    /// `elif` chains are parsed as nested `IfBranch` nodes hanging off
    /// `right`, so `If` always has exactly one `IfBranch` child regardless
    /// of how many `elif`s follow.
    fn parse_if_tail(&mut self) -> Result<NodeId, ParseError> {
        let offset = self.current.offset;
        self.bump(); // `elif`
        let cond = self.parse_expr()?;
        self.skip_leading_eols_raw();
        let then_block = self.parse_block(&[TokenKind::Elif, TokenKind::Else, TokenKind::Endif])?;
        let mut branch = Node::new(NodeKind::IfBranch, offset);
        branch.left = cond;
        branch.mid = then_block;
        if self.current.kind == TokenKind::Elif {
            branch.right = self.parse_if_tail()?;
        } else if self.current.kind == TokenKind::Else {
            self.bump();
            self.skip_leading_eols_raw();
            branch.right = self.parse_block(&[TokenKind::Endif])?;
        }
        Ok(self.ast.push(branch))
    }

    fn parse_foreach(&mut self) -> Result<NodeId, ParseError> {
        let offset = self.current.offset;
        self.bump(); // `foreach`
        let mut vars = vec![self.expect(TokenKind::Identifier, "loop variable")?.text];
        while self.current.kind == TokenKind::Comma {
            self.bump();
            vars.push(self.expect(TokenKind::Identifier, "loop variable")?.text);
        }
        self.expect(TokenKind::Colon, "':'")?;
        let iterable = self.parse_expr()?;
        self.skip_leading_eols_raw();
        self.loop_depth += 1;
        let body = self.parse_block(&[TokenKind::Endforeach]);
        self.loop_depth -= 1;
        let body = body?;
        self.expect(TokenKind::Endforeach, "endforeach")?;

        let mut node = Node::new(NodeKind::Foreach, offset);
        node.left = iterable;
        node.mid = body;
        node.data = NodeData::FString(vars.into_iter().map(FStringPart::Interpolation).collect());
        Ok(self.ast.push(node))
    }

    fn parse_func_def(&mut self) -> Result<NodeId, ParseError> {
        let offset = self.current.offset;
        self.bump(); // `func`
        let name = self.expect(TokenKind::Identifier, "function name")?.text;
        self.expect(TokenKind::LParen, "'('")?;
        let mut params = Vec::new();
        while self.current.kind != TokenKind::RParen {
            let param_offset = self.current.offset;
            let param_name = self.expect(TokenKind::Identifier, "parameter name")?.text;
            let mut type_name = None;
            if self.current.kind == TokenKind::Identifier {
                // `name type` typed signature, teacher-grounded "extended
                // mode" syntax: no separator token, just adjacency.
                type_name = Some(self.bump().text);
            }
            let mut param = Node::new(NodeKind::FuncParam, param_offset);
            param.data = NodeData::Identifier(param_name);
            if let Some(ty) = type_name {
                param.left = self.ast.push({
                    let mut n = Node::new(NodeKind::Identifier, param_offset);
                    n.data = NodeData::Identifier(ty);
                    n
                });
            }
            params.push(self.ast.push(param));
            if self.current.kind == TokenKind::Comma {
                self.bump();
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.skip_leading_eols_raw();
        let body = self.parse_block(&[TokenKind::Endfunc])?;
        self.expect(TokenKind::Endfunc, "endfunc")?;

        let mut params_node = Node::new(NodeKind::FuncParams, offset);
        params_node.extra = params;

        let mut node = Node::new(NodeKind::FuncDef, offset);
        node.data = NodeData::Identifier(name);
        node.left = self.ast.push(params_node);
        node.mid = body;
        Ok(self.ast.push(node))
    }

    // --- expression parsing, precedence-climbing ---

    fn parse_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<NodeId, ParseError> {
        let cond = self.parse_or()?;
        if self.current.kind == TokenKind::Question {
            let offset = self.current.offset;
            self.bump();
            let then_value = self.parse_expr()?;
            self.expect(TokenKind::Colon, "':'")?;
            let else_value = self.parse_expr()?;
            let mut node = Node::new(NodeKind::Ternary, offset);
            node.left = cond;
            node.mid = then_value;
            node.right = else_value;
            return Ok(self.ast.push(node));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_and()?;
        while self.current.kind == TokenKind::Or {
            let offset = self.current.offset;
            self.bump();
            let rhs = self.parse_and()?;
            lhs = self.push_binary(NodeKind::BinaryOr, offset, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_not()?;
        while self.current.kind == TokenKind::And {
            let offset = self.current.offset;
            self.bump();
            let rhs = self.parse_not()?;
            lhs = self.push_binary(NodeKind::BinaryAnd, offset, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<NodeId, ParseError> {
        if self.current.kind == TokenKind::Not {
            let offset = self.current.offset;
            self.bump();
            let operand = self.parse_not()?;
            let mut node = Node::new(NodeKind::UnaryNot, offset);
            node.left = operand;
            return Ok(self.ast.push(node));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<NodeId, ParseError> {
        let lhs = self.parse_additive()?;
        let kind = match self.current.kind {
            TokenKind::Eq => Some(NodeKind::BinaryEq),
            TokenKind::Neq => Some(NodeKind::BinaryNeq),
            TokenKind::Gt => Some(NodeKind::BinaryGt),
            TokenKind::Geq => Some(NodeKind::BinaryGeq),
            TokenKind::Lt => Some(NodeKind::BinaryLt),
            TokenKind::Leq => Some(NodeKind::BinaryLeq),
            _ => None,
        };
        if let Some(kind) = kind {
            let offset = self.current.offset;
            self.bump();
            let rhs = self.parse_additive()?;
            return Ok(self.push_binary(kind, offset, lhs, rhs));
        }
        if self.current.kind == TokenKind::In {
            let offset = self.current.offset;
            self.bump();
            let rhs = self.parse_additive()?;
            return Ok(self.push_binary(NodeKind::BinaryIn, offset, lhs, rhs));
        }
        if self.current.kind == TokenKind::Not {
            // lookahead for `not in`
            let save_offset = self.current.offset;
            self.bump();
            if self.current.kind == TokenKind::In {
                self.bump();
                let rhs = self.parse_additive()?;
                return Ok(self.push_binary(NodeKind::BinaryNotIn, save_offset, lhs, rhs));
            }
            return Err(ParseError::Unexpected { offset: save_offset, expected: "'in' after 'not'", found: self.current.kind });
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let kind = match self.current.kind {
                TokenKind::Plus => NodeKind::BinaryAdd,
                TokenKind::Minus => NodeKind::BinarySub,
                _ => break,
            };
            let offset = self.current.offset;
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = self.push_binary(kind, offset, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<NodeId, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let kind = match self.current.kind {
                TokenKind::Star => NodeKind::BinaryMul,
                TokenKind::Slash => NodeKind::BinaryDiv,
                TokenKind::Modulo => NodeKind::BinaryMod,
                _ => break,
            };
            let offset = self.current.offset;
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = self.push_binary(kind, offset, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        if self.current.kind == TokenKind::Minus {
            let offset = self.current.offset;
            self.bump();
            let operand = self.parse_unary()?;
            let mut node = Node::new(NodeKind::UnaryNeg, offset);
            node.left = operand;
            return Ok(self.ast.push(node));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<NodeId, ParseError> {
        let mut node = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    let offset = self.current.offset;
                    self.bump();
                    let name = self.expect(TokenKind::Identifier, "member name")?;
                    let mut member = if self.current.kind == TokenKind::LParen {
                        self.parse_call_args(offset, name.text)?
                    } else {
                        let mut m = Node::new(NodeKind::Member, offset);
                        m.data = NodeData::Identifier(name.text);
                        m
                    };
                    member.left = node;
                    node = self.ast.push(member);
                }
                TokenKind::LBracket => {
                    let offset = self.current.offset;
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    let mut n = Node::new(NodeKind::Index, offset);
                    n.left = node;
                    n.right = index;
                    node = self.ast.push(n);
                }
                TokenKind::LParen => {
                    // Bare call, e.g. `message('x')`.
                    let offset = self.current.offset;
                    let callee = node;
                    let mut call = self.parse_call_args(offset, String::new())?;
                    call.left = callee;
                    node = self.ast.push(call);
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// Parses `'(' args ')'`, building a `Call` node with `data` set to the
    /// member/function name (empty when called through `left` as a plain
    /// identifier callee).
    fn parse_call_args(&mut self, offset: usize, name: String) -> Result<Node, ParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut positional = Vec::new();
        while self.current.kind != TokenKind::RParen {
            if self.current.kind == TokenKind::Identifier {
                // lookahead for `name: value` kwarg form
                let save = self.current.clone();
                let ident_offset = save.offset;
                self.bump();
                if self.current.kind == TokenKind::Colon {
                    self.bump();
                    let value = self.parse_expr()?;
                    let mut kw = Node::new(NodeKind::KwArg, ident_offset);
                    kw.data = NodeData::Identifier(save.text);
                    kw.left = value;
                    positional.push(self.ast.push(kw));
                    if self.current.kind == TokenKind::Comma {
                        self.bump();
                    }
                    continue;
                }
                // Not a kwarg after all; re-parse as a full expression
                // starting from the identifier we already consumed.
                let ident_node = {
                    let mut n = Node::new(NodeKind::Identifier, ident_offset);
                    n.data = NodeData::Identifier(save.text);
                    self.ast.push(n)
                };
                let expr = self.continue_postfix_from(ident_node)?;
                let expr = self.continue_binary_from(expr)?;
                positional.push(expr);
            } else {
                positional.push(self.parse_expr()?);
            }
            if self.current.kind == TokenKind::Comma {
                self.bump();
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        let mut node = Node::new(NodeKind::Call, offset);
        if !name.is_empty() {
            node.data = NodeData::Identifier(name);
        }
        node.extra = positional;
        Ok(node)
    }

    /// After speculatively consuming a bare identifier while probing for a
    /// `name:` kwarg, resumes postfix parsing (`.member`, `[index]`,
    /// `(call)`) on it so `foo.bar()` still works as an argument.
    fn continue_postfix_from(&mut self, mut node: NodeId) -> Result<NodeId, ParseError> {
        loop {
            match self.current.kind {
                TokenKind::Dot => {
                    let offset = self.current.offset;
                    self.bump();
                    let name = self.expect(TokenKind::Identifier, "member name")?;
                    let mut member = if self.current.kind == TokenKind::LParen {
                        self.parse_call_args(offset, name.text)?
                    } else {
                        let mut m = Node::new(NodeKind::Member, offset);
                        m.data = NodeData::Identifier(name.text);
                        m
                    };
                    member.left = node;
                    node = self.ast.push(member);
                }
                TokenKind::LBracket => {
                    let offset = self.current.offset;
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    let mut n = Node::new(NodeKind::Index, offset);
                    n.left = node;
                    n.right = index;
                    node = self.ast.push(n);
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// Resumes binary-operator parsing with `lhs` already parsed, covering
    /// the `name` identifier case inside call argument lists.
    fn continue_binary_from(&mut self, lhs: NodeId) -> Result<NodeId, ParseError> {
        let mut lhs = lhs;
        loop {
            let kind = match self.current.kind {
                TokenKind::Plus => NodeKind::BinaryAdd,
                TokenKind::Minus => NodeKind::BinarySub,
                TokenKind::Star => NodeKind::BinaryMul,
                TokenKind::Slash => NodeKind::BinaryDiv,
                TokenKind::Modulo => NodeKind::BinaryMod,
                TokenKind::Eq => NodeKind::BinaryEq,
                TokenKind::Neq => NodeKind::BinaryNeq,
                TokenKind::Gt => NodeKind::BinaryGt,
                TokenKind::Geq => NodeKind::BinaryGeq,
                TokenKind::Lt => NodeKind::BinaryLt,
                TokenKind::Leq => NodeKind::BinaryLeq,
                TokenKind::And => NodeKind::BinaryAnd,
                TokenKind::Or => NodeKind::BinaryOr,
                _ => break,
            };
            let offset = self.current.offset;
            self.bump();
            let rhs = self.parse_unary()?;
            let rhs = self.continue_postfix_from(rhs)?;
            lhs = self.push_binary(kind, offset, lhs, rhs);
        }
        Ok(lhs)
    }

    fn push_binary(&mut self, kind: NodeKind, offset: usize, lhs: NodeId, rhs: NodeId) -> NodeId {
        let mut node = Node::new(kind, offset);
        node.left = lhs;
        node.right = rhs;
        self.ast.push(node)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let tok = self.current.clone();
        match tok.kind {
            TokenKind::Number => {
                self.bump();
                let mut node = Node::new(NodeKind::Literal, tok.offset);
                node.data = NodeData::Number(tok.text);
                Ok(self.ast.push(node))
            }
            TokenKind::String => {
                self.bump();
                let mut node = Node::new(NodeKind::Literal, tok.offset);
                node.data = NodeData::String(unquote(&tok.text));
                Ok(self.ast.push(node))
            }
            TokenKind::FStringFragment | TokenKind::FStringInterpolation => {
                self.bump();
                let mut node = Node::new(NodeKind::Literal, tok.offset);
                node.data = NodeData::FString(parse_fstring_parts(&unquote(&tok.text)));
                Ok(self.ast.push(node))
            }
            TokenKind::True => {
                self.bump();
                let mut node = Node::new(NodeKind::Literal, tok.offset);
                node.data = NodeData::Bool(true);
                Ok(self.ast.push(node))
            }
            TokenKind::False => {
                self.bump();
                let mut node = Node::new(NodeKind::Literal, tok.offset);
                node.data = NodeData::Bool(false);
                Ok(self.ast.push(node))
            }
            TokenKind::Identifier => {
                self.bump();
                let mut node = Node::new(NodeKind::Identifier, tok.offset);
                node.data = NodeData::Identifier(tok.text);
                Ok(self.ast.push(node))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.bump();
                let mut items = Vec::new();
                while self.current.kind != TokenKind::RBracket {
                    items.push(self.parse_expr()?);
                    if self.current.kind == TokenKind::Comma {
                        self.bump();
                    }
                }
                self.expect(TokenKind::RBracket, "']'")?;
                let mut node = Node::new(NodeKind::ArrayLit, tok.offset);
                node.extra = items;
                Ok(self.ast.push(node))
            }
            TokenKind::LCurl => {
                self.bump();
                let mut pairs = Vec::new();
                while self.current.kind != TokenKind::RCurl {
                    let key = self.parse_expr()?;
                    self.expect(TokenKind::Colon, "':'")?;
                    let value = self.parse_expr()?;
                    let mut kv = Node::new(NodeKind::KeyValue, tok.offset);
                    kv.left = key;
                    kv.right = value;
                    pairs.push(self.ast.push(kv));
                    if self.current.kind == TokenKind::Comma {
                        self.bump();
                    }
                }
                self.expect(TokenKind::RCurl, "'}'")?;
                let mut node = Node::new(NodeKind::DictLit, tok.offset);
                node.extra = pairs;
                Ok(self.ast.push(node))
            }
            other => Err(ParseError::Unexpected { offset: tok.offset, expected: "an expression", found: other }),
        }
    }
}

/// Strips the surrounding quote characters (single/double/triple) from a
/// lexed string token's raw text.
fn unquote(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if bytes.len() >= 6 && (raw.starts_with("'''") || raw.starts_with("\"\"\"")) {
        return raw[3..raw.len() - 3].to_string();
    }
    if bytes.len() >= 2 {
        return raw[1..raw.len() - 1].to_string();
    }
    raw.to_string()
}

/// Splits an f-string body on `@name@` interpolation boundaries.
fn parse_fstring_parts(body: &str) -> Vec<FStringPart> {
    let mut parts = Vec::new();
    let mut rest = body;
    loop {
        match rest.find('@') {
            None => {
                if !rest.is_empty() {
                    parts.push(FStringPart::Literal(rest.to_string()));
                }
                break;
            }
            Some(start) => {
                if start > 0 {
                    parts.push(FStringPart::Literal(rest[..start].to_string()));
                }
                let after = &rest[start + 1..];
                match after.find('@') {
                    Some(end) => {
                        parts.push(FStringPart::Interpolation(after[..end].to_string()));
                        rest = &after[end + 1..];
                    }
                    None => {
                        parts.push(FStringPart::Literal(format!("@{after}")));
                        break;
                    }
                }
            }
        }
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str, mode: LexMode) -> Ast {
        Parser::new(src, mode).parse().expect("should parse").1
    }

    #[test]
    fn parses_call_expression() {
        let ast = parse_ok("executable('a', 'b.c')\n", LexMode::Normal);
        let root = ast.get(NodeId(ast.len() as u32 - 1));
        assert_eq!(root.kind, NodeKind::Block);
        assert_eq!(root.extra.len(), 1);
        let call = ast.get(root.extra[0]);
        assert_eq!(call.kind, NodeKind::Call);
        assert_eq!(call.extra.len(), 2);
    }

    #[test]
    fn parses_arithmetic_precedence() {
        let ast = parse_ok("x = 1 + 2 * 3\n", LexMode::Normal);
        let block = ast.get(NodeId(ast.len() as u32 - 1));
        let assign = ast.get(block.extra[0]);
        assert_eq!(assign.kind, NodeKind::Assign);
        let rhs = ast.get(assign.right);
        assert_eq!(rhs.kind, NodeKind::BinaryAdd);
        let mul = ast.get(rhs.right);
        assert_eq!(mul.kind, NodeKind::BinaryMul);
    }

    #[test]
    fn parses_if_elif_else() {
        let ast = parse_ok("if a\n  b()\nelif c\n  d()\nelse\n  e()\nendif\n", LexMode::Normal);
        let block = ast.get(NodeId(ast.len() as u32 - 1));
        let if_node = ast.get(block.extra[0]);
        assert_eq!(if_node.kind, NodeKind::If);
        let branch = ast.get(if_node.left);
        assert_eq!(branch.kind, NodeKind::IfBranch);
        assert!(!branch.right.is_none());
    }

    #[test]
    fn parses_foreach_with_two_vars() {
        let ast = parse_ok("foreach k, v : d\n  message(k)\nendforeach\n", LexMode::Normal);
        let block = ast.get(NodeId(ast.len() as u32 - 1));
        let foreach = ast.get(block.extra[0]);
        assert_eq!(foreach.kind, NodeKind::Foreach);
        match &foreach.data {
            NodeData::FString(parts) => assert_eq!(parts.len(), 2),
            _ => panic!("expected loop variable list"),
        }
    }

    #[test]
    fn rejects_break_outside_loop() {
        let err = Parser::new("break\n", LexMode::Normal).parse().unwrap_err();
        assert!(matches!(err, ParseError::JumpOutsideLoop { .. }));
    }

    #[test]
    fn jump_outside_loop_message_snapshot() {
        let err = Parser::new("break\n", LexMode::Normal).parse().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"break/continue outside a loop at offset 0");
    }

    #[test]
    fn unexpected_token_message_snapshot() {
        let err = Parser::new("x = )\n", LexMode::Normal).parse().unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"unexpected token at offset 4: expected an expression, found RParen");
    }

    #[test]
    fn parses_kwargs_and_positional_mixed() {
        let ast = parse_ok("executable('a', sources: ['b.c'], install: true)\n", LexMode::Normal);
        let block = ast.get(NodeId(ast.len() as u32 - 1));
        let call = ast.get(block.extra[0]);
        assert_eq!(call.extra.len(), 3);
        let kw = ast.get(call.extra[1]);
        assert_eq!(kw.kind, NodeKind::KwArg);
    }

    #[test]
    fn parses_typed_func_def_in_extended_mode() {
        let ast = parse_ok("func add(a int, b int) int\n  return a + b\nendfunc\n", LexMode::Extended);
        let block = ast.get(NodeId(ast.len() as u32 - 1));
        let def = ast.get(block.extra[0]);
        assert_eq!(def.kind, NodeKind::FuncDef);
    }

    #[test]
    fn splits_fstring_interpolation() {
        let parts = parse_fstring_parts("hello @name@!");
        assert_eq!(
            parts,
            vec![
                FStringPart::Literal("hello ".to_string()),
                FStringPart::Interpolation("name".to_string()),
                FStringPart::Literal("!".to_string()),
            ]
        );
    }
}
