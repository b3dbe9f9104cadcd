//! Recursive-descent parser.
//!
//! One current token plus the scanner's own one-token reject slot.
//! `global_declarations` is the entry point: loop until EOF, reading a
//! type and a name, then branching on `(` (function) vs `;`/`,`/`[`
//! (variable, scalar or array).

mod decl;
mod expr;
mod stmt;

use crate::ast::AstNode;
use crate::error::{CResult, CompileError};
use crate::scan::{Scanner, Token, TokenKind};
use crate::symtab::SymbolTable;
use crate::types::PrimType;

pub struct Program {
    pub functions: Vec<AstNode>,
    pub symtab: SymbolTable,
    /// String literals in encounter order, keyed by the label `STRLIT`
    /// nodes carry in `int_value`; emitted by the driver before any
    /// function body so every reference resolves.
    pub string_literals: Vec<(usize, String)>,
}

pub struct Parser {
    scanner: Scanner,
    current: Token,
    pub(crate) symtab: SymbolTable,
    str_labels: usize,
    string_literals: Vec<(usize, String)>,
}

impl Parser {
    pub fn new(source: &str) -> CResult<Self> {
        let mut scanner = Scanner::new(source);
        let current = scanner.scan()?;
        Ok(Parser {
            scanner,
            current,
            symtab: SymbolTable::new(),
            str_labels: 0,
            string_literals: Vec::new(),
        })
    }

    pub(crate) fn line(&self) -> usize {
        self.scanner.line
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::at(self.line(), message)
    }

    pub(crate) fn peek(&self) -> TokenKind {
        self.current.kind
    }

    pub(crate) fn advance(&mut self) -> CResult<Token> {
        let tok = std::mem::replace(&mut self.current, self.scanner.scan()?);
        Ok(tok)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> CResult<Token> {
        if self.current.kind != kind {
            return Err(self.error(format!("Expected {kind:?}, found {:?}", self.current.kind)));
        }
        self.advance()
    }

    pub(crate) fn matches(&mut self, kind: TokenKind) -> CResult<bool> {
        if self.current.kind == kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn new_string_literal(&mut self, text: String) -> usize {
        self.str_labels += 1;
        self.string_literals.push((self.str_labels, text));
        self.str_labels
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Void | TokenKind::Char | TokenKind::Int | TokenKind::Long | TokenKind::Struct | TokenKind::Union | TokenKind::Enum
        ) || matches!(self.peek(), TokenKind::Ident if self.symtab.find_typedef(&self.current.text).is_some())
    }

    /// Base type keyword/struct-or-union-tag/typedef-name, then zero or
    /// more `*` applying `pointer_to`.
    pub(crate) fn parse_type(&mut self) -> CResult<(PrimType, Option<crate::symtab::SymId>)> {
        let (mut ty, mut ctype) = match self.peek() {
            TokenKind::Void => {
                self.advance()?;
                (PrimType::VOID, None)
            }
            TokenKind::Char => {
                self.advance()?;
                (PrimType::CHAR, None)
            }
            TokenKind::Int => {
                self.advance()?;
                (PrimType::INT, None)
            }
            TokenKind::Long => {
                self.advance()?;
                (PrimType::LONG, None)
            }
            TokenKind::Struct => {
                self.advance()?;
                let name = self.optional_tag_name()?;
                let id = self.struct_or_union_body(&name, true)?;
                (PrimType::STRUCT, Some(id))
            }
            TokenKind::Union => {
                self.advance()?;
                let name = self.optional_tag_name()?;
                let id = self.struct_or_union_body(&name, false)?;
                (PrimType::UNION, Some(id))
            }
            TokenKind::Enum => {
                self.advance()?;
                let name = self.expect(TokenKind::Ident)?.text;
                self.symtab
                    .find_enum_type(&name)
                    .ok_or_else(|| self.error(format!("Unknown enum {name}")))?;
                (PrimType::INT, None)
            }
            TokenKind::Ident => {
                let name = self.current.text.clone();
                let id = self
                    .symtab
                    .find_typedef(&name)
                    .ok_or_else(|| self.error(format!("{name} is not a type")))?;
                self.advance()?;
                let sym = self.symtab.get(id);
                (sym.ty, sym.ctype)
            }
            other => return Err(self.error(format!("Expected a type, found {other:?}"))),
        };
        while self.matches(TokenKind::Star)? {
            ty = ty.pointer_to().map_err(|_| self.error("Too many levels of pointer indirection"))?;
        }
        Ok((ty, ctype))
    }

    pub(crate) fn constant_literal(&mut self) -> CResult<i64> {
        let negative = self.matches(TokenKind::Minus)?;
        let tok = self.expect(TokenKind::IntLit)?;
        Ok(if negative { -tok.int_value } else { tok.int_value })
    }

    fn optional_tag_name(&mut self) -> CResult<String> {
        if self.peek() == TokenKind::Ident {
            Ok(self.advance()?.text)
        } else {
            Ok(String::new())
        }
    }

    /// `struct`/`union` after the optional tag: a `{` introduces (or
    /// redefines) the member body, its absence means a reference to an
    /// already-declared tag.
    fn struct_or_union_body(&mut self, name: &str, is_struct: bool) -> CResult<crate::symtab::SymId> {
        if self.peek() == TokenKind::LBrace {
            let id = if !name.is_empty() {
                let existing = if is_struct { self.symtab.find_struct(name) } else { self.symtab.find_union(name) };
                existing.unwrap_or_else(|| if is_struct { self.symtab.add_struct(name) } else { self.symtab.add_union(name) })
            } else if is_struct {
                self.symtab.add_struct(name)
            } else {
                self.symtab.add_union(name)
            };
            self.parse_composite_body(id)?;
            Ok(id)
        } else {
            let existing = if is_struct { self.symtab.find_struct(name) } else { self.symtab.find_union(name) };
            existing.ok_or_else(|| self.error(format!("Unknown {} {name}", if is_struct { "struct" } else { "union" })))
        }
    }

    pub fn parse_program(&mut self) -> CResult<Vec<AstNode>> {
        let mut functions = Vec::new();
        while self.peek() != TokenKind::Eof {
            if let Some(func) = self.global_declaration()? {
                functions.push(func);
            }
        }
        Ok(functions)
    }
}

pub fn parse(source: &str) -> CResult<Program> {
    let mut parser = Parser::new(source)?;
    let functions = parser.parse_program()?;
    Ok(Program {
        functions,
        symtab: parser.symtab,
        string_literals: parser.string_literals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_empty_program() {
        let prog = parse("").unwrap();
        assert!(prog.functions.is_empty());
    }

    #[test]
    fn parses_a_minimal_function() {
        let prog = parse("int main() { return 0; }").unwrap();
        assert_eq!(prog.functions.len(), 1);
    }
}
