//! Statements.

use super::Parser;
use crate::ast::{AstNode, AstOp};
use crate::error::CResult;
use crate::scan::TokenKind;
use crate::symtab::{StorageClass, StructuralType};
use crate::types::{modify_type, PrimType};

impl Parser {
    pub(super) fn compound_statement(&mut self) -> CResult<AstNode> {
        self.expect(TokenKind::LBrace)?;
        let mut result: Option<AstNode> = None;
        while self.peek() != TokenKind::RBrace {
            let (stmt, needs_semi) = self.single_statement()?;
            if needs_semi {
                self.expect(TokenKind::Semi)?;
            }
            if let Some(stmt) = stmt {
                result = Some(match result {
                    Some(prev) => AstNode::glue(prev, stmt),
                    None => stmt,
                });
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(result.unwrap_or_else(|| AstNode::leaf(AstOp::Glue, PrimType::NONE)))
    }

    /// Returns the statement tree (if any) and whether the caller must
    /// still consume a trailing `;` (true for assignment/return/call
    /// expression statements and local declarations).
    fn single_statement(&mut self) -> CResult<(Option<AstNode>, bool)> {
        match self.peek() {
            TokenKind::LBrace => Ok((Some(self.compound_statement()?), false)),
            TokenKind::If => Ok((Some(self.if_statement()?), false)),
            TokenKind::While => Ok((Some(self.while_statement()?), false)),
            TokenKind::For => Ok((Some(self.for_statement()?), false)),
            TokenKind::Return => Ok((Some(self.return_statement()?), true)),
            TokenKind::Break => {
                self.advance()?;
                Ok((Some(AstNode::leaf(AstOp::Break, PrimType::NONE)), true))
            }
            TokenKind::Continue => {
                self.advance()?;
                Ok((Some(AstNode::leaf(AstOp::Continue, PrimType::NONE)), true))
            }
            TokenKind::Switch => Ok((Some(self.switch_statement()?), false)),
            TokenKind::Void | TokenKind::Char | TokenKind::Int | TokenKind::Long | TokenKind::Struct
            | TokenKind::Union | TokenKind::Enum | TokenKind::Extern | TokenKind::Static => {
                self.local_var_declaration()?;
                Ok((None, true))
            }
            TokenKind::Ident if self.symtab.find_typedef(&self.peek_text()).is_some() => {
                self.local_var_declaration()?;
                Ok((None, true))
            }
            _ => Ok((Some(self.parse_expr()?), true)),
        }
    }

    fn peek_text(&self) -> String {
        self.current.text.clone()
    }

    fn local_var_declaration(&mut self) -> CResult<()> {
        let class = if self.matches(TokenKind::Extern)? {
            StorageClass::Extern
        } else if self.matches(TokenKind::Static)? {
            StorageClass::Static
        } else {
            StorageClass::Local
        };
        let (ty, ctype) = self.parse_type()?;
        loop {
            let name = self.expect(TokenKind::Ident)?.text;
            if self.symtab.locals.iter().any(|&id| self.symtab.get(id).name == name) {
                return Err(self.error(format!("Duplicate local declaration of {name}")));
            }
            if class == StorageClass::Extern || class == StorageClass::Static {
                let id = self.symtab.add_global(&name, ty, ctype, StructuralType::Variable, class);
                self.symtab.get_mut(id).size = ty.size(&self.symtab, ctype);
            } else {
                let id = self.symtab.add_local(&name, ty, ctype, StructuralType::Variable);
                self.symtab.get_mut(id).size = ty.size(&self.symtab, ctype);
            }
            if !self.matches(TokenKind::Comma)? {
                break;
            }
        }
        Ok(())
    }

    /// Wrap a non-comparison condition in `TOBOOL` (§4.3).
    fn boolean_condition(&mut self) -> CResult<AstNode> {
        let cond = self.parse_expr()?;
        Ok(if cond.op.is_comparison() {
            cond
        } else {
            AstNode::unary(AstOp::ToBool, PrimType::INT, cond)
        })
    }

    fn if_statement(&mut self) -> CResult<AstNode> {
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.boolean_condition()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.compound_statement_or_single()?;
        let else_branch = if self.matches(TokenKind::Else)? {
            Some(self.compound_statement_or_single()?)
        } else {
            None
        };
        Ok(AstNode::node(AstOp::If, PrimType::NONE, Some(cond), Some(then_branch), else_branch))
    }

    fn while_statement(&mut self) -> CResult<AstNode> {
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.boolean_condition()?;
        self.expect(TokenKind::RParen)?;
        let body = self.compound_statement_or_single()?;
        Ok(AstNode::binary(AstOp::While, PrimType::NONE, cond, body))
    }

    /// `for (init; cond; post) body` lowers at parse time to
    /// `GLUE(init, WHILE(cond, GLUE(body, post)))` (§4.3).
    fn for_statement(&mut self) -> CResult<AstNode> {
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;
        let init = self.parse_expr()?;
        self.expect(TokenKind::Semi)?;
        let cond = self.boolean_condition()?;
        self.expect(TokenKind::Semi)?;
        let post = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.compound_statement_or_single()?;

        let body_then_post = AstNode::glue(body, post);
        let loop_node = AstNode::binary(AstOp::While, PrimType::NONE, cond, body_then_post);
        Ok(AstNode::glue(init, loop_node))
    }

    fn return_statement(&mut self) -> CResult<AstNode> {
        self.expect(TokenKind::Return)?;
        let func = self.symtab.current_function.ok_or_else(|| self.error("return outside a function"))?;
        let func_ty = self.symtab.get(func).ty;

        if self.peek() == TokenKind::Semi {
            if func_ty != PrimType::VOID {
                return Err(self.error("Missing return value in non-void function"));
            }
            return Ok(AstNode::leaf(AstOp::Return, PrimType::NONE));
        }

        if func_ty == PrimType::VOID {
            return Err(self.error("Cannot return a value from a void function"));
        }
        let value = self.parse_expr()?;
        let func_ctype = self.symtab.get(func).ctype;
        let value = modify_type(value, &self.symtab, func_ty, func_ctype, None)
            .map_err(|_| self.error("Incompatible return type"))?;
        Ok(AstNode::unary(AstOp::Return, PrimType::NONE, value))
    }

    fn switch_statement(&mut self) -> CResult<AstNode> {
        self.expect(TokenKind::Switch)?;
        self.expect(TokenKind::LParen)?;
        let selector = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;

        let mut cases: Option<AstNode> = None;
        while self.peek() != TokenKind::RBrace {
            let case_node = if self.matches(TokenKind::Case)? {
                let value = self.constant_literal()?;
                self.expect(TokenKind::Colon)?;
                let body = self.case_body()?;
                AstNode::unary(AstOp::Case, PrimType::NONE, body).with_int_value(value)
            } else {
                self.expect(TokenKind::Default)?;
                self.expect(TokenKind::Colon)?;
                let body = self.case_body()?;
                AstNode::unary(AstOp::Default, PrimType::NONE, body)
            };
            cases = Some(match cases {
                Some(prev) => AstNode::glue(prev, case_node),
                None => case_node,
            });
        }
        self.expect(TokenKind::RBrace)?;
        let cases = cases.unwrap_or_else(|| AstNode::leaf(AstOp::Glue, PrimType::NONE));
        Ok(AstNode::node(AstOp::Switch, PrimType::NONE, Some(selector), Some(cases), None))
    }

    fn case_body(&mut self) -> CResult<AstNode> {
        let mut result: Option<AstNode> = None;
        while !matches!(self.peek(), TokenKind::Case | TokenKind::Default | TokenKind::RBrace) {
            let (stmt, needs_semi) = self.single_statement()?;
            if needs_semi {
                self.expect(TokenKind::Semi)?;
            }
            if let Some(stmt) = stmt {
                result = Some(match result {
                    Some(prev) => AstNode::glue(prev, stmt),
                    None => stmt,
                });
            }
        }
        Ok(result.unwrap_or_else(|| AstNode::leaf(AstOp::Glue, PrimType::NONE)))
    }

    /// A brace-delimited block, or a single statement treated as if it
    /// were one (used by `if`/`while`/`for` bodies so callers don't have
    /// to special-case the brace-less form).
    fn compound_statement_or_single(&mut self) -> CResult<AstNode> {
        if self.peek() == TokenKind::LBrace {
            return self.compound_statement();
        }
        let (stmt, needs_semi) = self.single_statement()?;
        if needs_semi {
            self.expect(TokenKind::Semi)?;
        }
        Ok(stmt.unwrap_or_else(|| AstNode::leaf(AstOp::Glue, PrimType::NONE)))
    }
}

impl AstNode {
    fn with_int_value(mut self, v: i64) -> Self {
        self.int_value = Some(v);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{AstNode, AstOp};
    use crate::parser::parse;

    /// Depth-first search for the first node with the given op, since the
    /// statement glue chain's exact shape isn't part of the contract under
    /// test.
    fn find<'a>(n: &'a AstNode, op: AstOp) -> Option<&'a AstNode> {
        if n.op == op {
            return Some(n);
        }
        [&n.left, &n.mid, &n.right]
            .into_iter()
            .flatten()
            .find_map(|c| find(c, op))
    }

    #[test]
    fn if_without_else_has_no_right_child() {
        let prog = parse("int main() { if (1) return 1; return 0; }").unwrap();
        let if_node = find(&prog.functions[0], AstOp::If).unwrap();
        assert!(if_node.right.is_none());
    }

    #[test]
    fn if_with_else_populates_all_three_children() {
        let prog = parse("int main() { if (1) return 1; else return 0; }").unwrap();
        let if_node = find(&prog.functions[0], AstOp::If).unwrap();
        assert!(if_node.left.is_some() && if_node.mid.is_some() && if_node.right.is_some());
    }

    #[test]
    fn for_statement_desugars_into_a_while_node() {
        let prog = parse("int main() { int i; for (i = 0; i < 10; i = i + 1) { } return 0; }").unwrap();
        assert!(find(&prog.functions[0], AstOp::While).is_some());
    }

    #[test]
    fn return_without_a_value_is_rejected_in_a_non_void_function() {
        let err = parse("int main() { return; }");
        assert!(err.is_err());
    }

    #[test]
    fn return_with_a_value_is_rejected_in_a_void_function() {
        let err = parse("void main() { return 1; }");
        assert!(err.is_err());
    }

    #[test]
    fn switch_collects_case_and_default_bodies() {
        let prog = parse(
            "int main() { int x; switch (x) { case 1: x = 1; break; default: x = 0; } return x; }",
        )
        .unwrap();
        let switch_node = find(&prog.functions[0], AstOp::Switch).unwrap();
        assert!(find(switch_node, AstOp::Case).is_some());
        assert!(find(switch_node, AstOp::Default).is_some());
    }

    #[test]
    fn duplicate_local_declaration_is_rejected() {
        let err = parse("int main() { int x; int x; return 0; }");
        assert!(err.is_err());
    }

    #[test]
    fn extern_local_is_promoted_to_the_global_list() {
        let prog = parse("int main() { extern int counter; return counter; }").unwrap();
        assert!(prog.symtab.find_global("counter").is_some());
    }
}
