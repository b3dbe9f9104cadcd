//! Pratt/precedence-climbing expression parser.

use super::Parser;
use crate::ast::{AstNode, AstOp};
use crate::error::CResult;
use crate::scan::TokenKind;
use crate::types::{modify_type, PrimType};

/// Binding power of a binary operator token; `0` means "not a binary
/// operator", which stops the climbing loop.
fn precedence(kind: TokenKind) -> i32 {
    match kind {
        TokenKind::Assign | TokenKind::PlusAssign | TokenKind::MinusAssign | TokenKind::StarAssign | TokenKind::SlashAssign => 5,
        TokenKind::Question => 10,
        TokenKind::LogOr => 15,
        TokenKind::LogAnd => 20,
        TokenKind::Pipe => 25,
        TokenKind::Caret => 30,
        TokenKind::Amper => 35,
        TokenKind::Eq | TokenKind::Ne => 40,
        TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge => 45,
        TokenKind::LShift | TokenKind::RShift => 50,
        TokenKind::Plus | TokenKind::Minus => 55,
        TokenKind::Star | TokenKind::Slash => 60,
        _ => 0,
    }
}

fn arithop(kind: TokenKind) -> AstOp {
    match kind {
        TokenKind::Plus => AstOp::Add,
        TokenKind::Minus => AstOp::Subtract,
        TokenKind::Star => AstOp::Multiply,
        TokenKind::Slash => AstOp::Divide,
        TokenKind::Eq => AstOp::Eq,
        TokenKind::Ne => AstOp::Ne,
        TokenKind::Lt => AstOp::Lt,
        TokenKind::Gt => AstOp::Gt,
        TokenKind::Le => AstOp::Le,
        TokenKind::Ge => AstOp::Ge,
        TokenKind::LShift => AstOp::LShift,
        TokenKind::RShift => AstOp::RShift,
        TokenKind::Amper => AstOp::And,
        TokenKind::Pipe => AstOp::Or,
        TokenKind::Caret => AstOp::Xor,
        TokenKind::LogAnd => AstOp::LogAnd,
        TokenKind::LogOr => AstOp::LogOr,
        _ => unreachable!("not a binary arithmetic/comparison operator"),
    }
}

/// Turn an already-parsed expression into the lvalue the left side of an
/// `=`/`+=`/... requires: an `IDENT` or `DEREF` with `rvalue = false`.
fn as_lvalue(node: AstNode, parser: &Parser) -> CResult<AstNode> {
    match node.op {
        AstOp::Ident | AstOp::Deref => Ok(AstNode { rvalue: false, ..node }),
        _ => Err(parser.error("Not an lvalue")),
    }
}

impl Parser {
    pub fn parse_expr(&mut self) -> CResult<AstNode> {
        self.binexpr(0)
    }

    fn binexpr(&mut self, ptp: i32) -> CResult<AstNode> {
        let mut left = self.prefix()?;

        loop {
            let kind = self.peek();
            let prec = precedence(kind);
            if prec <= ptp || prec == 0 {
                break;
            }

            match kind {
                TokenKind::Assign | TokenKind::PlusAssign | TokenKind::MinusAssign | TokenKind::StarAssign | TokenKind::SlashAssign => {
                    let op = match kind {
                        TokenKind::Assign => AstOp::Assign,
                        TokenKind::PlusAssign => AstOp::AsPlus,
                        TokenKind::MinusAssign => AstOp::AsMinus,
                        TokenKind::StarAssign => AstOp::AsStar,
                        TokenKind::SlashAssign => AstOp::AsSlash,
                        _ => unreachable!(),
                    };
                    self.advance()?;
                    let target = as_lvalue(left, self)?;
                    // Right-associative: recurse at prec - 1.
                    let value = self.binexpr(prec - 1)?;
                    let value = modify_type(value, &self.symtab, target.ty, target.ctype, None)
                        .map_err(|_| self.error("Incompatible types in assignment"))?;
                    left = AstNode::node(op, target.ty, Some(value), None, Some(target));
                }
                TokenKind::Question => {
                    self.advance()?;
                    let true_branch = self.binexpr(0)?;
                    self.expect(TokenKind::Colon)?;
                    let false_branch = self.binexpr(prec - 1)?;
                    let ty = true_branch.ty;
                    left = AstNode::node(AstOp::Ternary, ty, Some(left), Some(true_branch), Some(false_branch));
                }
                _ => {
                    self.advance()?;
                    let right = self.binexpr(prec)?;
                    let op = arithop(kind);
                    let (left2, right2) = self.coerce_binary(left, right, op)?;
                    let ty = if op.is_comparison() { PrimType::INT } else { left2.ty };
                    left = AstNode::binary(op, ty, left2, right2);
                }
            }
        }

        Ok(left)
    }

    fn coerce_binary(&self, left: AstNode, right: AstNode, op: AstOp) -> CResult<(AstNode, AstNode)> {
        if left.ty == right.ty {
            return Ok((left, right));
        }
        // Try widening/scaling the side with the smaller type toward the
        // other; `modify_type` itself decides what's legal.
        if let Ok(r2) = modify_type(right.clone(), &self.symtab, left.ty, left.ctype, Some(op)) {
            return Ok((left, r2));
        }
        let ty = right.ty;
        let ctype = right.ctype;
        let l2 = modify_type(left, &self.symtab, ty, ctype, Some(op)).map_err(|_| self.error("Incompatible types in expression"))?;
        Ok((l2, right))
    }

    /// Prefix operators, then `primary`, then postfix.
    fn prefix(&mut self) -> CResult<AstNode> {
        match self.peek() {
            TokenKind::Plus => {
                self.advance()?;
                self.prefix()
            }
            TokenKind::Minus => {
                self.advance()?;
                let child = self.prefix()?;
                let ty = child.ty;
                Ok(AstNode::unary(AstOp::Negate, ty, child))
            }
            TokenKind::Tilde => {
                self.advance()?;
                let child = self.prefix()?;
                let ty = child.ty;
                Ok(AstNode::unary(AstOp::Invert, ty, child))
            }
            TokenKind::Bang => {
                self.advance()?;
                let child = self.prefix()?;
                Ok(AstNode::unary(AstOp::LogNot, PrimType::INT, child))
            }
            TokenKind::Amper => {
                self.advance()?;
                let child = self.prefix()?;
                if child.op != AstOp::Ident {
                    return Err(self.error("& requires an identifier operand"));
                }
                let sym = child.sym.unwrap();
                let ty = self.symtab.get(sym).ty.pointer_to().map_err(|_| self.error("Cannot take address"))?;
                Ok(AstNode::leaf(AstOp::Addr, ty).with_sym(sym))
            }
            TokenKind::Star => {
                self.advance()?;
                let child = self.prefix()?;
                let ty = child.ty.value_at().map_err(|_| self.error("* requires a pointer operand"))?;
                Ok(AstNode { rvalue: true, ..AstNode::unary(AstOp::Deref, ty, child) })
            }
            TokenKind::PlusPlus => {
                self.advance()?;
                let child = self.prefix()?;
                let ty = child.ty;
                Ok(AstNode::unary(AstOp::PreInc, ty, child))
            }
            TokenKind::MinusMinus => {
                self.advance()?;
                let child = self.prefix()?;
                let ty = child.ty;
                Ok(AstNode::unary(AstOp::PreDec, ty, child))
            }
            TokenKind::Sizeof => {
                self.advance()?;
                self.expect(TokenKind::LParen)?;
                let (ty, ctype) = self.parse_type()?;
                self.expect(TokenKind::RParen)?;
                let size = ty.size(&self.symtab, ctype);
                Ok(AstNode::int_lit(size, PrimType::INT))
            }
            _ => self.postfix(),
        }
    }

    fn postfix(&mut self) -> CResult<AstNode> {
        let mut node = self.primary()?;
        loop {
            match self.peek() {
                TokenKind::PlusPlus => {
                    self.advance()?;
                    let ty = node.ty;
                    node = AstNode::unary(AstOp::PostInc, ty, node);
                }
                TokenKind::MinusMinus => {
                    self.advance()?;
                    let ty = node.ty;
                    node = AstNode::unary(AstOp::PostDec, ty, node);
                }
                TokenKind::LBracket => {
                    self.advance()?;
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    let elem_ty = node.ty.value_at().map_err(|_| self.error("Subscript of a non-pointer"))?;
                    let scaled = modify_type(index, &self.symtab, node.ty, node.ctype, Some(AstOp::Add))
                        .map_err(|_| self.error("Invalid array index"))?;
                    let addr = AstNode::binary(AstOp::Add, node.ty, node, scaled);
                    node = AstNode { rvalue: true, ..AstNode::unary(AstOp::Deref, elem_ty, addr) };
                }
                TokenKind::Dot => {
                    self.advance()?;
                    node = self.member_access(node, false)?;
                }
                TokenKind::Arrow => {
                    self.advance()?;
                    node = self.member_access(node, true)?;
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// `s.field` / `p->field`: look the field up in the struct/union tag's
    /// member list, then lower to a `DEREF` of the struct's (or, for `.`,
    /// the struct variable's own) address plus the field's byte offset.
    /// `.` only accepts a plain variable on its left, the same restriction
    /// `&` places on its operand — neither can take the address of an
    /// arbitrary expression.
    fn member_access(&mut self, node: AstNode, via_pointer: bool) -> CResult<AstNode> {
        let ctype_id = if via_pointer {
            if !node.ty.is_ptr() {
                return Err(self.error("'->' requires a pointer to a struct or union"));
            }
            node.ctype.ok_or_else(|| self.error("'->' requires a pointer to a known struct/union type"))?
        } else {
            if !node.ty.is_struct() && !node.ty.is_union() {
                return Err(self.error("'.' requires a struct or union operand"));
            }
            node.ctype.ok_or_else(|| self.error("'.' requires a struct/union operand of a known type"))?
        };

        let name = self.expect(TokenKind::Ident)?.text;
        let member_id = self
            .symtab
            .get(ctype_id)
            .member
            .iter()
            .copied()
            .find(|&id| self.symtab.get(id).name == name)
            .ok_or_else(|| self.error(format!("No member named {name}")))?;
        let member = self.symtab.get(member_id);
        let member_ty = member.ty;
        let member_ctype = member.ctype;
        let offset = member.posn;

        let base = if via_pointer {
            node
        } else {
            if node.op != AstOp::Ident {
                return Err(self.error("'.' is only supported on a plain variable"));
            }
            let sym = node.sym.unwrap();
            let addr_ty = node.ty.pointer_to().map_err(|_| self.error("Cannot take the address of this struct/union"))?;
            AstNode::leaf(AstOp::Addr, addr_ty).with_sym(sym)
        };

        let addr = if offset == 0 {
            base
        } else {
            let base_ty = base.ty;
            AstNode::binary(AstOp::Add, base_ty, base, AstNode::int_lit(offset, PrimType::LONG))
        };

        Ok(AstNode {
            rvalue: true,
            ctype: member_ctype,
            ..AstNode::unary(AstOp::Deref, member_ty, addr)
        })
    }

    fn primary(&mut self) -> CResult<AstNode> {
        match self.peek() {
            TokenKind::IntLit => {
                let tok = self.advance()?;
                // Final-revision behaviour: integer literals are always
                // INT; `modify_type` narrows where an assignment needs it.
                Ok(AstNode::int_lit(tok.int_value, PrimType::INT))
            }
            TokenKind::StrLit => {
                let tok = self.advance()?;
                let label = self.new_string_literal(tok.text);
                let mut node = AstNode::int_lit(label as i64, PrimType::CHAR.pointer_to().unwrap());
                node.op = AstOp::StrLit;
                Ok(node)
            }
            TokenKind::LParen => {
                self.advance()?;
                if self.starts_type() {
                    let (ty, ctype) = self.parse_type()?;
                    self.expect(TokenKind::RParen)?;
                    let child = self.prefix()?;
                    let mut node = AstNode::unary(AstOp::Cast, ty, child);
                    node.ctype = ctype;
                    return Ok(node);
                }
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident => {
                let name = self.current.text.clone();
                self.advance()?;
                if self.matches(TokenKind::LParen)? {
                    return self.funccall(&name);
                }
                let sym = self
                    .symtab
                    .find_symbol(&name)
                    .ok_or_else(|| self.error(format!("Unknown identifier {name}")))?;
                let ty = self.symtab.get(sym).ty;
                Ok(AstNode::ident(sym, ty, true))
            }
            other => Err(self.error(format!("Expected an expression, found {other:?}"))),
        }
    }

    fn funccall(&mut self, name: &str) -> CResult<AstNode> {
        let sym = self
            .symtab
            .find_global(name)
            .ok_or_else(|| self.error(format!("Undeclared function {name}")))?;
        let ret_ty = self.symtab.get(sym).ty;

        let mut args = Vec::new();
        if self.peek() != TokenKind::RParen {
            loop {
                args.push(self.parse_expr()?);
                if !self.matches(TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        // Glue left-to-right so the right-most argument sits deepest on
        // the left spine, matching §4.3's "right-most argument is the
        // deepest-left leaf".
        let mut glued: Option<AstNode> = None;
        for arg in args.into_iter().rev() {
            glued = Some(match glued {
                Some(rest) => AstNode::glue(rest, arg),
                None => arg,
            });
        }

        Ok(AstNode::node(AstOp::FuncCall, ret_ty, glued, None, None).with_sym(sym))
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    #[test]
    fn dot_resolves_to_the_members_offset() {
        let prog = parse(
            "struct Point { int x; int y; };
             int main() { struct Point p; p.y = 3; return p.y; }",
        )
        .unwrap();
        assert_eq!(prog.functions.len(), 1);
        let y = prog.symtab.find_struct("Point").map(|id| prog.symtab.get(id).member[1]).unwrap();
        assert_eq!(prog.symtab.get(y).posn, 4);
    }

    #[test]
    fn arrow_dereferences_through_a_pointer() {
        let prog = parse(
            "struct Point { int x; int y; };
             int main() { struct Point p; struct Point *q; q = &p; q->x = 5; return q->x; }",
        )
        .unwrap();
        assert_eq!(prog.functions.len(), 1);
    }

    #[test]
    fn dot_on_a_non_struct_is_rejected() {
        let err = parse("int main() { int x; x.y = 1; return 0; }");
        assert!(err.is_err());
    }

    #[test]
    fn member_access_requires_a_declared_field() {
        let err = parse(
            "struct Point { int x; };
             int main() { struct Point p; return p.z; }",
        );
        assert!(err.is_err());
    }
}
