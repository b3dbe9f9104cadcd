//! Constant-folding optimiser.
//!
//! Pure, post-order, AST-to-AST. Only `INTLIT`-on-`INTLIT` binary nodes
//! and `INTLIT`-child unary nodes fold; everything else passes through
//! unchanged. Division by zero is left unfolded rather than treated as a
//! compile error here — the back-end would trap on it at runtime exactly
//! as unoptimised code would.

use crate::ast::{AstNode, AstOp};

pub fn optimise(node: AstNode) -> AstNode {
    let node = AstNode {
        left: node.left.map(|c| Box::new(optimise(*c))),
        mid: node.mid.map(|c| Box::new(optimise(*c))),
        right: node.right.map(|c| Box::new(optimise(*c))),
        ..node
    };

    match node.op {
        AstOp::Add | AstOp::Subtract | AstOp::Multiply | AstOp::Divide => fold2(node),
        AstOp::Widen | AstOp::Invert | AstOp::LogNot => fold1(node),
        _ => node,
    }
}

fn fold2(node: AstNode) -> AstNode {
    let (Some(l), Some(r)) = (&node.left, &node.right) else {
        return node;
    };
    let (AstOp::IntLit, AstOp::IntLit) = (l.op, r.op) else {
        return node;
    };
    let (a, b) = (l.int_value.unwrap_or(0), r.int_value.unwrap_or(0));
    let value = match node.op {
        AstOp::Add => a + b,
        AstOp::Subtract => a - b,
        AstOp::Multiply => a * b,
        AstOp::Divide => {
            if b == 0 {
                return node;
            }
            a / b
        }
        _ => return node,
    };
    AstNode::int_lit(value, node.ty)
}

fn fold1(node: AstNode) -> AstNode {
    let Some(child) = &node.left else {
        return node;
    };
    if child.op != AstOp::IntLit {
        return node;
    }
    let v = child.int_value.unwrap_or(0);
    let value = match node.op {
        AstOp::Widen => v,
        AstOp::Invert => !v,
        AstOp::LogNot => (v == 0) as i64,
        _ => return node,
    };
    AstNode::int_lit(value, node.ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimType;

    fn lit(v: i64) -> AstNode {
        AstNode::int_lit(v, PrimType::INT)
    }

    #[test]
    fn folds_add_of_two_literals() {
        let tree = AstNode::binary(AstOp::Add, PrimType::INT, lit(1), lit(2));
        let out = optimise(tree);
        assert_eq!(out.op, AstOp::IntLit);
        assert_eq!(out.int_value, Some(3));
    }

    #[test]
    fn division_by_zero_is_left_unfolded() {
        let tree = AstNode::binary(AstOp::Divide, PrimType::INT, lit(7), lit(0));
        let out = optimise(tree);
        assert_eq!(out.op, AstOp::Divide);
    }

    #[test]
    fn folds_nested_subtree_bottom_up() {
        let inner = AstNode::binary(AstOp::Multiply, PrimType::INT, lit(3), lit(4));
        let tree = AstNode::binary(AstOp::Add, PrimType::INT, lit(1), inner);
        let out = optimise(tree);
        assert_eq!(out.op, AstOp::IntLit);
        assert_eq!(out.int_value, Some(13));
    }

    #[test]
    fn logical_not_folds_to_zero_or_one() {
        let tree = AstNode::unary(AstOp::LogNot, PrimType::INT, lit(0));
        let out = optimise(tree);
        assert_eq!(out.int_value, Some(1));
    }

    #[test]
    fn non_literal_operands_pass_through() {
        let ident = AstNode::leaf(AstOp::Ident, PrimType::INT);
        let tree = AstNode::binary(AstOp::Add, PrimType::INT, ident, lit(1));
        let out = optimise(tree);
        assert_eq!(out.op, AstOp::Add);
    }
}
