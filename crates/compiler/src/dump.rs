//! AST dumper (`-T`).
//!
//! A second traversal, independent of code generation: it allocates its
//! own labels so dumping never perturbs the label sequence the code
//! generator would otherwise produce for the same tree. `GLUE` resets
//! indentation so a statement sequence prints flat rather than nested.

use std::fmt::Write as _;

use crate::ast::AstNode;
use crate::symtab::SymbolTable;

pub struct Dumper {
    labels: usize,
    out: String,
}

impl Dumper {
    pub fn new() -> Self {
        Dumper { labels: 0, out: String::new() }
    }

    fn next_label(&mut self) -> usize {
        self.labels += 1;
        self.labels
    }

    pub fn dump(&mut self, n: &AstNode, symtab: &SymbolTable, depth: usize) -> &str {
        self.out.clear();
        self.dump_node(n, symtab, depth);
        &self.out
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
    }

    fn dump_node(&mut self, n: &AstNode, symtab: &SymbolTable, depth: usize) {
        if n.op == crate::ast::AstOp::Glue {
            if let Some(l) = &n.left {
                self.dump_node(l, symtab, depth);
            }
            if let Some(r) = &n.right {
                self.dump_node(r, symtab, depth);
            }
            return;
        }

        self.indent(depth);
        let _ = write!(self.out, "{}", n.op.name());
        if let Some(v) = n.int_value {
            let _ = write!(self.out, " {v}");
        }
        if let Some(s) = n.scale_size {
            let _ = write!(self.out, " scale={s}");
        }
        if let Some(sym) = n.sym {
            let _ = write!(self.out, " {}", symtab.get(sym).name);
        }
        if !n.rvalue {
            self.out.push_str(" lvalue");
        }
        if n.op == crate::ast::AstOp::If || n.op == crate::ast::AstOp::While {
            let label = self.next_label();
            let _ = write!(self.out, " L{label}");
        }
        self.out.push('\n');

        if let Some(l) = &n.left {
            self.dump_node(l, symtab, depth + 1);
        }
        if let Some(m) = &n.mid {
            self.dump_node(m, symtab, depth + 1);
        }
        if let Some(r) = &n.right {
            self.dump_node(r, symtab, depth + 1);
        }
    }
}

impl Default for Dumper {
    fn default() -> Self {
        Dumper::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstNode, AstOp};
    use crate::types::PrimType;

    #[test]
    fn glue_chain_prints_flat() {
        let symtab = SymbolTable::new();
        let a = AstNode::int_lit(1, PrimType::INT);
        let b = AstNode::int_lit(2, PrimType::INT);
        let tree = AstNode::glue(a, b);
        let mut dumper = Dumper::new();
        let text = dumper.dump(&tree, &symtab, 0).to_string();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|l| !l.starts_with(' ')));
    }

    #[test]
    fn if_node_allocates_a_dump_label_independent_of_codegen() {
        let symtab = SymbolTable::new();
        let cond = AstNode::leaf(AstOp::Eq, PrimType::INT);
        let then = AstNode::int_lit(1, PrimType::INT);
        let tree = AstNode::node(AstOp::If, PrimType::NONE, Some(cond), Some(then), None);
        let mut dumper = Dumper::new();
        let text = dumper.dump(&tree, &symtab, 0).to_string();
        assert!(text.lines().next().unwrap().contains("L1"));
    }
}
