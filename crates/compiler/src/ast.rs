//! Abstract Syntax Tree.
//!
//! One node shape for every expression, statement and declaration the
//! parser produces. `op` is the discriminant the code generator and the
//! optimiser switch on; `int_value` and `scale_size` are kept as separate
//! fields (rather than one field both `IntLit` and `Scale` alias into, as
//! the two revisions of the original compiler did) since nothing here
//! needs them to share storage.

use crate::symtab::SymId;
use crate::types::PrimType;

/// Operator / node-kind tag. Mirrors `astname[]` in the original `tree.c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstOp {
    Assign,
    AsPlus,
    AsMinus,
    AsStar,
    AsSlash,
    Ternary,
    LogOr,
    LogAnd,
    Or,
    Xor,
    And,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LShift,
    RShift,
    Add,
    Subtract,
    Multiply,
    Divide,
    IntLit,
    StrLit,
    Ident,
    Glue,
    If,
    While,
    Function,
    Widen,
    Return,
    FuncCall,
    Deref,
    Addr,
    Scale,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
    Negate,
    Invert,
    LogNot,
    ToBool,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Cast,
}

impl AstOp {
    /// True for the comparison operators `EQ..GE`, which lower differently
    /// depending on whether their parent is a control-flow node (§4.6).
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            AstOp::Eq | AstOp::Ne | AstOp::Lt | AstOp::Gt | AstOp::Le | AstOp::Ge
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            AstOp::Assign => "ASSIGN",
            AstOp::AsPlus => "ASPLUS",
            AstOp::AsMinus => "ASMINUS",
            AstOp::AsStar => "ASSTAR",
            AstOp::AsSlash => "ASSLASH",
            AstOp::Ternary => "TERNARY",
            AstOp::LogOr => "LOGOR",
            AstOp::LogAnd => "LOGAND",
            AstOp::Or => "OR",
            AstOp::Xor => "XOR",
            AstOp::And => "AND",
            AstOp::Eq => "EQ",
            AstOp::Ne => "NE",
            AstOp::Lt => "LT",
            AstOp::Gt => "GT",
            AstOp::Le => "LE",
            AstOp::Ge => "GE",
            AstOp::LShift => "LSHIFT",
            AstOp::RShift => "RSHIFT",
            AstOp::Add => "ADD",
            AstOp::Subtract => "SUBTRACT",
            AstOp::Multiply => "MULTIPLY",
            AstOp::Divide => "DIVIDE",
            AstOp::IntLit => "INTLIT",
            AstOp::StrLit => "STRLIT",
            AstOp::Ident => "IDENT",
            AstOp::Glue => "GLUE",
            AstOp::If => "IF",
            AstOp::While => "WHILE",
            AstOp::Function => "FUNCTION",
            AstOp::Widen => "WIDEN",
            AstOp::Return => "RETURN",
            AstOp::FuncCall => "FUNCCALL",
            AstOp::Deref => "DEREF",
            AstOp::Addr => "ADDR",
            AstOp::Scale => "SCALE",
            AstOp::PreInc => "PREINC",
            AstOp::PreDec => "PREDEC",
            AstOp::PostInc => "POSTINC",
            AstOp::PostDec => "POSTDEC",
            AstOp::Negate => "NEGATE",
            AstOp::Invert => "INVERT",
            AstOp::LogNot => "LOGNOT",
            AstOp::ToBool => "TOBOOL",
            AstOp::Break => "BREAK",
            AstOp::Continue => "CONTINUE",
            AstOp::Switch => "SWITCH",
            AstOp::Case => "CASE",
            AstOp::Default => "DEFAULT",
            AstOp::Cast => "CAST",
        }
    }
}

/// An AST node. `left`/`mid`/`right` are used per `AstOp` as documented on
/// each parser/codegen function; unused slots stay `None`.
///
/// - `IF` uses all three: cond/then/else.
/// - `WHILE` uses left/right: cond/body.
/// - `SWITCH` uses left for the selector and mid for a glue-list of
///   `CASE`/`DEFAULT` bodies.
/// - `GLUE` sequences left then right and carries no type.
#[derive(Debug, Clone)]
pub struct AstNode {
    pub op: AstOp,
    pub ty: PrimType,
    pub ctype: Option<SymId>,
    /// True when an `IDENT`/`DEREF` node should load its value (an
    /// rvalue); false when it should yield an address for assignment.
    pub rvalue: bool,
    pub left: Option<Box<AstNode>>,
    pub mid: Option<Box<AstNode>>,
    pub right: Option<Box<AstNode>>,
    pub sym: Option<SymId>,
    /// Set only on `IntLit` (value) and `Case` (the matched constant).
    pub int_value: Option<i64>,
    /// Set only on `Scale`: the pointed-to type's byte size.
    pub scale_size: Option<i64>,
}

impl AstNode {
    pub fn leaf(op: AstOp, ty: PrimType) -> Self {
        AstNode {
            op,
            ty,
            ctype: None,
            rvalue: true,
            left: None,
            mid: None,
            right: None,
            sym: None,
            int_value: None,
            scale_size: None,
        }
    }

    pub fn int_lit(value: i64, ty: PrimType) -> Self {
        AstNode {
            int_value: Some(value),
            ..AstNode::leaf(AstOp::IntLit, ty)
        }
    }

    pub fn ident(sym: SymId, ty: PrimType, rvalue: bool) -> Self {
        AstNode {
            sym: Some(sym),
            rvalue,
            ..AstNode::leaf(AstOp::Ident, ty)
        }
    }

    pub fn unary(op: AstOp, ty: PrimType, child: AstNode) -> Self {
        AstNode {
            left: Some(Box::new(child)),
            ..AstNode::leaf(op, ty)
        }
    }

    pub fn binary(op: AstOp, ty: PrimType, left: AstNode, right: AstNode) -> Self {
        AstNode {
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
            ..AstNode::leaf(op, ty)
        }
    }

    pub fn node(
        op: AstOp,
        ty: PrimType,
        left: Option<AstNode>,
        mid: Option<AstNode>,
        right: Option<AstNode>,
    ) -> Self {
        AstNode {
            left: left.map(Box::new),
            mid: mid.map(Box::new),
            right: right.map(Box::new),
            ..AstNode::leaf(op, ty)
        }
    }

    pub fn with_sym(mut self, sym: SymId) -> Self {
        self.sym = Some(sym);
        self
    }

    pub fn with_ctype(mut self, ctype: Option<SymId>) -> Self {
        self.ctype = ctype;
        self
    }

    pub fn glue(left: AstNode, right: AstNode) -> Self {
        AstNode::binary(AstOp::Glue, PrimType::NONE, left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_ops_are_identified() {
        assert!(AstOp::Eq.is_comparison());
        assert!(AstOp::Ge.is_comparison());
        assert!(!AstOp::Add.is_comparison());
    }

    #[test]
    fn leaf_has_no_children() {
        let n = AstNode::int_lit(7, PrimType::INT);
        assert!(n.left.is_none() && n.right.is_none() && n.mid.is_none());
        assert_eq!(n.int_value, Some(7));
    }
}
