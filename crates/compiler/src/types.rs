//! Primitive type encoding and coercion.
//!
//! A `PrimType` packs a base kind and a pointer-indirection count into one
//! integer, exactly as the original's `P_NONE=0, P_VOID=16, P_CHAR=32,
//! P_INT=48, P_LONG=64, P_STRUCT=80, P_UNION=96` family does: the low
//! nibble counts indirections (0 = the base type itself, 1 = pointer to
//! it, 2 = pointer to pointer to it, ...) and the rest of the value picks
//! the base. `modify_type` is the single place coercion/widening/pointer
//! scaling decisions get made, matching `types.c`.

use crate::ast::{AstNode, AstOp};
use crate::error::{CResult, CompileError};
use crate::symtab::{SymbolTable, SymId};

/// Bits used for the indirection count. A type already at the maximum
/// indirection cannot be pointed to again.
const INDIRECT_BITS: i32 = 4;
const INDIRECT_MASK: i32 = (1 << INDIRECT_BITS) - 1;
const MAX_INDIRECTION: i32 = INDIRECT_MASK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrimType(pub i32);

impl PrimType {
    pub const NONE: PrimType = PrimType(0);
    pub const VOID: PrimType = PrimType(16);
    pub const CHAR: PrimType = PrimType(32);
    pub const INT: PrimType = PrimType(48);
    pub const LONG: PrimType = PrimType(64);
    pub const STRUCT: PrimType = PrimType(80);
    pub const UNION: PrimType = PrimType(96);

    fn base(self) -> i32 {
        self.0 & !INDIRECT_MASK
    }

    fn indirection(self) -> i32 {
        self.0 & INDIRECT_MASK
    }

    pub fn is_int(self) -> bool {
        matches!(self.base(), b if b == Self::CHAR.0 || b == Self::INT.0 || b == Self::LONG.0) && self.indirection() == 0
    }

    pub fn is_ptr(self) -> bool {
        self.indirection() > 0
    }

    pub fn is_struct(self) -> bool {
        self.base() == Self::STRUCT.0 && self.indirection() == 0
    }

    pub fn is_union(self) -> bool {
        self.base() == Self::UNION.0 && self.indirection() == 0
    }

    pub fn is_void(self) -> bool {
        self == Self::VOID
    }

    /// `pointer_to`: one more level of indirection onto `self`.
    pub fn pointer_to(self) -> CResult<PrimType> {
        if self.indirection() >= MAX_INDIRECTION {
            return Err(CompileError::new("Unable to create a pointer to this type"));
        }
        Ok(PrimType(self.0 + 1))
    }

    /// `value_at`: one less level of indirection (dereference).
    pub fn value_at(self) -> CResult<PrimType> {
        if self.indirection() == 0 {
            return Err(CompileError::new("Unable to dereference a non-pointer type"));
        }
        Ok(PrimType(self.0 - 1))
    }

    /// Byte size of one value of this type. Struct/union sizes come from
    /// the tag symbol's recorded size, since the type code alone doesn't
    /// carry it.
    pub fn size(self, symtab: &SymbolTable, ctype: Option<SymId>) -> i64 {
        if self.is_ptr() {
            return 8;
        }
        if self.is_struct() || self.is_union() {
            return ctype.map(|id| symtab.get(id).size).unwrap_or(0);
        }
        match self {
            PrimType::CHAR => 1,
            PrimType::INT => 4,
            PrimType::LONG => 8,
            _ => 0,
        }
    }
}

/// Coerce `tree` (of its own recorded type) to `rtype`/`rctype`, inserting
/// a `WIDEN` or `SCALE` wrapper node where a silent conversion exists, or
/// failing where the original program is asking for one that doesn't.
///
/// `op` is the operator the coercion is happening for: `None` for a plain
/// assignment/return/parameter-passing context, `Some(Add)`/`Some(Subtract)`
/// for pointer arithmetic (so a pointer's scale factor can be applied),
/// `Some(LogOr)`/`Some(LogAnd)` for the logical operators (which only
/// require both sides to be scalar, never equal).
pub fn modify_type(
    tree: AstNode,
    symtab: &SymbolTable,
    rtype: PrimType,
    rctype: Option<SymId>,
    op: Option<AstOp>,
) -> CResult<AstNode> {
    let ltype = tree.ty;

    if ltype.is_void() || rtype.is_void() {
        return Err(CompileError::new("Illegal to use a void value"));
    }

    if matches!(op, Some(AstOp::LogOr) | Some(AstOp::LogAnd)) {
        if (ltype.is_int() || ltype.is_ptr()) && (rtype.is_int() || rtype.is_ptr()) {
            return Ok(tree);
        }
        return Err(CompileError::new("Incompatible types in logical expression"));
    }

    if ltype == rtype {
        return Ok(tree);
    }

    if (ltype.is_struct() || ltype.is_union() || rtype.is_struct() || rtype.is_union()) && ltype != rtype {
        return Err(CompileError::new("Incompatible struct/union types"));
    }

    // Pointer arithmetic: an integer offset against a pointer gets scaled
    // by the pointed-to type's size, unless that size is 1 (a `char *`
    // walks byte by byte, so only the integer-to-pointer-size widen is
    // needed, not a multiply).
    if matches!(op, Some(AstOp::Add) | Some(AstOp::Subtract)) {
        if ltype.is_int() && rtype.is_ptr() {
            let scale = rtype.value_at()?.size(symtab, rctype);
            if scale > 1 {
                let mut node = AstNode::unary(AstOp::Scale, rtype, tree);
                node.scale_size = Some(scale);
                node.ctype = rctype;
                return Ok(node);
            }
            let mut node = AstNode::unary(AstOp::Widen, rtype, tree);
            node.ctype = rctype;
            return Ok(node);
        }
    }

    if ltype.is_ptr() && rtype.is_ptr() {
        // `EQ..GE` are always permitted between pointer types, matching
        // types: even differently-typed pointers are comparable.
        if op.map(|op| op.is_comparison()).unwrap_or(false) {
            return Ok(tree);
        }
        // `void *` on the tree's own side is compatible with any other
        // pointer type.
        if ltype.base() == PrimType::VOID.0 {
            return Ok(tree);
        }
        return Err(CompileError::new("Incompatible pointer types"));
    }

    if ltype.is_ptr() != rtype.is_ptr() {
        return Err(CompileError::new("Incompatible types: pointer and non-pointer"));
    }

    // Two integer types of different width: only widening is automatic.
    if ltype.is_int() && rtype.is_int() {
        let lsize = ltype.size(symtab, None);
        let rsize = rtype.size(symtab, None);
        if lsize > rsize {
            return Err(CompileError::new("Cannot narrow type implicitly"));
        }
        let mut node = AstNode::unary(AstOp::Widen, rtype, tree);
        node.ctype = rctype;
        return Ok(node);
    }

    Err(CompileError::new("Incompatible types"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::SymbolTable;

    #[test]
    fn pointer_round_trips_through_value_at() {
        let p = PrimType::INT.pointer_to().unwrap();
        assert!(p.is_ptr());
        assert_eq!(p.value_at().unwrap(), PrimType::INT);
    }

    #[test]
    fn max_indirection_rejects_further_pointer_to() {
        let mut t = PrimType::INT;
        for _ in 0..MAX_INDIRECTION {
            t = t.pointer_to().unwrap();
        }
        assert!(t.pointer_to().is_err());
    }

    #[test]
    fn identical_types_pass_through_unchanged() {
        let symtab = SymbolTable::new();
        let tree = AstNode::int_lit(5, PrimType::INT);
        let out = modify_type(tree, &symtab, PrimType::INT, None, None).unwrap();
        assert_eq!(out.op, AstOp::IntLit);
    }

    #[test]
    fn narrower_to_wider_int_inserts_widen() {
        let symtab = SymbolTable::new();
        let tree = AstNode::int_lit(5, PrimType::CHAR);
        let out = modify_type(tree, &symtab, PrimType::INT, None, None).unwrap();
        assert_eq!(out.op, AstOp::Widen);
        assert_eq!(out.ty, PrimType::INT);
    }

    #[test]
    fn wider_to_narrower_int_is_rejected() {
        let symtab = SymbolTable::new();
        let tree = AstNode::int_lit(5, PrimType::LONG);
        assert!(modify_type(tree, &symtab, PrimType::CHAR, None, None).is_err());
    }

    #[test]
    fn pointer_arithmetic_scales_by_pointee_size() {
        let symtab = SymbolTable::new();
        let ptr = PrimType::INT.pointer_to().unwrap();
        let tree = AstNode::int_lit(1, PrimType::INT);
        let out = modify_type(tree, &symtab, ptr, None, Some(AstOp::Add)).unwrap();
        assert_eq!(out.op, AstOp::Scale);
        assert_eq!(out.scale_size, Some(4));
    }

    #[test]
    fn char_pointer_arithmetic_only_widens() {
        let symtab = SymbolTable::new();
        let ptr = PrimType::CHAR.pointer_to().unwrap();
        let tree = AstNode::int_lit(1, PrimType::INT);
        let out = modify_type(tree, &symtab, ptr, None, Some(AstOp::Add)).unwrap();
        assert_eq!(out.op, AstOp::Widen);
    }

    #[test]
    fn struct_coercion_is_rejected() {
        let symtab = SymbolTable::new();
        let tree = AstNode::leaf(AstOp::Ident, PrimType::STRUCT);
        assert!(modify_type(tree, &symtab, PrimType::INT, None, None).is_err());
    }

    #[test]
    fn void_pointer_is_compatible_with_any_pointer() {
        let symtab = SymbolTable::new();
        let void_ptr = PrimType::VOID.pointer_to().unwrap();
        let int_ptr = PrimType::INT.pointer_to().unwrap();
        let tree = AstNode::leaf(AstOp::Ident, void_ptr);
        let out = modify_type(tree, &symtab, int_ptr, None, None).unwrap();
        assert_eq!(out.ty, void_ptr);
    }

    #[test]
    fn differently_typed_pointers_compare_without_coercion() {
        let symtab = SymbolTable::new();
        let int_ptr = PrimType::INT.pointer_to().unwrap();
        let char_ptr = PrimType::CHAR.pointer_to().unwrap();
        let tree = AstNode::leaf(AstOp::Ident, int_ptr);
        let out = modify_type(tree, &symtab, char_ptr, None, Some(AstOp::Eq)).unwrap();
        assert_eq!(out.ty, int_ptr);
    }

    #[test]
    fn differently_typed_pointers_reject_outside_a_comparison() {
        let symtab = SymbolTable::new();
        let int_ptr = PrimType::INT.pointer_to().unwrap();
        let char_ptr = PrimType::CHAR.pointer_to().unwrap();
        let tree = AstNode::leaf(AstOp::Ident, int_ptr);
        assert!(modify_type(tree, &symtab, char_ptr, None, None).is_err());
    }
}
