//! Symbol tables.
//!
//! The original keeps eight singly-linked lists of `struct symtable` nodes
//! (globals, locals, params, struct/union members, struct types, union
//! types, enums, typedefs) with cross-references between a struct/union
//! symbol and its member list. Rust's borrow checker makes that graph of
//! raw `next`/`member` pointers awkward, so symbols live in one arena
//! (`Vec<Symbol>`) and every list is a `Vec<SymId>` of indices into it —
//! the "model with indices into a single arena" resolution to `spec.md`
//! §9's "cyclic references (symbol ↔ composite type)" design note.

use crate::types::PrimType;

/// Index into the symbol arena. `next`/`member` in the original become
/// plain `Vec<SymId>` membership in a list, so no `SymId` is itself a
/// linked-list pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralType {
    Variable,
    Function,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Global,
    Local,
    Param,
    Extern,
    Static,
    Struct,
    Union,
    Member,
    EnumType,
    EnumVal,
    Typedef,
}

/// One symbol-table node. Matches `struct symtable` field for field.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: PrimType,
    /// For struct/union-typed symbols, or for a struct/union/enum tag
    /// itself, the composite descriptor (itself a `Symbol` of class
    /// `Struct`/`Union`/`EnumType`) whose `member` list holds the fields.
    pub ctype: Option<SymId>,
    pub stype: StructuralType,
    pub class: StorageClass,
    /// Byte size of this symbol's storage.
    pub size: i64,
    /// Arrays: element count. Functions: parameter count.
    pub nelems: i64,
    /// Functions: the generated end label. Locals/params: the
    /// frame-relative (negative) offset. Enum values: the constant value.
    pub posn: i64,
    pub initlist: Vec<i64>,
    /// Function params / struct-union members / enum values headed here.
    pub member: Vec<SymId>,
}

impl Symbol {
    fn new(name: &str, ty: PrimType, ctype: Option<SymId>, stype: StructuralType, class: StorageClass) -> Self {
        Symbol {
            name: name.to_string(),
            ty,
            ctype,
            stype,
            class,
            size: 0,
            nelems: 0,
            posn: 0,
            initlist: Vec::new(),
            member: Vec::new(),
        }
    }
}

/// All eight symbol lists plus the arena that owns every `Symbol`.
#[derive(Debug, Default)]
pub struct SymbolTable {
    arena: Vec<Symbol>,
    pub globals: Vec<SymId>,
    pub locals: Vec<SymId>,
    pub params: Vec<SymId>,
    pub members: Vec<SymId>,
    pub structs: Vec<SymId>,
    pub unions: Vec<SymId>,
    pub enums: Vec<SymId>,
    pub typedefs: Vec<SymId>,
    /// Symbols of class `Static` moved aside between functions so that
    /// they survive the translation unit but never resolve from outside
    /// the file that declared them (`freestaticsyms` in the original).
    pub statics: Vec<SymId>,
    /// The function currently being parsed, if any (`Functionid`).
    pub current_function: Option<SymId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn get(&self, id: SymId) -> &Symbol {
        &self.arena[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SymId) -> &mut Symbol {
        &mut self.arena[id.0 as usize]
    }

    fn alloc(&mut self, sym: Symbol) -> SymId {
        let id = SymId(self.arena.len() as u32);
        self.arena.push(sym);
        id
    }

    fn append(
        &mut self,
        name: &str,
        ty: PrimType,
        ctype: Option<SymId>,
        stype: StructuralType,
        class: StorageClass,
        list: impl Fn(&mut Self) -> &mut Vec<SymId>,
    ) -> SymId {
        let id = self.alloc(Symbol::new(name, ty, ctype, stype, class));
        list(self).push(id);
        id
    }

    pub fn add_global(
        &mut self,
        name: &str,
        ty: PrimType,
        ctype: Option<SymId>,
        stype: StructuralType,
        class: StorageClass,
    ) -> SymId {
        self.append(name, ty, ctype, stype, class, |s| &mut s.globals)
    }

    pub fn add_local(&mut self, name: &str, ty: PrimType, ctype: Option<SymId>, stype: StructuralType) -> SymId {
        self.append(name, ty, ctype, stype, StorageClass::Local, |s| &mut s.locals)
    }

    pub fn add_param(&mut self, name: &str, ty: PrimType, ctype: Option<SymId>, stype: StructuralType) -> SymId {
        self.append(name, ty, ctype, stype, StorageClass::Param, |s| &mut s.params)
    }

    pub fn add_member(&mut self, name: &str, ty: PrimType, ctype: Option<SymId>, stype: StructuralType) -> SymId {
        self.append(name, ty, ctype, stype, StorageClass::Member, |s| &mut s.members)
    }

    pub fn add_struct(&mut self, name: &str) -> SymId {
        self.append(name, PrimType::STRUCT, None, StructuralType::Variable, StorageClass::Struct, |s| {
            &mut s.structs
        })
    }

    pub fn add_union(&mut self, name: &str) -> SymId {
        self.append(name, PrimType::UNION, None, StructuralType::Variable, StorageClass::Union, |s| {
            &mut s.unions
        })
    }

    pub fn add_enum_type(&mut self, name: &str) -> SymId {
        self.append(name, PrimType::INT, None, StructuralType::Variable, StorageClass::EnumType, |s| {
            &mut s.enums
        })
    }

    pub fn add_enum_val(&mut self, name: &str, value: i64) -> SymId {
        let id = self.append(name, PrimType::INT, None, StructuralType::Variable, StorageClass::EnumVal, |s| {
            &mut s.enums
        });
        self.get_mut(id).posn = value;
        id
    }

    pub fn add_typedef(&mut self, name: &str, ty: PrimType, ctype: Option<SymId>) -> SymId {
        self.append(name, ty, ctype, StructuralType::Variable, StorageClass::Typedef, |s| {
            &mut s.typedefs
        })
    }

    fn find_in(&self, list: &[SymId], name: &str, class: Option<StorageClass>) -> Option<SymId> {
        list.iter()
            .copied()
            .find(|&id| {
                let sym = self.get(id);
                sym.name == name && class.map(|c| c == sym.class).unwrap_or(true)
            })
    }

    pub fn find_global(&self, name: &str) -> Option<SymId> {
        self.find_in(&self.globals, name, None)
    }

    /// Resolution order on identifier use per §4.2: parameters of the
    /// current function, then locals, then globals.
    pub fn find_symbol(&self, name: &str) -> Option<SymId> {
        if let Some(func) = self.current_function {
            if let Some(id) = self.find_in(&self.get(func).member, name, None) {
                return Some(id);
            }
        }
        self.find_in(&self.locals, name, None)
            .or_else(|| self.find_global(name))
    }

    pub fn find_member(&self, name: &str) -> Option<SymId> {
        self.find_in(&self.members, name, None)
    }

    pub fn find_struct(&self, name: &str) -> Option<SymId> {
        self.find_in(&self.structs, name, None)
    }

    pub fn find_union(&self, name: &str) -> Option<SymId> {
        self.find_in(&self.unions, name, None)
    }

    pub fn find_enum_type(&self, name: &str) -> Option<SymId> {
        self.find_in(&self.enums, name, Some(StorageClass::EnumType))
    }

    pub fn find_enum_val(&self, name: &str) -> Option<SymId> {
        self.find_in(&self.enums, name, Some(StorageClass::EnumVal))
    }

    pub fn find_typedef(&self, name: &str) -> Option<SymId> {
        self.find_in(&self.typedefs, name, None)
    }

    /// `copyfuncparams`: clone the function's parameter sub-list into the
    /// current local/param lists on entering its body.
    pub fn copy_func_params(&mut self, func: SymId) {
        self.params = self.get(func).member.clone();
    }

    /// `freeloclsyms`.
    pub fn free_local_syms(&mut self) {
        self.locals.clear();
        self.params.clear();
        self.current_function = None;
    }

    /// `freestaticsyms`: static globals are kept (in `statics`) but no
    /// longer resolve as globals once the file that declared them ends.
    pub fn free_static_syms(&mut self) {
        let drained: Vec<SymId> = self.globals.drain(..).collect();
        let (statics, rest): (Vec<SymId>, Vec<SymId>) = drained
            .into_iter()
            .partition(|&id| self.get(id).class == StorageClass::Static);
        self.globals = rest;
        self.statics.extend(statics);
    }

    /// `clear_symtable`: reset everything for a new translation unit.
    pub fn clear(&mut self) {
        *self = SymbolTable::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_order_prefers_params_then_locals_then_globals() {
        let mut st = SymbolTable::new();
        st.add_global("x", PrimType::INT, None, StructuralType::Variable, StorageClass::Global);
        let func = st.add_global("f", PrimType::INT, None, StructuralType::Function, StorageClass::Global);
        let param = st.add_param("x", PrimType::CHAR, None, StructuralType::Variable);
        st.get_mut(func).member.push(param);
        st.current_function = Some(func);

        let found = st.find_symbol("x").unwrap();
        assert_eq!(st.get(found).ty, PrimType::CHAR);
    }

    #[test]
    fn static_globals_survive_free_but_stop_resolving() {
        let mut st = SymbolTable::new();
        st.add_global("counter", PrimType::INT, None, StructuralType::Variable, StorageClass::Static);
        st.free_static_syms();
        assert!(st.find_global("counter").is_none());
        assert_eq!(st.statics.len(), 1);
    }
}
