//! Declarations: globals, functions, structs/unions/enums, typedefs.

use super::Parser;
use crate::ast::AstNode;
use crate::error::CResult;
use crate::scan::TokenKind;
use crate::symtab::{StorageClass, StructuralType, SymId};
use crate::types::PrimType;

impl Parser {
    /// One top-level declaration. Returns `Some(function_ast)` for a
    /// function definition, `None` for a prototype, global variable,
    /// struct/union/enum/typedef declaration — anything that doesn't
    /// itself produce a tree to code-generate.
    pub(super) fn global_declaration(&mut self) -> CResult<Option<AstNode>> {
        match self.peek() {
            TokenKind::Enum => {
                self.enum_declaration()?;
                self.expect(TokenKind::Semi)?;
                Ok(None)
            }
            TokenKind::Typedef => {
                self.typedef_declaration()?;
                Ok(None)
            }
            _ => self.var_or_func_declaration(),
        }
    }

    fn storage_class(&mut self) -> CResult<StorageClass> {
        if self.matches(TokenKind::Extern)? {
            Ok(StorageClass::Extern)
        } else if self.matches(TokenKind::Static)? {
            Ok(StorageClass::Static)
        } else {
            Ok(StorageClass::Global)
        }
    }

    fn var_or_func_declaration(&mut self) -> CResult<Option<AstNode>> {
        let class = self.storage_class()?;
        let (ty, ctype) = self.parse_type()?;

        // A bare `struct Foo { ... };` / `enum { ... };` tag declaration:
        // the type was fully consumed above, nothing left but the
        // terminator.
        if self.matches(TokenKind::Semi)? {
            return Ok(None);
        }

        let name = self.expect(TokenKind::Ident)?.text;

        if self.peek() == TokenKind::LParen {
            return self.function_declaration(name, ty, ctype);
        }

        self.global_var_declaration(name, ty, ctype, class)?;
        while self.matches(TokenKind::Comma)? {
            let name = self.expect(TokenKind::Ident)?.text;
            self.global_var_declaration(name, ty, ctype, class)?;
        }
        self.expect(TokenKind::Semi)?;
        Ok(None)
    }

    fn global_var_declaration(
        &mut self,
        name: String,
        ty: PrimType,
        ctype: Option<SymId>,
        class: StorageClass,
    ) -> CResult<SymId> {
        if self.matches(TokenKind::LBracket)? {
            let nelems = if self.peek() != TokenKind::RBracket {
                self.expect(TokenKind::IntLit)?.int_value
            } else {
                0
            };
            self.expect(TokenKind::RBracket)?;
            let elem_ty = ty.pointer_to().map_err(|_| self.error("Array element type too deeply indirected"))?;
            let id = self.symtab.add_global(&name, elem_ty, ctype, StructuralType::Array, class);
            self.symtab.get_mut(id).nelems = nelems;
            self.symtab.get_mut(id).size = nelems * elem_ty.value_at().unwrap().size(&self.symtab, ctype);
            if self.matches(TokenKind::Assign)? {
                self.parse_initialiser(id)?;
            }
            Ok(id)
        } else {
            let id = self.symtab.add_global(&name, ty, ctype, StructuralType::Variable, class);
            self.symtab.get_mut(id).size = ty.size(&self.symtab, ctype);
            if self.matches(TokenKind::Assign)? {
                self.parse_initialiser(id)?;
            }
            Ok(id)
        }
    }

    /// `= literal` or `= { literal, literal, ... }` — global initialisers
    /// are restricted to comma-separated literal lists (§6).
    fn parse_initialiser(&mut self, id: SymId) -> CResult<()> {
        if self.matches(TokenKind::LBrace)? {
            loop {
                let v = self.constant_literal()?;
                self.symtab.get_mut(id).initlist.push(v);
                if !self.matches(TokenKind::Comma)? {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
        } else {
            let v = self.constant_literal()?;
            self.symtab.get_mut(id).initlist.push(v);
        }
        Ok(())
    }

    fn function_declaration(&mut self, name: String, ty: PrimType, ctype: Option<SymId>) -> CResult<Option<AstNode>> {
        self.expect(TokenKind::LParen)?;
        let existing_proto = self.symtab.find_global(&name);

        let sym = existing_proto.unwrap_or_else(|| {
            self.symtab.add_global(&name, ty, ctype, StructuralType::Function, StorageClass::Global)
        });

        let mut params = Vec::new();
        if self.peek() != TokenKind::RParen {
            loop {
                let (pty, pctype) = self.parse_type()?;
                let pname = if self.peek() == TokenKind::Ident {
                    self.advance()?.text
                } else {
                    String::new()
                };
                let pid = self.symtab.add_param(&pname, pty, pctype, StructuralType::Variable);
                self.symtab.get_mut(pid).size = pty.size(&self.symtab, pctype);
                params.push(pid);
                if !self.matches(TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        if existing_proto.is_none() {
            self.symtab.get_mut(sym).member = params.clone();
            self.symtab.get_mut(sym).nelems = params.len() as i64;
        } else {
            let proto_params = self.symtab.get(sym).member.clone();
            if proto_params.len() != params.len() {
                return Err(self.error(format!("Parameter count mismatch in definition of {name}")));
            }
            for (proto, def) in proto_params.iter().zip(params.iter()) {
                if self.symtab.get(*proto).ty != self.symtab.get(*def).ty {
                    return Err(self.error(format!("Parameter type mismatch in definition of {name}")));
                }
            }
            self.symtab.get_mut(sym).member = params.clone();
        }

        if self.matches(TokenKind::Semi)? {
            // Prototype only: params were scratch entries for signature
            // checking, not a live local scope.
            self.symtab.params.clear();
            return Ok(None);
        }

        self.symtab.current_function = Some(sym);
        self.symtab.copy_func_params(sym);
        let body = self.compound_statement()?;
        // Offsets must be assigned while this function's locals/params are
        // still live in the symbol table's scratch lists; codegen runs in
        // a later pass once every function has been parsed and those
        // lists have been recycled for the next one.
        crate::codegen::assign_frame_offsets(&mut self.symtab, sym);
        self.symtab.free_local_syms();

        Ok(Some(AstNode::node(crate::ast::AstOp::Function, PrimType::NONE, Some(body), None, None).with_sym(sym)))
    }

    pub(super) fn parse_composite_body(&mut self, id: SymId) -> CResult<()> {
        self.expect(TokenKind::LBrace)?;
        let mut offset: i64 = 0;
        let mut members = Vec::new();
        loop {
            let (ty, ctype) = self.parse_type()?;
            let name = self.expect(TokenKind::Ident)?.text;
            let size = ty.size(&self.symtab, ctype).max(1);
            // char: any offset; int/long/pointer/struct/union: rounded up
            // to a 4-byte multiple, so a wider member never straddles the
            // boundary a narrower one before it left unaligned.
            if size > 1 {
                offset = (offset + 3) / 4 * 4;
            }
            let member_id = self.symtab.add_member(&name, ty, ctype, StructuralType::Variable);
            self.symtab.get_mut(member_id).posn = offset;
            offset += size;
            members.push(member_id);
            self.expect(TokenKind::Semi)?;
            if self.peek() == TokenKind::RBrace {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        self.symtab.get_mut(id).member = members;
        self.symtab.get_mut(id).size = offset;
        Ok(())
    }

    fn enum_declaration(&mut self) -> CResult<()> {
        self.expect(TokenKind::Enum)?;
        let name = if self.peek() == TokenKind::Ident {
            self.advance()?.text
        } else {
            String::new()
        };
        if !name.is_empty() {
            self.symtab.add_enum_type(&name);
        }
        self.expect(TokenKind::LBrace)?;
        let mut next_value = 0i64;
        loop {
            let member_name = self.expect(TokenKind::Ident)?.text;
            if self.matches(TokenKind::Assign)? {
                next_value = self.constant_literal()?;
            }
            self.symtab.add_enum_val(&member_name, next_value);
            next_value += 1;
            if !self.matches(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(())
    }

    fn typedef_declaration(&mut self) -> CResult<()> {
        self.expect(TokenKind::Typedef)?;
        let (ty, ctype) = self.parse_type()?;
        let name = self.expect(TokenKind::Ident)?.text;
        self.symtab.add_typedef(&name, ty, ctype);
        self.expect(TokenKind::Semi)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse;

    #[test]
    fn struct_members_narrower_than_a_word_are_packed_but_wider_ones_align() {
        let prog = parse("struct s { char c; int x; long y; }; int main() { return 0; }").unwrap();
        let id = prog.symtab.find_struct("s").unwrap();
        let members = &prog.symtab.get(id).member;
        assert_eq!(prog.symtab.get(members[0]).posn, 0);
        assert_eq!(prog.symtab.get(members[1]).posn, 4);
        assert_eq!(prog.symtab.get(members[2]).posn, 8);
        assert_eq!(prog.symtab.get(id).size, 16);
    }

    #[test]
    fn leading_chars_need_no_padding_before_the_next_char() {
        let prog = parse("struct s { char a; char b; int x; }; int main() { return 0; }").unwrap();
        let id = prog.symtab.find_struct("s").unwrap();
        let members = &prog.symtab.get(id).member;
        assert_eq!(prog.symtab.get(members[0]).posn, 0);
        assert_eq!(prog.symtab.get(members[1]).posn, 1);
        assert_eq!(prog.symtab.get(members[2]).posn, 4);
    }

    #[test]
    fn function_prototype_then_definition_with_matching_params_is_accepted() {
        let prog = parse("int add(int a, int b); int add(int a, int b) { return a + b; } int main() { return 0; }").unwrap();
        assert_eq!(prog.functions.len(), 2);
    }

    #[test]
    fn function_definition_with_mismatched_param_count_is_rejected() {
        let err = parse("int add(int a, int b); int add(int a) { return a; } int main() { return 0; }");
        assert!(err.is_err());
    }

    #[test]
    fn function_definition_with_mismatched_param_type_is_rejected() {
        let err = parse("int add(int a); int add(long a) { return a; } int main() { return 0; }");
        assert!(err.is_err());
    }

    #[test]
    fn global_array_declaration_records_element_count_and_size() {
        let prog = parse("int nums[10]; int main() { return 0; }").unwrap();
        let id = prog.symtab.find_global("nums").unwrap();
        assert_eq!(prog.symtab.get(id).nelems, 10);
        assert_eq!(prog.symtab.get(id).size, 40);
    }

    #[test]
    fn enum_members_default_to_sequential_values_from_zero() {
        let prog = parse("enum { RED, GREEN, BLUE }; int main() { return 0; }").unwrap();
        assert_eq!(prog.symtab.get(prog.symtab.find_enum_val("RED").unwrap()).posn, 0);
        assert_eq!(prog.symtab.get(prog.symtab.find_enum_val("GREEN").unwrap()).posn, 1);
        assert_eq!(prog.symtab.get(prog.symtab.find_enum_val("BLUE").unwrap()).posn, 2);
    }

    #[test]
    fn typedef_introduces_a_usable_type_name() {
        let prog = parse("typedef int myint; int main() { myint x; x = 1; return x; }").unwrap();
        assert!(prog.symtab.find_typedef("myint").is_some());
    }
}
