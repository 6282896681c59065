//! Programmatic construction of bound compilation units.
//!
//! The binder front-end is an external collaborator, so tests (and demos)
//! assemble its output directly: definitions, symbols, and bound trees.
//! [`UnitBuilder`] keeps that assembly compact: one call per declaration or
//! operation, syntax ids allocated behind the scenes.

use crate::lang::{
    AnonymousMember, Argument, BinaryOperator, BoundTree, CompilationUnit, ConversionKind,
    DeclaredType, DefId, EventSymbol, FieldSymbol, Initializer, InstanceKind, LocalSymbol,
    MemberBody, MethodSymbol, NullableAnnotation, OpId, Operation, ParameterSymbol, Pattern,
    PropertySymbol, RefKind, SwitchArm, Symbol, SymbolId, SymbolKind, SyntaxId, Ty, TypeDefKind,
    TypeParamDecl, TypeSyntax,
};

/// A declared method and its parameter symbols.
pub struct MethodHandle {
    pub symbol: SymbolId,
    pub params: Vec<SymbolId>,
}

/// Builds a [`CompilationUnit`] with a single bound tree.
pub struct UnitBuilder {
    pub unit: CompilationUnit,
    tree: BoundTree,
    /// The class declared members hang off by default.
    pub container: DefId,
}

impl UnitBuilder {
    pub fn new() -> Self {
        let mut unit = CompilationUnit::new();
        let object = unit.defs.builtins.object;
        let container = unit.defs.add(
            "Program",
            "Demo.Program",
            TypeDefKind::Class,
            Vec::new(),
            vec![Ty::named(object)],
        );
        UnitBuilder {
            unit,
            tree: BoundTree::new("demo.src"),
            container,
        }
    }

    pub fn finish(mut self) -> CompilationUnit {
        self.unit.trees.push(self.tree);
        self.unit
    }

    /// Close the current tree and start another; trees keep build order.
    pub fn next_tree(&mut self, path: &str) {
        let done = std::mem::replace(&mut self.tree, BoundTree::new(path));
        self.unit.trees.push(done);
    }

    // ----- type syntax -----

    pub fn named_ty(&mut self, def: DefId) -> TypeSyntax {
        TypeSyntax::Named {
            id: self.tree.fresh_syntax(),
            def,
            args: Vec::new(),
            nullable: false,
        }
    }

    pub fn nullable_named_ty(&mut self, def: DefId) -> TypeSyntax {
        TypeSyntax::Named {
            id: self.tree.fresh_syntax(),
            def,
            args: Vec::new(),
            nullable: true,
        }
    }

    pub fn generic_ty(&mut self, def: DefId, args: Vec<TypeSyntax>) -> TypeSyntax {
        TypeSyntax::Named {
            id: self.tree.fresh_syntax(),
            def,
            args,
            nullable: false,
        }
    }

    pub fn string_ty(&mut self) -> TypeSyntax {
        let def = self.unit.defs.builtins.string;
        self.named_ty(def)
    }

    pub fn nullable_string_ty(&mut self) -> TypeSyntax {
        let def = self.unit.defs.builtins.string;
        self.nullable_named_ty(def)
    }

    pub fn object_ty(&mut self) -> TypeSyntax {
        let def = self.unit.defs.builtins.object;
        self.named_ty(def)
    }

    pub fn int_ty(&mut self) -> TypeSyntax {
        let def = self.unit.defs.builtins.int32;
        self.named_ty(def)
    }

    pub fn nullable_int_ty(&mut self) -> TypeSyntax {
        let def = self.unit.defs.builtins.int32;
        self.nullable_named_ty(def)
    }

    pub fn bool_ty(&mut self) -> TypeSyntax {
        let def = self.unit.defs.builtins.boolean;
        self.named_ty(def)
    }

    pub fn void_ty(&mut self) -> TypeSyntax {
        let def = self.unit.defs.builtins.void;
        self.named_ty(def)
    }

    pub fn array_ty(&mut self, elem: TypeSyntax) -> TypeSyntax {
        TypeSyntax::Array {
            id: self.tree.fresh_syntax(),
            elem: Box::new(elem),
            nullable: false,
        }
    }

    pub fn var_ty(&mut self) -> TypeSyntax {
        TypeSyntax::Implicit {
            id: self.tree.fresh_syntax(),
        }
    }

    pub fn fn_ty(&mut self, params: Vec<TypeSyntax>, ret: TypeSyntax) -> TypeSyntax {
        TypeSyntax::Fn {
            id: self.tree.fresh_syntax(),
            params,
            ret: Box::new(ret),
        }
    }

    pub fn method_param_ty(&mut self, ordinal: u32) -> TypeSyntax {
        TypeSyntax::Param {
            id: self.tree.fresh_syntax(),
            param: crate::lang::TypeParamRef {
                owner: crate::lang::TypeParamOwner::Method,
                ordinal,
            },
            nullable: false,
        }
    }

    // ----- declarations -----

    pub fn method(
        &mut self,
        name: &str,
        ret: TypeSyntax,
        params: Vec<(&str, TypeSyntax)>,
    ) -> MethodHandle {
        let params = params
            .into_iter()
            .map(|(n, ty)| (n.to_string(), ty, RefKind::None))
            .collect();
        self.method_with(name, ret, params, Vec::new(), false)
    }

    pub fn method_with(
        &mut self,
        name: &str,
        ret: TypeSyntax,
        params: Vec<(String, TypeSyntax, RefKind)>,
        type_params: Vec<TypeParamDecl>,
        is_async: bool,
    ) -> MethodHandle {
        let handle = self.method_symbol(name, ret, params, type_params, is_async);
        self.tree.declares.push(handle.symbol);
        handle
    }

    /// A method-shaped symbol that is not declared in the tree: the shape
    /// lambdas and local functions use.
    pub fn lambda_symbol(
        &mut self,
        params: Vec<(&str, TypeSyntax)>,
        ret: TypeSyntax,
    ) -> MethodHandle {
        let params = params
            .into_iter()
            .map(|(n, ty)| (n.to_string(), ty, RefKind::None))
            .collect();
        self.method_symbol("<lambda>", ret, params, Vec::new(), false)
    }

    fn method_symbol(
        &mut self,
        name: &str,
        ret: TypeSyntax,
        params: Vec<(String, TypeSyntax, RefKind)>,
        type_params: Vec<TypeParamDecl>,
        is_async: bool,
    ) -> MethodHandle {
        let container = self.container;
        let param_ids: Vec<SymbolId> = params
            .into_iter()
            .enumerate()
            .map(|(i, (param_name, ty, ref_kind))| {
                self.unit.symbols.alloc(Symbol {
                    id: SymbolId::NONE,
                    name: param_name,
                    container,
                    is_static: false,
                    is_external: false,
                    kind: SymbolKind::Parameter(ParameterSymbol {
                        ty: DeclaredType::Syntax(ty),
                        ordinal: i as u32,
                        ref_kind,
                        method: SymbolId::NONE,
                    }),
                })
            })
            .collect();
        let method = self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container,
            is_static: true,
            is_external: false,
            kind: SymbolKind::Method(MethodSymbol {
                ret: DeclaredType::Syntax(ret),
                params: param_ids.clone(),
                type_params,
                is_async,
                accessor_of: None,
                is_setter: false,
            }),
        });
        for &param in &param_ids {
            if let SymbolKind::Parameter(p) = &mut self.unit.symbols.get_mut(param).kind {
                p.method = method;
            }
        }
        MethodHandle {
            symbol: method,
            params: param_ids,
        }
    }

    pub fn field(&mut self, name: &str, ty: TypeSyntax) -> SymbolId {
        let field = self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container: self.container,
            is_static: false,
            is_external: false,
            kind: SymbolKind::Field(FieldSymbol {
                ty: DeclaredType::Syntax(ty),
            }),
        });
        self.tree.declares.push(field);
        field
    }

    pub fn event(&mut self, name: &str, ty: TypeSyntax) -> SymbolId {
        let event = self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container: self.container,
            is_static: false,
            is_external: false,
            kind: SymbolKind::Event(EventSymbol {
                ty: DeclaredType::Syntax(ty),
            }),
        });
        self.tree.declares.push(event);
        event
    }

    pub fn property(&mut self, name: &str, ty: TypeSyntax) -> SymbolId {
        let property = self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container: self.container,
            is_static: false,
            is_external: false,
            kind: SymbolKind::Property(PropertySymbol {
                ty: DeclaredType::Syntax(ty),
                params: Vec::new(),
            }),
        });
        self.tree.declares.push(property);
        property
    }

    /// The set accessor of a property, with its implicit `value` parameter.
    pub fn setter_for(&mut self, property: SymbolId) -> MethodHandle {
        let container = self.container;
        let name = format!("set_{}", self.unit.symbols.get(property).name);
        let ordinal = self.unit.symbols.get(property).as_property().params.len() as u32;
        let ret = self.void_ty();
        let setter = self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name,
            container,
            is_static: false,
            is_external: false,
            kind: SymbolKind::Method(MethodSymbol {
                ret: DeclaredType::Syntax(ret),
                params: Vec::new(),
                type_params: Vec::new(),
                is_async: false,
                accessor_of: Some(property),
                is_setter: true,
            }),
        });
        let value_ty = self.var_ty();
        let value = self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: "value".to_string(),
            container,
            is_static: false,
            is_external: false,
            kind: SymbolKind::Parameter(ParameterSymbol {
                ty: DeclaredType::Syntax(value_ty),
                ordinal,
                ref_kind: RefKind::None,
                method: setter,
            }),
        });
        if let SymbolKind::Method(m) = &mut self.unit.symbols.get_mut(setter).kind {
            m.params.push(value);
        }
        self.tree.declares.push(setter);
        MethodHandle {
            symbol: setter,
            params: vec![value],
        }
    }

    pub fn local(&mut self, name: &str, ty: TypeSyntax) -> SymbolId {
        self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container: DefId::NONE,
            is_static: false,
            is_external: false,
            kind: SymbolKind::Local(LocalSymbol { ty }),
        })
    }

    pub fn var_local(&mut self, name: &str) -> SymbolId {
        let ty = self.var_ty();
        self.local(name, ty)
    }

    // ----- external declarations -----

    pub fn external_method(
        &mut self,
        container: DefId,
        name: &str,
        is_static: bool,
        type_params: Vec<TypeParamDecl>,
        params: Vec<(Ty, NullableAnnotation, RefKind)>,
        ret: (Ty, NullableAnnotation),
    ) -> MethodHandle {
        let param_ids: Vec<SymbolId> = params
            .into_iter()
            .enumerate()
            .map(|(i, (ty, annotation, ref_kind))| {
                self.unit.symbols.alloc(Symbol {
                    id: SymbolId::NONE,
                    name: format!("arg{i}"),
                    container,
                    is_static: false,
                    is_external: true,
                    kind: SymbolKind::Parameter(ParameterSymbol {
                        ty: DeclaredType::External { ty: Some(ty), annotation },
                        ordinal: i as u32,
                        ref_kind,
                        method: SymbolId::NONE,
                    }),
                })
            })
            .collect();
        let method = self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container,
            is_static,
            is_external: true,
            kind: SymbolKind::Method(MethodSymbol {
                ret: DeclaredType::External {
                    ty: Some(ret.0),
                    annotation: ret.1,
                },
                params: param_ids.clone(),
                type_params,
                is_async: false,
                accessor_of: None,
                is_setter: false,
            }),
        });
        for &param in &param_ids {
            if let SymbolKind::Parameter(p) = &mut self.unit.symbols.get_mut(param).kind {
                p.method = method;
            }
        }
        MethodHandle {
            symbol: method,
            params: param_ids,
        }
    }

    pub fn external_property(
        &mut self,
        container: DefId,
        name: &str,
        ty: Ty,
        annotation: NullableAnnotation,
    ) -> SymbolId {
        self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container,
            is_static: false,
            is_external: true,
            kind: SymbolKind::Property(PropertySymbol {
                ty: DeclaredType::External { ty: Some(ty), annotation },
                params: Vec::new(),
            }),
        })
    }

    // ----- operations -----

    fn op(&mut self, build: impl FnOnce(SyntaxId) -> Operation) -> OpId {
        let syntax = self.tree.fresh_syntax();
        let operation = build(syntax);
        self.tree.alloc(operation)
    }

    pub fn null_lit(&mut self) -> OpId {
        self.op(|syntax| Operation::NullLiteral { syntax })
    }

    pub fn string_lit(&mut self, value: &str) -> OpId {
        let value = value.to_string();
        self.op(|syntax| Operation::StringLiteral { value, syntax })
    }

    pub fn int_lit(&mut self) -> OpId {
        let ty = Ty::named(self.unit.defs.builtins.int32);
        self.op(|syntax| Operation::ValueLiteral { ty, syntax })
    }

    pub fn param_ref(&mut self, symbol: SymbolId) -> OpId {
        self.op(|syntax| Operation::ParameterRef { symbol, syntax })
    }

    /// A parameter use dominated by a proven null check.
    pub fn param_ref_flowed(&mut self, symbol: SymbolId) -> OpId {
        let syntax = self.tree.fresh_syntax();
        self.tree.mark_nonnull(syntax);
        self.tree.alloc(Operation::ParameterRef { symbol, syntax })
    }

    pub fn local_ref(&mut self, symbol: SymbolId) -> OpId {
        self.op(|syntax| Operation::LocalRef { symbol, syntax })
    }

    pub fn this_ref(&mut self, ty: Ty) -> OpId {
        self.op(|syntax| Operation::InstanceRef {
            kind: InstanceKind::This,
            ty,
            syntax,
        })
    }

    pub fn implicit_receiver(&mut self) -> OpId {
        let ty = Ty::named(self.unit.defs.builtins.object);
        self.op(|syntax| Operation::InstanceRef {
            kind: InstanceKind::ImplicitReceiver,
            ty,
            syntax,
        })
    }

    pub fn member_ref(&mut self, symbol: SymbolId, receiver: Option<OpId>) -> OpId {
        self.op(|syntax| Operation::MemberRef {
            symbol,
            receiver,
            qualifier: None,
            syntax,
        })
    }

    pub fn assign(&mut self, target: OpId, value: OpId) -> OpId {
        self.op(|syntax| Operation::Assignment { target, value, syntax })
    }

    pub fn invoke(&mut self, method: SymbolId, receiver: Option<OpId>, args: Vec<OpId>) -> OpId {
        let args = args.into_iter().map(Argument::by_value).collect();
        self.op(|syntax| Operation::Invocation {
            method,
            receiver,
            qualifier: None,
            type_args: None,
            args,
            syntax,
        })
    }

    pub fn invoke_with(
        &mut self,
        method: SymbolId,
        receiver: Option<OpId>,
        type_args: Option<Vec<TypeSyntax>>,
        args: Vec<Argument>,
    ) -> OpId {
        self.op(|syntax| Operation::Invocation {
            method,
            receiver,
            qualifier: None,
            type_args,
            args,
            syntax,
        })
    }

    pub fn new_object(&mut self, ty: TypeSyntax, ctor: Option<SymbolId>, args: Vec<OpId>) -> OpId {
        let args = args.into_iter().map(Argument::by_value).collect();
        self.op(|syntax| Operation::ObjectCreation {
            ty,
            ctor,
            args,
            initializers: Vec::new(),
            syntax,
        })
    }

    pub fn new_object_with(
        &mut self,
        ty: TypeSyntax,
        ctor: Option<SymbolId>,
        args: Vec<OpId>,
        initializers: Vec<Initializer>,
    ) -> OpId {
        let args = args.into_iter().map(Argument::by_value).collect();
        self.op(|syntax| Operation::ObjectCreation {
            ty,
            ctor,
            args,
            initializers,
            syntax,
        })
    }

    pub fn member_init(&mut self, member: SymbolId, value: OpId) -> Initializer {
        Initializer::Member {
            member,
            value,
            syntax: self.tree.fresh_syntax(),
        }
    }

    pub fn add_init(&mut self, method: Option<SymbolId>, args: Vec<OpId>) -> Initializer {
        Initializer::Add {
            method,
            args,
            syntax: self.tree.fresh_syntax(),
        }
    }

    pub fn new_array(&mut self, elem: TypeSyntax, inits: Vec<OpId>) -> OpId {
        self.op(|syntax| Operation::ArrayCreation { elem, inits, syntax })
    }

    pub fn index(&mut self, receiver: OpId, args: Vec<OpId>) -> OpId {
        let args = args.into_iter().map(Argument::by_value).collect();
        self.op(|syntax| Operation::ElementRef {
            receiver,
            indexer: None,
            args,
            syntax,
        })
    }

    pub fn index_with(&mut self, receiver: OpId, indexer: SymbolId, args: Vec<OpId>) -> OpId {
        let args = args.into_iter().map(Argument::by_value).collect();
        self.op(|syntax| Operation::ElementRef {
            receiver,
            indexer: Some(indexer),
            args,
            syntax,
        })
    }

    pub fn convert(&mut self, operand: OpId, kind: ConversionKind, target: TypeSyntax) -> OpId {
        self.op(|syntax| Operation::Conversion {
            operand,
            kind,
            target,
            syntax,
        })
    }

    pub fn coalesce(&mut self, left: OpId, right: OpId) -> OpId {
        self.op(|syntax| Operation::Coalesce { left, right, syntax })
    }

    pub fn conditional(&mut self, condition: OpId, when_true: OpId, when_false: OpId) -> OpId {
        self.op(|syntax| Operation::Conditional {
            condition,
            when_true,
            when_false,
            syntax,
        })
    }

    pub fn eq_null(&mut self, operand: OpId) -> OpId {
        let null = self.null_lit();
        self.op(|syntax| Operation::Binary {
            op: BinaryOperator::Equals,
            left: operand,
            right: null,
            syntax,
        })
    }

    pub fn ne_null(&mut self, operand: OpId) -> OpId {
        let null = self.null_lit();
        self.op(|syntax| Operation::Binary {
            op: BinaryOperator::NotEquals,
            left: operand,
            right: null,
            syntax,
        })
    }

    pub fn throw_expr(&mut self, operand: Option<OpId>) -> OpId {
        self.op(|syntax| Operation::Throw { operand, syntax })
    }

    pub fn bang(&mut self, operand: OpId) -> OpId {
        self.op(|syntax| Operation::NullForgiving { operand, syntax })
    }

    pub fn tuple_lit(&mut self, elements: Vec<OpId>) -> OpId {
        self.op(|syntax| Operation::TupleLiteral { elements, syntax })
    }

    pub fn deconstruct(&mut self, targets: Vec<OpId>, value: OpId) -> OpId {
        self.op(|syntax| Operation::Deconstruct { targets, value, syntax })
    }

    pub fn lambda(&mut self, symbol: SymbolId, body: OpId) -> OpId {
        self.op(|syntax| Operation::Lambda { symbol, body, syntax })
    }

    pub fn await_expr(&mut self, operand: OpId) -> OpId {
        self.op(|syntax| Operation::Await { operand, syntax })
    }

    pub fn switch_expr(&mut self, scrutinee: OpId, arms: Vec<SwitchArm>) -> OpId {
        self.op(|syntax| Operation::SwitchExpr { scrutinee, arms, syntax })
    }

    pub fn arm(&mut self, pattern: Pattern, value: OpId) -> SwitchArm {
        SwitchArm {
            pattern,
            guard: None,
            value,
        }
    }

    pub fn is_type(&mut self, operand: OpId, ty: TypeSyntax, binding: Option<SymbolId>) -> OpId {
        self.op(|syntax| Operation::IsPattern {
            operand,
            pattern: Pattern::Type { ty, binding },
            syntax,
        })
    }

    pub fn is_pattern(&mut self, operand: OpId, pattern: Pattern) -> OpId {
        self.op(|syntax| Operation::IsPattern { operand, pattern, syntax })
    }

    /// A member of an anonymous object; its node tree is the initializer's.
    pub fn anon_property(&mut self, name: &str) -> SymbolId {
        let ty = self.var_ty();
        self.unit.symbols.alloc(Symbol {
            id: SymbolId::NONE,
            name: name.to_string(),
            container: DefId::NONE,
            is_static: false,
            is_external: false,
            kind: SymbolKind::Property(PropertySymbol {
                ty: DeclaredType::Syntax(ty),
                params: Vec::new(),
            }),
        })
    }

    pub fn anon_object(&mut self, ty: Ty, members: Vec<(SymbolId, OpId)>) -> OpId {
        let members = members
            .into_iter()
            .map(|(member, value)| AnonymousMember { member, value })
            .collect();
        self.op(|syntax| Operation::AnonymousObject { ty, members, syntax })
    }

    // ----- statements -----

    pub fn ret(&mut self, value: OpId) -> OpId {
        self.op(|syntax| Operation::Return {
            value: Some(value),
            syntax,
        })
    }

    pub fn yield_ret(&mut self, value: OpId) -> OpId {
        self.op(|syntax| Operation::YieldReturn { value, syntax })
    }

    pub fn block(&mut self, statements: Vec<OpId>) -> OpId {
        self.tree.alloc(Operation::Block { statements })
    }

    pub fn stmt(&mut self, expr: OpId) -> OpId {
        self.tree.alloc(Operation::ExprStmt { expr })
    }

    pub fn decl(&mut self, local: SymbolId, init: Option<OpId>) -> OpId {
        self.op(|syntax| Operation::LocalDecl { local, init, syntax })
    }

    pub fn if_stmt(&mut self, condition: OpId, then_branch: OpId, else_branch: Option<OpId>) -> OpId {
        self.tree.alloc(Operation::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn foreach(&mut self, local: SymbolId, collection: OpId, body: OpId) -> OpId {
        self.op(|syntax| Operation::Foreach {
            local,
            collection,
            body,
            syntax,
        })
    }

    pub fn unknown(&mut self, kind: &str) -> OpId {
        let kind = kind.to_string();
        self.op(|syntax| Operation::Unknown { kind, syntax })
    }

    /// Attach a body to a declared method.
    pub fn body(&mut self, method: &MethodHandle, root: OpId) {
        self.tree.members.push(MemberBody {
            symbol: method.symbol,
            body: root,
        });
    }

    /// An expression-bodied method: wraps the expression in a return.
    pub fn expr_body(&mut self, method: &MethodHandle, expr: OpId) {
        let root = self.ret(expr);
        self.body(method, root);
    }
}

impl Default for UnitBuilder {
    fn default() -> Self {
        Self::new()
    }
}
