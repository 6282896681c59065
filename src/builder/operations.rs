//! The operation visitor: bound expressions and statements to edges.
//!
//! Walks a tree's member bodies, producing each expression's node tree and
//! buffering the assignability and dereference constraints it implies. One
//! handler per operation kind; an unknown kind aborts the tree.

use crate::builder::substitution::{
    TypeSubstitution, Variance, create_assignment_edge, create_type_edge, substitute_base,
};
use crate::builder::syntax::visit_type_syntax;
use crate::builder::{BuildError, GraphBuilder};
use crate::diagnostics::{Diagnostic, SourceSpan};
use crate::graph::NodeId;
use crate::lang::{
    Argument, CompilationUnit, ConversionKind, DeclaredType, Initializer, InstanceKind,
    MemberBody, MethodSymbol, NullableAnnotation, OpId, Operation, Pattern, RefKind, SwitchArm,
    SymbolId, SymbolKind, SyntaxId, Ty, TypeSyntax,
};
use crate::registry::{TreeCommit, TypeSystem};
use crate::type_node::TypeWithNode;
use tracing::debug;

/// Edge pass entry point: build all edges for one tree.
pub fn build_tree(
    unit: &CompilationUnit,
    types: &TypeSystem,
    tree_index: u32,
) -> Result<TreeCommit, BuildError> {
    let mut builder = GraphBuilder::new(unit, types, tree_index);
    let tree = builder.tree();
    debug!(path = %tree.path, members = tree.members.len(), "building edges");
    for member in &tree.members {
        let mut visitor = OperationVisitor::new(&mut builder);
        visitor.visit_member(member)?;
    }
    Ok(builder.into_commit())
}

/// Walks one member body.
pub struct OperationVisitor<'a, 'b> {
    b: &'b mut GraphBuilder<'a>,
    /// The type return statements assign into; unwrapped for async methods.
    method_return: Option<TypeWithNode>,
    /// The element type `yield return` assigns into, for iterator methods.
    yield_element: Option<TypeWithNode>,
    /// Receivers for implicit references inside object initializers.
    creation_stack: Vec<TypeWithNode>,
}

impl<'a, 'b> OperationVisitor<'a, 'b> {
    pub fn new(builder: &'b mut GraphBuilder<'a>) -> Self {
        OperationVisitor {
            b: builder,
            method_return: None,
            yield_element: None,
            creation_stack: Vec::new(),
        }
    }

    pub fn visit_member(&mut self, member: &MemberBody) -> Result<(), BuildError> {
        let unit = self.b.unit;
        let symbol = unit.symbols.get(member.symbol);
        let ret = self.b.symbol_type(member.symbol);
        let m = symbol.as_method();

        self.method_return = Some(match &ret.ty {
            Ty::Named { def, .. }
                if m.is_async && unit.defs.is_task_like(*def) && ret.args.len() == 1 =>
            {
                ret.args[0].clone()
            }
            _ => ret.clone(),
        });
        self.yield_element = match &ret.ty {
            Ty::Named { def, .. } if unit.defs.is_sequence_like(*def) => ret.args.first().cloned(),
            _ => None,
        };

        self.visit(member.body)?;
        Ok(())
    }

    fn visit(&mut self, op: OpId) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let tree = self.b.tree();
        match tree.op(op) {
            Operation::NullLiteral { .. } => Ok(TypeWithNode::leaf(
                Ty::named(unit.defs.builtins.object),
                NodeId::NULLABLE,
            )),
            Operation::StringLiteral { .. } => Ok(TypeWithNode::leaf(
                Ty::named(unit.defs.builtins.string),
                NodeId::NON_NULL,
            )),
            Operation::TypeOfExpr { .. } => Ok(TypeWithNode::leaf(
                Ty::named(unit.defs.builtins.type_info),
                NodeId::NON_NULL,
            )),
            Operation::ValueLiteral { ty, .. } => Ok(TypeSystem::from_type(
                &unit.defs,
                ty,
                NullableAnnotation::None,
            )),

            Operation::ParameterRef { symbol, syntax }
            | Operation::LocalRef { symbol, syntax } => {
                let twn = self.b.symbol_type(*symbol);
                Ok(self.apply_flow(twn, *syntax))
            }
            Operation::MemberRef { symbol, receiver, qualifier, syntax } => {
                self.visit_member_ref(*symbol, *receiver, qualifier.as_ref(), *syntax)
            }
            Operation::InstanceRef { kind, ty, .. } => match kind {
                InstanceKind::This => Ok(TypeSystem::from_type(
                    &unit.defs,
                    ty,
                    NullableAnnotation::None,
                )
                .with_node(NodeId::NON_NULL)),
                InstanceKind::ImplicitReceiver => {
                    debug_assert!(!self.creation_stack.is_empty());
                    Ok(self.creation_stack.last().cloned().unwrap_or_else(|| {
                        TypeWithNode::leaf(Ty::named(unit.defs.builtins.object), NodeId::NON_NULL)
                    }))
                }
            },

            Operation::Assignment { target, value, syntax } => {
                let t = self.visit(*target)?;
                let v = self.visit(*value)?;
                create_assignment_edge(self.b, &v, &t, "assign", *syntax);
                Ok(t)
            }
            Operation::Invocation { method, receiver, qualifier, type_args, args, syntax } => self
                .visit_invocation(
                    *method,
                    *receiver,
                    qualifier.as_ref(),
                    type_args.as_deref(),
                    args,
                    *syntax,
                ),
            Operation::ObjectCreation { ty, ctor, args, initializers, syntax } => {
                self.visit_object_creation(ty, *ctor, args, initializers, *syntax)
            }
            Operation::ArrayCreation { elem, inits, syntax } => {
                let elem = visit_type_syntax(self.b, elem);
                let result = TypeWithNode::new(
                    Ty::Array(Box::new(elem.ty.clone())),
                    NodeId::NON_NULL,
                    vec![elem],
                );
                for &init in inits {
                    let v = self.visit(init)?;
                    create_assignment_edge(self.b, &v, &result.args[0], "element", *syntax);
                }
                Ok(result)
            }
            Operation::ElementRef { receiver, indexer, args, syntax } => {
                self.visit_element_ref(*receiver, *indexer, args, *syntax)
            }
            Operation::Conversion { operand, kind, target, syntax } => {
                self.visit_conversion(*operand, kind, target, *syntax)
            }

            Operation::Coalesce { left, right, syntax } => {
                let l = self.visit(*left)?;
                let r = self.visit(*right)?;
                if r.args.is_empty() {
                    // the value comes from the right operand when the left is null
                    return Ok(r);
                }
                let mut merged = Vec::with_capacity(r.args.len());
                for (i, ra) in r.args.iter().enumerate() {
                    let fresh = self.fresh_mirror(ra, "coalesce");
                    if let Some(la) = l.args.get(i) {
                        create_type_edge(
                            self.b,
                            la,
                            &fresh,
                            &TypeSubstitution::default(),
                            Variance::Invariant,
                            "coalesce",
                            *syntax,
                        );
                    }
                    create_type_edge(
                        self.b,
                        ra,
                        &fresh,
                        &TypeSubstitution::default(),
                        Variance::Invariant,
                        "coalesce",
                        *syntax,
                    );
                    merged.push(fresh);
                }
                Ok(TypeWithNode { ty: r.ty.clone(), node: r.node, args: merged })
            }
            Operation::Conditional { condition, when_true, when_false, syntax } => {
                self.visit(*condition)?;
                let t = self.visit(*when_true)?;
                let f = self.visit(*when_false)?;
                let shape = if t.args.len() >= f.args.len() { t.clone() } else { f.clone() };
                let result = self.fresh_mirror(&shape, "conditional");
                create_assignment_edge(self.b, &t, &result, "conditional branch", *syntax);
                create_assignment_edge(self.b, &f, &result, "conditional branch", *syntax);
                Ok(result)
            }
            Operation::Binary { left, right, .. } => {
                self.visit(*left)?;
                self.visit(*right)?;
                Ok(TypeWithNode::leaf(
                    Ty::named(unit.defs.builtins.boolean),
                    NodeId::OBLIVIOUS,
                ))
            }
            Operation::Throw { operand, syntax } => {
                if let Some(operand) = operand {
                    let v = self.visit(*operand)?;
                    self.deref(&v, *syntax);
                }
                Ok(TypeWithNode::leaf(
                    Ty::named(unit.defs.builtins.exception),
                    NodeId::OBLIVIOUS,
                ))
            }
            Operation::NullForgiving { operand, .. } => {
                let v = self.visit(*operand)?;
                Ok(v.with_node(NodeId::NON_NULL))
            }
            Operation::TupleLiteral { elements, .. } => {
                let mut args = Vec::with_capacity(elements.len());
                for &element in elements {
                    args.push(self.visit(element)?);
                }
                let ty = Ty::Tuple(args.iter().map(|a| a.ty.clone()).collect());
                Ok(TypeWithNode::new(ty, NodeId::OBLIVIOUS, args))
            }
            Operation::Deconstruct { targets, value, syntax } => {
                let v = self.visit(*value)?;
                for (i, &target) in targets.iter().enumerate() {
                    let t = self.visit(target)?;
                    match v.args.get(i) {
                        Some(elem) => {
                            create_assignment_edge(self.b, elem, &t, "deconstruct", *syntax)
                        }
                        None => create_assignment_edge(self.b, &v, &t, "deconstruct", *syntax),
                    }
                }
                Ok(v)
            }
            Operation::Lambda { symbol, body, syntax } => {
                self.visit_lambda(*symbol, *body, None, *syntax)
            }
            Operation::Await { operand, .. } => {
                let v = self.visit(*operand)?;
                Ok(self.unwrap_task(v))
            }
            Operation::SwitchExpr { scrutinee, arms, syntax } => {
                self.visit_switch(*scrutinee, arms, *syntax)
            }
            Operation::IsPattern { operand, pattern, .. } => {
                let v = self.visit(*operand)?;
                self.bind_pattern(&v, pattern)?;
                Ok(TypeWithNode::leaf(
                    Ty::named(unit.defs.builtins.boolean),
                    NodeId::OBLIVIOUS,
                ))
            }
            Operation::AnonymousObject { ty, members, .. } => {
                for member in members {
                    let v = self.visit(member.value)?;
                    self.b.add_symbol_type(member.member, v);
                }
                Ok(TypeSystem::from_type(&unit.defs, ty, NullableAnnotation::None)
                    .with_node(NodeId::NON_NULL))
            }

            Operation::Block { statements } => {
                for &statement in statements {
                    self.visit(statement)?;
                }
                Ok(self.void())
            }
            Operation::ExprStmt { expr } => {
                self.visit(*expr)?;
                Ok(self.void())
            }
            Operation::LocalDecl { local, init, syntax } => {
                self.visit_local_decl(*local, *init, *syntax)
            }
            Operation::Return { value, syntax } => {
                if let Some(value) = value {
                    let v = self.visit(*value)?;
                    if let Some(ret) = self.method_return.clone() {
                        create_assignment_edge(self.b, &v, &ret, "return", *syntax);
                    }
                }
                Ok(self.void())
            }
            Operation::YieldReturn { value, syntax } => {
                let v = self.visit(*value)?;
                if let Some(elem) = self.yield_element.clone() {
                    create_assignment_edge(self.b, &v, &elem, "yield", *syntax);
                }
                Ok(self.void())
            }
            Operation::If { condition, then_branch, else_branch } => {
                self.visit(*condition)?;
                self.visit(*then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.visit(*else_branch)?;
                }
                Ok(self.void())
            }
            Operation::Foreach { local, collection, body, syntax } => {
                self.visit_foreach(*local, *collection, *body, *syntax)
            }

            Operation::Unknown { kind, .. } => Err(BuildError::UnsupportedOperation {
                kind: kind.clone(),
                path: tree.path.clone(),
            }),
        }
    }

    // ----- references and calls -----

    fn visit_member_ref(
        &mut self,
        symbol: SymbolId,
        receiver: Option<OpId>,
        qualifier: Option<&TypeSyntax>,
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let class_args = self.receiver_class_args(receiver, qualifier, syntax)?;
        let declared = self.b.symbol_type(symbol);
        let subst = TypeSubstitution::for_class(class_args);
        let twn = subst.apply(&declared);
        Ok(self.apply_flow(twn, syntax))
    }

    fn visit_invocation(
        &mut self,
        method: SymbolId,
        receiver: Option<OpId>,
        qualifier: Option<&TypeSyntax>,
        type_args: Option<&[TypeSyntax]>,
        args: &[Argument],
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let symbol = unit.symbols.get(method);
        let m = symbol.as_method();

        let mut class_args = Vec::new();
        if let Some(receiver) = receiver {
            let rt = self.visit(receiver)?;
            if !symbol.is_static {
                self.deref(&rt, syntax);
            }
            class_args = rt.args;
        } else if let Some(qualifier) = qualifier {
            class_args = visit_type_syntax(self.b, qualifier).args;
        }

        let method_args = match type_args {
            Some(list) => list.iter().map(|s| visit_type_syntax(self.b, s)).collect(),
            None => self.fresh_method_args(m),
        };
        let subst = TypeSubstitution { class_args, method_args };

        self.visit_call_arguments(&m.params, &subst, args, syntax)?;

        let ret = self.b.symbol_type(method);
        Ok(subst.apply(&ret))
    }

    /// Fresh inferred nodes for unspecified method type arguments; they link
    /// both the arguments and the result through the substitution.
    fn fresh_method_args(&mut self, m: &MethodSymbol) -> Vec<TypeWithNode> {
        m.type_params
            .iter()
            .enumerate()
            .map(|(i, tp)| {
                let node = self.b.fresh_node(format!("inferred {}", tp.name));
                TypeWithNode::leaf(Ty::method_param(i as u32), node)
            })
            .collect()
    }

    fn visit_call_arguments(
        &mut self,
        params: &[SymbolId],
        subst: &TypeSubstitution,
        args: &[Argument],
        syntax: SyntaxId,
    ) -> Result<(), BuildError> {
        let unit = self.b.unit;
        for (index, arg) in args.iter().enumerate() {
            let Some(&param_id) = params.get(index).or_else(|| params.last()) else {
                self.visit(arg.value)?;
                continue;
            };
            let overflow = index >= params.len();
            let param = unit.symbols.get(param_id).as_parameter();
            let declared = self.b.symbol_type(param_id);
            let value = self.visit(arg.value)?;

            if param.ref_kind == RefKind::Params {
                // The variadic tail accepts each element at the element
                // type, unless a whole array is passed through.
                let expanded = overflow || !matches!(value.ty, Ty::Array(_));
                if expanded {
                    if let Some(element) = declared.args.first() {
                        create_type_edge(
                            self.b,
                            &value,
                            element,
                            subst,
                            Variance::Out,
                            "params element",
                            syntax,
                        );
                        continue;
                    }
                }
                create_type_edge(self.b, &value, &declared, subst, Variance::Out, "argument", syntax);
                continue;
            }

            match param.ref_kind {
                RefKind::Ref => create_type_edge(
                    self.b,
                    &value,
                    &declared,
                    subst,
                    Variance::Invariant,
                    "ref argument",
                    syntax,
                ),
                RefKind::Out => create_type_edge(
                    self.b,
                    &value,
                    &declared,
                    subst,
                    Variance::In,
                    "out argument",
                    syntax,
                ),
                _ => create_type_edge(
                    self.b,
                    &value,
                    &declared,
                    subst,
                    Variance::Out,
                    "argument",
                    syntax,
                ),
            }
        }
        Ok(())
    }

    fn visit_object_creation(
        &mut self,
        ty: &TypeSyntax,
        ctor: Option<SymbolId>,
        args: &[Argument],
        initializers: &[Initializer],
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let twn = visit_type_syntax(self.b, ty);
        // a freshly constructed object is never null
        let result = twn.with_node(NodeId::NON_NULL);
        let subst = TypeSubstitution::for_class(twn.args.clone());

        match ctor {
            Some(ctor) => {
                let m = unit.symbols.get(ctor).as_method();
                self.visit_call_arguments(&m.params, &subst, args, syntax)?;
            }
            None => {
                for arg in args {
                    self.visit(arg.value)?;
                }
            }
        }

        if !initializers.is_empty() {
            self.creation_stack.push(result.clone());
            for initializer in initializers {
                match initializer {
                    Initializer::Member { member, value, syntax } => {
                        let declared = self.b.symbol_type(*member);
                        let target = subst.apply(&declared);
                        let v = self.visit(*value)?;
                        create_assignment_edge(self.b, &v, &target, "member initializer", *syntax);
                    }
                    Initializer::Add { method, args, syntax } => match method {
                        Some(method) => {
                            let m = unit.symbols.get(*method).as_method();
                            for (i, &value) in args.iter().enumerate() {
                                let Some(&param_id) = m.params.get(i) else {
                                    self.visit(value)?;
                                    continue;
                                };
                                let declared = self.b.symbol_type(param_id);
                                let v = self.visit(value)?;
                                create_type_edge(
                                    self.b,
                                    &v,
                                    &declared,
                                    &subst,
                                    Variance::Out,
                                    "collection add",
                                    *syntax,
                                );
                            }
                        }
                        None => {
                            for &value in args {
                                self.visit(value)?;
                            }
                        }
                    },
                }
            }
            self.creation_stack.pop();
        }
        Ok(result)
    }

    fn visit_element_ref(
        &mut self,
        receiver: OpId,
        indexer: Option<SymbolId>,
        args: &[Argument],
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let rt = self.visit(receiver)?;
        self.deref(&rt, syntax);
        match indexer {
            Some(indexer) => {
                let property = unit.symbols.get(indexer).as_property();
                let subst = TypeSubstitution::for_class(rt.args.clone());
                self.visit_call_arguments(&property.params, &subst, args, syntax)?;
                let declared = self.b.symbol_type(indexer);
                Ok(self.apply_flow(subst.apply(&declared), syntax))
            }
            None => {
                for arg in args {
                    self.visit(arg.value)?;
                }
                debug_assert!(matches!(rt.ty, Ty::Array(_)));
                Ok(rt.args.first().cloned().unwrap_or_else(|| {
                    TypeWithNode::leaf(Ty::named(unit.defs.builtins.object), NodeId::OBLIVIOUS)
                }))
            }
        }
    }

    // ----- conversions -----

    fn visit_conversion(
        &mut self,
        operand: OpId,
        kind: &ConversionKind,
        target: &TypeSyntax,
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        match kind {
            ConversionKind::Throw => {
                self.visit(operand)?;
                let t = visit_type_syntax(self.b, target);
                Ok(t.with_node(NodeId::OBLIVIOUS))
            }
            ConversionKind::Unboxing => {
                let v = self.visit(operand)?;
                let t = visit_type_syntax(self.b, target);
                let to_nullable_value = matches!(
                    &t.ty,
                    Ty::Named { def, .. } if *def == unit.defs.builtins.nullable
                );
                if !to_nullable_value {
                    self.b.add_edge(v.node, NodeId::NON_NULL, "unbox", syntax);
                }
                Ok(t)
            }
            ConversionKind::UserDefined { operator } => {
                self.visit_user_conversion(operand, *operator, target, syntax)
            }
            ConversionKind::Reference => {
                if let Operation::Lambda { symbol, body, syntax: lambda_syntax } =
                    self.b.tree().op(operand)
                {
                    let t = visit_type_syntax(self.b, target);
                    self.visit_lambda(*symbol, *body, Some(&t), *lambda_syntax)?;
                    return Ok(t);
                }
                let v = self.visit(operand)?;
                let t = visit_type_syntax(self.b, target);
                self.reference_conversion_result(v, t, syntax)
            }
        }
    }

    fn reference_conversion_result(
        &mut self,
        v: TypeWithNode,
        t: TypeWithNode,
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        match (&v.ty, &t.ty) {
            (Ty::Fn { .. }, Ty::Fn { .. }) => {
                create_type_edge(
                    self.b,
                    &v,
                    &t,
                    &TypeSubstitution::default(),
                    Variance::Out,
                    "delegate conversion",
                    syntax,
                );
                Ok(t)
            }
            (Ty::Named { args: sa, .. }, Ty::Named { args: ta, .. })
                if sa.is_empty() && ta.is_empty() =>
            {
                // a conversion between simple named types keeps the operand's
                // outer nullability
                Ok(t.with_node(v.node))
            }
            (Ty::Named { args: sa, .. }, Ty::Named { args: ta, .. }) if sa.len() == ta.len() => {
                Ok(TypeWithNode::new(t.ty.clone(), v.node, v.args.clone()))
            }
            (Ty::Named { .. }, Ty::Named { def: td, .. }) => {
                match substitute_base(self.b, &v, *td) {
                    Some(mapped) => Ok(mapped),
                    // a downcast keeps the operand's outer node
                    None => Ok(t.with_node(v.node)),
                }
            }
            (Ty::Array(_), Ty::Named { def: td, args: ta, .. })
                if unit.defs.is_sequence_like(*td) && ta.len() == 1 =>
            {
                Ok(TypeWithNode::new(
                    t.ty.clone(),
                    v.node,
                    vec![v.args[0].clone()],
                ))
            }
            _ => Ok(t.with_node(v.node)),
        }
    }

    fn visit_user_conversion(
        &mut self,
        operand: OpId,
        operator: SymbolId,
        target: &TypeSyntax,
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let v = self.visit(operand)?;
        let t = visit_type_syntax(self.b, target);

        let record = unit.symbols.get(operator);
        let m = record.as_method();
        // generic operators substitute through whichever side declares them
        let operand_declares = matches!(&v.ty, Ty::Named { def, .. } if *def == record.container);
        let class_args = if operand_declares { v.args.clone() } else { t.args.clone() };
        let subst = TypeSubstitution::for_class(class_args);

        if let Some(&param) = m.params.first() {
            let declared = self.b.symbol_type(param);
            create_type_edge(
                self.b,
                &v,
                &declared,
                &subst,
                Variance::Out,
                "conversion input",
                syntax,
            );
        }
        let ret = self.b.symbol_type(operator);
        let ret = subst.apply(&ret);
        create_assignment_edge(self.b, &ret, &t, "conversion result", syntax);
        Ok(t)
    }

    // ----- functions -----

    fn visit_lambda(
        &mut self,
        symbol: SymbolId,
        body: OpId,
        target: Option<&TypeWithNode>,
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let record = unit.symbols.get(symbol);
        let m = record.as_method();

        let mut param_twns = Vec::with_capacity(m.params.len());
        for (i, &param_id) in m.params.iter().enumerate() {
            let param = unit.symbols.get(param_id).as_parameter();
            let target_param = target.and_then(|t| t.args.get(i));
            let twn = match &param.ty {
                DeclaredType::Syntax(s) if !s.is_implicit() => {
                    let declared = visit_type_syntax(self.b, s);
                    if let Some(tp) = target_param {
                        // inputs are contravariant: the delegate's parameter
                        // flows into the lambda's declared one
                        create_assignment_edge(self.b, tp, &declared, "lambda parameter", syntax);
                    }
                    declared
                }
                _ => match target_param {
                    Some(tp) => tp.clone(),
                    None => {
                        let name = unit.symbols.get(param_id).name.clone();
                        TypeWithNode::leaf(
                            Ty::named(unit.defs.builtins.object),
                            self.b.fresh_node(format!("lambda param {name}")),
                        )
                    }
                },
            };
            self.b.add_symbol_type(param_id, twn.clone());
            param_twns.push(twn);
        }

        let ret = match target {
            Some(t) => t.args.last().cloned().unwrap_or_else(|| {
                TypeWithNode::leaf(Ty::named(unit.defs.builtins.object), NodeId::OBLIVIOUS)
            }),
            None => match &m.ret {
                DeclaredType::Syntax(s) if !s.is_implicit() => visit_type_syntax(self.b, s),
                _ => TypeWithNode::leaf(
                    Ty::named(unit.defs.builtins.object),
                    self.b.fresh_node("lambda return"),
                ),
            },
        };

        let saved_return = self.method_return.replace(ret.clone());
        let saved_yield = self.yield_element.take();
        self.visit(body)?;
        self.method_return = saved_return;
        self.yield_element = saved_yield;

        let ty = Ty::Fn {
            params: param_twns.iter().map(|p| p.ty.clone()).collect(),
            ret: Box::new(ret.ty.clone()),
        };
        let mut args = param_twns;
        args.push(ret);
        Ok(TypeWithNode::new(ty, NodeId::NON_NULL, args))
    }

    // ----- patterns and branches -----

    fn visit_switch(
        &mut self,
        scrutinee: OpId,
        arms: &[SwitchArm],
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let s = self.visit(scrutinee)?;
        let mut values = Vec::with_capacity(arms.len());
        for arm in arms {
            self.bind_pattern(&s, &arm.pattern)?;
            if let Some(guard) = arm.guard {
                self.visit(guard)?;
            }
            values.push(self.visit(arm.value)?);
        }
        let shape = values
            .iter()
            .max_by_key(|v| v.args.len())
            .cloned()
            .unwrap_or_else(|| self.void());
        let result = self.fresh_mirror(&shape, "switch");
        for value in &values {
            create_assignment_edge(self.b, value, &result, "switch arm", syntax);
        }
        Ok(result)
    }

    fn bind_pattern(
        &mut self,
        scrutinee: &TypeWithNode,
        pattern: &Pattern,
    ) -> Result<(), BuildError> {
        match pattern {
            Pattern::Discard => Ok(()),
            Pattern::Constant(op) => {
                self.visit(*op)?;
                Ok(())
            }
            Pattern::Type { ty, binding } => {
                let twn = visit_type_syntax(self.b, ty);
                if let Some(binding) = binding {
                    self.b.add_symbol_type(*binding, twn);
                }
                Ok(())
            }
            Pattern::Property { clauses } => {
                let subst = TypeSubstitution::for_class(scrutinee.args.clone());
                for clause in clauses {
                    let declared = self.b.symbol_type(clause.member);
                    self.b.add_symbol_type(clause.binding, subst.apply(&declared));
                }
                Ok(())
            }
            Pattern::Var { binding } => {
                self.b.add_symbol_type(*binding, scrutinee.clone());
                Ok(())
            }
        }
    }

    // ----- locals and loops -----

    fn visit_local_decl(
        &mut self,
        local: SymbolId,
        init: Option<OpId>,
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let record = unit.symbols.get(local);
        let SymbolKind::Local(l) = &record.kind else {
            panic!("local declaration names a {}", record.kind.name());
        };
        if l.ty.is_implicit() {
            let Some(init) = init else {
                debug_assert!(false, "implicitly typed local `{}` has no initializer", record.name);
                return Ok(self.void());
            };
            // `var` adopts the initializer's entire node tree
            let v = self.visit(init)?;
            self.b.record_mapping(l.ty.id(), v.node);
            self.b.add_symbol_type(local, v);
        } else {
            let declared = visit_type_syntax(self.b, &l.ty);
            self.b.add_symbol_type(local, declared.clone());
            if let Some(init) = init {
                let v = self.visit(init)?;
                create_assignment_edge(self.b, &v, &declared, "initializer", syntax);
            }
        }
        Ok(self.void())
    }

    fn visit_foreach(
        &mut self,
        local: SymbolId,
        collection: OpId,
        body: OpId,
        syntax: SyntaxId,
    ) -> Result<TypeWithNode, BuildError> {
        let unit = self.b.unit;
        let c = self.visit(collection)?;
        self.deref(&c, syntax);
        let element = match self.element_type(&c) {
            Some(element) => element,
            None => {
                self.b.push_diagnostic(Diagnostic::warning(
                    SourceSpan::new(self.b.tree_index, syntax),
                    format!(
                        "no iteration element type for `{}`; treating it as oblivious",
                        c.ty.display(&unit.defs)
                    ),
                ));
                TypeWithNode::leaf(Ty::named(unit.defs.builtins.object), NodeId::OBLIVIOUS)
            }
        };

        let record = unit.symbols.get(local);
        let SymbolKind::Local(l) = &record.kind else {
            panic!("loop variable names a {}", record.kind.name());
        };
        if l.ty.is_implicit() {
            self.b.record_mapping(l.ty.id(), element.node);
            self.b.add_symbol_type(local, element);
        } else {
            let declared = visit_type_syntax(self.b, &l.ty);
            self.b.add_symbol_type(local, declared.clone());
            create_assignment_edge(self.b, &element, &declared, "loop variable", syntax);
        }
        self.visit(body)?;
        Ok(self.void())
    }

    /// The iteration element of a collection: array element, a direct
    /// sequence instantiation, or the sequence interface reached through the
    /// collection's declared bases.
    fn element_type(&mut self, collection: &TypeWithNode) -> Option<TypeWithNode> {
        let unit = self.b.unit;
        match &collection.ty {
            Ty::Array(_) => collection.args.first().cloned(),
            Ty::Named { def, .. } if unit.defs.is_sequence_like(*def) => {
                collection.args.first().cloned()
            }
            Ty::Named { .. } => substitute_base(self.b, collection, unit.defs.builtins.sequence)
                .and_then(|mapped| mapped.args.first().cloned()),
            _ => None,
        }
    }

    // ----- shared helpers -----

    fn receiver_class_args(
        &mut self,
        receiver: Option<OpId>,
        qualifier: Option<&TypeSyntax>,
        syntax: SyntaxId,
    ) -> Result<Vec<TypeWithNode>, BuildError> {
        if let Some(receiver) = receiver {
            let rt = self.visit(receiver)?;
            self.deref(&rt, syntax);
            return Ok(rt.args);
        }
        if let Some(qualifier) = qualifier {
            return Ok(visit_type_syntax(self.b, qualifier).args);
        }
        Ok(Vec::new())
    }

    /// Swap in the non-null singleton when the use site is dominated by a
    /// proven null check.
    fn apply_flow(&self, twn: TypeWithNode, syntax: SyntaxId) -> TypeWithNode {
        if self.b.tree().nonnull_flow.contains(&syntax) {
            twn.with_node(NodeId::NON_NULL)
        } else {
            twn
        }
    }

    fn deref(&mut self, twn: &TypeWithNode, syntax: SyntaxId) {
        self.b.add_edge(twn.node, NodeId::NON_NULL, "deref", syntax);
    }

    fn unwrap_task(&self, twn: TypeWithNode) -> TypeWithNode {
        let unit = self.b.unit;
        match &twn.ty {
            Ty::Named { def, .. } if unit.defs.is_task_like(*def) && twn.args.len() == 1 => {
                twn.args[0].clone()
            }
            _ => twn,
        }
    }

    /// A fresh node tree mirroring `twn`'s shape: inferred nodes at
    /// reference positions, oblivious elsewhere.
    fn fresh_mirror(&mut self, twn: &TypeWithNode, name: &str) -> TypeWithNode {
        let node = if twn.ty.is_reference(&self.b.unit.defs) {
            self.b.fresh_node(name.to_string())
        } else {
            NodeId::OBLIVIOUS
        };
        let args = twn
            .args
            .iter()
            .map(|a| self.fresh_mirror(a, name))
            .collect();
        TypeWithNode::new(twn.ty.clone(), node, args)
    }

    fn void(&self) -> TypeWithNode {
        TypeWithNode::leaf(
            Ty::named(self.b.unit.defs.builtins.void),
            NodeId::OBLIVIOUS,
        )
    }
}
