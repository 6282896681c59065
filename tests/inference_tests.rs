//! End-to-end inference scenarios.
//!
//! Each test assembles the bound tree a front-end would produce for a small
//! snippet (quoted in the test), builds the flow graph, and asserts the
//! path queries or verdicts. The snippets are written in the source
//! language the engine analyzes; the bound form is what the engine sees.

use nullscape::builder::BuildError;
use nullscape::fixtures::UnitBuilder;
use nullscape::harness::{PathExpectations, check_paths, has_path_from_parameter_to_return_type};
use nullscape::lang::{
    Argument, ConversionKind, NullableAnnotation, Pattern, RefKind, Ty, TypeDefKind,
    TypeParamDecl,
};
use nullscape::solver::Verdict;
use nullscape::{CancelToken, InferenceOptions, build_graph, has_path, infer};

fn options() -> InferenceOptions {
    // `RUST_LOG=nullscape=debug cargo test` shows builder traces
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
    InferenceOptions::default()
}

// =============================================================================
// Parameter-to-return flow
// =============================================================================

/// `string Test(string input) => input;`
#[test]
fn identity_return_links_parameter_to_return() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    u.expr_body(&m, input);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

/// `string Test(string input) { return "abc"; }`
#[test]
fn constant_return_does_not_depend_on_input() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let abc = u.string_lit("abc");
    u.expr_body(&m, abc);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(false),
            return_depends_on_input: Some(false),
            input_must_be_non_null: Some(false),
        },
    )
    .unwrap();
}

/// `string Test(string input) { if (input == null) return "null"; return input; }`
///
/// The second use of `input` is dominated by the null check; the non-null
/// flow oracle refines it, so the return does not depend on the parameter.
#[test]
fn null_check_refines_the_dominated_use() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let first_use = u.param_ref(m.params[0]);
    let cond = u.eq_null(first_use);
    let null_str = u.string_lit("null");
    let early = u.ret(null_str);
    let guard = u.if_stmt(cond, early, None);

    let second_use = u.param_ref_flowed(m.params[0]);
    let tail = u.ret(second_use);
    let body = u.block(vec![guard, tail]);
    u.body(&m, body);

    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(false),
            return_depends_on_input: Some(false),
            input_must_be_non_null: Some(false),
        },
    )
    .unwrap();
}

/// `string Test(string input) => input ?? "abc";`
///
/// The coalesce result carries the right operand's outer node.
#[test]
fn coalesce_result_carries_the_fallback_node() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let abc = u.string_lit("abc");
    let coalesced = u.coalesce(input, abc);
    u.expr_body(&m, coalesced);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(false),
            return_depends_on_input: Some(false),
            input_must_be_non_null: Some(false),
        },
    )
    .unwrap();
}

/// ```text
/// string Test(string input) {
///     var arr = new string[1];
///     arr[0] = input;
///     return arr[0];
/// }
/// ```
///
/// The store and the load share the element node, so the parameter flows
/// through the array into the return.
#[test]
fn array_element_round_trip_links_parameter_to_return() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let arr = u.var_local("arr");
    let elem_ty = u.string_ty();
    let creation = u.new_array(elem_ty, Vec::new());
    let decl = u.decl(arr, Some(creation));

    let arr_use = u.local_ref(arr);
    let zero = u.int_lit();
    let slot = u.index(arr_use, vec![zero]);
    let input = u.param_ref(m.params[0]);
    let store = u.assign(slot, input);
    let store_stmt = u.stmt(store);

    let arr_use_2 = u.local_ref(arr);
    let zero_2 = u.int_lit();
    let load = u.index(arr_use_2, vec![zero_2]);
    let tail = u.ret(load);

    let body = u.block(vec![decl, store_stmt, tail]);
    u.body(&m, body);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

// =============================================================================
// Unboxing
// =============================================================================

/// `int Test(object input) => (int)input;`: unboxing to a non-nullable
/// value type dereferences the operand.
#[test]
fn unbox_to_value_type_forces_the_operand_non_null() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.int_ty();
    let param_ty = u.object_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let target = u.int_ty();
    let cast = u.convert(input, ConversionKind::Unboxing, target);
    u.expr_body(&m, cast);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: None,
            return_depends_on_input: Some(false),
            input_must_be_non_null: Some(true),
        },
    )
    .unwrap();
}

/// `int? Test(object input) => (int?)input;`: unboxing to a nullable value
/// type tolerates null.
#[test]
fn unbox_to_nullable_value_type_does_not_force_non_null() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.nullable_int_ty();
    let param_ty = u.object_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let target = u.nullable_int_ty();
    let cast = u.convert(input, ConversionKind::Unboxing, target);
    u.expr_body(&m, cast);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: None,
            return_depends_on_input: None,
            input_must_be_non_null: Some(false),
        },
    )
    .unwrap();
}

// =============================================================================
// Switch expressions
// =============================================================================

/// ```text
/// string Test(string input, int i) => i switch {
///     0 => input,
///     1 => "",
///     _ => null,
/// };
/// ```
#[test]
fn switch_arms_merge_into_the_result() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let int_ty = u.int_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty), ("i", int_ty)]);

    let scrutinee = u.param_ref(m.params[1]);
    let zero = u.int_lit();
    let one = u.int_lit();
    let input = u.param_ref(m.params[0]);
    let empty = u.string_lit("");
    let null = u.null_lit();
    let arm0 = u.arm(Pattern::Constant(zero), input);
    let arm1 = u.arm(Pattern::Constant(one), empty);
    let arm2 = u.arm(Pattern::Discard, null);
    let switch = u.switch_expr(scrutinee, vec![arm0, arm1, arm2]);
    u.expr_body(&m, switch);

    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(true),
            return_depends_on_input: Some(true),
            input_must_be_non_null: Some(false),
        },
    )
    .unwrap();
}

// =============================================================================
// Dereference constraints
// =============================================================================

/// `int Test(string input) => Use(input.Length);` in spirit: a member
/// access on a parameter dereferences it.
#[test]
fn member_access_dereferences_the_receiver() {
    let mut u = UnitBuilder::new();
    let string_def = u.unit.defs.builtins.string;
    let int32 = u.unit.defs.builtins.int32;
    let length = u.external_property(
        string_def,
        "Length",
        Ty::named(int32),
        NullableAnnotation::None,
    );
    let ret_ty = u.int_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let access = u.member_ref(length, Some(input));
    u.expr_body(&m, access);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(false),
            return_depends_on_input: Some(false),
            input_must_be_non_null: Some(true),
        },
    )
    .unwrap();
}

/// `void Test(string input) { throw new Exception(input); }` in spirit:
/// `throw e` dereferences the thrown value.
#[test]
fn throw_dereferences_its_operand() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.void_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let thrown = u.throw_expr(Some(input));
    let body = u.stmt(thrown);
    u.body(&m, body);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: None,
            return_depends_on_input: Some(false),
            input_must_be_non_null: Some(true),
        },
    )
    .unwrap();
}

/// `foreach` evaluates and dereferences its source.
#[test]
fn foreach_dereferences_the_collection() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.void_ty();
    let string_ty = u.string_ty();
    let param_ty = u.array_ty(string_ty);
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let item = u.var_local("item");
    let collection = u.param_ref(m.params[0]);
    let body = u.block(Vec::new());
    let loop_stmt = u.foreach(item, collection, body);
    u.body(&m, loop_stmt);

    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: None,
            return_depends_on_input: None,
            input_must_be_non_null: Some(true),
        },
    )
    .unwrap();
}

// =============================================================================
// Locals and transitivity
// =============================================================================

/// ```text
/// string Test(string input) {
///     string a = input;
///     string b = a;
///     return b;
/// }
/// ```
#[test]
fn assignment_chains_are_transitive() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let a_ty = u.string_ty();
    let a = u.local("a", a_ty);
    let input = u.param_ref(m.params[0]);
    let decl_a = u.decl(a, Some(input));

    let b_ty = u.string_ty();
    let b = u.local("b", b_ty);
    let a_use = u.local_ref(a);
    let decl_b = u.decl(b, Some(a_use));

    let b_use = u.local_ref(b);
    let tail = u.ret(b_use);
    let body = u.block(vec![decl_a, decl_b, tail]);
    u.body(&m, body);

    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

/// `var` adopts the initializer's entire node tree, inner nodes included:
/// a list element stored through one name and read through another stays
/// connected.
#[test]
fn implicit_local_adopts_inner_nodes() {
    let mut u = UnitBuilder::new();
    let list = u.unit.defs.builtins.list;

    // void Add(T item) on List<T>
    let add = u.external_method(
        list,
        "Add",
        false,
        Vec::new(),
        vec![(Ty::class_param(0), NullableAnnotation::None, RefKind::None)],
        (
            Ty::named(u.unit.defs.builtins.void),
            NullableAnnotation::None,
        ),
    );
    // T this[int index] on List<T>
    let indexer = u.external_property(
        list,
        "Item",
        Ty::class_param(0),
        NullableAnnotation::None,
    );

    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    // var items = new List<string>();
    let items = u.var_local("items");
    let elem = u.string_ty();
    let list_ty = u.generic_ty(list, vec![elem]);
    let creation = u.new_object(list_ty, None, Vec::new());
    let decl = u.decl(items, Some(creation));

    // items.Add(input);
    let items_use = u.local_ref(items);
    let input = u.param_ref(m.params[0]);
    let add_call = u.invoke(add.symbol, Some(items_use), vec![input]);
    let add_stmt = u.stmt(add_call);

    // return items[0];
    let items_use_2 = u.local_ref(items);
    let zero = u.int_lit();
    let load = u.index_with(items_use_2, indexer, vec![zero]);
    let tail = u.ret(load);

    let body = u.block(vec![decl, add_stmt, tail]);
    u.body(&m, body);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

// =============================================================================
// Conversions
// =============================================================================

/// `object Test(string input) => (object)input;`: a conversion between
/// simple named types keeps the operand's outer node.
#[test]
fn arity_zero_reference_conversion_preserves_the_outer_node() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.object_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let target = u.object_ty();
    let cast = u.convert(input, ConversionKind::Reference, target);
    u.expr_body(&m, cast);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

/// `IEnumerable<string> Test(List<string> input) => input;`: the generic
/// conversion maps the element through the declared base interface.
#[test]
fn generic_conversion_maps_type_arguments_through_bases() {
    let mut u = UnitBuilder::new();
    let list = u.unit.defs.builtins.list;
    let sequence = u.unit.defs.builtins.sequence;

    let ret_elem = u.string_ty();
    let ret_ty = u.generic_ty(sequence, vec![ret_elem]);
    let param_elem = u.string_ty();
    let param_ty = u.generic_ty(list, vec![param_elem]);
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let input = u.param_ref(m.params[0]);
    let target_elem = u.string_ty();
    let target = u.generic_ty(sequence, vec![target_elem]);
    let cast = u.convert(input, ConversionKind::Reference, target);
    u.expr_body(&m, cast);
    let unit = u.finish();

    // The parameter's element node must reach the return's element node.
    let types = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let param_twn = types.symbol_type(&unit, m.params[0]);
    let ret_twn = types.symbol_type(&unit, m.symbol);
    assert!(has_path(
        &types.graph,
        param_twn.args[0].node,
        ret_twn.args[0].node
    ));
}

/// A user-defined conversion whose operator takes a non-null parameter
/// forces the operand non-null.
#[test]
fn user_defined_conversion_constrains_through_the_operator() {
    let mut u = UnitBuilder::new();
    let object = u.unit.defs.builtins.object;
    let string_def = u.unit.defs.builtins.string;
    let wrapper = u.unit.defs.add(
        "Wrapper",
        "Demo.Wrapper",
        TypeDefKind::Class,
        Vec::new(),
        vec![Ty::named(object)],
    );
    let operator = u.external_method(
        wrapper,
        "op_Implicit",
        true,
        Vec::new(),
        vec![(
            Ty::named(string_def),
            NullableAnnotation::NotAnnotated,
            RefKind::None,
        )],
        (Ty::named(wrapper), NullableAnnotation::NotAnnotated),
    );

    let ret_ty = u.named_ty(wrapper);
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let target = u.named_ty(wrapper);
    let cast = u.convert(
        input,
        ConversionKind::UserDefined {
            operator: operator.symbol,
        },
        target,
    );
    u.expr_body(&m, cast);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: None,
            return_depends_on_input: None,
            input_must_be_non_null: Some(true),
        },
    )
    .unwrap();
}

// =============================================================================
// Calls
// =============================================================================

/// `T Identity<T>(T x)` called with no explicit type arguments: the fresh
/// inferred node links both the argument and the result.
#[test]
fn generic_call_infers_fresh_nodes_linking_argument_and_result() {
    let mut u = UnitBuilder::new();
    let container = u.container;
    let identity = u.external_method(
        container,
        "Identity",
        true,
        vec![TypeParamDecl::invariant("T")],
        vec![(Ty::method_param(0), NullableAnnotation::None, RefKind::None)],
        (Ty::method_param(0), NullableAnnotation::None),
    );

    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let call = u.invoke(identity.symbol, None, vec![input]);
    u.expr_body(&m, call);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

/// A `ref` argument is assignable in both directions: an annotated-nullable
/// `ref` parameter makes the caller's argument nullable too.
#[test]
fn ref_arguments_flow_both_ways() {
    let mut u = UnitBuilder::new();
    let container = u.container;
    let string_def = u.unit.defs.builtins.string;
    let void_def = u.unit.defs.builtins.void;
    let clear = u.external_method(
        container,
        "Clear",
        true,
        Vec::new(),
        vec![(
            Ty::named(string_def),
            NullableAnnotation::Annotated,
            RefKind::Ref,
        )],
        (Ty::named(void_def), NullableAnnotation::None),
    );

    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let call = u.invoke_with(
        clear.symbol,
        None,
        None,
        vec![Argument {
            value: input,
            ref_kind: RefKind::Ref,
        }],
    );
    let call_stmt = u.stmt(call);
    let input_2 = u.param_ref(m.params[0]);
    let tail = u.ret(input_2);
    let body = u.block(vec![call_stmt, tail]);
    u.body(&m, body);
    let unit = u.finish();
    // nullable flows out of the ref parameter, through the argument, into
    // the return
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(true),
            return_depends_on_input: Some(true),
            input_must_be_non_null: None,
        },
    )
    .unwrap();

    // A plain by-value argument only flows inward: no nullable return.
    let mut u = UnitBuilder::new();
    let container = u.container;
    let consume = u.external_method(
        container,
        "Consume",
        true,
        Vec::new(),
        vec![(
            Ty::named(string_def),
            NullableAnnotation::Annotated,
            RefKind::None,
        )],
        (Ty::named(void_def), NullableAnnotation::None),
    );
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let call = u.invoke(consume.symbol, None, vec![input]);
    let call_stmt = u.stmt(call);
    let input_2 = u.param_ref(m.params[0]);
    let tail = u.ret(input_2);
    let body = u.block(vec![call_stmt, tail]);
    u.body(&m, body);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(false),
            return_depends_on_input: Some(true),
            input_must_be_non_null: None,
        },
    )
    .unwrap();
}

/// A variadic parameter with non-null elements constrains each expanded
/// argument at the element type.
#[test]
fn params_arguments_assign_at_the_element_type() {
    let mut u = UnitBuilder::new();
    let container = u.container;
    let object = u.unit.defs.builtins.object;
    let void_def = u.unit.defs.builtins.void;
    let concat = u.external_method(
        container,
        "Concat",
        true,
        Vec::new(),
        vec![(
            Ty::Array(Box::new(Ty::named(object))),
            NullableAnnotation::NotAnnotated,
            RefKind::Params,
        )],
        (Ty::named(void_def), NullableAnnotation::None),
    );

    let ret_ty = u.void_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let call = u.invoke(concat.symbol, None, vec![input]);
    let body = u.stmt(call);
    u.body(&m, body);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: None,
            return_depends_on_input: None,
            input_must_be_non_null: Some(true),
        },
    )
    .unwrap();
}

/// Invoking a property's set accessor routes the implicit `value` parameter
/// to the property's own node.
#[test]
fn setter_value_parameter_assigns_into_the_property() {
    let mut u = UnitBuilder::new();
    let prop_ty = u.string_ty();
    let p = u.property("Name", prop_ty);
    let setter = u.setter_for(p);

    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let set_call = u.invoke(setter.symbol, None, vec![input]);
    let set_stmt = u.stmt(set_call);
    let read = u.member_ref(p, None);
    let tail = u.ret(read);
    let body = u.block(vec![set_stmt, tail]);
    u.body(&m, body);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

// =============================================================================
// Object shapes
// =============================================================================

/// `var p = new Program { F = input }; return p.F;`
#[test]
fn object_initializer_targets_the_member_slot() {
    let mut u = UnitBuilder::new();
    let field_ty = u.string_ty();
    let f = u.field("F", field_ty);

    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let p = u.var_local("p");
    let container = u.container;
    let program_ty = u.named_ty(container);
    let input = u.param_ref(m.params[0]);
    let init = u.member_init(f, input);
    let creation = u.new_object_with(program_ty, None, Vec::new(), vec![init]);
    let decl = u.decl(p, Some(creation));

    let p_use = u.local_ref(p);
    let read = u.member_ref(f, Some(p_use));
    let tail = u.ret(read);
    let body = u.block(vec![decl, tail]);
    u.body(&m, body);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

/// `return new List<string> { input }[0];` in spirit: collection
/// initializer entries are `Add` calls against the creation's type
/// arguments.
#[test]
fn collection_initializer_models_add_calls() {
    let mut u = UnitBuilder::new();
    let list = u.unit.defs.builtins.list;
    let add = u.external_method(
        list,
        "Add",
        false,
        Vec::new(),
        vec![(Ty::class_param(0), NullableAnnotation::None, RefKind::None)],
        (
            Ty::named(u.unit.defs.builtins.void),
            NullableAnnotation::None,
        ),
    );
    let indexer = u.external_property(list, "Item", Ty::class_param(0), NullableAnnotation::None);

    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let elem = u.string_ty();
    let list_ty = u.generic_ty(list, vec![elem]);
    let input = u.param_ref(m.params[0]);
    let entry = u.add_init(Some(add.symbol), vec![input]);
    let creation = u.new_object_with(list_ty, None, Vec::new(), vec![entry]);
    let zero = u.int_lit();
    let load = u.index_with(creation, indexer, vec![zero]);
    u.expr_body(&m, load);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

/// `var a = new { Name = input }; return a.Name;`: each anonymous member
/// adopts its initializer's node tree.
#[test]
fn anonymous_object_members_adopt_their_initializers() {
    let mut u = UnitBuilder::new();
    let object = u.unit.defs.builtins.object;
    let anon_def = u.unit.defs.add(
        "<anonymous>",
        "Demo.<anonymous>",
        TypeDefKind::Class,
        Vec::new(),
        vec![Ty::named(object)],
    );
    let name = u.anon_property("Name");

    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let a = u.var_local("a");
    let input = u.param_ref(m.params[0]);
    let creation = u.anon_object(Ty::named(anon_def), vec![(name, input)]);
    let decl = u.decl(a, Some(creation));

    let a_use = u.local_ref(a);
    let read = u.member_ref(name, Some(a_use));
    let tail = u.ret(read);
    let body = u.block(vec![decl, tail]);
    u.body(&m, body);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

/// `(a, b) = (input, "x"); return a;`
#[test]
fn deconstruction_assigns_element_wise() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let a_ty = u.string_ty();
    let a = u.local("a", a_ty);
    let decl_a = u.decl(a, None);
    let b_ty = u.string_ty();
    let b = u.local("b", b_ty);
    let decl_b = u.decl(b, None);

    let input = u.param_ref(m.params[0]);
    let x = u.string_lit("x");
    let tuple = u.tuple_lit(vec![input, x]);
    let a_target = u.local_ref(a);
    let b_target = u.local_ref(b);
    let deconstruct = u.deconstruct(vec![a_target, b_target], tuple);
    let deconstruct_stmt = u.stmt(deconstruct);

    let a_use = u.local_ref(a);
    let tail = u.ret(a_use);
    let body = u.block(vec![decl_a, decl_b, deconstruct_stmt, tail]);
    u.body(&m, body);
    let unit = u.finish();
    assert!(has_path_from_parameter_to_return_type(&unit).unwrap());
}

// =============================================================================
// Functions as values
// =============================================================================

/// A function-typed return wires its parameter through the lambda into its
/// result: `Func<string, string> Test() => x => x;`
#[test]
fn lambda_conversion_adopts_the_delegate_shape() {
    let mut u = UnitBuilder::new();
    let p_ty = u.string_ty();
    let r_ty = u.string_ty();
    let ret_ty = u.fn_ty(vec![p_ty], r_ty);
    let m = u.method("Test", ret_ty, Vec::new());

    // the lambda's parameter and return are implicitly typed; both adopt
    // the delegate target's nodes
    let x_ty = u.var_ty();
    let lam_ret_ty = u.var_ty();
    let lam = u.lambda_symbol(vec![("x", x_ty)], lam_ret_ty);
    let x_use = u.param_ref(lam.params[0]);
    let lam_body = u.ret(x_use);
    let lam_op = u.lambda(lam.symbol, lam_body);

    let tp = u.string_ty();
    let tr = u.string_ty();
    let target = u.fn_ty(vec![tp], tr);
    let conv = u.convert(lam_op, ConversionKind::Reference, target);
    u.expr_body(&m, conv);
    let unit = u.finish();

    let types = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let ret_twn = types.symbol_type(&unit, m.symbol);
    // args = [parameter, return]
    assert_eq!(ret_twn.args.len(), 2);
    assert!(has_path(
        &types.graph,
        ret_twn.args[0].node,
        ret_twn.args[1].node
    ));
}

/// `async Task<string> Test(string input) { return await Wrap(input); }`
/// with `Task<T> Wrap<T>(T value)`: the wrapper is transparent.
#[test]
fn async_return_and_await_unwrap_the_task() {
    let mut u = UnitBuilder::new();
    let container = u.container;
    let task = u.unit.defs.builtins.task;
    let wrap = u.external_method(
        container,
        "Wrap",
        true,
        vec![TypeParamDecl::invariant("T")],
        vec![(Ty::method_param(0), NullableAnnotation::None, RefKind::None)],
        (
            Ty::named_with(task, vec![Ty::method_param(0)]),
            NullableAnnotation::NotAnnotated,
        ),
    );

    let inner = u.string_ty();
    let ret_ty = u.generic_ty(task, vec![inner]);
    let param_ty = u.string_ty();
    let m = {
        let params = vec![("input".to_string(), param_ty, RefKind::None)];
        u.method_with("Test", ret_ty, params, Vec::new(), true)
    };
    let input = u.param_ref(m.params[0]);
    let call = u.invoke(wrap.symbol, None, vec![input]);
    let awaited = u.await_expr(call);
    u.expr_body(&m, awaited);
    let unit = u.finish();

    let types = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let param_twn = types.symbol_type(&unit, m.params[0]);
    let ret_twn = types.symbol_type(&unit, m.symbol);
    // the parameter reaches the task's payload, not the task itself
    assert!(has_path(
        &types.graph,
        param_twn.node,
        ret_twn.args[0].node
    ));
    assert!(!has_path(&types.graph, param_twn.node, ret_twn.node));
}

/// `IEnumerable<string> Test(string input) { yield return input; }`
#[test]
fn yield_return_assigns_into_the_sequence_element() {
    let mut u = UnitBuilder::new();
    let sequence = u.unit.defs.builtins.sequence;
    let inner = u.string_ty();
    let ret_ty = u.generic_ty(sequence, vec![inner]);
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let yielded = u.yield_ret(input);
    u.body(&m, yielded);
    let unit = u.finish();

    let types = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let param_twn = types.symbol_type(&unit, m.params[0]);
    let ret_twn = types.symbol_type(&unit, m.symbol);
    assert!(has_path(
        &types.graph,
        param_twn.node,
        ret_twn.args[0].node
    ));
}

/// `foreach (var s in input) return s;` over `List<string>`: the loop
/// variable adopts the element reached through the declared bases.
#[test]
fn foreach_element_flows_from_the_collections_argument() {
    let mut u = UnitBuilder::new();
    let list = u.unit.defs.builtins.list;
    let elem = u.string_ty();
    let param_ty = u.generic_ty(list, vec![elem]);
    let ret_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let s = u.var_local("s");
    let collection = u.param_ref(m.params[0]);
    let s_use = u.local_ref(s);
    let tail = u.ret(s_use);
    let loop_stmt = u.foreach(s, collection, tail);
    u.body(&m, loop_stmt);
    let unit = u.finish();

    let types = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let param_twn = types.symbol_type(&unit, m.params[0]);
    let ret_twn = types.symbol_type(&unit, m.symbol);
    assert!(has_path(
        &types.graph,
        param_twn.args[0].node,
        ret_twn.node
    ));
}

// =============================================================================
// Patterns
// =============================================================================

/// `obj is { Name: var x }` binds `x` to the property's nodes.
#[test]
fn property_pattern_binds_the_member_type() {
    let mut u = UnitBuilder::new();
    let object = u.unit.defs.builtins.object;
    let string_def = u.unit.defs.builtins.string;
    let box_def = u.unit.defs.add(
        "Box",
        "Demo.Box",
        TypeDefKind::Class,
        Vec::new(),
        vec![Ty::named(object)],
    );
    let name = u.external_property(
        box_def,
        "Name",
        Ty::named(string_def),
        NullableAnnotation::Annotated,
    );

    let ret_ty = u.string_ty();
    let param_ty = u.named_ty(box_def);
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);

    let x = u.var_local("x");
    let input = u.param_ref(m.params[0]);
    let check = u.is_pattern(
        input,
        Pattern::Property {
            clauses: vec![nullscape::lang::PropertyClause {
                member: name,
                binding: x,
            }],
        },
    );
    let check_stmt = u.stmt(check);
    let x_use = u.local_ref(x);
    let tail = u.ret(x_use);
    let body = u.block(vec![check_stmt, tail]);
    u.body(&m, body);
    let unit = u.finish();
    // the property is annotated nullable, so the return is too
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(true),
            return_depends_on_input: None,
            input_must_be_non_null: None,
        },
    )
    .unwrap();
}

/// `c ? input : null`: both branches feed the fresh result, each visited
/// exactly once.
#[test]
fn conditional_merges_both_branches_once() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let bool_ty = u.bool_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty), ("c", bool_ty)]);

    let c = u.param_ref(m.params[1]);
    let input = u.param_ref(m.params[0]);
    let null = u.null_lit();
    let pick = u.conditional(c, input, null);
    u.expr_body(&m, pick);
    let unit = u.finish();

    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(true),
            return_depends_on_input: Some(true),
            input_must_be_non_null: Some(false),
        },
    )
    .unwrap();

    // exactly one branch edge leaves the parameter
    let types = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let param_node = types.symbol_type(&unit, m.params[0]).node;
    let branch_edges = types
        .graph
        .edges()
        .filter(|(_, e)| e.source == param_node && e.label == "conditional branch")
        .count();
    assert_eq!(branch_edges, 1);
}

/// The null-forgiving postfix replaces the outer node and passes inner
/// nodes through.
#[test]
fn null_forgiving_suppresses_the_outer_flow() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let forgiven = u.bang(input);
    u.expr_body(&m, forgiven);
    let unit = u.finish();
    check_paths(
        &unit,
        &PathExpectations {
            return_nullable: Some(false),
            return_depends_on_input: Some(false),
            input_must_be_non_null: Some(false),
        },
    )
    .unwrap();
}

// =============================================================================
// Diagnostics and failure modes
// =============================================================================

/// A node forced from both sides is a contradiction: reported, and the
/// verdict keeps the nullable side.
#[test]
fn contradictions_are_reported_and_default_nullable() {
    let mut u = UnitBuilder::new();
    let string_def = u.unit.defs.builtins.string;
    let int32 = u.unit.defs.builtins.int32;
    let length = u.external_property(
        string_def,
        "Length",
        Ty::named(int32),
        NullableAnnotation::None,
    );

    let ret_ty = u.int_ty();
    let m = u.method("Test", ret_ty, Vec::new());

    // string s = null; return s.Length;
    let s_ty = u.string_ty();
    let s_syntax_id = s_ty.id();
    let s = u.local("s", s_ty);
    let null = u.null_lit();
    let decl = u.decl(s, Some(null));
    let s_use = u.local_ref(s);
    let access = u.member_ref(length, Some(s_use));
    let tail = u.ret(access);
    let body = u.block(vec![decl, tail]);
    u.body(&m, body);
    let unit = u.finish();

    let result = infer(&unit, &options(), &CancelToken::new()).unwrap();
    assert_eq!(result.stats.contradictions, 1);
    assert!(
        result
            .diagnostics
            .iter()
            .any(|d| d.message.contains("contradiction"))
    );
    let verdict = result
        .verdicts
        .iter()
        .find(|(span, _)| span.syntax == s_syntax_id)
        .map(|(_, v)| *v)
        .unwrap();
    assert_eq!(verdict, Verdict::Nullable);
}

/// An operation kind the builder does not model aborts the tree.
#[test]
fn unknown_operations_are_fatal() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.void_ty();
    let m = u.method("Test", ret_ty, Vec::new());
    let mystery = u.unknown("pointer arithmetic");
    let body = u.stmt(mystery);
    u.body(&m, body);
    let unit = u.finish();
    let err = build_graph(&unit, &options(), &CancelToken::new()).unwrap_err();
    assert!(matches!(
        err,
        BuildError::UnsupportedOperation { ref kind, .. } if kind == "pointer arithmetic"
    ));
}

/// Unconstrained inferred nodes default to non-null; value positions stay
/// oblivious.
#[test]
fn default_verdicts_preserve_the_unannotated_contract() {
    let mut u = UnitBuilder::new();
    let ret_ty = u.string_ty();
    let ret_syntax = ret_ty.id();
    let param_ty = u.int_ty();
    let param_syntax = param_ty.id();
    let m = u.method("Test", ret_ty, vec![("count", param_ty)]);
    let abc = u.string_lit("abc");
    u.expr_body(&m, abc);
    let unit = u.finish();

    let result = infer(&unit, &options(), &CancelToken::new()).unwrap();
    let verdict_of = |syntax| {
        result
            .verdicts
            .iter()
            .find(|(span, _)| span.syntax == syntax)
            .map(|(_, v)| *v)
            .unwrap()
    };
    assert_eq!(verdict_of(ret_syntax), Verdict::NonNull);
    assert_eq!(verdict_of(param_syntax), Verdict::Oblivious);
    assert_eq!(result.stats.trees, 1);
}

// =============================================================================
// Cross-tree construction
// =============================================================================

/// Symbols declared in one tree are visible to bodies in another, and the
/// committed graph is identical however the builders are scheduled.
#[test]
fn cross_tree_calls_link_through_the_registry() {
    let mut u = UnitBuilder::new();
    let helper = {
        let ret_ty = u.string_ty();
        let param_ty = u.string_ty();
        let h = u.method("Helper", ret_ty, vec![("x", param_ty)]);
        let x = u.param_ref(h.params[0]);
        u.expr_body(&h, x);
        h
    };
    u.next_tree("second.src");
    let ret_ty = u.string_ty();
    let param_ty = u.string_ty();
    let m = u.method("Test", ret_ty, vec![("input", param_ty)]);
    let input = u.param_ref(m.params[0]);
    let call = u.invoke(helper.symbol, None, vec![input]);
    u.expr_body(&m, call);
    let unit = u.finish();

    let parallel = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let serial = build_graph(
        &unit,
        &InferenceOptions {
            parallel: false,
            ..options()
        },
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(
        nullscape::export::to_json(&parallel).unwrap(),
        nullscape::export::to_json(&serial).unwrap()
    );

    let types = parallel;
    let input_node = types.symbol_type(&unit, m.params[0]).node;
    let ret_node = types.symbol_type(&unit, m.symbol).node;
    assert!(has_path(&types.graph, input_node, ret_node));
}

/// Assigning a handler parameter into a declared event constrains the
/// event's node.
#[test]
fn event_assignment_flows_into_the_event() {
    let mut u = UnitBuilder::new();
    let p_ty = u.string_ty();
    let r_ty = u.void_ty();
    let handler_ty = u.fn_ty(vec![p_ty], r_ty);
    let e = u.event("Changed", handler_ty);

    let ret_ty = u.void_ty();
    let hp_ty = {
        let p = u.string_ty();
        let r = u.void_ty();
        u.fn_ty(vec![p], r)
    };
    let m = u.method("Test", ret_ty, vec![("handler", hp_ty)]);
    let target = u.member_ref(e, None);
    let value = u.param_ref(m.params[0]);
    let store = u.assign(target, value);
    let body = u.stmt(store);
    u.body(&m, body);
    let unit = u.finish();

    let types = build_graph(&unit, &options(), &CancelToken::new()).unwrap();
    let handler_node = types.symbol_type(&unit, m.params[0]).node;
    let event_node = types.symbol_type(&unit, e).node;
    assert!(has_path(&types.graph, handler_node, event_node));
}
