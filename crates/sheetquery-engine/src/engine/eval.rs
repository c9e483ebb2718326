//! Rhai engine creation and scoped query evaluation.
//!
//! A query runs on a raw engine with a short list of packages and the table
//! API registered, inside a fresh scope whose only binding is `df`. After the
//! run the value of `x` is the result.
//!
//! This is an isolation boundary, not a sandbox. A query can call anything
//! reachable through `df` and the registered packages, and error messages
//! are passed back verbatim. Resource use is bounded only by [`EvalLimits`].

use std::time::{Duration, Instant};

use rhai::packages::{
    BasicArrayPackage, BasicMapPackage, BasicMathPackage, CorePackage, LogicPackage, Package,
};
use rhai::{Engine, EvalAltResult, EvalContext, Expression, ParseError, Position, Scope};

use super::frame::DataFrame;
use super::preprocess::{ASSIGN_KEYWORD, assigned_names, rewrite_assignments};
use super::table::Table;
use super::Dynamic;

/// Name the table is bound to inside a query.
pub const TABLE_BINDING: &str = "df";

/// Name a query must assign its answer to.
pub const RESULT_BINDING: &str = "x";

/// Token carried by the termination error when the wall-clock limit is hit.
pub const TIMEOUT_TOKEN: &str = "timeout";

/// Placeholder for a name the query assigns but has not assigned yet.
#[derive(Clone, Debug)]
pub struct Unbound;

/// Resource limits applied to one evaluation. Zero disables a limit.
#[derive(Clone, Debug, PartialEq)]
pub struct EvalLimits {
    pub max_operations: u64,
    pub timeout: Option<Duration>,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_call_depth: usize,
}

impl Default for EvalLimits {
    fn default() -> Self {
        EvalLimits {
            max_operations: 10_000_000,
            timeout: Some(Duration::from_secs(5)),
            max_string_size: 1_048_576,
            max_array_size: 1_000_000,
            max_call_depth: 64,
        }
    }
}

/// What a query left under `x`.
#[derive(Clone, Debug)]
pub enum ResultValue {
    /// `x` was never assigned.
    Unbound,
    Bound(Dynamic),
}

impl ResultValue {
    pub fn is_bound(&self) -> bool {
        matches!(self, ResultValue::Bound(_))
    }
}

/// Create the query engine: no ambient packages beyond core language,
/// logic, math, arrays and maps, plus the table API.
///
/// Bare `name = value` statements reach the engine as `__assign name = value`
/// (see [`rewrite_assignments`]). Writes go through that syntax, so every
/// other access to a slot still holding [`Unbound`] is a read and fails as
/// an unknown variable.
pub fn create_engine(limits: &EvalLimits) -> Result<Engine, Box<EvalAltResult>> {
    let mut engine = Engine::new_raw();
    CorePackage::new().register_into_engine(&mut engine);
    LogicPackage::new().register_into_engine(&mut engine);
    BasicMathPackage::new().register_into_engine(&mut engine);
    BasicArrayPackage::new().register_into_engine(&mut engine);
    BasicMapPackage::new().register_into_engine(&mut engine);

    engine.disable_symbol("eval");
    engine.register_type_with_name::<Unbound>("unbound");
    crate::builtins::register_builtins(&mut engine);

    engine
        .register_custom_syntax([ASSIGN_KEYWORD, "$ident$", "=", "$expr$"], false, assign)
        .map_err(parse_error)?;
    #[allow(deprecated)]
    engine.on_var(|name, _, context| {
        match context.scope().get(name) {
            Some(value) if value.is::<Unbound>() => Err(Box::new(
                EvalAltResult::ErrorVariableNotFound(name.to_string(), Position::NONE),
            )),
            _ => Ok(None),
        }
    });

    apply_limits(&mut engine, limits);
    Ok(engine)
}

/// `__assign name = value`: store into an existing slot, writing through
/// shared values captured by closures.
fn assign(context: &mut EvalContext, inputs: &[Expression]) -> Result<Dynamic, Box<EvalAltResult>> {
    let target = &inputs[0];
    let name = target.get_string_value().unwrap_or_default().to_string();
    let value = context.eval_expression_tree(&inputs[1])?.flatten();

    let scope = context.scope_mut();
    if scope.is_constant(&name) == Some(true) {
        return Err(Box::new(EvalAltResult::ErrorAssignmentToConstant(
            name,
            target.position(),
        )));
    }
    let Some(slot) = scope.get_mut(&name) else {
        return Err(Box::new(EvalAltResult::ErrorVariableNotFound(name, target.position())));
    };
    match slot.write_lock::<Dynamic>() {
        Some(mut current) => *current = value,
        None => {
            return Err(Box::new(EvalAltResult::ErrorDataRace(name, target.position())));
        }
    }
    Ok(Dynamic::UNIT)
}

fn parse_error(e: ParseError) -> Box<EvalAltResult> {
    let parse_type = *e.0;
    let pos = e.1;
    Box::new(EvalAltResult::ErrorParsing(parse_type, pos))
}

fn apply_limits(engine: &mut Engine, limits: &EvalLimits) {
    engine.set_max_operations(limits.max_operations);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_array_size);
    if limits.max_call_depth > 0 {
        engine.set_max_call_levels(limits.max_call_depth);
        engine.set_max_expr_depths(limits.max_call_depth, limits.max_call_depth);
    }

    if let Some(timeout) = limits.timeout.filter(|t| !t.is_zero()) {
        let started = Instant::now();
        engine.on_progress(move |_| {
            if started.elapsed() > timeout {
                Some(TIMEOUT_TOKEN.into())
            } else {
                None
            }
        });
    }
}

/// Build the scope a query runs in: `df`, plus placeholders for the names
/// the query itself assigns.
pub fn create_scope(table: &Table, expression: &str) -> Scope<'static> {
    let mut scope = Scope::new();
    scope.push(TABLE_BINDING, DataFrame::new(table.clone()));
    for name in assigned_names(expression) {
        if name != TABLE_BINDING {
            scope.push(name, Unbound);
        }
    }
    scope
}

/// Evaluate `expression` against `table` and return what it left in `x`.
///
/// The table is copied into the query's scope, so nothing the query does is
/// visible to the caller. Parse and runtime failures are returned as the
/// Rhai error.
pub fn evaluate(
    table: &Table,
    expression: &str,
    limits: &EvalLimits,
) -> Result<ResultValue, Box<EvalAltResult>> {
    let engine = create_engine(limits)?;
    let mut scope = create_scope(table, expression);

    let ast = engine
        .compile_with_scope(&scope, rewrite_assignments(expression))
        .map_err(parse_error)?;
    engine.run_ast_with_scope(&mut scope, &ast)?;

    Ok(read_result(&scope))
}

fn read_result(scope: &Scope) -> ResultValue {
    match scope.get_value::<Dynamic>(RESULT_BINDING) {
        Some(value) if !value.is::<Unbound>() => ResultValue::Bound(value.flatten()),
        _ => ResultValue::Unbound,
    }
}

/// True when an evaluation error came from the wall-clock limit.
pub fn is_timeout(err: &EvalAltResult) -> bool {
    match err {
        EvalAltResult::ErrorTerminated(token, _) => {
            token.clone().into_string().is_ok_and(|s| s == TIMEOUT_TOKEN)
        }
        _ => false,
    }
}
