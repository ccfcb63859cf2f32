//! Tree-walking evaluator
//!
//! Statements are evaluated one top-level statement at a time. `break` and
//! `return` travel outward as [`Flow`] values; every scope pushed on the way in
//! is popped by a guard on the way out, whichever way that is.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use log::{debug, warn};

use crate::frontend::ast::*;
use crate::frontend::Parser;
use crate::interpreter::environment::{EnvironmentKind, EnvironmentStack};
use crate::interpreter::operations;
use crate::interpreter::value::{Closure, Namespace, Value};
use crate::utils::{Result, RuntimeError};

/// Interpreter limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Nested function calls allowed before `CallDepthExceeded`
    pub max_call_depth: usize,
}

/// Native stack one script-level call may need in an unoptimized build
const STACK_PER_CALL: usize = 64 * 1024;
const MIN_STACK_SIZE: usize = 8 * 1024 * 1024;

impl InterpreterConfig {
    /// Native stack size a thread needs to reach `max_call_depth` without
    /// overflowing first
    pub fn stack_size(&self) -> usize {
        self.max_call_depth
            .saturating_add(1)
            .saturating_mul(STACK_PER_CALL)
            .max(MIN_STACK_SIZE)
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self { max_call_depth: 128 }
    }
}

/// How evaluation left a statement or expression
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal(Value),
    Break,
    Return(Value),
}

/// Unwrap a normal value, handing any other flow to the caller
macro_rules! proceed {
    ($flow:expr) => {
        match $flow {
            Flow::Normal(value) => value,
            signal => return Ok(signal),
        }
    };
}

/// Counters for one [`Interpreter::run_parser`] call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionStats {
    pub statements_run: usize,
    pub statements_failed: usize,
    /// Statements that did not parse cleanly and were never evaluated
    pub statements_skipped: usize,
}

pub struct Interpreter {
    stack: EnvironmentStack,
    namespaces: HashMap<String, Rc<Namespace>>,
    config: InterpreterConfig,
    call_depth: usize,
    should_quit: Rc<Cell<bool>>,
    errors: Vec<RuntimeError>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self {
            stack: EnvironmentStack::new(),
            namespaces: HashMap::new(),
            config,
            call_depth: 0,
            should_quit: Rc::new(Cell::new(false)),
            errors: Vec::new(),
        }
    }

    /// Shared flag that stops [`Interpreter::run_parser`] once set
    pub fn quit_flag(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.should_quit)
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit.get()
    }

    /// Bind a constant in the root environment
    pub fn define_global(&mut self, name: &str, value: Value) -> Result<()> {
        self.stack.initialize(name, value, true)
    }

    /// Make a namespace available to `pull`
    pub fn register_namespace(&mut self, namespace: Namespace) {
        self.namespaces
            .insert(namespace.name.clone(), Rc::new(namespace));
    }

    /// Read a variable visible at the top level
    pub fn global(&self, name: &str) -> Option<Value> {
        self.stack.access(name).ok()
    }

    /// Runtime errors reported so far
    pub fn errors(&self) -> &[RuntimeError] {
        &self.errors
    }

    pub fn take_errors(&mut self) -> Vec<RuntimeError> {
        mem::take(&mut self.errors)
    }

    /// Evaluate one top-level statement.
    ///
    /// Any failure, including a panic in host code, is stamped with the
    /// statement's start position and recorded; the environment stack is
    /// restored so the next statement runs normally.
    pub fn run(&mut self, statement: &Statement) -> Option<Value> {
        debug!("run statement at {}", statement.span.start);
        let depth = self.stack.depth();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(statement)))
            .unwrap_or_else(|payload| Err(RuntimeError::internal(panic_message(payload.as_ref()))));

        self.stack.truncate(depth);
        self.call_depth = 0;

        match outcome {
            Ok(Flow::Normal(value) | Flow::Return(value)) => Some(value),
            Ok(Flow::Break) => Some(Value::Null),
            Err(error) => {
                let error = error.at(statement.span.start);
                warn!("{}: {}", error.position(), error);
                self.errors.push(error);
                None
            }
        }
    }

    /// Pull statements from `parser` and run each one that parsed cleanly,
    /// until the text ends or `quit()` is called
    pub fn run_parser(&mut self, parser: &mut Parser<'_>) -> ExecutionStats {
        let mut stats = ExecutionStats::default();
        while !self.should_quit() {
            let Some(outcome) = parser.next() else {
                break;
            };
            match outcome.statement {
                Some(statement) if outcome.success => match self.run(&statement) {
                    Some(_) => stats.statements_run += 1,
                    None => stats.statements_failed += 1,
                },
                _ => stats.statements_skipped += 1,
            }
        }
        debug!("{:?}", stats);
        stats
    }

    /// Call a function value with already evaluated arguments
    pub fn call(&mut self, callee: &Value, arguments: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, arguments),
            Value::Native(native) => {
                if let Some(arity) = native.arity {
                    if arity != arguments.len() {
                        return Err(RuntimeError::bad_argument_count(arity, arguments.len()));
                    }
                }
                (native.func)(&arguments)
            }
            other => Err(RuntimeError::not_callable(other.type_name())),
        }
    }

    // ==================== Statements ====================

    fn execute(&mut self, statement: &Statement) -> Result<Flow> {
        match &statement.kind {
            StatementKind::NamespaceImport { path } => {
                self.import(path)?;
                Ok(Flow::Normal(Value::Null))
            }
            StatementKind::VariableInitList(inits) => {
                for init in inits {
                    let value = match &init.value {
                        Some(value) => proceed!(self.evaluate(value)?),
                        None => Value::Null,
                    };
                    self.stack.initialize(&init.name, value, init.is_const)?;
                }
                self.stack.finalize()?;
                Ok(Flow::Normal(Value::Null))
            }
            StatementKind::Break => {
                self.stack.register_break()?;
                Ok(Flow::Break)
            }
            StatementKind::BreakIf(condition) => {
                let condition = proceed!(self.evaluate(condition)?);
                if truth(&condition)? {
                    self.stack.register_break()?;
                    Ok(Flow::Break)
                } else {
                    Ok(Flow::Normal(Value::Null))
                }
            }
            StatementKind::Return(value) => {
                self.stack.register_return()?;
                let value = match value {
                    Some(value) => proceed!(self.evaluate(value)?),
                    None => Value::Null,
                };
                Ok(Flow::Return(value))
            }
            StatementKind::Expression(expression) => self.evaluate(expression),
        }
    }

    /// `pull a.b.c;` binds the value at the end of the path under its last name
    fn import(&mut self, path: &[String]) -> Result<()> {
        let (first, rest) = path
            .split_first()
            .ok_or_else(|| RuntimeError::internal("empty import path"))?;
        let namespace = self
            .namespaces
            .get(first)
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_namespace(first))?;

        let mut value = Value::Namespace(namespace);
        let mut name = first;
        for member in rest {
            value = member_of(&value, member)?;
            name = member;
        }

        debug!("pull {} as {}", path.join("."), name);
        self.stack.initialize(name, value, false)?;
        self.stack.finalize()
    }

    // ==================== Expressions ====================

    fn evaluate(&mut self, expression: &Expression) -> Result<Flow> {
        match &expression.kind {
            ExpressionKind::Block(statements) => self.evaluate_block(statements),
            ExpressionKind::Conditional { branches, otherwise } => {
                for branch in branches {
                    let condition = proceed!(self.evaluate(&branch.condition)?);
                    if truth(&condition)? {
                        return self.evaluate(&branch.body);
                    }
                }
                match otherwise {
                    Some(body) => self.evaluate(body),
                    None => Ok(Flow::Normal(Value::Null)),
                }
            }
            ExpressionKind::ForLoop { counter, range, body } => {
                self.evaluate_for(counter.as_deref(), range, body)
            }
            ExpressionKind::WhileLoop { condition, body } => self.evaluate_while(condition, body),
            ExpressionKind::FunctionDefinition(definition) => {
                Ok(Flow::Normal(Value::Function(Rc::new(Closure {
                    definition: Rc::clone(definition),
                    captured: self.stack.clone(),
                }))))
            }
            ExpressionKind::PatternMatching { argument, branches } => {
                self.evaluate_match(argument, branches)
            }
            ExpressionKind::Grouping(inner) => self.evaluate(inner),
            ExpressionKind::Binary { left, operator, right } => {
                self.evaluate_binary(left, *operator, right)
            }
            ExpressionKind::Unary { operator, operand } => {
                let operand = proceed!(self.evaluate(operand)?);
                Ok(Flow::Normal(operations::unary(*operator, &operand)?))
            }
            ExpressionKind::FunctionCall { callee, arguments } => {
                let callee = proceed!(self.evaluate(callee)?);
                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(proceed!(self.evaluate(argument)?));
                }
                Ok(Flow::Normal(self.call(&callee, values)?))
            }
            ExpressionKind::Identifier(name) => Ok(Flow::Normal(self.stack.access(name)?)),
            ExpressionKind::Literal(literal) => Ok(Flow::Normal(literal_value(literal))),
            ExpressionKind::TypeCast { target, operand } => {
                let operand = proceed!(self.evaluate(operand)?);
                Ok(Flow::Normal(operations::cast(&operand, *target)?))
            }
            // A bare type name evaluates to its name
            ExpressionKind::Type(type_name) => Ok(Flow::Normal(Value::string(type_name.to_string()))),
        }
    }

    /// The value of a block is the value of its unterminated last statement
    fn evaluate_block(&mut self, statements: &[Statement]) -> Result<Flow> {
        let mut scope = ScopeGuard::new(self, EnvironmentKind::Block);
        let mut result = Value::Null;
        for statement in statements {
            let value = proceed!(scope.execute(statement)?);
            if !statement.terminated {
                result = value;
            }
        }
        Ok(Flow::Normal(result))
    }

    fn evaluate_for(&mut self, counter: Option<&str>, range: &Range, body: &Expression) -> Result<Flow> {
        let start = match &range.start {
            Some(start) => proceed!(self.evaluate(start)?),
            None => Value::Int(0),
        };
        let end = proceed!(self.evaluate(&range.end)?);
        let step = match &range.step {
            Some(step) => proceed!(self.evaluate(step)?),
            None => Value::Int(1),
        };

        for value in CounterRange::new(&start, &end, &step)? {
            let mut scope = ScopeGuard::new(self, EnvironmentKind::Loop);
            if let Some(name) = counter {
                scope.stack.initialize(name, value, false)?;
            }
            match scope.evaluate(body)? {
                Flow::Normal(_) => {}
                Flow::Break => break,
                signal @ Flow::Return(_) => return Ok(signal),
            }
        }
        Ok(Flow::Normal(Value::Null))
    }

    fn evaluate_while(&mut self, condition: &Expression, body: &Expression) -> Result<Flow> {
        loop {
            let value = proceed!(self.evaluate(condition)?);
            if !truth(&value)? {
                break;
            }
            let mut scope = ScopeGuard::new(self, EnvironmentKind::Loop);
            match scope.evaluate(body)? {
                Flow::Normal(_) => {}
                Flow::Break => break,
                signal @ Flow::Return(_) => return Ok(signal),
            }
        }
        Ok(Flow::Normal(Value::Null))
    }

    fn evaluate_binary(&mut self, left: &Expression, operator: Operator, right: &Expression) -> Result<Flow> {
        if operator.is_assignment() {
            return self.evaluate_assignment(left, operator, right);
        }

        let value = match operator {
            Operator::And | Operator::Or => {
                let short_circuit = operator == Operator::Or;
                let left = proceed!(self.evaluate(left)?);
                if truth(&left)? == short_circuit {
                    Value::Bool(short_circuit)
                } else {
                    let right = proceed!(self.evaluate(right)?);
                    Value::Bool(truth(&right)?)
                }
            }
            Operator::NullCoalescing => {
                let left = proceed!(self.evaluate(left)?);
                if left.is_null() {
                    proceed!(self.evaluate(right)?)
                } else {
                    left
                }
            }
            Operator::NullsafePipe => {
                let left = proceed!(self.evaluate(left)?);
                if left.is_null() {
                    Value::Null
                } else {
                    let function = proceed!(self.evaluate(right)?);
                    self.call(&function, vec![left])?
                }
            }
            Operator::Is | Operator::IsNot => {
                let left = proceed!(self.evaluate(left)?);
                let target = type_operand(right)?;
                Value::Bool(operations::is_type(&left, target) == (operator == Operator::Is))
            }
            Operator::Access => {
                let target = proceed!(self.evaluate(left)?);
                let ExpressionKind::Identifier(member) = &right.kind else {
                    return Err(RuntimeError::internal("member access needs a name"));
                };
                member_of(&target, member)?
            }
            _ => {
                let left = proceed!(self.evaluate(left)?);
                let right = proceed!(self.evaluate(right)?);
                binary_value(operator, &left, &right)?
            }
        };
        Ok(Flow::Normal(value))
    }

    /// `=` and the compound forms; the expression yields the stored value
    fn evaluate_assignment(&mut self, target: &Expression, operator: Operator, value: &Expression) -> Result<Flow> {
        let ExpressionKind::Identifier(name) = &target.kind else {
            return Err(RuntimeError::invalid_assignment_target());
        };

        let value = proceed!(self.evaluate(value)?);
        let value = match operator.compound_base() {
            Some(base) => operations::arithmetic(base, &self.stack.access(name)?, &value)?,
            None => value,
        };
        self.stack.assign(name, value.clone())?;
        Ok(Flow::Normal(value))
    }

    // ==================== Pattern Matching ====================

    /// The first branch whose pattern matches wins; `default` is taken only
    /// when none does
    fn evaluate_match(&mut self, argument: &Expression, branches: &[MatchBranch]) -> Result<Flow> {
        let argument = proceed!(self.evaluate(argument)?);

        let mut fallback = None;
        for branch in branches {
            let Some(pattern) = &branch.pattern else {
                fallback.get_or_insert(&branch.consequent);
                continue;
            };
            if proceed!(self.match_pattern(&argument, pattern)?) == Value::Bool(true) {
                return self.evaluate(&branch.consequent);
            }
        }

        match fallback {
            Some(consequent) => self.evaluate(consequent),
            None => Ok(Flow::Normal(Value::Null)),
        }
    }

    fn match_pattern(&mut self, argument: &Value, pattern: &Expression) -> Result<Flow> {
        let matched = match &pattern.kind {
            ExpressionKind::Grouping(inner) => return self.match_pattern(argument, inner),
            ExpressionKind::Binary { left, operator: Operator::MatchAnd, right } => {
                proceed!(self.match_pattern(argument, left)?) == Value::Bool(true)
                    && proceed!(self.match_pattern(argument, right)?) == Value::Bool(true)
            }
            ExpressionKind::Binary { left, operator: Operator::MatchOr, right } => {
                proceed!(self.match_pattern(argument, left)?) == Value::Bool(true)
                    || proceed!(self.match_pattern(argument, right)?) == Value::Bool(true)
            }
            ExpressionKind::Unary { operator: operator @ (Operator::MatchIs | Operator::MatchIsNot), operand } => {
                let target = type_operand(operand)?;
                operations::is_type(argument, target) == (*operator == Operator::MatchIs)
            }
            ExpressionKind::Unary { operator, operand } if operator.match_comparison().is_some() => {
                let comparison = operator.match_comparison().unwrap_or(Operator::Equal);
                let right = proceed!(self.evaluate(operand)?);
                operations::compare(comparison, argument, &right) == Value::Bool(true)
            }
            ExpressionKind::Literal(literal) => {
                operations::compare(Operator::Equal, argument, &literal_value(literal)) == Value::Bool(true)
            }
            // Any other expression is a guard when it yields a boolean and a
            // value to compare against otherwise
            _ => match proceed!(self.evaluate(pattern)?) {
                Value::Bool(guard) => guard,
                value => operations::compare(Operator::Equal, argument, &value) == Value::Bool(true),
            },
        };
        Ok(Flow::Normal(Value::Bool(matched)))
    }

    // ==================== Calls ====================

    fn call_closure(&mut self, closure: &Closure, arguments: Vec<Value>) -> Result<Value> {
        let parameters = &closure.definition.parameters;
        if parameters.len() != arguments.len() {
            return Err(RuntimeError::bad_argument_count(parameters.len(), arguments.len()));
        }
        if self.call_depth >= self.config.max_call_depth {
            return Err(RuntimeError::call_depth_exceeded(self.config.max_call_depth));
        }

        let mut frame = CallGuard::new(self, &closure.captured);
        for (parameter, argument) in parameters.iter().zip(arguments) {
            if parameter.non_null && argument.is_null() {
                return Err(RuntimeError::non_null_argument_required(&parameter.name));
            }
            frame
                .stack
                .initialize_overriding(&parameter.name, argument, parameter.is_const)?;
        }

        match frame.evaluate(&closure.definition.body)? {
            Flow::Normal(value) | Flow::Return(value) => Ok(value),
            Flow::Break => Ok(Value::Null),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interpreter {
    // Functions bound in the scopes they capture keep those scopes alive
    fn drop(&mut self) {
        self.stack.release();
    }
}

// ==================== Scope Guards ====================

/// Pushes an environment and pops everything above the entry depth on drop
struct ScopeGuard<'i> {
    interpreter: &'i mut Interpreter,
    depth: usize,
}

impl<'i> ScopeGuard<'i> {
    fn new(interpreter: &'i mut Interpreter, kind: EnvironmentKind) -> Self {
        let depth = interpreter.stack.depth();
        interpreter.stack.push(kind);
        Self { interpreter, depth }
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interpreter
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interpreter
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.interpreter.stack.truncate(self.depth);
    }
}

/// Runs a call on a copy of the callee's captured stack with a function
/// frame on top, and puts the caller's stack back on drop
struct CallGuard<'i> {
    interpreter: &'i mut Interpreter,
    caller: EnvironmentStack,
}

impl<'i> CallGuard<'i> {
    fn new(interpreter: &'i mut Interpreter, captured: &EnvironmentStack) -> Self {
        let mut stack = captured.clone();
        stack.push(EnvironmentKind::Function);
        let caller = mem::replace(&mut interpreter.stack, stack);
        interpreter.call_depth += 1;
        Self { interpreter, caller }
    }
}

impl Deref for CallGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        self.interpreter
    }
}

impl DerefMut for CallGuard<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        self.interpreter
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.interpreter.stack = mem::take(&mut self.caller);
        self.interpreter.call_depth = self.interpreter.call_depth.saturating_sub(1);
    }
}

// ==================== Ranges ====================

/// Counter values of a `for` loop; the end is exclusive
enum CounterRange {
    Int { next: i64, end: i64, step: i64 },
    Float { next: f64, end: f64, step: f64 },
}

impl CounterRange {
    fn new(start: &Value, end: &Value, step: &Value) -> Result<Self> {
        for bound in [start, end, step] {
            if bound.as_f64().is_none() {
                return Err(RuntimeError::invalid_range_bound(bound.type_name()));
            }
        }

        if let (Value::Int(start), Value::Int(end), Value::Int(step)) = (start, end, step) {
            if *step == 0 {
                return Err(RuntimeError::invalid_range_step());
            }
            return Ok(Self::Int { next: *start, end: *end, step: *step });
        }

        let (start, end, step) = (
            start.as_f64().unwrap_or_default(),
            end.as_f64().unwrap_or_default(),
            step.as_f64().unwrap_or_default(),
        );
        if step == 0.0 || step.is_nan() {
            return Err(RuntimeError::invalid_range_step());
        }
        Ok(Self::Float { next: start, end, step })
    }
}

impl Iterator for CounterRange {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Int { next, end, step } => {
                let in_range = if *step > 0 { *next < *end } else { *next > *end };
                if !in_range {
                    return None;
                }
                let current = *next;
                // Stop rather than wrap around
                *next = next.checked_add(*step).unwrap_or(*end);
                Some(Value::Int(current))
            }
            Self::Float { next, end, step } => {
                let in_range = if *step > 0.0 { *next < *end } else { *next > *end };
                if !in_range {
                    return None;
                }
                let current = *next;
                let advanced = *next + *step;
                *next = if advanced == current { *end } else { advanced };
                Some(Value::Float(current))
            }
        }
    }
}

// ==================== Helpers ====================

fn truth(value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| RuntimeError::expected_boolean(value.type_name()))
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Integer(i) => Value::Int(*i as i64),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::string(s),
    }
}

fn type_operand(expression: &Expression) -> Result<TypeName> {
    match &expression.kind {
        ExpressionKind::Type(type_name) => Ok(*type_name),
        _ => Err(RuntimeError::internal("expected a type name")),
    }
}

fn member_of(target: &Value, member: &str) -> Result<Value> {
    match target {
        Value::Namespace(namespace) => namespace
            .member(member)
            .cloned()
            .ok_or_else(|| RuntimeError::unknown_member(&namespace.name, member)),
        other => Err(RuntimeError::invalid_access(other.type_name())),
    }
}

fn binary_value(operator: Operator, left: &Value, right: &Value) -> Result<Value> {
    match operator {
        Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::Remainder
        | Operator::Exponent => operations::arithmetic(operator, left, right),
        Operator::Concatenate => Ok(operations::concatenate(left, right)),
        Operator::Less
        | Operator::LessEqual
        | Operator::Greater
        | Operator::GreaterEqual
        | Operator::Equal
        | Operator::NotEqual => Ok(operations::compare(operator, left, right)),
        other => Err(RuntimeError::internal(format!("`{}` is not a binary operator", other))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::value::NativeFunction;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::thread;

    struct Script {
        interpreter: Interpreter,
        output: Rc<RefCell<Vec<String>>>,
        stats: ExecutionStats,
    }

    fn run_with(config: InterpreterConfig, source: &str) -> Script {
        let output = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&output);
        let mut interpreter = Interpreter::with_config(config);
        let print = NativeFunction::new("print", None, move |arguments| {
            let line: Vec<String> = arguments.iter().map(Value::to_string).collect();
            sink.borrow_mut().push(line.join(" "));
            Ok(Value::Null)
        });
        interpreter
            .define_global("print", Value::Native(Rc::new(print)))
            .unwrap();

        let mut parser = Parser::new(source);
        let stats = interpreter.run_parser(&mut parser);
        Script { interpreter, output, stats }
    }

    fn run(source: &str) -> Script {
        run_with(InterpreterConfig::default(), source)
    }

    impl Script {
        fn lines(&self) -> Vec<String> {
            self.output.borrow().clone()
        }
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let script = run("print(1 + 2 * 3, 2 ^ 3 ^ 2, -2 ^ 2, 7 / 2, 7.0 / 2);");
        assert_eq!(script.lines(), vec!["7 512 -4 3 3.5"]);
    }

    #[test]
    fn test_closure_keeps_captured_binding() {
        let script = run(r#"
            init a = "global";
            {
                init show = functi() print(a);
                show();
                init a = "block";
                show();
            };
        "#);
        assert_eq!(script.lines(), vec!["global", "global"]);
        assert!(script.interpreter.errors().is_empty());
    }

    #[test]
    fn test_closure_sees_later_assignment() {
        let script = run(r#"
            init count = 0;
            init bump = functi() count += 1;
            bump();
            bump();
            print(count);
        "#);
        assert_eq!(script.lines(), vec!["2"]);
    }

    #[test]
    fn test_break_if_leaves_innermost_loop() {
        let script = run(r#"
            for (i, 3) {
                for (j, 3) {
                    break_if(j == 1);
                    print(i, j);
                };
            };
        "#);
        assert_eq!(script.lines(), vec!["0 0", "1 0", "2 0"]);
    }

    #[test]
    fn test_return_from_inner_function_only() {
        let script = run(r#"
            init outer = functi() {
                functi() { return 1; }();
                print("after");
                return 2;
            };
            print(outer());
        "#);
        assert_eq!(script.lines(), vec!["after", "2"]);
    }

    #[test]
    fn test_const_assignment_fails_and_execution_continues() {
        let mut script = run("init const a = 5;\na = 6;\nprint(a);");
        assert_eq!(script.lines(), vec!["5"]);
        let errors = script.interpreter.take_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], RuntimeError::AssignmentToConst { .. }));
        assert_eq!(errors[0].position().line, 2);
        assert_eq!(errors[0].position().column, 1);
        assert_eq!(script.stats.statements_failed, 1);
        assert_eq!(script.stats.statements_run, 2);
    }

    #[test]
    fn test_misplaced_signals() {
        let script = run("break;\nreturn 1;\nfuncti() { break; }();");
        let errors = script.interpreter.errors();
        assert!(matches!(errors[0], RuntimeError::BreakOutsideOfLoop { .. }));
        assert!(matches!(errors[1], RuntimeError::ReturnOutsideOfFunction { .. }));
        assert!(matches!(errors[2], RuntimeError::BreakOutsideOfLoop { .. }));
    }

    #[test]
    fn test_recursion() {
        let script = run(r#"
            init fact = functi(n) if (n <= 1) 1 else n * fact(n - 1);
            print(fact(10));
        "#);
        assert_eq!(script.lines(), vec!["3628800"]);
    }

    #[test]
    fn test_call_depth_limit() {
        let script = run_with(
            InterpreterConfig { max_call_depth: 16 },
            "init f = functi() f();\nf();\nprint(\"still here\");",
        );
        assert!(matches!(
            script.interpreter.errors()[0],
            RuntimeError::CallDepthExceeded { limit: 16, .. }
        ));
        assert_eq!(script.lines(), vec!["still here"]);
        assert_eq!(script.interpreter.stack.depth(), 1);
    }

    #[test]
    fn test_default_call_depth_fits_its_stack() {
        let config = InterpreterConfig::default();
        let (limit, lines) = thread::Builder::new()
            .stack_size(config.stack_size())
            .spawn(|| {
                let script = run(
                    "init f = functi(n) if (n > 0) f(n - 1) else 0;\nf(100000);\nprint(\"alive\");",
                );
                let limit = match script.interpreter.errors() {
                    [RuntimeError::CallDepthExceeded { limit, .. }] => Some(*limit),
                    _ => None,
                };
                (limit, script.lines())
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(limit, Some(config.max_call_depth));
        assert_eq!(lines, vec!["alive"]);
    }

    #[test]
    fn test_stack_size_grows_with_call_depth() {
        let shallow = InterpreterConfig { max_call_depth: 4 };
        let deep = InterpreterConfig { max_call_depth: 4096 };
        assert_eq!(shallow.stack_size(), MIN_STACK_SIZE);
        assert!(deep.stack_size() >= 4096 * STACK_PER_CALL);
        let unbounded = InterpreterConfig { max_call_depth: usize::MAX };
        assert_eq!(unbounded.stack_size(), usize::MAX);
    }

    #[test]
    fn test_drop_frees_self_referencing_functions() {
        let host = Rc::new(NativeFunction::new("host", Some(0), |_| Ok(Value::Null)));
        {
            let mut interpreter = Interpreter::new();
            interpreter
                .define_global("host", Value::Native(Rc::clone(&host)))
                .unwrap();
            let mut parser = Parser::new(
                "init keep = host;\ninit f = functi() { keep; f };\n{ init g = functi() g; };",
            );
            let stats = interpreter.run_parser(&mut parser);
            assert_eq!(stats.statements_failed, 0);
            assert!(Rc::strong_count(&host) > 2);
        }
        assert_eq!(Rc::strong_count(&host), 1);
    }

    #[test]
    fn test_argument_checks() {
        let script = run(r#"
            init f = functi(x!) x;
            f(null);
            f(1, 2);
            init n = 3;
            n();
            print(f(4));
        "#);
        let errors = script.interpreter.errors();
        assert!(matches!(errors[0], RuntimeError::NonNullArgumentRequired { .. }));
        assert!(matches!(
            errors[1],
            RuntimeError::BadArgumentCount { expected: 1, actual: 2, .. }
        ));
        assert!(matches!(errors[2], RuntimeError::NotCallable { .. }));
        assert_eq!(script.lines(), vec!["4"]);
    }

    #[test]
    fn test_const_parameter() {
        let script = run("init f = functi(const x) { x = 2; };\nf(1);");
        assert!(matches!(
            script.interpreter.errors()[0],
            RuntimeError::AssignmentToConst { .. }
        ));
    }

    #[test]
    fn test_conditionals_and_while() {
        let script = run(r#"
            init i = 0;
            while (i < 5) {
                i += 1;
                print(if (i % 2 == 0) "even" elif (i == 5) "last" else "odd");
            };
        "#);
        assert_eq!(script.lines(), vec!["odd", "even", "odd", "even", "last"]);
    }

    #[test]
    fn test_non_boolean_condition() {
        let script = run("if (1) print(1);");
        assert!(matches!(
            script.interpreter.errors()[0],
            RuntimeError::ExpectedBoolean { .. }
        ));
    }

    #[test]
    fn test_for_ranges() {
        let script = run(r#"
            for (i, 5:0:-2) print(i);
            for (x, 0:1:0.5) print(x);
            init n = 0;
            for (3) n += 1;
            print(n);
        "#);
        assert_eq!(script.lines(), vec!["5", "3", "1", "0.0", "0.5", "3"]);
    }

    #[test]
    fn test_invalid_ranges() {
        let script = run("for (i, 0:5:0) print(i);\nfor (i, \"5\") print(i);");
        let errors = script.interpreter.errors();
        assert!(matches!(errors[0], RuntimeError::InvalidRangeStep { .. }));
        assert!(matches!(errors[1], RuntimeError::InvalidRangeBound { .. }));
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let script = run(r#"
            init calls = 0;
            init touch = functi() { calls += 1; true };
            print(false && touch(), true || touch(), calls);
            print(true && 1);
        "#);
        assert_eq!(script.lines(), vec!["false true 0"]);
        assert!(matches!(
            script.interpreter.errors()[0],
            RuntimeError::ExpectedBoolean { .. }
        ));
    }

    #[test]
    fn test_null_operators() {
        let script = run(r#"
            init double = functi(x) x * 2;
            init missing = null;
            print(missing ?? "fallback", 4 ?? 5);
            print(missing ?> double, 21 ?> double);
        "#);
        assert_eq!(script.lines(), vec!["fallback 4", "null 42"]);
    }

    #[test]
    fn test_type_checks_and_casts() {
        let script = run(r#"
            print(1 is int, 1.0 is not float, null is null);
            print(int("12") + 1, string(3) .. "!", float(true), bool("nope"));
        "#);
        assert_eq!(script.lines(), vec!["true false true", "13 3! 1.0 null"]);
    }

    #[test]
    fn test_pattern_matching() {
        let script = run(r#"
            init describe = functi(x) match (x) {
                default: "other";
                0: "zero";
                < 0: "negative";
                is string: "text";
                (>= 10 and < 100) or == 1000: "big";
            };
            print(describe(0), describe(-3), describe("s"), describe(50), describe(1000), describe(7));
        "#);
        assert_eq!(script.lines(), vec!["zero negative text big big other"]);
    }

    #[test]
    fn test_match_without_default_yields_null() {
        let script = run("print(match (3) { 1: \"one\"; });");
        assert_eq!(script.lines(), vec!["null"]);
    }

    #[test]
    fn test_block_value_is_last_unterminated_statement() {
        let script = run("print({ init a = 2; a * 3 });\nprint({ 1; });");
        assert_eq!(script.lines(), vec!["6", "null"]);
    }

    #[test]
    fn test_namespace_import_and_access() {
        let mut interpreter = Interpreter::new();
        interpreter.register_namespace(
            Namespace::new("consts")
                .with_member("answer", Value::Int(42))
                .with_member(
                    "inner",
                    Value::Namespace(Rc::new(Namespace::new("inner").with_member("x", Value::Int(1)))),
                ),
        );
        let mut parser = Parser::new(
            "pull consts;\npull consts.inner.x;\ninit a = consts.answer + x;\npull nope;\nconsts.missing;",
        );
        interpreter.run_parser(&mut parser);

        assert_eq!(interpreter.global("a"), Some(Value::Int(43)));
        let errors = interpreter.errors();
        assert!(matches!(errors[0], RuntimeError::UnknownNamespace { .. }));
        assert!(matches!(errors[1], RuntimeError::UnknownMember { .. }));
    }

    #[test]
    fn test_host_panic_is_isolated() {
        let mut interpreter = Interpreter::new();
        let boom = NativeFunction::new("boom", Some(0), |_| panic!("host failure"));
        interpreter
            .define_global("boom", Value::Native(Rc::new(boom)))
            .unwrap();
        let mut parser = Parser::new("init a = 1;\n{ init b = 2; boom(); };\ninit c = a + 1;");
        let stats = interpreter.run_parser(&mut parser);

        assert!(matches!(interpreter.errors()[0], RuntimeError::Internal { .. }));
        assert_eq!(interpreter.global("c"), Some(Value::Int(2)));
        assert_eq!(interpreter.global("b"), None);
        assert_eq!(stats.statements_run, 2);
    }

    #[test]
    fn test_quit_stops_between_statements() {
        let mut interpreter = Interpreter::new();
        let flag = interpreter.quit_flag();
        let quit = NativeFunction::new("quit", Some(0), move |_| {
            flag.set(true);
            Ok(Value::Null)
        });
        interpreter
            .define_global("quit", Value::Native(Rc::new(quit)))
            .unwrap();
        let mut parser = Parser::new("init a = 1;\nquit();\ninit b = 2;");
        interpreter.run_parser(&mut parser);

        assert!(interpreter.should_quit());
        assert_eq!(interpreter.global("a"), Some(Value::Int(1)));
        assert_eq!(interpreter.global("b"), None);
    }

    #[test]
    fn test_unclean_statements_are_skipped() {
        let script = run("print(1);\nprint(2 +);\nprint(3);");
        assert_eq!(script.lines(), vec!["1", "3"]);
        assert!(script.stats.statements_skipped >= 1);
    }

    #[test]
    fn test_redefinition_in_same_scope() {
        let script = run("init x = 1;\ninit x = 2;\nprint(x);");
        assert!(matches!(
            script.interpreter.errors()[0],
            RuntimeError::VariableAlreadyDefined { .. }
        ));
        assert_eq!(script.lines(), vec!["1"]);
    }
}
