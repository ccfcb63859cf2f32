use std::cell::RefCell;
use std::collections::HashMap;
use std::mem;
use std::rc::{Rc, Weak};

use log::debug;

use crate::interpreter::value::Value;
use crate::utils::{Result, RuntimeError};

/// Decides which signals a scope absorbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentKind {
    Block,
    Loop,
    Function,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub value: Value,
    pub is_const: bool,
}

/// One lexical scope.
///
/// Bindings are shared cells, so a copy of an environment still observes
/// assignments made through the original, but not new bindings.
#[derive(Debug, Clone)]
pub struct Environment {
    pub kind: EnvironmentKind,
    bindings: HashMap<String, Rc<RefCell<Variable>>>,
}

impl Environment {
    pub fn new(kind: EnvironmentKind) -> Self {
        Self {
            kind,
            bindings: HashMap::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    fn lookup(&self, name: &str) -> Option<Rc<RefCell<Variable>>> {
        self.bindings.get(name).cloned()
    }
}

type Frame = Rc<RefCell<Environment>>;

/// Every frame created by a stack and its copies, so they can be emptied
/// together
#[derive(Debug, Default)]
struct FrameRegistry {
    frames: Vec<Weak<RefCell<Environment>>>,
}

impl FrameRegistry {
    fn track(&mut self, frame: &Frame) {
        if self.frames.len() == self.frames.capacity() {
            self.frames.retain(|weak| weak.strong_count() > 0);
        }
        self.frames.push(Rc::downgrade(frame));
    }
}

/// The scope chain, innermost last.
///
/// Cloning the stack snapshots the chain: frames are shared with the
/// original, but frames pushed or replaced later are not.
#[derive(Debug, Clone)]
pub struct EnvironmentStack {
    frames: Vec<Frame>,
    registry: Rc<RefCell<FrameRegistry>>,
}

impl EnvironmentStack {
    /// A stack holding only the root environment
    pub fn new() -> Self {
        let stack = Self {
            frames: Vec::new(),
            registry: Rc::new(RefCell::new(FrameRegistry::default())),
        };
        let root = stack.create(Environment::new(EnvironmentKind::Block));
        Self {
            frames: vec![root],
            ..stack
        }
    }

    fn create(&self, environment: Environment) -> Frame {
        let frame = Rc::new(RefCell::new(environment));
        self.registry.borrow_mut().track(&frame);
        frame
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, kind: EnvironmentKind) {
        debug!("push {:?} scope at depth {}", kind, self.frames.len());
        let frame = self.create(Environment::new(kind));
        self.frames.push(frame);
    }

    /// Pop frames until `depth` remain
    pub fn truncate(&mut self, depth: usize) {
        if self.frames.len() > depth {
            debug!("pop scopes {} -> {}", self.frames.len(), depth);
            self.frames.truncate(depth);
        }
    }

    fn top(&self) -> Result<&Frame> {
        self.frames
            .last()
            .ok_or_else(|| RuntimeError::internal("environment stack is empty"))
    }

    /// Bind a new name in the innermost environment
    pub fn initialize(&mut self, name: &str, value: Value, is_const: bool) -> Result<()> {
        let mut top = self.top()?.borrow_mut();
        if top.contains(name) {
            return Err(RuntimeError::already_defined(name));
        }
        top.bindings
            .insert(name.to_string(), Rc::new(RefCell::new(Variable { value, is_const })));
        Ok(())
    }

    /// Bind a name in the innermost environment, replacing any binding there,
    /// const or not. Used for parameters.
    pub fn initialize_overriding(&mut self, name: &str, value: Value, is_const: bool) -> Result<()> {
        self.top()?
            .borrow_mut()
            .bindings
            .insert(name.to_string(), Rc::new(RefCell::new(Variable { value, is_const })));
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<Rc<RefCell<Variable>>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.borrow().lookup(name))
    }

    /// Read a variable, innermost first
    pub fn access(&self, name: &str) -> Result<Value> {
        self.resolve(name)
            .map(|variable| variable.borrow().value.clone())
            .ok_or_else(|| RuntimeError::undefined_variable(name))
    }

    /// Overwrite a variable, innermost first
    pub fn assign(&self, name: &str, value: Value) -> Result<()> {
        let variable = self
            .resolve(name)
            .ok_or_else(|| RuntimeError::undefined_variable(name))?;
        let mut variable = variable.borrow_mut();
        if variable.is_const {
            return Err(RuntimeError::assignment_to_const(name));
        }
        variable.value = value;
        Ok(())
    }

    /// Replace the innermost environment with a copy of itself.
    ///
    /// Closures formed before this point keep the old environment, so names
    /// bound afterwards never shadow what they captured.
    pub fn finalize(&mut self) -> Result<()> {
        let copy = self.create(self.top()?.borrow().clone());
        if let Some(last) = self.frames.last_mut() {
            *last = copy;
        }
        Ok(())
    }

    /// Empty every frame this stack or any copy of it ever created.
    ///
    /// A function bound in a scope it captured keeps that scope alive through
    /// its own binding; only emptying the scopes frees such a cycle. Closures
    /// still held elsewhere see their captured names as undefined afterwards.
    pub fn release(&self) {
        let frames = mem::take(&mut self.registry.borrow_mut().frames);
        debug!("release {} environments", frames.len());
        for frame in frames.iter().filter_map(Weak::upgrade) {
            let bindings = match frame.try_borrow_mut() {
                Ok(mut environment) => mem::take(&mut environment.bindings),
                Err(_) => continue,
            };
            drop(bindings);
        }
    }

    /// Check that a `break` has a loop to leave
    pub fn register_break(&self) -> Result<()> {
        for frame in self.frames.iter().rev() {
            match frame.borrow().kind {
                EnvironmentKind::Loop => return Ok(()),
                EnvironmentKind::Function => break,
                EnvironmentKind::Block => {}
            }
        }
        Err(RuntimeError::break_outside_of_loop())
    }

    /// Check that a `return` has a function to leave
    pub fn register_return(&self) -> Result<()> {
        if self
            .frames
            .iter()
            .any(|frame| frame.borrow().kind == EnvironmentKind::Function)
        {
            Ok(())
        } else {
            Err(RuntimeError::return_outside_of_function())
        }
    }
}

impl Default for EnvironmentStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_and_access() {
        let mut stack = EnvironmentStack::new();
        stack.initialize("x", Value::Int(1), false).unwrap();
        assert_eq!(stack.access("x").unwrap(), Value::Int(1));
        assert!(matches!(
            stack.initialize("x", Value::Int(2), false),
            Err(RuntimeError::VariableAlreadyDefined { .. })
        ));
        assert!(matches!(stack.access("y"), Err(RuntimeError::UndefinedVariable { .. })));
    }

    #[test]
    fn test_shadowing_resolves_innermost_first() {
        let mut stack = EnvironmentStack::new();
        stack.initialize("x", Value::Int(1), false).unwrap();
        stack.push(EnvironmentKind::Block);
        stack.initialize("x", Value::Int(2), false).unwrap();
        assert_eq!(stack.access("x").unwrap(), Value::Int(2));
        stack.truncate(1);
        assert_eq!(stack.access("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_assign_updates_outer_binding() {
        let mut stack = EnvironmentStack::new();
        stack.initialize("x", Value::Int(1), false).unwrap();
        stack.push(EnvironmentKind::Loop);
        stack.assign("x", Value::Int(5)).unwrap();
        stack.truncate(1);
        assert_eq!(stack.access("x").unwrap(), Value::Int(5));
    }

    #[test]
    fn test_const_rejects_assignment_but_not_override() {
        let mut stack = EnvironmentStack::new();
        stack.initialize("c", Value::Int(1), true).unwrap();
        assert!(matches!(
            stack.assign("c", Value::Int(2)),
            Err(RuntimeError::AssignmentToConst { .. })
        ));
        stack.initialize_overriding("c", Value::Int(3), true).unwrap();
        assert_eq!(stack.access("c").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_snapshot_ignores_later_bindings_but_sees_assignments() {
        let mut stack = EnvironmentStack::new();
        stack.initialize("a", Value::Int(1), false).unwrap();
        let snapshot = stack.clone();
        stack.finalize().unwrap();

        stack.initialize("b", Value::Int(2), false).unwrap();
        stack.finalize().unwrap();
        stack.assign("a", Value::Int(10)).unwrap();

        assert!(snapshot.access("b").is_err());
        assert_eq!(snapshot.access("a").unwrap(), Value::Int(10));
    }

    #[test]
    fn test_release_empties_captured_frames() {
        let mut stack = EnvironmentStack::new();
        stack.push(EnvironmentKind::Block);
        stack.initialize("inner", Value::Int(1), false).unwrap();
        let snapshot = stack.clone();
        stack.truncate(1);
        stack.initialize("outer", Value::Int(2), false).unwrap();

        stack.release();
        assert!(snapshot.access("inner").is_err());
        assert!(stack.access("outer").is_err());
    }

    #[test]
    fn test_signal_registration() {
        let mut stack = EnvironmentStack::new();
        assert!(stack.register_break().is_err());
        assert!(stack.register_return().is_err());

        stack.push(EnvironmentKind::Loop);
        stack.push(EnvironmentKind::Block);
        assert!(stack.register_break().is_ok());

        stack.push(EnvironmentKind::Function);
        assert!(stack.register_break().is_err());
        assert!(stack.register_return().is_ok());
    }
}
