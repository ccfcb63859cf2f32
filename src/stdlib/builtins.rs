//! Host Functions Registry
//!
//! Defines the functions and namespaces a script can reach without declaring
//! them. The embedder decides where `print` writes and owns the quit flag.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use log::debug;

use crate::interpreter::{Interpreter, Namespace, NativeFunction, Value};
use crate::utils::{Result, RuntimeError};

/// Registry of host functions, installed into an interpreter before a run
pub struct HostRegistry {
    functions: HashMap<String, Rc<NativeFunction>>,
    namespaces: Vec<Namespace>,
    output: Rc<RefCell<dyn Write>>,
    quit: Rc<Cell<bool>>,
}

impl HostRegistry {
    /// `print` writes to `output`; `quit()` raises `quit`
    pub fn new(output: Rc<RefCell<dyn Write>>, quit: Rc<Cell<bool>>) -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
            namespaces: Vec::new(),
            output,
            quit,
        };
        registry.register_all();
        registry
    }

    /// Registry wired to the given interpreter's quit flag
    pub fn for_interpreter(interpreter: &Interpreter, output: Rc<RefCell<dyn Write>>) -> Self {
        Self::new(output, interpreter.quit_flag())
    }

    fn register_all(&mut self) {
        // I/O
        let output = Rc::clone(&self.output);
        self.register(NativeFunction::new("print", None, move |arguments| {
            print(&mut *output.borrow_mut(), arguments)
        }));

        // Process control
        let quit = Rc::clone(&self.quit);
        self.register(NativeFunction::new("quit", Some(0), move |_| {
            quit.set(true);
            Ok(Value::Null)
        }));

        // Introspection
        self.register(NativeFunction::new("typeof", Some(1), |arguments| {
            Ok(Value::string(arguments[0].type_name()))
        }));

        self.register_namespace(super::math::namespace());
    }

    pub fn register(&mut self, function: NativeFunction) {
        self.functions
            .insert(function.name.clone(), Rc::new(function));
    }

    pub fn register_namespace(&mut self, namespace: Namespace) {
        self.namespaces.push(namespace);
    }

    /// Check if a name is a host function
    pub fn is_builtin(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Rc<NativeFunction>> {
        self.functions.get(name)
    }

    /// Bind every function in the root environment and make every namespace
    /// available to `pull`
    pub fn install(self, interpreter: &mut Interpreter) -> Result<()> {
        let mut names: Vec<_> = self.functions.into_iter().collect();
        names.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, function) in names {
            debug!("install host function {}", name);
            interpreter.define_global(&name, Value::Native(function))?;
        }
        for namespace in self.namespaces {
            debug!("install namespace {}", namespace.name);
            interpreter.register_namespace(namespace);
        }
        Ok(())
    }
}

fn print(output: &mut dyn Write, arguments: &[Value]) -> Result<Value> {
    let line = arguments
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(output, "{}", line).map_err(|e| RuntimeError::host("print", e.to_string()))?;
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Parser;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> (String, Interpreter) {
        let buffer = Rc::new(RefCell::new(Vec::<u8>::new()));
        let mut interpreter = Interpreter::new();
        HostRegistry::for_interpreter(&interpreter, buffer.clone())
            .install(&mut interpreter)
            .unwrap();
        interpreter.run_parser(&mut Parser::new(source));
        let text = String::from_utf8(buffer.borrow().clone()).unwrap();
        (text, interpreter)
    }

    #[test]
    fn test_registry_contents() {
        let registry = HostRegistry::new(Rc::new(RefCell::new(Vec::<u8>::new())), Rc::default());
        assert!(registry.is_builtin("print"));
        assert!(registry.is_builtin("typeof"));
        assert!(!registry.is_builtin("sqrt"));
        assert_eq!(registry.get("quit").and_then(|f| f.arity), Some(0));
    }

    #[test]
    fn test_print_joins_with_spaces() {
        let (text, _) = run("print(1, 2.5, \"three\", null, true);\nprint();");
        assert_eq!(text, "1 2.5 three null true\n\n");
    }

    #[test]
    fn test_typeof() {
        let (text, _) = run("print(typeof(1), typeof(\"\"), typeof(print), typeof(null));");
        assert_eq!(text, "int string function null\n");
    }

    #[test]
    fn test_quit() {
        let (text, interpreter) = run("print(1);\nquit();\nprint(2);");
        assert_eq!(text, "1\n");
        assert!(interpreter.should_quit());
    }

    #[test]
    fn test_math_namespace() {
        let (text, interpreter) = run("pull math;\npull math.sqrt;\nprint(math.abs(-2), sqrt(16), math.max(1, 2.0), math.pi > 3);");
        assert!(interpreter.errors().is_empty());
        assert_eq!(text, "2 4.0 2.0 true\n");
    }

    #[test]
    fn test_host_functions_are_constant() {
        let (_, interpreter) = run("print = 1;");
        assert!(matches!(
            interpreter.errors()[0],
            RuntimeError::AssignmentToConst { .. }
        ));
    }
}
