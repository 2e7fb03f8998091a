//! The variable environment: captured bindings and label scoping.
//!
//! Captures made by `[[name:...]]` and `[[#fmt,name:]]` segments land here
//! and are read back by `[[name]]` / `[[#name]]` references in later
//! directives. The environment is a stack of frames: the root frame holds
//! command-line definitions, and when label scoping is enabled one frame is
//! pushed per `CHECK-LABEL` region so that bindings made inside the region
//! vanish on exit.

use crate::pattern::NumericFormat;
use std::collections::HashMap;

/// A value bound to a variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A textual capture, referenced back verbatim.
    Text(String),
    /// A numeric capture, referenced back through its format.
    Numeric {
        /// The captured integer.
        value: i64,
        /// The format it was captured with, used to re-render it.
        format: NumericFormat,
    },
}

/// A stack of name→value frames. Lookups walk from the innermost frame
/// outward; bindings always land in the innermost frame, shadowing any
/// outer binding of the same name until the frame is popped.
#[derive(Debug, Clone)]
pub(crate) struct Environment {
    frames: Vec<HashMap<String, Value>>,
}

impl Environment {
    /// Create an environment whose root frame holds the given textual
    /// definitions.
    pub fn new(defines: &[(String, String)]) -> Self {
        let mut root = HashMap::new();
        for (name, value) in defines {
            root.insert(name.clone(), Value::Text(value.clone()));
        }
        Self { frames: vec![root] }
    }

    /// Bind `name` to a textual value. Rebinding is legal; the latest
    /// binding wins.
    pub fn bind_text(&mut self, name: &str, value: String) {
        self.bind(name, Value::Text(value));
    }

    /// Bind `name` to a numeric value with its capture format.
    pub fn bind_numeric(&mut self, name: &str, value: i64, format: NumericFormat) {
        self.bind(name, Value::Numeric { value, format });
    }

    fn bind(&mut self, name: &str, value: Value) {
        log::trace!("binding {name} = {value:?}");
        // The environment always has at least the root frame.
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    /// Look up the current binding of `name`, innermost frame first.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Enter a label region.
    pub fn push_scope(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Leave a label region, discarding every binding made inside it.
    pub fn pop_scope(&mut self) {
        // The root frame holding command-line definitions is never popped.
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_and_lookup() {
        let mut env = Environment::new(&[("PRE".to_string(), "42".to_string())]);
        assert_eq!(env.lookup("PRE"), Some(&Value::Text("42".to_string())));
        assert_eq!(env.lookup("V"), None);

        env.bind_text("V", "x".to_string());
        assert_eq!(env.lookup("V"), Some(&Value::Text("x".to_string())));

        // Latest binding wins.
        env.bind_text("V", "y".to_string());
        assert_eq!(env.lookup("V"), Some(&Value::Text("y".to_string())));
    }

    #[test]
    fn scoping() {
        let mut env = Environment::new(&[("DEF".to_string(), "d".to_string())]);
        env.push_scope();
        env.bind_text("LOCAL", "inner".to_string());
        assert!(env.lookup("LOCAL").is_some());
        assert!(env.lookup("DEF").is_some());
        env.pop_scope();

        // Region bindings are invisible after exit, definitions survive.
        assert_eq!(env.lookup("LOCAL"), None);
        assert!(env.lookup("DEF").is_some());
    }

    #[test]
    fn shadowing() {
        let mut env = Environment::new(&[("V".to_string(), "outer".to_string())]);
        env.push_scope();
        env.bind_text("V", "inner".to_string());
        assert_eq!(env.lookup("V"), Some(&Value::Text("inner".to_string())));
        env.pop_scope();
        assert_eq!(env.lookup("V"), Some(&Value::Text("outer".to_string())));
    }

    #[test]
    fn root_frame_is_never_popped() {
        let mut env = Environment::new(&[]);
        env.pop_scope();
        env.bind_text("V", "x".to_string());
        assert!(env.lookup("V").is_some());
    }
}
