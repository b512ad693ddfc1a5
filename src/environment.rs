use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error;
use crate::value::{Key, Value};

struct LexicalData {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

struct ClassBodyData {
    entity: crate::value::EntityHandle,
    outer: Environment,
}

/// A frame the evaluator reads and writes names through. Fixed at
/// construction to one of two modes (§4.E):
///
/// - `Lexical`: a name→value map plus an optional enclosing link.
/// - `ClassBody`: wraps an entity (the class under construction) plus the
///   environment the `class` statement itself ran in.
#[derive(Clone)]
pub enum Environment {
    Lexical(Rc<RefCell<LexicalData>>),
    ClassBody(Rc<RefCell<ClassBodyData>>),
}

impl Environment {
    /// The single global lexical frame created at interpreter start.
    pub fn global() -> Self {
        Environment::Lexical(Rc::new(RefCell::new(LexicalData {
            values: HashMap::new(),
            enclosing: None,
        })))
    }

    /// A fresh lexical frame nested inside `enclosing` (blocks, loop bodies,
    /// closure calls).
    pub fn nested(enclosing: Environment) -> Self {
        Environment::Lexical(Rc::new(RefCell::new(LexicalData {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        })))
    }

    /// The environment a `class` statement's body executes in: entity writes
    /// instead of a name map, falling through to `outer` for reads.
    pub fn class_body(entity: crate::value::EntityHandle, outer: Environment) -> Self {
        Environment::ClassBody(Rc::new(RefCell::new(ClassBodyData { entity, outer })))
    }

    /// Always writes locally: the current frame's map, or the class entity.
    pub fn define(&self, name: &str, value: Value) {
        match self {
            Environment::Lexical(data) => {
                data.borrow_mut().values.insert(name.to_string(), value);
            }
            Environment::ClassBody(data) => {
                data.borrow().entity.set(Key::string(name), value);
            }
        }
    }

    /// Chain lookup: this frame (map or entity, including its prototype
    /// chain), else the enclosing/outer environment, else a diagnostic and
    /// `None`.
    pub fn get(&self, name: &str, line: usize) -> Value {
        match self {
            Environment::Lexical(data) => {
                if let Some(value) = data.borrow().values.get(name).cloned() {
                    return value;
                }
                let enclosing = data.borrow().enclosing.clone();
                match enclosing {
                    Some(env) => env.get(name, line),
                    None => {
                        error::runtime_error(line, &format!("Undefined variable '{name}'."));
                        Value::None
                    }
                }
            }
            Environment::ClassBody(data) => {
                let entity = data.borrow().entity.clone();
                let key = Key::string(name);
                if entity.contains(&key) {
                    return entity.get(&key).unwrap_or(Value::None);
                }
                let outer = data.borrow().outer.clone();
                outer.get(name, line)
            }
        }
    }

    /// Writes to the innermost frame that already binds `name`; if none
    /// does, defines it in the frame `assign` was originally called on
    /// (ambient creation, §4.E/§9).
    pub fn assign(&self, name: &str, value: Value) {
        if self.assign_existing(name, value.clone()) {
            return;
        }
        self.define(name, value);
    }

    fn assign_existing(&self, name: &str, value: Value) -> bool {
        match self {
            Environment::Lexical(data) => {
                if data.borrow().values.contains_key(name) {
                    data.borrow_mut().values.insert(name.to_string(), value);
                    return true;
                }
                let enclosing = data.borrow().enclosing.clone();
                match enclosing {
                    Some(env) => env.assign_existing(name, value),
                    None => false,
                }
            }
            Environment::ClassBody(data) => {
                let entity = data.borrow().entity.clone();
                let key = Key::string(name);
                if entity.contains_local(&key) {
                    entity.set(key, value);
                    return true;
                }
                let outer = data.borrow().outer.clone();
                outer.assign_existing(name, value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambient_assignment_defines_in_innermost_frame() {
        let global = Environment::global();
        let inner = Environment::nested(global.clone());
        inner.assign("x", Value::Number(crate::value::Number::from_i64(1)));
        assert!(matches!(global.get("x", 1), Value::None));
        assert!(matches!(inner.get("x", 1), Value::Number(_)));
    }

    #[test]
    fn assign_updates_existing_outer_binding() {
        let global = Environment::global();
        global.define("x", Value::Number(crate::value::Number::from_i64(1)));
        let inner = Environment::nested(global.clone());
        inner.assign("x", Value::Number(crate::value::Number::from_i64(2)));
        let Value::Number(n) = global.get("x", 1) else { panic!("expected number") };
        assert_eq!(n.to_display_string(), "2");
    }

    #[test]
    fn class_body_reads_and_writes_entity() {
        let entity = crate::value::EntityHandle::new();
        let global = Environment::global();
        let body = Environment::class_body(entity.clone(), global);
        body.define("v", Value::Number(crate::value::Number::from_i64(100)));
        assert!(entity.contains_local(&Key::string("v")));
        let Value::Number(n) = body.get("v", 1) else { panic!("expected number") };
        assert_eq!(n.to_display_string(), "100");
    }
}
