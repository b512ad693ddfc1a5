use std::fmt;
use std::rc::Rc;

use super::{EntityHandle, Value};
use crate::ast::Stmt;
use crate::environment::Environment;

/// How many arguments a [`CallableData`] accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// `print` and friends: any number of arguments.
    Variadic,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => *n == count,
            Arity::Variadic => true,
        }
    }
}

/// A built-in implemented in Rust. Takes the evaluated arguments and the
/// call's source line (for diagnostics) and returns the call's result.
pub type NativeFn = fn(&[Value], usize) -> Value;

pub enum CallableKind {
    Native(NativeFn),
    User {
        params: Vec<String>,
        body: Rc<Vec<Stmt>>,
        closure: Environment,
    },
}

/// The data backing a [`CallableHandle`].
///
/// Per §3, "a function value is simultaneously an Entity... and a
/// Callable" — `entity` is the backing container `inspect` walks and where
/// ad-hoc properties attached to a function value would live.
pub struct CallableData {
    pub name: Option<String>,
    pub arity: Arity,
    pub kind: CallableKind,
    pub entity: EntityHandle,
}

#[derive(Clone)]
pub struct CallableHandle(Rc<CallableData>);

impl CallableHandle {
    pub fn native(name: &str, arity: Arity, func: NativeFn) -> Self {
        Self(Rc::new(CallableData {
            name: Some(name.to_string()),
            arity,
            kind: CallableKind::Native(func),
            entity: EntityHandle::new(),
        }))
    }

    pub fn user(name: Option<String>, params: Vec<String>, body: Rc<Vec<Stmt>>, closure: Environment) -> Self {
        let arity = Arity::Fixed(params.len());
        Self(Rc::new(CallableData {
            name,
            arity,
            kind: CallableKind::User { params, body, closure },
            entity: EntityHandle::new(),
        }))
    }

    pub fn data(&self) -> &CallableData {
        &self.0
    }

    pub fn entity(&self) -> &EntityHandle {
        &self.0.entity
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn same_as(&self, other: &CallableHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for CallableHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for CallableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable(#{:x}, {:?})", self.identity(), self.0.name)
    }
}
