use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::{Number, Value};

/// A value-typed map key.
///
/// `None`, `Bool`, `String` and `Number` hash and compare by value; `Entity`
/// and `Callable` compare by reference identity, matching §4.D.
#[derive(Debug, Clone)]
pub struct Key(pub Value);

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.0.value_eq(&other.0)
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match &self.0 {
            Value::None => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Number(n) => {
                2u8.hash(state);
                n.hash(state);
            }
            Value::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Value::Entity(e) => {
                4u8.hash(state);
                e.identity().hash(state);
            }
            Value::Callable(c) => {
                5u8.hash(state);
                c.identity().hash(state);
            }
        }
    }
}

impl Key {
    pub fn number(n: Number) -> Self {
        Key(Value::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Key(Value::String(s.into()))
    }
}

/// The data backing an [`EntityHandle`]: a prototype-chained, value-keyed map.
pub struct EntityData {
    entries: HashMap<Key, Value>,
    /// Insertion order, kept for deterministic iteration and display. Not a
    /// semantic requirement of §3, but `print`/`inspect`/array iteration read
    /// much better with it.
    order: Vec<Key>,
    pub metaentity: Option<EntityHandle>,
}

impl EntityData {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            metaentity: None,
        }
    }

    /// Write always targets the local map; the prototype is never mutated.
    pub fn set_local(&mut self, key: Key, value: Value) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, value);
    }

    pub fn get_local(&self, key: &Key) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    pub fn contains_local(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Local entry count, per §3's "`size` does not traverse the prototype chain".
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn local_entries(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.order.iter().map(move |k| (k, self.entries.get(k).expect("order tracks entries")))
    }
}

impl Default for EntityData {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared, mutable handle to an [`EntityData`].
///
/// Backs arrays, dictionaries, class entities, instances, and the entity
/// half of function values.
#[derive(Clone)]
pub struct EntityHandle(Rc<RefCell<EntityData>>);

impl EntityHandle {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(EntityData::new())))
    }

    pub fn with_metaentity(meta: EntityHandle) -> Self {
        let handle = Self::new();
        handle.0.borrow_mut().metaentity = Some(meta);
        handle
    }

    pub fn identity(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub fn same_as(&self, other: &EntityHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> std::cell::Ref<'_, EntityData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> std::cell::RefMut<'_, EntityData> {
        self.0.borrow_mut()
    }

    /// Prototype-chain lookup: local entry, else delegate to `metaentity`,
    /// else `None`.
    pub fn get(&self, key: &Key) -> Option<Value> {
        if let Some(value) = self.0.borrow().get_local(key) {
            return Some(value);
        }
        let parent = self.0.borrow().metaentity.clone();
        parent.and_then(|meta| meta.get(key))
    }

    /// Membership along the prototype chain, distinguishing "absent" from
    /// "present with value `None`".
    pub fn contains(&self, key: &Key) -> bool {
        if self.0.borrow().contains_local(key) {
            return true;
        }
        let parent = self.0.borrow().metaentity.clone();
        parent.map(|meta| meta.contains(key)).unwrap_or(false)
    }

    pub fn set(&self, key: Key, value: Value) {
        self.0.borrow_mut().set_local(key, value);
    }

    /// Local-only membership, used by `Environment::assign`'s "innermost
    /// frame that already has the name" rule: a class-body frame must never
    /// write through its prototype chain.
    pub fn contains_local(&self, key: &Key) -> bool {
        self.0.borrow().contains_local(key)
    }

    pub fn size(&self) -> usize {
        self.0.borrow().size()
    }

    /// Build an array-convention entity from the given elements.
    pub fn from_array(elements: Vec<Value>) -> Self {
        let handle = Self::new();
        for (i, value) in elements.into_iter().enumerate() {
            handle.set(Key::number(Number::from_i64(i as i64)), value);
        }
        handle
    }

    /// Read indexed elements `0..size` out as a `Vec`, in index order. Used
    /// by array concatenation and `for`-loop iteration.
    pub fn indexed_values(&self) -> Vec<Value> {
        (0..self.size() as i64)
            .map(|i| self.get(&Key::number(Number::from_i64(i))).unwrap_or(Value::None))
            .collect()
    }
}

impl Default for EntityHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for EntityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other)
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity(#{:x}, {} entries)", self.identity(), self.size())
    }
}
