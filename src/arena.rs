//! Name-indexed arena storage.
//!
//! Template collections and type forests keep their records in a
//! [`NamedArena`]: contiguous storage addressed by a dense, typed [`Id`],
//! plus a name index. Cross references between records are ids, never
//! pointers, so a forward reference is just a name that has not been
//! allocated yet and a dangling reference is a name that never will be.
//!
//! # Determinism
//! - Ids are handed out in allocation order and never reused.
//! - Iteration is in allocation order.

use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Dense identifier of a record of type `T` inside a [`NamedArena<T>`].
pub struct Id<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    const fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Position of the record in its arena.
    #[inline]
    pub const fn index(&self) -> usize {
        self.index as usize
    }
}

// Manual impls: derives would put bounds on `T`.
impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index.cmp(&other.index)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.index)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.index)
    }
}

/// Records addressable both by [`Id`] and by unique name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArena<T> {
    items: Vec<T>,
    names: Vec<String>,
    by_name: HashMap<String, Id<T>>,
}

impl<T> Default for NamedArena<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            names: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T> NamedArena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `item` under `name`.
    ///
    /// Returns `None` (and stores nothing) if the name is taken.
    pub fn alloc(&mut self, name: impl Into<String>, item: T) -> Option<Id<T>> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return None;
        }
        let id = Id::new(self.items.len() as u32);
        self.items.push(item);
        self.names.push(name.clone());
        self.by_name.insert(name, id);
        Some(id)
    }

    /// Look up the id registered for `name`.
    pub fn lookup(&self, name: &str) -> Option<Id<T>> {
        self.by_name.get(name).copied()
    }

    /// Get a record by id.
    ///
    /// Ids are only minted by this arena, so an id from this arena is
    /// always in bounds.
    pub fn get(&self, id: Id<T>) -> &T {
        &self.items[id.index()]
    }

    /// Get a mutable record by id.
    pub fn get_mut(&mut self, id: Id<T>) -> &mut T {
        &mut self.items[id.index()]
    }

    /// Get a record by name.
    pub fn by_name(&self, name: &str) -> Option<&T> {
        self.lookup(name).map(|id| self.get(id))
    }

    /// Name a record was stored under.
    pub fn name_of(&self, id: Id<T>) -> &str {
        &self.names[id.index()]
    }

    /// Whether `name` is stored.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterate over `(id, record)` in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Id<T>, &T)> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| (Id::new(index as u32), item))
    }

    /// All ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = Id<T>> {
        (0..self.items.len() as u32).map(Id::new)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
