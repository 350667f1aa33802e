// used to keep one member map per hydrated type
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// the map is read far more often than it is written
use core::hash::BuildHasherDefault;
use lazy_static::lazy_static;
use parking_lot::RwLock;
use seahash::SeaHasher;
use tracing::trace;

use super::coerce::{Coercible, SqlEnum};
use super::names_match;
use crate::value::{Kind, Value};

lazy_static! {
    static ref GLOBAL_CACHE: Arc<FieldCache> = Arc::new(FieldCache::new());
}

/// A type that can be filled from a row.
///
/// `describe` lists the writable members once; the result is cached per type.
///
/// ```
/// use sqlforge::hydrate::{Hydrate, MemberMap};
///
/// #[derive(Default)]
/// struct Person {
///     id: i64,
///     name: String,
/// }
///
/// impl Hydrate for Person {
///     fn describe(map: &mut MemberMap<Self>) {
///         map.field("Id", |p, v| p.id = v)
///             .field("Name", |p, v| p.name = v);
///     }
/// }
/// ```
pub trait Hydrate: Default + 'static {
    fn describe(map: &mut MemberMap<Self>);
}

type Setter<T> = Box<dyn Fn(&mut T, Value) + Send + Sync>;

pub struct Member<T> {
    name: String,
    kind: Kind,
    nullable: bool,
    setter: Setter<T>,
}

impl<T> Member<T> {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn kind(&self) -> Kind {
        self.kind
    }
    pub fn nullable(&self) -> bool {
        self.nullable
    }
    /// Writes an already coerced value into the member.
    pub fn assign(&self, target: &mut T, value: Value) {
        (self.setter)(target, value)
    }
}

pub struct MemberMap<T> {
    type_name: &'static str,
    members: Vec<Member<T>>,
}

impl<T: 'static> MemberMap<T> {
    fn new() -> Self {
        Self {
            type_name: type_name::<T>(),
            members: Vec::new(),
        }
    }
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
    pub fn members(&self) -> &[Member<T>] {
        &self.members
    }
    pub fn len(&self) -> usize {
        self.members.len()
    }
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
    /// Case-insensitive lookup of a member by name, Unicode case folding included.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| names_match(&m.name, name))
    }
    pub fn find(&self, name: &str) -> Option<&Member<T>> {
        self.position(name).map(|i| &self.members[i])
    }
    fn add(&mut self, name: &str, kind: Kind, nullable: bool, setter: Setter<T>) -> &mut Self {
        self.members.push(Member {
            name: name.to_string(),
            kind,
            nullable,
            setter,
        });
        self
    }
    pub fn field<V, F>(&mut self, name: &str, setter: F) -> &mut Self
    where
        V: Coercible,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.add(
            name,
            V::KIND,
            V::NULLABLE,
            Box::new(move |target, value| {
                if let Some(v) = V::from_value(value) {
                    setter(target, v)
                }
            }),
        )
    }
    pub fn enum_field<E, F>(&mut self, name: &str, setter: F) -> &mut Self
    where
        E: SqlEnum,
        F: Fn(&mut T, E) + Send + Sync + 'static,
    {
        self.add(
            name,
            Kind::Enum(E::VARIANTS),
            false,
            Box::new(move |target, value| {
                if let Value::Int(ordinal) = value {
                    if let Some(e) = E::from_ordinal(ordinal) {
                        setter(target, e)
                    }
                }
            }),
        )
    }
    /// A member only a registered coercer for `type_name` can produce.
    pub fn custom_field<F>(&mut self, name: &str, type_name: &'static str, setter: F) -> &mut Self
    where
        F: Fn(&mut T, Value) + Send + Sync + 'static,
    {
        self.add(name, Kind::Custom(type_name), true, Box::new(setter))
    }
}

type TypeKeeper = HashMap<TypeId, Arc<dyn Any + Send + Sync>, BuildHasherDefault<SeaHasher>>;

/// Per-type member maps, discovered once and never evicted.
pub struct FieldCache {
    maps: RwLock<TypeKeeper>,
    discoveries: AtomicUsize,
}

impl fmt::Debug for FieldCache {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FieldCache")
            .field("types", &self.len())
            .field("discoveries", &self.discoveries())
            .finish()
    }
}

impl Default for FieldCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldCache {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(TypeKeeper::default()),
            discoveries: AtomicUsize::new(0),
        }
    }
    pub fn global() -> Arc<FieldCache> {
        GLOBAL_CACHE.clone()
    }
    fn lookup<T: Hydrate>(maps: &TypeKeeper) -> Option<Arc<MemberMap<T>>> {
        maps.get(&TypeId::of::<T>())
            .cloned()
            .and_then(|any| any.downcast::<MemberMap<T>>().ok())
    }
    pub fn members<T: Hydrate>(&self) -> Arc<MemberMap<T>> {
        if let Some(found) = Self::lookup::<T>(&self.maps.read()) {
            return found;
        }
        let mut maps = self.maps.write();
        // another caller may have described the type while we waited
        if let Some(found) = Self::lookup::<T>(&maps) {
            return found;
        }
        let mut map = MemberMap::<T>::new();
        T::describe(&mut map);
        self.discoveries.fetch_add(1, Ordering::Relaxed);
        trace!(type_name = map.type_name(), members = map.len(), "Described members");
        let map = Arc::new(map);
        maps.insert(TypeId::of::<T>(), map.clone());
        map
    }
    /// Number of times a type had to be described.
    pub fn discoveries(&self) -> usize {
        self.discoveries.load(Ordering::Relaxed)
    }
    pub fn len(&self) -> usize {
        self.maps.read().len()
    }
    pub fn is_empty(&self) -> bool {
        self.maps.read().is_empty()
    }
}
