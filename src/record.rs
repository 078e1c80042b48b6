//! Structural record types for `new(...)` projections.
//!
//! A projection's shape is its ordered list of `(name, type)` pairs. The
//! factory hands out one [`RecordType`] per distinct shape and keeps it for the
//! life of the factory, so two projections with the same fields in the same
//! order always produce values of the same type.
//!
//! Lookups take a shared lock; only a miss takes the exclusive lock, and it
//! checks the cache again before minting a type, so a shape raced by two
//! callers is still created once.

use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::types::Type;

static NEXT_CLASS: AtomicUsize = AtomicUsize::new(1);

static GLOBAL: LazyLock<RecordFactory> = LazyLock::new(RecordFactory::new);

/// Ordered field list identifying a record shape.
///
/// Equality is order-sensitive. The hash is the XOR over fields of
/// `hash(name) ^ hash(type)`, computed once on construction.
#[derive(Debug, Clone)]
pub struct Signature {
    properties: Vec<(String, Type)>,
    hash_code: u64,
}

impl Signature {
    pub fn new<N: Into<String>>(properties: impl IntoIterator<Item = (N, Type)>) -> Self {
        let properties: Vec<(String, Type)> = properties
            .into_iter()
            .map(|(name, ty)| (name.into(), ty))
            .collect();
        let hash_code = properties
            .iter()
            .fold(0, |acc, (name, ty)| acc ^ hash_one(name) ^ hash_one(ty));
        Signature {
            properties,
            hash_code,
        }
    }

    pub fn properties(&self) -> &[(String, Type)] {
        &self.properties
    }

    pub fn hash_code(&self) -> u64 {
        self.hash_code
    }
}

fn hash_one<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.hash_code == other.hash_code && self.properties == other.properties
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_code);
    }
}

/// A generated record type. Identity is per instance: two record types are
/// equal only if they are the same cached type.
pub struct RecordType {
    id: usize,
    name: String,
    signature: Signature,
    index: HashMap<String, usize>,
}

impl RecordType {
    fn new(signature: Signature) -> Self {
        let id = NEXT_CLASS.fetch_add(1, Ordering::Relaxed);
        let index = signature
            .properties
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.to_lowercase(), i))
            .collect();
        RecordType {
            id,
            name: format!("DynamicClass{}", id),
            signature,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn len(&self) -> usize {
        self.signature.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signature.properties.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signature.properties.iter().map(|(name, _)| name.as_str())
    }

    /// Position of a field, ignoring letter case.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_lowercase()).copied()
    }

    /// Declared name and type of a field, ignoring letter case.
    pub fn field(&self, name: &str) -> Option<(&str, &Type)> {
        let (name, ty) = &self.signature.properties[self.index_of(name)?];
        Some((name, ty))
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecordType {}

impl Hash for RecordType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("fields", &self.signature.properties)
            .finish()
    }
}

/// Memoizing cache of record types keyed by [`Signature`].
#[derive(Default)]
pub struct RecordFactory {
    classes: RwLock<HashMap<Signature, Arc<RecordType>>>,
}

impl RecordFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide factory used when the compiler is not given one.
    pub fn global() -> &'static RecordFactory {
        &GLOBAL
    }

    pub fn get_or_create(&self, signature: Signature) -> Arc<RecordType> {
        if let Some(ty) = self.classes.read().get(&signature) {
            return ty.clone();
        }
        let mut classes = self.classes.write();
        if let Some(ty) = classes.get(&signature) {
            return ty.clone();
        }
        let ty = Arc::new(RecordType::new(signature.clone()));
        log::debug!("generated {} for {:?}", ty.name, ty.signature.properties);
        classes.insert(signature, ty.clone());
        ty
    }

    /// Shorthand for [`Self::get_or_create`] over a field list.
    pub fn create_class<N: Into<String>>(
        &self,
        properties: impl IntoIterator<Item = (N, Type)>,
    ) -> Arc<RecordType> {
        self.get_or_create(Signature::new(properties))
    }

    /// Number of distinct shapes generated so far.
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

impl fmt::Debug for RecordFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordFactory")
            .field("classes", &self.len())
            .finish()
    }
}
