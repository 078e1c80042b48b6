//! Host type catalog.
//!
//! Member lookup works over data registered up front: each exposed class or
//! interface lists its properties, methods, indexers and constructors, each
//! paired with a closure that performs the access at evaluation time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::{EnumType, Type, builtins};
use crate::error::EvalError;
use crate::value::Value;

/// Performs a method, indexer or constructor call. Receives the instance
/// (`None` for static members and constructors) and the argument values.
pub type Invoker = Arc<dyn Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError> + Send + Sync>;

/// Reads a property. Receives the instance, or `None` for static properties.
pub type Getter = Arc<dyn Fn(Option<&Value>) -> Result<Value, EvalError> + Send + Sync>;

#[derive(Clone)]
pub struct PropertyDef {
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
    /// Without a getter, the field of the same name is read from the instance.
    pub getter: Option<Getter>,
}

impl PropertyDef {
    pub fn new(name: &str, ty: Type) -> Self {
        PropertyDef {
            name: name.to_string(),
            ty,
            is_static: false,
            getter: None,
        }
    }

    fn with_getter(
        name: &str,
        ty: Type,
        getter: impl Fn(Option<&Value>) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        PropertyDef {
            getter: Some(Arc::new(getter)),
            ..PropertyDef::new(name, ty)
        }
    }
}

impl PartialEq for PropertyDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.ty == other.ty && self.is_static == other.is_static
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("is_static", &self.is_static)
            .finish()
    }
}

/// A formal parameter. Output parameters are never applicable.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub ty: Type,
    pub is_out: bool,
}

impl ParamDef {
    pub fn out(ty: Type) -> Self {
        ParamDef { ty, is_out: true }
    }
}

impl From<Type> for ParamDef {
    fn from(ty: Type) -> Self {
        ParamDef { ty, is_out: false }
    }
}

#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub declaring: Type,
    pub params: Vec<ParamDef>,
    /// `None` for methods that return nothing
    pub returns: Option<Type>,
    pub is_static: bool,
    pub invoker: Invoker,
}

impl MethodDef {
    pub const CONSTRUCTOR: &'static str = ".ctor";

    /// Result type of a call. Constructors produce their declaring type.
    pub fn result_type(&self) -> Option<&Type> {
        if self.name == Self::CONSTRUCTOR {
            Some(&self.declaring)
        } else {
            self.returns.as_ref()
        }
    }
}

impl PartialEq for MethodDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.declaring == other.declaring
            && self.params == other.params
            && self.returns == other.returns
            && self.is_static == other.is_static
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("declaring", &self.declaring)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("is_static", &self.is_static)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

/// Description of one host type, assembled with the builder methods and
/// handed to [`TypeRegistry::register`].
///
/// # Examples
///
/// ```
/// use dynq::types::{Type, TypeDef, TypeRegistry};
/// use dynq::Value;
///
/// let mut registry = TypeRegistry::new();
/// let person = registry.register(
///     TypeDef::class("Person")
///         .property("Name", Type::String)
///         .property("Age", Type::Int32)
///         .method("Greet", [Type::String], Some(Type::String), |this, args| {
///             let name = this.and_then(|p| p.field("Name")).unwrap_or(Value::Null);
///             Ok(Value::String(format!("{} {}", args[0], name)))
///         })
///         .predefined(),
/// );
/// assert_eq!(person, Type::class("Person"));
/// ```
#[derive(Debug, Clone)]
pub struct TypeDef {
    pub ty: Type,
    pub kind: TypeKind,
    pub base: Option<Type>,
    pub interfaces: Vec<Type>,
    pub properties: Vec<Arc<PropertyDef>>,
    pub methods: Vec<Arc<MethodDef>>,
    pub indexers: Vec<Arc<MethodDef>>,
    pub constructors: Vec<Arc<MethodDef>>,
    /// Methods declared here may be called from expressions
    pub predefined: bool,
}

impl TypeDef {
    pub fn class(name: &str) -> Self {
        Self::of(Type::class(name), TypeKind::Class)
    }

    pub fn interface(name: &str) -> Self {
        Self::of(Type::class(name), TypeKind::Interface)
    }

    pub(crate) fn of(ty: Type, kind: TypeKind) -> Self {
        TypeDef {
            ty,
            kind,
            base: None,
            interfaces: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            indexers: Vec::new(),
            constructors: Vec::new(),
            predefined: false,
        }
    }

    pub fn base(mut self, ty: Type) -> Self {
        self.base = Some(ty);
        self
    }

    pub fn implements(mut self, ty: Type) -> Self {
        self.interfaces.push(ty);
        self
    }

    /// Allows expressions to call the methods this type declares.
    pub fn predefined(mut self) -> Self {
        self.predefined = true;
        self
    }

    /// Instance property read from the object field of the same name.
    pub fn property(mut self, name: &str, ty: Type) -> Self {
        self.properties.push(Arc::new(PropertyDef::new(name, ty)));
        self
    }

    pub fn computed_property(
        mut self,
        name: &str,
        ty: Type,
        getter: impl Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        let property = PropertyDef::with_getter(name, ty, move |this| match this {
            Some(this) => getter(this),
            None => Err(EvalError::NullReference(String::new())),
        });
        self.properties.push(Arc::new(property));
        self
    }

    pub fn static_property(
        mut self,
        name: &str,
        ty: Type,
        getter: impl Fn() -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        let mut property = PropertyDef::with_getter(name, ty, move |_| getter());
        property.is_static = true;
        self.properties.push(Arc::new(property));
        self
    }

    fn method_def(
        &self,
        name: &str,
        params: impl IntoIterator<Item = impl Into<ParamDef>>,
        returns: Option<Type>,
        is_static: bool,
        invoker: impl Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Arc<MethodDef> {
        Arc::new(MethodDef {
            name: name.to_string(),
            declaring: self.ty.clone(),
            params: params.into_iter().map(Into::into).collect(),
            returns,
            is_static,
            invoker: Arc::new(invoker),
        })
    }

    pub fn method(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = impl Into<ParamDef>>,
        returns: Option<Type>,
        invoker: impl Fn(Option<&Value>, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        let method = self.method_def(name, params, returns, false, invoker);
        self.methods.push(method);
        self
    }

    pub fn static_method(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = impl Into<ParamDef>>,
        returns: Option<Type>,
        invoker: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        let method = self.method_def(name, params, returns, true, move |_, args| invoker(args));
        self.methods.push(method);
        self
    }

    /// Default member reached with `value[args]`.
    pub fn indexer(
        mut self,
        params: impl IntoIterator<Item = impl Into<ParamDef>>,
        returns: Type,
        invoker: impl Fn(&Value, &[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        let indexer = self.method_def("get_Item", params, Some(returns), false, move |this, args| {
            match this {
                Some(this) => invoker(this, args),
                None => Err(EvalError::NullReference("Item".to_string())),
            }
        });
        self.indexers.push(indexer);
        self
    }

    pub fn constructor(
        mut self,
        params: impl IntoIterator<Item = impl Into<ParamDef>>,
        invoker: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) -> Self {
        let ctor = self.method_def(MethodDef::CONSTRUCTOR, params, None, true, move |_, args| {
            invoker(args)
        });
        self.constructors.push(ctor);
        self
    }
}

/// The set of host types visible to expressions, layered over the
/// predefined catalog.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    defs: HashMap<Type, Arc<TypeDef>>,
    names: HashMap<String, Type>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: TypeDef) -> Type {
        let ty = def.ty.clone();
        self.names.insert(ty.name().to_lowercase(), ty.clone());
        self.defs.insert(ty.clone(), Arc::new(def));
        ty
    }

    /// Makes an enum reachable by name; enums need no member tables.
    pub fn register_enum(&mut self, def: EnumType) -> Type {
        let ty = Type::enumeration(def);
        self.names.insert(ty.name().to_lowercase(), ty.clone());
        ty
    }

    /// Registered type by name, ignoring letter case.
    pub fn lookup(&self, name: &str) -> Option<Type> {
        self.names.get(&name.to_lowercase()).cloned()
    }

    pub fn definition(&self, ty: &Type) -> Option<&TypeDef> {
        match self.defs.get(ty) {
            Some(def) => Some(def),
            None => builtins::definition(ty),
        }
    }

    pub fn is_interface(&self, ty: &Type) -> bool {
        self.definition(ty)
            .is_some_and(|def| def.kind == TypeKind::Interface)
    }

    /// Whether methods declared by `ty` may be called from an expression.
    pub fn is_predefined(&self, ty: &Type) -> bool {
        ty.is_predefined() || self.defs.get(ty).is_some_and(|def| def.predefined)
    }

    /// Lookup order for members: an interface with its transitively inherited
    /// interfaces (each once), otherwise the type, its base chain, then
    /// `Object`.
    pub fn self_and_base_types(&self, ty: &Type) -> Vec<Type> {
        if self.is_interface(ty) {
            let mut types = Vec::new();
            self.add_interface(&mut types, ty);
            return types;
        }
        let mut types = vec![ty.clone()];
        let mut current = self.definition(ty).and_then(|def| def.base.clone());
        while let Some(base) = current {
            if types.contains(&base) {
                break;
            }
            current = self.definition(&base).and_then(|def| def.base.clone());
            types.push(base);
        }
        if !types.contains(&Type::Object) {
            types.push(Type::Object);
        }
        types
    }

    fn add_interface(&self, types: &mut Vec<Type>, ty: &Type) {
        if types.contains(ty) {
            return;
        }
        types.push(ty.clone());
        if let Some(def) = self.definition(ty) {
            for inherited in &def.interfaces {
                self.add_interface(types, inherited);
            }
        }
    }

    /// Every type a value of `ty` can be used as: base classes and all
    /// implemented interfaces.
    pub fn ancestors(&self, ty: &Type) -> HashSet<Type> {
        let mut seen = HashSet::new();
        let mut pending = vec![ty.clone()];
        while let Some(current) = pending.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(def) = self.definition(&current) {
                pending.extend(def.base.iter().cloned());
                pending.extend(def.interfaces.iter().cloned());
            }
        }
        seen.insert(Type::Object);
        seen
    }

    /// Whether a value of `source` can be stored in a location of `target`
    /// without conversion code beyond a reference cast or a boxing.
    pub fn is_assignable(&self, target: &Type, source: &Type) -> bool {
        if target == source || *target == Type::Object {
            return true;
        }
        match (target, source) {
            (Type::Nullable(inner), _) => **inner == *source,
            (Type::Sequence(t), Type::Array(s) | Type::Sequence(s))
            | (Type::Array(t), Type::Array(s)) => {
                t == s || (!s.is_value_type() && self.is_assignable(t, s))
            }
            (Type::Class(_) | Type::Sequence(_), Type::Class(_)) => {
                self.ancestors(source).contains(target)
            }
            _ => false,
        }
    }

    /// Element type when `ty` is, or implements, `IEnumerable<T>`.
    pub fn enumerable_element(&self, ty: &Type) -> Option<Type> {
        if let Some(element) = ty.element_type() {
            return Some(element.clone());
        }
        if !matches!(ty, Type::Class(_)) {
            return None;
        }
        self.ancestors(ty)
            .into_iter()
            .find_map(|t| t.element_type().cloned())
    }

    /// Properties declared directly on `ty` with the given name and access
    /// kind, including the synthesized members of nullables, arrays and
    /// records.
    pub fn declared_properties(&self, ty: &Type, name: &str, static_access: bool) -> Vec<Arc<PropertyDef>> {
        let mut found: Vec<Arc<PropertyDef>> = self
            .definition(ty)
            .map(|def| {
                def.properties
                    .iter()
                    .filter(|p| p.is_static == static_access && p.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if !static_access {
            found.extend(synthesized_property(ty, name));
        }
        found
    }

    pub fn declared_methods(&self, ty: &Type, name: &str, static_access: bool) -> Vec<Arc<MethodDef>> {
        self.definition(ty)
            .map(|def| {
                def.methods
                    .iter()
                    .filter(|m| m.is_static == static_access && m.name.eq_ignore_ascii_case(name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn declared_indexers(&self, ty: &Type) -> Vec<Arc<MethodDef>> {
        self.definition(ty)
            .map(|def| def.indexers.clone())
            .unwrap_or_default()
    }

    pub fn constructors(&self, ty: &Type) -> Vec<Arc<MethodDef>> {
        self.definition(ty)
            .map(|def| def.constructors.clone())
            .unwrap_or_default()
    }

    /// First property or field named `name` along [`Self::self_and_base_types`].
    pub fn find_property(&self, ty: &Type, name: &str, static_access: bool) -> Option<Arc<PropertyDef>> {
        self.self_and_base_types(ty)
            .iter()
            .find_map(|t| self.declared_properties(t, name, static_access).into_iter().next())
    }
}

fn synthesized_property(ty: &Type, name: &str) -> Option<Arc<PropertyDef>> {
    let property = match ty {
        Type::Nullable(_) if name.eq_ignore_ascii_case("HasValue") => {
            PropertyDef::with_getter("HasValue", Type::Boolean, |this| {
                Ok(Value::Boolean(this.is_some_and(|v| !v.is_null())))
            })
        }
        Type::Nullable(inner_ty) if name.eq_ignore_ascii_case("Value") => {
            PropertyDef::with_getter("Value", (**inner_ty).clone(), |this| match this {
                Some(v) if !v.is_null() => Ok(v.clone()),
                _ => Err(EvalError::Host("Nullable object must have a value".to_string())),
            })
        }
        Type::Array(_) if name.eq_ignore_ascii_case("Length") => {
            PropertyDef::with_getter("Length", Type::Int32, |this| match this {
                Some(Value::List(items)) => Ok(Value::Int32(items.len() as i32)),
                _ => Err(EvalError::NullReference("Length".to_string())),
            })
        }
        Type::Record(record) => {
            let (field, field_ty) = record.field(name)?;
            PropertyDef::new(field, field_ty.clone())
        }
        _ => return None,
    };
    Some(Arc::new(property))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(TypeDef::interface("INamed").property("Name", Type::String));
        registry.register(
            TypeDef::interface("IPerson")
                .implements(Type::class("INamed"))
                .property("Age", Type::Int32),
        );
        registry.register(TypeDef::class("Animal").property("Legs", Type::Int32));
        registry.register(
            TypeDef::class("Dog")
                .base(Type::class("Animal"))
                .implements(Type::class("INamed")),
        );
        registry
    }

    #[test]
    fn test_interface_chain_visits_inherited_once() {
        let registry = registry();
        let chain = registry.self_and_base_types(&Type::class("IPerson"));
        assert_eq!(chain, vec![Type::class("IPerson"), Type::class("INamed")]);
        assert!(registry.find_property(&Type::class("IPerson"), "name", false).is_some());
    }

    #[test]
    fn test_class_chain_ends_at_object() {
        let registry = registry();
        let chain = registry.self_and_base_types(&Type::class("Dog"));
        assert_eq!(
            chain,
            vec![Type::class("Dog"), Type::class("Animal"), Type::Object]
        );
        assert!(registry.is_assignable(&Type::class("INamed"), &Type::class("Dog")));
        assert!(!registry.is_assignable(&Type::class("Dog"), &Type::class("Animal")));
    }
}
