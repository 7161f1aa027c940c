//! JSON heap snapshots of loader graphs.
//!
//! A snapshot declares types and objects by name/id, with field values and
//! method results written as tagged values. Building it produces described
//! objects wired into a [`DescribedRuntime`], ready for a discovery pass.
//!
//! ```json
//! {
//!   "types": [{ "name": "org.jboss.modules.ModuleClassLoader" }],
//!   "objects": [{
//!     "id": "app",
//!     "type": "org.jboss.modules.ModuleClassLoader",
//!     "methods": { "getParent": "null" }
//!   }],
//!   "roots": ["app"]
//! }
//! ```

use crate::error::{LoaderScopeError, Result};
use loaderscope_api::{
    DescribedObject, DescribedRuntime, DescribedType, ObjRef, ObjectKey, TypeRef, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSpec {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    File(PathBuf),
    /// Reference to an object by id
    Ref(String),
    /// Reference to a type by name
    Type(String),
    List(Vec<ValueSpec>),
    Map(Vec<(ValueSpec, ValueSpec)>),
}

/// Result of a static method. `by_argument` is keyed by the id of the first
/// argument; `returns` answers every other call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSpec {
    pub returns: Option<ValueSpec>,
    pub by_argument: BTreeMap<String, ValueSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSpec {
    pub name: String,
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    /// Object id of the loader that defined this type
    pub defining_loader: Option<String>,
    /// Object id of the only loader this type can be resolved from; resolvable
    /// from anywhere when absent
    pub visible_from: Option<String>,
    pub statics: BTreeMap<String, StaticSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, ValueSpec>,
    #[serde(default)]
    pub methods: BTreeMap<String, ValueSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapSnapshot {
    pub types: Vec<TypeSpec>,
    pub objects: Vec<ObjectSpec>,
    pub context_loader: Option<String>,
    pub roots: Vec<String>,
}

/// A built snapshot
pub struct LoadedSnapshot {
    pub runtime: Arc<DescribedRuntime>,
    pub roots: Vec<ObjRef>,
    pub objects: HashMap<String, ObjRef>,
}

impl LoadedSnapshot {
    pub fn object(&self, id: &str) -> Option<&ObjRef> {
        self.objects.get(id)
    }
}

impl HeapSnapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn build(&self) -> Result<LoadedSnapshot> {
        let mut builder = Builder {
            specs: self.types.iter().map(|t| (t.name.as_str(), t)).collect(),
            types: HashMap::new(),
            in_progress: HashSet::new(),
            objects: HashMap::new(),
        };

        for spec in &self.types {
            builder.build_type(&spec.name)?;
        }

        let mut described = Vec::with_capacity(self.objects.len());
        for spec in &self.objects {
            let ty: TypeRef = builder.build_type(&spec.type_name)?;
            let obj = DescribedObject::new(ty).build();
            let obj_ref: ObjRef = obj.clone();
            if builder.objects.insert(spec.id.clone(), obj_ref).is_some() {
                return Err(LoaderScopeError::Snapshot(format!(
                    "duplicate object id `{}`",
                    spec.id
                )));
            }
            described.push((spec, obj));
        }

        // Members are filled in after every object exists, so references may
        // point forwards or form cycles.
        for (spec, obj) in &described {
            for (name, value) in &spec.fields {
                obj.set_field(name.as_str(), builder.value(value)?);
            }
            for (name, value) in &spec.methods {
                obj.set_method(name.as_str(), builder.value(value)?);
            }
        }

        let runtime = Arc::new(DescribedRuntime::new());
        let ids_by_object: HashMap<ObjectKey, String> = builder
            .objects
            .iter()
            .map(|(id, obj)| (ObjectKey::new(obj), id.clone()))
            .collect();

        for spec in &self.types {
            let ty = builder.types[spec.name.as_str()].clone();
            if let Some(loader) = &spec.defining_loader {
                ty.set_defining_loader(Some(builder.object(loader)?));
            }
            for (name, static_spec) in &spec.statics {
                ty.set_static(name.as_str(), builder.static_method(static_spec, &ids_by_object)?);
            }
            let visible_from = match &spec.visible_from {
                Some(id) => Some(builder.object(id)?),
                None => None,
            };
            runtime.register_type(ty, visible_from.as_ref());
        }

        let context_loader = match &self.context_loader {
            Some(id) => Some(builder.object(id)?),
            None => None,
        };
        runtime.set_context_loader(context_loader);

        let roots = self
            .roots
            .iter()
            .map(|id| builder.object(id))
            .collect::<Result<Vec<_>>>()?;

        Ok(LoadedSnapshot {
            runtime,
            roots,
            objects: builder.objects,
        })
    }
}

struct Builder<'a> {
    specs: HashMap<&'a str, &'a TypeSpec>,
    types: HashMap<String, Arc<DescribedType>>,
    in_progress: HashSet<String>,
    objects: HashMap<String, ObjRef>,
}

impl Builder<'_> {
    /// Types are built supertypes-first. Names that are referenced but never
    /// declared become bare types.
    fn build_type(&mut self, name: &str) -> Result<TypeRef> {
        if let Some(ty) = self.types.get(name) {
            return Ok(ty.clone());
        }
        if !self.in_progress.insert(name.to_string()) {
            return Err(LoaderScopeError::Snapshot(format!(
                "type `{name}` is its own supertype"
            )));
        }

        let mut ty = DescribedType::new(name);
        if let Some(spec) = self.specs.get(name).copied() {
            if let Some(superclass) = &spec.superclass {
                ty = ty.extending(self.build_type(superclass)?);
            }
            for interface in &spec.interfaces {
                ty = ty.implementing(self.build_type(interface)?);
            }
        }

        let ty = ty.build();
        self.in_progress.remove(name);
        self.types.insert(name.to_string(), ty.clone());
        Ok(ty)
    }

    fn object(&self, id: &str) -> Result<ObjRef> {
        self.objects
            .get(id)
            .cloned()
            .ok_or_else(|| LoaderScopeError::Snapshot(format!("dangling reference `{id}`")))
    }

    fn value(&self, spec: &ValueSpec) -> Result<Value> {
        Ok(match spec {
            ValueSpec::Null => Value::Null,
            ValueSpec::Bool(b) => Value::Bool(*b),
            ValueSpec::Int(i) => Value::Int(*i),
            ValueSpec::Str(s) => Value::Str(s.clone()),
            ValueSpec::File(path) => Value::File(path.clone()),
            ValueSpec::Ref(id) => Value::Object(self.object(id)?),
            ValueSpec::Type(name) => match self.types.get(name.as_str()) {
                Some(ty) => Value::Type(ty.clone()),
                None => {
                    return Err(LoaderScopeError::Snapshot(format!(
                        "reference to undeclared type `{name}`"
                    )));
                }
            },
            ValueSpec::List(items) => Value::List(
                items
                    .iter()
                    .map(|item| self.value(item))
                    .collect::<Result<_>>()?,
            ),
            ValueSpec::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| -> Result<(Value, Value)> {
                        Ok((self.value(k)?, self.value(v)?))
                    })
                    .collect::<Result<_>>()?,
            ),
        })
    }

    fn static_method(
        &self,
        spec: &StaticSpec,
        ids_by_object: &HashMap<ObjectKey, String>,
    ) -> Result<loaderscope_api::Method> {
        let default = match &spec.returns {
            Some(value) => self.value(value)?,
            None => Value::Null,
        };
        let mut by_argument: HashMap<String, Value> = HashMap::new();
        for (id, value) in &spec.by_argument {
            // Validate the key as well as the value.
            self.object(id)?;
            by_argument.insert(id.clone(), self.value(value)?);
        }
        let ids = ids_by_object.clone();

        Ok(Arc::new(move |args: &[Value]| {
            let answer = args
                .first()
                .and_then(Value::as_object)
                .and_then(|arg| ids.get(&ObjectKey::new(arg)))
                .and_then(|id| by_argument.get(id));
            Ok(answer.cloned().unwrap_or_else(|| default.clone()))
        }))
    }
}
