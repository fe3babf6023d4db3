//! Declarative binding contracts and their runtime synthesis.
//!
//! A [`ClassContract`] is the generator-produced description of a
//! foreign class: its path and its members, each tagged with the
//! foreign name, static flag, parameter descriptors, and return
//! descriptor. No code is generated from it; a single data-driven
//! dispatcher looks the declared member up by host name and arity and
//! routes the call through resolution and marshaling.
//!
//! Static members of a contract share one static facet per class,
//! created lazily and cached for the context lifetime. Invoking an
//! instance operation through the facet fails with
//! [`BridgeError::InstanceOnStatic`] before any foreign call is made.

use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::jvm::Jvm;
use crate::object::BoundObject;
use crate::value::{TypedArg, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Constructor,
    Method,
    Field,
}

/// One declared member of a foreign class.
#[derive(Debug, Clone)]
pub struct MemberSpec {
    /// Host-visible name, used for dispatch.
    pub name: String,
    /// Foreign member name; defaults to the host name.
    pub java_name: String,
    pub kind: MemberKind,
    pub is_static: bool,
    pub params: Vec<TypeDescriptor>,
    /// Field type for fields, `Void` for constructors.
    pub returns: TypeDescriptor,
    /// Declared thrown exception class paths. Informational only; used
    /// by generated documentation, never enforced at runtime.
    pub throws: Vec<String>,
}

/// Declarative description of a foreign class, as emitted by the
/// binding generator.
#[derive(Debug, Clone)]
pub struct ClassContract {
    class_path: String,
    members: Vec<MemberSpec>,
}

impl ClassContract {
    pub fn builder(class_path: &str) -> ContractBuilder {
        ContractBuilder {
            contract: ClassContract {
                class_path: class_path.replace('.', "/"),
                members: Vec::new(),
            },
        }
    }

    pub fn class_path(&self) -> &str {
        &self.class_path
    }

    pub fn members(&self) -> &[MemberSpec] {
        &self.members
    }

    /// Find a declared operation by host name and the supplied values:
    /// arity narrows the candidates, then value shape picks among
    /// same-arity overloads. The declared parameter descriptors drive
    /// the exact signature afterwards.
    fn find_operation(&self, name: &str, args: &[Value]) -> Option<&MemberSpec> {
        let candidates: Vec<&MemberSpec> = self
            .members
            .iter()
            .filter(|member| {
                member.kind == MemberKind::Method
                    && member.name == name
                    && member.params.len() == args.len()
            })
            .collect();
        select_overload(candidates, args)
    }

    fn find_constructor(&self, args: &[Value]) -> Option<&MemberSpec> {
        let candidates: Vec<&MemberSpec> = self
            .members
            .iter()
            .filter(|member| {
                member.kind == MemberKind::Constructor && member.params.len() == args.len()
            })
            .collect();
        select_overload(candidates, args)
    }

    fn find_field(&self, name: &str) -> Option<&MemberSpec> {
        self.members
            .iter()
            .find(|member| member.kind == MemberKind::Field && member.name == name)
    }
}

/// Fluent builder for contracts; `foreign_name` and `throws` refine the
/// most recently declared member.
pub struct ContractBuilder {
    contract: ClassContract,
}

impl ContractBuilder {
    pub fn constructor(mut self, params: &[TypeDescriptor]) -> ContractBuilder {
        self.contract.members.push(MemberSpec {
            name: "<init>".into(),
            java_name: "<init>".into(),
            kind: MemberKind::Constructor,
            is_static: false,
            params: params.to_vec(),
            returns: TypeDescriptor::Void,
            throws: Vec::new(),
        });
        self
    }

    pub fn method(
        self,
        name: &str,
        params: &[TypeDescriptor],
        returns: TypeDescriptor,
    ) -> ContractBuilder {
        self.push_method(name, params, returns, false)
    }

    pub fn static_method(
        self,
        name: &str,
        params: &[TypeDescriptor],
        returns: TypeDescriptor,
    ) -> ContractBuilder {
        self.push_method(name, params, returns, true)
    }

    fn push_method(
        mut self,
        name: &str,
        params: &[TypeDescriptor],
        returns: TypeDescriptor,
        is_static: bool,
    ) -> ContractBuilder {
        self.contract.members.push(MemberSpec {
            name: name.into(),
            java_name: name.into(),
            kind: MemberKind::Method,
            is_static,
            params: params.to_vec(),
            returns,
            throws: Vec::new(),
        });
        self
    }

    pub fn field(mut self, name: &str, descriptor: TypeDescriptor) -> ContractBuilder {
        self.contract.members.push(MemberSpec {
            name: name.into(),
            java_name: name.into(),
            kind: MemberKind::Field,
            is_static: false,
            params: Vec::new(),
            returns: descriptor,
            throws: Vec::new(),
        });
        self
    }

    pub fn static_field(mut self, name: &str, descriptor: TypeDescriptor) -> ContractBuilder {
        self.contract.members.push(MemberSpec {
            name: name.into(),
            java_name: name.into(),
            kind: MemberKind::Field,
            is_static: true,
            params: Vec::new(),
            returns: descriptor,
            throws: Vec::new(),
        });
        self
    }

    /// Override the foreign name of the last declared member, for hosts
    /// that expose a member under a different name.
    pub fn foreign_name(mut self, java_name: &str) -> ContractBuilder {
        if let Some(member) = self.contract.members.last_mut() {
            member.java_name = java_name.into();
        }
        self
    }

    /// Record declared thrown exception class paths on the last member.
    pub fn throws(mut self, class_paths: &[&str]) -> ContractBuilder {
        if let Some(member) = self.contract.members.last_mut() {
            member
                .throws
                .extend(class_paths.iter().map(|path| path.replace('.', "/")));
        }
        self
    }

    pub fn build(self) -> Arc<ClassContract> {
        Arc::new(self.contract)
    }
}

/// A contract bound to a live runtime: the synthesized entry point for
/// constructing instances and reaching static members.
pub struct BoundClass {
    jvm: Jvm,
    contract: Arc<ClassContract>,
}

impl BoundClass {
    /// Resolve the contract's class and register the contract so
    /// returned objects of this class can be wrapped by runtime type.
    pub fn bind(jvm: &Jvm, contract: Arc<ClassContract>) -> BridgeResult<BoundClass> {
        jvm.resolve_class(contract.class_path())?;
        jvm.register_contract(Arc::clone(&contract));
        Ok(BoundClass {
            jvm: jvm.clone(),
            contract,
        })
    }

    pub fn contract(&self) -> &Arc<ClassContract> {
        &self.contract
    }

    /// Construct a foreign instance through a declared constructor
    /// selected by arity, with the declared parameter descriptors
    /// driving the signature.
    pub fn construct(&self, args: &[Value]) -> BridgeResult<BoundInstance> {
        let class = self.jvm.resolve_class(self.contract.class_path())?;
        let spec = self
            .contract
            .find_constructor(args)
            .ok_or_else(|| {
                BridgeError::method_not_found(
                    self.contract.class_path(),
                    "<init>",
                    &observed_signature(args),
                )
            })?;
        let typed = pair_args(spec, args)?;
        let handle = self.jvm.construct(&class, &typed)?;
        let object = Arc::new(BoundObject::bound(self.jvm.clone(), class, handle));
        Ok(BoundInstance {
            contract: Arc::clone(&self.contract),
            object,
        })
    }

    /// The contract's static facet: one shared target per class, lazily
    /// created and cached for the context lifetime.
    pub fn statics(&self) -> BridgeResult<BoundInstance> {
        let class = self.jvm.resolve_class(self.contract.class_path())?;
        let object = self
            .jvm
            .inner
            .statics
            .entry(self.contract.class_path().to_string())
            .or_insert_with(|| {
                Arc::new(BoundObject::static_facet(self.jvm.clone(), class))
            })
            .clone();
        Ok(BoundInstance {
            contract: Arc::clone(&self.contract),
            object,
        })
    }

    /// Convenience for a single static call without touching the facet.
    pub fn call_static(&self, name: &str, args: &[Value]) -> BridgeResult<Value> {
        self.statics()?.call(name, args)
    }

    /// Wrap a returned object in this contract's typed view, failing
    /// closed when the value is not an object of a contracted class.
    pub fn wrap(&self, value: &Value) -> BridgeResult<BoundInstance> {
        BoundInstance::from_value(&self.jvm, value)
    }
}

/// A contract-typed view over one bound object (or over the static
/// facet). All dispatch is by declared member, with signatures computed
/// from the declaration rather than observed values.
pub struct BoundInstance {
    contract: Arc<ClassContract>,
    object: Arc<BoundObject>,
}

impl BoundInstance {
    /// Typed wrapping by runtime class: looks the object's runtime
    /// class up in the contract registry and fails with
    /// [`BridgeError::NoClassMapping`] when no contract is registered.
    pub fn from_value(jvm: &Jvm, value: &Value) -> BridgeResult<BoundInstance> {
        let object = value.as_object().ok_or_else(|| BridgeError::Unmappable {
            what: format!("cannot wrap non-object value {value:?}"),
        })?;
        let contract = jvm.contract_for(object.class_path()).ok_or_else(|| {
            BridgeError::NoClassMapping {
                class_path: object.class_path().to_string(),
            }
        })?;
        Ok(BoundInstance {
            contract,
            object: Arc::clone(object),
        })
    }

    pub fn object(&self) -> &Arc<BoundObject> {
        &self.object
    }

    pub fn class_path(&self) -> &str {
        self.object.class_path()
    }

    /// The instance as a value, for passing back into the JVM.
    pub fn value(&self) -> Value {
        Value::Object(Arc::clone(&self.object))
    }

    /// Invoke a declared operation. Instance operations route through
    /// the backing object; static operations route through the class,
    /// so they also work on the static facet.
    pub fn call(&self, name: &str, args: &[Value]) -> BridgeResult<Value> {
        let spec = self
            .contract
            .find_operation(name, args)
            .ok_or_else(|| {
                BridgeError::method_not_found(
                    self.contract.class_path(),
                    name,
                    &observed_signature(args),
                )
            })?;
        let typed = pair_args(spec, args)?;
        if spec.is_static {
            self.object
                .call_static(&spec.java_name, &spec.returns, &typed)
        } else {
            self.object.call(&spec.java_name, &spec.returns, &typed)
        }
    }

    /// Read a declared field.
    pub fn get(&self, name: &str) -> BridgeResult<Value> {
        let spec = self.contract.find_field(name).ok_or_else(|| {
            BridgeError::field_not_found(self.contract.class_path(), name, "?")
        })?;
        if spec.is_static {
            self.object.get_static_field(&spec.java_name, &spec.returns)
        } else {
            self.object.get_field(&spec.java_name, &spec.returns)
        }
    }

    /// Write a declared field.
    pub fn set(&self, name: &str, value: Value) -> BridgeResult<()> {
        let spec = self.contract.find_field(name).ok_or_else(|| {
            BridgeError::field_not_found(self.contract.class_path(), name, "?")
        })?;
        let arg = TypedArg::with_descriptor(value, spec.returns.clone());
        if spec.is_static {
            self.object.set_static_field(&spec.java_name, &arg)
        } else {
            self.object.set_field(&spec.java_name, &arg)
        }
    }

    /// Release the backing foreign object.
    pub fn release(&self) {
        self.object.release();
    }
}

/// Prefer the first candidate whose declared parameters accept the
/// observed value shapes; fall back to the first declaration so a bad
/// match still fails with the member's real signature.
fn select_overload<'a>(candidates: Vec<&'a MemberSpec>, args: &[Value]) -> Option<&'a MemberSpec> {
    candidates
        .iter()
        .copied()
        .find(|member| params_accept(&member.params, args))
        .or_else(|| candidates.first().copied())
}

fn params_accept(params: &[TypeDescriptor], args: &[Value]) -> bool {
    params
        .iter()
        .zip(args.iter())
        .all(|(param, value)| value_fits(param, value))
}

/// Shape compatibility between a declared parameter and a host value.
/// Null fits any reference type; objects fit any object descriptor (the
/// JVM checks assignability, not the contract).
fn value_fits(param: &TypeDescriptor, value: &Value) -> bool {
    match (param, value) {
        (TypeDescriptor::Bool, Value::Bool(_)) => true,
        (TypeDescriptor::Byte, Value::Byte(_)) => true,
        (TypeDescriptor::Char, Value::Char(_)) => true,
        (TypeDescriptor::Short, Value::Short(_)) => true,
        (TypeDescriptor::Int, Value::Int(_)) => true,
        (TypeDescriptor::Long, Value::Long(_)) => true,
        (TypeDescriptor::Float, Value::Float(_)) => true,
        (TypeDescriptor::Double, Value::Double(_)) => true,
        (TypeDescriptor::Object(path), Value::Str(_)) => path == crate::descriptor::STRING_CLASS,
        (TypeDescriptor::Object(_), Value::Null | Value::Object(_)) => true,
        (TypeDescriptor::Array(_), Value::Null | Value::Array(_)) => true,
        _ => false,
    }
}

/// Pair call values with the declared parameter descriptors.
fn pair_args(spec: &MemberSpec, args: &[Value]) -> BridgeResult<Vec<TypedArg>> {
    args.iter()
        .zip(spec.params.iter())
        .map(|(value, param)| Ok(TypedArg::with_descriptor(value.clone(), param.clone())))
        .collect()
}

/// Best-effort parameter signature for errors about undeclared
/// operations, derived from the observed values.
fn observed_signature(args: &[Value]) -> String {
    let mut sig = String::from("(");
    for value in args {
        match value.descriptor_of(None) {
            Ok(descriptor) => sig.push_str(&descriptor.signature()),
            Err(_) => sig.push('?'),
        }
    }
    sig.push(')');
    sig
}
