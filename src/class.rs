//! Class definitions as explicit member tables
//!
//! A [`ClassDef`] is the set of named members a traced type exposes: its
//! methods, static functions and plain attributes, each with a declared
//! [`MemberSignature`]. Member bodies receive an [`Invocation`] carrying the
//! (optional) receiver, the call arguments and the caller's context.
//!
//! [`annotate`] swaps every public callable member for a trace wrapper and
//! marks it, so applying it again, or to a subclass built with
//! [`ClassDef::inherit`], leaves wrapped members alone.

use crate::call_site::CallerContext;
use crate::classifier::{is_public, MemberSignature};
use crate::tracer::Tracer;
use anyhow::{bail, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Constructor member name; its receiver is never stripped
pub const CONSTRUCTOR: &str = "new";

/// Positional and named arguments of a dynamic call, in call order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub named: IndexMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a named argument
    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    pub fn get_named(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }
}

/// What a member body sees when it runs
pub struct Invocation<'a, T> {
    /// Bound receiver; `None` for static members and class-level calls
    pub receiver: Option<&'a T>,
    pub args: &'a CallArgs,
    pub caller: &'a CallerContext,
}

impl<T> Clone for Invocation<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Invocation<'_, T> {}

/// Callable member body
pub type MemberFn<T> = Arc<dyn Fn(Invocation<'_, T>) -> Result<Value> + Send + Sync>;

pub(crate) fn member_fn<T, F>(body: F) -> MemberFn<T>
where
    F: Fn(Invocation<'_, T>) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(body)
}

/// Body of a class member
pub enum MemberBody<T> {
    Callable(MemberFn<T>),
    Attribute(Value),
}

impl<T> Clone for MemberBody<T> {
    fn clone(&self) -> Self {
        match self {
            MemberBody::Callable(f) => MemberBody::Callable(Arc::clone(f)),
            MemberBody::Attribute(v) => MemberBody::Attribute(v.clone()),
        }
    }
}

/// A named member and the class that declares it
pub struct Member<T> {
    pub(crate) signature: MemberSignature,
    pub(crate) owner: Arc<str>,
    pub(crate) body: MemberBody<T>,
    pub(crate) traced: bool,
}

impl<T> Clone for Member<T> {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature.clone(),
            owner: Arc::clone(&self.owner),
            body: self.body.clone(),
            traced: self.traced,
        }
    }
}

impl<T> fmt::Debug for Member<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.signature.name)
            .field("owner", &self.owner)
            .field("callable", &self.is_callable())
            .field("traced", &self.traced)
            .finish()
    }
}

impl<T> Member<T> {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Name of the class that declared this member
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn signature(&self) -> &MemberSignature {
        &self.signature
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.body, MemberBody::Callable(_))
    }

    /// Wrapped-method marker
    pub fn is_traced(&self) -> bool {
        self.traced
    }
}

/// Named member table of a class
pub struct ClassDef<T> {
    name: Arc<str>,
    members: IndexMap<String, Member<T>>,
}

impl<T> fmt::Debug for ClassDef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("members", &self.members.values().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: 'static> ClassDef<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            members: IndexMap::new(),
        }
    }

    /// Subclass of `parent`: inherited members keep their declaring class
    /// and their wrapped marker
    pub fn inherit(name: impl Into<String>, parent: &ClassDef<T>) -> Self {
        Self {
            name: Arc::from(name.into()),
            members: parent.members.clone(),
        }
    }

    /// Declare (or override) a callable member
    pub fn method<F>(mut self, signature: MemberSignature, body: F) -> Self
    where
        F: Fn(Invocation<'_, T>) -> Result<Value> + Send + Sync + 'static,
    {
        let member = Member {
            owner: Arc::clone(&self.name),
            body: MemberBody::Callable(member_fn(body)),
            traced: false,
            signature: MemberSignature {
                callable: true,
                ..signature
            },
        };
        self.members.insert(member.signature.name.clone(), member);
        self
    }

    /// Declare a plain data attribute
    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        let member = Member {
            signature: MemberSignature::attribute(name.clone()),
            owner: Arc::clone(&self.name),
            body: MemberBody::Attribute(value.into()),
            traced: false,
        };
        self.members.insert(name, member);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member(&self, name: &str) -> Option<&Member<T>> {
        self.members.get(name)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member<T>> {
        self.members.values()
    }

    /// Call member `name` as `receiver.name(args)` (or class-level when
    /// `receiver` is `None`)
    pub fn invoke(
        &self,
        receiver: Option<&T>,
        name: &str,
        args: &CallArgs,
        caller: &CallerContext,
    ) -> Result<Value> {
        let Some(member) = self.members.get(name) else {
            bail!("{} has no member '{}'", self.name, name);
        };

        match &member.body {
            MemberBody::Callable(body) => body(Invocation {
                receiver,
                args,
                caller,
            }),
            MemberBody::Attribute(_) => bail!("{}.{} is not callable", self.name, name),
        }
    }

    /// Value of attribute `name`
    pub fn attribute_value(&self, name: &str) -> Option<&Value> {
        match &self.members.get(name)?.body {
            MemberBody::Attribute(value) => Some(value),
            MemberBody::Callable(_) => None,
        }
    }

    /// Pair this class with a receiver for instance-style calls
    pub fn bind<'a>(&'a self, receiver: &'a T) -> BoundObject<'a, T> {
        BoundObject {
            class: self,
            receiver,
        }
    }
}

/// A receiver paired with its class
pub struct BoundObject<'a, T> {
    class: &'a ClassDef<T>,
    receiver: &'a T,
}

impl<T: 'static> BoundObject<'_, T> {
    pub fn call(&self, caller: &CallerContext, name: &str, args: &CallArgs) -> Result<Value> {
        self.class.invoke(Some(self.receiver), name, args, caller)
    }
}

/// Replace every public callable member of `class` with a trace wrapper
///
/// Members already carrying the wrapped marker are left untouched, so the
/// operation is idempotent and safe across a class hierarchy.
pub fn annotate<'c, T: 'static>(class: &'c mut ClassDef<T>, tracer: &Tracer) -> &'c mut ClassDef<T> {
    let mut wrapped = 0usize;
    for member in class.members.values_mut() {
        if member.traced || !member.is_callable() || !is_public(member.name()) {
            continue;
        }
        *member = tracer.wrap_member(member);
        wrapped += 1;
    }

    tracing::debug!("Annotated {}: {} member(s) wrapped", class.name, wrapped);
    class
}
