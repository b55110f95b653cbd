//! Run-once tracing of member calls
//!
//! A [`Tracer`] pairs an [`InvocationLedger`] with a [`FingerprintBuilder`].
//! Every traced call:
//!
//! 1. Classifies the member; static members never see a receiver, instance
//!    members get it bound exactly once (the constructor is left as called)
//! 2. Builds the fingerprint of the (call site, callee) edge
//! 3. Claims it in the ledger; an edge that already fired returns the empty
//!    result without running the member
//! 4. Otherwise runs the member and returns its result
//!
//! The fingerprint is recorded before the member runs, so a member that
//! fails still counts as fired.

use crate::call_site::CallerContext;
use crate::class::{member_fn, Invocation, Member, MemberBody, CONSTRUCTOR};
use crate::classifier::{classify, CallKind};
use crate::config::{ConfigError, Settings};
use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::ledger::{self, FileLedger, InvocationLedger};
use serde_json::Value;
use std::any::type_name;
use std::sync::Arc;

/// Ledger-backed run-once guard
#[derive(Debug, Clone)]
pub struct Tracer {
    ledger: Arc<dyn InvocationLedger>,
    fingerprints: FingerprintBuilder,
}

impl Tracer {
    pub fn new(ledger: Arc<dyn InvocationLedger>, fingerprints: FingerprintBuilder) -> Self {
        Self {
            ledger,
            fingerprints,
        }
    }

    /// File-backed tracer for `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let fingerprints = FingerprintBuilder::new(&settings.caller_prefix)?;
        let ledger = FileLedger::new(settings.ledger_path());
        Ok(Self::new(Arc::new(ledger), fingerprints))
    }

    /// File-backed tracer from `runledger.toml` and the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_settings(&Settings::load(None)?)
    }

    pub fn ledger(&self) -> &dyn InvocationLedger {
        self.ledger.as_ref()
    }

    pub fn fingerprint(
        &self,
        caller: &CallerContext,
        callee_class: &str,
        callee_method: &str,
    ) -> Fingerprint {
        self.fingerprints.build(caller, callee_class, callee_method)
    }

    /// Run `f` unless the edge `caller -> callee_class.callee_method`
    /// already fired; `Ok(None)` when skipped
    pub fn run_once<R, F>(
        &self,
        caller: &CallerContext,
        callee_class: &str,
        callee_method: &str,
        f: F,
    ) -> ledger::Result<Option<R>>
    where
        F: FnOnce() -> R,
    {
        let fingerprint = self.fingerprint(caller, callee_class, callee_method);
        if !self.ledger.claim(&fingerprint)? {
            tracing::debug!("Skipping {}: already fired", fingerprint);
            return Ok(None);
        }

        tracing::debug!("Running {}", fingerprint);
        Ok(Some(f()))
    }

    /// Trace wrapper around `member`, carrying the wrapped marker
    ///
    /// Attributes are returned unchanged.
    pub fn wrap_member<T: 'static>(&self, member: &Member<T>) -> Member<T> {
        let MemberBody::Callable(original) = &member.body else {
            return member.clone();
        };

        let original = Arc::clone(original);
        let tracer = self.clone();
        let owner = Arc::clone(&member.owner);
        let name = member.signature.name.clone();
        let strip_receiver =
            name != CONSTRUCTOR && classify(&member.signature) == Some(CallKind::Static);

        let body = member_fn(move |invocation: Invocation<'_, T>| -> anyhow::Result<Value> {
            let receiver = if strip_receiver {
                None
            } else {
                invocation.receiver
            };

            let outcome = tracer.run_once(invocation.caller, &owner, &name, || {
                original(Invocation {
                    receiver,
                    ..invocation
                })
            })?;

            match outcome {
                Some(result) => result,
                None => Ok(Value::Null),
            }
        });

        Member {
            signature: member.signature.clone(),
            owner: Arc::clone(&member.owner),
            body: MemberBody::Callable(body),
            traced: true,
        }
    }
}

/// A value whose calls go through a [`Tracer`]
///
/// Composition counterpart of annotating a class: the wrapped value is only
/// reachable through [`Traced::call`] / [`Traced::call_mut`], each naming the
/// member being invoked.
///
/// ```
/// use runledger::fingerprint::FingerprintBuilder;
/// use runledger::ledger::MemoryLedger;
/// use runledger::tracer::{Traced, Tracer};
/// use std::sync::Arc;
///
/// struct Page;
/// impl Page {
///     fn click(&self) -> u32 { 1 }
/// }
///
/// let tracer = Tracer::new(
///     Arc::new(MemoryLedger::new()),
///     FingerprintBuilder::new("test_").unwrap(),
/// );
/// let page = Traced::new(Page, tracer);
/// let ctx = runledger::caller!();
///
/// assert_eq!(page.call(&ctx, "click", |p| p.click()).unwrap(), Some(1));
/// assert_eq!(page.call(&ctx, "click", |p| p.click()).unwrap(), None);
/// ```
#[derive(Debug)]
pub struct Traced<T> {
    inner: T,
    class_name: String,
    tracer: Tracer,
}

impl<T> Traced<T> {
    /// Wrap `inner`; the callee class is the last segment of `T`'s path
    pub fn new(inner: T, tracer: Tracer) -> Self {
        Self {
            inner,
            class_name: short_type_name::<T>(),
            tracer,
        }
    }

    /// Override the callee class name used in fingerprints
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn call<R, F>(&self, caller: &CallerContext, method: &str, f: F) -> ledger::Result<Option<R>>
    where
        F: FnOnce(&T) -> R,
    {
        self.tracer
            .run_once(caller, &self.class_name, method, || f(&self.inner))
    }

    pub fn call_mut<R, F>(
        &mut self,
        caller: &CallerContext,
        method: &str,
        f: F,
    ) -> ledger::Result<Option<R>>
    where
        F: FnOnce(&mut T) -> R,
    {
        let inner = &mut self.inner;
        self.tracer
            .run_once(caller, &self.class_name, method, || f(inner))
    }

    /// Untraced access
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn short_type_name<T: ?Sized>() -> String {
    let full = type_name::<T>();
    let path = full.split('<').next().unwrap_or(full);
    path.rsplit("::").next().unwrap_or(path).to_string()
}
