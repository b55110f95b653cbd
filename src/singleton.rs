//! Parameterized singletons
//!
//! An [`InstanceCache`] hands out at most one live instance per
//! [`SignatureKey`]. Slots hold `Weak` references: once every `Arc` handed
//! out for a key is dropped the slot is vacant and the next request builds a
//! fresh instance. Slots can also be released explicitly.
//!
//! Construction runs under one reentrant lock shared by every cache in the
//! process, so two threads asking for the same key never both construct,
//! and a constructor may itself request another cached instance.
//!
//! ```
//! use runledger::{parameterized, signature_key};
//! use runledger::singleton::Parameterized;
//! use std::sync::Arc;
//!
//! struct Browser {
//!     url: String,
//! }
//! parameterized!(Browser);
//!
//! let a = Browser::cached(signature_key!("https://example.test"), || Browser {
//!     url: "https://example.test".into(),
//! });
//! let b = Browser::cached(signature_key!("https://example.test"), || unreachable!());
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

use once_cell::sync::Lazy;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::{self, Display, Write};
use std::sync::{Arc, Weak};

#[doc(hidden)]
pub use once_cell::sync::Lazy as __Lazy;

/// Serializes check-then-construct across every cache
static CONSTRUCTION_LOCK: Lazy<ReentrantMutex<()>> = Lazy::new(|| ReentrantMutex::new(()));

/// Textual key of a constructor argument list
///
/// Positional arguments contribute their `Display` form in order, named
/// arguments only their name, all with no separator. Argument lists that
/// stringify identically share a key, and so do calls differing only in
/// the value of a named argument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignatureKey(String);

impl SignatureKey {
    pub fn builder() -> SignatureKeyBuilder {
        SignatureKeyBuilder::default()
    }

    /// Key of a purely positional argument list
    pub fn from_args(args: &[&dyn Display]) -> Self {
        args.iter()
            .fold(Self::builder(), |builder, arg| builder.arg(arg))
            .finish()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SignatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SignatureKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Incremental [`SignatureKey`] construction
#[derive(Debug, Default)]
pub struct SignatureKeyBuilder {
    positional: String,
    named: String,
}

impl SignatureKeyBuilder {
    pub fn arg<D: Display + ?Sized>(mut self, value: &D) -> Self {
        let _ = write!(self.positional, "{}", value);
        self
    }

    /// Named arguments are keyed by name alone
    pub fn named(mut self, name: &str) -> Self {
        self.named.push_str(name);
        self
    }

    pub fn finish(self) -> SignatureKey {
        SignatureKey(self.positional + &self.named)
    }
}

/// Registry of live instances by signature
pub struct InstanceCache<T> {
    slots: Mutex<HashMap<SignatureKey, Weak<T>>>,
}

impl<T> Default for InstanceCache<T> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> fmt::Debug for InstanceCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock().len();
        let live = self.live_count();
        f.debug_struct("InstanceCache")
            .field("slots", &slots)
            .field("live", &live)
            .finish()
    }
}

impl<T> InstanceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live instance for `key`, if any
    pub fn get(&self, key: &SignatureKey) -> Option<Arc<T>> {
        self.slots.lock().get(key).and_then(Weak::upgrade)
    }

    /// Live instance for `key`, or the result of `construct`
    ///
    /// A failed construction propagates its error and leaves the slot as
    /// it was.
    pub fn get_or_try_insert_with<E, F>(&self, key: SignatureKey, construct: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(live) = self.get(&key) {
            tracing::debug!("Reusing instance for signature {:?}", key.as_str());
            return Ok(live);
        }

        let _guard = CONSTRUCTION_LOCK.lock();
        if let Some(live) = self.get(&key) {
            return Ok(live);
        }

        let instance = Arc::new(construct()?);
        tracing::debug!("Constructed instance for signature {:?}", key.as_str());
        self.slots.lock().insert(key, Arc::downgrade(&instance));
        Ok(instance)
    }

    pub fn get_or_insert_with<F>(&self, key: SignatureKey, construct: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        match self.get_or_try_insert_with(key, || Ok::<T, Infallible>(construct())) {
            Ok(instance) => instance,
            Err(never) => match never {},
        }
    }

    /// Forget the slot for `key`; outstanding `Arc`s stay valid
    pub fn release(&self, key: &SignatureKey) -> bool {
        self.slots.lock().remove(key).is_some()
    }

    /// Drop vacant slots; returns how many were removed
    pub fn prune(&self) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| slot.strong_count() > 0);
        before - slots.len()
    }

    /// Number of slots whose instance is still alive
    pub fn live_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }
}

/// Types with one process-wide [`InstanceCache`]
///
/// Implement with [`parameterized!`](crate::parameterized!).
pub trait Parameterized: Sized + Send + Sync + 'static {
    fn instances() -> &'static InstanceCache<Self>;

    fn cached<F>(key: SignatureKey, construct: F) -> Arc<Self>
    where
        F: FnOnce() -> Self,
    {
        Self::instances().get_or_insert_with(key, construct)
    }

    fn try_cached<E, F>(key: SignatureKey, construct: F) -> Result<Arc<Self>, E>
    where
        F: FnOnce() -> Result<Self, E>,
    {
        Self::instances().get_or_try_insert_with(key, construct)
    }
}

/// Give a type a process-wide instance cache
#[macro_export]
macro_rules! parameterized {
    ($ty:ty) => {
        impl $crate::singleton::Parameterized for $ty {
            fn instances() -> &'static $crate::singleton::InstanceCache<Self> {
                static INSTANCES: $crate::singleton::__Lazy<$crate::singleton::InstanceCache<$ty>> =
                    $crate::singleton::__Lazy::new($crate::singleton::InstanceCache::new);
                &INSTANCES
            }
        }
    };
}

/// Build a [`SignatureKey`]: `signature_key!(a, b; name = value)`
///
/// Named values are evaluated but only their names reach the key.
#[macro_export]
macro_rules! signature_key {
    ($($arg:expr),* $(,)? $(; $($name:ident = $value:expr),+ $(,)?)?) => {{
        let builder = $crate::singleton::SignatureKey::builder();
        $(let builder = builder.arg(&$arg);)*
        $($(
            let _ = &$value;
            let builder = builder.named(stringify!($name));
        )+)?
        builder.finish()
    }};
}
