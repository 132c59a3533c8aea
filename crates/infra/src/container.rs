//! Minimal service container (registration + scoped resolution).
//!
//! The mediator needs a host that can build handlers with their dependencies
//! and hand out per-scope instances. This module provides exactly that and
//! nothing more:
//!
//! ```text
//! ServiceCollection (register)  →  ServiceProvider (build)  →  ServiceScope (resolve)
//! ```
//!
//! ## Lifetimes
//!
//! - **Singleton**: one instance per provider, shared by every scope
//! - **Scoped**: one instance per scope (handlers, dispatchers, event player)
//! - **Transient**: a fresh instance on every resolve
//!
//! ## Disposal
//!
//! Scoped services commonly hold a [`ScopedProvider`] back into their own
//! scope, which forms an `Arc` cycle through the instance cache. Dropping the
//! owning [`ServiceScope`] clears that cache, the same way disposing a scope
//! releases its instances.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mediator_core::ResolveError;

type Instance = Arc<dyn Any + Send + Sync>;
type InstanceCache = Mutex<HashMap<TypeId, Instance>>;
type Factory = Arc<dyn Fn(&ScopedProvider) -> Result<Instance, ResolveError> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lifetime {
    Singleton,
    Scoped,
    Transient,
}

struct Registration {
    service: &'static str,
    lifetime: Lifetime,
    factory: Factory,
}

/// A service that can be built from the scope it is resolved in.
///
/// This is the constructor-injection seam: handlers implement it to pull
/// their dependencies out of the container.
pub trait FromScope: Sized + Send + Sync + 'static {
    fn from_scope(scope: &ScopedProvider) -> Result<Self, ResolveError>;
}

/// Registration builder.
#[derive(Default)]
pub struct ServiceCollection {
    registrations: HashMap<TypeId, Registration>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-built singleton.
    pub fn add_singleton<T>(&mut self, value: T) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        self.add_instance(Arc::new(value))
    }

    /// Register an already shared singleton.
    pub fn add_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: Send + Sync + 'static,
    {
        let instance: Instance = instance;
        let factory: Factory = Arc::new(move |_: &ScopedProvider| Ok::<_, ResolveError>(instance.clone()));
        self.insert::<T>(Lifetime::Singleton, factory)
    }

    /// Register a lazily built singleton.
    pub fn add_singleton_with<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ScopedProvider) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        self.insert::<T>(Lifetime::Singleton, erase(factory))
    }

    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ScopedProvider) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        self.insert::<T>(Lifetime::Scoped, erase(factory))
    }

    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ScopedProvider) -> Result<T, ResolveError> + Send + Sync + 'static,
    {
        self.insert::<T>(Lifetime::Transient, erase(factory))
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    pub fn lifetime_of<T: 'static>(&self) -> Option<Lifetime> {
        self.registrations.get(&TypeId::of::<T>()).map(|r| r.lifetime)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn build(self) -> ServiceProvider {
        let inner = Arc::new(ProviderInner {
            registrations: self.registrations,
            singletons: Mutex::new(HashMap::new()),
        });
        let root = ScopedProvider::new(inner.clone());
        ServiceProvider { inner, root }
    }

    // Re-registering a type replaces the previous registration.
    fn insert<T: 'static>(&mut self, lifetime: Lifetime, factory: Factory) -> &mut Self {
        self.registrations.insert(
            TypeId::of::<T>(),
            Registration {
                service: core::any::type_name::<T>(),
                lifetime,
                factory,
            },
        );
        self
    }
}

impl core::fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut services: Vec<_> = self.registrations.values().map(|r| r.service).collect();
        services.sort_unstable();
        f.debug_struct("ServiceCollection")
            .field("services", &services)
            .finish()
    }
}

fn erase<T, F>(factory: F) -> Factory
where
    T: Send + Sync + 'static,
    F: Fn(&ScopedProvider) -> Result<T, ResolveError> + Send + Sync + 'static,
{
    Arc::new(move |scope: &ScopedProvider| {
        factory(scope).map(|value| Arc::new(value) as Instance)
    })
}

struct ProviderInner {
    registrations: HashMap<TypeId, Registration>,
    singletons: InstanceCache,
}

/// Built container. Resolves from an implicit root scope or from explicit scopes.
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
    root: ScopedProvider,
}

impl ServiceProvider {
    pub fn create_scope(&self) -> ServiceScope {
        ServiceScope {
            provider: ScopedProvider::new(self.inner.clone()),
        }
    }

    /// Resolve from the root scope.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        self.root.resolve::<T>()
    }

    /// Resolve from the root scope, `None` when unavailable.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.root.get::<T>()
    }
}

impl Drop for ServiceProvider {
    fn drop(&mut self) {
        self.root.clear();
    }
}

impl core::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.inner.registrations.len())
            .finish()
    }
}

/// Owning handle of one container scope.
///
/// Scoped instances are created at most once per scope. Dropping the scope
/// releases them.
pub struct ServiceScope {
    provider: ScopedProvider,
}

impl ServiceScope {
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        self.provider.resolve::<T>()
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.provider.get::<T>()
    }

    /// Shareable handle into this scope, for services that resolve lazily.
    pub fn provider(&self) -> &ScopedProvider {
        &self.provider
    }
}

impl Drop for ServiceScope {
    fn drop(&mut self) {
        self.provider.clear();
    }
}

impl core::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ServiceScope").finish_non_exhaustive()
    }
}

/// Cloneable, non-owning view of a scope.
///
/// Factories receive one, and dispatchers keep one to resolve handlers at
/// dispatch time.
#[derive(Clone)]
pub struct ScopedProvider {
    inner: Arc<ProviderInner>,
    scoped: Arc<InstanceCache>,
}

impl ScopedProvider {
    fn new(inner: Arc<ProviderInner>) -> Self {
        Self {
            inner,
            scoped: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveError> {
        let key = TypeId::of::<T>();
        let registration = self
            .inner
            .registrations
            .get(&key)
            .ok_or_else(ResolveError::not_registered::<T>)?;

        let instance = match registration.lifetime {
            Lifetime::Transient => (registration.factory)(self)?,
            Lifetime::Singleton => self.cached(&self.inner.singletons, key, registration)?,
            Lifetime::Scoped => self.cached(&self.scoped, key, registration)?,
        };

        instance
            .downcast::<T>()
            .map_err(|_| ResolveError::construction::<T>("factory produced a different type"))
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    pub fn is_registered<T: 'static>(&self) -> bool {
        self.inner.registrations.contains_key(&TypeId::of::<T>())
    }

    fn cached(
        &self,
        cache: &InstanceCache,
        key: TypeId,
        registration: &Registration,
    ) -> Result<Instance, ResolveError> {
        // Fast path: already built in this cache.
        {
            let instances = cache.lock().map_err(|_| ResolveError::Poisoned)?;
            if let Some(existing) = instances.get(&key) {
                return Ok(existing.clone());
            }
        }

        // Slow path: build without holding the lock, factories resolve their own dependencies.
        let built = (registration.factory)(self)?;

        let mut instances = cache.lock().map_err(|_| ResolveError::Poisoned)?;
        Ok(instances.entry(key).or_insert(built).clone())
    }

    fn clear(&self) {
        let drained: Vec<Instance> = match self.scoped.lock() {
            Ok(mut instances) => instances.drain().map(|(_, v)| v).collect(),
            Err(_) => return,
        };
        // Dropped outside the lock: instance destructors may touch this scope.
        drop(drained);
    }
}

impl core::fmt::Debug for ScopedProvider {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopedProvider").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Clock(u64);

    #[derive(Debug)]
    struct Greeter {
        clock: Arc<Clock>,
    }

    impl FromScope for Greeter {
        fn from_scope(scope: &ScopedProvider) -> Result<Self, ResolveError> {
            Ok(Self {
                clock: scope.resolve::<Clock>()?,
            })
        }
    }

    #[test]
    fn singleton_is_shared_across_scopes() {
        let mut services = ServiceCollection::new();
        services.add_singleton(Clock(7));
        let provider = services.build();

        let a = provider.create_scope().resolve::<Clock>().unwrap();
        let b = provider.create_scope().resolve::<Clock>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.0, 7);
    }

    #[test]
    fn scoped_is_cached_per_scope() {
        let mut services = ServiceCollection::new();
        services.add_singleton(Clock::default());
        services.add_scoped(Greeter::from_scope);
        let provider = services.build();

        let scope = provider.create_scope();
        let first = scope.resolve::<Greeter>().unwrap();
        let second = scope.resolve::<Greeter>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = provider.create_scope().resolve::<Greeter>().unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert!(Arc::ptr_eq(&first.clock, &other.clock));
    }

    #[test]
    fn transient_is_built_every_time() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        let mut services = ServiceCollection::new();
        services.add_transient(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Clock::default())
        });
        let provider = services.build();
        let scope = provider.create_scope();

        scope.resolve::<Clock>().unwrap();
        scope.resolve::<Clock>().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn lazy_singleton_is_built_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        let mut services = ServiceCollection::new();
        services.add_singleton_with(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Clock(1))
        });
        let provider = services.build();

        provider.create_scope().resolve::<Clock>().unwrap();
        provider.create_scope().resolve::<Clock>().unwrap();
        provider.resolve::<Clock>().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_service_is_reported_by_name() {
        let provider = ServiceCollection::new().build();
        let err = provider.create_scope().resolve::<Clock>().unwrap_err();
        assert!(matches!(err, ResolveError::NotRegistered { service } if service.ends_with("Clock")));
        assert!(provider.get::<Clock>().is_none());
    }

    #[test]
    fn missing_dependency_surfaces_unchanged() {
        let mut services = ServiceCollection::new();
        services.add_scoped(Greeter::from_scope);
        let provider = services.build();

        let err = provider.create_scope().resolve::<Greeter>().unwrap_err();
        assert_eq!(err, ResolveError::not_registered::<Clock>());
    }

    #[test]
    fn factory_errors_are_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let mut services = ServiceCollection::new();
        services.add_scoped(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ResolveError::construction::<Clock>("warming up"))
            } else {
                Ok(Clock(2))
            }
        });
        let provider = services.build();
        let scope = provider.create_scope();

        assert!(scope.resolve::<Clock>().is_err());
        assert_eq!(scope.resolve::<Clock>().unwrap().0, 2);
    }

    #[test]
    fn dropping_a_scope_releases_scoped_instances() {
        struct Holder {
            _scope: ScopedProvider,
        }

        let mut services = ServiceCollection::new();
        services.add_scoped(|scope: &ScopedProvider| {
            Ok(Holder {
                _scope: scope.clone(),
            })
        });
        let provider = services.build();

        let scope = provider.create_scope();
        let holder = scope.resolve::<Holder>().unwrap();
        // One reference in the cache, one here.
        assert_eq!(Arc::strong_count(&holder), 2);

        drop(scope);
        assert_eq!(Arc::strong_count(&holder), 1);
    }

    #[test]
    fn collection_reports_registrations() {
        let mut services = ServiceCollection::new();
        assert!(services.is_empty());

        services.add_singleton(Clock::default());
        services.add_scoped(Greeter::from_scope);

        assert_eq!(services.len(), 2);
        assert!(services.contains::<Greeter>());
        assert_eq!(services.lifetime_of::<Clock>(), Some(Lifetime::Singleton));
        assert_eq!(services.lifetime_of::<Greeter>(), Some(Lifetime::Scoped));
        assert!(format!("{services:?}").contains("Greeter"));
    }
}
