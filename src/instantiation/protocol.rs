//! Instantiator registration and dispatch.
//!
//! Each template kind has exactly one active instantiation function. The
//! functions live in an [`InstantiatorTable`]; a process-wide table is
//! preloaded with the built-in instantiators and every
//! [`InstantiationContext`] works on its own snapshot of it, so overriding a
//! function never affects a run already in progress.

use crate::error::{ModelError, Result};
use crate::instantiation::builtins;
use crate::modeling::coerce::{Coercer, Container, DefaultCoercer};
use crate::modeling::instances::{IdGenerator, Service};
use crate::modeling::scope::Scope;
use crate::modeling::templates::ServiceTemplate;
use crate::validation::{Level, Locator, ValidationSink};
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

/// A template record that can be turned into an instance.
///
/// The default [`instantiate`](Instantiable::instantiate) looks up the
/// function registered for `Self` in the context's table. A missing
/// registration is reported at [`Level::Platform`].
pub trait Instantiable: Sized + 'static {
    /// What instantiating this record produces.
    type Instance: 'static;

    /// Human-readable kind, used in messages.
    const KIND: &'static str;

    fn instantiate(
        &self,
        ctx: &mut InstantiationContext<'_>,
        container: &dyn Container,
    ) -> Option<Self::Instance> {
        match ctx.instantiators().current::<Self>() {
            Some(instantiate) => instantiate(self, ctx, container),
            None => {
                ctx.report(
                    Level::Platform,
                    format!("no instantiator registered for {}", Self::KIND),
                    None,
                );
                None
            }
        }
    }
}

/// An instantiation function for template kind `T`.
pub type InstantiateFn<T> = fn(
    &T,
    &mut InstantiationContext<'_>,
    &dyn Container,
) -> Option<<T as Instantiable>::Instance>;

#[derive(Clone)]
struct Entry {
    kind: &'static str,
    function: Arc<dyn Any + Send + Sync>,
}

/// One instantiation function per template kind.
#[derive(Clone, Default)]
pub struct InstantiatorTable {
    entries: HashMap<std::any::TypeId, Entry>,
}

impl std::fmt::Debug for InstantiatorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstantiatorTable")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl InstantiatorTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding the built-in instantiators.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        builtins::install(&mut table);
        table
    }

    /// Register `function` for `T`.
    ///
    /// Fails with [`ModelError::DuplicateInstantiator`] when `T` already has
    /// a function and `override_existing` is false.
    pub fn register<T: Instantiable>(
        &mut self,
        function: InstantiateFn<T>,
        override_existing: bool,
    ) -> Result<()> {
        if !override_existing && self.entries.contains_key(&std::any::TypeId::of::<T>()) {
            return Err(ModelError::DuplicateInstantiator { kind: T::KIND });
        }
        self.replace(function);
        Ok(())
    }

    /// Install `function` for `T`, returning the one it replaces.
    pub fn replace<T: Instantiable>(&mut self, function: InstantiateFn<T>) -> Option<InstantiateFn<T>> {
        let previous = self.current::<T>();
        self.entries.insert(
            std::any::TypeId::of::<T>(),
            Entry {
                kind: T::KIND,
                function: Arc::new(function),
            },
        );
        previous
    }

    /// The active function for `T`.
    pub fn current<T: Instantiable>(&self) -> Option<InstantiateFn<T>> {
        self.entries
            .get(&std::any::TypeId::of::<T>())?
            .function
            .downcast_ref::<InstantiateFn<T>>()
            .copied()
    }

    /// Reinstate a function saved with [`current`](Self::current); `None`
    /// removes the registration.
    pub fn restore<T: Instantiable>(&mut self, saved: Option<InstantiateFn<T>>) {
        match saved {
            Some(function) => {
                self.replace(function);
            }
            None => {
                self.entries.remove(&std::any::TypeId::of::<T>());
            }
        }
    }

    pub fn contains<T: Instantiable>(&self) -> bool {
        self.entries.contains_key(&std::any::TypeId::of::<T>())
    }

    /// Kinds with a registered function, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.entries.values().map(|entry| entry.kind).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static GLOBAL: LazyLock<RwLock<InstantiatorTable>> =
    LazyLock::new(|| RwLock::new(InstantiatorTable::with_builtins()));

// The table only holds fn pointers, so a poisoned lock is still consistent.

/// Register `function` for `T` in the process-wide table.
pub fn register<T: Instantiable>(function: InstantiateFn<T>, override_existing: bool) -> Result<()> {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(function, override_existing)
}

/// The process-wide function for `T`.
pub fn current<T: Instantiable>() -> Option<InstantiateFn<T>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .current::<T>()
}

/// Reinstate a process-wide function saved with [`current`].
pub fn restore<T: Instantiable>(saved: Option<InstantiateFn<T>>) {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .restore(saved);
}

/// Copy of the process-wide table.
pub fn snapshot() -> InstantiatorTable {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Overrides the process-wide function for `T` until dropped.
#[must_use = "the override is undone when the guard is dropped"]
pub struct OverrideGuard<T: Instantiable> {
    saved: Option<InstantiateFn<T>>,
    _kind: PhantomData<fn() -> T>,
}

impl<T: Instantiable> OverrideGuard<T> {
    pub fn new(function: InstantiateFn<T>) -> Self {
        let saved = GLOBAL
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(function);
        Self {
            saved,
            _kind: PhantomData,
        }
    }
}

impl<T: Instantiable> Drop for OverrideGuard<T> {
    fn drop(&mut self) {
        restore::<T>(self.saved.take());
    }
}

/// State threaded through one instantiation run.
///
/// Holds the template being instantiated, the service being built, the
/// reporting sink and the instantiator table of this run.
pub struct InstantiationContext<'a> {
    template: &'a ServiceTemplate,
    coercer: &'a dyn Coercer,
    sink: &'a mut dyn ValidationSink,
    instantiators: InstantiatorTable,
    inputs: BTreeMap<String, Value>,
    ids: IdGenerator,
    service: Service,
}

impl<'a> InstantiationContext<'a> {
    /// A context using a snapshot of the process-wide table.
    pub fn new(template: &'a ServiceTemplate, sink: &'a mut dyn ValidationSink) -> Self {
        Self {
            template,
            coercer: &DefaultCoercer,
            sink,
            instantiators: snapshot(),
            inputs: BTreeMap::new(),
            ids: IdGenerator::new(),
            service: Service::default(),
        }
    }

    /// User supplied values for service inputs.
    pub fn with_inputs(mut self, inputs: BTreeMap<String, Value>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_coercer(mut self, coercer: &'a dyn Coercer) -> Self {
        self.coercer = coercer;
        self
    }

    /// Replace the snapshot with `table`.
    pub fn with_instantiators(mut self, table: InstantiatorTable) -> Self {
        self.instantiators = table;
        self
    }

    pub fn template(&self) -> &'a ServiceTemplate {
        self.template
    }

    pub fn coercer(&self) -> &'a dyn Coercer {
        self.coercer
    }

    pub fn inputs(&self) -> &BTreeMap<String, Value> {
        &self.inputs
    }

    pub fn instantiators(&self) -> &InstantiatorTable {
        &self.instantiators
    }

    /// Table of this run; changes do not reach the process-wide table.
    pub fn instantiators_mut(&mut self) -> &mut InstantiatorTable {
        &mut self.instantiators
    }

    /// The service built so far.
    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut Service {
        &mut self.service
    }

    /// Hand over the service built so far, leaving an empty one.
    pub fn take_service(&mut self) -> Service {
        std::mem::take(&mut self.service)
    }

    /// Next instance id for `template_name`.
    pub fn next_id(&mut self, template_name: &str) -> String {
        self.ids.next_id(template_name)
    }

    pub fn sink(&mut self) -> &mut dyn ValidationSink {
        &mut *self.sink
    }

    pub fn report(&mut self, level: Level, message: String, locator: Option<Locator>) {
        self.sink.report_at(level, message, locator);
    }

    /// Instantiate the whole template from a clean state.
    pub fn instantiate_service(&mut self) -> Option<Service> {
        self.ids.reset();
        self.service = Service::default();
        let template = self.template;
        template.instantiate(self, &Scope::new(template))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::parameter::Parameter;

    struct Probe(i64);

    impl Instantiable for Probe {
        type Instance = i64;
        const KIND: &'static str = "probe";
    }

    fn double(probe: &Probe, _: &mut InstantiationContext<'_>, _: &dyn Container) -> Option<i64> {
        Some(probe.0 * 2)
    }

    fn negate(probe: &Probe, _: &mut InstantiationContext<'_>, _: &dyn Container) -> Option<i64> {
        Some(-probe.0)
    }

    struct GuardedProbe(i64);

    impl Instantiable for GuardedProbe {
        type Instance = i64;
        const KIND: &'static str = "guarded probe";
    }

    fn triple(probe: &GuardedProbe, _: &mut InstantiationContext<'_>, _: &dyn Container) -> Option<i64> {
        Some(probe.0 * 3)
    }

    fn plus_hundred(probe: &GuardedProbe, _: &mut InstantiationContext<'_>, _: &dyn Container) -> Option<i64> {
        Some(probe.0 + 100)
    }

    #[test]
    fn register_twice_without_override_fails() {
        let mut table = InstantiatorTable::new();
        table.register::<Probe>(double, false).unwrap();

        let err = table.register::<Probe>(negate, false).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateInstantiator { kind: "probe" }));

        table.register::<Probe>(negate, true).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn override_and_restore_change_dispatch() {
        let template = ServiceTemplate::default();
        let mut sink = crate::validation::IssueCollector::new();
        let mut ctx = InstantiationContext::new(&template, &mut sink)
            .with_instantiators(InstantiatorTable::new());
        let scope = Scope::new(&template);
        let probe = Probe(5);

        ctx.instantiators_mut().register::<Probe>(double, false).unwrap();
        assert_eq!(probe.instantiate(&mut ctx, &scope), Some(10));

        let saved = ctx.instantiators().current::<Probe>();
        ctx.instantiators_mut().register::<Probe>(negate, true).unwrap();
        assert_eq!(probe.instantiate(&mut ctx, &scope), Some(-5));

        ctx.instantiators_mut().restore::<Probe>(saved);
        assert_eq!(probe.instantiate(&mut ctx, &scope), Some(10));

        ctx.instantiators_mut().restore::<Probe>(None);
        assert_eq!(probe.instantiate(&mut ctx, &scope), None);
        drop(ctx);
        assert_eq!(sink.at_level(Level::Platform).count(), 1);
    }

    #[test]
    fn global_override_guard_restores() {
        assert!(current::<GuardedProbe>().is_none());
        register::<GuardedProbe>(triple, false).unwrap();
        assert!(register::<GuardedProbe>(triple, false).is_err());

        {
            let _guard = OverrideGuard::<GuardedProbe>::new(plus_hundred);
            let template = ServiceTemplate::default();
            let mut sink = crate::validation::IssueCollector::new();
            let mut ctx = InstantiationContext::new(&template, &mut sink);
            assert_eq!(GuardedProbe(1).instantiate(&mut ctx, &Scope::new(&template)), Some(101));
        }

        let template = ServiceTemplate::default();
        let mut sink = crate::validation::IssueCollector::new();
        let mut ctx = InstantiationContext::new(&template, &mut sink);
        assert_eq!(GuardedProbe(1).instantiate(&mut ctx, &Scope::new(&template)), Some(3));
    }

    #[test]
    fn snapshot_is_isolated_from_later_registration() {
        let template = ServiceTemplate::default();
        let mut sink = crate::validation::IssueCollector::new();
        let mut ctx = InstantiationContext::new(&template, &mut sink);
        ctx.instantiators_mut().restore::<Parameter>(None);

        assert!(!ctx.instantiators().contains::<Parameter>());
        assert!(current::<Parameter>().is_some());
    }

    #[test]
    fn builtins_cover_every_kind() {
        let table = InstantiatorTable::with_builtins();
        assert_eq!(table.len(), 12);
        assert!(table.kinds().contains(&"node template"));
    }
}
