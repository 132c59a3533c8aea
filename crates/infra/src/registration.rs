//! Registration entrypoint.
//!
//! Handler sets are grouped into [`HandlerModule`]s and passed explicitly to
//! [`configure`]. After it returns, the collection contains:
//!
//! - every handler as a scoped service
//! - the [`HandlerRegistry`] and [`MediatorConfig`] as singletons
//! - [`CommandDispatcher`], [`QueryDispatcher`] and [`EventPlayer`] as scoped
//!   services sharing one scope

use std::sync::Arc;

use mediator_core::MediatorResult;

use crate::command_dispatcher::CommandDispatcher;
use crate::config::MediatorConfig;
use crate::container::{ScopedProvider, ServiceCollection};
use crate::event_player::EventPlayer;
use crate::query_dispatcher::QueryDispatcher;
use crate::registry::{HandlerDescriptor, HandlerRegistry};

/// A named group of handlers (the unit that gets scanned).
pub trait HandlerModule {
    fn name(&self) -> &str;

    fn handlers(&self) -> Vec<HandlerDescriptor>;
}

/// Register the mediator and every handler contributed by `modules`.
pub fn configure(
    services: &mut ServiceCollection,
    modules: &[&dyn HandlerModule],
    config: &MediatorConfig,
) -> MediatorResult<Arc<HandlerRegistry>> {
    register(services, modules.iter().copied(), config)
}

/// Like [`configure`], restricted to modules whose name starts with `prefix`.
pub fn configure_matching(
    services: &mut ServiceCollection,
    modules: &[&dyn HandlerModule],
    prefix: &str,
    config: &MediatorConfig,
) -> MediatorResult<Arc<HandlerRegistry>> {
    register(
        services,
        modules
            .iter()
            .copied()
            .filter(|module| module.name().starts_with(prefix)),
        config,
    )
}

fn register<'m>(
    services: &mut ServiceCollection,
    modules: impl Iterator<Item = &'m dyn HandlerModule>,
    config: &MediatorConfig,
) -> MediatorResult<Arc<HandlerRegistry>> {
    let mut registry = HandlerRegistry::new(config.conflict_policy);
    let mut scanned = Vec::new();
    let mut accepted = Vec::new();

    for module in modules {
        let descriptors = module.handlers();
        tracing::debug!(
            module = module.name(),
            handlers = descriptors.len(),
            "scanning handler module"
        );

        for descriptor in descriptors {
            registry.register_one(descriptor.clone())?;
            accepted.push(descriptor);
        }
        scanned.push(module.name().to_string());
    }

    // Nothing touches the collection until every candidate is accepted.
    for descriptor in &accepted {
        descriptor.register_service(services);
    }

    let registry = Arc::new(registry);
    services.add_instance(registry.clone());
    services.add_instance(Arc::new(*config));

    services.add_scoped(|scope: &ScopedProvider| {
        Ok(CommandDispatcher::new(
            scope.resolve::<HandlerRegistry>()?,
            scope.clone(),
        ))
    });
    services.add_scoped(|scope: &ScopedProvider| {
        Ok(QueryDispatcher::new(
            scope.resolve::<HandlerRegistry>()?,
            scope.clone(),
        ))
    });
    services.add_scoped(|scope: &ScopedProvider| {
        let config = scope.resolve::<MediatorConfig>()?;
        Ok(EventPlayer::new(
            scope.resolve::<CommandDispatcher>()?,
            scope.resolve::<QueryDispatcher>()?,
        )
        .with_replay_failure_mode(config.replay_failure_mode))
    });

    tracing::info!(
        modules = ?scanned,
        commands = registry.command_types().len(),
        queries = registry.query_types().len(),
        conflict_policy = ?config.conflict_policy,
        "mediator configured"
    );

    Ok(registry)
}
