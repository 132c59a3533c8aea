//! Type registry: message type → handler binding.
//!
//! Handlers are bound explicitly through [`HandlerDescriptor`]s instead of being
//! discovered by scanning. Each descriptor carries a monomorphised invoker, so
//! dispatch is a `TypeId` lookup followed by a plain function call:
//!
//! ```text
//! TypeId::of::<C>()              → CommandBinding → invoke(scope, &C)
//! (TypeId::of::<Q>(), Output)    → QueryBinding   → invoke(scope, &Q) → Box<Output>
//! ```
//!
//! The registry also keeps a replay-policy table for inspection. It is filled
//! from each bound message type's declared `REPLAY_POLICY` and is read-only
//! afterwards. Replay itself reads the policy recorded on each log entry, so
//! types without a handler are covered too.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use futures::future::BoxFuture;
use mediator_core::{
    Command, Message, MediatorError, MediatorResult, MessageKind, MessageType, Query,
    ReplayPolicy,
};
use mediator_events::{CommandHandler, QueryHandler};

use crate::config::ConflictPolicy;
use crate::container::{FromScope, ScopedProvider, ServiceCollection};

/// Type-erased message reference handed to invokers.
pub type ErasedMessage<'a> = &'a (dyn Any + Send + Sync);

type CommandInvoker =
    for<'a> fn(&'a ScopedProvider, ErasedMessage<'a>) -> BoxFuture<'a, MediatorResult<()>>;

type QueryInvoker = for<'a> fn(
    &'a ScopedProvider,
    ErasedMessage<'a>,
) -> BoxFuture<'a, MediatorResult<Box<dyn Any + Send>>>;

#[derive(Clone, Copy)]
enum Invoker {
    Command(CommandInvoker),
    Query {
        output_id: TypeId,
        output_name: &'static str,
        invoke: QueryInvoker,
    },
}

/// One registration candidate: a concrete handler type and the message it serves.
///
/// Only concrete handler types that the container can build (`H: FromScope`)
/// can produce a descriptor, so nothing abstract ever reaches the registry.
#[derive(Clone)]
pub struct HandlerDescriptor {
    message_type: MessageType,
    handler_id: TypeId,
    handler_type: &'static str,
    policy: ReplayPolicy,
    invoker: Invoker,
    register_service: fn(&mut ServiceCollection),
}

impl HandlerDescriptor {
    /// Bind command `C` to handler `H`.
    pub fn command<H, C>() -> Self
    where
        H: CommandHandler<C> + FromScope,
        C: Command,
    {
        Self {
            message_type: MessageType::of::<C>(),
            handler_id: TypeId::of::<H>(),
            handler_type: core::any::type_name::<H>(),
            policy: C::REPLAY_POLICY,
            invoker: Invoker::Command(invoke_command::<H, C>),
            register_service: register_scoped::<H>,
        }
    }

    /// Bind query `Q` (with its declared `Q::Output`) to handler `H`.
    pub fn query<H, Q>() -> Self
    where
        H: QueryHandler<Q> + FromScope,
        Q: Query,
    {
        Self {
            message_type: MessageType::of::<Q>(),
            handler_id: TypeId::of::<H>(),
            handler_type: core::any::type_name::<H>(),
            policy: Q::REPLAY_POLICY,
            invoker: Invoker::Query {
                output_id: TypeId::of::<Q::Output>(),
                output_name: core::any::type_name::<Q::Output>(),
                invoke: invoke_query::<H, Q>,
            },
            register_service: register_scoped::<H>,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self.invoker {
            Invoker::Command(_) => MessageKind::Command,
            Invoker::Query { .. } => MessageKind::Query,
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn handler_id(&self) -> TypeId {
        self.handler_id
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    pub fn replay_policy(&self) -> ReplayPolicy {
        self.policy
    }

    /// Register the handler itself as a scoped service.
    pub fn register_service(&self, services: &mut ServiceCollection) {
        (self.register_service)(services);
    }
}

impl core::fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("kind", &self.kind())
            .field("message_type", &self.message_type.name())
            .field("handler_type", &self.handler_type)
            .field("policy", &self.policy)
            .finish()
    }
}

fn register_scoped<H: FromScope>(services: &mut ServiceCollection) {
    services.add_scoped(H::from_scope);
}

fn downcast_message<M: Message>(message: ErasedMessage<'_>) -> MediatorResult<&M> {
    message
        .downcast_ref::<M>()
        .ok_or_else(|| MediatorError::MessageTypeMismatch {
            expected: M::message_type(),
            found: format!("{:?}", message.type_id()),
        })
}

fn invoke_command<'a, H, C>(
    scope: &'a ScopedProvider,
    message: ErasedMessage<'a>,
) -> BoxFuture<'a, MediatorResult<()>>
where
    H: CommandHandler<C> + FromScope,
    C: Command,
{
    Box::pin(async move {
        let command = downcast_message::<C>(message)?;
        let handler = scope.resolve::<H>()?;
        handler.handle(command).await.map_err(MediatorError::Invocation)
    })
}

fn invoke_query<'a, H, Q>(
    scope: &'a ScopedProvider,
    message: ErasedMessage<'a>,
) -> BoxFuture<'a, MediatorResult<Box<dyn Any + Send>>>
where
    H: QueryHandler<Q> + FromScope,
    Q: Query,
{
    Box::pin(async move {
        let query = downcast_message::<Q>(message)?;
        let handler = scope.resolve::<H>()?;
        let output = handler.handle(query).await.map_err(MediatorError::Invocation)?;
        Ok(Box::new(output) as Box<dyn Any + Send>)
    })
}

/// Bound handler for a command type.
#[derive(Clone, Copy)]
pub struct CommandBinding {
    message_type: MessageType,
    handler_id: TypeId,
    handler_type: &'static str,
    invoke: CommandInvoker,
}

impl CommandBinding {
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn handler_id(&self) -> TypeId {
        self.handler_id
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    pub fn invoke<'a>(
        &self,
        scope: &'a ScopedProvider,
        message: ErasedMessage<'a>,
    ) -> BoxFuture<'a, MediatorResult<()>> {
        (self.invoke)(scope, message)
    }
}

impl core::fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandBinding")
            .field("message_type", &self.message_type.name())
            .field("handler_type", &self.handler_type)
            .finish()
    }
}

/// Bound handler for a (query type, result type) pair.
#[derive(Clone, Copy)]
pub struct QueryBinding {
    message_type: MessageType,
    output_type: &'static str,
    handler_id: TypeId,
    handler_type: &'static str,
    invoke: QueryInvoker,
}

impl QueryBinding {
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn output_type(&self) -> &'static str {
        self.output_type
    }

    pub fn handler_id(&self) -> TypeId {
        self.handler_id
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler_type
    }

    pub fn invoke<'a>(
        &self,
        scope: &'a ScopedProvider,
        message: ErasedMessage<'a>,
    ) -> BoxFuture<'a, MediatorResult<Box<dyn Any + Send>>> {
        (self.invoke)(scope, message)
    }
}

impl core::fmt::Debug for QueryBinding {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueryBinding")
            .field("message_type", &self.message_type.name())
            .field("output_type", &self.output_type)
            .field("handler_type", &self.handler_type)
            .finish()
    }
}

/// Mapping from message types to their handlers, plus replay policies.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    conflict_policy: ConflictPolicy,
    commands: HashMap<TypeId, CommandBinding>,
    queries: HashMap<(TypeId, TypeId), QueryBinding>,
    policies: HashMap<TypeId, ReplayPolicy>,
}

impl HandlerRegistry {
    pub fn new(conflict_policy: ConflictPolicy) -> Self {
        Self {
            conflict_policy,
            ..Self::default()
        }
    }

    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.conflict_policy
    }

    /// Register every candidate in order.
    pub fn register(
        &mut self,
        candidates: impl IntoIterator<Item = HandlerDescriptor>,
    ) -> MediatorResult<()> {
        for candidate in candidates {
            self.register_one(candidate)?;
        }
        Ok(())
    }

    /// Register a single candidate, applying the conflict policy.
    ///
    /// Registering the same handler type twice for the same message is a no-op.
    pub fn register_one(&mut self, candidate: HandlerDescriptor) -> MediatorResult<()> {
        let message_type = candidate.message_type;

        match candidate.invoker {
            Invoker::Command(invoke) => {
                let key = message_type.id();
                if let Some(existing) = self.commands.get(&key) {
                    self.check_conflict(
                        message_type.name().to_string(),
                        (existing.handler_id, existing.handler_type),
                        &candidate,
                    )?;
                }
                self.commands.insert(
                    key,
                    CommandBinding {
                        message_type,
                        handler_id: candidate.handler_id,
                        handler_type: candidate.handler_type,
                        invoke,
                    },
                );
            }
            Invoker::Query {
                output_id,
                output_name,
                invoke,
            } => {
                let key = (message_type.id(), output_id);
                if let Some(existing) = self.queries.get(&key) {
                    self.check_conflict(
                        query_label(message_type.name(), output_name),
                        (existing.handler_id, existing.handler_type),
                        &candidate,
                    )?;
                }
                self.queries.insert(
                    key,
                    QueryBinding {
                        message_type,
                        output_type: output_name,
                        handler_id: candidate.handler_id,
                        handler_type: candidate.handler_type,
                        invoke,
                    },
                );
            }
        }

        self.policies.insert(message_type.id(), candidate.policy);

        tracing::debug!(
            kind = %candidate.kind(),
            message_type = message_type.name(),
            handler = candidate.handler_type,
            policy = %candidate.policy,
            "handler registered"
        );

        Ok(())
    }

    fn check_conflict(
        &self,
        message_type: String,
        (existing_id, existing): (TypeId, &'static str),
        candidate: &HandlerDescriptor,
    ) -> MediatorResult<()> {
        if existing_id == candidate.handler_id {
            return Ok(());
        }
        let attempted = candidate.handler_type;

        match self.conflict_policy {
            ConflictPolicy::FailFast => Err(MediatorError::DuplicateHandler {
                message_type,
                existing,
                attempted,
            }),
            ConflictPolicy::LastWins => {
                tracing::warn!(
                    message_type = %message_type,
                    replaced = existing,
                    handler = attempted,
                    "handler replaced by later registration"
                );
                Ok(())
            }
        }
    }

    pub fn resolve_command(&self, message_type: MessageType) -> MediatorResult<&CommandBinding> {
        self.commands
            .get(&message_type.id())
            .ok_or_else(|| MediatorError::handler_not_found(message_type.name()))
    }

    pub fn resolve_query<Q: Query>(&self) -> MediatorResult<&QueryBinding> {
        let key = (TypeId::of::<Q>(), TypeId::of::<Q::Output>());
        self.queries.get(&key).ok_or_else(|| {
            MediatorError::handler_not_found(query_label(
                Q::message_type(),
                core::any::type_name::<Q::Output>(),
            ))
        })
    }

    /// Declared policy for a message type, `NONE` when the type is unknown.
    pub fn replay_policy(&self, message_type: TypeId) -> ReplayPolicy {
        self.policies.get(&message_type).copied().unwrap_or(ReplayPolicy::NONE)
    }

    pub fn is_replayable(&self, message_type: TypeId) -> bool {
        self.replay_policy(message_type).is_replayable()
    }

    pub fn command_types(&self) -> Vec<MessageType> {
        self.commands.values().map(|b| b.message_type).collect()
    }

    pub fn query_types(&self) -> Vec<MessageType> {
        self.queries.values().map(|b| b.message_type).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len() + self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn query_label(query: &str, output: &str) -> String {
    format!("{query} -> {output}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mediator_core::{HandlerResult, ResolveError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct Tally(AtomicU32);

    #[derive(Debug)]
    struct Add(u32);
    impl Message for Add {
        const REPLAY_POLICY: ReplayPolicy = ReplayPolicy::REPLAYABLE.union(ReplayPolicy::MUTATES_DATA);
    }
    impl Command for Add {}

    #[derive(Debug)]
    struct Total;
    impl Message for Total {}
    impl Query for Total {
        type Output = u32;
    }

    struct AddHandler {
        tally: Arc<Tally>,
    }

    impl FromScope for AddHandler {
        fn from_scope(scope: &ScopedProvider) -> Result<Self, ResolveError> {
            Ok(Self {
                tally: scope.resolve::<Tally>()?,
            })
        }
    }

    #[async_trait]
    impl CommandHandler<Add> for AddHandler {
        async fn handle(&self, command: &Add) -> HandlerResult<()> {
            self.tally.0.fetch_add(command.0, Ordering::SeqCst);
            Ok(())
        }
    }

    struct DoubleAddHandler {
        tally: Arc<Tally>,
    }

    impl FromScope for DoubleAddHandler {
        fn from_scope(scope: &ScopedProvider) -> Result<Self, ResolveError> {
            Ok(Self {
                tally: scope.resolve::<Tally>()?,
            })
        }
    }

    #[async_trait]
    impl CommandHandler<Add> for DoubleAddHandler {
        async fn handle(&self, command: &Add) -> HandlerResult<()> {
            self.tally.0.fetch_add(command.0 * 2, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TotalHandler {
        tally: Arc<Tally>,
    }

    impl FromScope for TotalHandler {
        fn from_scope(scope: &ScopedProvider) -> Result<Self, ResolveError> {
            Ok(Self {
                tally: scope.resolve::<Tally>()?,
            })
        }
    }

    #[async_trait]
    impl QueryHandler<Total> for TotalHandler {
        async fn handle(&self, _query: &Total) -> HandlerResult<u32> {
            Ok(self.tally.0.load(Ordering::SeqCst))
        }
    }

    fn scope_with(descriptors: &[HandlerDescriptor]) -> (crate::container::ServiceProvider, Arc<Tally>) {
        let tally = Arc::new(Tally::default());
        let mut services = ServiceCollection::new();
        services.add_instance(tally.clone());
        for d in descriptors {
            d.register_service(&mut services);
        }
        (services.build(), tally)
    }

    #[test]
    fn binds_commands_and_queries_separately() {
        let mut registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        registry
            .register([
                HandlerDescriptor::command::<AddHandler, Add>(),
                HandlerDescriptor::query::<TotalHandler, Total>(),
            ])
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.command_types(), vec![MessageType::of::<Add>()]);
        assert_eq!(registry.query_types(), vec![MessageType::of::<Total>()]);

        let binding = registry.resolve_command(MessageType::of::<Add>()).unwrap();
        assert!(binding.handler_type().ends_with("AddHandler"));

        let query = registry.resolve_query::<Total>().unwrap();
        assert_eq!(query.output_type(), "u32");
    }

    #[test]
    fn lookup_miss_is_handler_not_found() {
        let registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        assert!(registry.is_empty());

        let err = registry.resolve_command(MessageType::of::<Add>()).unwrap_err();
        assert!(err.is_handler_not_found());
        assert!(err.to_string().contains("Add"));

        let err = registry.resolve_query::<Total>().unwrap_err();
        assert!(err.to_string().contains("Total -> u32"));
    }

    #[test]
    fn fail_fast_rejects_second_handler() {
        let mut registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        registry
            .register_one(HandlerDescriptor::command::<AddHandler, Add>())
            .unwrap();

        let err = registry
            .register_one(HandlerDescriptor::command::<DoubleAddHandler, Add>())
            .unwrap_err();

        match err {
            MediatorError::DuplicateHandler {
                message_type,
                existing,
                attempted,
            } => {
                assert!(message_type.ends_with("Add"));
                assert!(existing.ends_with("::AddHandler"));
                assert!(attempted.ends_with("DoubleAddHandler"));
            }
            other => panic!("expected DuplicateHandler, got {other:?}"),
        }
    }

    #[test]
    fn same_handler_twice_is_not_a_conflict() {
        let mut registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        registry
            .register([
                HandlerDescriptor::command::<AddHandler, Add>(),
                HandlerDescriptor::command::<AddHandler, Add>(),
            ])
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn handlers_are_compared_by_type_identity_not_name() {
        let mut registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        registry
            .register_one(HandlerDescriptor::command::<AddHandler, Add>())
            .unwrap();

        // A different handler type that happens to report the same name.
        let mut impostor = HandlerDescriptor::command::<DoubleAddHandler, Add>();
        impostor.handler_type = core::any::type_name::<AddHandler>();

        let err = registry.register_one(impostor).unwrap_err();
        assert!(matches!(err, MediatorError::DuplicateHandler { .. }));

        let binding = registry.resolve_command(MessageType::of::<Add>()).unwrap();
        assert_eq!(binding.handler_id(), TypeId::of::<AddHandler>());
    }

    #[tokio::test]
    async fn last_wins_keeps_later_handler() {
        let descriptors = [
            HandlerDescriptor::command::<AddHandler, Add>(),
            HandlerDescriptor::command::<DoubleAddHandler, Add>(),
        ];
        let mut registry = HandlerRegistry::new(ConflictPolicy::LastWins);
        registry.register(descriptors.iter().cloned()).unwrap();

        let binding = registry.resolve_command(MessageType::of::<Add>()).unwrap();
        assert!(binding.handler_type().ends_with("DoubleAddHandler"));

        let (provider, tally) = scope_with(&descriptors);
        let scope = provider.create_scope();
        binding.invoke(scope.provider(), &Add(5)).await.unwrap();
        assert_eq!(tally.0.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn policy_table_is_filled_at_registration() {
        let mut registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        assert_eq!(registry.replay_policy(TypeId::of::<Add>()), ReplayPolicy::NONE);

        registry
            .register([
                HandlerDescriptor::command::<AddHandler, Add>(),
                HandlerDescriptor::query::<TotalHandler, Total>(),
            ])
            .unwrap();

        assert!(registry.is_replayable(TypeId::of::<Add>()));
        assert!(registry.replay_policy(TypeId::of::<Add>()).contains(ReplayPolicy::MUTATES_DATA));
        assert!(!registry.is_replayable(TypeId::of::<Total>()));
    }

    #[tokio::test]
    async fn invokers_resolve_handlers_from_the_scope() {
        let descriptors = [
            HandlerDescriptor::command::<AddHandler, Add>(),
            HandlerDescriptor::query::<TotalHandler, Total>(),
        ];
        let mut registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        registry.register(descriptors.iter().cloned()).unwrap();
        let (provider, _tally) = scope_with(&descriptors);
        let scope = provider.create_scope();

        registry
            .resolve_command(MessageType::of::<Add>())
            .unwrap()
            .invoke(scope.provider(), &Add(3))
            .await
            .unwrap();

        let output = registry
            .resolve_query::<Total>()
            .unwrap()
            .invoke(scope.provider(), &Total)
            .await
            .unwrap();
        assert_eq!(*output.downcast::<u32>().unwrap(), 3);
    }

    #[tokio::test]
    async fn invoker_rejects_mismatched_payload() {
        let descriptors = [HandlerDescriptor::command::<AddHandler, Add>()];
        let mut registry = HandlerRegistry::new(ConflictPolicy::FailFast);
        registry.register(descriptors.iter().cloned()).unwrap();
        let (provider, _tally) = scope_with(&descriptors);
        let scope = provider.create_scope();

        let err = registry
            .resolve_command(MessageType::of::<Add>())
            .unwrap()
            .invoke(scope.provider(), &Total)
            .await
            .unwrap_err();
        assert!(matches!(err, MediatorError::MessageTypeMismatch { .. }));
    }

    #[test]
    fn descriptor_reports_its_binding() {
        let descriptor = HandlerDescriptor::query::<TotalHandler, Total>();
        assert_eq!(descriptor.kind(), MessageKind::Query);
        assert_eq!(descriptor.message_type(), MessageType::of::<Total>());
        assert!(descriptor.handler_type().ends_with("TotalHandler"));
        assert_eq!(descriptor.replay_policy(), ReplayPolicy::NONE);
        assert!(format!("{descriptor:?}").contains("TotalHandler"));
    }
}
