//! Mediator runtime: service container, type registry, dispatchers, event player.

pub mod command_dispatcher;
pub mod config;
pub mod container;
pub mod event_player;
pub mod query_dispatcher;
pub mod registration;
pub mod registry;
pub mod replay;


pub use command_dispatcher::CommandDispatcher;
pub use config::{ConflictPolicy, MediatorConfig, ReplayFailureMode};
pub use container::{FromScope, Lifetime, ScopedProvider, ServiceCollection, ServiceProvider, ServiceScope};
pub use event_player::EventPlayer;
pub use query_dispatcher::QueryDispatcher;
pub use registration::{configure, configure_matching, HandlerModule};
pub use registry::{CommandBinding, HandlerDescriptor, HandlerRegistry, QueryBinding};
pub use replay::{ReplayFailure, ReplayReport};
