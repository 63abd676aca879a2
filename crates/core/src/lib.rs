//! Shopbrain core: the routing vocabulary shared by the agent runtime, the HTTP server and the
//! operator CLI.
//!
//! Nothing in this crate performs I/O beyond reading configuration. The language model and the
//! backend ("the Body") are reached from `shopbrain-agent`.

pub mod config;
pub mod errors;
pub mod planning;
pub mod query;

pub use errors::{ApplicationError, InterfaceError};
pub use planning::{
    BehaviorAction, GenericSearchIntent, OrdersIntent, OrdersPurpose, PlanIntent, PlanShapeError,
    QueryEntity, RawSearchPlan, Route, SearchPlan, StructuredQuery, UserBehaviorIntent,
    UserContext,
};
pub use query::build_user_event_query;
