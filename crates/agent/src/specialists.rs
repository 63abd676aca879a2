//! The handlers a plan can be routed to.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use shopbrain_core::{
    build_user_event_query, GenericSearchIntent, OrdersIntent, StructuredQuery,
    UserBehaviorIntent, UserContext,
};
use tracing::debug;

use crate::analytics::{AnalyticsBackend, ServiceError};

/// Behavior lookups: intent to structured query, structured query to events.
pub struct UsersAgent {
    analytics: Arc<dyn AnalyticsBackend>,
}

impl UsersAgent {
    pub fn new(analytics: Arc<dyn AnalyticsBackend>) -> Self {
        Self { analytics }
    }

    pub fn build_structured_query(
        &self,
        intent: &UserBehaviorIntent,
        user_context: &UserContext,
    ) -> StructuredQuery {
        let query = build_user_event_query(intent, user_context);
        debug!(
            event_name = "agent.users.structured_query",
            entity = ?query.entity,
            filter_keys = ?query.filters.keys().collect::<Vec<_>>(),
            "structured query built for user behavior"
        );
        query
    }

    pub async fn fetch_events(
        &self,
        query: &StructuredQuery,
        user_context: &UserContext,
    ) -> Result<Vec<Value>, ServiceError> {
        let events = self.analytics.run_query(query, user_context).await?;
        debug!(event_name = "agent.users.events", item_count = events.len(), "fetched user events");
        Ok(events)
    }
}

/// Order history and cart lookups in the Body.
#[async_trait]
pub trait OrdersBackend: Send + Sync {
    async fn lookup(
        &self,
        intent: &OrdersIntent,
        user_context: &UserContext,
    ) -> Result<Vec<Value>, ServiceError>;
}

/// Product catalog search in the Body.
#[async_trait]
pub trait ProductSearch: Send + Sync {
    async fn search(
        &self,
        intent: &GenericSearchIntent,
        user_context: &UserContext,
    ) -> Result<Vec<Value>, ServiceError>;
}

/// Stand-in until the Body exposes an orders/cart endpoint: always an empty result set.
#[derive(Clone, Copy, Debug, Default)]
pub struct PendingOrders;

#[async_trait]
impl OrdersBackend for PendingOrders {
    async fn lookup(
        &self,
        intent: &OrdersIntent,
        user_context: &UserContext,
    ) -> Result<Vec<Value>, ServiceError> {
        debug!(
            event_name = "agent.orders.pending",
            purpose = ?intent.purpose,
            product_category = intent.product_category.as_deref().unwrap_or(""),
            context_keys = user_context.len(),
            "orders lookup not wired to the backend yet"
        );
        Ok(Vec::new())
    }
}

/// Stand-in until the Body exposes a product search endpoint: always an empty result set.
#[derive(Clone, Copy, Debug, Default)]
pub struct PendingProductSearch;

#[async_trait]
impl ProductSearch for PendingProductSearch {
    async fn search(
        &self,
        intent: &GenericSearchIntent,
        _user_context: &UserContext,
    ) -> Result<Vec<Value>, ServiceError> {
        debug!(
            event_name = "agent.products.pending",
            normalized_query = %intent.normalized_query,
            "product search not wired to the backend yet"
        );
        Ok(Vec::new())
    }
}
