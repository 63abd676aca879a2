use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use shopbrain_core::{ApplicationError, GenericSearchIntent, PlanIntent, SearchPlan, UserContext};
use thiserror::Error;
use tracing::{info, warn};

use crate::analytics::{AnalyticsBackend, ServiceError};
use crate::router::IntentClassifier;
use crate::specialists::{
    OrdersBackend, PendingOrders, PendingProductSearch, ProductSearch, UsersAgent,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    UserEvents,
    Orders,
    GenericSearch,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserEvents => "user_events",
            Self::Orders => "orders",
            Self::GenericSearch => "generic_search",
        }
    }
}

/// Uniform response envelope for every route.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub items: Vec<Value>,
    pub source: ResultSource,
    pub plan: SearchPlan,
    pub ai_rewritten_query: String,
    /// Set when the router output was unusable and the generic route was forced.
    #[serde(skip)]
    pub fallback: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("query must not be empty")]
    EmptyQuery,
    #[error(transparent)]
    Upstream(#[from] ServiceError),
}

impl From<SearchError> for ApplicationError {
    fn from(value: SearchError) -> Self {
        match value {
            SearchError::EmptyQuery => ApplicationError::InvalidRequest(value.to_string()),
            SearchError::Upstream(error) => error.into(),
        }
    }
}

/// The dispatcher: classify, then hand the intent to the matching specialist.
///
/// Built once at startup and shared behind an `Arc`; nothing in it is mutated per request.
pub struct SearchRuntime {
    classifier: Arc<dyn IntentClassifier>,
    users: UsersAgent,
    orders: Arc<dyn OrdersBackend>,
    products: Arc<dyn ProductSearch>,
}

impl SearchRuntime {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        analytics: Arc<dyn AnalyticsBackend>,
    ) -> Self {
        Self {
            classifier,
            users: UsersAgent::new(analytics),
            orders: Arc::new(PendingOrders),
            products: Arc::new(PendingProductSearch),
        }
    }

    pub fn with_orders(mut self, orders: Arc<dyn OrdersBackend>) -> Self {
        self.orders = orders;
        self
    }

    pub fn with_product_search(mut self, products: Arc<dyn ProductSearch>) -> Self {
        self.products = products;
        self
    }

    pub async fn handle(
        &self,
        query: &str,
        user_context: &UserContext,
    ) -> Result<SearchOutcome, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let (plan, fallback) = match self.classifier.classify(query, user_context).await {
            Ok(plan) => (plan, false),
            Err(error) => {
                warn!(
                    event_name = "agent.router.fallback",
                    error_kind = error.kind(),
                    error = %error,
                    "router output unusable; defaulting to generic_search"
                );
                let rationale = format!("fallback to generic_search: {}", error.kind());
                (SearchPlan::generic_fallback(query, rationale), true)
            }
        };

        let (source, items, ai_rewritten_query) = match plan.intent() {
            PlanIntent::UserBehavior(intent) => {
                let structured = self.users.build_structured_query(intent, user_context);
                let events = self.users.fetch_events(&structured, user_context).await?;
                (ResultSource::UserEvents, events, query.to_string())
            }
            PlanIntent::Orders(intent) => {
                let orders = self.orders.lookup(intent, user_context).await?;
                (ResultSource::Orders, orders, query.to_string())
            }
            PlanIntent::GenericSearch(intent) => {
                let effective = if intent.normalized_query.trim().is_empty() {
                    GenericSearchIntent { normalized_query: query.to_string() }
                } else {
                    intent.clone()
                };
                let products = self.products.search(&effective, user_context).await?;
                (ResultSource::GenericSearch, products, effective.normalized_query)
            }
        };

        info!(
            event_name = "agent.search.completed",
            route = %plan.route(),
            source = source.as_str(),
            item_count = items.len(),
            fallback,
            "search request dispatched"
        );

        Ok(SearchOutcome { items, source, plan, ai_rewritten_query, fallback })
    }
}
