//! Routing decisions and the intents they carry.
//!
//! The language model answers with a JSON document shaped like [`RawSearchPlan`]: a top-level
//! `route` plus three nullable intent slots. That shape cannot express "exactly one slot is
//! populated and it matches the route", so it is only a wire format. [`SearchPlan`] is the
//! validated form; building one from the wire shape rejects every inconsistent combination.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// Caller supplied context (user id, session id, free metadata). Opaque to the Brain except for
/// the user id lookup done by the query builder.
pub type UserContext = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    GenericSearch,
    UserBehavior,
    Orders,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GenericSearch => "generic_search",
            Self::UserBehavior => "user_behavior",
            Self::Orders => "orders",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps onto the Body's `UserEvent.type` column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorAction {
    View,
    Search,
    AddToCart,
    Purchase,
    #[default]
    Unknown,
}

impl BehaviorAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Search => "search",
            Self::AddToCart => "add_to_cart",
            Self::Purchase => "purchase",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrdersPurpose {
    ViewHistory,
    ReorderUsual,
    AddUsualToCart,
    #[default]
    Unknown,
}

/// "show me all the black jeans I searched for in the last 10 mins" reads as
/// `action = search`, `product_category = jeans`, `attributes = {color: black}`,
/// `time_window = 10m`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserBehaviorIntent {
    pub action: BehaviorAction,
    pub product_category: Option<String>,
    pub attributes: BTreeMap<String, String>,
    /// Relative window shorthand: `10m`, `1h`, `24h`, `7d`.
    pub time_window: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdersIntent {
    pub purpose: OrdersPurpose,
    pub product_category: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericSearchIntent {
    pub normalized_query: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanIntent {
    GenericSearch(GenericSearchIntent),
    UserBehavior(UserBehaviorIntent),
    Orders(OrdersIntent),
}

impl PlanIntent {
    pub fn route(&self) -> Route {
        match self {
            Self::GenericSearch(_) => Route::GenericSearch,
            Self::UserBehavior(_) => Route::UserBehavior,
            Self::Orders(_) => Route::Orders,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlanShapeError {
    #[error("route `{route}` was declared but its intent slot is empty")]
    MissingIntent { route: Route },
    #[error("route `{route}` was declared but other intent slots are populated: {populated:?}")]
    ConflictingIntents { route: Route, populated: Vec<Route> },
    #[error("intent in slot `{slot}` is tagged with route `{tag}`")]
    MismatchedTag { slot: Route, tag: Route },
}

/// An intent as it appears inside a wire slot, optionally repeating its own route tag.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TaggedIntent<T> {
    #[serde(default)]
    pub route: Option<Route>,
    #[serde(flatten)]
    pub intent: T,
}

/// The language model's answer as written, before validation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RawSearchPlan {
    pub route: Route,
    #[serde(default)]
    pub generic: Option<TaggedIntent<GenericSearchIntent>>,
    #[serde(default)]
    pub user_behavior: Option<TaggedIntent<UserBehaviorIntent>>,
    #[serde(default)]
    pub orders: Option<TaggedIntent<OrdersIntent>>,
    #[serde(default)]
    pub rationale: String,
}

/// Validated routing decision: exactly one intent, consistent with its route.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSearchPlan")]
pub struct SearchPlan {
    intent: PlanIntent,
    rationale: String,
}

impl SearchPlan {
    pub fn new(intent: PlanIntent, rationale: impl Into<String>) -> Self {
        Self { intent, rationale: rationale.into() }
    }

    /// Plan used when the router output cannot be trusted: search the query as typed.
    pub fn generic_fallback(query: &str, rationale: impl Into<String>) -> Self {
        Self::new(
            PlanIntent::GenericSearch(GenericSearchIntent { normalized_query: query.to_string() }),
            rationale,
        )
    }

    pub fn route(&self) -> Route {
        self.intent.route()
    }

    pub fn intent(&self) -> &PlanIntent {
        &self.intent
    }

    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// JSON in the wire layout, for response envelopes and logs.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl TryFrom<RawSearchPlan> for SearchPlan {
    type Error = PlanShapeError;

    fn try_from(raw: RawSearchPlan) -> Result<Self, Self::Error> {
        let route = raw.route;
        let populated = [
            (Route::GenericSearch, raw.generic.is_some()),
            (Route::UserBehavior, raw.user_behavior.is_some()),
            (Route::Orders, raw.orders.is_some()),
        ]
        .into_iter()
        .filter(|(slot, present)| *present && *slot != route)
        .map(|(slot, _)| slot)
        .collect::<Vec<_>>();
        if !populated.is_empty() {
            return Err(PlanShapeError::ConflictingIntents { route, populated });
        }

        let intent = match route {
            Route::GenericSearch => {
                let slot = raw.generic.ok_or(PlanShapeError::MissingIntent { route })?;
                check_tag(route, slot.route)?;
                PlanIntent::GenericSearch(slot.intent)
            }
            Route::UserBehavior => {
                let slot = raw.user_behavior.ok_or(PlanShapeError::MissingIntent { route })?;
                check_tag(route, slot.route)?;
                PlanIntent::UserBehavior(slot.intent)
            }
            Route::Orders => {
                let slot = raw.orders.ok_or(PlanShapeError::MissingIntent { route })?;
                check_tag(route, slot.route)?;
                PlanIntent::Orders(slot.intent)
            }
        };

        Ok(Self { intent, rationale: raw.rationale })
    }
}

fn check_tag(slot: Route, tag: Option<Route>) -> Result<(), PlanShapeError> {
    match tag {
        Some(tag) if tag != slot => Err(PlanShapeError::MismatchedTag { slot, tag }),
        _ => Ok(()),
    }
}

#[derive(Serialize)]
struct TaggedRef<'a, T> {
    route: Route,
    #[serde(flatten)]
    intent: &'a T,
}

#[derive(Serialize)]
struct WirePlan<'a> {
    route: Route,
    generic: Option<TaggedRef<'a, GenericSearchIntent>>,
    user_behavior: Option<TaggedRef<'a, UserBehaviorIntent>>,
    orders: Option<TaggedRef<'a, OrdersIntent>>,
    rationale: &'a str,
}

impl Serialize for SearchPlan {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let route = self.route();
        let mut wire = WirePlan {
            route,
            generic: None,
            user_behavior: None,
            orders: None,
            rationale: &self.rationale,
        };
        match &self.intent {
            PlanIntent::GenericSearch(intent) => wire.generic = Some(TaggedRef { route, intent }),
            PlanIntent::UserBehavior(intent) => {
                wire.user_behavior = Some(TaggedRef { route, intent })
            }
            PlanIntent::Orders(intent) => wire.orders = Some(TaggedRef { route, intent }),
        }
        wire.serialize(serializer)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEntity {
    #[default]
    UserEvent,
    Order,
    Product,
}

/// Backend-agnostic query sent to the Body. Only the Body turns this into a database query; the
/// filters never carry query-language fragments.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredQuery {
    pub entity: QueryEntity,
    #[serde(default)]
    pub filters: Map<String, Value>,
}

impl StructuredQuery {
    pub fn new(entity: QueryEntity) -> Self {
        Self { entity, filters: Map::new() }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        BehaviorAction, PlanIntent, PlanShapeError, RawSearchPlan, Route, SearchPlan,
        StructuredQuery,
    };

    fn parse(value: serde_json::Value) -> Result<SearchPlan, PlanShapeError> {
        let raw: RawSearchPlan = serde_json::from_value(value).expect("wire shape should parse");
        SearchPlan::try_from(raw)
    }

    #[test]
    fn user_behavior_plan_validates_and_keeps_intent_fields() {
        let plan = parse(json!({
            "route": "user_behavior",
            "generic": null,
            "user_behavior": {
                "route": "user_behavior",
                "action": "search",
                "product_category": "jeans",
                "attributes": {"color": "black"},
                "time_window": "10m"
            },
            "orders": null,
            "rationale": "first person search history"
        }))
        .expect("plan should validate");

        assert_eq!(plan.route(), Route::UserBehavior);
        assert_eq!(plan.rationale(), "first person search history");
        let PlanIntent::UserBehavior(intent) = plan.intent() else {
            panic!("expected user behavior intent");
        };
        assert_eq!(intent.action, BehaviorAction::Search);
        assert_eq!(intent.product_category.as_deref(), Some("jeans"));
        assert_eq!(intent.attributes.get("color").map(String::as_str), Some("black"));
        assert_eq!(intent.time_window.as_deref(), Some("10m"));
    }

    #[test]
    fn declared_route_with_empty_slot_is_rejected() {
        let error = parse(json!({
            "route": "user_behavior",
            "user_behavior": null,
            "rationale": "oops"
        }))
        .expect_err("missing slot should fail");

        assert_eq!(error, PlanShapeError::MissingIntent { route: Route::UserBehavior });
    }

    #[test]
    fn extra_populated_slot_is_rejected() {
        let error = parse(json!({
            "route": "orders",
            "orders": {"purpose": "view_history"},
            "generic": {"normalized_query": "jeans"},
            "rationale": ""
        }))
        .expect_err("two slots should fail");

        assert_eq!(
            error,
            PlanShapeError::ConflictingIntents {
                route: Route::Orders,
                populated: vec![Route::GenericSearch]
            }
        );
    }

    #[test]
    fn slot_tagged_with_another_route_is_rejected() {
        let error = parse(json!({
            "route": "orders",
            "orders": {"route": "user_behavior", "purpose": "unknown"},
            "rationale": ""
        }))
        .expect_err("mismatched tag should fail");

        assert_eq!(
            error,
            PlanShapeError::MismatchedTag { slot: Route::Orders, tag: Route::UserBehavior }
        );
    }

    #[test]
    fn unknown_route_name_does_not_parse() {
        let parsed = serde_json::from_value::<RawSearchPlan>(json!({
            "route": "recommendations",
            "rationale": ""
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn missing_intent_fields_fall_back_to_defaults() {
        let plan = parse(json!({
            "route": "user_behavior",
            "user_behavior": {},
        }))
        .expect("defaults should apply");

        let PlanIntent::UserBehavior(intent) = plan.intent() else {
            panic!("expected user behavior intent");
        };
        assert_eq!(intent.action, BehaviorAction::Unknown);
        assert!(intent.attributes.is_empty());
        assert_eq!(plan.rationale(), "");
    }

    #[test]
    fn serialized_plan_uses_wire_layout_with_one_populated_slot() {
        let plan = SearchPlan::generic_fallback("red shoes", "router output unusable");
        let value = plan.to_value();

        assert_eq!(value["route"], "generic_search");
        assert_eq!(value["generic"]["route"], "generic_search");
        assert_eq!(value["generic"]["normalized_query"], "red shoes");
        assert!(value["user_behavior"].is_null());
        assert!(value["orders"].is_null());
        assert_eq!(value["rationale"], "router output unusable");
    }

    #[test]
    fn search_plan_deserializes_through_validation() {
        let parsed = serde_json::from_value::<SearchPlan>(json!({
            "route": "generic_search",
            "rationale": ""
        }));
        assert!(parsed.is_err(), "deserializing a plan must apply the one-of check");
    }

    #[test]
    fn structured_query_defaults_to_user_events() {
        let query: StructuredQuery = serde_json::from_value(json!({})).expect("defaults");
        assert_eq!(serde_json::to_value(&query).expect("serialize")["entity"], "user_event");
        assert!(query.filters.is_empty());
    }
}
