use serde_json::{Map, Value};

use crate::planning::{
    BehaviorAction, QueryEntity, StructuredQuery, UserBehaviorIntent, UserContext,
};

pub const FILTER_USER_ID: &str = "user_id";
pub const FILTER_TYPE: &str = "type";
pub const FILTER_PRODUCT_CATEGORY: &str = "product_category";
pub const FILTER_META: &str = "meta";
pub const FILTER_TIME_WINDOW: &str = "time_window";

/// Context keys that may carry the caller's user id, in lookup order.
pub const USER_ID_CONTEXT_KEYS: [&str; 2] = ["user_id", "id"];

/// Translates a user-behavior intent into a `user_event` query.
///
/// Every filter is optional and added independently; an intent with no usable signal produces an
/// empty filter set, which the Body reads as "all events in scope".
pub fn build_user_event_query(
    intent: &UserBehaviorIntent,
    user_context: &UserContext,
) -> StructuredQuery {
    let mut filters = Map::new();

    if let Some(user_id) = resolve_user_id(user_context) {
        filters.insert(FILTER_USER_ID.to_string(), user_id.clone());
    }

    if intent.action != BehaviorAction::Unknown {
        filters.insert(FILTER_TYPE.to_string(), Value::String(intent.action.as_str().to_string()));
    }

    if let Some(category) = non_blank(intent.product_category.as_deref()) {
        filters.insert(FILTER_PRODUCT_CATEGORY.to_string(), Value::String(category.to_string()));
    }

    if !intent.attributes.is_empty() {
        let meta = intent
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect::<Map<_, _>>();
        filters.insert(FILTER_META.to_string(), Value::Object(meta));
    }

    if let Some(window) = non_blank(intent.time_window.as_deref()) {
        filters.insert(FILTER_TIME_WINDOW.to_string(), Value::String(window.to_string()));
    }

    StructuredQuery { entity: QueryEntity::UserEvent, filters }
}

/// First usable user id in the context. Empty values (null, blank strings, `0`, `false`, empty
/// lists and maps) are skipped, so an unset `user_id` still lets `id` through.
pub fn resolve_user_id(user_context: &UserContext) -> Option<&Value> {
    USER_ID_CONTEXT_KEYS
        .iter()
        .filter_map(|key| user_context.get(*key))
        .find(|value| is_present(value))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|number| number != 0.0),
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{json, Value};

    use super::{build_user_event_query, resolve_user_id};
    use crate::planning::{BehaviorAction, QueryEntity, UserBehaviorIntent, UserContext};

    fn context(value: Value) -> UserContext {
        match value {
            Value::Object(map) => map,
            _ => UserContext::new(),
        }
    }

    fn black_jeans_search() -> UserBehaviorIntent {
        UserBehaviorIntent {
            action: BehaviorAction::Search,
            product_category: Some("jeans".to_string()),
            attributes: BTreeMap::from([("color".to_string(), "black".to_string())]),
            time_window: Some("10m".to_string()),
        }
    }

    #[test]
    fn black_jeans_search_builds_full_filter_set() {
        let user_context = context(json!({"user_id": "42"}));
        let query = build_user_event_query(&black_jeans_search(), &user_context);

        assert_eq!(query.entity, QueryEntity::UserEvent);
        assert_eq!(
            Value::Object(query.filters),
            json!({
                "user_id": "42",
                "type": "search",
                "product_category": "jeans",
                "meta": {"color": "black"},
                "time_window": "10m"
            })
        );
    }

    #[test]
    fn unknown_action_never_produces_type_filter() {
        let intent = UserBehaviorIntent { action: BehaviorAction::Unknown, ..black_jeans_search() };
        let query = build_user_event_query(&intent, &context(json!({"user_id": "42"})));

        assert!(!query.filters.contains_key("type"));
        assert_eq!(query.filters.get("product_category"), Some(&json!("jeans")));
    }

    #[test]
    fn every_known_action_maps_to_its_event_type() {
        for (action, expected) in [
            (BehaviorAction::View, "view"),
            (BehaviorAction::Search, "search"),
            (BehaviorAction::AddToCart, "add_to_cart"),
            (BehaviorAction::Purchase, "purchase"),
        ] {
            let intent = UserBehaviorIntent { action, ..UserBehaviorIntent::default() };
            let query = build_user_event_query(&intent, &UserContext::new());
            assert_eq!(query.filters.get("type"), Some(&json!(expected)));
        }
    }

    #[test]
    fn user_id_is_taken_from_user_id_then_id() {
        let intent = UserBehaviorIntent::default();

        let primary =
            build_user_event_query(&intent, &context(json!({"user_id": "42", "id": "7"})));
        assert_eq!(primary.filters.get("user_id"), Some(&json!("42")));

        let secondary = build_user_event_query(&intent, &context(json!({"id": 7})));
        assert_eq!(secondary.filters.get("user_id"), Some(&json!(7)));

        let blank_primary =
            build_user_event_query(&intent, &context(json!({"user_id": "", "id": "7"})));
        assert_eq!(blank_primary.filters.get("user_id"), Some(&json!("7")));
    }

    #[test]
    fn zero_and_false_user_ids_fall_through_to_id() {
        assert_eq!(resolve_user_id(&context(json!({"user_id": 0, "id": "7"}))), Some(&json!("7")));
        assert_eq!(
            resolve_user_id(&context(json!({"user_id": false, "id": 9}))),
            Some(&json!(9))
        );
        assert!(resolve_user_id(&context(json!({"user_id": 0, "id": []}))).is_none());
        assert_eq!(resolve_user_id(&context(json!({"user_id": 12}))), Some(&json!(12)));
    }

    #[test]
    fn context_without_user_keys_adds_no_user_filter() {
        let query = build_user_event_query(
            &black_jeans_search(),
            &context(json!({"session_id": "abc", "user_id": null})),
        );
        assert!(!query.filters.contains_key("user_id"));
        assert!(resolve_user_id(&context(json!({"session_id": "abc"}))).is_none());
    }

    #[test]
    fn attributes_land_verbatim_under_meta_and_empty_attributes_are_omitted() {
        let with_attributes = UserBehaviorIntent {
            attributes: BTreeMap::from([
                ("color".to_string(), "black".to_string()),
                ("size".to_string(), "32".to_string()),
            ]),
            ..UserBehaviorIntent::default()
        };
        let query = build_user_event_query(&with_attributes, &UserContext::new());
        assert_eq!(query.filters.get("meta"), Some(&json!({"color": "black", "size": "32"})));

        let query = build_user_event_query(&UserBehaviorIntent::default(), &UserContext::new());
        assert!(!query.filters.contains_key("meta"));
    }

    #[test]
    fn intent_without_signal_yields_empty_user_event_query() {
        let intent = UserBehaviorIntent {
            product_category: Some("  ".to_string()),
            time_window: Some(String::new()),
            ..UserBehaviorIntent::default()
        };
        let query = build_user_event_query(&intent, &UserContext::new());

        assert_eq!(query.entity, QueryEntity::UserEvent);
        assert!(query.filters.is_empty());
    }
}
