//! C6: `Item`, the node type of the resource graph, plus its route list and
//! merge/serialize operations. `Router` (dispatch across routes) lives in
//! [`router`].

pub mod router;

pub use router::Router;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Attributes = serde_json::Map<String, Value>;

/// A handler binding on an `Item`: which operations it claims, at what
/// priority, and with what extra parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub handler_id: String,
    pub can_open: bool,
    pub can_list: bool,
    pub can_stream: bool,
    pub priority: i64,
    pub kwargs: Attributes,
}

impl Route {
    pub fn new(handler_id: impl Into<String>, can_open: bool, can_list: bool, can_stream: bool) -> Self {
        Self {
            handler_id: handler_id.into(),
            can_open,
            can_list,
            can_stream,
            priority: 0,
            kwargs: Attributes::new(),
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_kwargs(mut self, kwargs: Attributes) -> Self {
        self.kwargs = kwargs;
        self
    }
}

/// A node in the resource graph: an attribute map, capability flags, and
/// (once listed) owned children.
///
/// The upward parent edge described in spec.md §9 ("owning downward edges
/// plus a non-owning upward edge") is represented here as `parent_id`
/// rather than a live back-pointer: the tree is owned top-down through
/// `children`, so a caller that needs a path walks it from a root handle
/// instead of following a pointer that would otherwise force every `Item`
/// behind `Arc<Mutex<_>>` for the sake of a rarely-used accessor.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub attributes: Attributes,
    pub readable: bool,
    pub expandable: bool,
    pub streamable: bool,
    pub children: Option<Vec<Item>>,
    pub routes: Vec<Route>,
    pub parent_id: Option<String>,
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.readable == other.readable
            && self.streamable == other.streamable
            && self.expandable == other.expandable
            && self.children == other.children
            && self.routes == other.routes
            && self.attributes == other.attributes
    }
}

const MERGE_MAX_KEYS: [&str; 3] = ["date", "modified", "size"];

impl Item {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
            readable: false,
            expandable: false,
            streamable: false,
            children: None,
            routes: Vec::new(),
            parent_id: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_flags(mut self, readable: bool, expandable: bool, streamable: bool) -> Self {
        self.readable = readable;
        self.expandable = expandable;
        self.streamable = streamable;
        self
    }

    pub fn is_readable(&self) -> bool {
        self.readable && self.attributes.contains_key("size")
    }

    pub fn is_listable(&self) -> bool {
        self.expandable || self.children.is_some()
    }

    pub fn is_streamable(&self) -> bool {
        self.streamable
    }

    /// Attaches `child` under this item, setting its `parent_id` and
    /// materializing `children` if this is the first child added.
    pub fn add_item(&mut self, mut child: Item) {
        child.parent_id = Some(self.id.clone());
        self.children.get_or_insert_with(Vec::new).push(child);
    }

    /// Adds a route unless none of its three capability bits matches a true
    /// capability flag on this item (it could never be selected), then
    /// de-duplicates.
    pub fn add_route(&mut self, route: Route) {
        let selectable = (route.can_open && self.is_readable())
            || (route.can_list && self.is_listable())
            || (route.can_stream && self.is_streamable());
        if !selectable {
            return;
        }
        self.routes.push(route);
        self.dedup_routes();
    }

    fn dedup_routes(&mut self) {
        let mut deduped: Vec<Route> = Vec::with_capacity(self.routes.len());
        for route in self.routes.drain(..) {
            if !deduped.contains(&route) {
                deduped.push(route);
            }
        }
        self.routes = deduped;
    }

    /// Union-merges `other` into `self` in place. A no-op if the ids differ.
    /// See spec.md §4.6 for the exact key-by-key semantics reproduced here.
    pub fn merge(&mut self, other: &Item) {
        if self.id != other.id {
            return;
        }

        for (key, value) in other.attributes.iter() {
            if MERGE_MAX_KEYS.contains(&key.as_str()) {
                continue;
            }
            let self_is_falsy = self.attributes.get(key).map_or(true, is_falsy);
            if self_is_falsy {
                self.attributes.insert(key.clone(), value.clone());
            } else if let Value::Object(other_obj) = value {
                if let Some(Value::Object(self_obj)) = self.attributes.get_mut(key) {
                    for (k, v) in other_obj {
                        self_obj.insert(k.clone(), v.clone());
                    }
                }
            }
        }

        for key in MERGE_MAX_KEYS {
            let self_has = self.attributes.contains_key(key);
            let other_has = other.attributes.contains_key(key);
            if !self_has && !other_has {
                continue;
            }
            let self_v = self.attributes.get(key).and_then(Value::as_i64).unwrap_or(0);
            let other_v = other.attributes.get(key).and_then(Value::as_i64).unwrap_or(0);
            self.attributes.insert(key.to_string(), Value::from(self_v.max(other_v)));
        }

        self.routes.extend(other.routes.iter().cloned());
        self.dedup_routes();

        self.expandable = self.expandable || other.expandable;
        self.readable = self.readable || other.readable;
        self.streamable = self.streamable || other.streamable;

        match (&mut self.children, &other.children) {
            (None, Some(other_children)) => {
                self.children = Some(other_children.clone());
            }
            (Some(self_children), Some(other_children)) => {
                for oc in other_children {
                    if let Some(sc) = self_children.iter_mut().find(|c| c.id == oc.id) {
                        sc.merge(oc);
                    } else {
                        self_children.push(oc.clone());
                    }
                }
            }
            _ => {}
        }

        if let Some(children) = &mut self.children {
            for c in children.iter_mut() {
                c.parent_id = Some(self.id.clone());
            }
        }
    }

    pub fn serialize(&self, include_routes: bool) -> SerializedItem {
        SerializedItem {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
            readable: self.readable,
            expandable: self.expandable,
            streamable: self.streamable,
            nested_items: self
                .children
                .as_ref()
                .map(|cs| cs.iter().map(|c| c.serialize(include_routes)).collect()),
            routes: include_routes.then(|| self.routes.iter().map(SerializedRoute::from).collect()),
        }
    }

    /// Rebuilds an `Item` tree from its serialized form. `default_routes`,
    /// if given, is applied to any unserialized item whose capability flags
    /// require routing but whose data carried no explicit `routes`.
    pub fn unserialize(data: &SerializedItem, default_routes: &[Route]) -> Item {
        let mut item = Item::new(data.id.clone());

        if let Some(nested) = &data.nested_items {
            for nested_data in nested {
                item.add_item(Item::unserialize(nested_data, default_routes));
            }
        }

        let mut need_routes = false;
        if data.expandable {
            item.expandable = true;
            need_routes = true;
        }
        if data.readable {
            item.readable = true;
            need_routes = true;
        }
        if data.streamable {
            item.streamable = true;
            need_routes = true;
        }

        item.attributes = data.attributes.clone();

        match &data.routes {
            Some(routes) => item.routes = routes.iter().map(Route::from).collect(),
            None if need_routes => {
                for route in default_routes {
                    item.add_route(route.clone());
                }
            }
            None => {}
        }

        item
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedRoute {
    pub handler: String,
    pub can_open: bool,
    pub can_list: bool,
    pub can_stream: bool,
    pub priority: i64,
    pub kwargs: Attributes,
}

impl From<&Route> for SerializedRoute {
    fn from(r: &Route) -> Self {
        Self {
            handler: r.handler_id.clone(),
            can_open: r.can_open,
            can_list: r.can_list,
            can_stream: r.can_stream,
            priority: r.priority,
            kwargs: r.kwargs.clone(),
        }
    }
}

impl From<&SerializedRoute> for Route {
    fn from(r: &SerializedRoute) -> Self {
        Self {
            handler_id: r.handler.clone(),
            can_open: r.can_open,
            can_list: r.can_list,
            can_stream: r.can_stream,
            priority: r.priority,
            kwargs: r.kwargs.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedItem {
    pub id: String,
    pub attributes: Attributes,
    pub readable: bool,
    pub expandable: bool,
    pub streamable: bool,
    pub nested_items: Option<Vec<SerializedItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<SerializedRoute>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_requires_flag_and_size() {
        let mut item = Item::new("file");
        assert!(!item.is_readable());
        item.readable = true;
        assert!(!item.is_readable());
        item.attributes.insert("size".into(), Value::from(500));
        assert!(item.is_readable());
        assert!(!item.is_listable());
    }

    #[test]
    fn serialize_unserialize_roundtrip() {
        let mut item = Item::new("file");
        item.readable = true;
        item.attributes.insert("size".into(), Value::from(500));
        item.attributes.insert("date".into(), Value::from(1_500_000_000));
        item.add_route(Route::new("dummy_file", true, false, false));

        let serialized = item.serialize(true);
        let restored = Item::unserialize(&serialized, &[]);
        assert_eq!(item, restored);
    }

    #[test]
    fn route_is_ignored_when_no_capability_matches() {
        let mut item = Item::new("dir");
        item.expandable = true;
        item.add_route(Route::new("http", true, false, false)); // can_open but not readable
        assert!(item.routes.is_empty());
        item.add_route(Route::new("http", false, true, false)); // can_list and listable
        assert_eq!(item.routes.len(), 1);
    }

    #[test]
    fn route_dedup_keeps_first() {
        let mut item = Item::new("file");
        item.readable = true;
        item.attributes.insert("size".into(), Value::from(1));
        item.add_route(Route::new("http", true, false, false).with_priority(5));
        item.add_route(Route::new("http", true, false, false).with_priority(5));
        item.add_route(Route::new("http", true, false, false).with_priority(9));
        assert_eq!(item.routes.len(), 2);
        assert_eq!(item.routes[0].priority, 5);
    }

    #[test]
    fn merge_no_op_on_different_ids() {
        let mut a = Item::new("a");
        a.attributes.insert("x".into(), Value::from(1));
        let b = Item::new("b");
        a.merge(&b);
        assert_eq!(a.attributes.get("x"), Some(&Value::from(1)));
    }

    #[test]
    fn merge_takes_max_of_size_date_modified() {
        let mut a = Item::new("f");
        a.attributes.insert("size".into(), Value::from(10));
        let mut b = Item::new("f");
        b.attributes.insert("size".into(), Value::from(99));
        a.merge(&b);
        assert_eq!(a.attributes.get("size"), Some(&Value::from(99)));
    }

    #[test]
    fn merge_takes_other_when_self_falsy() {
        let mut a = Item::new("f");
        a.attributes.insert("filename".into(), Value::from(""));
        let mut b = Item::new("f");
        b.attributes.insert("filename".into(), Value::from("movie.mkv"));
        a.merge(&b);
        assert_eq!(a.attributes.get("filename"), Some(&Value::from("movie.mkv")));
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = Item::new("f");
        a.readable = true;
        a.attributes.insert("size".into(), Value::from(8));
        a.add_route(Route::new("dummy", true, false, false));
        let before = a.serialize(true);
        let clone = a.clone();
        a.merge(&clone);
        let after = a.serialize(true);
        assert_eq!(
            serde_json::to_value(&before).unwrap(),
            serde_json::to_value(&after).unwrap()
        );
    }

    #[test]
    fn merge_children_by_id_union() {
        let mut a = Item::new("dir");
        a.children = Some(vec![Item::new("x")]);
        let mut b = Item::new("dir");
        let mut y = Item::new("y");
        y.attributes.insert("size".into(), Value::from(5));
        b.children = Some(vec![y]);
        a.merge(&b);
        let children = a.children.unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.parent_id.as_deref() == Some("dir")));
    }

    #[test]
    fn capability_flags_or_on_merge() {
        let mut a = Item::new("f");
        let mut b = Item::new("f");
        b.streamable = true;
        a.merge(&b);
        assert!(a.streamable);
    }
}
