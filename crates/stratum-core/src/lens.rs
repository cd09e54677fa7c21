//! Path addressing into nested documents
//!
//! A [`Lens`] is an ordered list of [`Step`]s: mapping keys, sequence indices,
//! or the [`Step::All`] wildcard that fans out over every element of a
//! sequence. Lenses never mutate their input; every write returns a new tree.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stratum_core::{lens, Step, Update};
//!
//! let doc = json!({"containers": [{"image": "a:1"}, {"image": "b:1"}]});
//! let images = lens!["containers", Step::All, "image"];
//!
//! let out = images
//!     .update(&doc, |image| match image.and_then(|v| v.as_str()) {
//!         Some("a:1") => Update::Set(json!("a:2")),
//!         _ => Update::Keep,
//!     })
//!     .unwrap();
//!
//! assert_eq!(out["containers"][0]["image"], "a:2");
//! assert_eq!(out["containers"][1]["image"], "b:1");
//! assert_eq!(doc["containers"][0]["image"], "a:1");
//! ```

use std::fmt;

use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};

/// One step of a lens path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    /// Mapping key
    Key(String),
    /// Sequence index
    Index(usize),
    /// Every element of a sequence
    All,
}

impl From<&str> for Step {
    fn from(key: &str) -> Self {
        Step::Key(key.to_string())
    }
}

impl From<String> for Step {
    fn from(key: String) -> Self {
        Step::Key(key)
    }
}

impl From<usize> for Step {
    fn from(index: usize) -> Self {
        Step::Index(index)
    }
}

/// Build a [`Lens`] from heterogeneous steps
#[macro_export]
macro_rules! lens {
    ($($step:expr),* $(,)?) => {
        $crate::Lens::new(vec![$($crate::Step::from($step)),*])
    };
}

/// Decision returned by an `update` callback for one matched location
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Leave the location untouched
    Keep,
    /// Replace (or create) the value at the location
    Set(JsonValue),
}

/// Result of [`Lens::get`]
#[derive(Debug, Clone, PartialEq)]
pub enum Focus<'a> {
    /// The path does not resolve
    NotFound,
    /// A single value (lens without wildcard)
    One(&'a JsonValue),
    /// Every value reached through a wildcard step
    Many(Vec<&'a JsonValue>),
}

impl<'a> Focus<'a> {
    pub fn is_found(&self) -> bool {
        !matches!(self, Focus::NotFound)
    }

    /// The single focused value, or the first of many
    pub fn first(self) -> Option<&'a JsonValue> {
        match self {
            Focus::NotFound => None,
            Focus::One(value) => Some(value),
            Focus::Many(values) => values.into_iter().next(),
        }
    }

    pub fn into_vec(self) -> Vec<&'a JsonValue> {
        match self {
            Focus::NotFound => Vec::new(),
            Focus::One(value) => vec![value],
            Focus::Many(values) => values,
        }
    }
}

/// Result of [`Lens::remove`]
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    /// The document with every matched location removed
    pub document: JsonValue,
    /// Removed values, in traversal order
    pub removed: Vec<JsonValue>,
    /// Number of addressed locations that held no value
    pub missing: usize,
}

/// A path into a nested mapping/sequence tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Lens {
    steps: Vec<Step>,
}

impl Lens {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Parse a `/`-separated pointer
    ///
    /// `~1` unescapes to `/` and `~0` to `~`; purely numeric segments become
    /// indices and the segment `:all` becomes the wildcard.
    pub fn from_pointer(pointer: &str) -> Result<Self> {
        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(CoreError::invalid_path(pointer, "path must start with '/'"));
        };

        let steps = rest
            .split('/')
            .map(|segment| {
                let segment = segment.replace("~1", "/").replace("~0", "~");
                if segment == ":all" {
                    Step::All
                } else if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                    segment
                        .parse()
                        .map(Step::Index)
                        .unwrap_or(Step::Key(segment))
                } else {
                    Step::Key(segment)
                }
            })
            .collect();

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Whether any step is [`Step::All`]
    pub fn has_wildcard(&self) -> bool {
        self.steps.contains(&Step::All)
    }

    /// Read the value(s) at this path
    pub fn get<'a>(&self, doc: &'a JsonValue) -> Focus<'a> {
        let mut found = Vec::new();
        get_in(doc, &self.steps, &mut found);

        if !self.has_wildcard() {
            return found.pop().map_or(Focus::NotFound, Focus::One);
        }

        let prefix_len = self
            .steps
            .iter()
            .position(|s| *s == Step::All)
            .unwrap_or(self.steps.len());
        let mut prefix = Vec::new();
        get_in(doc, &self.steps[..prefix_len], &mut prefix);

        if prefix.is_empty() {
            Focus::NotFound
        } else {
            Focus::Many(found)
        }
    }

    /// Set `value` at this path, returning the new tree
    ///
    /// Every intermediate segment must already exist; wildcards are rejected.
    pub fn put(&self, doc: &JsonValue, value: JsonValue) -> Result<JsonValue> {
        if self.has_wildcard() {
            return Err(CoreError::invalid_path(self, "put does not accept wildcard steps"));
        }

        let Some((last, parents)) = self.steps.split_last() else {
            return Ok(value);
        };

        let mut out = doc.clone();
        let mut node = &mut out;
        for (depth, step) in parents.iter().enumerate() {
            let next = match step {
                Step::Key(key) => node.get_mut(key.as_str()),
                Step::Index(index) => node.get_mut(*index),
                Step::All => None,
            };
            node = next.ok_or_else(|| {
                CoreError::invalid_path(self, format!("segment {} does not exist", depth + 1))
            })?;
        }

        match last {
            Step::Key(key) => {
                let map = node
                    .as_object_mut()
                    .ok_or_else(|| CoreError::invalid_path(self, "parent is not a mapping"))?;
                map.insert(key.clone(), value);
            }
            Step::Index(index) => {
                let items = node
                    .as_array_mut()
                    .ok_or_else(|| CoreError::invalid_path(self, "parent is not a sequence"))?;
                if *index < items.len() {
                    items[*index] = value;
                } else if *index == items.len() {
                    items.push(value);
                } else {
                    return Err(CoreError::invalid_path(
                        self,
                        format!("index {} out of bounds (length {})", index, items.len()),
                    ));
                }
            }
            Step::All => {
                return Err(CoreError::invalid_path(self, "put does not accept wildcard steps"));
            }
        }

        Ok(out)
    }

    /// Conditionally rewrite every location matched by this path
    ///
    /// The callback sees `None` for an addressed location that holds no value;
    /// returning [`Update::Set`] there creates it, along with any missing
    /// intermediate mappings. A wildcard over a missing sequence matches
    /// nothing.
    pub fn update<F>(&self, doc: &JsonValue, mut f: F) -> Result<JsonValue>
    where
        F: FnMut(Option<&JsonValue>) -> Update,
    {
        self.try_update(doc, |current| Ok::<_, CoreError>(f(current)))
    }

    /// Fallible form of [`Lens::update`]; the first callback error aborts
    pub fn try_update<F, E>(&self, doc: &JsonValue, mut f: F) -> std::result::Result<JsonValue, E>
    where
        F: FnMut(Option<&JsonValue>) -> std::result::Result<Update, E>,
        E: From<CoreError>,
    {
        let mut out = doc.clone();
        update_in(&mut out, &self.steps, self, &mut f)?;
        Ok(out)
    }

    /// Remove every location matched by this path
    pub fn remove(&self, doc: &JsonValue) -> Result<Removal> {
        let mut removal = Removal {
            document: doc.clone(),
            removed: Vec::new(),
            missing: 0,
        };
        remove_in(
            &mut removal.document,
            &self.steps,
            self,
            &mut removal.removed,
            &mut removal.missing,
        )?;
        Ok(removal)
    }
}

impl fmt::Display for Lens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return write!(f, "/");
        }
        for step in &self.steps {
            match step {
                Step::Key(key) => write!(f, "/{}", key.replace('~', "~0").replace('/', "~1"))?,
                Step::Index(index) => write!(f, "/{}", index)?,
                Step::All => write!(f, "/:all")?,
            }
        }
        Ok(())
    }
}

fn get_in<'a>(node: &'a JsonValue, steps: &[Step], found: &mut Vec<&'a JsonValue>) {
    let Some((step, rest)) = steps.split_first() else {
        found.push(node);
        return;
    };

    match step {
        Step::Key(key) => {
            if let Some(child) = node.get(key.as_str()) {
                get_in(child, rest, found);
            }
        }
        Step::Index(index) => {
            if let Some(child) = node.get(*index) {
                get_in(child, rest, found);
            }
        }
        Step::All => {
            if let Some(items) = node.as_array() {
                for item in items {
                    get_in(item, rest, found);
                }
            }
        }
    }
}

fn update_in<F, E>(
    node: &mut JsonValue,
    steps: &[Step],
    lens: &Lens,
    f: &mut F,
) -> std::result::Result<(), E>
where
    F: FnMut(Option<&JsonValue>) -> std::result::Result<Update, E>,
    E: From<CoreError>,
{
    let Some((step, rest)) = steps.split_first() else {
        if let Update::Set(value) = f(Some(node))? {
            *node = value;
        }
        return Ok(());
    };

    // An explicit null behaves like an absent subtree
    if node.is_null() {
        if let Some(value) = vivify(steps, lens, f)? {
            *node = value;
        }
        return Ok(());
    }

    match step {
        Step::Key(key) => {
            let map = node.as_object_mut().ok_or_else(|| {
                CoreError::invalid_path(lens, format!("expected a mapping at '{}'", key))
            })?;
            match map.get_mut(key) {
                Some(child) => update_in(child, rest, lens, f),
                None => {
                    if let Some(value) = vivify(rest, lens, f)? {
                        map.insert(key.clone(), value);
                    }
                    Ok(())
                }
            }
        }
        Step::Index(index) => {
            let items = node.as_array_mut().ok_or_else(|| {
                CoreError::invalid_path(lens, format!("expected a sequence at index {}", index))
            })?;
            if *index < items.len() {
                return update_in(&mut items[*index], rest, lens, f);
            }
            let Some(value) = vivify(rest, lens, f)? else {
                return Ok(());
            };
            if *index == items.len() {
                items.push(value);
                Ok(())
            } else {
                Err(CoreError::invalid_path(
                    lens,
                    format!("index {} out of bounds (length {})", index, items.len()),
                )
                .into())
            }
        }
        Step::All => {
            let items = node.as_array_mut().ok_or_else(|| {
                CoreError::invalid_path(lens, "wildcard step expects a sequence")
            })?;
            for item in items.iter_mut() {
                update_in(item, rest, lens, f)?;
            }
            Ok(())
        }
    }
}

/// Ask the callback about an absent location and build the subtree to insert
fn vivify<F, E>(
    rest: &[Step],
    lens: &Lens,
    f: &mut F,
) -> std::result::Result<Option<JsonValue>, E>
where
    F: FnMut(Option<&JsonValue>) -> std::result::Result<Update, E>,
    E: From<CoreError>,
{
    if rest.contains(&Step::All) {
        return Ok(None);
    }

    let Update::Set(mut value) = f(None)? else {
        return Ok(None);
    };

    for step in rest.iter().rev() {
        value = match step {
            Step::Key(key) => {
                let mut map = Map::new();
                map.insert(key.clone(), value);
                JsonValue::Object(map)
            }
            Step::Index(0) => JsonValue::Array(vec![value]),
            _ => {
                return Err(CoreError::invalid_path(
                    lens,
                    "cannot create an intermediate sequence element",
                )
                .into());
            }
        };
    }

    Ok(Some(value))
}

fn remove_in(
    node: &mut JsonValue,
    steps: &[Step],
    lens: &Lens,
    removed: &mut Vec<JsonValue>,
    missing: &mut usize,
) -> Result<()> {
    let Some((step, rest)) = steps.split_first() else {
        return Err(CoreError::invalid_path(lens, "cannot remove the document root"));
    };

    if rest.is_empty() {
        let is_null = node.is_null();
        match step {
            Step::Key(key) => match node.as_object_mut() {
                Some(map) => match map.shift_remove(key) {
                    Some(value) => removed.push(value),
                    None => *missing += 1,
                },
                None if is_null => *missing += 1,
                None => {
                    return Err(CoreError::invalid_path(lens, "parent is not a mapping"));
                }
            },
            Step::Index(index) => match node.as_array_mut() {
                Some(items) if *index < items.len() => removed.push(items.remove(*index)),
                Some(_) => *missing += 1,
                None if is_null => *missing += 1,
                None => {
                    return Err(CoreError::invalid_path(lens, "parent is not a sequence"));
                }
            },
            Step::All => {
                if let Some(items) = node.as_array_mut() {
                    removed.extend(items.drain(..));
                }
            }
        }
        return Ok(());
    }

    let child = match step {
        Step::Key(key) => node.get_mut(key.as_str()),
        Step::Index(index) => node.get_mut(*index),
        Step::All => {
            if let Some(items) = node.as_array_mut() {
                for item in items.iter_mut() {
                    remove_in(item, rest, lens, removed, missing)?;
                }
            }
            return Ok(());
        }
    };

    match child {
        Some(child) => remove_in(child, rest, lens, removed, missing),
        None => {
            if !rest.contains(&Step::All) {
                *missing += 1;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment() -> JsonValue {
        json!({
            "kind": "Deployment",
            "spec": {
                "template": {
                    "spec": {
                        "containers": [
                            {"name": "a", "image": "a:1"},
                            {"name": "b", "image": "b:1"}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_get_fixed_path() {
        let doc = deployment();
        let focus = lens!["spec", "template", "spec", "containers", 1usize, "name"].get(&doc);
        assert_eq!(focus, Focus::One(&json!("b")));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let doc = deployment();
        assert_eq!(lens!["metadata", "name"].get(&doc), Focus::NotFound);
        assert_eq!(lens!["spec", "replicas"].get(&doc), Focus::NotFound);
        assert_eq!(lens!["spec", "x", Step::All].get(&doc), Focus::NotFound);
    }

    #[test]
    fn test_get_wildcard_collects_all() {
        let doc = deployment();
        let images = lens!["spec", "template", "spec", "containers", Step::All, "image"]
            .get(&doc)
            .into_vec();
        assert_eq!(images, vec![&json!("a:1"), &json!("b:1")]);
    }

    #[test]
    fn test_put_sets_value_without_touching_input() {
        let doc = json!({"metadata": {"name": "x"}});
        let out = lens!["metadata", "namespace"].put(&doc, json!("prod")).unwrap();
        assert_eq!(out["metadata"]["namespace"], "prod");
        assert!(doc["metadata"].get("namespace").is_none());
    }

    #[test]
    fn test_put_requires_intermediate_segments() {
        let doc = json!({"kind": "ConfigMap"});
        let err = lens!["metadata", "namespace"].put(&doc, json!("prod")).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn test_put_rejects_wildcard() {
        let doc = deployment();
        let err = lens!["spec", Step::All].put(&doc, json!(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn test_put_sequence_index_and_append() {
        let doc = json!({"items": [1, 2]});
        let out = lens!["items", 0usize].put(&doc, json!(9)).unwrap();
        assert_eq!(out["items"], json!([9, 2]));
        let out = lens!["items", 2usize].put(&doc, json!(3)).unwrap();
        assert_eq!(out["items"], json!([1, 2, 3]));
        assert!(lens!["items", 5usize].put(&doc, json!(3)).is_err());
    }

    #[test]
    fn test_update_keep_leaves_element_identical() {
        let doc = deployment();
        let out = lens!["spec", "template", "spec", "containers", Step::All, "image"]
            .update(&doc, |current| match current.and_then(JsonValue::as_str) {
                Some("a:1") => Update::Set(json!("a:2")),
                _ => Update::Keep,
            })
            .unwrap();

        let containers = &out["spec"]["template"]["spec"]["containers"];
        assert_eq!(containers[0]["image"], "a:2");
        assert_eq!(
            containers[1],
            deployment()["spec"]["template"]["spec"]["containers"][1]
        );
    }

    #[test]
    fn test_update_creates_missing_mappings() {
        let doc = json!({"kind": "SealedSecret", "spec": {"template": {"type": "Opaque"}}});
        let out = lens!["spec", "template", "metadata", "namespace"]
            .update(&doc, |_| Update::Set(json!("staging")))
            .unwrap();
        assert_eq!(out["spec"]["template"]["metadata"]["namespace"], "staging");
        assert_eq!(out["spec"]["template"]["type"], "Opaque");
    }

    #[test]
    fn test_update_keep_on_missing_creates_nothing() {
        let doc = json!({"kind": "ConfigMap"});
        let out = lens!["metadata", "name"].update(&doc, |_| Update::Keep).unwrap();
        assert_eq!(out, doc);
    }

    #[test]
    fn test_update_wildcard_over_missing_sequence_matches_nothing() {
        let doc = json!({"kind": "ClusterRoleBinding"});
        let mut calls = 0;
        let out = lens!["subjects", Step::All, "namespace"]
            .update(&doc, |_| {
                calls += 1;
                Update::Set(json!("x"))
            })
            .unwrap();
        assert_eq!(calls, 0);
        assert_eq!(out, doc);
    }

    #[test]
    fn test_update_treats_null_as_absent() {
        let doc = json!({"kind": "ConfigMap", "metadata": null});
        let out = lens!["metadata", "namespace"]
            .update(&doc, |current| {
                assert!(current.is_none());
                Update::Set(json!("ns"))
            })
            .unwrap();
        assert_eq!(out["metadata"], json!({"namespace": "ns"}));
    }

    #[test]
    fn test_try_update_propagates_callback_error() {
        let doc = json!({"a": 1});
        let result: Result<JsonValue> = lens!["a"].try_update(&doc, |_| {
            Err(CoreError::invalid_path("/a", "refused"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_update_type_mismatch_is_invalid_path() {
        let doc = json!({"spec": "scalar"});
        let err = lens!["spec", "x"].update(&doc, |_| Update::Keep).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPath { .. }));
    }

    #[test]
    fn test_remove_sequence_element_shifts_later_items() {
        let doc = json!({"items": ["a", "b", "c"]});
        let removal = lens!["items", 1usize].remove(&doc).unwrap();
        assert_eq!(removal.document["items"], json!(["a", "c"]));
        assert_eq!(removal.removed, vec![json!("b")]);
        assert_eq!(removal.missing, 0);
    }

    #[test]
    fn test_remove_mapping_key_preserves_order() {
        let doc = json!({"a": 1, "b": 2, "c": 3});
        let removal = lens!["a"].remove(&doc).unwrap();
        let keys: Vec<_> = removal.document.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_remove_counts_missing() {
        let doc = json!({"a": {"b": 1}});
        assert_eq!(lens!["a", "c"].remove(&doc).unwrap().missing, 1);
        assert_eq!(lens!["x", "c"].remove(&doc).unwrap().missing, 1);
    }

    #[test]
    fn test_remove_under_null_or_scalar_parent() {
        let doc = json!({"a": null, "s": "text"});
        assert_eq!(lens!["a", "k"].remove(&doc).unwrap().missing, 1);
        assert_eq!(lens!["a", 0usize].remove(&doc).unwrap().missing, 1);
        assert!(matches!(lens!["s", "k"].remove(&doc), Err(CoreError::InvalidPath { .. })));
        assert!(matches!(lens!["s", 0usize].remove(&doc), Err(CoreError::InvalidPath { .. })));
    }

    #[test]
    fn test_from_pointer() {
        let lens = Lens::from_pointer("/metadata/annotations/example.com~1team/0/:all").unwrap();
        assert_eq!(
            lens.steps(),
            &[
                Step::from("metadata"),
                Step::from("annotations"),
                Step::from("example.com/team"),
                Step::Index(0),
                Step::All,
            ]
        );
        assert_eq!(lens.to_string(), "/metadata/annotations/example.com~1team/0/:all");
        assert!(Lens::from_pointer("metadata/name").is_err());
    }
}
