//! View configuration and template function maps.
//!
//! A view names the template set to render; the template field selects a
//! named template within it, defaulting to the view name. Function maps are
//! compiled into the environment and can be overridden per route.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::{Rest, Value};
use minijinja::Environment;

/// A template function callable from views. The implementation is shared;
/// only the map that holds it is copied per request.
pub type ViewFunction =
    Arc<dyn Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync>;

/// Map of template function name to implementation.
pub type FunctionMap = BTreeMap<String, ViewFunction>;

/// View selection: which template set to render, and which named template
/// within it.
#[derive(Clone, Default)]
pub struct View {
    /// Template-set name; resolves to `<template_dir>/<view>`.
    pub view: String,
    /// Named template to execute; defaults to `view` when empty.
    pub template: String,
    /// Per-view template function overrides.
    pub functions: FunctionMap,
}

impl View {
    pub fn named(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            ..Self::default()
        }
    }

    /// Field-level merge: non-empty fields of `over` replace this view's.
    pub fn merged(&self, over: &View) -> View {
        let mut merged = self.clone();
        if !over.view.is_empty() {
            merged.view = over.view.clone();
        }
        if !over.template.is_empty() {
            merged.template = over.template.clone();
        }
        if !over.functions.is_empty() {
            merged.functions = over.functions.clone();
        }
        merged
    }

    /// Copy handed to each request, so handler mutation of the function map
    /// cannot leak into other requests or the server default.
    pub fn per_request_copy(&self) -> View {
        self.clone()
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("view", &self.view)
            .field("template", &self.template)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Register the functions available to every view.
pub(crate) fn default_functions(env: &mut Environment<'static>) {
    env.add_function("make_map", make_map);
}

/// Build a map from alternating key/value arguments:
/// `make_map("a", 1, "b", 2)` renders as `{a: 1, b: 2}`.
fn make_map(args: Rest<Value>) -> Result<Value, minijinja::Error> {
    let mut out = BTreeMap::new();
    let mut pairs = args.0.iter();
    while let Some(key) = pairs.next() {
        let value = pairs.next().cloned().unwrap_or_default();
        out.insert(key.to_string(), value);
    }
    Ok(Value::from_serialize(&out))
}

/// Register a function map onto an environment.
pub(crate) fn apply_functions(env: &mut Environment<'static>, functions: &FunctionMap) {
    for (name, func) in functions {
        let func = func.clone();
        env.add_function(name.clone(), move |args: Rest<Value>| func(&args.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(value: &'static str) -> ViewFunction {
        Arc::new(move |_args| Ok(Value::from(value)))
    }

    #[test]
    fn merge_is_field_level() {
        let base = View {
            view: "home".into(),
            template: "body".into(),
            functions: FunctionMap::new(),
        };
        let over = View::named("about");
        let merged = base.merged(&over);
        assert_eq!(merged.view, "about");
        // The override left template empty, so the default survives.
        assert_eq!(merged.template, "body");
    }

    #[test]
    fn empty_override_keeps_defaults() {
        let base = View::named("home");
        let merged = base.merged(&View::default());
        assert_eq!(merged.view, "home");
    }

    #[test]
    fn per_request_copy_isolates_function_map() {
        let mut base = View::named("home");
        base.functions.insert("greet".into(), constant("hi"));

        let mut copy = base.per_request_copy();
        copy.functions.insert("leak".into(), constant("nope"));
        copy.functions.remove("greet");

        assert!(base.functions.contains_key("greet"));
        assert!(!base.functions.contains_key("leak"));
    }

    #[test]
    fn make_map_pairs_arguments() {
        let mut env = Environment::new();
        default_functions(&mut env);
        env.add_template("t", "{{ make_map('a', 1, 'b', 2)['b'] }}")
            .unwrap();
        let out = env.get_template("t").unwrap().render(()).unwrap();
        assert_eq!(out, "2");
    }

    #[test]
    fn applied_functions_are_callable() {
        let mut env = Environment::new();
        let mut functions = FunctionMap::new();
        functions.insert("greet".into(), constant("hello"));
        apply_functions(&mut env, &functions);
        env.add_template("t", "{{ greet() }}").unwrap();
        let out = env.get_template("t").unwrap().render(()).unwrap();
        assert_eq!(out, "hello");
    }
}
