//! The `output` object: factories for result values.

use rhai::{Array, Dynamic, Engine};

use crate::result::{ResultItem, Severity};

/// Result factory handed to verification scripts. Stateless; results are
/// collected from the entry point's return value.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputApi;

fn build(severity: Severity, message: &str, items: Array, long_text: &str) -> ResultItem {
    ResultItem::new(severity, message)
        .with_items(items.iter().map(ToString::to_string).collect())
        .with_long_text(long_text)
}

fn register_factory(engine: &mut Engine, name: &str, severity: Severity) {
    engine
        .register_fn(name, move |_: &mut OutputApi, message: &str| {
            build(severity, message, Array::new(), "")
        })
        .register_fn(name, move |_: &mut OutputApi, message: &str, items: Array| {
            build(severity, message, items, "")
        })
        .register_fn(
            name,
            move |_: &mut OutputApi, message: &str, items: Array, long_text: &str| {
                build(severity, message, items, long_text)
            },
        );
}

/// Register the output object and the result type it produces.
pub fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<OutputApi>("OutputApi")
        .register_type_with_name::<ResultItem>("ResultItem")
        .register_get("message", |r: &mut ResultItem| r.message.clone())
        .register_get("items", |r: &mut ResultItem| {
            r.items.iter().cloned().map(Dynamic::from).collect::<Array>()
        })
        .register_fn("is_fatal", |r: &mut ResultItem| r.is_fatal())
        .register_fn("should_prompt", |r: &mut ResultItem| r.should_prompt())
        .register_fn("to_string", |r: &mut ResultItem| r.message.clone());

    register_factory(engine, "error", Severity::Fatal);
    register_factory(engine, "prompt_warning", Severity::PromptWarning);
    register_factory(engine, "notify", Severity::Notify);
}
