//! Construction of the script engine shared by every script in a run.

use rhai::{Engine, ImmutableString};
use tracing::{debug, info};

use super::{input_api, output_api};

/// Build an engine with the input/output API registered.
///
/// `max_operations` bounds each evaluation (0 = unlimited).
pub fn build_engine(max_operations: u64) -> Engine {
    let mut engine = Engine::new();

    if max_operations > 0 {
        engine.set_max_operations(max_operations);
    }
    // The built-in nesting limits are lower in debug builds; ordinary check
    // expressions must compile the same under every profile.
    engine.set_max_expr_depths(0, 0);

    engine.on_print(|text| info!(target: "presubmit::script", "{text}"));
    engine.on_debug(|text, source, pos| {
        debug!(target: "presubmit::script", source = source.unwrap_or(""), position = %pos, "{text}");
    });

    // `!change.FOO` reads naturally whether the tag is absent or empty.
    engine
        .register_fn("!", |_: ()| true)
        .register_fn("!", |s: ImmutableString| s.is_empty());

    input_api::register(&mut engine);
    output_api::register(&mut engine);
    engine
}
