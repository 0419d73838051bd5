//! Before/after hooks for intercepted calls

use std::fmt::Debug;
use std::sync::Arc;

use crate::sink::TextSink;

/// Invoked with the rendered signature before delegating
pub type BeforeHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Invoked with the rendered signature and the result after a successful call
pub type AfterHook = Arc<dyn Fn(&str, &dyn Debug) + Send + Sync>;

/// Hooks reporting `Calling name(signature)` and `name returned value`
pub fn trace<S>(name: impl Into<String>, sink: S) -> (BeforeHook, AfterHook)
where
    S: TextSink + 'static,
{
    let name: Arc<str> = Arc::from(name.into());
    let sink = Arc::new(sink);

    let before = {
        let (name, sink) = (name.clone(), sink.clone());
        Arc::new(move |signature: &str| sink.emit(&format!("Calling {}({})", name, signature)))
            as BeforeHook
    };
    let after = Arc::new(move |_signature: &str, value: &dyn Debug| {
        sink.emit(&format!("{} returned {:?}", name, value))
    }) as AfterHook;

    (before, after)
}

/// Hooks emitting fixed `BEFORE` / `AFTER` markers around each call
pub fn before_and_after<S>(sink: S) -> (BeforeHook, AfterHook)
where
    S: TextSink + 'static,
{
    let sink = Arc::new(sink);
    let before = {
        let sink = sink.clone();
        Arc::new(move |_: &str| sink.emit("BEFORE")) as BeforeHook
    };
    let after = Arc::new(move |_: &str, _: &dyn Debug| sink.emit("AFTER")) as AfterHook;
    (before, after)
}
