use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use turnloom_domain::{Event, Result};

/// A named unit of fire-and-forget work a `post_call` hook wants to run
/// past the end of the turn that spawned it (e.g. summarizing the thread
/// in the background). The orchestrator hands this to its own task
/// registry under `name`, replacing any task already running under the
/// same name.
pub struct BackgroundJob {
    pub name: String,
    pub future: Pin<Box<dyn Future<Output = ()> + Send>>,
}

impl BackgroundJob {
    pub fn new<F>(name: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            future: Box::pin(future),
        }
    }
}

/// Mutable call parameters threaded through `pre_call` middleware. Each
/// middleware plugin sees the result of the ones that ran before it and
/// may mutate any field in place, including rewriting the outgoing user
/// message via `new_message`; the orchestrator reads the post-middleware
/// values once the chain completes. `user_id`/`thread_id`/
/// `turn_correlation_id` are read-only correlation context, carried so a
/// middleware can scope decisions (or progress lines) to the right
/// thread without the hook needing separate arguments for them.
#[derive(Debug, Clone)]
pub struct CallParams {
    pub user_id: String,
    pub thread_id: String,
    pub turn_correlation_id: String,
    pub new_message: String,
    pub model_name: String,
    pub system_prompt_text: String,
    pub tool_schemas: Vec<serde_json::Value>,
}

/// Lines a `pre_call` hook wants streamed to the client as `tool_update`
/// events, bound to a synthetic call id scoped to the emitting plugin
/// (see [`FunctionPlugin::name`]), before the model call it's preparing
/// for starts. `pre_call` pushes into this sink in emission order rather
/// than returning a stream, since the hook itself stays a plain async
/// fn; the orchestrator drains it right after each plugin runs so lines
/// reach the client immediately instead of batching until the round ends.
pub type ProgressSink = Vec<String>;

/// A `function`-role (middleware) plugin. All three hooks are optional;
/// the default implementation is a no-op pass-through, so a plugin that
/// only cares about one hook doesn't have to stub the other two.
#[async_trait]
pub trait FunctionPlugin: Send + Sync {
    fn priority(&self) -> super::Priority {
        0
    }

    /// Stable identifier for this plugin, used to scope the synthetic
    /// call id its `pre_call` progress lines are bound to. Defaults to a
    /// generic name; a plugin that actually emits progress should
    /// override it so concurrent middleware don't collide on one id.
    fn name(&self) -> &str {
        "function"
    }

    /// May rewrite `params` in place — including `new_message`, the
    /// outgoing user message for this round — and push any UI-visible
    /// progress lines onto `progress`.
    async fn pre_call(&self, _params: &mut CallParams, _progress: &mut ProgressSink) -> Result<()> {
        Ok(())
    }

    /// Filters (or transforms) one outgoing event. May return more than
    /// one: a filter can both pass through a transformed version of
    /// `event` and fan out auxiliary events (e.g. a notice), which are
    /// forwarded alongside it. Returning an empty vec drops the event.
    async fn filter_stream(&self, event: Event) -> Result<Vec<Event>> {
        Ok(vec![event])
    }

    /// Runs after a model round finalizes. May return a [`BackgroundJob`]
    /// to hand off to the orchestrator's task registry; `None` means no
    /// background work is needed.
    async fn post_call(&self, _params: &CallParams) -> Result<Option<BackgroundJob>> {
        Ok(None)
    }
}

/// Sort `function` plugins for the `pre_call` hook: highest priority runs
/// first.
pub fn sort_for_pre_call<T>(plugins: &mut [(super::Priority, T)]) {
    plugins.sort_by(|a, b| b.0.cmp(&a.0));
}

/// Sort `function` plugins for `filter_stream`/`post_call`: lowest
/// priority runs first, so transforms layer outwards.
pub fn sort_for_post_hooks<T>(plugins: &mut [(super::Priority, T)]) {
    plugins.sort_by(|a, b| a.0.cmp(&b.0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_call_order_is_highest_first() {
        let mut plugins = vec![(1u32, "low"), (5u32, "high"), (3u32, "mid")];
        sort_for_pre_call(&mut plugins);
        let order: Vec<_> = plugins.iter().map(|(_, n)| *n).collect();
        assert_eq!(order, vec!["high", "mid", "low"]);
    }

    #[test]
    fn post_hook_order_is_lowest_first() {
        let mut plugins = vec![(1u32, "low"), (5u32, "high"), (3u32, "mid")];
        sort_for_post_hooks(&mut plugins);
        let order: Vec<_> = plugins.iter().map(|(_, n)| *n).collect();
        assert_eq!(order, vec!["low", "mid", "high"]);
    }

    struct Rewriter;

    #[async_trait]
    impl FunctionPlugin for Rewriter {
        fn name(&self) -> &str {
            "rewriter"
        }

        async fn pre_call(&self, params: &mut CallParams, progress: &mut ProgressSink) -> Result<()> {
            progress.push(format!("rewriting message for {}", params.thread_id));
            params.new_message = params.new_message.to_uppercase();
            Ok(())
        }
    }

    fn params() -> CallParams {
        CallParams {
            user_id: "u1".to_string(),
            thread_id: "t1".to_string(),
            turn_correlation_id: "corr-1".to_string(),
            new_message: "hello".to_string(),
            model_name: "gpt".to_string(),
            system_prompt_text: String::new(),
            tool_schemas: Vec::new(),
        }
    }

    #[tokio::test]
    async fn pre_call_can_rewrite_the_message_and_emit_progress() {
        let mut params = params();
        let mut progress = ProgressSink::new();
        Rewriter.pre_call(&mut params, &mut progress).await.unwrap();
        assert_eq!(params.new_message, "HELLO");
        assert_eq!(progress, vec!["rewriting message for t1"]);
    }

    struct NoticeAppender;

    #[async_trait]
    impl FunctionPlugin for NoticeAppender {
        async fn filter_stream(&self, event: Event) -> Result<Vec<Event>> {
            let notice = Event::error(
                event.data.turn_correlation_id.as_deref().unwrap_or_default(),
                "notice",
            );
            Ok(vec![event, notice])
        }
    }

    #[tokio::test]
    async fn filter_stream_can_fan_out_auxiliary_events() {
        let input = Event::message_tokens("corr-1", "hi");
        let out = NoticeAppender.filter_stream(input).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].data.message.as_deref(), Some("notice"));
    }
}
