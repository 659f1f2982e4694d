//! The turn state machine: `INIT -> THREAD_READY -> USER_APPENDED ->
//! LOOP_ROUND -> (MODEL_STREAM | FAILED); MODEL_STREAM -> (TOOL_ROUND |
//! FINALIZE); TOOL_ROUND -> LOOP_ROUND (bounded); FINALIZE -> DONE`.
//!
//! [`TurnOrchestrator`] is the single [`MessageProcessor`] implementation.
//! It holds a `Weak<PluginRegistry>` rather than an `Arc` because the
//! registry holds the orchestrator back (as the `message_processor` role,
//! via [`Arc::new_cyclic`]) — an owning cycle would never be dropped.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::future::join_all;
use turnloom_domain::{
    BoxStream, ContextEntry, Error, Event, ModelChunk, Result, Role, ToolCall, TraceEvent,
};
use turnloom_plugins::{
    BackgroundJob, CallParams, FunctionPlugin, MessageProcessor, ModelPlugin, PluginRegistry,
    ProgressSink, SystemPromptPlugin, ToolRegistryHandle,
};
use turnloom_tools::R2RAdapter;

use crate::tasks::SharedBackgroundTasks;

/// Key a new thread's `system_prompt` field is set to when a caller
/// doesn't specify one — resolved through [`SystemPromptPlugin::get`] the
/// same as any other key.
pub const DEFAULT_SYSTEM_PROMPT_KEY: &str = "default";

/// Sentinel meaning "start a new thread" for [`MessageProcessor::process_turn`]'s
/// `thread_id` parameter, which is a plain `String` rather than `Option<String>`.
pub const NEW_THREAD_SENTINEL: &str = "";

pub struct TurnOrchestrator {
    registry: Weak<PluginRegistry>,
    max_tool_rounds: usize,
    tasks: SharedBackgroundTasks,
}

impl TurnOrchestrator {
    pub fn new(
        registry: Weak<PluginRegistry>,
        max_tool_rounds: usize,
        tasks: SharedBackgroundTasks,
    ) -> Self {
        Self {
            registry,
            max_tool_rounds,
            tasks,
        }
    }

    fn upgrade(&self) -> Result<Arc<PluginRegistry>> {
        self.registry
            .upgrade()
            .ok_or_else(|| Error::Other("plugin registry has been dropped".to_string()))
    }
}

#[async_trait]
impl MessageProcessor for TurnOrchestrator {
    async fn process_turn(
        &self,
        user_id: String,
        thread_id: String,
        user_message: String,
        model_override: Option<String>,
    ) -> Result<BoxStream<'static, Event>> {
        let registry = self.upgrade()?;
        let correlation_id = uuid::Uuid::new_v4().to_string();
        let max_tool_rounds = self.max_tool_rounds;
        let tasks = self.tasks.clone();

        let (tx, mut rx) = tokio::sync::mpsc::channel::<Event>(128);
        let worker_tx = tx.clone();

        tokio::spawn(async move {
            let outcome = run_turn(
                &registry,
                &correlation_id,
                &tasks,
                user_id,
                thread_id,
                user_message,
                model_override,
                max_tool_rounds,
                worker_tx.clone(),
            )
            .await;

            if let Err(e) = outcome {
                let _ = worker_tx
                    .send(Event::error(&correlation_id, e.kind()))
                    .await;
            }
            let _ = worker_tx.send(Event::stream_end(&correlation_id)).await;
        });

        let stream = async_stream::stream! {
            while let Some(event) = rx.recv().await {
                yield event;
            }
        };
        Ok(Box::pin(stream))
    }
}

/// Per-stream-index accumulator for a tool call still being assembled from
/// `ToolCallDelta` chunks. Keyed by `index` (not `id`, which may only
/// appear on the delta carrying the call's first fragment).
#[derive(Default)]
struct PendingCall {
    call_id: Option<String>,
    tool_name: String,
    arguments: String,
}

#[allow(clippy::too_many_arguments)]
async fn run_turn(
    registry: &Arc<PluginRegistry>,
    correlation_id: &str,
    tasks: &SharedBackgroundTasks,
    user_id: String,
    thread_id: String,
    user_message: String,
    model_override: Option<String>,
    max_tool_rounds: usize,
    tx: tokio::sync::mpsc::Sender<Event>,
) -> Result<()> {
    // ── Thread resolution ────────────────────────────────────────────
    let (thread_id, system_prompt_key, model_name) = if thread_id.is_empty() {
        let key = DEFAULT_SYSTEM_PROMPT_KEY.to_string();
        let model = model_override
            .clone()
            .ok_or_else(|| Error::Validation("model is required to start a new thread".into()))?;
        let new_id = registry
            .history
            .create_thread(&user_id, "New thread", &model, &key)?;
        (new_id, key, model)
    } else {
        let header = registry
            .history
            .get_thread(&user_id, &thread_id)?
            .ok_or_else(|| Error::NotFound(format!("thread {thread_id}")))?;
        let model = model_override.unwrap_or(header.model);
        (thread_id, header.system_prompt, model)
    };
    tx.send(Event::thread_id(correlation_id, &thread_id))
        .await
        .ok();

    // ── User message persistence ─────────────────────────────────────
    if registry
        .context
        .mutation_count(&user_id, &thread_id)
        .is_none()
    {
        registry
            .context
            .regenerate_context(&user_id, &thread_id)?;
    }
    registry.history.append_message(
        &user_id,
        &thread_id,
        Role::User,
        turnloom_domain::MessageKind::MessageText,
        &user_message,
        None,
        None,
    )?;
    let user_entry_id = registry.context.add_message(
        &user_id,
        &thread_id,
        ContextEntry::new(Role::User, &user_message),
        None,
    )?;

    let system_prompt_text = registry.system_prompt()?.get(&system_prompt_key)?;

    // `new_message` as seen by `pre_call` middleware. Only round 1 carries
    // an unresolved user-role entry to patch if a plugin rewrites it;
    // later rounds still run the chain (a middleware may care about
    // correlation context alone), but a mutation there has nothing to
    // apply to since the round's "new" text isn't a fresh history entry.
    let mut current_new_message = user_message.clone();

    let mut round = 0usize;
    loop {
        if round >= max_tool_rounds {
            TraceEvent::ToolLoopExhausted {
                turn_correlation_id: correlation_id.to_string(),
                max_rounds: max_tool_rounds,
            }
            .emit();
            return Err(Error::ToolLoopExhausted(max_tool_rounds));
        }
        round += 1;

        let model_plugin = registry.model(&model_name)?.clone();
        let tool_schemas = registry
            .tools()
            .map(|t| t.tool_schemas())
            .unwrap_or_default();

        let mut params = CallParams {
            user_id: user_id.clone(),
            thread_id: thread_id.clone(),
            turn_correlation_id: correlation_id.to_string(),
            new_message: current_new_message.clone(),
            model_name: model_name.clone(),
            system_prompt_text: system_prompt_text.clone(),
            tool_schemas,
        };
        for plugin in registry.functions_for_pre_call() {
            let mut progress = ProgressSink::new();
            plugin.pre_call(&mut params, &mut progress).await?;
            let call_id = format!("pre_call:{}", plugin.name());
            for line in progress {
                let event = Event::tool_update(correlation_id, &call_id, &line);
                emit_filtered(registry, &tx, event).await?;
            }
        }
        current_new_message = params.new_message.clone();
        if round == 1 && params.new_message != user_message {
            registry
                .context
                .update_message(&user_id, &thread_id, &user_entry_id, Some(&params.new_message))?;
        }

        let messages = registry
            .context
            .get_context(&user_id, &thread_id, true)?
            .ok_or_else(|| Error::NotFound(format!("thread {thread_id}")))?;

        let mut stream = model_plugin
            .stream(
                messages,
                &params.model_name,
                &params.system_prompt_text,
                params.tool_schemas.clone(),
            )
            .await?;

        let mut assistant_text = String::new();
        let mut thinking_text = String::new();
        let mut pending: HashMap<usize, PendingCall> = HashMap::new();
        let mut pending_order: Vec<usize> = Vec::new();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            match chunk {
                ModelChunk::AssistantText { content } => {
                    assistant_text.push_str(&content);
                    let event = Event::message_tokens(correlation_id, &content);
                    emit_filtered(registry, &tx, event).await?;
                }
                ModelChunk::ThinkingText { content } => {
                    thinking_text.push_str(&content);
                    let event = Event::thinking_tokens(correlation_id, &content);
                    emit_filtered(registry, &tx, event).await?;
                }
                ModelChunk::ToolCallDelta {
                    id,
                    index,
                    name_delta,
                    arguments_delta,
                } => {
                    if !pending.contains_key(&index) {
                        pending_order.push(index);
                    }
                    let entry = pending.entry(index).or_default();
                    if let Some(id) = id {
                        entry.call_id = Some(id);
                    }
                    if let Some(name) = name_delta {
                        entry.tool_name.push_str(&name);
                    }
                    if let Some(args) = arguments_delta {
                        entry.arguments.push_str(&args);
                    }
                }
                ModelChunk::End { .. } => break,
            }
        }

        if !thinking_text.is_empty() {
            registry.history.append_message(
                &user_id,
                &thread_id,
                Role::Thinking,
                turnloom_domain::MessageKind::MessageText,
                &thinking_text,
                Some(&model_name),
                None,
            )?;
        }

        let calls: Vec<ToolCall> = pending_order
            .into_iter()
            .filter_map(|idx| pending.remove(&idx))
            .map(|p| ToolCall {
                call_id: p.call_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                tool_name: p.tool_name,
                arguments: serde_json::from_str(&p.arguments).unwrap_or(serde_json::Value::Null),
            })
            .collect();

        if calls.is_empty() {
            // FINALIZE: no tool calls, the assistant's reply is the turn's answer.
            if !assistant_text.is_empty() {
                registry.history.append_message(
                    &user_id,
                    &thread_id,
                    Role::Assistant,
                    turnloom_domain::MessageKind::MessageText,
                    &assistant_text,
                    Some(&model_name),
                    None,
                )?;
                registry.context.add_message(
                    &user_id,
                    &thread_id,
                    ContextEntry::new(Role::Assistant, &assistant_text),
                    None,
                )?;
            }
            for plugin in registry.functions_for_post_hooks() {
                let job = plugin.post_call(&params).await?;
                spawn_post_call_job(tasks, job);
            }
            return Ok(());
        }

        // TOOL_ROUND: the thinking that led to these calls stays visible in
        // the live context only until the calls resolve, per the
        // projection rule in `turnloom_context::cache` — added here,
        // scrubbed below once results are persisted.
        let thinking_entry_id = if !thinking_text.is_empty() {
            Some(registry.context.add_message(
                &user_id,
                &thread_id,
                ContextEntry::new(Role::Thinking, &thinking_text),
                None,
            )?)
        } else {
            None
        };

        if !assistant_text.is_empty() {
            registry.history.append_message(
                &user_id,
                &thread_id,
                Role::Assistant,
                turnloom_domain::MessageKind::MessageText,
                &assistant_text,
                Some(&model_name),
                None,
            )?;
            registry.context.add_message(
                &user_id,
                &thread_id,
                ContextEntry::new(Role::Assistant, &assistant_text),
                None,
            )?;
        }

        for call in &calls {
            let line = format!("🔧 {}({})", call.tool_name, call.arguments);
            let event = Event::tool_update(correlation_id, &call.call_id, &line);
            emit_filtered(registry, &tx, event).await?;
            TraceEvent::ToolInvoked {
                turn_correlation_id: correlation_id.to_string(),
                tool_name: call.tool_name.clone(),
                call_id: call.call_id.clone(),
            }
            .emit();
        }

        let tools = registry.tools().cloned();
        let tool_ctx = turnloom_domain::ToolContext::new(&user_id, &thread_id, correlation_id);
        let dispatches = calls.iter().map(|call| {
            let tools = tools.clone();
            let tool_ctx = tool_ctx.clone();
            let tool_name = call.tool_name.clone();
            let arguments = call.arguments.clone();
            async move {
                let Some(tools) = tools else {
                    return (
                        Vec::new(),
                        turnloom_tools::error_envelope(
                            &tool_name,
                            &arguments,
                            &Error::NotFound("no tool registry configured".into()),
                        ),
                    );
                };
                match tools.invoke(&tool_ctx, &tool_name, arguments.clone()).await {
                    Ok(progress) => R2RAdapter::collect(progress).await,
                    Err(e) => (
                        Vec::new(),
                        turnloom_tools::error_envelope(&tool_name, &arguments, &e),
                    ),
                }
            }
        });
        let results = join_all(dispatches).await;

        for (call, (progress, final_value)) in calls.iter().zip(results.into_iter()) {
            for line in &progress {
                let event = Event::tool_update(correlation_id, &call.call_id, line);
                emit_filtered(registry, &tx, event).await?;
            }
            let ok = final_value.get("error").is_none();
            let line = if ok {
                format!("✅ {}: {}", call.tool_name, render_value(&final_value))
            } else {
                format!("❌ {}: {}", call.tool_name, render_value(&final_value))
            };
            let event = Event::tool_update(correlation_id, &call.call_id, &line);
            emit_filtered(registry, &tx, event).await?;
            TraceEvent::ToolFinished {
                turn_correlation_id: correlation_id.to_string(),
                tool_name: call.tool_name.clone(),
                call_id: call.call_id.clone(),
                ok,
            }
            .emit();

            registry.history.append_message(
                &user_id,
                &thread_id,
                Role::Tool,
                turnloom_domain::MessageKind::ToolUpdate,
                &line,
                None,
                Some(&call.call_id),
            )?;
            registry.context.add_message(
                &user_id,
                &thread_id,
                ContextEntry::new(Role::Tool, &line).with_tool_call_id(&call.call_id),
                None,
            )?;
        }

        if let Some(id) = thinking_entry_id {
            registry.context.remove_messages(&user_id, &thread_id, &[id])?;
        }

        for plugin in registry.functions_for_post_hooks() {
            let job = plugin.post_call(&params).await?;
            spawn_post_call_job(tasks, job);
        }

        // Exceeding the round bound on the *next* iteration check is what
        // distinguishes TOOL_ROUND -> LOOP_ROUND (bounded) from an infinite loop.
    }
}

/// Hand a `post_call` hook's returned job off to the background-task
/// registry, if it returned one.
fn spawn_post_call_job(tasks: &SharedBackgroundTasks, job: Option<BackgroundJob>) {
    if let Some(job) = job {
        tasks.spawn(job.name, job.future);
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => {
            if let Some(err) = other.get("error").and_then(|v| v.as_str()) {
                err.to_string()
            } else {
                other.to_string()
            }
        }
    }
}

/// Runs `event` through the `filter_stream` chain and sends every
/// resulting event on `tx`. Each filter may fan one event out into many
/// (spec for auxiliary lines); only the first event a filter returns
/// continues through the remaining chain — the rest are auxiliary and
/// forwarded as-is, so a later filter never has to reason about events
/// it didn't produce.
async fn emit_filtered(
    registry: &Arc<PluginRegistry>,
    tx: &tokio::sync::mpsc::Sender<Event>,
    mut event: Event,
) -> Result<()> {
    let mut auxiliary = Vec::new();
    for plugin in registry.functions_for_post_hooks() {
        let mut events = plugin.filter_stream(event).await?;
        if events.is_empty() {
            return Ok(());
        }
        event = events.remove(0);
        auxiliary.append(&mut events);
    }
    tx.send(event).await.ok();
    for event in auxiliary {
        tx.send(event).await.ok();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Arc;
    use turnloom_context::ContextCache;
    use turnloom_history::HistoryLog;
    use turnloom_plugins::{ModelPlugin, StaticSystemPrompts};
    use turnloom_store::Store;
    use turnloom_tools::ToolRegistry;

    struct ScriptedModel {
        chunks: parking_lot::Mutex<Vec<Vec<ModelChunk>>>,
    }

    #[async_trait]
    impl ModelPlugin for ScriptedModel {
        fn list_models(&self) -> Vec<String> {
            vec!["scripted".to_string()]
        }

        async fn stream(
            &self,
            _messages: Vec<ContextEntry>,
            _model_name: &str,
            _system_prompt_text: &str,
            _tool_schemas: Vec<serde_json::Value>,
        ) -> Result<BoxStream<'static, ModelChunk>> {
            let mut scripts = self.chunks.lock();
            let next = if scripts.is_empty() {
                vec![ModelChunk::End {
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                }]
            } else {
                scripts.remove(0)
            };
            Ok(Box::pin(stream::iter(next)))
        }

        fn capabilities(&self, _model_name: &str) -> turnloom_domain::ModelCapabilities {
            turnloom_domain::ModelCapabilities {
                supports_tools: true,
                ..Default::default()
            }
        }

        fn provider_id(&self) -> &str {
            "scripted"
        }
    }

    fn build_registry(scripts: Vec<Vec<ModelChunk>>) -> Arc<PluginRegistry> {
        build_registry_with(scripts, Vec::new(), Arc::new(crate::tasks::BackgroundTasks::new()))
    }

    fn build_registry_with(
        scripts: Vec<Vec<ModelChunk>>,
        functions: Vec<Arc<dyn FunctionPlugin>>,
        tasks: SharedBackgroundTasks,
    ) -> Arc<PluginRegistry> {
        Arc::new_cyclic(|weak_self| {
            let store = Arc::new(Store::open_in_memory("orchestrator_test").unwrap());
            let history = Arc::new(HistoryLog::open(store.clone()).unwrap());
            let context = Arc::new(ContextCache::new(history.clone()));
            let mut registry = PluginRegistry::new(store, history, context);
            registry.register_model(
                "scripted".to_string(),
                Arc::new(ScriptedModel {
                    chunks: parking_lot::Mutex::new(scripts),
                }),
            );
            registry.set_system_prompt(Arc::new(
                StaticSystemPrompts::new().with_prompt(DEFAULT_SYSTEM_PROMPT_KEY, "be helpful"),
            ));
            let tools = ToolRegistry::new();
            tools.register(Arc::new(turnloom_tools::builtin::AddTool)).unwrap();
            registry.set_tools(Arc::new(tools));
            for function in functions {
                registry.register_function(function);
            }
            let orchestrator = TurnOrchestrator::new(weak_self.clone(), 25, tasks);
            registry.set_message_processor(Arc::new(orchestrator));
            registry
        })
    }

    #[tokio::test]
    async fn single_round_with_no_tool_calls_finalizes() {
        let registry = build_registry(vec![vec![
            ModelChunk::AssistantText {
                content: "hi there".to_string(),
            },
            ModelChunk::End {
                usage: None,
                finish_reason: Some("stop".to_string()),
            },
        ]]);
        let processor = registry.message_processor().unwrap().clone();
        let mut stream = processor
            .process_turn(
                "u1".to_string(),
                NEW_THREAD_SENTINEL.to_string(),
                "hello".to_string(),
                Some("scripted".to_string()),
            )
            .await
            .unwrap();

        use futures_util::StreamExt;
        let mut saw_message = false;
        let mut saw_end = false;
        while let Some(event) = stream.next().await {
            match event.event {
                turnloom_domain::EventKind::MessageTokens => saw_message = true,
                turnloom_domain::EventKind::StreamEnd => saw_end = true,
                _ => {}
            }
        }
        assert!(saw_message);
        assert!(saw_end);
    }

    #[tokio::test]
    async fn tool_call_round_emits_tool_update_literals() {
        let registry = build_registry(vec![
            vec![
                ModelChunk::ToolCallDelta {
                    id: Some("c1".to_string()),
                    index: 0,
                    name_delta: Some("add".to_string()),
                    arguments_delta: Some("{\"a\":2,\"b\":3}".to_string()),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("tool_calls".to_string()),
                },
            ],
            vec![
                ModelChunk::AssistantText {
                    content: "the answer is 5".to_string(),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                },
            ],
        ]);
        let processor = registry.message_processor().unwrap().clone();
        let mut stream = processor
            .process_turn(
                "u1".to_string(),
                NEW_THREAD_SENTINEL.to_string(),
                "what is 2+3".to_string(),
                Some("scripted".to_string()),
            )
            .await
            .unwrap();

        use futures_util::StreamExt;
        let mut tool_lines = Vec::new();
        while let Some(event) = stream.next().await {
            if event.event == turnloom_domain::EventKind::ToolUpdate {
                if let Some(content) = event.data.content {
                    tool_lines.push(content);
                }
            }
        }
        assert!(tool_lines.iter().any(|l| l.starts_with("🔧 add(")));
        assert!(tool_lines.iter().any(|l| l.contains("✅ add: 5")));
    }

    #[tokio::test]
    async fn exhausting_tool_rounds_is_fatal() {
        let looping_call = vec![
            ModelChunk::ToolCallDelta {
                id: Some("c1".to_string()),
                index: 0,
                name_delta: Some("add".to_string()),
                arguments_delta: Some("{\"a\":1,\"b\":1}".to_string()),
            },
            ModelChunk::End {
                usage: None,
                finish_reason: Some("tool_calls".to_string()),
            },
        ];
        let registry = build_registry(vec![looping_call.clone(); 30]);
        let processor = registry.message_processor().unwrap().clone();
        let mut stream = processor
            .process_turn(
                "u1".to_string(),
                NEW_THREAD_SENTINEL.to_string(),
                "loop forever".to_string(),
                Some("scripted".to_string()),
            )
            .await
            .unwrap();

        use futures_util::StreamExt;
        // Give the orchestrator a tiny bound so the test doesn't need 25 rounds.
        let mut saw_error = false;
        let mut rounds = 0;
        while let Some(event) = stream.next().await {
            if event.event == turnloom_domain::EventKind::Error {
                saw_error = true;
            }
            rounds += 1;
            if rounds > 200 {
                break;
            }
        }
        // With max_tool_rounds = 25 and a single scripted tool-call round
        // repeating forever, the orchestrator must eventually fail the turn.
        assert!(saw_error);
    }

    struct SpawningFunction;

    #[async_trait]
    impl FunctionPlugin for SpawningFunction {
        async fn post_call(&self, _params: &CallParams) -> Result<Option<BackgroundJob>> {
            Ok(Some(BackgroundJob::new("post-turn-summary", async {
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            })))
        }
    }

    #[tokio::test]
    async fn post_call_job_is_handed_to_the_task_registry() {
        let tasks = Arc::new(crate::tasks::BackgroundTasks::new());
        let registry = build_registry_with(
            vec![vec![
                ModelChunk::AssistantText {
                    content: "hi there".to_string(),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                },
            ]],
            vec![Arc::new(SpawningFunction)],
            tasks.clone(),
        );
        let processor = registry.message_processor().unwrap().clone();
        let mut stream = processor
            .process_turn(
                "u1".to_string(),
                NEW_THREAD_SENTINEL.to_string(),
                "hello".to_string(),
                Some("scripted".to_string()),
            )
            .await
            .unwrap();

        use futures_util::StreamExt;
        while stream.next().await.is_some() {}

        assert!(tasks.is_running("post-turn-summary"));
    }

    #[tokio::test]
    async fn thinking_entries_are_scrubbed_once_their_tool_round_resolves() {
        let registry = build_registry(vec![
            vec![
                ModelChunk::ThinkingText {
                    content: "let me add those".to_string(),
                },
                ModelChunk::ToolCallDelta {
                    id: Some("c1".to_string()),
                    index: 0,
                    name_delta: Some("add".to_string()),
                    arguments_delta: Some("{\"a\":2,\"b\":3}".to_string()),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("tool_calls".to_string()),
                },
            ],
            vec![
                ModelChunk::AssistantText {
                    content: "the answer is 5".to_string(),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                },
            ],
        ]);
        let processor = registry.message_processor().unwrap().clone();
        let mut thread_id = String::new();
        let mut stream = processor
            .process_turn(
                "u1".to_string(),
                NEW_THREAD_SENTINEL.to_string(),
                "what is 2+3".to_string(),
                Some("scripted".to_string()),
            )
            .await
            .unwrap();

        use futures_util::StreamExt;
        while let Some(event) = stream.next().await {
            if event.event == turnloom_domain::EventKind::ThreadId {
                if let Some(id) = event.data.thread_id {
                    thread_id = id;
                }
            }
        }

        let entries = registry
            .context
            .get_context("u1", &thread_id, false)
            .unwrap()
            .unwrap();
        assert!(entries.iter().all(|e| e.role != Role::Thinking));
    }

    struct StepTool;

    #[async_trait]
    impl turnloom_tools::Tool for StepTool {
        fn name(&self) -> &str {
            "step"
        }

        fn description(&self) -> &str {
            "reports two interim steps before finishing"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}, "required": []})
        }

        async fn invoke(
            &self,
            _ctx: &turnloom_domain::ToolContext,
            _arguments: serde_json::Value,
        ) -> BoxStream<'static, turnloom_plugins::ToolProgress> {
            Box::pin(stream::iter(vec![
                turnloom_domain::Progress::Progress("step 1".to_string()),
                turnloom_domain::Progress::Progress("step 2".to_string()),
                turnloom_domain::Progress::Final(serde_json::json!("done")),
            ]))
        }
    }

    fn build_registry_with_step_tool(scripts: Vec<Vec<ModelChunk>>) -> Arc<PluginRegistry> {
        Arc::new_cyclic(|weak_self| {
            let store = Arc::new(Store::open_in_memory("orchestrator_test_step").unwrap());
            let history = Arc::new(HistoryLog::open(store.clone()).unwrap());
            let context = Arc::new(ContextCache::new(history.clone()));
            let mut registry = PluginRegistry::new(store, history, context);
            registry.register_model(
                "scripted".to_string(),
                Arc::new(ScriptedModel {
                    chunks: parking_lot::Mutex::new(scripts),
                }),
            );
            registry.set_system_prompt(Arc::new(
                StaticSystemPrompts::new().with_prompt(DEFAULT_SYSTEM_PROMPT_KEY, "be helpful"),
            ));
            let tools = ToolRegistry::new();
            tools.register(Arc::new(StepTool)).unwrap();
            registry.set_tools(Arc::new(tools));
            let orchestrator = TurnOrchestrator::new(
                weak_self.clone(),
                25,
                Arc::new(crate::tasks::BackgroundTasks::new()),
            );
            registry.set_message_processor(Arc::new(orchestrator));
            registry
        })
    }

    #[tokio::test]
    async fn tool_round_forwards_interim_progress_lines_before_the_final_line() {
        let registry = build_registry_with_step_tool(vec![
            vec![
                ModelChunk::ToolCallDelta {
                    id: Some("c1".to_string()),
                    index: 0,
                    name_delta: Some("step".to_string()),
                    arguments_delta: Some("{}".to_string()),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("tool_calls".to_string()),
                },
            ],
            vec![
                ModelChunk::AssistantText {
                    content: "all done".to_string(),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                },
            ],
        ]);

        let processor = registry.message_processor().unwrap().clone();
        let mut stream = processor
            .process_turn(
                "u1".to_string(),
                NEW_THREAD_SENTINEL.to_string(),
                "run the steps".to_string(),
                Some("scripted".to_string()),
            )
            .await
            .unwrap();

        use futures_util::StreamExt;
        let mut tool_lines = Vec::new();
        while let Some(event) = stream.next().await {
            if event.event == turnloom_domain::EventKind::ToolUpdate {
                if let Some(content) = event.data.content {
                    tool_lines.push(content);
                }
            }
        }
        let step1 = tool_lines.iter().position(|l| l == "step 1").unwrap();
        let step2 = tool_lines.iter().position(|l| l == "step 2").unwrap();
        let finish = tool_lines.iter().position(|l| l.contains("✅ step: done")).unwrap();
        assert!(step1 < step2);
        assert!(step2 < finish);
    }

    struct AnnouncingFunction;

    #[async_trait]
    impl FunctionPlugin for AnnouncingFunction {
        fn name(&self) -> &str {
            "announcing"
        }

        async fn pre_call(
            &self,
            params: &mut CallParams,
            progress: &mut ProgressSink,
        ) -> Result<()> {
            progress.push(format!("preparing call for {}", params.thread_id));
            params.new_message = format!("{} [reviewed]", params.new_message);
            Ok(())
        }
    }

    #[tokio::test]
    async fn pre_call_progress_and_message_rewrite_reach_the_client_and_the_model() {
        let registry = build_registry_with(
            vec![vec![
                ModelChunk::AssistantText {
                    content: "ack".to_string(),
                },
                ModelChunk::End {
                    usage: None,
                    finish_reason: Some("stop".to_string()),
                },
            ]],
            vec![Arc::new(AnnouncingFunction)],
            Arc::new(crate::tasks::BackgroundTasks::new()),
        );
        let processor = registry.message_processor().unwrap().clone();
        let mut thread_id = String::new();
        let mut saw_pre_call_progress = false;
        let mut stream = processor
            .process_turn(
                "u1".to_string(),
                NEW_THREAD_SENTINEL.to_string(),
                "hello".to_string(),
                Some("scripted".to_string()),
            )
            .await
            .unwrap();

        use futures_util::StreamExt;
        while let Some(event) = stream.next().await {
            if event.event == turnloom_domain::EventKind::ThreadId {
                thread_id = event.data.thread_id.clone().unwrap_or_default();
            }
            if event.event == turnloom_domain::EventKind::ToolUpdate
                && event.data.call_id.as_deref() == Some("pre_call:announcing")
            {
                saw_pre_call_progress = true;
                assert_eq!(event.data.content, Some(format!("preparing call for {thread_id}")));
            }
        }
        assert!(saw_pre_call_progress);

        let entries = registry
            .context
            .get_context("u1", &thread_id, false)
            .unwrap()
            .unwrap();
        assert!(entries
            .iter()
            .any(|e| e.role == Role::User && e.content == "hello [reviewed]"));
    }
}
