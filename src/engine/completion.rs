//! Completion engine
//!
//! The agentic core: given a completion request it resolves every requested
//! model up front, runs the shared retrieval fan-out once, then drives one
//! independent generation session per model. Sessions stream ordered events
//! through a shared writer and share only the conversation-scoped cache and
//! reference tracker.
//!
//! Session loop per model: dispatch a generation step, forward text deltas as
//! they arrive, execute any requested tool calls concurrently, feed outputs
//! back, repeat until the model finishes or the step budget is exhausted.
//! Exhausting the budget is a normal `Finished` outcome. A stream-level model
//! failure is surfaced as an inline error event, reported, and terminates
//! only that model's session.

use crate::cache::ConversationCache;
use crate::config::EngineConfig;
use crate::engine::prompt::{build_system_prompt, derive_title};
use crate::engine::references::ReferenceTracker;
use crate::engine::state::{SessionEvent, SessionState};
use crate::errors::{EngineError, Result};
use crate::persistence::{ConversationRecord, ErrorReporter, MessageRecord, PersistenceStore};
use crate::provider::{GenerationEvent, GenerationPrompt, LanguageModelProvider, ProviderRegistry};
use crate::retrieval::{RetrievalOrchestrator, RetrievalRequest, RetrievalResponse};
use crate::streaming::{StreamEvent, StreamWriter};
use crate::tools::{
    Reference, ToolExecutionRecord, ToolExecutor, ToolInvocationContext, ToolRegistry,
};
use crate::types::{CompletionRequest, Message, Role};
use chrono::Utc;
use futures_util::future::join_all;
use futures_util::StreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Orchestrates retrieval-grounded, tool-augmented completions
pub struct CompletionEngine {
    config: EngineConfig,
    providers: ProviderRegistry,
    retrieval: Arc<RetrievalOrchestrator>,
    executor: Arc<ToolExecutor>,
    registry: ToolRegistry,
    cache: Arc<ConversationCache>,
    store: Arc<dyn PersistenceStore>,
    reporter: Arc<dyn ErrorReporter>,
    /// Reference dedup state per conversation with an in-flight request,
    /// dropped when the last request for that conversation completes
    trackers: Mutex<HashMap<Uuid, TrackerSlot>>,
    /// Conversations whose first-completion side effects already ran.
    /// Check-and-insert happens under one lock: an explicit serialization
    /// point, so two concurrent completions on the same new conversation
    /// cannot both claim it. Entries are removed once the claiming request
    /// finishes.
    claimed: Mutex<HashSet<Uuid>>,
}

struct TrackerSlot {
    tracker: Arc<Mutex<ReferenceTracker>>,
    /// In-flight requests sharing this tracker
    active: usize,
}

impl CompletionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        providers: ProviderRegistry,
        retrieval: Arc<RetrievalOrchestrator>,
        executor: Arc<ToolExecutor>,
        registry: ToolRegistry,
        cache: Arc<ConversationCache>,
        store: Arc<dyn PersistenceStore>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            config,
            providers,
            retrieval,
            executor,
            registry,
            cache,
            store,
            reporter,
            trackers: Mutex::new(HashMap::new()),
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Start a completion; returns the event stream the caller drains.
    ///
    /// Model resolution failures are hard, pre-stream errors. Everything
    /// after this returns through the event stream.
    pub fn create_completion(
        self: &Arc<Self>,
        request: CompletionRequest,
    ) -> Result<mpsc::Receiver<StreamEvent>> {
        let query = request
            .latest_query()
            .ok_or_else(|| EngineError::Generic("completion request has no user message".into()))?
            .to_string();

        if request.models.is_empty() {
            return Err(EngineError::Generic("no models requested".into()));
        }

        // Resolve all models before anything is streamed
        let providers: Vec<Arc<dyn LanguageModelProvider>> = request
            .models
            .iter()
            .map(|model| self.providers.resolve(model))
            .collect::<Result<Vec<_>>>()?;

        let is_new = request.conversation_id.is_none();
        let conversation_id = request.conversation_id.unwrap_or_else(Uuid::new_v4);

        let (writer, receiver) = StreamWriter::channel();
        let writer = Arc::new(writer);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine
                .run_completion(request, query, providers, conversation_id, is_new, writer)
                .await;
        });

        Ok(receiver)
    }

    async fn run_completion(
        self: Arc<Self>,
        request: CompletionRequest,
        query: String,
        providers: Vec<Arc<dyn LanguageModelProvider>>,
        conversation_id: Uuid,
        is_new: bool,
        writer: Arc<StreamWriter>,
    ) {
        // First request on a brand-new conversation claims its one-time side
        // effects: conversation row, first user message, and (later) title.
        let claimed = is_new && self.claim_conversation(conversation_id);

        if claimed {
            self.save_best_effort(
                self.store.save_conversation(ConversationRecord {
                    id: conversation_id,
                    user_id: request.persona.user_id.clone(),
                    title: None,
                    created_at: Utc::now(),
                }),
                "save new conversation",
            )
            .await;
        }

        if claimed || !is_new {
            let user_message =
                MessageRecord::new(conversation_id, Role::User, query.clone());
            self.save_best_effort(self.store.save_message(user_message), "save user message")
                .await;
        }

        writer
            .emit(StreamEvent::progress(None, "retrieving"))
            .await;

        let mut retrieval_request = RetrievalRequest::new(
            &query,
            &request.persona.user_id,
            self.config.retrieval.max_results,
        )
        .with_conversation(conversation_id);
        retrieval_request.app_id = request.persona.app_id.clone();

        let context = self.retrieval.retrieve(&retrieval_request).await;
        let system_prompt = build_system_prompt(
            &request.persona,
            &context,
            &self.cache.recent_queries(conversation_id),
        );

        let tracker = self.tracker_for(conversation_id);
        let budget = self.config.step_budget(request.deep_mode);

        let tool_ctx = ToolInvocationContext {
            user_id: request.persona.user_id.clone(),
            app_id: request.persona.app_id.clone(),
            conversation_id: Some(conversation_id),
            max_results: self.config.retrieval.max_results,
        };

        let handles: Vec<_> = providers
            .into_iter()
            .map(|provider| {
                let session = ModelSession {
                    engine: Arc::clone(&self),
                    provider,
                    writer: Arc::clone(&writer),
                    tracker: Arc::clone(&tracker),
                    system_prompt: system_prompt.clone(),
                    base_messages: request.messages.clone(),
                    tool_ctx: tool_ctx.clone(),
                    conversation_id,
                    budget,
                };
                tokio::spawn(session.run())
            })
            .collect();

        let mut any_finished = false;
        for handle in handles {
            match handle.await {
                Ok(finished) => any_finished |= finished,
                Err(e) => warn!(error = %e, "model session task panicked"),
            }
        }

        if claimed && any_finished {
            let title = derive_title(&query);
            self.save_best_effort(
                self.store.save_conversation(ConversationRecord {
                    id: conversation_id,
                    user_id: request.persona.user_id.clone(),
                    title: Some(title.clone()),
                    created_at: Utc::now(),
                }),
                "save conversation title",
            )
            .await;
            writer.emit(StreamEvent::ConversationTitle { title }).await;
        }

        self.release_conversation(conversation_id, claimed);
    }

    fn tracker_for(&self, conversation_id: Uuid) -> Arc<Mutex<ReferenceTracker>> {
        let mut trackers = self.trackers.lock().expect("tracker lock poisoned");
        let slot = trackers.entry(conversation_id).or_insert_with(|| TrackerSlot {
            tracker: Arc::default(),
            active: 0,
        });
        slot.active += 1;
        Arc::clone(&slot.tracker)
    }

    /// True exactly once per conversation id while the claim is held
    fn claim_conversation(&self, conversation_id: Uuid) -> bool {
        self.claimed
            .lock()
            .expect("claim lock poisoned")
            .insert(conversation_id)
    }

    /// Drop per-conversation bookkeeping once the last in-flight request
    /// for that conversation ends.
    fn release_conversation(&self, conversation_id: Uuid, claimed: bool) {
        {
            let mut trackers = self.trackers.lock().expect("tracker lock poisoned");
            if let Some(slot) = trackers.get_mut(&conversation_id) {
                slot.active = slot.active.saturating_sub(1);
                if slot.active == 0 {
                    trackers.remove(&conversation_id);
                }
            }
        }

        if claimed {
            self.claimed
                .lock()
                .expect("claim lock poisoned")
                .remove(&conversation_id);
        }
    }

    /// Conversations with live reference-tracking state
    pub fn tracked_conversations(&self) -> usize {
        self.trackers.lock().expect("tracker lock poisoned").len()
    }

    /// Conversations currently holding a first-completion claim
    pub fn pending_claims(&self) -> usize {
        self.claimed.lock().expect("claim lock poisoned").len()
    }

    /// Persistence is best-effort: log and move on
    async fn save_best_effort(
        &self,
        save: impl std::future::Future<Output = anyhow::Result<()>>,
        what: &str,
    ) {
        if let Err(e) = save.await {
            warn!(error = %e, what, "persistence failure (non-fatal)");
        }
    }

    /// Direct access to the retrieval pipeline
    pub fn retrieval(&self) -> &RetrievalOrchestrator {
        &self.retrieval
    }

    /// Shared initial-context response for inspection in callers
    pub async fn retrieve(&self, request: &RetrievalRequest) -> RetrievalResponse {
        self.retrieval.retrieve(request).await
    }
}

/// One model's generation session
struct ModelSession {
    engine: Arc<CompletionEngine>,
    provider: Arc<dyn LanguageModelProvider>,
    writer: Arc<StreamWriter>,
    tracker: Arc<Mutex<ReferenceTracker>>,
    system_prompt: String,
    base_messages: Vec<Message>,
    tool_ctx: ToolInvocationContext,
    conversation_id: Uuid,
    budget: usize,
}

impl ModelSession {
    /// Drive the session to a terminal state. Returns true on `Finished`.
    async fn run(self) -> bool {
        let model = self.provider.model().to_string();
        let mut state = SessionState::Idle;
        let mut transcript = self.base_messages.clone();
        let mut final_text = String::new();
        let mut references: Vec<Reference> = Vec::new();
        let mut tool_log: Vec<ToolExecutionRecord> = Vec::new();
        let mut step = 0usize;

        'session: while !state.is_terminal() {
            step += 1;

            let prompt = GenerationPrompt {
                system: self.system_prompt.clone(),
                messages: transcript.clone(),
                tools: self.engine.registry.schemas(),
            };

            let mut stream = match self.provider.stream_generate(prompt).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.fail(&model, &mut state, e).await;
                    break 'session;
                }
            };

            if state == SessionState::Idle {
                advance(&mut state, SessionEvent::Dispatch);
            }

            let mut step_calls = Vec::new();
            let mut finished = false;

            while let Some(event) = stream.next().await {
                match event {
                    Ok(GenerationEvent::TextDelta(delta)) => {
                        final_text.push_str(&delta);
                        self.writer.emit(StreamEvent::text(&model, delta)).await;
                    }
                    Ok(GenerationEvent::ToolCall(call)) => step_calls.push(call),
                    Ok(GenerationEvent::StepFinish) => break,
                    Ok(GenerationEvent::Finish) => {
                        finished = true;
                        break;
                    }
                    Err(e) => {
                        self.fail(&model, &mut state, e).await;
                        break 'session;
                    }
                }
            }

            if !step_calls.is_empty() {
                advance(&mut state, SessionEvent::ToolCallsRequested);

                let outputs = join_all(
                    step_calls
                        .iter()
                        .map(|call| self.engine.executor.execute(call, &self.tool_ctx)),
                )
                .await;

                for (call, output) in step_calls.iter().zip(outputs) {
                    let fresh = self
                        .tracker
                        .lock()
                        .expect("tracker lock poisoned")
                        .filter_new(&output.references);

                    tool_log.push(ToolExecutionRecord {
                        iteration: step,
                        tool_name: output.tool.clone(),
                        new_reference_ids: fresh.iter().map(Reference::identity).collect(),
                    });

                    self.writer
                        .emit(StreamEvent::ToolResults {
                            model: model.clone(),
                            tool: output.tool.clone(),
                            call_id: output.call_id.clone(),
                            success: output.success,
                            payload: output.payload.clone(),
                        })
                        .await;

                    if !fresh.is_empty() {
                        let summary = format!("{} new source(s)", fresh.len());
                        references.extend(fresh.clone());
                        self.writer
                            .emit(StreamEvent::MemorySources {
                                model: model.clone(),
                                sources: fresh,
                                reference_summary: Some(summary),
                            })
                            .await;
                    }

                    transcript.push(Message::assistant(format!(
                        "[tool call] {}({})",
                        call.name, call.arguments
                    )));
                    transcript.push(Message {
                        role: Role::Tool,
                        content: output.payload.to_string(),
                    });
                }

                if finished {
                    advance(&mut state, SessionEvent::ToolResultsReady);
                    advance(&mut state, SessionEvent::Completion);
                } else if step >= self.budget {
                    // Budget reached: normal completion, not an error
                    advance(&mut state, SessionEvent::BudgetExhausted);
                } else {
                    advance(&mut state, SessionEvent::ToolResultsReady);
                }
                continue 'session;
            }

            // No tool calls this step: the model is done (an exhausted
            // stream without an explicit Finish counts as completion too)
            advance(&mut state, SessionEvent::Completion);
        }

        let finished_ok = state == SessionState::Finished;

        // Persist whatever was produced, even after a mid-stream failure
        if !final_text.is_empty() || finished_ok {
            let mut record =
                MessageRecord::new(self.conversation_id, Role::Assistant, final_text);
            record.model = Some(model.clone());
            record.references = references;
            record.tool_log = tool_log;
            if let Err(e) = self.engine.store.save_message(record).await {
                warn!(error = %e, model, "failed to persist assistant message");
            }
        }

        debug!(model, steps = step, state = ?state, "model session ended");
        finished_ok
    }

    /// Surface a stream-level failure: inline event, external report,
    /// terminal state. Sibling sessions are unaffected.
    async fn fail(&self, model: &str, state: &mut SessionState, error: EngineError) {
        self.writer
            .emit(StreamEvent::error(Some(model.to_string()), error.to_string()))
            .await;
        self.engine.reporter.report(&error, "model generation stream");
        advance(state, SessionEvent::StreamFailure);
    }
}

/// Apply a transition the loop believes is valid; an invalid edge is a bug,
/// downgraded to `Errored` rather than a panic.
fn advance(state: &mut SessionState, event: SessionEvent) {
    match state.transition(event) {
        Ok(next) => *state = next,
        Err(e) => {
            warn!(error = %e, "unexpected session transition");
            *state = SessionState::Errored;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_valid_edge() {
        let mut state = SessionState::Idle;
        advance(&mut state, SessionEvent::Dispatch);
        assert_eq!(state, SessionState::Streaming);
    }

    #[test]
    fn test_advance_invalid_edge_degrades_to_errored() {
        let mut state = SessionState::Idle;
        advance(&mut state, SessionEvent::Completion);
        assert_eq!(state, SessionState::Errored);
    }
}
