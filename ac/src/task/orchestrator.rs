//! TaskOrchestrator - the control loop driving one task to completion
//!
//! Owns at most one live [`Task`]. Advances it through model turns, dispatches
//! tool calls through the hub, and blocks on user decisions as asks.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapter::AdapterRegistry;
use crate::config::TaskDefaults;
use crate::events::{EventBus, EventEmitter};
use crate::hub::{HubError, ToolHub};
use crate::model::{
    AskKind, AskRequest, AskResponse, ContentBlock, Message, ModelClient, ToolCallRequest, TurnAction, TurnRequest,
};
use crate::retry::RetryError;
use crate::store::MetadataStore;
use crate::usage::{UsageEntry, UsageTracker};

use super::{ChatSettings, HookHandle, Mode, Task, TaskConfig, TaskError, TodoItem};

/// Lifecycle phase of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No live task
    Idle,
    /// The control loop may advance
    Running,
    /// Blocked on a user decision
    AwaitingUserInput,
    /// Condensing the conversation via the synthetic-approval path
    CondensingContext,
    /// Terminal: the model declared the task done
    Completed,
    /// Terminal: cancelled by the user
    Cancelled,
    /// Terminal: unrecoverable failure
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::CondensingContext => "condensing_context",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Opaque handle returned on task start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: String,
}

/// An ask the orchestrator is blocked on
struct PendingAsk {
    kind: AskKind,
    prompt: String,
    /// Set for tool-approval asks
    tool_call: Option<ToolCallRequest>,
}

/// The control loop for agentic task execution
pub struct TaskOrchestrator {
    phase: Phase,
    task: Option<Task>,
    model: Arc<dyn ModelClient>,
    adapters: AdapterRegistry,
    hub: ToolHub,
    usage: UsageTracker,
    store: Arc<dyn MetadataStore>,
    bus: Arc<EventBus>,
    emitter: Option<EventEmitter>,
    defaults: TaskDefaults,
    pending_ask: Option<PendingAsk>,
    system_prompt: String,
    /// Set when the user declines condensation; the proposal is not re-raised
    /// for the rest of the task
    condense_declined: bool,
}

/// Messages kept verbatim from the tail when condensing
const CONDENSE_KEEP_RECENT: usize = 4;

impl TaskOrchestrator {
    pub fn new(
        model: Arc<dyn ModelClient>,
        adapters: AdapterRegistry,
        hub: ToolHub,
        store: Arc<dyn MetadataStore>,
        bus: Arc<EventBus>,
        defaults: TaskDefaults,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            phase: Phase::Idle,
            task: None,
            model,
            adapters,
            usage: UsageTracker::new(Arc::clone(&store)),
            hub,
            store,
            bus,
            emitter: None,
            defaults,
            pending_ask: None,
            system_prompt: system_prompt.into(),
            condense_declined: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Snapshot of the live task, if any
    pub fn task(&self) -> Option<Task> {
        self.task.clone()
    }

    pub fn hub(&self) -> &ToolHub {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut ToolHub {
        &mut self.hub
    }

    /// The ask currently blocking the task, if any
    pub fn pending_ask(&self) -> Option<(AskKind, &str)> {
        self.pending_ask.as_ref().map(|p| (p.kind, p.prompt.as_str()))
    }

    /// Usage history for a task (live or retired)
    pub async fn model_usage(&self, task_id: &str) -> Result<Vec<UsageEntry>, TaskError> {
        Ok(self.usage.usage(task_id).await?)
    }

    /// Create a new task, retiring any previous one
    pub async fn start_task(&mut self, config: TaskConfig) -> Result<TaskHandle, TaskError> {
        debug!(mode = %config.mode, model = %config.chat_settings.model_id, "TaskOrchestrator::start_task: called");
        if config.task.trim().is_empty() {
            return Err(TaskError::InvalidConfig("task prompt must not be empty".to_string()));
        }
        config.chat_settings.validate().map_err(TaskError::InvalidConfig)?;

        if let Some(prev) = self.task.take() {
            info!(task_id = %prev.id, "TaskOrchestrator::start_task: retiring previous task");
            prev.cancel.cancel();
        }
        self.pending_ask = None;
        self.condense_declined = false;

        let id = Uuid::now_v7().to_string();
        let mut task = Task::new(&id, config.mode, config.chat_settings.clone());

        if config.images.is_empty() {
            task.push_message(Message::user(config.task));
        } else {
            let mut blocks = vec![ContentBlock::Text { text: config.task }];
            blocks.extend(config.images.into_iter().map(|source| ContentBlock::Image { source }));
            task.push_message(Message::user_blocks(blocks));
        }

        let mut meta = self.store.load(&id).await?;
        meta.mode = config.mode;
        self.store.save(&id, &meta).await?;

        let emitter = self.bus.emitter_for(&id);
        emitter.task_started(config.mode, &config.chat_settings.model_id);

        if self
            .usage
            .record(&id, &config.chat_settings.model_id, &config.chat_settings.provider_id, config.mode)
            .await?
        {
            emitter.usage_recorded(&config.chat_settings.model_id, &config.chat_settings.provider_id, config.mode);
        }

        self.emitter = Some(emitter);
        self.task = Some(task);
        self.phase = Phase::Running;
        info!(task_id = %id, "TaskOrchestrator::start_task: task created");
        Ok(TaskHandle { task_id: id })
    }

    /// Drive the task forward until it blocks on user input or reaches a
    /// terminal phase
    ///
    /// Returns the phase the loop stopped in. Model and tool failures are
    /// folded into the phase rather than surfaced as errors; `Err` is reserved
    /// for store failures and contract violations.
    pub async fn run(&mut self) -> Result<Phase, TaskError> {
        debug!(phase = %self.phase, "TaskOrchestrator::run: called");
        if self.phase != Phase::Running {
            return Err(TaskError::StateMismatch {
                op: "run",
                phase: self.phase,
            });
        }

        while self.phase == Phase::Running {
            let (cancel, turns, message_count, model_id) = {
                let Some(task) = self.task.as_ref() else {
                    return Err(TaskError::StateMismatch {
                        op: "run",
                        phase: self.phase,
                    });
                };
                (
                    task.cancel.clone(),
                    task.turns,
                    task.messages.len(),
                    task.settings.model_id.clone(),
                )
            };

            if cancel.is_cancelled() {
                self.finish_cancelled();
                break;
            }

            if turns >= self.defaults.max_turns {
                warn!(turns, max_turns = self.defaults.max_turns, "TaskOrchestrator::run: turn limit reached");
                self.finish_failed("turn limit reached");
                break;
            }

            // Condensing can never shrink the history below the kept head and
            // tail, so only propose it when it would actually help.
            if message_count >= self.defaults.condense_threshold
                && message_count > CONDENSE_KEEP_RECENT + 2
                && !self.condense_declined
            {
                self.raise_ask(
                    AskKind::CondenseConfirmation,
                    "The conversation is getting long. Condense older context?".to_string(),
                    None,
                );
                break;
            }

            let adapter = self.adapters.resolve(&model_id);
            let request = {
                let Some(task) = self.task.as_ref() else {
                    return Err(TaskError::StateMismatch {
                        op: "run",
                        phase: self.phase,
                    });
                };
                let messages = if adapter.supports_images() {
                    task.messages.clone()
                } else {
                    if task.messages.iter().any(Message::has_images) {
                        warn!(model = %model_id, "TaskOrchestrator::run: model rejects images, dropping image blocks");
                    }
                    task.messages.iter().map(Message::without_images).collect()
                };
                TurnRequest {
                    system_prompt: adapter.adjust_system_prompt(&self.system_prompt),
                    messages,
                    tools: self.hub.tool_catalog(),
                    max_tokens: task.settings.max_tokens,
                }
            };

            let model = Arc::clone(&self.model);
            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    self.finish_cancelled();
                    break;
                }
                result = model.complete(request) => result,
            };

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "TaskOrchestrator::run: model turn failed");
                    self.finish_failed(&e.to_string());
                    break;
                }
            };

            if let Some(task) = self.task.as_mut() {
                task.turns += 1;
                if let Some(content) = &response.content {
                    task.push_message(Message::assistant(content.clone()));
                }
            }

            match response.action {
                TurnAction::Complete => {
                    self.finish_completed();
                }
                TurnAction::UseTool(call) => {
                    if self.hub.is_always_allowed(&call.server, &call.tool) {
                        self.execute_tool(call).await?;
                    } else {
                        let prompt = format!("Allow tool call '{}' on server '{}'?", call.tool, call.server);
                        self.raise_ask(AskKind::ToolApproval, prompt, Some(call));
                    }
                }
                TurnAction::Ask(AskRequest { kind, prompt }) => {
                    self.raise_ask(kind, prompt, None);
                }
                TurnAction::UpdateFocus(items) => {
                    self.update_focus(items);
                }
            }
        }

        Ok(self.phase)
    }

    /// Answer the pending ask and resume execution
    ///
    /// Valid only while blocked; answering when nothing is pending is a
    /// state mismatch.
    pub async fn respond_to_ask(&mut self, response: AskResponse) -> Result<(), TaskError> {
        debug!(phase = %self.phase, ?response, "TaskOrchestrator::respond_to_ask: called");
        if !matches!(self.phase, Phase::AwaitingUserInput | Phase::CondensingContext) {
            return Err(TaskError::StateMismatch {
                op: "respond_to_ask",
                phase: self.phase,
            });
        }
        let Some(pending) = self.pending_ask.take() else {
            return Err(TaskError::StateMismatch {
                op: "respond_to_ask",
                phase: self.phase,
            });
        };

        let approved = matches!(response, AskResponse::Approved);
        if let Some(emitter) = &self.emitter {
            emitter.ask_resolved(pending.kind, approved);
        }

        match pending.kind {
            AskKind::ToolApproval => {
                if approved {
                    // Resume first so execute_tool cancellation handling
                    // sees a consistent phase. An approval with no recorded
                    // call has nothing to execute and just resumes.
                    self.phase = Phase::Running;
                    if let Some(call) = pending.tool_call {
                        self.execute_tool(call).await?;
                    }
                } else {
                    let denial = match response {
                        AskResponse::Text(text) => format!("Tool call denied by user: {}", text),
                        _ => "Tool call denied by user.".to_string(),
                    };
                    if let Some(task) = self.task.as_mut() {
                        if let Some(call) = &pending.tool_call {
                            task.push_message(Message::user_blocks(vec![ContentBlock::ToolResult {
                                server: call.server.clone(),
                                tool: call.tool.clone(),
                                content: denial,
                                is_error: true,
                            }]));
                        } else {
                            task.push_message(Message::user(denial));
                        }
                    }
                    self.phase = Phase::Running;
                }
            }
            AskKind::CondenseConfirmation => {
                if approved {
                    self.condense_now();
                } else {
                    debug!("TaskOrchestrator::respond_to_ask: condensation declined");
                    self.condense_declined = true;
                }
                if !self.phase.is_terminal() {
                    self.phase = Phase::Running;
                }
            }
            AskKind::Question => {
                let answer = match response {
                    AskResponse::Text(text) => text,
                    AskResponse::Approved => "yes".to_string(),
                    AskResponse::Denied => "no".to_string(),
                };
                if let Some(task) = self.task.as_mut() {
                    task.push_message(Message::user(answer));
                }
                self.phase = Phase::Running;
            }
        }

        Ok(())
    }

    /// Condense the conversation now, via a synthetic affirmative response
    ///
    /// Continues a pending condense confirmation if one is blocked; otherwise
    /// fabricates the confirmation and approves it in one step.
    pub async fn condense_context(&mut self) -> Result<(), TaskError> {
        debug!(phase = %self.phase, "TaskOrchestrator::condense_context: called");
        if self.task.is_none() || self.phase.is_terminal() {
            return Err(TaskError::StateMismatch {
                op: "condense_context",
                phase: self.phase,
            });
        }
        match &self.pending_ask {
            Some(pending) if pending.kind != AskKind::CondenseConfirmation => {
                return Err(TaskError::StateMismatch {
                    op: "condense_context",
                    phase: self.phase,
                });
            }
            Some(_) => {}
            None => {
                self.pending_ask = Some(PendingAsk {
                    kind: AskKind::CondenseConfirmation,
                    prompt: "Condense older context?".to_string(),
                    tool_call: None,
                });
            }
        }

        self.phase = Phase::CondensingContext;
        self.respond_to_ask(AskResponse::Approved).await
    }

    /// Switch operating mode for the live task
    ///
    /// Returns whether a message was sent as part of the transition. The new
    /// mode is persisted and usage recorded before this returns.
    pub async fn toggle_mode(
        &mut self,
        new_mode: Mode,
        chat_settings: Option<ChatSettings>,
        content: Option<String>,
    ) -> Result<bool, TaskError> {
        debug!(%new_mode, "TaskOrchestrator::toggle_mode: called");
        let settings = chat_settings.ok_or(TaskError::MissingSettings)?;
        settings.validate().map_err(TaskError::InvalidConfig)?;

        let task_id = {
            let Some(task) = self.task.as_mut() else {
                return Err(TaskError::StateMismatch {
                    op: "toggle_mode",
                    phase: self.phase,
                });
            };
            task.mode = new_mode;
            task.settings = settings.clone();
            task.id.clone()
        };

        let mut meta = self.store.load(&task_id).await?;
        meta.mode = new_mode;
        self.store.save(&task_id, &meta).await?;

        let recorded = self
            .usage
            .record(&task_id, &settings.model_id, &settings.provider_id, new_mode)
            .await?;

        if let Some(emitter) = &self.emitter {
            emitter.mode_changed(new_mode, &settings.model_id);
            if recorded {
                emitter.usage_recorded(&settings.model_id, &settings.provider_id, new_mode);
            }
        }

        let sent = if let Some(text) = content {
            if let Some(task) = self.task.as_mut() {
                task.push_message(Message::user(text));
            }
            true
        } else {
            false
        };

        info!(%task_id, mode = %new_mode, sent, "TaskOrchestrator::toggle_mode: mode switched");
        Ok(sent)
    }

    /// Register a cancellable hook against the live task
    ///
    /// The returned token is a child of the task's root token, so cancelling
    /// the task also cancels the hook. Replaces any previously registered
    /// hook handle.
    pub fn register_hook(&mut self, name: impl Into<String>) -> Result<CancellationToken, TaskError> {
        let name = name.into();
        debug!(%name, "TaskOrchestrator::register_hook: called");
        let Some(task) = self.task.as_mut() else {
            return Err(TaskError::StateMismatch {
                op: "register_hook",
                phase: self.phase,
            });
        };
        let token = task.cancel.child_token();
        task.hook = Some(HookHandle {
            name,
            token: token.clone(),
        });
        Ok(token)
    }

    /// Cancel the active hook, if any
    ///
    /// Cancelling nothing is a no-op, not a failure: returns false.
    pub fn cancel_hook(&mut self) -> bool {
        debug!("TaskOrchestrator::cancel_hook: called");
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        match task.hook.take() {
            Some(hook) => {
                hook.token.cancel();
                if let Some(emitter) = &self.emitter {
                    emitter.hook_cancelled(&hook.name);
                }
                true
            }
            None => false,
        }
    }

    /// Cancel the live task
    ///
    /// Cooperative: flips the task's token; in-flight work observes it at its
    /// own suspension points. No-op when nothing is live.
    pub fn cancel_task(&mut self) {
        debug!(phase = %self.phase, "TaskOrchestrator::cancel_task: called");
        let Some(task) = self.task.as_ref() else {
            return;
        };
        task.cancel.cancel();
        if !self.phase.is_terminal() {
            self.pending_ask = None;
            self.finish_cancelled();
        }
    }

    /// Discard the live task and return to Idle
    ///
    /// Guarded: clearing a task that is still in flight is a state mismatch.
    pub fn clear_task(&mut self) -> Result<(), TaskError> {
        debug!(phase = %self.phase, "TaskOrchestrator::clear_task: called");
        if matches!(
            self.phase,
            Phase::Running | Phase::AwaitingUserInput | Phase::CondensingContext
        ) {
            return Err(TaskError::StateMismatch {
                op: "clear_task",
                phase: self.phase,
            });
        }
        self.task = None;
        self.emitter = None;
        self.pending_ask = None;
        self.condense_declined = false;
        self.phase = Phase::Idle;
        Ok(())
    }

    // === internals ===

    fn raise_ask(&mut self, kind: AskKind, prompt: String, tool_call: Option<ToolCallRequest>) {
        debug!(?kind, "TaskOrchestrator::raise_ask: blocking on user input");
        if let Some(emitter) = &self.emitter {
            emitter.ask_raised(kind, &prompt);
        }
        self.pending_ask = Some(PendingAsk {
            kind,
            prompt,
            tool_call,
        });
        self.phase = Phase::AwaitingUserInput;
    }

    async fn execute_tool(&mut self, call: ToolCallRequest) -> Result<(), TaskError> {
        debug!(server = %call.server, tool = %call.tool, "TaskOrchestrator::execute_tool: called");
        if let Some(emitter) = &self.emitter {
            emitter.tool_call_started(&call.server, &call.tool);
        }

        let cancel = match self.task.as_ref() {
            Some(task) => task.cancel.clone(),
            None => {
                return Err(TaskError::StateMismatch {
                    op: "execute_tool",
                    phase: self.phase,
                })
            }
        };

        let result = self.hub.call_tool(&call.server, &call.tool, call.args.clone(), &cancel).await;

        match result {
            Ok(value) => {
                if let Some(task) = self.task.as_mut() {
                    task.push_message(Message::user_blocks(vec![ContentBlock::ToolResult {
                        server: call.server.clone(),
                        tool: call.tool.clone(),
                        content: value.to_string(),
                        is_error: false,
                    }]));
                }
                if let Some(emitter) = &self.emitter {
                    emitter.tool_call_completed(&call.server, &call.tool, true);
                }
            }
            Err(HubError::Retry(RetryError::Cancelled)) => {
                self.finish_cancelled();
            }
            Err(e) => {
                // A failed tool call is reported to the model, not fatal to
                // the task.
                warn!(error = %e, "TaskOrchestrator::execute_tool: tool call failed");
                if let Some(task) = self.task.as_mut() {
                    task.push_message(Message::user_blocks(vec![ContentBlock::ToolResult {
                        server: call.server.clone(),
                        tool: call.tool.clone(),
                        content: e.to_string(),
                        is_error: true,
                    }]));
                }
                if let Some(emitter) = &self.emitter {
                    emitter.tool_call_completed(&call.server, &call.tool, false);
                }
            }
        }
        Ok(())
    }

    fn update_focus(&mut self, items: Vec<TodoItem>) {
        debug!(count = items.len(), "TaskOrchestrator::update_focus: called");
        if let Some(task) = self.task.as_mut() {
            task.set_focus_chain(items);
        }
    }

    /// Collapse older conversation into a summary marker, keeping the opening
    /// message and a recent tail verbatim
    fn condense_now(&mut self) {
        let Some(task) = self.task.as_mut() else {
            return;
        };
        let before = task.messages.len();
        if before <= CONDENSE_KEEP_RECENT + 1 {
            debug!(before, "TaskOrchestrator::condense_now: nothing to condense");
            return;
        }

        let dropped = before - 1 - CONDENSE_KEEP_RECENT;
        let mut condensed = Vec::with_capacity(CONDENSE_KEEP_RECENT + 2);
        condensed.push(task.messages[0].clone());
        condensed.push(Message::user(format!(
            "[Earlier context condensed: {} messages summarized and removed]",
            dropped
        )));
        condensed.extend(task.messages[before - CONDENSE_KEEP_RECENT..].iter().cloned());
        task.messages = condensed;

        let after = task.messages.len();
        info!(before, after, "TaskOrchestrator::condense_now: conversation condensed");
        if let Some(emitter) = &self.emitter {
            emitter.context_condensed(before, after);
        }
    }

    fn finish_completed(&mut self) {
        let turns = self.task.as_ref().map(|t| t.turns).unwrap_or(0);
        info!(turns, "TaskOrchestrator: task completed");
        self.phase = Phase::Completed;
        if let Some(emitter) = &self.emitter {
            emitter.task_completed(turns);
        }
    }

    fn finish_failed(&mut self, reason: &str) {
        self.phase = Phase::Failed;
        if let Some(emitter) = &self.emitter {
            emitter.task_failed(reason);
        }
    }

    fn finish_cancelled(&mut self) {
        let before = self.phase;
        info!(phase_before = %before, "TaskOrchestrator: task cancelled");
        self.phase = Phase::Cancelled;
        if let Some(emitter) = &self.emitter {
            emitter.task_cancelled(before);
        }
    }
}
