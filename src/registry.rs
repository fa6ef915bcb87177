//! `RegistryService`: dispatches the six registry operations under the
//! persistence lock and owns agent-scope checks.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::RegistryError;
use crate::ids::{IdGenerator, UuidGenerator};
use crate::model::{LoopRecord, Priority, Recommendation, Store};
use crate::normalize;
use crate::params::{
    CheckpointParams, CloseParams, ContinueParams, ListParams, Params, StartParams, StatusParams,
};
use crate::persistence;
use crate::response::{Envelope, LoopView, OkPayload};
use crate::session::{SessionResolver, Sha256SessionResolver};
use crate::state_machine::{self, CheckpointInput, StartInput};
use crate::time::{Clock, SystemClock};
use crate::triage;

/// Agent-scoped entry point for the registry. One instance is constructed
/// per session; its `owner_agent_id` is resolved once at construction and
/// used to filter every operation it performs.
pub struct RegistryService {
    store_path: PathBuf,
    owner_agent_id: String,
    session_key: String,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl RegistryService {
    /// Construct a service for `session_key` against the default store path,
    /// with the default system clock, UUID generator, and SHA-256 session
    /// resolver.
    pub fn new(session_key: impl Into<String>) -> Self {
        Self::with_dependencies(
            session_key,
            persistence::default_store_path(),
            Arc::new(SystemClock),
            Arc::new(UuidGenerator),
            Arc::new(Sha256SessionResolver),
        )
    }

    /// Construct a service with every injected capability made explicit —
    /// the constructor tests and embedding frameworks use.
    pub fn with_dependencies(
        session_key: impl Into<String>,
        store_path: PathBuf,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        resolver: Arc<dyn SessionResolver>,
    ) -> Self {
        let session_key = session_key.into();
        let owner_agent_id = resolver.resolve_agent_id(&session_key);
        Self {
            store_path,
            owner_agent_id,
            session_key,
            clock,
            ids,
        }
    }

    pub fn owner_agent_id(&self) -> &str {
        &self.owner_agent_id
    }

    /// Decode a raw `{ "action": "...", ... }` JSON payload and dispatch it.
    /// Unknown/missing actions return `unsupported action: <action>`
    /// without touching the store.
    pub async fn execute_json(&self, tool_call_id: String, mut value: serde_json::Value) -> Envelope {
        let action = value
            .get("action")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.remove("action");
        }
        match crate::params::decode_params(&action, value) {
            Ok(params) => self.execute(tool_call_id, params).await,
            Err(message) => Envelope::Error {
                tool_call_id,
                error: message,
            },
        }
    }

    /// Dispatch a typed `Params` value to the corresponding operation.
    pub async fn execute(&self, tool_call_id: String, params: Params) -> Envelope {
        let action = params.action_name();
        debug!(action, tool_call_id = %tool_call_id, "dispatching registry operation");
        let result = match params {
            Params::Start(p) => self.start(&tool_call_id, p).await,
            Params::Checkpoint(p) => self.checkpoint(&tool_call_id, p).await,
            Params::Continue(p) => self.continue_op(&tool_call_id, p).await,
            Params::Status(p) => self.status(&tool_call_id, p).await,
            Params::List(p) => self.list(&tool_call_id, p).await,
            Params::Close(p) => self.close(&tool_call_id, p).await,
        };
        match result {
            Ok(envelope) => {
                info!(action, tool_call_id = %tool_call_id, "registry operation succeeded");
                envelope
            }
            Err(err) => {
                info!(action, tool_call_id = %tool_call_id, error = %err, "registry operation failed");
                Envelope::Error {
                    tool_call_id,
                    error: err.message(),
                }
            }
        }
    }

    async fn start(&self, tool_call_id: &str, params: StartParams) -> Result<Envelope, RegistryError> {
        if params.topic.trim().is_empty() {
            return Err(RegistryError::Validation("topic required".to_string()));
        }
        let max_rounds = normalize::clamp_max_rounds(params.max_rounds);
        let priority = params.priority.unwrap_or(Priority::Normal);

        let record = state_machine::start(
            StartInput {
                topic: params.topic,
                priority,
                max_rounds,
                owner_agent_id: self.owner_agent_id.clone(),
                session_key: Some(self.session_key.clone()),
            },
            self.clock.as_ref(),
            self.ids.as_ref(),
        );

        let loop_id = record.loop_id.clone();
        persistence::locked_mutate(&self.store_path, move |store| {
            store.loops.insert(loop_id, record.clone());
            Ok(record)
        })
        .await
        .map(|record| Envelope::Started {
            tool_call_id: tool_call_id.to_string(),
            loop_view: LoopView::from(&record),
        })
    }

    async fn checkpoint(
        &self,
        tool_call_id: &str,
        params: CheckpointParams,
    ) -> Result<Envelope, RegistryError> {
        if params.loop_id.trim().is_empty() {
            return Err(RegistryError::LoopIdRequired);
        }
        if params.summary.trim().is_empty() {
            return Err(RegistryError::Validation("summary required".to_string()));
        }

        let owner_agent_id = self.owner_agent_id.clone();
        let clock = self.clock.clone();
        let (record, can_continue, advice) =
            persistence::locked_mutate(&self.store_path, move |store| {
                let record = find_owned_mut(store, &params.loop_id, &owner_agent_id)?;

                let input = CheckpointInput {
                    summary: params.summary,
                    critique: params.critique,
                    recommendation: params.recommendation.unwrap_or(Recommendation::NeedsInput),
                    proposed_tasks: params.proposed_tasks,
                    importance: normalize::clamp_rating(params.importance),
                    urgency: normalize::clamp_rating(params.urgency),
                    confidence: normalize::clamp_rating(params.confidence),
                    evidence_quality: normalize::clamp_rating(params.evidence_quality),
                    citation_links: params.citation_links,
                    counterpoints: params.counterpoints,
                    why_now: params.why_now,
                };

                state_machine::checkpoint(record, input, clock.as_ref())?;

                let can_continue = record
                    .last_checkpoint()
                    .map(|c| c.recommendation == Recommendation::Continue)
                    .unwrap_or(false)
                    && record.current_round < record.max_rounds;
                let advice = triage::spawn_advice(record, can_continue);
                Ok((record.clone(), can_continue, advice))
            })
            .await?;

        Ok(Envelope::Checkpointed {
            tool_call_id: tool_call_id.to_string(),
            loop_view: LoopView::from(&record),
            can_continue,
            spawn_advice: advice,
        })
    }

    async fn continue_op(
        &self,
        tool_call_id: &str,
        params: ContinueParams,
    ) -> Result<Envelope, RegistryError> {
        if params.loop_id.trim().is_empty() {
            return Err(RegistryError::LoopIdRequired);
        }
        let owner_agent_id = self.owner_agent_id.clone();
        let clock = self.clock.clone();
        let record = persistence::locked_mutate(&self.store_path, move |store| {
            let record = find_owned_mut(store, &params.loop_id, &owner_agent_id)?;
            state_machine::continue_loop(record, params.reason, clock.as_ref())?;
            Ok(record.clone())
        })
        .await?;

        Ok(Envelope::Continued {
            tool_call_id: tool_call_id.to_string(),
            loop_view: LoopView::from(&record),
        })
    }

    async fn status(&self, tool_call_id: &str, params: StatusParams) -> Result<Envelope, RegistryError> {
        if params.loop_id.trim().is_empty() {
            return Err(RegistryError::LoopIdRequired);
        }
        // status reads without the lock: a slightly stale
        // but always well-formed snapshot is acceptable here.
        let store = persistence::load(&self.store_path);
        let record = find_owned(&store, &params.loop_id, &self.owner_agent_id)?;
        Ok(Envelope::Ok {
            tool_call_id: tool_call_id.to_string(),
            payload: OkPayload::Loop {
                loop_view: LoopView::from(record),
            },
        })
    }

    async fn list(&self, tool_call_id: &str, params: ListParams) -> Result<Envelope, RegistryError> {
        let store = persistence::load(&self.store_path);
        let owner_agent_id = &self.owner_agent_id;
        let owned = store
            .loops
            .values()
            .filter(|r| r.owner_agent_id == *owner_agent_id);

        let view = params.view.unwrap_or_default();
        let stale_hours = triage::clamp_stale_hours(params.stale_hours);
        let limit = triage::clamp_limit(params.limit);
        let now = self.clock.now_millis();

        let items = triage::list_view(owned, params.state, view, stale_hours, limit, now);
        Ok(Envelope::Ok {
            tool_call_id: tool_call_id.to_string(),
            payload: OkPayload::List { loops: items },
        })
    }

    async fn close(&self, tool_call_id: &str, params: CloseParams) -> Result<Envelope, RegistryError> {
        if params.loop_id.trim().is_empty() {
            return Err(RegistryError::LoopIdRequired);
        }
        let owner_agent_id = self.owner_agent_id.clone();
        let clock = self.clock.clone();
        let record = persistence::locked_mutate(&self.store_path, move |store| {
            let record = find_owned_mut(store, &params.loop_id, &owner_agent_id)?;
            state_machine::close(record, params.reason, clock.as_ref());
            Ok(record.clone())
        })
        .await?;

        Ok(Envelope::Closed {
            tool_call_id: tool_call_id.to_string(),
            loop_view: LoopView::from(&record),
        })
    }
}

/// Look up a loop by id, distinguishing "not found" from "not accessible"
/// so no operation reveals whether another agent's loop exists.
fn find_owned<'a>(
    store: &'a Store,
    loop_id: &str,
    owner_agent_id: &str,
) -> Result<&'a LoopRecord, RegistryError> {
    match store.loops.get(loop_id) {
        None => Err(RegistryError::NotFound(loop_id.to_string())),
        Some(record) if record.owner_agent_id != owner_agent_id => {
            Err(RegistryError::NotAccessible(loop_id.to_string()))
        }
        Some(record) => Ok(record),
    }
}

fn find_owned_mut<'a>(
    store: &'a mut Store,
    loop_id: &str,
    owner_agent_id: &str,
) -> Result<&'a mut LoopRecord, RegistryError> {
    match store.loops.get_mut(loop_id) {
        None => Err(RegistryError::NotFound(loop_id.to_string())),
        Some(record) if record.owner_agent_id != owner_agent_id => {
            Err(RegistryError::NotAccessible(loop_id.to_string()))
        }
        Some(record) => Ok(record),
    }
}
