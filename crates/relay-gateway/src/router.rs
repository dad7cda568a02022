//! Router/Orchestrator (§4.8): the central decision function for every
//! inbound customer-authored message. Persists and fans out first, then —
//! when nothing already holds the conversation under human handover —
//! classifies, resolves an addressee, evaluates handover triggers, and
//! invokes an agent. One `tokio::sync::mpsc` work queue per conversation id
//! keeps a single conversation's messages in order while different
//! conversations run fully concurrently, directly the teacher's
//! per-session/per-operation task-and-channel idiom generalized from "one
//! cancellable operation per session" to "one ordered queue per
//! conversation."

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use relay_agents::{Agent, AgentReply, Message as LlmMessage, Role as LlmRole, ToolCall};
use relay_channels::types::{MessageFormat, OutboundMessage};
use relay_core::types::{AgentKey, ConversationId, MessageKind, UserId, UserRole};
use relay_core::RelayError;
use relay_handover::types::{ContextSnapshot, NewHandoverTicket, TriggerReason};
use relay_messages::{Message, NewMessage};
use relay_nlu::entities::Entity;
use relay_nlu::intents::Intent;
use relay_protocol::frames::EventFrame;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::app::AppState;

/// Synthetic author of every bot/agent-originated message: every
/// customer-originated conversation is {customerUserId, SYSTEM_USER_ID},
/// whichever bot or human operator ultimately answers it.
pub const SYSTEM_USER_ID: &str = "system";

const CONVERSATION_QUEUE_CAPACITY: usize = 64;
const AGENT_REPLY_DEADLINE: Duration = Duration::from_secs(12);
const CANNOT_HELP_MARKERS: [&str; 2] = ["having trouble responding", "cannot help"];

/// One unit of work handed to a conversation's worker task. `respond_to` is
/// how the HTTP/WS caller that originated the message gets back the
/// persisted `Message` (or error) without waiting for the bot pipeline that
/// may run afterward.
pub struct RouterJob {
    pub new_message: NewMessage,
    pub respond_to: Option<oneshot::Sender<Result<Message, RelayError>>>,
}

/// Enqueue `job` onto its conversation's worker, spawning the worker on
/// first use.
pub fn dispatch(state: &Arc<AppState>, job: RouterJob) {
    let conversation_id = job.new_message.conversation_id.clone();
    let sender = state
        .router_queues
        .entry(conversation_id.clone())
        .or_insert_with(|| spawn_worker(state.clone(), conversation_id.clone()))
        .clone();
    if let Err(err) = sender.try_send(job) {
        warn!(%conversation_id, "router queue rejected job, replying with unavailable");
        if let mpsc::error::TrySendError::Full(job) | mpsc::error::TrySendError::Closed(job) = err {
            if let Some(tx) = job.respond_to {
                let _ = tx.send(Err(RelayError::Unavailable("router queue is saturated".to_string())));
            }
        }
    }
}

fn spawn_worker(state: Arc<AppState>, conversation_id: ConversationId) -> mpsc::Sender<RouterJob> {
    let (tx, mut rx) = mpsc::channel(CONVERSATION_QUEUE_CAPACITY);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            handle_job(&state, job).await;
        }
    });
    tx
}

async fn handle_job(state: &Arc<AppState>, job: RouterJob) {
    let RouterJob { new_message, respond_to } = job;
    let is_main_timeline = new_message.contact_id.is_none();
    let author = new_message.author.clone();
    let conversation_id = new_message.conversation_id.clone();

    let message = match state.messages.append(new_message) {
        Ok(m) => m,
        Err(err) => {
            let relay_err = RelayError::from(err);
            if let Some(tx) = respond_to {
                let _ = tx.send(Err(relay_err));
            }
            return;
        }
    };

    state.presence.broadcast_message(&message, None);
    if let Some(tx) = respond_to {
        let _ = tx.send(Ok(message.clone()));
    }

    if !is_main_timeline {
        return;
    }
    let Ok(Some(author_user)) = state.contacts.get_user(&author) else {
        return;
    };
    if author_user.role != UserRole::External {
        return;
    }

    if let Err(err) = route_to_bot(state, &conversation_id, &message, &author).await {
        error!(%conversation_id, %err, "router pipeline failed");
    }
}

async fn route_to_bot(
    state: &Arc<AppState>,
    conversation_id: &ConversationId,
    inbound: &Message,
    customer: &UserId,
) -> Result<(), RelayError> {
    // Step 3: an open ticket takes the conversation out of bot control entirely.
    if state.handovers.has_open_ticket(conversation_id)? {
        return Ok(());
    }

    let classification = state.nlu.classify(&inbound.text, "customer").await;

    // Step 4: resolve the addressee.
    let addressee = resolve_addressee(state, conversation_id, &inbound.text, classification.intent)?;

    // Step 5: evaluate handover triggers, in the order they're listed in
    // §4.6, before ever invoking an agent.
    let mut fired = Vec::new();
    if classification.intent == Intent::RequestHuman {
        fired.push(TriggerReason::ExplicitRequest);
    }
    if classification.intent == Intent::Complaint {
        fired.push(TriggerReason::Complaint);
    }
    if classification.confidence < state.config.nlu.low_confidence_threshold as f32 {
        let streak = bump_low_confidence_streak(state, conversation_id);
        if streak >= 2 {
            fired.push(TriggerReason::LowConfidence);
        }
    } else {
        reset_low_confidence_streak(state, conversation_id);
    }
    if is_out_of_hours(state) {
        fired.push(TriggerReason::OutOfHours);
    }

    if !fired.is_empty() {
        open_handover_ticket(state, conversation_id, &classification.entities, fired, &addressee)?;
        return Ok(());
    }

    // Step 6: invoke the agent.
    let history = recent_history(state, conversation_id, inbound.id.as_str())?;
    let entities_summary = summarize_entities(&classification.entities);
    let toolbelt = vec![
        relay_agents::agent::schedule_meeting_tool(),
        relay_agents::agent::fetch_availability_tool(),
    ];

    let reply = addressee
        .respond(
            state.llm.as_ref(),
            &history,
            &inbound.text,
            &entities_summary,
            &toolbelt,
            AGENT_REPLY_DEADLINE,
        )
        .await;

    if let AgentReply::Text(text) = &reply {
        if CANNOT_HELP_MARKERS.iter().any(|marker| text.to_lowercase().contains(marker)) {
            open_handover_ticket(state, conversation_id, &classification.entities, vec![TriggerReason::Escalation], &addressee)?;
        }
    }

    let reply_message = persist_agent_reply(state, conversation_id, &addressee.key(), &reply)?;

    // Step 7: tool calls feed the scheduling state machine. A handled tool
    // call doesn't replace the textual reply above — `schedule_meeting`/
    // `fetch_availability` arrive as a second, immediate follow-up turn once
    // the agent decides to call them, mirroring the SDR agent's own prompt
    // ("when the customer has chosen a slot, call the tool").
    if let AgentReply::Tool(call) = &reply {
        handle_tool_call(state, conversation_id, &addressee, call).await?;
    }

    // Step 8: dispatch back to the originating channel, if this customer is
    // bound to one.
    if let Some(reply_message) = reply_message {
        dispatch_to_channel(state, customer, &reply_message).await;
    }

    Ok(())
}

fn summarize_entities(entities: &[Entity]) -> String {
    entities.iter().map(|e| format!("{:?}={}", e.kind, e.value)).collect::<Vec<_>>().join("; ")
}

fn resolve_addressee(
    state: &Arc<AppState>,
    conversation_id: &ConversationId,
    text: &str,
    intent: Intent,
) -> Result<Agent, RelayError> {
    if let Some(mentioned) = parse_mention(text) {
        if let Some(agent) = lookup_agent(state, &mentioned)? {
            return Ok(agent);
        }
    }

    if let Some(last_key) = last_agent_key_used(state, conversation_id)? {
        if let Some(agent) = lookup_agent(state, last_key.as_str())? {
            return Ok(agent);
        }
    }

    let built_in = match intent {
        Intent::Scheduling => relay_agents::BuiltInKind::Sdr,
        Intent::Legal => relay_agents::BuiltInKind::Legal,
        Intent::TechnicalSupport => relay_agents::BuiltInKind::TechnicalSupport,
        _ => relay_agents::BuiltInKind::Concierge,
    };
    Ok(built_in_agent(state, built_in))
}

fn parse_mention(text: &str) -> Option<String> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix('@')?;
    let key: String = rest.chars().take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_').collect();
    if key.is_empty() {
        None
    } else {
        Some(key.to_lowercase())
    }
}

fn lookup_agent(state: &Arc<AppState>, key: &str) -> Result<Option<Agent>, RelayError> {
    if let Some(kind) = built_in_kind_from_key(key) {
        return Ok(Some(built_in_agent(state, kind)));
    }
    match state.agent_store.get(key) {
        Ok(Some(row)) => Ok(Some(Agent::Custom(row))),
        Ok(None) => Ok(None),
        Err(err) => Err(RelayError::from(err)),
    }
}

fn built_in_kind_from_key(key: &str) -> Option<relay_agents::BuiltInKind> {
    Some(match key {
        "concierge" => relay_agents::BuiltInKind::Concierge,
        "sdr" | "scheduling" => relay_agents::BuiltInKind::Sdr,
        "legal" => relay_agents::BuiltInKind::Legal,
        "support" | "technical_support" => relay_agents::BuiltInKind::TechnicalSupport,
        _ => return None,
    })
}

fn built_in_agent(state: &Arc<AppState>, kind: relay_agents::BuiltInKind) -> Agent {
    Agent::BuiltIn(kind, state.built_in_agent_config(kind))
}

/// The "open agent panel context" addressee rule (§4.8 step 4), applied to
/// the main customer timeline: once an agent has answered in this
/// conversation, later customer turns stay addressed to it until a human
/// operator or a fresh @mention redirects (explicit @mention always wins;
/// this is the fallback before falling through to intent mapping).
fn last_agent_key_used(state: &Arc<AppState>, conversation_id: &ConversationId) -> Result<Option<AgentKey>, RelayError> {
    let page = state.messages.get(conversation_id, None, Some(20)).map_err(RelayError::from)?;
    Ok(page.messages.into_iter().find_map(|m| if m.contact_id.is_none() { m.agent_key } else { None }))
}

/// The last K messages on the main timeline, chronological (store order is
/// newest-first), excluding the inbound message itself and any agent-panel
/// side-channel traffic.
fn recent_history(state: &Arc<AppState>, conversation_id: &ConversationId, before_self: &str) -> Result<Vec<LlmMessage>, RelayError> {
    let limit = state.config.handover.context_snapshot_messages as u32;
    let page = state.messages.get(conversation_id, None, Some(limit)).map_err(RelayError::from)?;
    let mut history: Vec<LlmMessage> = page
        .messages
        .into_iter()
        .filter(|m| m.id.as_str() != before_self && m.contact_id.is_none())
        .map(|m| LlmMessage {
            role: if m.agent_key.is_some() { LlmRole::Assistant } else { LlmRole::User },
            content: m.text,
        })
        .collect();
    history.reverse();
    Ok(history)
}

fn bump_low_confidence_streak(state: &Arc<AppState>, conversation_id: &ConversationId) -> u8 {
    let mut entry = state.low_confidence_streak.entry(conversation_id.clone()).or_insert(0);
    *entry = entry.saturating_add(1);
    *entry
}

fn reset_low_confidence_streak(state: &Arc<AppState>, conversation_id: &ConversationId) {
    state.low_confidence_streak.remove(conversation_id);
}

/// Out-of-hours gate (§4.6 trigger 5): only relevant when the configured
/// policy forbids bot-only service outside working hours.
fn is_out_of_hours(state: &Arc<AppState>) -> bool {
    if state.config.handover.bot_only_out_of_hours {
        return false;
    }
    let hour = Utc::now().hour();
    hour < state.config.scheduling.working_hours_start || hour >= state.config.scheduling.working_hours_end
}

fn open_handover_ticket(
    state: &Arc<AppState>,
    conversation_id: &ConversationId,
    entities: &[Entity],
    fired_reasons: Vec<TriggerReason>,
    addressee: &Agent,
) -> Result<(), RelayError> {
    let snapshot_page = state
        .messages
        .get(conversation_id, None, Some(state.config.handover.context_snapshot_messages as u32))
        .map_err(RelayError::from)?;
    let snapshot = ContextSnapshot {
        last_messages: snapshot_page.messages.iter().rev().map(|m| m.text.clone()).collect(),
        extracted_entities: entities.iter().map(|e| format!("{:?}={}", e.kind, e.value)).collect(),
        last_intent: None,
    };

    state.handovers.create(NewHandoverTicket {
        conversation_id: conversation_id.clone(),
        customer_name: None,
        customer_email: None,
        customer_phone: None,
        fired_reasons,
        context_snapshot: snapshot,
    })?;

    info!(%conversation_id, "handover ticket opened, bot dispatch suspended");

    persist_agent_reply(
        state,
        conversation_id,
        &addressee.key(),
        &AgentReply::Text("Thanks for your patience — connecting you to a person.".to_string()),
    )?;
    Ok(())
}

pub(crate) fn persist_agent_reply(
    state: &Arc<AppState>,
    conversation_id: &ConversationId,
    agent_key: &AgentKey,
    reply: &AgentReply,
) -> Result<Option<Message>, RelayError> {
    let text = match reply {
        AgentReply::Text(text) => text.clone(),
        AgentReply::Tool(_) => return Ok(None),
    };

    let new_message = NewMessage {
        conversation_id: conversation_id.clone(),
        author: UserId::from(SYSTEM_USER_ID),
        kind: MessageKind::Text,
        text,
        attachment: None,
        agent_key: Some(agent_key.clone()),
        contact_id: None,
        client_temp_id: None,
    };
    let message = state.messages.append(new_message).map_err(RelayError::from)?;
    state.presence.broadcast_message(&message, None);
    Ok(Some(message))
}

async fn handle_tool_call(state: &Arc<AppState>, conversation_id: &ConversationId, agent: &Agent, call: &ToolCall) -> Result<(), RelayError> {
    match call.name.as_str() {
        "fetch_availability" => {
            let date = call
                .arguments
                .get("date")
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
            let Some(date) = date else {
                return Ok(());
            };
            let customer_email = call.arguments.get("customer_email").and_then(|v| v.as_str()).unwrap_or("").to_string();
            state.scheduling.start(conversation_id);
            match state.scheduling.provide_identity(conversation_id, &customer_email, &[date]).await {
                Ok(slots) if !slots.is_empty() => emit_slot_picker(state, conversation_id, agent, &customer_email),
                Ok(_) => {
                    persist_agent_reply(
                        state,
                        conversation_id,
                        &agent.key(),
                        &AgentReply::Text("No open slots on that day — want to try another?".to_string()),
                    )?;
                }
                Err(err) => warn!(%conversation_id, %err, "availability lookup failed"),
            }
        }
        "schedule_meeting" => {
            let start = call
                .arguments
                .get("start")
                .and_then(|v| v.as_str())
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&chrono::Utc));
            let duration_minutes = call.arguments.get("duration_minutes").and_then(|v| v.as_i64()).unwrap_or(60);
            let Some(start) = start else {
                return Ok(());
            };
            let slot = relay_scheduling::TimeSlot { start, end: start + chrono::Duration::minutes(duration_minutes) };

            // §4.7: the agent only ever *proposes* a slot here — whether that
            // lands straight in `Committing` or waits in `Confirming` for an
            // operator is the per-(tenant, agent) `auto_commit` policy, never
            // a blanket skip of the handshake.
            match state.scheduling.propose_slot_for_agent(conversation_id, slot, agent.auto_commit()) {
                Ok(relay_scheduling::SchedulingState::Committing { .. }) => {
                    match state.scheduling.commit(conversation_id, agent.key().as_str()).await {
                        Ok(commitment) => {
                            let text = format!(
                                "You're booked for {} — join here: {}",
                                commitment.start.to_rfc3339(),
                                commitment.meeting_url.as_deref().unwrap_or("(link pending)")
                            );
                            persist_agent_reply(state, conversation_id, &agent.key(), &AgentReply::Text(text))?;
                        }
                        Err(err) => {
                            warn!(%conversation_id, %err, "calendar commit failed");
                            persist_agent_reply(
                                state,
                                conversation_id,
                                &agent.key(),
                                &AgentReply::Text("Sorry, I couldn't lock in that slot — a team member will confirm shortly.".to_string()),
                            )?;
                        }
                    }
                }
                Ok(relay_scheduling::SchedulingState::Confirming { .. }) => {
                    state.scheduling_agent.insert(conversation_id.clone(), agent.key());
                    persist_agent_reply(
                        state,
                        conversation_id,
                        &agent.key(),
                        &AgentReply::Text("Let me check that time with the team — I'll confirm shortly.".to_string()),
                    )?;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(%conversation_id, %err, "slot proposal failed");
                    persist_agent_reply(
                        state,
                        conversation_id,
                        &agent.key(),
                        &AgentReply::Text("Sorry, I couldn't lock in that slot — a team member will confirm shortly.".to_string()),
                    )?;
                }
            }
        }
        other => warn!(%conversation_id, tool = other, "agent requested an unknown tool"),
    }
    Ok(())
}

fn emit_slot_picker(state: &Arc<AppState>, conversation_id: &ConversationId, agent: &Agent, customer_email: &str) {
    let working_days = (0..state.config.scheduling.lookahead_days)
        .filter_map(|offset| {
            let date = Utc::now().date_naive() + chrono::Duration::days(offset as i64);
            let is_weekend = matches!(date.format("%A").to_string().as_str(), "Saturday" | "Sunday");
            (!is_weekend).then(|| date.to_string())
        })
        .collect();

    let payload = relay_protocol::events::ShowSlotPickerEvent {
        agent_key: agent.key().as_str().to_string(),
        customer_email: Some(customer_email.to_string()).filter(|s| !s.is_empty()),
        customer_phone: None,
        working_days,
        working_hours: (state.config.scheduling.working_hours_start, state.config.scheduling.working_hours_end),
        default_duration_minutes: state.config.scheduling.slot_duration_minutes,
    };
    let frame = EventFrame::new(relay_protocol::methods::AGENT_SHOW_SLOT_PICKER, serde_json::json!(payload));
    state.presence.broadcast_event(conversation_id, frame);
}

/// §4.8 step 8: an agent reply is forwarded to the customer's external
/// channel when the conversation's customer is a resolved external contact.
/// Failure is logged; the stored delivery status simply never advances past
/// `sent` for this message.
async fn dispatch_to_channel(state: &Arc<AppState>, customer: &UserId, message: &Message) {
    let Ok(Some((channel, native_id))) = state.contacts.channel_of(customer) else {
        return;
    };
    let Some(kind) = relay_channels::types::ChannelKind::from_str_opt(&channel) else {
        return;
    };
    let Some(adapter) = state.channels.get(kind.as_str()) else {
        warn!(channel = kind.as_str(), "no adapter registered for originating channel");
        return;
    };
    let outbound = OutboundMessage {
        channel: kind,
        recipient_id: native_id,
        text: message.text.clone(),
        media_url: None,
        format: MessageFormat::PlainText,
    };
    if let Err(err) = adapter.send(&outbound).await {
        error!(channel = kind.as_str(), %err, message_id = %message.id, "channel dispatch failed");
    }
}
