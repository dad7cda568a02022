use dashmap::{DashMap, DashSet};
use relay_core::types::{AgentKey, ConversationId, MessageId, UserId};
use relay_messages::Message;
use relay_protocol::{events, frames::EventFrame, methods};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{PresenceError, Result};
use crate::types::{PresenceState, RoomKey};

/// Outbound channel capacity per connection. A slow consumer drops its own
/// events rather than blocking the broadcaster (best-effort fan-out).
const CONN_QUEUE_CAPACITY: usize = 128;

pub type ConnSender = mpsc::Sender<EventFrame>;

/// Presence & Subscription Registry (§4.2): routes real-time events to
/// interested connections. Rooms are a `DashMap<RoomKey, DashSet<ConnId>>`;
/// broadcast is look up the set, push to each — the generalization of the
/// teacher's single global broadcast channel into room-keyed fan-out.
pub struct Registry {
    rooms: DashMap<RoomKey, DashSet<relay_core::types::ConnId>>,
    conn_rooms: DashMap<relay_core::types::ConnId, DashSet<RoomKey>>,
    conn_senders: DashMap<relay_core::types::ConnId, ConnSender>,
    conn_users: DashMap<relay_core::types::ConnId, UserId>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            conn_rooms: DashMap::new(),
            conn_senders: DashMap::new(),
            conn_users: DashMap::new(),
        }
    }

    /// attach(connection, user) — credential verification happens upstream
    /// (relay-users / the gateway's bearer-auth layer); by the time a
    /// connection reaches the registry it carries an already-resolved
    /// `UserId`. Binds connection→user and places it in its private room.
    pub fn attach(
        &self,
        conn: relay_core::types::ConnId,
        user: UserId,
    ) -> (ConnSender, mpsc::Receiver<EventFrame>) {
        let (tx, rx) = mpsc::channel(CONN_QUEUE_CAPACITY);
        self.conn_senders.insert(conn.clone(), tx.clone());
        self.conn_users.insert(conn.clone(), user.clone());
        self.join_room(&conn, RoomKey::User(user));
        (tx, rx)
    }

    /// join(connection, conversation) — idempotent.
    pub fn join(&self, conn: &relay_core::types::ConnId, conversation: ConversationId) -> Result<()> {
        self.require_attached(conn)?;
        self.join_room(conn, RoomKey::Conversation(conversation));
        Ok(())
    }

    /// join_agent_panel(connection, agentKey) — idempotent.
    pub fn join_agent_panel(
        &self,
        conn: &relay_core::types::ConnId,
        agent_key: AgentKey,
    ) -> Result<()> {
        let user = self.require_attached(conn)?;
        self.join_room(conn, RoomKey::AgentPanel(user, agent_key));
        Ok(())
    }

    /// leave(connection, room) — release one specific room.
    pub fn leave(&self, conn: &relay_core::types::ConnId, room: &RoomKey) {
        if let Some(set) = self.rooms.get(room) {
            set.remove(conn);
        }
        if let Some(set) = self.conn_rooms.get(conn) {
            set.remove(room);
        }
    }

    /// leave_agent_panel(connection, agentKey) — convenience for `agent:close`,
    /// which only knows the agent key and must resolve the owning user itself.
    pub fn leave_agent_panel(&self, conn: &relay_core::types::ConnId, agent_key: AgentKey) -> Result<()> {
        let user = self.require_attached(conn)?;
        self.leave(conn, &RoomKey::AgentPanel(user, agent_key));
        Ok(())
    }

    /// The user a connection is attached as, if any.
    pub fn user_of(&self, conn: &relay_core::types::ConnId) -> Option<UserId> {
        self.conn_users.get(conn).map(|u| u.clone())
    }

    /// detach(connection) — releases every room this connection held. Other
    /// connections of the same user are unaffected.
    pub fn detach(&self, conn: &relay_core::types::ConnId) {
        if let Some((_, rooms)) = self.conn_rooms.remove(conn) {
            for room in rooms.iter() {
                if let Some(set) = self.rooms.get(room.key()) {
                    set.remove(conn);
                }
            }
        }
        self.conn_senders.remove(conn);
        self.conn_users.remove(conn);
    }

    /// broadcast_message(storedMessage) (§4.2). `panel_user` must be supplied
    /// by the caller (the Router, which knows both conversation participants)
    /// when `message.agent_key` is set — the registry has no independent way
    /// to resolve which human a given agent-authored message belongs to.
    pub fn broadcast_message(&self, message: &Message, panel_user: Option<&UserId>) {
        self.deliver_to(&RoomKey::User(message.author.clone()), &self.echo_frame(message));

        match &message.agent_key {
            Some(agent_key) => {
                let owner = panel_user.cloned().unwrap_or_else(|| message.author.clone());
                let payload = events::AgentMessageEvent {
                    agent_key: agent_key.as_str().to_string(),
                    contact_id: message.contact_id.as_ref().map(|c| c.as_str().to_string()),
                    id: message.id.as_str().to_string(),
                    author: message.author.as_str().to_string(),
                    text: message.text.clone(),
                    timestamp: message.timestamp.to_rfc3339(),
                };
                let frame = EventFrame::new(methods::AGENT_MESSAGE, serde_json::json!(payload));
                self.deliver_to(&RoomKey::AgentPanel(owner, agent_key.clone()), &frame);
            }
            None => {
                let frame = self.echo_frame(message);
                self.deliver_to(&RoomKey::Conversation(message.conversation_id.clone()), &frame);
            }
        }
    }

    /// broadcast_presence(userId, state). Typing/online/offline are never
    /// persisted — pure fan-out to the user's own private room (other
    /// devices of the same identity).
    pub fn broadcast_presence(&self, user: &UserId, state: PresenceState) {
        let payload = events::UserPresenceEvent {
            user_id: user.as_str().to_string(),
            state: presence_state_str(state).to_string(),
        };
        let frame = EventFrame::new(methods::USER_PRESENCE, serde_json::json!(payload));
        self.deliver_to(&RoomKey::User(user.clone()), &frame);
    }

    /// Transient typing indicator, conversation-scoped (§6 `user:typing`).
    pub fn broadcast_typing(&self, conversation: &ConversationId, is_typing: bool) {
        let payload = serde_json::json!({
            "conversationId": conversation,
            "isTyping": is_typing,
        });
        let frame = EventFrame::new(methods::USER_TYPING, payload);
        self.deliver_to(&RoomKey::Conversation(conversation.clone()), &frame);
    }

    /// Deliver an arbitrary pre-built frame to every subscriber of a
    /// conversation room — used for events that don't fit the fixed
    /// `broadcast_*` shapes above (e.g. `agent:show-slot-picker`).
    pub fn broadcast_event(&self, conversation: &ConversationId, frame: EventFrame) {
        self.deliver_to(&RoomKey::Conversation(conversation.clone()), &frame);
    }

    /// broadcast_delivery(messageId, newStatus) — mirrors I3 transitions.
    pub fn broadcast_delivery(
        &self,
        conversation: &ConversationId,
        message_id: &MessageId,
        status: relay_core::types::DeliveryStatus,
    ) {
        let payload = events::ChatDeliveryEvent {
            message_id: message_id.as_str().to_string(),
            status: status.as_str().to_string(),
        };
        let frame = EventFrame::new(methods::CHAT_DELIVERY, serde_json::json!(payload));
        self.deliver_to(&RoomKey::Conversation(conversation.clone()), &frame);
    }

    /// `chat:new-message` echo, used for both the sender's private room and
    /// (for non-agent messages) the conversation room.
    fn echo_frame(&self, message: &Message) -> EventFrame {
        let payload = events::ChatNewMessageEvent {
            id: message.id.as_str().to_string(),
            author: message.author.as_str().to_string(),
            conversation_id: message.conversation_id.as_str().to_string(),
            timestamp: message.timestamp.to_rfc3339(),
            status: message.status.as_str().to_string(),
            kind: message.kind.as_str().to_string(),
            text: Some(message.text.clone()).filter(|t| !t.is_empty()),
            attachment: message.attachment.as_ref().map(|a| events::AttachmentRef {
                bucket: a.bucket.clone(),
                key: a.key.clone(),
                filename: a.filename.clone(),
                mime_type: a.mime_type.clone(),
            }),
            agent_key: message.agent_key.as_ref().map(|k| k.as_str().to_string()),
        };
        EventFrame::new(methods::CHAT_NEW_MESSAGE, serde_json::json!(payload))
    }

    fn join_room(&self, conn: &relay_core::types::ConnId, room: RoomKey) {
        self.rooms
            .entry(room.clone())
            .or_insert_with(DashSet::new)
            .insert(conn.clone());
        self.conn_rooms
            .entry(conn.clone())
            .or_insert_with(DashSet::new)
            .insert(room);
    }

    fn require_attached(&self, conn: &relay_core::types::ConnId) -> Result<UserId> {
        self.conn_users
            .get(conn)
            .map(|u| u.clone())
            .ok_or(PresenceError::NotAttached)
    }

    fn deliver_to(&self, room: &RoomKey, frame: &EventFrame) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for conn in members.iter() {
            let Some(sender) = self.conn_senders.get(conn.key()) else {
                continue;
            };
            if sender.try_send(frame.clone()).is_err() {
                warn!(?room, "dropping event for slow or closed connection");
            }
        }
        debug!(?room, count = members.len(), "delivered event");
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn presence_state_str(state: PresenceState) -> &'static str {
    match state {
        PresenceState::Typing => "typing",
        PresenceState::Online => "online",
        PresenceState::Offline => "offline",
    }
}
