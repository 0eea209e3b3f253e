use serde_json::json;
use uuid::Uuid;

use crate::{
    db::Storage,
    error::AppError,
    models::{
        auth::Session,
        message::{Conversation, CreateConversationRequest, CreateMessageRequest, Message, NewMessage},
    },
    services::{
        metrics::MESSAGES_COUNTER,
        realtime::{Audience, Event, Hub},
    },
};

pub struct MessagingService;

impl MessagingService {
    /// The creator is always a participant; duplicates are dropped.
    pub async fn create_conversation(
        store: &dyn Storage,
        session: &Session,
        req: &CreateConversationRequest,
    ) -> Result<Conversation, AppError> {
        let mut participants = vec![session.user_id];
        for id in &req.participant_ids {
            if !participants.contains(id) {
                participants.push(*id);
            }
        }

        let active = store.count_active_users(session.tenant_id, &participants).await?;
        if active != participants.len() as i64 {
            return Err(AppError::validation(
                "participantIds",
                "Every participant must be an active user of this school",
            ));
        }

        let title = req.title.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let conversation = store
            .create_conversation(session.tenant_id, session.user_id, title, &participants)
            .await?;
        tracing::debug!(
            conversation = %conversation.id,
            participants = participants.len(),
            "conversation created"
        );
        Ok(conversation)
    }

    pub async fn list_conversations(store: &dyn Storage, session: &Session) -> Result<Vec<Conversation>, AppError> {
        Ok(store.conversations_for_user(session.tenant_id, session.user_id).await?)
    }

    async fn joined(store: &dyn Storage, session: &Session, conversation_id: Uuid) -> Result<Conversation, AppError> {
        store
            .conversation_for_participant(session.tenant_id, conversation_id, session.user_id)
            .await?
            .ok_or(AppError::NotFound("Conversation"))
    }

    pub async fn messages(
        store: &dyn Storage,
        session: &Session,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        Self::joined(store, session, conversation_id).await?;
        Ok(store.messages_in(session.tenant_id, conversation_id, limit).await?)
    }

    pub async fn send(
        store: &dyn Storage,
        hub: &Hub,
        session: &Session,
        conversation_id: Uuid,
        req: &CreateMessageRequest,
    ) -> Result<Message, AppError> {
        let has_attachments = req.attachments.as_ref().is_some_and(|a| !a.is_empty());
        if req.content.trim().is_empty() && !has_attachments {
            return Err(AppError::validation("content", "Message cannot be empty"));
        }

        Self::joined(store, session, conversation_id).await?;

        let new = NewMessage {
            conversation_id,
            sender_id: session.user_id,
            content: req.content.clone(),
            message_type: req.message_type.clone().unwrap_or_else(|| "text".to_string()),
            attachments: req.attachments.clone(),
        };
        let message = store.create_message(session.tenant_id, &new).await?;
        MESSAGES_COUNTER.with_label_values(&[session.subdomain.as_str()]).inc();

        let participants = store.participant_ids(session.tenant_id, conversation_id).await?;
        hub.publish(
            Event::new(
                session.tenant_id,
                Audience::Users { ids: participants },
                "new_message",
                json!(message),
            )
            .excluding(session.user_id),
        )
        .await;

        Ok(message)
    }

    /// Idempotent. Only participants of the message's conversation may mark it.
    pub async fn mark_read(store: &dyn Storage, session: &Session, message_id: Uuid) -> Result<(), AppError> {
        let message = store
            .message(session.tenant_id, message_id)
            .await?
            .ok_or(AppError::NotFound("Message"))?;
        store
            .conversation_for_participant(session.tenant_id, message.conversation_id, session.user_id)
            .await?
            .ok_or(AppError::NotFound("Message"))?;

        store.mark_read(session.tenant_id, message_id, session.user_id).await?;
        Ok(())
    }
}
