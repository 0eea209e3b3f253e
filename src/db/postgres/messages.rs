use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{MessageStore, StoreResult},
    models::message::{Conversation, Message, NewMessage},
};

#[async_trait]
impl MessageStore for PgStorage {
    async fn create_conversation(
        &self,
        tenant: Uuid,
        created_by: Uuid,
        title: Option<&str>,
        participants: &[Uuid],
    ) -> StoreResult<Conversation> {
        let mut tx = self.pool.begin().await?;

        let conversation = sqlx::query_as::<_, Conversation>(
            "INSERT INTO conversations (tenant_id, title, is_group, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(tenant)
        .bind(title)
        .bind(participants.len() > 2)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        for user_id in participants {
            sqlx::query(
                "INSERT INTO conversation_participants (tenant_id, conversation_id, user_id)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (conversation_id, user_id) DO NOTHING",
            )
            .bind(tenant)
            .bind(conversation.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(conversation)
    }

    async fn conversation_for_participant(
        &self,
        tenant: Uuid,
        conversation: Uuid,
        user: Uuid,
    ) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, Conversation>(
            "SELECT c.* FROM conversations c
             JOIN conversation_participants p
               ON p.conversation_id = c.id AND p.tenant_id = c.tenant_id
             WHERE c.tenant_id = $1 AND c.id = $2 AND p.user_id = $3 AND p.is_active = TRUE",
        )
        .bind(tenant)
        .bind(conversation)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn conversations_for_user(&self, tenant: Uuid, user: Uuid) -> StoreResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, Conversation>(
            "SELECT c.* FROM conversations c
             JOIN conversation_participants p
               ON p.conversation_id = c.id AND p.tenant_id = c.tenant_id
             WHERE c.tenant_id = $1 AND p.user_id = $2 AND p.is_active = TRUE
             ORDER BY c.updated_at DESC",
        )
        .bind(tenant)
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn participant_ids(&self, tenant: Uuid, conversation: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM conversation_participants
             WHERE tenant_id = $1 AND conversation_id = $2 AND is_active = TRUE",
        )
        .bind(tenant)
        .bind(conversation)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn messages_in(&self, tenant: Uuid, conversation: Uuid, limit: i64) -> StoreResult<Vec<Message>> {
        let mut rows = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages
             WHERE tenant_id = $1 AND conversation_id = $2
             ORDER BY created_at DESC
             LIMIT $3",
        )
        .bind(tenant)
        .bind(conversation)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.reverse();
        Ok(rows)
    }

    async fn create_message(&self, tenant: Uuid, new: &NewMessage) -> StoreResult<Message> {
        let mut tx = self.pool.begin().await?;

        let message = sqlx::query_as::<_, Message>(
            "INSERT INTO messages (tenant_id, conversation_id, sender_id, content, message_type, attachments)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(tenant)
        .bind(new.conversation_id)
        .bind(new.sender_id)
        .bind(&new.content)
        .bind(&new.message_type)
        .bind(new.attachments.clone().map(Json))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET updated_at = NOW() WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(new.conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    async fn message(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Message>> {
        let row = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn mark_read(&self, tenant: Uuid, message: Uuid, user: Uuid) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO message_reads (tenant_id, message_id, user_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (message_id, user_id) DO NOTHING",
        )
        .bind(tenant)
        .bind(message)
        .bind(user)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unread_count(&self, tenant: Uuid, user: Uuid) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m
             JOIN conversation_participants p
               ON p.conversation_id = m.conversation_id AND p.tenant_id = m.tenant_id
             WHERE m.tenant_id = $1 AND p.user_id = $2 AND p.is_active = TRUE
               AND m.sender_id <> $2
               AND NOT EXISTS (
                   SELECT 1 FROM message_reads r WHERE r.message_id = m.id AND r.user_id = $2
               )",
        )
        .bind(tenant)
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }
}
