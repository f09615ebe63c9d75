use uuid::Uuid;

use crate::{
    clock::Clock,
    db::Store,
    error::{AppError, AppResult},
    models::chat::{ChatMessage, Conversation, MessageRole},
    services::{
        profiles::ProfileService,
        roles::Caller,
        validation::{required_text, MAX_NAME_LEN},
    },
};

const DEFAULT_TITLE: &str = "New conversation";

/// Stores tutoring conversations. Producing assistant answers happens
/// elsewhere; clients post both sides of the exchange here.
pub struct ChatService;

impl ChatService {
    async fn owned(store: &dyn Store, caller: &Caller, conversation_id: Uuid) -> AppResult<Conversation> {
        store
            .get_conversation(conversation_id)
            .await?
            .filter(|c| c.owner_id == caller.user_id)
            .ok_or_else(|| AppError::not_found("Conversation not found"))
    }

    pub async fn create(store: &dyn Store, clock: &Clock, caller: &Caller, title: Option<&str>) -> AppResult<Conversation> {
        let title = match title.map(str::trim).filter(|t| !t.is_empty()) {
            Some(title) => required_text("Title", title, MAX_NAME_LEN)?,
            None => DEFAULT_TITLE.to_string(),
        };
        ProfileService::ensure(store, caller).await?;
        store
            .create_conversation(caller.user_id, caller.school_id(), &title, clock.now())
            .await
    }

    pub async fn list(store: &dyn Store, caller: &Caller) -> AppResult<Vec<Conversation>> {
        store.list_conversations(caller.user_id).await
    }

    pub async fn save_message(
        store: &dyn Store,
        clock: &Clock,
        caller: &Caller,
        conversation_id: Uuid,
        role: MessageRole,
        content: &str,
    ) -> AppResult<ChatMessage> {
        if content.trim().is_empty() {
            return Err(AppError::bad_request("Message content cannot be empty"));
        }
        Self::owned(store, caller, conversation_id).await?;
        store.add_message(conversation_id, role, content, clock.now()).await
    }

    pub async fn messages(store: &dyn Store, caller: &Caller, conversation_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        Self::owned(store, caller, conversation_id).await?;
        store.list_messages(conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::MemoryStore;

    fn caller() -> Caller {
        Caller { user_id: Uuid::new_v4(), email: "sam@lincoln.edu".into(), role: None }
    }

    #[tokio::test]
    async fn test_conversation_roundtrip() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let sam = caller();

        let conversation = ChatService::create(&store, &clock, &sam, None).await.unwrap();
        assert_eq!(conversation.title, "New conversation");

        ChatService::save_message(&store, &clock, &sam, conversation.id, MessageRole::User, "What is a fraction?")
            .await
            .unwrap();
        clock.advance(Duration::seconds(2));
        ChatService::save_message(&store, &clock, &sam, conversation.id, MessageRole::Assistant, "A part of a whole.")
            .await
            .unwrap();

        let messages = ChatService::messages(&store, &sam, conversation.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);

        let listed = ChatService::list(&store, &sam).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].updated_at > conversation.updated_at);
    }

    #[tokio::test]
    async fn test_only_owner_and_non_empty() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let sam = caller();
        let other = caller();
        let conversation = ChatService::create(&store, &clock, &sam, Some("Algebra")).await.unwrap();

        let err = ChatService::save_message(&store, &clock, &sam, conversation.id, MessageRole::User, "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = ChatService::save_message(&store, &clock, &other, conversation.id, MessageRole::User, "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(ChatService::messages(&store, &other, conversation.id).await.is_err());
        assert!(ChatService::list(&store, &other).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_profile_and_overlong_title() {
        let store = MemoryStore::new();
        let clock = Clock::system();
        let sam = caller();

        let err = ChatService::create(&store, &clock, &sam, Some(&"t".repeat(256))).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(store.get_profile(sam.user_id).await.unwrap().is_none());

        ChatService::create(&store, &clock, &sam, Some("Fractions")).await.unwrap();
        assert_eq!(store.get_profile(sam.user_id).await.unwrap().unwrap().email, "sam@lincoln.edu");
    }
}
