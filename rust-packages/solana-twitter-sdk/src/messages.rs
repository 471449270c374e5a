//! Short on-chain messages.
//!
//! Limits are checked before anything is signed so a rejected message never
//! costs a transaction fee.

use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use solana_sdk::{pubkey::Pubkey, signature::Signature, signer::Signer};
use tracing::{info, instrument};

use crate::{
    constants::{MAX_CONTENT_CHARS, MAX_MESSAGE_ID_BYTES, MAX_TOPIC_CHARS},
    error::{Error, Result},
    program::{MessageAccount, ProgramClient},
    workspace::Workspace,
};

pub fn validate_message(topic: &str, content: &str) -> Result<()> {
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(Error::TopicTooLong);
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(Error::ContentTooLong);
    }
    Ok(())
}

/// Default message id: milliseconds since the unix epoch.
fn timestamp_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    millis.to_string()
}

#[derive(Clone)]
pub struct MessageClient {
    workspace: Workspace,
    program: Arc<dyn ProgramClient>,
}

impl MessageClient {
    pub fn new(workspace: Workspace, program: Arc<dyn ProgramClient>) -> Self {
        Self { workspace, program }
    }

    /// Send a message with a timestamp id. Returns the message account.
    pub async fn send(&self, topic: &str, content: &str) -> Result<Pubkey> {
        self.send_with_id(&timestamp_id(), topic, content).await
    }

    /// Send a message at the address derived from `message_id`.
    ///
    /// `message_id` is a PDA seed and so is limited to 32 bytes.
    #[instrument(skip(self, content))]
    pub async fn send_with_id(
        &self,
        message_id: &str,
        topic: &str,
        content: &str,
    ) -> Result<Pubkey> {
        if message_id.is_empty() || message_id.len() > MAX_MESSAGE_ID_BYTES {
            return Err(Error::InvalidMessageId(format!(
                "message id must be 1..={MAX_MESSAGE_ID_BYTES} bytes, got {}",
                message_id.len()
            )));
        }
        validate_message(topic, content)?;
        let author = self.workspace.require_signer()?;

        let message = self
            .program
            .send_message(&author, message_id, topic, content)
            .await?;
        info!(%message, "message sent");
        Ok(message)
    }

    #[instrument(skip(self, content))]
    pub async fn update(&self, message: &Pubkey, topic: &str, content: &str) -> Result<Signature> {
        validate_message(topic, content)?;
        let author = self.workspace.require_signer()?;
        self.require_author(message, &author.pubkey()).await?;

        let signature = self
            .program
            .update_message(&author, message, topic, content)
            .await?;
        info!(%signature, "message updated");
        Ok(signature)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, message: &Pubkey) -> Result<Signature> {
        let author = self.workspace.require_signer()?;
        self.require_author(message, &author.pubkey()).await?;

        let signature = self.program.delete_message(&author, message).await?;
        info!(%signature, "message deleted");
        Ok(signature)
    }

    pub async fn fetch(&self, message: &Pubkey) -> Result<Option<MessageAccount>> {
        self.program.fetch_message(message).await
    }

    /// All messages, newest first, optionally restricted to one author.
    pub async fn list(&self, author: Option<&Pubkey>) -> Result<Vec<MessageAccount>> {
        self.program.fetch_messages(author).await
    }

    async fn require_author(&self, message: &Pubkey, author: &Pubkey) -> Result<()> {
        let existing = self
            .program
            .fetch_message(message)
            .await?
            .ok_or(Error::AccountNotFound)?;
        if existing.author != *author {
            return Err(Error::Forbidden);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use solana_sdk::signature::Keypair;

    use super::*;
    use crate::{
        config::Config,
        testutil::{MemoryProgramClient, ProgramCall},
    };

    fn client_for(wallet: Keypair, program: Arc<MemoryProgramClient>) -> MessageClient {
        let workspace = Workspace::new(Config::default());
        workspace.connect(Arc::new(wallet));
        MessageClient::new(workspace, program)
    }

    #[rstest]
    #[case(50, 280, Ok(()))]
    #[case(51, 0, Err(Error::TopicTooLong))]
    #[case(0, 281, Err(Error::ContentTooLong))]
    fn length_limits_count_characters(
        #[case] topic_chars: usize,
        #[case] content_chars: usize,
        #[case] expected: Result<()>,
    ) {
        // Multi-byte characters: limits are in characters, not bytes.
        let topic = "é".repeat(topic_chars);
        let content = "ü".repeat(content_chars);
        assert_eq!(validate_message(&topic, &content), expected);
    }

    #[tokio::test]
    async fn send_then_list_by_author() {
        let program = Arc::new(MemoryProgramClient::new());
        let wallet = Keypair::new();
        let author = wallet.pubkey();
        let client = client_for(wallet, program.clone());

        let first = client.send_with_id("1", "rust", "hello").await.unwrap();
        let second = client.send_with_id("2", "rust", "again").await.unwrap();
        assert_ne!(first, second);

        let listed = client.list(Some(&author)).await.unwrap();
        let addresses: Vec<_> = listed.iter().map(|m| m.address).collect();
        assert_eq!(addresses, vec![second, first]);

        let stranger = Pubkey::new_unique();
        assert!(client.list(Some(&stranger)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_topic_is_rejected_before_sending() {
        let program = Arc::new(MemoryProgramClient::new());
        let client = client_for(Keypair::new(), program.clone());

        let topic = "x".repeat(MAX_TOPIC_CHARS + 1);
        assert_eq!(client.send(&topic, "body").await, Err(Error::TopicTooLong));
        assert!(program.calls().is_empty());
    }

    #[tokio::test]
    async fn oversized_message_id_is_rejected() {
        let client = client_for(Keypair::new(), Arc::new(MemoryProgramClient::new()));
        let id = "9".repeat(MAX_MESSAGE_ID_BYTES + 1);
        let result = client.send_with_id(&id, "t", "c").await;
        assert!(matches!(result, Err(Error::InvalidMessageId(_))));
        assert!(matches!(
            client.send_with_id("", "t", "c").await,
            Err(Error::InvalidMessageId(_))
        ));
    }

    #[tokio::test]
    async fn send_requires_wallet() {
        let client = MessageClient::new(
            Workspace::new(Config::default()),
            Arc::new(MemoryProgramClient::new()),
        );
        assert_eq!(client.send("t", "c").await, Err(Error::NoWalletConnected));
    }

    #[tokio::test]
    async fn update_and_delete_by_author() {
        let program = Arc::new(MemoryProgramClient::new());
        let client = client_for(Keypair::new(), program.clone());
        let message = client.send_with_id("a", "topic", "first").await.unwrap();

        client.update(&message, "topic", "edited").await.unwrap();
        let edited = client.fetch(&message).await.unwrap().unwrap();
        assert_eq!(edited.content, "edited");

        client.delete(&message).await.unwrap();
        assert_eq!(client.fetch(&message).await.unwrap(), None);
        assert_eq!(
            program.calls().last(),
            Some(&ProgramCall::DeleteMessage { message })
        );
    }

    #[tokio::test]
    async fn other_authors_are_forbidden() {
        let program = Arc::new(MemoryProgramClient::new());
        let owner = client_for(Keypair::new(), program.clone());
        let intruder = client_for(Keypair::new(), program.clone());
        let message = owner.send_with_id("a", "topic", "mine").await.unwrap();
        let calls_before = program.calls().len();

        assert_eq!(
            intruder.update(&message, "topic", "theirs").await,
            Err(Error::Forbidden)
        );
        assert_eq!(intruder.delete(&message).await, Err(Error::Forbidden));
        assert_eq!(program.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn missing_message_is_not_found() {
        let client = client_for(Keypair::new(), Arc::new(MemoryProgramClient::new()));
        assert_eq!(
            client.delete(&Pubkey::new_unique()).await,
            Err(Error::AccountNotFound)
        );
    }
}
