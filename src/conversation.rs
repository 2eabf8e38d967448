//! Waiting for a user's answer to a command's question.
//!
//! A command registers a prompt for an (author, channel) pair and waits.  The prompt ends in
//! exactly one of three ways: the author answers, the author cancels (or starts another prompt in
//! the same channel), or the timeout elapses.  The registration is removed on every path,
//! including the waiting command being dropped.

use serenity::all::{ChannelId, Message, UserId};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::sync::oneshot;

/// Replying with this word abandons the current command.
pub const CANCEL_WORD: &str = "cancel";

#[derive(Debug)]
pub enum Reply<M> {
    Answered(M),
    TimedOut,
    Cancelled,
}

enum Answer<M> {
    Message(M),
    Cancel,
}

struct Pending<M> {
    id: u64,
    tx: oneshot::Sender<Answer<M>>,
}

type Key = (ChannelId, UserId);

/// Prompts awaiting an answer
pub struct Conversations<M = Message> {
    pending: Mutex<HashMap<Key, Pending<M>>>,
    next_id: AtomicU64,
}

impl<M> Default for Conversations<M> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<M: Send> Conversations<M> {
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<Key, Pending<M>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for `author` to say something in `channel`.
    pub async fn prompt(&self, channel: ChannelId, author: UserId, timeout: Duration) -> Reply<M> {
        let (tx, rx) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = (channel, author);

        let superseded = self.pending().insert(key, Pending { id, tx });
        if let Some(old) = superseded {
            let _ = old.tx.send(Answer::Cancel);
        }
        let _registration = Registration {
            conversations: self,
            key,
            id,
        };

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Answer::Message(msg))) => Reply::Answered(msg),
            Ok(Ok(Answer::Cancel)) | Ok(Err(_)) => Reply::Cancelled,
            Err(_) => Reply::TimedOut,
        }
    }

    /// Hand a message to the prompt waiting on its author and channel.  Returns whether a prompt
    /// consumed it.
    pub fn deliver(&self, channel: ChannelId, author: UserId, content: &str, msg: M) -> bool {
        let Some(pending) = self.pending().remove(&(channel, author)) else {
            return false;
        };

        let answer = if content.trim().eq_ignore_ascii_case(CANCEL_WORD) {
            Answer::Cancel
        } else {
            Answer::Message(msg)
        };
        let _ = pending.tx.send(answer);
        true
    }

    #[cfg(test)]
    pub fn is_waiting(&self, channel: ChannelId, author: UserId) -> bool {
        self.pending().contains_key(&(channel, author))
    }
}

// Removes the prompt's own registration, leaving any newer prompt for the same key alone.
struct Registration<'a, M> {
    conversations: &'a Conversations<M>,
    key: Key,
    id: u64,
}

impl<M> Drop for Registration<'_, M> {
    fn drop(&mut self) {
        let mut pending = self
            .conversations
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if pending.get(&self.key).is_some_and(|p| p.id == self.id) {
            pending.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TIMEOUT: Duration = Duration::from_secs(120);

    fn channel() -> ChannelId {
        ChannelId::new(10)
    }

    fn author() -> UserId {
        UserId::new(20)
    }

    async fn wait_until_registered(conversations: &Conversations<String>) {
        while !conversations.is_waiting(channel(), author()) {
            tokio::task::yield_now().await;
        }
    }

    fn spawn_prompt(
        conversations: &Arc<Conversations<String>>,
    ) -> tokio::task::JoinHandle<Reply<String>> {
        let conversations = Arc::clone(conversations);
        tokio::spawn(async move { conversations.prompt(channel(), author(), TIMEOUT).await })
    }

    #[tokio::test]
    async fn test_reply_from_author_answers_prompt() {
        let conversations = Arc::new(Conversations::new());
        let waiting = spawn_prompt(&conversations);
        wait_until_registered(&conversations).await;

        assert!(conversations.deliver(channel(), author(), "alice", "alice".to_owned()));
        match waiting.await.unwrap() {
            Reply::Answered(msg) => assert_eq!(msg, "alice"),
            other => panic!("unexpected reply {:?}", other),
        }
        assert!(!conversations.is_waiting(channel(), author()));
    }

    #[tokio::test]
    async fn test_other_authors_and_channels_are_ignored() {
        let conversations = Arc::new(Conversations::new());
        let waiting = spawn_prompt(&conversations);
        wait_until_registered(&conversations).await;

        assert!(!conversations.deliver(channel(), UserId::new(99), "x", "x".to_owned()));
        assert!(!conversations.deliver(ChannelId::new(99), author(), "x", "x".to_owned()));
        assert!(conversations.is_waiting(channel(), author()));

        conversations.deliver(channel(), author(), "y", "y".to_owned());
        assert!(matches!(waiting.await.unwrap(), Reply::Answered(_)));
    }

    #[tokio::test]
    async fn test_cancel_word_cancels() {
        let conversations = Arc::new(Conversations::new());
        let waiting = spawn_prompt(&conversations);
        wait_until_registered(&conversations).await;

        assert!(conversations.deliver(channel(), author(), " Cancel ", String::new()));
        assert!(matches!(waiting.await.unwrap(), Reply::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_prompt_times_out() {
        let conversations: Conversations<String> = Conversations::new();
        let reply = conversations
            .prompt(channel(), author(), Duration::from_secs(5))
            .await;
        assert!(matches!(reply, Reply::TimedOut));
        assert!(!conversations.is_waiting(channel(), author()));
    }

    #[tokio::test]
    async fn test_new_prompt_supersedes_old_one() {
        let conversations = Arc::new(Conversations::new());
        let first = spawn_prompt(&conversations);
        wait_until_registered(&conversations).await;

        let second = spawn_prompt(&conversations);
        assert!(matches!(first.await.unwrap(), Reply::Cancelled));

        // The first prompt's cleanup must not remove the second registration.
        wait_until_registered(&conversations).await;
        conversations.deliver(channel(), author(), "bob", "bob".to_owned());
        assert!(matches!(second.await.unwrap(), Reply::Answered(_)));
    }
}
