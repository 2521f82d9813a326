use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use aqueduct_core::{AqueductError, ChatClient};

/// Test double that replays a scripted sequence of completions.
///
/// Each call pops the next scripted outcome; once the script is exhausted the
/// client fails, so a test that expects N remote calls will notice an N+1th.
#[derive(Clone)]
pub struct ScriptedChatClient {
    model: String,
    replies: Arc<Mutex<VecDeque<Result<String, AqueductError>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedChatClient {
    /// Script a sequence of successful completions.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Script a mixed sequence of successes and failures.
    pub fn from_results(results: Vec<Result<String, AqueductError>>) -> Self {
        Self {
            model: "scripted".to_string(),
            replies: Arc::new(Mutex::new(VecDeque::from(results))),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, _prompt: &str) -> Result<String, AqueductError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock().await;
        replies
            .pop_front()
            .unwrap_or_else(|| Err(AqueductError::Upstream("scripted client exhausted replies".into())))
    }
}
