//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::llm::{ChatCompletion, Config, LLMRequest, UpstreamError};

pub enum Script {
    Reply(Value),
    Fail,
    Hang,
}

/// Upstream that answers from a script and records every request it saw.
pub struct ScriptedUpstream {
    script: Script,
    seen: Mutex<Vec<(Config, LLMRequest)>>,
}

impl ScriptedUpstream {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Replies with a well-formed completion whose assistant text is `content`.
    pub fn replying(content: &str) -> Self {
        Self::new(Script::Reply(completion(content)))
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<(Config, LLMRequest)> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatCompletion for ScriptedUpstream {
    async fn complete(&self, config: &Config, request: &LLMRequest) -> Result<Value, UpstreamError> {
        self.seen
            .lock()
            .unwrap()
            .push((config.clone(), request.clone()));

        match &self.script {
            Script::Reply(value) => Ok(value.clone()),
            Script::Fail => Err(UpstreamError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(UpstreamError::Timeout)
            }
        }
    }
}

/// Upstream that holds each reply until the test opens its gate.
///
/// Replies are keyed by the word in the user message, so concurrent
/// requests can be released in any order.
pub struct GatedUpstream {
    pending: Mutex<HashMap<String, (String, oneshot::Receiver<()>)>>,
    waiting: AtomicUsize,
}

/// The test's side of a [`GatedUpstream`].
pub struct Gates(HashMap<String, oneshot::Sender<()>>);

impl Gates {
    pub fn release(&mut self, word: &str) {
        if let Some(gate) = self.0.remove(word) {
            let _ = gate.send(());
        }
    }
}

impl GatedUpstream {
    pub fn new(replies: &[(&str, &str)]) -> (Self, Gates) {
        let mut pending = HashMap::new();
        let mut gates = HashMap::new();
        for (word, reply) in replies {
            let (tx, rx) = oneshot::channel();
            pending.insert(word.to_string(), (reply.to_string(), rx));
            gates.insert(word.to_string(), tx);
        }
        let upstream = Self {
            pending: Mutex::new(pending),
            waiting: AtomicUsize::new(0),
        };
        (upstream, Gates(gates))
    }

    /// Requests that reached the upstream and are parked at their gate.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatCompletion for GatedUpstream {
    async fn complete(&self, _config: &Config, request: &LLMRequest) -> Result<Value, UpstreamError> {
        let user = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let entry = {
            let mut pending = self.pending.lock().unwrap();
            let word = pending.keys().find(|word| user.contains(word.as_str())).cloned();
            word.and_then(|word| pending.remove(&word))
        };
        let (reply, gate) = entry.ok_or(UpstreamError::ResponseStructure)?;

        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _ = gate.await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        Ok(completion(&reply))
    }
}

pub fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

pub fn test_config() -> Config {
    Config::new("http://upstream.test/v1/chat/completions", "sk-test")
}

pub const CARD_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="600" viewBox="0 0 400 600">
  <rect width="400" height="600" fill="#F5F5F5"/>
  <rect x="20" y="20" width="360" height="4" fill="#D32F2F"/>
  <circle cx="200" cy="300" r="80" fill="none" stroke="#1976D2" stroke-width="6"/>
</svg>"##;
