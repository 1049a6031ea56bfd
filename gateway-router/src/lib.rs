//! Selects an LLM variant per request, dispatches the HTTP call, caches
//! non-streaming replies, and accounts cost — all without ever raising to
//! the caller (§4.5).

pub mod client;
pub mod cost;
pub mod error;
pub mod variant;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gateway_analyzer::{analyze, classify, count_tokens};
use gateway_cache::{fingerprint_key, CacheBackend, CacheConfig, GetOutcome, InMemoryBackend, ResponseCache, SetOutcome};

pub use client::{ChatMessage, CompletionRequest, CompletionResponse, HttpLlmClient, LlmClient};
pub use cost::CostAccumulator;
pub use error::RouterError;
pub use variant::{SelectionContext, Variant};

const CACHE_NAMESPACE: &str = "router.chat";
const CACHE_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_FALLBACK_MESSAGE: &str =
    "I'm unable to answer that right now. Please try again in a moment.";

/// A caller-supplied request: the new message plus whatever prior turns the
/// caller chose to include. The router holds no durable transcript of its
/// own (§1 Non-goals / §4.5 conversation context window).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub content: String,
    pub conversation: Vec<ChatMessage>,
    pub stable_context: String,
    pub streaming: bool,
    pub selection: SelectionContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Ok,
    CacheHit,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub content: String,
    pub variant: Variant,
    pub outcome: ChatOutcome,
}

pub struct RouterConfig {
    pub conversation_context_turns: usize,
    pub nano_system_prompt: String,
    pub mini_system_prompt: String,
    pub chat_system_prompt: String,
    pub full_system_prompt: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            conversation_context_turns: 5,
            nano_system_prompt: "Answer briefly in one or two sentences.".to_string(),
            mini_system_prompt: "Answer concisely, with the key figures only.".to_string(),
            chat_system_prompt: "Answer conversationally, referencing prior turns where relevant.".to_string(),
            full_system_prompt:
                "Provide a thorough, well-reasoned analysis, citing the relevant metrics and caveats."
                    .to_string(),
        }
    }
}

impl RouterConfig {
    fn system_prompt_for(&self, variant: Variant) -> &str {
        match variant {
            Variant::Nano => &self.nano_system_prompt,
            Variant::Mini => &self.mini_system_prompt,
            Variant::Chat => &self.chat_system_prompt,
            Variant::Full => &self.full_system_prompt,
        }
    }
}

/// Ties together classification (`gateway-analyzer`), caching
/// (`gateway-cache`), HTTP dispatch, and cost accounting behind the single
/// `chat` entry point the HTTP surface calls.
pub struct Router<B: CacheBackend = InMemoryBackend> {
    cache: ResponseCache<B>,
    client: Arc<dyn LlmClient>,
    cost: CostAccumulator,
    fallback_count: AtomicU64,
    config: RouterConfig,
}

impl Router<InMemoryBackend> {
    pub fn new(client: Arc<dyn LlmClient>, config: RouterConfig) -> Self {
        Self {
            cache: ResponseCache::new(CacheConfig::default()),
            client,
            cost: CostAccumulator::new(),
            fallback_count: AtomicU64::new(0),
            config,
        }
    }
}

impl<B: CacheBackend> Router<B> {
    pub fn with_cache(cache: ResponseCache<B>, client: Arc<dyn LlmClient>, config: RouterConfig) -> Self {
        Self { cache, client, cost: CostAccumulator::new(), fallback_count: AtomicU64::new(0), config }
    }

    pub fn cost(&self) -> &CostAccumulator {
        &self.cost
    }

    pub fn fallback_count(&self) -> u64 {
        self.fallback_count.load(Ordering::Relaxed)
    }

    fn trimmed_conversation(&self, conversation: &[ChatMessage]) -> Vec<ChatMessage> {
        let n = self.config.conversation_context_turns.max(1);
        let start = conversation.len().saturating_sub(n);
        conversation[start..].to_vec()
    }

    /// Runs the request through `analyzing -> cache-lookup -> dispatching ->
    /// done` (§4.5's state machine). Never returns an error: dispatch
    /// failures become a deterministic fallback reply.
    pub async fn chat(&self, request: ChatRequest) -> ChatReply {
        let prompt_tokens = count_tokens(&request.content);
        let classification = classify(&request.content);
        let analysis = analyze(&request.content);

        let variant = variant::select_variant(
            prompt_tokens,
            classification.level,
            analysis.complexity_indicators.len(),
            request.selection,
        );

        let cache_key = fingerprint_key(&[&request.content, &request.stable_context]);

        if !request.streaming {
            if let GetOutcome::Hit(bytes) = self.cache.get(CACHE_NAMESPACE, &cache_key) {
                self.cost.record_cache_hit();
                let content = String::from_utf8_lossy(&bytes).to_string();
                return ChatReply { content, variant, outcome: ChatOutcome::CacheHit };
            }
        }

        let mut messages = self.trimmed_conversation(&request.conversation);
        messages.push(ChatMessage { role: "user".to_string(), content: request.content.clone() });

        let completion_request = CompletionRequest {
            variant,
            system_prompt: self.config.system_prompt_for(variant).to_string(),
            messages,
            max_tokens: max_tokens_for(variant),
        };

        match self.client.complete(completion_request).await {
            Ok(response) => {
                self.cost.record_dispatch(variant);
                if !request.streaming {
                    let outcome = self.cache.set(
                        CACHE_NAMESPACE,
                        &cache_key,
                        response.content.as_bytes(),
                        Some(CACHE_TTL),
                        vec![],
                        vec![],
                    );
                    if outcome == SetOutcome::Failed {
                        tracing::warn!(key = %cache_key, "router reply not cached, backend unavailable");
                    }
                }
                ChatReply { content: response.content, variant, outcome: ChatOutcome::Ok }
            }
            Err(err) => {
                tracing::error!(error = %err, variant = variant.as_str(), "router dispatch failed, returning fallback");
                self.fallback_count.fetch_add(1, Ordering::Relaxed);
                ChatReply {
                    content: DEFAULT_FALLBACK_MESSAGE.to_string(),
                    variant,
                    outcome: ChatOutcome::Fallback,
                }
            }
        }
    }
}

fn max_tokens_for(variant: Variant) -> u32 {
    match variant {
        Variant::Nano => 1024,
        Variant::Mini => 2048,
        Variant::Chat => 2048,
        Variant::Full => 4096,
    }
}
