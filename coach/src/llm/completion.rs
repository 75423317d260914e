//! Streaming completion boundary
//!
//! `CompletionClient` turns one outbound message list into a `FragmentStream`.
//! Provider failures never cross this boundary: they surface as a single
//! trailing `Fragment::Apology`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use futures::stream::FusedStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    CompletionRequest, CompletionResponse, LlmClient, LlmError, SamplingParams, StopReason, StreamChunk, TokenUsage,
    create_client,
};
use crate::config::LlmConfig;
use crate::prompts;
use crate::session::Turn;

/// Bounded buffer between the provider task and the consumer
const CHANNEL_CAPACITY: usize = 100;

/// One piece of a streamed reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Non-empty text delta
    Text(String),

    /// Synthetic apology produced on failure; always the last fragment
    Apology(String),
}

impl Fragment {
    pub fn as_str(&self) -> &str {
        match self {
            Fragment::Text(text) | Fragment::Apology(text) => text,
        }
    }

    pub fn is_apology(&self) -> bool {
        matches!(self, Fragment::Apology(_))
    }
}

/// Wraps a provider client with the sampling parameters used for every call
#[derive(Clone)]
pub struct CompletionClient {
    llm: Arc<dyn LlmClient>,
    sampling: SamplingParams,
}

impl CompletionClient {
    pub fn new(llm: Arc<dyn LlmClient>, sampling: SamplingParams) -> Self {
        debug!(?sampling, "CompletionClient::new: called");
        Self { llm, sampling }
    }

    /// Build the provider client named in `config`
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(provider = %config.provider, "CompletionClient::from_config: called");
        Ok(Self::new(create_client(config)?, config.sampling()))
    }

    pub fn sampling(&self) -> &SamplingParams {
        &self.sampling
    }

    /// Start a streaming completion for `messages`
    ///
    /// Nothing is sent until the returned stream is first polled.
    pub fn stream_completion(&self, messages: Vec<Turn>) -> FragmentStream {
        debug!(message_count = %messages.len(), "stream_completion: called");
        let request = CompletionRequest::new(messages, self.sampling);
        FragmentStream::new(self.llm.clone(), request)
    }
}

/// Lazy, finite, non-restartable sequence of reply fragments
///
/// Must be polled from within a tokio runtime.
pub struct FragmentStream {
    pending: Option<(Arc<dyn LlmClient>, CompletionRequest)>,
    rx: Option<mpsc::Receiver<StreamChunk>>,
    task: Option<JoinHandle<Result<CompletionResponse, LlmError>>>,
    yielded: usize,
    finished: bool,
    completed: Option<(StopReason, TokenUsage)>,
}

impl FragmentStream {
    fn new(llm: Arc<dyn LlmClient>, request: CompletionRequest) -> Self {
        Self {
            pending: Some((llm, request)),
            rx: None,
            task: None,
            yielded: 0,
            finished: false,
            completed: None,
        }
    }

    fn start(&mut self) {
        if let Some((llm, request)) = self.pending.take() {
            debug!("FragmentStream::start: spawning provider call");
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            self.rx = Some(rx);
            self.task = Some(tokio::spawn(async move { llm.stream(request, tx).await }));
        }
    }

    /// Why the provider stopped, once the stream ended without failing
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.completed.map(|(stop_reason, _)| stop_reason)
    }

    /// Token usage reported by the provider, once the stream ended without failing
    pub fn usage(&self) -> Option<TokenUsage> {
        self.completed.map(|(_, usage)| usage)
    }

    fn finish(&mut self, result: Result<CompletionResponse, String>) -> Poll<Option<Fragment>> {
        self.finished = true;
        self.task = None;
        match result {
            Ok(response) => {
                let CompletionResponse { stop_reason, usage, .. } = response;
                if stop_reason == StopReason::MaxTokens {
                    warn!(
                        fragments = self.yielded,
                        output_tokens = usage.output_tokens,
                        "Completion truncated at max tokens"
                    );
                } else {
                    info!(
                        fragments = self.yielded,
                        ?stop_reason,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Completion finished"
                    );
                }
                self.completed = Some((stop_reason, usage));
                Poll::Ready(None)
            }
            Err(detail) => {
                warn!(fragments = self.yielded, error = %detail, "Completion failed");
                Poll::Ready(Some(Fragment::Apology(prompts::apology(&detail))))
            }
        }
    }
}

impl Stream for FragmentStream {
    type Item = Fragment;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        this.start();

        if let Some(rx) = this.rx.as_mut() {
            loop {
                match rx.poll_recv(cx) {
                    Poll::Ready(Some(StreamChunk::TextDelta(text))) => {
                        if text.is_empty() {
                            continue;
                        }
                        this.yielded += 1;
                        return Poll::Ready(Some(Fragment::Text(text)));
                    }
                    Poll::Ready(Some(StreamChunk::Error(message))) => {
                        debug!(%message, "FragmentStream: provider reported error");
                        continue;
                    }
                    Poll::Ready(Some(StreamChunk::MessageStart { input_tokens })) => {
                        debug!(input_tokens, "FragmentStream: message started");
                        continue;
                    }
                    Poll::Ready(Some(StreamChunk::MessageDone { stop_reason, .. })) => {
                        debug!(?stop_reason, "FragmentStream: message done");
                        continue;
                    }
                    Poll::Ready(None) => {
                        this.rx = None;
                        break;
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }
        }

        let Some(task) = this.task.as_mut() else {
            this.finished = true;
            return Poll::Ready(None);
        };
        match Pin::new(task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(Ok(response))) => this.finish(Ok(response)),
            Poll::Ready(Ok(Err(e))) => this.finish(Err(e.to_string())),
            Poll::Ready(Err(e)) => this.finish(Err(e.to_string())),
        }
    }
}

impl FusedStream for FragmentStream {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}

impl Drop for FragmentStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::{MockLlmClient, Script};
    use futures::StreamExt;

    fn completion(scripts: Vec<Script>) -> (CompletionClient, Arc<MockLlmClient>) {
        let mock = Arc::new(MockLlmClient::new(scripts));
        (CompletionClient::new(mock.clone(), SamplingParams::default()), mock)
    }

    fn messages() -> Vec<Turn> {
        vec![Turn::system("rules"), Turn::assistant("hi"), Turn::user("I'm stressed")]
    }

    #[tokio::test]
    async fn test_fragments_arrive_in_order() {
        let (client, _) = completion(vec![Script::reply(&["It", " sounds", " hard."])]);

        let fragments: Vec<Fragment> = client.stream_completion(messages()).collect().await;

        assert_eq!(
            fragments,
            vec![
                Fragment::Text("It".to_string()),
                Fragment::Text(" sounds".to_string()),
                Fragment::Text(" hard.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let (client, mock) = completion(vec![Script::reply(&["ok"])]);

        let stream = client.stream_completion(messages());
        tokio::task::yield_now().await;
        assert_eq!(mock.call_count(), 0);

        let fragments: Vec<Fragment> = stream.collect().await;
        assert_eq!(fragments.len(), 1);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_request_carries_messages_and_sampling() {
        let (client, mock) = completion(vec![Script::reply(&["ok"])]);

        let _: Vec<Fragment> = client.stream_completion(messages()).collect().await;

        let requests = mock.requests();
        assert_eq!(requests[0].messages, messages());
        assert_eq!(requests[0].sampling, SamplingParams::default());
    }

    #[tokio::test]
    async fn test_empty_deltas_are_skipped() {
        let (client, _) = completion(vec![Script::reply(&["", "a", "", "b"])]);

        let fragments: Vec<Fragment> = client.stream_completion(messages()).collect().await;

        assert_eq!(fragments, vec![Fragment::Text("a".to_string()), Fragment::Text("b".to_string())]);
    }

    #[tokio::test]
    async fn test_failure_yields_single_apology() {
        let error = LlmError::ApiError {
            status: 401,
            message: "invalid key".to_string(),
        };
        let (client, _) = completion(vec![Script::fail(&[], error)]);

        let fragments: Vec<Fragment> = client.stream_completion(messages()).collect().await;

        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].is_apology());
        assert_eq!(fragments[0].as_str(), prompts::apology("API error 401: invalid key"));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_with_apology() {
        let error = LlmError::InvalidResponse("connection reset".to_string());
        let (client, _) = completion(vec![Script::fail(&["partial ", "text"], error)]);

        let fragments: Vec<Fragment> = client.stream_completion(messages()).collect().await;

        assert_eq!(fragments.len(), 3);
        assert_eq!(fragments[0], Fragment::Text("partial ".to_string()));
        assert_eq!(
            fragments[2],
            Fragment::Apology(prompts::apology("Invalid response: connection reset"))
        );
    }

    #[tokio::test]
    async fn test_completion_reports_stop_reason_and_usage() {
        let (client, _) = completion(vec![Script::reply(&["a", "b"])]);
        let mut stream = client.stream_completion(messages());
        assert_eq!(stream.stop_reason(), None);

        while stream.next().await.is_some() {}

        assert_eq!(stream.stop_reason(), Some(StopReason::EndTurn));
        assert_eq!(stream.usage().map(|u| u.output_tokens), Some(2));
    }

    #[tokio::test]
    async fn test_truncated_reply_is_reported() {
        let (client, _) = completion(vec![Script::truncated(&["cut"])]);
        let mut stream = client.stream_completion(messages());

        let mut fragments = Vec::new();
        while let Some(fragment) = stream.next().await {
            fragments.push(fragment);
        }

        assert_eq!(fragments, vec![Fragment::Text("cut".to_string())]);
        assert_eq!(stream.stop_reason(), Some(StopReason::MaxTokens));
    }

    #[tokio::test]
    async fn test_failed_completion_has_no_stop_reason() {
        let error = LlmError::InvalidResponse("boom".to_string());
        let (client, _) = completion(vec![Script::fail(&[], error)]);
        let mut stream = client.stream_completion(messages());

        while stream.next().await.is_some() {}

        assert_eq!(stream.stop_reason(), None);
        assert_eq!(stream.usage(), None);
    }

    #[tokio::test]
    async fn test_stream_is_fused() {
        let (client, _) = completion(vec![Script::reply(&["x"])]);
        let mut stream = client.stream_completion(messages());

        assert_eq!(stream.next().await, Some(Fragment::Text("x".to_string())));
        assert_eq!(stream.next().await, None);
        assert!(stream.is_terminated());
        assert_eq!(stream.next().await, None);
    }
}
