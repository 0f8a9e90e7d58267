use crate::config::Config;
use crate::error::ApiError;
use crate::extract::extract_text;
use crate::metrics::STREAM_PARSE_ERRORS;
use crate::models::CompletionRequest;
use futures::StreamExt;
use serde_json::Value;

// flush threshold for coalescing streamed fragments
pub const TOKEN_BUFFER_SIZE: usize = 10;

const SENTINEL: &str = "[DONE]";
const FENCE: &str = "```";

// Accumulates small streamed fragments and hands them to the sink in larger
// pieces. Single-threaded, callback runs inline. flush() must be called at
// stream end or a trailing fragment is lost.
pub struct TokenBuffer<F: FnMut(&str)> {
    buffer: String,
    threshold: usize,
    on_flush: F,
}

impl<F: FnMut(&str)> TokenBuffer<F> {
    pub fn new(threshold: usize, on_flush: F) -> Self {
        Self {
            buffer: String::new(),
            threshold,
            on_flush,
        }
    }

    pub fn add(&mut self, fragment: &str) {
        self.buffer.push_str(fragment);
        if self.buffer.len() >= self.threshold {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        if !self.buffer.is_empty() {
            (self.on_flush)(&self.buffer);
            self.buffer.clear();
        }
    }
}

// Reassembles an SSE-style upstream stream into display-ready fragments.
// Chunks may split mid-line; only complete lines are processed. Fenced code
// blocks are held back until the closing fence so the UI never renders a
// half-open block.
pub struct StreamAssembler<F: FnMut(&str)> {
    pending_line: String,
    output: String,
    in_code_block: bool,
    code_block: String,
    buffer: TokenBuffer<F>,
}

impl<F: FnMut(&str)> StreamAssembler<F> {
    pub fn new(threshold: usize, sink: F) -> Self {
        Self {
            pending_line: String::new(),
            output: String::new(),
            in_code_block: false,
            code_block: String::new(),
            buffer: TokenBuffer::new(threshold, sink),
        }
    }

    pub fn push_chunk(&mut self, chunk: &str) {
        self.pending_line.push_str(chunk);
        while let Some(pos) = self.pending_line.find('\n') {
            let line: String = self.pending_line.drain(..=pos).collect();
            self.process_line(line.trim_end_matches(['\n', '\r']));
        }
    }

    fn process_line(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let Some(payload) = line.strip_prefix("data: ") else {
            return;
        };
        if payload == SENTINEL {
            return;
        }
        // a single corrupt frame must not abort the stream
        match serde_json::from_str::<Value>(payload) {
            Ok(value) => {
                if let Some(token) = extract_text(&value) {
                    self.handle_token(&token);
                }
            }
            Err(err) => {
                STREAM_PARSE_ERRORS.inc();
                tracing::debug!(error = %err, "skipping malformed stream frame");
            }
        }
    }

    fn handle_token(&mut self, token: &str) {
        if token.contains(FENCE) {
            if !self.in_code_block {
                // opening fence: start holding tokens back
                self.in_code_block = true;
                self.code_block.push_str(token);
            } else {
                // closing fence: the whole block goes out as one fragment
                self.in_code_block = false;
                self.code_block.push_str(token);
                self.output.push_str(&self.code_block);
                self.buffer.flush();
                self.buffer.add(&self.code_block);
                self.buffer.flush();
                self.code_block.clear();
            }
        } else if self.in_code_block {
            self.code_block.push_str(token);
        } else {
            self.output.push_str(token);
            self.buffer.add(token);
        }
    }

    // end of stream: one best-effort pass over the unterminated line, then
    // flush an open code block and whatever the buffer still holds
    pub fn finish(mut self) -> String {
        if !self.pending_line.trim().is_empty() {
            let line = std::mem::take(&mut self.pending_line);
            self.process_line(&line);
        }
        if self.in_code_block {
            let block = std::mem::take(&mut self.code_block);
            self.output.push_str(&block);
            self.buffer.add(&block);
            self.in_code_block = false;
        }
        self.buffer.flush();
        self.output
    }
}

fn generation_prompt(trained: &str, prompt: &str) -> String {
    format!(
        "You are a context-aware assistant. Use the provided context to give accurate, \
         relevant responses. Maintain consistency with previous interactions and focus \
         on the most important information.\n\n\
         When providing code snippets, always wrap them in triple backticks with the \
         appropriate language identifier. For example:\n\
         ```javascript\nconst example = \"code\";\n```\n\n\
         Context:\n{trained}\n\nUser Query:\n{prompt}\n\nResponse:"
    )
}

// Turn a non-2xx upstream response into an ApiError, keeping the upstream
// message when it has one
pub(crate) async fn upstream_error(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let message = match response.json::<Value>().await {
        Ok(body) => body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => format!("upstream returned status {status}"),
    };
    ApiError::Upstream(message)
}

// Streaming completion call. Emits display-ready fragments to on_token as
// they become available and returns the full assembled response.
pub async fn generate<F: FnMut(&str)>(
    client: &reqwest::Client,
    config: &Config,
    prompt: &str,
    trained: &str,
    on_token: F,
) -> Result<String, ApiError> {
    let body = CompletionRequest {
        model: config.model.clone(),
        prompt: generation_prompt(trained, prompt),
        max_tokens: 1024,
        temperature: 0.2,
        top_p: 0.1,
        top_k: 40,
        repetition_penalty: 1.1,
        stop: vec!["</response>".to_string(), "END".to_string()],
        stream: true,
    };

    let response = client
        .post(&config.upstream_url)
        .bearer_auth(&config.api_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        return Err(upstream_error(response).await);
    }

    let mut chunks = response.bytes_stream();
    let mut assembler = StreamAssembler::new(TOKEN_BUFFER_SIZE, on_token);

    while let Some(chunk) = chunks.next().await {
        // read failures are terminal; retry policy belongs to the caller
        let chunk = chunk.map_err(|e| ApiError::Upstream(e.to_string()))?;
        assembler.push_chunk(&String::from_utf8_lossy(&chunk));
    }

    Ok(assembler.finish())
}
