//! Interaction gateway seam.
//!
//! The gateway delivers session messages to whoever drives the session and
//! collects answers to user-input requests. Waiting policy (timeouts and
//! cancellation) belongs to the session; a gateway only moves messages.

use async_trait::async_trait;
use courtside_models::{InteractionRequest, InteractionResponse, SessionMessage};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::debug;

use crate::error::{WorkerError, WorkerResult};

/// Delivers notifications and user-input requests.
///
/// `request` must be cancel safe: the session drops the future on timeout or
/// cancellation and may issue the same request again.
#[async_trait]
pub trait InteractionGateway: Send + Sync {
    /// Send a `user_input_required` message and wait for the answer.
    async fn request(&self, request: &InteractionRequest) -> WorkerResult<InteractionResponse>;

    /// Deliver a status, heartbeat or terminal message.
    async fn notify(&self, message: SessionMessage) -> WorkerResult<()>;
}

/// Event delivered to the client side of a [`ChannelGateway`].
#[derive(Debug)]
pub enum GatewayEvent {
    Message(SessionMessage),
    Request {
        message: SessionMessage,
        request: InteractionRequest,
        reply: oneshot::Sender<InteractionResponse>,
    },
}

impl GatewayEvent {
    /// The session message carried by the event.
    pub fn message(&self) -> &SessionMessage {
        match self {
            GatewayEvent::Message(message) | GatewayEvent::Request { message, .. } => message,
        }
    }
}

/// Gateway backed by in-process channels.
#[derive(Debug, Clone)]
pub struct ChannelGateway {
    events: mpsc::Sender<GatewayEvent>,
}

/// Client end of a [`ChannelGateway`].
#[derive(Debug)]
pub struct GatewayClient {
    events: mpsc::Receiver<GatewayEvent>,
}

impl ChannelGateway {
    /// Create a connected gateway/client pair.
    pub fn pair(buffer: usize) -> (Self, GatewayClient) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { events: tx }, GatewayClient { events: rx })
    }
}

impl GatewayClient {
    /// Next event from the session, or `None` once the session dropped its gateway.
    pub async fn recv(&mut self) -> Option<GatewayEvent> {
        self.events.recv().await
    }

    /// Skip notifications until the next request.
    pub async fn next_request(
        &mut self,
    ) -> Option<(InteractionRequest, oneshot::Sender<InteractionResponse>)> {
        while let Some(event) = self.events.recv().await {
            if let GatewayEvent::Request { request, reply, .. } = event {
                return Some((request, reply));
            }
        }
        None
    }
}

#[async_trait]
impl InteractionGateway for ChannelGateway {
    async fn request(&self, request: &InteractionRequest) -> WorkerResult<InteractionResponse> {
        let (reply, response) = oneshot::channel();
        self.events
            .send(GatewayEvent::Request {
                message: SessionMessage::input_required(request.clone()),
                request: request.clone(),
                reply,
            })
            .await
            .map_err(|_| WorkerError::gateway("client disconnected"))?;

        response
            .await
            .map_err(|_| WorkerError::gateway("request dropped without an answer"))
    }

    async fn notify(&self, message: SessionMessage) -> WorkerResult<()> {
        self.events
            .send(GatewayEvent::Message(message))
            .await
            .map_err(|_| WorkerError::gateway("client disconnected"))
    }
}

/// Gateway speaking JSON lines: messages are written one per line and each
/// request is answered by one line of `InteractionResponse` JSON.
pub struct LineGateway<R, W> {
    input: Mutex<Lines<R>>,
    output: Mutex<W>,
}

/// Gateway on the process's stdin/stdout.
pub type StdioGateway = LineGateway<BufReader<tokio::io::Stdin>, tokio::io::Stdout>;

impl StdioGateway {
    /// Gateway reading answers from stdin and writing messages to stdout.
    pub fn stdio() -> Self {
        LineGateway::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    /// Create a gateway over a line reader and a writer.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: Mutex::new(input.lines()),
            output: Mutex::new(output),
        }
    }

    async fn write_message(&self, message: &SessionMessage) -> WorkerResult<()> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut output = self.output.lock().await;
        output
            .write_all(&line)
            .await
            .map_err(|e| WorkerError::gateway(e.to_string()))?;
        output
            .flush()
            .await
            .map_err(|e| WorkerError::gateway(e.to_string()))
    }
}

#[async_trait]
impl<R, W> InteractionGateway for LineGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn request(&self, request: &InteractionRequest) -> WorkerResult<InteractionResponse> {
        self.write_message(&SessionMessage::input_required(request.clone()))
            .await?;

        let mut input = self.input.lock().await;
        loop {
            let line = input
                .next_line()
                .await
                .map_err(|e| WorkerError::gateway(e.to_string()))?
                .ok_or_else(|| WorkerError::gateway("input closed"))?;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!(input = trimmed, "Received user input");
            return serde_json::from_str(trimmed)
                .map_err(|e| WorkerError::invalid_input(e.to_string()));
        }
    }

    async fn notify(&self, message: SessionMessage) -> WorkerResult<()> {
        self.write_message(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtside_models::SessionMessageType;

    fn selection_request() -> InteractionRequest {
        InteractionRequest::PlayerSelection {
            frame_num: 3,
            available_players: vec![],
            message: "pick".into(),
        }
    }

    #[tokio::test]
    async fn test_channel_gateway_round_trip() {
        let (gateway, mut client) = ChannelGateway::pair(8);

        let answer = tokio::spawn(async move {
            let event = client.recv().await.unwrap();
            assert_eq!(event.message().message_type(), SessionMessageType::UserInputRequired);
            match event {
                GatewayEvent::Request { request, reply, .. } => {
                    assert_eq!(request.frame_num(), 3);
                    reply.send(InteractionResponse::select(5)).unwrap();
                }
                other => panic!("unexpected {:?}", other),
            }
        });

        let response = gateway.request(&selection_request()).await.unwrap();
        assert_eq!(response, InteractionResponse::select(5));
        answer.await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_gateway_reports_disconnect() {
        let (gateway, client) = ChannelGateway::pair(1);
        drop(client);
        assert!(matches!(
            gateway.notify(SessionMessage::heartbeat()).await,
            Err(WorkerError::Gateway(_))
        ));
    }

    #[tokio::test]
    async fn test_line_gateway() {
        let input = b"\nnot json\n{\"input_type\":\"player_selection\",\"player_id\":4}\n";
        let (writer, reader) = tokio::io::duplex(4096);
        let gateway = LineGateway::new(&input[..], writer);

        let err = gateway.request(&selection_request()).await.unwrap_err();
        assert!(err.should_reissue());

        let response = gateway.request(&selection_request()).await.unwrap();
        assert_eq!(response, InteractionResponse::select(4));

        assert!(matches!(
            gateway.request(&selection_request()).await,
            Err(WorkerError::Gateway(_))
        ));

        drop(gateway);
        let mut lines = BufReader::new(reader).lines();
        let first = lines.next_line().await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&first).unwrap();
        assert_eq!(value["type"], "user_input_required");
        assert_eq!(value["input_type"], "player_selection");
    }

    #[tokio::test]
    async fn test_line_gateway_writes_one_line_per_message() {
        let request = selection_request();
        let mut expected = serde_json::to_vec(&SessionMessage::input_required(request.clone())).unwrap();
        expected.push(b'\n');

        let reader = tokio_test::io::Builder::new()
            .read(b"{\"input_type\":\"confirmation\",\"confirmed\":false}\n")
            .build();
        let writer = tokio_test::io::Builder::new().write(&expected).build();
        let gateway = LineGateway::new(BufReader::new(reader), writer);

        let response = gateway.request(&request).await.unwrap();
        assert_eq!(response, InteractionResponse::confirm(false));
    }
}
