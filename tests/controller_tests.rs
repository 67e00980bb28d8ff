//! End-to-end tests of the chat session controller.
//! Replies are scripted as raw byte chunks and decoded by the real event stream parser.

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use futures::channel::mpsc::{UnboundedReceiver, unbounded};
    use futures::stream;
    use tokio::sync::Semaphore;
    use tokio_test::{assert_pending, assert_ready};

    use streamchat::{
        Author, CHAT_ERROR_MESSAGE, ChatConfig, ChatRequest, ChatSessionController, ChatTransport,
        ControllerState, ConversationTurn, Error, EventStream, FileStorage, FollowUpId,
        IgnoreReason, MemoryStorage, NoPacing, PACING_INTERVAL, Result, SESSION_STORAGE_KEY,
        SendOutcome, SessionId, Storage, TokioPacer, TranscriptRenderer, TurnKind,
        WELCOME_ERROR_MESSAGE, WelcomeResponse, get_or_create_session_id, process_events,
    };

    enum Reply {
        Chunks(Vec<&'static str>),
        ChunksThenError(Vec<&'static str>),
        Refuse(Error),
        Channel(UnboundedReceiver<Result<Bytes>>),
    }

    struct Script {
        welcome: Result<WelcomeResponse>,
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<(Option<SessionId>, ChatRequest)>>,
        gate: Option<Arc<Semaphore>>,
    }

    #[derive(Clone)]
    struct ScriptedTransport {
        script: Arc<Script>,
    }

    impl ScriptedTransport {
        fn new(welcome: Result<WelcomeResponse>, replies: Vec<Reply>) -> Self {
            Self::build(welcome, replies, None)
        }

        fn gated(replies: Vec<Reply>, gate: Arc<Semaphore>) -> Self {
            Self::build(Ok(welcome(None)), replies, Some(gate))
        }

        fn build(
            welcome: Result<WelcomeResponse>,
            replies: Vec<Reply>,
            gate: Option<Arc<Semaphore>>,
        ) -> Self {
            Self {
                script: Arc::new(Script {
                    welcome,
                    replies: Mutex::new(replies.into()),
                    requests: Mutex::new(Vec::new()),
                    gate,
                }),
            }
        }

        fn requests(&self) -> Vec<(Option<SessionId>, ChatRequest)> {
            self.script.requests.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn welcome(&self) -> Result<WelcomeResponse> {
            self.script.welcome.clone()
        }

        async fn open_chat_stream(
            &self,
            session_id: Option<&SessionId>,
            request: &ChatRequest,
        ) -> Result<EventStream> {
            self.script
                .requests
                .lock()
                .unwrap()
                .push((session_id.cloned(), request.clone()));
            if let Some(gate) = &self.script.gate {
                gate.acquire().await.expect("gate closed").forget();
            }
            let reply = self
                .script
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left");
            let (chunks, fail) = match reply {
                Reply::Chunks(chunks) => (chunks, false),
                Reply::ChunksThenError(chunks) => (chunks, true),
                Reply::Refuse(err) => return Err(err),
                Reply::Channel(rx) => return Ok(Box::pin(process_events(rx))),
            };
            let mut items: Vec<Result<Bytes>> = chunks
                .into_iter()
                .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
                .collect();
            if fail {
                items.push(Err(Error::streaming("connection reset", None)));
            }
            Ok(Box::pin(process_events(stream::iter(items))))
        }
    }

    fn welcome(session_id: Option<&str>) -> WelcomeResponse {
        WelcomeResponse {
            content: "안녕하세요! 무엇을 도와드릴까요?".to_string(),
            session_id: session_id.map(str::to_string),
        }
    }

    fn controller(
        transport: ScriptedTransport,
        storage: impl Storage + 'static,
    ) -> ChatSessionController<ScriptedTransport, TranscriptRenderer> {
        ChatSessionController::new(
            transport,
            TranscriptRenderer::new(),
            storage,
            NoPacing,
            ChatConfig::default(),
        )
    }

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "streamchat-controller-{}-{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        path
    }

    const REPLY_AB: &[&str] = &[
        "data: {\"type\": \"message\", \"content\": \"A\"}\n\n",
        "data: {\"type\": \"message\", \"con",
        "tent\": \"B\"}\n\ndata: {\"type\": \"done\", \"content\": \"[DONE]\"}\n\n",
    ];

    #[tokio::test]
    async fn test_streamed_reply_is_assembled() {
        let transport =
            ScriptedTransport::new(Ok(welcome(None)), vec![Reply::Chunks(REPLY_AB.to_vec())]);
        let controller = controller(transport, MemoryStorage::new());
        controller.load_welcome().await.unwrap();

        let outcome = controller.send_message("hi").await;
        let SendOutcome::Completed(reply) = &outcome else {
            panic!("expected a completed reply, got {outcome:?}");
        };
        assert_eq!(reply.stats.fragments, 2);
        assert!(reply.left_open.is_none());

        let transcript = controller.into_renderer();
        assert_eq!(
            transcript.turns(),
            &[
                ConversationTurn::assistant("안녕하세요! 무엇을 도와드릴까요?"),
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("AB"),
            ]
        );
        assert_eq!(transcript.open_message_count(), 0);
        assert_eq!(transcript.loading_shown(), 1);
        assert_eq!(transcript.loading_removed(), 1);
        assert!(transcript.input_enabled());
        assert_eq!(transcript.input_cleared(), 1);
        assert_eq!(transcript.focus_count(), 1);
    }

    #[tokio::test]
    async fn test_server_session_id_is_sent_and_persisted() {
        let path = temp_path("server-id");
        let transport = ScriptedTransport::new(
            Ok(welcome(Some("srv-1"))),
            vec![
                Reply::Chunks(REPLY_AB.to_vec()),
                Reply::Chunks(REPLY_AB.to_vec()),
            ],
        );
        let controller = controller(transport.clone(), FileStorage::open(&path).unwrap());
        controller.load_welcome().await.unwrap();
        assert_eq!(controller.session_id(), Some(SessionId::new("srv-1")));

        controller.send_message("hi").await;
        controller.send_message("again").await;
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        for (session_id, _) in &requests {
            assert_eq!(session_id, &Some(SessionId::new("srv-1")));
        }
        assert_eq!(requests[0].1, ChatRequest::new("hi"));
        assert_eq!(requests[1].1, ChatRequest::new("again"));

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get(SESSION_STORAGE_KEY), Some("srv-1".to_string()));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_welcome_without_session_id_uses_stored_identity() {
        let mut storage = MemoryStorage::new();
        storage.set(SESSION_STORAGE_KEY, "stored-id");
        let transport =
            ScriptedTransport::new(Ok(welcome(None)), vec![Reply::Chunks(REPLY_AB.to_vec())]);
        let controller = controller(transport.clone(), storage);
        controller.load_welcome().await.unwrap();

        controller.send_message("hi").await;
        assert_eq!(transport.requests()[0].0, Some(SessionId::new("stored-id")));
    }

    #[tokio::test]
    async fn test_welcome_failure_renders_fixed_message() {
        let transport = ScriptedTransport::new(
            Err(Error::api(503, "unavailable")),
            vec![Reply::Chunks(REPLY_AB.to_vec())],
        );
        let controller = controller(transport.clone(), MemoryStorage::new());
        let err = controller.load_welcome().await.unwrap_err();
        assert!(err.is_welcome_fetch_failed());
        assert_eq!(err.status_code(), Some(503));

        // The session still has an identity and can chat.
        let session_id = controller.session_id().expect("fallback session id");
        let outcome = controller.send_message("hi").await;
        assert!(matches!(outcome, SendOutcome::Completed(_)));
        assert_eq!(transport.requests()[0].0, Some(session_id));

        let transcript = controller.into_renderer();
        assert_eq!(
            transcript.turns()[0],
            ConversationTurn::assistant(WELCOME_ERROR_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_follow_ups_render_in_order_and_send_on_click() {
        let transport = ScriptedTransport::new(
            Ok(welcome(None)),
            vec![
                Reply::Chunks(vec![
                    "data: {\"type\": \"follow_up\", \"content\": \"Q1\"}\n\n",
                    "data: {\"type\": \"message\", \"content\": \"A\"}\n\n",
                    "data: {\"type\": \"follow_up\", \"content\": \"Q2\"}\n\n",
                    "data: {\"type\": \"follow_up\", \"content\": \"Q3\"}\n\n",
                    "data: {\"type\": \"done\", \"content\": \"[DONE]\"}\n\n",
                ]),
                Reply::Chunks(vec![
                    "data: {\"type\": \"message\", \"content\": \"B\"}\n\n",
                    "data: {\"type\": \"follow_up\", \"content\": \"Q4\"}\n\n",
                    "data: {\"type\": \"done\", \"content\": \"[DONE]\"}\n\n",
                ]),
            ],
        );
        let controller = controller(transport.clone(), MemoryStorage::new());

        controller.send_message("first").await;
        assert_eq!(controller.follow_ups(), vec!["Q1", "Q2", "Q3"]);

        let outcome = controller.click_follow_up(FollowUpId::new(1)).await;
        assert!(matches!(outcome, SendOutcome::Completed(_)));
        assert_eq!(transport.requests()[1].1.message, "Q2");
        assert_eq!(controller.follow_ups(), vec!["Q1", "Q2", "Q3", "Q4"]);

        let transcript = controller.into_renderer();
        let follow_ups: Vec<_> = transcript
            .turns_of(Author::Assistant, TurnKind::FollowUp)
            .into_iter()
            .map(|turn| turn.text.clone())
            .collect();
        assert_eq!(follow_ups, vec!["Q1", "Q2", "Q3", "Q4"]);
        assert_eq!(
            transcript.follow_up_ids(),
            &[
                FollowUpId::new(0),
                FollowUpId::new(1),
                FollowUpId::new(2),
                FollowUpId::new(3),
            ]
        );
        let users: Vec<_> = transcript
            .turns_of(Author::User, TurnKind::Message)
            .into_iter()
            .map(|turn| turn.text.clone())
            .collect();
        assert_eq!(users, vec!["first", "Q2"]);
    }

    #[tokio::test]
    async fn test_empty_message_is_ignored() {
        let transport = ScriptedTransport::new(Ok(welcome(None)), vec![]);
        let controller = controller(transport.clone(), MemoryStorage::new());
        for text in ["", "   ", "\n\t"] {
            let outcome = controller.send_message(text).await;
            assert!(matches!(outcome, SendOutcome::Ignored(IgnoreReason::Empty)));
            assert!(!outcome.was_sent());
        }
        assert!(transport.requests().is_empty());
        let transcript = controller.into_renderer();
        assert!(transcript.turns().is_empty());
        assert_eq!(transcript.loading_shown(), 0);
        assert!(transcript.input_enabled());
    }

    #[tokio::test]
    async fn test_user_turn_renders_before_response() {
        let gate = Arc::new(Semaphore::new(0));
        let transport =
            ScriptedTransport::gated(vec![Reply::Chunks(REPLY_AB.to_vec())], gate.clone());
        let controller = controller(transport, MemoryStorage::new());

        let mut send = tokio_test::task::spawn(controller.send_message("hello"));
        assert_pending!(send.poll());

        controller.with_renderer(|transcript| {
            assert_eq!(transcript.last_turn(), Some(&ConversationTurn::user("hello")));
            assert!(transcript.is_loading());
            assert!(!transcript.input_enabled());
        });
        assert_eq!(controller.state(), ControllerState::Sending);

        gate.add_permits(1);
        assert!(send.is_woken());
        let outcome = assert_ready!(send.poll());
        assert!(matches!(outcome, SendOutcome::Completed(_)));
        drop(send);
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_loading_removed_on_first_non_follow_up_event() {
        let (tx, rx) = unbounded();
        let transport = ScriptedTransport::new(Ok(welcome(None)), vec![Reply::Channel(rx)]);
        let controller = controller(transport, MemoryStorage::new());

        let mut send = tokio_test::task::spawn(controller.send_message("hi"));
        assert_pending!(send.poll());
        assert!(controller.with_renderer(|transcript| transcript.is_loading()));

        tx.unbounded_send(Ok(Bytes::from_static(
            b"data: {\"type\": \"follow_up\", \"content\": \"Q1\"}\n\n",
        )))
        .unwrap();
        assert_pending!(send.poll());
        controller.with_renderer(|transcript| {
            assert_eq!(
                transcript.last_turn(),
                Some(&ConversationTurn::follow_up("Q1"))
            );
            assert!(transcript.is_loading());
            assert_eq!(transcript.loading_removed(), 0);
        });

        tx.unbounded_send(Ok(Bytes::from_static(
            b"data: {\"type\": \"message\", \"content\": \"A\"}\n\n",
        )))
        .unwrap();
        assert_pending!(send.poll());
        controller.with_renderer(|transcript| {
            assert_eq!(transcript.last_turn(), Some(&ConversationTurn::assistant("A")));
            assert!(!transcript.is_loading());
            assert_eq!(transcript.loading_removed(), 1);
        });

        tx.unbounded_send(Ok(Bytes::from_static(b"data: {\"type\": \"done\"}\n\n")))
            .unwrap();
        drop(tx);
        let outcome = assert_ready!(send.poll());
        assert!(matches!(outcome, SendOutcome::Completed(_)));
        drop(send);

        let transcript = controller.into_renderer();
        assert_eq!(transcript.loading_shown(), 1);
        assert_eq!(transcript.loading_removed(), 1);
    }

    #[tokio::test]
    async fn test_send_while_busy_is_ignored() {
        let gate = Arc::new(Semaphore::new(0));
        let transport = ScriptedTransport::gated(
            vec![Reply::Chunks(REPLY_AB.to_vec()), Reply::Chunks(REPLY_AB.to_vec())],
            gate.clone(),
        );
        let controller = controller(transport.clone(), MemoryStorage::new());

        let (first, second) = tokio::join!(controller.send_message("one"), async {
            let second = controller.send_message("two").await;
            gate.add_permits(1);
            second
        });
        assert!(matches!(first, SendOutcome::Completed(_)));
        assert!(matches!(second, SendOutcome::Ignored(IgnoreReason::Busy)));
        assert_eq!(transport.requests().len(), 1);

        // Once the first reply is done the next send goes through.
        gate.add_permits(1);
        let third = controller.send_message("three").await;
        assert!(matches!(third, SendOutcome::Completed(_)));
        assert_eq!(transport.requests().len(), 2);

        let transcript = controller.into_renderer();
        let users = transcript.turns_of(Author::User, TurnKind::Message);
        assert_eq!(users.len(), 2);
        assert_eq!(transcript.loading_shown(), 2);
        assert_eq!(transcript.loading_removed(), 2);
    }

    #[tokio::test]
    async fn test_stream_failure_mid_reply() {
        let transport = ScriptedTransport::new(
            Ok(welcome(None)),
            vec![Reply::ChunksThenError(vec![
                "data: {\"type\": \"follow_up\", \"content\": \"Q1\"}\n\n",
                "data: {\"type\": \"message\", \"content\": \"A\"}\n\n",
            ])],
        );
        let controller = controller(transport, MemoryStorage::new());

        let outcome = controller.send_message("hi").await;
        let SendOutcome::Failed { error, partial } = &outcome else {
            panic!("expected a failure, got {outcome:?}");
        };
        assert!(error.is_chat_stream_failed());
        assert_eq!(error.user_message(), CHAT_ERROR_MESSAGE);
        assert!(partial.left_open.is_none());
        assert_eq!(partial.follow_ups, vec!["Q1"]);
        assert_eq!(controller.state(), ControllerState::Idle);

        let transcript = controller.into_renderer();
        assert_eq!(
            transcript.turns(),
            &[
                ConversationTurn::user("hi"),
                ConversationTurn::follow_up("Q1"),
                ConversationTurn::assistant("A"),
                ConversationTurn::assistant(CHAT_ERROR_MESSAGE),
            ]
        );
        assert_eq!(transcript.open_message_count(), 0);
        assert_eq!(transcript.loading_removed(), 1);
        assert!(!transcript.is_loading());
        assert!(transcript.input_enabled());
    }

    #[tokio::test]
    async fn test_refused_request_renders_one_error_turn() {
        let transport = ScriptedTransport::new(
            Ok(welcome(None)),
            vec![
                Reply::Refuse(Error::api(422, "message too long")),
                Reply::Chunks(REPLY_AB.to_vec()),
            ],
        );
        let controller = controller(transport, MemoryStorage::new());

        let outcome = controller.send_message("hi").await;
        let error = outcome.error().expect("send should fail");
        assert!(error.is_chat_stream_failed());
        assert_eq!(error.status_code(), Some(422));

        // A failed send does not block the next one.
        let outcome = controller.send_message("again").await;
        assert!(matches!(outcome, SendOutcome::Completed(_)));

        let transcript = controller.into_renderer();
        let errors = transcript
            .turns()
            .iter()
            .filter(|turn| turn.text == CHAT_ERROR_MESSAGE)
            .count();
        assert_eq!(errors, 1);
        assert_eq!(transcript.loading_shown(), 2);
        assert_eq!(transcript.loading_removed(), 2);
        assert!(transcript.input_enabled());
    }

    #[tokio::test]
    async fn test_malformed_event_fails_the_send() {
        let transport = ScriptedTransport::new(
            Ok(welcome(None)),
            vec![Reply::Chunks(vec![
                "data: {\"type\": \"message\", \"content\": \"A\"}\n\n",
                "data: {not json}\n\n",
                "data: {\"type\": \"message\", \"content\": \"B\"}\n\n",
            ])],
        );
        let controller = controller(transport, MemoryStorage::new());

        let outcome = controller.send_message("hi").await;
        assert!(outcome.error().is_some_and(Error::is_chat_stream_failed));

        let transcript = controller.into_renderer();
        assert_eq!(
            transcript.turns(),
            &[
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("A"),
                ConversationTurn::assistant(CHAT_ERROR_MESSAGE),
            ]
        );
    }

    #[tokio::test]
    async fn test_message_over_limit_is_rejected_without_sending() {
        let transport = ScriptedTransport::new(Ok(welcome(None)), vec![]);
        let controller = controller(transport.clone(), MemoryStorage::new());
        let outcome = controller.send_message(&"a".repeat(1001)).await;
        assert!(matches!(
            outcome,
            SendOutcome::Ignored(IgnoreReason::TooLong { chars: 1001, max: 1000 })
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragments_are_paced() {
        let transport =
            ScriptedTransport::new(Ok(welcome(None)), vec![Reply::Chunks(REPLY_AB.to_vec())]);
        let controller = ChatSessionController::new(
            transport,
            TranscriptRenderer::new(),
            MemoryStorage::new(),
            TokioPacer,
            ChatConfig::default(),
        );
        let start = tokio::time::Instant::now();
        controller.send_message("hi").await;
        let elapsed = start.elapsed();
        assert!(elapsed >= PACING_INTERVAL * 2);
        assert!(elapsed < PACING_INTERVAL * 2 + Duration::from_millis(5));
    }

    #[test]
    fn test_session_identity_survives_reopen() {
        let path = temp_path("identity");
        let mut storage = FileStorage::open(&path).unwrap();
        let first = get_or_create_session_id(&mut storage);
        assert_eq!(get_or_create_session_id(&mut storage), first);

        let mut reopened = FileStorage::open(&path).unwrap();
        assert_eq!(get_or_create_session_id(&mut reopened), first);
        let _ = std::fs::remove_file(&path);
    }
}
