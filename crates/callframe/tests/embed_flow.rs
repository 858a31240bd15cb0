//! A host embedding the call machine end to end: config from TOML, a flaky
//! bundle download, then a short meeting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use callframe::loader_core::{BundleFetcher, FetchResponse};
use callframe::prelude::*;
use parking_lot::Mutex;
use serde_json::json;

/// First download fails with 503, later ones succeed
#[derive(Default)]
struct FlakyCdn {
    requests: AtomicUsize,
}

#[async_trait]
impl BundleFetcher for FlakyCdn {
    async fn fetch(&self, _url: &str, _headers: &HashMap<String, String>) -> Result<FetchResponse, String> {
        if self.requests.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(FetchResponse {
                status: 503,
                headers: HashMap::new(),
                body: String::new(),
            });
        }
        Ok(FetchResponse::ok("startCallMachine();"))
    }
}

#[derive(Default)]
struct Runtime {
    executed: Mutex<Vec<String>>,
}

impl CallMachineRuntime for Runtime {
    fn execute(&self, code: &str, _context: &LoaderContext) -> Result<(), String> {
        self.executed.lock().push(code.to_string());
        Ok(())
    }

    fn setup_call_frame(&self, _call_frame_id: &CallFrameId) {}
}

/// Replies to every correlated request; join replies carry the local participant
fn answer_requests(channel: InProcessMessageChannel, frame: &str) -> Arc<InProcessMessageChannel> {
    let channel = Arc::new(channel);
    let frame = CallFrameId::new(frame);
    let responder = channel.clone();
    let reply_frame = frame.clone();
    let listener: Arc<dyn ChannelListener> = Arc::new(move |message: &ChannelMessage| {
        if message.callback_stamp.is_none() {
            return;
        }
        let mut reply = message.reply(message.action.clone());
        if message.action == "join-meeting" {
            reply = reply.with_field(
                "participants",
                json!({ "local": { "session_id": "host-1", "local": true, "user_name": "Host" } }),
            );
        }
        responder.send_to_peer(reply, None, None, Some(&reply_frame));
    });
    channel.add_listener(listener, Some(frame));
    channel
}

#[tokio::test(start_paused = true)]
async fn test_react_native_host_loads_and_joins() -> anyhow::Result<()> {
    let host = HostConfig::from_toml_str(
        r#"
        [logging]
        level = "debug"
        app_name = "rn-host"

        [client]
        mode = "call-object"
        platform = "react-native"
        call_frame_id = "rn-frame"

        [client.loader]
        retry_delay_ms = 500
        "#,
    )?;
    assert_eq!(host.logging.parsed_level()?, tracing::Level::DEBUG);
    let config = host.client;

    let runtime = Arc::new(Runtime::default());
    let cdn = Arc::new(FlakyCdn::default());
    let loader = config.loader_builder(runtime.clone()).fetcher(cdn.clone()).build()?;

    let (module, embedded) = InProcessMessageChannel::pair();
    let _machine = answer_requests(embedded, "rn-frame");

    let client = CallClient::builder(Arc::new(module))
        .config(config)
        .loader(loader)
        .build()?;
    let mut events = client.subscribe();

    let participants = client
        .join(JoinOptions::new().with_url("https://acme.example.com/standup"))
        .await?;
    assert_eq!(participants.local().map(|p| p.session_id.as_str()), Some("host-1"));
    assert_eq!(cdn.requests.load(Ordering::SeqCst), 2);
    assert_eq!(*runtime.executed.lock(), vec!["startCallMachine();".to_string()]);

    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen[1], CallEvent::LoadAttemptFailed { will_retry: true, .. }));
    assert_eq!(
        seen.iter().map(CallEvent::kind).collect::<Vec<_>>(),
        vec![
            CallEventKind::Loading,
            CallEventKind::LoadAttemptFailed,
            CallEventKind::Loaded,
            CallEventKind::JoiningMeeting,
            CallEventKind::JoinedMeeting,
        ]
    );

    client.leave().await?;
    client.destroy();
    assert_eq!(client.meeting_state(), MeetingState::LeftMeeting);
    Ok(())
}

#[test]
fn test_logging_config_deserializes_with_defaults() -> anyhow::Result<()> {
    let config: LoggingConfig = serde_json::from_str(r#"{ "level": "debug", "json": true }"#)?;
    assert_eq!(config.parsed_level()?, tracing::Level::DEBUG);
    assert!(config.json);
    assert_eq!(config.app_name, "callframe");
    Ok(())
}
