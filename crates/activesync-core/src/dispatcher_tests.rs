use std::fmt;
use std::sync::Arc;

use activesync_types::{
    Command, Device, GlobalStatus, ProtocolError, ProtocolVersion, ProvisioningMode, ServerConfig,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{span, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use crate::backend::AuthOutcome;
use crate::error::AppError;
use crate::dispatcher::{ActiveSyncRequest, ActiveSyncResponse};
use crate::router::{CommandRouter, HandlerOutcome};
use crate::Dispatcher;
use crate::store::{DeviceStore, MemoryDeviceStore};
use crate::test_support::{dispatcher, CountingStore, MockBackend, RecordingHandler, PASSWORD};

const WBXML_BODY: &[u8] = &[0x03, 0x01, 0x6a, 0x00, 0x00, 0x07];

fn request(method: Method, query: Option<&str>, version: &str) -> ActiveSyncRequest {
    let mut headers = HeaderMap::new();
    let auth = format!("Basic {}", STANDARD.encode(format!("alice:{}", PASSWORD)));
    headers.insert("authorization", HeaderValue::from_str(&auth).unwrap());
    headers.insert("user-agent", HeaderValue::from_static("Apple-iPhone9C1/1402.100"));
    headers.insert("ms-asprotocolversion", HeaderValue::from_str(version).unwrap());
    ActiveSyncRequest {
        method,
        headers,
        query: query.map(str::to_string),
        body: Bytes::from_static(WBXML_BODY),
    }
}

fn post(cmd: &str, version: &str) -> ActiveSyncRequest {
    let query = format!("Cmd={}&User=alice&DeviceId=ApplDev1&DeviceType=iPhone", cmd);
    request(Method::POST, Some(&query), version)
}

fn header<'a>(response: &'a ActiveSyncResponse, name: &str) -> Option<&'a str> {
    response.headers.get(name).and_then(|v| v.to_str().ok())
}

fn plain(router: CommandRouter) -> Dispatcher {
    dispatcher(ServerConfig::new(), MockBackend::default(), Arc::new(MemoryDeviceStore::new()), router)
}

fn with_handler(commands: &[Command], handler: &Arc<RecordingHandler>) -> CommandRouter {
    commands.iter().fold(CommandRouter::new(), |router, cmd| router.register(*cmd, handler.clone()))
}

async fn seed_device(store: &dyn DeviceStore, version: ProtocolVersion, edit: impl FnOnce(&mut Device)) {
    let mut device = Device::new("APPLDEV1", "alice");
    device.user_agent = Some("Apple-iPhone9C1/1402.100".to_string());
    device.device_type = "iPhone".to_string();
    device.version = Some(version);
    edit(&mut device);
    store.save_device(&device).await.unwrap();
}

#[tokio::test]
async fn test_options_without_device_skips_registry() {
    let store = Arc::new(CountingStore::default());
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store.clone(), CommandRouter::new());

    let response = d.handle(request(Method::OPTIONS, None, "14.1")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(store.calls(), 0);
    assert!(response.body.is_empty());
    assert_eq!(response.headers.len(), 6);
    assert_eq!(header(&response, "ms-asprotocolversions"), Some("2.5,12.0,12.1,14.0,14.1"));
    assert_eq!(header(&response, "ms-server-activesync"), Some("14.2"));
    assert!(header(&response, "content-type").is_none());
}

#[tokio::test]
async fn test_get_answered_like_options() {
    let store = Arc::new(CountingStore::default());
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store.clone(), CommandRouter::new());

    // A command parameter on GET is ignored.
    let query = "Cmd=Sync&User=alice&DeviceId=ApplDev1&DeviceType=iPhone";
    let response = d.handle(request(Method::GET, Some(query), "14.1")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body.is_empty());
    assert_eq!(header(&response, "ms-asprotocolversions"), Some("2.5,12.0,12.1,14.0,14.1"));
    assert!(header(&response, "ms-asprotocolcommands").is_some());
}

#[tokio::test]
async fn test_advertised_versions_follow_configured_max() {
    let mut config = ServerConfig::new();
    config.max_version = ProtocolVersion::V12_1;
    let store = Arc::new(MemoryDeviceStore::new());
    let d = dispatcher(config, MockBackend::default(), store, CommandRouter::new());

    let response = d.handle(request(Method::OPTIONS, None, "12.1")).await;
    assert_eq!(header(&response, "ms-asprotocolversions"), Some("2.5,12.0,12.1"));
    assert_eq!(header(&response, "ms-server-activesync"), Some("12.1"));
}

#[tokio::test]
async fn test_version_callback_lowers_ceiling() {
    let backend = MockBackend { ceiling: Some(ProtocolVersion::V2_5), ..Default::default() };
    let store = Arc::new(MemoryDeviceStore::new());
    let d = dispatcher(ServerConfig::new(), backend, store, CommandRouter::new());

    let response = d.handle(request(Method::OPTIONS, None, "2.5")).await;
    assert_eq!(header(&response, "ms-asprotocolversions"), Some("2.5"));
    assert!(!header(&response, "ms-asprotocolcommands").unwrap().contains("Settings"));
}

#[tokio::test]
async fn test_options_with_device_resolves_device() {
    let store = Arc::new(MemoryDeviceStore::new());
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store.clone(), CommandRouter::new());

    let response = d.handle(post("Options", "14.1")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(store.device_exists_for_user("APPLDEV1", "alice").await.unwrap());
}

#[tokio::test]
async fn test_missing_credentials_is_unauthorized() {
    let d = plain(CommandRouter::new());

    let mut req = post("Sync", "14.1");
    req.headers.remove("authorization");
    req.query = Some("Cmd=Sync&DeviceId=X&DeviceType=iPhone".to_string());
    let response = d.handle(req).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(header(&response, "www-authenticate"), Some("Basic realm=\"ActiveSync\""));
    assert!(header(&response, "ms-asprotocolcommands").is_some());
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let store = Arc::new(CountingStore::default());
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store.clone(), CommandRouter::new());

    let mut req = post("Sync", "14.1");
    let auth = format!("Basic {}", STANDARD.encode("alice:nope"));
    req.headers.insert("authorization", HeaderValue::from_str(&auth).unwrap());

    assert_eq!(d.handle(req).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_folder_aliases_reach_folder_create_handler() {
    let handler = Arc::new(RecordingHandler::default());
    let router = with_handler(&[Command::FolderCreate], &handler);
    let d = plain(router);

    for cmd in ["FolderCreate", "FolderDelete", "FolderUpdate"] {
        let response = d.handle(post(cmd, "14.1")).await;
        assert_eq!(response.status, StatusCode::OK, "{}", cmd);
        assert_eq!(response.body.as_ref(), b"ok");
    }
    assert_eq!(handler.calls(), 3);
}

#[tokio::test]
async fn test_enforced_policy_mismatch_requires_provisioning() {
    let store = Arc::new(MemoryDeviceStore::new());
    seed_device(store.as_ref(), ProtocolVersion::V14_1, |d| d.policykey = 1234).await;

    let handler = Arc::new(RecordingHandler::default());
    let router = with_handler(&[Command::Sync, Command::Provision], &handler);
    let backend = MockBackend { provisioning: ProvisioningMode::Enforced, ..Default::default() };
    let d = dispatcher(ServerConfig::new(), backend, store, router);

    let mut req = post("Sync", "14.1");
    req.headers.insert("x-ms-policykey", HeaderValue::from_static("99"));
    let response = d.handle(req).await;

    assert_eq!(response.status.as_u16(), 449);
    assert_eq!(response.body.as_ref(), b"Retry after sending a PROVISION command");
    assert_eq!(header(&response, "cache-control"), Some("private"));
    assert_eq!(handler.calls(), 0);

    let response = d.handle(post("Provision", "14.1")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn test_matching_policy_key_passes_gate() {
    let store = Arc::new(MemoryDeviceStore::new());
    seed_device(store.as_ref(), ProtocolVersion::V14_1, |d| d.policykey = 1234).await;

    let handler = Arc::new(RecordingHandler::default());
    let backend = MockBackend { provisioning: ProvisioningMode::Enforced, ..Default::default() };
    let d = dispatcher(ServerConfig::new(), backend, store, with_handler(&[Command::Sync], &handler));

    let req = post("Sync&PolicyKey=1234", "14.1");
    assert_eq!(d.handle(req).await.status, StatusCode::OK);
    assert_eq!(handler.calls(), 1);
}

#[tokio::test]
async fn test_blocked_device_by_version() {
    let store = Arc::new(MemoryDeviceStore::new());
    seed_device(store.as_ref(), ProtocolVersion::V12_0, |d| d.blocked = true).await;

    let handler = Arc::new(RecordingHandler::default());
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store, with_handler(&[Command::Sync], &handler));

    let legacy = d.handle(post("Sync", "12.0")).await;
    assert_eq!(legacy.status, StatusCode::FORBIDDEN);
    assert_eq!(handler.calls(), 0);

    let modern = d.handle(post("Sync", "14.1")).await;
    assert_eq!(modern.status, StatusCode::OK);
    assert_eq!(modern.global_error, Some(GlobalStatus::DeviceBlockedForUser));
    assert_eq!(handler.global_errors.lock().as_slice(), &[Some(GlobalStatus::DeviceBlockedForUser)]);
}

#[tokio::test]
async fn test_user_denied_by_version() {
    let handler = Arc::new(RecordingHandler::default());
    let backend = MockBackend { outcome: Some(AuthOutcome::UserDenied), ..Default::default() };
    let store = Arc::new(MemoryDeviceStore::new());
    let d = dispatcher(ServerConfig::new(), backend, store, with_handler(&[Command::Sync], &handler));

    assert_eq!(d.handle(post("Sync", "12.1")).await.status, StatusCode::FORBIDDEN);

    let modern = d.handle(post("Sync", "14.0")).await;
    assert_eq!(modern.status, StatusCode::OK);
    assert_eq!(modern.global_error, Some(GlobalStatus::SyncNotAllowed));
}

#[tokio::test]
async fn test_device_callback_veto() {
    let backend = MockBackend { deny_devices: true, ..Default::default() };
    let store = Arc::new(MemoryDeviceStore::new());
    let d = dispatcher(ServerConfig::new(), backend, store.clone(), CommandRouter::new());

    let response = d.handle(post("Sync", "12.1")).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    // The device is saved before the veto runs.
    assert!(store.device_exists("APPLDEV1").await.unwrap());
}

#[tokio::test]
async fn test_protocol_errors() {
    let handler = Arc::new(RecordingHandler::default());
    let d = plain(with_handler(&[Command::Sync], &handler));

    let unknown = d.handle(post("Frobnicate", "14.1")).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8_lossy(&unknown.body).contains("Frobnicate not supported"));

    let no_device = d.handle(request(Method::POST, Some("Cmd=Sync&User=alice"), "14.1")).await;
    assert_eq!(no_device.status, StatusCode::BAD_REQUEST);

    let no_command = d.handle(request(Method::POST, Some("DeviceId=X&User=alice"), "14.1")).await;
    assert_eq!(no_command.status, StatusCode::BAD_REQUEST);

    let bad_version = d.handle(post("Sync", "9.9")).await;
    assert_eq!(bad_version.status, StatusCode::BAD_REQUEST);

    let mut garbage = post("Sync", "14.1");
    garbage.body = Bytes::from_static(&[0x03, 0x81, 0x81, 0x81, 0x81, 0x81, 0x01]);
    assert_eq!(d.handle(garbage).await.status, StatusCode::BAD_REQUEST);

    assert_eq!(handler.calls(), 0);
}

#[tokio::test]
async fn test_unregistered_command_is_not_implemented() {
    let d = plain(CommandRouter::new());
    let response = d.handle(post("Ping", "14.1")).await;
    assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_autodiscover_runs_before_authentication() {
    let handler = Arc::new(RecordingHandler {
        outcome: Some(HandlerOutcome::ContentType("text/xml".to_string())),
        ..Default::default()
    });
    let store = Arc::new(CountingStore::default());
    let router = with_handler(&[Command::Autodiscover], &handler);
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store.clone(), router);

    let mut req = request(Method::POST, Some("Cmd=Autodiscover"), "14.1");
    req.headers.remove("authorization");
    let response = d.handle(req).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("text/xml"));
    assert_eq!(handler.calls(), 1);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_response_headers_and_content_type() {
    let handler = Arc::new(RecordingHandler::default());
    let d = plain(with_handler(&[Command::Sync, Command::ItemOperations], &handler));

    let response = d.handle(post("Sync", "14.1")).await;
    assert_eq!(header(&response, "content-type"), Some("application/vnd.ms-sync.wbxml"));
    assert_eq!(header(&response, "allow"), Some("OPTIONS,POST"));
    assert!(header(&response, "server").unwrap().starts_with("ActiveSync_Gateway Library v"));
    assert!(header(&response, "x-ms-rp").is_none());

    let mut multipart = post("ItemOperations", "14.1");
    multipart.headers.insert("ms-asacceptmultipart", HeaderValue::from_static("T"));
    let response = d.handle(multipart).await;
    assert_eq!(header(&response, "content-type"), Some("application/vnd.ms-sync.multipart"));
}

#[tokio::test]
async fn test_attachment_content_type_override() {
    let handler = Arc::new(RecordingHandler {
        outcome: Some(HandlerOutcome::ContentType("image/jpeg".to_string())),
        ..Default::default()
    });
    let d = plain(with_handler(&[Command::GetAttachment], &handler));

    let response = d.handle(post("GetAttachment&AttachmentName=1:2", "12.1")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(header(&response, "content-type"), Some("image/jpeg"));
}

#[tokio::test]
async fn test_handler_failure_is_server_error() {
    let handler = Arc::new(RecordingHandler {
        outcome: Some(HandlerOutcome::Completed(false)),
        ..Default::default()
    });
    let d = plain(with_handler(&[Command::Sync], &handler));
    assert_eq!(d.handle(post("Sync", "14.1")).await.status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_upgrade_announced_with_rp_header() {
    let store = Arc::new(MemoryDeviceStore::new());
    seed_device(store.as_ref(), ProtocolVersion::V12_1, |d| {
        d.announced_versions = Some("2.5,12.0,12.1".to_string());
    })
    .await;

    let handler = Arc::new(RecordingHandler::default());
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store, with_handler(&[Command::Sync], &handler));

    let response = d.handle(post("Sync", "12.1")).await;
    assert_eq!(header(&response, "x-ms-rp"), Some("2.5,12.0,12.1,14.0,14.1"));

    let response = d.handle(post("Sync", "12.1")).await;
    assert!(header(&response, "x-ms-rp").is_none());
}

#[tokio::test]
async fn test_handler_device_changes_are_persisted() {
    let store = Arc::new(MemoryDeviceStore::new());
    let handler = Arc::new(RecordingHandler { assign_policy_key: Some(777), ..Default::default() });
    let router = with_handler(&[Command::Provision], &handler);
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store.clone(), router);

    assert_eq!(d.handle(post("Provision", "14.1")).await.status, StatusCode::OK);
    let device = store.load_device("APPLDEV1", Some("alice")).await.unwrap().unwrap();
    assert_eq!(device.policykey, 777);
}

#[tokio::test]
async fn test_missing_handler_reports_command() {
    let d = plain(CommandRouter::new());
    let response = d.handle(post("Sync", "14.1")).await;
    assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);

    let expected = AppError::from(ProtocolError::NotImplemented { command: "Sync".to_string() });
    assert_eq!(response.body, Bytes::from(expected.to_string()));
}

/// Collects every value recorded on a span after creation.
#[derive(Clone, Default)]
struct RecordedFields(Arc<Mutex<Vec<(String, String)>>>);

impl<S: Subscriber> Layer<S> for RecordedFields {
    fn on_record(&self, _id: &span::Id, values: &span::Record<'_>, _ctx: Context<'_, S>) {
        values.record(&mut FieldCollector(&self.0));
    }
}

struct FieldCollector<'a>(&'a Mutex<Vec<(String, String)>>);

impl Visit for FieldCollector<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.lock().push((field.name().to_string(), format!("{:?}", value)));
    }
}

#[tokio::test]
async fn test_global_status_recorded_on_request_span() {
    let fields = RecordedFields::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(fields.clone()));

    let store = Arc::new(MemoryDeviceStore::new());
    seed_device(store.as_ref(), ProtocolVersion::V14_1, |d| d.blocked = true).await;
    let handler = Arc::new(RecordingHandler::default());
    let d = dispatcher(ServerConfig::new(), MockBackend::default(), store, with_handler(&[Command::Sync], &handler));

    let response = d.handle(post("Sync", "14.1")).await;
    assert_eq!(response.global_error, Some(GlobalStatus::DeviceBlockedForUser));

    let recorded = fields.0.lock().clone();
    assert!(recorded.contains(&("user".to_string(), "\"alice\"".to_string())), "{:?}", recorded);
    assert!(recorded.contains(&("global_status".to_string(), "129".to_string())), "{:?}", recorded);
}
