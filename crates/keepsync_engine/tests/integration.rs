//! Integration tests for the client engine against a real sync server.

use keepsync_engine::{
    Client, HttpTransport, LoopbackClient, LoopbackServer, SyncConfig, SyncError,
    SyncOrchestrator, SyncState,
};
use keepsync_protocol::{HttpRequest, HttpResponse};
use keepsync_server::{PasswordParams, ServerConfig, SyncServer};
use keepsync_store::payload::{Payload, Text};
use keepsync_store::{FileRecordStore, ManualClock, RecordStore, Timestamp};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Routes loopback requests into a shared server.
#[derive(Clone)]
struct Remote(Arc<SyncServer>);

impl LoopbackServer for Remote {
    fn handle(&self, request: HttpRequest) -> HttpResponse {
        self.0.handle(request)
    }
}

type Transport = HttpTransport<LoopbackClient<Remote>>;

struct Harness {
    server: Arc<SyncServer>,
    shutdown: CancellationToken,
    dir: TempDir,
}

impl Harness {
    fn start(config: ServerConfig) -> Self {
        let server = Arc::new(SyncServer::with_memory_store(config).unwrap());
        let shutdown = CancellationToken::new();
        server.start(shutdown.clone()).unwrap();
        Self {
            server,
            shutdown,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn new() -> Self {
        Self::start(server_config())
    }

    /// A device: its own local file store and its own link to the server.
    fn device(&self, name: &str, clock_secs: i64) -> (Arc<Client>, Arc<Transport>) {
        let store = Arc::new(FileRecordStore::open(&self.dir.path().join(format!("{name}.json"))).unwrap());
        let transport = Arc::new(HttpTransport::new(LoopbackClient::new(Remote(Arc::clone(
            &self.server,
        )))));
        let client = Client::with_store(client_config(), store, transport.clone())
            .with_clock(Arc::new(ManualClock::new(Timestamp::from_secs(clock_secs))));
        (Arc::new(client), transport)
    }

    async fn wait_merged(&self, owner: &str, id: &str, updated: Timestamp) {
        for _ in 0..250 {
            if let Some(record) = self.server.store().get(owner, id).unwrap() {
                if record.updated == updated {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{owner}/{id} never merged at {updated}");
    }

    async fn shutdown(self) {
        self.shutdown.cancel();
        self.server.stopped().await;
    }
}

fn server_config() -> ServerConfig {
    ServerConfig::new(b"integration-secret".to_vec())
        .with_password_params(PasswordParams::insecure_fast())
        .with_flush_interval(Duration::from_millis(20))
}

fn client_config() -> SyncConfig {
    SyncConfig::new()
        .with_readback_delay(Duration::from_millis(100))
        .with_offline_login_delay(Duration::from_millis(10))
        .with_sync_interval(Duration::from_millis(50))
}

fn note(text: &str) -> Payload {
    Payload::Text(Text {
        data: text.into(),
        note: String::new(),
    })
}

#[tokio::test]
async fn entry_converges_to_second_device() {
    let h = Harness::new();
    let (phone, _) = h.device("phone", 1_000);
    let (laptop, _) = h.device("laptop", 1_000);

    phone.register("alice", "hunter2").await.unwrap();
    phone.enter("wifi", &note("correct horse")).await.unwrap();

    // The read-back already brought the merged copy home
    let local = phone.store().get("alice", "wifi").unwrap().unwrap();
    assert!(local.merged.is_some());

    laptop.login("alice", "hunter2").await.unwrap();
    assert!(laptop.is_online());
    assert_eq!(laptop.download().await.unwrap(), 1);
    assert_eq!(laptop.reveal("wifi").unwrap(), note("correct horse"));

    // Both sides agree on the watermark
    assert_eq!(
        laptop.store().watermark("alice").unwrap(),
        h.server.store().watermark("alice").unwrap()
    );
    h.shutdown().await;
}

#[tokio::test]
async fn later_update_wins_regardless_of_arrival_order() {
    let h = Harness::new();
    let (older, older_link) = h.device("older", 100);
    let (newer, newer_link) = h.device("newer", 200);

    older.register("alice", "pw").await.unwrap();
    newer.login("alice", "pw").await.unwrap();

    // Both devices write the same id while disconnected
    older_link.client().set_reachable(false);
    newer_link.client().set_reachable(false);
    older.enter("pin", &note("1111")).await.unwrap();
    newer.enter("pin", &note("2222")).await.unwrap();
    older_link.client().set_reachable(true);
    newer_link.client().set_reachable(true);

    // The newer write arrives first, the older one second
    assert_eq!(newer.upload().await.unwrap(), 1);
    h.wait_merged("alice", "pin", Timestamp::from_secs(200)).await;
    assert_eq!(older.upload().await.unwrap(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let merged = h.server.store().get("alice", "pin").unwrap().unwrap();
    assert_eq!(merged.updated, Timestamp::from_secs(200));
    assert!(h.server.pipeline_stats().records_rejected >= 1);

    // Downloads overwrite the losing local copy
    older.download().await.unwrap();
    newer.download().await.unwrap();
    assert_eq!(older.reveal("pin").unwrap(), note("2222"));
    assert_eq!(newer.reveal("pin").unwrap(), note("2222"));
    assert!(older.store().unmerged("alice").unwrap().is_empty());
    h.shutdown().await;
}

#[tokio::test]
async fn offline_login_when_server_unreachable() {
    let h = Harness::new();
    let (device, link) = h.device("device", 1_000);

    device.register("alice", "pw").await.unwrap();
    device.enter("note", &note("kept locally")).await.unwrap();
    device.logout();

    link.client().set_reachable(false);
    device.login("alice", "pw").await.unwrap();
    assert!(!device.is_online());
    assert_eq!(device.reveal("note").unwrap(), note("kept locally"));
    assert!(link.last_error().is_some());

    device.logout();
    assert!(matches!(
        device.login("alice", "wrong").await,
        Err(SyncError::InvalidCredentials)
    ));

    // Offline sessions never start the background loop
    device.login("alice", "pw").await.unwrap();
    let orchestrator = SyncOrchestrator::new(Arc::clone(&device));
    orchestrator.run().await.unwrap();
    assert_eq!(orchestrator.state(), SyncState::Stopped);
    h.shutdown().await;
}

#[tokio::test]
async fn remote_login_rejection() {
    let h = Harness::new();
    let (device, _) = h.device("device", 1_000);
    device.register("alice", "pw").await.unwrap();
    device.logout();

    assert!(matches!(
        device.register("alice", "other").await,
        Err(SyncError::AlreadyExists(_))
    ));
    assert!(matches!(
        device.login("alice", "other").await,
        Err(SyncError::InvalidCredentials)
    ));
    h.shutdown().await;
}

#[tokio::test]
async fn background_sync_picks_up_other_devices() {
    let h = Harness::new();
    let (phone, _) = h.device("phone", 1_000);
    let (laptop, _) = h.device("laptop", 1_000);
    phone.register("alice", "pw").await.unwrap();
    laptop.login("alice", "pw").await.unwrap();

    let orchestrator = Arc::new(SyncOrchestrator::new(Arc::clone(&laptop)));
    let handle = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        async move { orchestrator.run().await }
    });

    phone.enter("note", &note("from the phone")).await.unwrap();

    let mut seen = false;
    for _ in 0..100 {
        if laptop.store().get("alice", "note").unwrap().is_some() {
            seen = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(seen);
    assert_eq!(laptop.reveal("note").unwrap(), note("from the phone"));

    orchestrator.stop();
    handle.await.unwrap().unwrap();
    h.shutdown().await;
}

#[tokio::test]
async fn expired_token_terminates_background_sync() {
    let h = Harness::start(server_config().with_token_expiry(Duration::from_millis(150)));
    let (device, _) = h.device("device", 1_000);
    device.register("alice", "pw").await.unwrap();

    let orchestrator = SyncOrchestrator::new(Arc::clone(&device));
    let stop = orchestrator.cancel_token();

    let result = tokio::time::timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .expect("loop should end on its own");
    assert!(matches!(result, Err(SyncError::SessionExpired)));
    assert_eq!(orchestrator.state(), SyncState::Expired);
    assert!(stop.is_cancelled());
    assert!(!device.is_logged_in());
    assert!(matches!(device.index(), Err(SyncError::SessionExpired)));
    h.shutdown().await;
}

#[tokio::test]
async fn entries_survive_reopening_the_local_store() {
    let h = Harness::new();
    let path = h.dir.path().join("device.json");
    {
        let (device, _) = h.device("device", 1_000);
        device.register("alice", "pw").await.unwrap();
        device.enter("note", &note("persisted")).await.unwrap();
    }

    let reopened = FileRecordStore::open(&path).unwrap();
    let record = reopened.get("alice", "note").unwrap().unwrap();
    assert!(record.merged.is_some());
    h.shutdown().await;
}
