use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use syncbell::service::{STATUS_MALFORMED, STATUS_UNAUTHORIZED, STATUS_UNKNOWN_OPCODE};
use syncbell::transport::{loopback_pair, serve_connection, LoopbackServer, StreamCaller};
use syncbell::wire::StreamConfig;
use syncbell::{
    ChangeNotice, ChangeOp, ChangePayload, ChangedData, EventLoop, NotifierProxy,
    ObserverRegistry, Origin, Parcel, ParcelReader, QueueConfig, ScalarValue, SubscribeMode,
    SyncCompletion, INTERFACE_TOKEN,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn host() -> (Arc<ObserverRegistry>, EventLoop, NotifierProxy, LoopbackServer) {
    let registry = Arc::new(ObserverRegistry::new());
    let event_loop = EventLoop::new();
    let (caller, server) = loopback_pair(Arc::new(registry.stub()));
    let proxy = NotifierProxy::new(Arc::new(caller));
    (registry, event_loop, proxy, server)
}

fn pump_until(event_loop: &EventLoop, done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for deliveries"
        );
        event_loop.run_once(Duration::from_millis(50));
    }
}

fn reply_status(reply: &[u8]) -> i32 {
    let mut reader = ParcelReader::new(reply);
    reader.read_i32().unwrap()
}

#[test]
fn sync_complete_round_trips_to_waiter() {
    init_tracing();
    let (registry, event_loop, proxy, _server) = host();

    let seen: Arc<Mutex<Vec<(u32, SyncCompletion)>>> = Arc::default();
    let mut tracked = Vec::new();
    for _ in 0..7 {
        let sink = Arc::clone(&seen);
        tracked.push(registry.track_sync(
            Arc::new(move |seq: u32, completion: SyncCompletion| {
                sink.lock().unwrap().push((seq, completion));
            }),
            &event_loop.handle(),
        ));
    }
    assert_eq!(*tracked.last().unwrap(), 7);

    let completion: SyncCompletion = [("dev-A".to_string(), 0)].into_iter().collect();
    proxy.notify_sync_complete(7, &completion).unwrap();

    pump_until(&event_loop, || !seen.lock().unwrap().is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, 7);
    assert_eq!(seen[0].1.get("dev-A"), Some(0));
    // Seq 7 is forgotten; the other six still wait.
    assert_eq!(registry.pending_syncs(), 6);
}

#[test]
fn data_details_reach_remote_observer() {
    init_tracing();
    let (registry, event_loop, proxy, _server) = host();

    let seen: Arc<Mutex<Vec<ChangeNotice>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let _handle = registry
        .subscribe(
            "test",
            SubscribeMode::Remote,
            Arc::new(move |notice: ChangeNotice| sink.lock().unwrap().push(notice)),
            &event_loop.handle(),
        )
        .unwrap();

    let mut data = ChangedData::new("test");
    data.push_key(ChangeOp::Insert, vec![ScalarValue::Int64(1)]);
    data.push_key(ChangeOp::Update, vec![ScalarValue::Int64(2)]);
    let origin = Origin::Remote {
        device: "dev-B".into(),
    };
    proxy.notify_data_details("test", &[data], &origin).unwrap();

    pump_until(&event_loop, || !seen.lock().unwrap().is_empty());
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].store_name, "test");
    let ChangePayload::Details { changes, origin } = &seen[0].payload else {
        panic!("expected a details payload");
    };
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].table_name, "test");
    assert_eq!(
        changes[0].keys(ChangeOp::Insert),
        [vec![ScalarValue::Int64(1)]]
    );
    assert_eq!(
        changes[0].keys(ChangeOp::Update),
        [vec![ScalarValue::Int64(2)]]
    );
    assert!(changes[0].keys(ChangeOp::Delete).is_empty());
    assert_eq!(origin.device(), Some("dev-B"));
}

#[test]
fn brief_changes_stream_in_order_across_threads() {
    init_tracing();
    let (registry, event_loop, proxy, _server) = host();

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let _handle = registry
        .subscribe(
            "orders",
            SubscribeMode::Remote,
            Arc::new(move |notice: ChangeNotice| {
                let ChangePayload::Devices(devices) = notice.payload else {
                    panic!("expected a devices payload");
                };
                sink.lock().unwrap().extend(devices);
            }),
            &event_loop.handle(),
        )
        .unwrap();

    let producer = thread::spawn(move || {
        for i in 0..100 {
            proxy
                .notify_data_change("orders", &[format!("dev-{i:03}")])
                .unwrap();
        }
    });

    pump_until(&event_loop, || seen.lock().unwrap().len() == 100);
    producer.join().unwrap();

    let expected: Vec<String> = (0..100).map(|i| format!("dev-{i:03}")).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

#[test]
fn rejected_requests_answer_with_status_and_reach_no_observer() {
    init_tracing();
    let registry = Arc::new(ObserverRegistry::new());
    let event_loop = EventLoop::new();
    let (caller, _server) = loopback_pair(Arc::new(registry.stub()));

    let seen: Arc<Mutex<Vec<ChangeNotice>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let _handle = registry
        .subscribe(
            "orders",
            SubscribeMode::Remote,
            Arc::new(move |notice: ChangeNotice| sink.lock().unwrap().push(notice)),
            &event_loop.handle(),
        )
        .unwrap();

    use syncbell::transport::RemoteCaller;

    // Wrong token.
    let mut parcel = Parcel::new();
    parcel.write_string("intruder.v0");
    parcel.write_string("orders");
    parcel.write_u32(0);
    let reply = caller.call(1, parcel.as_bytes()).unwrap();
    assert_eq!(reply_status(&reply), STATUS_UNAUTHORIZED);

    // Opcode outside the closed set.
    let mut parcel = Parcel::new();
    parcel.write_string(INTERFACE_TOKEN);
    let reply = caller.call(9, parcel.as_bytes()).unwrap();
    assert_eq!(reply_status(&reply), STATUS_UNKNOWN_OPCODE);

    // Device count missing from an otherwise valid request.
    let mut parcel = Parcel::new();
    parcel.write_string(INTERFACE_TOKEN);
    parcel.write_string("orders");
    let reply = caller.call(1, parcel.as_bytes()).unwrap();
    assert_eq!(reply_status(&reply), STATUS_MALFORMED);

    event_loop.run_until_idle();
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn overflow_drops_oldest_and_counts_the_loss() {
    init_tracing();
    let registry = Arc::new(ObserverRegistry::with_config(QueueConfig { capacity: 8 }));
    let event_loop = EventLoop::new();
    let (caller, _server) = loopback_pair(Arc::new(registry.stub()));
    let proxy = NotifierProxy::new(Arc::new(caller));

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let handle = registry
        .subscribe(
            "orders",
            SubscribeMode::Remote,
            Arc::new(move |notice: ChangeNotice| {
                let ChangePayload::Devices(devices) = notice.payload else {
                    panic!("expected a devices payload");
                };
                sink.lock().unwrap().extend(devices);
            }),
            &event_loop.handle(),
        )
        .unwrap();

    // Each call is a full round trip, so all nine are enqueued before
    // the context ever runs.
    for i in 0..9 {
        proxy
            .notify_data_change("orders", &[format!("dev-{i}")])
            .unwrap();
    }

    pump_until(&event_loop, || seen.lock().unwrap().len() == 8);
    assert_eq!(handle.queue_stats().dropped, 1);

    let expected: Vec<String> = (1..9).map(|i| format!("dev-{i}")).collect();
    assert_eq!(*seen.lock().unwrap(), expected);
}

#[test]
fn teardown_discards_queued_events() {
    init_tracing();
    let (registry, event_loop, proxy, _server) = host();

    let seen: Arc<Mutex<Vec<ChangeNotice>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let handle = registry
        .subscribe(
            "orders",
            SubscribeMode::Remote,
            Arc::new(move |notice: ChangeNotice| sink.lock().unwrap().push(notice)),
            &event_loop.handle(),
        )
        .unwrap();

    proxy
        .notify_data_change("orders", &["dev-A".into()])
        .unwrap();
    event_loop.tear_down();
    assert_eq!(event_loop.run_until_idle(), 0);

    // Later notifications are dropped without a panic on either side.
    proxy
        .notify_data_change("orders", &["dev-B".into()])
        .unwrap();

    assert!(seen.lock().unwrap().is_empty());
    let stats = handle.queue_stats();
    assert!(stats.retired);
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.dropped, 0);
}

#[test]
fn connection_loss_aborts_pending_waiters() {
    init_tracing();
    let registry = Arc::new(ObserverRegistry::new());
    let event_loop = EventLoop::new();
    let (caller, server) = loopback_pair(Arc::new(registry.stub()));
    let proxy = NotifierProxy::new(Arc::new(caller));

    let seen: Arc<Mutex<Vec<(u32, SyncCompletion)>>> = Arc::default();
    let mut seqs = Vec::new();
    for _ in 0..3 {
        let sink = Arc::clone(&seen);
        seqs.push(registry.track_sync(
            Arc::new(move |seq: u32, completion: SyncCompletion| {
                sink.lock().unwrap().push((seq, completion));
            }),
            &event_loop.handle(),
        ));
    }

    // The engine goes away mid-flight.
    server.shutdown();
    let err = proxy
        .notify_sync_complete(seqs[0], &SyncCompletion::new())
        .unwrap_err();
    assert!(err.is_retryable());

    // The host compensates every stranded waiter exactly once.
    registry.abort_pending_syncs(SyncCompletion::INTERRUPTED);
    pump_until(&event_loop, || seen.lock().unwrap().len() == 3);

    let seen = seen.lock().unwrap();
    for (seq, completion) in seen.iter() {
        assert!(seqs.contains(seq));
        assert_eq!(completion.len(), 1);
        assert_eq!(completion.get(""), Some(SyncCompletion::INTERRUPTED));
    }
    assert_eq!(registry.pending_syncs(), 0);
}

#[test]
fn store_suffix_spellings_share_one_subscription() {
    init_tracing();
    let (registry, event_loop, proxy, _server) = host();

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let _handle = registry
        .subscribe(
            "orders.db",
            SubscribeMode::Remote,
            Arc::new(move |notice: ChangeNotice| sink.lock().unwrap().push(notice.store_name)),
            &event_loop.handle(),
        )
        .unwrap();

    proxy
        .notify_data_change("orders", &["dev-A".into()])
        .unwrap();
    proxy
        .notify_data_change("orders.db", &["dev-B".into()])
        .unwrap();

    pump_until(&event_loop, || seen.lock().unwrap().len() == 2);
    // Both spellings route to the one subscription; each notice keeps
    // the name the engine sent.
    assert_eq!(*seen.lock().unwrap(), ["orders", "orders.db"]);
}

#[test]
fn framed_tcp_stream_carries_notifications() {
    init_tracing();
    let registry = Arc::new(ObserverRegistry::new());
    let event_loop = EventLoop::new();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let stub = registry.stub();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        serve_connection(stream, &stub, &StreamConfig::default())
    });

    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let _handle = registry
        .subscribe(
            "orders",
            SubscribeMode::Remote,
            Arc::new(move |notice: ChangeNotice| sink.lock().unwrap().push(notice.store_name)),
            &event_loop.handle(),
        )
        .unwrap();

    let stream = std::net::TcpStream::connect(addr).unwrap();
    let proxy = NotifierProxy::new(Arc::new(StreamCaller::new(stream)));
    proxy
        .notify_data_change("orders", &["dev-A".into()])
        .unwrap();
    proxy
        .notify_data_change("orders", &["dev-B".into()])
        .unwrap();

    pump_until(&event_loop, || seen.lock().unwrap().len() == 2);

    drop(proxy);
    assert!(server.join().unwrap().is_ok());
}
