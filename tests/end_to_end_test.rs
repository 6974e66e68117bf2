//! Drives a real server over a real socket for the scenarios a client
//! would actually observe end to end.

mod common;

use common::{connect, read_reply, send, start_server, Reply};
use std::time::Duration;

#[tokio::test]
async fn ping_round_trip() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["PING"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Simple("PONG".into()));

    send(&mut c, &["PING", "hello"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Bulk("hello".into()));
}

#[tokio::test]
async fn set_and_get() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["SET", "key", "value"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Simple("OK".into()));

    send(&mut c, &["GET", "key"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Bulk("value".into()));
}

#[tokio::test]
async fn mget_with_gaps() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["SET", "one", "1"]).await;
    read_reply(&mut c).await;
    send(&mut c, &["SET", "three", "3"]).await;
    read_reply(&mut c).await;

    send(&mut c, &["MGET", "one", "two", "three"]).await;
    assert_eq!(
        read_reply(&mut c).await,
        Reply::Array(vec![
            Reply::Bulk("1".into()),
            Reply::NullBulk,
            Reply::Bulk("3".into()),
        ])
    );
}

#[tokio::test]
async fn sorted_set_with_scores() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["ZADD", "zset", "1", "one", "0", "zero", "1", "two"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Integer(3));

    send(&mut c, &["ZRANGE", "zset", "0", "-1", "WITHSCORES"]).await;
    assert_eq!(
        read_reply(&mut c).await,
        Reply::Array(vec![
            Reply::Bulk("zero".into()),
            Reply::Bulk("0".into()),
            Reply::Bulk("one".into()),
            Reply::Bulk("1".into()),
            Reply::Bulk("two".into()),
            Reply::Bulk("1".into()),
        ])
    );
}

#[tokio::test]
async fn watch_aborts_exec_on_external_write() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    send(&mut a, &["SET", "k", "10"]).await;
    read_reply(&mut a).await;
    send(&mut a, &["WATCH", "k"]).await;
    assert_eq!(read_reply(&mut a).await, Reply::Simple("OK".into()));

    send(&mut b, &["SET", "k", "20"]).await;
    assert_eq!(read_reply(&mut b).await, Reply::Simple("OK".into()));

    send(&mut a, &["MULTI"]).await;
    assert_eq!(read_reply(&mut a).await, Reply::Simple("OK".into()));
    send(&mut a, &["SET", "k", "30"]).await;
    assert_eq!(read_reply(&mut a).await, Reply::Simple("QUEUED".into()));
    send(&mut a, &["EXEC"]).await;
    assert_eq!(read_reply(&mut a).await, Reply::NullArray);

    send(&mut a, &["GET", "k"]).await;
    assert_eq!(read_reply(&mut a).await, Reply::Bulk("20".into()));
}

#[tokio::test]
async fn multi_exec_without_interference_runs_all_queued_commands() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["MULTI"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Simple("OK".into()));
    send(&mut c, &["SET", "k", "1"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Simple("QUEUED".into()));
    send(&mut c, &["INCR", "k"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Simple("QUEUED".into()));
    send(&mut c, &["EXEC"]).await;
    assert_eq!(
        read_reply(&mut c).await,
        Reply::Array(vec![Reply::Simple("OK".into()), Reply::Integer(2)])
    );
}

#[tokio::test]
async fn pubsub_pattern_delivery() {
    let addr = start_server().await;
    let mut sub = connect(addr).await;
    let mut publisher = connect(addr).await;

    send(&mut sub, &["PSUBSCRIBE", "news.*"]).await;
    assert_eq!(
        read_reply(&mut sub).await,
        Reply::Array(vec![
            Reply::Bulk("psubscribe".into()),
            Reply::Bulk("news.*".into()),
            Reply::Integer(1),
        ])
    );

    send(&mut publisher, &["PUBLISH", "news.sports", "breaking"]).await;
    assert_eq!(read_reply(&mut publisher).await, Reply::Integer(1));

    assert_eq!(
        read_reply(&mut sub).await,
        Reply::Array(vec![
            Reply::Bulk("pmessage".into()),
            Reply::Bulk("news.*".into()),
            Reply::Bulk("news.sports".into()),
            Reply::Bulk("breaking".into()),
        ])
    );
}

#[tokio::test]
async fn stream_consumer_group_lifecycle() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["XGROUP", "CREATE", "s", "g", "$", "MKSTREAM"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Simple("OK".into()));

    send(&mut c, &["XADD", "s", "*", "a", "1"]).await;
    let id = match read_reply(&mut c).await {
        Reply::Bulk(id) => id,
        other => panic!("expected bulk id, got {other:?}"),
    };

    send(&mut c, &["XREADGROUP", "GROUP", "g", "c", "STREAMS", "s", ">"]).await;
    assert_eq!(
        read_reply(&mut c).await,
        Reply::Array(vec![Reply::Array(vec![
            Reply::Bulk("s".into()),
            Reply::Array(vec![Reply::Array(vec![
                Reply::Bulk(id.clone()),
                Reply::Array(vec![Reply::Bulk("a".into()), Reply::Bulk("1".into())]),
            ])]),
        ])])
    );

    send(&mut c, &["XPENDING", "s", "g"]).await;
    match read_reply(&mut c).await {
        Reply::Array(items) => assert_eq!(items[0], Reply::Integer(1)),
        other => panic!("expected array summary, got {other:?}"),
    }

    send(&mut c, &["XACK", "s", "g", &id]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Integer(1));

    send(&mut c, &["XPENDING", "s", "g"]).await;
    match read_reply(&mut c).await {
        Reply::Array(items) => assert_eq!(items[0], Reply::Integer(0)),
        other => panic!("expected array summary, got {other:?}"),
    }
}

#[tokio::test]
async fn xclaim_transfers_ownership_after_min_idle() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["XGROUP", "CREATE", "s", "g", "$", "MKSTREAM"]).await;
    read_reply(&mut c).await;

    send(&mut c, &["XADD", "s", "*", "a", "1"]).await;
    let id1 = match read_reply(&mut c).await {
        Reply::Bulk(id) => id,
        other => panic!("expected bulk id, got {other:?}"),
    };
    send(&mut c, &["XADD", "s", "*", "b", "2"]).await;
    let id2 = match read_reply(&mut c).await {
        Reply::Bulk(id) => id,
        other => panic!("expected bulk id, got {other:?}"),
    };

    send(
        &mut c,
        &["XREADGROUP", "GROUP", "g", "c1", "STREAMS", "s", ">"],
    )
    .await;
    read_reply(&mut c).await;

    tokio::time::sleep(Duration::from_millis(60)).await;

    send(
        &mut c,
        &["XCLAIM", "s", "g", "c2", "0", &id1, &id2],
    )
    .await;
    match read_reply(&mut c).await {
        Reply::Array(items) => assert_eq!(items.len(), 2),
        other => panic!("expected array of claimed entries, got {other:?}"),
    }

    send(&mut c, &["XPENDING", "s", "g", "-", "+", "10", "c2"]).await;
    match read_reply(&mut c).await {
        Reply::Array(items) => assert_eq!(items.len(), 2),
        other => panic!("expected array of pending entries, got {other:?}"),
    }
}

#[tokio::test]
async fn subscribed_mode_rejects_ordinary_commands() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["SUBSCRIBE", "chan"]).await;
    read_reply(&mut c).await;

    send(&mut c, &["GET", "k"]).await;
    match read_reply(&mut c).await {
        Reply::Error(msg) => assert!(msg.contains("subscribe")),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[tokio::test]
async fn ttl_boundaries() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["TTL", "missing"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Integer(-2));

    send(&mut c, &["SET", "k", "v"]).await;
    read_reply(&mut c).await;
    send(&mut c, &["TTL", "k"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Integer(-1));

    send(&mut c, &["EXPIRE", "k", "2"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Integer(1));
    send(&mut c, &["TTL", "k"]).await;
    match read_reply(&mut c).await {
        Reply::Integer(n) => assert!((0..=2).contains(&n)),
        other => panic!("expected integer ttl, got {other:?}"),
    }
}

#[tokio::test]
async fn wrong_type_is_rejected_without_mutating_state() {
    let addr = start_server().await;
    let mut c = connect(addr).await;

    send(&mut c, &["SET", "k", "v"]).await;
    read_reply(&mut c).await;

    send(&mut c, &["LPUSH", "k", "x"]).await;
    match read_reply(&mut c).await {
        Reply::Error(msg) => assert!(msg.contains("WRONGTYPE")),
        other => panic!("expected WRONGTYPE error, got {other:?}"),
    }

    send(&mut c, &["GET", "k"]).await;
    assert_eq!(read_reply(&mut c).await, Reply::Bulk("v".into()));
}
