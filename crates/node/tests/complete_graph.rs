//! Three instances on one in-memory bus form a complete graph.

use std::sync::Arc;

use peerlink_channel::{InboundQueue, MemoryBus};
use peerlink_node::Operator;
use peerlink_router::{RouterConfig, RouterInit, RoutingHandler, control_link};
use peerlink_topic::{InstanceIdentity, Topic};
use tokio::task::JoinHandle;

struct Instance {
    operator: Operator,
    handler: Arc<RoutingHandler>,
    service: JoinHandle<()>,
}

async fn instance(bus: &MemoryBus, port: u16) -> Instance {
    let local_topic = Topic::local(&InstanceIdentity::from_port(port));
    let queue = InboundQueue::new();
    let handler = Arc::new(
        RoutingHandler::new(RouterInit {
            transport: Arc::new(bus.clone()),
            local_topic: local_topic.clone(),
            sink: queue.sink(),
            config: RouterConfig::default(),
        })
        .await
        .unwrap(),
    );
    let (service, control) = control_link(handler.clone());
    Instance {
        operator: Operator::new(local_topic, queue, control),
        handler,
        service: tokio::spawn(service.run()),
    }
}

fn topic(s: &str) -> Topic {
    Topic::parse(s).unwrap()
}

#[tokio::test]
async fn test_three_instances_complete_graph() {
    let bus = MemoryBus::new();
    let mut instances = Vec::new();
    for port in [6000, 6001, 6002] {
        instances.push(instance(&bus, port).await);
    }

    for instance in &instances {
        instance.operator.broadcast_self().await.unwrap();
    }

    for instance in &mut instances {
        let local = instance.operator.local_topic().clone();
        let report = instance.operator.drain().await;

        assert_eq!(report.accepted.len(), 2, "{local} accepted {:?}", report.accepted);
        assert!(!report.accepted.contains(&local));
        assert_eq!(report.declined, vec![local.to_string()]);
        assert_eq!(instance.handler.peer_count(), 2);
        assert!(!instance.handler.contains_peer(&local));
    }

    // Announcements arrive in broadcast order, so index 0 of the first
    // instance is the second.
    let [first, second, third] = instances.as_mut_slice() else {
        panic!("three instances");
    };
    assert_eq!(first.operator.accepted().get(0).unwrap(), &topic("peer/6001"));

    let peer = first.operator.send_direct(0, None).await.unwrap();
    assert_eq!(peer, topic("peer/6001"));

    let received = second.operator.receive_one().await.unwrap();
    assert_eq!(received.payload, "message from peer/6000");
    assert!(!received.verdict.is_accept());

    // Only the addressed instance hears a direct message.
    assert!(third.operator.drain().await.declined.is_empty());

    for instance in instances {
        instance.operator.shutdown().await.unwrap();
        instance.service.await.unwrap();
    }
}

#[tokio::test]
async fn test_repeated_announcements_do_not_grow_registry() {
    let bus = MemoryBus::new();
    let mut a = instance(&bus, 7000).await;
    let b = instance(&bus, 7001).await;

    for _ in 0..3 {
        b.operator.broadcast_self().await.unwrap();
    }
    let report = a.operator.drain().await;
    assert_eq!(report.accepted, vec![topic("peer/7001")]);
    assert_eq!(report.duplicates.len(), 2);
    assert_eq!(a.handler.peer_count(), 1);
    assert_eq!(a.operator.accepted().len(), 1);

    b.operator.broadcast_self().await.unwrap();
    let report = a.operator.drain().await;
    assert!(report.accepted.is_empty());
    assert_eq!(a.handler.peer_count(), 1);

    a.operator.shutdown().await.unwrap();
    b.operator.shutdown().await.unwrap();
    a.service.await.unwrap();
    b.service.await.unwrap();
}
