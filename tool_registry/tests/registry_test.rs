//! Registry behavior against an in-process reflection server.

use std::{collections::HashMap, sync::Arc};

use smg_grpc_bridge::{testing, BridgeError, DynamicInvoker};
use smg_tool_registry::{
    RegistrationConfig, RegistryError, ToolBridgeConfig, ToolRegistration, ToolRegistry,
};

async fn start() -> String {
    let reflection = testing::FixtureReflection::new(testing::DESCRIPTOR_SET)
        .expect("fixture descriptors load");
    testing::serve(reflection).await.to_string()
}

async fn discovered_registry(name: &str) -> (ToolRegistry, String) {
    let target = start().await;
    let registry = ToolRegistry::new();
    registry
        .register_by_auto_discovery(ToolRegistration::new(name, &target, HashMap::new()))
        .await
        .unwrap();
    (registry, target)
}

fn tags(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| t.to_string()).collect()
}

fn names(invokers: &[DynamicInvoker]) -> Vec<String> {
    let mut names: Vec<String> = invokers.iter().map(DynamicInvoker::name).collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_auto_discovery_populates_groups() {
    let (registry, _) = discovered_registry("fixtures").await;
    let registration = registry.get("fixtures").unwrap();
    let group_set = registration.group_set();

    assert!(group_set.contains("UpperCase"));
    assert!(group_set.contains("smg.tool.testing.TestDiscoveryService"));
    assert!(group_set.contains("discovery_group"));
    assert!(group_set.contains("smg.tool.testing.TestDiscoveryService3"));
    assert!(group_set.contains("smg.tool.testing.TestDiscovery2Service"));
    assert!(!group_set.contains("smg.tool.testing.TestDiscovery2Service2"));
    assert_eq!(group_set.len(), 5);
    assert_eq!(registry.find_all().unwrap().len(), 7);
}

#[tokio::test]
async fn test_find_requires_every_tag() {
    let (registry, _) = discovered_registry("fixtures").await;

    assert_eq!(
        names(&registry.find_by_tags(&tags(&["shared"])).unwrap()),
        vec![
            "smg.tool.testing.TestDiscovery2Service.test1",
            "smg.tool.testing.TestDiscoveryService3.test1"
        ]
    );
    assert_eq!(
        names(&registry.find_by_tags(&tags(&["shared", "second"])).unwrap()),
        vec!["smg.tool.testing.TestDiscovery2Service.test1"]
    );
    assert!(registry
        .find_by_tags(&tags(&["first", "second"]))
        .unwrap()
        .is_empty());

    let found = registry.find_by_tags(&tags(&["discovery", "first"])).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].tags(), &tags(&["first", "discovery"])[..]);
}

#[tokio::test]
async fn test_find_scopes_by_registration() {
    let (registry, target) = discovered_registry("a").await;
    registry
        .register_by_auto_discovery(ToolRegistration::new("b", &target, HashMap::new()))
        .await
        .unwrap();

    assert_eq!(registry.names(), vec!["a", "b"]);
    assert_eq!(registry.find_all().unwrap().len(), 14);
    assert_eq!(registry.find(Some("b"), &[]).unwrap().len(), 7);
    assert!(registry.find(Some("missing"), &[]).unwrap().is_empty());

    let grouped = registry.find_by_group("discovery_group").unwrap();
    assert_eq!(grouped.len(), 4);
}

#[tokio::test]
async fn test_call_through_registry() {
    let (registry, _) = discovered_registry("fixtures").await;
    let invoker = registry
        .find_by_registration("fixtures")
        .unwrap()
        .into_iter()
        .find(|invoker| invoker.name() == "UpperCase.toUpperCase")
        .unwrap();
    assert_eq!(
        invoker.call_to_string(r#"{"message":"hi"}"#).await.unwrap(),
        "HI"
    );
}

#[tokio::test]
async fn test_register_update_unregister() {
    let registry = ToolRegistry::new();
    let first = registry
        .register(ToolRegistration::new("r", "127.0.0.1:1", HashMap::new()))
        .unwrap();
    assert!(matches!(
        registry.register(ToolRegistration::new("r", "127.0.0.1:2", HashMap::new())),
        Err(RegistryError::RegistrationExists(_))
    ));
    assert!(matches!(
        registry.update(ToolRegistration::new("other", "127.0.0.1:2", HashMap::new())),
        Err(RegistryError::RegistrationNotFound(_))
    ));

    let channel = first.channel().unwrap();
    let second = registry
        .update(ToolRegistration::new("r", "127.0.0.1:2", HashMap::new()))
        .unwrap();
    assert!(first.holder().is_closed());
    assert!(channel.is_closed());
    assert_eq!(registry.get("r").unwrap().target(), "127.0.0.1:2");

    registry.update_with("r", Arc::clone).unwrap();
    assert!(!second.holder().is_closed());

    assert!(registry.unregister("r"));
    assert!(second.holder().is_closed());
    assert!(!registry.unregister("r"));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_snapshot_restores_without_reflection() {
    let (registry, target) = discovered_registry("live").await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.pb");
    registry.get("live").unwrap().save_to_file(&path).await.unwrap();

    let config = ToolBridgeConfig {
        registrations: vec![RegistrationConfig {
            name: "restored".to_string(),
            target,
            options: HashMap::new(),
            auto_discovery: true,
            group_set_file: Some(path),
        }],
    };
    let restored = ToolRegistry::from_config(&config).await.unwrap();
    let registration = restored.get("restored").unwrap();
    assert_eq!(registration.group_set().len(), 5);

    let found = restored.find_by_tags(&tags(&["shared", "second"])).unwrap();
    assert_eq!(found.len(), 1);

    let upper = restored
        .find_by_group("UpperCase")
        .unwrap()
        .pop()
        .unwrap();
    assert_eq!(upper.call_to_string(r#"{"message":"ok"}"#).await.unwrap(), "OK");
}

#[tokio::test]
async fn test_from_config_without_discovery_registers_empty() {
    let config = ToolBridgeConfig::from_yaml(
        "registrations:\n  - name: idle\n    target: '127.0.0.1:1'\n    auto_discovery: false\n",
    )
    .unwrap();
    let registry = ToolRegistry::from_config(&config).await.unwrap();
    let registration = registry.get("idle").unwrap();
    assert!(registration.group_set().is_empty());
    assert!(!registration.holder().is_created());
}

#[tokio::test]
async fn test_concurrent_finds_share_one_channel() {
    let (registry, _) = discovered_registry("fixtures").await;
    let registry = Arc::new(registry);

    let lookups = (0..8).map(|_| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.find_all().unwrap().len() })
    });
    for found in futures::future::join_all(lookups).await {
        assert_eq!(found.unwrap(), 7);
    }
    assert!(registry.get("fixtures").unwrap().holder().is_created());
}

#[tokio::test]
async fn test_unregister_stops_outstanding_invokers() {
    let (registry, _) = discovered_registry("r").await;
    let invoker = registry
        .find_all()
        .unwrap()
        .into_iter()
        .find(|invoker| invoker.name() == "UpperCase.toUpperCase")
        .unwrap();
    assert_eq!(
        invoker.call_to_string(r#"{"message":"hi"}"#).await.unwrap(),
        "HI"
    );

    assert!(registry.unregister("r"));
    assert!(matches!(
        invoker.call_to_string(r#"{"message":"hi"}"#).await,
        Err(BridgeError::ChannelClosed)
    ));
}

#[tokio::test]
async fn test_blank_registration_searches_everything() {
    let (registry, _) = discovered_registry("fixtures").await;
    assert_eq!(registry.find(Some(""), &[]).unwrap().len(), 7);
    assert_eq!(registry.find(Some("  "), &tags(&["shared"])).unwrap().len(), 2);
}
