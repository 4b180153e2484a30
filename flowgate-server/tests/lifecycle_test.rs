//! Integration tests for server startup, plugin mounting and shutdown.

mod fixtures;

use fixtures::ServerHome;
use flowgate_management::{AttributeValue, ComponentId, ManagementError};
use flowgate_plugin_api::HandlerRequest;
use flowgate_plugin_runtime::PluginLoadError;
use flowgate_server::routes::RouteTable;
use flowgate_server::subsystems::User;
use flowgate_server::Session;
use flowgate_server::{ConfigurationError, LifecycleCoordinator, LifecycleError, LifecycleState};
use std::fs;

fn executor_id() -> ComponentId {
    ComponentId::new("flowgate.executor", "executorManager")
}

#[test]
fn test_defaults_when_implementation_keys_omitted() {
    let home = ServerHome::new("");
    let coordinator = LifecycleCoordinator::with_defaults(home.props());

    let context = coordinator.start().unwrap();

    assert_eq!(
        context.management.query(&executor_id(), "MaxConcurrentFlows").unwrap(),
        AttributeValue::Int(10)
    );
    assert_eq!(
        context
            .management
            .query(&ComponentId::new("flowgate.sla", "slaManager"), "CheckIntervalMs")
            .unwrap(),
        AttributeValue::Int(60_000)
    );
    assert_eq!(
        context
            .management
            .query(&ComponentId::new("flowgate.server", "listener"), "Port")
            .unwrap(),
        AttributeValue::Int(8081)
    );
    assert_eq!(context.temp_dir(), home.path().join("temp"));
    assert!(context.temp_dir().is_dir());
}

#[test]
fn test_configured_values_reach_subsystems() {
    let home = ServerHome::new(
        r#"
executor.max.concurrent = 3
project.names = ["etl", "reports"]
user.manager.users = ["admin:secret:admin"]
"#,
    );
    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();

    assert_eq!(context.subsystems.executor.stats().max_concurrent, 3);
    assert_eq!(context.subsystems.projects.project_names(), vec!["etl", "reports"]);
    assert_eq!(
        context.subsystems.users.authenticate("admin", "secret").unwrap().roles,
        vec!["admin"]
    );
}

#[test]
fn test_unknown_implementation_is_fatal() {
    let home = ServerHome::new("schedule.manager.class = \"quartz\"");
    let coordinator = LifecycleCoordinator::with_defaults(home.props());

    let err = coordinator.start().err().unwrap();
    assert!(matches!(
        err,
        LifecycleError::Configuration(ConfigurationError::UnknownImplementation { ref tag, .. })
            if tag == "quartz"
    ));
    assert_eq!(coordinator.state(), LifecycleState::Stopped);
    assert!(!coordinator.transitions().contains(&LifecycleState::Running));
    assert!(!coordinator.shutdown().performed);
}

#[test]
fn test_malformed_listener_setting_is_fatal() {
    let home = ServerHome::new("server.port = \"eighty\"");
    let coordinator = LifecycleCoordinator::with_defaults(home.props());

    assert!(matches!(
        coordinator.start(),
        Err(LifecycleError::Configuration(ConfigurationError::Props(_)))
    ));
    assert_eq!(
        coordinator.transitions(),
        vec![
            LifecycleState::Unstarted,
            LifecycleState::Configuring,
            LifecycleState::Stopped
        ]
    );
}

#[test]
fn test_missing_configuration_is_reported() {
    let home = ServerHome::new("");
    fs::remove_file(home.conf_dir().join("flowgate.toml")).unwrap();

    assert!(matches!(
        flowgate_server::config::load_server_props(&home.conf_dir()),
        Err(ConfigurationError::NotLoaded(_))
    ));
}

#[test]
fn test_plugins_mounted_ordered_and_isolated_from_failures() {
    let home = ServerHome::new("");
    home.static_bundle("a-logs", "Logs", "logs", "order = 5");
    home.static_bundle("b-graphs", "Graphs", "/graphs/", "order = 1");
    home.static_bundle("c-debug", "Debug", "debug", "hidden = true");
    home.static_bundle("d-copy", "Logs Again", "logs", "order = 0");
    home.bundle(
        "e-nolib",
        "viewer.name = \"NoLib\"\nviewer.path = \"nolib\"\nviewer.handler.class = \"x\"\n",
        &[],
    );
    home.bundle(
        "f-unknown",
        concat!(
            "viewer.name = \"Unknown\"\n",
            "viewer.path = \"unknown\"\n",
            "viewer.handler.class = \"flowgate.viewer.StaticViewer\"\n",
        ),
        &["viewer-other.lib"],
    );
    fs::write(home.plugin_dir().join("README.txt"), "not a bundle").unwrap();

    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();
    assert_eq!(coordinator.state(), LifecycleState::Running);

    let listed: Vec<String> = context
        .plugins
        .list()
        .iter()
        .map(|p| p.mount_path().to_string())
        .collect();
    assert_eq!(listed, vec!["graphs", "logs"]);

    let hidden = context.plugins.lookup("debug").unwrap();
    assert!(hidden.is_hidden());
    assert_eq!(context.plugins.len(), 3);

    assert_eq!(context.plugins.lookup("logs").unwrap().name(), "Logs");

    coordinator.with_discovery_report(|report| {
        let report = report.unwrap();
        assert_eq!(report.loaded_count(), 3);
        assert_eq!(report.failed_count(), 3);
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f.error, PluginLoadError::DuplicateMount { .. })));
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f.error, PluginLoadError::MissingLibDir(_))));
        assert!(report
            .failures
            .iter()
            .any(|f| matches!(f.error, PluginLoadError::ClassNotFound { .. })));
    });

    let expected_origin = home.plugin_dir().join("a-logs/lib/viewer-static.lib");
    assert!(context.rendering.template_paths.contains(&expected_origin));
}

#[test]
fn test_override_settings_win() {
    let home = ServerHome::new("");
    let bundle = home.static_bundle("a", "Base Name", "base", "");
    fs::write(
        bundle.join("conf/override.toml"),
        "[viewer]\nname = \"Overridden\"\norder = 7\n",
    )
    .unwrap();

    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();

    let plugin = context.plugins.lookup("base").unwrap();
    assert_eq!(plugin.name(), "Overridden");
    assert_eq!(plugin.order(), 7);
}

#[tokio::test]
async fn test_routes_dispatch_core_and_plugins() {
    let home = ServerHome::new("project.names = [\"etl\"]");
    home.static_bundle("docs", "Docs", "docs", "");

    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();
    let routes = RouteTable::new(context);

    let mounts: Vec<String> = routes.mounts().into_iter().map(|m| m.route).collect();
    assert_eq!(
        mounts,
        vec![
            "/",
            "/index",
            "/manager",
            "/executor",
            "/history",
            "/schedule",
            "/jmx",
            "/css/*",
            "/js/*",
            "/images/*",
            "/favicon.ico",
            "/docs/*",
        ]
    );

    let page = routes.dispatch("/docs", HandlerRequest::new("")).await;
    assert_eq!(page.body, "<h1>Docs</h1>");

    let index = routes.dispatch("/", HandlerRequest::new("")).await;
    assert!(index.body.contains("<li>etl</li>"));
    assert!(index.body.contains("href=\"/docs\""));

    let jmx = routes
        .dispatch(
            "/jmx",
            HandlerRequest::new("")
                .with_param("component", "flowgate.executor:name=executorManager")
                .with_param("attribute", "NumRunningFlows"),
        )
        .await;
    assert!(jmx.is_success());
    assert!(jmx.body.contains("\"value\":0"));

    assert_eq!(routes.dispatch("/nowhere", HandlerRequest::new("")).await.status, 404);
}

#[tokio::test]
async fn test_plugin_cannot_shadow_core_route() {
    let home = ServerHome::new("project.names = [\"etl\"]");
    home.static_bundle("a-manager", "ManagerViewer", "manager", "");
    home.static_bundle("b-styles", "Styles", "css/themes", "");
    home.static_bundle("c-docs", "Docs", "docs", "");

    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();

    let listed: Vec<String> = context
        .plugins
        .list()
        .iter()
        .map(|p| p.mount_path().to_string())
        .collect();
    assert_eq!(listed, vec!["docs"]);
    assert!(context.plugins.lookup("manager").is_none());

    coordinator.with_discovery_report(|report| {
        let report = report.unwrap();
        assert_eq!(report.loaded, vec!["docs"]);
        let reserved = report
            .failures
            .iter()
            .filter(|f| matches!(f.error, PluginLoadError::ReservedMount(_)))
            .count();
        assert_eq!(reserved, 2);
    });

    let routes = RouteTable::new(context);
    assert!(!routes.mounts().iter().any(|m| m.route == "/manager/*"));

    let page = routes.dispatch("/manager", HandlerRequest::new("")).await;
    assert_eq!(page.body, "{\"projects\":[\"etl\"]}");
}

#[tokio::test]
async fn test_web_resources_served_from_resource_dir() {
    let home = ServerHome::new("");
    fs::create_dir_all(home.path().join("web/css")).unwrap();
    fs::write(home.path().join("web/css/site.css"), "body {}").unwrap();
    fs::write(home.path().join("web/favicon.ico"), "icon").unwrap();

    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();
    assert_eq!(context.web_resource_dir(), home.path().join("web"));
    let routes = RouteTable::new(context);

    let css = routes.dispatch("/css/site.css", HandlerRequest::new("")).await;
    assert_eq!(css.status, 200);
    assert_eq!(css.content_type, "text/css");
    assert_eq!(css.body, "body {}");

    let icon = routes.dispatch("/favicon.ico", HandlerRequest::new("")).await;
    assert_eq!(icon.body, "icon");

    assert_eq!(routes.dispatch("/js/app.js", HandlerRequest::new("")).await.status, 404);
    let escape = routes.dispatch("/images/../conf/flowgate.toml", HandlerRequest::new(""));
    assert_eq!(escape.await.status, 400);
}

#[tokio::test]
async fn test_index_escapes_names() {
    let home = ServerHome::new("project.names = [\"<script>&\"]");
    home.static_bundle("a", "Tom & \\\"Jerry\\\"", "cartoons", "");

    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let routes = RouteTable::new(coordinator.start().unwrap());

    let index = routes.dispatch("/", HandlerRequest::new("")).await;
    assert!(index.body.contains("<li>&lt;script&gt;&amp;</li>"));
    assert!(index.body.contains(">Tom &amp; &quot;Jerry&quot;</a>"));
    assert!(!index.body.contains("<script>"));
}

#[test]
fn test_session_cache_configured() {
    let home = ServerHome::new("max.num.sessions = 3\nsession.time.to.live = 60000");
    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();

    assert_eq!(context.sessions.max_sessions(), 3);
    assert_eq!(context.sessions.ttl().num_seconds(), 60);

    let user = User {
        name: "azure".to_string(),
        roles: vec![],
    };
    context.sessions.add(Session::new("s-1", user, "10.0.0.1"));
    assert_eq!(context.sessions.get("s-1").unwrap().user.name, "azure");
}

#[test]
fn test_shutdown_releases_everything_once() {
    let home = ServerHome::new("");
    let coordinator = LifecycleCoordinator::with_defaults(home.props());
    let context = coordinator.start().unwrap();
    assert_eq!(context.management.len(), 4);

    let report = coordinator.shutdown();
    assert!(report.performed);
    assert!(report.is_clean());
    assert!(context.management.is_empty());
    assert!(context.subsystems.executor.submit("etl", "flow").is_err());

    let again = coordinator.shutdown();
    assert!(!again.performed);
    assert_eq!(coordinator.state(), LifecycleState::Stopped);

    assert!(matches!(
        context.management.query(&executor_id(), "NumRunningFlows"),
        Err(ManagementError::UnknownComponent(_))
    ));
}
