//! The route table handed to the routing host.
//!
//! Core pages come first, then the static web resources, then every plugin
//! mount in presentation order. Plugins cannot mount on any of the server's
//! own routes; see [`reserved_routes`].

use crate::context::AppContext;
use async_trait::async_trait;
use flowgate_management::ComponentId;
use flowgate_plugin_api::{HandlerRequest, HandlerResponse, RequestHandler};
use flowgate_plugin_runtime::Mount;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use viewer_static::StaticViewer;

/// Pages served by the server itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorePage {
    Index,
    Manager,
    Executor,
    History,
    Schedule,
    Management,
}

/// Core routes, in the order they are reported.
pub const CORE_ROUTES: [(&str, CorePage); 7] = [
    ("/", CorePage::Index),
    ("/index", CorePage::Index),
    ("/manager", CorePage::Manager),
    ("/executor", CorePage::Executor),
    ("/history", CorePage::History),
    ("/schedule", CorePage::Schedule),
    ("/jmx", CorePage::Management),
];

/// Static files served from `web.resource.dir`.
pub const RESOURCE_ROUTES: [&str; 4] = ["/css/*", "/js/*", "/images/*", "/favicon.ico"];

/// Every route owned by the server itself.
pub fn reserved_routes() -> impl Iterator<Item = &'static str> {
    CORE_ROUTES
        .iter()
        .map(|(route, _)| *route)
        .chain(RESOURCE_ROUTES)
}

struct CoreHandler {
    page: CorePage,
    context: Arc<AppContext>,
}

#[async_trait]
impl RequestHandler for CoreHandler {
    fn name(&self) -> &str {
        match self.page {
            CorePage::Index => "index",
            CorePage::Manager => "manager",
            CorePage::Executor => "executor",
            CorePage::History => "history",
            CorePage::Schedule => "schedule",
            CorePage::Management => "jmx",
        }
    }

    async fn handle(&self, request: &HandlerRequest) -> HandlerResponse {
        let subsystems = &self.context.subsystems;
        match self.page {
            CorePage::Index => HandlerResponse::html(index_page(&self.context)),
            CorePage::Manager => {
                let projects = subsystems.projects.project_names();
                HandlerResponse::json(json!({ "projects": projects }).to_string())
            }
            CorePage::Executor => {
                let running: Vec<_> = subsystems
                    .executor
                    .running()
                    .into_iter()
                    .map(|(id, (project, flow))| {
                        json!({ "id": id, "project": project, "flow": flow })
                    })
                    .collect();
                HandlerResponse::json(json!({ "running": running }).to_string())
            }
            CorePage::History => {
                let stats = subsystems.executor.stats();
                HandlerResponse::json(
                    json!({
                        "submitted": stats.submitted,
                        "finished": stats.finished,
                        "last_submitted": stats.last_submitted,
                    })
                    .to_string(),
                )
            }
            CorePage::Schedule => {
                let schedules: Vec<_> = subsystems
                    .scheduler
                    .schedules()
                    .into_iter()
                    .map(|s| {
                        json!({
                            "id": s.id,
                            "project": s.project,
                            "flow": s.flow,
                            "next_run": s.next_run,
                            "period_secs": s.period.map(|p| p.num_seconds()),
                        })
                    })
                    .collect();
                HandlerResponse::json(json!({ "schedules": schedules }).to_string())
            }
            CorePage::Management => management_page(&self.context, request),
        }
    }
}

fn index_page(context: &AppContext) -> String {
    let mut html = String::from("<html><body><h1>flowgate</h1><ul>");
    for project in context.subsystems.projects.project_names() {
        html.push_str(&format!("<li>{}</li>", escape_html(&project)));
    }
    html.push_str("</ul><nav>");
    for plugin in context.plugins.list() {
        html.push_str(&format!(
            "<a href=\"/{}\">{}</a>",
            escape_html(plugin.mount_path()),
            escape_html(plugin.name())
        ));
    }
    html.push_str("</nav></body></html>");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `/jmx`: list components, or read `attribute` of `component`.
fn management_page(context: &AppContext, request: &HandlerRequest) -> HandlerResponse {
    let bridge = &context.management;
    let Some(component) = request.param("component") else {
        return HandlerResponse::json(json!({ "components": bridge.list() }).to_string());
    };

    let id = ComponentId::from(component);
    let result = match request.param("attribute") {
        Some(attribute) => bridge
            .query(&id, attribute)
            .map(|value| json!({ "component": id, "attribute": attribute, "value": value })),
        None => bridge
            .info(&id)
            .map(|names| json!({ "component": id, "attributes": names })),
    };

    match result {
        Ok(body) => HandlerResponse::json(body.to_string()),
        Err(e) => HandlerResponse::error(404, e.to_string()),
    }
}

/// Core pages, web resources and plugin mounts.
pub struct RouteTable {
    context: Arc<AppContext>,
    core: Vec<Mount>,
    resources: Vec<Mount>,
}

impl RouteTable {
    pub fn new(context: Arc<AppContext>) -> Self {
        let core = CORE_ROUTES
            .iter()
            .map(|(route, page)| Mount {
                route: route.to_string(),
                handler: Arc::new(CoreHandler {
                    page: *page,
                    context: Arc::clone(&context),
                }) as Arc<dyn RequestHandler>,
            })
            .collect();

        let web: Arc<dyn RequestHandler> =
            Arc::new(StaticViewer::new("web-resources", context.web_resource_dir()));
        let resources = RESOURCE_ROUTES
            .iter()
            .map(|route| Mount {
                route: route.to_string(),
                handler: Arc::clone(&web),
            })
            .collect();

        Self {
            context,
            core,
            resources,
        }
    }

    /// Every route: core pages, web resources, then plugins.
    pub fn mounts(&self) -> Vec<Mount> {
        let mut mounts = self.core.clone();
        mounts.extend(self.resources.iter().cloned());
        mounts.extend(self.context.plugins.mounts());
        mounts
    }

    /// Route a request. `path` is the full request path; the handler sees
    /// the part below its mount point.
    pub async fn dispatch(&self, path: &str, mut request: HandlerRequest) -> HandlerResponse {
        let trimmed = format!("/{}", path.trim_matches('/'));
        if let Some(mount) = self.core.iter().find(|m| m.route == trimmed) {
            request.path = String::new();
            return mount.handler.handle(&request).await;
        }

        let resource = self
            .resources
            .iter()
            .find(|m| resource_matches(&m.route, &trimmed));
        if let Some(mount) = resource {
            // Resources keep their full path below the resource root.
            request.path = trimmed.trim_start_matches('/').to_string();
            return mount.handler.handle(&request).await;
        }

        match self.context.plugins.route(path) {
            Some((plugin, rest)) => {
                debug!("Dispatching {} to plugin '{}'", path, plugin.name());
                request.path = rest;
                plugin.handler.handle(&request).await
            }
            None => HandlerResponse::not_found(path),
        }
    }
}

fn resource_matches(route: &str, path: &str) -> bool {
    match route.strip_suffix("/*") {
        Some(tree) => {
            path == tree
                || path
                    .strip_prefix(tree)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
        None => path == route,
    }
}
