//! JSON-RPC API handlers for the flowgate server.

use crate::context::AppContext;
use crate::routes::RouteTable;
use flowgate_management::{AttributeValue, ComponentId, ManagementError};
use flowgate_plugin_api::{HandlerRequest, HandlerResponse};
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A viewer as shown in navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerInfo {
    pub name: String,
    pub path: String,
    pub order: i64,
}

/// The flowgate JSON-RPC interface.
#[rpc(server)]
pub trait FlowgateApi {
    /// Identifiers of every registered management component.
    #[method(name = "mgmt.list")]
    async fn mgmt_list(&self) -> RpcResult<Vec<ComponentId>>;

    /// Attribute names exposed by a component.
    #[method(name = "mgmt.info")]
    async fn mgmt_info(&self, component: String) -> RpcResult<Vec<String>>;

    /// Read one attribute of a component.
    #[method(name = "mgmt.query")]
    async fn mgmt_query(&self, component: String, attribute: String) -> RpcResult<AttributeValue>;

    /// Visible viewers in presentation order.
    #[method(name = "viewers.list")]
    async fn viewers_list(&self) -> RpcResult<Vec<ViewerInfo>>;

    /// Route a request to a core page or a mounted viewer.
    #[method(name = "viewers.dispatch")]
    async fn viewers_dispatch(
        &self,
        path: String,
        params: Option<HashMap<String, String>>,
    ) -> RpcResult<HandlerResponse>;

    /// Every installed route, core pages first.
    #[method(name = "routes.list")]
    async fn routes_list(&self) -> RpcResult<Vec<String>>;
}

pub struct ApiImpl {
    context: Arc<AppContext>,
    routes: RouteTable,
}

impl ApiImpl {
    pub fn new(context: Arc<AppContext>) -> Self {
        let routes = RouteTable::new(Arc::clone(&context));
        Self { context, routes }
    }
}

fn management_error(e: ManagementError) -> ErrorObjectOwned {
    let code = match e {
        ManagementError::UnknownComponent(_) => -32001,
        ManagementError::UnknownAttribute { .. } => -32002,
        _ => -32000,
    };
    ErrorObjectOwned::owned(code, e.to_string(), None::<()>)
}

#[jsonrpsee::core::async_trait]
impl FlowgateApiServer for ApiImpl {
    async fn mgmt_list(&self) -> RpcResult<Vec<ComponentId>> {
        Ok(self.context.management.list())
    }

    async fn mgmt_info(&self, component: String) -> RpcResult<Vec<String>> {
        self.context
            .management
            .info(&ComponentId::from(component.as_str()))
            .map_err(management_error)
    }

    async fn mgmt_query(&self, component: String, attribute: String) -> RpcResult<AttributeValue> {
        self.context
            .management
            .query(&ComponentId::from(component.as_str()), &attribute)
            .map_err(management_error)
    }

    async fn viewers_list(&self) -> RpcResult<Vec<ViewerInfo>> {
        Ok(self
            .context
            .plugins
            .list()
            .iter()
            .map(|p| ViewerInfo {
                name: p.name().to_string(),
                path: p.mount_path().to_string(),
                order: p.order(),
            })
            .collect())
    }

    async fn viewers_dispatch(
        &self,
        path: String,
        params: Option<HashMap<String, String>>,
    ) -> RpcResult<HandlerResponse> {
        let request = HandlerRequest {
            path: path.clone(),
            params: params.unwrap_or_default(),
            user: None,
        };
        Ok(self.routes.dispatch(&path, request).await)
    }

    async fn routes_list(&self) -> RpcResult<Vec<String>> {
        Ok(self.routes.mounts().into_iter().map(|m| m.route).collect())
    }
}
