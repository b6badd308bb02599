//! Public service endpoints advertised to clients

use serde::Serialize;

use crate::config::ServiceConfig;

const FALLBACK_HOST: &str = "localhost";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceEndpoints {
    pub public_ip: String,
    pub rpc_url: String,
    pub geyser_url: String,
}

impl ServiceEndpoints {
    pub fn from_config(service: &ServiceConfig) -> Self {
        let host = service
            .public_ip
            .as_deref()
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .unwrap_or(FALLBACK_HOST)
            .to_string();
        let rpc_port = service.rpc_port.as_deref().unwrap_or("UNKNOWN_RPC_PORT");
        let geyser_port = service
            .geyser_port
            .as_deref()
            .unwrap_or("UNKNOWN_GEYSER_PORT");

        Self {
            rpc_url: format!("http://{host}:{rpc_port}"),
            geyser_url: format!("http://{host}:{geyser_port}"),
            public_ip: host,
        }
    }
}
