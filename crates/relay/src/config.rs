//! # リレー設定
//!
//! 環境変数からログ出力先とホスト接続先を読み込み、[`LogContext`] を組み立てる。
//!
//! | 環境変数 | 既定値 | 内容 |
//! |----------|--------|------|
//! | `LOG_PATH_PREFIX` | `audit` | ファイル名のプレフィックス |
//! | `HOST_ADDR` | `127.0.0.1:8100` | `memory` / TCPアドレス / `vsock:<cid>:<port>` |

use crate::context::LogContext;
use crate::error::RelayError;
use crate::transport::proxy::ProxyEndpoint;
use crate::transport::{HostTransport, MemoryTransport, ProxyTransport};

/// 既定のパスプレフィックス
pub const DEFAULT_LOG_PATH_PREFIX: &str = "audit";

/// 既定のホスト接続先
pub const DEFAULT_HOST_ADDR: &str = "127.0.0.1:8100";

/// 設定エラー。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 接続先の書式が不正
    #[error("HOST_ADDRの書式が不正です: {0}")]
    InvalidHostAddr(String),
    /// このビルドでは使用できない接続先
    #[error("このビルドではvsockを使用できません: {0}")]
    VsockUnavailable(String),
}

/// ホスト接続先。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEndpoint {
    /// プロセス内模擬ホスト
    Memory,
    /// `elog-host` への接続
    Proxy(ProxyEndpoint),
}

impl HostEndpoint {
    /// `HOST_ADDR` の値を解釈する。
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ConfigError::InvalidHostAddr(value.to_string()));
        }
        if value == "memory" {
            return Ok(HostEndpoint::Memory);
        }
        if let Some(rest) = value.strip_prefix("vsock:") {
            return parse_vsock(rest);
        }
        Ok(HostEndpoint::Proxy(ProxyEndpoint::Tcp(value.to_string())))
    }

    /// 接続先に対応するトランスポートを作成する。
    pub fn transport(&self) -> Box<dyn HostTransport> {
        match self {
            HostEndpoint::Memory => Box::new(MemoryTransport::new()),
            HostEndpoint::Proxy(endpoint) => Box::new(ProxyTransport::new(endpoint.clone())),
        }
    }
}

#[cfg(all(target_os = "linux", feature = "vendor-aws"))]
fn parse_vsock(rest: &str) -> Result<HostEndpoint, ConfigError> {
    let invalid = || ConfigError::InvalidHostAddr(format!("vsock:{rest}"));
    let (cid, port) = rest.split_once(':').ok_or_else(invalid)?;
    let cid = cid.parse::<u32>().map_err(|_| invalid())?;
    let port = port.parse::<u32>().map_err(|_| invalid())?;
    Ok(HostEndpoint::Proxy(ProxyEndpoint::Vsock { cid, port }))
}

#[cfg(not(all(target_os = "linux", feature = "vendor-aws")))]
fn parse_vsock(rest: &str) -> Result<HostEndpoint, ConfigError> {
    Err(ConfigError::VsockUnavailable(format!("vsock:{rest}")))
}

/// リレー設定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub log_path_prefix: String,
    pub host: HostEndpoint,
}

impl RelayConfig {
    /// 環境変数から設定を読み込む。
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            std::env::var("LOG_PATH_PREFIX").ok(),
            std::env::var("HOST_ADDR").ok(),
        )
    }

    /// 値を指定して設定を作成する（`None` は既定値）。
    pub fn from_values(
        log_path_prefix: Option<String>,
        host_addr: Option<String>,
    ) -> Result<Self, ConfigError> {
        let host = HostEndpoint::parse(host_addr.as_deref().unwrap_or(DEFAULT_HOST_ADDR))?;
        Ok(Self {
            log_path_prefix: log_path_prefix
                .unwrap_or_else(|| DEFAULT_LOG_PATH_PREFIX.to_string()),
            host,
        })
    }

    /// 設定からログコンテキストを作成する。
    pub fn into_context(self) -> Result<LogContext, RelayError> {
        tracing::info!(
            "ログコンテキストを作成します: prefix={}, host={:?}",
            self.log_path_prefix,
            self.host
        );
        let transport = self.host.transport();
        LogContext::new(self.log_path_prefix, transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_values(None, None).unwrap();
        assert_eq!(config.log_path_prefix, "audit");
        assert_eq!(
            config.host,
            HostEndpoint::Proxy(ProxyEndpoint::Tcp("127.0.0.1:8100".to_string()))
        );
    }

    #[test]
    fn test_memory_endpoint() {
        let config =
            RelayConfig::from_values(Some("/data/enclave".to_string()), Some("memory".to_string()))
                .unwrap();
        assert_eq!(config.host, HostEndpoint::Memory);
        let ctx = config.into_context().unwrap();
        assert_eq!(ctx.prefix(), "/data/enclave");
    }

    #[test]
    fn test_empty_host_addr_rejected() {
        assert!(HostEndpoint::parse("  ").is_err());
    }

    #[test]
    fn test_empty_prefix_rejected_at_context() {
        let config =
            RelayConfig::from_values(Some(String::new()), Some("memory".to_string())).unwrap();
        assert!(matches!(
            config.into_context(),
            Err(RelayError::InvalidParameter)
        ));
    }

    #[cfg(all(target_os = "linux", feature = "vendor-aws"))]
    #[test]
    fn test_vsock_endpoint() {
        assert_eq!(
            HostEndpoint::parse("vsock:3:8100").unwrap(),
            HostEndpoint::Proxy(ProxyEndpoint::Vsock { cid: 3, port: 8100 })
        );
        assert!(HostEndpoint::parse("vsock:3").is_err());
        assert!(HostEndpoint::parse("vsock:x:1").is_err());
    }

    #[cfg(not(all(target_os = "linux", feature = "vendor-aws")))]
    #[test]
    fn test_vsock_endpoint_unavailable() {
        assert!(matches!(
            HostEndpoint::parse("vsock:3:8100"),
            Err(ConfigError::VsockUnavailable(_))
        ));
    }
}
