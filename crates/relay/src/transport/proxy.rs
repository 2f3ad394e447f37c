//! # ホストファイルサービス接続
//!
//! `elog-host` にlength-prefixedプロトコル（`elog_types::protocol`）で接続する。
//! 1回の境界呼び出しにつき1接続。
//!
//! ## 接続先
//! - `tcp`: `127.0.0.1:8100` 等（開発・テスト用）
//! - `vsock`: 親インスタンスのCID/Port（Linux、`vendor-aws` feature）

use async_trait::async_trait;
use elog_types::protocol::{self, Opcode, Request, Response};
use elog_types::{ContentBuffer, ContentReply, FilenameBuffer, SizeReply, STATUS_OK};

use super::{HostTransport, TransportError};

/// 接続先。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyEndpoint {
    /// TCPアドレス（例: "127.0.0.1:8100"）
    Tcp(String),
    /// vsock（Linux専用）
    #[cfg(all(target_os = "linux", feature = "vendor-aws"))]
    Vsock { cid: u32, port: u32 },
}

/// ホストファイルサービスへのトランスポート。
pub struct ProxyTransport {
    endpoint: ProxyEndpoint,
}

impl ProxyTransport {
    pub fn new(endpoint: ProxyEndpoint) -> Self {
        Self { endpoint }
    }

    /// TCP接続先を指定して作成する。
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(ProxyEndpoint::Tcp(addr.into()))
    }

    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }

    /// リクエストを送信し、レスポンスを受け取る。
    async fn roundtrip(&self, req: Request) -> Result<Response, TransportError> {
        match &self.endpoint {
            ProxyEndpoint::Tcp(addr) => {
                let mut stream = tokio::net::TcpStream::connect(addr.as_str()).await?;
                protocol::write_request_async(&mut stream, &req).await?;
                Ok(protocol::read_response_async(&mut stream).await?)
            }
            #[cfg(all(target_os = "linux", feature = "vendor-aws"))]
            ProxyEndpoint::Vsock { cid, port } => {
                let (cid, port) = (*cid, *port);
                // vsockはブロッキングI/Oのため専用スレッドで実行する
                let result = tokio::task::spawn_blocking(move || {
                    let mut stream = vsock::VsockStream::connect_with_cid_port(cid, port)?;
                    protocol::write_request_sync(&mut stream, &req)?;
                    protocol::read_response_sync(&mut stream)
                })
                .await
                .map_err(|e| TransportError::Unavailable(format!("spawn_blockingエラー: {e}")))?;
                Ok(result?)
            }
        }
    }
}

#[async_trait]
impl HostTransport for ProxyTransport {
    async fn write(
        &self,
        filename: &FilenameBuffer,
        append: bool,
        payload: &ContentBuffer,
    ) -> Result<u32, TransportError> {
        let req = Request {
            opcode: Opcode::Write,
            filename: filename.clone(),
            append,
            size: payload.len() as u64,
            body: payload.clone(),
        };
        Ok(self.roundtrip(req).await?.status)
    }

    async fn get_size(&self, filename: &FilenameBuffer) -> Result<SizeReply, TransportError> {
        let resp = self
            .roundtrip(Request::new(Opcode::GetSize, filename.clone()))
            .await?;
        Ok(SizeReply {
            found: resp.status == STATUS_OK,
            size: resp.size,
        })
    }

    async fn get_content(
        &self,
        filename: &FilenameBuffer,
        size: u64,
    ) -> Result<ContentReply, TransportError> {
        let mut req = Request::new(Opcode::GetContent, filename.clone());
        req.size = size;
        let resp = self.roundtrip(req).await?;
        Ok(ContentReply {
            status: resp.status,
            content: resp.body,
        })
    }

    async fn delete(&self, filename: &FilenameBuffer) -> Result<u32, TransportError> {
        let resp = self
            .roundtrip(Request::new(Opcode::Delete, filename.clone()))
            .await?;
        Ok(resp.status)
    }
}
