//! # エンクレーブログ ホストファイルサービス
//!
//! エンクレーブはファイルシステムに直接アクセスできないため、ログの永続化は
//! このサービスを経由する。エンクレーブからの境界呼び出しを受け取り、
//! `LOG_ROOT_DIR` 配下のファイルに対して実行する。
//!
//! ## 設定（環境変数）
//! | 環境変数 | 既定値 | 内容 |
//! |----------|--------|------|
//! | `LOG_ROOT_DIR` | `./logs` | ログファイルのルートディレクトリ |
//! | `HOST_LISTEN_ADDR` | `127.0.0.1:8100` | TCPリッスンアドレス |
//! | `VSOCK_PORT` | なし | 設定時はvsockでリッスン（Linux専用） |

mod handler;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use store::FileStore;

/// TCPリッスンアドレスの既定値
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8100";

/// ルートディレクトリの既定値
const DEFAULT_ROOT_DIR: &str = "./logs";

/// ホストサービスの設定。
#[derive(Debug, Clone, PartialEq, Eq)]
struct HostConfig {
    root_dir: PathBuf,
    listen_addr: String,
    vsock_port: Option<u32>,
}

impl HostConfig {
    fn from_env() -> anyhow::Result<Self> {
        Self::from_values(
            std::env::var("LOG_ROOT_DIR").ok(),
            std::env::var("HOST_LISTEN_ADDR").ok(),
            std::env::var("VSOCK_PORT").ok(),
        )
    }

    fn from_values(
        root_dir: Option<String>,
        listen_addr: Option<String>,
        vsock_port: Option<String>,
    ) -> anyhow::Result<Self> {
        let vsock_port = vsock_port
            .map(|p| {
                p.parse::<u32>()
                    .map_err(|e| anyhow::anyhow!("VSOCK_PORTが不正です ({p}): {e}"))
            })
            .transpose()?;
        Ok(Self {
            root_dir: PathBuf::from(root_dir.unwrap_or_else(|| DEFAULT_ROOT_DIR.to_string())),
            listen_addr: listen_addr.unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            vsock_port,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = HostConfig::from_env()?;
    tokio::fs::create_dir_all(&config.root_dir).await?;
    let store = Arc::new(FileStore::new(config.root_dir.clone()));
    tracing::info!("ログルート: {}", store.root().display());

    if let Some(port) = config.vsock_port {
        return serve_vsock(port, store).await;
    }
    serve_tcp(&config.listen_addr, store).await
}

/// Linux: vsockでリッスン
#[cfg(all(target_os = "linux", feature = "vendor-aws"))]
async fn serve_vsock(port: u32, store: Arc<FileStore>) -> anyhow::Result<()> {
    tracing::info!("vsockホストサービスを port {} で起動します", port);

    let listener = vsock::VsockListener::bind_with_cid_port(vsock::VMADDR_CID_ANY, port)?;

    // vsock acceptはブロッキングなので専用スレッドで実行し、
    // 受理した接続をmpscチャネルでtokioランタイムに渡す
    let (tx, mut rx) = tokio::sync::mpsc::channel::<vsock::VsockStream>(32);

    std::thread::spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(s) => {
                    if tx.blocking_send(s).is_err() {
                        tracing::info!("チャネルクローズ、acceptループ終了");
                        break;
                    }
                }
                Err(e) => tracing::error!("vsock acceptエラー: {}", e),
            }
        }
    });

    while let Some(stream) = rx.recv().await {
        tokio::spawn(handler::handle_vsock_connection(stream, store.clone()));
    }

    Ok(())
}

#[cfg(not(all(target_os = "linux", feature = "vendor-aws")))]
async fn serve_vsock(port: u32, _store: Arc<FileStore>) -> anyhow::Result<()> {
    anyhow::bail!("このビルドではvsockを使用できません (VSOCK_PORT={port})")
}

/// TCPでリッスン（開発・テスト用）
async fn serve_tcp(addr: &str, store: Arc<FileStore>) -> anyhow::Result<()> {
    tracing::info!("TCPホストサービスを {} で起動します", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!("TCP接続受付: {}", peer);
        tokio::spawn(handler::handle_tcp_connection(stream, store.clone()));
    }
}
