//! # 境界呼び出しハンドラ
//!
//! エンクレーブから受け取ったリクエストを [`FileStore`] に振り分け、
//! ステータス付きのレスポンスを返す。失敗の詳細はホスト側のログにのみ残し、
//! エンクレーブには `STATUS_FAILURE` だけを返す。

use std::sync::Arc;

use elog_types::protocol::{self, Opcode, Request, Response};
use elog_types::{STATUS_FAILURE, STATUS_OK};

use crate::store::{FileStore, StoreError};

fn failure(op: Opcode, err: StoreError) -> Response {
    match &err {
        StoreError::NotFound(_) => tracing::info!("{:?}: {}", op, err),
        _ => tracing::error!("{:?} 失敗: {}", op, err),
    }
    Response::status(STATUS_FAILURE)
}

/// リクエストを処理してレスポンスを作成する。
pub async fn dispatch(store: &FileStore, req: Request) -> Response {
    let op = req.opcode;
    match op {
        Opcode::Write => match store.export(&req.filename, req.append, &req.body).await {
            Ok(()) => Response::status(STATUS_OK),
            Err(e) => failure(op, e),
        },
        Opcode::GetSize => match store.size(&req.filename).await {
            Ok(Some(size)) => Response {
                size,
                ..Response::status(STATUS_OK)
            },
            Ok(None) => Response::status(STATUS_FAILURE),
            Err(e) => failure(op, e),
        },
        Opcode::GetContent => match store.content(&req.filename, req.size).await {
            Ok(body) => Response {
                status: STATUS_OK,
                size: body.len() as u64,
                body,
            },
            Err(e) => failure(op, e),
        },
        Opcode::Delete => match store.delete(&req.filename).await {
            Ok(()) => Response::status(STATUS_OK),
            Err(e) => failure(op, e),
        },
    }
}

/// TCP経由の接続を処理する。
pub async fn handle_tcp_connection(mut stream: tokio::net::TcpStream, store: Arc<FileStore>) {
    let req = match protocol::read_request_async(&mut stream).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("リクエスト読み取りエラー: {}", e);
            return;
        }
    };

    tracing::info!(
        "{:?} {} (body: {} bytes)",
        req.opcode,
        String::from_utf8_lossy(req.filename.as_slice()),
        req.body.len()
    );

    let resp = dispatch(&store, req).await;

    if let Err(e) = protocol::write_response_async(&mut stream, &resp).await {
        tracing::error!("レスポンス書き込みエラー: {}", e);
    }
}

/// vsock接続を処理する（Linux専用）。
///
/// ブロッキングI/Oは `spawn_blocking` でラップし、ファイル操作は非同期で行う。
#[cfg(all(target_os = "linux", feature = "vendor-aws"))]
pub async fn handle_vsock_connection(stream: vsock::VsockStream, store: Arc<FileStore>) {
    let result = tokio::task::spawn_blocking(move || {
        let mut s = stream;
        let req = protocol::read_request_sync(&mut s)?;
        Ok::<_, std::io::Error>((s, req))
    })
    .await;

    let (stream, req) = match result {
        Ok(Ok(v)) => v,
        Ok(Err(e)) => {
            tracing::error!("リクエスト読み取りエラー: {}", e);
            return;
        }
        Err(e) => {
            tracing::error!("spawn_blockingエラー: {}", e);
            return;
        }
    };

    tracing::info!(
        "{:?} {} (body: {} bytes)",
        req.opcode,
        String::from_utf8_lossy(req.filename.as_slice()),
        req.body.len()
    );

    let resp = dispatch(&store, req).await;

    let result = tokio::task::spawn_blocking(move || {
        let mut s = stream;
        protocol::write_response_sync(&mut s, &resp)
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("レスポンス書き込みエラー: {}", e),
        Err(e) => tracing::error!("spawn_blockingエラー: {}", e),
    }
}
