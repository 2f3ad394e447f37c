//! # ログコンテキストと境界操作
//!
//! 1セッション分のログ出力先（パスプレフィックスとトランスポート）を保持し、
//! 書き込み・追記・読み取り・削除を提供する。
//!
//! ## 処理パイプライン
//! 入力検証 → ファイル名整形 → ペイロード転送準備 → 境界呼び出し → ホスト応答検証 → 返却
//!
//! 引数違反・容量超過はホストとの通信前に打ち切る。ホスト側の失敗は全て
//! [`RelayError::Failure`] に集約し、詳細はトレースログにのみ残す。

use std::sync::atomic::{AtomicU64, Ordering};

use elog_types::{LogFileType, STATUS_OK};

use crate::bounds::{copy_out, stage_payload, validate_host_size};
use crate::error::{BoundaryError, RelayError};
use crate::filename::format_filename;
use crate::transport::HostTransport;

/// 1セッション分のログコンテキスト。呼び出し元が排他的に所有する。
pub struct LogContext {
    /// 信頼側で設定されたパスプレフィックス
    prefix: String,
    /// ホストへの境界呼び出し
    transport: Box<dyn HostTransport>,
    /// 操作の通し番号（トレース用）
    op_seq: AtomicU64,
}

impl LogContext {
    /// コンテキストを作成する。プレフィックスが空なら `InvalidParameter`。
    pub fn new(
        prefix: impl Into<String>,
        transport: Box<dyn HostTransport>,
    ) -> Result<Self, RelayError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            tracing::warn!("ログパスプレフィックスが空です");
            return Err(RelayError::InvalidParameter);
        }
        Ok(Self {
            prefix,
            transport,
            op_seq: AtomicU64::new(0),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// これまでに開始した操作の数。
    pub fn operations(&self) -> u64 {
        self.op_seq.load(Ordering::Relaxed)
    }

    fn next_seq(&self) -> u64 {
        self.op_seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 内部エラーをログに残し、呼び出し元向けの二値に集約する。
    fn collapse(&self, op: &'static str, seq: u64, err: BoundaryError) -> RelayError {
        if err.is_local() {
            tracing::warn!(op, seq, "境界操作を中止しました: {}", err);
        } else {
            tracing::error!(op, seq, "境界操作に失敗しました: {}", err);
        }
        err.into()
    }

    /// ログファイルに書き込む。
    ///
    /// `append` が偽ならファイルを作成または上書きする。ペイロードは
    /// 1回あたり4096バイトまで。部分的な成功は存在しない。
    pub async fn write(
        &self,
        payload: &[u8],
        file_type: LogFileType,
        append: bool,
        identity: &str,
    ) -> Result<(), RelayError> {
        let seq = self.next_seq();
        self.write_inner(payload, file_type, append, identity)
            .await
            .map_err(|e| self.collapse("write", seq, e))?;
        tracing::debug!(seq, %file_type, append, "書き込み完了: {} bytes", payload.len());
        Ok(())
    }

    /// 監査ログ（`Log` 種別）にエントリを追記する。
    pub async fn append_entry(&self, payload: &[u8], identity: &str) -> Result<(), RelayError> {
        self.write(payload, LogFileType::Log, true, identity).await
    }

    async fn write_inner(
        &self,
        payload: &[u8],
        file_type: LogFileType,
        append: bool,
        identity: &str,
    ) -> Result<(), BoundaryError> {
        if payload.is_empty() {
            return Err(BoundaryError::Contract("payload is empty"));
        }
        require_identity(identity)?;

        let filename = format_filename(&self.prefix, file_type, identity)?;
        let content = stage_payload(payload)?;

        let status = self.transport.write(&filename, append, &content).await?;
        if status != STATUS_OK {
            return Err(BoundaryError::HostStatus(status));
        }
        Ok(())
    }

    /// ログファイルを読み取る。
    ///
    /// ファイルが存在しない場合は空のペイロードで成功する。
    pub async fn read(
        &self,
        file_type: LogFileType,
        identity: &str,
    ) -> Result<Vec<u8>, RelayError> {
        let seq = self.next_seq();
        let out = self
            .read_inner(file_type, identity)
            .await
            .map_err(|e| self.collapse("read", seq, e))?;
        tracing::debug!(seq, %file_type, "読み取り完了: {} bytes", out.len());
        Ok(out)
    }

    async fn read_inner(
        &self,
        file_type: LogFileType,
        identity: &str,
    ) -> Result<Vec<u8>, BoundaryError> {
        require_identity(identity)?;
        let filename = format_filename(&self.prefix, file_type, identity)?;

        let reported = self.transport.get_size(&filename).await?;
        if !reported.found {
            // ログが未作成なのは正常な初期状態
            return Ok(Vec::new());
        }
        if reported.size == 0 {
            return Ok(Vec::new());
        }

        // 申告サイズを検証するまで確保も内容要求も行わない
        let size = validate_host_size(reported.size)?;

        let reply = self.transport.get_content(&filename, reported.size).await?;
        if reply.status != STATUS_OK {
            return Err(BoundaryError::HostStatus(reply.status));
        }
        copy_out(&reply.content, size)
    }

    /// 監査ログ（`Log` 種別）を削除する。署名ファイルはこの経路では削除できない。
    ///
    /// トランスポートが削除をサポートしない場合は失敗する。
    pub async fn clear(&self, identity: &str) -> Result<(), RelayError> {
        let seq = self.next_seq();
        self.clear_inner(identity)
            .await
            .map_err(|e| self.collapse("clear", seq, e))?;
        tracing::debug!(seq, "削除完了");
        Ok(())
    }

    async fn clear_inner(&self, identity: &str) -> Result<(), BoundaryError> {
        require_identity(identity)?;
        let filename = format_filename(&self.prefix, LogFileType::Log, identity)?;
        let status = self.transport.delete(&filename).await?;
        if status != STATUS_OK {
            return Err(BoundaryError::HostStatus(status));
        }
        Ok(())
    }
}

fn require_identity(identity: &str) -> Result<(), BoundaryError> {
    if identity.is_empty() {
        return Err(BoundaryError::Contract("identity is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MemoryTransport, TransportError};
    use async_trait::async_trait;
    use elog_types::{ContentBuffer, ContentReply, FilenameBuffer, SizeReply};

    fn context() -> (LogContext, MemoryTransport) {
        let host = MemoryTransport::new();
        let ctx = LogContext::new("audit", Box::new(host.clone())).unwrap();
        (ctx, host)
    }

    #[tokio::test]
    async fn test_session_scenario() {
        let (ctx, host) = context();

        ctx.write(b"hello", LogFileType::Log, false, "session42")
            .await
            .unwrap();
        assert_eq!(host.file_names(), vec!["audit_log_session42.dat"]);
        assert_eq!(host.file("audit_log_session42.dat").unwrap(), b"hello");

        ctx.append_entry(b"world", "session42").await.unwrap();
        assert_eq!(host.file("audit_log_session42.dat").unwrap(), b"helloworld");

        let read = ctx.read(LogFileType::Log, "session42").await.unwrap();
        assert_eq!(read, b"helloworld");
        assert_eq!(read.len(), 10);

        ctx.clear("session42").await.unwrap();
        let read = ctx.read(LogFileType::Log, "session42").await.unwrap();
        assert!(read.is_empty());
        assert_eq!(ctx.operations(), 5);
    }

    #[tokio::test]
    async fn test_round_trip_at_capacity() {
        let (ctx, _host) = context();
        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        ctx.write(&payload, LogFileType::Sig, false, "big").await.unwrap();
        let read = ctx.read(LogFileType::Sig, "big").await.unwrap();
        assert_eq!(read, payload);
    }

    #[tokio::test]
    async fn test_never_written_reads_empty() {
        let (ctx, host) = context();
        let read = ctx.read(LogFileType::Log, "nobody").await.unwrap();
        assert!(read.is_empty());
        assert_eq!(host.calls().get_content, 0);
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let (ctx, _host) = context();
        ctx.write(b"a", LogFileType::Log, false, "one").await.unwrap();
        ctx.write(b"b", LogFileType::Log, false, "two").await.unwrap();
        ctx.write(b"sig", LogFileType::Sig, false, "one").await.unwrap();
        assert_eq!(ctx.read(LogFileType::Log, "one").await.unwrap(), b"a");
        assert_eq!(ctx.read(LogFileType::Log, "two").await.unwrap(), b"b");
        assert_eq!(ctx.read(LogFileType::Sig, "one").await.unwrap(), b"sig");
    }

    #[tokio::test]
    async fn test_clear_leaves_signature() {
        let (ctx, host) = context();
        ctx.write(b"log", LogFileType::Log, false, "s").await.unwrap();
        ctx.write(b"sig", LogFileType::Sig, false, "s").await.unwrap();
        ctx.clear("s").await.unwrap();
        assert_eq!(host.file_names(), vec!["audit_sig_s.dat"]);
    }

    #[tokio::test]
    async fn test_empty_arguments_are_invalid_parameter() {
        let (ctx, host) = context();
        assert_eq!(
            ctx.write(b"x", LogFileType::Log, false, "").await,
            Err(RelayError::InvalidParameter)
        );
        assert_eq!(
            ctx.write(b"", LogFileType::Log, false, "id").await,
            Err(RelayError::InvalidParameter)
        );
        assert_eq!(
            ctx.read(LogFileType::Log, "").await,
            Err(RelayError::InvalidParameter)
        );
        assert_eq!(ctx.clear("").await, Err(RelayError::InvalidParameter));
        assert_eq!(host.calls().total(), 0);
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let result = LogContext::new("", Box::new(MemoryTransport::new()));
        assert!(matches!(result, Err(RelayError::InvalidParameter)));
    }

    #[tokio::test]
    async fn test_oversized_payload_never_reaches_host() {
        let (ctx, host) = context();
        let payload = vec![0u8; 4097];
        assert_eq!(
            ctx.write(&payload, LogFileType::Log, false, "id").await,
            Err(RelayError::Failure)
        );
        assert_eq!(host.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_overlong_filename_never_reaches_host() {
        let (ctx, host) = context();
        let identity = "i".repeat(250);
        assert_eq!(
            ctx.write(b"x", LogFileType::Log, false, &identity).await,
            Err(RelayError::Failure)
        );
        assert_eq!(
            ctx.read(LogFileType::Log, &identity).await,
            Err(RelayError::Failure)
        );
        assert_eq!(ctx.clear(&identity).await, Err(RelayError::Failure));
        assert_eq!(host.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_hostile_size_is_rejected_without_content_request() {
        let (ctx, host) = context();
        ctx.write(b"hello", LogFileType::Log, false, "s").await.unwrap();
        host.set_reported_size(Some(4097));
        assert_eq!(
            ctx.read(LogFileType::Log, "s").await,
            Err(RelayError::Failure)
        );
        host.set_reported_size(Some(u64::MAX));
        assert_eq!(
            ctx.read(LogFileType::Log, "s").await,
            Err(RelayError::Failure)
        );
        assert_eq!(host.calls().get_content, 0);
    }

    #[tokio::test]
    async fn test_appends_past_capacity_fail_on_read() {
        let (ctx, _host) = context();
        let chunk = vec![b'x'; 4000];
        ctx.append_entry(&chunk, "s").await.unwrap();
        ctx.append_entry(&chunk, "s").await.unwrap();
        assert_eq!(
            ctx.read(LogFileType::Log, "s").await,
            Err(RelayError::Failure)
        );
    }

    #[tokio::test]
    async fn test_content_length_mismatch_fails() {
        let (ctx, host) = context();
        ctx.write(b"helloworld", LogFileType::Log, false, "s").await.unwrap();
        host.set_forged_content(Some(b"hello".to_vec()));
        assert_eq!(
            ctx.read(LogFileType::Log, "s").await,
            Err(RelayError::Failure)
        );
    }

    #[tokio::test]
    async fn test_reported_size_zero_skips_content() {
        let (ctx, host) = context();
        ctx.write(b"hello", LogFileType::Log, false, "s").await.unwrap();
        host.set_reported_size(Some(0));
        assert!(ctx.read(LogFileType::Log, "s").await.unwrap().is_empty());
        assert_eq!(host.calls().get_content, 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_failure() {
        let (ctx, host) = context();
        host.set_unreachable(true);
        assert_eq!(
            ctx.write(b"x", LogFileType::Log, false, "s").await,
            Err(RelayError::Failure)
        );
        assert_eq!(
            ctx.read(LogFileType::Log, "s").await,
            Err(RelayError::Failure)
        );
    }

    #[tokio::test]
    async fn test_clear_missing_file_fails() {
        let (ctx, _host) = context();
        assert_eq!(ctx.clear("nobody").await, Err(RelayError::Failure));
    }

    #[tokio::test]
    async fn test_clear_without_delete_support_fails_closed() {
        let host = MemoryTransport::without_delete();
        let ctx = LogContext::new("audit", Box::new(host.clone())).unwrap();
        ctx.write(b"x", LogFileType::Log, false, "s").await.unwrap();
        assert_eq!(ctx.clear("s").await, Err(RelayError::Failure));
        assert_eq!(host.file("audit_log_s.dat").unwrap(), b"x");
    }

    /// 削除を実装しないトランスポート。トレイトのデフォルト実装を使う。
    struct WriteOnlyHost;

    #[async_trait]
    impl HostTransport for WriteOnlyHost {
        async fn write(
            &self,
            _filename: &FilenameBuffer,
            _append: bool,
            _payload: &ContentBuffer,
        ) -> Result<u32, TransportError> {
            Ok(STATUS_OK)
        }

        async fn get_size(&self, _filename: &FilenameBuffer) -> Result<SizeReply, TransportError> {
            Ok(SizeReply {
                found: false,
                size: 0,
            })
        }

        async fn get_content(
            &self,
            _filename: &FilenameBuffer,
            _size: u64,
        ) -> Result<ContentReply, TransportError> {
            Ok(ContentReply {
                status: 1,
                content: ContentBuffer::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_default_delete_fails_closed() {
        let ctx = LogContext::new("audit", Box::new(WriteOnlyHost)).unwrap();
        assert_eq!(ctx.clear("s").await, Err(RelayError::Failure));
    }

    #[tokio::test]
    async fn test_host_status_failure_on_write() {
        struct RejectingHost;

        #[async_trait]
        impl HostTransport for RejectingHost {
            async fn write(
                &self,
                _filename: &FilenameBuffer,
                _append: bool,
                _payload: &ContentBuffer,
            ) -> Result<u32, TransportError> {
                Ok(13)
            }

            async fn get_size(
                &self,
                _filename: &FilenameBuffer,
            ) -> Result<SizeReply, TransportError> {
                Ok(SizeReply {
                    found: true,
                    size: 3,
                })
            }

            async fn get_content(
                &self,
                _filename: &FilenameBuffer,
                _size: u64,
            ) -> Result<ContentReply, TransportError> {
                Ok(ContentReply {
                    status: 13,
                    content: ContentBuffer::new(),
                })
            }
        }

        let ctx = LogContext::new("audit", Box::new(RejectingHost)).unwrap();
        assert_eq!(
            ctx.write(b"x", LogFileType::Log, true, "s").await,
            Err(RelayError::Failure)
        );
        assert_eq!(
            ctx.read(LogFileType::Log, "s").await,
            Err(RelayError::Failure)
        );
    }

    #[test]
    fn test_context_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogContext>();
    }
}
