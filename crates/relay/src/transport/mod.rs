//! # 境界呼び出しトランスポート
//!
//! エンクレーブからホストへの呼び出しを抽象化するトレイト。
//! 各メソッドはホストが応答するまで完了しない（1操作につき1回のサスペンド）。
//! 戻り値の `Err` は転送ステータスの失敗、`Ok` の中身はアプリケーションステータス。
//!
//! 現在のトランスポート実装:
//! - `memory`: プロセス内の模擬ホスト（テスト・開発用）
//! - `proxy`: length-prefixedプロトコルで `elog-host` に接続（TCP / vsock）

pub mod memory;
pub mod proxy;

pub use memory::MemoryTransport;
pub use proxy::ProxyTransport;

use async_trait::async_trait;
use elog_types::{ContentBuffer, ContentReply, FilenameBuffer, SizeReply};

/// 転送レベルのエラー。
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 接続・送受信の失敗
    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    /// トランスポートが操作をサポートしていない
    #[error("トランスポートが {0} をサポートしていません")]
    Unsupported(&'static str),

    /// ホストに到達できない
    #[error("ホストに到達できません: {0}")]
    Unavailable(String),
}

/// ホストへの境界呼び出し。
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// ファイルに書き込む。`append` が偽なら作成または上書き。
    async fn write(
        &self,
        filename: &FilenameBuffer,
        append: bool,
        payload: &ContentBuffer,
    ) -> Result<u32, TransportError>;

    /// ファイルサイズを問い合わせる。
    async fn get_size(&self, filename: &FilenameBuffer) -> Result<SizeReply, TransportError>;

    /// ファイル内容を先頭から `size` バイト取得する。
    async fn get_content(
        &self,
        filename: &FilenameBuffer,
        size: u64,
    ) -> Result<ContentReply, TransportError>;

    /// ファイルを削除する。
    ///
    /// 削除を持たないトランスポートは実装しない。その場合は常に失敗する。
    async fn delete(&self, _filename: &FilenameBuffer) -> Result<u32, TransportError> {
        Err(TransportError::Unsupported("delete"))
    }
}
