//! # エンクレーブログ境界 共有型定義
//!
//! 信頼側（エンクレーブ内リレー）と非信頼側（ホストファイルサービス）の
//! 両方が使用するデータ構造と、境界を越えるワイヤプロトコルを提供する。
//!
//! ## 転送バッファ容量
//! | 用途 | 容量 |
//! |------|------|
//! | ファイル名 | 256 バイト |
//! | コンテンツ | 4096 バイト（1回の書き込み・読み取りの上限） |

pub mod buffer;
pub mod protocol;

pub use buffer::{CapacityError, ContentBuffer, FilenameBuffer, TransferBuffer};

// ---------------------------------------------------------------------------
// 容量・ファイル名の定数
// ---------------------------------------------------------------------------

/// ファイル名転送バッファの容量（バイト）
pub const FILENAME_CAPACITY: usize = 256;

/// コンテンツ転送バッファの容量（バイト）
pub const CONTENT_CAPACITY: usize = 4096;

/// フォーマット済みファイル名の長さ上限（この値以上は不可）
pub const MAX_FILENAME_LEN: usize = 255;

/// ログファイルの拡張子
pub const FILE_EXTENSION: &str = ".dat";

// ---------------------------------------------------------------------------
// ホストのアプリケーションステータス
// ---------------------------------------------------------------------------

/// 成功
pub const STATUS_OK: u32 = 0;

/// 失敗（詳細はエンクレーブ側に伝えない）
pub const STATUS_FAILURE: u32 = 1;

// ---------------------------------------------------------------------------
// ログファイル種別
// ---------------------------------------------------------------------------

/// ログファイル種別。
///
/// `Sig` は分離署名の成果物。書き込み・読み取りは可能だが、
/// リレー経由での削除はできない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogFileType {
    /// 追記型の監査ログ
    Log,
    /// 分離署名
    Sig,
}

impl LogFileType {
    /// ファイル名に埋め込むラベル。
    pub fn label(self) -> &'static str {
        match self {
            LogFileType::Log => "log",
            LogFileType::Sig => "sig",
        }
    }
}

impl std::fmt::Display for LogFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ホスト応答
// ---------------------------------------------------------------------------

/// `get_size` の応答。値は全てホストが申告したもので、信頼できない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeReply {
    /// ファイルが存在するか
    pub found: bool,
    /// ホストが申告したファイルサイズ
    pub size: u64,
}

/// `get_content` の応答。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReply {
    /// アプリケーションステータス（0 = 成功）
    pub status: u32,
    /// 返却されたコンテンツ
    pub content: ContentBuffer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_type_label() {
        assert_eq!(LogFileType::Log.label(), "log");
        assert_eq!(LogFileType::Sig.label(), "sig");
        assert_eq!(LogFileType::Sig.to_string(), "sig");
    }

    #[test]
    fn test_capacities_leave_room_for_terminator() {
        assert!(MAX_FILENAME_LEN < FILENAME_CAPACITY);
    }
}
