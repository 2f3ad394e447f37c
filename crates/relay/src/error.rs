//! # リレーエラー型
//!
//! 内部では [`BoundaryError`] で失敗原因を区別し、信頼側の呼び出し元には
//! [`RelayError`] の二値（`InvalidParameter` / `Failure`）だけを返す。
//! ホスト由来のエラー詳細で信頼側が分岐することはない。

use elog_safemath::Overflow;
use elog_types::CapacityError;

use crate::transport::TransportError;

/// 呼び出し元に返すエラー。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// 呼び出し元の引数違反（ホストには問い合わせていない）
    #[error("不正なパラメータ")]
    InvalidParameter,
    /// 容量・整形・転送・ホスト側のいずれかの失敗
    #[error("境界操作に失敗しました")]
    Failure,
}

/// 境界操作の内部エラー。ログ出力にのみ使用する。
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// 引数違反。ホストとの通信前に検出される。
    #[error("不正な引数: {0}")]
    Contract(&'static str),

    /// ペイロードが転送バッファに収まらない
    #[error("{0}")]
    Capacity(#[from] CapacityError),

    /// フォーマット済みファイル名が上限以上
    #[error("ファイル名が長すぎます: {len} bytes (上限: {limit} bytes未満)")]
    FilenameTooLong { len: usize, limit: usize },

    /// ホスト申告サイズが受信バッファを超えている
    #[error("ホスト申告サイズが上限を超えています: {size} bytes (上限: {limit} bytes)")]
    HostSizeTooLarge { size: u64, limit: usize },

    /// サイズ計算が表現不能
    #[error("サイズ計算でオーバーフロー: {0}")]
    Overflow(#[from] Overflow),

    /// 境界呼び出し自体の失敗
    #[error("境界呼び出しに失敗: {0}")]
    Transport(#[from] TransportError),

    /// ホストが非ゼロのアプリケーションステータスを返した
    #[error("ホストがエラーを返しました: status={0}")]
    HostStatus(u32),

    /// ホスト応答が検証済みの値と矛盾している
    #[error("ホスト応答が不正: {0}")]
    BadHostResponse(String),

    /// 信頼側バッファの確保に失敗
    #[error("メモリ確保に失敗しました: {0} bytes")]
    Alloc(usize),
}

impl BoundaryError {
    /// ホストとの通信前に検出されるエラーか。
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            BoundaryError::Contract(_)
                | BoundaryError::Capacity(_)
                | BoundaryError::FilenameTooLong { .. }
                | BoundaryError::Overflow(_)
        )
    }
}

impl From<BoundaryError> for RelayError {
    fn from(err: BoundaryError) -> Self {
        match err {
            BoundaryError::Contract(_) => RelayError::InvalidParameter,
            _ => RelayError::Failure,
        }
    }
}
