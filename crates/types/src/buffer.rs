//! # 固定容量転送バッファ
//!
//! 境界を越えるバイト列は、宣言容量 `N` と論理長の両方を持つ
//! [`TransferBuffer`] として扱う。論理長は常に `N` 以下で、
//! 論理長を超える領域は存在しない（未初期化バイトを公開しない）。

use crate::{CONTENT_CAPACITY, FILENAME_CAPACITY};

/// ファイル名用転送バッファ（256バイト）
pub type FilenameBuffer = TransferBuffer<FILENAME_CAPACITY>;

/// コンテンツ用転送バッファ（4096バイト）
pub type ContentBuffer = TransferBuffer<CONTENT_CAPACITY>;

/// 容量超過エラー。
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("転送バッファの容量を超えています: {len} bytes (容量: {capacity} bytes)")]
pub struct CapacityError {
    /// 格納しようとした長さ
    pub len: usize,
    /// バッファの容量
    pub capacity: usize,
}

/// 容量 `N` の転送バッファ。
#[derive(Clone, PartialEq, Eq, Default)]
pub struct TransferBuffer<const N: usize> {
    data: Vec<u8>,
}

impl<const N: usize> TransferBuffer<N> {
    /// 宣言容量
    pub const CAPACITY: usize = N;

    /// 空のバッファを作成する。
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// スライスをコピーしてバッファを作成する。容量を超える場合はコピーしない。
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CapacityError> {
        Self::check_len(bytes.len())?;
        Ok(Self {
            data: bytes.to_vec(),
        })
    }

    /// 所有済みの `Vec` からバッファを作成する。
    pub fn from_vec(bytes: Vec<u8>) -> Result<Self, CapacityError> {
        Self::check_len(bytes.len())?;
        Ok(Self { data: bytes })
    }

    /// 長さ `len` がこのバッファに収まるかを検証する。
    pub fn check_len(len: usize) -> Result<(), CapacityError> {
        if len > N {
            return Err(CapacityError { len, capacity: N });
        }
        Ok(())
    }

    /// 論理長
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 宣言容量
    pub fn capacity(&self) -> usize {
        N
    }

    /// 論理長までの内容
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// UTF-8文字列として解釈する（ファイル名用）。
    pub fn to_str(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.data)
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl<const N: usize> AsRef<[u8]> for TransferBuffer<N> {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> std::fmt::Debug for TransferBuffer<N> {
    // 内容はログに出さない
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("len", &self.data.len())
            .field("capacity", &N)
            .finish()
    }
}
