//! # ログファイル名の整形
//!
//! `"{prefix}_{log|sig}_{identity}.dat"` 形式のファイル名を組み立てる。
//! 長さはチェック付き演算で先に計算し、上限（255バイト）以上なら
//! 文字列を確保する前に失敗させる。結果は所有値として返す。

use elog_safemath::safe_sum_usize;
use elog_types::{FilenameBuffer, LogFileType, FILE_EXTENSION, MAX_FILENAME_LEN};

use crate::error::BoundaryError;

/// フォーマット後のファイル名長を計算する。
pub fn formatted_len(
    prefix: &str,
    file_type: LogFileType,
    identity: &str,
) -> Result<usize, BoundaryError> {
    Ok(safe_sum_usize(&[
        prefix.len(),
        1,
        file_type.label().len(),
        1,
        identity.len(),
        FILE_EXTENSION.len(),
    ])?)
}

/// ファイル名を整形して転送バッファに格納する。
pub fn format_filename(
    prefix: &str,
    file_type: LogFileType,
    identity: &str,
) -> Result<FilenameBuffer, BoundaryError> {
    let len = formatted_len(prefix, file_type, identity)?;
    if len >= MAX_FILENAME_LEN {
        return Err(BoundaryError::FilenameTooLong {
            len,
            limit: MAX_FILENAME_LEN,
        });
    }

    let mut name = String::with_capacity(len);
    name.push_str(prefix);
    name.push('_');
    name.push_str(file_type.label());
    name.push('_');
    name.push_str(identity);
    name.push_str(FILE_EXTENSION);
    debug_assert_eq!(name.len(), len);

    Ok(FilenameBuffer::from_vec(name.into_bytes())?)
}
