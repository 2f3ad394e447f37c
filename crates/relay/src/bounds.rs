//! # 境界値の検証
//!
//! ホストに渡すペイロードと、ホストから返るサイズ・内容の検証。
//! ホスト申告値は全てここで受信バッファ容量と照合してから使用する。

use elog_safemath::{safe_cast_u64_to_usize, safe_mul};
use elog_types::{ContentBuffer, CONTENT_CAPACITY};

use crate::error::BoundaryError;

/// ペイロードをコンテンツ転送バッファに詰める。容量超過ならコピーしない。
pub fn stage_payload(payload: &[u8]) -> Result<ContentBuffer, BoundaryError> {
    Ok(ContentBuffer::from_slice(payload)?)
}

/// ホスト申告サイズを検証し、確保すべきバイト数を返す。
///
/// `u64 -> usize` の変換、受信バッファ容量との比較、確保サイズの計算は
/// 全てチェック付きで行う。
pub fn validate_host_size(size: u64) -> Result<usize, BoundaryError> {
    let len = safe_cast_u64_to_usize(size).map_err(|_| BoundaryError::HostSizeTooLarge {
        size,
        limit: CONTENT_CAPACITY,
    })?;
    if len > CONTENT_CAPACITY {
        return Err(BoundaryError::HostSizeTooLarge {
            size,
            limit: CONTENT_CAPACITY,
        });
    }
    Ok(safe_mul(len, std::mem::size_of::<u8>())?)
}

/// 検証済みサイズちょうどの信頼側バッファを確保し、内容をコピーする。
///
/// 返却内容の長さが検証済みサイズと一致しなければ失敗。確保後に失敗した場合も
/// バッファは所有権により一度だけ解放される。
pub fn copy_out(content: &ContentBuffer, expected: usize) -> Result<Vec<u8>, BoundaryError> {
    if content.len() != expected {
        return Err(BoundaryError::BadHostResponse(format!(
            "返却長 {} bytes が申告サイズ {} bytes と一致しません",
            content.len(),
            expected
        )));
    }
    let mut out = Vec::new();
    out.try_reserve_exact(expected)
        .map_err(|_| BoundaryError::Alloc(expected))?;
    out.extend_from_slice(content.as_slice());
    Ok(out)
}
