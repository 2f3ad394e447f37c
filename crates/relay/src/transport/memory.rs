//! # プロセス内模擬ホスト
//!
//! ホストファイルシステムをメモリ上のマップで模擬するトランスポート。
//! テストでは敵対的なホスト（サイズの偽装、内容の改ざん、到達不能）を
//! 再現するための切り替えを持つ。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use elog_types::{
    ContentBuffer, ContentReply, FilenameBuffer, SizeReply, STATUS_FAILURE, STATUS_OK,
};

use super::{HostTransport, TransportError};

/// 呼び出し回数の記録。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub write: usize,
    pub get_size: usize,
    pub get_content: usize,
    pub delete: usize,
}

impl CallCounts {
    /// 全呼び出しの合計
    pub fn total(&self) -> usize {
        self.write + self.get_size + self.get_content + self.delete
    }
}

#[derive(Default)]
struct MemoryHost {
    files: HashMap<String, Vec<u8>>,
    delete_unsupported: bool,
    unreachable: bool,
    reported_size: Option<u64>,
    forged_content: Option<Vec<u8>>,
    calls: CallCounts,
}

/// メモリ上の模擬ホスト。クローンは同じ状態を共有する。
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryHost>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 削除をサポートしないホスト。
    pub fn without_delete() -> Self {
        let transport = Self::default();
        transport.host().delete_unsupported = true;
        transport
    }

    fn host(&self) -> MutexGuard<'_, MemoryHost> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `get_size` が返すサイズを上書きする（`None` で実サイズ）。
    pub fn set_reported_size(&self, size: Option<u64>) {
        self.host().reported_size = size;
    }

    /// `get_content` が返す内容を上書きする（`None` で実内容）。
    pub fn set_forged_content(&self, content: Option<Vec<u8>>) {
        self.host().forged_content = content;
    }

    /// 全呼び出しを転送エラーにする。
    pub fn set_unreachable(&self, unreachable: bool) {
        self.host().unreachable = unreachable;
    }

    /// 保存済みファイルの内容。
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.host().files.get(name).cloned()
    }

    /// 保存済みファイル名の一覧（ソート済み）。
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.host().files.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn calls(&self) -> CallCounts {
        self.host().calls
    }
}

fn key(filename: &FilenameBuffer) -> String {
    String::from_utf8_lossy(filename.as_slice()).into_owned()
}

fn check_reachable(host: &MemoryHost) -> Result<(), TransportError> {
    if host.unreachable {
        return Err(TransportError::Unavailable("memory host is offline".to_string()));
    }
    Ok(())
}

#[async_trait]
impl HostTransport for MemoryTransport {
    async fn write(
        &self,
        filename: &FilenameBuffer,
        append: bool,
        payload: &ContentBuffer,
    ) -> Result<u32, TransportError> {
        let mut host = self.host();
        host.calls.write += 1;
        check_reachable(&host)?;
        let file = host.files.entry(key(filename)).or_default();
        if !append {
            file.clear();
        }
        file.extend_from_slice(payload.as_slice());
        Ok(STATUS_OK)
    }

    async fn get_size(&self, filename: &FilenameBuffer) -> Result<SizeReply, TransportError> {
        let mut host = self.host();
        host.calls.get_size += 1;
        check_reachable(&host)?;
        let actual = host.files.get(&key(filename)).map(|f| f.len() as u64);
        Ok(match (actual, host.reported_size) {
            (None, _) => SizeReply {
                found: false,
                size: 0,
            },
            (Some(_), Some(forged)) => SizeReply {
                found: true,
                size: forged,
            },
            (Some(size), None) => SizeReply { found: true, size },
        })
    }

    async fn get_content(
        &self,
        filename: &FilenameBuffer,
        size: u64,
    ) -> Result<ContentReply, TransportError> {
        let mut host = self.host();
        host.calls.get_content += 1;
        check_reachable(&host)?;

        let failure = ContentReply {
            status: STATUS_FAILURE,
            content: ContentBuffer::new(),
        };
        if let Some(forged) = host.forged_content.clone() {
            return Ok(ContentBuffer::from_vec(forged)
                .map(|content| ContentReply {
                    status: STATUS_OK,
                    content,
                })
                .unwrap_or(failure));
        }
        let Some(file) = host.files.get(&key(filename)) else {
            return Ok(failure);
        };
        let Ok(size) = usize::try_from(size) else {
            return Ok(failure);
        };
        if size > file.len() {
            return Ok(failure);
        }
        Ok(ContentBuffer::from_slice(&file[..size])
            .map(|content| ContentReply {
                status: STATUS_OK,
                content,
            })
            .unwrap_or(failure))
    }

    async fn delete(&self, filename: &FilenameBuffer) -> Result<u32, TransportError> {
        let mut host = self.host();
        host.calls.delete += 1;
        if host.delete_unsupported {
            return Err(TransportError::Unsupported("delete"));
        }
        check_reachable(&host)?;
        Ok(match host.files.remove(&key(filename)) {
            Some(_) => STATUS_OK,
            None => STATUS_FAILURE,
        })
    }
}
