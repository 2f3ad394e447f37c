//! # ログファイルストア
//!
//! エンクレーブから受け取ったファイル名をルートディレクトリ配下に解決し、
//! 書き込み・サイズ取得・内容取得・削除を行う。
//!
//! ファイル名はエンクレーブ側で整形されるが、ホストはそれを信用しない。
//! `/` 区切りの相対パスのみ受け付け、絶対パス・空要素・`.`/`..` 要素・
//! バックスラッシュ・NUL を含む名前はルート外を指し得るため拒否する。

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use elog_types::{ContentBuffer, FilenameBuffer, CONTENT_CAPACITY};

/// ストア操作のエラー。
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// ルート外を指し得る、またはUTF-8でないファイル名
    #[error("不正なファイル名: {0}")]
    InvalidName(String),

    /// 要求サイズが転送バッファを超えている
    #[error("要求サイズが上限を超えています: {0} bytes")]
    TooLarge(u64),

    /// ファイルが要求サイズより短い
    #[error("ファイルが要求サイズより短い: {actual} bytes (要求: {requested} bytes)")]
    ShortRead { requested: u64, actual: usize },

    /// ファイルが存在しない
    #[error("ファイルが存在しません: {0}")]
    NotFound(String),

    #[error("IOエラー: {0}")]
    Io(#[from] io::Error),
}

/// ルートディレクトリ配下のログファイルストア。
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// ファイル名をルート配下のパスに解決する。
    pub fn resolve(&self, filename: &FilenameBuffer) -> Result<PathBuf, StoreError> {
        let name = filename.to_str().map_err(|_| {
            StoreError::InvalidName(String::from_utf8_lossy(filename.as_slice()).into_owned())
        })?;
        let confined = !name.contains(['\\', '\0'])
            && name
                .split('/')
                .all(|part| !part.is_empty() && part != "." && part != "..");
        if !confined {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// ファイルに書き込む。`append` が偽なら作成または切り詰め。
    pub async fn export(
        &self,
        filename: &FilenameBuffer,
        append: bool,
        payload: &ContentBuffer,
    ) -> Result<(), StoreError> {
        let path = self.resolve(filename)?;
        let mut options = tokio::fs::OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = options.open(&path).await?;
        file.write_all(payload.as_slice()).await?;
        file.flush().await?;
        Ok(())
    }

    /// ファイルサイズを返す。存在しなければ `None`。
    pub async fn size(&self, filename: &FilenameBuffer) -> Result<Option<u64>, StoreError> {
        let path = self.resolve(filename)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// ファイルの先頭から `size` バイトを読み取る。
    pub async fn content(
        &self,
        filename: &FilenameBuffer,
        size: u64,
    ) -> Result<ContentBuffer, StoreError> {
        if size > CONTENT_CAPACITY as u64 {
            return Err(StoreError::TooLarge(size));
        }
        let path = self.resolve(filename)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::with_capacity(size as usize);
        file.take(size).read_to_end(&mut buf).await?;
        if (buf.len() as u64) < size {
            return Err(StoreError::ShortRead {
                requested: size,
                actual: buf.len(),
            });
        }
        ContentBuffer::from_vec(buf).map_err(|_| StoreError::TooLarge(size))
    }

    /// ファイルを削除する。
    pub async fn delete(&self, filename: &FilenameBuffer) -> Result<(), StoreError> {
        let path = self.resolve(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// テスト用の一時ルートディレクトリを作成する。
    pub(crate) async fn temp_store() -> FileStore {
        let root = std::env::temp_dir().join(format!("elog-host-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&root).await.unwrap();
        FileStore::new(root)
    }

    fn name(s: &str) -> FilenameBuffer {
        FilenameBuffer::from_slice(s.as_bytes()).unwrap()
    }

    fn content(b: &[u8]) -> ContentBuffer {
        ContentBuffer::from_slice(b).unwrap()
    }

    #[tokio::test]
    async fn test_export_truncate_and_append() {
        let store = temp_store().await;
        let f = name("audit_log_s.dat");
        store.export(&f, false, &content(b"hello")).await.unwrap();
        store.export(&f, true, &content(b"world")).await.unwrap();
        assert_eq!(store.size(&f).await.unwrap(), Some(10));

        store.export(&f, false, &content(b"new")).await.unwrap();
        let read = store.content(&f, 3).await.unwrap();
        assert_eq!(read.as_slice(), b"new");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let store = temp_store().await;
        let f = name("audit_log_none.dat");
        assert_eq!(store.size(&f).await.unwrap(), None);
        assert!(matches!(
            store.content(&f, 1).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.delete(&f).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_short_read_and_oversized_request() {
        let store = temp_store().await;
        let f = name("audit_log_s.dat");
        store.export(&f, false, &content(b"abc")).await.unwrap();
        assert!(matches!(
            store.content(&f, 4).await,
            Err(StoreError::ShortRead { requested: 4, actual: 3 })
        ));
        assert!(matches!(
            store.content(&f, 4097).await,
            Err(StoreError::TooLarge(4097))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = temp_store().await;
        let f = name("audit_log_s.dat");
        store.export(&f, false, &content(b"x")).await.unwrap();
        store.delete(&f).await.unwrap();
        assert_eq!(store.size(&f).await.unwrap(), None);
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = FileStore::new("/srv/logs");
        for bad in [
            "../etc/passwd",
            "/etc/passwd",
            "a/../../b.dat",
            "a//b.dat",
            "a\\b.dat",
            "..",
            ".",
            "a\0b",
            "",
        ] {
            assert!(
                matches!(store.resolve(&name(bad)), Err(StoreError::InvalidName(_))),
                "{bad:?} should be rejected"
            );
        }
        let invalid_utf8 = FilenameBuffer::from_slice(&[0xFF]).unwrap();
        assert!(store.resolve(&invalid_utf8).is_err());
        assert_eq!(
            store.resolve(&name("audit_log_s.dat")).unwrap(),
            PathBuf::from("/srv/logs/audit_log_s.dat")
        );
        assert_eq!(
            store.resolve(&name("enclave/audit_log_s.dat")).unwrap(),
            PathBuf::from("/srv/logs/enclave/audit_log_s.dat")
        );
    }
}
