//! # エンクレーブログリレー
//!
//! エンクレーブ内の信頼側コードが、直接呼び出せない非信頼ホストを経由して
//! 監査ログを永続化するための境界層。
//!
//! ## 信頼境界
//! ホストから届く値（ファイルの有無、サイズ、内容、ステータス）は全て
//! 攻撃者が制御し得る。これらはエンクレーブ側のメモリ確保や制御フローに
//! 影響する前に、`elog-safemath` のチェック付き演算で検証する。
//! エンクレーブから出る値は固定容量の転送バッファ経由でのみ渡す。
//!
//! ## 操作
//! | 操作 | 内容 |
//! |------|------|
//! | [`LogContext::write`] | 作成・上書き・追記（最大4096バイト） |
//! | [`LogContext::append_entry`] | 監査ログへの追記 |
//! | [`LogContext::read`] | 読み取り（未作成なら空） |
//! | [`LogContext::clear`] | 監査ログの削除（署名ファイルは対象外） |

pub mod bounds;
pub mod config;
pub mod context;
pub mod error;
pub mod filename;
pub mod transport;

pub use config::{HostEndpoint, RelayConfig};
pub use context::LogContext;
pub use elog_types::LogFileType;
pub use error::{BoundaryError, RelayError};
pub use transport::{HostTransport, MemoryTransport, ProxyTransport, TransportError};
