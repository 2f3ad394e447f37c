//! # エンクレーブログリレー CLI
//!
//! 信頼側の呼び出し元として [`LogContext`] を操作する運用ツール。
//! ホストファイルサービス（`elog-host`）に対して書き込み・追記・読み取り・削除を行う。
//!
//! ```text
//! elog-cli --host 127.0.0.1:8100 --prefix audit write --identity session42 hello
//! elog-cli append --identity session42 world
//! elog-cli read --identity session42
//! elog-cli clear --identity session42
//! ```

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use elog_relay::config::{DEFAULT_HOST_ADDR, DEFAULT_LOG_PATH_PREFIX};
use elog_relay::{LogContext, LogFileType, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "elog-cli", version, about = "エンクレーブログリレー操作CLI")]
struct Cli {
    /// ホスト接続先（`memory` / TCPアドレス / `vsock:<cid>:<port>`）
    #[arg(long, env = "HOST_ADDR", default_value = DEFAULT_HOST_ADDR)]
    host: String,

    /// ファイル名のプレフィックス
    #[arg(long, env = "LOG_PATH_PREFIX", default_value = DEFAULT_LOG_PATH_PREFIX)]
    prefix: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// ログを書き込む（既定は上書き）
    Write {
        #[arg(long)]
        identity: String,
        /// 署名ファイルに書き込む
        #[arg(long)]
        sig: bool,
        /// 追記する
        #[arg(long)]
        append: bool,
        /// ペイロードをファイルから読む
        #[arg(long, conflicts_with = "data")]
        file: Option<PathBuf>,
        /// ペイロード（省略時は標準入力）
        data: Option<String>,
    },
    /// 監査ログに追記する
    Append {
        #[arg(long)]
        identity: String,
        data: Option<String>,
    },
    /// ログを読み取る
    Read {
        #[arg(long)]
        identity: String,
        #[arg(long)]
        sig: bool,
        /// 出力先ファイル（省略時は標準出力）
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// 監査ログを削除する
    Clear {
        #[arg(long)]
        identity: String,
    },
}

fn file_type(sig: bool) -> LogFileType {
    if sig {
        LogFileType::Sig
    } else {
        LogFileType::Log
    }
}

/// ペイロードを引数・ファイル・標準入力の順に解決する。
fn load_payload(data: Option<String>, file: Option<PathBuf>) -> anyhow::Result<Vec<u8>> {
    if let Some(data) = data {
        return Ok(data.into_bytes());
    }
    if let Some(path) = file {
        return std::fs::read(&path)
            .with_context(|| format!("ペイロードの読み込みに失敗 ({})", path.display()));
    }
    let mut buf = Vec::new();
    std::io::stdin()
        .read_to_end(&mut buf)
        .context("標準入力の読み込みに失敗")?;
    Ok(buf)
}

/// サブコマンドを実行する。`read` の場合は読み取った内容を返す。
async fn execute(ctx: &LogContext, command: Command) -> anyhow::Result<Option<Vec<u8>>> {
    match command {
        Command::Write {
            identity,
            sig,
            append,
            file,
            data,
        } => {
            let payload = load_payload(data, file)?;
            ctx.write(&payload, file_type(sig), append, &identity)
                .await
                .context("書き込みに失敗しました")?;
            tracing::info!("{} bytes を書き込みました", payload.len());
            Ok(None)
        }
        Command::Append { identity, data } => {
            let payload = load_payload(data, None)?;
            ctx.append_entry(&payload, &identity)
                .await
                .context("追記に失敗しました")?;
            tracing::info!("{} bytes を追記しました", payload.len());
            Ok(None)
        }
        Command::Read { identity, sig, .. } => {
            let content = ctx
                .read(file_type(sig), &identity)
                .await
                .context("読み取りに失敗しました")?;
            Ok(Some(content))
        }
        Command::Clear { identity } => {
            ctx.clear(&identity).await.context("削除に失敗しました")?;
            tracing::info!("ログを削除しました: {}", identity);
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let out = match &cli.command {
        Command::Read { out, .. } => out.clone(),
        _ => None,
    };

    let config = RelayConfig::from_values(Some(cli.prefix), Some(cli.host))?;
    let ctx = config.into_context().context("ログコンテキストの作成に失敗")?;

    if let Some(content) = execute(&ctx, cli.command).await? {
        match out {
            Some(path) => std::fs::write(&path, &content)
                .with_context(|| format!("出力に失敗 ({})", path.display()))?,
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&content)?;
                stdout.flush()?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elog_relay::MemoryTransport;

    #[test]
    fn test_parse_write() {
        let cli = Cli::try_parse_from([
            "elog-cli",
            "--host",
            "memory",
            "write",
            "--identity",
            "session42",
            "--append",
            "hello",
        ])
        .unwrap();
        assert_eq!(cli.host, "memory");
        assert_eq!(cli.prefix, DEFAULT_LOG_PATH_PREFIX);
        assert_eq!(
            cli.command,
            Command::Write {
                identity: "session42".to_string(),
                sig: false,
                append: true,
                file: None,
                data: Some("hello".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_rejects_file_and_data() {
        let result = Cli::try_parse_from([
            "elog-cli",
            "write",
            "--identity",
            "a",
            "--file",
            "payload.bin",
            "hello",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_requires_identity() {
        assert!(Cli::try_parse_from(["elog-cli", "clear"]).is_err());
    }

    #[tokio::test]
    async fn test_execute_session() {
        let ctx = LogContext::new("audit", Box::new(MemoryTransport::new())).unwrap();
        let write = Command::Write {
            identity: "s".to_string(),
            sig: false,
            append: false,
            file: None,
            data: Some("hello".to_string()),
        };
        assert_eq!(execute(&ctx, write).await.unwrap(), None);

        let append = Command::Append {
            identity: "s".to_string(),
            data: Some("world".to_string()),
        };
        execute(&ctx, append).await.unwrap();

        let read = Command::Read {
            identity: "s".to_string(),
            sig: false,
            out: None,
        };
        assert_eq!(
            execute(&ctx, read).await.unwrap(),
            Some(b"helloworld".to_vec())
        );

        let clear = Command::Clear {
            identity: "s".to_string(),
        };
        execute(&ctx, clear).await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_reports_failure() {
        let ctx = LogContext::new("audit", Box::new(MemoryTransport::without_delete())).unwrap();
        let clear = Command::Clear {
            identity: "s".to_string(),
        };
        assert!(execute(&ctx, clear).await.is_err());
    }
}
