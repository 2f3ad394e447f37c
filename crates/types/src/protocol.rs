//! # Length-prefixed 境界プロトコル
//!
//! エンクレーブ ↔ ホスト間の1往復を表すバイナリフレーム。
//! 1接続につき1リクエスト・1レスポンス。数値は全てビッグエンディアン。
//!
//! ## Enclave → Host
//! ```text
//! [4B: opcode][4B: filename_len][filename][1B: append][8B: size][4B: body_len][body]
//! ```
//!
//! ## Host → Enclave
//! ```text
//! [4B: status][8B: size][4B: body_len][body]
//! ```
//!
//! 受信側は長さフィールドを転送バッファ容量と照合してからバッファを確保する。
//! `filename_len > 256` や `body_len > 4096` のフレームは `InvalidData` で拒否する。

use std::io;

use elog_safemath::safe_cast_u64_to_usize;

use crate::{ContentBuffer, FilenameBuffer, TransferBuffer, STATUS_OK};

/// 境界呼び出しの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// ファイルへの書き込み（作成・上書き・追記）
    Write = 1,
    /// ファイルサイズの問い合わせ
    GetSize = 2,
    /// ファイル内容の取得
    GetContent = 3,
    /// ファイルの削除
    Delete = 4,
}

impl TryFrom<u32> for Opcode {
    type Error = io::Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Opcode::Write),
            2 => Ok(Opcode::GetSize),
            3 => Ok(Opcode::GetContent),
            4 => Ok(Opcode::Delete),
            other => Err(invalid_data(format!("未知のopcode: {other}"))),
        }
    }
}

/// エンクレーブからホストへのリクエスト。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub opcode: Opcode,
    pub filename: FilenameBuffer,
    /// `Write` のみ使用
    pub append: bool,
    /// `GetContent` の要求サイズ
    pub size: u64,
    /// `Write` のペイロード
    pub body: ContentBuffer,
}

impl Request {
    /// ペイロードを持たないリクエストを作成する。
    pub fn new(opcode: Opcode, filename: FilenameBuffer) -> Self {
        Self {
            opcode,
            filename,
            append: false,
            size: 0,
            body: ContentBuffer::new(),
        }
    }
}

/// ホストからエンクレーブへのレスポンス。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// アプリケーションステータス（0 = 成功）
    pub status: u32,
    /// `GetSize` の申告サイズ
    pub size: u64,
    /// `GetContent` の内容
    pub body: ContentBuffer,
}

impl Response {
    /// ステータスのみのレスポンス。
    pub fn status(status: u32) -> Self {
        Self {
            status,
            size: 0,
            body: ContentBuffer::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

/// 長さフィールドを検証し、容量 `N` に収まる `usize` に変換する。
fn checked_frame_len<const N: usize>(raw: u32) -> io::Result<usize> {
    let len = safe_cast_u64_to_usize(u64::from(raw))
        .map_err(|e| invalid_data(format!("長さフィールドが不正: {e}")))?;
    TransferBuffer::<N>::check_len(len).map_err(|e| invalid_data(e.to_string()))?;
    Ok(len)
}

/// リクエストをフレームにエンコードする。
pub fn encode_request(req: &Request) -> Vec<u8> {
    let filename = req.filename.as_slice();
    let body = req.body.as_slice();
    let mut out = Vec::with_capacity(4 + 4 + filename.len() + 1 + 8 + 4 + body.len());
    out.extend_from_slice(&(req.opcode as u32).to_be_bytes());
    out.extend_from_slice(&(filename.len() as u32).to_be_bytes());
    out.extend_from_slice(filename);
    out.push(u8::from(req.append));
    out.extend_from_slice(&req.size.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// レスポンスをフレームにエンコードする。
pub fn encode_response(resp: &Response) -> Vec<u8> {
    let body = resp.body.as_slice();
    let mut out = Vec::with_capacity(4 + 8 + 4 + body.len());
    out.extend_from_slice(&resp.status.to_be_bytes());
    out.extend_from_slice(&resp.size.to_be_bytes());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

// ─────────────────────────────────────────────
// 非同期I/O（TCP経路）
// ─────────────────────────────────────────────

async fn read_u32_async<R: tokio::io::AsyncRead + Unpin>(r: &mut R) -> io::Result<u32> {
    use tokio::io::AsyncReadExt;
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

async fn read_u64_async<R: tokio::io::AsyncRead + Unpin>(r: &mut R) -> io::Result<u64> {
    use tokio::io::AsyncReadExt;
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).await?;
    Ok(u64::from_be_bytes(buf))
}

async fn read_buffer_async<R: tokio::io::AsyncRead + Unpin, const N: usize>(
    r: &mut R,
) -> io::Result<TransferBuffer<N>> {
    use tokio::io::AsyncReadExt;
    let len = checked_frame_len::<N>(read_u32_async(r).await?)?;
    let mut buf = vec![0u8; len];
    if len > 0 {
        r.read_exact(&mut buf).await?;
    }
    TransferBuffer::from_vec(buf).map_err(|e| invalid_data(e.to_string()))
}

/// リクエストフレームを読み取る。
pub async fn read_request_async<R: tokio::io::AsyncRead + Unpin>(r: &mut R) -> io::Result<Request> {
    use tokio::io::AsyncReadExt;
    let opcode = Opcode::try_from(read_u32_async(r).await?)?;
    let filename = read_buffer_async(r).await?;
    let append = r.read_u8().await? != 0;
    let size = read_u64_async(r).await?;
    let body = read_buffer_async(r).await?;
    Ok(Request {
        opcode,
        filename,
        append,
        size,
        body,
    })
}

/// レスポンスフレームを読み取る。
pub async fn read_response_async<R: tokio::io::AsyncRead + Unpin>(
    r: &mut R,
) -> io::Result<Response> {
    let status = read_u32_async(r).await?;
    let size = read_u64_async(r).await?;
    let body = read_buffer_async(r).await?;
    Ok(Response { status, size, body })
}

/// リクエストフレームを書き込む。
pub async fn write_request_async<W: tokio::io::AsyncWrite + Unpin>(
    w: &mut W,
    req: &Request,
) -> io::Result<()> {
    use tokio::io::AsyncWriteExt;
    w.write_all(&encode_request(req)).await?;
    w.flush().await
}

/// レスポンスフレームを書き込む。
pub async fn write_response_async<W: tokio::io::AsyncWrite + Unpin>(
    w: &mut W,
    resp: &Response,
) -> io::Result<()> {
    use tokio::io::AsyncWriteExt;
    w.write_all(&encode_response(resp)).await?;
    w.flush().await
}

// ─────────────────────────────────────────────
// 同期I/O（vsock経路）
// ─────────────────────────────────────────────

fn read_u32_sync(r: &mut impl io::Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64_sync(r: &mut impl io::Read) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_buffer_sync<const N: usize>(r: &mut impl io::Read) -> io::Result<TransferBuffer<N>> {
    let len = checked_frame_len::<N>(read_u32_sync(r)?)?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    TransferBuffer::from_vec(buf).map_err(|e| invalid_data(e.to_string()))
}

/// リクエストフレームを同期的に読み取る。
pub fn read_request_sync(r: &mut impl io::Read) -> io::Result<Request> {
    let opcode = Opcode::try_from(read_u32_sync(r)?)?;
    let filename = read_buffer_sync(r)?;
    let mut flag = [0u8; 1];
    r.read_exact(&mut flag)?;
    let size = read_u64_sync(r)?;
    let body = read_buffer_sync(r)?;
    Ok(Request {
        opcode,
        filename,
        append: flag[0] != 0,
        size,
        body,
    })
}

/// レスポンスフレームを同期的に読み取る。
pub fn read_response_sync(r: &mut impl io::Read) -> io::Result<Response> {
    let status = read_u32_sync(r)?;
    let size = read_u64_sync(r)?;
    let body = read_buffer_sync(r)?;
    Ok(Response { status, size, body })
}

/// リクエストフレームを同期的に書き込む。
pub fn write_request_sync(w: &mut impl io::Write, req: &Request) -> io::Result<()> {
    w.write_all(&encode_request(req))?;
    w.flush()
}

/// レスポンスフレームを同期的に書き込む。
pub fn write_response_sync(w: &mut impl io::Write, resp: &Response) -> io::Result<()> {
    w.write_all(&encode_response(resp))?;
    w.flush()
}
