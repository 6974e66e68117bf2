//! Shared harness for end-to-end tests: boots a real server on an
//! ephemeral port and gives each test a plain `TcpStream` to talk RESP
//! over, the same way a real client would.

use std::net::SocketAddr;

use kvemberd::config::Config;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinSet;

/// Binds a server on `127.0.0.1:0` and spawns its accept loop in the
/// background, returning the address the OS actually chose.
pub async fn start_server() -> SocketAddr {
    let config = Config {
        port: 0,
        ..Config::default()
    };
    let (listener, state) = kvemberd::server::bind(config).await.expect("bind failed");
    let addr = listener.local_addr().expect("local_addr failed");
    tokio::spawn(kvemberd::server::accept_loop(listener, state, JoinSet::new()));
    addr
}

pub async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("connect failed")
}

/// Encodes `parts` as a RESP array of bulk strings (exactly what a real
/// client sends) and writes it to `stream`.
pub async fn send(stream: &mut TcpStream, parts: &[&str]) {
    let mut buf = format!("*{}\r\n", parts.len());
    for p in parts {
        buf.push_str(&format!("${}\r\n{}\r\n", p.len(), p));
    }
    stream.write_all(buf.as_bytes()).await.expect("write failed");
}

/// One parsed RESP reply, loose enough for assertions without pulling in
/// the server's own frame type.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(String),
    NullBulk,
    NullArray,
    Array(Vec<Reply>),
}

/// Reads and parses exactly one RESP reply from `stream`.
pub async fn read_reply(stream: &mut TcpStream) -> Reply {
    let mut reader = ByteReader { stream };
    reader.read_one().await
}

struct ByteReader<'a> {
    stream: &'a mut TcpStream,
}

impl ByteReader<'_> {
    async fn read_byte(&mut self) -> u8 {
        let mut b = [0u8; 1];
        self.stream.read_exact(&mut b).await.expect("read failed");
        b[0]
    }

    async fn read_line(&mut self) -> String {
        let mut line = Vec::new();
        loop {
            let b = self.read_byte().await;
            if b == b'\r' {
                let _ = self.read_byte().await; // \n
                break;
            }
            line.push(b);
        }
        String::from_utf8(line).expect("non-utf8 reply line")
    }

    async fn read_one(&mut self) -> Reply {
        let tag = self.read_byte().await;
        match tag {
            b'+' => Reply::Simple(self.read_line().await),
            b'-' => Reply::Error(self.read_line().await),
            b':' => Reply::Integer(self.read_line().await.parse().expect("bad integer reply")),
            b'$' => {
                let len: i64 = self.read_line().await.parse().expect("bad bulk length");
                if len < 0 {
                    return Reply::NullBulk;
                }
                let mut buf = vec![0u8; len as usize];
                self.stream.read_exact(&mut buf).await.expect("read failed");
                let _ = self.read_byte().await; // \r
                let _ = self.read_byte().await; // \n
                Reply::Bulk(String::from_utf8_lossy(&buf).into_owned())
            }
            b'*' => {
                let len: i64 = self.read_line().await.parse().expect("bad array length");
                if len < 0 {
                    return Reply::NullArray;
                }
                let mut items = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    items.push(Box::pin(self.read_one()).await);
                }
                Reply::Array(items)
            }
            other => panic!("unexpected RESP tag byte: {other}"),
        }
    }
}
