//! A scripted stand-in for a MySQL server, speaking just enough of the
//! classic protocol (native password auth, text result sets with EOF
//! packets) for the client to connect, query, ping, reset and quit.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use syncmysql::ConnectionConfig;

const CLIENT_LONG_PASSWORD: u32 = 0x0000_0001;
const CLIENT_FOUND_ROWS: u32 = 0x0000_0002;
const CLIENT_LONG_FLAG: u32 = 0x0000_0004;
const CLIENT_CONNECT_WITH_DB: u32 = 0x0000_0008;
const CLIENT_PROTOCOL_41: u32 = 0x0000_0200;
const CLIENT_TRANSACTIONS: u32 = 0x0000_2000;
const CLIENT_SECURE_CONNECTION: u32 = 0x0000_8000;
const CLIENT_MULTI_STATEMENTS: u32 = 0x0001_0000;
const CLIENT_MULTI_RESULTS: u32 = 0x0002_0000;
const CLIENT_PS_MULTI_RESULTS: u32 = 0x0004_0000;
const CLIENT_PLUGIN_AUTH: u32 = 0x0008_0000;

// No CLIENT_DEPRECATE_EOF: result sets end with classic EOF packets.
const CAPABILITIES: u32 = CLIENT_LONG_PASSWORD
    | CLIENT_FOUND_ROWS
    | CLIENT_LONG_FLAG
    | CLIENT_CONNECT_WITH_DB
    | CLIENT_PROTOCOL_41
    | CLIENT_TRANSACTIONS
    | CLIENT_SECURE_CONNECTION
    | CLIENT_MULTI_STATEMENTS
    | CLIENT_MULTI_RESULTS
    | CLIENT_PS_MULTI_RESULTS
    | CLIENT_PLUGIN_AUTH;

const STATUS_AUTOCOMMIT: u16 = 0x0002;
const STATUS_MORE_RESULTS: u16 = 0x0008;

const COM_QUIT: u8 = 0x01;
const COM_QUERY: u8 = 0x03;
const COM_STMT_CLOSE: u8 = 0x19;

const UTF8MB4_GENERAL_CI: u16 = 45;
const BINARY: u16 = 63;
const TYPE_LONGLONG: u8 = 0x08;
const TYPE_VAR_STRING: u8 = 0xfd;

#[derive(Debug, Clone, Copy)]
pub enum Kind {
    Int,
    Text,
}

/// One response packet group for a statement.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok {
        affected_rows: u64,
        last_insert_id: u64,
    },
    Rows {
        columns: Vec<(String, Kind)>,
        rows: Vec<Vec<Option<String>>>,
    },
    /// Ends the response; nothing scripted after it is sent.
    Error {
        code: u16,
        sqlstate: &'static str,
        message: String,
    },
}

impl Reply {
    pub fn ok() -> Self {
        Self::done(0, 0)
    }

    pub fn done(affected_rows: u64, last_insert_id: u64) -> Self {
        Reply::Ok {
            affected_rows,
            last_insert_id,
        }
    }

    pub fn rows(columns: &[(&str, Kind)], rows: &[&[Option<&str>]]) -> Self {
        Reply::Rows {
            columns: columns
                .iter()
                .map(|(name, kind)| ((*name).to_string(), *kind))
                .collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                .collect(),
        }
    }

    pub fn error(code: u16, sqlstate: &'static str, message: impl Into<String>) -> Self {
        Reply::Error {
            code,
            sqlstate,
            message: message.into(),
        }
    }
}

type Script = dyn Fn(&str) -> Vec<Reply> + Send + Sync;

/// A listening fake server. Every accepted session runs on its own thread
/// and answers `COM_QUERY` through the script; statements the script does
/// not know get a plain OK.
pub struct FakeMysql {
    port: u16,
    statements: Arc<Mutex<Vec<String>>>,
}

impl FakeMysql {
    pub fn start<F>(script: F) -> Self
    where
        F: Fn(&str) -> Option<Vec<Reply>> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake server");
        let port = listener.local_addr().expect("local addr").port();
        let statements = Arc::new(Mutex::new(Vec::new()));
        let script: Arc<Script> =
            Arc::new(move |sql: &str| script(sql).unwrap_or_else(|| vec![Reply::ok()]));

        let log = Arc::clone(&statements);
        thread::spawn(move || {
            let ids = AtomicU32::new(1);
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let id = ids.fetch_add(1, Ordering::Relaxed);
                let script = Arc::clone(&script);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    // A client hanging up mid-conversation is not a failure here.
                    let _ = serve(stream, id, &*script, &log);
                });
            }
        });

        Self { port, statements }
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::new()
            .host("127.0.0.1")
            .port(self.port)
            .user("app")
            .password("secret")
    }

    /// Statements received so far, session setup included.
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times `sql` was received.
    pub fn count(&self, sql: &str) -> usize {
        self.statements().iter().filter(|s| *s == sql).count()
    }
}

struct Wire {
    stream: TcpStream,
    seq: u8,
}

impl Wire {
    fn read(&mut self) -> io::Result<Vec<u8>> {
        let mut head = [0_u8; 4];
        self.stream.read_exact(&mut head)?;
        let len = u32::from_le_bytes([head[0], head[1], head[2], 0]) as usize;
        self.seq = head[3].wrapping_add(1);
        let mut body = vec![0_u8; len];
        self.stream.read_exact(&mut body)?;
        Ok(body)
    }

    fn write(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = u32::try_from(payload.len()).expect("packet fits");
        let mut packet = len.to_le_bytes()[..3].to_vec();
        packet.push(self.seq);
        packet.extend_from_slice(payload);
        self.seq = self.seq.wrapping_add(1);
        self.stream.write_all(&packet)
    }

    fn ok(&mut self, affected_rows: u64, last_insert_id: u64, status: u16) -> io::Result<()> {
        let mut p = vec![0x00];
        put_lenenc_int(&mut p, affected_rows);
        put_lenenc_int(&mut p, last_insert_id);
        p.extend_from_slice(&status.to_le_bytes());
        p.extend_from_slice(&0_u16.to_le_bytes());
        self.write(&p)
    }

    fn eof(&mut self, status: u16) -> io::Result<()> {
        let mut p = vec![0xfe, 0, 0];
        p.extend_from_slice(&status.to_le_bytes());
        self.write(&p)
    }

    fn err(&mut self, code: u16, sqlstate: &str, message: &str) -> io::Result<()> {
        let mut p = vec![0xff];
        p.extend_from_slice(&code.to_le_bytes());
        p.push(b'#');
        p.extend_from_slice(sqlstate.as_bytes());
        p.extend_from_slice(message.as_bytes());
        self.write(&p)
    }
}

fn put_lenenc_int(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=250 => buf.push(value as u8),
        251..=0xffff => {
            buf.push(0xfc);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xff_ffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
        }
        _ => {
            buf.push(0xfe);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

fn put_lenenc_str(buf: &mut Vec<u8>, value: &str) {
    put_lenenc_int(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

fn handshake(id: u32) -> Vec<u8> {
    let mut p = vec![10];
    p.extend_from_slice(b"8.0.36-fake\0");
    p.extend_from_slice(&id.to_le_bytes());
    p.extend_from_slice(b"abcdefgh");
    p.push(0);
    p.extend_from_slice(&(CAPABILITIES as u16).to_le_bytes());
    p.push(UTF8MB4_GENERAL_CI as u8);
    p.extend_from_slice(&STATUS_AUTOCOMMIT.to_le_bytes());
    p.extend_from_slice(&((CAPABILITIES >> 16) as u16).to_le_bytes());
    p.push(21);
    p.extend_from_slice(&[0_u8; 10]);
    p.extend_from_slice(b"ijklmnopqrst\0");
    p.extend_from_slice(b"mysql_native_password\0");
    p
}

fn column_definition(name: &str, kind: Kind) -> Vec<u8> {
    let (charset, length, column_type) = match kind {
        Kind::Int => (BINARY, 20_u32, TYPE_LONGLONG),
        Kind::Text => (UTF8MB4_GENERAL_CI, 1024, TYPE_VAR_STRING),
    };
    let mut p = Vec::new();
    for part in ["def", "", "", "", name, name] {
        put_lenenc_str(&mut p, part);
    }
    p.push(0x0c);
    p.extend_from_slice(&charset.to_le_bytes());
    p.extend_from_slice(&length.to_le_bytes());
    p.push(column_type);
    p.extend_from_slice(&0_u16.to_le_bytes());
    p.push(0);
    p.extend_from_slice(&[0, 0]);
    p
}

fn send_replies(wire: &mut Wire, replies: &[Reply]) -> io::Result<()> {
    for (i, reply) in replies.iter().enumerate() {
        let status = if i + 1 < replies.len() {
            STATUS_AUTOCOMMIT | STATUS_MORE_RESULTS
        } else {
            STATUS_AUTOCOMMIT
        };
        match reply {
            Reply::Ok {
                affected_rows,
                last_insert_id,
            } => wire.ok(*affected_rows, *last_insert_id, status)?,
            Reply::Rows { columns, rows } => {
                let mut count = Vec::new();
                put_lenenc_int(&mut count, columns.len() as u64);
                wire.write(&count)?;
                for (name, kind) in columns {
                    wire.write(&column_definition(name, *kind))?;
                }
                wire.eof(STATUS_AUTOCOMMIT)?;
                for row in rows {
                    let mut p = Vec::new();
                    for cell in row {
                        match cell {
                            Some(text) => put_lenenc_str(&mut p, text),
                            None => p.push(0xfb),
                        }
                    }
                    wire.write(&p)?;
                }
                wire.eof(status)?;
            }
            Reply::Error {
                code,
                sqlstate,
                message,
            } => return wire.err(*code, sqlstate, message),
        }
    }
    Ok(())
}

fn serve(stream: TcpStream, id: u32, script: &Script, log: &Mutex<Vec<String>>) -> io::Result<()> {
    stream.set_nodelay(true)?;
    let mut wire = Wire { stream, seq: 0 };

    wire.write(&handshake(id))?;
    let _response = wire.read()?;
    wire.ok(0, 0, STATUS_AUTOCOMMIT)?;

    loop {
        let packet = wire.read()?;
        match packet.first().copied() {
            Some(COM_QUIT) | None => return Ok(()),
            Some(COM_QUERY) => {
                let sql = String::from_utf8_lossy(&packet[1..]).into_owned();
                log.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(sql.clone());
                let replies = script(&sql);
                send_replies(&mut wire, &replies)?;
            }
            Some(COM_STMT_CLOSE) => {}
            // COM_PING, COM_RESET_CONNECTION and anything else.
            Some(_) => wire.ok(0, 0, STATUS_AUTOCOMMIT)?,
        }
    }
}
