//! Mock SMTP server for exercising the envelope dialog.
//!
//! Supports per-command reply codes, a recipient policy that can accept
//! everything (catch-all behavior) or only one named mailbox, and
//! connection/command capture for assertions.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;

/// How the server answers `RCPT TO`.
#[derive(Debug, Clone)]
pub enum RcptPolicy {
    /// The same reply for every recipient.
    Fixed { code: u16, message: String },
    /// 250 for exactly one mailbox, 550 for everything else. Models a
    /// discriminating (non-catch-all) domain.
    AcceptOnly { mailbox: String },
}

#[derive(Debug, Clone)]
struct MockServerConfig {
    greeting_code: u16,
    greeting_message: String,
    helo_code: u16,
    mail_from_code: u16,
    rcpt_policy: RcptPolicy,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting_code: 220,
            greeting_message: "mock ESMTP".to_string(),
            helo_code: 250,
            mail_from_code: 250,
            rcpt_policy: RcptPolicy::Fixed {
                code: 250,
                message: String::new(),
            },
        }
    }
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<RwLock<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockServerConfig::default(),
        }
    }

    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Every command line received, across all connections, in order.
    pub async fn commands(&self) -> Vec<String> {
        self.commands.read().await.clone()
    }

    /// Number of connections accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle_client(
        mut stream: TcpStream,
        config: MockServerConfig,
        commands: Arc<RwLock<Vec<String>>>,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer
            .write_all(
                format!("{} {}\r\n", config.greeting_code, config.greeting_message).as_bytes(),
            )
            .await?;
        writer.flush().await?;

        loop {
            line.clear();
            let read = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await;
            let Ok(Ok(n)) = read else { return Ok(()) };
            if n == 0 {
                return Ok(());
            }

            let cmd_line = line.trim_end().to_string();
            commands.write().await.push(cmd_line.clone());

            let upper = cmd_line.to_uppercase();
            let reply = if upper.starts_with("HELO") || upper.starts_with("EHLO") {
                format!("{} Hello\r\n", config.helo_code)
            } else if upper.starts_with("MAIL") {
                format!("{} OK\r\n", config.mail_from_code)
            } else if upper.starts_with("RCPT") {
                let recipient = extract_angle_addr(&cmd_line);
                match &config.rcpt_policy {
                    RcptPolicy::Fixed { code, message } => {
                        if message.is_empty() {
                            format!("{code}\r\n")
                        } else {
                            format!("{code} {message}\r\n")
                        }
                    }
                    RcptPolicy::AcceptOnly { mailbox } => {
                        if recipient.as_deref() == Some(mailbox.as_str()) {
                            "250 OK\r\n".to_string()
                        } else {
                            "550 No such user\r\n".to_string()
                        }
                    }
                }
            } else if upper.starts_with("QUIT") {
                writer.write_all(b"221 Bye\r\n").await?;
                writer.flush().await?;
                return Ok(());
            } else {
                "500 Unknown command\r\n".to_string()
            };

            writer.write_all(reply.as_bytes()).await?;
            writer.flush().await?;
        }
    }
}

fn extract_angle_addr(line: &str) -> Option<String> {
    let start = line.find('<')? + 1;
    let end = line.find('>')?;
    (start <= end).then(|| line[start..end].to_string())
}

pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting_code = code;
        self.config.greeting_message = message.into();
        self
    }

    pub fn with_helo_code(mut self, code: u16) -> Self {
        self.config.helo_code = code;
        self
    }

    pub fn with_mail_from_code(mut self, code: u16) -> Self {
        self.config.mail_from_code = code;
        self
    }

    pub fn with_rcpt_reply(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_policy = RcptPolicy::Fixed {
            code,
            message: message.into(),
        };
        self
    }

    /// Only `mailbox` gets 250; everything else bounces with 550. The
    /// catch-all probe's random recipient therefore gets rejected.
    pub fn accepting_only(mut self, mailbox: impl Into<String>) -> Self {
        self.config.rcpt_policy = RcptPolicy::AcceptOnly {
            mailbox: mailbox.into(),
        };
        self
    }

    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let commands = Arc::new(RwLock::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(AtomicBool::new(false));

        let config = self.config;
        let commands_task = Arc::clone(&commands);
        let connections_task = Arc::clone(&connections);
        let shutdown_task = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if shutdown_task.load(Ordering::Relaxed) {
                    break;
                }
                let accepted = timeout(Duration::from_millis(100), listener.accept()).await;
                if let Ok(Ok((stream, _peer))) = accepted {
                    connections_task.fetch_add(1, Ordering::Relaxed);
                    let config = config.clone();
                    let commands = Arc::clone(&commands_task);
                    tokio::spawn(async move {
                        let _ = MockSmtpServer::handle_client(stream, config, commands).await;
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands,
            connections,
            shutdown,
        })
    }
}
