//! The minimal SMTP envelope dialog.
//!
//! Drives `220 → HELO → MAIL FROM → RCPT TO → QUIT` over one connection
//! and surfaces the RCPT reply for classification. `DATA` is never sent;
//! the dialog exists purely to learn whether the recipient is accepted.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

/// One parsed server reply: the three-digit code and the text after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub text: String,
}

/// Why a dialog could not reach its RCPT reply.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    /// Transport failure mid-dialog; maps to `smtp_code = 0`.
    #[error("{stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The server answered a pre-RCPT stage with an unexpected code.
    #[error("{stage} error: {text}")]
    Rejected {
        stage: &'static str,
        code: u16,
        text: String,
    },
}

impl DialogError {
    /// The reply code to persist for this failure; 0 when no reply was
    /// obtained at all.
    pub fn smtp_code(&self) -> u16 {
        match self {
            Self::Io { .. } => 0,
            Self::Rejected { code, .. } => *code,
        }
    }
}

/// A live envelope dialog over any byte stream.
pub struct SmtpSession<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpSession<S> {
    pub fn new(stream: S) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    /// Reads one full server reply, consuming `nnn-` continuation lines
    /// until the final `nnn<space>` line. The returned text is the final
    /// line's remainder, trimmed.
    pub async fn read_reply(&mut self, stage: &'static str) -> Result<SmtpReply, DialogError> {
        loop {
            let mut line = String::new();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .map_err(|source| DialogError::Io { stage, source })?;
            if n == 0 {
                return Err(DialogError::Io {
                    stage,
                    source: std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed by server",
                    ),
                });
            }

            let (code, is_final, text) = parse_reply_line(&line);
            if is_final {
                return Ok(SmtpReply { code, text });
            }
        }
    }

    async fn send(&mut self, stage: &'static str, command: &str) -> Result<(), DialogError> {
        self.writer
            .write_all(command.as_bytes())
            .await
            .map_err(|source| DialogError::Io { stage, source })
    }

    /// Sends a command and reads the reply, tagging failures with `stage`.
    pub async fn command(
        &mut self,
        stage: &'static str,
        command: &str,
    ) -> Result<SmtpReply, DialogError> {
        self.send(stage, command).await?;
        self.read_reply(stage).await
    }

    /// Runs the envelope up to and including `RCPT TO:<rcpt>` and returns
    /// the RCPT reply. Greeting, HELO and MAIL FROM must each come back
    /// with their expected code; anything else aborts the dialog.
    pub async fn run_envelope(
        &mut self,
        identity: &str,
        mail_from: &str,
        rcpt: &str,
    ) -> Result<SmtpReply, DialogError> {
        let greeting = self.read_reply("Server greeting").await?;
        expect(greeting, "Server greeting", 220)?;

        let helo = self.command("HELO", &format!("HELO {identity}\r\n")).await?;
        expect(helo, "HELO", 250)?;

        let mail = self
            .command("MAIL FROM", &format!("MAIL FROM:<{mail_from}>\r\n"))
            .await?;
        expect(mail, "MAIL FROM", 250)?;

        self.command("RCPT TO", &format!("RCPT TO:<{rcpt}>\r\n"))
            .await
    }

    /// Best-effort `QUIT`; the reply and any failure are discarded.
    pub async fn quit(&mut self) {
        if self.send("QUIT", "QUIT\r\n").await.is_ok() {
            let _ = self.read_reply("QUIT").await;
        }
    }
}

fn expect(reply: SmtpReply, stage: &'static str, want: u16) -> Result<(), DialogError> {
    if reply.code == want {
        Ok(())
    } else {
        Err(DialogError::Rejected {
            stage,
            code: reply.code,
            text: reply.text,
        })
    }
}

/// Splits one reply line into `(code, is_final, text)`. Lines too short
/// to carry a code yield code 0 and terminate the reply.
fn parse_reply_line(line: &str) -> (u16, bool, String) {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let Some(code_part) = trimmed.get(..3) else {
        return (0, true, trimmed.trim().to_string());
    };

    let code = code_part.parse::<u16>().unwrap_or(0);
    let is_final = trimmed.as_bytes().get(3) != Some(&b'-');
    let text = trimmed.get(4..).unwrap_or("").trim().to_string();
    (code, is_final, text)
}
