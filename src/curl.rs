use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use zeroize::Zeroizing;

use crate::client::MailboxClient;
use crate::error::{MailbotError, Result};

/// Mailbox client backed by the `curl` executable. Credentials reach curl
/// through a config file on stdin, never through argv.
pub struct CurlClient {
    url: String,
    login: String,
    password: Zeroizing<String>,
    verbose: bool,
}

impl CurlClient {
    pub fn new(url: &str, login: &str, password: Zeroizing<String>, verbose: bool) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            login: login.to_string(),
            password,
            verbose,
        }
    }

    fn perform(&self, url: &str, request: Option<&str>) -> Result<Vec<u8>> {
        let mut cmd = Command::new("curl");
        cmd.args(["--silent", "--show-error", "--ssl-reqd", "--config", "-"]);
        if self.verbose {
            cmd.arg("--verbose");
        }
        if let Some(req) = request {
            cmd.args(["--request", req]);
        }
        cmd.arg(url)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let label = request.unwrap_or(url);
        tracing::debug!(request = label, "curl");

        let mut child = cmd
            .spawn()
            .map_err(|e| MailbotError::Transport(format!("cannot start curl: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            let config = Zeroizing::new(format!(
                "user = \"{}:{}\"\n",
                quote_config(&self.login),
                quote_config(&self.password)
            ));
            stdin
                .write_all(config.as_bytes())
                .map_err(|e| MailbotError::Transport(format!("curl stdin: {e}")))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| MailbotError::Transport(format!("curl: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MailbotError::Transport(format!(
                "curl {label}: {}",
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

fn quote_config(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

// ---------------------------------------------------------------------------
// Request lines and URLs
// ---------------------------------------------------------------------------

fn search_request(query: &str) -> String {
    format!("UID SEARCH {query}")
}

/// `count` ids from `start`, both ends inclusive.
fn fetch_range_request(start: u64, count: u64) -> String {
    let end = start + count.saturating_sub(1);
    format!("UID FETCH {start}:{end} (UID)")
}

fn store_deleted_request(uid: u64) -> String {
    format!("UID STORE {uid} +FLAGS \\Deleted")
}

const EXPUNGE_REQUEST: &str = "EXPUNGE";

fn body_url(folder_url: &str, uid: u64) -> String {
    format!("{folder_url};UID={uid}")
}

/// `imaps://host/INBOX` to `imaps://host/`; a plain GET there lists every
/// folder of the account.
fn account_url(folder_url: &str) -> String {
    match folder_url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or(rest);
            format!("{scheme}://{host}/")
        }
        None => format!("{}/", folder_url.trim_end_matches('/')),
    }
}

impl MailboxClient for CurlClient {
    fn search(&mut self, query: &str) -> Result<Vec<u8>> {
        self.perform(&self.url, Some(&search_request(query)))
    }

    fn fetch_range(&mut self, start: u64, count: u64) -> Result<Vec<u8>> {
        self.perform(&self.url, Some(&fetch_range_request(start, count)))
    }

    fn fetch_body(&mut self, uid: u64) -> Result<Vec<u8>> {
        self.perform(&body_url(&self.url, uid), None)
    }

    fn store_deleted(&mut self, uid: u64) -> Result<()> {
        self.perform(&self.url, Some(&store_deleted_request(uid)))?;
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        self.perform(&self.url, Some(EXPUNGE_REQUEST))?;
        Ok(())
    }

    fn list_folders(&mut self) -> Result<Vec<u8>> {
        self.perform(&account_url(&self.url), None)
    }
}

/// Resolve a password entry: `<cache_dir>/<entry>.txt` when it exists,
/// otherwise the first line printed by `pass <entry>`.
pub fn resolve_password(cache_dir: &Path, entry: &str) -> Result<Zeroizing<String>> {
    let file = cache_dir.join(format!("{entry}.txt"));
    let raw = if file.exists() {
        Zeroizing::new(std::fs::read_to_string(&file)?)
    } else {
        let mut child = Command::new("pass")
            .arg(entry)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| MailbotError::Config(format!("cannot start password manager: {e}")))?;
        let mut out = Zeroizing::new(String::new());
        if let Some(mut stdout) = child.stdout.take() {
            stdout.read_to_string(&mut out)?;
        }
        let status = child.wait()?;
        if !status.success() {
            return Err(MailbotError::Config(format!(
                "pass {entry} exited with {status}"
            )));
        }
        out
    };

    let password = Zeroizing::new(raw.lines().next().unwrap_or("").to_string());
    if password.is_empty() {
        return Err(MailbotError::Config(format!(
            "password is empty for {entry} entry"
        )));
    }
    Ok(password)
}
