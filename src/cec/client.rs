//! CEC adapter driven through libCEC's `cec-client` tool.
//!
//! The tool runs as a child process. Commands are written to its stdin, and
//! its stdout is read by a background task that turns log lines into raw
//! messages and traced inbound frames into commands, key presses and source
//! activations.

use super::decoder::{CecEvent, TrafficDecoder};
use super::{CecConnection, DeviceInfo, EventSenders, keys, scan};
use crate::config::CecConfig;
use crate::error::{BridgeError, Result};
use crate::message;
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex as SyncMutex;
use regex::Regex;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinHandle;

const OPEN_TIMEOUT: Duration = Duration::from_secs(30);
const SCAN_TIMEOUT: Duration = Duration::from_secs(30);
const EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// ERROR, WARNING, NOTICE and TRAFFIC levels.
const LOG_LEVEL_MASK: &str = "15";

const READY_MARKER: &str = "waiting for input";
const OPEN_FAILED_MARKER: &str = "unable to open the device";

/// `TRAFFIC: [             377]\t>> 1f:84:10:00:01`
static LOG_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ERROR|WARNING|NOTICE|TRAFFIC|DEBUG|LOG):\s*\[\s*\d+\]\s*(.*)$")
        .expect("log line pattern is a valid regex")
});

/// Strip the level and timestamp from a `cec-client` log line.
fn log_text(line: &str) -> Option<&str> {
    LOG_LINE
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|text| text.as_str())
}

/// Collects the bus report printed in response to `scan`.
struct ScanRequest {
    collecting: bool,
    lines: Vec<String>,
    done: Option<oneshot::Sender<Vec<String>>>,
}

impl ScanRequest {
    fn new(done: oneshot::Sender<Vec<String>>) -> Self {
        Self {
            collecting: false,
            lines: Vec::new(),
            done: Some(done),
        }
    }

    /// Feed one output line. Returns true once the report is complete.
    fn feed(&mut self, line: &str) -> bool {
        if line == "CEC bus information" {
            self.collecting = true;
        }
        if !self.collecting {
            return false;
        }
        if line.starts_with("currently active source") {
            if let Some(done) = self.done.take() {
                let _ = done.send(std::mem::take(&mut self.lines));
            }
            return true;
        }
        self.lines.push(line.to_string());
        false
    }
}

type PendingScan = Arc<SyncMutex<Option<ScanRequest>>>;

/// A CEC adapter opened through `cec-client`.
pub struct CecClient {
    port: String,
    logical_address: u8,
    stdin: AsyncMutex<ChildStdin>,
    child: AsyncMutex<Child>,
    pending_scan: PendingScan,
    reader: JoinHandle<()>,
}

impl CecClient {
    /// Start `cec-client` on the configured port and wait until it is ready.
    pub async fn open(config: &CecConfig, senders: EventSenders) -> Result<Self> {
        info!(
            "[CEC] Initializing CEC connection: {} {}",
            config.port, config.device_name
        );

        let open_failed = |reason: String| BridgeError::CecOpenFailed {
            port: config.port.clone(),
            reason,
        };

        let mut child = Command::new(&config.client_binary)
            .args(["-t", "r", "-d", LOG_LEVEL_MASK, "-o"])
            .arg(&config.device_name)
            .arg(&config.port)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| open_failed(format!("failed to start {}: {}", config.client_binary, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| open_failed("stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| open_failed("stdout not captured".to_string()))?;

        let pending_scan: PendingScan = Arc::new(SyncMutex::new(None));
        let (ready_tx, ready_rx) = oneshot::channel();
        let reader = tokio::spawn(read_output(
            stdout,
            senders,
            pending_scan.clone(),
            Some(ready_tx),
        ));

        let ready = match tokio::time::timeout(OPEN_TIMEOUT, ready_rx).await {
            Ok(Ok(ready)) => ready,
            Ok(Err(_)) => Err("cec-client exited during startup".to_string()),
            Err(_) => Err(format!(
                "no response within {} seconds",
                OPEN_TIMEOUT.as_secs()
            )),
        };
        if let Err(reason) = ready {
            reader.abort();
            return Err(open_failed(reason));
        }

        info!("[CEC] CEC connection opened");
        Ok(Self {
            port: config.port.clone(),
            logical_address: config.logical_address & 0x0F,
            stdin: AsyncMutex::new(stdin),
            child: AsyncMutex::new(child),
            pending_scan,
            reader,
        })
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        debug!("[CEC] > {}", line);
        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(|e| BridgeError::CecTransmitFailed(e.to_string()))?;
        stdin
            .flush()
            .await
            .map_err(|e| BridgeError::CecTransmitFailed(e.to_string()))
    }
}

#[async_trait]
impl CecConnection for CecClient {
    async fn list(&self) -> Result<HashMap<String, DeviceInfo>> {
        let (done_tx, done_rx) = oneshot::channel();
        *self.pending_scan.lock() = Some(ScanRequest::new(done_tx));
        self.write_line("scan").await?;

        let lines = tokio::time::timeout(SCAN_TIMEOUT, done_rx)
            .await
            .map_err(|_| BridgeError::CecScanTimeout(SCAN_TIMEOUT.as_secs()))?
            .map_err(|_| BridgeError::CecConnectionClosed)?;
        Ok(scan::parse_report(&lines))
    }

    async fn transmit(&self, command: &str) -> Result<()> {
        self.write_line(&format!("tx {}", command.trim())).await
    }

    async fn key(&self, address: u8, key: &str) -> Result<()> {
        let key_code = keys::parse_key(key)?;
        let header = (self.logical_address << 4) | (address & 0x0F);
        self.write_line(&format!("tx {:02X}:44:{:02X}", header, key_code))
            .await?;
        self.write_line(&format!("tx {:02X}:45", header)).await
    }

    async fn destroy(&self) -> Result<()> {
        info!("[CEC] Closing CEC connection on {}", self.port);
        if let Err(e) = self.write_line("q").await {
            debug!("[CEC] Could not ask cec-client to quit: {}", e);
        }

        let mut child = self.child.lock().await;
        match tokio::time::timeout(EXIT_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => debug!("[CEC] cec-client exited with {}", status),
            Ok(Err(e)) => warn!("[CEC] Failed to wait for cec-client: {}", e),
            Err(_) => {
                warn!("[CEC] cec-client did not exit, killing it");
                child.kill().await?;
            }
        }
        self.reader.abort();
        Ok(())
    }
}

/// Read `cec-client` output until the process closes stdout.
async fn read_output(
    stdout: ChildStdout,
    senders: EventSenders,
    pending_scan: PendingScan,
    mut ready: Option<oneshot::Sender<std::result::Result<(), String>>>,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut decoder = TrafficDecoder::default();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("[CEC] Failed to read cec-client output: {}", e);
                break;
            }
        };

        if ready.is_some() {
            if line.contains(READY_MARKER) {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
            } else if line.contains(OPEN_FAILED_MARKER) {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(line.trim().to_string()));
                }
            }
        }

        {
            let mut scan = pending_scan.lock();
            if let Some(request) = scan.as_mut()
                && request.feed(line.trim())
            {
                *scan = None;
            }
        }

        let Some(text) = log_text(&line) else {
            continue;
        };
        if let Some(traffic) = message::classify(text) {
            for event in decoder.decode(&traffic, Instant::now()) {
                match event {
                    CecEvent::Command(command) => senders.command(command),
                    CecEvent::KeyPress(key_press) => senders.key_press(key_press),
                    CecEvent::SourceActivation(activation) => {
                        senders.source_activation(activation)
                    }
                }
            }
        }
        senders.message(text.to_string());
    }

    info!("[CEC] cec-client output closed");
}
