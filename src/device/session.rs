use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::device::device::{Device, DeviceAction, DeviceError, DeviceSnapshot};

/// Request sent to the driver over stdin (one JSON line).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DriverRequest {
    Snapshot {
        cmd: &'static str,
    },
    Action {
        cmd: &'static str,
        #[serde(flatten)]
        action: DeviceAction,
    },
    Quit {
        cmd: &'static str,
    },
}

impl DriverRequest {
    pub fn snapshot() -> Self {
        DriverRequest::Snapshot { cmd: "snapshot" }
    }

    pub fn action(action: &DeviceAction) -> Self {
        DriverRequest::Action {
            cmd: "action",
            action: action.clone(),
        }
    }

    pub fn quit() -> Self {
        DriverRequest::Quit { cmd: "quit" }
    }
}

/// Response received from the driver over stdout (one JSON line).
#[derive(Debug, Deserialize)]
pub struct DriverResponse {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub ready: Option<bool>,
}

/// A device driven by a long-lived driver process speaking NDJSON.
///
/// The driver prints `{"ok":true,"ready":true}` once connected, then answers
/// one response line per request line.
pub struct DeviceSession {
    program: String,
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
}

impl DeviceSession {
    /// Spawns the driver and waits for its ready signal.
    pub fn launch(program: &str, args: &[String]) -> Result<Self, DeviceError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| DeviceError::Spawn {
                program: program.to_string(),
                source: e,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            DeviceError::SessionIO(format!("failed to capture stdin of {}", program))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            DeviceError::SessionIO(format!("failed to capture stdout of {}", program))
        })?;

        let mut session = DeviceSession {
            program: program.to_string(),
            child,
            stdin,
            reader: BufReader::new(stdout),
        };

        let response = session.read_response("ready signal")?;
        if !response.ok || response.ready != Some(true) {
            return Err(DeviceError::Protocol {
                command: "launch".into(),
                error: format!("did not receive a ready signal from {}", program),
            });
        }

        debug!(program, "device driver ready");
        Ok(session)
    }

    fn read_response(&mut self, context: &str) -> Result<DriverResponse, DeviceError> {
        let mut line = String::new();
        self.reader.read_line(&mut line).map_err(|e| {
            DeviceError::SessionIO(format!("failed to read from {}: {}", self.program, e))
        })?;

        if line.trim().is_empty() {
            return Err(DeviceError::SessionIO(format!(
                "empty response from {} (process may have died)",
                self.program
            )));
        }

        serde_json::from_str(line.trim()).map_err(|e| DeviceError::Json {
            context: context.to_string(),
            source: e,
        })
    }

    fn send(&mut self, request: &DriverRequest) -> Result<DriverResponse, DeviceError> {
        let json = serde_json::to_string(request).map_err(|e| DeviceError::Json {
            context: "DriverRequest".into(),
            source: e,
        })?;

        writeln!(self.stdin, "{}", json).map_err(|e| {
            DeviceError::SessionIO(format!("failed to write to {}: {}", self.program, e))
        })?;
        self.stdin.flush().map_err(|e| {
            DeviceError::SessionIO(format!("failed to flush {}: {}", self.program, e))
        })?;

        self.read_response("driver response")
    }

    fn send_ok(
        &mut self,
        request: &DriverRequest,
        command: &str,
    ) -> Result<DriverResponse, DeviceError> {
        let response = self.send(request)?;
        if !response.ok {
            return Err(DeviceError::Protocol {
                command: command.into(),
                error: response.error.unwrap_or_else(|| "unknown error".into()),
            });
        }
        Ok(response)
    }

    pub fn quit(&mut self) -> Result<(), DeviceError> {
        // Best effort: the driver may already be gone.
        let _ = self.send(&DriverRequest::quit());
        let _ = self.child.wait();
        Ok(())
    }
}

impl Device for DeviceSession {
    fn snapshot(&mut self) -> Result<DeviceSnapshot, DeviceError> {
        let response = self.send_ok(&DriverRequest::snapshot(), "snapshot")?;
        let data = response.data.ok_or_else(|| DeviceError::Protocol {
            command: "snapshot".into(),
            error: "no data in snapshot response".into(),
        })?;
        serde_json::from_value(data).map_err(|e| DeviceError::Json {
            context: "snapshot data".into(),
            source: e,
        })
    }

    fn perform(&mut self, action: &DeviceAction) -> Result<(), DeviceError> {
        self.send_ok(&DriverRequest::action(action), action.name())?;
        Ok(())
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        let _ = self.quit();
    }
}
