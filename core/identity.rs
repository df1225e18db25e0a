use std::fmt;

/// A worker's stable identity for the lifetime of one `Start` call: `(hostname, pid, slot,
/// ordered queue list)`. Its `Display` form, `"{host}:{pid}-worker{slot}:{q1,q2,...}"`, is both
/// the `<ns>:workers` set member and the `Worker` field on every failed-job record, so both call
/// sites share this one formatter.
#[derive(Debug, Clone)]
pub struct WorkerIdentity {
    hostname: String,
    pid: u32,
    slot: u32,
    queues: Vec<String>,
}

impl WorkerIdentity {
    pub fn new(slot: u32, queues: Vec<String>) -> Self {
        WorkerIdentity {
            hostname: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            slot,
            queues,
        }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-worker{}:{}",
            self.hostname,
            self.pid,
            self.slot,
            self.queues.join(",")
        )
    }
}
