use serde::{Deserialize, Serialize};

/// The wire format of a job, unchanged across Resque-compatible producers and consumers:
/// `{"class": <string>, "args": [<raw json>, ...]}`. Extra keys survive a decode/re-encode
/// round trip but are never inspected by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub class: String,
    pub args: Vec<serde_json::Value>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Envelope {
    pub fn new(class: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Envelope {
            class: class.into(),
            args,
            ..Default::default()
        }
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A job popped from a queue: the envelope plus the name of the list it came from. Created by
/// the poller, consumed once by exactly one worker, then discarded.
#[derive(Debug, Clone)]
pub struct Job {
    pub queue: String,
    pub envelope: Envelope,
}
