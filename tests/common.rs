#![allow(dead_code)]

use std::sync::Mutex;

use serde_json::{json, Value};
use tokio::sync::oneshot;
use water_compliance_client::client::AnalysisService;
use water_compliance_client::contract::{self, AnalysisResult};
use water_compliance_client::submission_error::SubmissionError;
use water_compliance_client::upload::SelectedFile;

type Outcome = Result<AnalysisResult, SubmissionError>;

/// One daily exceedance, no annual exceedance, falling trend.
pub fn sample_json() -> Value {
    json!({
        "average_kld": 12.5,
        "daily_exceed_count": 1,
        "daily_violation_details": [{"date": "2024-01-05", "value": 30}],
        "average_kly": 4000,
        "annual_exceed_count": 0,
        "annual_violation_details": [],
        "trend_slope": -0.02
    })
}

pub fn result_with_kld(average_kld: f64) -> AnalysisResult {
    let mut raw = sample_json();
    raw["average_kld"] = json!(average_kld);
    contract::validate(&raw).expect("fixture must satisfy the contract")
}

pub fn spreadsheet(name: &str) -> SelectedFile {
    SelectedFile::new(name, format!("contents of {name}").into_bytes())
        .expect("fixture must be a spreadsheet name")
}

struct PendingCall {
    file_name: String,
    reply: Option<oneshot::Sender<Outcome>>,
}

/// Analysis service whose requests stay pending until the test answers them,
/// so tests decide the order in which submissions resolve.
#[derive(Default)]
pub struct ControlledService {
    calls: Mutex<Vec<PendingCall>>,
}

impl ControlledService {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.file_name.clone())
            .collect()
    }

    /// Yield to the spawned request tasks until `n` calls have arrived.
    pub async fn wait_for_calls(&self, n: usize) {
        let wait = async {
            while self.call_count() < n {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .expect("timed out waiting for analysis calls");
    }

    /// Answer call `index`. Returns false when the caller already gave up on it.
    pub fn reply(&self, index: usize, outcome: Outcome) -> bool {
        let sender = self.calls.lock().unwrap()[index]
            .reply
            .take()
            .expect("call already answered");
        sender.send(outcome).is_ok()
    }

    pub fn is_abandoned(&self, index: usize) -> bool {
        self.calls.lock().unwrap()[index]
            .reply
            .as_ref()
            .map_or(true, |sender| sender.is_closed())
    }

    pub async fn wait_until_abandoned(&self, index: usize) {
        let wait = async {
            while !self.is_abandoned(index) {
                tokio::task::yield_now().await;
            }
        };
        tokio::time::timeout(std::time::Duration::from_secs(5), wait)
            .await
            .expect("request was never abandoned");
    }
}

impl AnalysisService for ControlledService {
    async fn analyze(&self, file: SelectedFile) -> Outcome {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(PendingCall {
            file_name: file.name().to_string(),
            reply: Some(tx),
        });

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(SubmissionError::TransportError("reply dropped".to_string())),
        }
    }
}
