//! Publish/subscribe boundary to the remote HRV scoring service.

use anyhow::{bail, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use pulse_lib::{
    metrics::hrv::{hrv_batch, HrvConfig},
    signal::PpiSeries,
};
use serde_json::{json, Value};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const REQUEST_TOPIC: &str = "kubios-request";
pub const RESPONSE_TOPIC: &str = "kubios-response";
pub const TELEMETRY_TOPIC: &str = "hr-data";
pub const PUBLISH_TOPICS: [&str; 2] = [REQUEST_TOPIC, TELEMETRY_TOPIC];

pub trait RemoteAnalysis {
    fn publish(&mut self, topic: &str, payload: &Value) -> Result<()>;
    /// Next decoded message on the response topic, if one has arrived.
    fn poll(&mut self) -> Option<Value>;
    fn is_connected(&self) -> bool;
}

/// Request body for an inter-beat-interval readiness analysis.
pub fn build_request(id: u64, ppi: &PpiSeries) -> Value {
    json!({
        "id": id,
        "type": "RRI",
        "data": ppi.ppi,
        "analysis": { "type": "readiness" },
    })
}

/// A response belongs to request `id` unless it names a different one.
pub fn correlates(response: &Value, id: u64) -> bool {
    match response.get("id") {
        None | Some(Value::Null) => true,
        Some(other) => other.as_u64() == Some(id),
    }
}

/// Fields extracted from `data.analysis`; absent fields stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RemoteFields {
    pub mean_ppi: Option<f64>,
    pub mean_hr: Option<f64>,
    pub sdnn: Option<f64>,
    pub rmssd: Option<f64>,
    pub sns: Option<f64>,
    pub pns: Option<f64>,
}

pub fn parse_response(response: &Value) -> RemoteFields {
    let analysis = response.pointer("/data/analysis");
    let field = |name: &str| analysis.and_then(|a| a.get(name)).and_then(Value::as_f64);
    RemoteFields {
        mean_ppi: field("mean_rr_ms"),
        mean_hr: field("mean_hr_bpm"),
        sdnn: field("sdnn_ms"),
        rmssd: field("rmssd_ms"),
        sns: field("sns_index"),
        pns: field("pns_index"),
    }
}

/// Stand-in for a device without a network link.
#[derive(Debug, Default)]
pub struct OfflineRemote;

impl RemoteAnalysis for OfflineRemote {
    fn publish(&mut self, topic: &str, _payload: &Value) -> Result<()> {
        bail!("no network link to publish on '{topic}'")
    }
    fn poll(&mut self) -> Option<Value> {
        None
    }
    fn is_connected(&self) -> bool {
        false
    }
}

/// In-process broker: the device side implements [`RemoteAnalysis`], the
/// [`BrokerPeer`] plays the service.
#[derive(Debug)]
pub struct ChannelBroker {
    outgoing: Sender<(String, Value)>,
    incoming: Receiver<(String, Value)>,
    connected: bool,
}

/// Service side of a [`ChannelBroker`].
#[derive(Debug, Clone)]
pub struct BrokerPeer {
    published: Receiver<(String, Value)>,
    responses: Sender<(String, Value)>,
}

impl ChannelBroker {
    pub fn new() -> (Self, BrokerPeer) {
        let (outgoing, published) = unbounded();
        let (responses, incoming) = unbounded();
        (
            Self {
                outgoing,
                incoming,
                connected: true,
            },
            BrokerPeer {
                published,
                responses,
            },
        )
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl RemoteAnalysis for ChannelBroker {
    fn publish(&mut self, topic: &str, payload: &Value) -> Result<()> {
        if !self.connected {
            bail!("broker disconnected");
        }
        if !PUBLISH_TOPICS.contains(&topic) {
            bail!("invalid topic '{topic}', expected one of {PUBLISH_TOPICS:?}");
        }
        self.outgoing
            .send((topic.to_string(), payload.clone()))
            .map_err(|_| anyhow::anyhow!("broker peer has gone away"))
    }

    /// Only messages on [`RESPONSE_TOPIC`] are delivered; anything else is discarded.
    fn poll(&mut self) -> Option<Value> {
        while let Ok((topic, payload)) = self.incoming.try_recv() {
            if topic == RESPONSE_TOPIC {
                return Some(payload);
            }
            debug!("not subscribed to '{topic}', dropping message");
        }
        None
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

impl BrokerPeer {
    /// Wait up to `timeout` for the next published message.
    pub fn next_published(&self, timeout: Duration) -> Option<(String, Value)> {
        self.published.recv_timeout(timeout).ok()
    }

    /// Deliver `payload` to the device on `topic`.
    pub fn send(&self, topic: &str, payload: Value) -> Result<()> {
        self.responses
            .send((topic.to_string(), payload))
            .map_err(|_| anyhow::anyhow!("device side has gone away"))
    }

    pub fn respond(&self, response: Value) -> Result<()> {
        self.send(RESPONSE_TOPIC, response)
    }

    /// Answer every request with a locally scored response until the device
    /// side drops its broker. Telemetry messages are logged and ignored.
    pub fn spawn_loopback(self, hrv_cfg: HrvConfig) -> JoinHandle<()> {
        thread::spawn(move || loop {
            match self.published.recv_timeout(Duration::from_millis(100)) {
                Ok((topic, payload)) if topic == REQUEST_TOPIC => {
                    match loopback_response(&payload, &hrv_cfg) {
                        Some(response) => {
                            if self.respond(response).is_err() {
                                break;
                            }
                        }
                        None => warn!("loopback could not score request"),
                    }
                }
                Ok((topic, _)) => debug!("loopback ignoring message on '{topic}'"),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        })
    }
}

/// Score a request the way the remote service would shape its answer.
///
/// The autonomic indices are z-score approximations against adult resting
/// norms (mean RR 926 ± 90 ms, RMSSD 42 ± 15 ms, HR 66 ± 6 BPM) and are only
/// meant for simulations.
pub fn loopback_response(request: &Value, hrv_cfg: &HrvConfig) -> Option<Value> {
    let ppi: Vec<f64> = request
        .get("data")?
        .as_array()?
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    let hrv = hrv_batch(&PpiSeries::new(ppi), hrv_cfg)?;
    let z = |v: f64, mean: f64, sd: f64| (v - mean) / sd;
    let pns = (z(hrv.mean_ppi, 926.0, 90.0) + z(hrv.rmssd, 42.0, 15.0)) / 2.0;
    let sns = (z(hrv.mean_hr, 66.0, 6.0) - z(hrv.rmssd, 42.0, 15.0)) / 2.0;
    Some(json!({
        "id": request.get("id").cloned().unwrap_or(Value::Null),
        "data": {
            "status": "ok",
            "analysis": {
                "type": "readiness",
                "mean_rr_ms": hrv.mean_ppi,
                "mean_hr_bpm": hrv.mean_hr,
                "sdnn_ms": hrv.sdnn,
                "rmssd_ms": hrv.rmssd,
                "pns_index": pns,
                "sns_index": sns,
            }
        }
    }))
}
