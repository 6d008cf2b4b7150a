//! gRPC channel construction from string keyed registration options.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use http::Uri;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, warn};

use crate::error::{BridgeError, BridgeResult};

/// How the channel negotiates its transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NegotiationType {
    #[default]
    Plaintext,
    Tls,
}

/// Channel settings parsed from registration options.
///
/// Keys are camelCase, e.g. `keepAliveTime: 30s`. Retry, hedging and buffer
/// limit settings are accepted but have no tonic counterpart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcChannelOptions {
    pub negotiation_type: NegotiationType,
    pub max_inbound_message_size: Option<usize>,
    pub max_inbound_metadata_size: Option<u32>,
    pub keep_alive_time: Option<Duration>,
    pub keep_alive_timeout: Option<Duration>,
    pub keep_alive_without_calls: Option<bool>,
    pub idle_timeout: Option<Duration>,
    pub flow_control_window: Option<u32>,
    pub initial_flow_control_window: Option<u32>,
    pub override_authority: Option<String>,
}

const UNSUPPORTED_OPTIONS: &[&str] = &[
    "enableRetry",
    "maxRetryAttempts",
    "maxHedgedAttempts",
    "retryBufferSize",
    "perRpcBufferLimit",
];

impl GrpcChannelOptions {
    pub fn parse(options: &HashMap<String, String>) -> BridgeResult<Self> {
        let mut parsed = Self::default();
        for (key, value) in options {
            let value = value.trim();
            match key.as_str() {
                "negotiationType" => {
                    parsed.negotiation_type = match value.to_ascii_lowercase().as_str() {
                        "plaintext" => NegotiationType::Plaintext,
                        "tls" => NegotiationType::Tls,
                        _ => return Err(invalid(key, "expected 'plaintext' or 'tls'")),
                    }
                }
                "maxInboundMessageSize" => {
                    parsed.max_inbound_message_size = Some(parse_number(key, value)?)
                }
                "maxInboundMetadataSize" => {
                    parsed.max_inbound_metadata_size = Some(parse_number(key, value)?)
                }
                "keepAliveTime" => parsed.keep_alive_time = Some(parse_duration(key, value)?),
                "keepAliveTimeout" => parsed.keep_alive_timeout = Some(parse_duration(key, value)?),
                "keepAliveWithoutCalls" => {
                    parsed.keep_alive_without_calls = Some(parse_bool(key, value)?)
                }
                "idleTimeout" => parsed.idle_timeout = Some(parse_duration(key, value)?),
                "flowControlWindow" => parsed.flow_control_window = Some(parse_number(key, value)?),
                "initialFlowControlWindow" => {
                    parsed.initial_flow_control_window = Some(parse_number(key, value)?)
                }
                "overrideAuthority" => parsed.override_authority = Some(value.to_string()),
                unsupported if UNSUPPORTED_OPTIONS.contains(&unsupported) => {
                    debug!(option = %key, value = %value, "Channel option has no effect on tonic channels");
                }
                _ => warn!(option = %key, "Ignoring unknown channel option"),
            }
        }
        Ok(parsed)
    }

    /// Build an endpoint for `target`. Accepts `host:port`, `dns:///host:port`,
    /// `grpc://`, `http://` and `https://` forms.
    pub fn endpoint(&self, target: &str) -> BridgeResult<Endpoint> {
        let uri = self.normalize_target(target);
        let mut endpoint = Endpoint::from_shared(uri)?;

        if let Some(interval) = self.keep_alive_time {
            endpoint = endpoint.http2_keep_alive_interval(interval);
        }
        if let Some(timeout) = self.keep_alive_timeout {
            endpoint = endpoint.keep_alive_timeout(timeout);
        }
        if let Some(idle) = self.keep_alive_without_calls {
            endpoint = endpoint.keep_alive_while_idle(idle);
        }
        if let Some(size) = self.max_inbound_metadata_size {
            endpoint = endpoint.http2_max_header_list_size(size);
        }
        if let Some(window) = self.flow_control_window {
            endpoint = endpoint.initial_connection_window_size(Some(window));
        }
        if let Some(window) = self.initial_flow_control_window {
            endpoint = endpoint.initial_stream_window_size(Some(window));
        }
        if self.idle_timeout.is_some() {
            debug!("idleTimeout is not supported by tonic channels, connections stay pooled");
        }
        if let Some(authority) = &self.override_authority {
            let origin: Uri = format!("{}://{}", self.scheme(), authority)
                .parse()
                .map_err(|e: http::uri::InvalidUri| invalid("overrideAuthority", &e.to_string()))?;
            endpoint = endpoint.origin(origin);
        }
        if self.negotiation_type == NegotiationType::Tls {
            let mut tls = ClientTlsConfig::new().with_native_roots();
            if let Some(authority) = &self.override_authority {
                let domain = authority.split(':').next().unwrap_or(authority);
                tls = tls.domain_name(domain);
            }
            endpoint = endpoint.tls_config(tls)?;
        }
        Ok(endpoint)
    }

    fn scheme(&self) -> &'static str {
        match self.negotiation_type {
            NegotiationType::Plaintext => "http",
            NegotiationType::Tls => "https",
        }
    }

    fn normalize_target(&self, target: &str) -> String {
        let target = target.trim();
        let target = target.strip_prefix("dns:///").unwrap_or(target);
        if let Some(addr) = target.strip_prefix("grpc://") {
            format!("http://{addr}")
        } else if let Some(addr) = target.strip_prefix("grpcs://") {
            format!("https://{addr}")
        } else if target.contains("://") {
            target.to_string()
        } else {
            format!("{}://{}", self.scheme(), target)
        }
    }
}

/// A lazily connecting channel plus the per-call limits taken from its options.
///
/// Clones share one closed flag: once any clone is closed, every clone refuses
/// new calls.
#[derive(Debug, Clone)]
pub struct BridgeChannel {
    channel: Channel,
    max_decoding_message_size: Option<usize>,
    closed: Arc<AtomicBool>,
}

impl BridgeChannel {
    /// Build a channel that connects on first use. Must run inside a tokio runtime.
    pub fn connect_lazy(target: &str, options: &GrpcChannelOptions) -> BridgeResult<Self> {
        let endpoint = options.endpoint(target)?;
        debug!(address = %target, "Creating lazy gRPC channel");
        Ok(Self {
            channel: endpoint.connect_lazy(),
            max_decoding_message_size: options.max_inbound_message_size,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            channel,
            max_decoding_message_size: None,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The underlying tonic channel, or [`BridgeError::ChannelClosed`] once closed.
    pub fn channel(&self) -> BridgeResult<Channel> {
        if self.is_closed() {
            return Err(BridgeError::ChannelClosed);
        }
        Ok(self.channel.clone())
    }

    /// Refuse further calls on this channel and all of its clones. The
    /// connection itself is released when the last clone is dropped.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed gRPC channel");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn max_decoding_message_size(&self) -> Option<usize> {
        self.max_decoding_message_size
    }
}

fn invalid(key: &str, reason: &str) -> BridgeError {
    BridgeError::InvalidChannelOption {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> BridgeResult<T> {
    value
        .parse()
        .map_err(|_| invalid(key, &format!("expected a non-negative integer, got '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> BridgeResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(invalid(key, &format!("expected true or false, got '{value}'"))),
    }
}

/// `500ms`, `30s`, `5m`, `1h`, or a bare number of milliseconds.
pub fn parse_duration(key: &str, value: &str) -> BridgeResult<Duration> {
    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "ms"),
    };
    let amount: u64 = digits
        .parse()
        .map_err(|_| invalid(key, &format!("invalid duration '{value}'")))?;
    match unit.trim() {
        "ms" => Ok(Duration::from_millis(amount)),
        "s" => Ok(Duration::from_secs(amount)),
        "m" => Ok(Duration::from_secs(amount.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(amount.saturating_mul(3600))),
        other => Err(invalid(key, &format!("unknown duration unit '{other}'"))),
    }
}
