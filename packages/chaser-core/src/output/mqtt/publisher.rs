//! Publisher seam between the bridge and the MQTT client.
//!
//! The bridge publishes fire-and-forget (QoS 0, no ack wait); a full request
//! queue or a disconnected client just drops the send — the next push or
//! reconnect replay supplies fresh state.

use rumqttc::{AsyncClient, QoS};

/// Non-blocking publish/subscribe operations, injectable for tests.
pub trait MqttPublisher: Send + Sync {
    /// Publishes a payload; `retain` marks it for broker retention.
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool);

    /// Subscribes to a topic filter.
    fn subscribe(&self, topic: &str);
}

/// Publisher backed by a rumqttc [`AsyncClient`].
pub struct RumqttcPublisher {
    client: AsyncClient,
}

impl RumqttcPublisher {
    /// Wraps an async client.
    #[must_use]
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

impl MqttPublisher for RumqttcPublisher {
    fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool) {
        if let Err(err) = self
            .client
            .try_publish(topic, QoS::AtMostOnce, retain, payload)
        {
            log::debug!("[Mqtt] Publish dropped for {topic}: {err}");
        }
    }

    fn subscribe(&self, topic: &str) {
        if let Err(err) = self.client.try_subscribe(topic, QoS::AtMostOnce) {
            log::warn!("[Mqtt] Subscribe failed for {topic}: {err}");
        }
    }
}

/// Splits a broker URL into host and port.
///
/// Accepts `mqtt://`, `tcp://`, or a bare `host[:port]`; the port defaults
/// to 1883.
#[must_use]
pub fn parse_broker_url(url: &str) -> (String, u16) {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);
    let stripped = stripped.trim_end_matches('/');
    match stripped.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host.to_string(), port),
            Err(_) => (stripped.to_string(), 1883),
        },
        None => (stripped.to_string(), 1883),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scheme_host_and_port() {
        assert_eq!(
            parse_broker_url("mqtt://10.0.0.2:1884"),
            ("10.0.0.2".to_string(), 1884)
        );
        assert_eq!(
            parse_broker_url("tcp://broker.local"),
            ("broker.local".to_string(), 1883)
        );
        assert_eq!(
            parse_broker_url("broker.local:9001/"),
            ("broker.local".to_string(), 9001)
        );
        assert_eq!(
            parse_broker_url("broker.local"),
            ("broker.local".to_string(), 1883)
        );
    }
}
