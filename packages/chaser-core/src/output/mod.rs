//! Output transports: Art-Net UDP and the MQTT bridge.

pub mod artnet;
pub mod mqtt;
