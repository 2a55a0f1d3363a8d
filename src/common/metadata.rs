//! Call metadata carried alongside uploads
//!
//! Clients tag upload calls with `client-ip`/`client-port`. The node does not
//! act on them; it forwards them when it notifies the coordinator so the
//! notification can be traced back to the originating client.

use tonic::metadata::{Ascii, MetadataMap, MetadataValue};

pub const CLIENT_IP_KEY: &str = "client-ip";
pub const CLIENT_PORT_KEY: &str = "client-port";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOrigin {
    pub client_ip: Option<String>,
    pub client_port: Option<String>,
}

impl CallOrigin {
    pub fn new(client_ip: impl Into<String>, client_port: impl Into<String>) -> Self {
        Self {
            client_ip: Some(client_ip.into()),
            client_port: Some(client_port.into()),
        }
    }

    /// Read the origin from incoming call metadata. Repeated values are joined with `,`.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        Self {
            client_ip: joined(metadata, CLIENT_IP_KEY),
            client_port: joined(metadata, CLIENT_PORT_KEY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.client_ip.is_none() && self.client_port.is_none()
    }

    /// Attach the origin to outgoing call metadata
    pub fn apply(&self, metadata: &mut MetadataMap) {
        for (key, value) in [
            (CLIENT_IP_KEY, &self.client_ip),
            (CLIENT_PORT_KEY, &self.client_port),
        ] {
            let Some(value) = value else { continue };
            match value.parse::<MetadataValue<Ascii>>() {
                Ok(value) => {
                    metadata.insert(key, value);
                }
                Err(_) => tracing::debug!("Dropping unencodable {} metadata: {:?}", key, value),
            }
        }
    }
}

fn joined(metadata: &MetadataMap, key: &str) -> Option<String> {
    let values: Vec<&str> = metadata
        .get_all(key)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    (!values.is_empty()).then(|| values.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_metadata() {
        let origin = CallOrigin::new("192.168.1.20", "41000");
        let mut metadata = MetadataMap::new();
        origin.apply(&mut metadata);

        assert_eq!(CallOrigin::from_metadata(&metadata), origin);
    }

    #[test]
    fn test_missing_metadata() {
        let origin = CallOrigin::from_metadata(&MetadataMap::new());
        assert!(origin.is_empty());

        let mut metadata = MetadataMap::new();
        origin.apply(&mut metadata);
        assert!(metadata.is_empty());
    }

    #[test]
    fn test_repeated_values_are_joined() {
        let mut metadata = MetadataMap::new();
        metadata.append(CLIENT_IP_KEY, "10.0.0.1".parse().unwrap());
        metadata.append(CLIENT_IP_KEY, "10.0.0.2".parse().unwrap());

        let origin = CallOrigin::from_metadata(&metadata);
        assert_eq!(origin.client_ip.as_deref(), Some("10.0.0.1,10.0.0.2"));
        assert_eq!(origin.client_port, None);
    }
}
