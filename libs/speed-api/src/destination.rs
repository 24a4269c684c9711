use std::fmt;
use std::str::FromStr;

/// Port used when the host segment carries none.
pub const DEFAULT_PORT: u16 = 27017;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationError {
    #[error("Specify destination like host[:port]/db/collection")]
    Shape,

    #[error("invalid port '{0}' (specify destination like host[:port]/db/collection)")]
    Port(String),
}

/// Target collection: `host[:port]/database/collection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub collection: String,
}

impl Destination {
    /// `database.collection`, the server-side namespace.
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}

impl FromStr for Destination {
    type Err = DestinationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.matches('/').count() != 2 {
            return Err(DestinationError::Shape);
        }

        let mut parts = s.splitn(3, '/');
        let (Some(host), Some(database), Some(collection)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DestinationError::Shape);
        };

        let (host, port) = match host.split_once(':') {
            Some((h, p)) => {
                let port = p.parse::<u16>().map_err(|_| DestinationError::Port(p.to_string()))?;
                (h, port)
            }
            None => (host, DEFAULT_PORT),
        };

        if host.is_empty() || database.is_empty() || collection.is_empty() {
            return Err(DestinationError::Shape);
        }

        Ok(Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
            collection: collection.to_string(),
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}/{}", self.host, self.port, self.database, self.collection)
    }
}
