use thiserror::Error;

/// Baud rate used when a serial address does not name one.
pub const DEFAULT_SERIAL_BAUD: u32 = 115_200;

const NATIVE_PREFIXES: &[&str] = &["udpin:", "udpout:", "udpbcast:", "tcpin:", "tcpout:"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("empty connection string")]
    Empty,

    #[error("expected host:port in {0:?}")]
    HostPort(String),

    #[error("invalid baud rate in {0:?}")]
    Baud(String),

    #[error("unsupported connection string {0:?}")]
    Unsupported(String),
}

/// Where the vehicle's MAVLink stream comes from.
///
/// Accepts the short forms ground-station tools use (`udp:0.0.0.0:14550`
/// listens, `tcp:host:5760` connects, a bare `/dev/ttyUSB0` or `COM3` is a
/// serial port) as well as the mavlink crate's own `udpin:`/`tcpout:`/...
/// syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAddress {
    Serial { device: String, baud: u32 },
    Network(String),
}

impl ConnectionAddress {
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        if let Some(rest) = s.strip_prefix("udp:") {
            check_host_port(rest)?;
            return Ok(Self::Network(format!("udpin:{}", rest)));
        }
        if let Some(rest) = s.strip_prefix("tcp:") {
            check_host_port(rest)?;
            return Ok(Self::Network(format!("tcpout:{}", rest)));
        }
        for prefix in NATIVE_PREFIXES {
            if let Some(rest) = s.strip_prefix(prefix) {
                check_host_port(rest)?;
                return Ok(Self::Network(s.to_string()));
            }
        }
        if let Some(rest) = s.strip_prefix("serial:") {
            return parse_serial(rest);
        }

        let looks_serial = s.starts_with('/')
            || s.get(..3).map_or(false, |p| p.eq_ignore_ascii_case("com"));
        if looks_serial {
            return parse_serial(s);
        }

        Err(AddressError::Unsupported(s.to_string()))
    }

    /// Connection string in the mavlink crate's URL syntax.
    pub fn to_mavlink_url(&self) -> String {
        match self {
            Self::Serial { device, baud } => format!("serial:{}:{}", device, baud),
            Self::Network(url) => url.clone(),
        }
    }
}

impl std::fmt::Display for ConnectionAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_mavlink_url())
    }
}

fn check_host_port(s: &str) -> Result<(), AddressError> {
    match s.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
        _ => Err(AddressError::HostPort(s.to_string())),
    }
}

// device[:baud] or device[,baud]
fn parse_serial(s: &str) -> Result<ConnectionAddress, AddressError> {
    let split = s.rsplit_once(',').or_else(|| s.rsplit_once(':'));
    let (device, baud) = match split {
        Some((device, baud)) => {
            let baud = baud
                .parse::<u32>()
                .map_err(|_| AddressError::Baud(s.to_string()))?;
            (device, baud)
        }
        None => (s, DEFAULT_SERIAL_BAUD),
    };
    if device.is_empty() || baud == 0 {
        return Err(AddressError::Baud(s.to_string()));
    }
    Ok(ConnectionAddress::Serial {
        device: device.to_string(),
        baud,
    })
}
