//! Device identifiers and address normalization

/// Runtime handle of the audio device, as understood by the actuator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a configured address should be handed to the actuator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAddress {
    /// Already a platform device id; no resolution needed
    Device(DeviceId),
    /// Bluetooth MAC in `AA:BB:CC:DD:EE:FF` form
    Mac(String),
}

impl DeviceAddress {
    /// Classify and normalize a configured address. Returns `None` for blank
    /// input.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(mac) = normalize_mac(raw) {
            return Some(DeviceAddress::Mac(mac));
        }
        Some(DeviceAddress::Device(DeviceId::new(raw)))
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceAddress::Device(id) => write!(f, "{}", id),
            DeviceAddress::Mac(mac) => f.write_str(mac),
        }
    }
}

/// `AA:BB:..`, `aa-bb-..` or twelve bare hex digits, to upper-case colon form
fn normalize_mac(raw: &str) -> Option<String> {
    if looks_like_device_path(raw) {
        return None;
    }

    let separated = raw.len() == 17
        && raw
            .char_indices()
            .all(|(i, c)| if i % 3 == 2 { c == ':' || c == '-' } else { c.is_ascii_hexdigit() });
    let compact = raw.len() == 12 && raw.chars().all(|c| c.is_ascii_hexdigit());
    if !separated && !compact {
        return None;
    }

    let digits: Vec<char> = raw
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let pairs: Vec<String> = digits.chunks(2).map(|pair| pair.iter().collect()).collect();
    Some(pairs.join(":"))
}

fn looks_like_device_path(raw: &str) -> bool {
    raw.contains('\\') || raw.contains('#') || raw.to_ascii_uppercase().starts_with("BTH")
}
