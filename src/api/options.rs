use uuid::Uuid;

/// Scan and device-request filter.
///
/// A device matches when all provided fields match. The service list uses OR
/// semantics: advertising any one of the listed services is enough. Name and
/// prefix comparisons are case-sensitive.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScanOptions {
    pub name: Option<String>,
    pub name_prefix: Option<String>,
    pub services: Vec<Uuid>,
    pub allow_duplicates: bool,
    pub scan_mode: ScanMode,
}

impl ScanOptions {
    pub fn matches(&self, name: Option<&str>, advertised: &[Uuid]) -> bool {
        if let Some(wanted) = &self.name
            && name != Some(wanted.as_str())
        {
            return false;
        }
        if let Some(prefix) = &self.name_prefix
            && !name.is_some_and(|n| n.starts_with(prefix.as_str()))
        {
            return false;
        }
        if !self.services.is_empty() && !self.services.iter().any(|s| advertised.contains(s)) {
            return false;
        }
        true
    }
}

/// Latency/power trade-off hint forwarded to the backend.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ScanMode {
    LowPower,
    #[default]
    Balanced,
    LowLatency,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WriteType {
    WithResponse,
    WithoutResponse,
}

/// Labels for backends that present a native scan dialog. Ignored elsewhere.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DisplayStrings {
    pub scanning: Option<String>,
    pub cancel: Option<String>,
    pub available_devices: Option<String>,
    pub no_device_found: Option<String>,
}
