//! Host CPU clock lookup used to fill in the guest's CPU frequency.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CPU_CLOCK_HZ: u32 = 400_000_000;

#[derive(Debug, Error)]
pub enum HostCpuInfoError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no usable CPU frequency in cpuinfo")]
    Unavailable,
}

pub trait CpuInfoSource {
    fn read_cpuinfo(&self) -> Result<String, HostCpuInfoError>;
}

/// `/proc/cpuinfo` of the running host.
#[derive(Debug, Clone)]
pub struct ProcCpuInfo {
    path: PathBuf,
}

impl ProcCpuInfo {
    pub fn new() -> Self {
        Self::at("/proc/cpuinfo")
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for ProcCpuInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuInfoSource for ProcCpuInfo {
    fn read_cpuinfo(&self) -> Result<String, HostCpuInfoError> {
        std::fs::read_to_string(&self.path).map_err(|source| HostCpuInfoError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl CpuInfoSource for str {
    fn read_cpuinfo(&self) -> Result<String, HostCpuInfoError> {
        Ok(self.to_owned())
    }
}

/// Parses a decimal such as `2.40` and scales it by `unit` Hz.
fn scaled_decimal(text: &str, unit: u64) -> Option<u32> {
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (text, ""),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let mut hz = int_part.parse::<u64>().ok()?.checked_mul(unit)?;
    let mut scale = unit;
    for digit in frac_part.bytes() {
        scale /= 10;
        if scale == 0 {
            break;
        }
        hz = hz.checked_add(u64::from(digit - b'0') * scale)?;
    }
    u32::try_from(hz).ok().filter(|hz| *hz != 0)
}

/// `model name : ... @ 2.40GHz`
fn parse_model_name(line: &str) -> Option<u32> {
    let (_, tail) = line.rsplit_once('@')?;
    let tail = tail.trim();
    if let Some(num) = tail.strip_suffix("GHz") {
        scaled_decimal(num.trim(), 1_000_000_000)
    } else if let Some(num) = tail.strip_suffix("MHz") {
        scaled_decimal(num.trim(), 1_000_000)
    } else {
        None
    }
}

/// `cpu MHz : 2400.000`
fn parse_cpu_mhz(line: &str) -> Option<u32> {
    let (_, value) = line.split_once(':')?;
    scaled_decimal(value.trim(), 1_000_000)
}

fn field_is(line: &str, name: &str) -> bool {
    line.split_once(':')
        .is_some_and(|(key, _)| key.trim() == name)
}

/// Extracts the CPU clock in Hz from cpuinfo text.
pub fn parse_cpu_frequency(cpuinfo: &str) -> Result<u32, HostCpuInfoError> {
    cpuinfo
        .lines()
        .filter(|line| field_is(line, "model name"))
        .find_map(parse_model_name)
        .or_else(|| {
            cpuinfo
                .lines()
                .filter(|line| field_is(line, "cpu MHz"))
                .find_map(parse_cpu_mhz)
        })
        .ok_or(HostCpuInfoError::Unavailable)
}

pub fn query_host_cpu_frequency<S: CpuInfoSource + ?Sized>(
    source: &S,
) -> Result<u32, HostCpuInfoError> {
    parse_cpu_frequency(&source.read_cpuinfo()?)
}

/// Picks the guest CPU clock: an explicit override, else the host clock, else
/// [`DEFAULT_CPU_CLOCK_HZ`].
pub fn resolve_cpu_clock_hz<S: CpuInfoSource + ?Sized>(override_hz: Option<u32>, source: &S) -> u32 {
    if let Some(hz) = override_hz {
        return hz;
    }
    match query_host_cpu_frequency(source) {
        Ok(hz) => hz,
        Err(err) => {
            debug!(%err, fallback = DEFAULT_CPU_CLOCK_HZ, "host CPU frequency unavailable");
            DEFAULT_CPU_CLOCK_HZ
        }
    }
}
