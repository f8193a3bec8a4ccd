//! Local platform probes shared by the OS/HW collectors and the identity.
//!
//! Everything here degrades to `None` when a fact is unavailable.

pub fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `PRETTY_NAME`, `VERSION_ID`, ... from `/etc/os-release`.
pub fn os_release_field(field: &str) -> Option<String> {
    let content = std::fs::read_to_string("/etc/os-release").ok()?;
    parse_os_release_field(&content, field)
}

/// Kernel release as reported by `uname(2)`.
#[cfg(unix)]
pub fn kernel_release() -> Option<String> {
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    // SAFETY: uname only writes into the provided struct.
    if unsafe { libc::uname(&mut uts) } != 0 {
        return None;
    }
    // SAFETY: uname NUL-terminates every field.
    let release = unsafe { std::ffi::CStr::from_ptr(uts.release.as_ptr()) };
    release.to_str().ok().map(|s| s.to_string())
}

#[cfg(not(unix))]
pub fn kernel_release() -> Option<String> {
    None
}

pub fn cpu_model() -> Option<String> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    extract_proc_field(&cpuinfo, "model name")
}

pub fn cpu_vendor() -> Option<String> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    let raw = extract_proc_field(&cpuinfo, "vendor_id")?;
    Some(normalize_vendor(&raw))
}

pub fn cpu_threads() -> Option<usize> {
    std::thread::available_parallelism().ok().map(|n| n.get())
}

pub fn memory_total_mb() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    parse_meminfo_kb(&meminfo, "MemTotal").map(|kb| kb / 1024)
}

fn parse_os_release_field(content: &str, field: &str) -> Option<String> {
    let prefix = format!("{}=", field);
    content
        .lines()
        .find_map(|line| line.strip_prefix(&prefix))
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

fn extract_proc_field(cpuinfo: &str, field: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|l| l.starts_with(field))
        .and_then(|l| l.split(':').nth(1))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_meminfo_kb(meminfo: &str, field: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|l| l.starts_with(field))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}

fn normalize_vendor(raw: &str) -> String {
    if raw.contains("GenuineIntel") {
        "Intel".into()
    } else if raw.contains("AuthenticAMD") {
        "AMD".into()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_release_parsing() {
        let content = "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\nPRETTY_NAME=\"Ubuntu 22.04.4 LTS\"\nID=ubuntu\n";
        assert_eq!(
            parse_os_release_field(content, "PRETTY_NAME").as_deref(),
            Some("Ubuntu 22.04.4 LTS")
        );
        assert_eq!(parse_os_release_field(content, "VERSION_ID").as_deref(), Some("22.04"));
        assert_eq!(parse_os_release_field(content, "ID").as_deref(), Some("ubuntu"));
        assert_eq!(parse_os_release_field(content, "BUILD_ID"), None);
    }

    #[test]
    fn cpuinfo_parsing() {
        let cpuinfo = "processor\t: 0\nvendor_id\t: GenuineIntel\nmodel name\t: Intel(R) Xeon(R) CPU\n";
        assert_eq!(
            extract_proc_field(cpuinfo, "model name").as_deref(),
            Some("Intel(R) Xeon(R) CPU")
        );
        assert_eq!(
            normalize_vendor(&extract_proc_field(cpuinfo, "vendor_id").unwrap()),
            "Intel"
        );
        assert_eq!(extract_proc_field(cpuinfo, "cpu MHz"), None);
    }

    #[test]
    fn meminfo_parsing() {
        let meminfo = "MemTotal:       16318412 kB\nMemFree:         1234 kB\n";
        assert_eq!(parse_meminfo_kb(meminfo, "MemTotal"), Some(16318412));
        assert_eq!(parse_meminfo_kb(meminfo, "SwapTotal"), None);
    }
}
