/// Niceness applied to deprioritised processes.
pub const LOW_PRIORITY_NICE: i32 = 19;

/// Lower the scheduling priority of `pid`, or of the current process.
///
/// Returns `false` instead of failing; deprioritisation is only an
/// optimisation.
#[cfg(unix)]
pub fn set_low_priority(pid: Option<u32>) -> bool {
    let who = pid.unwrap_or(0) as libc::id_t;
    // SAFETY: setpriority has no memory-safety preconditions.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, who, LOW_PRIORITY_NICE) };
    if rc == 0 {
        tracing::info!("Lowered scheduling priority of {} to nice {}", describe(pid), LOW_PRIORITY_NICE);
        true
    } else {
        let err = std::io::Error::last_os_error();
        tracing::warn!("Failed to lower priority of {}: {}", describe(pid), err);
        false
    }
}

#[cfg(not(unix))]
pub fn set_low_priority(pid: Option<u32>) -> bool {
    tracing::warn!("Priority adjustment unsupported on this platform ({})", describe(pid));
    false
}

fn describe(pid: Option<u32>) -> String {
    match pid {
        Some(pid) => format!("pid {pid}"),
        None => "current process".to_string(),
    }
}
