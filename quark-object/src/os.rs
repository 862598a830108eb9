//! Thin platform helpers.

/// CPU time consumed by the calling thread, split into user and system time,
/// in microseconds.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub(crate) struct CpuTimes {
    pub(crate) user_usecs: i64,
    pub(crate) system_usecs: i64,
}

impl std::ops::Sub for CpuTimes {
    type Output = CpuTimes;

    fn sub(self, rhs: CpuTimes) -> CpuTimes {
        CpuTimes {
            user_usecs: self.user_usecs - rhs.user_usecs,
            system_usecs: self.system_usecs - rhs.system_usecs,
        }
    }
}

#[cfg(target_os = "linux")]
pub(crate) fn cpu_time() -> CpuTimes {
    std::fs::read_to_string("/proc/thread-self/stat")
        .ok()
        .and_then(|stat| parse_stat(&stat))
        .unwrap_or_default()
}

#[cfg(not(target_os = "linux"))]
pub(crate) fn cpu_time() -> CpuTimes {
    CpuTimes::default()
}

// utime and stime are expressed in clock ticks; the USER_HZ value exposed to
// userspace is 100 on every Linux architecture.
#[cfg(target_os = "linux")]
const USECS_PER_TICK: i64 = 10_000;

// Fields of /proc/<pid>/stat, counted from after the parenthesized command
// name (which may itself contain spaces): state is the first one, utime and
// stime the twelfth and thirteenth.
#[cfg(target_os = "linux")]
fn parse_stat(stat: &str) -> Option<CpuTimes> {
    let after_comm = stat.rsplit(')').next()?;
    let mut fields = after_comm.split_ascii_whitespace();
    let utime: i64 = fields.nth(11)?.parse().ok()?;
    let stime: i64 = fields.next()?.parse().ok()?;
    Some(CpuTimes {
        user_usecs: utime * USECS_PER_TICK,
        system_usecs: stime * USECS_PER_TICK,
    })
}
