//! FD budget (component H) — grounded on
//! `examples/original_source/src/loop.c`'s `setup_fdlimit`.

use tracing::warn;

/// Factor applied per slot: 3 descriptor positions normally, 5 when an output
/// directory causes per-target stdout+stderr files to also be held open.
pub fn factor(output_dir_configured: bool) -> u64 {
    if output_dir_configured {
        5
    } else {
        3
    }
}

/// Required descriptor headroom for running with up to `n` concurrent
/// targets. `3 (own std) + 3 (ping helper) + 3 (exec pipe temp) + factor*(n+3) + 10`.
pub fn required(n: u64, output_dir_configured: bool) -> u64 {
    3 + 3 + 3 + factor(output_dir_configured) * (n + 3) + 10
}

/// Raise the soft file-descriptor limit toward the hard limit so `n`
/// concurrent targets fit. If the hard limit is insufficient, returns a
/// reduced `n` that does fit and logs a warning; otherwise returns `n`
/// unchanged.
pub fn adjust(n: u64, output_dir_configured: bool) -> u64 {
    let mut limit = libc::rlimit { rlim_cur: 0, rlim_max: 0 };
    // SAFETY: RLIMIT_NOFILE with a valid, uniquely-owned out-pointer.
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) } != 0 {
        warn!("getrlimit(RLIMIT_NOFILE) failed; proceeding without fd budget adjustment");
        return n;
    }

    let need = required(n, output_dir_configured);
    if need <= limit.rlim_cur {
        return n;
    }

    if need <= limit.rlim_max {
        limit.rlim_cur = need;
        // SAFETY: raising soft limit toward hard limit with a valid pointer.
        if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &limit) } != 0 {
            warn!("setrlimit(RLIMIT_NOFILE) failed; falling back to shrinking concurrency");
        } else {
            return n;
        }
    }

    // Largest n that fits within rlim_max (or the still-unraised rlim_cur).
    let ceiling = limit.rlim_max.max(limit.rlim_cur);
    let f = factor(output_dir_configured);
    let max_n = ((ceiling.saturating_sub(3 + 3 + 3 + 10)) / f).saturating_sub(3);
    let reduced = max_n.clamp(1, n);
    if reduced < n {
        warn!(
            requested = n,
            reduced, "file-descriptor limit too low for requested concurrency; reducing N"
        );
    }
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_matches_formula() {
        assert_eq!(required(10, false), 9 + 3 * 13 + 10);
        assert_eq!(required(10, true), 9 + 5 * 13 + 10);
    }
}
