//! Liveness pinger collaborator — a concrete default for the `fping`-like
//! helper the spec treats as an external process. Builds a single shell
//! script that probes every target sequentially and prints `<host>
//! <remainder>` lines on slot 0's stdout, in the exact wire shape
//! `examples/original_source/src/loop.c`'s `parse_fping` expects.

use crate::method::Invocation;

/// Build the slot-0 helper invocation for the given target host names.
pub fn helper_invocation(hosts: &[String]) -> Invocation {
    let mut script = String::new();
    for host in hosts {
        let bare = host.rsplit('@').next().unwrap_or(host);
        script.push_str(&format!(
            "if ping -c 1 -W 1 {h} >/dev/null 2>&1; then echo '{raw} is alive'; else echo '{raw} unreachable'; fi\n",
            h = shell_quote(bare),
            raw = raw_escape(host),
        ));
    }
    Invocation { program: "/bin/sh".to_string(), args: vec!["-c".to_string(), script] }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn raw_escape(s: &str) -> String {
    s.replace('\'', "")
}

/// Parse one line of the helper's stdout as `<host> <remainder>`. Returns the
/// host and whether it is alive, or `None` if the line cannot be parsed
/// (logged as garbage by the caller, not fatal).
pub fn parse_line(line: &str) -> Option<(&str, bool)> {
    let (host, remainder) = line.split_once(' ')?;
    Some((host, remainder == "is alive"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alive_and_unreachable() {
        assert_eq!(parse_line("host1 is alive"), Some(("host1", true)));
        assert_eq!(parse_line("host1 unreachable"), Some(("host1", false)));
        assert_eq!(parse_line("garbage"), None);
    }

    #[test]
    fn invocation_contains_each_host() {
        let inv = helper_invocation(&["a".to_string(), "user@b".to_string()]);
        assert!(inv.args[1].contains("'a'"));
        assert!(inv.args[1].contains("'b'"));
    }
}
