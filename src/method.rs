//! Target argv builder (component I) — grounded on
//! `examples/original_source/src/target.c`'s `target_getcmd` and `split_argv`.
//!
//! Environment overrides and default options are preserved verbatim from the
//! reference tool so existing operator tooling (`SHMUX_SH`, `SHMUX_SSH2_OPTS`,
//! etc.) keeps working unchanged.

use crate::target::Method;

const DEFAULT_SSH_OPTS: &str = "-x -a -oLogLevel=ERROR";

/// The local program, its arguments, and extra environment for invoking `cmd`
/// against `target_name` via `method`.
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

pub fn getcmd(method: Method, target_name: &str, cmd: &str) -> Invocation {
    match method {
        Method::LocalShell => {
            let program = std::env::var("SHMUX_SH").unwrap_or_else(|_| "/bin/sh".to_string());
            Invocation { program, args: vec!["-c".to_string(), cmd.to_string()] }
        }
        Method::RemoteShellLegacy => {
            let program = std::env::var("SHMUX_RSH").unwrap_or_else(|_| "rsh".to_string());
            let mut args = opts_for("SHMUX_RSH_OPTS", "");
            args.push(target_name.to_string());
            args.push(cmd.to_string());
            Invocation { program, args }
        }
        Method::SshV1 => ssh_invocation("SHMUX_SSH1", "SHMUX_SSH1_OPTS", target_name, cmd),
        Method::SshV2 => ssh_invocation("SHMUX_SSH2", "SHMUX_SSH2_OPTS", target_name, cmd),
        Method::SshAuto => ssh_invocation("SHMUX_SSH", "SHMUX_SSH_OPTS", target_name, cmd),
    }
}

fn ssh_invocation(prog_var: &str, opts_var: &str, target_name: &str, cmd: &str) -> Invocation {
    let program = std::env::var(prog_var).unwrap_or_else(|_| "ssh".to_string());
    let mut args = opts_for(opts_var, DEFAULT_SSH_OPTS);
    args.push("-o".to_string());
    args.push("BatchMode=yes".to_string());
    args.push(target_name.to_string());
    args.push(cmd.to_string());
    Invocation { program, args }
}

fn opts_for(var: &str, default: &str) -> Vec<String> {
    let raw = std::env::var(var).unwrap_or_else(|_| default.to_string());
    split_argv(&raw)
}

/// Split an option string into argv tokens.
///
/// Whitespace splits tokens outside quotes. A `"` opens a quoted span; inside
/// a span, a doubled `""` inserts one literal `"` and the span continues; a
/// single `"` closes it. A dangling unterminated quote at end-of-string is
/// silently closed. Grounded on `target.c`'s `split_argv`.
pub fn split_argv(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;
    let n = chars.len();

    while i < n {
        while i < n && chars[i].is_whitespace() {
            i += 1;
        }
        if i >= n {
            break;
        }
        let mut tok = String::new();
        while i < n && !chars[i].is_whitespace() {
            if chars[i] == '"' {
                i += 1;
                loop {
                    if i >= n {
                        break; // dangling quote, silently closed
                    }
                    if chars[i] == '"' {
                        if i + 1 < n && chars[i + 1] == '"' {
                            tok.push('"');
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    tok.push(chars[i]);
                    i += 1;
                }
            } else {
                tok.push(chars[i]);
                i += 1;
            }
        }
        tokens.push(tok);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(split_argv("-x -a -oLogLevel=ERROR"), vec!["-x", "-a", "-oLogLevel=ERROR"]);
    }

    #[test]
    fn quoted_span_with_spaces() {
        assert_eq!(split_argv(r#"-o "ProxyCommand=nc %h %p""#), vec!["-o", "ProxyCommand=nc %h %p"]);
    }

    #[test]
    fn doubled_quote_inserts_literal() {
        assert_eq!(split_argv(r#""say ""hi"" now""#), vec!["say \"hi\" now"]);
    }

    #[test]
    fn dangling_quote_is_closed_silently() {
        assert_eq!(split_argv(r#"-o "unterminated"#), vec!["-o", "unterminated"]);
    }

    #[test]
    fn empty_string_has_no_tokens() {
        assert!(split_argv("").is_empty());
        assert!(split_argv("   ").is_empty());
    }
}
