//! Breakpoint condition builder (§4.2).
//!
//! Combines a user condition with an optional logpoint template into the
//! single expression string CDP evaluates at the breakpoint. Grounded on
//! `trust-debug::session::parse_log_message`'s `{expr}` fragment scanner,
//! generalized from "compile each fragment with the interpreter's expression
//! compiler" to "string-emit a console call", since this crate has no
//! in-process expression compiler to hand fragments to — the compiled
//! expression text is whatever the user wrote, passed through verbatim for
//! the runtime to evaluate.

use crate::error::BreakpointError;

/// Pseudo-URL appended to logpoint conditions so downstream stack-trace
/// assembly can recognize and suppress frames synthesized by a logpoint.
pub const LOGPOINT_URL: &str = "logpoint.cdp";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fragment {
    Text(String),
    Expr(String),
}

/// Builds the CDP-side condition expression for a breakpoint.
///
/// CDP is instructed to continue whenever this expression evaluates falsy;
/// for a plain conditional breakpoint that's exactly the user's condition.
/// For a logpoint, the expression always evaluates falsy (the statement
/// form ends in `;`), so the runtime never actually stops there.
pub fn build_condition(
    user_condition: Option<&str>,
    log_message: Option<&str>,
) -> Result<Option<String>, BreakpointError> {
    let Some(template) = log_message else {
        return Ok(user_condition.map(str::to_string));
    };

    let rewritten = rewrite_logpoint(template)?;
    let combined = match user_condition {
        Some(condition) => format!("({condition}) && {rewritten}"),
        None => rewritten,
    };
    Ok(Some(combined))
}

/// Rewrites a `logMessage` template into a `console.log(...)` statement
/// terminated by the logpoint marker URL.
fn rewrite_logpoint(template: &str) -> Result<String, BreakpointError> {
    let fragments = parse_fragments(template)?;

    let mut format_string = String::new();
    let mut args = Vec::new();
    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => format_string.push_str(&escape_for_format_literal(&text)),
            Fragment::Expr(expr) => {
                format_string.push_str("%O");
                args.push(expr);
            }
        }
    }

    let mut call = format!("console.log('{format_string}'");
    for arg in args {
        call.push_str(", (");
        call.push_str(&arg);
        call.push(')');
    }
    call.push(')');
    call.push_str(";\n//# sourceURL=");
    call.push_str(LOGPOINT_URL);
    Ok(call)
}

fn parse_fragments(template: &str) -> Result<Vec<Fragment>, BreakpointError> {
    let mut fragments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    literal.push('{');
                    continue;
                }
                if !literal.is_empty() {
                    fragments.push(Fragment::Text(std::mem::take(&mut literal)));
                }
                let mut expr = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    expr.push(next);
                }
                if !closed {
                    return Err(BreakpointError::InvalidLogMessage(
                        "unterminated '{' in log message".to_string(),
                    ));
                }
                let expr = expr.trim();
                if !expr.is_empty() {
                    fragments.push(Fragment::Expr(expr.to_string()));
                }
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    literal.push('}');
                } else {
                    return Err(BreakpointError::InvalidLogMessage(
                        "unmatched '}' in log message".to_string(),
                    ));
                }
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        fragments.push(Fragment::Text(literal));
    }

    Ok(fragments)
}

/// Escapes a literal fragment for embedding in a single-quoted JS string
/// that also uses `%`-style format specifiers.
fn escape_for_format_literal(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('%', "%%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_condition_passes_through() {
        assert_eq!(
            build_condition(Some("x > 1"), None).unwrap(),
            Some("x > 1".to_string())
        );
    }

    #[test]
    fn no_condition_no_log_message_is_none() {
        assert_eq!(build_condition(None, None).unwrap(), None);
    }

    #[test]
    fn logpoint_emits_console_log_and_source_url_marker() {
        let cdp = build_condition(None, Some("x={x}")).unwrap().unwrap();
        assert!(cdp.contains("console.log('x=%O', (x));"));
        assert!(cdp.ends_with("//# sourceURL=logpoint.cdp"));
    }

    #[test]
    fn combined_condition_and_logpoint() {
        let cdp = build_condition(Some("x > 0"), Some("hit")).unwrap().unwrap();
        assert!(cdp.starts_with("(x > 0) && console.log("));
    }

    #[test]
    fn empty_braces_are_elided() {
        let cdp = build_condition(None, Some("a{}b")).unwrap().unwrap();
        assert!(cdp.contains("console.log('ab');"));
    }

    #[test]
    fn percent_signs_are_doubled() {
        let cdp = build_condition(None, Some("100% done")).unwrap().unwrap();
        assert!(cdp.contains("100%% done"));
    }

    #[test]
    fn unterminated_brace_is_an_error() {
        assert!(build_condition(None, Some("{x")).is_err());
    }

    #[test]
    fn unmatched_closing_brace_is_an_error() {
        assert!(build_condition(None, Some("x}")).is_err());
    }

    #[test]
    fn doubled_braces_are_literal() {
        let cdp = build_condition(None, Some("{{literal}}")).unwrap().unwrap();
        assert!(cdp.contains("console.log('{literal}');"));
    }
}
