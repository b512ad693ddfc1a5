//! Shared diagnostic reporting for the lexer, parser and interpreter.
//!
//! Every NANO-level error (lexical, syntactic or runtime) is non-fatal: the
//! offending phase reports the problem here and keeps going with a
//! best-effort substitute, rather than unwinding through a `Result`.

/// Report an error tied to a specific token or lexeme.
///
/// `location` is the lexeme text (e.g. `"+"`, an identifier) or the empty
/// string when the error has no associated lexeme (end of input, a bare
/// character). Produces `[Line L] Error at 'lex': message` or, when
/// `location` is empty, `[Line L] Error: message`.
pub fn report(line: usize, location: &str, message: &str) {
    if location.is_empty() {
        eprintln!("[Line {line}] Error: {message}");
    } else {
        eprintln!("[Line {line}] Error at '{location}': {message}");
    }
}

/// Report a runtime fault. Runtime diagnostics carry no lexeme context by
/// convention, only the line the offending expression or statement started
/// on.
pub fn runtime_error(line: usize, message: &str) {
    eprintln!("[Line {line}] {message}");
}
