use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("unterminated double quote")]
    UnterminatedQuote,

    #[error("trailing backslash")]
    TrailingBackslash,

    #[error("unknown escape sequence \\{0}")]
    UnknownEscape(char),

    #[error("\\x escape needs two hex digits")]
    InvalidHex,
}

/// Splits a line on whitespace. Double-quoted tokens may contain whitespace;
/// inside quotes, `\"` and `\\` are literal.
pub fn tokenize(line: &str) -> Result<Vec<String>, TokenError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        None => return Err(TokenError::UnterminatedQuote),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => current.push(escaped),
                            Some(other) => {
                                // Keep other escapes for the unescape pass.
                                current.push('\\');
                                current.push(other);
                            }
                            None => return Err(TokenError::UnterminatedQuote),
                        },
                        Some(other) => current.push(other),
                    }
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Interprets backslash escapes so values can carry non-printable bytes:
/// `\n \r \t \0 \\ \" \xNN`.
pub fn unescape(token: &str) -> Result<Vec<u8>, TokenError> {
    let mut out = Vec::with_capacity(token.len());
    let mut chars = token.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            None => return Err(TokenError::TrailingBackslash),
            Some('n') => out.push(b'\n'),
            Some('r') => out.push(b'\r'),
            Some('t') => out.push(b'\t'),
            Some('0') => out.push(0),
            Some('\\') => out.push(b'\\'),
            Some('"') => out.push(b'"'),
            Some('x') => {
                let hi = chars.next().ok_or(TokenError::InvalidHex)?;
                let lo = chars.next().ok_or(TokenError::InvalidHex)?;
                let hi = hi.to_digit(16).ok_or(TokenError::InvalidHex)? as u8;
                let lo = lo.to_digit(16).ok_or(TokenError::InvalidHex)? as u8;
                out.push(hi << 4 | lo);
            }
            Some(other) => return Err(TokenError::UnknownEscape(other)),
        }
    }
    Ok(out)
}

/// Inverse of `unescape` for display: non-printable bytes render as escapes.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            other => out.push_str(&format!("\\x{other:02x}")),
        }
    }
    out
}
