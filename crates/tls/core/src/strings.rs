//! Password normalization (RFC 7613 FreeformClass) and IDNA hostname
//! mapping.  Hostnames travel in the SNI extension and the TOFU
//! store; passwords feed the PSK modules.

use unicode_normalization::UnicodeNormalization;

use crate::error::Error;

/// Inputs above this size are rejected before any Unicode work is
/// attempted.
const MAX_IDNA_INPUT: usize = 2048;

fn is_noncharacter(c: char) -> bool {
    let v = c as u32;
    (0xfdd0..=0xfdef).contains(&v) || (v & 0xfffe) == 0xfffe
}

/// Default-ignorable code points and join controls, which never
/// belong in a password.
fn is_default_ignorable(c: char) -> bool {
    matches!(c as u32,
        0x00ad
        | 0x034f
        | 0x115f..=0x1160
        | 0x17b4..=0x17b5
        | 0x180b..=0x180e
        | 0x200b..=0x200f
        | 0x202a..=0x202e
        | 0x2060..=0x206f
        | 0x3164
        | 0xfe00..=0xfe0f
        | 0xfeff
        | 0xffa0
        | 0xfff0..=0xfff8
        | 0x1d173..=0x1d17a
        | 0xe0000..=0xe0fff)
}

/// Normalize a password per the RFC 7613 OpaqueString profile:
/// validate UTF-8, reject control and invisible code points, fold
/// every space to U+0020, and apply NFC.
///
/// With `ignore_errs`, invalid UTF-8 input is returned as the raw
/// bytes instead of failing, for callers interoperating with peers
/// that treat passwords as octet strings.
pub fn utf8_password_normalize(raw: &[u8], ignore_errs: bool) -> Result<Vec<u8>, Error> {
    let s = match std::str::from_utf8(raw) {
        Ok(s) => s,
        Err(_) if ignore_errs => return Ok(raw.to_vec()),
        Err(_) => return Err(Error::InvalidUtf8String),
    };

    let mut mapped = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_whitespace() {
            mapped.push(' ');
            continue;
        }
        if c.is_control() || is_noncharacter(c) || is_default_ignorable(c) {
            return Err(Error::InvalidUtf8String);
        }
        mapped.push(c);
    }

    if mapped.is_empty() {
        return Err(Error::InvalidUtf8String);
    }

    Ok(mapped.nfc().collect::<String>().into_bytes())
}

fn idna_config(transitional: bool) -> idna::Config {
    idna::Config::default()
        .use_std3_ascii_rules(true)
        .transitional_processing(transitional)
        .verify_dns_length(true)
}

/// Map a hostname to its IDNA ASCII form.
///
/// Printable-ASCII input passes through untouched.  Otherwise
/// IDNA2008 nontransitional mapping is tried first; when the name is
/// disallowed there and `force_2008` is unset, the transitional
/// profile gets a second chance (the compatibility behaviour for
/// deployed names like "faß.de").
pub fn idna_map(name: &str, force_2008: bool) -> Result<String, Error> {
    if name.len() > MAX_IDNA_INPUT {
        return Err(Error::InvalidUtf8String);
    }

    if name.bytes().all(|b| b.is_ascii_graphic()) {
        return Ok(name.to_string());
    }

    match idna_config(false).to_ascii(name) {
        Ok(ascii) => Ok(ascii),
        Err(_) if !force_2008 => idna_config(true)
            .to_ascii(name)
            .map_err(|_| Error::InvalidUtf8String),
        Err(_) => Err(Error::InvalidUtf8String),
    }
}

/// Decode `xn--` labels of an ASCII hostname back to UTF-8.
pub fn idna_reverse_map(ascii: &str) -> Result<String, Error> {
    if ascii.len() > MAX_IDNA_INPUT {
        return Err(Error::InvalidUtf8String);
    }

    let mut labels = Vec::new();
    for label in ascii.split('.') {
        if let Some(punycode) = label
            .strip_prefix("xn--")
            .or_else(|| label.strip_prefix("XN--"))
        {
            let decoded = idna::punycode::decode_to_string(punycode)
                .ok_or(Error::InvalidUtf8String)?;
            labels.push(decoded);
        } else {
            labels.push(label.to_string());
        }
    }
    Ok(labels.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_spaces_fold_to_ascii_space() {
        let out = utf8_password_normalize("correct\u{00a0}horse".as_bytes(), false).unwrap();
        assert_eq!(out, b"correct horse");
    }

    #[test]
    fn password_rejects_controls_and_ignorables() {
        assert_eq!(
            utf8_password_normalize(b"pass\x07word", false),
            Err(Error::InvalidUtf8String)
        );
        assert_eq!(
            utf8_password_normalize("pass\u{200b}word".as_bytes(), false),
            Err(Error::InvalidUtf8String)
        );
        assert_eq!(
            utf8_password_normalize("bad\u{fdd0}".as_bytes(), false),
            Err(Error::InvalidUtf8String)
        );
    }

    #[test]
    fn password_nfc_composes() {
        // e + combining acute => é
        let out = utf8_password_normalize("cafe\u{0301}".as_bytes(), false).unwrap();
        assert_eq!(out, "café".as_bytes());
    }

    #[test]
    fn password_invalid_utf8() {
        assert_eq!(
            utf8_password_normalize(&[0xff, 0xfe], false),
            Err(Error::InvalidUtf8String)
        );
        assert_eq!(
            utf8_password_normalize(&[0xff, 0xfe], true).unwrap(),
            vec![0xff, 0xfe]
        );
    }

    #[test]
    fn idna_ascii_passthrough() {
        assert_eq!(idna_map("www.example.com", false).unwrap(), "www.example.com");
    }

    #[test]
    fn idna_maps_unicode() {
        assert_eq!(idna_map("bücher.de", false).unwrap(), "xn--bcher-kva.de");
        assert_eq!(idna_map("bücher.de", true).unwrap(), "xn--bcher-kva.de");
    }

    #[test]
    fn idna_rejects_oversize() {
        let big = "ü".repeat(2048);
        assert_eq!(idna_map(&big, false), Err(Error::InvalidUtf8String));
    }

    #[test]
    fn reverse_map_decodes_punycode() {
        assert_eq!(
            idna_reverse_map("xn--bcher-kva.de").unwrap(),
            "bücher.de"
        );
        assert_eq!(idna_reverse_map("plain.example").unwrap(), "plain.example");
    }
}
