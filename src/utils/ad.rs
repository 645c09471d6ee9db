//! Active Directory attribute encodings.
//!
//! AD stores several account properties in formats that only make sense
//! once decoded: account flags are bits in `userAccountControl`, timestamps
//! are Windows file-times and passwords are written as quoted UTF-16LE.

use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;

/// `ACCOUNTDISABLE` bit of `userAccountControl`.
pub const UF_ACCOUNTDISABLE: u32 = 0x2;

/// 100-nanosecond ticks per second in a Windows file-time.
pub const FILETIME_TICKS_PER_SECOND: i64 = 10_000_000;

/// Seconds between 1601-01-01 and 1970-01-01.
pub const FILETIME_UNIX_EPOCH_OFFSET: i64 = 11_644_473_600;

/// Parses a `userAccountControl` value. AD may render the flag word as a
/// signed 32-bit integer, so negative values are reinterpreted bitwise.
pub fn parse_account_control(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    raw.parse::<u32>()
        .ok()
        .or_else(|| raw.parse::<i32>().ok().map(|v| v as u32))
}

pub fn is_disabled(account_control: Option<&str>) -> bool {
    account_control
        .and_then(parse_account_control)
        .map(|flags| flags & UF_ACCOUNTDISABLE == UF_ACCOUNTDISABLE)
        .unwrap_or(false)
}

pub fn with_disabled_flag(flags: u32) -> u32 {
    flags | UF_ACCOUNTDISABLE
}

pub fn without_disabled_flag(flags: u32) -> u32 {
    flags & !UF_ACCOUNTDISABLE
}

/// An account is locked while `lockoutTime` is present and non-zero.
pub fn is_locked(lockout_time: Option<&str>) -> bool {
    matches!(lockout_time, Some(value) if value != "0")
}

pub fn filetime_to_unix(ticks: i64) -> i64 {
    ticks / FILETIME_TICKS_PER_SECOND - FILETIME_UNIX_EPOCH_OFFSET
}

/// Decodes a raw `lastLogonTimestamp` and renders it in `tz`.
///
/// Returns `None` for missing, non-numeric and zero ("never logged on")
/// values.
pub fn format_filetime_in<Tz>(raw: Option<&str>, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let ticks = raw?.trim().parse::<i64>().ok().filter(|ticks| *ticks != 0)?;
    let utc = DateTime::from_timestamp(filetime_to_unix(ticks), 0)?;
    Some(
        utc.with_timezone(tz)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
    )
}

pub fn format_last_logon(raw: Option<&str>) -> Option<String> {
    format_filetime_in(raw, &Local)
}

/// Encodes a password for the `unicodePwd` attribute: the password wrapped
/// in double quotes, as UTF-16LE bytes.
pub fn encode_unicode_pwd(password: &str) -> Vec<u8> {
    format!("\"{}\"", password)
        .encode_utf16()
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Extracts the common name from a group DN such as
/// `CN=IT-Admins,OU=Groups,DC=example,DC=com`.
///
/// Takes the first `CN=` component; escaped commas stay part of the value.
/// DNs without a CN component are returned unchanged.
pub fn common_name_from_dn(dn: &str) -> String {
    let bytes = dn.as_bytes();
    let mut rdn_start = 0;

    while rdn_start <= bytes.len() {
        let end = rdn_end(bytes, rdn_start);
        if let Some((attr, value)) = dn[rdn_start..end].split_once('=') {
            if attr.trim().eq_ignore_ascii_case("cn") {
                return value.to_string();
            }
        }
        rdn_start = end + 1;
    }

    dn.to_string()
}

fn rdn_end(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b',' => return pos,
            _ => pos += 1,
        }
    }
    bytes.len()
}
