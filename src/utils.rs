use crate::error::{EdfError, Result};

/// Parses a data record duration field into 100 ns ticks
///
/// The writer emits `1`, `0.1` or `%.8f` text (`2.000000`). Digits past the
/// seventh decimal are below the tick resolution and are dropped.
pub fn parse_record_duration(field: &str) -> Result<i64> {
    let text = field.trim();
    let invalid = || EdfError::InvalidFormat(format!("Invalid data record duration '{}'", text));

    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let seconds: i64 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let mut ticks = seconds.checked_mul(crate::EDFLIB_TIME_DIMENSION).ok_or_else(invalid)?;

    // 小数部分最多7位 (100纳秒)
    let mut scale = crate::EDFLIB_TIME_DIMENSION;
    for digit in fraction.bytes().take(7) {
        scale /= 10;
        ticks += i64::from(digit - b'0') * scale;
    }

    if ticks <= 0 {
        return Err(invalid());
    }
    Ok(ticks)
}

/// 非本地化的整数解析，语义同C的atoi：只取开头的数字部分
pub fn atoi_nonlocalized(s: &str) -> i64 {
    let bytes = s.as_bytes();
    let mut i = skip_whitespace(bytes);
    let start = i;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits_start {
        return 0;
    }

    s[start..i].parse().unwrap_or(0)
}

/// 非本地化的浮点数解析
pub fn atof_nonlocalized(s: &str) -> f64 {
    parse_leading_f64(s.as_bytes())
}

/// Parses the longest decimal prefix of `bytes`, like C `atof`
///
/// Leading whitespace is skipped. Text without a numeric prefix yields 0.0,
/// and trailing garbage after the number is ignored.
pub fn parse_leading_f64(bytes: &[u8]) -> f64 {
    let mut i = skip_whitespace(bytes);
    let start = i;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0.0;
    }

    let mut end = i;
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    std::str::from_utf8(&bytes[start..end])
        .ok()
        .and_then(|text| text.parse().ok())
        .unwrap_or(0.0)
}

fn skip_whitespace(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_whitespace()).count()
}

/// Folds header free text to printable 7-bit ASCII
///
/// Latin-1 letters lose their accents, Windows-1252 punctuation maps to the
/// closest ASCII sign, and anything else becomes a space.
pub fn latin1_to_ascii(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    if (' '..='~').contains(&c) {
        return c;
    }

    match c as u32 {
        // Windows-1252 code points, both raw and as their Unicode characters
        128 | 0x20AC => 'E',
        130 | 0x201A => ',',
        131 | 0x0192 => 'F',
        132 | 0x201E => '"',
        133 | 0x2026 => '.',
        134 | 0x2020 => '+',
        135 | 0x2021 => '+',
        136 | 0x02C6 => '^',
        137 | 0x2030 => 'm',
        138 | 0x0160 => 'S',
        139 | 0x2039 => '<',
        140 | 0x0152 => 'E',
        142 | 0x017D => 'Z',
        145 | 0x2018 => '`',
        146 | 0x2019 => '\'',
        147 | 0x201C => '"',
        148 | 0x201D => '"',
        149 | 0x2022 => '.',
        150 | 0x2013 => '-',
        151 | 0x2014 => '-',
        152 | 0x02DC => '~',
        154 | 0x0161 => 's',
        155 | 0x203A => '>',
        156 | 0x0153 => 'e',
        158 | 0x017E => 'z',
        159 | 0x0178 => 'Y',
        // Latin-1 supplement
        171 => '<',
        180 => '\'',
        181 => 'u',
        187 => '>',
        191 => '?',
        192..=197 => 'A',
        198 => 'E',
        199 => 'C',
        200..=203 => 'E',
        204..=207 => 'I',
        208 => 'D',
        209 => 'N',
        210..=214 => 'O',
        215 => 'x',
        216 => 'O',
        217..=220 => 'U',
        221 => 'Y',
        222 => 'I',
        223 => 's',
        224..=229 => 'a',
        230 => 'e',
        231 => 'c',
        232..=235 => 'e',
        236..=239 => 'i',
        240 => 'd',
        241 => 'n',
        242..=246 => 'o',
        247 => '-',
        248 => '0',
        249..=252 => 'u',
        253 => 'y',
        254 => 't',
        255 => 'y',
        _ => ' ',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record_duration() {
        assert_eq!(parse_record_duration("1       ").unwrap(), 10_000_000);
        assert_eq!(parse_record_duration("0.1     ").unwrap(), 1_000_000);
        assert_eq!(parse_record_duration("2.000000").unwrap(), 20_000_000);
        assert_eq!(parse_record_duration("0.333333").unwrap(), 3_333_330);
        assert_eq!(parse_record_duration(".5").unwrap(), 5_000_000);
        assert_eq!(parse_record_duration("0.12345678").unwrap(), 1_234_567);

        assert!(parse_record_duration("   ").is_err());
        assert!(parse_record_duration(".").is_err());
        assert!(parse_record_duration("-2.5").is_err());
        assert!(parse_record_duration("0.000000").is_err());
        assert!(parse_record_duration("1e3").is_err());
    }

    #[test]
    fn test_parse_leading_f64_matches_atof() {
        assert_eq!(parse_leading_f64(b"1.5"), 1.5);
        assert_eq!(parse_leading_f64(b"  -2.25\tnext"), -2.25);
        assert_eq!(parse_leading_f64(b"3e2,"), 300.0);
        assert_eq!(parse_leading_f64(b"4e"), 4.0);
        assert_eq!(parse_leading_f64(b".5"), 0.5);
        assert_eq!(parse_leading_f64(b"7."), 7.0);
        assert_eq!(parse_leading_f64(b""), 0.0);
        assert_eq!(parse_leading_f64(b"abc"), 0.0);
        assert_eq!(parse_leading_f64(b"-"), 0.0);
    }

    #[test]
    fn test_atoi_nonlocalized() {
        assert_eq!(atoi_nonlocalized("123"), 123);
        assert_eq!(atoi_nonlocalized(" -45  "), -45);
        assert_eq!(atoi_nonlocalized("20.000"), 20);
        assert_eq!(atoi_nonlocalized("x1"), 0);
        assert_eq!(atoi_nonlocalized(""), 0);
    }

    #[test]
    fn test_latin1_to_ascii() {
        assert_eq!(latin1_to_ascii("Jos\u{e9} M\u{fc}ller"), "Jose Muller");
        assert_eq!(latin1_to_ascii("\u{c5}se \u{2014} \u{20ac}"), "Ase - E");
        assert_eq!(latin1_to_ascii("tab\there"), "tab here");
        assert_eq!(latin1_to_ascii("\u{4e2d}"), " ");
    }
}
