use url::form_urlencoded;

/// Query parameter carrying the multi-login index.
pub const USER_INDEX_PARAMETER: &str = "u";

/// Extracts the multi-login index from a page's `location.search`.
///
/// Only multi-login sessions carry the parameter, so a missing or empty value
/// reads as `"0"`. The value is then read the way `parseInt(value, 10)` reads
/// it, and `None` is returned when it does not start with a number.
pub fn user_index(search: &str) -> Option<i64> {
    let query = search.strip_prefix('?').unwrap_or(search);
    let raw = form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == USER_INDEX_PARAMETER)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "0".to_string());

    parse_int(&raw)
}

fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let digits = rest
        .bytes()
        .take_while(u8::is_ascii_digit)
        .map(|digit| i64::from(digit - b'0'));

    let mut value: Option<i64> = None;
    for digit in digits {
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit));
    }

    value.map(|value| if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_defaults_to_the_first_login() {
        assert_eq!(user_index(""), Some(0));
        assert_eq!(user_index("?hl=en"), Some(0));
        assert_eq!(user_index("?u="), Some(0));
    }

    #[test]
    fn it_reads_the_index_parameter() {
        assert_eq!(user_index("?u=2"), Some(2));
        assert_eq!(user_index("?hl=en&u=3#top"), Some(3));
        assert_eq!(user_index("?u=1&u=5"), Some(1));
        assert_eq!(user_index("?u=%204"), Some(4));
    }

    #[test]
    fn it_reads_a_leading_number_like_parse_int() {
        assert_eq!(user_index("?u=7abc"), Some(7));
        assert_eq!(user_index("?u=-1"), Some(-1));
        assert_eq!(user_index("?u=+8"), Some(8));
        assert_eq!(user_index("?u=0x10"), Some(0));
    }

    #[test]
    fn it_yields_nothing_for_non_numbers() {
        assert_eq!(user_index("?u=abc"), None);
        assert_eq!(user_index("?u=-"), None);
    }
}
