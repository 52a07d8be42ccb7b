//! The `jwt` session cookie.

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration, Utc};

pub const SESSION_COOKIE: &str = "jwt";
pub const LOGGED_OUT: &str = "loggedout";

/// `Set-Cookie` value carrying a session token.
pub fn session_cookie(token: &str, expires: DateTime<Utc>, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Expires={}; HttpOnly; Path=/",
        http_date(expires)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Overwrites the session cookie with a placeholder that expires in 10 seconds.
pub fn logout_cookie(now: DateTime<Utc>) -> String {
    session_cookie(LOGGED_OUT, now + Duration::seconds(10), false)
}

/// Value of the first cookie called `name` in the `Cookie` headers.
pub fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::TimeZone;

    #[test]
    fn session_cookie_is_http_only() {
        let expires = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            session_cookie("abc", expires, false),
            "jwt=abc; Expires=Tue, 02 Jan 2024 03:04:05 GMT; HttpOnly; Path=/"
        );
        assert!(session_cookie("abc", expires, true).ends_with("; Secure"));
    }

    #[test]
    fn logout_cookie_expires_shortly() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            logout_cookie(now),
            "jwt=loggedout; Expires=Tue, 02 Jan 2024 03:04:15 GMT; HttpOnly; Path=/"
        );
    }

    #[test]
    fn reads_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; jwt=tok.en.sig"));
        assert_eq!(read_cookie(&headers, "jwt"), Some("tok.en.sig"));
        assert_eq!(read_cookie(&headers, "session"), None);
    }
}
