//! Translation between HTTP headers and [`SessionContext`].

use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use engine::{Credentials, GuestCookieDirective, SessionContext};

use crate::config::GuestCookieConfig;

/// Reads a cookie value by name from every `Cookie` header.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Collects credentials: the bearer, and the guest token from its header
/// or, failing that, its cookie.
pub fn credentials(headers: &HeaderMap, cookie: &GuestCookieConfig) -> Credentials {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let guest_token = headers
        .get(cookie.header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .or_else(|| cookie_value(headers, &cookie.cookie_name));
    Credentials::from_headers(authorization, guest_token)
}

/// The `Set-Cookie` value for a session's cookie directive, if any.
pub fn set_cookie(session: &SessionContext, cookie: &GuestCookieConfig) -> Option<String> {
    match session.cookie() {
        GuestCookieDirective::Keep => None,
        GuestCookieDirective::Refresh => session.guest_token().map(|token| {
            format!(
                "{}={}; Max-Age={}; Path=/; SameSite=Lax",
                cookie.cookie_name,
                token,
                cookie.max_age.as_secs()
            )
        }),
        GuestCookieDirective::Clear => Some(format!(
            "{}=; Max-Age=0; Path=/; SameSite=Lax",
            cookie.cookie_name
        )),
    }
}

/// Applies the session's cookie directive to a response.
pub fn apply_cookie(
    mut response: Response,
    session: &SessionContext,
    cookie: &GuestCookieConfig,
) -> Response {
    if let Some(value) = set_cookie(session, cookie)
        && let Ok(value) = HeaderValue::from_str(&value)
    {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use common::{GuestToken, UserId};

    use super::*;

    #[test]
    fn cookie_lookup_scans_all_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; guest_cart_token=abc"));
        assert_eq!(cookie_value(&headers, "guest_cart_token"), Some("abc"));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn header_wins_over_cookie() {
        let config = GuestCookieConfig::default();
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("guest_cart_token=from-cookie"));
        headers.append("x-guest-token", HeaderValue::from_static("from-header"));
        headers.append(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));

        let creds = credentials(&headers, &config);
        assert_eq!(creds.guest_token.as_deref(), Some("from-header"));
        assert_eq!(creds.bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn cookie_directives_render() {
        let config = GuestCookieConfig::default();
        let token = GuestToken::parse("abc").unwrap();

        let keep = SessionContext::for_guest(token.clone());
        assert_eq!(set_cookie(&keep, &config), None);

        let mut refresh = SessionContext::for_guest(token.clone());
        refresh.touch();
        assert_eq!(
            set_cookie(&refresh, &config).as_deref(),
            Some("guest_cart_token=abc; Max-Age=2592000; Path=/; SameSite=Lax")
        );

        let mut cleared = SessionContext::for_user(UserId::new(), Some(token));
        cleared.confirm_merge();
        assert_eq!(
            set_cookie(&cleared, &config).as_deref(),
            Some("guest_cart_token=; Max-Age=0; Path=/; SameSite=Lax")
        );
    }
}
