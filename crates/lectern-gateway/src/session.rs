use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{COOKIE, HeaderMap, SET_COOKIE};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use lectern_core::SessionId;

pub const DEFAULT_COOKIE_NAME: &str = "lectern_session";

#[derive(Clone)]
pub(crate) struct SessionCookie {
    name: Arc<str>,
}

impl SessionCookie {
    pub(crate) fn new(name: Arc<str>) -> Self {
        Self { name }
    }
}

/// Attach a [`SessionId`] to every request, issuing a cookie on first contact.
pub(crate) async fn session_middleware(
    State(cookie): State<SessionCookie>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let existing =
        read_cookie(req.headers(), &cookie.name).and_then(|v| v.parse::<SessionId>().ok());
    let (session, issued) = match existing {
        Some(id) => (id, false),
        None => (SessionId::new(), true),
    };
    req.extensions_mut().insert(session);

    let mut resp = next.run(req).await;

    if issued {
        let value = format!("{}={session}; Path=/; HttpOnly; SameSite=Lax", cookie.name);
        match HeaderValue::from_str(&value) {
            Ok(v) => {
                resp.headers_mut().append(SET_COOKIE, v);
                tracing::debug!(%session, "issued session cookie");
            }
            Err(e) => tracing::warn!("invalid session cookie header: {e}"),
        }
    }
    resp
}

fn read_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for c in cookies {
            map.append(COOKIE, HeaderValue::from_str(c).unwrap());
        }
        map
    }

    #[test]
    fn finds_named_cookie_among_others() {
        let h = headers(&["theme=dark; lectern_session=abc ; lang=en"]);
        assert_eq!(read_cookie(&h, "lectern_session"), Some("abc"));
    }

    #[test]
    fn searches_multiple_cookie_headers() {
        let h = headers(&["a=1", "lectern_session=xyz"]);
        assert_eq!(read_cookie(&h, "lectern_session"), Some("xyz"));
    }

    #[test]
    fn missing_cookie() {
        let h = headers(&["lectern_session_old=1"]);
        assert_eq!(read_cookie(&h, "lectern_session"), None);
        assert_eq!(read_cookie(&HeaderMap::new(), "lectern_session"), None);
    }
}
