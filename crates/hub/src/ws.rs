//! WebSocket-Upgrade-Endpunkt und Praesenz-Abfrage
//!
//! Der Upgrade-Handler loest zuerst das Session-Cookie ueber den
//! Authentifizierungs-Kollaborateur auf; erst nach erfolgreicher
//! Aufloesung wird der Socket ueberhaupt upgegradet. Ohne gueltige
//! Session gibt es 401 und keine Verbindung.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use stammtisch_core::UserId;
use std::sync::Arc;

use crate::connection::ClientVerbindung;
use crate::state::HubState;

/// Name des Session-Cookies
pub const SESSION_COOKIE: &str = "session_id";

/// Upgrade-Handler: `GET /ws`
pub async fn ws_verbindung(
    State(state): State<Arc<HubState>>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let token = match session_cookie(&headers) {
        Some(token) => token,
        None => {
            tracing::warn!("WebSocket-Anfrage ohne Session-Cookie abgelehnt");
            return (StatusCode::UNAUTHORIZED, "Kein Session-Cookie").into_response();
        }
    };

    let benutzer = match state.sessions.session_aufloesen(&token).await {
        Ok(benutzer) => benutzer,
        Err(e) => {
            let fehler = crate::error::HubError::Authentifizierung(e.to_string());
            tracing::warn!(fehler = %fehler, "WebSocket-Anfrage mit ungueltiger Session abgelehnt");
            return (StatusCode::UNAUTHORIZED, "Ungueltige Session").into_response();
        }
    };

    tracing::debug!(benutzer = %benutzer, "WebSocket-Upgrade");
    ws.max_message_size(state.konfig.max_nachricht_bytes)
        .on_upgrade(move |socket| ClientVerbindung::neu(state, benutzer).betreuen(socket))
}

/// Praesenz-Abfrage: `GET /v1/online`
///
/// Snapshot der aktuell verbundenen Benutzer; wird vom CRUD-Dienst
/// genutzt, um Benutzerlisten zu annotieren.
pub async fn online_benutzer(State(state): State<Arc<HubState>>) -> Json<Vec<UserId>> {
    Json(state.presence.online_liste())
}

/// Liest das Session-Cookie aus den Request-Headern
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let roh = headers.get(header::COOKIE)?.to_str().ok()?;
    roh.split(';').find_map(|teil| {
        let (name, wert) = teil.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| wert.to_owned())
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_mit_cookie(wert: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(wert).unwrap());
        headers
    }

    #[test]
    fn cookie_wird_gefunden() {
        let headers = headers_mit_cookie("session_id=abc123");
        assert_eq!(session_cookie(&headers), Some("abc123".to_owned()));
    }

    #[test]
    fn cookie_zwischen_anderen() {
        let headers = headers_mit_cookie("theme=dunkel; session_id=abc123; lang=de");
        assert_eq!(session_cookie(&headers), Some("abc123".to_owned()));
    }

    #[test]
    fn fehlendes_cookie() {
        assert_eq!(session_cookie(&HeaderMap::new()), None);
        let headers = headers_mit_cookie("theme=dunkel");
        assert_eq!(session_cookie(&headers), None);
    }
}
