//! Wire-Nachricht des Echtzeit-Hubs
//!
//! Beide Richtungen verwenden dasselbe JSON-Schema:
//! `{"type": string, "content": any, "sender": int, "timestamp": RFC3339}`.
//! Eingehende `sender`/`timestamp`-Felder werden ignoriert und serverseitig
//! ueberschrieben.
//!
//! ## ID-Koerzierung
//! Browser-Clients kodieren Ganzzahlen in JSON grundsaetzlich als
//! Fliesskommazahlen, gelegentlich auch als Strings. Alle ID-Felder werden
//! deshalb ueber eine einzige permissive Koerzierungsfunktion gelesen,
//! statt pro Handler eigene Varianten zu pflegen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stammtisch_core::{PostId, UserId};

use crate::error::{HubError, HubResult};

// ---------------------------------------------------------------------------
// NachrichtenTyp
// ---------------------------------------------------------------------------

/// Typ-Tag einer Hub-Nachricht
///
/// Unbekannte Tags werden nicht verworfen, sondern als `Unbekannt`
/// transportiert und unveraendert weitergereicht (Fail-open-Kompatibilitaet
/// mit aelteren Clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NachrichtenTyp {
    /// Direktnachricht zwischen zwei Benutzern
    ChatMessage,
    /// Neuer Kommentar unter einem Forum-Beitrag
    NewComment,
    /// Benutzer tippt gerade
    TypingStart,
    /// Benutzer tippt nicht mehr
    TypingStop,
    /// Benutzer ist online gegangen
    UserOnline,
    /// Benutzer ist offline gegangen
    UserOffline,
    /// Liveness-Probe vom Client
    Ping,
    /// Antwort auf eine Liveness-Probe
    Pong,
    /// Unbekannter Typ-Tag (wird durchgereicht)
    Unbekannt(String),
}

impl NachrichtenTyp {
    /// Gibt den Wire-Tag zurueck
    pub fn als_str(&self) -> &str {
        match self {
            Self::ChatMessage => "chat_message",
            Self::NewComment => "new_comment",
            Self::TypingStart => "typing_start",
            Self::TypingStop => "typing_stop",
            Self::UserOnline => "user_online",
            Self::UserOffline => "user_offline",
            Self::Ping => "ping",
            Self::Pong => "pong",
            Self::Unbekannt(roh) => roh,
        }
    }
}

impl From<String> for NachrichtenTyp {
    fn from(roh: String) -> Self {
        match roh.as_str() {
            "chat_message" => Self::ChatMessage,
            "new_comment" => Self::NewComment,
            "typing_start" => Self::TypingStart,
            "typing_stop" => Self::TypingStop,
            "user_online" => Self::UserOnline,
            "user_offline" => Self::UserOffline,
            "pong" => Self::Pong,
            // "ping" kommt von manchen Clients gross geschrieben
            _ if roh.eq_ignore_ascii_case("ping") => Self::Ping,
            _ => Self::Unbekannt(roh),
        }
    }
}

impl From<NachrichtenTyp> for String {
    fn from(typ: NachrichtenTyp) -> Self {
        match typ {
            NachrichtenTyp::Unbekannt(roh) => roh,
            andere => andere.als_str().to_owned(),
        }
    }
}

impl std::fmt::Display for NachrichtenTyp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.als_str())
    }
}

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Eine Hub-Nachricht (Wire-Format, beide Richtungen)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nachricht {
    /// Typ-Tag
    #[serde(rename = "type")]
    pub typ: NachrichtenTyp,
    /// Typabhaengige Nutzlast
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
    /// Absender – wird serverseitig mit dem authentifizierten Besitzer
    /// der Verbindung ueberschrieben, nie der Nutzlast geglaubt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<UserId>,
    /// Serverseitiger Zeitstempel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Aufgeloester Empfaenger fuer den Fan-out (nicht Teil des Wire-Formats)
    #[serde(skip)]
    pub empfaenger: Option<UserId>,
}

impl Nachricht {
    /// Erstellt eine neue Nachricht ohne Absender und Zeitstempel
    pub fn neu(typ: NachrichtenTyp, content: Value) -> Self {
        Self {
            typ,
            content,
            sender: None,
            timestamp: None,
            empfaenger: None,
        }
    }

    /// Serverseitig erzeugtes Online-Ereignis
    pub fn benutzer_online(benutzer: UserId) -> Self {
        Self {
            typ: NachrichtenTyp::UserOnline,
            content: Value::from(benutzer.inner()),
            sender: None,
            timestamp: Some(Utc::now()),
            empfaenger: None,
        }
    }

    /// Serverseitig erzeugtes Offline-Ereignis
    pub fn benutzer_offline(benutzer: UserId) -> Self {
        Self {
            typ: NachrichtenTyp::UserOffline,
            content: json!({ "userId": benutzer.inner() }),
            sender: None,
            timestamp: Some(Utc::now()),
            empfaenger: None,
        }
    }

    /// Pong-Antwort auf eine Liveness-Probe, adressiert nur an den Absender
    pub fn pong(benutzer: UserId) -> Self {
        Self {
            typ: NachrichtenTyp::Pong,
            content: Value::Null,
            sender: Some(benutzer),
            timestamp: Some(Utc::now()),
            empfaenger: Some(benutzer),
        }
    }

    /// Entscheidet ob die Nachricht an den gegebenen Benutzer geht
    ///
    /// Direktnachrichten und Tipp-Indikatoren gehen nur an Absender und
    /// aufgeloesten Empfaenger, Pongs nur an den Absender, alles andere
    /// an alle Verbindungen.
    pub fn ist_adressat(&self, benutzer: UserId) -> bool {
        match &self.typ {
            NachrichtenTyp::ChatMessage
            | NachrichtenTyp::TypingStart
            | NachrichtenTyp::TypingStop => {
                self.sender == Some(benutzer) || self.empfaenger == Some(benutzer)
            }
            NachrichtenTyp::Pong => self.sender == Some(benutzer),
            _ => true,
        }
    }
}

// ---------------------------------------------------------------------------
// ID-Koerzierung
// ---------------------------------------------------------------------------

fn ganzzahl_aus_wert(wert: &Value) -> Option<i64> {
    match wert {
        Value::Number(zahl) => zahl
            .as_i64()
            .or_else(|| zahl.as_f64().map(|f| f as i64)),
        Value::String(roh) => roh.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Koerziert einen JSON-Wert permissiv zu einer Benutzer-ID
///
/// Akzeptiert Zahl (auch Fliesskomma) und numerischen String; lehnt
/// nicht-positive Werte ab.
pub fn benutzer_id_aus_wert(wert: &Value) -> HubResult<UserId> {
    let roh = ganzzahl_aus_wert(wert)
        .ok_or_else(|| HubError::ungueltig(format!("Benutzer-ID nicht interpretierbar: {wert}")))?;
    let id = UserId(roh);
    if !id.ist_gueltig() {
        return Err(HubError::ungueltig(format!(
            "Benutzer-ID muss positiv sein: {roh}"
        )));
    }
    Ok(id)
}

/// Koerziert einen JSON-Wert permissiv zu einer Beitrags-ID
pub fn post_id_aus_wert(wert: &Value) -> HubResult<PostId> {
    let roh = ganzzahl_aus_wert(wert)
        .ok_or_else(|| HubError::ungueltig(format!("Beitrags-ID nicht interpretierbar: {wert}")))?;
    let id = PostId(roh);
    if !id.ist_gueltig() {
        return Err(HubError::ungueltig(format!(
            "Beitrags-ID muss positiv sein: {roh}"
        )));
    }
    Ok(id)
}

/// Liest eine Benutzer-ID aus einem `user_online`/`user_offline`-Content
///
/// Aeltere Clients senden die ID als nackte Zahl, neuere als
/// `{"userId": ...}` – beide Formen sind gueltig.
pub fn benutzer_id_aus_content(content: &Value) -> HubResult<UserId> {
    match content {
        Value::Object(felder) => {
            let wert = felder
                .get("userId")
                .ok_or_else(|| HubError::ungueltig("userId fehlt im Content"))?;
            benutzer_id_aus_wert(wert)
        }
        anderes => benutzer_id_aus_wert(anderes),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typ_tags_werden_erkannt() {
        assert_eq!(
            NachrichtenTyp::from("chat_message".to_string()),
            NachrichtenTyp::ChatMessage
        );
        assert_eq!(
            NachrichtenTyp::from("user_online".to_string()),
            NachrichtenTyp::UserOnline
        );
    }

    #[test]
    fn ping_ist_case_insensitiv() {
        assert_eq!(NachrichtenTyp::from("ping".to_string()), NachrichtenTyp::Ping);
        assert_eq!(NachrichtenTyp::from("PING".to_string()), NachrichtenTyp::Ping);
        assert_eq!(NachrichtenTyp::from("Ping".to_string()), NachrichtenTyp::Ping);
    }

    #[test]
    fn unbekannter_tag_bleibt_erhalten() {
        let typ = NachrichtenTyp::from("experimental_feature".to_string());
        assert_eq!(
            typ,
            NachrichtenTyp::Unbekannt("experimental_feature".to_string())
        );
        assert_eq!(String::from(typ), "experimental_feature");
    }

    #[test]
    fn koerzierung_akzeptiert_zahl_und_string() {
        assert_eq!(benutzer_id_aus_wert(&json!(7)).unwrap(), UserId(7));
        // Browser-JSON: Ganzzahlen kommen als Fliesskommazahlen an
        assert_eq!(benutzer_id_aus_wert(&json!(7.0)).unwrap(), UserId(7));
        assert_eq!(benutzer_id_aus_wert(&json!("7")).unwrap(), UserId(7));
    }

    #[test]
    fn koerzierung_lehnt_ungueltiges_ab() {
        assert!(benutzer_id_aus_wert(&json!(0)).is_err());
        assert!(benutzer_id_aus_wert(&json!(-3)).is_err());
        assert!(benutzer_id_aus_wert(&json!("abc")).is_err());
        assert!(benutzer_id_aus_wert(&json!([1, 2])).is_err());
        assert!(benutzer_id_aus_wert(&Value::Null).is_err());
    }

    #[test]
    fn content_koerzierung_beide_formen() {
        assert_eq!(benutzer_id_aus_content(&json!(5)).unwrap(), UserId(5));
        assert_eq!(
            benutzer_id_aus_content(&json!({ "userId": 5 })).unwrap(),
            UserId(5)
        );
        assert!(benutzer_id_aus_content(&json!({})).is_err());
    }

    #[test]
    fn empfaenger_ist_nicht_teil_des_wire_formats() {
        let mut nachricht = Nachricht::neu(NachrichtenTyp::ChatMessage, json!({ "content": "hi" }));
        nachricht.sender = Some(UserId(1));
        nachricht.empfaenger = Some(UserId(2));

        let json = serde_json::to_string(&nachricht).unwrap();
        assert!(!json.contains("empfaenger"));
        assert!(json.contains("\"type\":\"chat_message\""));

        let zurueck: Nachricht = serde_json::from_str(&json).unwrap();
        assert_eq!(zurueck.empfaenger, None);
        assert_eq!(zurueck.sender, Some(UserId(1)));
    }

    #[test]
    fn adressaten_regeln() {
        let mut chat = Nachricht::neu(NachrichtenTyp::ChatMessage, Value::Null);
        chat.sender = Some(UserId(1));
        chat.empfaenger = Some(UserId(2));
        assert!(chat.ist_adressat(UserId(1)));
        assert!(chat.ist_adressat(UserId(2)));
        assert!(!chat.ist_adressat(UserId(3)));

        let pong = Nachricht::pong(UserId(4));
        assert!(pong.ist_adressat(UserId(4)));
        assert!(!pong.ist_adressat(UserId(5)));

        let kommentar = Nachricht::neu(NachrichtenTyp::NewComment, Value::Null);
        assert!(kommentar.ist_adressat(UserId(9)));
    }

    #[test]
    fn offline_ereignis_traegt_objekt_content() {
        let nachricht = Nachricht::benutzer_offline(UserId(3));
        assert_eq!(nachricht.content, json!({ "userId": 3 }));
        assert!(nachricht.timestamp.is_some());
    }
}
