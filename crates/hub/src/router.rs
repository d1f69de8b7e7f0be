//! Nachrichten-Router – Typabhaengige Verarbeitung eingehender Nachrichten
//!
//! Der Router setzt zuerst die Vertrauensgrenze durch: `sender` wird mit
//! dem authentifizierten Besitzer der Verbindung ueberschrieben und der
//! Zeitstempel serverseitig gesetzt. Danach greift die typabhaengige
//! Policy:
//!
//! - `chat_message`   – Empfaenger muss online sein; persistieren, dann
//!                      Fan-out an {Absender, Empfaenger}
//! - `new_comment`    – persistieren, dann Fan-out an alle
//! - `typing_start` / `typing_stop` – Empfaenger muss online sein; mit
//!                      Anzeigename anreichern, Fan-out an {Absender,
//!                      Empfaenger}
//! - `user_online` / `user_offline` – Praesenz aktualisieren, Fan-out an
//!                      alle
//! - `ping`           – Pong nur an den Absender
//! - alles andere     – unveraendert an alle durchreichen (Fail-open)
//!
//! Eine ungueltige Nachricht fuehrt nie zum Verbindungsabbruch: der
//! Fehler geht an die Empfangs-Schleife, die loggt und weiterliest.

use chrono::Utc;
use serde_json::Value;
use stammtisch_core::UserId;
use std::sync::Arc;

use crate::error::{HubError, HubResult};
use crate::nachricht::{
    benutzer_id_aus_content, benutzer_id_aus_wert, post_id_aus_wert, Nachricht, NachrichtenTyp,
};
use crate::state::HubState;

/// Zentraler Nachrichten-Router
pub struct NachrichtenRouter {
    state: Arc<HubState>,
}

impl NachrichtenRouter {
    /// Erstellt einen neuen Router
    pub fn neu(state: Arc<HubState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende Nachricht des gegebenen Absenders
    pub async fn verarbeiten(
        &self,
        mut nachricht: Nachricht,
        absender: UserId,
    ) -> HubResult<()> {
        // Vertrauensgrenze: Absender und Zeitstempel kommen vom Server
        nachricht.sender = Some(absender);
        nachricht.timestamp = Some(Utc::now());

        match nachricht.typ.clone() {
            NachrichtenTyp::ChatMessage => self.chat_nachricht(nachricht, absender).await,
            NachrichtenTyp::NewComment => self.neuer_kommentar(nachricht, absender).await,
            NachrichtenTyp::TypingStart | NachrichtenTyp::TypingStop => {
                self.tipp_indikator(nachricht, absender).await
            }
            NachrichtenTyp::UserOnline => self.benutzer_online(nachricht),
            NachrichtenTyp::UserOffline => self.benutzer_offline(nachricht),
            NachrichtenTyp::Ping => {
                self.state.verteiler.verteilen(&Nachricht::pong(absender));
                Ok(())
            }
            NachrichtenTyp::Pong | NachrichtenTyp::Unbekannt(_) => {
                tracing::debug!(
                    typ = %nachricht.typ,
                    benutzer = %absender,
                    "Nicht behandelter Nachrichtentyp – wird unveraendert durchgereicht"
                );
                self.state.verteiler.verteilen(&nachricht);
                Ok(())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Typ-Handler
    // -----------------------------------------------------------------------

    async fn chat_nachricht(
        &self,
        mut nachricht: Nachricht,
        absender: UserId,
    ) -> HubResult<()> {
        let empfaenger = benutzer_id_aus_wert(
            nachricht
                .content
                .get("receiverId")
                .ok_or_else(|| HubError::ungueltig("receiverId fehlt in chat_message"))?,
        )?;

        // Der Empfaenger muss online sein, BEVOR persistiert wird – sonst
        // weder Datensatz noch Broadcast
        if !self.state.presence.ist_online(empfaenger) {
            return Err(HubError::EmpfaengerOffline(empfaenger));
        }

        let inhalt = nachricht
            .content
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| HubError::ungueltig("content fehlt oder ist kein String"))?;
        if inhalt.is_empty() {
            return Err(HubError::ungueltig("leerer Nachrichtentext"));
        }
        let inhalt = inhalt.to_owned();

        self.state
            .speicher
            .nachricht_speichern(absender, empfaenger, &inhalt)
            .await?;

        // receiverId im Content normalisieren ("2" wird zu 2)
        if let Some(felder) = nachricht.content.as_object_mut() {
            felder.insert("receiverId".into(), Value::from(empfaenger.inner()));
        }
        nachricht.empfaenger = Some(empfaenger);
        self.state.verteiler.verteilen(&nachricht);

        tracing::debug!(von = %absender, an = %empfaenger, "Chat-Nachricht verteilt");
        Ok(())
    }

    async fn neuer_kommentar(
        &self,
        mut nachricht: Nachricht,
        absender: UserId,
    ) -> HubResult<()> {
        let post = post_id_aus_wert(
            nachricht
                .content
                .get("postId")
                .ok_or_else(|| HubError::ungueltig("postId fehlt in new_comment"))?,
        )?;

        let inhalt = nachricht
            .content
            .get("content")
            .and_then(Value::as_str)
            .ok_or_else(|| HubError::ungueltig("content fehlt oder ist kein String"))?;
        if inhalt.is_empty() {
            return Err(HubError::ungueltig("leerer Kommentartext"));
        }
        let inhalt = inhalt.to_owned();

        self.state
            .speicher
            .kommentar_speichern(post, absender, &inhalt)
            .await?;

        if let Some(felder) = nachricht.content.as_object_mut() {
            felder.insert("postId".into(), Value::from(post.inner()));
        }
        self.state.verteiler.verteilen(&nachricht);

        tracing::debug!(von = %absender, post = %post, "Kommentar verteilt");
        Ok(())
    }

    async fn tipp_indikator(
        &self,
        mut nachricht: Nachricht,
        absender: UserId,
    ) -> HubResult<()> {
        let empfaenger = benutzer_id_aus_wert(
            nachricht
                .content
                .get("receiverId")
                .ok_or_else(|| HubError::ungueltig("receiverId fehlt im Tipp-Indikator"))?,
        )?;

        if !self.state.presence.ist_online(empfaenger) {
            return Err(HubError::EmpfaengerOffline(empfaenger));
        }

        // Anzeigename anreichern; bei Fehler generischer Name statt Abbruch
        let name = match self.state.speicher.anzeigename(absender).await {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!(
                    benutzer = %absender,
                    fehler = %e,
                    "Anzeigename nicht verfuegbar – generischer Name"
                );
                format!("User {}", absender.inner())
            }
        };

        if let Some(felder) = nachricht.content.as_object_mut() {
            felder.insert("senderName".into(), Value::from(name));
        }
        nachricht.empfaenger = Some(empfaenger);
        self.state.verteiler.verteilen(&nachricht);
        Ok(())
    }

    fn benutzer_online(&self, nachricht: Nachricht) -> HubResult<()> {
        let benutzer = benutzer_id_aus_content(&nachricht.content)?;
        self.state.presence.online_setzen(benutzer);
        self.state.verteiler.verteilen(&nachricht);
        Ok(())
    }

    fn benutzer_offline(&self, nachricht: Nachricht) -> HubResult<()> {
        let benutzer = benutzer_id_aus_content(&nachricht.content)?;
        self.state.presence.offline_setzen(benutzer);
        self.state.verteiler.verteilen(&nachricht);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
