//! In-Memory-Kollaborateure fuer Entwicklung und Integrationstests
//!
//! Die echte Session- und Datenhaltung liegt beim CRUD-Dienst des Forums
//! (eigene Anwendung, eigene Datenbank). Diese Implementierungen halten
//! alles im Speicher und machen den Server ohne den CRUD-Dienst
//! lauffaehig. Sessions legt im Normalbetrieb der CRUD-Dienst an.

use async_trait::async_trait;
use parking_lot::Mutex;
use stammtisch_core::{PostId, Result, StammtischError, UserId};
use stammtisch_hub::{ForumSpeicher, SessionPruefer};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// MemorySessions
// ---------------------------------------------------------------------------

/// Session-Tabelle im Speicher
#[derive(Default)]
pub struct MemorySessions {
    sessions: Mutex<HashMap<String, UserId>>,
}

impl MemorySessions {
    /// Erstellt eine leere Session-Tabelle
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt eine Session fuer einen Benutzer an
    pub fn session_anlegen(&self, token: impl Into<String>, benutzer: UserId) {
        self.sessions.lock().insert(token.into(), benutzer);
    }

    /// Entfernt eine Session
    pub fn session_entfernen(&self, token: &str) {
        self.sessions.lock().remove(token);
    }
}

#[async_trait]
impl SessionPruefer for MemorySessions {
    async fn session_aufloesen(&self, token: &str) -> Result<UserId> {
        self.sessions
            .lock()
            .get(token)
            .copied()
            .ok_or(StammtischError::SessionUnbekannt)
    }
}

// ---------------------------------------------------------------------------
// MemorySpeicher
// ---------------------------------------------------------------------------

/// Gespeicherte Direktnachricht
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GespeicherteNachricht {
    pub sender: UserId,
    pub empfaenger: UserId,
    pub inhalt: String,
}

/// Gespeicherter Kommentar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GespeicherterKommentar {
    pub post: PostId,
    pub verfasser: UserId,
    pub inhalt: String,
}

/// Forum-Persistenz im Speicher
#[derive(Default)]
pub struct MemorySpeicher {
    nachrichten: Mutex<Vec<GespeicherteNachricht>>,
    kommentare: Mutex<Vec<GespeicherterKommentar>>,
    anzeigenamen: Mutex<HashMap<UserId, String>>,
}

impl MemorySpeicher {
    /// Erstellt einen leeren Speicher
    pub fn neu() -> Self {
        Self::default()
    }

    /// Hinterlegt den Anzeigenamen eines Benutzers
    pub fn anzeigename_setzen(&self, benutzer: UserId, name: impl Into<String>) {
        self.anzeigenamen.lock().insert(benutzer, name.into());
    }

    /// Gibt alle gespeicherten Direktnachrichten zurueck (Kopie)
    pub fn nachrichten(&self) -> Vec<GespeicherteNachricht> {
        self.nachrichten.lock().clone()
    }

    /// Gibt alle gespeicherten Kommentare zurueck (Kopie)
    pub fn kommentare(&self) -> Vec<GespeicherterKommentar> {
        self.kommentare.lock().clone()
    }
}

#[async_trait]
impl ForumSpeicher for MemorySpeicher {
    async fn nachricht_speichern(
        &self,
        sender: UserId,
        empfaenger: UserId,
        inhalt: &str,
    ) -> Result<()> {
        self.nachrichten.lock().push(GespeicherteNachricht {
            sender,
            empfaenger,
            inhalt: inhalt.to_owned(),
        });
        Ok(())
    }

    async fn kommentar_speichern(
        &self,
        post: PostId,
        verfasser: UserId,
        inhalt: &str,
    ) -> Result<()> {
        self.kommentare.lock().push(GespeicherterKommentar {
            post,
            verfasser,
            inhalt: inhalt.to_owned(),
        });
        Ok(())
    }

    async fn anzeigename(&self, benutzer: UserId) -> Result<String> {
        self.anzeigenamen
            .lock()
            .get(&benutzer)
            .cloned()
            .ok_or_else(|| StammtischError::BenutzerNichtGefunden(benutzer.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_anlegen_und_aufloesen() {
        let sessions = MemorySessions::neu();
        sessions.session_anlegen("token-1", UserId(1));

        assert_eq!(
            sessions.session_aufloesen("token-1").await.unwrap(),
            UserId(1)
        );
        assert!(sessions.session_aufloesen("unbekannt").await.is_err());

        sessions.session_entfernen("token-1");
        assert!(sessions.session_aufloesen("token-1").await.is_err());
    }

    #[tokio::test]
    async fn nachrichten_und_kommentare_werden_gespeichert() {
        let speicher = MemorySpeicher::neu();

        speicher
            .nachricht_speichern(UserId(1), UserId(2), "hi")
            .await
            .unwrap();
        speicher
            .kommentar_speichern(PostId(7), UserId(1), "guter Punkt")
            .await
            .unwrap();

        assert_eq!(speicher.nachrichten().len(), 1);
        assert_eq!(speicher.nachrichten()[0].empfaenger, UserId(2));
        assert_eq!(speicher.kommentare()[0].post, PostId(7));
    }

    #[tokio::test]
    async fn anzeigename_lookup() {
        let speicher = MemorySpeicher::neu();
        speicher.anzeigename_setzen(UserId(1), "anna");

        assert_eq!(speicher.anzeigename(UserId(1)).await.unwrap(), "anna");
        assert!(speicher.anzeigename(UserId(9)).await.is_err());
    }
}
