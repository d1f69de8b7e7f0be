//! Fehlertypen fuer Stammtisch
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]`
//! konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Stammtisch
pub type Result<T> = std::result::Result<T, StammtischError>;

/// Alle moeglichen Fehler im Stammtisch-System
#[derive(Debug, Error)]
pub enum StammtischError {
    // --- Authentifizierung ---
    #[error("Authentifizierung fehlgeschlagen: {0}")]
    Authentifizierung(String),

    #[error("Session abgelaufen oder unbekannt")]
    SessionUnbekannt,

    // --- Ressourcen ---
    #[error("Benutzer nicht gefunden: {0}")]
    BenutzerNichtGefunden(String),

    #[error("Beitrag nicht gefunden: {0}")]
    BeitragNichtGefunden(String),

    // --- Persistenz ---
    #[error("Datenbankfehler: {0}")]
    Datenbank(String),

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl StammtischError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Datenbankfehler aus einer beliebigen Nachricht
    pub fn datenbank(msg: impl Into<String>) -> Self {
        Self::Datenbank(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = StammtischError::Authentifizierung("Session-Cookie fehlt".into());
        assert_eq!(
            e.to_string(),
            "Authentifizierung fehlgeschlagen: Session-Cookie fehlt"
        );
    }

    #[test]
    fn datenbank_hilfsfunktion() {
        let e = StammtischError::datenbank("insert fehlgeschlagen");
        assert!(matches!(e, StammtischError::Datenbank(_)));
    }
}
