//! Fehlertypen fuer den Echtzeit-Hub

use stammtisch_core::{StammtischError, UserId};
use thiserror::Error;

/// Fehlertyp fuer den Echtzeit-Hub
#[derive(Debug, Error)]
pub enum HubError {
    /// Authentifizierung beim Verbindungsaufbau fehlgeschlagen
    #[error("Authentifizierung fehlgeschlagen: {0}")]
    Authentifizierung(String),

    /// Ungueltige oder unvollstaendige Nachricht (wird verworfen,
    /// die Verbindung bleibt bestehen)
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    /// Der Empfaenger einer Direktnachricht ist nicht online
    #[error("Empfaenger {0} ist nicht online")]
    EmpfaengerOffline(UserId),

    /// Persistenz fehlgeschlagen – die Nachricht wird nicht verteilt,
    /// damit Live-Ansicht und Datenbank konsistent bleiben
    #[error("Persistenz fehlgeschlagen: {0}")]
    Persistenz(#[from] StammtischError),

    /// Socket-Lese- oder Schreibfehler
    #[error("Transportfehler: {0}")]
    Transport(String),
}

impl HubError {
    /// Erstellt einen Fehler fuer eine ungueltige Nachricht
    pub fn ungueltig(msg: impl Into<String>) -> Self {
        Self::UngueltigeNachricht(msg.into())
    }
}

/// Result-Typ fuer den Echtzeit-Hub
pub type HubResult<T> = Result<T, HubError>;
