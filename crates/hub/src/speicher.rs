//! Kollaborateur-Schnittstellen des Hubs
//!
//! Der Hub persistiert selbst nichts: Session-Aufloesung und Datenhaltung
//! liegen beim CRUD-Dienst des Forums. Diese Traits sind die Vertraege,
//! die der Hub von seinen Kollaborateuren konsumiert. Sie sind
//! objekt-sicher (`Arc<dyn ...>`), weil die Verbindungs-Tasks mit
//! `tokio::spawn` laufen und Send-Futures brauchen.

use async_trait::async_trait;
use stammtisch_core::{PostId, Result, UserId};

/// Loest Session-Tokens zu Benutzer-IDs auf
///
/// Wird genau einmal beim Verbindungsaufbau befragt; eine Neu-Validierung
/// pro Nachricht findet im Hub nicht statt.
#[async_trait]
pub trait SessionPruefer: Send + Sync {
    /// Gibt die Benutzer-ID zur Session zurueck oder einen Fehler,
    /// wenn die Session unbekannt oder abgelaufen ist
    async fn session_aufloesen(&self, token: &str) -> Result<UserId>;
}

/// Persistenz-Vertrag des Forums
#[async_trait]
pub trait ForumSpeicher: Send + Sync {
    /// Speichert eine Direktnachricht
    async fn nachricht_speichern(
        &self,
        sender: UserId,
        empfaenger: UserId,
        inhalt: &str,
    ) -> Result<()>;

    /// Speichert einen Kommentar unter einem Beitrag
    async fn kommentar_speichern(
        &self,
        post: PostId,
        verfasser: UserId,
        inhalt: &str,
    ) -> Result<()>;

    /// Gibt den Anzeigenamen eines Benutzers zurueck
    async fn anzeigename(&self, benutzer: UserId) -> Result<String>;
}
