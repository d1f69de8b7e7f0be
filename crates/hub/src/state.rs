//! Gemeinsamer Hub-Zustand
//!
//! Haelt Konfiguration, Kollaborateure und die beiden Registries als
//! Arc-Referenzen, die sicher zwischen tokio-Tasks geteilt werden koennen.
//! Dazu gehoert die interne Ereignis-Queue: serverseitig erzeugte
//! Nachrichten (z.B. das `user_online` beim Verbindungsaufbau) werden
//! nicht-blockierend eingereiht und von einer einzigen Hub-Schleife
//! verteilt, damit der annehmende Task nie auf Verteil-Kontention wartet.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::nachricht::Nachricht;
use crate::presence::PresenceManager;
use crate::speicher::{ForumSpeicher, SessionPruefer};
use crate::verteiler::NachrichtenVerteiler;

// ---------------------------------------------------------------------------
// HubKonfig
// ---------------------------------------------------------------------------

/// Konfiguration fuer den Echtzeit-Hub
#[derive(Debug, Clone)]
pub struct HubKonfig {
    /// Lese-Deadline in Sekunden: kommt innerhalb dieser Zeit kein Frame
    /// an, gilt die Verbindung als tot
    pub verbindungs_timeout_sek: u64,
    /// Kapazitaet des Postfachs einer Verbindung
    pub postfach_groesse: usize,
    /// Kapazitaet der internen Ereignis-Queue
    pub intern_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_nachricht_bytes: usize,
}

impl Default for HubKonfig {
    fn default() -> Self {
        Self {
            verbindungs_timeout_sek: 60,
            postfach_groesse: 256,
            intern_queue_groesse: 64,
            max_nachricht_bytes: 10_000,
        }
    }
}

impl HubKonfig {
    /// Lese-Deadline als Duration
    pub fn verbindungs_timeout(&self) -> Duration {
        Duration::from_secs(self.verbindungs_timeout_sek)
    }

    /// Ping-Intervall der Sende-Schleife: 90% der Lese-Deadline, damit
    /// die Probe rechtzeitig vor Ablauf der Deadline rausgeht
    pub fn ping_intervall(&self) -> Duration {
        self.verbindungs_timeout() * 9 / 10
    }
}

// ---------------------------------------------------------------------------
// HubState
// ---------------------------------------------------------------------------

/// Gemeinsamer Hub-Zustand (thread-safe, Arc-geteilt)
pub struct HubState {
    /// Hub-Konfiguration
    pub konfig: HubKonfig,
    /// Session-Aufloesung (Authentifizierungs-Kollaborateur)
    pub sessions: Arc<dyn SessionPruefer>,
    /// Persistenz-Kollaborateur des Forums
    pub speicher: Arc<dyn ForumSpeicher>,
    /// Praesenz-Registry
    pub presence: PresenceManager,
    /// Verbindungs-Registry und Fan-out
    pub verteiler: NachrichtenVerteiler,
    /// Sender der internen Ereignis-Queue
    intern_tx: mpsc::Sender<Nachricht>,
    /// Empfaenger der internen Ereignis-Queue, bis zum Start geparkt
    intern_rx: Mutex<Option<mpsc::Receiver<Nachricht>>>,
}

impl HubState {
    /// Erstellt einen neuen HubState
    pub fn neu(
        konfig: HubKonfig,
        sessions: Arc<dyn SessionPruefer>,
        speicher: Arc<dyn ForumSpeicher>,
    ) -> Arc<Self> {
        let presence = PresenceManager::neu();
        let verteiler = NachrichtenVerteiler::neu(presence.clone(), konfig.postfach_groesse);
        let (intern_tx, intern_rx) = mpsc::channel(konfig.intern_queue_groesse.max(1));

        Arc::new(Self {
            konfig,
            sessions,
            speicher,
            presence,
            verteiler,
            intern_tx,
            intern_rx: Mutex::new(Some(intern_rx)),
        })
    }

    /// Startet die Hub-Schleife, die intern erzeugte Ereignisse verteilt
    ///
    /// Darf nur einmal aufgerufen werden; weitere Aufrufe sind No-ops.
    pub fn starten(self: &Arc<Self>) {
        let Some(mut intern_rx) = self.intern_rx.lock().take() else {
            tracing::warn!("Hub-Schleife laeuft bereits");
            return;
        };

        let state = Arc::clone(self);
        tokio::spawn(async move {
            tracing::debug!("Hub-Schleife gestartet");
            while let Some(nachricht) = intern_rx.recv().await {
                state.verteiler.verteilen(&nachricht);
            }
            tracing::debug!("Hub-Schleife beendet");
        });
    }

    /// Reiht ein serverseitig erzeugtes Ereignis in die Hub-Queue ein
    ///
    /// Nicht-blockierend; bei voller Queue wird das Ereignis verworfen
    /// und gewarnt.
    pub fn intern_einreihen(&self, nachricht: Nachricht) {
        if let Err(e) = self.intern_tx.try_send(nachricht) {
            tracing::warn!(fehler = %e, "Interne Ereignis-Queue voll – Ereignis verworfen");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use stammtisch_core::{PostId, Result, StammtischError, UserId};

    struct KeineSessions;

    #[async_trait]
    impl SessionPruefer for KeineSessions {
        async fn session_aufloesen(&self, _token: &str) -> Result<UserId> {
            Err(StammtischError::SessionUnbekannt)
        }
    }

    struct KeinSpeicher;

    #[async_trait]
    impl ForumSpeicher for KeinSpeicher {
        async fn nachricht_speichern(
            &self,
            _sender: UserId,
            _empfaenger: UserId,
            _inhalt: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn kommentar_speichern(
            &self,
            _post: PostId,
            _verfasser: UserId,
            _inhalt: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn anzeigename(&self, benutzer: UserId) -> Result<String> {
            Ok(format!("User {}", benutzer.inner()))
        }
    }

    fn test_state() -> Arc<HubState> {
        HubState::neu(
            HubKonfig::default(),
            Arc::new(KeineSessions),
            Arc::new(KeinSpeicher),
        )
    }

    #[test]
    fn ping_intervall_ist_90_prozent_der_deadline() {
        let konfig = HubKonfig::default();
        assert_eq!(konfig.verbindungs_timeout(), Duration::from_secs(60));
        assert_eq!(konfig.ping_intervall(), Duration::from_secs(54));
    }

    #[tokio::test]
    async fn hub_schleife_verteilt_interne_ereignisse() {
        let state = test_state();
        state.starten();

        let (_id, mut rx) = state.verteiler.verbindung_registrieren(UserId(1));
        state.intern_einreihen(Nachricht::benutzer_online(UserId(1)));

        let text = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("Hub-Schleife muss zustellen")
            .expect("Postfach offen");
        assert!(text.contains("user_online"));
    }

    #[tokio::test]
    async fn doppelter_start_ist_noop() {
        let state = test_state();
        state.starten();
        state.starten();
    }
}
