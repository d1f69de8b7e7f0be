//! Client-Verbindung – Verwaltet eine einzelne WebSocket-Verbindung
//!
//! Jede Verbindung laeuft als zwei unabhaengig geplante Tasks: die
//! Empfangs-Schleife (liest Frames, reicht sie an den Router) und die
//! Sende-Schleife (leert das Postfach, schreibt Frames). Keine der beiden
//! wartet je auf I/O einer fremden Verbindung.
//!
//! ## State Machine
//! ```text
//! Verbindet -> Aktiv -> Trennend -> Geschlossen
//! ```
//!
//! ## Heartbeat
//! - Die Empfangs-Schleife begrenzt jedes Lesen auf `verbindungs_timeout`;
//!   jedes eintreffende Frame (auch Ping/Pong) setzt die Deadline zurueck
//! - Die Sende-Schleife schickt alle `ping_intervall` eine Liveness-Probe
//! - Deadline-Ablauf, Lese-/Schreibfehler oder ein Close-Frame beenden
//!   die Verbindung; eine halboffene Verbindung faellt damit spaetestens
//!   nach einem Timeout-Intervall auf

use axum::extract::ws::{Message as WsFrame, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use stammtisch_core::UserId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::nachricht::Nachricht;
use crate::router::NachrichtenRouter;
use crate::state::HubState;
use crate::verteiler::{AbmeldeErgebnis, VerbindungsId};

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand einer Client-Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbindungsZustand {
    /// Upgrade abgeschlossen, Registrierung laeuft
    Verbindet,
    /// Beide Schleifen laufen
    Aktiv,
    /// Abbau laeuft (Fehler, Close-Frame, Deadline oder Verdraengung)
    Trennend,
    /// Abbau abgeschlossen; wird nie wiederverwendet
    Geschlossen,
}

// ---------------------------------------------------------------------------
// ClientVerbindung
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne WebSocket-Verbindung
pub struct ClientVerbindung {
    state: Arc<HubState>,
    benutzer: UserId,
    zustand: VerbindungsZustand,
    verbindung: Option<VerbindungsId>,
}

impl ClientVerbindung {
    /// Erstellt eine neue ClientVerbindung fuer einen authentifizierten
    /// Benutzer
    pub fn neu(state: Arc<HubState>, benutzer: UserId) -> Self {
        Self {
            state,
            benutzer,
            zustand: VerbindungsZustand::Verbindet,
            verbindung: None,
        }
    }

    /// Betreut die Verbindung bis zu ihrem Ende
    ///
    /// Registriert die Verbindung (und verdraengt damit eine eventuell
    /// bestehende Session desselben Benutzers), startet die Sende-Schleife
    /// als eigenen Task und laeuft selbst als Empfangs-Schleife. Der Abbau
    /// raeumt genau einmal auf.
    pub async fn betreuen(mut self, socket: WebSocket) {
        let (verbindung, postfach) = self
            .state
            .verteiler
            .verbindung_registrieren(self.benutzer);
        self.verbindung = Some(verbindung);

        tracing::info!(
            benutzer = %self.benutzer,
            verbindung = %verbindung,
            anzahl = self.state.verteiler.verbindungs_anzahl(),
            "Benutzer verbunden"
        );

        // Online-Ereignis ueber die Hub-Queue, nicht auf diesem Task
        self.state
            .intern_einreihen(Nachricht::benutzer_online(self.benutzer));

        let (ws_tx, ws_rx) = socket.split();
        let sende_task = tokio::spawn(sende_schleife(
            ws_tx,
            postfach,
            self.state.konfig.ping_intervall(),
            self.benutzer,
        ));

        self.zustand = VerbindungsZustand::Aktiv;
        self.empfangs_schleife(ws_rx, sende_task).await;

        self.schliessen();
    }

    /// Empfangs-Schleife: liest Frames bis zum Verbindungsende
    async fn empfangs_schleife(
        &self,
        mut ws_rx: SplitStream<WebSocket>,
        mut sende_task: tokio::task::JoinHandle<()>,
    ) {
        let timeout = self.state.konfig.verbindungs_timeout();
        let router = NachrichtenRouter::neu(Arc::clone(&self.state));

        loop {
            tokio::select! {
                gelesen = tokio::time::timeout(timeout, ws_rx.next()) => {
                    match gelesen {
                        Err(_) => {
                            tracing::warn!(
                                benutzer = %self.benutzer,
                                "Lese-Deadline abgelaufen – Verbindung gilt als tot"
                            );
                            break;
                        }
                        Ok(None) => {
                            tracing::info!(benutzer = %self.benutzer, "Verbindung vom Client getrennt");
                            break;
                        }
                        Ok(Some(Err(e))) => {
                            let fehler = crate::error::HubError::Transport(e.to_string());
                            tracing::warn!(
                                benutzer = %self.benutzer,
                                fehler = %fehler,
                                "WebSocket-Lesefehler"
                            );
                            break;
                        }
                        Ok(Some(Ok(WsFrame::Text(text)))) => {
                            self.text_verarbeiten(&router, &text).await;
                        }
                        Ok(Some(Ok(WsFrame::Close(_)))) => {
                            tracing::info!(benutzer = %self.benutzer, "Close-Frame empfangen");
                            break;
                        }
                        // Ping/Pong/Binary zaehlen als Lebenszeichen; die
                        // Deadline beginnt mit dem naechsten Lesen neu
                        Ok(Some(Ok(_))) => {}
                    }
                }

                // Sende-Schleife weg (Schreibfehler oder Postfach zu):
                // Verbindung beenden
                _ = &mut sende_task => {
                    tracing::debug!(
                        benutzer = %self.benutzer,
                        "Sende-Schleife beendet – Empfangs-Schleife folgt"
                    );
                    break;
                }
            }
        }
    }

    /// Parst ein Text-Frame und reicht es an den Router
    ///
    /// Eine ungueltige Nachricht wird geloggt und verworfen; die
    /// Verbindung liest weiter.
    async fn text_verarbeiten(&self, router: &NachrichtenRouter, text: &str) {
        let nachricht: Nachricht = match serde_json::from_str(text) {
            Ok(nachricht) => nachricht,
            Err(e) => {
                tracing::warn!(
                    benutzer = %self.benutzer,
                    fehler = %e,
                    "Ungueltiges Nachrichtenformat – verworfen"
                );
                return;
            }
        };

        if let Err(e) = router.verarbeiten(nachricht, self.benutzer).await {
            tracing::warn!(
                benutzer = %self.benutzer,
                fehler = %e,
                "Nachricht nicht verarbeitet"
            );
        }
    }

    /// Baut die Verbindung ab – genau einmal
    fn schliessen(&mut self) {
        if self.zustand == VerbindungsZustand::Geschlossen {
            return;
        }
        self.zustand = VerbindungsZustand::Trennend;

        if let Some(verbindung) = self.verbindung {
            match self
                .state
                .verteiler
                .verbindung_entfernen(self.benutzer, verbindung)
            {
                AbmeldeErgebnis::Ersetzt => {
                    // Der Benutzer ist mit einer neuen Session weiter online
                    tracing::debug!(
                        benutzer = %self.benutzer,
                        "Verbindung wurde ersetzt – kein user_offline"
                    );
                }
                AbmeldeErgebnis::Entfernt | AbmeldeErgebnis::Unbekannt => {
                    self.state
                        .intern_einreihen(Nachricht::benutzer_offline(self.benutzer));
                }
            }
        }

        self.zustand = VerbindungsZustand::Geschlossen;
        tracing::info!(
            benutzer = %self.benutzer,
            anzahl = self.state.verteiler.verbindungs_anzahl(),
            "Verbindungs-Task beendet"
        );
    }
}

// ---------------------------------------------------------------------------
// Sende-Schleife
// ---------------------------------------------------------------------------

/// Leert das Postfach der Verbindung und schreibt Liveness-Probes
///
/// Beendet sich bei Schreibfehlern oder wenn das Postfach geschlossen
/// wird (Abmeldung oder Verdraengung); im zweiten Fall geht vorher ein
/// Close-Frame raus.
async fn sende_schleife(
    mut ws_tx: SplitSink<WebSocket, WsFrame>,
    mut postfach: mpsc::Receiver<String>,
    ping_intervall: Duration,
    benutzer: UserId,
) {
    let start = tokio::time::Instant::now() + ping_intervall;
    let mut ticker = tokio::time::interval_at(start, ping_intervall);

    loop {
        tokio::select! {
            eintrag = postfach.recv() => {
                match eintrag {
                    Some(text) => {
                        if let Err(e) = ws_tx.send(WsFrame::Text(text)).await {
                            tracing::debug!(
                                benutzer = %benutzer,
                                fehler = %e,
                                "Senden fehlgeschlagen"
                            );
                            break;
                        }
                    }
                    None => {
                        let _ = ws_tx.send(WsFrame::Close(None)).await;
                        break;
                    }
                }
            }

            _ = ticker.tick() => {
                if let Err(e) = ws_tx.send(WsFrame::Ping(Vec::new())).await {
                    tracing::debug!(
                        benutzer = %benutzer,
                        fehler = %e,
                        "Liveness-Probe fehlgeschlagen"
                    );
                    break;
                }
            }
        }
    }
}
