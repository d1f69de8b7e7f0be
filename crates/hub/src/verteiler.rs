//! Nachrichten-Verteiler – Verbindungs-Registry und Fan-out
//!
//! Der `NachrichtenVerteiler` verwaltet die Postfaecher aller lebenden
//! Verbindungen und ist der einzige Serialisierungspunkt fuer den Fan-out:
//! pro Nachricht wird die Registry einmal gesperrt und die komplette
//! Zustellrunde unter dieser Sperre ausgefuehrt, sodass ein nebenlaeufiger
//! Verbindungsauf- oder -abbau nie mitten in einer Runde sichtbar wird.
//!
//! ## Backpressure
//! Einreihen in ein Postfach ist nicht-blockierend. Ist ein Postfach voll,
//! liest der Client zu langsam – die Verbindung wird sofort aus Registry
//! und Praesenz entfernt statt den Verteiler zu blockieren. Andere
//! Empfaenger derselben Runde sind davon nicht betroffen.
//!
//! ## Eine Session pro Benutzer
//! Bei einer Neuregistrierung fuer einen bereits verbundenen Benutzer wird
//! das alte Postfach verdraengt (geschlossen); die alte Sende-Schleife
//! beendet sich darueber von selbst. Abmeldungen sind ueber eine
//! Registrierungs-ID abgesichert, damit eine verdraengte Verbindung beim
//! Aufraeumen nie den Eintrag ihrer Nachfolgerin entfernt.

use parking_lot::Mutex;
use stammtisch_core::UserId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::nachricht::Nachricht;
use crate::presence::PresenceManager;

// ---------------------------------------------------------------------------
// VerbindungsId
// ---------------------------------------------------------------------------

/// Eindeutige Registrierungs-ID einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerbindungsId(Uuid);

impl VerbindungsId {
    fn neu() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "verbindung:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ClientPostfach
// ---------------------------------------------------------------------------

/// Handle auf das Postfach einer verbundenen Sende-Schleife
struct ClientPostfach {
    verbindungs_id: VerbindungsId,
    tx: mpsc::Sender<String>,
}

enum SendeErgebnis {
    Eingereiht,
    PostfachVoll,
    PostfachGeschlossen,
}

impl ClientPostfach {
    /// Reiht eine serialisierte Nachricht nicht-blockierend ein
    fn einreihen(&self, text: String) -> SendeErgebnis {
        match self.tx.try_send(text) {
            Ok(()) => SendeErgebnis::Eingereiht,
            Err(mpsc::error::TrySendError::Full(_)) => SendeErgebnis::PostfachVoll,
            Err(mpsc::error::TrySendError::Closed(_)) => SendeErgebnis::PostfachGeschlossen,
        }
    }
}

// ---------------------------------------------------------------------------
// AbmeldeErgebnis
// ---------------------------------------------------------------------------

/// Ergebnis einer Verbindungs-Abmeldung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbmeldeErgebnis {
    /// Der eigene Eintrag wurde entfernt, der Benutzer ist jetzt offline
    Entfernt,
    /// Eine neuere Verbindung desselben Benutzers besitzt den Eintrag –
    /// der Benutzer bleibt online
    Ersetzt,
    /// Kein Eintrag vorhanden (bereits durch den Verteiler verdraengt)
    Unbekannt,
}

// ---------------------------------------------------------------------------
// NachrichtenVerteiler
// ---------------------------------------------------------------------------

/// Verbindungs-Registry und zentraler Fan-out-Punkt
///
/// Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct NachrichtenVerteiler {
    inner: Arc<VerteilerInner>,
}

struct VerteilerInner {
    /// Postfaecher, indiziert nach Benutzer (eine Session pro Benutzer)
    verbindungen: Mutex<HashMap<UserId, ClientPostfach>>,
    /// Praesenz-Registry, wird bei Registrierung/Abmeldung/Verdraengung
    /// synchron mitgefuehrt
    presence: PresenceManager,
    /// Kapazitaet eines Postfachs
    postfach_groesse: usize,
}

impl NachrichtenVerteiler {
    /// Erstellt einen neuen Verteiler
    pub fn neu(presence: PresenceManager, postfach_groesse: usize) -> Self {
        Self {
            inner: Arc::new(VerteilerInner {
                verbindungen: Mutex::new(HashMap::new()),
                presence,
                postfach_groesse: postfach_groesse.max(1),
            }),
        }
    }

    /// Registriert eine neue Verbindung und gibt ihr Postfach zurueck
    ///
    /// Eine bestehende Verbindung desselben Benutzers wird verdraengt:
    /// ihr Postfach wird geschlossen und ihre Sende-Schleife beendet sich.
    /// Der Benutzer wird als online markiert.
    pub fn verbindung_registrieren(
        &self,
        benutzer: UserId,
    ) -> (VerbindungsId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.inner.postfach_groesse);
        let id = VerbindungsId::neu();

        let vorherige = self.inner.verbindungen.lock().insert(
            benutzer,
            ClientPostfach {
                verbindungs_id: id,
                tx,
            },
        );
        if vorherige.is_some() {
            tracing::info!(
                benutzer = %benutzer,
                "Bestehende Verbindung verdraengt (neue Session)"
            );
        }

        self.inner.presence.online_setzen(benutzer);
        tracing::debug!(benutzer = %benutzer, verbindung = %id, "Verbindung registriert");
        (id, rx)
    }

    /// Meldet eine Verbindung ab
    ///
    /// Entfernt den Eintrag nur, wenn die Registrierungs-ID noch passt –
    /// bei einem Reconnect-Rennen gehoert der Eintrag sonst bereits der
    /// Nachfolge-Verbindung.
    pub fn verbindung_entfernen(
        &self,
        benutzer: UserId,
        id: VerbindungsId,
    ) -> AbmeldeErgebnis {
        let mut verbindungen = self.inner.verbindungen.lock();
        let eigener_eintrag = verbindungen
            .get(&benutzer)
            .map(|postfach| postfach.verbindungs_id == id);

        match eigener_eintrag {
            Some(true) => {
                verbindungen.remove(&benutzer);
                drop(verbindungen);
                self.inner.presence.offline_setzen(benutzer);
                tracing::debug!(benutzer = %benutzer, verbindung = %id, "Verbindung abgemeldet");
                AbmeldeErgebnis::Entfernt
            }
            Some(false) => AbmeldeErgebnis::Ersetzt,
            None => AbmeldeErgebnis::Unbekannt,
        }
    }

    /// Prueft ob fuer den Benutzer eine Verbindung registriert ist
    pub fn ist_registriert(&self, benutzer: UserId) -> bool {
        self.inner.verbindungen.lock().contains_key(&benutzer)
    }

    /// Gibt die Anzahl der registrierten Verbindungen zurueck
    pub fn verbindungs_anzahl(&self) -> usize {
        self.inner.verbindungen.lock().len()
    }

    /// Verteilt eine Nachricht an alle adressierten Verbindungen
    ///
    /// Die Nachricht wird einmal serialisiert; die komplette Zustellrunde
    /// laeuft unter der Registry-Sperre. Volle oder geschlossene
    /// Postfaecher werden noch in derselben Runde aus Registry und
    /// Praesenz entfernt. Gibt die Anzahl erfolgreicher Zustellungen
    /// zurueck.
    pub fn verteilen(&self, nachricht: &Nachricht) -> usize {
        let text = match serde_json::to_string(nachricht) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(
                    typ = %nachricht.typ,
                    fehler = %e,
                    "Nachricht nicht serialisierbar – Fan-out abgebrochen"
                );
                return 0;
            }
        };

        let mut verbindungen = self.inner.verbindungen.lock();
        let mut gesendet = 0usize;
        let mut verdraengte: Vec<UserId> = Vec::new();

        for (benutzer, postfach) in verbindungen.iter() {
            if !nachricht.ist_adressat(*benutzer) {
                continue;
            }

            match postfach.einreihen(text.clone()) {
                SendeErgebnis::Eingereiht => gesendet += 1,
                SendeErgebnis::PostfachVoll => {
                    tracing::warn!(
                        benutzer = %benutzer,
                        "Postfach voll – langsame Verbindung wird verdraengt"
                    );
                    verdraengte.push(*benutzer);
                }
                SendeErgebnis::PostfachGeschlossen => {
                    tracing::debug!(
                        benutzer = %benutzer,
                        "Postfach bereits geschlossen – Eintrag wird entfernt"
                    );
                    verdraengte.push(*benutzer);
                }
            }
        }

        for benutzer in &verdraengte {
            verbindungen.remove(benutzer);
        }
        drop(verbindungen);

        for benutzer in verdraengte {
            self.inner.presence.offline_setzen(benutzer);
        }

        if nachricht.typ != crate::nachricht::NachrichtenTyp::Pong {
            tracing::debug!(typ = %nachricht.typ, anzahl = gesendet, "Nachricht verteilt");
        }
        gesendet
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nachricht::NachrichtenTyp;
    use serde_json::json;

    fn test_verteiler(postfach_groesse: usize) -> NachrichtenVerteiler {
        NachrichtenVerteiler::neu(PresenceManager::neu(), postfach_groesse)
    }

    fn rundruf() -> Nachricht {
        Nachricht::neu(NachrichtenTyp::NewComment, json!({ "postId": 1 }))
    }

    fn direktnachricht(von: UserId, an: UserId) -> Nachricht {
        let mut nachricht = Nachricht::neu(NachrichtenTyp::ChatMessage, json!({ "content": "hi" }));
        nachricht.sender = Some(von);
        nachricht.empfaenger = Some(an);
        nachricht
    }

    #[tokio::test]
    async fn registrieren_und_verteilen() {
        let verteiler = test_verteiler(8);
        let (_id, mut rx) = verteiler.verbindung_registrieren(UserId(1));

        assert!(verteiler.ist_registriert(UserId(1)));
        assert_eq!(verteiler.verteilen(&rundruf()), 1);

        let text = rx.try_recv().expect("Nachricht muss vorhanden sein");
        assert!(text.contains("new_comment"));
    }

    #[tokio::test]
    async fn praesenz_folgt_registry() {
        let presence = PresenceManager::neu();
        let verteiler = NachrichtenVerteiler::neu(presence.clone(), 8);

        let (id, _rx) = verteiler.verbindung_registrieren(UserId(1));
        assert!(presence.ist_online(UserId(1)));

        assert_eq!(
            verteiler.verbindung_entfernen(UserId(1), id),
            AbmeldeErgebnis::Entfernt
        );
        assert!(!presence.ist_online(UserId(1)));
        assert!(!verteiler.ist_registriert(UserId(1)));
    }

    #[tokio::test]
    async fn zweite_session_verdraengt_die_erste() {
        let presence = PresenceManager::neu();
        let verteiler = NachrichtenVerteiler::neu(presence.clone(), 8);

        let (alte_id, mut alte_rx) = verteiler.verbindung_registrieren(UserId(1));
        let (_neue_id, mut neue_rx) = verteiler.verbindung_registrieren(UserId(1));

        // Hoechstens eine lebende Verbindung pro Benutzer
        assert_eq!(verteiler.verbindungs_anzahl(), 1);

        // Das alte Postfach ist geschlossen
        assert!(matches!(
            alte_rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));

        // Aufraeumen der verdraengten Verbindung trifft nie die Nachfolgerin
        assert_eq!(
            verteiler.verbindung_entfernen(UserId(1), alte_id),
            AbmeldeErgebnis::Ersetzt
        );
        assert!(presence.ist_online(UserId(1)));
        assert_eq!(verteiler.verteilen(&rundruf()), 1);
        assert!(neue_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn chat_geht_nur_an_absender_und_empfaenger() {
        let verteiler = test_verteiler(8);
        let (_a, mut rx_a) = verteiler.verbindung_registrieren(UserId(1));
        let (_b, mut rx_b) = verteiler.verbindung_registrieren(UserId(2));
        let (_c, mut rx_c) = verteiler.verbindung_registrieren(UserId(3));

        let gesendet = verteiler.verteilen(&direktnachricht(UserId(1), UserId(2)));
        assert_eq!(gesendet, 2);

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_c.try_recv().is_err(), "Dritte duerfen nichts empfangen");
    }

    #[tokio::test]
    async fn volles_postfach_wird_verdraengt() {
        let presence = PresenceManager::neu();
        let verteiler = NachrichtenVerteiler::neu(presence.clone(), 1);

        let (_langsam, _rx_voll) = verteiler.verbindung_registrieren(UserId(1));
        let (_schnell, mut rx_ok) = verteiler.verbindung_registrieren(UserId(2));

        // Erste Runde fuellt beide Postfaecher (Kapazitaet 1);
        // Benutzer 2 liest seins sofort leer, Benutzer 1 nicht
        assert_eq!(verteiler.verteilen(&rundruf()), 2);
        assert!(rx_ok.try_recv().is_ok());

        // Zweite Runde: Benutzer 1 liest nicht – Verdraengung, Benutzer 2
        // bekommt die Nachricht trotzdem
        let gesendet = verteiler.verteilen(&rundruf());
        assert_eq!(gesendet, 1);
        assert!(!verteiler.ist_registriert(UserId(1)));
        assert!(!presence.ist_online(UserId(1)));
        assert!(presence.ist_online(UserId(2)));

        assert!(rx_ok.try_recv().is_ok());
    }

    #[tokio::test]
    async fn geschlossenes_postfach_wird_entfernt() {
        let verteiler = test_verteiler(8);
        let (_id, rx) = verteiler.verbindung_registrieren(UserId(1));
        drop(rx);

        assert_eq!(verteiler.verteilen(&rundruf()), 0);
        assert!(!verteiler.ist_registriert(UserId(1)));
    }

    #[tokio::test]
    async fn abmelden_ohne_eintrag_ist_unbekannt() {
        let verteiler = test_verteiler(8);
        let (id, _rx) = verteiler.verbindung_registrieren(UserId(1));
        assert_eq!(
            verteiler.verbindung_entfernen(UserId(1), id),
            AbmeldeErgebnis::Entfernt
        );
        assert_eq!(
            verteiler.verbindung_entfernen(UserId(1), id),
            AbmeldeErgebnis::Unbekannt
        );
    }
}
