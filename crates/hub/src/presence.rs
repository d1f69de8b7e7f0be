//! Praesenz-Registry – Wer ist gerade online?
//!
//! Haelt die Menge der aktuell verbundenen Benutzer. Invariante: ein
//! Benutzer ist genau dann in dieser Menge, wenn fuer ihn genau eine
//! lebende Verbindung im Verteiler registriert ist.
//!
//! Thread-safe via Arc + Mutex. Clone teilt den inneren Zustand.

use parking_lot::Mutex;
use stammtisch_core::UserId;
use std::collections::HashSet;
use std::sync::Arc;

/// Verwaltet den Online-Status aller verbundenen Benutzer
#[derive(Clone)]
pub struct PresenceManager {
    inner: Arc<PresenceManagerInner>,
}

struct PresenceManagerInner {
    online: Mutex<HashSet<UserId>>,
}

impl PresenceManager {
    /// Erstellt einen neuen PresenceManager
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(PresenceManagerInner {
                online: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Markiert einen Benutzer als online
    ///
    /// Gibt `true` zurueck wenn der Benutzer vorher offline war.
    pub fn online_setzen(&self, benutzer: UserId) -> bool {
        let neu = self.inner.online.lock().insert(benutzer);
        if neu {
            tracing::debug!(benutzer = %benutzer, "Benutzer online");
        }
        neu
    }

    /// Markiert einen Benutzer als offline
    ///
    /// Gibt `true` zurueck wenn der Benutzer vorher online war.
    pub fn offline_setzen(&self, benutzer: UserId) -> bool {
        let entfernt = self.inner.online.lock().remove(&benutzer);
        if entfernt {
            tracing::debug!(benutzer = %benutzer, "Benutzer offline");
        }
        entfernt
    }

    /// Prueft ob ein Benutzer online ist
    pub fn ist_online(&self, benutzer: UserId) -> bool {
        self.inner.online.lock().contains(&benutzer)
    }

    /// Gibt einen Snapshot der Online-Menge zurueck
    ///
    /// Immer eine Kopie – die lebende Menge wird nie nach aussen gereicht.
    pub fn online_liste(&self) -> Vec<UserId> {
        let mut liste: Vec<UserId> = self.inner.online.lock().iter().copied().collect();
        liste.sort_by_key(|benutzer| benutzer.inner());
        liste
    }

    /// Gibt die Anzahl der online Benutzer zurueck
    pub fn online_anzahl(&self) -> usize {
        self.inner.online.lock().len()
    }
}

impl Default for PresenceManager {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_und_offline() {
        let pm = PresenceManager::neu();

        assert!(pm.online_setzen(UserId(1)));
        assert!(pm.ist_online(UserId(1)));
        assert_eq!(pm.online_anzahl(), 1);

        // Doppeltes Setzen ist idempotent
        assert!(!pm.online_setzen(UserId(1)));
        assert_eq!(pm.online_anzahl(), 1);

        assert!(pm.offline_setzen(UserId(1)));
        assert!(!pm.ist_online(UserId(1)));
        assert!(!pm.offline_setzen(UserId(1)));
    }

    #[test]
    fn liste_ist_sortierter_snapshot() {
        let pm = PresenceManager::neu();
        pm.online_setzen(UserId(3));
        pm.online_setzen(UserId(1));
        pm.online_setzen(UserId(2));

        let liste = pm.online_liste();
        assert_eq!(liste, vec![UserId(1), UserId(2), UserId(3)]);

        // Der Snapshot lebt unabhaengig vom Manager weiter
        pm.offline_setzen(UserId(2));
        assert_eq!(liste.len(), 3);
        assert_eq!(pm.online_anzahl(), 2);
    }

    #[test]
    fn clone_teilt_inneren_state() {
        let pm1 = PresenceManager::neu();
        let pm2 = pm1.clone();

        pm1.online_setzen(UserId(7));
        assert!(pm2.ist_online(UserId(7)));
    }
}
