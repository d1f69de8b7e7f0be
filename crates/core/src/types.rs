//! Gemeinsame Identifikationstypen fuer Stammtisch
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen. Die inneren
//! Werte sind `i64`, weil die Forum-Datenbank und das Wire-Protokoll
//! ganzzahlige IDs verwenden.

use serde::{Deserialize, Serialize};

/// Eindeutige Benutzer-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }

    /// Prueft ob die ID gueltig ist (positiv)
    pub fn ist_gueltig(&self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for UserId {
    fn from(wert: i64) -> Self {
        Self(wert)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Eindeutige Beitrags-ID (Forum-Post)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub i64);

impl PostId {
    /// Gibt den inneren Wert zurueck
    pub fn inner(&self) -> i64 {
        self.0
    }

    /// Prueft ob die ID gueltig ist (positiv)
    pub fn ist_gueltig(&self) -> bool {
        self.0 > 0
    }
}

impl From<i64> for PostId {
    fn from(wert: i64) -> Self {
        Self(wert)
    }
}

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "post:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_display() {
        let id = UserId(42);
        assert_eq!(id.to_string(), "user:42");
    }

    #[test]
    fn user_id_gueltigkeit() {
        assert!(UserId(1).ist_gueltig());
        assert!(!UserId(0).ist_gueltig());
        assert!(!UserId(-5).ist_gueltig());
    }

    #[test]
    fn ids_sind_serde_kompatibel() {
        let uid = UserId(7);
        let json = serde_json::to_string(&uid).unwrap();
        // Transparent: serialisiert als nackte Zahl
        assert_eq!(json, "7");
        let uid2: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);
    }

    #[test]
    fn post_id_display() {
        let id = PostId(3);
        assert_eq!(id.to_string(), "post:3");
    }
}
