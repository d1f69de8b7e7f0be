//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use stammtisch_hub::HubKonfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Hub-Einstellungen (Heartbeat, Postfaecher)
    pub hub: HubEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Stammtisch".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den HTTP/WebSocket-Server
    pub bind_adresse: String,
    /// Port fuer den HTTP/WebSocket-Server
    pub http_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8080,
        }
    }
}

/// Hub-Einstellungen (Heartbeat und Queues)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubEinstellungen {
    /// Lese-Deadline in Sekunden bis eine stumme Verbindung als tot gilt
    pub verbindungs_timeout_sek: u64,
    /// Kapazitaet des Postfachs einer Verbindung
    pub postfach_groesse: usize,
    /// Kapazitaet der internen Ereignis-Queue
    pub intern_queue_groesse: usize,
    /// Maximale Frame-Groesse in Bytes
    pub max_nachricht_bytes: usize,
}

impl Default for HubEinstellungen {
    fn default() -> Self {
        let konfig = HubKonfig::default();
        Self {
            verbindungs_timeout_sek: konfig.verbindungs_timeout_sek,
            postfach_groesse: konfig.postfach_groesse,
            intern_queue_groesse: konfig.intern_queue_groesse,
            max_nachricht_bytes: konfig.max_nachricht_bytes,
        }
    }
}

impl HubEinstellungen {
    /// Uebersetzt die Einstellungen in die Hub-Konfiguration
    pub fn als_hub_konfig(&self) -> HubKonfig {
        HubKonfig {
            verbindungs_timeout_sek: self.verbindungs_timeout_sek,
            postfach_groesse: self.postfach_groesse,
            intern_queue_groesse: self.intern_queue_groesse,
            max_nachricht_bytes: self.max_nachricht_bytes,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer HTTP zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }
}
