//! stammtisch-hub – Echtzeit-Hub des Stammtisch-Forums
//!
//! Dieser Crate implementiert den Echtzeit-Kern: langlebige
//! WebSocket-Verbindungen, Praesenz-Verwaltung und den Fan-out von
//! Ereignissen (Direktnachrichten, Kommentare, Tipp-Indikatoren,
//! Praesenz-Aenderungen) an die richtige Teilmenge der verbundenen
//! Clients. Die CRUD-Flaeche des Forums (Konten, Beitraege, Uploads)
//! lebt in einem eigenen Dienst und wird nur ueber die
//! Kollaborateur-Traits angesprochen.
//!
//! ## Architektur
//!
//! ```text
//! Upgrade-Endpunkt (ws::ws_verbindung)
//!     |  Session-Cookie -> SessionPruefer -> 401 vor dem Upgrade
//!     v
//! ClientVerbindung (pro Verbindung zwei Tasks)
//!     |  Empfangs-Schleife: Lese-Deadline, Parsen, Router
//!     |  Sende-Schleife:   Postfach leeren, Liveness-Probes
//!     v
//! NachrichtenRouter
//!     |  sender/timestamp serverseitig, typabhaengige Policy,
//!     |  Persistenz via ForumSpeicher
//!     v
//! NachrichtenVerteiler – Verbindungs-Registry + Fan-out
//! PresenceManager     – Wer ist online (Snapshot fuer den CRUD-Dienst)
//! HubState            – Konfiguration, Kollaborateure, interne
//!                       Ereignis-Queue mit eigener Hub-Schleife
//! ```

pub mod connection;
pub mod error;
pub mod nachricht;
pub mod presence;
pub mod router;
pub mod speicher;
pub mod state;
pub mod verteiler;
pub mod ws;

// Bequeme Re-Exporte
pub use connection::ClientVerbindung;
pub use error::{HubError, HubResult};
pub use nachricht::{Nachricht, NachrichtenTyp};
pub use presence::PresenceManager;
pub use router::NachrichtenRouter;
pub use speicher::{ForumSpeicher, SessionPruefer};
pub use state::{HubKonfig, HubState};
pub use verteiler::NachrichtenVerteiler;
