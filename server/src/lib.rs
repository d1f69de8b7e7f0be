//! stammtisch-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;
pub mod speicher;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use config::ServerConfig;
use speicher::{MemorySessions, MemorySpeicher};
use stammtisch_hub::{ws, HubState};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den HTTP/WebSocket-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Kollaborateure aufbauen (In-Memory-Platzhalter, der CRUD-Dienst
    ///    uebernimmt im Verbund)
    /// 2. Hub-Zustand erstellen und die Hub-Schleife starten
    /// 3. HTTP-Listener binden und bedienen
    /// 4. Auf Ctrl-C warten
    pub async fn starten(self) -> Result<()> {
        let sessions = Arc::new(MemorySessions::neu());
        let forum = Arc::new(MemorySpeicher::neu());

        let state = HubState::neu(self.config.hub.als_hub_konfig(), sessions, forum);
        state.starten();

        let app = hub_router(Arc::clone(&state));
        let adresse: SocketAddr = self.config.http_bind_adresse().parse()?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %adresse,
            "Server startet"
        );

        let listener = tokio::net::TcpListener::bind(adresse).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Erstellt den HTTP-Router des Hubs
///
/// `/ws` ist der Upgrade-Endpunkt, `/v1/online` die Praesenz-Abfrage
/// fuer den CRUD-Dienst.
pub fn hub_router(state: Arc<HubState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_verbindung))
        .route("/v1/online", get(ws::online_benutzer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wartet auf Ctrl-C / SIGTERM
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar");
        return;
    }
    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
}
