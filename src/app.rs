use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::Config;
use crate::services::RainfallGapFiller;

/// Running HTTP server
///
/// Processing is request-scoped, so the server task is the only one
/// the application owns.
pub struct Application {
    pub server_handle: JoinHandle<Result<(), std::io::Error>>,
}

impl Application {
    /// Build the gap filler from config and spawn the Axum server
    pub async fn build(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        info!("Initializing application components");

        let gap_filler = RainfallGapFiller::new(config.gap_fill_options());
        info!(
            "Empty place policy: {:?}, {} expected places",
            gap_filler.options().empty_place_policy,
            gap_filler.options().expected_places.len()
        );

        let app_state = AppState {
            gap_filler,
            default_worksheet: config.worksheet_name.clone(),
            max_upload_bytes: config.max_upload_bytes,
        };
        let app = create_router(app_state).layer(TraceLayer::new_for_http());

        // Bind before spawning so address errors surface from build()
        let addr = config.server_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("Starting HTTP server on {}", addr);

        let server_handle = tokio::spawn(async move { axum::serve(listener, app).await });

        info!("Application initialized successfully");

        Ok(Self { server_handle })
    }

    /// Run until the server stops
    pub async fn run_until_stopped(self) -> Result<(), Box<dyn std::error::Error>> {
        self.server_handle.await??;
        Ok(())
    }
}
