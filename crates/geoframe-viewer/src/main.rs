//! Globe viewer for the geoframe camera core using Bevy.
//!
//! The camera orbits an interest point on a WGS84 globe; anchored markers
//! and positioners stay put while render space follows the camera.

mod launch_params;
mod map;

use bevy::prelude::*;
use geoframe::{GlobeBackend, MapSession};
use map::{Map, MapPlugin};

fn main() {
    // Initialize tracing for native platforms.
    #[cfg(not(target_family = "wasm"))]
    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Initialize tracing for WASM (logs to browser console).
    #[cfg(target_family = "wasm")]
    {
        console_error_panic_hook::set_once();
        tracing_wasm::set_as_global_default();
    }

    let params = launch_params::parse();
    let session = match MapSession::new(params.map_config(), GlobeBackend::default()) {
        Ok(session) => session,
        Err(err) => {
            tracing::error!(%err, ?params, "invalid launch parameters");
            std::process::exit(2);
        }
    };

    let mut app = App::new();

    #[allow(unused_mut)]
    let mut window = Window {
        title: "geoframe-viewer".to_string(),
        resolution: (1280, 720).into(),
        ..Default::default()
    };

    // WASM: Fit canvas to parent element and prevent browser event handling.
    #[cfg(target_family = "wasm")]
    {
        window.fit_canvas_to_parent = true;
        window.prevent_default_event_handling = true;
    }

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(window),
        ..Default::default()
    }));

    app.insert_resource(Map::new(session))
        .add_plugins(MapPlugin)
        .run();
}
