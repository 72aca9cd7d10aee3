mod api;
mod app;
mod autosave;
mod config;
mod editor;
mod models;
mod state;
mod storage;
mod tags;
mod telemetry;
mod tree;
mod util;

use app::App;
use config::EnvConfig;
use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise the test harness would mount the app too.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();

    let config = EnvConfig::load();
    telemetry::init(&config.log_level);
    tracing::info!(api_url = %config.api_url, "starting");

    mount_to_body(move || view! { <App config=config.clone() /> });
}
