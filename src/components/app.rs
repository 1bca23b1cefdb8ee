use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{spawn_local, JsFuture};

use crate::actions;
use crate::components::analysis_panel::AnalysisPanel;
use crate::components::spectrogram::Spectrogram;
use crate::components::toolbar::Toolbar;
use crate::state::{AppState, ViewerSetup};

/// Served next to `index.html`.
const SETUP_URL: &str = "sonomark.yaml";

async fn fetch_text(url: &str) -> Result<String, String> {
    let window = web_sys::window().ok_or("no window")?;
    let response = JsFuture::from(window.fetch_with_str(url)).await.map_err(|e| format!("{e:?}"))?;
    let response: web_sys::Response = response.dyn_into().map_err(|e| format!("{e:?}"))?;
    if !response.ok() {
        return Err(format!("{url}: HTTP {}", response.status()));
    }
    let text = JsFuture::from(response.text().map_err(|e| format!("{e:?}"))?)
        .await
        .map_err(|e| format!("{e:?}"))?;
    text.as_string().ok_or_else(|| format!("{url}: body is not text"))
}

#[component]
pub fn App() -> impl IntoView {
    let state = AppState::new();
    provide_context(state);

    spawn_local(async move {
        let setup = fetch_text(SETUP_URL).await.and_then(|text| ViewerSetup::from_text(&text));
        match setup {
            Ok(setup) => {
                log::set_max_level(setup.log_level().to_level_filter());
                actions::open(state, setup);
            }
            Err(e) => {
                log::error!("cannot load {SETUP_URL}: {e}");
                state.setup_error.set(Some(e));
            }
        }
    });

    view! {
        <div class="app">
            <MainArea />
        </div>
    }
}

#[component]
fn MainArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let has_recording = move || state.recording.get().is_some();

    view! {
        <div class="main">
            <Toolbar />
            {move || {
                if has_recording() {
                    view! {
                        <Spectrogram />
                        <AnalysisPanel />
                    }.into_any()
                } else {
                    view! {
                        <div class="empty-state">
                            {move || state.setup_error.get().unwrap_or_else(|| "Loading\u{2026}".into())}
                        </div>
                    }.into_any()
                }
            }}
        </div>
    }
}
