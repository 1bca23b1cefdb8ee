use leptos::prelude::*;
use sonomark_core::annotation::{AnnotationId, Mutation, Tag};
use wasm_bindgen::JsCast;

use crate::actions;
use crate::canvas::time_markers::format_time_label;
use crate::state::{AppState, ANNOTATIONS, CACHE};

/// `key:value`, both sides trimmed and non-empty.
pub fn parse_tag(text: &str) -> Option<Tag> {
    let (key, value) = text.split_once(':')?;
    let (key, value) = (key.trim(), value.trim());
    (!key.is_empty() && !value.is_empty()).then(|| Tag::new(key, value))
}

struct SelectionData {
    id: AnnotationId,
    kind: &'static str,
    start: f64,
    end: f64,
    band: Option<(f64, f64)>,
    tags: Vec<Tag>,
}

fn selection_data(id: AnnotationId) -> Option<SelectionData> {
    let annotation = ANNOTATIONS.with(|a| a.borrow().get(&id).cloned())?;
    let time = annotation.geometry.time_extent().ok()?;
    let band = annotation.geometry.freq_extent().ok().flatten().map(|f| (f.min, f.max));
    Some(SelectionData {
        id,
        kind: annotation.geometry.kind().name(),
        start: time.min,
        end: time.max,
        band,
        tags: annotation.tags,
    })
}

#[component]
pub fn AnalysisPanel() -> impl IntoView {
    let state = expect_context::<AppState>();

    let selection = move || {
        let _ = state.annotations_version.get();
        selection_data(state.selection.get()?)
    };

    view! {
        <div class="analysis-panel">
            {move || match selection() {
                Some(s) => view! {
                    <span>{format!("{} {}", s.kind, s.id)}</span>
                    <span>{format!("{:.3}-{:.3}s", s.start, s.end)}</span>
                    <span>{match s.band {
                        Some((lo, hi)) => format!("{:.0}-{:.0} Hz", lo, hi),
                        None => "all frequencies".into(),
                    }}</span>
                    {if s.id.is_pending() {
                        view! { <span style="color: #777">"saving\u{2026}"</span> }.into_any()
                    } else {
                        view! { <TagEditor id=s.id.clone() tags=s.tags /> }.into_any()
                    }}
                }.into_any(),
                None => view! {
                    <span style="color: #555">"No selection. Click an annotation, or press n / p"</span>
                }.into_any(),
            }}
            <div style="flex: 1;"></div>
            {move || state.measurement.get().map(|m| view! {
                <span class="measure">{format!(
                    "\u{0394}t {}  \u{0394}f {:.0} Hz",
                    format_time_label(m.duration(), m.duration().max(0.0001)),
                    m.bandwidth(),
                )}</span>
            })}
            {move || state.hover.get().map(|p| view! {
                <span>{format!("{:.3}s  {:.0} Hz", p.time, p.freq)}</span>
            })}
            {move || {
                let _ = state.segment_ready_signal.get();
                let stats = CACHE.with(|c| c.borrow().stats());
                let mib = stats.bytes as f64 / (1024.0 * 1024.0);
                view! {
                    <span style="color: #777">{format!(
                        "{} segments, {:.1} MiB, {} loading, {} failed",
                        stats.entries, mib, stats.in_flight, stats.failed,
                    )}</span>
                }
            }}
            {move || state.status.get().map(|msg| view! {
                <span class="status-error" on:click=move |_| state.status.set(None)>{msg}</span>
            })}
        </div>
    }
}

#[component]
fn TagEditor(id: AnnotationId, tags: Vec<Tag>) -> impl IntoView {
    let state = expect_context::<AppState>();
    let editable = move || state.editable.get();
    let remove_id = id.clone();

    let on_keydown = move |ev: web_sys::KeyboardEvent| {
        if ev.key() != "Enter" {
            return;
        }
        let Some(input) = ev.target().and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok()) else {
            return;
        };
        match parse_tag(&input.value()) {
            Some(tag) => {
                actions::commit(state, Mutation::AddTag { id: id.clone(), tag });
                input.set_value("");
            }
            None => state.status.set(Some("tags are written key:value".into())),
        }
    };

    view! {
        <span class="tags">
            {tags.into_iter().map(|tag| {
                let id = remove_id.clone();
                let label = tag.to_string();
                view! {
                    <span class="tag-chip">
                        {label}
                        {move || editable().then(|| {
                            let id = id.clone();
                            let tag = tag.clone();
                            view! {
                                <button
                                    class="tag-remove"
                                    on:click=move |_| actions::commit(state, Mutation::RemoveTag { id: id.clone(), tag: tag.clone() })
                                >"\u{00d7}"</button>
                            }
                        })}
                    </span>
                }
            }).collect_view()}
            {move || editable().then(|| view! {
                <input class="tag-input" placeholder="key:value" on:keydown=on_keydown.clone() />
            })}
        </span>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_parse_from_key_value() {
        assert_eq!(parse_tag(" species : Myotis "), Some(Tag::new("species", "Myotis")));
        assert_eq!(parse_tag("call:"), None);
        assert_eq!(parse_tag("nocolon"), None);
    }
}
