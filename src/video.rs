use log::debug;
use wasm_bindgen::JsCast;
use web_sys::{Document, Event, HtmlVideoElement};

use crate::dom;

/// Shows the first frame of the hero video instead of a blank poster.
pub fn init(document: &Document) {
    let Some(video) = document
        .get_element_by_id("main-video")
        .and_then(|el| el.dyn_into::<HtmlVideoElement>().ok())
    else {
        return;
    };

    for event in ["loadedmetadata", "loadeddata"] {
        let video_for_event = video.clone();
        dom::listen(&video, event, move |_: Event| {
            video_for_event.set_current_time(0.0);
        });
    }

    debug!("Loading #main-video");
    video.load();
}
