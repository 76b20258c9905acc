use log::{info, warn};
use web_sys::{window, Document, Event, Window};

mod config;
mod consent;
mod dom;
mod error;
mod faq;
mod flow;
mod fragments;
mod runtime;
mod tabs;
mod video;
mod viewport;

use config::SiteConfig;
use fragments::Fragment;

/// Wires every page behavior. Each one is a no-op when its elements are missing.
fn init(window: &Window, document: &Document) {
    let config = SiteConfig::load(document);
    let path = window.location().pathname().unwrap_or_default();
    info!("Initializing page behaviors for {}", path);

    fragments::mount(document, Fragment::Header, &path, &config.fragments);
    fragments::mount(document, Fragment::Footer, &path, &config.fragments);
    faq::init(document, &config.faq);
    consent::init(document, &config.consent);
    video::init(document);
    flow::init(document, &config.flow);
    viewport::init(document, window, config.subscriptions());
}

fn main() {
    // Initialize console error panic hook for better error messages
    console_error_panic_hook::set_once();

    console_log::init_with_level(config::log_level()).expect("error initializing log");

    let Some(window) = window() else {
        warn!("No window, nothing to do");
        return;
    };
    let Some(document) = window.document() else {
        warn!("No document, nothing to do");
        return;
    };

    // The bundle usually arrives after DOMContentLoaded has already fired.
    if document.ready_state() == "loading" {
        let target = document.clone();
        dom::listen(&target, "DOMContentLoaded", move |_: Event| init(&window, &document));
    } else {
        init(&window, &document);
    }
}
