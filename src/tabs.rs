use log::debug;
use web_sys::Document;

use crate::dom;

pub const TAB_SELECTOR: &str = ".header-tabs__item";
pub const TARGET_ATTR: &str = "data-tab-target";
pub const ACTIVE_CLASS: &str = "is-active";

/// Last path segment, or `root_page` when the path ends in a slash.
pub fn current_page<'a>(path: &'a str, root_page: &'a str) -> &'a str {
    match path.rsplit('/').next() {
        Some(page) if !page.is_empty() => page,
        _ => root_page,
    }
}

pub fn is_active(target: Option<&str>, path: &str, root_page: &str) -> bool {
    target == Some(current_page(path, root_page))
}

/// Marks the header tab for the current page. Must run after the header
/// fragment is in the document.
pub fn highlight(document: &Document, path: &str, root_page: &str) {
    let tabs = dom::query_all(document, TAB_SELECTOR);
    debug!("Highlighting {} tab(s) for {}", tabs.len(), path);

    for tab in tabs {
        let target = tab.get_attribute(TARGET_ATTR);
        let active = is_active(target.as_deref(), path, root_page);
        dom::toggle_class(&tab, ACTIVE_CLASS, active);
        dom::set_attr(&tab, "aria-selected", if active { "true" } else { "false" });
        dom::set_attr(&tab, "tabindex", if active { "0" } else { "-1" });
    }
}
