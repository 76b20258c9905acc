use log::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{Document, Element, EventTarget, HtmlElement, NodeList};

/// Anything that can run a selector query (documents and elements).
pub trait Scope {
    fn select_all(&self, selector: &str) -> Result<NodeList, JsValue>;
    fn select(&self, selector: &str) -> Result<Option<Element>, JsValue>;
}

impl Scope for Document {
    fn select_all(&self, selector: &str) -> Result<NodeList, JsValue> {
        self.query_selector_all(selector)
    }

    fn select(&self, selector: &str) -> Result<Option<Element>, JsValue> {
        self.query_selector(selector)
    }
}

impl Scope for Element {
    fn select_all(&self, selector: &str) -> Result<NodeList, JsValue> {
        self.query_selector_all(selector)
    }

    fn select(&self, selector: &str) -> Result<Option<Element>, JsValue> {
        self.query_selector(selector)
    }
}

/// Collects every element matching `selector` under `root`.
pub fn query_all<S: Scope>(root: &S, selector: &str) -> Vec<Element> {
    let Ok(list) = root.select_all(selector) else {
        warn!("Invalid selector {}", selector);
        return Vec::new();
    };
    (0..list.length())
        .filter_map(|i| list.get(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

pub fn query<S: Scope>(root: &S, selector: &str) -> Option<Element> {
    root.select(selector).ok().flatten()
}

/// Attaches a listener that lives as long as the document (the closure is leaked).
pub fn listen<E, F>(target: &EventTarget, event: &str, mut handler: F)
where
    E: JsCast,
    F: FnMut(E) + 'static,
{
    let callback = Closure::<dyn FnMut(web_sys::Event)>::new(move |e: web_sys::Event| {
        handler(e.unchecked_into::<E>());
    });
    if let Err(e) = target.add_event_listener_with_callback(event, callback.as_ref().unchecked_ref()) {
        warn!("Failed to attach {} listener: {:?}", event, e);
    }
    callback.forget();
}

pub fn set_style(element: &Element, property: &str, value: &str) {
    if let Some(el) = element.dyn_ref::<HtmlElement>() {
        let _ = el.style().set_property(property, value);
    }
}

pub fn toggle_class(element: &Element, class: &str, on: bool) {
    let classes = element.class_list();
    let result = if on {
        classes.add_1(class)
    } else {
        classes.remove_1(class)
    };
    if let Err(e) = result {
        warn!("Failed to toggle .{}: {:?}", class, e);
    }
}

pub fn set_attr(element: &Element, name: &str, value: &str) {
    if let Err(e) = element.set_attribute(name, value) {
        warn!("Failed to set {}: {:?}", name, e);
    }
}
