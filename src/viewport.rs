//! Viewport-triggered behaviors: reveal animations and background preloading.
//!
//! Every observer on the page is described by a [`Subscription`]. Subscriptions
//! that share a threshold and root margin share one `IntersectionObserver`.

use std::cell::RefCell;
use std::collections::HashSet;

use log::{debug, info, warn};
use serde::Deserialize;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit, Window};

use crate::dom;
use crate::runtime::{Effects, Machine, Runtime, View};

pub const LOADED_FLAG: &str = "data-bg-loaded";

fn default_root_margin() -> String {
    "0px".to_string()
}

fn default_once() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Subscription {
    pub selector: String,
    pub threshold: f64,
    #[serde(default = "default_root_margin")]
    pub root_margin: String,
    #[serde(default = "default_once")]
    pub once: bool,
    pub action: Action,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Add `class` to every `targets` match, one `step` apart.
    Stagger {
        targets: String,
        class: String,
        step: Stagger,
    },
    /// Add `class` to the intersecting element itself after `delay_ms`.
    Delay { class: String, delay_ms: u32 },
    /// Hint the browser to fetch `href` before the section is painted.
    Preload { href: String },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Stagger {
    Fixed {
        interval_ms: u32,
    },
    Responsive {
        breakpoint_px: f64,
        narrow_ms: u32,
        wide_ms: u32,
    },
}

impl Stagger {
    pub fn interval(&self, viewport_width: f64) -> u32 {
        match *self {
            Stagger::Fixed { interval_ms } => interval_ms,
            Stagger::Responsive {
                breakpoint_px,
                narrow_ms,
                wide_ms,
            } => {
                if viewport_width <= breakpoint_px {
                    narrow_ms
                } else {
                    wide_ms
                }
            }
        }
    }
}

/// A subscription together with how many elements it found on the page.
#[derive(Debug, Clone)]
pub struct Tracked {
    pub subscription: Subscription,
    pub elements: usize,
    pub targets: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The observed element at this index.
    Observed(usize),
    /// The stagger target at this index.
    Member(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewportMsg {
    Entry {
        sub: usize,
        element: usize,
        intersecting: bool,
        viewport_width: f64,
    },
    Activate {
        sub: usize,
        target: Target,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewportPatch {
    Unobserve { sub: usize, element: usize },
    AddClass { sub: usize, target: Target, class: String },
    Preload { sub: usize, element: usize, href: String },
}

pub struct Subscriptions {
    tracked: Vec<Tracked>,
    fired: HashSet<(usize, usize)>,
}

impl Subscriptions {
    pub fn new(tracked: Vec<Tracked>) -> Self {
        Self {
            tracked,
            fired: HashSet::new(),
        }
    }

    pub fn has_fired(&self, sub: usize, element: usize) -> bool {
        self.fired.contains(&(sub, element))
    }

    fn class_for(&self, sub: usize) -> Option<&str> {
        match &self.tracked.get(sub)?.subscription.action {
            Action::Stagger { class, .. } | Action::Delay { class, .. } => Some(class),
            Action::Preload { .. } => None,
        }
    }
}

impl Machine for Subscriptions {
    type Msg = ViewportMsg;
    type Patch = ViewportPatch;

    fn update(&mut self, msg: ViewportMsg, fx: &mut Effects<ViewportMsg, ViewportPatch>) {
        match msg {
            ViewportMsg::Entry {
                sub,
                element,
                intersecting,
                viewport_width,
            } => {
                let Some(tracked) = self.tracked.get(sub) else {
                    return;
                };
                if !intersecting || element >= tracked.elements {
                    return;
                }
                let once = tracked.subscription.once;
                if once && !self.fired.insert((sub, element)) {
                    return;
                }

                match &tracked.subscription.action {
                    Action::Stagger { step, .. } => {
                        let interval = step.interval(viewport_width);
                        for member in 0..tracked.targets {
                            fx.schedule(
                                member as u32 * interval,
                                0,
                                ViewportMsg::Activate {
                                    sub,
                                    target: Target::Member(member),
                                },
                            );
                        }
                    }
                    Action::Delay { delay_ms, .. } => {
                        fx.schedule(
                            *delay_ms,
                            0,
                            ViewportMsg::Activate {
                                sub,
                                target: Target::Observed(element),
                            },
                        );
                    }
                    Action::Preload { href } => {
                        fx.render(ViewportPatch::Preload {
                            sub,
                            element,
                            href: href.clone(),
                        });
                    }
                }

                if once {
                    fx.render(ViewportPatch::Unobserve { sub, element });
                }
            }
            ViewportMsg::Activate { sub, target } => {
                if let Some(class) = self.class_for(sub) {
                    fx.render(ViewportPatch::AddClass {
                        sub,
                        target,
                        class: class.to_string(),
                    });
                }
            }
        }
    }
}

struct TrackedDom {
    group: usize,
    elements: Vec<Element>,
    targets: Vec<Element>,
}

struct ViewportDom {
    document: Document,
    tracked: Vec<TrackedDom>,
    /// One slot per group; `None` when the browser refused to build it.
    observers: RefCell<Vec<Option<IntersectionObserver>>>,
}

impl ViewportDom {
    /// Every (subscription, element) pair in `group` whose element is `target`.
    fn locate(&self, group: usize, target: &Element) -> Vec<(usize, usize)> {
        self.tracked
            .iter()
            .enumerate()
            .filter(|(_, t)| t.group == group)
            .flat_map(|(sub, t)| {
                t.elements
                    .iter()
                    .enumerate()
                    .filter(move |(_, el)| *el == target)
                    .map(move |(element, _)| (sub, element))
            })
            .collect()
    }

    fn preload(&self, href: &str) {
        let Some(head) = self.document.head() else {
            return;
        };
        let link = match self.document.create_element("link") {
            Ok(link) => link,
            Err(e) => {
                warn!("Failed to create preload link: {:?}", e);
                return;
            }
        };
        dom::set_attr(&link, "rel", "preload");
        dom::set_attr(&link, "as", "image");
        dom::set_attr(&link, "href", href);
        if let Err(e) = head.append_child(&link) {
            warn!("Failed to append preload link: {:?}", e);
        }
    }
}

impl View<ViewportPatch> for ViewportDom {
    fn render(&self, patch: ViewportPatch) {
        match patch {
            ViewportPatch::Unobserve { sub, element } => {
                let Some(t) = self.tracked.get(sub) else { return };
                if let (Some(Some(observer)), Some(el)) =
                    (self.observers.borrow().get(t.group), t.elements.get(element))
                {
                    observer.unobserve(el);
                }
            }
            ViewportPatch::AddClass { sub, target, class } => {
                let Some(t) = self.tracked.get(sub) else { return };
                let el = match target {
                    Target::Observed(i) => t.elements.get(i),
                    Target::Member(i) => t.targets.get(i),
                };
                if let Some(el) = el {
                    dom::toggle_class(el, &class, true);
                }
            }
            ViewportPatch::Preload { sub, element, href } => {
                debug!("Preloading background {}", href);
                self.preload(&href);
                if let Some(el) = self.tracked.get(sub).and_then(|t| t.elements.get(element)) {
                    dom::set_attr(el, LOADED_FLAG, "true");
                }
            }
        }
    }
}

/// A stagger watches its section, so only the first match is observed;
/// every other action watches each match.
fn observed<T>(action: &Action, mut found: Vec<T>) -> Vec<T> {
    if let Action::Stagger { .. } = action {
        found.truncate(1);
    }
    found
}

/// Observer options a subscription is grouped by.
fn group_key(sub: &Subscription) -> String {
    format!("{}|{}", sub.threshold, sub.root_margin)
}

pub fn init(document: &Document, window: &Window, subscriptions: Vec<Subscription>) {
    let mut keys: Vec<(String, f64, String)> = Vec::new();
    let mut tracked = Vec::new();
    let mut tracked_dom = Vec::new();

    for subscription in subscriptions {
        let mut elements = observed(&subscription.action, dom::query_all(document, &subscription.selector));
        if let Action::Preload { .. } = subscription.action {
            elements.retain(|el| !el.has_attribute(LOADED_FLAG));
        }
        if elements.is_empty() {
            debug!("No {} on this page", subscription.selector);
            continue;
        }

        let targets = match &subscription.action {
            Action::Stagger { targets, .. } => {
                let found = dom::query_all(document, targets);
                if found.is_empty() {
                    debug!("No {} on this page", targets);
                    continue;
                }
                found
            }
            _ => Vec::new(),
        };

        let key = group_key(&subscription);
        let group = match keys.iter().position(|(k, _, _)| *k == key) {
            Some(group) => group,
            None => {
                keys.push((key, subscription.threshold, subscription.root_margin.clone()));
                keys.len() - 1
            }
        };

        tracked.push(Tracked {
            subscription,
            elements: elements.len(),
            targets: targets.len(),
        });
        tracked_dom.push(TrackedDom {
            group,
            elements,
            targets,
        });
    }

    if tracked.is_empty() {
        return;
    }

    let runtime = Runtime::new(
        Subscriptions::new(tracked),
        ViewportDom {
            document: document.clone(),
            tracked: tracked_dom,
            observers: RefCell::new(Vec::new()),
        },
    );

    for (group, (_, threshold, root_margin)) in keys.iter().enumerate() {
        let callback = {
            let runtime = runtime.clone();
            let window = window.clone();
            Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
                move |entries: js_sys::Array, _observer: IntersectionObserver| {
                    let viewport_width = window
                        .inner_width()
                        .ok()
                        .and_then(|w| w.as_f64())
                        .unwrap_or_default();
                    for entry in entries.iter() {
                        let entry: IntersectionObserverEntry = entry.unchecked_into();
                        let intersecting = entry.is_intersecting();
                        for (sub, element) in runtime.view().locate(group, &entry.target()) {
                            runtime.dispatch(ViewportMsg::Entry {
                                sub,
                                element,
                                intersecting,
                                viewport_width,
                            });
                        }
                    }
                },
            )
        };

        let options = IntersectionObserverInit::new();
        options.set_threshold(&(*threshold).into());
        options.set_root_margin(root_margin);

        let observer = match IntersectionObserver::new_with_options(callback.as_ref().unchecked_ref(), &options) {
            Ok(observer) => observer,
            Err(e) => {
                warn!("IntersectionObserver unavailable for group {}: {:?}", group, e);
                runtime.view().observers.borrow_mut().push(None);
                continue;
            }
        };
        callback.forget();

        for t in runtime.view().tracked.iter().filter(|t| t.group == group) {
            for el in &t.elements {
                observer.observe(el);
            }
        }
        runtime.view().observers.borrow_mut().push(Some(observer));
    }

    info!("Observing {} viewport group(s)", keys.len());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::runtime::testing::ManualRuntime;

    fn tracked(subscription: Subscription, elements: usize, targets: usize) -> Tracked {
        Tracked {
            subscription,
            elements,
            targets,
        }
    }

    fn entry(sub: usize, element: usize, intersecting: bool, width: f64) -> ViewportMsg {
        ViewportMsg::Entry {
            sub,
            element,
            intersecting,
            viewport_width: width,
        }
    }

    fn about() -> Subscription {
        SiteConfig::default().reveals[0].clone()
    }

    #[test]
    fn stagger_observes_only_the_first_section() {
        let config = SiteConfig::default();
        let about = &config.reveals[0].action;
        let price = &config.reveals[2].action;
        assert_eq!(observed(about, vec!["first", "second"]), vec!["first"]);
        assert!(observed(about, Vec::<&str>::new()).is_empty());
        assert_eq!(observed(price, vec![1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn responsive_stagger_switches_at_breakpoint() {
        let step = Stagger::Responsive {
            breakpoint_px: 768.0,
            narrow_ms: 100,
            wide_ms: 300,
        };
        assert_eq!(step.interval(375.0), 100);
        assert_eq!(step.interval(768.0), 100);
        assert_eq!(step.interval(769.0), 300);
        assert_eq!(Stagger::Fixed { interval_ms: 200 }.interval(320.0), 200);
    }

    #[test]
    fn about_comments_reveal_one_interval_apart_on_desktop() {
        let mut rt = ManualRuntime::new(Subscriptions::new(vec![tracked(about(), 1, 3)]));
        rt.dispatch(entry(0, 0, true, 1280.0));
        assert_eq!(
            rt.take_rendered(),
            vec![(0, ViewportPatch::Unobserve { sub: 0, element: 0 })]
        );

        rt.advance(1000);
        let times: Vec<_> = rt
            .take_rendered()
            .into_iter()
            .map(|(at, patch)| match patch {
                ViewportPatch::AddClass {
                    target: Target::Member(i),
                    class,
                    ..
                } => {
                    assert_eq!(class, "is-active");
                    (at, i)
                }
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(times, vec![(0, 0), (300, 1), (600, 2)]);
    }

    #[test]
    fn about_comments_use_short_interval_on_mobile() {
        let mut rt = ManualRuntime::new(Subscriptions::new(vec![tracked(about(), 1, 3)]));
        rt.dispatch(entry(0, 0, true, 390.0));
        rt.take_rendered();
        rt.advance(200);
        assert_eq!(rt.take_rendered().len(), 3);
    }

    #[test]
    fn leaving_the_viewport_does_nothing() {
        let mut rt = ManualRuntime::new(Subscriptions::new(vec![tracked(about(), 1, 3)]));
        rt.dispatch(entry(0, 0, false, 1280.0));
        rt.advance(5000);
        assert!(rt.take_rendered().is_empty());
        assert!(!rt.machine.has_fired(0, 0));
    }

    #[test]
    fn price_images_activate_themselves_after_delay() {
        let price = SiteConfig::default().reveals[2].clone();
        let mut rt = ManualRuntime::new(Subscriptions::new(vec![tracked(price, 4, 0)]));
        rt.dispatch(entry(0, 2, true, 1280.0));
        rt.take_rendered();

        rt.advance(299);
        assert!(rt.take_rendered().is_empty());
        rt.advance(1);
        assert_eq!(
            rt.take_rendered(),
            vec![(
                300,
                ViewportPatch::AddClass {
                    sub: 0,
                    target: Target::Observed(2),
                    class: "is-active".to_string()
                }
            )]
        );
    }

    #[test]
    fn each_background_preloads_once_per_page() {
        let subs: Vec<_> = SiteConfig::default()
            .subscriptions()
            .into_iter()
            .filter(|s| matches!(s.action, Action::Preload { .. }))
            .map(|s| tracked(s, 1, 0))
            .collect();
        let mut rt = ManualRuntime::new(Subscriptions::new(subs));

        for _ in 0..3 {
            rt.dispatch(entry(1, 0, true, 1280.0));
            rt.dispatch(entry(1, 0, false, 1280.0));
        }
        rt.dispatch(entry(4, 0, true, 1280.0));

        let preloads: Vec<_> = rt
            .take_rendered()
            .into_iter()
            .filter_map(|(_, patch)| match patch {
                ViewportPatch::Preload { href, .. } => Some(href),
                _ => None,
            })
            .collect();
        assert_eq!(
            preloads,
            vec![
                "./img/risk/risk-bg.png".to_string(),
                "./img/contact/contact-bg.png".to_string()
            ]
        );
    }

    #[test]
    fn repeating_subscriptions_fire_every_time() {
        let mut sub = about();
        sub.once = false;
        let mut rt = ManualRuntime::new(Subscriptions::new(vec![tracked(sub, 1, 1)]));
        rt.dispatch(entry(0, 0, true, 1280.0));
        rt.dispatch(entry(0, 0, true, 1280.0));
        rt.advance(10);
        let patches = rt.take_rendered();
        assert_eq!(patches.len(), 2);
        assert!(patches
            .iter()
            .all(|(_, p)| !matches!(p, ViewportPatch::Unobserve { .. })));
    }

    #[test]
    fn unknown_subscription_or_element_is_ignored() {
        let mut rt = ManualRuntime::new(Subscriptions::new(vec![tracked(about(), 1, 3)]));
        rt.dispatch(entry(5, 0, true, 1280.0));
        rt.dispatch(entry(0, 9, true, 1280.0));
        assert!(rt.take_rendered().is_empty());
        assert_eq!(rt.pending(), 0);
    }
}
