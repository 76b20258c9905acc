//! Privacy-policy modal whose acknowledgement checkboxes unlock only after the
//! policy has been scrolled to the end.

use log::debug;
use web_sys::{Document, Element, Event, HtmlElement, HtmlInputElement, KeyboardEvent, MouseEvent};
use wasm_bindgen::JsCast;

use crate::config::ConsentConfig;
use crate::dom;
use crate::runtime::{Effects, Machine, Runtime, View};

const ACTIVE_CLASS: &str = "is-active";
const READ_CLASS: &str = "is-read";
const BODY_LOCK_CLASS: &str = "no-scroll";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollMetrics {
    pub fn of(element: &Element) -> Self {
        Self {
            scroll_top: element.scroll_top() as f64,
            client_height: element.client_height() as f64,
            scroll_height: element.scroll_height() as f64,
        }
    }

    pub fn reached_end(&self, tolerance: f64) -> bool {
        self.scroll_top + self.client_height >= self.scroll_height - tolerance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkbox {
    /// The one inside the contact form.
    Inline,
    /// The one in the modal footer.
    Modal,
}

impl Checkbox {
    fn other(self) -> Self {
        match self {
            Checkbox::Inline => Checkbox::Modal,
            Checkbox::Modal => Checkbox::Inline,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsentMsg {
    /// Policy link clicked. The gate stays closed until the next `Scrolled`,
    /// which must be measured after the modal is visible.
    Open,
    Scrolled(ScrollMetrics),
    Changed { source: Checkbox, checked: bool },
    Close,
    Key(String),
    CloseElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentPatch {
    Visible(bool),
    ResetScroll,
    /// Applied to both checkboxes.
    Checkboxes { checked: bool, enabled: bool },
    Gate { read: bool },
    Checked { target: Checkbox, checked: bool },
}

pub struct ConsentModal {
    tolerance: f64,
    close_delay_ms: u32,
    open: bool,
    scrolled_to_bottom: bool,
    checked: bool,
    generation: u64,
}

impl ConsentModal {
    pub fn new(config: &ConsentConfig) -> Self {
        Self {
            tolerance: config.tolerance_px,
            close_delay_ms: config.close_delay_ms,
            open: false,
            scrolled_to_bottom: false,
            checked: false,
            generation: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_read(&self) -> bool {
        self.scrolled_to_bottom
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    /// Gate state to apply before any interaction, whatever the markup says.
    pub fn initial_patch(&self) -> ConsentPatch {
        ConsentPatch::Gate {
            read: self.scrolled_to_bottom,
        }
    }

    fn check_gate(&mut self, metrics: ScrollMetrics, fx: &mut Effects<ConsentMsg, ConsentPatch>) {
        self.scrolled_to_bottom = metrics.reached_end(self.tolerance);
        fx.render(ConsentPatch::Gate {
            read: self.scrolled_to_bottom,
        });
    }

    fn close(&mut self, fx: &mut Effects<ConsentMsg, ConsentPatch>) {
        self.open = false;
        fx.render(ConsentPatch::Visible(false));
    }
}

impl Machine for ConsentModal {
    type Msg = ConsentMsg;
    type Patch = ConsentPatch;

    fn update(&mut self, msg: ConsentMsg, fx: &mut Effects<ConsentMsg, ConsentPatch>) {
        match msg {
            ConsentMsg::Open => {
                self.generation += 1;
                fx.invalidate(self.generation);

                self.open = true;
                self.checked = false;
                fx.render(ConsentPatch::Visible(true));
                fx.render(ConsentPatch::ResetScroll);
                fx.render(ConsentPatch::Checkboxes {
                    checked: false,
                    enabled: false,
                });
                self.scrolled_to_bottom = false;
                fx.render(ConsentPatch::Gate { read: false });
            }
            ConsentMsg::Scrolled(metrics) => self.check_gate(metrics, fx),
            ConsentMsg::Changed { source, checked } => {
                if checked && !self.scrolled_to_bottom {
                    debug!("Ignoring consent before the policy was read");
                    fx.render(ConsentPatch::Checked {
                        target: source,
                        checked: false,
                    });
                    return;
                }

                self.checked = checked;
                fx.render(ConsentPatch::Checked {
                    target: source.other(),
                    checked,
                });

                let closes = match source {
                    Checkbox::Modal => checked,
                    Checkbox::Inline => checked && self.open,
                };
                if closes {
                    fx.schedule(self.close_delay_ms, self.generation, ConsentMsg::CloseElapsed);
                }
            }
            ConsentMsg::Close | ConsentMsg::CloseElapsed => self.close(fx),
            ConsentMsg::Key(key) => {
                if key == "Escape" && self.open {
                    self.close(fx);
                }
            }
        }
    }
}

struct ConsentDom {
    modal: Element,
    body: Option<Element>,
    footer: Option<Element>,
    inline: HtmlInputElement,
    in_modal: HtmlInputElement,
    page_body: Option<HtmlElement>,
}

impl ConsentDom {
    fn checkbox(&self, which: Checkbox) -> &HtmlInputElement {
        match which {
            Checkbox::Inline => &self.inline,
            Checkbox::Modal => &self.in_modal,
        }
    }

    fn metrics(&self) -> ScrollMetrics {
        self.body.as_ref().map(ScrollMetrics::of).unwrap_or(ScrollMetrics {
            scroll_top: 0.0,
            client_height: 0.0,
            scroll_height: 0.0,
        })
    }
}

impl View<ConsentPatch> for ConsentDom {
    fn render(&self, patch: ConsentPatch) {
        match patch {
            ConsentPatch::Visible(open) => {
                dom::toggle_class(&self.modal, ACTIVE_CLASS, open);
                dom::set_attr(&self.modal, "aria-hidden", if open { "false" } else { "true" });
                if let Some(body) = &self.page_body {
                    dom::toggle_class(body, BODY_LOCK_CLASS, open);
                }
            }
            ConsentPatch::ResetScroll => {
                if let Some(body) = &self.body {
                    body.set_scroll_top(0);
                }
            }
            ConsentPatch::Checkboxes { checked, enabled } => {
                for input in [&self.inline, &self.in_modal] {
                    input.set_checked(checked);
                    input.set_disabled(!enabled);
                }
            }
            ConsentPatch::Gate { read } => {
                self.inline.set_disabled(!read);
                self.in_modal.set_disabled(!read);
                if let Some(footer) = &self.footer {
                    dom::toggle_class(footer, READ_CLASS, read);
                }
            }
            ConsentPatch::Checked { target, checked } => self.checkbox(target).set_checked(checked),
        }
    }
}

fn input_by_id(document: &Document, id: &str) -> Option<HtmlInputElement> {
    document.get_element_by_id(id)?.dyn_into().ok()
}

pub fn init(document: &Document, config: &ConsentConfig) {
    let Some(modal) = document.get_element_by_id("privacy-modal") else { return };
    let Some(link) = document.get_element_by_id("privacy-link") else { return };
    let Some(inline) = input_by_id(document, "privacy-checkbox") else { return };
    let Some(in_modal) = input_by_id(document, "privacy-modal-checkbox") else { return };

    let close_button = dom::query(&modal, ".privacy-modal__close");
    let overlay = dom::query(&modal, ".privacy-modal__overlay");
    let view = ConsentDom {
        body: document.get_element_by_id("privacy-modal-body"),
        footer: document.get_element_by_id("privacy-modal-footer"),
        page_body: document.body(),
        modal,
        inline,
        in_modal,
    };
    let machine = ConsentModal::new(config);
    view.render(machine.initial_patch());
    let runtime = Runtime::new(machine, view);

    {
        let runtime = runtime.clone();
        dom::listen(&link, "click", move |e: MouseEvent| {
            e.prevent_default();
            runtime.dispatch(ConsentMsg::Open);
            // measured only now that the body is visible and back at the top
            let metrics = runtime.view().metrics();
            runtime.dispatch(ConsentMsg::Scrolled(metrics));
        });
    }

    for control in close_button.iter().chain(overlay.iter()) {
        let runtime = runtime.clone();
        dom::listen(control, "click", move |_: MouseEvent| runtime.dispatch(ConsentMsg::Close));
    }

    {
        let runtime = runtime.clone();
        dom::listen(document, "keydown", move |e: KeyboardEvent| {
            runtime.dispatch(ConsentMsg::Key(e.key()))
        });
    }

    if let Some(body) = runtime.view().body.clone() {
        let runtime = runtime.clone();
        dom::listen(&body, "scroll", move |_: Event| {
            let metrics = runtime.view().metrics();
            runtime.dispatch(ConsentMsg::Scrolled(metrics));
        });
    }

    for source in [Checkbox::Inline, Checkbox::Modal] {
        let input = runtime.view().checkbox(source).clone();
        let runtime = runtime.clone();
        dom::listen(&input.clone(), "change", move |_: Event| {
            runtime.dispatch(ConsentMsg::Changed {
                source,
                checked: input.checked(),
            });
        });
    }
}
