//! "Show more" / "close" for the later steps of the flow section.
//!
//! Closing hides the steps bottom-up with a short stagger and swaps the
//! controls back once the CSS transition has settled. Every click starts a new
//! generation, which cancels whatever the previous click scheduled.

use log::debug;
use web_sys::{Document, Element, MouseEvent};

use crate::config::FlowConfig;
use crate::dom;
use crate::runtime::{Effects, Machine, Runtime, View};

const STEP_SELECTOR: &str = ".flow__step--hidden";
const MORE_WRAP_SELECTOR: &str = ".flow__more-btn-wrap";
const VISIBLE_CLASS: &str = "is-visible";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controls {
    More,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowMsg {
    ShowMore,
    Close,
    HideStep { index: usize },
    Settle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPatch {
    Step { index: usize, visible: bool },
    Controls(Controls),
}

pub struct Flow {
    visible: Vec<bool>,
    controls: Controls,
    generation: u64,
    stagger_ms: u32,
    settle_ms: u32,
}

impl Flow {
    pub fn new(hidden_steps: usize, config: &FlowConfig) -> Self {
        Self {
            visible: vec![false; hidden_steps],
            controls: Controls::More,
            generation: 0,
            stagger_ms: config.stagger_ms,
            settle_ms: config.settle_ms,
        }
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    pub fn visible_steps(&self) -> usize {
        self.visible.iter().filter(|v| **v).count()
    }

    fn next_generation(&mut self, fx: &mut Effects<FlowMsg, FlowPatch>) {
        self.generation += 1;
        fx.invalidate(self.generation);
    }
}

impl Machine for Flow {
    type Msg = FlowMsg;
    type Patch = FlowPatch;

    fn update(&mut self, msg: FlowMsg, fx: &mut Effects<FlowMsg, FlowPatch>) {
        match msg {
            FlowMsg::ShowMore => {
                self.next_generation(fx);
                for (index, visible) in self.visible.iter_mut().enumerate() {
                    *visible = true;
                    fx.render(FlowPatch::Step { index, visible: true });
                }
                self.controls = Controls::Close;
                fx.render(FlowPatch::Controls(Controls::Close));
            }
            FlowMsg::Close => {
                if self.controls != Controls::Close {
                    return;
                }
                self.next_generation(fx);

                let count = self.visible.len();
                for (order, index) in (0..count).rev().enumerate() {
                    fx.schedule(order as u32 * self.stagger_ms, self.generation, FlowMsg::HideStep { index });
                }
                let last = count.saturating_sub(1) as u32 * self.stagger_ms;
                fx.schedule(last + self.settle_ms, self.generation, FlowMsg::Settle);
                debug!("Closing {} flow step(s)", count);
            }
            FlowMsg::HideStep { index } => {
                if let Some(visible) = self.visible.get_mut(index) {
                    *visible = false;
                    fx.render(FlowPatch::Step { index, visible: false });
                }
            }
            FlowMsg::Settle => {
                self.controls = Controls::More;
                fx.render(FlowPatch::Controls(Controls::More));
            }
        }
    }
}

struct FlowDom {
    steps: Vec<Element>,
    more_wrap: Option<Element>,
    close_wrap: Element,
}

impl View<FlowPatch> for FlowDom {
    fn render(&self, patch: FlowPatch) {
        match patch {
            FlowPatch::Step { index, visible } => {
                if let Some(step) = self.steps.get(index) {
                    dom::toggle_class(step, VISIBLE_CLASS, visible);
                }
            }
            FlowPatch::Controls(controls) => {
                let (more, close) = match controls {
                    Controls::More => ("flex", "none"),
                    Controls::Close => ("none", "flex"),
                };
                if let Some(wrap) = &self.more_wrap {
                    dom::set_style(wrap, "display", more);
                }
                dom::set_style(&self.close_wrap, "display", close);
            }
        }
    }
}

pub fn init(document: &Document, config: &FlowConfig) {
    let Some(more_button) = document.get_element_by_id("flow-more-btn") else { return };
    let Some(close_button) = document.get_element_by_id("flow-close-btn") else { return };
    let Some(close_wrap) = document.get_element_by_id("flow-close-btn-wrap") else { return };
    let steps = dom::query_all(document, STEP_SELECTOR);
    if steps.is_empty() {
        return;
    }

    let more_wrap = more_button.closest(MORE_WRAP_SELECTOR).ok().flatten();
    let runtime = Runtime::new(
        Flow::new(steps.len(), config),
        FlowDom {
            steps,
            more_wrap,
            close_wrap,
        },
    );

    {
        let runtime = runtime.clone();
        dom::listen(&more_button, "click", move |_: MouseEvent| runtime.dispatch(FlowMsg::ShowMore));
    }
    dom::listen(&close_button, "click", move |_: MouseEvent| runtime.dispatch(FlowMsg::Close));
}
