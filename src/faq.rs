use log::debug;
use web_sys::{Document, Element, MouseEvent};

use crate::config::FaqConfig;
use crate::dom;
use crate::runtime::{Effects, Machine, Runtime, View};

const ITEM_SELECTOR: &str = ".faq__content-item";
const ICON_SELECTOR: &str = ".faq__content-item-title-icon";
const OPEN_CLASS: &str = "faq__content-item--open";

pub struct Accordion {
    open: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccordionPatch {
    Item { index: usize, open: bool },
}

impl Accordion {
    pub fn new(items: usize) -> Self {
        Self {
            open: vec![false; items],
        }
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.open.get(index).copied().unwrap_or(false)
    }
}

impl Machine for Accordion {
    /// Index of the clicked item.
    type Msg = usize;
    type Patch = AccordionPatch;

    fn update(&mut self, index: usize, fx: &mut Effects<usize, AccordionPatch>) {
        if let Some(open) = self.open.get_mut(index) {
            *open = !*open;
            fx.render(AccordionPatch::Item { index, open: *open });
        }
    }
}

struct AccordionDom {
    items: Vec<(Element, Element)>,
    labels: FaqConfig,
}

impl View<AccordionPatch> for AccordionDom {
    fn render(&self, patch: AccordionPatch) {
        let AccordionPatch::Item { index, open } = patch;
        let Some((item, icon)) = self.items.get(index) else {
            return;
        };
        dom::toggle_class(item, OPEN_CLASS, open);
        // the label names the action the icon performs next
        let label = if open {
            &self.labels.close_label
        } else {
            &self.labels.open_label
        };
        dom::set_attr(icon, "aria-label", label);
    }
}

pub fn init(document: &Document, labels: &FaqConfig) {
    let items: Vec<(Element, Element)> = dom::query_all(document, ITEM_SELECTOR)
        .into_iter()
        .filter_map(|item| {
            let icon = dom::query(&item, ICON_SELECTOR)?;
            Some((item, icon))
        })
        .collect();
    if items.is_empty() {
        return;
    }
    debug!("FAQ with {} item(s)", items.len());

    let icons: Vec<Element> = items.iter().map(|(_, icon)| icon.clone()).collect();
    let runtime = Runtime::new(
        Accordion::new(items.len()),
        AccordionDom {
            items,
            labels: labels.clone(),
        },
    );

    for (index, icon) in icons.iter().enumerate() {
        let runtime = runtime.clone();
        dom::listen(icon, "click", move |_: MouseEvent| runtime.dispatch(index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::ManualRuntime;

    #[test]
    fn click_toggles_open_and_back() {
        let mut rt = ManualRuntime::new(Accordion::new(3));
        rt.dispatch(1);
        assert!(rt.machine.is_open(1));
        rt.dispatch(1);
        assert!(!rt.machine.is_open(1));
        assert_eq!(
            rt.take_rendered(),
            vec![
                (0, AccordionPatch::Item { index: 1, open: true }),
                (0, AccordionPatch::Item { index: 1, open: false }),
            ]
        );
    }

    #[test]
    fn items_open_independently() {
        let mut rt = ManualRuntime::new(Accordion::new(3));
        rt.dispatch(0);
        rt.dispatch(2);
        assert!(rt.machine.is_open(0));
        assert!(!rt.machine.is_open(1));
        assert!(rt.machine.is_open(2));
    }

    #[test]
    fn out_of_range_click_is_ignored() {
        let mut rt = ManualRuntime::new(Accordion::new(2));
        rt.dispatch(7);
        assert!(rt.take_rendered().is_empty());
        assert!(!rt.machine.is_open(7));
    }
}
